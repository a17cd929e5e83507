//! Discrete employee model: seven A/B/C questions, one point per answer into one of three types.

use serde::{Deserialize, Serialize, Serializer};
use tracing::debug;

use super::{classify, score_answers, ChoiceOption, Interpretation, Question, QuestionKind, ScoreKey, ScoreSet};
use crate::domain::Answer;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Category {
  #[serde(rename = "resultnik")]
  Result,
  #[serde(rename = "processnik")]
  Process,
  #[serde(rename = "statusnik")]
  Status,
}

impl ScoreKey for Category {
  const ALL: &'static [Self] = &[Category::Result, Category::Process, Category::Status];

  fn index(self) -> usize { self as usize }

  fn as_str(self) -> &'static str {
    match self {
      Category::Result => "resultnik",
      Category::Process => "processnik",
      Category::Status => "statusnik",
    }
  }
}

pub const EMPLOYEE_QUESTION_COUNT: usize = 7;

macro_rules! abc {
  ($id:literal, $text:literal, $a:literal, $b:literal, $c:literal) => {
    Question {
      id: $id,
      text: $text,
      kind: QuestionKind::Choice(&[
        ChoiceOption { id: "A", text: $a, points: &[(Category::Result, 1.0)] },
        ChoiceOption { id: "B", text: $b, points: &[(Category::Process, 1.0)] },
        ChoiceOption { id: "C", text: $c, points: &[(Category::Status, 1.0)] },
      ]),
    }
  };
}

pub static EMPLOYEE_TEST: &[Question<Category>] = &[
  abc!("1", "Сотрудник получил новую задачу без подробной инструкции. Что он делает?",
    "Сразу берётся за дело и ищет самый быстрый путь к результату",
    "Уточняет порядок действий и ждёт понятного алгоритма",
    "Выясняет, кто ещё участвует и как задача будет выглядеть для руководства"),
  abc!("2", "Как сотрудник говорит о своих успехах?",
    "Называет цифры и достигнутые цели",
    "Рассказывает, сколько сил и времени вложил",
    "Подчёркивает, кто оценил его работу и какую роль он занимает"),
  abc!("3", "Что сильнее всего мотивирует сотрудника?",
    "Амбициозная цель и бонус за её достижение",
    "Стабильность, понятные правила и спокойный темп",
    "Признание, должность и возможность быть на виду"),
  abc!("4", "Как сотрудник реагирует на изменение планов в последний момент?",
    "Быстро перестраивается, если это приближает к цели",
    "Расстраивается и просит время, чтобы разобраться в новом порядке",
    "В первую очередь выясняет, как это отразится на его положении"),
  abc!("5", "Что сотрудник делает, когда задача не получается?",
    "Пробует другие способы, пока не добьётся результата",
    "Ещё раз проверяет, всё ли сделал по инструкции",
    "Ищет поддержку у влиятельных коллег"),
  abc!("6", "Как сотрудник относится к отчётности?",
    "Отчитывается коротко и только о результатах",
    "Ведёт подробные отчёты о каждом шаге",
    "Старается, чтобы отчёт красиво выглядел перед руководством"),
  abc!("7", "Какую обратную связь сотрудник ценит больше всего?",
    "Конкретную оценку достигнутого результата",
    "Подтверждение, что он всё сделал правильно",
    "Публичную похвалу и признание заслуг"),
];

/// Employee profile: per-type tally (0–7) and the selected type.
#[derive(Debug, Clone, Serialize)]
pub struct EmployeeProfile {
  #[serde(rename = "profile_type")]
  pub category: Category,
  #[serde(serialize_with = "whole_tallies")]
  pub scores: ScoreSet<Category>,
}

/// Tallies go out as integers.
fn whole_tallies<S: Serializer>(scores: &ScoreSet<Category>, ser: S) -> Result<S::Ok, S::Error> {
  ser.collect_map(scores.iter().map(|(k, v)| (k.as_str(), v.round() as u32)))
}

impl EmployeeProfile {
  pub fn tally(&self, category: Category) -> u32 {
    self.scores.get(category) as u32
  }
}

/// Tally the seven employee answers. Callers only invoke this once all seven are collected;
/// answers that do not match the bank are skipped like in the team model.
pub fn compute_employee_profile(answers: &[Answer]) -> EmployeeProfile {
  if answers.len() != EMPLOYEE_QUESTION_COUNT {
    debug!(target: "scoring", got = answers.len(), expected = EMPLOYEE_QUESTION_COUNT, "Employee answer count differs from the bank");
  }
  let scores = score_answers(EMPLOYEE_TEST, answers);
  EmployeeProfile { category: classify(&scores), scores }
}

static RESULT: Interpretation = Interpretation {
  title: "Результатник",
  description: "Сотрудник ориентирован на цель и измеримый итог. Берёт ответственность, действует быстро и оценивает себя по достигнутому результату, а не по затраченным усилиям.",
  risks: &[
    "Срезает углы и пропускает согласования ради скорости",
    "Теряет интерес к рутинным задачам без явной цели",
    "Может выгореть на длинной дистанции",
  ],
  recommendations: &[
    "Ставьте задачи через результат и сроки, а не через инструкции",
    "Привязывайте вознаграждение к измеримым показателям",
    "Договоритесь о минимальных обязательных правилах и контрольных точках",
    "Давайте сложные задачи с вызовом и свободой в выборе способа",
  ],
};

static PROCESS: Interpretation = Interpretation {
  title: "Процессник",
  description: "Сотрудник ценит порядок, понятные правила и последовательность. Старательно выполняет работу по алгоритму и оценивает себя по вложенным усилиям.",
  risks: &[
    "Не проявляет инициативу без прямого поручения",
    "Медленно адаптируется к изменениям",
    "Путает занятость с результатом",
  ],
  recommendations: &[
    "Давайте чёткие инструкции и регламенты",
    "Объясняйте, какой результат ожидается на выходе, а не только порядок действий",
    "Предупреждайте об изменениях заранее и давайте время на перестройку",
    "Хвалите за качество и аккуратность исполнения",
  ],
};

static STATUS: Interpretation = Interpretation {
  title: "Статусник",
  description: "Для сотрудника важны положение, признание и внешнее восприятие. Хорошо представляет идеи и проекты, ориентируется на мнение руководства и влиятельных коллег.",
  risks: &[
    "Видимость работы становится важнее её результата",
    "Избегает «неблагодарных» задач",
    "Завышенные ожидания по должности и компенсации",
  ],
  recommendations: &[
    "Связывайте признание и рост с объективными результатами",
    "Давайте публичную обратную связь за реальные достижения",
    "Поручайте задачи, где важны представительство и коммуникация",
    "Прозрачно описывайте требования для следующей ступени роста",
  ],
};

pub fn profile(category: Category) -> &'static Interpretation {
  match category {
    Category::Result => &RESULT,
    Category::Process => &PROCESS,
    Category::Status => &STATUS,
  }
}
