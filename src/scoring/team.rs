//! Continuous team model: four orientations, choice points and 1–5 ratings.

use serde::{Deserialize, Serialize};

use super::{classify, score_answers, ChoiceOption, Interpretation, Question, QuestionKind, ScoreKey, ScoreSet};
use crate::domain::Answer;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Dimension {
  #[serde(rename = "rezultatnost")]
  Result,
  #[serde(rename = "processnost")]
  Process,
  #[serde(rename = "statusnost")]
  Status,
  #[serde(rename = "systemnost")]
  Systems,
}

impl ScoreKey for Dimension {
  const ALL: &'static [Self] = &[Dimension::Result, Dimension::Process, Dimension::Status, Dimension::Systems];

  fn index(self) -> usize { self as usize }

  fn as_str(self) -> &'static str {
    match self {
      Dimension::Result => "rezultatnost",
      Dimension::Process => "processnost",
      Dimension::Status => "statusnost",
      Dimension::Systems => "systemnost",
    }
  }
}

use Dimension::{Process as P, Result as R, Status as S, Systems as Y};

pub static MINI_QUIZ: &[Question<Dimension>] = &[
  Question {
    id: "mq1",
    text: "Когда в вашей команде появляется новая задача, что происходит чаще?",
    kind: QuestionKind::Choice(&[
      ChoiceOption { id: "mq1-a", text: "Люди сами берут задачу и находят путь к решению", points: &[(R, 3.0), (Y, 1.0)] },
      ChoiceOption { id: "mq1-b", text: "Ждут четких инструкций, как это делать", points: &[(P, 3.0)] },
      ChoiceOption { id: "mq1-c", text: "Обсуждают, кто будет ответственным и как это выглядит", points: &[(S, 2.0), (P, 1.0)] },
    ]),
  },
  Question {
    id: "mq2",
    text: "Как члены команды реагируют на изменения в процессах?",
    kind: QuestionKind::Choice(&[
      ChoiceOption { id: "mq2-a", text: "Адаптируются быстро, ищут новые возможности", points: &[(R, 2.0), (Y, 2.0)] },
      ChoiceOption { id: "mq2-b", text: "Сопротивляются, требуют времени на обучение", points: &[(P, 3.0)] },
      ChoiceOption { id: "mq2-c", text: "Интересуются, как это повлияет на их статус", points: &[(S, 3.0)] },
    ]),
  },
  Question {
    id: "mq3",
    text: "Что мотивирует ваших сотрудников больше всего?",
    kind: QuestionKind::Choice(&[
      ChoiceOption { id: "mq3-a", text: "Достижение амбициозных целей и победа", points: &[(R, 3.0)] },
      ChoiceOption { id: "mq3-b", text: "Стабильность, понятные правила и процессы", points: &[(P, 2.0), (Y, 1.0)] },
      ChoiceOption { id: "mq3-c", text: "Признание, должность, статусные атрибуты", points: &[(S, 3.0)] },
    ]),
  },
  Question {
    id: "mq4",
    text: "Как команда относится к планированию?",
    kind: QuestionKind::Choice(&[
      ChoiceOption { id: "mq4-a", text: "Планируют минимально, действуют по ситуации", points: &[(R, 2.0)] },
      ChoiceOption { id: "mq4-b", text: "Тщательно планируют каждый шаг", points: &[(Y, 3.0), (P, 1.0)] },
      ChoiceOption { id: "mq4-c", text: "Создают красивые презентации планов", points: &[(S, 2.0)] },
    ]),
  },
];

macro_rules! rated {
  ($id:literal, $text:literal, $dim:expr) => {
    Question { id: $id, text: $text, kind: QuestionKind::Rating(&[$dim]) }
  };
}

pub static FULL_TEST: &[Question<Dimension>] = &[
  rated!("ft1", "В нашей команде главное — результат, процесс вторичен", R),
  rated!("ft2", "Мы строго следуем регламентам и процедурам", P),
  rated!("ft3", "Статус и должность важны для атмосферы в команде", S),
  rated!("ft4", "Мы всегда планируем на несколько шагов вперёд", Y),
  rated!("ft5", "Люди мотивированы достижением целей, а не выполнением задач", R),
  rated!("ft6", "Важнее правильно сделать, чем быстро", P),
  rated!("ft7", "Сотрудники ценят возможность карьерного роста", S),
  rated!("ft8", "У нас есть чёткая система отчётности и метрик", Y),
  rated!("ft9", "Команда готова идти на риск ради большого результата", R),
  rated!("ft10", "Мы предпочитаем проверенные методы работы", P),
  rated!("ft11", "Внешний вид офиса, атрибутика компании важны для команды", S),
  rated!("ft12", "Мы регулярно анализируем эффективность и оптимизируем процессы", Y),
  rated!("ft13", "Сотрудники часто предлагают новые идеи и улучшения", R),
  rated!("ft14", "У каждого есть чёткий функционал и зона ответственности", P),
  rated!("ft15", "Важно, как команда выглядит в глазах клиентов и партнёров", S),
  rated!("ft16", "Мы используем данные для принятия решений", Y),
  rated!("ft17", "Команда работает сверхурочно, если нужно достичь цели", R),
  rated!("ft18", "Обучение и развитие навыков — приоритет", P),
];

/// Score answers against a team bank (`MINI_QUIZ`, `FULL_TEST`, or any other `Question<Dimension>` bank).
pub fn compute_dimension_scores(bank: &[Question<Dimension>], answers: &[Answer]) -> ScoreSet<Dimension> {
  score_answers(bank, answers)
}

/// Full diagnostic result.
#[derive(Debug, Clone, Serialize)]
pub struct TeamResult {
  pub scores: ScoreSet<Dimension>,
  pub dominant: Dimension,
  /// Score of the dominant dimension.
  pub dominant_percentage: f64,
  pub interpretation: &'static Interpretation,
}

impl TeamResult {
  pub fn from_scores(scores: ScoreSet<Dimension>) -> Self {
    let dominant = classify(&scores);
    Self { dominant_percentage: scores.get(dominant), dominant, interpretation: interpretation(dominant), scores }
  }
}

/// Mini-quiz result: dominant dimension and a teaser nudging towards the full test.
#[derive(Debug, Clone, Serialize)]
pub struct TeaserResult {
  pub scores: ScoreSet<Dimension>,
  pub dominant: Dimension,
  pub teaser: &'static str,
}

impl TeaserResult {
  pub fn from_scores(scores: ScoreSet<Dimension>) -> Self {
    let dominant = classify(&scores);
    Self { teaser: teaser(dominant), dominant, scores }
  }
}

pub fn teaser(d: Dimension) -> &'static str {
  match d {
    Dimension::Result => "По вашим ответам видно, что команда ориентирована на результат. Вероятны риски выгорания и недостатка процессности. Чтобы увидеть полную картину и получить конкретные рекомендации, пройдите расширенную диагностику.",
    Dimension::Process => "Ваша команда сфокусирована на процессах и исполнении. Есть риски недостаточной инициативности и медленной адаптации. Пройдите полный тест для детального анализа и рекомендаций.",
    Dimension::Status => "По вашим ответам заметно влияние статусности в команде. Это может тормозить инновации и создавать внутренние конфликты. Получите полную диагностику для управленческих решений.",
    Dimension::Systems => "Команда демонстрирует системность и структурированность. Важно убедиться, что это не переходит в бюрократию. Пройдите расширенный тест для полной карты команды.",
  }
}

static RESULT: Interpretation = Interpretation {
  title: "Команда-Результатники",
  description: "Ваша команда ориентирована на достижение целей и результатов. Люди ценят скорость, конкретные победы и готовы брать на себя ответственность. Сотрудники мотивированы вызовами и амбициозными задачами.",
  risks: &[
    "Может страдать качество процессов и документации",
    "Высокий риск выгорания при длительных проектах",
    "Возможны конфликты из-за «срезания углов»",
    "Сложности с масштабированием успешных практик",
  ],
  recommendations: &[
    "Внедрите базовые процессы для повторяющихся задач",
    "Балансируйте краткосрочные победы и долгосрочную устойчивость",
    "Создайте систему документирования лучших практик",
    "Следите за work-life balance команды",
  ],
};

static PROCESS: Interpretation = Interpretation {
  title: "Команда-Процессники",
  description: "Ваша команда сфокусирована на качественном выполнении задач по установленным процессам. Люди ценят чёткие инструкции, регламенты и последовательность. Сотрудники оценивают себя по вложенным усилиям и старанию.",
  risks: &[
    "Недостаточная инициативность и гибкость",
    "Медленная адаптация к изменениям",
    "Фокус на процессе, а не на результате",
    "Риск «паралича анализа» при новых задачах",
  ],
  recommendations: &[
    "Поощряйте инициативу и предложения улучшений",
    "Установите метрики результата, не только процесса",
    "Создайте пространство для экспериментов",
    "Внедрите быстрые циклы обратной связи",
  ],
};

static STATUS: Interpretation = Interpretation {
  title: "Команда с высокой Статусностью",
  description: "В вашей команде важны должности, статус и внешнее восприятие. Люди ценят признание, карьерный рост и престиж. Команда хорошо «продаёт» идеи и проекты, создаёт привлекательный образ.",
  risks: &[
    "Видимость деятельности важнее реальных результатов",
    "Политики и интриги вместо работы",
    "Сопротивление «грязной работе»",
    "Завышенные ожидания по компенсациям",
  ],
  recommendations: &[
    "Установите объективные KPI результатов",
    "Создайте прозрачную систему роста",
    "Поощряйте реальные достижения, не презентации",
    "Развивайте культуру равенства и взаимопомощи",
  ],
};

static SYSTEMS: Interpretation = Interpretation {
  title: "Системная команда",
  description: "Ваша команда демонстрирует структурированность, аналитичность и планирование. Люди ценят данные, метрики и системный подход. Сотрудники работают на несколько шагов вперёд, оптимизируют процессы.",
  risks: &[
    "Излишняя бюрократия и формализм",
    "Медленное принятие решений",
    "Недостаток гибкости при форс-мажорах",
    "«Паралич планирования» вместо действий",
  ],
  recommendations: &[
    "Балансируйте планирование и быстрые запуски",
    "Создайте механизмы быстрых решений",
    "Поощряйте разумный риск и эксперименты",
    "Упрощайте процессы, убирайте лишнее",
  ],
};

pub fn interpretation(d: Dimension) -> &'static Interpretation {
  match d {
    Dimension::Result => &RESULT,
    Dimension::Process => &PROCESS,
    Dimension::Status => &STATUS,
    Dimension::Systems => &SYSTEMS,
  }
}
