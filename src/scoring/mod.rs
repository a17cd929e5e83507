//! Scored classification shared by both quiz models.
//!
//! A model is a closed set of keys (`ScoreKey`), a static bank of `Question<K>`,
//! and the same pipeline:
//!   1. accumulate answers into an `Accumulator<K>` (choice points are summed,
//!      ratings are collected per key),
//!   2. `finish` into a `ScoreSet<K>`: keys with rating observations become their
//!      mean rescaled from [1,5] to [0,100], other keys keep their point sum,
//!   3. `classify` reduces left-to-right over the declared key order.
//!
//! Answers that do not match the bank (unknown question id, unknown option,
//! value kind not matching the question kind) are skipped without error.

pub mod employee;
pub mod team;

use std::fmt;

use serde::ser::{Serialize, SerializeMap, Serializer};
use tracing::debug;

use crate::domain::{Answer, AnswerValue, CardInput, CardOption, QuestionCard, Rating};

/// A closed, ordered set of score keys.
pub trait ScoreKey: Copy + Eq + fmt::Debug + Send + Sync + 'static {
  /// Every key, in declaration order. This order is the tie-break order.
  const ALL: &'static [Self];

  /// Position of the key inside `ALL`.
  fn index(self) -> usize;

  /// Wire name of the key.
  fn as_str(self) -> &'static str;
}

/// Per-key scores. Every key of `K::ALL` is always present.
#[derive(Clone, Debug, PartialEq)]
pub struct ScoreSet<K: ScoreKey> {
  values: Vec<f64>,
  _keys: std::marker::PhantomData<K>,
}

impl<K: ScoreKey> ScoreSet<K> {
  pub fn zeroed() -> Self {
    Self { values: vec![0.0; K::ALL.len()], _keys: std::marker::PhantomData }
  }

  pub fn from_pairs(pairs: &[(K, f64)]) -> Self {
    let mut set = Self::zeroed();
    for &(k, v) in pairs {
      set.set(k, v);
    }
    set
  }

  pub fn get(&self, key: K) -> f64 {
    self.values[key.index()]
  }

  pub fn set(&mut self, key: K, value: f64) {
    self.values[key.index()] = value;
  }

  pub fn add(&mut self, key: K, delta: f64) {
    self.values[key.index()] += delta;
  }

  /// Keys and values in declaration order.
  pub fn iter(&self) -> impl Iterator<Item = (K, f64)> + '_ {
    K::ALL.iter().map(move |&k| (k, self.get(k)))
  }
}

impl<K: ScoreKey> Default for ScoreSet<K> {
  fn default() -> Self { Self::zeroed() }
}

impl<K: ScoreKey> Serialize for ScoreSet<K> {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(K::ALL.len()))?;
    for (k, v) in self.iter() {
      map.serialize_entry(k.as_str(), &v)?;
    }
    map.end()
  }
}

/// Dominant key: strict `>` replaces the running maximum, so ties keep the first declared key.
pub fn classify<K: ScoreKey>(scores: &ScoreSet<K>) -> K {
  let mut best = K::ALL[0];
  let mut best_value = scores.get(best);
  for &k in &K::ALL[1..] {
    let v = scores.get(k);
    if v > best_value {
      best = k;
      best_value = v;
    }
  }
  best
}

/// Linear map of a mean rating from [1,5] onto [0,100].
pub fn rescale_rating_mean(mean: f64) -> f64 {
  let min = f64::from(Rating::MIN);
  let span = f64::from(Rating::MAX - Rating::MIN);
  (mean - min) / span * 100.0
}

pub struct ChoiceOption<K: 'static> {
  pub id: &'static str,
  pub text: &'static str,
  /// Point contributions; may be empty or touch several keys.
  pub points: &'static [(K, f64)],
}

pub enum QuestionKind<K: 'static> {
  Choice(&'static [ChoiceOption<K>]),
  /// A 1–5 rating recorded once for each tagged key.
  Rating(&'static [K]),
}

pub struct Question<K: 'static> {
  pub id: &'static str,
  pub text: &'static str,
  pub kind: QuestionKind<K>,
}

impl<K: ScoreKey> Question<K> {
  pub fn card(&self) -> QuestionCard {
    let input = match &self.kind {
      QuestionKind::Choice(options) => CardInput::Options {
        options: options
          .iter()
          .map(|o| CardOption { id: o.id.to_string(), text: o.text.to_string() })
          .collect(),
      },
      QuestionKind::Rating(_) => CardInput::Scale { min: Rating::MIN, max: Rating::MAX },
    };
    QuestionCard { id: self.id.to_string(), text: self.text.to_string(), input }
  }
}

/// Cards for a whole bank, in presentation order.
pub fn bank_cards<K: ScoreKey>(bank: &[Question<K>]) -> Vec<QuestionCard> {
  bank.iter().map(Question::card).collect()
}

/// Running totals for one scoring pass.
pub struct Accumulator<K: ScoreKey> {
  points: ScoreSet<K>,
  ratings: Vec<Vec<u8>>,
}

impl<K: ScoreKey> Accumulator<K> {
  pub fn new() -> Self {
    Self { points: ScoreSet::zeroed(), ratings: vec![Vec::new(); K::ALL.len()] }
  }

  pub fn add_points(&mut self, points: &[(K, f64)]) {
    for &(k, p) in points {
      self.points.add(k, p);
    }
  }

  pub fn observe_rating(&mut self, keys: &[K], rating: Rating) {
    for &k in keys {
      self.ratings[k.index()].push(rating.value());
    }
  }

  /// Apply one answer against `bank`. Returns false when the answer was skipped.
  pub fn apply(&mut self, bank: &[Question<K>], answer: &Answer) -> bool {
    let Some(question) = bank.iter().find(|q| q.id == answer.question_id) else {
      debug!(target: "scoring", question_id = %answer.question_id, "Skipping answer for unknown question");
      return false;
    };
    match (&question.kind, &answer.value) {
      (QuestionKind::Choice(options), AnswerValue::Choice(option_id)) => {
        match options.iter().find(|o| o.id == option_id) {
          Some(option) => {
            self.add_points(option.points);
            true
          }
          None => {
            debug!(target: "scoring", question_id = %answer.question_id, %option_id, "Skipping unknown option");
            false
          }
        }
      }
      (QuestionKind::Rating(keys), AnswerValue::Rating(r)) => {
        self.observe_rating(keys, *r);
        true
      }
      _ => {
        debug!(target: "scoring", question_id = %answer.question_id, "Skipping answer of mismatched kind");
        false
      }
    }
  }

  pub fn finish(self) -> ScoreSet<K> {
    let mut out = self.points;
    for &k in K::ALL {
      let observed = &self.ratings[k.index()];
      if observed.is_empty() { continue; }
      let sum: u32 = observed.iter().map(|&v| u32::from(v)).sum();
      let mean = f64::from(sum) / observed.len() as f64;
      out.set(k, rescale_rating_mean(mean));
    }
    out
  }
}

impl<K: ScoreKey> Default for Accumulator<K> {
  fn default() -> Self { Self::new() }
}

/// Score an ordered answer sequence against a static bank.
pub fn score_answers<K: ScoreKey>(bank: &[Question<K>], answers: &[Answer]) -> ScoreSet<K> {
  let mut acc = Accumulator::new();
  let applied = answers.iter().filter(|a| acc.apply(bank, a)).count();
  debug!(target: "scoring", applied, skipped = answers.len() - applied, "Answers accumulated");
  acc.finish()
}

/// Static interpretation attached to a classification key.
#[derive(Debug, serde::Serialize)]
pub struct Interpretation {
  pub title: &'static str,
  pub description: &'static str,
  pub risks: &'static [&'static str],
  pub recommendations: &'static [&'static str],
}

#[cfg(test)]
mod tests {
  use super::*;

  #[derive(Clone, Copy, Debug, PartialEq, Eq)]
  enum Abc { A, B, C }

  impl ScoreKey for Abc {
    const ALL: &'static [Self] = &[Abc::A, Abc::B, Abc::C];
    fn index(self) -> usize { self as usize }
    fn as_str(self) -> &'static str {
      match self { Abc::A => "a", Abc::B => "b", Abc::C => "c" }
    }
  }

  static BANK: &[Question<Abc>] = &[
    Question {
      id: "c1",
      text: "choice",
      kind: QuestionKind::Choice(&[
        ChoiceOption { id: "x", text: "x", points: &[(Abc::A, 2.0), (Abc::B, 1.0)] },
        ChoiceOption { id: "y", text: "y", points: &[] },
      ]),
    },
    Question { id: "r1", text: "rating", kind: QuestionKind::Rating(&[Abc::C]) },
  ];

  #[test]
  fn zeroed_set_holds_every_key() {
    let set = ScoreSet::<Abc>::zeroed();
    assert_eq!(set.iter().count(), 3);
    assert!(set.iter().all(|(_, v)| v == 0.0));
  }

  #[test]
  fn ties_resolve_to_first_declared_key() {
    assert_eq!(classify(&ScoreSet::<Abc>::zeroed()), Abc::A);
    assert_eq!(classify(&ScoreSet::from_pairs(&[(Abc::B, 3.0), (Abc::C, 3.0)])), Abc::B);
    assert_eq!(classify(&ScoreSet::from_pairs(&[(Abc::C, 0.5)])), Abc::C);
  }

  #[test]
  fn rescale_endpoints_and_midpoint() {
    assert_eq!(rescale_rating_mean(1.0), 0.0);
    assert_eq!(rescale_rating_mean(3.0), 50.0);
    assert_eq!(rescale_rating_mean(5.0), 100.0);
  }

  #[test]
  fn choice_points_sum_and_ratings_rescale() {
    let answers = vec![
      Answer::choice("c1", "x"),
      Answer::choice("c1", "x"),
      Answer::rating("r1", Rating::new(4).unwrap()),
      Answer::rating("r1", Rating::new(2).unwrap()),
    ];
    let scores = score_answers(BANK, &answers);
    assert_eq!(scores.get(Abc::A), 4.0);
    assert_eq!(scores.get(Abc::B), 2.0);
    assert_eq!(scores.get(Abc::C), 50.0);
  }

  #[test]
  fn mismatched_answers_are_skipped() {
    let answers = vec![
      Answer::choice("nope", "x"),
      Answer::choice("c1", "zzz"),
      Answer::rating("c1", Rating::new(5).unwrap()),
      Answer::choice("r1", "x"),
      Answer::choice("c1", "y"),
    ];
    assert_eq!(score_answers(BANK, &answers), ScoreSet::zeroed());
  }

  #[test]
  fn score_set_serializes_in_declaration_order() {
    let set = ScoreSet::from_pairs(&[(Abc::C, 1.0)]);
    assert_eq!(serde_json::to_string(&set).unwrap(), r#"{"a":0.0,"b":0.0,"c":1.0}"#);
  }
}
