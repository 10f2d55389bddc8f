//! Deterministic daily challenge.
//!
//! Every client derives the same ordering of a fixed content pool from the calendar
//! date alone: the `YYYY-MM-DD` string is hashed with FNV-1a, the hash seeds a 32-bit
//! linear congruential generator, and the generator drives a Fisher-Yates shuffle.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

const LCG_MULTIPLIER: u32 = 1_664_525;
const LCG_INCREMENT: u32 = 1_013_904_223;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Items in the default daily slice.
pub const DAILY_SLICE_LEN: usize = 5;

const QUESTIONS: &[&str] = &[
    "Which planet has the most moons?",
    "What is the smallest prime number?",
    "Which ocean is the largest?",
    "How many sides does a hexagon have?",
    "What gas do plants absorb from the air?",
    "Which instrument has 88 keys?",
    "What is the capital of Canada?",
    "How many players are on a soccer team on the field?",
    "Which metal is liquid at room temperature?",
    "What is the longest river in Africa?",
    "How many minutes are in a day?",
    "Which animal is known as the ship of the desert?",
    "What is the hardest natural substance?",
    "Which country gifted the Statue of Liberty?",
    "What is the freezing point of water in Fahrenheit?",
    "How many bones are in the adult human body?",
    "Which language has the most native speakers?",
    "What is the chemical symbol for gold?",
    "Which continent is the Sahara in?",
    "What color do you get by mixing blue and yellow?",
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DailyError {
    #[error("invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),
}

impl From<DailyError> for crate::error::RoomError {
    fn from(err: DailyError) -> Self {
        Self::InvalidInput(err.to_string())
    }
}

pub fn fnv1a(input: &str) -> u32 {
    input.bytes().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ u32::from(byte)).wrapping_mul(FNV_PRIME)
    })
}

/// 32-bit LCG (`a = 1664525`, `c = 1013904223`, `m = 2^32`).
#[derive(Debug, Clone)]
pub struct Lcg {
    state: u32,
}

impl Lcg {
    pub fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    pub fn next_u32(&mut self) -> u32 {
        self.state = self
            .state
            .wrapping_mul(LCG_MULTIPLIER)
            .wrapping_add(LCG_INCREMENT);
        self.state
    }

    /// Uniform index in `0..bound`.
    fn below(&mut self, bound: usize) -> usize {
        ((u64::from(self.next_u32()) * bound as u64) >> 32) as usize
    }
}

/// Parse a strict `YYYY-MM-DD` date.
pub fn parse_date(date: &str) -> Result<NaiveDate, DailyError> {
    let invalid = || DailyError::InvalidDate(date.to_string());
    if date.len() != 10 {
        return Err(invalid());
    }
    NaiveDate::parse_from_str(date, DATE_FORMAT).map_err(|_| invalid())
}

/// Shuffle `items` deterministically for `date`.
pub fn shuffle_for_date<T>(date: &str, items: &mut [T]) -> Result<(), DailyError> {
    parse_date(date)?;
    let mut rng = Lcg::new(fnv1a(date));
    for i in (1..items.len()).rev() {
        let j = rng.below(i + 1);
        items.swap(i, j);
    }
    Ok(())
}

/// First `len` items of the date's ordering of `pool`.
pub fn daily_slice<T: Clone>(date: &str, pool: &[T], len: usize) -> Result<Vec<T>, DailyError> {
    let mut ordered = pool.to_vec();
    shuffle_for_date(date, &mut ordered)?;
    ordered.truncate(len);
    Ok(ordered)
}

/// The day's questions from the built-in pool.
pub fn daily_questions(date: &str) -> Result<Vec<&'static str>, DailyError> {
    daily_slice(date, QUESTIONS, DAILY_SLICE_LEN)
}

/// Consecutive-day completion record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Streak {
    pub current: u32,
    pub best: u32,
    pub last_completed: Option<NaiveDate>,
}

impl Streak {
    /// Record a completion on `date`.
    ///
    /// The day after the last completion extends the streak; a later day restarts it
    /// at 1. Repeating a day or completing an earlier day changes nothing.
    pub fn record(&self, date: NaiveDate) -> Self {
        let current = match self.last_completed {
            None => 1,
            Some(last) if date <= last => return *self,
            Some(last) if last.succ_opt() == Some(date) => self.current + 1,
            Some(_) => 1,
        };
        Self {
            current,
            best: self.best.max(current),
            last_completed: Some(date),
        }
    }

    pub fn record_str(&self, date: &str) -> Result<Self, DailyError> {
        Ok(self.record(parse_date(date)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn fnv1a_reference_values() {
        assert_eq!(fnv1a(""), 0x811c_9dc5);
        assert_eq!(fnv1a("a"), 0xe40c_292c);
    }

    #[test]
    fn lcg_sequence() {
        let mut rng = Lcg::new(0);
        assert_eq!(rng.next_u32(), 1_013_904_223);
        assert_eq!(rng.next_u32(), 1_196_435_762);
    }

    #[test]
    fn same_date_same_questions() {
        let first = daily_questions("2024-03-01").unwrap();
        let second = daily_questions("2024-03-01").unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), DAILY_SLICE_LEN);
        assert_ne!(first, daily_questions("2024-03-02").unwrap());
    }

    #[test]
    fn invalid_dates_are_rejected() {
        for bad in ["", "2024-3-1", "2024-02-30", "tomorrow", "2024/03/01"] {
            assert_eq!(
                daily_questions(bad).unwrap_err(),
                DailyError::InvalidDate(bad.to_string())
            );
        }
    }

    #[test]
    fn streak_rules() {
        let day = |s| parse_date(s).unwrap();
        let streak = Streak::default().record(day("2024-03-01"));
        assert_eq!((streak.current, streak.best), (1, 1));

        let next = streak.record(day("2024-03-02"));
        assert_eq!((next.current, next.best), (2, 2));
        assert_eq!(next.record(day("2024-03-02")), next);
        assert_eq!(next.record(day("2024-02-20")), next);

        let gap = next.record(day("2024-03-05"));
        assert_eq!((gap.current, gap.best), (1, 2));
    }

    #[test]
    fn streak_crosses_month_and_year_boundaries() {
        let streak = Streak::default()
            .record_str("2023-12-31")
            .unwrap()
            .record_str("2024-01-01")
            .unwrap()
            .record_str("2024-01-02")
            .unwrap();
        assert_eq!(streak.current, 3);
    }

    proptest! {
        #[test]
        fn shuffle_is_a_permutation(day in 1u32..=28, month in 1u32..=12, year in 2000i32..2100) {
            let date = format!("{year:04}-{month:02}-{day:02}");
            let mut items: Vec<usize> = (0..QUESTIONS.len()).collect();
            shuffle_for_date(&date, &mut items).unwrap();
            items.sort_unstable();
            prop_assert_eq!(items, (0..QUESTIONS.len()).collect::<Vec<_>>());
        }
    }
}
