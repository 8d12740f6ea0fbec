use chrono::{Duration, NaiveDate};

pub const INITIAL_EASE: f64 = 2.5;
pub const MIN_EASE: f64 = 1.3;

/// Review grade, 0 (blackout) through 5 (perfect recall).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(u8);

impl Quality {
    pub fn from_int(quality: i64) -> Option<Quality> {
        if (0..=5).contains(&quality) {
            Some(Quality(quality as u8))
        } else {
            None
        }
    }

    pub fn value(&self) -> u8 {
        self.0
    }

    /// Grades 3 and up count as a successful recall.
    pub fn is_pass(&self) -> bool {
        self.0 >= 3
    }
}

/// SM-2 memory state carried per (user, card).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sm2State {
    pub ease_factor: f64,
    pub interval_days: i64,
    pub repetitions: i64,
}

impl Default for Sm2State {
    fn default() -> Self {
        Self {
            ease_factor: INITIAL_EASE,
            interval_days: 0,
            repetitions: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sm2Outcome {
    pub state: Sm2State,
    pub next_review_date: NaiveDate,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Sm2Scheduler;

impl Sm2Scheduler {
    pub fn new() -> Self {
        Self
    }

    /// Apply one review. Ease updates on every grade and never drops below
    /// 1.3; a failed recall resets the repetition ladder and schedules the
    /// card for tomorrow.
    pub fn review(&self, state: &Sm2State, quality: Quality, today: NaiveDate) -> Sm2Outcome {
        let q = f64::from(quality.value());
        let ease = (state.ease_factor + 0.1 - (5.0 - q) * (0.08 + (5.0 - q) * 0.02)).max(MIN_EASE);

        let (repetitions, interval_days) = if quality.is_pass() {
            let reps = state.repetitions + 1;
            let interval = match reps {
                1 => 1,
                2 => 6,
                _ => (state.interval_days as f64 * ease).round() as i64,
            };
            (reps, interval.max(1))
        } else {
            (0, 1)
        };

        Sm2Outcome {
            state: Sm2State {
                ease_factor: ease,
                interval_days,
                repetitions,
            },
            next_review_date: today + Duration::days(interval_days),
        }
    }
}
