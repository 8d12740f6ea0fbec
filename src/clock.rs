use chrono::{DateTime, Duration, NaiveDate, Utc};

/// UTC clock abstraction so services and tests agree on "now".
#[derive(Debug, Clone, Copy, Default)]
pub enum Clock {
    #[default]
    Default,
    Fixed(DateTime<Utc>),
}

impl Clock {
    /// Returns a clock fixed at the given timestamp.
    pub fn fixed(at: DateTime<Utc>) -> Self {
        Self::Fixed(at)
    }

    /// Current time according to the clock.
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::Default => Utc::now(),
            Clock::Fixed(t) => *t,
        }
    }

    /// Current UTC calendar date.
    pub fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }

    /// If this is a fixed clock, advance it by the given duration.
    /// Has no effect on `Clock::Default`.
    pub fn advance(&mut self, delta: Duration) {
        if let Clock::Fixed(t) = self {
            *t += delta;
        }
    }

    pub fn is_fixed(&self) -> bool {
        matches!(self, Clock::Fixed(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn fixed_clock_returns_fixed_time() {
        let at = Utc.with_ymd_and_hms(2025, 3, 11, 9, 0, 0).unwrap();
        let clock = Clock::fixed(at);
        assert_eq!(clock.now(), at);
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2025, 3, 11).unwrap());
        assert!(clock.is_fixed());
    }

    #[test]
    fn fixed_clock_advances() {
        let at = Utc.with_ymd_and_hms(2025, 3, 11, 23, 30, 0).unwrap();
        let mut clock = Clock::fixed(at);
        clock.advance(Duration::hours(1));
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2025, 3, 12).unwrap());
    }

    #[test]
    fn default_clock_tracks_real_time() {
        let clock = Clock::default();
        let before = Utc::now();
        let now = clock.now();
        assert!(now >= before);
        assert!(!clock.is_fixed());
    }
}
