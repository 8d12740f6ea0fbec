use chrono::{Datelike, Duration, NaiveDate};

use crate::models::StreakState;

/// Outcome of advancing a streak for an activity on `today`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreakAdvance {
    pub current_streak: i32,
    pub longest_streak: i32,
    pub total_active_days: i32,
    /// True when this was the first activity of a new active day.
    pub new_active_day: bool,
}

/// Apply the streak transition rules for a successful activity record.
///
/// - same day: unchanged
/// - yesterday: current += 1
/// - otherwise: current = 1
///
/// `total_active_days` increments exactly once per new active day.
pub fn advance_on_activity(state: &StreakState, today: NaiveDate) -> StreakAdvance {
    let yesterday = today - Duration::days(1);

    let (current, new_active_day) = match state.last_activity_date {
        Some(last) if last == today => (state.current_streak, false),
        Some(last) if last == yesterday => (state.current_streak + 1, true),
        _ => (1, true),
    };

    StreakAdvance {
        current_streak: current,
        longest_streak: state.longest_streak.max(current),
        total_active_days: if new_active_day {
            state.total_active_days + 1
        } else {
            state.total_active_days
        },
        new_active_day,
    }
}

/// Why a streak freeze cannot be consumed today.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreezeDenied {
    NotPremium,
    AlreadyUsedToday,
    WeeklyQuotaExhausted,
}

/// Check freeze preconditions against the freeze log. `recent_freezes` are
/// the user's logged freeze dates (any order). One freeze per calendar day,
/// one per ISO week (Monday start).
pub fn check_freeze(
    is_premium: bool,
    today: NaiveDate,
    recent_freezes: &[NaiveDate],
) -> Result<(), FreezeDenied> {
    if !is_premium {
        return Err(FreezeDenied::NotPremium);
    }
    if recent_freezes.contains(&today) {
        return Err(FreezeDenied::AlreadyUsedToday);
    }
    let week = today.iso_week();
    if recent_freezes.iter().any(|d| d.iso_week() == week) {
        return Err(FreezeDenied::WeeklyQuotaExhausted);
    }
    Ok(())
}
