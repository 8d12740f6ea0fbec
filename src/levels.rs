//! XP/level math. Both directions must agree bit-for-bit so UI progress
//! bars never flicker across an off-by-one.

pub const MIN_LEVEL: i32 = 1;
pub const MAX_LEVEL: i32 = 100;

/// `level = clamp(1, 100, floor(1 + sqrt(xp / 50)))`
pub fn level_for_xp(xp_total: i64) -> i32 {
    if xp_total <= 0 {
        return MIN_LEVEL;
    }
    let level = (1.0 + (xp_total as f64 / 50.0).sqrt()).floor() as i32;
    level.clamp(MIN_LEVEL, MAX_LEVEL)
}

/// XP needed to enter level `level`: `(L - 1)^2 * 50`.
pub fn xp_for_level(level: i32) -> i64 {
    let clamped = level.clamp(MIN_LEVEL, MAX_LEVEL) as i64;
    (clamped - 1) * (clamped - 1) * 50
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct LevelProgress {
    pub level: i32,
    /// XP accumulated inside the current level.
    pub xp_into_level: i64,
    /// XP span of the current level; 0 at the level cap.
    pub xp_for_next: i64,
}

pub fn level_progress(xp_total: i64) -> LevelProgress {
    let level = level_for_xp(xp_total);
    let floor = xp_for_level(level);
    let xp_for_next = if level >= MAX_LEVEL {
        0
    } else {
        xp_for_level(level + 1) - floor
    };
    LevelProgress {
        level,
        xp_into_level: (xp_total - floor).max(0),
        xp_for_next,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_floors_at_one() {
        assert_eq!(level_for_xp(0), 1);
        assert_eq!(level_for_xp(-10), 1);
        assert_eq!(level_for_xp(49), 1);
    }

    #[test]
    fn level_boundaries_match_inverse() {
        // Entering level L takes exactly (L-1)^2 * 50 XP.
        for level in MIN_LEVEL..=MAX_LEVEL {
            let floor = xp_for_level(level);
            assert_eq!(level_for_xp(floor), level, "at floor of level {}", level);
            if level > MIN_LEVEL {
                assert_eq!(level_for_xp(floor - 1), level - 1);
            }
        }
    }

    #[test]
    fn level_is_monotone_in_xp() {
        let mut prev = level_for_xp(0);
        for xp in (0..600_000).step_by(37) {
            let level = level_for_xp(xp);
            assert!(level >= prev);
            assert!((MIN_LEVEL..=MAX_LEVEL).contains(&level));
            prev = level;
        }
    }

    #[test]
    fn level_caps_at_one_hundred() {
        assert_eq!(level_for_xp(i64::MAX / 2), 100);
        // Level 100 floor: 99^2 * 50.
        assert_eq!(xp_for_level(100), 490_050);
        assert_eq!(level_for_xp(490_050), 100);
    }

    #[test]
    fn worked_examples_from_product() {
        // 2400 XP: floor(1 + sqrt(48)) = 7.
        assert_eq!(level_for_xp(2400), 7);
        // 2600 XP: floor(1 + sqrt(52)) = 8.
        assert_eq!(level_for_xp(2600), 8);
        // +50 more stays at 8.
        assert_eq!(level_for_xp(2650), 8);
    }

    #[test]
    fn progress_accounts_for_level_span() {
        let progress = level_progress(2600);
        assert_eq!(progress.level, 8);
        assert_eq!(progress.xp_into_level, 2600 - xp_for_level(8));
        assert_eq!(progress.xp_for_next, xp_for_level(9) - xp_for_level(8));

        let capped = level_progress(1_000_000);
        assert_eq!(capped.level, 100);
        assert_eq!(capped.xp_for_next, 0);
    }
}
