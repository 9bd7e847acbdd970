use proptest::prelude::*;

use tokentrust_types::{RiskScore, RiskThresholds, Timestamp};

proptest! {
    /// Timestamp ordering: new(a) <= new(b) iff a <= b.
    #[test]
    fn timestamp_ordering(a in 0u64..u64::MAX, b in 0u64..u64::MAX) {
        let ta = Timestamp::new(a);
        let tb = Timestamp::new(b);
        prop_assert_eq!(ta <= tb, a <= b);
        prop_assert_eq!(ta == tb, a == b);
    }

    /// elapsed_since(now) = now - self, saturating at zero.
    #[test]
    fn timestamp_elapsed_since(base in 0u64..1_000_000, offset in 0u64..1_000_000) {
        let t = Timestamp::new(base);
        prop_assert_eq!(t.elapsed_since(Timestamp::new(base + offset)), offset);
        prop_assert_eq!(Timestamp::new(base + offset).elapsed_since(t), 0);
    }

    /// A deadline `d = start + window` has passed exactly when now > d.
    #[test]
    fn deadline_passed_matches_arithmetic(
        start in 0u64..1_000_000,
        window in 1u64..100_000,
        at in 0u64..2_000_000,
    ) {
        let deadline = Timestamp::new(start).plus_secs(window);
        prop_assert_eq!(deadline.is_passed(Timestamp::new(at)), at > start + window);
    }

    /// RiskScore accepts exactly 0..=100.
    #[test]
    fn risk_score_range(raw in -1_000i64..1_000) {
        prop_assert_eq!(RiskScore::new(raw).is_some(), (0..=100).contains(&raw));
    }

    /// Any valid threshold pair yields contiguous, non-overlapping tier bounds.
    #[test]
    fn valid_thresholds_are_contiguous(approve_max in 0u8..98, gap in 1u8..50) {
        let medium_max = approve_max.saturating_add(gap);
        let t = RiskThresholds { approve_max, medium_max };
        if medium_max < 100 {
            prop_assert!(t.validate().is_ok());
            prop_assert_eq!(t.medium_min(), t.approve_max + 1);
            prop_assert_eq!(t.high_min(), t.medium_max + 1);
            prop_assert!(t.high_min() <= 100);
        } else {
            prop_assert!(t.validate().is_err());
        }
    }
}
