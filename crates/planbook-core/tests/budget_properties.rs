//! Property tests for the hour budget validator.

use planbook_core::{validate_allocation, Allocation, BudgetError, Decision};
use proptest::prelude::*;
use rust_decimal::Decimal;

/// Hours with two decimal places, up to 1000h.
fn hours() -> impl Strategy<Value = Decimal> {
    (0i64..=100_000).prop_map(|cents| Decimal::new(cents, 2))
}

fn allocations() -> impl Strategy<Value = Vec<Allocation>> {
    prop::collection::vec(hours(), 0..12).prop_map(|hs| {
        hs.into_iter()
            .enumerate()
            .map(|(i, h)| Allocation::new(format!("session-{}", i + 1), h))
            .collect()
    })
}

fn total(allocs: &[Allocation]) -> Decimal {
    allocs.iter().map(|a| a.planned_hours).sum()
}

proptest! {
    /// Admit exactly when the existing total plus the candidate fits.
    #[test]
    fn admits_iff_total_fits(existing in allocations(), candidate in hours(), capacity in hours()) {
        let decision = validate_allocation(candidate, &existing, capacity, None).unwrap();
        let projected = total(&existing) + candidate;
        prop_assert_eq!(decision.is_admit(), projected <= capacity);
        prop_assert_eq!(decision.projected_total(), projected);
        match decision {
            Decision::Admit { remaining, .. } => prop_assert_eq!(remaining, capacity - projected),
            Decision::Reject { overage, capacity: c, .. } => {
                prop_assert_eq!(c, capacity);
                prop_assert!(overage > Decimal::ZERO);
                prop_assert_eq!(overage, projected - capacity);
            }
        }
    }

    /// Filling the remaining capacity exactly is always admitted with nothing left.
    #[test]
    fn exact_fill_is_admitted(existing in allocations(), headroom in hours()) {
        let capacity = total(&existing) + headroom;
        let decision = validate_allocation(headroom, &existing, capacity, None).unwrap();
        prop_assert_eq!(
            decision,
            Decision::Admit { projected_total: capacity, remaining: Decimal::ZERO }
        );
    }

    /// Same inputs, same answer.
    #[test]
    fn repeated_calls_agree(existing in allocations(), candidate in hours(), capacity in hours()) {
        let first = validate_allocation(candidate, &existing, capacity, None);
        let second = validate_allocation(candidate, &existing, capacity, None);
        prop_assert_eq!(first, second);
    }

    /// Removing a session never turns an admit into a reject.
    #[test]
    fn removal_never_breaks_an_admit(
        existing in allocations(),
        candidate in hours(),
        capacity in hours(),
        pick in any::<prop::sample::Index>(),
    ) {
        prop_assume!(!existing.is_empty());
        let before = validate_allocation(candidate, &existing, capacity, None).unwrap();
        let mut fewer = existing.clone();
        fewer.remove(pick.index(existing.len()));
        let after = validate_allocation(candidate, &fewer, capacity, None).unwrap();
        if before.is_admit() {
            prop_assert!(after.is_admit());
        }
        prop_assert!(after.projected_total() <= before.projected_total());
    }

    /// Excluding a session is the same as checking without it.
    #[test]
    fn exclude_matches_removal(
        existing in allocations(),
        candidate in hours(),
        capacity in hours(),
        pick in any::<prop::sample::Index>(),
    ) {
        prop_assume!(!existing.is_empty());
        let idx = pick.index(existing.len());
        let excluded = existing[idx].id.clone();
        let mut without = existing.clone();
        without.remove(idx);

        let a = validate_allocation(candidate, &existing, capacity, Some(&excluded)).unwrap();
        let b = validate_allocation(candidate, &without, capacity, None).unwrap();
        prop_assert_eq!(a, b);
    }

    /// Any negative candidate is refused whatever else is passed.
    #[test]
    fn negative_candidate_is_invalid(
        existing in allocations(),
        cents in 1i64..100_000,
        capacity in hours(),
    ) {
        let result = validate_allocation(Decimal::new(-cents, 2), &existing, capacity, None);
        prop_assert!(matches!(result, Err(BudgetError::InvalidInput(_))));
    }
}
