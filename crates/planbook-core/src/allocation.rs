//! The two session write paths' budget checks.
//!
//! Both read the plan and its engagement's capacity through a
//! [`PlanRepository`], then defer to [`validate_allocation`]. The read and the
//! caller's later write are not atomic: two writers can pass the check against
//! the same snapshot and together exceed the package.

use log::debug;
use rust_decimal::Decimal;

use crate::budget::{validate_allocation, Decision};
use crate::error::{PlanbookError, Result};
use crate::repo::{PlanAllocations, PlanRepository};

fn load<R>(repo: &R, plan_id: &str) -> Result<(PlanAllocations, Decimal)>
where
    R: PlanRepository + ?Sized,
{
    let plan = repo
        .delivery_plan_with_sessions(plan_id)?
        .ok_or_else(|| PlanbookError::not_found("Delivery plan", plan_id))?;
    let capacity = repo
        .engagement_capacity(&plan.engagement_id)?
        .ok_or_else(|| PlanbookError::not_found("Engagement", &plan.engagement_id))?;
    Ok((plan, capacity))
}

/// Budget check for a session about to be created in `plan_id`.
pub fn check_new_session<R>(repo: &R, plan_id: &str, planned_hours: Decimal) -> Result<Decision>
where
    R: PlanRepository + ?Sized,
{
    let (plan, capacity) = load(repo, plan_id)?;
    let decision = validate_allocation(planned_hours, &plan.sessions, capacity, None)?;
    debug!("new session in {plan_id}: {planned_hours}h -> {decision:?}");
    Ok(decision)
}

/// Budget check for changing `session_id`'s planned hours.
pub fn check_session_update<R>(
    repo: &R,
    plan_id: &str,
    session_id: &str,
    planned_hours: Decimal,
) -> Result<Decision>
where
    R: PlanRepository + ?Sized,
{
    let (plan, capacity) = load(repo, plan_id)?;
    let decision = validate_allocation(planned_hours, &plan.sessions, capacity, Some(session_id))?;
    debug!("session {session_id} in {plan_id}: {planned_hours}h -> {decision:?}");
    Ok(decision)
}

/// Turn a rejection into [`PlanbookError::OverBudget`] for callers that must
/// not write.
pub fn require_admit(decision: Decision) -> Result<Decision> {
    match decision {
        Decision::Reject {
            projected_total,
            capacity,
            ..
        } => Err(PlanbookError::OverBudget {
            projected_total,
            capacity,
        }),
        admit => Ok(admit),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::Allocation;
    use std::collections::HashMap;

    #[derive(Default)]
    struct FixedRepo {
        plans: HashMap<String, PlanAllocations>,
        capacities: HashMap<String, Decimal>,
    }

    impl FixedRepo {
        fn with_plan(capacity: i64, sessions: &[(&str, i64)]) -> Self {
            let mut repo = FixedRepo::default();
            repo.capacities
                .insert("engagement-1".to_string(), Decimal::from(capacity));
            repo.plans.insert(
                "plan-1".to_string(),
                PlanAllocations {
                    plan_id: "plan-1".to_string(),
                    engagement_id: "engagement-1".to_string(),
                    sessions: sessions
                        .iter()
                        .map(|(id, h)| Allocation::new(*id, Decimal::from(*h)))
                        .collect(),
                },
            );
            repo
        }
    }

    impl PlanRepository for FixedRepo {
        fn delivery_plan_with_sessions(&self, plan_id: &str) -> Result<Option<PlanAllocations>> {
            Ok(self.plans.get(plan_id).cloned())
        }

        fn engagement_capacity(&self, engagement_id: &str) -> Result<Option<Decimal>> {
            Ok(self.capacities.get(engagement_id).copied())
        }
    }

    #[test]
    fn new_session_counts_every_existing_session() {
        let repo = FixedRepo::with_plan(10, &[("s1", 4), ("s2", 5)]);
        let decision = check_new_session(&repo, "plan-1", Decimal::from(2)).unwrap();
        assert!(!decision.is_admit());
        assert_eq!(decision.projected_total(), Decimal::from(11));
    }

    #[test]
    fn update_replaces_the_edited_session() {
        let repo = FixedRepo::with_plan(10, &[("s1", 4), ("s2", 5)]);
        let decision = check_session_update(&repo, "plan-1", "s2", Decimal::from(6)).unwrap();
        assert!(decision.is_admit());
        assert_eq!(decision.projected_total(), Decimal::from(10));
    }

    #[test]
    fn missing_plan_is_not_found() {
        let repo = FixedRepo::default();
        let err = check_new_session(&repo, "plan-9", Decimal::ONE).unwrap_err();
        assert_eq!(err.to_string(), "Delivery plan not found: plan-9");
    }

    #[test]
    fn missing_engagement_is_not_found() {
        let mut repo = FixedRepo::with_plan(10, &[]);
        repo.capacities.clear();
        let err = check_new_session(&repo, "plan-1", Decimal::ONE).unwrap_err();
        assert!(matches!(err, PlanbookError::NotFound { entity: "Engagement", .. }));
    }

    #[test]
    fn rejection_becomes_the_over_budget_message() {
        let repo = FixedRepo::with_plan(8, &[("s1", 8)]);
        let decision = check_new_session(&repo, "plan-1", Decimal::new(5, 1)).unwrap();
        let err = require_admit(decision).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Total planned hours (8.5) exceeds package hours (8)"
        );
    }
}
