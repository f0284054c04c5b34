use rust_decimal::Decimal;

use crate::budget::Allocation;
use crate::error::Result;
use crate::PlanbookData;

/// A delivery plan's current allocations, read as one snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanAllocations {
    pub plan_id: String,
    pub engagement_id: String,
    pub sessions: Vec<Allocation>,
}

/// The reads a budget check needs. `Ok(None)` means the record does not exist.
pub trait PlanRepository {
    fn delivery_plan_with_sessions(&self, plan_id: &str) -> Result<Option<PlanAllocations>>;

    fn engagement_capacity(&self, engagement_id: &str) -> Result<Option<Decimal>>;
}

impl PlanRepository for PlanbookData {
    fn delivery_plan_with_sessions(&self, plan_id: &str) -> Result<Option<PlanAllocations>> {
        let Some(plan) = self.delivery_plans.iter().find(|p| p.id == plan_id) else {
            return Ok(None);
        };
        let sessions = self
            .sessions
            .iter()
            .filter(|s| s.delivery_plan_id == plan_id)
            .map(|s| Allocation::new(s.id.clone(), s.planned_hours))
            .collect();
        Ok(Some(PlanAllocations {
            plan_id: plan.id.clone(),
            engagement_id: plan.engagement_id.clone(),
            sessions,
        }))
    }

    fn engagement_capacity(&self, engagement_id: &str) -> Result<Option<Decimal>> {
        Ok(self
            .engagements
            .iter()
            .find(|e| e.id == engagement_id)
            .map(|e| e.package_hours))
    }
}
