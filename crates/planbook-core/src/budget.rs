//! Hour budget validation.
//!
//! A delivery plan's sessions draw planned hours from the package bought on
//! its engagement. [`validate_allocation`] decides whether one more allocation
//! (a new session, or a new value for an existing one) still fits. It only
//! computes: loading the plan and persisting the result belong to the caller.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::BudgetError;
use crate::hours;

/// One session's share of a delivery plan's budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Allocation {
    pub id: String,
    pub planned_hours: Decimal,
}

impl Allocation {
    pub fn new(id: impl Into<String>, planned_hours: Decimal) -> Self {
        Self {
            id: id.into(),
            planned_hours,
        }
    }
}

/// Outcome of a budget check. Going over budget is an expected answer, not an
/// error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision")]
pub enum Decision {
    #[serde(rename = "admit", rename_all = "camelCase")]
    Admit {
        projected_total: Decimal,
        remaining: Decimal,
    },
    #[serde(rename = "reject", rename_all = "camelCase")]
    Reject {
        projected_total: Decimal,
        capacity: Decimal,
        overage: Decimal,
    },
}

impl Decision {
    pub fn is_admit(&self) -> bool {
        matches!(self, Decision::Admit { .. })
    }

    pub fn projected_total(&self) -> Decimal {
        match self {
            Decision::Admit {
                projected_total, ..
            }
            | Decision::Reject {
                projected_total, ..
            } => *projected_total,
        }
    }
}

/// Check `candidate` hours against `capacity`.
///
/// `exclude_id` names the session being edited so its current allocation is
/// replaced by the candidate instead of counted twice. Reaching the capacity
/// exactly is admitted; only a strictly larger total is rejected.
pub fn validate_allocation(
    candidate: Decimal,
    existing: &[Allocation],
    capacity: Decimal,
    exclude_id: Option<&str>,
) -> Result<Decision, BudgetError> {
    let candidate = hours::non_negative(candidate)?;

    let committed = hours::sum_hours(
        existing
            .iter()
            .filter(|a| exclude_id != Some(a.id.as_str()))
            .map(|a| a.planned_hours),
    )?;
    let projected_total = hours::add_hours(committed, candidate)?;

    if projected_total > capacity {
        Ok(Decision::Reject {
            projected_total,
            capacity,
            overage: projected_total - capacity,
        })
    } else {
        Ok(Decision::Admit {
            projected_total,
            remaining: capacity - projected_total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn h(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn allocs(items: &[(&str, &str)]) -> Vec<Allocation> {
        items.iter().map(|(id, v)| Allocation::new(*id, h(v))).collect()
    }

    #[test]
    fn exact_capacity_is_admitted() {
        let existing = allocs(&[("a", "4.00"), ("b", "6.00")]);
        let decision = validate_allocation(h("0.00"), &existing, h("10.00"), None).unwrap();
        assert_eq!(
            decision,
            Decision::Admit {
                projected_total: h("10.00"),
                remaining: Decimal::ZERO,
            }
        );
    }

    #[test]
    fn one_cent_over_is_rejected() {
        let existing = allocs(&[("a", "9.99")]);
        let decision = validate_allocation(h("0.02"), &existing, h("10.00"), None).unwrap();
        match decision {
            Decision::Reject {
                projected_total,
                capacity,
                overage,
            } => {
                assert_eq!(projected_total, h("10.01"));
                assert_eq!(capacity, h("10.00"));
                assert_eq!(overage, h("0.01"));
                assert_eq!(projected_total.to_string(), "10.01");
            }
            other => panic!("expected reject, got {other:?}"),
        }
    }

    #[test]
    fn excluded_session_is_not_double_counted() {
        let existing = allocs(&[("a", "3.00"), ("b", "4.00")]);

        let with_exclude = validate_allocation(h("2.00"), &existing, h("5.00"), Some("b")).unwrap();
        assert!(with_exclude.is_admit());
        assert_eq!(with_exclude.projected_total(), h("5.00"));

        let without = validate_allocation(h("2.00"), &existing, h("5.00"), None).unwrap();
        assert!(!without.is_admit());
        assert_eq!(without.projected_total(), h("9.00"));
    }

    #[test]
    fn unknown_exclude_id_changes_nothing() {
        let existing = allocs(&[("a", "1")]);
        let decision = validate_allocation(h("1"), &existing, h("2"), Some("zzz")).unwrap();
        assert_eq!(decision.projected_total(), h("2"));
    }

    #[test]
    fn negative_candidate_is_invalid() {
        let err = validate_allocation(h("-0.5"), &[], h("100"), None).unwrap_err();
        assert!(matches!(err, BudgetError::InvalidInput(_)));
    }

    #[test]
    fn binary_float_trap_does_not_flip_the_boundary() {
        // 0.1 + 0.2 as f64 is 0.30000000000000004
        let existing = allocs(&[("a", "0.1"), ("b", "0.2")]);
        let decision = validate_allocation(h("0"), &existing, h("0.3"), None).unwrap();
        assert!(decision.is_admit());
    }

    #[test]
    fn a_total_that_would_round_is_invalid_not_admitted() {
        // 10^27 + 0.01 needs 30 digits; rounded it would equal the capacity
        let e27 = Decimal::from_i128_with_scale(10i128.pow(27), 0);
        let existing = vec![Allocation::new("a", e27)];
        let err = validate_allocation(h("0.01"), &existing, e27, None).unwrap_err();
        assert!(matches!(err, BudgetError::InvalidInput(_)));
    }

    #[test]
    fn smallest_representable_overage_is_rejected() {
        let existing = allocs(&[("a", "1")]);
        let candidate = h("0.0000000000000000000000000001");
        let decision = validate_allocation(candidate, &existing, h("1"), None).unwrap();
        assert!(!decision.is_admit());

        // one more place cannot be held and is refused at parse time
        assert!(crate::hours::parse_hours("0.00000000000000000000000000001").is_err());
    }

    #[test]
    fn decisions_serialize_with_a_tag() {
        let decision = validate_allocation(h("1.5"), &[], h("2"), None).unwrap();
        let json = serde_json::to_value(&decision).unwrap();
        assert_eq!(json["decision"], "admit");
        assert_eq!(json["projectedTotal"], "1.5");
        assert_eq!(json["remaining"], "0.5");
    }
}
