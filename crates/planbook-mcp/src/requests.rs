//! Tool request types and their conversion into core operation inputs.

use chrono::NaiveDate;
use planbook_core::hours::hours_from_json;
use planbook_core::ops::{
    DeliveryPlanPatch, EngagementPatch, LibraryItemPatch, NewCustomer, NewDeliveryPlan,
    NewEngagement, NewLibraryItem, NewSession, NewTopic, SessionPatch, TopicPatch,
};
use planbook_core::{BudgetError, PlanStatus};
use rmcp::schemars;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};

/// Keeps "absent" (`None`) apart from an explicit `null` (`Some(None)`).
fn double_option<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(de).map(Some)
}

fn hours(value: Option<serde_json::Value>) -> Result<Option<Decimal>, BudgetError> {
    match value {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(v) => hours_from_json(&v).map(Some),
    }
}

/// `null` or `""` clears, anything else must be a number.
fn clearable_hours(
    value: Option<Option<serde_json::Value>>,
) -> Result<Option<Option<Decimal>>, BudgetError> {
    match value {
        None => Ok(None),
        Some(None) => Ok(Some(None)),
        Some(Some(serde_json::Value::String(s))) if s.trim().is_empty() => Ok(Some(None)),
        Some(Some(v)) => hours_from_json(&v).map(|h| Some(Some(h))),
    }
}

/// Accepts "2024-05-01" or a timestamp starting with a date ("2024-05-01T09:00:00Z").
pub fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    let day = raw.trim().split('T').next().unwrap_or_default();
    NaiveDate::parse_from_str(day, "%Y-%m-%d").map_err(|_| format!("invalid date: '{raw}'"))
}

fn optional_date(raw: Option<String>) -> Result<Option<NaiveDate>, String> {
    match raw {
        Some(s) if !s.trim().is_empty() => parse_date(&s).map(Some),
        _ => Ok(None),
    }
}

fn clearable_date(raw: Option<Option<String>>) -> Result<Option<Option<NaiveDate>>, String> {
    match raw {
        None => Ok(None),
        Some(inner) => optional_date(inner).map(Some),
    }
}

fn parse_status(raw: Option<String>) -> Result<Option<PlanStatus>, String> {
    match raw {
        Some(s) if !s.trim().is_empty() => PlanStatus::parse(s.trim())
            .map(Some)
            .ok_or_else(|| {
                format!("invalid status '{s}': expected DRAFT, ACTIVE, COMPLETED or ARCHIVED")
            }),
        _ => Ok(None),
    }
}

// --- Shared ---

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct IdRequest {
    /// ID of the record, e.g. "session-3"
    pub id: String,
}

// --- Customers ---

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct CreateCustomerRequest {
    /// Customer name
    pub name: String,
    /// Author recorded on the customer. Defaults to the configured author.
    pub created_by_name: Option<String>,
}

impl CreateCustomerRequest {
    pub fn into_input(self, default_author: Option<String>) -> NewCustomer {
        NewCustomer {
            name: self.name,
            created_by_name: self.created_by_name.or(default_author),
        }
    }
}

// --- Engagements ---

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct CreateEngagementRequest {
    /// Engagement name
    pub name: String,
    /// Hours sold in the package, as a number or numeric string (e.g. 40 or "37.5")
    pub package_hours: Option<serde_json::Value>,
    /// ID of the customer the package was sold to
    pub customer_id: String,
    /// Start date, YYYY-MM-DD
    pub start_date: Option<String>,
    /// End date, YYYY-MM-DD
    pub end_date: Option<String>,
    pub created_by_name: Option<String>,
}

impl CreateEngagementRequest {
    pub fn into_input(self, default_author: Option<String>) -> Result<NewEngagement, String> {
        Ok(NewEngagement {
            name: self.name,
            package_hours: hours(self.package_hours).map_err(|e| e.to_string())?,
            customer_id: self.customer_id,
            start_date: optional_date(self.start_date)?,
            end_date: optional_date(self.end_date)?,
            created_by_name: self.created_by_name.or(default_author),
        })
    }
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct UpdateEngagementRequest {
    /// ID of the engagement to update
    pub id: String,
    /// New name
    pub name: Option<String>,
    /// New package hours. Lowering below already planned hours is allowed.
    pub package_hours: Option<serde_json::Value>,
    /// New start date (YYYY-MM-DD); null or "" clears it
    #[serde(default, deserialize_with = "double_option")]
    pub start_date: Option<Option<String>>,
    /// New end date (YYYY-MM-DD); null or "" clears it
    #[serde(default, deserialize_with = "double_option")]
    pub end_date: Option<Option<String>>,
}

impl UpdateEngagementRequest {
    pub fn into_patch(self) -> Result<(String, EngagementPatch), String> {
        let patch = EngagementPatch {
            name: self.name,
            package_hours: hours(self.package_hours).map_err(|e| e.to_string())?,
            start_date: clearable_date(self.start_date)?,
            end_date: clearable_date(self.end_date)?,
        };
        Ok((self.id, patch))
    }
}

// --- Delivery plans ---

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct CreateDeliveryPlanRequest {
    /// Plan title
    pub title: String,
    /// "DRAFT" (default), "ACTIVE", "COMPLETED" or "ARCHIVED"
    pub status: Option<String>,
    /// ID of the engagement this plan draws hours from. Cannot be changed later.
    pub engagement_id: String,
    pub created_by_name: Option<String>,
}

impl CreateDeliveryPlanRequest {
    pub fn into_input(self, default_author: Option<String>) -> Result<NewDeliveryPlan, String> {
        Ok(NewDeliveryPlan {
            title: self.title,
            status: parse_status(self.status)?,
            engagement_id: self.engagement_id,
            created_by_name: self.created_by_name.or(default_author),
        })
    }
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct UpdateDeliveryPlanRequest {
    /// ID of the delivery plan to update
    pub id: String,
    /// New title
    pub title: Option<String>,
    /// New status: "DRAFT", "ACTIVE", "COMPLETED" or "ARCHIVED"
    pub status: Option<String>,
}

impl UpdateDeliveryPlanRequest {
    pub fn into_patch(self) -> Result<(String, DeliveryPlanPatch), String> {
        let patch = DeliveryPlanPatch {
            title: self.title,
            status: parse_status(self.status)?,
        };
        Ok((self.id, patch))
    }
}

// --- Sessions ---

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct CreateSessionRequest {
    /// Session title. Optional when library_item_id is given.
    #[serde(default)]
    pub title: String,
    pub description: Option<String>,
    /// Planned hours, as a number or numeric string. Defaults to the library
    /// item's hours when library_item_id is given.
    pub planned_hours: Option<serde_json::Value>,
    /// Hours actually spent, if already delivered
    pub actual_hours: Option<serde_json::Value>,
    /// Scheduled date, YYYY-MM-DD
    pub scheduled_date: Option<String>,
    /// ID of the delivery plan the session belongs to
    pub delivery_plan_id: String,
    /// Library item to create the session from. Its title, description, hours
    /// and topics fill any field left out.
    pub library_item_id: Option<String>,
    /// Topic IDs to tag the session with
    pub topic_ids: Option<Vec<String>>,
    pub created_by_name: Option<String>,
}

impl CreateSessionRequest {
    /// `template` is the session prefilled from the library item, if any.
    pub fn into_input(
        self,
        template: Option<NewSession>,
        default_author: Option<String>,
    ) -> Result<NewSession, String> {
        let base = template.unwrap_or_default();
        let planned_hours = hours(self.planned_hours).map_err(|e| e.to_string())?;
        let actual_hours = hours(self.actual_hours).map_err(|e| e.to_string())?;
        Ok(NewSession {
            title: if self.title.trim().is_empty() {
                base.title
            } else {
                self.title
            },
            description: self.description.or(base.description),
            planned_hours: planned_hours.or(base.planned_hours),
            actual_hours,
            scheduled_date: optional_date(self.scheduled_date)?,
            delivery_plan_id: self.delivery_plan_id,
            library_item_id: self.library_item_id,
            topic_ids: self.topic_ids.unwrap_or(base.topic_ids),
            created_by_name: self.created_by_name.or(default_author),
        })
    }
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct UpdateSessionRequest {
    /// ID of the session to update
    pub id: String,
    pub title: Option<String>,
    /// New description; null clears it
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    /// New planned hours. Re-checked against the package; omit to skip the check.
    pub planned_hours: Option<serde_json::Value>,
    /// Actual hours; null or "" clears them
    #[serde(default, deserialize_with = "double_option")]
    pub actual_hours: Option<Option<serde_json::Value>>,
    /// Scheduled date (YYYY-MM-DD); null or "" clears it
    #[serde(default, deserialize_with = "double_option")]
    pub scheduled_date: Option<Option<String>>,
    /// Replaces the session's topics
    pub topic_ids: Option<Vec<String>>,
}

impl UpdateSessionRequest {
    pub fn into_patch(self) -> Result<(String, SessionPatch), String> {
        let patch = SessionPatch {
            title: self.title,
            description: self.description,
            planned_hours: hours(self.planned_hours).map_err(|e| e.to_string())?,
            actual_hours: clearable_hours(self.actual_hours).map_err(|e| e.to_string())?,
            scheduled_date: clearable_date(self.scheduled_date)?,
            topic_ids: self.topic_ids,
        };
        Ok((self.id, patch))
    }
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct CheckAllocationRequest {
    /// Delivery plan to check against
    pub delivery_plan_id: String,
    /// Proposed planned hours for the session
    pub planned_hours: serde_json::Value,
    /// When resizing an existing session, its ID, so its current hours are not counted twice
    pub session_id: Option<String>,
}

// --- Library ---

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct CreateLibraryItemRequest {
    /// Template title
    pub title: String,
    pub description: Option<String>,
    /// Default hours for sessions created from this template
    pub default_hours: Option<serde_json::Value>,
    /// Topic IDs
    pub topic_ids: Option<Vec<String>>,
    pub created_by_name: Option<String>,
}

impl CreateLibraryItemRequest {
    pub fn into_input(self, default_author: Option<String>) -> Result<NewLibraryItem, String> {
        Ok(NewLibraryItem {
            title: self.title,
            description: self.description,
            default_hours: hours(self.default_hours).map_err(|e| e.to_string())?,
            topic_ids: self.topic_ids.unwrap_or_default(),
            created_by_name: self.created_by_name.or(default_author),
        })
    }
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct UpdateLibraryItemRequest {
    /// ID of the library item to update
    pub id: String,
    pub title: Option<String>,
    /// New description; null clears it
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    pub default_hours: Option<serde_json::Value>,
    /// Replaces the item's topics
    pub topic_ids: Option<Vec<String>>,
}

impl UpdateLibraryItemRequest {
    pub fn into_patch(self) -> Result<(String, LibraryItemPatch), String> {
        let patch = LibraryItemPatch {
            title: self.title,
            description: self.description,
            default_hours: hours(self.default_hours).map_err(|e| e.to_string())?,
            topic_ids: self.topic_ids,
        };
        Ok((self.id, patch))
    }
}

// --- Topics ---

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct CreateTopicRequest {
    /// Topic name
    pub name: String,
    /// Display color, e.g. "#ef4444". Defaults to "#3b82f6".
    pub color: Option<String>,
    pub created_by_name: Option<String>,
}

impl CreateTopicRequest {
    pub fn into_input(self, default_author: Option<String>) -> NewTopic {
        NewTopic {
            name: self.name,
            color: self.color,
            created_by_name: self.created_by_name.or(default_author),
        }
    }
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct UpdateTopicRequest {
    /// ID of the topic to update
    pub id: String,
    pub name: Option<String>,
    pub color: Option<String>,
}

impl UpdateTopicRequest {
    pub fn into_patch(self) -> (String, TopicPatch) {
        (
            self.id,
            TopicPatch {
                name: self.name,
                color: self.color,
            },
        )
    }
}
