pub mod allocation;
pub mod budget;
pub mod error;
pub mod hours;
pub mod ops;
pub mod repo;
pub mod rules;
pub mod store;

pub use budget::{validate_allocation, Allocation, Decision};
pub use error::{BudgetError, PlanbookError, Result};
pub use repo::{PlanAllocations, PlanRepository};
pub use store::{Settings, Store};

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// --- Types ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A sold block of consulting hours for one customer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Engagement {
    pub id: String,
    pub name: String,
    pub package_hours: Decimal,
    pub customer_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanStatus {
    #[default]
    Draft,
    Active,
    Completed,
    Archived,
}

impl PlanStatus {
    pub fn parse(s: &str) -> Option<PlanStatus> {
        match s.to_ascii_uppercase().as_str() {
            "DRAFT" => Some(PlanStatus::Draft),
            "ACTIVE" => Some(PlanStatus::Active),
            "COMPLETED" => Some(PlanStatus::Completed),
            "ARCHIVED" => Some(PlanStatus::Archived),
            _ => None,
        }
    }
}

/// A scoped plan of work against one engagement. The engagement is fixed at
/// creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryPlan {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub status: PlanStatus,
    pub engagement_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A schedulable unit of work consuming planned hours of its delivery plan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub planned_hours: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_hours: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_date: Option<NaiveDate>,
    pub delivery_plan_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub library_item_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub topic_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Reusable session template.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LibraryItem {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub default_hours: Decimal,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub topic_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
    pub id: String,
    pub name: String,
    #[serde(default = "default_topic_color")]
    pub color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

pub const DEFAULT_TOPIC_COLOR: &str = "#3b82f6";

fn default_topic_color() -> String {
    DEFAULT_TOPIC_COLOR.to_string()
}

/// Everything Planbook persists, stored as one JSON document.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlanbookData {
    #[serde(default)]
    pub customers: Vec<Customer>,
    #[serde(default)]
    pub engagements: Vec<Engagement>,
    #[serde(default)]
    pub delivery_plans: Vec<DeliveryPlan>,
    #[serde(default)]
    pub sessions: Vec<Session>,
    #[serde(default)]
    pub library_items: Vec<LibraryItem>,
    #[serde(default)]
    pub topics: Vec<Topic>,
}

// --- Ids ---

/// Next id of the form "{prefix}-{N}", one past the highest N in use.
fn next_id<'a>(prefix: &str, ids: impl Iterator<Item = &'a str>) -> String {
    let max = ids
        .filter_map(|id| {
            id.strip_prefix(prefix)
                .and_then(|rest| rest.strip_prefix('-'))
                .and_then(|n| n.parse::<u64>().ok())
        })
        .max()
        .unwrap_or(0);
    format!("{}-{}", prefix, max + 1)
}

pub fn next_customer_id(data: &PlanbookData) -> String {
    next_id("customer", data.customers.iter().map(|c| c.id.as_str()))
}

pub fn next_engagement_id(data: &PlanbookData) -> String {
    next_id("engagement", data.engagements.iter().map(|e| e.id.as_str()))
}

pub fn next_plan_id(data: &PlanbookData) -> String {
    next_id("plan", data.delivery_plans.iter().map(|p| p.id.as_str()))
}

pub fn next_session_id(data: &PlanbookData) -> String {
    next_id("session", data.sessions.iter().map(|s| s.id.as_str()))
}

pub fn next_library_item_id(data: &PlanbookData) -> String {
    next_id("library", data.library_items.iter().map(|l| l.id.as_str()))
}

pub fn next_topic_id(data: &PlanbookData) -> String {
    next_id("topic", data.topics.iter().map(|t| t.id.as_str()))
}
