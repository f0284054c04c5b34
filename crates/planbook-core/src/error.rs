use rust_decimal::Decimal;
use thiserror::Error;

/// Raised by the hour helpers and the budget validator for malformed hours.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BudgetError {
    #[error("invalid hours: {0}")]
    InvalidInput(String),
}

#[derive(Debug, Error)]
pub enum PlanbookError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Carries the full user-facing message, e.g. "Name is required".
    #[error("{0}")]
    MissingFields(&'static str),

    #[error(transparent)]
    Hours(#[from] BudgetError),

    #[error("Total planned hours ({projected_total}) exceeds package hours ({capacity})")]
    OverBudget {
        projected_total: Decimal,
        capacity: Decimal,
    },

    #[error("storage: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed data: {0}")]
    Json(#[from] serde_json::Error),
}

impl PlanbookError {
    pub fn not_found(entity: &'static str, id: &str) -> Self {
        PlanbookError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PlanbookError>;
