//! Error taxonomy for the kiosk core.
//!
//! Pricing, cart and customization never fail; everything here comes from
//! order submission, the REST boundary, reviews, or local configuration.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum KioskError {
    #[error("Cart is empty")]
    EmptyCart,

    #[error("An order submission is already in progress")]
    SubmissionInProgress,

    #[error("Submission {0} is not the one in flight")]
    UnknownSubmission(uuid::Uuid),

    #[error("No employee signed in and no default employee configured")]
    MissingEmployee,

    #[error("A signed-in customer is required")]
    MissingCustomer,

    #[error("Review belongs to another customer")]
    NotReviewOwner,

    #[error("Invalid review: {0}")]
    InvalidReview(String),

    #[error("{0}")]
    Network(String),

    #[error("{message} (HTTP {status})")]
    Http { status: u16, message: String },

    #[error("Invalid response from store backend: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Local storage error: {0}")]
    Storage(String),
}

impl KioskError {
    /// True when the failure happened before the backend could answer,
    /// i.e. the order may be retried without risk of a duplicate.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, KioskError::Network(_))
    }
}

impl From<rusqlite::Error> for KioskError {
    fn from(e: rusqlite::Error) -> Self {
        KioskError::Storage(e.to_string())
    }
}

pub type KioskResult<T> = Result<T, KioskError>;
