//! Unified error taxonomy for commerce operations.
//!
//! Business-rule failures (empty cart, unavailable product, insufficient
//! stock) are expected conditions the client can correct, so they classify
//! as 4xx. Unexpected failures classify as 5xx, are logged with full
//! context, and never leak internals through [`CommerceError::client_message`].

use thiserror::Error;

use crate::db::RepositoryError;

/// Application-level error type for commerce operations.
#[derive(Debug, Error)]
pub enum CommerceError {
    /// Malformed input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Order placement with no explicit items and an empty cart.
    #[error("cart is empty")]
    EmptyCart,

    /// Product exists but is not currently sellable.
    #[error("product {name} is not available")]
    ProductUnavailable {
        /// Product display name.
        name: String,
    },

    /// Requested quantity exceeds current stock.
    #[error("insufficient stock for product {name}")]
    InsufficientStock {
        /// Product display name.
        name: String,
    },

    /// The actor lacks the required permission or does not own the resource.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Database operation failed.
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// Unexpected internal failure.
    #[error("internal error: {0}")]
    System(String),
}

impl CommerceError {
    /// HTTP-style status classification for the transport layer.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 422,
            Self::EmptyCart | Self::ProductUnavailable { .. } | Self::InsufficientStock { .. } => {
                400
            }
            Self::Forbidden(_) => 403,
            Self::NotFound(_) => 404,
            Self::Repository(err) => match err {
                RepositoryError::NotFound => 404,
                RepositoryError::Conflict(_) => 409,
                RepositoryError::Database(_) | RepositoryError::DataCorruption(_) => 500,
            },
            Self::System(_) => 500,
        }
    }

    /// Whether the error is a client-correctable (4xx) condition.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        self.status_code() < 500
    }

    /// Message safe to show to the client.
    ///
    /// Server-side failures get a generic message; the full error is logged
    /// where it occurred.
    #[must_use]
    pub fn client_message(&self) -> String {
        if self.is_client_error() {
            match self {
                Self::Repository(RepositoryError::NotFound) => "not found".to_string(),
                Self::Repository(RepositoryError::Conflict(msg)) => msg.clone(),
                other => other.to_string(),
            }
        } else {
            "internal server error".to_string()
        }
    }
}

/// Result type alias for `CommerceError`.
pub type Result<T> = std::result::Result<T, CommerceError>;
