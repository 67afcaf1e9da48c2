//! Store error types and result alias.
//!
//! All store operations return [`StoreResult`]. The variants map directly to
//! the protocol-visible failure modes: missing required fields, duplicate
//! identifiers or fingerprints, explicit lookup misses, and key-material
//! encoding problems.
//!
//! # Example
//!
//! ```
//! use acme_memstore::error::{StoreError, StoreResult};
//!
//! fn lookup(serial: &str) -> StoreResult<()> {
//!     Err(StoreError::not_found(serial))
//! }
//! ```

use std::sync::Arc;

use thiserror::Error;

use crate::entities::AccountHandle;

/// A boxed error type for source chain tracking.
pub type BoxError = Arc<dyn std::error::Error + Send + Sync>;

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during store operations.
///
/// Plain absence on simple ID lookups is modeled as `Option`, not an error;
/// [`StoreError::NotFound`] is reserved for lookups where absence indicates
/// a caller logic error (serial→order, ARI serial→certificate).
///
/// # Non-exhaustive
///
/// This enum is marked `#[non_exhaustive]` — new variants may be added in
/// future minor releases without a semver-breaking change.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    /// A required field was empty or missing.
    #[error("validation failed: {message}")]
    Validation {
        /// Description of the rejected input.
        message: String,
    },

    /// A duplicate ID, key fingerprint, or EAB key ID.
    ///
    /// Insertion conflicts leave the store unchanged.
    #[error("conflict: {message}")]
    Conflict {
        /// Description of the conflicting entry.
        message: String,
    },

    /// An explicit lookup miss.
    #[error("not found: {key}")]
    NotFound {
        /// The key that was not found.
        key: String,
    },

    /// A key change would collide with another account's key.
    ///
    /// The only payload-bearing variant: it carries a handle to the account
    /// already holding the requested key so callers can report the collision.
    #[error("new public key is already in use by account {account_id}")]
    KeyConflict {
        /// ID of the account already holding the key.
        account_id: String,
        /// Handle to that account.
        account: AccountHandle,
    },

    /// Malformed encoded input (e.g. an EAB key that is not valid unpadded
    /// base64url).
    #[error("decode failed: {message}")]
    Decode {
        /// Description of the decode failure.
        message: String,
        /// The underlying decoder error.
        #[source]
        source: Option<BoxError>,
    },

    /// Key material that cannot be canonically encoded for fingerprinting.
    #[error("key cannot be canonically encoded: {message}")]
    Encoding {
        /// Description of the encoding failure.
        message: String,
    },
}

impl StoreError {
    /// Creates a new `Validation` error with the given message.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation { message: message.into() }
    }

    /// Creates a new `Conflict` error with the given message.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict { message: message.into() }
    }

    /// Creates a new `NotFound` error for the given key.
    #[must_use]
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    /// Creates a new `KeyConflict` error for the account already holding
    /// the key.
    #[must_use]
    pub fn key_conflict(account: AccountHandle) -> Self {
        let account_id = account.read().id.clone();
        Self::KeyConflict { account_id, account }
    }

    /// Creates a new `Decode` error with the given message.
    #[must_use]
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode { message: message.into(), source: None }
    }

    /// Creates a new `Decode` error with a message and source error.
    #[must_use]
    pub fn decode_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Decode { message: message.into(), source: Some(Arc::new(source)) }
    }

    /// Creates a new `Encoding` error with the given message.
    #[must_use]
    pub fn encoding(message: impl Into<String>) -> Self {
        Self::Encoding { message: message.into() }
    }
}
