//! DOMException error helper - WebCodecs spec compliant error handling
//!
//! Provides spec-compliant error handling following W3C DOMException conventions.
//! See: https://developer.mozilla.org/en-US/docs/Web/API/DOMException
//!
//! Every public fallible operation in this crate returns a [`DOMException`]
//! whose `name()` is one of the W3C error families. Callers (and the test
//! suite) match on the name, so the names must be preserved verbatim:
//!
//! - `InvalidStateError` - for closed objects or wrong state
//! - `NotSupportedError` - for unsupported codecs/configs
//! - `EncodingError` - for encoding/decoding failures
//! - `DataError` - for invalid data format
//! - `AbortError` - for aborted operations
//! - `TypeError` - for missing/invalid arguments
//! - `ConstraintError` - for constraint violations

use thiserror::Error;

/// DOMException error names per WebCodecs spec
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(clippy::enum_variant_names)]
pub enum DOMExceptionName {
  /// Encoding or decoding operation failed
  EncodingError,
  /// Unsupported codec or configuration
  NotSupportedError,
  /// Wrong state (e.g., operating on closed object)
  InvalidStateError,
  /// Invalid data format
  DataError,
  /// Operation was aborted
  AbortError,
  /// Generic type error
  TypeError,
  /// Constraint not satisfied
  ConstraintError,
}

impl DOMExceptionName {
  pub fn as_str(&self) -> &'static str {
    match self {
      DOMExceptionName::EncodingError => "EncodingError",
      DOMExceptionName::NotSupportedError => "NotSupportedError",
      DOMExceptionName::InvalidStateError => "InvalidStateError",
      DOMExceptionName::DataError => "DataError",
      DOMExceptionName::AbortError => "AbortError",
      DOMExceptionName::TypeError => "TypeError",
      DOMExceptionName::ConstraintError => "ConstraintError",
    }
  }
}

/// A structured error record in the DOMException shape: a well-known name
/// plus a human-readable message.
///
/// Delivered synchronously as the `Err` arm of public methods and
/// asynchronously through codec error callbacks.
#[derive(Debug, Clone, Error)]
#[error("{}: {}", .name.as_str(), .message)]
pub struct DOMException {
  name: DOMExceptionName,
  message: String,
}

impl DOMException {
  pub fn new(name: DOMExceptionName, message: impl Into<String>) -> Self {
    Self {
      name,
      message: message.into(),
    }
  }

  /// The DOMException name, e.g. `NotSupportedError`
  pub fn name(&self) -> DOMExceptionName {
    self.name
  }

  /// The error message without the name prefix
  pub fn message(&self) -> &str {
    &self.message
  }

  pub fn is(&self, name: DOMExceptionName) -> bool {
    self.name == name
  }
}

/// Result alias used throughout the crate
pub type Result<T, E = DOMException> = std::result::Result<T, E>;

/// Helper to create NotSupportedError for unsupported codecs/configs
pub fn not_supported_error(message: &str) -> DOMException {
  DOMException::new(DOMExceptionName::NotSupportedError, message)
}

/// Helper to create InvalidStateError for closed objects or wrong state
pub fn invalid_state_error(message: &str) -> DOMException {
  DOMException::new(DOMExceptionName::InvalidStateError, message)
}

/// Helper to create EncodingError for encoding/decoding failures
pub fn encoding_error(message: &str) -> DOMException {
  DOMException::new(DOMExceptionName::EncodingError, message)
}

/// Helper to create DataError for invalid data format
pub fn data_error(message: &str) -> DOMException {
  DOMException::new(DOMExceptionName::DataError, message)
}

/// Helper to create AbortError for aborted operations
pub fn abort_error(message: &str) -> DOMException {
  DOMException::new(DOMExceptionName::AbortError, message)
}

/// Helper to create TypeError for type-related errors
///
/// Use for invalid argument types or missing required fields.
pub fn type_error(message: &str) -> DOMException {
  DOMException::new(DOMExceptionName::TypeError, message)
}

/// Helper to create ConstraintError for constraint violations
pub fn constraint_error(message: &str) -> DOMException {
  DOMException::new(DOMExceptionName::ConstraintError, message)
}
