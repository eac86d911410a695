//! The uniform result envelope returned by every core operation.
//!
//! Every repository and orchestrator call terminates in a [`Return<T>`];
//! nothing crosses a component boundary as a raw error. Internal failures
//! keep their source error in a diagnostics-only field that is never
//! serialized and never shown to external callers.

use serde::Serialize;

/// Broad classification of an [`ErrorCode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// No error.
    None,
    /// The requested row does not exist (or is soft-deleted).
    NotFound,
    /// The operation conflicts with current state (stock, eligibility).
    Conflict,
    /// A bounded wait expired.
    Timeout,
    /// Unexpected storage or internal failure.
    Internal,
}

/// Structured error code carried by every envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    #[default]
    Ok,
    ProductNotFound,
    CartNotFound,
    DiscountNotFound,
    InvalidQuantity,
    InsufficientStock,
    DiscountNotApplicable,
    LockTimeout,
    InternalServerError,
}

impl ErrorCode {
    /// Map the code onto the error taxonomy.
    pub fn class(&self) -> ErrorClass {
        match self {
            ErrorCode::Ok => ErrorClass::None,
            ErrorCode::ProductNotFound
            | ErrorCode::CartNotFound
            | ErrorCode::DiscountNotFound => ErrorClass::NotFound,
            ErrorCode::InvalidQuantity
            | ErrorCode::InsufficientStock
            | ErrorCode::DiscountNotApplicable => ErrorClass::Conflict,
            ErrorCode::LockTimeout => ErrorClass::Timeout,
            ErrorCode::InternalServerError => ErrorClass::Internal,
        }
    }
}

/// Uniform outcome wrapper.
///
/// `success` is true only when the operation completed and produced a
/// meaningful result; a not-found lookup is a failure with a
/// `NotFound`-class code, not a panic or a raw error. `total_records`
/// reflects the unpaged row count for list reads.
#[derive(Debug, Serialize)]
pub struct Return<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error_code: ErrorCode,
    /// Original failure detail, retained for diagnostics only.
    #[serde(skip)]
    pub internal_error: Option<anyhow::Error>,
    pub total_records: i64,
}

impl<T> Return<T> {
    /// Successful result carrying one record.
    pub fn ok(data: T) -> Self {
        Self::ok_with_total(data, 1)
    }

    /// Successful result with an explicit record count.
    pub fn ok_with_total(data: T, total_records: i64) -> Self {
        Self {
            success: true,
            data: Some(data),
            error_code: ErrorCode::Ok,
            internal_error: None,
            total_records,
        }
    }

    /// Expected failure with a structured code.
    pub fn err(error_code: ErrorCode) -> Self {
        Self {
            success: false,
            data: None,
            error_code,
            internal_error: None,
            total_records: 0,
        }
    }

    /// Expected failure that also retains its source error for logging.
    pub fn err_with_source(error_code: ErrorCode, source: anyhow::Error) -> Self {
        Self {
            internal_error: Some(source),
            ..Self::err(error_code)
        }
    }

    /// Unexpected internal failure. The source error is kept for
    /// diagnostics and a generic code is exposed.
    pub fn internal(source: anyhow::Error) -> Self {
        Self::err_with_source(ErrorCode::InternalServerError, source)
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    /// The taxonomy class of the carried code.
    pub fn error_class(&self) -> ErrorClass {
        self.error_code.class()
    }

    /// Consume the envelope, returning the payload if present.
    pub fn into_data(self) -> Option<T> {
        self.data
    }

    /// Rebuild this envelope around a different payload type, keeping the
    /// failure details. Only valid for failures.
    pub fn cast_failure<U>(self) -> Return<U> {
        Return {
            success: false,
            data: None,
            error_code: self.error_code,
            internal_error: self.internal_error,
            total_records: 0,
        }
    }
}
