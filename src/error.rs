use thiserror::Error;

/// Returned when promoting a `WeakPtr` whose object has already been destroyed.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Weak pointer has expired: strong count is zero")]
pub struct ExpiredReferenceError;
