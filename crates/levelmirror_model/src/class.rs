//! Failure taxonomy shared by every crate in the workspace.

use std::fmt;

/// Coarse class of a fatal failure.
///
/// Every error type in the workspace maps onto one of these; the binary turns
/// the class into a process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureClass {
    /// Disallowed origin or content kind.
    PolicyViolation,
    /// Timeout, connection error or non-success status, after retries.
    NetworkFailure,
    /// Content-type, MD5 or public-key pin mismatch, or a missing certificate.
    IntegrityFailure,
    /// No tail anchor within the configured page bound.
    AlgorithmicDrift,
    /// Constraint violation or other database fault.
    DatabaseFailure,
    /// Another run holds the singleton lock.
    LockHeld,
}

impl FailureClass {
    /// Process exit code for this class.
    pub fn exit_code(self) -> u8 {
        match self {
            FailureClass::PolicyViolation => 2,
            FailureClass::NetworkFailure => 3,
            FailureClass::IntegrityFailure => 4,
            FailureClass::AlgorithmicDrift => 5,
            FailureClass::DatabaseFailure => 6,
            FailureClass::LockHeld => 7,
        }
    }
}

impl fmt::Display for FailureClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureClass::PolicyViolation => "policy violation",
            FailureClass::NetworkFailure => "network failure",
            FailureClass::IntegrityFailure => "integrity failure",
            FailureClass::AlgorithmicDrift => "algorithmic drift",
            FailureClass::DatabaseFailure => "database failure",
            FailureClass::LockHeld => "lock held",
        };
        f.write_str(name)
    }
}
