//! # DVFS Error Handling
//!
//! Error types for the DVFS initialization pass and the runtime toggles.
//!
//! ## Propagation Policy
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        ERROR PROPAGATION FLOW                           │
//! │                                                                         │
//! │  clock domain ──▶ NotFound / BindingFailure ──▶ log ──▶ skip domain     │
//! │                                                                         │
//! │  core / gpu rail ──▶ InvalidTable / NoValidOperatingPoint               │
//! │                            │                                            │
//! │                            └──▶ disable rail ──▶ fallback index 0       │
//! │                                                                         │
//! │  cpu rail ──▶ any error ──▶ initialization aborts                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Error Categories
//!
//! | Category       | Kinds                                          | Scope        |
//! |----------------|------------------------------------------------|--------------|
//! | General        | NotFound, InvalidArgument                      | per call     |
//! | Table          | InvalidTable, NoValidOperatingPoint            | per rail     |
//! | Rail           | AlreadyResolved, OutOfRange, RailControlFailed | per rail     |
//! | Binding        | BindingFailure, RateTooHigh                    | per domain   |

use core::fmt;

use crate::rail::RailId;

extern crate alloc;
use alloc::string::String;

// =============================================================================
// ERROR KIND
// =============================================================================

/// Classification of DVFS errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ErrorKind {
    // -------------------------------------------------------------------------
    // General Errors (0-99)
    // -------------------------------------------------------------------------
    /// No characterization or table entry matches the chip identity
    NotFound               = 1,

    /// Invalid argument provided
    InvalidArgument        = 2,

    // -------------------------------------------------------------------------
    // Table Errors (100-199)
    // -------------------------------------------------------------------------
    /// A table violates its structural invariants
    InvalidTable           = 100,

    /// Target voltage lies below the lowest available step
    NoValidOperatingPoint  = 101,

    // -------------------------------------------------------------------------
    // Rail Errors (200-299)
    // -------------------------------------------------------------------------
    /// Nominal voltage was already resolved for this boot
    AlreadyResolved        = 200,

    /// Voltage outside of the rail's regulator window
    OutOfRange             = 201,

    /// Regulator driver or rail hook refused the transition
    RailControlFailed      = 202,

    // -------------------------------------------------------------------------
    // Binding Errors (300-399)
    // -------------------------------------------------------------------------
    /// Clock missing from the clock tree or registration refused
    BindingFailure         = 300,

    /// Requested rate exceeds the bound table
    RateTooHigh            = 301,
}

impl ErrorKind {
    /// Get the error category name
    pub const fn category(&self) -> &'static str {
        match *self as u32 {
            0..=99 => "General",
            100..=199 => "Table",
            200..=299 => "Rail",
            300..=399 => "Binding",
            _ => "Unknown",
        }
    }

    /// Check if the error only affects a single clock domain
    pub const fn is_domain_local(&self) -> bool {
        matches!(
            self,
            ErrorKind::NotFound | ErrorKind::BindingFailure | ErrorKind::RateTooHigh
        )
    }

    /// Default message for this kind
    pub const fn message(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "No matching entry",
            ErrorKind::InvalidArgument => "Invalid argument",
            ErrorKind::InvalidTable => "Invalid DVFS table",
            ErrorKind::NoValidOperatingPoint => "No valid operating point",
            ErrorKind::AlreadyResolved => "Nominal voltage already resolved",
            ErrorKind::OutOfRange => "Voltage out of rail range",
            ErrorKind::RailControlFailed => "Rail control failed",
            ErrorKind::BindingFailure => "Clock binding failed",
            ErrorKind::RateTooHigh => "Rate above DVFS table",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// =============================================================================
// DVFS ERROR
// =============================================================================

/// DVFS error with optional rail and clock context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DvfsError {
    /// Error classification
    kind: ErrorKind,

    /// Human-readable message
    message: &'static str,

    /// Optional detailed message (heap allocated)
    details: Option<String>,

    /// Rail the error relates to
    rail: Option<RailId>,

    /// Clock domain the error relates to
    clock: Option<&'static str>,
}

impl DvfsError {
    /// Create new error with kind and message
    pub const fn new(kind: ErrorKind, message: &'static str) -> Self {
        Self {
            kind,
            message,
            details: None,
            rail: None,
            clock: None,
        }
    }

    /// Create error from kind with default message
    pub const fn from_kind(kind: ErrorKind) -> Self {
        Self::new(kind, kind.message())
    }

    /// Add details to error
    pub fn with_details(mut self, details: String) -> Self {
        self.details = Some(details);
        self
    }

    /// Attach the rail this error belongs to
    pub fn with_rail(mut self, rail: RailId) -> Self {
        self.rail = Some(rail);
        self
    }

    /// Attach the clock domain this error belongs to
    pub fn with_clock(mut self, clock: &'static str) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Get error kind
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Get message
    pub fn message(&self) -> &str {
        self.message
    }

    /// Get details
    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }

    /// Get rail
    pub fn rail(&self) -> Option<RailId> {
        self.rail
    }

    /// Get clock
    pub fn clock(&self) -> Option<&'static str> {
        self.clock
    }
}

impl From<ErrorKind> for DvfsError {
    fn from(kind: ErrorKind) -> Self {
        Self::from_kind(kind)
    }
}

impl fmt::Display for DvfsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind.category(), self.message)?;

        if let Some(ref details) = self.details {
            write!(f, ": {}", details)?;
        }

        if let Some(rail) = self.rail {
            write!(f, " (rail: {})", rail)?;
        }

        if let Some(clock) = self.clock {
            write!(f, " (clock: {})", clock)?;
        }

        Ok(())
    }
}

// =============================================================================
// RESULT TYPE
// =============================================================================

/// Result type for DVFS operations
pub type DvfsResult<T> = Result<T, DvfsError>;

// =============================================================================
// MACROS
// =============================================================================

/// Create a DVFS error with optional formatted details
#[macro_export]
macro_rules! dvfs_error {
    ($kind:expr, $msg:literal) => {
        $crate::error::DvfsError::new($kind, $msg)
    };
    ($kind:expr, $msg:literal, $($arg:tt)*) => {
        $crate::error::DvfsError::new($kind, $msg)
            .with_details(alloc::format!($($arg)*))
    };
}

/// Return early with an error
#[macro_export]
macro_rules! dvfs_bail {
    ($kind:expr, $msg:literal) => {
        return Err($crate::dvfs_error!($kind, $msg))
    };
    ($kind:expr, $msg:literal, $($arg:tt)*) => {
        return Err($crate::dvfs_error!($kind, $msg, $($arg)*))
    };
}

/// Ensure a condition is true, otherwise return error
#[macro_export]
macro_rules! dvfs_ensure {
    ($cond:expr, $kind:expr, $msg:literal) => {
        if !$cond {
            $crate::dvfs_bail!($kind, $msg);
        }
    };
    ($cond:expr, $kind:expr, $msg:literal, $($arg:tt)*) => {
        if !$cond {
            $crate::dvfs_bail!($kind, $msg, $($arg)*);
        }
    };
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn test_error_kind_categories() {
        assert_eq!(ErrorKind::NotFound.category(), "General");
        assert_eq!(ErrorKind::InvalidTable.category(), "Table");
        assert_eq!(ErrorKind::NoValidOperatingPoint.category(), "Table");
        assert_eq!(ErrorKind::OutOfRange.category(), "Rail");
        assert_eq!(ErrorKind::BindingFailure.category(), "Binding");
    }

    #[test]
    fn test_domain_local_kinds() {
        assert!(ErrorKind::BindingFailure.is_domain_local());
        assert!(ErrorKind::NotFound.is_domain_local());
        assert!(!ErrorKind::InvalidTable.is_domain_local());
    }

    #[test]
    fn test_error_display() {
        let err = DvfsError::from_kind(ErrorKind::InvalidTable)
            .with_rail(RailId::Cpu)
            .with_details("speedo_id 3".to_string());

        assert_eq!(
            err.to_string(),
            "[Table] Invalid DVFS table: speedo_id 3 (rail: vdd_cpu)"
        );
    }

    #[test]
    fn test_macros() {
        fn check(v: u32) -> DvfsResult<u32> {
            dvfs_ensure!(v < 10, ErrorKind::InvalidArgument, "too large", "value {}", v);
            Ok(v)
        }

        assert_eq!(check(3), Ok(3));
        let err = check(12).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(err.details(), Some("value 12"));
    }
}
