//! Error types for the lowering engine.

use std::fmt;

use thiserror::Error;

/// Result type for compilation operations
pub type Result<T> = std::result::Result<T, CompileError>;

/// Errors that can occur while lowering a script.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    /// Target VM version is below the supported minimum
    #[error("unsupported target version {0} (version 5 or later required)")]
    UnsupportedVersion(u8),

    /// String encoding identifier not recognized
    #[error("unknown string encoding '{0}'")]
    UnknownEncoding(String),

    /// Structural problem in the tree
    #[error("line {line}: {kind}")]
    Validation {
        /// What went wrong
        kind: ValidationErrorKind,
        /// Source line of the offending node
        line: u32,
    },

    /// A literal cannot be represented in the configured encoding
    #[error("string {text:?} cannot be encoded as {encoding}")]
    Encoding {
        /// The offending text
        text: String,
        /// Encoding name
        encoding: &'static str,
    },

    /// A relative branch does not fit its 16-bit field
    #[error("branch offset {offset} out of range")]
    BranchOutOfRange {
        /// The computed offset
        offset: isize,
    },

    /// An action record payload exceeds the 16-bit length field
    #[error("action 0x{opcode:02X} payload of {len} bytes is too long")]
    RecordTooLong {
        /// Opcode of the record
        opcode: u8,
        /// Payload length in bytes
        len: usize,
    },

    /// Construct not available on the target VM version
    #[error("line {line}: {construct} requires a newer target than version {version}")]
    Unsupported {
        /// Construct name
        construct: &'static str,
        /// Configured version
        version: u8,
        /// Source line
        line: u32,
    },

    /// Left-hand side of an assignment cannot be stored to
    #[error("line {line}: invalid assignment target")]
    InvalidAssignmentTarget {
        /// Source line
        line: u32,
    },

    /// A break/continue pseudo-instruction reached the encoder
    #[error("unresolved break/continue placeholder")]
    UnresolvedPlaceholder,
}

impl CompileError {
    /// Create a validation error
    pub fn validation(kind: ValidationErrorKind, line: u32) -> Self {
        Self::Validation { kind, line }
    }

    /// Symbolic kind of a validation error, if this is one
    pub fn validation_kind(&self) -> Option<&ValidationErrorKind> {
        match self {
            Self::Validation { kind, .. } => Some(kind),
            _ => None,
        }
    }

    /// Source line carried by the error, if any
    pub fn line(&self) -> Option<u32> {
        match self {
            Self::Validation { line, .. }
            | Self::Unsupported { line, .. }
            | Self::InvalidAssignmentTarget { line } => Some(*line),
            _ => None,
        }
    }
}

/// Symbolic kinds of structural validation failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// `break` with no enclosing loop or switch
    BreakOutsideLoop,
    /// `continue` with no enclosing loop
    ContinueOutsideLoop,
    /// `return` outside a function body
    ReturnOutsideFunction,
    /// Container child that is not the container's event-handler kind
    InvalidEventHandler,
    /// Built-in called with an argument count outside its range
    ArgumentCount {
        /// Built-in name as written
        name: String,
        /// Minimum accepted
        min: usize,
        /// Maximum accepted
        max: usize,
        /// Count found
        found: usize,
    },
    /// Assignment or increment of something that is not a reference
    InvalidAssignmentTarget,
}

impl fmt::Display for ValidationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BreakOutsideLoop => write!(f, "break outside of a loop or switch"),
            Self::ContinueOutsideLoop => write!(f, "continue outside of a loop"),
            Self::ReturnOutsideFunction => write!(f, "return outside of a function"),
            Self::InvalidEventHandler => write!(f, "unexpected node in event handler list"),
            Self::ArgumentCount {
                name,
                min,
                max,
                found,
            } => {
                if min == max {
                    write!(f, "{} expects {} argument(s), got {}", name, min, found)
                } else {
                    write!(
                        f,
                        "{} expects {} to {} arguments, got {}",
                        name, min, max, found
                    )
                }
            }
            Self::InvalidAssignmentTarget => write!(f, "invalid assignment target"),
        }
    }
}
