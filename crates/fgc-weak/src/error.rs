//! Error Module - fgc-weak Error Types
//!
//! Two families of errors live here.
//!
//! ## Heap model errors (`FgcError`)
//! - `OutOfMemory` - Arena exhausted
//! - `InvalidPointer` - Address does not name an allocated object
//! - `BoundsCheckFailed` - Slot index outside the object
//! - `AlignmentError` - Address not object-aligned
//! - `Configuration` - Invalid configuration
//! - `InvalidState` - Collector phase machine violation
//! - `RelocationFailed` - Compaction could not place an object
//!
//! ## Encoding errors (`TaggedError`)
//!
//! Returned by the checked `try_*` forms of the tagged-word operations. The
//! unchecked forms treat the same conditions as fatal assertions.

use thiserror::Error;

use crate::config::ConfigError;

/// Main error type for heap and collector operations
///
/// # Examples
///
/// ```rust
/// use fgc_weak::error::FgcError;
///
/// fn handle_error(err: FgcError) {
///     match err {
///         FgcError::OutOfMemory { requested, available } => {
///             eprintln!("OOM: requested {}, available {}", requested, available);
///         }
///         _ => eprintln!("Other error: {}", err),
///     }
/// }
/// ```
#[derive(Debug, Error)]
pub enum FgcError {
    /// Out of memory - the arena has no room for the request
    ///
    /// **Recovery strategy:** Collect with compaction enabled, then retry
    #[error("Out of memory: requested {requested} bytes, available {available} bytes")]
    OutOfMemory { requested: usize, available: usize },

    /// Address does not name an allocated object
    ///
    /// **When returned:** store into a freed host, root registration of a
    /// dangling address, relocation of an unknown object
    #[error("Invalid pointer address: {address:#x}")]
    InvalidPointer { address: usize },

    /// Slot index outside the object
    #[error("Bounds check failed: index {index} out of bounds for length {length}")]
    BoundsCheckFailed { index: usize, length: usize },

    /// Address not aligned for an object start
    #[error("Alignment error: address {address:#x} is not aligned to {alignment} bytes")]
    AlignmentError { address: usize, alignment: usize },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// Collector phase machine violation
    ///
    /// **Recovery strategy:** Cannot recover - indicates bug
    #[error("Invalid state: expected {expected}, got {actual}")]
    InvalidState { expected: String, actual: String },

    /// Relocation phase failed
    #[error("Relocation phase failed: {0}")]
    RelocationFailed(String),

    /// Tagged word operation rejected its input
    #[error(transparent)]
    Tagged(#[from] TaggedError),
}

impl FgcError {
    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        matches!(self, FgcError::OutOfMemory { .. })
    }

    /// Check if this error indicates a bug in the caller or the collector
    pub fn is_bug(&self) -> bool {
        matches!(
            self,
            FgcError::InvalidState { .. }
                | FgcError::BoundsCheckFailed { .. }
                | FgcError::RelocationFailed(_)
                | FgcError::Tagged(_)
        )
    }
}

/// Errors from the checked tagged-word constructors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TaggedError {
    /// Small integers carry no address and cannot be weakened
    #[error("cannot weaken a small integer (raw word {raw:#x})")]
    WeakenSmi { raw: usize },

    /// Operation needs a strong or weak pointer
    #[error("word {raw:#x} does not carry a live heap address")]
    NotAPointer { raw: usize },

    /// Value does not fit the 31-bit small integer range
    #[error("{value} is outside the small integer range")]
    SmiOutOfRange { value: i64 },

    /// Address is not a valid object address in the addressing context
    #[error("invalid object address {address:#x}")]
    InvalidAddress { address: usize },
}

/// Result type alias for heap and collector operations
pub type Result<T> = std::result::Result<T, FgcError>;
