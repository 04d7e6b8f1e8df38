//! Configuration Module - Heap and Collector Parameters
//!
//! Controls the addressing mode of tagged words (full pointers or a
//! compressed 4GB cage), the size of the arena heap, and which optional
//! collector passes run.

use crate::compression::CAGE_SIZE;
use crate::object::OBJECT_ALIGNMENT;

/// Main configuration for the weak-reference heap
///
/// # Examples
///
/// ```rust
/// use fgc_weak::GcConfig;
///
/// let config = GcConfig {
///     heap_size: 1024 * 1024,
///     pointer_compression: false,
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct GcConfig {
    /// Size of the arena heap in bytes
    ///
    /// Must fit inside one cage when pointer compression is on.
    /// Default: 64MB
    pub heap_size: usize,

    /// Store slot words as 32-bit cage offsets
    ///
    /// When off, slots hold full machine words.
    /// Default: true
    pub pointer_compression: bool,

    /// Base address of the heap reservation
    ///
    /// Doubles as the cage base in compressed mode, so it must be 4GB aligned.
    /// Default: 0x1000_0000_0000
    pub cage_base: usize,

    /// Slide surviving objects together after sweeping
    ///
    /// Default: true
    pub compact: bool,

    /// Run the heap verifier after each collection
    ///
    /// Only takes effect in debug builds or with the `verify-heap` feature.
    /// Default: true in debug builds
    pub verify_heap: bool,

    /// Print collector events to the console
    ///
    /// Default: false
    pub verbose: bool,
}

impl Default for GcConfig {
    fn default() -> Self {
        GcConfig {
            heap_size: 64 * MB,
            pointer_compression: true,
            cage_base: DEFAULT_CAGE_BASE,
            compact: true,
            verify_heap: cfg!(debug_assertions),
            verbose: false,
        }
    }
}

impl GcConfig {
    /// Validate configuration
    ///
    /// ```rust
    /// use fgc_weak::GcConfig;
    ///
    /// let config = GcConfig {
    ///     heap_size: 0,
    ///     ..Default::default()
    /// };
    /// assert!(config.validate().is_err());
    /// ```
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.heap_size < MIN_HEAP_SIZE {
            return Err(ConfigError::InvalidHeapSize(format!(
                "heap_size must be at least {} bytes",
                MIN_HEAP_SIZE
            )));
        }

        if self.heap_size % OBJECT_ALIGNMENT != 0 {
            return Err(ConfigError::InvalidHeapSize(format!(
                "heap_size must be a multiple of {}",
                OBJECT_ALIGNMENT
            )));
        }

        if self.pointer_compression && self.heap_size > CAGE_SIZE {
            return Err(ConfigError::InvalidHeapSize(
                "heap_size cannot exceed the 4GB cage with pointer compression".to_string(),
            ));
        }

        if self.cage_base % CAGE_SIZE != 0 {
            return Err(ConfigError::InvalidCageBase(format!(
                "cage_base {:#x} is not 4GB aligned",
                self.cage_base
            )));
        }

        match self.cage_base.checked_add(self.heap_size) {
            Some(end) if end <= USER_SPACE_END => Ok(()),
            _ => Err(ConfigError::InvalidCageBase(format!(
                "heap [{:#x}, +{:#x}) leaves user address space",
                self.cage_base, self.heap_size
            ))),
        }
    }

    /// Build configuration from environment variables
    ///
    /// Overrides defaults with:
    /// - FGC_HEAP_SIZE
    /// - FGC_POINTER_COMPRESSION
    /// - FGC_CAGE_BASE (decimal or 0x-prefixed hex)
    /// - FGC_COMPACT
    /// - FGC_VERIFY_HEAP
    /// - FGC_VERBOSE
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(size) = env_usize("FGC_HEAP_SIZE") {
            config.heap_size = size;
        }
        if let Some(base) = env_usize("FGC_CAGE_BASE") {
            config.cage_base = base;
        }
        if let Some(flag) = env_flag("FGC_POINTER_COMPRESSION") {
            config.pointer_compression = flag;
        }
        if let Some(flag) = env_flag("FGC_COMPACT") {
            config.compact = flag;
        }
        if let Some(flag) = env_flag("FGC_VERIFY_HEAP") {
            config.verify_heap = flag;
        }
        if let Some(flag) = env_flag("FGC_VERBOSE") {
            config.verbose = flag;
        }

        config
    }
}

/// Error types for configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid heap size: {0}")]
    InvalidHeapSize(String),

    #[error("Invalid cage base: {0}")]
    InvalidCageBase(String),
}

// ============================================================================
// CONSTANTS & HELPERS
// ============================================================================

const KB: usize = 1024;
const MB: usize = 1024 * 1024;

const MIN_HEAP_SIZE: usize = 4 * KB;
const DEFAULT_CAGE_BASE: usize = 0x0000_1000_0000_0000;
const USER_SPACE_END: usize = 0x0000_8000_0000_0000;

fn env_usize(key: &str) -> Option<usize> {
    let val = std::env::var(key).ok()?;
    let val = val.trim();
    match val.strip_prefix("0x").or_else(|| val.strip_prefix("0X")) {
        Some(hex) => usize::from_str_radix(hex, 16).ok(),
        None => val.parse().ok(),
    }
}

fn env_flag(key: &str) -> Option<bool> {
    let val = std::env::var(key).ok()?;
    Some(val == "1" || val.eq_ignore_ascii_case("true"))
}
