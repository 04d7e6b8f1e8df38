//! # fgc-weak - In-Place Weak References for the Fax Managed Heap
//!
//! Every heap field is a single tagged word that holds one of four things:
//! a small integer, a strong reference, a weak reference, or the cleared
//! sentinel a weak reference becomes once its target is collected. This crate
//! defines that encoding and the pieces that must agree on it bit for bit:
//! the slot update protocol, the tracing visitor, the write barrier and the
//! heap verifier.
//!
//! ## Overview
//!
//! - **Tagged words**: [`TaggedReference`] with a closed [`Decoded`] view
//! - **Slots**: atomic in-place storage, [`Slot::update`] keeps strong/weak intact
//! - **Addressing contexts**: full pointers or a compressed 4GB [`PointerCage`]
//! - **Reference collector**: mark, clear weak, sweep, compact
//! - **Verifier**: debug-build heap consistency checks
//!
//! ## Quick Start
//!
//! ```rust
//! use fgc_weak::{Collector, Decoded, GcConfig, SlotKind, TaggedReference};
//!
//! fn main() -> Result<(), fgc_weak::FgcError> {
//!     let gc = Collector::new(GcConfig::default())?;
//!
//!     let cache = gc.allocate(&[SlotKind::MaybeWeak])?;
//!     let entry = gc.allocate(&[])?;
//!     gc.register_root(cache)?;
//!
//!     let strong = TaggedReference::from_strong_target(entry);
//!     gc.store(cache, 0, TaggedReference::make_weak(strong))?;
//!
//!     // Nothing keeps `entry` alive, so the weak slot is cleared
//!     gc.collect()?;
//!     let cache = gc.heap().roots()[0];
//!     assert_eq!(gc.load(cache, 0)?.decode(), Decoded::Cleared);
//!     Ok(())
//! }
//! ```
//!
//! ## Tagged Word Layout
//!
//! ```text
//! ┌──────────────────────────────────────────────┬────┬────┐
//! │              payload / address               │ b1 │ b0 │
//! └──────────────────────────────────────────────┴────┴────┘
//!   b0 = 0        Smi (31-bit)
//!   b1 b0 = 01    strong reference
//!   b1 b0 = 11    weak reference
//!   low 32 = 0b11 cleared sentinel
//! ```
//!
//! ## Collection Cycle
//!
//! 1. **Marking**: strong edges are followed, weak edges recorded
//! 2. **Clearing weak**: weak slots to unmarked objects become cleared
//! 3. **Sweeping**: unmarked objects are freed
//! 4. **Relocating**: survivors slide together; slots are updated in place
//!
//! ## Modules
//!
//! - [`object`]: Tagged words, Smis and slots
//! - [`compression`]: Addressing contexts
//! - [`heap`]: Arena heap of tagged-slot objects
//! - [`barrier`]: Write barrier enforcing field kinds
//! - [`marker`]: Tracing visitor
//! - [`relocate`]: Compaction and forwarding
//! - [`gc`]: Collector and phase state
//! - [`verify`]: Heap verifier
//! - [`config`], [`error`], [`logging`], [`stats`]: Ambient support

// Core
pub mod config;
pub mod error;
pub mod gc;

// Tagged words and storage
pub mod compression;
pub mod heap;
pub mod object;

// Collector components
pub mod barrier;
pub mod marker;
pub mod relocate;
pub mod verify;

// Monitoring
pub mod logging;
pub mod stats;

pub use barrier::WriteBarrier;
pub use compression::{AddressingContext, FullPointers, PointerCage};
pub use config::GcConfig;
pub use error::{FgcError, Result, TaggedError};
pub use gc::{Collector, GcState};
pub use heap::{Heap, SlotKind};
pub use object::{Address, Decoded, HeapObjectReference, ReferenceType, Slot, Smi, TaggedReference};
pub use stats::CycleStats;

/// fgc-weak version string from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
