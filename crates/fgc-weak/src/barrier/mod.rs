//! Barrier Module - Store Barrier for Tagged Fields
//!
//! Every mutator store into a heap field goes through [`WriteBarrier`]. The
//! barrier is where field kinds are enforced:
//! - Strong-only fields accept Smis and strong references
//! - Maybe-weak fields additionally accept weak references
//!
//! Cleared sentinels are never stored by the mutator; only the collector
//! produces them.

pub mod write_barrier;

pub use write_barrier::WriteBarrier;
