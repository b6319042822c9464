//! Sequenced exchange access: durable per-account counters, the
//! jump-and-backoff policy, and the per-account client.

pub mod allocator;
pub mod client;
pub mod policy;

pub use allocator::{read_legacy_counter, SequenceAllocator, SequenceRecord};
pub use client::{ClientStats, FailureSink, SequencedAccountClient};
pub use policy::SequencePolicy;
