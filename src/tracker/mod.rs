//! The tracker CSV binding: merge rules, write serialization and the store
//! that ties them to the bound file.

pub mod merge;
mod queue;
mod store;

pub use queue::WriteQueue;
pub use store::TrackerStore;
