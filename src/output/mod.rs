//! Text artifact export into the bound output directory.

pub mod naming;
mod writer;

pub use writer::{OutputWriter, WrittenArtifact};
