//! Local safety layer: red-flag classification and emergency responses.
//!
//! Pure and synchronous; nothing here touches the network.

pub mod emergency;
pub mod immediate;
pub mod red_flags;

pub use immediate::{compose, ImmediateActionResponse};
pub use red_flags::{RedFlagClassifier, DEFAULT_RED_FLAGS};
