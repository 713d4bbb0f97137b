//! Keeping highlight layers in sync with a changing document.
//!
//! [`HighlightCoordinator`] owns the fast path (remapping layers on every
//! edit batch) and the slow path (authoritative reparses that supersede each
//! other). The editor plugs in through [`HighlightHost`].

pub mod coordinator;
pub mod host;

pub use coordinator::{HighlightCoordinator, ParsePhase};
pub use host::{HighlightHost, ParseFailure};
