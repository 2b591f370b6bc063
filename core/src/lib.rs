//! The block committer: pulls the pending-transaction backlog, applies
//! balance and ownership effects against the authenticated state trees,
//! and emits settlement-facing blocks with their public data and
//! commitments.
//!
//! The committer pass is single-threaded and sequential by design: each
//! transaction's effect depends on the exact post-state of the previous
//! one (nonce chaining, balance chaining, tree-root chaining). Tree state
//! is constructor-injected per pass, never global.

pub mod balance;
pub mod committer;
pub mod config;
pub mod error;
pub mod genesis;
pub mod pubdata;

pub use committer::BlockCommitter;
pub use config::CommitterConfig;
pub use error::CommitterError;
pub use genesis::default_block_header;
