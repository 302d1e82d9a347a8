//! # gk-audit: Run Bundles and Replay
//!
//! Everything that happens after a decision exists:
//!
//! - [`bundle`]: the immutable [`RunBundle`] and its validating builder.
//! - [`outbox`]: the per-outcome downstream artifact.
//! - [`store`]: the write-once [`BundleStore`] seam and an in-memory store.
//! - [`replay`]: audit and what-if re-evaluation of stored runs.
//!
//! A bundle carries its own normalized record, flags and policy identity, so
//! replay needs only the bundle and a policy. Stores keep a snapshot of the
//! deciding policy beside each bundle to supply that policy later.

pub mod bundle;
pub mod error;
pub mod outbox;
pub mod replay;
pub mod store;

pub use bundle::{AuditBundleBuilder, DecisionRecord, RunBundle, StageTiming};
pub use error::{BundleError, PersistenceError, ReplayError};
pub use outbox::OutboxArtifact;
pub use replay::{ReplayEngine, ReplayOutcome};
pub use store::{ensure_policy_matches, load_for_replay, BundleStore, MemoryBundleStore, PersistReceipt};
