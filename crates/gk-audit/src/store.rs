//! # Bundle Storage
//!
//! [`BundleStore`] is the seam between the pipeline and wherever run bundles
//! live. Every implementation stores three things per run: the bundle, the
//! outbox artifact under its route, and a snapshot of the deciding policy so
//! the run can be replayed without the policy file that was active at the
//! time.
//!
//! Stores are write-once: persisting a run id twice is an error, never an
//! overwrite.

use std::collections::BTreeMap;

use gk_core::{ContentDigest, Outcome, RunId};
use gk_policy::{PolicyDefinition, PolicyDocument, PolicyLoader};
use parking_lot::Mutex;

use crate::bundle::RunBundle;
use crate::error::PersistenceError;
use crate::outbox::OutboxArtifact;

/// Proof that a run was persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistReceipt {
    /// The persisted run.
    pub run_id: RunId,
    /// Digest over the canonical bundle.
    pub bundle_digest: ContentDigest,
    /// Where the bundle lives, in the store's own terms.
    pub location: String,
}

/// Write-once storage for run bundles and their policy snapshots.
///
/// Implementations must be `Send + Sync` so one store can serve concurrent
/// runs behind an `Arc`.
pub trait BundleStore: Send + Sync {
    /// Persist a decided run: bundle, outbox artifact and policy snapshot.
    ///
    /// `policy` must be the policy that decided the bundle.
    fn persist(
        &self,
        bundle: &RunBundle,
        policy: &PolicyDefinition,
    ) -> Result<PersistReceipt, PersistenceError>;

    /// Read a bundle back.
    fn load(&self, run_id: &RunId) -> Result<RunBundle, PersistenceError>;

    /// Read the policy snapshot stored with a bundle.
    fn load_policy_document(&self, run_id: &RunId) -> Result<PolicyDocument, PersistenceError>;

    /// Human-readable store name for logs.
    fn store_name(&self) -> &str;
}

/// Reject a policy that did not decide `bundle`.
pub fn ensure_policy_matches(
    bundle: &RunBundle,
    policy: &PolicyDefinition,
) -> Result<(), PersistenceError> {
    if policy.hash() != bundle.policy_hash {
        return Err(PersistenceError::SnapshotMismatch {
            run_id: bundle.run_id.clone(),
            recorded: bundle.policy_hash,
            computed: policy.hash(),
        });
    }
    Ok(())
}

/// Load a bundle together with its validated policy snapshot.
///
/// The snapshot is revalidated through `loader` and must hash to the
/// bundle's `policy_hash`.
pub fn load_for_replay(
    store: &dyn BundleStore,
    run_id: &RunId,
    loader: &PolicyLoader,
) -> Result<(RunBundle, PolicyDefinition), PersistenceError> {
    let bundle = store.load(run_id)?;
    let document = store.load_policy_document(run_id)?;
    let policy = loader
        .load_document(document)
        .map_err(|source| PersistenceError::InvalidSnapshot {
            run_id: run_id.clone(),
            source,
        })?;
    ensure_policy_matches(&bundle, &policy)?;
    Ok((bundle, policy))
}

#[derive(Debug, Clone)]
struct StoredRun {
    bundle: RunBundle,
    policy: PolicyDocument,
    outbox: OutboxArtifact,
}

/// In-process store for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryBundleStore {
    runs: Mutex<BTreeMap<RunId, StoredRun>>,
}

impl MemoryBundleStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored runs.
    pub fn len(&self) -> usize {
        self.runs.lock().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.runs.lock().is_empty()
    }

    /// Every stored run id, in order.
    pub fn run_ids(&self) -> Vec<RunId> {
        self.runs.lock().keys().cloned().collect()
    }

    /// Outbox artifacts routed for `outcome`.
    pub fn outbox(&self, outcome: Outcome) -> Vec<OutboxArtifact> {
        self.runs
            .lock()
            .values()
            .filter(|run| run.outbox.outcome == outcome)
            .map(|run| run.outbox.clone())
            .collect()
    }
}

impl BundleStore for MemoryBundleStore {
    fn persist(
        &self,
        bundle: &RunBundle,
        policy: &PolicyDefinition,
    ) -> Result<PersistReceipt, PersistenceError> {
        ensure_policy_matches(bundle, policy)?;
        let bundle_digest = bundle.digest()?;
        let mut runs = self.runs.lock();
        if runs.contains_key(&bundle.run_id) {
            return Err(PersistenceError::AlreadyExists(bundle.run_id.clone()));
        }
        let outbox = OutboxArtifact::from_bundle(bundle);
        let location = format!("memory://{}", outbox.relative_path().display());
        runs.insert(
            bundle.run_id.clone(),
            StoredRun {
                bundle: bundle.clone(),
                policy: policy.to_document(),
                outbox,
            },
        );
        tracing::debug!(run_id = %bundle.run_id, bundle_digest = %bundle_digest, "bundle stored in memory");
        Ok(PersistReceipt {
            run_id: bundle.run_id.clone(),
            bundle_digest,
            location,
        })
    }

    fn load(&self, run_id: &RunId) -> Result<RunBundle, PersistenceError> {
        self.runs
            .lock()
            .get(run_id)
            .map(|run| run.bundle.clone())
            .ok_or_else(|| PersistenceError::NotFound(run_id.clone()))
    }

    fn load_policy_document(&self, run_id: &RunId) -> Result<PolicyDocument, PersistenceError> {
        self.runs
            .lock()
            .get(run_id)
            .map(|run| run.policy.clone())
            .ok_or_else(|| PersistenceError::NotFound(run_id.clone()))
    }

    fn store_name(&self) -> &str {
        "memory"
    }
}
