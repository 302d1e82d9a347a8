//! # Filesystem Bundle Store
//!
//! Layout:
//!
//! ```text
//! <runs_dir>/<run_id>/bundle.json       the run bundle
//! <runs_dir>/<run_id>/policy.json       snapshot of the deciding policy
//! <outbox_dir>/<route>/<run_id>.json    outbox artifact, route = accepted|escalated|rejected
//! ```
//!
//! A run is written into `<runs_dir>/.staging-<run_id>/` and published with a
//! single directory rename, so a reader never sees half a bundle. The outbox
//! file is staged beside its final name and renamed after the bundle. Staged
//! paths are owned by [`StagingGuard`]s and removed on every failure path.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use gk_audit::{ensure_policy_matches, BundleStore, OutboxArtifact, PersistReceipt, PersistenceError, RunBundle};
use gk_core::RunId;
use gk_policy::{PolicyDefinition, PolicyDocument};
use serde::Serialize;

/// File name of the run bundle inside a run directory.
pub const BUNDLE_FILE: &str = "bundle.json";
/// File name of the deciding policy snapshot inside a run directory.
pub const POLICY_FILE: &str = "policy.json";

/// Removes a staged path on drop unless disarmed.
struct StagingGuard {
    path: PathBuf,
    is_dir: bool,
    armed: bool,
}

impl StagingGuard {
    fn dir(path: PathBuf) -> Self {
        Self {
            path,
            is_dir: true,
            armed: true,
        }
    }

    fn file(path: PathBuf) -> Self {
        Self {
            path,
            is_dir: false,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for StagingGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let result = if self.is_dir {
            fs::remove_dir_all(&self.path)
        } else {
            fs::remove_file(&self.path)
        };
        if let Err(e) = result {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to clean up staged path");
            }
        }
    }
}

/// Write-once bundle store on the local filesystem.
#[derive(Debug, Clone)]
pub struct FsBundleStore {
    runs_dir: PathBuf,
    outbox_dir: PathBuf,
}

impl FsBundleStore {
    pub fn new(runs_dir: impl Into<PathBuf>, outbox_dir: impl Into<PathBuf>) -> Self {
        Self {
            runs_dir: runs_dir.into(),
            outbox_dir: outbox_dir.into(),
        }
    }

    /// Directory holding a run's bundle and policy snapshot.
    pub fn run_dir(&self, run_id: &RunId) -> PathBuf {
        self.runs_dir.join(run_id.as_str())
    }

    /// Path of a run's outbox artifact.
    pub fn outbox_path(&self, artifact: &OutboxArtifact) -> PathBuf {
        self.outbox_dir.join(artifact.relative_path())
    }

    fn staging_dir(&self, run_id: &RunId) -> PathBuf {
        self.runs_dir.join(format!(".staging-{run_id}"))
    }
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> PersistenceError + '_ {
    move |source| PersistenceError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn write_json(path: &Path, what: &str, value: &impl Serialize) -> Result<(), PersistenceError> {
    let mut json = serde_json::to_string_pretty(value).map_err(|source| PersistenceError::Serialization {
        what: what.to_string(),
        source,
    })?;
    json.push('\n');
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(io_err(path))?;
    file.write_all(json.as_bytes()).map_err(io_err(path))?;
    file.sync_all().map_err(io_err(path))
}

fn read_json<T: serde::de::DeserializeOwned>(
    path: &Path,
    what: &str,
    run_id: &RunId,
) -> Result<T, PersistenceError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(PersistenceError::NotFound(run_id.clone()))
        }
        Err(source) => {
            return Err(PersistenceError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    serde_json::from_str(&text).map_err(|source| PersistenceError::Serialization {
        what: what.to_string(),
        source,
    })
}

/// Rename a staged run directory into place.
///
/// Another writer may publish the same run between the existence check and
/// the rename. The rename then fails against a non-empty directory, which is
/// reported as [`PersistenceError::AlreadyExists`].
fn publish_dir(staging: &Path, final_dir: &Path, run_id: &RunId) -> Result<(), PersistenceError> {
    fs::rename(staging, final_dir).map_err(|source| match source.kind() {
        std::io::ErrorKind::AlreadyExists | std::io::ErrorKind::DirectoryNotEmpty => {
            PersistenceError::AlreadyExists(run_id.clone())
        }
        _ => PersistenceError::Io {
            path: final_dir.to_path_buf(),
            source,
        },
    })
}

impl BundleStore for FsBundleStore {
    fn persist(
        &self,
        bundle: &RunBundle,
        policy: &PolicyDefinition,
    ) -> Result<PersistReceipt, PersistenceError> {
        ensure_policy_matches(bundle, policy)?;
        let bundle_digest = bundle.digest()?;
        let run_id = &bundle.run_id;

        let final_dir = self.run_dir(run_id);
        if final_dir.exists() {
            return Err(PersistenceError::AlreadyExists(run_id.clone()));
        }
        fs::create_dir_all(&self.runs_dir).map_err(io_err(&self.runs_dir))?;

        let staging = self.staging_dir(run_id);
        match fs::create_dir(&staging) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(PersistenceError::AlreadyExists(run_id.clone()))
            }
            Err(source) => {
                return Err(PersistenceError::Io {
                    path: staging,
                    source,
                })
            }
        }
        let staging_guard = StagingGuard::dir(staging.clone());

        write_json(&staging.join(BUNDLE_FILE), "run bundle", bundle)?;
        write_json(&staging.join(POLICY_FILE), "policy snapshot", &policy.to_document())?;

        let artifact = OutboxArtifact::from_bundle(bundle);
        let outbox_path = self.outbox_path(&artifact);
        if outbox_path.exists() {
            return Err(PersistenceError::AlreadyExists(run_id.clone()));
        }
        let route_dir = self.outbox_dir.join(artifact.route());
        fs::create_dir_all(&route_dir).map_err(io_err(&route_dir))?;
        let outbox_staged = route_dir.join(format!(".{run_id}.json.staging"));
        let outbox_guard = StagingGuard::file(outbox_staged.clone());
        write_json(&outbox_staged, "outbox artifact", &artifact)?;

        publish_dir(&staging, &final_dir, run_id)?;
        staging_guard.disarm();
        let published = StagingGuard::dir(final_dir.clone());

        fs::rename(&outbox_staged, &outbox_path).map_err(io_err(&outbox_path))?;
        outbox_guard.disarm();
        published.disarm();

        tracing::debug!(
            run_id = %run_id,
            bundle = %final_dir.display(),
            outbox = %outbox_path.display(),
            "bundle published"
        );
        Ok(PersistReceipt {
            run_id: run_id.clone(),
            bundle_digest,
            location: final_dir.join(BUNDLE_FILE).display().to_string(),
        })
    }

    fn load(&self, run_id: &RunId) -> Result<RunBundle, PersistenceError> {
        read_json(&self.run_dir(run_id).join(BUNDLE_FILE), "run bundle", run_id)
    }

    fn load_policy_document(&self, run_id: &RunId) -> Result<PolicyDocument, PersistenceError> {
        read_json(&self.run_dir(run_id).join(POLICY_FILE), "policy snapshot", run_id)
    }

    fn store_name(&self) -> &str {
        "filesystem"
    }
}
