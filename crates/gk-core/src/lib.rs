#![deny(missing_docs)]

//! # gk-core: Foundational Types for Gatekeeper
//!
//! This crate defines the types every other Gatekeeper crate depends on. It
//! has no internal crate dependencies, only `serde`, `serde_json`,
//! `serde_jcs`, `thiserror`, `chrono`, `uuid` and `sha2`.
//!
//! ## Design Principles
//!
//! 1. **[`CanonicalBytes`] is the sole path to digest computation.** Policy
//!    hashes and bundle digests both flow through `CanonicalBytes::new()`,
//!    which rejects floats and applies RFC 8785 canonicalization.
//!
//! 2. **Ambiguity is data, not an error.** Missing fields, unresolvable times
//!    and off-taxonomy categories are [`QualityFlag`]s on a
//!    [`NormalizedRecord`]. Errors are reserved for structural failures.
//!
//! 3. **Closed sets are enums.** Categories, flags and outcomes are matched
//!    exhaustively everywhere they are consumed.
//!
//! 4. **Time is read through [`Clock`].** Nothing in the pipeline calls the
//!    system clock directly, so every timestamp in a run bundle can be pinned
//!    in tests.

pub mod canonical;
pub mod decision;
pub mod digest;
pub mod error;
pub mod extraction;
pub mod identity;
pub mod record;
pub mod submission;
pub mod temporal;

// Re-export primary types at crate root for ergonomic imports.
pub use canonical::CanonicalBytes;
pub use decision::{Decision, Outcome, ReasonCode};
pub use digest::{sha256_digest, ContentDigest, DigestAlgorithm};
pub use error::{CanonicalizationError, ValidationError};
pub use extraction::{Confidence, ExtractionCandidate, ExtractionResult, Field};
pub use identity::{RuleId, RunId, DEFAULT_RUN_PREFIX};
pub use record::{Category, FlagKind, NormalizedRecord, QualityFlag, QualityFlags};
pub use submission::SubmissionMetadata;
pub use temporal::{Clock, FixedClock, SystemClock, Timestamp};
