//! # gk-normalize: From Candidates to a Typed Record
//!
//! Normalization is the first deterministic stage after extraction. It picks
//! at most one candidate per field, validates it, and turns everything it
//! cannot settle into [`QualityFlag`](gk_core::QualityFlag)s:
//!
//! - [`taxonomy`]: category signals against the five canonical categories.
//! - [`time`]: event times, accepted only as absolute instants.
//! - [`engine`]: candidate selection and flag derivation.
//!
//! Nothing in this crate infers missing data.

pub mod engine;
pub mod taxonomy;
pub mod time;

pub use engine::{select_candidate, NormalizationEngine, Normalized};
pub use taxonomy::{Resolution, TaxonomyResolver};
pub use time::{find_relative_time, resolve_event_time, TimeResolution, UnresolvedTime};
