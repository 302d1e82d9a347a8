//! # gk-policy: Versioned Gating Rules
//!
//! Policies are data: a version label and an ordered list of rules, each a
//! [`Predicate`] over the normalized record and its flags plus the outcome and
//! reason code it selects. This crate loads and validates them, hashes them,
//! keeps the active one, and evaluates it.
//!
//! ## Architecture
//!
//! - **Reason codes** ([`reason`]): registry of codes and the outcomes each
//!   may justify.
//! - **Predicates** ([`predicate`]): the closed condition grammar and its
//!   interpreter.
//! - **Definitions** ([`definition`], [`loader`]): YAML/JSON parsing,
//!   structural validation and the content hash.
//! - **Store** ([`store`]): the active policy behind an atomic swap, plus a
//!   catalog addressable by hash for replay.
//! - **Engine** ([`engine`]): first-match evaluation with the invariant guard.
//! - **Standard policy** ([`standard`]): the built-in `v1` rule set.
//!
//! Evaluation is deterministic: rules are kept sorted by a unique priority and
//! the engine reads nothing but its arguments.

pub mod definition;
pub mod engine;
pub mod error;
pub mod loader;
pub mod predicate;
pub mod reason;
pub mod standard;
pub mod store;

pub use definition::{PolicyDefinition, PolicyDocument, PolicyRule};
pub use engine::{Explanation, InvariantViolation, OverrideDetail, PolicyEngine, RuleTrace};
pub use error::{PolicyLoadError, ReasonCodeViolation};
pub use loader::{PolicyFormat, PolicyLoader};
pub use predicate::{FlagMatch, Predicate, MAX_PREDICATE_DEPTH};
pub use reason::{ReasonCodeEntry, ReasonCodeRegistry};
pub use standard::{standard_policy, STANDARD_POLICY_YAML};
pub use store::PolicyStore;
