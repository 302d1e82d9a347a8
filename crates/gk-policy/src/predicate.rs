//! # Predicates
//!
//! Rule conditions are inert data interpreted by [`Predicate::evaluate`].
//! There is no expression language and no way for a policy file to run code:
//! the grammar is the enum below, and serde rejects anything else (unknown
//! operators, unknown flag kinds, unknown fields) at load time.
//!
//! ```yaml
//! when:
//!   all:
//!     - no_blockers
//!     - not: { flag_present: { kind: low_confidence } }
//! ```

use gk_core::{Category, FlagKind, Field, NormalizedRecord, QualityFlags};
use serde::{Deserialize, Serialize};

/// Maximum nesting depth of composite predicates.
pub const MAX_PREDICATE_DEPTH: usize = 16;

/// A condition over a normalized record and its flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    /// Always true.
    Always,
    /// Every required field is present, no field is flagged missing and no
    /// blocking flag is set.
    NoBlockers,
    /// A flag of the given kind (optionally for one field) is set.
    FlagPresent(FlagMatch),
    /// The field holds a value.
    FieldPresent(Field),
    /// The field is absent.
    FieldAbsent(Field),
    /// The category is one of the listed canonical categories.
    CategoryIn(Vec<Category>),
    /// Every sub-predicate holds.
    All(Vec<Predicate>),
    /// At least one sub-predicate holds.
    Any(Vec<Predicate>),
    /// The sub-predicate does not hold.
    Not(Box<Predicate>),
}

/// Flag selector used by [`Predicate::FlagPresent`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FlagMatch {
    /// Flag kind to look for.
    pub kind: FlagKind,
    /// Restrict field-scoped kinds to one field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<Field>,
}

impl Predicate {
    /// Evaluate against one record.
    pub fn evaluate(&self, record: &NormalizedRecord, flags: &QualityFlags) -> bool {
        match self {
            Self::Always => true,
            Self::NoBlockers => {
                record.is_complete()
                    && !flags.has(FlagKind::MissingField, None)
                    && !flags.has_blocking()
            }
            Self::FlagPresent(m) => flags.has(m.kind, m.field),
            Self::FieldPresent(f) => record.is_present(*f),
            Self::FieldAbsent(f) => !record.is_present(*f),
            Self::CategoryIn(categories) => record
                .category
                .is_some_and(|c| categories.contains(&c)),
            Self::All(ps) => ps.iter().all(|p| p.evaluate(record, flags)),
            Self::Any(ps) => ps.iter().any(|p| p.evaluate(record, flags)),
            Self::Not(p) => !p.evaluate(record, flags),
        }
    }

    /// Nesting depth; a leaf has depth 1.
    pub fn depth(&self) -> usize {
        match self {
            Self::All(ps) | Self::Any(ps) => 1 + ps.iter().map(Predicate::depth).max().unwrap_or(0),
            Self::Not(p) => 1 + p.depth(),
            _ => 1,
        }
    }

    /// Structural checks serde cannot express.
    ///
    /// Returns a description of the first problem found.
    pub fn check(&self) -> Result<(), String> {
        let depth = self.depth();
        if depth > MAX_PREDICATE_DEPTH {
            return Err(format!(
                "nesting depth {depth} exceeds the limit of {MAX_PREDICATE_DEPTH}"
            ));
        }
        self.check_node()
    }

    fn check_node(&self) -> Result<(), String> {
        match self {
            Self::All(ps) | Self::Any(ps) => {
                if ps.is_empty() {
                    let op = if matches!(self, Self::All(_)) { "all" } else { "any" };
                    return Err(format!("`{op}` must list at least one predicate"));
                }
                ps.iter().try_for_each(Predicate::check_node)
            }
            Self::Not(p) => p.check_node(),
            Self::CategoryIn(cs) if cs.is_empty() => {
                Err("`category_in` must list at least one category".to_string())
            }
            Self::FlagPresent(FlagMatch {
                kind,
                field: Some(field),
            }) if !kind.is_field_scoped() => Err(format!(
                "flag kind `{kind}` does not carry a field (got `{field}`)"
            )),
            _ => Ok(()),
        }
    }
}
