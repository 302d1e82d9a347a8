//! # Normalized Record and Quality Flags
//!
//! The typed output of normalization. A [`NormalizedRecord`] holds at most one
//! value per field and never a fabricated one; everything normalization could
//! not settle is expressed as a [`QualityFlag`].
//!
//! Flags live in a [`QualityFlags`] set backed by a `BTreeSet`, so iteration
//! order (and therefore the serialized form in a run bundle) is independent of
//! the order in which flags were raised.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::extraction::Field;
use crate::temporal::Timestamp;

// ---------------------------------------------------------------------------
// Category
// ---------------------------------------------------------------------------

/// The closed set of canonical incident categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    /// Harm to a person.
    #[serde(rename = "Injury/Illness")]
    InjuryIllness,
    /// An event that could have caused harm but did not.
    #[serde(rename = "Near Miss")]
    NearMiss,
    /// Damage to equipment, buildings or goods.
    #[serde(rename = "Property Damage")]
    PropertyDamage,
    /// A collision or accident involving a vehicle.
    #[serde(rename = "Motor Vehicle Accident")]
    MotorVehicleAccident,
    /// A spill, release or other environmental event.
    #[serde(rename = "Environmental Incident")]
    EnvironmentalIncident,
}

impl Category {
    /// Every canonical category.
    pub const ALL: [Category; 5] = [
        Category::InjuryIllness,
        Category::NearMiss,
        Category::PropertyDamage,
        Category::MotorVehicleAccident,
        Category::EnvironmentalIncident,
    ];

    /// The canonical display label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::InjuryIllness => "Injury/Illness",
            Self::NearMiss => "Near Miss",
            Self::PropertyDamage => "Property Damage",
            Self::MotorVehicleAccident => "Motor Vehicle Accident",
            Self::EnvironmentalIncident => "Environmental Incident",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// NormalizedRecord
// ---------------------------------------------------------------------------

/// One typed value or absence per required field.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NormalizedRecord {
    /// Short description of what happened.
    pub summary: Option<String>,
    /// Canonical category, never a near guess.
    pub category: Option<Category>,
    /// Where it happened.
    pub location: Option<String>,
    /// Absolute instant of the event.
    pub event_time: Option<Timestamp>,
}

impl NormalizedRecord {
    /// Whether `field` holds a value.
    pub fn is_present(&self, field: Field) -> bool {
        match field {
            Field::Summary => self.summary.is_some(),
            Field::Category => self.category.is_some(),
            Field::Location => self.location.is_some(),
            Field::EventTime => self.event_time.is_some(),
        }
    }

    /// Required fields that are absent, in declaration order.
    pub fn missing_fields(&self) -> Vec<Field> {
        Field::REQUIRED
            .into_iter()
            .filter(|f| !self.is_present(*f))
            .collect()
    }

    /// True when every required field holds a value.
    pub fn is_complete(&self) -> bool {
        Field::REQUIRED.iter().all(|f| self.is_present(*f))
    }
}

// ---------------------------------------------------------------------------
// QualityFlag
// ---------------------------------------------------------------------------

/// A data-quality or risk signal attached to a normalized record.
///
/// Serialized adjacently tagged, e.g. `{"flag":"missing_field","field":"location"}`
/// or `{"flag":"ambiguous_category"}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "flag", content = "field", rename_all = "snake_case")]
pub enum QualityFlag {
    /// A required field is absent after normalization.
    MissingField(Field),
    /// The category signal matched no canonical category.
    AmbiguousCategory,
    /// The event time could not be resolved to an absolute instant.
    RelativeTimeUnresolved,
    /// The extractor marked this field as weakly supported.
    LowConfidence(Field),
    /// The extractor saw a prompt-injection attempt.
    InjectionSuspected,
}

impl QualityFlag {
    /// The flag's kind, without the field payload.
    pub fn kind(&self) -> FlagKind {
        match self {
            Self::MissingField(_) => FlagKind::MissingField,
            Self::AmbiguousCategory => FlagKind::AmbiguousCategory,
            Self::RelativeTimeUnresolved => FlagKind::RelativeTimeUnresolved,
            Self::LowConfidence(_) => FlagKind::LowConfidence,
            Self::InjectionSuspected => FlagKind::InjectionSuspected,
        }
    }

    /// The field this flag is about, for field-scoped flags.
    pub fn field(&self) -> Option<Field> {
        match self {
            Self::MissingField(f) | Self::LowConfidence(f) => Some(*f),
            _ => None,
        }
    }

    /// Whether this flag forbids acceptance on its own.
    pub fn is_blocking(&self) -> bool {
        self.kind().is_blocking()
    }
}

impl std::fmt::Display for QualityFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.field() {
            Some(field) => write!(f, "{}({field})", self.kind()),
            None => write!(f, "{}", self.kind()),
        }
    }
}

/// The kind of a [`QualityFlag`], as referenced from policy predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagKind {
    /// See [`QualityFlag::MissingField`].
    MissingField,
    /// See [`QualityFlag::AmbiguousCategory`].
    AmbiguousCategory,
    /// See [`QualityFlag::RelativeTimeUnresolved`].
    RelativeTimeUnresolved,
    /// See [`QualityFlag::LowConfidence`].
    LowConfidence,
    /// See [`QualityFlag::InjectionSuspected`].
    InjectionSuspected,
}

impl FlagKind {
    /// Blocking kinds: a record carrying one is never accepted.
    pub fn is_blocking(&self) -> bool {
        matches!(
            self,
            Self::RelativeTimeUnresolved | Self::InjectionSuspected | Self::AmbiguousCategory
        )
    }

    /// Whether flags of this kind carry a field.
    pub fn is_field_scoped(&self) -> bool {
        matches!(self, Self::MissingField | Self::LowConfidence)
    }

    /// Wire name of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingField => "missing_field",
            Self::AmbiguousCategory => "ambiguous_category",
            Self::RelativeTimeUnresolved => "relative_time_unresolved",
            Self::LowConfidence => "low_confidence",
            Self::InjectionSuspected => "injection_suspected",
        }
    }
}

impl std::fmt::Display for FlagKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// QualityFlags
// ---------------------------------------------------------------------------

/// An ordered, duplicate-free set of quality flags.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QualityFlags(BTreeSet<QualityFlag>);

impl QualityFlags {
    /// An empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a flag. Returns false if it was already present.
    pub fn insert(&mut self, flag: QualityFlag) -> bool {
        self.0.insert(flag)
    }

    /// Whether exactly `flag` is set.
    pub fn contains(&self, flag: &QualityFlag) -> bool {
        self.0.contains(flag)
    }

    /// Whether any flag of `kind` is set, optionally restricted to `field`.
    pub fn has(&self, kind: FlagKind, field: Option<Field>) -> bool {
        self.0
            .iter()
            .any(|f| f.kind() == kind && (field.is_none() || f.field() == field))
    }

    /// Whether any blocking flag is set.
    pub fn has_blocking(&self) -> bool {
        self.0.iter().any(QualityFlag::is_blocking)
    }

    /// The blocking flags, in set order.
    pub fn blocking(&self) -> impl Iterator<Item = &QualityFlag> {
        self.0.iter().filter(|f| f.is_blocking())
    }

    /// Flags in set order.
    pub fn iter(&self) -> impl Iterator<Item = &QualityFlag> {
        self.0.iter()
    }

    /// Number of flags.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when no flag is set.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<QualityFlag> for QualityFlags {
    fn from_iter<I: IntoIterator<Item = QualityFlag>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Extend<QualityFlag> for QualityFlags {
    fn extend<I: IntoIterator<Item = QualityFlag>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

impl<'a> IntoIterator for &'a QualityFlags {
    type Item = &'a QualityFlag;
    type IntoIter = std::collections::btree_set::Iter<'a, QualityFlag>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
