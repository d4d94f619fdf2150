use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

// ---------------------------------------------------------------------------
// Reconcilers
// ---------------------------------------------------------------------------

/// How a reconciliator builds its request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcilerKind {
    /// Labels only.
    Lookup,
    /// Labels plus up to two secondary context columns (`secondPart`,
    /// `thirdPart`).
    Geocoding,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcilerSpec {
    pub kind: ReconcilerKind,
    /// Knowledge-base prefix recorded in the column context.
    pub prefix: String,
    /// Base URI for entity links.
    pub uri: String,
}

/// A reconciliator resolved from the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciler {
    pub id: String,
    pub spec: ReconcilerSpec,
}

impl Reconciler {
    pub fn kind(&self) -> ReconcilerKind {
        self.spec.kind
    }

    /// Entity URI for a candidate id (`geo:123` -> `<uri>123`).
    pub fn entity_uri(&self, candidate_id: &str) -> String {
        let local = candidate_id.rsplit(':').next().unwrap_or(candidate_id);
        format!("{}{local}", self.spec.uri)
    }
}

// ---------------------------------------------------------------------------
// Extenders
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtenderKind {
    /// Sibling columns projected from the canonical candidates already in
    /// the table. No network.
    DerivedFromReconciled,
    /// Columns fetched from a remote extension service.
    ExternalService,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtensionParam {
    DateColumn,
    DecimalFormat,
}

impl ExtensionParam {
    pub fn name(self) -> &'static str {
        match self {
            Self::DateColumn => "date_column",
            Self::DecimalFormat => "decimal_format",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtenderSpec {
    pub kind: ExtenderKind,
    #[serde(default)]
    pub required: Vec<ExtensionParam>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extender {
    pub id: String,
    pub spec: ExtenderSpec,
}

impl Extender {
    pub fn kind(&self) -> ExtenderKind {
        self.spec.kind
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Supported service ids and their strategy tags.
///
/// Engines never branch on service ids; they receive a resolved
/// [`Reconciler`] or [`Extender`] from here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRegistry {
    #[serde(default)]
    pub reconcilers: BTreeMap<String, ReconcilerSpec>,
    #[serde(default)]
    pub extenders: BTreeMap<String, ExtenderSpec>,
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ServiceRegistry {
    pub fn builtin() -> Self {
        let mut reconcilers = BTreeMap::new();
        reconcilers.insert(
            "geocodingHere".to_string(),
            ReconcilerSpec {
                kind: ReconcilerKind::Geocoding,
                prefix: "georss".into(),
                uri: "http://www.google.com/maps/place/".into(),
            },
        );
        reconcilers.insert(
            "geocodingGeonames".to_string(),
            ReconcilerSpec {
                kind: ReconcilerKind::Geocoding,
                prefix: "geo".into(),
                uri: "http://www.geonames.org/".into(),
            },
        );
        reconcilers.insert(
            "geonames".to_string(),
            ReconcilerSpec {
                kind: ReconcilerKind::Lookup,
                prefix: "geo".into(),
                uri: "http://www.geonames.org/".into(),
            },
        );

        let mut extenders = BTreeMap::new();
        extenders.insert(
            "reconciledColumnExt".to_string(),
            ExtenderSpec {
                kind: ExtenderKind::DerivedFromReconciled,
                required: Vec::new(),
            },
        );
        extenders.insert(
            "meteoPropertiesOpenMeteo".to_string(),
            ExtenderSpec {
                kind: ExtenderKind::ExternalService,
                required: vec![ExtensionParam::DateColumn, ExtensionParam::DecimalFormat],
            },
        );

        Self { reconcilers, extenders }
    }

    /// Built-in entries overlaid with the ones in `input`.
    pub fn from_toml(input: &str) -> Result<Self, ValidationError> {
        let overlay: ServiceRegistry =
            toml::from_str(input).map_err(|e| ValidationError::InvalidRegistry(e.to_string()))?;
        let mut registry = Self::builtin();
        registry.reconcilers.extend(overlay.reconcilers);
        registry.extenders.extend(overlay.extenders);
        registry.validate()?;
        Ok(registry)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        for (id, spec) in &self.reconcilers {
            if spec.prefix.is_empty() {
                return Err(ValidationError::InvalidRegistry(format!(
                    "reconciliator '{id}' has an empty prefix"
                )));
            }
        }
        Ok(())
    }

    pub fn reconciler(&self, id: &str) -> Result<Reconciler, ValidationError> {
        self.reconcilers
            .get(id)
            .map(|spec| Reconciler {
                id: id.to_string(),
                spec: spec.clone(),
            })
            .ok_or_else(|| ValidationError::UnsupportedReconciler(id.to_string()))
    }

    pub fn extender(&self, id: &str) -> Result<Extender, ValidationError> {
        self.extenders
            .get(id)
            .map(|spec| Extender {
                id: id.to_string(),
                spec: spec.clone(),
            })
            .ok_or_else(|| ValidationError::UnsupportedExtender(id.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
