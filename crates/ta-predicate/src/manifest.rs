// manifest.rs — Declarative allowlists compiled against a host catalog.
//
// Hosts that keep their predicate allowlist in a config file describe it as
// a YAML manifest:
//
// ```yaml
// baseline: standard
// limits:
//   max_depth: 32
// types:
//   - name: Object
//     identifier: app.Object
// accessors:
//   - name: Object.a
// provided_by:
//   - type: Object
//     recursive: true
// ```
//
// A manifest only names things. The host supplies a `Catalog` mapping those
// names to the actual types, accessors and records it is prepared to expose,
// and `ConfigurationManifest::compile` turns the pair into a `Configuration`.
// A name the catalog does not know fails the whole compile, so a typo in a
// manifest can never widen or silently narrow the allowlist.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::accessor::Accessor;
use crate::configuration::{CodecLimits, Configuration, TypeConstructor, TypeKind};
use crate::error::ConfigurationError;
use crate::value::{RecordType, ValueType};

/// Where a compiled configuration starts from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Baseline {
    /// [`Configuration::standard`].
    #[default]
    Standard,
    /// [`Configuration::new`]: nothing allowed.
    Empty,
}

/// One allowed type or accessor: its catalog name and, optionally, the wire
/// identifier to register it under (defaults to the name).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
}

impl ManifestEntry {
    fn identifier(&self) -> &str {
        self.identifier.as_deref().unwrap_or(&self.name)
    }
}

/// Bulk registration of a record's self-declared accessors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvidedBy {
    #[serde(rename = "type")]
    pub record: String,
    #[serde(default)]
    pub recursive: bool,
}

/// A predicate allowlist as written in a YAML file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigurationManifest {
    #[serde(default)]
    pub baseline: Baseline,
    #[serde(default)]
    pub limits: CodecLimits,
    #[serde(default)]
    pub types: Vec<ManifestEntry>,
    #[serde(default)]
    pub accessors: Vec<ManifestEntry>,
    #[serde(default)]
    pub provided_by: Vec<ProvidedBy>,
}

impl ConfigurationManifest {
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigurationError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Read a manifest file.
    pub fn load(path: &Path) -> Result<Self, ConfigurationError> {
        let data = fs::read_to_string(path).map_err(|source| ConfigurationError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&data)
    }

    /// Resolve every name against `catalog` and build the configuration.
    pub fn compile(&self, catalog: &Catalog) -> Result<Configuration, ConfigurationError> {
        let mut config = match self.baseline {
            Baseline::Standard => Configuration::standard(),
            Baseline::Empty => Configuration::new(),
        }
        .with_limits(self.limits)?;

        for entry in &self.types {
            match catalog.types.get(&entry.name) {
                Some(TypeKind::Full(ty)) => config.allow_type(ty.clone(), entry.identifier())?,
                Some(TypeKind::Partial(constructor)) => {
                    config.allow_partial_type(*constructor, entry.identifier())?
                }
                None => return Err(unknown("type", &entry.name)),
            }
        }

        for entry in &self.accessors {
            let accessor = catalog
                .accessors
                .get(&entry.name)
                .ok_or_else(|| unknown("accessor", &entry.name))?;
            config.allow_accessor(accessor.clone(), entry.identifier())?;
        }

        for provided in &self.provided_by {
            let record = catalog
                .records
                .get(&provided.record)
                .copied()
                .ok_or_else(|| unknown("record", &provided.record))?;
            config.allow_accessors_provided_by(record, provided.recursive)?;
        }

        tracing::info!(
            "predicate allowlist compiled: {} types, {} accessors",
            config.type_identifiers().len(),
            config.accessor_identifiers().len()
        );
        Ok(config)
    }
}

fn unknown(kind: &'static str, name: &str) -> ConfigurationError {
    ConfigurationError::UnknownCatalogEntry {
        kind,
        name: name.to_string(),
    }
}

/// The types, accessors and records a host is willing to let a manifest
/// name.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    types: HashMap<String, TypeKind>,
    accessors: HashMap<String, Accessor>,
    records: HashMap<String, &'static RecordType>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_type(mut self, name: impl Into<String>, ty: ValueType) -> Self {
        self.types.insert(name.into(), TypeKind::Full(ty));
        self
    }

    pub fn with_partial_type(
        mut self,
        name: impl Into<String>,
        constructor: TypeConstructor,
    ) -> Self {
        self.types
            .insert(name.into(), TypeKind::Partial(constructor));
        self
    }

    pub fn with_accessor(mut self, name: impl Into<String>, accessor: Accessor) -> Self {
        self.accessors.insert(name.into(), accessor);
        self
    }

    /// Offer a record for `provided_by`, and as a type under its own name
    /// unless that name is already taken.
    pub fn with_record(mut self, record: &'static RecordType) -> Self {
        self.types
            .entry(record.name.to_string())
            .or_insert(TypeKind::Full(ValueType::Record(record)));
        self.records.insert(record.name.to_string(), record);
        self
    }
}
