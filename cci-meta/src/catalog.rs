//! Package records and the aggregated catalog

use cci_parser::{BasicInfo, RecipeProperties};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::debug;

use crate::resolve::ResolvedProperties;
use crate::{Error, Result};

/// Build-system properties, in declaration order
pub type Properties = IndexMap<String, serde_json::Value>;

/// Accept a license declared as a scalar, a sequence or null.
///
/// Empty strings and null read as no license (`[]`), never as `[""]`.
pub fn deserialize_license<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum LicenseHelper {
        Single(String),
        Many(Vec<String>),
    }

    Ok(match Option::<LicenseHelper>::deserialize(deserializer)? {
        Some(LicenseHelper::Single(id)) if id.is_empty() => Vec::new(),
        Some(LicenseHelper::Single(id)) => vec![id],
        Some(LicenseHelper::Many(ids)) => ids,
        None => Vec::new(),
    })
}

/// Catalog entry of one package
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackageRecord {
    #[serde(default)]
    pub description: String,

    #[serde(default, deserialize_with = "deserialize_license")]
    pub license: Vec<String>,

    /// Basic info came from live inspection rather than parsing
    #[serde(rename = "v2", default)]
    pub schema_compat: bool,

    #[serde(flatten)]
    pub build_properties: Properties,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub components: Option<IndexMap<String, Properties>>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub versions: Vec<String>,
}

impl PackageRecord {
    fn merge_components<I>(&mut self, components: I, overwrite: bool)
    where
        I: IntoIterator<Item = (String, Properties)>,
    {
        for (name, properties) in components {
            if properties.is_empty() {
                continue;
            }
            let target = self
                .components
                .get_or_insert_with(IndexMap::new)
                .entry(name)
                .or_default();
            for (key, value) in properties {
                if overwrite {
                    target.insert(key, value);
                } else {
                    target.entry(key).or_insert(value);
                }
            }
        }
    }
}

/// Resolution outcome of one package
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Outcome {
    SucceededStatic,
    SucceededInspect,
    SucceededInstall,
    FailedOnce,
    FailedTwice,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::SucceededStatic => "succeededStatic",
            Outcome::SucceededInspect => "succeededInspect",
            Outcome::SucceededInstall => "succeededInstall",
            Outcome::FailedOnce => "failedOnce",
            Outcome::FailedTwice => "failedTwice",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(
            self,
            Outcome::SucceededStatic | Outcome::SucceededInspect | Outcome::SucceededInstall
        )
    }

    /// Outcomes only move forward: a first-tier result, then for failed
    /// packages one install-based result.
    pub fn can_advance(from: Option<Outcome>, to: Outcome) -> bool {
        match from {
            None => matches!(
                to,
                Outcome::SucceededStatic | Outcome::SucceededInspect | Outcome::FailedOnce
            ),
            Some(Outcome::FailedOnce) => {
                matches!(to, Outcome::SucceededInstall | Outcome::FailedTwice)
            }
            Some(_) => false,
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-package outcome summary of a run
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub total: usize,
    pub successes: usize,
    /// Packages still unresolved after install-based resolution
    pub failures: Vec<String>,
    pub outcomes: IndexMap<String, Outcome>,
    /// Reason of the latest failure of each failed package
    pub reasons: IndexMap<String, String>,
}

/// All package records of a run plus their outcome bookkeeping
#[derive(Debug, Default)]
pub struct Catalog {
    records: IndexMap<String, PackageRecord>,
    outcomes: IndexMap<String, Outcome>,
    reasons: IndexMap<String, String>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the empty record of a package. Returns false if it exists.
    pub fn create(&mut self, name: &str) -> bool {
        if self.records.contains_key(name) {
            return false;
        }
        self.records.insert(name.to_string(), PackageRecord::default());
        true
    }

    pub fn contains(&self, name: &str) -> bool {
        self.records.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&PackageRecord> {
        self.records.get(name)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = (&String, &PackageRecord)> {
        self.records.iter()
    }

    pub fn set_basic_info(&mut self, name: &str, info: BasicInfo, schema_compat: bool) {
        if let Some(record) = self.records.get_mut(name) {
            record.description = info.description;
            record.license = info.license;
            record.schema_compat = schema_compat;
        }
    }

    /// Merge statically extracted properties without touching keys that
    /// are already set.
    pub fn merge_static(&mut self, name: &str, properties: &RecipeProperties) {
        let Some(record) = self.records.get_mut(name) else {
            return;
        };
        for (key, value) in &properties.global {
            record
                .build_properties
                .entry(key.clone())
                .or_insert_with(|| serde_json::Value::String(value.clone()));
        }
        record.merge_components(
            properties.components.iter().map(|(component, props)| {
                let props = props
                    .iter()
                    .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
                    .collect();
                (component.clone(), props)
            }),
            false,
        );
    }

    /// Merge properties computed by the engine; they win over parsed ones.
    pub fn merge_resolved(&mut self, name: &str, properties: ResolvedProperties) {
        let Some(record) = self.records.get_mut(name) else {
            return;
        };
        record.build_properties.extend(properties.global);
        record.merge_components(properties.components, true);
    }

    /// Append a published version. Returns false for unknown packages.
    pub fn append_version(&mut self, name: &str, version: &str) -> bool {
        match self.records.get_mut(name) {
            Some(record) => {
                record.versions.push(version.to_string());
                true
            }
            None => false,
        }
    }

    /// Most recently appended version
    pub fn latest_version(&self, name: &str) -> Option<&str> {
        self.records.get(name)?.versions.last().map(String::as_str)
    }

    pub fn outcome(&self, name: &str) -> Option<Outcome> {
        self.outcomes.get(name).copied()
    }

    /// Record an outcome. Backward transitions are refused.
    pub fn mark(&mut self, name: &str, outcome: Outcome) -> bool {
        if !self.records.contains_key(name) {
            return false;
        }
        let current = self.outcome(name);
        if !Outcome::can_advance(current, outcome) {
            debug!(
                "Refusing outcome change for {}: {:?} -> {}",
                name, current, outcome
            );
            return false;
        }
        self.outcomes.insert(name.to_string(), outcome);
        if outcome.is_success() {
            self.reasons.shift_remove(name);
        }
        true
    }

    /// Record a failed outcome together with its reason
    pub fn fail(&mut self, name: &str, outcome: Outcome, reason: impl Into<String>) -> bool {
        let marked = self.mark(name, outcome);
        if marked {
            self.reasons.insert(name.to_string(), reason.into());
        }
        marked
    }

    /// Packages currently in `outcome`, in walk order
    pub fn with_outcome(&self, outcome: Outcome) -> Vec<String> {
        self.outcomes
            .iter()
            .filter(|(_, o)| **o == outcome)
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn reason(&self, name: &str) -> Option<&str> {
        self.reasons.get(name).map(String::as_str)
    }

    pub fn report(&self) -> Report {
        Report {
            total: self.records.len(),
            successes: self.outcomes.values().filter(|o| o.is_success()).count(),
            failures: self.with_outcome(Outcome::FailedTwice),
            outcomes: self.outcomes.clone(),
            reasons: self.reasons.clone(),
        }
    }

    /// Serialize as `{"libraries": {...}}` with four-space indentation
    pub fn to_json(&self) -> Result<String> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut serializer)?;
        String::from_utf8(buf).map_err(|e| Error::Other(e.to_string()))
    }
}

impl Serialize for Catalog {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Libraries<'a> {
            libraries: &'a IndexMap<String, PackageRecord>,
        }

        Libraries {
            libraries: &self.records,
        }
        .serialize(serializer)
    }
}
