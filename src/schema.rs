//! Feature Schema
//!
//! The canonical feature registry, key normalization and value coercion. Every
//! row that reaches the preprocessor is built here, so it always carries every
//! registered key in registry order.
use hashbrown::HashMap;
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::{self, Display};
use std::sync::OnceLock;

/// Type of a registered feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureType {
    Numeric,
    Categorical,
}

/// A registered feature: canonical key, raw aliases, display name and type.
#[derive(Debug)]
pub struct FeatureDefinition {
    pub key: &'static str,
    pub aliases: &'static [&'static str],
    pub display_name: &'static str,
    pub feature_type: FeatureType,
}

const fn numeric(key: &'static str, aliases: &'static [&'static str], display_name: &'static str) -> FeatureDefinition {
    FeatureDefinition {
        key,
        aliases,
        display_name,
        feature_type: FeatureType::Numeric,
    }
}

const fn categorical(
    key: &'static str,
    aliases: &'static [&'static str],
    display_name: &'static str,
) -> FeatureDefinition {
    FeatureDefinition {
        key,
        aliases,
        display_name,
        feature_type: FeatureType::Categorical,
    }
}

pub static FEATURE_DEFINITIONS: [FeatureDefinition; 19] = [
    categorical("gender", &["Gender"], "Gender"),
    numeric("age", &["Age"], "Age"),
    numeric("logins", &["Logins"], "Logins"),
    numeric(
        "totalHoursInModuleArea",
        &["Total Hours in Module Area"],
        "Total Hours in Module Area",
    ),
    numeric(
        "percentOfAverageHours",
        &["% of Average Hours", "Percent of Average Hours"],
        "% of Average Hours",
    ),
    numeric("presence", &["Presence"], "Presence"),
    numeric("absence", &["Absence"], "Absence"),
    numeric("percentAttended", &["Percent Attended", "% Attended"], "Percent Attended"),
    categorical(
        "attendingFromHome",
        &["attending from home?", "Attending from home?"],
        "Attending from Home",
    ),
    numeric(
        "distanceToUniversityKm",
        &["distance to university (km)", "Distance to university (km)"],
        "Distance to University (km)",
    ),
    numeric("polar4Quintile", &["POLAR4 Quintile"], "POLAR4 Quintile"),
    numeric("polar3Quintile", &["POLAR3 Quintile"], "POLAR3 Quintile"),
    numeric("adultHe2001Quintile", &["Adult HE 2001 Quintile"], "Adult HE 2001 Quintile"),
    numeric("adultHe2011Quintile", &["Adult HE 2011 Quintile"], "Adult HE 2011 Quintile"),
    numeric("tundraMsoaQuintile", &["TUNDRA MSOA Quintile"], "TUNDRA MSOA Quintile"),
    numeric("tundraLsoaQuintile", &["TUNDRA LSOA Quintile"], "TUNDRA LSOA Quintile"),
    numeric("gapsGcseQuintile", &["Gaps GCSE Quintile"], "Gaps GCSE Quintile"),
    numeric(
        "gapsGcseEthnicityQuintile",
        &["Gaps GCSE Ethnicity Quintile"],
        "Gaps GCSE Ethnicity Quintile",
    ),
    categorical("uniConnectTargetWard", &["Uni Connect target ward"], "Uni Connect Target Ward"),
];

/// Registered keys in registry order.
pub fn feature_keys() -> impl Iterator<Item = &'static str> {
    FEATURE_DEFINITIONS.iter().map(|d| d.key)
}

/// Position of a canonical key in the registry.
pub fn feature_index(key: &str) -> Option<usize> {
    FEATURE_DEFINITIONS.iter().position(|d| d.key == key)
}

/// Look up a definition by canonical key.
pub fn definition(key: &str) -> Option<&'static FeatureDefinition> {
    FEATURE_DEFINITIONS.iter().find(|d| d.key == key)
}

/// Display name of a key, or the key itself when it is not registered.
pub fn display_name(key: &str) -> String {
    definition(key).map_or_else(|| key.to_string(), |d| d.display_name.to_string())
}

/// Case-fold and collapse whitespace.
pub fn fold_key(raw: &str) -> String {
    raw.split_whitespace()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

fn alias_table() -> &'static HashMap<String, &'static str> {
    static TABLE: OnceLock<HashMap<String, &'static str>> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table = HashMap::new();
        for def in FEATURE_DEFINITIONS.iter() {
            table.insert(fold_key(def.key), def.key);
            for alias in def.aliases {
                table.insert(fold_key(alias), def.key);
            }
        }
        table
    })
}

/// Resolve a raw or canonical name to its canonical key.
pub fn normalize_key(raw: &str) -> Option<&'static str> {
    alias_table().get(&fold_key(raw)).copied()
}

/// A typed feature value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Numeric(f64),
    Categorical(String),
    #[default]
    Missing,
}

impl FeatureValue {
    pub fn is_missing(&self) -> bool {
        matches!(self, FeatureValue::Missing)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FeatureValue::Numeric(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_category(&self) -> Option<&str> {
        match self {
            FeatureValue::Categorical(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// JSON representation for display. Non-finite numbers degrade to null.
    pub fn to_json(&self) -> Value {
        match self {
            FeatureValue::Numeric(v) => serde_json::Number::from_f64(*v).map_or(Value::Null, Value::Number),
            FeatureValue::Categorical(s) => Value::String(s.clone()),
            FeatureValue::Missing => Value::Null,
        }
    }
}

impl Display for FeatureValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FeatureValue::Numeric(v) => write!(f, "{}", v),
            FeatureValue::Categorical(s) => write!(f, "{}", s),
            FeatureValue::Missing => write!(f, "null"),
        }
    }
}

/// Coerce a raw JSON value to the given feature type.
pub fn convert_value(value: &Value, feature_type: FeatureType) -> Option<FeatureValue> {
    match value {
        Value::Null => None,
        Value::String(s) => {
            let stripped = s.trim();
            if stripped.is_empty() {
                return None;
            }
            match feature_type {
                FeatureType::Numeric => parse_finite(stripped).map(FeatureValue::Numeric),
                FeatureType::Categorical => Some(FeatureValue::Categorical(stripped.to_string())),
            }
        }
        Value::Bool(b) => match feature_type {
            FeatureType::Numeric => Some(FeatureValue::Numeric(if *b { 1.0 } else { 0.0 })),
            FeatureType::Categorical => Some(FeatureValue::Categorical(if *b { "yes" } else { "no" }.to_string())),
        },
        Value::Number(n) => match feature_type {
            FeatureType::Numeric => n.as_f64().filter(|v| v.is_finite()).map(FeatureValue::Numeric),
            FeatureType::Categorical => Some(FeatureValue::Categorical(n.to_string())),
        },
        Value::Array(_) | Value::Object(_) => match feature_type {
            FeatureType::Numeric => None,
            FeatureType::Categorical => Some(FeatureValue::Categorical(value.to_string())),
        },
    }
}

/// Parse a string as a finite float.
pub fn parse_finite(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Normalize every recognised key of the input and coerce its value, dropping
/// unknown keys and values that do not coerce.
pub fn normalize_features<'a, I>(input: I) -> Vec<(&'static str, FeatureValue)>
where
    I: IntoIterator<Item = (&'a String, &'a Value)>,
{
    let mut normalized: Vec<(&'static str, FeatureValue)> = Vec::new();
    for (raw_key, raw_value) in input {
        let Some(key) = normalize_key(raw_key) else {
            debug!("Dropping unknown feature key {:?}.", raw_key);
            continue;
        };
        let Some(def) = definition(key) else {
            continue;
        };
        let Some(converted) = convert_value(raw_value, def.feature_type) else {
            continue;
        };
        match normalized.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = converted,
            None => normalized.push((key, converted)),
        }
    }
    normalized
}

/// A full-width row, one value per registered key in registry order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    values: Vec<FeatureValue>,
}

impl Default for FeatureRow {
    fn default() -> Self {
        Self::empty()
    }
}

impl FeatureRow {
    /// A row with every key missing.
    pub fn empty() -> Self {
        FeatureRow {
            values: vec![FeatureValue::Missing; FEATURE_DEFINITIONS.len()],
        }
    }

    pub fn get(&self, key: &str) -> Option<&FeatureValue> {
        feature_index(key).map(|i| &self.values[i])
    }

    /// Set a registered key, returning false for unknown keys.
    pub fn set(&mut self, key: &str, value: FeatureValue) -> bool {
        match feature_index(key) {
            Some(i) => {
                self.values[i] = value;
                true
            }
            None => false,
        }
    }

    pub fn value_at(&self, index: usize) -> &FeatureValue {
        &self.values[index]
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Pairs of (definition, value) in registry order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static FeatureDefinition, &FeatureValue)> {
        FEATURE_DEFINITIONS.iter().zip(self.values.iter())
    }
}

/// Normalize and complete an input map into a full row.
pub fn build_full_row<'a, I>(input: I) -> FeatureRow
where
    I: IntoIterator<Item = (&'a String, &'a Value)>,
{
    let mut row = FeatureRow::empty();
    for (key, value) in normalize_features(input) {
        row.set(key, value);
    }
    row
}
