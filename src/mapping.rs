//! Column mapping resolution shared by renaming and retyping.
//!
//! A [`ColumnMapping`] maps column names to a target string: a new column name
//! for renaming, or a dtype tag for conversion. Mappings come either straight
//! from the caller or from a flat JSON object on disk. [`resolve_mapping`]
//! decides which one applies; a missing or unusable file is a normal outcome
//! reported through the log, never an error.

use std::{fs, path::Path};

use log::{info, warn};
use serde_json::Value as JsonValue;

use crate::error::{CleanError, CleanResult};

/// Ordered column-name → target mapping. Insertion order is preserved so that
/// per-column reports follow the order the mapping was written in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMapping {
    entries: Vec<(String, String)>,
}

impl ColumnMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces an entry, keeping the original position on replace.
    pub fn insert(&mut self, key: impl Into<String>, target: impl Into<String>) {
        let key = key.into();
        let target = target.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, slot)) => *slot = target,
            None => self.entries.push((key, target)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, target)| target.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(key, target)| (key.as_str(), target.as_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Builds a mapping from a JSON object. Scalar values are rendered as
    /// text (`{"a": 1}` maps `a` to `"1"`); nested values are rejected.
    pub fn from_json(value: &JsonValue) -> Result<Self, String> {
        let object = value
            .as_object()
            .ok_or_else(|| "mapping file must contain a JSON object".to_string())?;
        let mut mapping = ColumnMapping::new();
        for (key, target) in object {
            let rendered = match target {
                JsonValue::String(s) => s.clone(),
                JsonValue::Number(n) => n.to_string(),
                JsonValue::Bool(b) => b.to_string(),
                JsonValue::Null => "null".to_string(),
                JsonValue::Array(_) | JsonValue::Object(_) => {
                    return Err(format!("value for key '{key}' must be a string or scalar"));
                }
            };
            mapping.insert(key.clone(), rendered);
        }
        Ok(mapping)
    }

    /// Writes the mapping as a pretty-printed JSON object.
    pub fn save(&self, path: &Path) -> CleanResult<()> {
        let object = self
            .entries
            .iter()
            .map(|(key, target)| (key.clone(), JsonValue::String(target.clone())))
            .collect::<serde_json::Map<_, _>>();
        let serialized = serde_json::to_string_pretty(&JsonValue::Object(object))?;
        fs::write(path, serialized).map_err(CleanError::from)
    }
}

impl<K, V> FromIterator<(K, V)> for ColumnMapping
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut mapping = ColumnMapping::new();
        for (key, target) in iter {
            mapping.insert(key, target);
        }
        mapping
    }
}

/// Reads a flat JSON mapping file.
///
/// Returns `None` after a warning when the path does not exist or the file
/// cannot be read or parsed.
pub fn read_json_mapping(path: &Path) -> Option<ColumnMapping> {
    if !path.exists() {
        warn!("Mapping file {path:?} does not exist. No data loaded");
        return None;
    }
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) => {
            warn!("Mapping file {path:?} could not be read ({err}). No data loaded");
            return None;
        }
    };
    let parsed = serde_json::from_str::<JsonValue>(&raw)
        .map_err(|err| err.to_string())
        .and_then(|value| ColumnMapping::from_json(&value));
    match parsed {
        Ok(mapping) => Some(mapping),
        Err(err) => {
            warn!("Mapping file {path:?} is not a flat JSON object ({err}). No data loaded");
            None
        }
    }
}

/// Decides which mapping an operation should apply.
///
/// A non-empty `direct` mapping always wins and the file is not touched.
/// Otherwise `path` is loaded; an absent, unreadable or empty file yields
/// `None`. With neither supplied the result is `None` as well. Every outcome
/// is logged and tagged with `context`.
pub fn resolve_mapping(
    direct: Option<&ColumnMapping>,
    path: Option<&Path>,
    context: &str,
) -> Option<ColumnMapping> {
    if let Some(mapping) = direct.filter(|mapping| !mapping.is_empty()) {
        info!("{context} mapped using direct mapping");
        return Some(mapping.clone());
    }
    if let Some(path) = path {
        return match read_json_mapping(path) {
            Some(mapping) if !mapping.is_empty() => {
                info!("{context} mapped using {}", path.display());
                Some(mapping)
            }
            _ => {
                warn!(
                    "{context}: mapping JSON failed to load from {}. Nothing changed",
                    path.display()
                );
                None
            }
        };
    }
    warn!("Neither a direct mapping nor a mapping file was specified for {context}. Nothing changed");
    None
}
