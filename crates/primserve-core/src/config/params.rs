use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, path::Path, str::FromStr};

/// Flat `key → value` store of tunable generator parameters.
///
/// Keys are dotted paths such as `BoxGun.number`. Values are kept as strings
/// and parsed on access, so a parameter file and a command-line override can
/// set the same key without agreeing on a schema up front.
///
/// Layering follows the usual precedence: defaults in code, then a config
/// file ([`ParamStore::update_from_file`]), then `key=value` overrides
/// ([`ParamStore::update_from_string`]).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamStore(BTreeMap<String, String>);

impl ParamStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn raw(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Parses the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the value does not parse as `T`.
    pub fn get<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: core::fmt::Display,
    {
        self.raw(key)
            .map(|raw| {
                raw.trim().parse::<T>().map_err(|e| {
                    Error::invalid_config(format!("parameter {key}={raw:?} is invalid: {e}"))
                })
            })
            .transpose()
    }

    /// Parses the value stored under `key`, falling back to `default`.
    ///
    /// # Errors
    ///
    /// See [`ParamStore::get`].
    pub fn get_or<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: core::fmt::Display,
    {
        Ok(self.get(key)?.unwrap_or(default))
    }

    /// Applies `key=value` overrides separated by `;`.
    ///
    /// Empty segments are ignored, so trailing separators are harmless.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] for a segment without `=` or with an
    /// empty key. Nothing is applied in that case.
    pub fn update_from_string(&mut self, overrides: &str) -> Result<()> {
        let mut parsed = Vec::new();
        for token in overrides.split(';').map(str::trim).filter(|t| !t.is_empty()) {
            let (key, value) = token.split_once('=').ok_or_else(|| {
                Error::invalid_config(format!("override {token:?} is not of the form key=value"))
            })?;
            let key = key.trim();
            if key.is_empty() {
                return Err(Error::invalid_config(format!(
                    "override {token:?} has an empty key"
                )));
            }
            parsed.push((key.to_string(), value.trim().to_string()));
        }
        self.0.extend(parsed);
        Ok(())
    }

    /// Applies every parameter found in a JSON file.
    ///
    /// Nested objects are flattened into dotted keys, so
    /// `{"BoxGun": {"number": 10}}` sets `BoxGun.number=10`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the file cannot be read, is not
    /// JSON, or its top level is not an object.
    pub fn update_from_file(&mut self, path: &Path) -> Result<()> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::invalid_config(format!("cannot read config file {}: {e}", path.display()))
        })?;
        self.update_from_json(&contents).map_err(|e| match e {
            Error::InvalidConfig { reason } => {
                Error::invalid_config(format!("{}: {reason}", path.display()))
            }
            other => other,
        })
    }

    /// Same as [`ParamStore::update_from_file`] for an in-memory document.
    ///
    /// # Errors
    ///
    /// See [`ParamStore::update_from_file`].
    pub fn update_from_json(&mut self, contents: &str) -> Result<()> {
        let document: serde_json::Value = serde_json::from_str(contents)
            .map_err(|e| Error::invalid_config(format!("config is not valid JSON: {e}")))?;
        let serde_json::Value::Object(root) = document else {
            return Err(Error::invalid_config("config root must be an object"));
        };

        let mut flat = Vec::new();
        flatten("", &serde_json::Value::Object(root), &mut flat);
        self.0.extend(flat);
        Ok(())
    }
}

fn flatten(prefix: &str, value: &serde_json::Value, out: &mut Vec<(String, String)>) {
    use serde_json::Value;

    match value {
        Value::Object(map) => {
            for (key, nested) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                flatten(&path, nested, out);
            }
        }
        Value::String(s) => out.push((prefix.to_string(), s.clone())),
        Value::Null => out.push((prefix.to_string(), String::new())),
        other => out.push((prefix.to_string(), other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_are_applied_in_order() {
        let mut params = ParamStore::new();
        params
            .update_from_string("BoxGun.number=10; BoxGun.pdg = 211;;BoxGun.number=12;")
            .unwrap();
        assert_eq!(params.get::<u32>("BoxGun.number").unwrap(), Some(12));
        assert_eq!(params.get::<i32>("BoxGun.pdg").unwrap(), Some(211));
        assert_eq!(params.get::<i32>("BoxGun.missing").unwrap(), None);
        assert_eq!(params.get_or("BoxGun.missing", 5_i32).unwrap(), 5);
    }

    #[test]
    fn malformed_overrides_apply_nothing() {
        let mut params = ParamStore::new();
        let err = params.update_from_string("a=1;b").unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { .. }));
        assert!(params.is_empty());

        assert!(params.update_from_string("=3").is_err());
    }

    #[test]
    fn unparsable_values_are_config_errors() {
        let mut params = ParamStore::new();
        params.set("BoxGun.number", "many");
        assert!(matches!(
            params.get::<u32>("BoxGun.number"),
            Err(Error::InvalidConfig { .. })
        ));
    }

    #[test]
    fn json_documents_flatten_into_dotted_keys() {
        let mut params = ParamStore::new();
        params
            .update_from_json(r#"{"BoxGun": {"number": 10, "eta": {"min": -1.5}}, "Tag": "x", "Flag": true}"#)
            .unwrap();
        assert_eq!(params.raw("BoxGun.number"), Some("10"));
        assert_eq!(params.get::<f64>("BoxGun.eta.min").unwrap(), Some(-1.5));
        assert_eq!(params.raw("Tag"), Some("x"));
        assert_eq!(params.get::<bool>("Flag").unwrap(), Some(true));

        assert!(params.update_from_json("[1, 2]").is_err());
        assert!(params.update_from_json("{").is_err());
    }

    #[test]
    fn missing_files_are_reported() {
        let mut params = ParamStore::new();
        let err = params
            .update_from_file(Path::new("/definitely/not/here.json"))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { .. }));
    }
}
