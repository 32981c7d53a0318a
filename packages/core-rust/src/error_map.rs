//! Server-supplied error map.
//!
//! Servers publish a JSON document describing their status codes. A transport
//! attaches the matching [`ErrorMapEntry`] to each failed reply so the detail
//! travels with the error for logging.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::status::Status;

/// Errors produced while loading an error map.
#[derive(Debug, thiserror::Error)]
pub enum ErrorMapError {
    #[error("malformed error map JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("error map key is not a hex status code: {0:?}")]
    InvalidCode(String),
}

/// One diagnostic entry from the server error map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMapEntry {
    pub name: String,
    #[serde(rename = "desc")]
    pub description: String,
    #[serde(rename = "attrs", default)]
    pub attributes: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawErrorMap {
    version: u16,
    revision: u32,
    errors: HashMap<String, ErrorMapEntry>,
}

/// Parsed server error map keyed by raw status code.
#[derive(Debug, Clone, Default)]
pub struct ErrorMap {
    pub version: u16,
    pub revision: u32,
    entries: HashMap<u16, ErrorMapEntry>,
}

impl ErrorMap {
    /// Parses the JSON document a server returns for the error map request.
    ///
    /// # Errors
    ///
    /// Returns `ErrorMapError::Json` if the document is not valid JSON of the
    /// expected shape, or `ErrorMapError::InvalidCode` if an `errors` key is not
    /// a hexadecimal status code.
    pub fn from_json(bytes: &[u8]) -> Result<Self, ErrorMapError> {
        let raw: RawErrorMap = serde_json::from_slice(bytes)?;
        let mut entries = HashMap::with_capacity(raw.errors.len());
        for (key, entry) in raw.errors {
            let digits = key.trim_start_matches("0x");
            let code = u16::from_str_radix(digits, 16)
                .map_err(|_| ErrorMapError::InvalidCode(key.clone()))?;
            entries.insert(code, entry);
        }
        Ok(Self {
            version: raw.version,
            revision: raw.revision,
            entries,
        })
    }

    /// Looks up the entry describing `status`, if the server published one.
    #[must_use]
    pub fn entry(&self, status: Status) -> Option<&ErrorMapEntry> {
        self.entries.get(&status.code())
    }

    /// Number of entries in the map.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "version": 1,
        "revision": 4,
        "errors": {
            "1": {"name": "KEY_ENOENT", "desc": "Not Found", "attrs": ["item-only"]},
            "9": {"name": "LOCKED", "desc": "Requested resource is locked", "attrs": ["item-locked", "retry-later"]},
            "c0": {"name": "SUBDOC_PATH_ENOENT", "desc": "Subdoc: Path not does not exist"}
        }
    }"#;

    #[test]
    fn parses_entries_by_hex_code() {
        let map = ErrorMap::from_json(SAMPLE.as_bytes()).unwrap();
        assert_eq!(map.version, 1);
        assert_eq!(map.revision, 4);
        assert_eq!(map.len(), 3);

        let locked = map.entry(Status::Locked).unwrap();
        assert_eq!(locked.name, "LOCKED");
        assert_eq!(locked.attributes, vec!["item-locked", "retry-later"]);

        let path = map.entry(Status::SubDocPathNotFound).unwrap();
        assert!(path.attributes.is_empty());
    }

    #[test]
    fn missing_entries_are_none() {
        let map = ErrorMap::from_json(SAMPLE.as_bytes()).unwrap();
        assert!(map.entry(Status::Busy).is_none());
    }

    #[test]
    fn rejects_non_hex_keys() {
        let doc = r#"{"version":1,"revision":1,"errors":{"zz":{"name":"X","desc":"Y"}}}"#;
        let err = ErrorMap::from_json(doc.as_bytes()).unwrap_err();
        assert!(matches!(err, ErrorMapError::InvalidCode(ref k) if k == "zz"));
    }

    #[test]
    fn rejects_malformed_json() {
        let err = ErrorMap::from_json(b"{not json").unwrap_err();
        assert!(matches!(err, ErrorMapError::Json(_)));
    }
}
