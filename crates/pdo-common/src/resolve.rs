//! Typed lookups over Secret and ConfigMap payloads
//!
//! Secrets carry bytes and ConfigMaps carry strings; both are handled by the
//! same helpers through `AsRef<[u8]>`. Every required key must exist and be
//! non-empty. Numeric keys must additionally parse as a `u32`.

use std::collections::BTreeMap;

use tracing::debug;

use crate::{Error, Result};

/// Format the `namespace/name` reference used in error context
pub fn object_ref(namespace: &str, name: &str) -> String {
    format!("{}/{}", namespace, name)
}

/// Read a required, non-empty string value
///
/// Non-UTF-8 bytes are decoded lossily; Secret payloads are plain text here.
pub fn required_key<V: AsRef<[u8]>>(
    data: &BTreeMap<String, V>,
    key: &str,
    object: &str,
) -> Result<String> {
    let raw = data
        .get(key)
        .ok_or_else(|| Error::missing_key(key, object))?;

    let value = String::from_utf8_lossy(raw.as_ref()).into_owned();
    if value.is_empty() {
        return Err(Error::empty_value(key, object));
    }
    Ok(value)
}

/// Read a required value and parse it as a non-negative 32-bit integer
pub fn required_u32<V: AsRef<[u8]>>(
    data: &BTreeMap<String, V>,
    key: &str,
    object: &str,
) -> Result<u32> {
    let value = required_key(data, key, object)?;
    value
        .parse::<u32>()
        .map_err(|source| Error::InvalidNumber {
            key: key.to_string(),
            object: object.to_string(),
            value,
            source,
        })
}

/// Read an optional value, falling back to `default` on any resolution failure
///
/// The failure is swallowed on purpose: an absent or empty key is a valid
/// configuration for optional settings.
pub fn optional_key_or<V: AsRef<[u8]>>(
    data: &BTreeMap<String, V>,
    key: &str,
    object: &str,
    default: &str,
) -> String {
    match required_key(data, key, object) {
        Ok(value) => value,
        Err(e) => {
            debug!(key = %key, error = %e, default = %default, "Using default for optional key");
            default.to_string()
        }
    }
}
