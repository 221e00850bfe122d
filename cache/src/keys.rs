//! Derived physical keys for hash and set payloads.
//!
//! The derived namespaces keep hash/set storage disjoint from the plain
//! scalar namespace, so the same logical key can hold a scalar and a hash
//! or set independently.

/// Key of the single-blob hash payload.
/// Format: `{key}:hash`
pub fn hash_blob_key(key: &str) -> String {
    format!("{key}:hash")
}

/// Key of one hash field in the fielded layout.
/// Format: `{key}:hash:{field}`
pub fn hash_field_key(key: &str, field: &str) -> String {
    format!("{key}:hash:{field}")
}

/// Prefix enumerating every field of a hash in the fielded layout.
/// Format: `{key}:hash:`
pub fn hash_prefix(key: &str) -> String {
    format!("{key}:hash:")
}

/// Key of the membership blob of a set.
/// Format: `{key}:set`
pub fn set_key(key: &str) -> String {
    format!("{key}:set")
}

/// Field name encoded in a fielded hash key with the given prefix.
pub fn field_name<'a>(stored_key: &'a str, prefix: &str) -> &'a str {
    &stored_key[prefix.len()..]
}
