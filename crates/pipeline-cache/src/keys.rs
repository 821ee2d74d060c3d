//! Cache key builders for every pipeline cache entry.
//!
//! Keys are colon-separated and deterministic: parameter maps are hashed
//! from a canonical JSON rendering with sorted keys, so two maps holding
//! the same pairs always produce the same key. Hashes are truncated, which
//! is fine for cache addressing but not for identity.

use std::fmt::Write as _;

use md5::{Digest, Md5};
use serde_json::Value;
use sha2::Sha256;

use pipeline_core::traits::entity::Entity;

/// Prefix of model-level cache entries.
pub const MODEL_PREFIX: &str = "model_cache";
/// Prefix of manager-level cache entries.
pub const MANAGER_PREFIX: &str = "cache_manager";
/// Prefix of cached token validations.
pub const TOKEN_PREFIX: &str = "token_auth";
/// Prefix of memoized method results.
pub const METHOD_PREFIX: &str = "method";

/// Hash length of model-level keys.
pub const MODEL_HASH_LEN: usize = 8;
/// Hash length of manager-level keys.
pub const MANAGER_HASH_LEN: usize = 12;

/// Builds `{prefix}:{model}:{cache_type}[:{identifier}][:{hash}]` keys for
/// one model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKeyBuilder {
    prefix: String,
    model: String,
    hash_len: usize,
}

impl CacheKeyBuilder {
    pub fn new(prefix: impl Into<String>, model: &str, hash_len: usize) -> Self {
        Self {
            prefix: prefix.into(),
            model: model.to_lowercase(),
            hash_len,
        }
    }

    /// Model-level keys for `E`.
    pub fn model<E: Entity>() -> Self {
        Self::new(MODEL_PREFIX, E::MODEL_NAME, MODEL_HASH_LEN)
    }

    /// Manager-level keys for `E`.
    pub fn manager<E: Entity>() -> Self {
        Self::new(MANAGER_PREFIX, E::MODEL_NAME, MANAGER_HASH_LEN)
    }

    /// Lowercased model name.
    pub fn model_name(&self) -> &str {
        &self.model
    }

    /// Build a key. Absent or empty `params` add no hash segment.
    pub fn key(
        &self,
        cache_type: &str,
        identifier: Option<&str>,
        params: Option<&Value>,
    ) -> String {
        let mut parts = vec![self.prefix.as_str(), self.model.as_str(), cache_type];
        if let Some(identifier) = identifier {
            parts.push(identifier);
        }
        let hash = params
            .filter(|p| !is_blank(p))
            .map(|p| truncated(md5_hex(&canonical_json(p)), self.hash_len));
        if let Some(hash) = hash.as_deref() {
            parts.push(hash);
        }
        parts.join(":")
    }

    /// Glob matching every key of this model.
    pub fn model_pattern(&self) -> String {
        format!("{}:{}:*", self.prefix, self.model)
    }
}

/// `token_auth:{action}:{sha256(token)[:16]}[:user:{user_id}]`
pub fn token_validation(token: &str, action: &str, user_id: Option<&str>) -> String {
    let mut key = format!("{TOKEN_PREFIX}:{action}:{}", truncated(sha256_hex(token), 16));
    if let Some(user_id) = user_id.filter(|u| !u.is_empty()) {
        key.push_str(":user:");
        key.push_str(user_id);
    }
    key
}

/// Short digest of a token bound to an action, used inside the params of
/// token-scoped manager keys.
pub fn token_scope_hash(token: &str, action: &str) -> String {
    truncated(sha256_hex(&format!("{token}:{action}")), 16)
}

/// `method:{owner}:{method}:{md5(canonical {func, args, kwargs})}`
pub fn method(owner: &str, method: &str, args: &Value, kwargs: &Value) -> String {
    let raw = serde_json::json!({
        "func": method,
        "args": args,
        "kwargs": kwargs,
    });
    format!("{METHOD_PREFIX}:{owner}:{method}:{}", md5_hex(&canonical_json(&raw)))
}

/// Blocklist entry for a revoked token.
pub fn jwt_blocklist(token: &str) -> String {
    format!("{TOKEN_PREFIX}:revoked:{}", sha256_hex(token))
}

pub fn md5_hex(input: &str) -> String {
    hex::encode(Md5::digest(input.as_bytes()))
}

pub fn sha256_hex(input: &str) -> String {
    hex::encode(Sha256::digest(input.as_bytes()))
}

fn truncated(mut hex: String, len: usize) -> String {
    hex.truncate(len);
    hex
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// Render JSON with sorted object keys, `", "`/`": "` separators and
/// non-ASCII characters escaped as `\uXXXX`.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => write_string(s, out),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_string(key, out);
                out.push_str(": ");
                write_canonical(&map[key], out);
            }
            out.push('}');
        }
    }
}

fn write_string(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            c if c.is_ascii() && !c.is_ascii_control() => out.push(c),
            c => {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    let _ = write!(out, "\\u{unit:04x}");
                }
            }
        }
    }
    out.push('"');
}
