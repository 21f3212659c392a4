//! Layered YAML config hashing plus the process environment loader.
//!
//! Two independent concerns live here, both carried over from the teacher's
//! config crate and the original Go config loader:
//!
//! - [`load_layered_yaml`] — deep-merge a list of YAML files in override
//!   order, canonicalize to stable-key-order JSON, and hash it. Used for
//!   reproducible run/config auditing.
//! - [`PilotEnv`] — process environment variables, with defaults and a
//!   per-binary required-subset validator, modeled on the original's
//!   `internal/pkg/config/env.go`.

pub mod env;

use anyhow::{Context, Result};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;

pub use env::{PilotEnv, ServiceName};

/// Load + merge YAML files in order, then canonicalize to JSON and hash.
/// Later files override earlier files via deep-merge.
pub fn load_layered_yaml(paths: &[&str]) -> Result<LoadedConfig> {
    let mut merged = Value::Object(Default::default());

    for p in paths {
        let s = fs::read_to_string(p).with_context(|| format!("read config: {p}"))?;
        let yaml_val: serde_yaml::Value =
            serde_yaml::from_str(&s).with_context(|| format!("parse yaml: {p}"))?;
        let json_val = serde_json::to_value(yaml_val).context("yaml->json conversion failed")?;
        deep_merge(&mut merged, json_val);
    }

    let canonical = canonicalize_json(&merged);

    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    let hash = hex::encode(hasher.finalize());

    Ok(LoadedConfig {
        config_json: serde_json::from_str(&canonical).context("canonical json parse failed")?,
        canonical_json: canonical,
        config_hash: hash,
    })
}

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config_json: Value,
    pub canonical_json: String,
    pub config_hash: String,
}

/// Deep-merge: objects merge recursively; arrays replaced; scalars overwritten.
fn deep_merge(dst: &mut Value, src: Value) {
    match (dst, src) {
        (Value::Object(dst_map), Value::Object(src_map)) => {
            for (k, v) in src_map {
                match dst_map.get_mut(&k) {
                    Some(existing) => deep_merge(existing, v),
                    None => {
                        dst_map.insert(k, v);
                    }
                }
            }
        }
        (dst_slot, src_val) => {
            *dst_slot = src_val;
        }
    }
}

/// Canonicalize JSON by sorting all object keys recursively and emitting compact JSON.
fn canonicalize_json(v: &Value) -> String {
    let sorted = sort_keys(v);
    serde_json::to_string(&sorted).expect("json serialization must not fail")
}

fn sort_keys(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut keys: Vec<_> = map.keys().cloned().collect();
            keys.sort();
            let mut new = serde_json::Map::new();
            for k in keys {
                new.insert(k.clone(), sort_keys(&map[&k]));
            }
            Value::Object(new)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sort_keys).collect()),
        _ => v.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn deep_merge_overrides_scalars_and_merges_nested_objects() {
        let mut base = serde_json::json!({"a": 1, "nested": {"x": 1, "y": 2}});
        let overlay = serde_json::json!({"a": 2, "nested": {"y": 9}});
        deep_merge(&mut base, overlay);
        assert_eq!(base, serde_json::json!({"a": 2, "nested": {"x": 1, "y": 9}}));
    }

    #[test]
    fn canonicalize_sorts_keys_recursively() {
        let v = serde_json::json!({"b": 1, "a": {"z": 1, "y": 2}});
        let s = canonicalize_json(&v);
        assert_eq!(s, r#"{"a":{"y":2,"z":1},"b":1}"#);
    }

    #[test]
    fn load_layered_yaml_is_deterministic_for_same_inputs() {
        let mut f1 = tempfile_write("a: 1\nb:\n  c: 2\n");
        let mut f2 = tempfile_write("b:\n  c: 3\nd: 4\n");
        let loaded = load_layered_yaml(&[f1.path(), f2.path()]).unwrap();
        assert_eq!(loaded.config_json["a"], serde_json::json!(1));
        assert_eq!(loaded.config_json["b"]["c"], serde_json::json!(3));
        assert_eq!(loaded.config_json["d"], serde_json::json!(4));
        let again = load_layered_yaml(&[f1.path(), f2.path()]).unwrap();
        assert_eq!(loaded.config_hash, again.config_hash);
        f1.flush().unwrap();
        f2.flush().unwrap();
    }

    struct TempYaml {
        path_buf: std::path::PathBuf,
        file: fs::File,
    }

    impl TempYaml {
        fn path(&self) -> &str {
            self.path_buf.to_str().unwrap()
        }
        fn flush(&mut self) -> std::io::Result<()> {
            self.file.flush()
        }
    }

    fn tempfile_write(contents: &str) -> TempYaml {
        let mut path_buf = std::env::temp_dir();
        let name = format!("pilot-config-test-{}.yaml", uuid_like());
        path_buf.push(name);
        let mut file = fs::File::create(&path_buf).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        TempYaml { path_buf, file }
    }

    fn uuid_like() -> String {
        use std::time::{SystemTime, UNIX_EPOCH};
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        format!("{nanos}")
    }
}
