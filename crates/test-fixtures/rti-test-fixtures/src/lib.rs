use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use serde::Deserialize;

static MANIFEST: Lazy<Result<Manifest, String>> = Lazy::new(|| {
    let raw = include_str!("../../../../fixtures/manifest.json");
    serde_json::from_str(raw).map_err(|e| format!("fixtures manifest should parse: {e}"))
});

#[derive(Debug, Deserialize)]
struct Manifest {
    scatters: HashMap<String, ScatterEntry>,
    #[serde(default)]
    configs: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ScatterEntry {
    Path(String),
    Detailed {
        path: String,
        #[serde(default)]
        description: String,
    },
}

impl ScatterEntry {
    fn as_path(&self) -> &str {
        match self {
            ScatterEntry::Path(path) => path,
            ScatterEntry::Detailed { path, .. } => path,
        }
    }
}

fn manifest() -> Result<&'static Manifest> {
    MANIFEST.as_ref().map_err(|e| anyhow!("{e}"))
}

fn fixtures_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../../fixtures")
}

fn resolve_path(rel: &str) -> PathBuf {
    fixtures_root().join(rel)
}

fn read_to_string(rel: &str) -> Result<String> {
    let path = resolve_path(rel);
    fs::read_to_string(&path)
        .with_context(|| format!("failed to read fixture at {}", path.display()))
}

fn load_json<T: DeserializeOwned>(rel: &str) -> Result<T> {
    let text = read_to_string(rel)?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse JSON fixture {rel}"))
}

fn lookup<'a, T>(map: &'a HashMap<String, T>, kind: &str, name: &str) -> Result<&'a T> {
    map.get(name)
        .ok_or_else(|| anyhow!("unknown {kind} fixture '{name}'"))
}

/// Scatter layouts consumed by `ScatterGenerator`.
pub mod scatters {
    use super::*;

    pub fn keys() -> Vec<String> {
        let mut keys: Vec<String> = manifest()
            .map(|m| m.scatters.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }

    pub fn json(name: &str) -> Result<String> {
        let entry = lookup(&manifest()?.scatters, "scatter", name)?;
        read_to_string(entry.as_path())
    }

    pub fn load<T: DeserializeOwned>(name: &str) -> Result<T> {
        let entry = lookup(&manifest()?.scatters, "scatter", name)?;
        super::load_json(entry.as_path())
    }

    pub fn path(name: &str) -> Result<PathBuf> {
        let entry = lookup(&manifest()?.scatters, "scatter", name)?;
        Ok(resolve_path(entry.as_path()))
    }

    /// Free-form description from the manifest, empty when absent.
    pub fn description(name: &str) -> Result<String> {
        match lookup(&manifest()?.scatters, "scatter", name)? {
            ScatterEntry::Detailed { description, .. } => Ok(description.clone()),
            ScatterEntry::Path(_) => Ok(String::new()),
        }
    }
}

/// Provider and consumer configuration files.
pub mod configs {
    use super::*;

    pub fn keys() -> Vec<String> {
        let mut keys: Vec<String> = manifest()
            .map(|m| m.configs.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }

    pub fn json(name: &str) -> Result<String> {
        let rel = lookup(&manifest()?.configs, "config", name)?;
        read_to_string(rel)
    }

    pub fn load<T: DeserializeOwned>(name: &str) -> Result<T> {
        let rel = lookup(&manifest()?.configs, "config", name)?;
        super::load_json(rel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_manifest_entry_resolves() {
        for key in scatters::keys() {
            let path = scatters::path(&key).unwrap();
            assert!(path.exists(), "missing scatter fixture {}", path.display());
            let _: serde_json::Value = scatters::load(&key).unwrap();
        }
        for key in configs::keys() {
            let _: serde_json::Value = configs::load(&key).unwrap();
        }
    }

    #[test]
    fn descriptions_come_from_detailed_entries() {
        let described = scatters::description("velocity_map_mismatch").unwrap();
        assert!(described.contains("face count"));
        assert_eq!(scatters::description("not_ready").unwrap(), "");
        assert!(scatters::description("does-not-exist").is_err());
    }

    #[test]
    fn unknown_names_are_errors() {
        assert!(scatters::json("does-not-exist").is_err());
        assert!(configs::json("does-not-exist").is_err());
    }
}
