//! Shared JSON fixtures for the cadence crates' tests and benches.
//!
//! Fixtures are listed in `fixtures/manifest.json` at the workspace root and
//! addressed by name.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use serde::Deserialize;

static MANIFEST: Lazy<Manifest> = Lazy::new(|| {
    let raw = include_str!("../../../../fixtures/manifest.json");
    serde_json::from_str(raw).expect("fixtures manifest should parse")
});

#[derive(Debug, Deserialize)]
struct Manifest {
    groups: HashMap<String, String>,
    tracks: HashMap<String, String>,
}

fn fixtures_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../../fixtures")
}

fn read_to_string(rel: &str) -> Result<String> {
    let path = fixtures_root().join(rel);
    fs::read_to_string(&path)
        .with_context(|| format!("failed to read fixture at {}", path.display()))
}

fn load_json<T: DeserializeOwned>(rel: &str) -> Result<T> {
    let text = read_to_string(rel)?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse JSON fixture {rel}"))
}

fn lookup<'a>(map: &'a HashMap<String, String>, kind: &str, name: &str) -> Result<&'a str> {
    map.get(name)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("unknown {kind} fixture '{name}'"))
}

/// Serialized animation groups.
pub mod groups {
    use super::*;

    pub fn keys() -> Vec<String> {
        MANIFEST.groups.keys().cloned().collect()
    }

    pub fn json(name: &str) -> Result<String> {
        read_to_string(lookup(&MANIFEST.groups, "group", name)?)
    }

    pub fn load<T: DeserializeOwned>(name: &str) -> Result<T> {
        load_json(lookup(&MANIFEST.groups, "group", name)?)
    }
}

/// Serialized single tracks.
pub mod tracks {
    use super::*;

    pub fn keys() -> Vec<String> {
        MANIFEST.tracks.keys().cloned().collect()
    }

    pub fn json(name: &str) -> Result<String> {
        read_to_string(lookup(&MANIFEST.tracks, "track", name)?)
    }

    pub fn load<T: DeserializeOwned>(name: &str) -> Result<T> {
        load_json(lookup(&MANIFEST.tracks, "track", name)?)
    }
}
