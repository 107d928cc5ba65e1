//! Shared inputs for the integration tests
//!
//! - `canonical.json`: a complete canonical document that passes the checker
//! - `subscription.txt`: a base64 share-link subscription (trojan + ss)
//! - `profile.yaml`: a rule-routing profile with two proxies and one group

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

pub fn fixture_path(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
}

pub fn load(name: &str) -> Vec<u8> {
    fs::read(fixture_path(name)).expect("fixture readable")
}

pub fn canonical() -> Vec<u8> {
    load("canonical.json")
}

pub fn subscription() -> Vec<u8> {
    load("subscription.txt")
}

pub fn profile() -> Vec<u8> {
    load("profile.yaml")
}

/// Write `contents` as the pipeline source inside `dir`.
pub fn write_source(dir: &Path, contents: &[u8]) -> PathBuf {
    let path = dir.join("source.tmp");
    fs::write(&path, contents).expect("write source");
    path
}
