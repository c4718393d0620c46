//! Shared helpers for the permit-core integration tests.

#![allow(dead_code)]

use permit_core::{DefaultParser, IntegrationRegistry};
use std::path::{Path, PathBuf};

pub fn fixtures_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../fixtures/integrations")
}

pub fn load_fixture(name: &str) -> serde_json::Value {
    let path = fixtures_dir().join(name);
    let src = std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("Failed to read fixture {}: {}", path.display(), e));
    serde_json::from_str(&src)
        .unwrap_or_else(|e| panic!("Failed to parse fixture {}: {}", path.display(), e))
}

/// Registry with the tracker and mail fixtures, in that order.
pub fn fixture_registry() -> IntegrationRegistry {
    let mut registry = IntegrationRegistry::from_json(&load_fixture("tracker.json")).unwrap();
    registry
        .extend_from_json(&load_fixture("mail.json"))
        .unwrap();
    registry
}

pub fn fixture_parser() -> DefaultParser {
    DefaultParser::from_registry(fixture_registry())
}
