//! Common test utilities shared across integration tests.

#![allow(dead_code)]

use schemagraph::config::SchemaGraphConfig;
use schemagraph::domain::RelationshipId;
use schemagraph::service::{Fixture, InMemoryService};
use schemagraph::session::ErdSession;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::Arc;

/// Path of the warehouse fixture shipped with the crate
pub fn fixture_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/warehouse.json")
}

/// The warehouse project:
///
/// - `sales.orders` (42) -> `sales.customers` (7), physical
/// - `sales.customers` (7) -> `sales.regions` (3), `lfk-1`, suggested at 0.82
/// - `hr.employees` (20) -> itself, physical
/// - `hr.employees` (20) -> `hr.departments` (21), physical
/// - `hr.departments` (21) -> `hr.employees` (20), suggested at 0.64
/// - `archive.legacy_orders` (99), unconnected
pub fn warehouse() -> Fixture {
    serde_json::from_str(include_str!("../../fixtures/warehouse.json"))
        .expect("warehouse fixture should parse")
}

/// In-memory service holding the warehouse project
pub fn warehouse_service() -> InMemoryService {
    InMemoryService::new(warehouse())
}

/// Session with default configuration over `service`
pub fn session(service: &InMemoryService) -> ErdSession {
    session_with(service, SchemaGraphConfig::default())
}

/// Session with the given configuration over `service`
pub fn session_with(service: &InMemoryService, config: SchemaGraphConfig) -> ErdSession {
    ErdSession::new(&config, Arc::new(service.clone()))
}

/// Shorthand for a relationship id
pub fn rel(id: &str) -> RelationshipId {
    RelationshipId::new(id)
}

/// Run the schemagraph binary in the specified directory
pub fn run_schemagraph_in_dir(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_schemagraph"))
        .args(args)
        .current_dir(dir)
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute schemagraph binary")
}
