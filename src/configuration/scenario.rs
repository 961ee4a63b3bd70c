//! Versioned scenario and snapshot documents
//!
//! Scenarios seed new runs (config + initial bodies); snapshots capture a
//! point in time for replay against a config identified by hash. This
//! module holds the serde models, a per-path document validator for raw
//! JSON, and the migration shim that lifts legacy documents to schema 1.0.

use std::collections::HashSet;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::configuration::config::EngineConfig;
use crate::simulation::states::Body;

/// Schema version emitted by this implementation.
pub const SCHEMA_VERSION: &str = "1.0";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioMetadata {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    pub created_at: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Portable document containing a config and initial bodies.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    pub schema_version: String,
    pub metadata: ScenarioMetadata,
    pub engine_config: EngineConfig,
    pub bodies: Vec<Body>,
}

/// Point-in-time capture. Configs travel by hash only.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub schema_version: String,
    #[serde(default)]
    pub created_at: Option<String>,
    pub tick: u64,
    pub sim_time: f64,
    pub config_hash: String,
    pub bodies: Vec<Body>,
}

/// One schema violation, pointing at the offending location.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaIssue {
    pub path: String,
    pub message: String,
}

impl SchemaIssue {
    fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Validate a raw scenario document. An empty result means accepted; the
/// engine never half-loads a document that produced issues.
pub fn validate_scenario_document(document: &Value) -> Vec<SchemaIssue> {
    let mut issues = Vec::new();

    let Some(root) = document.as_object() else {
        issues.push(SchemaIssue::new("", "scenario document must be a JSON object"));
        return issues;
    };

    match root.get("schemaVersion").and_then(Value::as_str) {
        None => issues.push(SchemaIssue::new(
            "schemaVersion",
            "required string field is missing",
        )),
        Some(version) if !version.starts_with("1.") => issues.push(SchemaIssue::new(
            "schemaVersion",
            format!("unsupported version '{version}', expected 1.x"),
        )),
        Some(_) => {}
    }

    match root.get("metadata").and_then(Value::as_object) {
        None => issues.push(SchemaIssue::new("metadata", "required object is missing")),
        Some(metadata) => {
            let name_ok = metadata
                .get("name")
                .and_then(Value::as_str)
                .is_some_and(|name| !name.trim().is_empty());
            if !name_ok {
                issues.push(SchemaIssue::new(
                    "metadata.name",
                    "must be a non-empty string",
                ));
            }
            let created_ok = metadata
                .get("createdAt")
                .and_then(Value::as_str)
                .is_some_and(|created| !created.trim().is_empty());
            if !created_ok {
                issues.push(SchemaIssue::new(
                    "metadata.createdAt",
                    "must be a non-empty string",
                ));
            }
        }
    }

    match root.get("engineConfig") {
        None => issues.push(SchemaIssue::new(
            "engineConfig",
            "required object is missing",
        )),
        Some(raw) => match serde_json::from_value::<EngineConfig>(raw.clone()) {
            Err(error) => issues.push(SchemaIssue::new(
                "engineConfig",
                format!("failed to decode: {error}"),
            )),
            Ok(config) => {
                if let Err(error) = config.validate() {
                    issues.push(SchemaIssue::new("engineConfig", error.to_string()));
                }
            }
        },
    }

    match root.get("bodies").and_then(Value::as_array) {
        None => issues.push(SchemaIssue::new("bodies", "required array is missing")),
        Some(bodies) if bodies.is_empty() => issues.push(SchemaIssue::new(
            "bodies",
            "must contain at least one body",
        )),
        Some(bodies) => {
            let mut seen_ids = HashSet::new();
            for (index, raw) in bodies.iter().enumerate() {
                match serde_json::from_value::<Body>(raw.clone()) {
                    Err(error) => issues.push(SchemaIssue::new(
                        format!("bodies[{index}]"),
                        format!("failed to decode: {error}"),
                    )),
                    Ok(body) => {
                        if let Err(error) = body.validate() {
                            issues.push(SchemaIssue::new(
                                format!("bodies[{index}]"),
                                error.to_string(),
                            ));
                        }
                        if !seen_ids.insert(body.id.clone()) {
                            issues.push(SchemaIssue::new(
                                format!("bodies[{index}].id"),
                                format!("duplicate body id '{}'", body.id),
                            ));
                        }
                    }
                }
            }
        }
    }

    issues
}

/// Lift a scenario document to the latest schema.
///
/// Documents without a version (or with a `0.` prefix) go through the
/// legacy path; `1.` documents only get their version coerced to "1.0";
/// anything else is returned unchanged for the caller to deal with.
pub fn migrate_to_latest(document: Value) -> Value {
    let version = document
        .get("schemaVersion")
        .and_then(Value::as_str)
        .map(str::to_string);

    match version.as_deref() {
        Some(version) if version.starts_with("1.") => {
            let mut document = document;
            if let Some(root) = document.as_object_mut() {
                root.insert(
                    "schemaVersion".to_string(),
                    Value::String(SCHEMA_VERSION.to_string()),
                );
            }
            document
        }
        Some(version) if version.starts_with("0.") => migrate_legacy(document),
        None => migrate_legacy(document),
        Some(_) => document,
    }
}

fn migrate_legacy(document: Value) -> Value {
    let root = document.as_object().cloned().unwrap_or_default();
    let metadata_src = root
        .get("metadata")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();

    let pick_string = |key: &str| -> Option<String> {
        metadata_src
            .get(key)
            .or_else(|| root.get(key))
            .and_then(Value::as_str)
            .filter(|text| !text.trim().is_empty())
            .map(str::to_string)
    };

    let name = pick_string("name").unwrap_or_else(|| "Imported Scenario".to_string());
    let created_at = pick_string("createdAt")
        .unwrap_or_else(|| Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true));
    let tags = metadata_src
        .get("tags")
        .or_else(|| root.get("tags"))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let mut metadata = Map::new();
    metadata.insert("name".to_string(), Value::String(name));
    if let Some(description) = pick_string("description") {
        metadata.insert("description".to_string(), Value::String(description));
    }
    if let Some(author) = pick_string("author") {
        metadata.insert("author".to_string(), Value::String(author));
    }
    metadata.insert("createdAt".to_string(), Value::String(created_at));
    metadata.insert("tags".to_string(), Value::Array(tags));

    json!({
        "schemaVersion": SCHEMA_VERSION,
        "metadata": metadata,
        "engineConfig": migrate_legacy_config(&root),
        "bodies": root.get("bodies").cloned().unwrap_or_else(|| json!([])),
    })
}

fn migrate_legacy_config(root: &Map<String, Value>) -> Value {
    let mut config = root
        .get("engineConfig")
        .or_else(|| root.get("config"))
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();

    // Legacy key aliases for the physical constants.
    for (canonical, alias) in [
        ("gravityConstant", "gravity"),
        ("softeningEpsilon", "epsilon"),
    ] {
        if !config.contains_key(canonical) {
            if let Some(value) = config.get(alias).cloned() {
                config.insert(canonical.to_string(), value);
            }
        }
        config.remove(alias);
    }

    let defaults: [(&str, Value); 8] = [
        ("dt", json!(0.005)),
        ("dtPolicy", json!("fixed")),
        ("integrator", json!("velocityVerlet")),
        ("collisionMode", json!("inelasticMerge")),
        ("deterministic", json!(true)),
        ("gravitySolver", json!("auto")),
        ("barnesHutTheta", json!(0.6)),
        ("barnesHutThreshold", json!(256)),
    ];
    for (key, value) in defaults {
        config.entry(key.to_string()).or_insert(value);
    }

    Value::Object(config)
}
