//! Structural checks for exported n8n workflows and workflow specs.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::Serialize;
use serde_json::Value;

use crate::error::ExportError;
use crate::export::n8n::REQUIRED_NODE_TYPES;

/// Top-level keys a tool-neutral workflow spec must carry.
pub const REQUIRED_SPEC_KEYS: [&str; 3] = ["workflow_name", "workflow_steps", "configuration"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExportReport {
    pub name: Option<String>,
    pub node_count: usize,
    pub connection_count: usize,
    pub tag_count: usize,
    pub node_types: BTreeMap<String, usize>,
    pub missing_node_types: Vec<String>,
    /// `"source -> target"` edges naming a node that does not exist.
    pub dangling_connections: Vec<String>,
    pub duplicate_names: Vec<String>,
}

impl ExportReport {
    pub fn is_valid(&self) -> bool {
        self.node_count > 0
            && self.missing_node_types.is_empty()
            && self.dangling_connections.is_empty()
            && self.duplicate_names.is_empty()
    }

    /// One line per problem; empty when valid.
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.node_count == 0 {
            problems.push("workflow has no nodes".to_string());
        }
        problems.extend(
            self.missing_node_types
                .iter()
                .map(|t| format!("missing node type {t}")),
        );
        problems.extend(
            self.dangling_connections
                .iter()
                .map(|c| format!("connection to unknown node: {c}")),
        );
        problems.extend(
            self.duplicate_names
                .iter()
                .map(|n| format!("duplicate node name {n:?}")),
        );
        problems
    }
}

/// Inspect an n8n workflow document.
pub fn validate_export(doc: &Value) -> ExportReport {
    let nodes = doc
        .get("nodes")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    let connections = doc.get("connections").and_then(Value::as_object);

    let mut node_types: BTreeMap<String, usize> = BTreeMap::new();
    let mut names = BTreeSet::new();
    let mut duplicates = BTreeSet::new();
    for node in nodes {
        let node_type = node
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        *node_types.entry(node_type.to_string()).or_default() += 1;

        if let Some(name) = node.get("name").and_then(Value::as_str)
            && !names.insert(name)
        {
            duplicates.insert(name.to_string());
        }
    }

    let missing_node_types = REQUIRED_NODE_TYPES
        .iter()
        .filter(|t| !node_types.contains_key(**t))
        .map(|t| t.to_string())
        .collect();

    let mut dangling = Vec::new();
    for (source, outputs) in connections.into_iter().flatten() {
        if !names.contains(source.as_str()) {
            dangling.push(format!("{source} -> *"));
        }
        let targets = outputs
            .get("main")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(Value::as_array)
            .flatten()
            .filter_map(|t| t.get("node").and_then(Value::as_str));
        for target in targets {
            if !names.contains(target) {
                dangling.push(format!("{source} -> {target}"));
            }
        }
    }

    ExportReport {
        name: doc.get("name").and_then(Value::as_str).map(String::from),
        node_count: nodes.len(),
        connection_count: connections.map_or(0, |c| c.len()),
        tag_count: doc
            .get("tags")
            .and_then(Value::as_array)
            .map_or(0, Vec::len),
        node_types,
        missing_node_types,
        dangling_connections: dangling,
        duplicate_names: duplicates.into_iter().collect(),
    }
}

/// Read and validate an exported workflow file.
pub fn validate_export_file(path: &Path) -> Result<ExportReport, ExportError> {
    let doc = read_json(path)?;
    Ok(validate_export(&doc))
}

/// Keys from `REQUIRED_SPEC_KEYS` absent in a workflow spec document.
pub fn missing_spec_keys(doc: &Value) -> Vec<&'static str> {
    REQUIRED_SPEC_KEYS
        .into_iter()
        .filter(|k| doc.get(k).is_none())
        .collect()
}

pub fn read_json(path: &Path) -> Result<Value, ExportError> {
    if !path.exists() {
        return Err(ExportError::NotFound(path.display().to_string()));
    }
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn minimal() -> Value {
        json!({
            "name": "Screening",
            "nodes": [
                { "name": "Trigger", "type": "n8n-nodes-base.emailReadImap" },
                { "name": "Extract", "type": "n8n-nodes-base.code" },
                { "name": "Check", "type": "n8n-nodes-base.if" },
                { "name": "Log", "type": "n8n-nodes-base.googleSheets" },
                { "name": "Send", "type": "n8n-nodes-base.emailSend" }
            ],
            "connections": {
                "Trigger": { "main": [[{ "node": "Extract", "type": "main", "index": 0 }]] },
                "Extract": { "main": [[{ "node": "Check", "type": "main", "index": 0 }]] },
                "Check": { "main": [
                    [{ "node": "Log", "type": "main", "index": 0 }],
                    [{ "node": "Send", "type": "main", "index": 0 }]
                ] }
            },
            "tags": [{ "name": "hr" }]
        })
    }

    #[test]
    fn valid_workflow_passes() {
        let report = validate_export(&minimal());
        assert!(report.is_valid(), "{:?}", report.problems());
        assert_eq!(report.name.as_deref(), Some("Screening"));
        assert_eq!(report.node_count, 5);
        assert_eq!(report.connection_count, 3);
        assert_eq!(report.tag_count, 1);
        assert_eq!(report.node_types["n8n-nodes-base.code"], 1);
    }

    #[test]
    fn reports_missing_types() {
        let mut doc = minimal();
        doc["nodes"].as_array_mut().unwrap().retain(|n| n["name"] != "Send");
        doc["connections"]["Check"]["main"].as_array_mut().unwrap().pop();

        let report = validate_export(&doc);
        assert_eq!(report.missing_node_types, vec!["n8n-nodes-base.emailSend"]);
        assert!(!report.is_valid());
    }

    #[test]
    fn reports_dangling_connections_and_duplicates() {
        let mut doc = minimal();
        doc["connections"]["Ghost"] = json!({ "main": [[{ "node": "Trigger" }]] });
        doc["connections"]["Log"] = json!({ "main": [[{ "node": "Nowhere" }]] });
        doc["nodes"]
            .as_array_mut()
            .unwrap()
            .push(json!({ "name": "Extract", "type": "n8n-nodes-base.code" }));

        let report = validate_export(&doc);
        assert_eq!(
            report.dangling_connections,
            vec!["Ghost -> *".to_string(), "Log -> Nowhere".to_string()]
        );
        assert_eq!(report.duplicate_names, vec!["Extract".to_string()]);
        assert_eq!(report.problems().len(), 3);
    }

    #[test]
    fn empty_document_is_invalid() {
        let report = validate_export(&json!({}));
        assert_eq!(report.node_count, 0);
        assert_eq!(report.missing_node_types.len(), REQUIRED_NODE_TYPES.len());
        assert!(!report.is_valid());
    }

    #[test]
    fn spec_keys() {
        assert!(missing_spec_keys(&json!({
            "workflow_name": "x", "workflow_steps": [], "configuration": {}
        }))
        .is_empty());
        assert_eq!(
            missing_spec_keys(&json!({ "workflow_name": "x" })),
            vec!["workflow_steps", "configuration"]
        );
    }

    #[test]
    fn file_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            validate_export_file(&dir.path().join("missing.json")),
            Err(ExportError::NotFound(_))
        ));

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "{ nope").unwrap();
        assert!(matches!(
            validate_export_file(&bad),
            Err(ExportError::InvalidJson(_))
        ));
    }
}
