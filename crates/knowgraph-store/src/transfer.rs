//! Graph file import/export (pretty-printed JSON).

use std::path::Path;

use knowgraph_core::{Error, GraphRecord, Result};
use serde_json::Value;

/// Parse an imported graph document.
///
/// Requires a non-empty string `name` and array-valued `nodes` and `edges`.
/// The returned record carries no id or timestamps, so saving it always
/// creates a new graph.
pub fn parse_graph(json: &str) -> Result<GraphRecord> {
    let value: Value = serde_json::from_str(json)
        .map_err(|e| Error::InvalidInput(format!("not valid JSON: {}", e)))?;

    let obj = value
        .as_object()
        .ok_or_else(|| Error::InvalidInput("graph file must contain a JSON object".into()))?;

    match obj.get("name") {
        Some(Value::String(name)) if !name.trim().is_empty() => {}
        Some(Value::String(_)) => {
            return Err(Error::InvalidInput("graph name must not be empty".into()))
        }
        Some(_) => return Err(Error::InvalidInput("graph name must be a string".into())),
        None => return Err(Error::InvalidInput("graph file is missing a name".into())),
    }
    for field in ["nodes", "edges"] {
        if !obj.get(field).is_some_and(Value::is_array) {
            return Err(Error::InvalidInput(format!("{} must be an array", field)));
        }
    }

    let mut record: GraphRecord = serde_json::from_value(value)
        .map_err(|e| Error::InvalidInput(format!("malformed graph: {}", e)))?;
    record.id = None;
    record.created_at = None;
    record.updated_at = None;
    Ok(record)
}

pub fn read_graph_file(path: &Path) -> Result<GraphRecord> {
    let data = std::fs::read_to_string(path)?;
    parse_graph(&data)
}

pub fn to_json(record: &GraphRecord) -> Result<String> {
    Ok(serde_json::to_string_pretty(record)?)
}

pub fn write_graph_file(path: &Path, record: &GraphRecord) -> Result<()> {
    let json = to_json(record)?;
    std::fs::write(path, json).map_err(|e| Error::StorageWriteFailure(format!("{}: {}", path.display(), e)))
}
