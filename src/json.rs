//! Lenient reader for JSON forests shaped like
//! `[{ "id"?: string, "label" | "name" | "title" | "text": string, "children"?: [...] }]`.
//!
//! Anything that cannot be read as a record is skipped with a [`BuildDiagnostic`]; only a
//! top-level value that is neither an array nor an object is an error.

use serde_json::{Map, Value};

use crate::error::ForestError;
use crate::index::{BuildDiagnostic, TreeIndex};
use crate::model::{LABEL_FIELD, NodeRecord};

/// Keys tried, in order, for a record's display label.
pub const LABEL_KEYS: [&str; 4] = [LABEL_FIELD, "name", "title", "text"];

const ID_KEY: &str = "id";
const CHILDREN_KEY: &str = "children";

/// Records decoded from JSON plus the problems found on the way.
#[derive(Clone, Debug, Default)]
pub struct Forest {
    pub records: Vec<NodeRecord>,
    pub diagnostics: Vec<BuildDiagnostic>,
}

impl Forest {
    /// Builds an index, carrying decode diagnostics over.
    pub fn into_index(self) -> TreeIndex {
        TreeIndex::build_with_diagnostics(&self.records, self.diagnostics)
    }
}

/// Parses a forest from JSON text.
pub fn parse_forest(text: &str) -> Result<Forest, ForestError> {
    let value: Value = serde_json::from_str(text)?;
    forest_from_value(&value)
}

/// Reads a forest from a JSON value: an array of roots, or one root object.
pub fn forest_from_value(value: &Value) -> Result<Forest, ForestError> {
    let mut forest = Forest::default();
    match value {
        Value::Array(items) => {
            for (position, item) in items.iter().enumerate() {
                read_tree(item, position, &mut forest);
            }
        }
        Value::Object(_) => read_tree(value, 0, &mut forest),
        other => {
            return Err(ForestError::NotAForest {
                found: kind(other),
            });
        }
    }
    Ok(forest)
}

struct Pending<'a> {
    record: NodeRecord,
    children: std::slice::Iter<'a, Value>,
    position: usize,
}

// Post-order assembly with an explicit stack, so input depth never grows the call stack.
fn read_tree(root: &Value, position: usize, forest: &mut Forest) {
    let Value::Object(map) = root else {
        skip(forest, None, position, root);
        return;
    };
    let mut stack = vec![start_record(map, &mut forest.diagnostics)];
    while let Some(top) = stack.last_mut() {
        if let Some(child) = top.children.next() {
            let position = top.position;
            top.position += 1;
            if let Value::Object(map) = child {
                let pending = start_record(map, &mut forest.diagnostics);
                stack.push(pending);
            } else {
                let parent = Some(display_key(&top.record));
                skip(forest, parent, position, child);
            }
            continue;
        }
        let Some(done) = stack.pop() else { break };
        match stack.last_mut() {
            Some(parent) => parent.record.children.push(done.record),
            None => forest.records.push(done.record),
        }
    }
}

fn start_record<'a>(
    map: &'a Map<String, Value>,
    diagnostics: &mut Vec<BuildDiagnostic>,
) -> Pending<'a> {
    let mut record = NodeRecord {
        id: map.get(ID_KEY).and_then(scalar_text),
        ..NodeRecord::default()
    };
    record.label = LABEL_KEYS
        .iter()
        .find_map(|key| map.get(*key).and_then(scalar_text))
        .unwrap_or_default();
    for (key, value) in map {
        if key == ID_KEY || key == CHILDREN_KEY || key == LABEL_FIELD {
            continue;
        }
        if let Some(text) = scalar_text(value) {
            record.fields.insert(key.clone(), text);
        }
    }

    let children: &'a [Value] = match map.get(CHILDREN_KEY) {
        None | Some(Value::Null) => &[],
        Some(Value::Array(items)) => items,
        Some(other) => {
            let diagnostic = BuildDiagnostic::MalformedEntry {
                parent: Some(display_key(&record)),
                position: 0,
                reason: format!("`children` is {}, not an array", kind(other)),
            };
            log::warn!("json forest: {diagnostic}");
            diagnostics.push(diagnostic);
            &[]
        }
    };
    Pending {
        record,
        children: children.iter(),
        position: 0,
    }
}

fn skip(forest: &mut Forest, parent: Option<String>, position: usize, value: &Value) {
    let diagnostic = BuildDiagnostic::MalformedEntry {
        parent,
        position,
        reason: format!("expected an object, found {}", kind(value)),
    };
    log::warn!("json forest: {diagnostic}");
    forest.diagnostics.push(diagnostic);
}

fn display_key(record: &NodeRecord) -> String {
    record
        .id
        .clone()
        .unwrap_or_else(|| record.label.clone())
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

const fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
