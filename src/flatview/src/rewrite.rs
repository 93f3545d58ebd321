//! Post-processing of the decoded tree: byte arrays become base64 strings.
//!
//! flatc prints byte-array fields as plain JSON arrays of numbers, which is
//! unreadable for anything larger than a few bytes. This pass walks the
//! decoded tree with path-qualified keys and replaces every classified
//! byte array with a single base64 string.

use crate::schema::BinaryFieldClassifier;
use base64::prelude::*;
use serde_json::Value;

/// Rewrite classified byte-array nodes in place.
///
/// A node is rewritten only when its path matches the classifier *and* its
/// value is a non-empty array of integers 0..=255; classified nodes of any
/// other shape are left untouched. Running the pass twice is a no-op, since
/// a string is never an array of numbers.
pub fn encode_binary_fields(tree: &mut Value, classifier: &BinaryFieldClassifier) {
    walk(tree, "", classifier);
}

fn walk(node: &mut Value, path: &str, classifier: &BinaryFieldClassifier) {
    if !path.is_empty() && classifier.matches(path) {
        if let Some(bytes) = as_byte_array(node) {
            *node = Value::String(BASE64_STANDARD.encode(bytes));
            return;
        }
    }
    match node {
        Value::Object(map) => {
            for (key, child) in map.iter_mut() {
                let child_path = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{path}.{key}")
                };
                walk(child, &child_path, classifier);
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter_mut().enumerate() {
                walk(child, &format!("{path}[{index}]"), classifier);
            }
        }
        _ => {}
    }
}

/// The node's bytes, when it is a non-empty array of integers 0..=255.
fn as_byte_array(node: &Value) -> Option<Vec<u8>> {
    let items = node.as_array()?;
    if items.is_empty() {
        return None;
    }
    items
        .iter()
        .map(|item| item.as_u64().filter(|&n| n <= 255).map(|n| n as u8))
        .collect()
}
