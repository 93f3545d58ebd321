//! Schema-derived classification of binary payload fields.
//!
//! Decoded documents print byte-array fields as huge numeric arrays unless
//! they are re-encoded first. This module scans a FlatBuffers schema for
//! fields typed as byte arrays and answers point queries against the
//! resulting set of field paths, so the rewrite pass knows which nodes of
//! the decoded tree hold opaque binary data.

use std::collections::BTreeSet;

/// Paths that are always treated as binary, no matter what the schema says.
///
/// The structural scan only follows one level of record indirection, so
/// byte arrays nested deeper than that are not detected. These known
/// binary-bearing paths from the default document layout cover that gap.
pub const SAFETY_NET_PATHS: &[&str] = &[
    "data",
    "thumbnail",
    "files.entries.value.data",
    "version_graph.checkpoints.data",
    "external_files.value.data",
];

/// Scalar type names that can never contain a byte array.
const PRIMITIVE_TYPES: &[&str] = &[
    "bool", "byte", "ubyte", "int8", "uint8", "short", "ushort", "int16", "uint16", "int", "uint",
    "int32", "uint32", "long", "ulong", "int64", "uint64", "float", "float32", "double", "float64",
    "string",
];

/// FlatBuffers spellings of an 8-bit element type.
const BYTE_TYPES: &[&str] = &["byte", "ubyte", "int8", "uint8"];

/// A set of field paths that denote opaque byte payloads.
///
/// Built fresh from whichever schema text is in effect for a conversion;
/// never reuse an instance across a schema change.
///
/// # Example
/// ```
/// use flatview::BinaryFieldClassifier;
///
/// let classifier = BinaryFieldClassifier::parse("table T {\n  payload: [ubyte];\n}");
///
/// assert!(classifier.matches("payload"));
/// // Array indices are ignored when matching.
/// assert!(classifier.matches("files.entries[3].value.data"));
/// ```
#[derive(Debug, Clone)]
pub struct BinaryFieldClassifier {
    paths: BTreeSet<String>,
}

impl BinaryFieldClassifier {
    /// Scan schema text for byte-array fields.
    ///
    /// Two declaration shapes contribute paths: a field typed directly as a
    /// byte array adds its bare name, and a field typed as a named record
    /// (or an array of one) adds `field.child` for every byte-array field
    /// declared in that record's body. Malformed lines are skipped, so
    /// parsing never fails; even an empty schema yields the safety net.
    pub fn parse(schema: &str) -> Self {
        let mut paths = BTreeSet::new();

        for line in schema.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with("//") {
                continue;
            }
            let Some((name, field_type)) = parse_field(line) else {
                continue;
            };
            if is_byte_array(&field_type) {
                paths.insert(name.to_string());
            } else if let Some(record) = named_record_type(&field_type) {
                for child in byte_fields_of(schema, record) {
                    paths.insert(format!("{name}.{child}"));
                }
            }
        }

        for path in SAFETY_NET_PATHS {
            paths.insert((*path).to_string());
        }

        Self { paths }
    }

    /// Check whether a decoded-tree path denotes binary data.
    ///
    /// True if the path is in the set exactly, or after stripping every
    /// bracketed array index (`a[2].b[0].c` matches the pattern `a.b.c`).
    pub fn matches(&self, path: &str) -> bool {
        self.paths.contains(path) || self.paths.contains(&strip_indices(path))
    }

    /// All stored paths equal to or dot-nested under `prefix`.
    ///
    /// An empty prefix returns every path.
    pub fn paths_under(&self, prefix: &str) -> Vec<&str> {
        self.paths
            .iter()
            .map(String::as_str)
            .filter(|path| {
                prefix.is_empty()
                    || *path == prefix
                    || path
                        .strip_prefix(prefix)
                        .is_some_and(|rest| rest.starts_with('.'))
            })
            .collect()
    }
}

/// Split a `name : type ...` field declaration into name and type text.
///
/// Returns `None` for lines that are not field declarations. Default
/// values and attributes after the type are dropped.
fn parse_field(line: &str) -> Option<(&str, String)> {
    let (name, rest) = line.split_once(':')?;
    let name = name.trim();
    if name.is_empty()
        || !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return None;
    }
    let field_type = rest
        .split(';')
        .next()?
        .split('=')
        .next()?
        .split('(')
        .next()?
        .trim();
    if field_type.is_empty() {
        return None;
    }
    Some((name, field_type.to_string()))
}

fn is_byte_array(field_type: &str) -> bool {
    field_type
        .strip_prefix('[')
        .and_then(|t| t.strip_suffix(']'))
        .map(str::trim)
        .is_some_and(|element| BYTE_TYPES.contains(&element))
}

/// The named record a field refers to, for `name : Type` and
/// `name : [Type]` declarations. Namespaced references resolve to their
/// final segment.
fn named_record_type(field_type: &str) -> Option<&str> {
    let element = field_type
        .strip_prefix('[')
        .and_then(|t| t.strip_suffix(']'))
        .map(str::trim)
        .unwrap_or(field_type);
    if element.is_empty()
        || PRIMITIVE_TYPES.contains(&element)
        || !element
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
    {
        return None;
    }
    Some(element.rsplit('.').next().unwrap_or(element))
}

/// Byte-array fields declared directly in the body of a named record.
///
/// Locates `table Name {` (or `struct Name {`) and tracks brace depth to
/// the end of the body. Only one level of indirection: records referenced
/// from inside the body are not followed.
fn byte_fields_of(schema: &str, record: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut in_body = false;
    let mut depth: i32 = 0;

    for line in schema.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with("//") {
            continue;
        }
        if !in_body {
            let Some(rest) = line
                .strip_prefix("table ")
                .or_else(|| line.strip_prefix("struct "))
            else {
                continue;
            };
            let declared = rest
                .split(|c: char| c == '{' || c.is_whitespace())
                .next()
                .unwrap_or("");
            if declared != record {
                continue;
            }
            in_body = true;
        } else if depth > 0 {
            if let Some((name, field_type)) = parse_field(line) {
                if is_byte_array(&field_type) {
                    fields.push(name.to_string());
                }
            }
        }
        depth += line.matches('{').count() as i32 - line.matches('}').count() as i32;
        if in_body && depth <= 0 && line.contains('}') {
            break;
        }
    }

    fields
}

/// Remove every bracketed segment: `a[2].b[0].c` becomes `a.b.c`.
fn strip_indices(path: &str) -> String {
    let mut stripped = String::with_capacity(path.len());
    let mut in_bracket = false;
    for c in path.chars() {
        match c {
            '[' => in_bracket = true,
            ']' => in_bracket = false,
            c if !in_bracket => stripped.push(c),
            _ => {}
        }
    }
    stripped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_byte_array_fields() {
        let classifier = BinaryFieldClassifier::parse(
            "table T {\n  payload: [ubyte];\n  raw: [byte];\n  count: uint32;\n}\n",
        );

        assert!(classifier.matches("payload"));
        assert!(classifier.matches("raw"));
        assert!(!classifier.matches("count"));
    }

    #[test]
    fn test_one_level_record_indirection() {
        let schema = "\
table Outer {
  blob: Blob;
  checkpoints: [Checkpoint];
}

table Blob {
  data: [ubyte];
  size: uint64;
}

table Checkpoint {
  id: string;
  data: [ubyte];
}
";
        let classifier = BinaryFieldClassifier::parse(schema);

        assert!(classifier.matches("blob.data"));
        assert!(classifier.matches("checkpoints.data"));
        assert!(!classifier.matches("blob.size"));
    }

    #[test]
    fn test_safety_net_present_for_empty_schema() {
        let classifier = BinaryFieldClassifier::parse("");

        for path in SAFETY_NET_PATHS {
            assert!(classifier.matches(path), "missing safety net path {path}");
        }
    }

    #[test]
    fn test_matching_is_index_agnostic() {
        let classifier =
            BinaryFieldClassifier::parse("table T {\n  a: A;\n}\ntable A {\n  b: [ubyte];\n}");

        assert!(classifier.matches("a.b"));

        assert_eq!(
            classifier.matches("a[0].b"),
            classifier.matches("a.b"),
            "indexed and plain paths must agree"
        );
        assert!(classifier.matches("files.entries[12].value.data"));
        assert!(classifier.matches("version_graph.checkpoints[0].data"));
    }

    #[test]
    fn test_comments_and_malformed_lines_are_skipped() {
        let schema = "\
// ghost: [ubyte];
table T {
  :::
  payload [ubyte]
  real: [ubyte];
}
";
        let classifier = BinaryFieldClassifier::parse(schema);

        assert!(!classifier.matches("ghost"));
        assert!(!classifier.matches("payload"));
        assert!(classifier.matches("real"));
    }

    #[test]
    fn test_default_values_and_attributes_are_ignored() {
        let classifier = BinaryFieldClassifier::parse(
            "table T {\n  payload: [ubyte] (deprecated);\n  level: int = 1;\n}\n",
        );

        assert!(classifier.matches("payload"));
        assert!(!classifier.matches("level"));
    }

    #[test]
    fn test_paths_under_prefix() {
        let classifier = BinaryFieldClassifier::parse("");

        let under_files = classifier.paths_under("files");
        assert_eq!(under_files, vec!["files.entries.value.data"]);

        // "files" is a prefix of neither of these.
        assert!(!under_files.contains(&"data"));
        assert!(classifier.paths_under("file").is_empty());

        let all = classifier.paths_under("");
        assert_eq!(all.len(), SAFETY_NET_PATHS.len());
    }

    #[test]
    fn test_namespaced_record_reference() {
        let schema = "\
table Outer {
  blob: Doc.Blob;
}

table Blob {
  data: [ubyte];
}
";
        let classifier = BinaryFieldClassifier::parse(schema);
        assert!(classifier.matches("blob.data"));
    }
}
