//! Component digest extraction.
//!
//! The per-region components manifest is already a projection of the
//! region's config holding only image references, so extraction walks the
//! whole tree and keeps every string leaf:
//!
//! ```yaml
//! backend:
//!   imageDigest:
//!     digest: sha256:deadbeef
//! ```
//!
//! becomes `backend.image-digest = deadbeef`. The last path segment (the
//! `digest`/`sha` field name) is dropped and the remaining segments are
//! kebab-cased.
//!
//! Tags follow `serde_yaml`'s core-schema resolution, which has no
//! `!!timestamp`: a plain date such as `digest: 2025-01-01` is a string
//! leaf and is kept.

use heck::ToKebabCase;
use serde_yaml::value::TaggedValue;
use serde_yaml::Value;
use tracing::warn;

use crate::error::ComponentsError;
use crate::types::Components;

/// Resolved tag of a scalar node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScalarTag {
    Str,
    Int,
    Float,
    Bool,
    Null,
    /// Explicit application tag such as `!custom`
    Custom(String),
}

impl std::fmt::Display for ScalarTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScalarTag::Str => f.write_str("!!str"),
            ScalarTag::Int => f.write_str("!!int"),
            ScalarTag::Float => f.write_str("!!float"),
            ScalarTag::Bool => f.write_str("!!bool"),
            ScalarTag::Null => f.write_str("!!null"),
            ScalarTag::Custom(tag) => f.write_str(tag),
        }
    }
}

/// Untyped YAML tree.
#[derive(Debug, Clone, PartialEq)]
pub enum YamlNode {
    /// Key/value pairs in document order
    Mapping(Vec<(String, YamlNode)>),
    Sequence(Vec<YamlNode>),
    Scalar { value: String, tag: ScalarTag },
}

impl YamlNode {
    pub fn string(value: impl Into<String>) -> Self {
        YamlNode::Scalar {
            value: value.into(),
            tag: ScalarTag::Str,
        }
    }
}

fn key_text(key: &Value) -> String {
    match key {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        Value::Tagged(tagged) => key_text(&tagged.value),
        Value::Sequence(_) | Value::Mapping(_) => String::new(),
    }
}

impl From<Value> for YamlNode {
    fn from(value: Value) -> Self {
        match value {
            Value::Mapping(map) => YamlNode::Mapping(
                map.into_iter()
                    .map(|(k, v)| (key_text(&k), YamlNode::from(v)))
                    .collect(),
            ),
            Value::Sequence(items) => {
                YamlNode::Sequence(items.into_iter().map(YamlNode::from).collect())
            }
            Value::String(s) => YamlNode::string(s),
            Value::Number(n) => YamlNode::Scalar {
                tag: if n.is_f64() {
                    ScalarTag::Float
                } else {
                    ScalarTag::Int
                },
                value: n.to_string(),
            },
            Value::Bool(b) => YamlNode::Scalar {
                value: b.to_string(),
                tag: ScalarTag::Bool,
            },
            Value::Null => YamlNode::Scalar {
                value: String::new(),
                tag: ScalarTag::Null,
            },
            Value::Tagged(tagged) => {
                let TaggedValue { tag, value } = *tagged;
                match YamlNode::from(value) {
                    YamlNode::Scalar { value, .. } => YamlNode::Scalar {
                        value,
                        tag: ScalarTag::Custom(tag.to_string()),
                    },
                    collection => collection,
                }
            }
        }
    }
}

/// True when the text holds no YAML node, only blanks, comments and markers.
fn is_blank_document(content: &[u8]) -> bool {
    String::from_utf8_lossy(content).lines().all(|line| {
        let line = line.trim();
        line.is_empty() || line.starts_with('#') || line == "---" || line == "..."
    })
}

/// Parse a components manifest into its root node.
pub fn parse_document(content: &[u8]) -> Result<YamlNode, ComponentsError> {
    if is_blank_document(content) {
        return Err(ComponentsError::EmptyDocument);
    }
    // An explicit null root is a leaf like any other and gets skipped.
    let root: Value = serde_yaml::from_slice(content)?;
    Ok(root.into())
}

/// Parse and flatten a components manifest.
pub fn extract_components(content: &[u8]) -> Result<Components, ComponentsError> {
    let root = parse_document(content)?;
    let mut components = Components::new();
    let mut path = Vec::new();
    walk(&root, &mut path, &mut components)?;
    Ok(components)
}

/// Depth-first walk collecting string leaves into `out`.
///
/// Non-string and empty leaves are skipped with a warning; a string leaf
/// with no path at all means the document is not a tree of components.
pub fn walk(
    node: &YamlNode,
    path: &mut Vec<String>,
    out: &mut Components,
) -> Result<(), ComponentsError> {
    match node {
        YamlNode::Mapping(entries) => {
            for (key, value) in entries {
                path.push(key.clone());
                let result = walk(value, path, out);
                path.pop();
                result?;
            }
        }
        YamlNode::Sequence(items) => {
            for (index, value) in items.iter().enumerate() {
                path.push(index.to_string());
                let result = walk(value, path, out);
                path.pop();
                result?;
            }
        }
        YamlNode::Scalar { value, tag } => {
            if *tag != ScalarTag::Str || value.is_empty() {
                warn!(
                    event = "components.leaf_skipped",
                    tag = %tag,
                    path = %path.join("."),
                    "string node expected"
                );
                return Ok(());
            }

            let Some((_, name_parts)) = path.split_last() else {
                return Err(ComponentsError::PathlessLeaf {
                    value: value.clone(),
                });
            };

            let name = name_parts
                .iter()
                .map(|part| part.to_kebab_case())
                .collect::<Vec<_>>()
                .join(".");
            let digest = value.strip_prefix("sha256:").unwrap_or(value);
            out.insert(name, digest.to_string());
        }
    }
    Ok(())
}
