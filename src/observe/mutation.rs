//! Mutation records and their application to JSON documents.
//!
//! Paths are JSON pointers (RFC 6901): `""` is the root, `/items/0` the
//! first element of `items`. The final segment `-` on an array appends.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// One in-place edit of an observed document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mutation {
    /// JSON pointer to the edited location.
    pub path: String,
    pub op: MutationOp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MutationOp {
    /// Insert or overwrite the value at `path`.
    Set { value: Value },
    /// Delete the value at `path`.
    Remove,
    /// Append to the array at `path`.
    Push { value: Value },
}

/// Errors raised when a mutation cannot be applied.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MutationError {
    #[error("invalid JSON pointer: {0:?}")]
    InvalidPath(String),

    #[error("no value at {0:?}")]
    MissingPath(String),

    #[error("value at {0:?} is not an object or array")]
    NotAContainer(String),

    #[error("index {index} out of range at {path:?}")]
    IndexOutOfRange { path: String, index: usize },
}

impl Mutation {
    pub fn set(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            path: path.into(),
            op: MutationOp::Set {
                value: value.into(),
            },
        }
    }

    pub fn remove(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            op: MutationOp::Remove,
        }
    }

    pub fn push(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            path: path.into(),
            op: MutationOp::Push {
                value: value.into(),
            },
        }
    }

    /// Apply this mutation to `target` in place.
    pub fn apply_to(&self, target: &mut Value) -> Result<(), MutationError> {
        if let MutationOp::Push { value } = &self.op {
            return match target.pointer_mut(&self.path) {
                Some(Value::Array(items)) => {
                    items.push(value.clone());
                    Ok(())
                }
                Some(_) => Err(MutationError::NotAContainer(self.path.clone())),
                None => Err(MutationError::MissingPath(self.path.clone())),
            };
        }

        if self.path.is_empty() {
            *target = match &self.op {
                MutationOp::Set { value } => value.clone(),
                _ => Value::Null,
            };
            return Ok(());
        }

        let (parent_path, key) = split_pointer(&self.path)?;
        let parent = target
            .pointer_mut(parent_path)
            .ok_or_else(|| MutationError::MissingPath(parent_path.to_string()))?;

        match (parent, &self.op) {
            (Value::Object(map), MutationOp::Set { value }) => {
                map.insert(key, value.clone());
                Ok(())
            }
            (Value::Object(map), MutationOp::Remove) => {
                map.remove(&key);
                Ok(())
            }
            (Value::Array(items), MutationOp::Set { value }) => {
                if key == "-" {
                    items.push(value.clone());
                    return Ok(());
                }
                let index = self.index(&key)?;
                match index.cmp(&items.len()) {
                    std::cmp::Ordering::Less => items[index] = value.clone(),
                    std::cmp::Ordering::Equal => items.push(value.clone()),
                    std::cmp::Ordering::Greater => {
                        return Err(MutationError::IndexOutOfRange {
                            path: self.path.clone(),
                            index,
                        })
                    }
                }
                Ok(())
            }
            (Value::Array(items), MutationOp::Remove) => {
                let index = self.index(&key)?;
                if index >= items.len() {
                    return Err(MutationError::IndexOutOfRange {
                        path: self.path.clone(),
                        index,
                    });
                }
                items.remove(index);
                Ok(())
            }
            _ => Err(MutationError::NotAContainer(parent_path.to_string())),
        }
    }

    fn index(&self, key: &str) -> Result<usize, MutationError> {
        key.parse()
            .map_err(|_| MutationError::InvalidPath(self.path.clone()))
    }
}

/// Split a non-empty pointer into its parent pointer and unescaped last token.
fn split_pointer(path: &str) -> Result<(&str, String), MutationError> {
    if !path.starts_with('/') {
        return Err(MutationError::InvalidPath(path.to_string()));
    }
    // Safe: the pointer starts with '/', so rfind always hits.
    let cut = path.rfind('/').unwrap_or(0);
    let token = path[cut + 1..].replace("~1", "/").replace("~0", "~");
    Ok((&path[..cut], token))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_nested_key() {
        let mut doc = json!({ "user": { "name": "ada" } });
        Mutation::set("/user/name", "grace").apply_to(&mut doc).unwrap();
        Mutation::set("/user/age", 36).apply_to(&mut doc).unwrap();
        assert_eq!(doc, json!({ "user": { "name": "grace", "age": 36 } }));
    }

    #[test]
    fn test_array_edits() {
        let mut doc = json!({ "items": [1, 2] });
        Mutation::set("/items/-", 3).apply_to(&mut doc).unwrap();
        Mutation::set("/items/0", 10).apply_to(&mut doc).unwrap();
        Mutation::push("/items", 4).apply_to(&mut doc).unwrap();
        Mutation::remove("/items/1").apply_to(&mut doc).unwrap();
        assert_eq!(doc, json!({ "items": [10, 3, 4] }));
    }

    #[test]
    fn test_root_replacement() {
        let mut doc = json!({ "a": 1 });
        Mutation::set("", json!([1])).apply_to(&mut doc).unwrap();
        assert_eq!(doc, json!([1]));
    }

    #[test]
    fn test_escaped_tokens() {
        let mut doc = json!({});
        Mutation::set("/a~1b", 1).apply_to(&mut doc).unwrap();
        Mutation::set("/c~0d", 2).apply_to(&mut doc).unwrap();
        assert_eq!(doc, json!({ "a/b": 1, "c~d": 2 }));
    }

    #[test]
    fn test_errors() {
        let mut doc = json!({ "items": [], "n": 1 });
        assert_eq!(
            Mutation::set("nope", 1).apply_to(&mut doc),
            Err(MutationError::InvalidPath("nope".into()))
        );
        assert_eq!(
            Mutation::set("/missing/x", 1).apply_to(&mut doc),
            Err(MutationError::MissingPath("/missing".into()))
        );
        assert_eq!(
            Mutation::set("/n/x", 1).apply_to(&mut doc),
            Err(MutationError::NotAContainer("/n".into()))
        );
        assert!(matches!(
            Mutation::set("/items/5", 1).apply_to(&mut doc),
            Err(MutationError::IndexOutOfRange { index: 5, .. })
        ));
    }

    #[test]
    fn test_wire_shape() {
        let json = serde_json::to_value(Mutation::set("/a", 1)).unwrap();
        assert_eq!(json, json!({ "path": "/a", "op": { "kind": "set", "value": 1 } }));
    }
}
