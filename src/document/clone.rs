//! Structural clone of nested documents.
//!
//! Containers are copied with an explicit work stack instead of recursion,
//! so arbitrarily deep documents never exhaust the call stack.

use serde_yaml::value::{Tag, TaggedValue};
use serde_yaml::{Mapping, Sequence, Value, mapping};

/// A container whose children are still being copied.
enum Frame<'a> {
    Sequence {
        items: std::slice::Iter<'a, Value>,
        out: Sequence,
    },
    Mapping {
        entries: mapping::Iter<'a>,
        key: Option<Value>,
        out: Mapping,
    },
    Tagged {
        tag: Tag,
        inner: Option<&'a Value>,
        out: Value,
    },
}

impl<'a> Frame<'a> {
    fn open(value: &'a Value) -> Result<Value, Self> {
        match value {
            Value::Sequence(items) => Err(Self::Sequence {
                items: items.iter(),
                out: Sequence::with_capacity(items.len()),
            }),
            Value::Mapping(map) => Err(Self::Mapping {
                entries: map.iter(),
                key: None,
                out: Mapping::with_capacity(map.len()),
            }),
            Value::Tagged(tagged) => Err(Self::Tagged {
                tag: tagged.tag.clone(),
                inner: Some(&tagged.value),
                out: Value::Null,
            }),
            leaf => Ok(leaf.clone()),
        }
    }

    fn next_child(&mut self) -> Option<&'a Value> {
        match self {
            Self::Sequence { items, .. } => items.next(),
            Self::Mapping { entries, key, .. } => entries.next().map(|(k, v)| {
                *key = Some(k.clone());
                v
            }),
            Self::Tagged { inner, .. } => inner.take(),
        }
    }

    fn attach(&mut self, value: Value) {
        match self {
            Self::Sequence { out, .. } => out.push(value),
            Self::Mapping { key, out, .. } => {
                if let Some(key) = key.take() {
                    out.insert(key, value);
                }
            }
            Self::Tagged { out, .. } => *out = value,
        }
    }

    fn finish(self) -> Value {
        match self {
            Self::Sequence { out, .. } => Value::Sequence(out),
            Self::Mapping { out, .. } => Value::Mapping(out),
            Self::Tagged { tag, out, .. } => Value::Tagged(Box::new(TaggedValue { tag, value: out })),
        }
    }
}

/// Deep-copy `value`.
///
/// The result is structurally equal to the input and shares no container
/// with it at any depth.
pub fn structural_clone(value: &Value) -> Value {
    let mut stack = match Frame::open(value) {
        Ok(leaf) => return leaf,
        Err(frame) => vec![frame],
    };

    while let Some(top) = stack.last_mut() {
        match top.next_child() {
            Some(child) => match Frame::open(child) {
                Ok(leaf) => top.attach(leaf),
                Err(frame) => stack.push(frame),
            },
            None => {
                let Some(finished) = stack.pop().map(Frame::finish) else {
                    break;
                };
                match stack.last_mut() {
                    Some(parent) => parent.attach(finished),
                    None => return finished,
                }
            }
        }
    }
    Value::Null
}

/// Deep-copy a mapping.
pub fn structural_clone_mapping(mapping: &Mapping) -> Mapping {
    mapping
        .iter()
        .map(|(key, value)| (key.clone(), structural_clone(value)))
        .collect()
}
