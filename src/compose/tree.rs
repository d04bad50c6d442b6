//! Key lookup over untyped compose documents
//!
//! Compose documents are kept as [`serde_yaml::Value`] trees so that keys we
//! do not model survive a parse/serialize cycle untouched. This module finds
//! nodes by key inside such a tree.
//!
//! Search order is depth-first and deterministic:
//!
//! 1. At a mapping, a key that matches directly at that level wins.
//! 2. Otherwise every mapping-valued entry is searched, in document order.
//! 3. Then every element of every sequence-valued entry, in document order.
//!
//! A sequence at the root is searched element by element. Scalars never match.
//! Because [`serde_yaml::Mapping`] preserves insertion order, the result only
//! depends on the document text.

use serde_yaml::{Mapping, Value};

/// One step on the way from a root value to a nested node
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// Entry of a mapping, by key
    Key(Value),
    /// Element of a sequence, by position
    Index(usize),
}

/// Find the first node stored under `key`
pub fn find<'a>(tree: &'a Value, key: &str) -> Option<&'a Value> {
    let path = locate(tree, key)?;
    resolve(tree, &path)
}

/// Mutable counterpart of [`find`], following the same search order
pub fn find_mut<'a>(tree: &'a mut Value, key: &str) -> Option<&'a mut Value> {
    let path = locate(tree, key)?;
    resolve_mut(tree, &path)
}

/// Path from `tree` to the first node stored under `key`
pub fn locate(tree: &Value, key: &str) -> Option<Vec<Segment>> {
    let mut path = Vec::new();
    if locate_into(tree, key, &mut path) {
        Some(path)
    } else {
        None
    }
}

fn locate_into(tree: &Value, key: &str, path: &mut Vec<Segment>) -> bool {
    match tree {
        Value::Mapping(map) => locate_in_mapping(map, key, path),
        Value::Sequence(seq) => locate_in_sequence(seq, key, path),
        _ => false,
    }
}

fn locate_in_mapping(map: &Mapping, key: &str, path: &mut Vec<Segment>) -> bool {
    for (k, _) in map.iter() {
        if k.as_str() == Some(key) {
            path.push(Segment::Key(k.clone()));
            return true;
        }
    }

    for (k, v) in map.iter() {
        if let Value::Mapping(inner) = v {
            path.push(Segment::Key(k.clone()));
            if locate_in_mapping(inner, key, path) {
                return true;
            }
            path.pop();
        }
    }

    for (k, v) in map.iter() {
        if let Value::Sequence(seq) = v {
            path.push(Segment::Key(k.clone()));
            if locate_in_sequence(seq, key, path) {
                return true;
            }
            path.pop();
        }
    }

    false
}

fn locate_in_sequence(seq: &[Value], key: &str, path: &mut Vec<Segment>) -> bool {
    for (i, item) in seq.iter().enumerate() {
        path.push(Segment::Index(i));
        if locate_into(item, key, path) {
            return true;
        }
        path.pop();
    }
    false
}

/// Follow `path` from `tree`
pub fn resolve<'a>(tree: &'a Value, path: &[Segment]) -> Option<&'a Value> {
    path.iter().try_fold(tree, |node, segment| match (node, segment) {
        (Value::Mapping(map), Segment::Key(k)) => map.get(k),
        (Value::Sequence(seq), Segment::Index(i)) => seq.get(*i),
        _ => None,
    })
}

/// Follow `path` from `tree`, mutably
pub fn resolve_mut<'a>(tree: &'a mut Value, path: &[Segment]) -> Option<&'a mut Value> {
    let mut node = tree;
    for segment in path {
        node = match (node, segment) {
            (Value::Mapping(map), Segment::Key(k)) => map.get_mut(k)?,
            (Value::Sequence(seq), Segment::Index(i)) => seq.get_mut(*i)?,
            _ => return None,
        };
    }
    Some(node)
}

/// String keys of a mapping node, in document order; `None` if `node` is not a mapping
pub fn mapping_keys(node: &Value) -> Option<Vec<&str>> {
    match node {
        Value::Mapping(map) => Some(map.keys().filter_map(Value::as_str).collect()),
        _ => None,
    }
}
