//! # Translation Cache
//!
//! Memo table for one translation pass: every `(node, output socket)` in a
//! given group-call context is translated at most once.

use crate::source::NodeId;
use crate::value::Value;
use std::collections::HashMap;
use std::fmt;

/// Identity of one logical graph output
///
/// `scope` lists the group call sites enclosing the node, outermost first,
/// so a node inside a group gets a distinct key per call site.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub material: String,
    pub node: NodeId,
    pub output: String,
    pub scope: Vec<NodeId>,
}

impl CacheKey {
    pub fn new(material: &str, node: NodeId, output: &str, scope: Vec<NodeId>) -> Self {
        Self {
            material: material.to_string(),
            node,
            output: output.to_string(),
            scope,
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}.{}", self.material, self.node, self.output)?;
        for call in &self.scope {
            write!(f, "@{call}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct TranslationCache {
    outputs: HashMap<CacheKey, Value>,
    sub_nodes: HashMap<(CacheKey, String), Value>,
}

impl TranslationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &CacheKey) -> Option<Value> {
        self.outputs.get(key).copied()
    }

    pub fn put(&mut self, key: CacheKey, value: Value) {
        self.outputs.insert(key, value);
    }

    /// Lookup for one internal node of a multi-node rule
    pub fn get_sub_node(&self, key: &CacheKey, sub_node: &str) -> Option<Value> {
        self.sub_nodes
            .get(&(key.clone(), sub_node.to_string()))
            .copied()
    }

    pub fn put_sub_node(&mut self, key: &CacheKey, sub_node: &str, value: Value) {
        self.sub_nodes
            .insert((key.clone(), sub_node.to_string()), value);
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }
}
