//! # Declarative Translation Rules
//!
//! Data-driven mapping from a host node kind to a small DAG of native nodes.
//! A rule table is JSON:
//!
//! ```json
//! {
//!   "ShaderNodeEmission": {
//!     "emission_color": { "type": "*", "params": { "color0": "input.Color", "color1": "input.Strength" } },
//!     "Emission":       { "type": "emissive", "params": { "color": "node.emission_color" } }
//!   }
//! }
//! ```
//!
//! Each entry maps sub-node names to a node type and its parameters. The
//! sub-node named after the requested output socket is the one returned.
//! Parameter sources are `input.<Socket>` (link or default),
//! `link:input.<Socket>` (link only), `default:input.<Socket>` (default
//! only), `node.<SubNode>` (another sub-node of the same entry) or a literal.

use crate::kind::{NativeNodeKind, NodeKind};
use crate::value::Literal;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::Path;
use thiserror::Error;

const BUILTIN_RULES: &str = include_str!("../rules/builtin.json");

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("failed to read rule file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed rule data: {0}")]
    Json(#[from] serde_json::Error),

    #[error("rule '{kind}.{sub_node}' references unknown sub-node '{reference}'")]
    UnknownSubNode {
        kind: String,
        sub_node: String,
        reference: String,
    },

    #[error("rule '{kind}' has a sub-node cycle through '{sub_node}'")]
    CyclicSubNodes { kind: String, sub_node: String },
}

/// Where a rule parameter takes its value from
#[derive(Clone, Debug, PartialEq)]
pub enum ValueSource {
    /// Linked value, or the socket default when unlinked
    Input(String),
    /// Linked value only; unlinked reads as unset
    Link(String),
    /// Socket default only, links ignored
    Default(String),
    /// Another sub-node of the same rule entry
    Node(String),
    Literal(Literal),
}

impl ValueSource {
    fn parse_expr(expr: &str) -> Result<Self, String> {
        if let Some(socket) = expr.strip_prefix("input.") {
            return Ok(ValueSource::Input(socket.to_string()));
        }
        if let Some(socket) = expr.strip_prefix("link:input.") {
            return Ok(ValueSource::Link(socket.to_string()));
        }
        if let Some(socket) = expr.strip_prefix("default:input.") {
            return Ok(ValueSource::Default(socket.to_string()));
        }
        if let Some(sub_node) = expr.strip_prefix("node.") {
            return Ok(ValueSource::Node(sub_node.to_string()));
        }
        Err(format!("invalid value source '{expr}'"))
    }
}

impl fmt::Display for ValueSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueSource::Input(socket) => write!(f, "input.{socket}"),
            ValueSource::Link(socket) => write!(f, "link:input.{socket}"),
            ValueSource::Default(socket) => write!(f, "default:input.{socket}"),
            ValueSource::Node(sub_node) => write!(f, "node.{sub_node}"),
            ValueSource::Literal(literal) => write!(f, "{literal:?}"),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawSource {
    Literal(Literal),
    Expr(String),
}

impl Serialize for ValueSource {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ValueSource::Literal(literal) => literal.serialize(serializer),
            other => serializer.collect_str(other),
        }
    }
}

impl<'de> Deserialize<'de> for ValueSource {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match RawSource::deserialize(deserializer)? {
            RawSource::Literal(literal) => Ok(ValueSource::Literal(literal)),
            RawSource::Expr(expr) => ValueSource::parse_expr(&expr).map_err(serde::de::Error::custom),
        }
    }
}

/// Operators a rule sub-node can evaluate through constant folding instead
/// of creating a native node
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FoldOp {
    Add,
    Sub,
    Mul,
    Div,
    Max,
    Min,
    Pow,
    /// Value blend of `color0`/`color1` by `weight`
    Blend,
}

impl FoldOp {
    const SYMBOLS: &'static [(&'static str, FoldOp)] = &[
        ("+", FoldOp::Add),
        ("-", FoldOp::Sub),
        ("*", FoldOp::Mul),
        ("/", FoldOp::Div),
        ("max", FoldOp::Max),
        ("min", FoldOp::Min),
        ("pow", FoldOp::Pow),
        ("blend", FoldOp::Blend),
    ];

    fn symbol(&self) -> &'static str {
        Self::SYMBOLS
            .iter()
            .find(|(_, op)| op == self)
            .map(|(symbol, _)| *symbol)
            .unwrap_or("")
    }
}

/// Type of a rule sub-node
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RuleNodeType {
    Native(NativeNodeKind),
    Fold(FoldOp),
}

impl Serialize for RuleNodeType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            RuleNodeType::Native(kind) => serializer.serialize_str(&kind.rule_name()),
            RuleNodeType::Fold(op) => serializer.serialize_str(op.symbol()),
        }
    }
}

impl<'de> Deserialize<'de> for RuleNodeType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        if let Some((_, op)) = FoldOp::SYMBOLS.iter().find(|(symbol, _)| *symbol == name) {
            return Ok(RuleNodeType::Fold(*op));
        }
        name.parse::<NativeNodeKind>()
            .map(RuleNodeType::Native)
            .map_err(serde::de::Error::custom)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SubNodeRule {
    #[serde(rename = "type")]
    pub node_type: RuleNodeType,
    /// Resolved in file order
    #[serde(default)]
    pub params: IndexMap<String, ValueSource>,
    /// Logged whenever this sub-node is used
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warn: Option<String>,
}

/// All sub-nodes for one host node kind, keyed by sub-node name
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeRules {
    pub sub_nodes: BTreeMap<String, SubNodeRule>,
}

impl NodeRules {
    pub fn get(&self, sub_node: &str) -> Option<&SubNodeRule> {
        self.sub_nodes.get(sub_node)
    }
}

/// A complete rule table
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleSet {
    pub kinds: BTreeMap<NodeKind, NodeRules>,
}

impl RuleSet {
    /// The rule table shipped with the crate
    pub fn builtin() -> Result<Self, RuleError> {
        Self::from_json_str(BUILTIN_RULES)
    }

    pub fn from_json_str(json: &str) -> Result<Self, RuleError> {
        let rules: RuleSet = serde_json::from_str(json)?;
        rules.validate()?;
        Ok(rules)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, RuleError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| RuleError::Io {
            path: path.display().to_string(),
            source,
        })?;
        tracing::info!("[RULES] Loading rule table from {}", path.display());
        Self::from_json_str(&json)
    }

    pub fn to_json_string(&self) -> Result<String, RuleError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn get(&self, kind: &NodeKind) -> Option<&NodeRules> {
        self.kinds.get(kind)
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    /// Check that every `node.` reference resolves and sub-nodes form a DAG
    pub fn validate(&self) -> Result<(), RuleError> {
        for (kind, rules) in &self.kinds {
            for (name, sub_node) in &rules.sub_nodes {
                for source in sub_node.params.values() {
                    if let ValueSource::Node(reference) = source {
                        if !rules.sub_nodes.contains_key(reference) {
                            return Err(RuleError::UnknownSubNode {
                                kind: kind.to_string(),
                                sub_node: name.clone(),
                                reference: reference.clone(),
                            });
                        }
                    }
                }
            }

            let mut done = HashSet::new();
            for name in rules.sub_nodes.keys() {
                let mut path = Vec::new();
                check_acyclic(kind, rules, name, &mut path, &mut done)?;
            }
        }
        Ok(())
    }
}

fn check_acyclic<'r>(
    kind: &NodeKind,
    rules: &'r NodeRules,
    name: &'r str,
    path: &mut Vec<&'r str>,
    done: &mut HashSet<&'r str>,
) -> Result<(), RuleError> {
    if done.contains(name) {
        return Ok(());
    }
    if path.contains(&name) {
        return Err(RuleError::CyclicSubNodes {
            kind: kind.to_string(),
            sub_node: name.to_string(),
        });
    }

    path.push(name);
    if let Some(sub_node) = rules.sub_nodes.get(name) {
        for source in sub_node.params.values() {
            if let ValueSource::Node(reference) = source {
                check_acyclic(kind, rules, reference, path, done)?;
            }
        }
    }
    path.pop();
    done.insert(name);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_table_loads() {
        let rules = RuleSet::builtin().unwrap();
        let emission = rules.get(&NodeKind::Emission).unwrap();
        let out = emission.get("Emission").unwrap();
        assert_eq!(out.node_type, RuleNodeType::Native(NativeNodeKind::Twosided));
        assert_eq!(
            out.params.get("frontface"),
            Some(&ValueSource::Node("emission_node".into()))
        );
        assert!(rules.get(&NodeKind::Math).is_none());
    }

    #[test]
    fn round_trip_reproduces_the_table() {
        let rules = RuleSet::builtin().unwrap();
        let json = rules.to_json_string().unwrap();
        let reparsed = RuleSet::from_json_str(&json).unwrap();
        assert_eq!(rules, reparsed);
        assert_eq!(json, reparsed.to_json_string().unwrap());
    }

    #[test]
    fn value_sources_parse_every_form() {
        let json = r#"{
            "ShaderNodeGamma": {
                "Color": {
                    "type": "pow",
                    "params": {
                        "color0": "input.Color",
                        "color1": "default:input.Gamma",
                        "normal": "link:input.Normal",
                        "scale": [1.0, 2.0, 3.0],
                        "bias": 0.5
                    }
                }
            }
        }"#;
        let rules = RuleSet::from_json_str(json).unwrap();
        let color = rules.get(&NodeKind::Gamma).unwrap().get("Color").unwrap();
        assert_eq!(color.node_type, RuleNodeType::Fold(FoldOp::Pow));
        assert_eq!(color.params["color0"], ValueSource::Input("Color".into()));
        assert_eq!(color.params["color1"], ValueSource::Default("Gamma".into()));
        assert_eq!(color.params["normal"], ValueSource::Link("Normal".into()));
        assert_eq!(
            color.params["scale"],
            ValueSource::Literal(Literal::Vector(vec![1.0, 2.0, 3.0]))
        );
        assert_eq!(color.params["bias"], ValueSource::Literal(Literal::Scalar(0.5)));
    }

    #[test]
    fn rejects_bad_prefix() {
        let json = r#"{ "ShaderNodeGamma": { "Color": { "type": "pow", "params": { "color0": "scene.unit_scale" } } } }"#;
        assert!(matches!(RuleSet::from_json_str(json), Err(RuleError::Json(_))));
    }

    #[test]
    fn rejects_unknown_native_kind() {
        let json = r#"{ "ShaderNodeGamma": { "Color": { "type": "volume" } } }"#;
        assert!(matches!(RuleSet::from_json_str(json), Err(RuleError::Json(_))));
    }

    #[test]
    fn rejects_dangling_sub_node() {
        let json = r#"{ "ShaderNodeInvert": { "Color": { "type": "+", "params": { "color0": "node.missing" } } } }"#;
        assert!(matches!(
            RuleSet::from_json_str(json),
            Err(RuleError::UnknownSubNode { .. })
        ));
    }

    #[test]
    fn rejects_sub_node_cycles() {
        let json = r#"{
            "ShaderNodeInvert": {
                "a": { "type": "+", "params": { "color0": "node.b" } },
                "b": { "type": "+", "params": { "color0": "node.a" } }
            }
        }"#;
        assert!(matches!(
            RuleSet::from_json_str(json),
            Err(RuleError::CyclicSubNodes { .. })
        ));
    }
}
