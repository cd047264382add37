//! # Material Translator
//!
//! The recursive walker. One [`MaterialTranslator`] translates one material;
//! its cache and group stack never outlive that pass.

use super::dispatch::{DispatchTable, TranslationRule};
use super::groups::GroupStack;
use crate::backend::TargetBackend;
use crate::cache::{CacheKey, TranslationCache};
use crate::error::{Result, TranslationError};
use crate::folding::{set_param, Folder};
use crate::kind::NodeKind;
use crate::rules::{FoldOp, NodeRules, RuleError, RuleNodeType, ValueSource};
use crate::source::{LinkSource, NodeId, Property, SocketKey, SocketView, SourceGraph};
use crate::value::{NativeNodeHandle, Value};
use std::collections::HashSet;

/// Translates one material graph into native nodes
pub struct MaterialTranslator<'a> {
    graph: &'a dyn SourceGraph,
    backend: &'a mut dyn TargetBackend,
    table: &'a DispatchTable,
    pub(super) cache: TranslationCache,
    pub(super) groups: GroupStack,
    /// Keys currently being translated, for cycle detection
    active: HashSet<CacheKey>,
}

impl<'a> MaterialTranslator<'a> {
    pub fn new(
        graph: &'a dyn SourceGraph,
        backend: &'a mut dyn TargetBackend,
        table: &'a DispatchTable,
    ) -> Self {
        Self {
            graph,
            backend,
            table,
            cache: TranslationCache::new(),
            groups: GroupStack::default(),
            active: HashSet::new(),
        }
    }

    pub fn graph(&self) -> &'a dyn SourceGraph {
        self.graph
    }

    pub fn backend(&mut self) -> &mut dyn TargetBackend {
        &mut *self.backend
    }

    /// Arithmetic over the backend, folding constants where possible
    pub fn folder(&mut self) -> Folder<'_> {
        Folder::new(&mut *self.backend)
    }

    pub fn cache(&self) -> &TranslationCache {
        &self.cache
    }

    /// Node name for diagnostics
    pub fn name(&self, node: NodeId) -> String {
        let name = self.graph.node_name(node);
        if name.is_empty() {
            node.to_string()
        } else {
            name.to_string()
        }
    }

    pub fn property(&self, node: NodeId, name: &str) -> Option<&'a Property> {
        self.graph.property(node, name)
    }

    pub(super) fn key(&self, node: NodeId, output: &str) -> CacheKey {
        CacheKey::new(self.graph.material_name(), node, output, self.groups.scope())
    }

    /// Translate the material output node into the material's root shader
    pub fn translate_material_output(&mut self) -> Result<NativeNodeHandle> {
        let output = self
            .graph
            .output_node()
            .ok_or_else(|| TranslationError::MissingOutputNode {
                material: self.graph.material_name().to_string(),
            })?;

        let surface = self.translate_output(output, "Surface")?;
        surface
            .as_node()
            .ok_or_else(|| TranslationError::MissingRequiredLink {
                node: self.name(output),
                socket: "Surface".to_string(),
            })
    }

    /// Resolve one output socket of a node to a value
    ///
    /// Results are memoized per group-call context, so a node feeding several
    /// consumers creates its native nodes once. Re-entering a socket that is
    /// still being translated is a [`TranslationError::CyclicGraph`].
    pub fn translate_output(&mut self, node: NodeId, output: &str) -> Result<Value> {
        let key = self.key(node, output);
        if let Some(value) = self.cache.get(&key) {
            return Ok(value);
        }

        if !self.active.insert(key.clone()) {
            return Err(TranslationError::CyclicGraph {
                node: self.name(node),
                output: output.to_string(),
            });
        }
        let result = self.translate_uncached(node, output);
        self.active.remove(&key);

        let value = result?;
        self.cache.put(key, value);
        Ok(value)
    }

    fn translate_uncached(&mut self, node: NodeId, output: &str) -> Result<Value> {
        let kind = self.graph.node_kind(node);

        if kind.is_reroute() {
            return self.forward_reroute(node);
        }
        if self.graph.node_muted(node) {
            return self.pass_muted(node);
        }

        tracing::debug!("[TRANSLATE] {} '{}' output '{}'", kind, self.name(node), output);

        let table = self.table;
        match table.resolve(&kind) {
            Some(TranslationRule::Declarative(rules)) => self.evaluate_rule(node, &kind, rules, output),
            Some(TranslationRule::Procedural(handler)) => handler(self, node, output),
            Some(TranslationRule::GroupBoundary) => self.translate_group_boundary(node, &kind, output),
            None => Err(TranslationError::UnsupportedNodeKind {
                node: self.name(node),
                kind: kind.to_string(),
            }),
        }
    }

    fn forward_reroute(&mut self, node: NodeId) -> Result<Value> {
        let value = self.input_link(node, SocketKey::Index(0))?;
        if value.is_unset() {
            tracing::warn!("[TRANSLATE] Reroute '{}' is not connected", self.name(node));
        }
        Ok(value)
    }

    /// A muted node forwards its first connected input
    fn pass_muted(&mut self, node: NodeId) -> Result<Value> {
        for index in 0..self.graph.input_count(node) {
            if self.has_link(node, SocketKey::Index(index)) {
                return self.input_link(node, SocketKey::Index(index));
            }
        }
        Ok(Value::Unset)
    }

    fn socket(&self, node: NodeId, key: SocketKey<'_>) -> Result<SocketView<'a>> {
        self.graph
            .input(node, key)
            .ok_or_else(|| TranslationError::InvalidSocket {
                node: self.name(node),
                socket: key.to_string(),
            })
    }

    /// Visible link into an input, validated
    fn visible_link(&self, node: NodeId, socket: &SocketView<'a>) -> Result<Option<LinkSource<'a>>> {
        let Some(link) = socket.link.filter(|link| !link.hidden) else {
            return Ok(None);
        };

        let typeless = |kind: NodeKind| matches!(kind, NodeKind::Reroute | NodeKind::GroupInput);
        let checked = !typeless(self.graph.node_kind(link.node)) && !typeless(self.graph.node_kind(node));
        if checked && link.is_shader != socket.is_shader {
            return Err(TranslationError::InvalidLink {
                node: self.name(node),
                socket: socket.name.to_string(),
            });
        }
        Ok(Some(link))
    }

    pub fn has_link(&self, node: NodeId, key: SocketKey<'_>) -> bool {
        self.graph
            .input(node, key)
            .and_then(|socket| socket.link)
            .is_some_and(|link| !link.hidden)
    }

    /// Linked value, or the socket default when unlinked, or `Unset`
    pub fn input(&mut self, node: NodeId, key: SocketKey<'_>) -> Result<Value> {
        let socket = self.socket(node, key)?;
        match self.visible_link(node, &socket)? {
            Some(link) => self.translate_output(link.node, link.output),
            None => Ok(socket.default.map_or(Value::Unset, Value::Constant)),
        }
    }

    /// Linked value only; an unlinked socket reads as `Unset`
    pub fn input_link(&mut self, node: NodeId, key: SocketKey<'_>) -> Result<Value> {
        let socket = self.socket(node, key)?;
        match self.visible_link(node, &socket)? {
            Some(link) => self.translate_output(link.node, link.output),
            None => Ok(Value::Unset),
        }
    }

    /// Socket default only, ignoring any link
    pub fn input_default(&self, node: NodeId, key: SocketKey<'_>) -> Result<Value> {
        let socket = self.socket(node, key)?;
        Ok(socket.default.map_or(Value::Unset, Value::Constant))
    }

    /// Linked value that must be present
    pub fn required_link(&mut self, node: NodeId, key: SocketKey<'_>) -> Result<Value> {
        let value = self.input_link(node, key)?;
        if value.is_unset() {
            return Err(TranslationError::MissingRequiredLink {
                node: self.name(node),
                socket: key.to_string(),
            });
        }
        Ok(value)
    }

    fn evaluate_rule(
        &mut self,
        node: NodeId,
        kind: &NodeKind,
        rules: &'a NodeRules,
        output: &str,
    ) -> Result<Value> {
        if rules.get(output).is_none() {
            tracing::warn!(
                "[TRANSLATE] {} '{}' has no translation for output '{}'",
                kind,
                self.name(node),
                output
            );
            return Ok(Value::Unset);
        }
        let key = self.key(node, output);
        self.evaluate_sub_node(node, kind, rules, &key, output)
    }

    /// Translate one sub-node of a rule entry, resolving its parameters in
    /// table order
    fn evaluate_sub_node(
        &mut self,
        node: NodeId,
        kind: &NodeKind,
        rules: &'a NodeRules,
        key: &CacheKey,
        name: &str,
    ) -> Result<Value> {
        if let Some(value) = self.cache.get_sub_node(key, name) {
            return Ok(value);
        }

        let rule = rules.get(name).ok_or_else(|| RuleError::UnknownSubNode {
            kind: kind.to_string(),
            sub_node: key.output.clone(),
            reference: name.to_string(),
        })?;
        if let Some(message) = &rule.warn {
            tracing::warn!("[TRANSLATE] {} ('{}')", message, self.name(node));
        }

        let mut params = Vec::with_capacity(rule.params.len());
        for (param, source) in &rule.params {
            let value = match source {
                ValueSource::Input(socket) => self.input(node, SocketKey::Name(socket))?,
                ValueSource::Link(socket) => self.input_link(node, SocketKey::Name(socket))?,
                ValueSource::Default(socket) => self.input_default(node, SocketKey::Name(socket))?,
                ValueSource::Node(sub_node) => self.evaluate_sub_node(node, kind, rules, key, sub_node)?,
                ValueSource::Literal(literal) => Value::Constant(literal.to_vec4()),
            };
            params.push((param.as_str(), value));
        }

        let value = match rule.node_type {
            RuleNodeType::Native(native) => {
                let handle = self.backend.create_native_node(native);
                for (param, value) in &params {
                    set_param(&mut *self.backend, handle, param, *value);
                }
                Value::Node(handle)
            }
            RuleNodeType::Fold(op) => self.fold_params(op, &params),
        };

        self.cache.put_sub_node(key, name, value);
        Ok(value)
    }

    fn fold_params(&mut self, op: FoldOp, params: &[(&str, Value)]) -> Value {
        let param = |name: &str| {
            params
                .iter()
                .find(|(param, _)| *param == name)
                .map_or(Value::Unset, |(_, value)| *value)
        };
        let a = param("color0");
        let b = param("color1");

        let mut folder = self.folder();
        match op {
            FoldOp::Add => folder.add(a, b),
            FoldOp::Sub => folder.sub(a, b),
            FoldOp::Mul => folder.mul(a, b),
            FoldOp::Div => folder.div(a, b),
            FoldOp::Max => folder.max(a, b),
            FoldOp::Min => folder.min(a, b),
            FoldOp::Pow => folder.binary(crate::kind::ArithmeticOp::Pow, a, b),
            FoldOp::Blend => folder.blend(param("weight"), a, b),
        }
    }
}
