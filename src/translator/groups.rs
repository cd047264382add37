//! # Group Inliner
//!
//! Node groups are inlined at every call site. Entering a group pushes a
//! [`GroupCallFrame`]; the group's internal nodes are then translated with the
//! call-site chain as part of their cache key. When a group-input node is
//! reached the walk steps back out to the call site, resolves the argument
//! there, and steps back in.
//!
//! Arguments are resolved lazily: a formal input the group never reads is
//! never translated.

use super::graph_translator::MaterialTranslator;
use crate::error::{Result, TranslationError};
use crate::kind::NodeKind;
use crate::source::{NodeId, SocketKey, TreeId};
use crate::value::Value;
use std::collections::HashMap;

/// One active group invocation
#[derive(Debug, Clone, PartialEq)]
pub struct GroupCallFrame {
    /// Group node the walk returns to when it leaves the group
    pub call_site: NodeId,
    /// Tree being executed
    pub tree: TreeId,
    arguments: HashMap<String, Value>,
}

impl GroupCallFrame {
    pub fn new(call_site: NodeId, tree: TreeId) -> Self {
        Self {
            call_site,
            tree,
            arguments: HashMap::new(),
        }
    }

    /// Argument already resolved for a formal input
    pub fn argument(&self, formal: &str) -> Option<Value> {
        self.arguments.get(formal).copied()
    }

    fn remember(&mut self, formal: &str, value: Value) {
        self.arguments.insert(formal.to_string(), value);
    }
}

/// Stack of group invocations, outermost first
#[derive(Debug, Default)]
pub struct GroupStack {
    frames: Vec<GroupCallFrame>,
}

impl GroupStack {
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Call sites of every active frame, used to scope cache keys
    pub fn scope(&self) -> Vec<NodeId> {
        self.frames.iter().map(|frame| frame.call_site).collect()
    }

    pub fn contains_tree(&self, tree: TreeId) -> bool {
        self.frames.iter().any(|frame| frame.tree == tree)
    }

    /// Index of the innermost frame executing `tree`
    fn innermost(&self, tree: TreeId) -> Option<usize> {
        self.frames.iter().rposition(|frame| frame.tree == tree)
    }

    fn push(&mut self, frame: GroupCallFrame) {
        self.frames.push(frame);
    }

    fn pop(&mut self) -> Option<GroupCallFrame> {
        self.frames.pop()
    }

    /// Detach the frame at `index` and everything above it
    fn split_off(&mut self, index: usize) -> Vec<GroupCallFrame> {
        self.frames.split_off(index)
    }

    fn restore(&mut self, frames: Vec<GroupCallFrame>) {
        self.frames.extend(frames);
    }

    fn frames_mut(&mut self) -> &mut [GroupCallFrame] {
        &mut self.frames
    }
}

impl<'a> MaterialTranslator<'a> {
    pub(super) fn translate_group_boundary(
        &mut self,
        node: NodeId,
        kind: &NodeKind,
        output: &str,
    ) -> Result<Value> {
        match kind {
            NodeKind::Group => self.translate_group_call(node, output),
            NodeKind::GroupInput => self.resolve_group_input(node, output),
            // inside a group the output node just forwards its inputs
            _ => self.input(node, SocketKey::Name(output)),
        }
    }

    fn translate_group_call(&mut self, call_site: NodeId, output: &str) -> Result<Value> {
        let frame = self.enter_group(call_site, output)?;
        let Some(group_output) = self.graph().group_output(frame.tree) else {
            return Err(TranslationError::UnresolvableGroupBoundary {
                node: self.name(call_site),
                reason: "group has no output node".to_string(),
            });
        };

        self.groups.push(frame);
        let result = self.translate_output(group_output, output);
        if let Some(frame) = self.groups.pop() {
            self.exit_group(frame);
        }
        result
    }

    /// Build the frame for a call site. Calling a group that is already being
    /// executed further up the stack is a cycle.
    pub(super) fn enter_group(&mut self, call_site: NodeId, output: &str) -> Result<GroupCallFrame> {
        let tree = self.graph().group_tree(call_site).ok_or_else(|| {
            TranslationError::UnresolvableGroupBoundary {
                node: self.name(call_site),
                reason: "group node references no node tree".to_string(),
            }
        })?;

        if self.groups.contains_tree(tree) {
            return Err(TranslationError::CyclicGraph {
                node: self.name(call_site),
                output: output.to_string(),
            });
        }

        tracing::debug!(
            "[TRANSLATE] Entering group '{}' (depth {})",
            self.name(call_site),
            self.groups.depth() + 1
        );
        Ok(GroupCallFrame::new(call_site, tree))
    }

    /// Resolve a formal input of the group executing `group_input`'s tree
    ///
    /// The argument is translated in the caller's scope, then memoized in the
    /// frame so further group-input nodes of the same call reuse it. An
    /// unconnected argument falls back to the call site's default, then to
    /// the formal's own default.
    pub fn resolve_group_input(&mut self, group_input: NodeId, formal: &str) -> Result<Value> {
        let Some(index) = self.groups.innermost(group_input.tree) else {
            return Err(TranslationError::UnresolvableGroupBoundary {
                node: self.name(group_input),
                reason: "group input reached outside of a group call".to_string(),
            });
        };

        let inner = self.groups.split_off(index);
        if let Some(value) = inner[0].argument(formal) {
            self.groups.restore(inner);
            return Ok(value);
        }

        let call_site = inner[0].call_site;
        let argument = if self.graph().input(call_site, SocketKey::Name(formal)).is_some() {
            self.input(call_site, SocketKey::Name(formal))
        } else {
            Err(TranslationError::UnresolvableGroupBoundary {
                node: self.name(call_site),
                reason: format!("call site has no input '{formal}'"),
            })
        };
        self.groups.restore(inner);

        let value = argument?.or(self
            .graph()
            .output_default(group_input, formal)
            .map_or(Value::Unset, Value::Constant));

        if let Some(frame) = self.groups.frames_mut().get_mut(index) {
            frame.remember(formal, value);
        }
        Ok(value)
    }

    pub(super) fn exit_group(&mut self, frame: GroupCallFrame) {
        tracing::debug!(
            "[TRANSLATE] Leaving group '{}' ({} arguments resolved)",
            self.name(frame.call_site),
            frame.arguments.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::RecordingBackend;
    use crate::source::{MaterialBuilder, MaterialDocument};
    use crate::translator::DispatchTable;

    /// Group "Scale" computing `Factor * Value`, called from `call`
    fn scale_group(builder: MaterialBuilder) -> MaterialBuilder {
        builder
            .group("Scale")
            .node("Group Input", "NodeGroupInput")
            .output("Factor")
            .output_with_default("Value", 1.0)
            .node("mul", "ShaderNodeMath")
            .text("operation", "MULTIPLY")
            .input("Value", 0.0)
            .input("Value", 0.0)
            .output("Value")
            .node("Group Output", "NodeGroupOutput")
            .input_empty("Value")
            .link_index("Group Input", "Factor", "mul", 0)
            .link_index("Group Input", "Value", "mul", 1)
            .link("mul", "Value", "Group Output", "Value")
            .end_group()
    }

    fn call(builder: MaterialBuilder, name: &str, factor: f32) -> MaterialBuilder {
        builder
            .node(name, "ShaderNodeGroup")
            .text("node_tree", "Scale")
            .input("Factor", factor)
            .input_empty("Value")
            .output("Value")
    }

    fn translate(doc: &MaterialDocument, node: &str, output: &str) -> (Result<Value>, RecordingBackend) {
        let table = DispatchTable::builtin().unwrap();
        let mut backend = RecordingBackend::new();
        let node = doc.find(TreeId::MATERIAL, node).unwrap();
        let result = MaterialTranslator::new(doc, &mut backend, table).translate_output(node, output);
        (result, backend)
    }

    #[test]
    fn arguments_fall_back_to_defaults() {
        let doc = scale_group(call(MaterialBuilder::new("group"), "call", 3.0)).build();
        let (value, backend) = translate(&doc, "call", "Value");
        // Factor from the call site, Value from the formal default
        assert_eq!(value.unwrap(), Value::scalar(3.0));
        assert_eq!(backend.node_count(), 0);
    }

    #[test]
    fn linked_argument_is_resolved_outside() {
        let builder = MaterialBuilder::new("group")
            .node("two", "ShaderNodeValue")
            .output_with_default("Value", 2.0);
        let doc = scale_group(call(builder, "call", 5.0))
            .link("two", "Value", "call", "Value")
            .build();

        let (value, _) = translate(&doc, "call", "Value");
        assert_eq!(value.unwrap(), Value::scalar(10.0));
    }

    #[test]
    fn call_sites_get_separate_scopes() {
        let builder = call(call(MaterialBuilder::new("group"), "double", 2.0), "triple", 3.0)
            .node("sum", "ShaderNodeMath")
            .text("operation", "ADD")
            .input("Value", 0.0)
            .input("Value", 0.0)
            .output("Value")
            .link_index("double", "Value", "sum", 0)
            .link_index("triple", "Value", "sum", 1);
        let doc = scale_group(builder).build();

        let (value, _) = translate(&doc, "sum", "Value");
        assert_eq!(value.unwrap(), Value::scalar(5.0));
    }

    #[test]
    fn unused_formal_is_never_evaluated() {
        // "broken" would fail translation if anything read it
        let doc = MaterialBuilder::new("lazy")
            .node("broken", "ShaderNodeTexVoronoi")
            .output("Color")
            .node("call", "ShaderNodeGroup")
            .text("node_tree", "Constant")
            .input_empty("Unused")
            .output("Value")
            .link("broken", "Color", "call", "Unused")
            .group("Constant")
            .node("Group Input", "NodeGroupInput")
            .output("Unused")
            .node("Group Output", "NodeGroupOutput")
            .input("Value", 0.75)
            .end_group()
            .build();

        let (value, _) = translate(&doc, "call", "Value");
        assert_eq!(value.unwrap(), Value::scalar(0.75));
    }

    #[test]
    fn nested_groups_resolve_through_each_frame() {
        let doc = MaterialBuilder::new("nested")
            .node("outer", "ShaderNodeGroup")
            .text("node_tree", "Outer")
            .input("Factor", 4.0)
            .output("Value")
            .group("Outer")
            .node("Group Input", "NodeGroupInput")
            .output("Factor")
            .node("inner", "ShaderNodeGroup")
            .text("node_tree", "Scale")
            .input("Factor", 0.0)
            .input("Value", 0.5)
            .output("Value")
            .node("Group Output", "NodeGroupOutput")
            .input_empty("Value")
            .link("Group Input", "Factor", "inner", "Factor")
            .link("inner", "Value", "Group Output", "Value")
            .end_group();
        let doc = scale_group(doc).build();

        let (value, _) = translate(&doc, "outer", "Value");
        assert_eq!(value.unwrap(), Value::scalar(2.0));
    }

    #[test]
    fn recursive_group_is_a_cycle() {
        let doc = MaterialBuilder::new("recursive")
            .node("call", "ShaderNodeGroup")
            .text("node_tree", "Loop")
            .output("Value")
            .group("Loop")
            .node("again", "ShaderNodeGroup")
            .text("node_tree", "Loop")
            .output("Value")
            .node("Group Output", "NodeGroupOutput")
            .input_empty("Value")
            .link("again", "Value", "Group Output", "Value")
            .end_group()
            .build();

        let (value, _) = translate(&doc, "call", "Value");
        assert!(matches!(value, Err(TranslationError::CyclicGraph { .. })));
    }

    #[test]
    fn group_without_output_is_unresolvable() {
        let doc = MaterialBuilder::new("hollow")
            .node("call", "ShaderNodeGroup")
            .text("node_tree", "Empty")
            .output("Value")
            .group("Empty")
            .node("Group Input", "NodeGroupInput")
            .end_group()
            .build();

        let (value, _) = translate(&doc, "call", "Value");
        assert!(matches!(
            value,
            Err(TranslationError::UnresolvableGroupBoundary { .. })
        ));
    }

    #[test]
    fn frame_memoizes_arguments() {
        let mut frame = GroupCallFrame::new(
            NodeId {
                tree: TreeId::MATERIAL,
                index: 0,
            },
            TreeId(1),
        );
        assert_eq!(frame.argument("Color"), None);
        frame.remember("Color", Value::scalar(0.5));
        assert_eq!(frame.argument("Color"), Some(Value::scalar(0.5)));
    }
}
