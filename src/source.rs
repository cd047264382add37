//! # Source Graph
//!
//! Read-only view of the host's material node graph, and a serde-backed
//! in-memory graph that implements it.
//!
//! Nodes are addressed by [`NodeId`], a stable `(tree, index)` pair. The
//! material's own node tree is [`TreeId::MATERIAL`]; every reusable node
//! group gets a tree of its own.

use crate::kind::NodeKind;
use crate::value::{Literal, Vec4};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TreeId(pub u32);

impl TreeId {
    pub const MATERIAL: TreeId = TreeId(0);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    pub tree: TreeId,
    pub index: u32,
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.tree.0, self.index)
    }
}

/// Input socket address: by name, or by position for nodes whose inputs
/// share a name
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SocketKey<'a> {
    Name(&'a str),
    Index(usize),
}

impl fmt::Display for SocketKey<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SocketKey::Name(name) => f.write_str(name),
            SocketKey::Index(index) => write!(f, "#{index}"),
        }
    }
}

impl<'a> From<&'a str> for SocketKey<'a> {
    fn from(name: &'a str) -> Self {
        SocketKey::Name(name)
    }
}

impl From<usize> for SocketKey<'_> {
    fn from(index: usize) -> Self {
        SocketKey::Index(index)
    }
}

/// Upstream end of a link
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LinkSource<'a> {
    pub node: NodeId,
    pub output: &'a str,
    /// Upstream output carries a shader closure
    pub is_shader: bool,
    /// Link exists but is hidden in the host UI; it is treated as absent
    pub hidden: bool,
}

/// One input socket as seen by the translator
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SocketView<'a> {
    pub name: &'a str,
    pub default: Option<Vec4>,
    pub is_shader: bool,
    pub link: Option<LinkSource<'a>>,
}

/// Free-form node property
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Property {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl Property {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Property::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Property::Bool(flag) => Some(*flag),
            _ => None,
        }
    }
}

/// Read access to a host material graph
pub trait SourceGraph {
    fn material_name(&self) -> &str;

    /// The material's active output node
    fn output_node(&self) -> Option<NodeId>;

    fn node_kind(&self, node: NodeId) -> NodeKind;

    /// Human-readable node name, used in diagnostics
    fn node_name(&self, node: NodeId) -> &str;

    fn node_muted(&self, node: NodeId) -> bool;

    fn input(&self, node: NodeId, key: SocketKey<'_>) -> Option<SocketView<'_>>;

    fn input_count(&self, node: NodeId) -> usize;

    fn output_default(&self, node: NodeId, output: &str) -> Option<Vec4>;

    fn property(&self, node: NodeId, name: &str) -> Option<&Property>;

    /// Tree invoked by a group call site
    fn group_tree(&self, call_site: NodeId) -> Option<TreeId>;

    /// Active group-output node inside a group tree
    fn group_output(&self, tree: TreeId) -> Option<NodeId>;
}

// In-memory graph

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SocketDecl {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Literal>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub shader: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeDecl {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(default)]
    pub inputs: Vec<SocketDecl>,
    #[serde(default)]
    pub outputs: Vec<SocketDecl>,
    #[serde(default)]
    pub properties: BTreeMap<String, Property>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub mute: bool,
}

/// Link target socket, by name or by position
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SocketRef {
    Index(usize),
    Name(String),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LinkDecl {
    pub from_node: String,
    pub from_socket: String,
    pub to_node: String,
    pub to_socket: SocketRef,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub hidden: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeTree {
    #[serde(default)]
    pub nodes: Vec<NodeDecl>,
    #[serde(default)]
    pub links: Vec<LinkDecl>,
}

impl NodeTree {
    fn node_index(&self, name: &str) -> Option<usize> {
        self.nodes.iter().position(|node| node.name == name)
    }

    fn input_index(&self, node: usize, key: SocketKey<'_>) -> Option<usize> {
        let inputs = &self.nodes[node].inputs;
        match key {
            SocketKey::Index(index) => (index < inputs.len()).then_some(index),
            SocketKey::Name(name) => inputs.iter().position(|socket| socket.name == name),
        }
    }

    fn link_into(&self, node: usize, input: usize) -> Option<&LinkDecl> {
        let node_decl = &self.nodes[node];
        self.links.iter().find(|link| {
            link.to_node == node_decl.name
                && match &link.to_socket {
                    SocketRef::Index(index) => *index == input,
                    // a name addresses the first input carrying it
                    SocketRef::Name(name) => self.input_index(node, SocketKey::Name(name)) == Some(input),
                }
        })
    }

    fn first_of_kind(&self, kind: &NodeKind) -> Option<usize> {
        self.nodes.iter().position(|node| &node.kind == kind)
    }
}

/// A named reusable node group
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeGroup {
    pub name: String,
    #[serde(flatten)]
    pub tree: NodeTree,
}

/// A whole material: its node tree plus the groups it references.
/// Group nodes name their group in the `node_tree` property.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MaterialDocument {
    pub name: String,
    #[serde(flatten)]
    pub tree: NodeTree,
    #[serde(default)]
    pub groups: Vec<NodeGroup>,
}

impl MaterialDocument {
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(std::io::Error::from)
    }

    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    fn tree(&self, tree: TreeId) -> Option<&NodeTree> {
        match tree.0 {
            0 => Some(&self.tree),
            n => self.groups.get(n as usize - 1).map(|group| &group.tree),
        }
    }

    fn decl(&self, node: NodeId) -> Option<&NodeDecl> {
        self.tree(node.tree)
            .and_then(|tree| tree.nodes.get(node.index as usize))
    }

    /// Look a node up by tree and name
    pub fn find(&self, tree: TreeId, name: &str) -> Option<NodeId> {
        let index = self.tree(tree)?.node_index(name)?;
        Some(NodeId {
            tree,
            index: index as u32,
        })
    }

    pub fn group_id(&self, name: &str) -> Option<TreeId> {
        self.groups
            .iter()
            .position(|group| group.name == name)
            .map(|index| TreeId(index as u32 + 1))
    }
}

impl SourceGraph for MaterialDocument {
    fn material_name(&self) -> &str {
        &self.name
    }

    fn output_node(&self) -> Option<NodeId> {
        let index = self.tree.first_of_kind(&NodeKind::OutputMaterial)?;
        Some(NodeId {
            tree: TreeId::MATERIAL,
            index: index as u32,
        })
    }

    fn node_kind(&self, node: NodeId) -> NodeKind {
        self.decl(node)
            .map(|decl| decl.kind.clone())
            .unwrap_or_else(|| NodeKind::Unknown(String::new()))
    }

    fn node_name(&self, node: NodeId) -> &str {
        self.decl(node).map(|decl| decl.name.as_str()).unwrap_or("")
    }

    fn node_muted(&self, node: NodeId) -> bool {
        self.decl(node).is_some_and(|decl| decl.mute)
    }

    fn input(&self, node: NodeId, key: SocketKey<'_>) -> Option<SocketView<'_>> {
        let tree = self.tree(node.tree)?;
        let node_index = node.index as usize;
        let decl = tree.nodes.get(node_index)?;
        let input = tree.input_index(node_index, key)?;
        let socket = &decl.inputs[input];

        let link = tree.link_into(node_index, input).and_then(|link| {
            let from = tree.node_index(&link.from_node)?;
            let from_decl = &tree.nodes[from];
            let is_shader = from_decl
                .outputs
                .iter()
                .find(|output| output.name == link.from_socket)
                .is_some_and(|output| output.shader);
            Some(LinkSource {
                node: NodeId {
                    tree: node.tree,
                    index: from as u32,
                },
                output: link.from_socket.as_str(),
                is_shader,
                hidden: link.hidden,
            })
        });

        Some(SocketView {
            name: &socket.name,
            default: socket.default.as_ref().map(Literal::to_vec4),
            is_shader: socket.shader,
            link,
        })
    }

    fn input_count(&self, node: NodeId) -> usize {
        self.decl(node).map_or(0, |decl| decl.inputs.len())
    }

    fn output_default(&self, node: NodeId, output: &str) -> Option<Vec4> {
        self.decl(node)?
            .outputs
            .iter()
            .find(|socket| socket.name == output)?
            .default
            .as_ref()
            .map(Literal::to_vec4)
    }

    fn property(&self, node: NodeId, name: &str) -> Option<&Property> {
        self.decl(node)?.properties.get(name)
    }

    fn group_tree(&self, call_site: NodeId) -> Option<TreeId> {
        let group_name = self.property(call_site, "node_tree")?.as_str()?;
        self.group_id(group_name)
    }

    fn group_output(&self, tree: TreeId) -> Option<NodeId> {
        let index = self.tree(tree)?.first_of_kind(&NodeKind::GroupOutput)?;
        Some(NodeId {
            tree,
            index: index as u32,
        })
    }
}

// Builder

/// Fluent construction of a [`MaterialDocument`]
///
/// ```rust
/// use shadergraph::source::MaterialBuilder;
///
/// let material = MaterialBuilder::new("red")
///     .node("diffuse", "ShaderNodeBsdfDiffuse")
///     .input("Color", [0.8, 0.1, 0.1])
///     .input("Roughness", 0.0)
///     .input_empty("Normal")
///     .shader_output("BSDF")
///     .output_node()
///     .link("diffuse", "BSDF", "Material Output", "Surface")
///     .build();
/// assert_eq!(material.tree.nodes.len(), 2);
/// ```
#[derive(Debug)]
pub struct MaterialBuilder {
    document: MaterialDocument,
    current_tree: Option<usize>,
}

impl MaterialBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            document: MaterialDocument {
                name: name.into(),
                tree: NodeTree::default(),
                groups: Vec::new(),
            },
            current_tree: None,
        }
    }

    fn tree_mut(&mut self) -> &mut NodeTree {
        match self.current_tree {
            Some(index) => &mut self.document.groups[index].tree,
            None => &mut self.document.tree,
        }
    }

    fn last_node(&mut self) -> Option<&mut NodeDecl> {
        self.tree_mut().nodes.last_mut()
    }

    /// Start adding nodes to a new group tree
    pub fn group(mut self, name: impl Into<String>) -> Self {
        self.document.groups.push(NodeGroup {
            name: name.into(),
            tree: NodeTree::default(),
        });
        self.current_tree = Some(self.document.groups.len() - 1);
        self
    }

    /// Go back to adding nodes to the material's own tree
    pub fn end_group(mut self) -> Self {
        self.current_tree = None;
        self
    }

    pub fn node(mut self, name: impl Into<String>, host_id: &str) -> Self {
        self.tree_mut().nodes.push(NodeDecl {
            name: name.into(),
            kind: NodeKind::from_host_id(host_id),
            inputs: Vec::new(),
            outputs: Vec::new(),
            properties: BTreeMap::new(),
            mute: false,
        });
        self
    }

    /// Material output node named "Material Output" with Surface and Volume
    pub fn output_node(self) -> Self {
        self.node("Material Output", "ShaderNodeOutputMaterial")
            .shader_input("Surface")
            .shader_input("Volume")
    }

    fn push_input(mut self, socket: SocketDecl) -> Self {
        if let Some(node) = self.last_node() {
            node.inputs.push(socket);
        }
        self
    }

    fn push_output(mut self, socket: SocketDecl) -> Self {
        if let Some(node) = self.last_node() {
            node.outputs.push(socket);
        }
        self
    }

    pub fn input(self, name: impl Into<String>, default: impl Into<Literal>) -> Self {
        self.push_input(SocketDecl {
            name: name.into(),
            default: Some(default.into()),
            shader: false,
        })
    }

    /// Input socket without a default value
    pub fn input_empty(self, name: impl Into<String>) -> Self {
        self.push_input(SocketDecl {
            name: name.into(),
            default: None,
            shader: false,
        })
    }

    pub fn shader_input(self, name: impl Into<String>) -> Self {
        self.push_input(SocketDecl {
            name: name.into(),
            default: None,
            shader: true,
        })
    }

    pub fn output(self, name: impl Into<String>) -> Self {
        self.push_output(SocketDecl {
            name: name.into(),
            default: None,
            shader: false,
        })
    }

    pub fn output_with_default(self, name: impl Into<String>, default: impl Into<Literal>) -> Self {
        self.push_output(SocketDecl {
            name: name.into(),
            default: Some(default.into()),
            shader: false,
        })
    }

    pub fn shader_output(self, name: impl Into<String>) -> Self {
        self.push_output(SocketDecl {
            name: name.into(),
            default: None,
            shader: true,
        })
    }

    pub fn property(mut self, name: impl Into<String>, value: Property) -> Self {
        if let Some(node) = self.last_node() {
            node.properties.insert(name.into(), value);
        }
        self
    }

    pub fn text(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.property(name, Property::Text(value.into()))
    }

    pub fn flag(self, name: impl Into<String>, value: bool) -> Self {
        self.property(name, Property::Bool(value))
    }

    pub fn muted(mut self) -> Self {
        if let Some(node) = self.last_node() {
            node.mute = true;
        }
        self
    }

    pub fn link(
        self,
        from_node: impl Into<String>,
        from_socket: impl Into<String>,
        to_node: impl Into<String>,
        to_socket: impl Into<String>,
    ) -> Self {
        self.push_link(
            from_node.into(),
            from_socket.into(),
            to_node.into(),
            SocketRef::Name(to_socket.into()),
            false,
        )
    }

    /// Link into an input addressed by position
    pub fn link_index(
        self,
        from_node: impl Into<String>,
        from_socket: impl Into<String>,
        to_node: impl Into<String>,
        to_socket: usize,
    ) -> Self {
        self.push_link(
            from_node.into(),
            from_socket.into(),
            to_node.into(),
            SocketRef::Index(to_socket),
            false,
        )
    }

    pub fn hidden_link(
        self,
        from_node: impl Into<String>,
        from_socket: impl Into<String>,
        to_node: impl Into<String>,
        to_socket: impl Into<String>,
    ) -> Self {
        self.push_link(
            from_node.into(),
            from_socket.into(),
            to_node.into(),
            SocketRef::Name(to_socket.into()),
            true,
        )
    }

    fn push_link(
        mut self,
        from_node: String,
        from_socket: String,
        to_node: String,
        to_socket: SocketRef,
        hidden: bool,
    ) -> Self {
        self.tree_mut().links.push(LinkDecl {
            from_node,
            from_socket,
            to_node,
            to_socket,
            hidden,
        });
        self
    }

    pub fn build(self) -> MaterialDocument {
        self.document
    }
}
