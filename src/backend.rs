//! # Target Backend
//!
//! The narrow creation interface the translator writes native material
//! nodes through, plus an in-memory implementation that records what was
//! created.

use crate::kind::NativeNodeKind;
use crate::value::{NativeImageHandle, NativeNodeHandle, Vec4};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// How an image texture samples outside `[0, 1]`
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WrapMode {
    #[default]
    Repeat,
    ClampToEdge,
    ClampZero,
}

impl WrapMode {
    /// Map the host's texture extension setting
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension {
            "REPEAT" => Some(WrapMode::Repeat),
            "EXTEND" => Some(WrapMode::ClampToEdge),
            "CLIP" => Some(WrapMode::ClampZero),
            _ => None,
        }
    }
}

/// What the backend needs to load an image
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageDescriptor {
    pub name: String,
    #[serde(default)]
    pub wrap: WrapMode,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ImageError {
    #[error("image '{0}' not found")]
    NotFound(String),
    #[error("image '{name}' could not be decoded: {reason}")]
    Decode { name: String, reason: String },
}

/// Native material node creation API
///
/// Node and parameter calls are infallible; only image loading can fail.
pub trait TargetBackend {
    fn create_native_node(&mut self, kind: NativeNodeKind) -> NativeNodeHandle;
    fn set_node_param_constant(&mut self, node: NativeNodeHandle, param: &str, value: Vec4);
    fn set_node_param_node(&mut self, node: NativeNodeHandle, param: &str, input: NativeNodeHandle);
    fn set_node_param_image(&mut self, node: NativeNodeHandle, param: &str, image: NativeImageHandle);
    fn materialize_image(&mut self, source: &ImageDescriptor) -> Result<NativeImageHandle, ImageError>;
    fn register_material_root(&mut self, material: &str, root: NativeNodeHandle);
}

/// A parameter value as recorded by [`RecordingBackend`]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamValue {
    Constant(Vec4),
    Node(NativeNodeHandle),
    Image(NativeImageHandle),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecordedNode {
    pub kind: NativeNodeKind,
    pub params: BTreeMap<String, ParamValue>,
}

/// In-memory backend that keeps every node, image and material root it is
/// asked to create. Two recordings of the same translation compare equal.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordingBackend {
    pub nodes: Vec<RecordedNode>,
    pub images: Vec<ImageDescriptor>,
    pub roots: BTreeMap<String, NativeNodeHandle>,
    #[serde(skip)]
    failing_images: BTreeSet<String>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `materialize_image` fail for the named image
    pub fn with_failing_image(mut self, name: impl Into<String>) -> Self {
        self.failing_images.insert(name.into());
        self
    }

    pub fn node(&self, handle: NativeNodeHandle) -> Option<&RecordedNode> {
        self.nodes.get(handle.0 as usize)
    }

    pub fn param(&self, handle: NativeNodeHandle, param: &str) -> Option<&ParamValue> {
        self.node(handle).and_then(|node| node.params.get(param))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of recorded nodes matching `pred`
    pub fn count_kind(&self, pred: impl Fn(&NativeNodeKind) -> bool) -> usize {
        self.nodes.iter().filter(|node| pred(&node.kind)).count()
    }

    pub fn root(&self, material: &str) -> Option<NativeNodeHandle> {
        self.roots.get(material).copied()
    }

    fn set(&mut self, node: NativeNodeHandle, param: &str, value: ParamValue) {
        if let Some(recorded) = self.nodes.get_mut(node.0 as usize) {
            recorded.params.insert(param.to_string(), value);
        } else {
            tracing::warn!("[BACKEND] Parameter '{}' set on unknown node {:?}", param, node);
        }
    }
}

impl TargetBackend for RecordingBackend {
    fn create_native_node(&mut self, kind: NativeNodeKind) -> NativeNodeHandle {
        let handle = NativeNodeHandle(self.nodes.len() as u32);
        self.nodes.push(RecordedNode {
            kind,
            params: BTreeMap::new(),
        });
        handle
    }

    fn set_node_param_constant(&mut self, node: NativeNodeHandle, param: &str, value: Vec4) {
        self.set(node, param, ParamValue::Constant(value));
    }

    fn set_node_param_node(&mut self, node: NativeNodeHandle, param: &str, input: NativeNodeHandle) {
        self.set(node, param, ParamValue::Node(input));
    }

    fn set_node_param_image(&mut self, node: NativeNodeHandle, param: &str, image: NativeImageHandle) {
        self.set(node, param, ParamValue::Image(image));
    }

    fn materialize_image(&mut self, source: &ImageDescriptor) -> Result<NativeImageHandle, ImageError> {
        if self.failing_images.contains(&source.name) {
            return Err(ImageError::NotFound(source.name.clone()));
        }
        // identical images are shared
        if let Some(index) = self.images.iter().position(|image| image == source) {
            return Ok(NativeImageHandle(index as u32));
        }
        self.images.push(source.clone());
        Ok(NativeImageHandle(self.images.len() as u32 - 1))
    }

    fn register_material_root(&mut self, material: &str, root: NativeNodeHandle) {
        self.roots.insert(material.to_string(), root);
    }
}
