//! # Translation Values
//!
//! The result type flowing through the graph walk. A value is either a
//! literal that can still be folded, a reference to something already
//! materialized in the target backend, or nothing at all.

use serde::{Deserialize, Serialize};

/// Four float lanes. Every constant is stored fully defined.
pub type Vec4 = [f32; 4];

pub const ZERO: Vec4 = [0.0; 4];

/// Handle of a node created in the target backend
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NativeNodeHandle(pub u32);

/// Handle of an image materialized in the target backend
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NativeImageHandle(pub u32);

/// Result of translating one output socket
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Value {
    Constant(Vec4),
    Node(NativeNodeHandle),
    /// Loaded image. Built-in handlers only pass images as node parameters
    /// and return the texture node wrapping them.
    Image(NativeImageHandle),
    /// No connection and no usable default
    Unset,
}

impl Value {
    pub fn scalar(v: f32) -> Self {
        Value::Constant([v; 4])
    }

    pub fn vec3(x: f32, y: f32, z: f32) -> Self {
        Value::Constant([x, y, z, 1.0])
    }

    pub fn vec4(x: f32, y: f32, z: f32, w: f32) -> Self {
        Value::Constant([x, y, z, w])
    }

    pub fn is_constant(&self) -> bool {
        matches!(self, Value::Constant(_))
    }

    pub fn is_node(&self) -> bool {
        matches!(self, Value::Node(_))
    }

    pub fn is_image(&self) -> bool {
        matches!(self, Value::Image(_))
    }

    pub fn is_unset(&self) -> bool {
        matches!(self, Value::Unset)
    }

    pub fn as_constant(&self) -> Option<Vec4> {
        match self {
            Value::Constant(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_node(&self) -> Option<NativeNodeHandle> {
        match self {
            Value::Node(handle) => Some(*handle),
            _ => None,
        }
    }

    /// True when the value is a constant whose lanes all equal `v`
    pub fn is_splat(&self, v: f32) -> bool {
        self.as_constant().is_some_and(|c| c.iter().all(|lane| *lane == v))
    }

    /// Replace `Unset` with `other`
    pub fn or(self, other: Value) -> Value {
        if self.is_unset() {
            other
        } else {
            self
        }
    }
}

impl From<Literal> for Value {
    fn from(literal: Literal) -> Self {
        Value::Constant(literal.to_vec4())
    }
}

/// A literal as written by the host or in rule files: a scalar or a
/// 2-, 3- or 4-component vector.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    Scalar(f32),
    Vector(Vec<f32>),
}

impl Literal {
    /// Expand to four lanes: scalars broadcast, 2-vectors get `z = 0, w = 1`,
    /// 3-vectors get `w = 1`. Extra components are dropped and an empty
    /// vector reads as zero.
    pub fn to_vec4(&self) -> Vec4 {
        match self {
            Literal::Scalar(v) => [*v; 4],
            Literal::Vector(items) => match items.as_slice() {
                [] => ZERO,
                [x] => [*x; 4],
                [x, y] => [*x, *y, 0.0, 1.0],
                [x, y, z] => [*x, *y, *z, 1.0],
                [x, y, z, w, ..] => [*x, *y, *z, *w],
            },
        }
    }
}

impl From<f32> for Literal {
    fn from(v: f32) -> Self {
        Literal::Scalar(v)
    }
}

impl From<f64> for Literal {
    fn from(v: f64) -> Self {
        Literal::Scalar(v as f32)
    }
}

impl<const N: usize> From<[f32; N]> for Literal {
    fn from(v: [f32; N]) -> Self {
        Literal::Vector(v.to_vec())
    }
}

impl<const N: usize> From<[f64; N]> for Literal {
    fn from(v: [f64; N]) -> Self {
        Literal::Vector(v.iter().map(|c| *c as f32).collect())
    }
}
