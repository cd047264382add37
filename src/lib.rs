//! # Shader Graph Translator
//!
//! Translates host material node graphs (Blender-style shader node trees)
//! into the native material node graphs of a renderer.
//!
//! The translator walks the graph backwards from the material output,
//! resolving each requested output socket to a [`Value`]: a folded constant,
//! a native node, an image or nothing. Arithmetic over constants is folded
//! at translation time, so simple graphs collapse to literals instead of
//! chains of native math nodes.
//!
//! ## Quick Start
//!
//! ```rust
//! use shadergraph::{translate_material, MaterialBuilder, NativeNodeKind, RecordingBackend};
//!
//! let material = MaterialBuilder::new("glow")
//!     .node("emission", "ShaderNodeEmission")
//!     .input("Color", [1.0, 0.5, 0.0])
//!     .input("Strength", 2.0)
//!     .shader_output("Emission")
//!     .output_node()
//!     .link("emission", "Emission", "Material Output", "Surface")
//!     .build();
//!
//! let mut backend = RecordingBackend::new();
//! let root = translate_material(&material, &mut backend);
//! assert_eq!(backend.node(root).unwrap().kind, NativeNodeKind::Twosided);
//! ```
//!
//! ## Architecture
//!
//! 1. **Dispatch** - Each host node kind maps to declarative rules
//!    (`rules/builtin.json`), a procedural handler or the group inliner
//! 2. **Translation** - Outputs are resolved depth-first and memoized per
//!    group call site
//! 3. **Recovery** - A failing material is replaced by a fallback shader

pub mod backend;
pub mod cache;
pub mod compiler;
pub mod config;
pub mod error;
pub mod folding;
pub mod kind;
pub mod rules;
pub mod source;
pub mod translator;
pub mod value;

// Re-export the main translation API
pub use compiler::{
    fallback_shader,
    translate_material,
    translate_material_with_options,
    translate_material_with_table,
};

pub use backend::{ImageDescriptor, ImageError, ParamValue, RecordingBackend, TargetBackend, WrapMode};
pub use config::{ConfigError, TranslateOptions};
pub use error::{Result, TranslationError};
pub use kind::{ArithmeticOp, Lookup, NativeNodeKind, NodeKind};
pub use rules::{RuleError, RuleSet};
pub use source::{MaterialBuilder, MaterialDocument, NodeId, SocketKey, SourceGraph, TreeId};
pub use translator::{DispatchTable, MaterialTranslator};
pub use value::{Literal, NativeImageHandle, NativeNodeHandle, Value, Vec4};
