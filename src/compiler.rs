//! # Material Translator
//!
//! Main entry points for translating host material graphs into native
//! material graphs.

use crate::backend::TargetBackend;
use crate::config::TranslateOptions;
use crate::error::Result;
use crate::kind::NativeNodeKind;
use crate::rules::RuleSet;
use crate::source::SourceGraph;
use crate::translator::{DispatchTable, MaterialTranslator, ERROR_COLOR, FALLBACK_COLOR};
use crate::value::NativeNodeHandle;

/// Translate a material graph with the built-in rules
///
/// This is the main entry point. It never fails: a graph that cannot be
/// translated is replaced by the fallback shader, and the returned root is
/// registered with the backend under the material's name.
///
/// # Examples
///
/// ```rust
/// use shadergraph::{translate_material, MaterialBuilder, RecordingBackend};
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
///
/// let mut backend = RecordingBackend::new();
/// let root = translate_material(&material, &mut backend);
/// assert_eq!(backend.root("red"), Some(root));
/// ```
pub fn translate_material(graph: &dyn SourceGraph, backend: &mut dyn TargetBackend) -> NativeNodeHandle {
    let options = TranslateOptions::default();
    match translate_material_with_options(graph, backend, &options) {
        Ok(root) => root,
        Err(err) => {
            tracing::error!("[TRANSLATE] Built-in rules unavailable: {}", err);
            let root = fallback_shader(backend, options.show_errors);
            backend.register_material_root(graph.material_name(), root);
            root
        }
    }
}

/// Translate a material graph as configured by `options`
///
/// # Returns
///
/// * `Ok(NativeNodeHandle)` - The material root, possibly the fallback shader
/// * `Err(TranslationError)` - The configured rule file could not be loaded
pub fn translate_material_with_options(
    graph: &dyn SourceGraph,
    backend: &mut dyn TargetBackend,
    options: &TranslateOptions,
) -> Result<NativeNodeHandle> {
    match &options.rules_path {
        Some(path) => {
            let table = DispatchTable::new(RuleSet::from_path(path)?);
            tracing::info!("[TRANSLATE] Loaded {} declarative node rules", table.rules().len());
            Ok(translate_material_with_table(graph, backend, &table, options))
        }
        None => {
            let table = DispatchTable::builtin()?;
            Ok(translate_material_with_table(graph, backend, table, options))
        }
    }
}

/// Translate a material graph against an explicit dispatch table
pub fn translate_material_with_table(
    graph: &dyn SourceGraph,
    backend: &mut dyn TargetBackend,
    table: &DispatchTable,
    options: &TranslateOptions,
) -> NativeNodeHandle {
    let material = graph.material_name();
    tracing::info!("[TRANSLATE] Starting material '{}'", material);

    // Phase 1: Walk the graph from the material output
    tracing::info!("[TRANSLATE] Phase 1: Translating node graph...");
    let result = {
        let mut translator = MaterialTranslator::new(graph, &mut *backend, table);
        let result = translator.translate_material_output();
        tracing::info!("[TRANSLATE]   - {} node outputs resolved", translator.cache().len());
        result
    };

    // Phase 2: Recover from failure
    let root = match result {
        Ok(root) => root,
        Err(err) => {
            tracing::error!("[TRANSLATE] Material '{}' failed: {}", material, err);
            tracing::info!("[TRANSLATE] Phase 2: Substituting fallback shader...");
            fallback_shader(backend, options.show_errors)
        }
    };

    backend.register_material_root(material, root);
    tracing::info!("[TRANSLATE] Material '{}' complete (root {:?})", material, root);
    root
}

/// Shader substituted for a material that failed to translate
///
/// Only creates one node and sets literal parameters, so it cannot fail.
pub fn fallback_shader(backend: &mut dyn TargetBackend, show_errors: bool) -> NativeNodeHandle {
    let (kind, color) = if show_errors {
        (NativeNodeKind::Emissive, ERROR_COLOR)
    } else {
        (NativeNodeKind::Diffuse, FALLBACK_COLOR)
    };
    let node = backend.create_native_node(kind);
    backend.set_node_param_constant(node, "color", color);
    node
}
