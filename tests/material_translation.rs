use shadergraph::translator::{DispatchTable, MaterialTranslator, ERROR_COLOR, FALLBACK_COLOR};
use shadergraph::{
    translate_material, translate_material_with_options, Lookup, MaterialBuilder, MaterialDocument,
    NativeNodeHandle, NativeNodeKind, ParamValue, RecordingBackend, SourceGraph, TranslateOptions,
};
use std::collections::HashMap;

const WOOD: &str = "tests/cases/varnished_wood/material.json";

fn lamp() -> MaterialDocument {
    MaterialBuilder::new("lamp")
        .node("emission", "ShaderNodeEmission")
        .input("Color", [1.0, 0.5, 0.25])
        .input("Strength", 4.0)
        .shader_output("Emission")
        .output_node()
        .link("emission", "Emission", "Material Output", "Surface")
        .build()
}

/// The graph reachable from `root`, with handles renumbered in visit order
fn reachable(backend: &RecordingBackend, root: NativeNodeHandle) -> Vec<String> {
    fn visit(
        backend: &RecordingBackend,
        handle: NativeNodeHandle,
        seen: &mut HashMap<NativeNodeHandle, usize>,
        out: &mut Vec<String>,
    ) -> usize {
        if let Some(&index) = seen.get(&handle) {
            return index;
        }
        let index = seen.len();
        seen.insert(handle, index);
        out.push(String::new());

        let node = backend.node(handle).expect("dangling handle");
        let mut line = format!("{index}: {:?}", node.kind);
        for (param, value) in &node.params {
            let shown = match value {
                ParamValue::Constant(c) => format!("{c:?}"),
                ParamValue::Node(input) => format!("#{}", visit(backend, *input, seen, out)),
                ParamValue::Image(_) => "image".to_string(),
            };
            line.push_str(&format!(" {param}={shown}"));
        }
        out[index] = line;
        index
    }

    let mut out = Vec::new();
    visit(backend, root, &mut HashMap::new(), &mut out);
    out
}

fn load_wood() -> MaterialDocument {
    // several tests share the process; only the first install wins
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    MaterialDocument::from_path(WOOD).expect("load varnished wood material")
}

#[test]
fn fixture_translates_to_blended_shader() {
    let material = load_wood();
    let mut backend = RecordingBackend::new();
    let root = translate_material(&material, &mut backend);

    assert_eq!(backend.root("varnished_wood"), Some(root));
    assert_eq!(backend.node(root).unwrap().kind, NativeNodeKind::Blend);
    assert!(
        matches!(backend.param(root, "weight"), Some(ParamValue::Node(_))),
        "fresnel should drive the blend weight"
    );

    // one coordinate lookup shared by both textures
    assert_eq!(
        backend.count_kind(|kind| *kind == NativeNodeKind::InputLookup(Lookup::Uv)),
        1
    );
    assert_eq!(backend.count_kind(|kind| *kind == NativeNodeKind::ImageTexture), 1);
    assert_eq!(backend.count_kind(|kind| *kind == NativeNodeKind::CheckerTexture), 1);
    assert_eq!(backend.images.len(), 1);
    assert_eq!(backend.images[0].name, "wood_albedo.png");
    assert_eq!(backend.node_count(), 10, "unexpected graph: {:#?}", backend.nodes);
}

#[test]
fn translation_is_deterministic() {
    let material = load_wood();

    let mut first = RecordingBackend::new();
    let mut second = RecordingBackend::new();
    translate_material(&material, &mut first);
    translate_material(&material, &mut second);

    assert_eq!(first, second);
}

#[test]
fn translation_ignores_order_across_materials() {
    let wood = load_wood();
    let lamp = lamp();

    let mut wood_first = RecordingBackend::new();
    let wood_root = translate_material(&wood, &mut wood_first);
    let lamp_after_wood = translate_material(&lamp, &mut wood_first);

    let mut lamp_first = RecordingBackend::new();
    let lamp_root = translate_material(&lamp, &mut lamp_first);
    let wood_after_lamp = translate_material(&wood, &mut lamp_first);

    assert_ne!(lamp_after_wood, lamp_root);
    assert_eq!(reachable(&wood_first, lamp_after_wood), reachable(&lamp_first, lamp_root));
    assert_eq!(reachable(&wood_first, wood_root), reachable(&lamp_first, wood_after_lamp));
    assert_eq!(wood_first.node_count(), lamp_first.node_count());
}

#[test]
fn failed_image_only_affects_its_slot() {
    let material = load_wood();
    let mut backend = RecordingBackend::new().with_failing_image("wood_albedo.png");
    let root = translate_material(&material, &mut backend);

    // the material still translates; only the texture is replaced
    assert_eq!(backend.node(root).unwrap().kind, NativeNodeKind::Blend);
    assert_eq!(backend.count_kind(|kind| *kind == NativeNodeKind::ImageTexture), 0);
    assert!(backend.images.is_empty());

    let diffuse = backend
        .nodes
        .iter()
        .position(|node| node.kind == NativeNodeKind::Diffuse)
        .expect("diffuse base layer");
    let Some(ParamValue::Node(tint)) = backend.nodes[diffuse].params.get("color").cloned() else {
        panic!("diffuse color should come from the tint node");
    };
    assert_eq!(backend.param(tint, "color0"), Some(&ParamValue::Constant(ERROR_COLOR)));
}

#[test]
fn repeated_requests_reuse_the_cache() {
    let material = load_wood();
    let table = DispatchTable::builtin().unwrap();
    let output = material.output_node().unwrap();

    let mut backend = RecordingBackend::new();
    let mut translator = MaterialTranslator::new(&material, &mut backend, table);
    let first = translator.translate_output(output, "Surface").unwrap();
    let cached = translator.cache().len();
    let second = translator.translate_output(output, "Surface").unwrap();
    assert_eq!(first, second);
    assert_eq!(translator.cache().len(), cached);
    drop(translator);

    assert_eq!(backend.node_count(), 10);
}

#[test]
fn fallback_is_deterministic() {
    let material = MaterialBuilder::new("orphan")
        .node("diffuse", "ShaderNodeBsdfDiffuse")
        .input("Color", [0.8, 0.8, 0.8])
        .input("Roughness", 0.0)
        .input_empty("Normal")
        .shader_output("BSDF")
        .build();

    let mut first = RecordingBackend::new();
    let mut second = RecordingBackend::new();
    let a = translate_material(&material, &mut first);
    let b = translate_material(&material, &mut second);

    assert_eq!(first, second);
    assert_eq!(first.node(a).unwrap().kind, NativeNodeKind::Diffuse);
    assert_eq!(first.param(a, "color"), Some(&ParamValue::Constant(FALLBACK_COLOR)));
    assert_eq!(second.param(b, "color"), Some(&ParamValue::Constant(FALLBACK_COLOR)));
}

#[test]
fn unsupported_node_falls_back_to_diagnostic_shader() {
    let material = MaterialBuilder::new("noisy")
        .node("noise", "ShaderNodeTexNoise")
        .output("Color")
        .node("emission", "ShaderNodeEmission")
        .input("Color", [1.0, 1.0, 1.0])
        .input("Strength", 1.0)
        .shader_output("Emission")
        .output_node()
        .link("noise", "Color", "emission", "Color")
        .link("emission", "Emission", "Material Output", "Surface")
        .build();
    let options = TranslateOptions::default().with_show_errors(true);

    let mut backend = RecordingBackend::new();
    let root = translate_material_with_options(&material, &mut backend, &options).unwrap();

    assert_eq!(backend.root("noisy"), Some(root));
    assert_eq!(backend.node(root).unwrap().kind, NativeNodeKind::Emissive);
    assert_eq!(backend.param(root, "color"), Some(&ParamValue::Constant(ERROR_COLOR)));
}

#[test]
fn emission_folds_strength_into_color() {
    let material = lamp();

    let mut backend = RecordingBackend::new();
    let root = translate_material(&material, &mut backend);

    assert_eq!(backend.node(root).unwrap().kind, NativeNodeKind::Twosided);
    let Some(ParamValue::Node(emitter)) = backend.param(root, "frontface").cloned() else {
        panic!("two-sided shader without front face");
    };
    assert_eq!(backend.param(root, "backface"), Some(&ParamValue::Node(emitter)));
    assert_eq!(
        backend.param(emitter, "color"),
        Some(&ParamValue::Constant([4.0, 2.0, 1.0, 4.0]))
    );
    // the multiply folded away
    assert_eq!(backend.node_count(), 2);
}

#[test]
fn recording_dumps_as_json() {
    let material = load_wood();
    let mut backend = RecordingBackend::new();
    translate_material(&material, &mut backend);

    let json = serde_json::to_string_pretty(&backend).unwrap();
    let restored: RecordingBackend = serde_json::from_str(&json).unwrap();
    assert_eq!(restored.nodes, backend.nodes);
    assert_eq!(restored.roots, backend.roots);
}

#[test]
fn document_survives_json_round_trip() {
    let material = load_wood();
    let json = material.to_json_string().unwrap();
    assert_eq!(MaterialDocument::from_json_str(&json).unwrap(), material);
}
