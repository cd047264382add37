//! # Procedural Node Handlers
//!
//! Node kinds whose translation depends on node properties or on the shape
//! of the resolved inputs, and so cannot be written as declarative rules.

use super::dispatch::Handler;
use super::graph_translator::MaterialTranslator;
use crate::backend::{ImageDescriptor, WrapMode};
use crate::error::{Result, TranslationError};
use crate::folding::{arity, set_param};
use crate::kind::{ArithmeticOp, Lookup, NativeNodeKind, NodeKind};
use crate::source::{NodeId, Property, SocketKey};
use crate::value::{Value, Vec4};

/// Color of textures that failed to load and of the diagnostic fallback shader
pub const ERROR_COLOR: Vec4 = [1.0, 0.0, 1.0, 1.0];

/// Color of the fallback shader outside diagnostic mode
pub const FALLBACK_COLOR: Vec4 = [0.5, 0.5, 0.5, 1.0];

pub(super) fn handler(kind: &NodeKind) -> Option<Handler> {
    let handler: Handler = match kind {
        NodeKind::OutputMaterial => material_output,
        NodeKind::Math => math,
        NodeKind::VectorMath => vector_math,
        NodeKind::MixRgb => mix_rgb,
        NodeKind::MixShader => mix_shader,
        NodeKind::AddShader => add_shader,
        NodeKind::TexImage => tex_image,
        NodeKind::TexChecker => tex_checker,
        NodeKind::Value | NodeKind::Rgb => output_default,
        NodeKind::CombineXyz | NodeKind::CombineRgb => combine,
        NodeKind::SeparateXyz | NodeKind::SeparateRgb => separate,
        NodeKind::RgbToBw => rgb_to_bw,
        NodeKind::BrightContrast => bright_contrast,
        NodeKind::Bump => bump,
        NodeKind::NormalMap => normal_map,
        NodeKind::LightFalloff => light_falloff,
        _ => return None,
    };
    Some(handler)
}

fn text<'a>(t: &MaterialTranslator<'a>, node: NodeId, name: &str, default: &'static str) -> &'a str {
    t.property(node, name)
        .and_then(Property::as_str)
        .unwrap_or(default)
}

fn flag(t: &MaterialTranslator<'_>, node: NodeId, name: &str) -> bool {
    t.property(node, name)
        .and_then(Property::as_bool)
        .unwrap_or(false)
}

/// Link into an optional socket; a socket the node does not declare reads
/// as unconnected
fn optional_link(t: &mut MaterialTranslator<'_>, node: NodeId, name: &str) -> Result<Value> {
    if t.graph().input(node, SocketKey::Name(name)).is_none() {
        return Ok(Value::Unset);
    }
    t.input_link(node, SocketKey::Name(name))
}

fn create(t: &mut MaterialTranslator<'_>, kind: NativeNodeKind, params: &[(&str, Value)]) -> Value {
    let backend = t.backend();
    let node = backend.create_native_node(kind);
    for (param, value) in params {
        set_param(backend, node, param, *value);
    }
    Value::Node(node)
}

fn unsupported(t: &MaterialTranslator<'_>, node: NodeId, operation: &str) -> TranslationError {
    TranslationError::UnsupportedOperation {
        node: t.name(node),
        operation: operation.to_string(),
    }
}

/// The material output: `Surface` must carry a shader. A material with only
/// a volume gets a clear surface.
fn material_output(t: &mut MaterialTranslator<'_>, node: NodeId, _output: &str) -> Result<Value> {
    let surface = t.input_link(node, SocketKey::Name("Surface"))?;
    match surface {
        Value::Node(_) => Ok(surface),
        Value::Unset if t.has_link(node, SocketKey::Name("Volume")) => {
            tracing::warn!(
                "[TRANSLATE] Volume shaders are not translated, '{}' gets a transparent surface",
                t.name(node)
            );
            Ok(create(
                t,
                NativeNodeKind::Transparent,
                &[("color", Value::vec4(1.0, 1.0, 1.0, 1.0))],
            ))
        }
        Value::Unset => Err(TranslationError::MissingRequiredLink {
            node: t.name(node),
            socket: "Surface".to_string(),
        }),
        _ => Err(TranslationError::InvalidLink {
            node: t.name(node),
            socket: "Surface".to_string(),
        }),
    }
}

fn math_op(operation: &str) -> Option<ArithmeticOp> {
    use ArithmeticOp::*;
    let op = match operation {
        "ADD" => Add,
        "SUBTRACT" => Sub,
        "MULTIPLY" => Mul,
        "DIVIDE" => Div,
        "POWER" => Pow,
        "LOGARITHM" => Log,
        "MINIMUM" => Min,
        "MAXIMUM" => Max,
        "LESS_THAN" => Lower,
        "GREATER_THAN" => Greater,
        "MODULO" => Mod,
        "ABSOLUTE" => Abs,
        "FLOOR" => Floor,
        "SINE" => Sin,
        "COSINE" => Cos,
        "TANGENT" => Tan,
        "ARCSINE" => Asin,
        "ARCCOSINE" => Acos,
        "ARCTANGENT" => Atan,
        _ => return None,
    };
    Some(op)
}

fn math(t: &mut MaterialTranslator<'_>, node: NodeId, _output: &str) -> Result<Value> {
    let operation = text(t, node, "operation", "ADD");
    let a = t.input(node, SocketKey::Index(0))?;

    let result = match operation {
        "FRACT" => t.folder().fract(a),
        "CEIL" => t.folder().ceil(a),
        "ROUND" => t.folder().round(a),
        _ => {
            let op = math_op(operation).ok_or_else(|| unsupported(t, node, operation))?;
            let b = if arity(op) > 1 {
                t.input(node, SocketKey::Index(1))?
            } else {
                Value::Unset
            };
            t.folder().apply(op, a, b)
        }
    };

    if flag(t, node, "use_clamp") {
        return Ok(t.folder().clamp(result));
    }
    Ok(result)
}

/// Vector math over xyz. The `Value` output is the grayscale of the result.
fn vector_math(t: &mut MaterialTranslator<'_>, node: NodeId, output: &str) -> Result<Value> {
    let operation = text(t, node, "operation", "ADD");
    let a = t.input(node, SocketKey::Index(0))?;

    let result = match operation {
        "NORMALIZE" => t.folder().unary(ArithmeticOp::Normalize3, a),
        "LENGTH" => t.folder().unary(ArithmeticOp::Length3, a),
        _ => {
            let op = match operation {
                "ADD" => ArithmeticOp::Add,
                "SUBTRACT" => ArithmeticOp::Sub,
                "AVERAGE" => ArithmeticOp::Average,
                "DOT_PRODUCT" => ArithmeticOp::Dot3,
                "CROSS_PRODUCT" => ArithmeticOp::Cross3,
                other => return Err(unsupported(t, node, other)),
            };
            let b = t.input(node, SocketKey::Index(1))?;
            t.folder().binary(op, a, b)
        }
    };

    if output == "Value" {
        return Ok(t.folder().to_bw(result));
    }
    Ok(result)
}

fn mix_rgb(t: &mut MaterialTranslator<'_>, node: NodeId, _output: &str) -> Result<Value> {
    let fac = t.input(node, SocketKey::Name("Fac"))?;
    let color1 = t.input(node, SocketKey::Name("Color1"))?;
    let color2 = t.input(node, SocketKey::Name("Color2"))?;

    let blend_type = text(t, node, "blend_type", "MIX");
    let mut folder = t.folder();
    let result = match blend_type {
        "MIX" | "COLOR" => folder.blend(fac, color1, color2),
        "ADD" => {
            let mixed = folder.add(color1, color2);
            folder.blend(fac, color1, mixed)
        }
        "MULTIPLY" => {
            let mixed = folder.mul(color1, color2);
            folder.blend(fac, color1, mixed)
        }
        "SUBTRACT" => {
            let mixed = folder.sub(color1, color2);
            folder.blend(fac, color1, mixed)
        }
        "DIVIDE" => {
            let mixed = folder.div(color1, color2);
            folder.blend(fac, color1, mixed)
        }
        "DIFFERENCE" => {
            let diff = folder.sub(color1, color2);
            let mixed = folder.unary(ArithmeticOp::Abs, diff);
            folder.blend(fac, color1, mixed)
        }
        "DARKEN" => {
            let mixed = folder.min(color1, color2);
            folder.blend(fac, color1, mixed)
        }
        "LIGHTEN" => {
            let mixed = folder.max(color1, color2);
            folder.blend(fac, color1, mixed)
        }
        "VALUE" => color1,
        other => {
            tracing::warn!(
                "[TRANSLATE] Ignoring unsupported blend type '{}' on {}",
                other,
                node
            );
            return Ok(Value::Unset);
        }
    };

    if flag(t, node, "use_clamp") {
        return Ok(t.folder().clamp(result));
    }
    Ok(result)
}

/// Blend of two shaders. Both branches are resolved; the blend node is only
/// created when neither a missing branch nor an exact 0 or 1 factor decides
/// the result.
fn mix_shader(t: &mut MaterialTranslator<'_>, node: NodeId, _output: &str) -> Result<Value> {
    let factor = t.input(node, SocketKey::Name("Fac"))?;
    let shader1 = t.input_link(node, SocketKey::Index(1))?;
    let shader2 = t.input_link(node, SocketKey::Index(2))?;

    match (shader1, shader2) {
        (Value::Unset, Value::Unset) => Err(TranslationError::MissingRequiredLink {
            node: t.name(node),
            socket: "Shader".to_string(),
        }),
        (Value::Unset, shader) | (shader, Value::Unset) => Ok(shader),
        _ if factor.is_splat(0.0) => Ok(shader1),
        _ if factor.is_splat(1.0) => Ok(shader2),
        _ => Ok(create(
            t,
            NativeNodeKind::Blend,
            &[("weight", factor), ("color0", shader1), ("color1", shader2)],
        )),
    }
}

fn add_shader(t: &mut MaterialTranslator<'_>, node: NodeId, _output: &str) -> Result<Value> {
    let shader1 = t.input_link(node, SocketKey::Index(0))?;
    let shader2 = t.input_link(node, SocketKey::Index(1))?;

    match (shader1, shader2) {
        (Value::Unset, shader) | (shader, Value::Unset) => Ok(shader),
        _ => Ok(create(
            t,
            NativeNodeKind::Add,
            &[("color0", shader1), ("color1", shader2)],
        )),
    }
}

fn error_value(output: &str) -> Value {
    if output == "Alpha" {
        Value::scalar(ERROR_COLOR[3])
    } else {
        Value::Constant(ERROR_COLOR)
    }
}

/// Image texture. A missing or unloadable image becomes the error color
/// without failing the material.
fn tex_image(t: &mut MaterialTranslator<'_>, node: NodeId, output: &str) -> Result<Value> {
    let Some(name) = t.property(node, "image").and_then(Property::as_str) else {
        return Ok(error_value(output));
    };

    let extension = text(t, node, "extension", "REPEAT");
    let wrap = WrapMode::from_extension(extension).unwrap_or_else(|| {
        tracing::warn!("[TRANSLATE] Unknown texture extension '{}', repeating", extension);
        WrapMode::Repeat
    });
    let interpolation = text(t, node, "interpolation", "Linear");
    if interpolation != "Linear" {
        tracing::warn!("[TRANSLATE] Ignoring unsupported texture interpolation '{}'", interpolation);
    }
    let projection = text(t, node, "projection", "FLAT");
    if projection != "FLAT" {
        tracing::warn!("[TRANSLATE] Ignoring unsupported texture projection '{}'", projection);
    }

    let descriptor = ImageDescriptor {
        name: name.to_string(),
        wrap,
    };
    let image = match t.backend().materialize_image(&descriptor) {
        Ok(image) => image,
        Err(source) => {
            let err = TranslationError::ImageMaterializationFailed {
                node: t.name(node),
                source,
            };
            tracing::warn!("[TRANSLATE] {}: {:?}, using error color", err, descriptor);
            return Ok(error_value(output));
        }
    };

    let uv = optional_link(t, node, "Vector")?;
    let texture = create(
        t,
        NativeNodeKind::ImageTexture,
        &[("data", Value::Image(image)), ("uv", uv)],
    );

    if output == "Alpha" {
        return Ok(t.folder().select(texture, 3));
    }
    Ok(texture)
}

fn tex_checker(t: &mut MaterialTranslator<'_>, node: NodeId, output: &str) -> Result<Value> {
    let scale = t.input(node, SocketKey::Name("Scale"))?;
    // the native checker tiles eight times denser
    let scale = t.folder().mul(scale, Value::scalar(0.125));

    let mut vector = optional_link(t, node, "Vector")?;
    if vector.is_unset() {
        vector = create(t, NativeNodeKind::InputLookup(Lookup::Uv), &[]);
    }
    let uv = t.folder().mul(scale, vector);
    let checker = create(t, NativeNodeKind::CheckerTexture, &[("uv", uv)]);

    if output == "Fac" {
        return Ok(checker);
    }
    let color1 = t.input(node, SocketKey::Name("Color1"))?;
    let color2 = t.input(node, SocketKey::Name("Color2"))?;
    Ok(t.folder().blend(checker, color1, color2))
}

fn output_default(t: &mut MaterialTranslator<'_>, node: NodeId, output: &str) -> Result<Value> {
    Ok(t.graph()
        .output_default(node, output)
        .map_or(Value::Unset, Value::Constant))
}

fn combine(t: &mut MaterialTranslator<'_>, node: NodeId, _output: &str) -> Result<Value> {
    let x = t.input(node, SocketKey::Index(0))?;
    let y = t.input(node, SocketKey::Index(1))?;
    let z = t.input(node, SocketKey::Index(2))?;
    Ok(t.folder().combine(x, y, z))
}

fn separate(t: &mut MaterialTranslator<'_>, node: NodeId, output: &str) -> Result<Value> {
    let value = t.input(node, SocketKey::Index(0))?;
    let lane = match output {
        "R" | "X" => 0,
        "G" | "Y" => 1,
        _ => 2,
    };
    Ok(t.folder().select(value, lane))
}

fn rgb_to_bw(t: &mut MaterialTranslator<'_>, node: NodeId, _output: &str) -> Result<Value> {
    let color = t.input(node, SocketKey::Name("Color"))?;
    Ok(t.folder().to_bw(color))
}

/// `max(bright + (color - 0.5) * (contrast + 1) + 0.5, 0)`
fn bright_contrast(t: &mut MaterialTranslator<'_>, node: NodeId, _output: &str) -> Result<Value> {
    let bright = t.input(node, SocketKey::Name("Bright"))?;
    let color = t.input(node, SocketKey::Name("Color"))?;
    let contrast = t.input(node, SocketKey::Name("Contrast"))?;

    let mut folder = t.folder();
    let centered = folder.sub(color, Value::scalar(0.5));
    let gain = folder.add(contrast, Value::scalar(1.0));
    let scaled = folder.mul(centered, gain);
    let shifted = folder.add(bright, scaled);
    let result = folder.add(shifted, Value::scalar(0.5));
    Ok(folder.max(result, Value::scalar(0.0)))
}

fn bump(t: &mut MaterialTranslator<'_>, node: NodeId, _output: &str) -> Result<Value> {
    let strength = t.input(node, SocketKey::Name("Strength"))?;
    let mut distance = t.input(node, SocketKey::Name("Distance"))?;
    let height = optional_link(t, node, "Height")?;

    if !height.is_unset() {
        distance = t.folder().mul(distance, height);
    }
    if flag(t, node, "invert") {
        distance = t.folder().neg(distance);
    }
    if !optional_link(t, node, "Normal")?.is_unset() {
        tracing::warn!("[TRANSLATE] Normal input of bump node '{}' is ignored", t.name(node));
    }

    Ok(create(
        t,
        NativeNodeKind::BumpMap,
        &[("color", distance), ("bumpscale", strength)],
    ))
}

fn normal_map(t: &mut MaterialTranslator<'_>, node: NodeId, _output: &str) -> Result<Value> {
    let color = t.input(node, SocketKey::Name("Color"))?;
    let strength = t.input(node, SocketKey::Name("Strength"))?;

    let space = text(t, node, "space", "TANGENT");
    if space != "TANGENT" {
        tracing::warn!("[TRANSLATE] Ignoring unsupported normal map space '{}'", space);
    }
    let uv_map = text(t, node, "uv_map", "");
    if !uv_map.is_empty() && uv_map != "UVMap" {
        tracing::warn!("[TRANSLATE] Ignoring unsupported normal map UV map '{}'", uv_map);
    }

    Ok(create(
        t,
        NativeNodeKind::NormalMap,
        &[("color", color), ("bumpscale", strength)],
    ))
}

/// Falloff is not modelled; only the strength passes through
fn light_falloff(t: &mut MaterialTranslator<'_>, node: NodeId, _output: &str) -> Result<Value> {
    tracing::debug!("[TRANSLATE] Light falloff '{}' reduced to its strength", t.name(node));
    t.input_default(node, SocketKey::Name("Strength"))
}
