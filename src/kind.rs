//! # Node Kinds
//!
//! Closed sets of node kinds on both sides of the translation: the kinds a
//! host material graph may contain, and the native node kinds the target
//! backend can create.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of a host graph node, parsed from the host's node identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeKind {
    OutputMaterial,
    Reroute,
    Group,
    GroupInput,
    GroupOutput,

    Math,
    VectorMath,
    MixRgb,
    MixShader,
    AddShader,
    TexImage,
    TexChecker,
    Value,
    Rgb,
    CombineXyz,
    CombineRgb,
    SeparateXyz,
    SeparateRgb,
    RgbToBw,
    BrightContrast,
    Bump,
    NormalMap,
    LightFalloff,

    BsdfDiffuse,
    BsdfGlossy,
    BsdfGlass,
    BsdfRefraction,
    BsdfTranslucent,
    BsdfTransparent,
    BsdfAnisotropic,
    BsdfVelvet,
    Emission,
    Fresnel,
    Gamma,
    Invert,
    TexCoord,
    NewGeometry,
    SubsurfaceScattering,

    /// Anything the translator has no name for
    Unknown(String),
}

const HOST_IDS: &[(&str, NodeKind)] = &[
    ("ShaderNodeOutputMaterial", NodeKind::OutputMaterial),
    ("NodeReroute", NodeKind::Reroute),
    ("ShaderNodeGroup", NodeKind::Group),
    ("NodeGroupInput", NodeKind::GroupInput),
    ("NodeGroupOutput", NodeKind::GroupOutput),
    ("ShaderNodeMath", NodeKind::Math),
    ("ShaderNodeVectorMath", NodeKind::VectorMath),
    ("ShaderNodeMixRGB", NodeKind::MixRgb),
    ("ShaderNodeMixShader", NodeKind::MixShader),
    ("ShaderNodeAddShader", NodeKind::AddShader),
    ("ShaderNodeTexImage", NodeKind::TexImage),
    ("ShaderNodeTexChecker", NodeKind::TexChecker),
    ("ShaderNodeValue", NodeKind::Value),
    ("ShaderNodeRGB", NodeKind::Rgb),
    ("ShaderNodeCombineXYZ", NodeKind::CombineXyz),
    ("ShaderNodeCombineRGB", NodeKind::CombineRgb),
    ("ShaderNodeSeparateXYZ", NodeKind::SeparateXyz),
    ("ShaderNodeSeparateRGB", NodeKind::SeparateRgb),
    ("ShaderNodeRGBToBW", NodeKind::RgbToBw),
    ("ShaderNodeBrightContrast", NodeKind::BrightContrast),
    ("ShaderNodeBump", NodeKind::Bump),
    ("ShaderNodeNormalMap", NodeKind::NormalMap),
    ("ShaderNodeLightFalloff", NodeKind::LightFalloff),
    ("ShaderNodeBsdfDiffuse", NodeKind::BsdfDiffuse),
    ("ShaderNodeBsdfGlossy", NodeKind::BsdfGlossy),
    ("ShaderNodeBsdfGlass", NodeKind::BsdfGlass),
    ("ShaderNodeBsdfRefraction", NodeKind::BsdfRefraction),
    ("ShaderNodeBsdfTranslucent", NodeKind::BsdfTranslucent),
    ("ShaderNodeBsdfTransparent", NodeKind::BsdfTransparent),
    ("ShaderNodeBsdfAnisotropic", NodeKind::BsdfAnisotropic),
    ("ShaderNodeBsdfVelvet", NodeKind::BsdfVelvet),
    ("ShaderNodeEmission", NodeKind::Emission),
    ("ShaderNodeFresnel", NodeKind::Fresnel),
    ("ShaderNodeGamma", NodeKind::Gamma),
    ("ShaderNodeInvert", NodeKind::Invert),
    ("ShaderNodeTexCoord", NodeKind::TexCoord),
    ("ShaderNodeNewGeometry", NodeKind::NewGeometry),
    ("ShaderNodeSubsurfaceScattering", NodeKind::SubsurfaceScattering),
];

impl NodeKind {
    /// Parse a host node identifier. Never fails: unrecognized identifiers
    /// become [`NodeKind::Unknown`].
    pub fn from_host_id(id: &str) -> Self {
        HOST_IDS
            .iter()
            .find(|(host_id, _)| *host_id == id)
            .map(|(_, kind)| kind.clone())
            .unwrap_or_else(|| NodeKind::Unknown(id.to_string()))
    }

    pub fn host_id(&self) -> &str {
        if let NodeKind::Unknown(id) = self {
            return id;
        }
        HOST_IDS
            .iter()
            .find(|(_, kind)| kind == self)
            .map(|(host_id, _)| *host_id)
            .unwrap_or("")
    }

    /// Nodes that only forward their single input
    pub fn is_reroute(&self) -> bool {
        matches!(self, NodeKind::Reroute)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.host_id())
    }
}

impl Serialize for NodeKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.host_id())
    }
}

impl<'de> Deserialize<'de> for NodeKind {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let id = String::deserialize(deserializer)?;
        Ok(NodeKind::from_host_id(&id))
    }
}

/// Operator of a native arithmetic node
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArithmeticOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Min,
    Max,
    Floor,
    Mod,
    Abs,
    Log,
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Lower,
    Greater,
    Equal,
    Ternary,
    Dot3,
    Dot4,
    Cross3,
    Length3,
    Normalize3,
    SelectX,
    SelectY,
    SelectZ,
    SelectW,
    Average,
    AverageXyz,
}

impl ArithmeticOp {
    pub fn name(&self) -> &'static str {
        match self {
            ArithmeticOp::Add => "add",
            ArithmeticOp::Sub => "sub",
            ArithmeticOp::Mul => "mul",
            ArithmeticOp::Div => "div",
            ArithmeticOp::Pow => "pow",
            ArithmeticOp::Min => "min",
            ArithmeticOp::Max => "max",
            ArithmeticOp::Floor => "floor",
            ArithmeticOp::Mod => "mod",
            ArithmeticOp::Abs => "abs",
            ArithmeticOp::Log => "log",
            ArithmeticOp::Sin => "sin",
            ArithmeticOp::Cos => "cos",
            ArithmeticOp::Tan => "tan",
            ArithmeticOp::Asin => "asin",
            ArithmeticOp::Acos => "acos",
            ArithmeticOp::Atan => "atan",
            ArithmeticOp::Lower => "lower",
            ArithmeticOp::Greater => "greater",
            ArithmeticOp::Equal => "equal",
            ArithmeticOp::Ternary => "ternary",
            ArithmeticOp::Dot3 => "dot3",
            ArithmeticOp::Dot4 => "dot4",
            ArithmeticOp::Cross3 => "cross3",
            ArithmeticOp::Length3 => "length3",
            ArithmeticOp::Normalize3 => "normalize3",
            ArithmeticOp::SelectX => "select_x",
            ArithmeticOp::SelectY => "select_y",
            ArithmeticOp::SelectZ => "select_z",
            ArithmeticOp::SelectW => "select_w",
            ArithmeticOp::Average => "average",
            ArithmeticOp::AverageXyz => "average_xyz",
        }
    }

    /// Lane selector for `index` in `0..4`
    pub fn select(index: usize) -> Self {
        match index {
            0 => ArithmeticOp::SelectX,
            1 => ArithmeticOp::SelectY,
            2 => ArithmeticOp::SelectZ,
            _ => ArithmeticOp::SelectW,
        }
    }
}

/// Geometric quantity read by an input lookup node
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lookup {
    Uv,
    Normal,
    Position,
    Incoming,
}

/// Kind of node the target backend creates
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NativeNodeKind {
    Diffuse,
    Reflection,
    Microfacet,
    MicrofacetRefraction,
    MicrofacetAnisotropicReflection,
    DiffuseRefraction,
    Transparent,
    Emissive,
    Twosided,
    Fresnel,
    Uber,
    Blend,
    BlendValue,
    Add,
    Arithmetic(ArithmeticOp),
    ImageTexture,
    CheckerTexture,
    InputLookup(Lookup),
    NormalMap,
    BumpMap,
    Passthrough,
}

impl NativeNodeKind {
    const NAMED: &'static [(&'static str, NativeNodeKind)] = &[
        ("diffuse", NativeNodeKind::Diffuse),
        ("reflection", NativeNodeKind::Reflection),
        ("microfacet", NativeNodeKind::Microfacet),
        ("microfacet_refraction", NativeNodeKind::MicrofacetRefraction),
        (
            "microfacet_anisotropic_reflection",
            NativeNodeKind::MicrofacetAnisotropicReflection,
        ),
        ("diffuse_refraction", NativeNodeKind::DiffuseRefraction),
        ("transparent", NativeNodeKind::Transparent),
        ("emissive", NativeNodeKind::Emissive),
        ("twosided", NativeNodeKind::Twosided),
        ("fresnel", NativeNodeKind::Fresnel),
        ("uber", NativeNodeKind::Uber),
        ("blend", NativeNodeKind::Blend),
        ("blend_value", NativeNodeKind::BlendValue),
        ("add", NativeNodeKind::Add),
        ("image_texture", NativeNodeKind::ImageTexture),
        ("checker_texture", NativeNodeKind::CheckerTexture),
        ("lookup_uv", NativeNodeKind::InputLookup(Lookup::Uv)),
        ("lookup_normal", NativeNodeKind::InputLookup(Lookup::Normal)),
        ("lookup_position", NativeNodeKind::InputLookup(Lookup::Position)),
        ("lookup_incoming", NativeNodeKind::InputLookup(Lookup::Incoming)),
        ("normal_map", NativeNodeKind::NormalMap),
        ("bump_map", NativeNodeKind::BumpMap),
        ("passthrough", NativeNodeKind::Passthrough),
    ];

    /// Name used in rule files. Arithmetic kinds read `arithmetic.<op>`.
    pub fn rule_name(&self) -> String {
        if let NativeNodeKind::Arithmetic(op) = self {
            return format!("arithmetic.{}", op.name());
        }
        Self::NAMED
            .iter()
            .find(|(_, kind)| kind == self)
            .map(|(name, _)| name.to_string())
            .unwrap_or_default()
    }
}

impl FromStr for NativeNodeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(op) = s.strip_prefix("arithmetic.") {
            let op: ArithmeticOp = serde_json::from_value(serde_json::Value::String(op.into()))
                .map_err(|_| format!("unknown arithmetic operator '{op}'"))?;
            return Ok(NativeNodeKind::Arithmetic(op));
        }
        Self::NAMED
            .iter()
            .find(|(name, _)| *name == s)
            .map(|(_, kind)| *kind)
            .ok_or_else(|| format!("unknown native node kind '{s}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_ids_map_both_ways() {
        for (id, kind) in HOST_IDS {
            assert_eq!(&NodeKind::from_host_id(id), kind);
            assert_eq!(kind.host_id(), *id);
        }
    }

    #[test]
    fn unrecognized_host_id_is_kept_verbatim() {
        let kind = NodeKind::from_host_id("ShaderNodeTexVoronoi");
        assert_eq!(kind, NodeKind::Unknown("ShaderNodeTexVoronoi".into()));
        assert_eq!(kind.to_string(), "ShaderNodeTexVoronoi");
    }

    #[test]
    fn native_kind_rule_names_parse_back() {
        for (_, kind) in NativeNodeKind::NAMED {
            assert_eq!(kind.rule_name().parse::<NativeNodeKind>(), Ok(*kind));
        }
        let pow = NativeNodeKind::Arithmetic(ArithmeticOp::Pow);
        assert_eq!(pow.rule_name(), "arithmetic.pow");
        assert_eq!("arithmetic.pow".parse::<NativeNodeKind>(), Ok(pow));
        assert!("arithmetic.frobnicate".parse::<NativeNodeKind>().is_err());
        assert!("volume".parse::<NativeNodeKind>().is_err());
    }
}
