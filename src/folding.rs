//! # Constant Folding
//!
//! Arithmetic over translation values. When every operand is a constant the
//! result is computed right here and no native node is created; otherwise a
//! native arithmetic node is emitted and wired to the operands. A graph made
//! only of literal math therefore compiles to zero native nodes.

use crate::backend::TargetBackend;
use crate::kind::{ArithmeticOp, NativeNodeKind};
use crate::value::{NativeNodeHandle, Value, Vec4, ZERO};

/// Luminance weights used for RGB to grayscale conversion
const LUMA: [f32; 3] = [0.2126, 0.7152, 0.0722];

/// Number of operands an arithmetic operator takes
pub fn arity(op: ArithmeticOp) -> usize {
    use ArithmeticOp::*;
    match op {
        Floor | Abs | Log | Sin | Cos | Tan | Asin | Acos | Atan | Length3 | Normalize3
        | SelectX | SelectY | SelectZ | SelectW | AverageXyz => 1,
        Ternary => 3,
        _ => 2,
    }
}

fn lanes(a: Vec4, f: impl Fn(f32) -> f32) -> Vec4 {
    [f(a[0]), f(a[1]), f(a[2]), f(a[3])]
}

fn lanes2(a: Vec4, b: Vec4, f: impl Fn(f32, f32) -> f32) -> Vec4 {
    [f(a[0], b[0]), f(a[1], b[1]), f(a[2], b[2]), f(a[3], b[3])]
}

fn length3(a: Vec4) -> f32 {
    (a[0] * a[0] + a[1] * a[1] + a[2] * a[2]).sqrt()
}

fn flag(b: bool) -> f32 {
    if b {
        1.0
    } else {
        0.0
    }
}

/// Evaluate a one-operand operator on a constant
pub fn fold_unary(op: ArithmeticOp, a: Vec4) -> Vec4 {
    use ArithmeticOp::*;
    match op {
        Floor => lanes(a, f32::floor),
        Abs => lanes(a, f32::abs),
        Log => lanes(a, |x| if x > 0.0 { x.ln() } else { 0.0 }),
        Sin => lanes(a, f32::sin),
        Cos => lanes(a, f32::cos),
        Tan => lanes(a, f32::tan),
        Asin => lanes(a, |x| x.clamp(-1.0, 1.0).asin()),
        Acos => lanes(a, |x| x.clamp(-1.0, 1.0).acos()),
        Atan => lanes(a, f32::atan),
        Length3 => [length3(a); 4],
        // Collapses to the lane sum over the four-lane length, broadcast.
        // Native graphs depend on this result, not on a true normalize.
        Normalize3 => {
            let length = a.iter().map(|x| x * x).sum::<f32>().sqrt();
            if length > 0.0 {
                [a.iter().sum::<f32>() / length; 4]
            } else {
                ZERO
            }
        }
        SelectX => [a[0]; 4],
        SelectY => [a[1]; 4],
        SelectZ => [a[2]; 4],
        SelectW => [a[3]; 4],
        AverageXyz => [(a[0] + a[1] + a[2]) / 3.0; 4],
        _ => fold_binary(op, a, ZERO),
    }
}

/// Evaluate a two-operand operator on constants
pub fn fold_binary(op: ArithmeticOp, a: Vec4, b: Vec4) -> Vec4 {
    use ArithmeticOp::*;
    match op {
        Add => lanes2(a, b, |x, y| x + y),
        Sub => lanes2(a, b, |x, y| x - y),
        Mul => lanes2(a, b, |x, y| x * y),
        Div => lanes2(a, b, |x, y| if y == 0.0 { 0.0 } else { x / y }),
        Pow => lanes2(a, b, f32::powf),
        Min => lanes2(a, b, f32::min),
        Max => lanes2(a, b, f32::max),
        // truncated modulo, sign follows the dividend
        Mod => lanes2(a, b, |x, y| if y == 0.0 { 0.0 } else { x % y }),
        Lower => lanes2(a, b, |x, y| flag(x < y)),
        Greater => lanes2(a, b, |x, y| flag(x > y)),
        Equal => lanes2(a, b, |x, y| flag(x == y)),
        Dot3 => [a[0] * b[0] + a[1] * b[1] + a[2] * b[2]; 4],
        Dot4 => [a[0] * b[0] + a[1] * b[1] + a[2] * b[2] + a[3] * b[3]; 4],
        Cross3 => [
            a[1] * b[2] - a[2] * b[1],
            a[2] * b[0] - a[0] * b[2],
            a[0] * b[1] - a[1] * b[0],
            1.0,
        ],
        Average => lanes2(a, b, |x, y| (x + y) * 0.5),
        Ternary => fold_ternary(a, b, ZERO),
        _ => fold_unary(op, a),
    }
}

/// Lane-wise select: `cond != 0 ? a : b`
pub fn fold_ternary(cond: Vec4, a: Vec4, b: Vec4) -> Vec4 {
    [0, 1, 2, 3].map(|i| if cond[i] != 0.0 { a[i] } else { b[i] })
}

/// Wire `value` into `param` of a native node. `Unset` leaves the backend's
/// own default in place.
pub fn set_param(backend: &mut dyn TargetBackend, node: NativeNodeHandle, param: &str, value: Value) {
    match value {
        Value::Constant(c) => backend.set_node_param_constant(node, param, c),
        Value::Node(input) => backend.set_node_param_node(node, param, input),
        Value::Image(image) => backend.set_node_param_image(node, param, image),
        Value::Unset => {}
    }
}

/// Arithmetic front end over a target backend
///
/// Every method takes translation values and returns a value: a folded
/// constant when it can, otherwise a reference to a freshly created node.
pub struct Folder<'b> {
    backend: &'b mut dyn TargetBackend,
}

impl<'b> Folder<'b> {
    pub fn new(backend: &'b mut dyn TargetBackend) -> Self {
        Self { backend }
    }

    fn emit(&mut self, op: ArithmeticOp, operands: &[Value]) -> Value {
        let node = self.backend.create_native_node(NativeNodeKind::Arithmetic(op));
        for (index, operand) in operands.iter().enumerate() {
            let param = format!("color{index}");
            let operand = if operand.is_unset() {
                Value::Constant(ZERO)
            } else {
                *operand
            };
            set_param(self.backend, node, &param, operand);
        }
        Value::Node(node)
    }

    pub fn unary(&mut self, op: ArithmeticOp, a: Value) -> Value {
        match a {
            Value::Constant(a) => Value::Constant(fold_unary(op, a)),
            _ => self.emit(op, &[a]),
        }
    }

    pub fn binary(&mut self, op: ArithmeticOp, a: Value, b: Value) -> Value {
        match (a, b) {
            (Value::Constant(a), Value::Constant(b)) => Value::Constant(fold_binary(op, a, b)),
            _ => self.emit(op, &[a, b]),
        }
    }

    pub fn ternary(&mut self, cond: Value, a: Value, b: Value) -> Value {
        match (cond, a, b) {
            (Value::Constant(c), Value::Constant(a), Value::Constant(b)) => {
                Value::Constant(fold_ternary(c, a, b))
            }
            _ => self.emit(ArithmeticOp::Ternary, &[cond, a, b]),
        }
    }

    /// Apply any operator with the operands it needs
    pub fn apply(&mut self, op: ArithmeticOp, a: Value, b: Value) -> Value {
        match arity(op) {
            1 => self.unary(op, a),
            _ => self.binary(op, a, b),
        }
    }

    pub fn add(&mut self, a: Value, b: Value) -> Value {
        self.binary(ArithmeticOp::Add, a, b)
    }

    pub fn sub(&mut self, a: Value, b: Value) -> Value {
        self.binary(ArithmeticOp::Sub, a, b)
    }

    pub fn mul(&mut self, a: Value, b: Value) -> Value {
        self.binary(ArithmeticOp::Mul, a, b)
    }

    pub fn div(&mut self, a: Value, b: Value) -> Value {
        self.binary(ArithmeticOp::Div, a, b)
    }

    pub fn min(&mut self, a: Value, b: Value) -> Value {
        self.binary(ArithmeticOp::Min, a, b)
    }

    pub fn max(&mut self, a: Value, b: Value) -> Value {
        self.binary(ArithmeticOp::Max, a, b)
    }

    pub fn floor(&mut self, a: Value) -> Value {
        self.unary(ArithmeticOp::Floor, a)
    }

    pub fn neg(&mut self, a: Value) -> Value {
        self.sub(Value::scalar(0.0), a)
    }

    /// `a - floor(a)`
    pub fn fract(&mut self, a: Value) -> Value {
        let floor = self.floor(a);
        self.sub(a, floor)
    }

    pub fn ceil(&mut self, a: Value) -> Value {
        let floor = self.floor(a);
        let is_whole = self.binary(ArithmeticOp::Equal, a, floor);
        let next = self.add(floor, Value::scalar(1.0));
        self.ternary(is_whole, a, next)
    }

    pub fn round(&mut self, a: Value) -> Value {
        let floor = self.floor(a);
        let fract = self.fract(a);
        let rounds_down = self.binary(ArithmeticOp::Lower, fract, Value::scalar(0.5));
        let next = self.add(floor, Value::scalar(1.0));
        self.ternary(rounds_down, floor, next)
    }

    /// Clamp into `[0, 1]`
    pub fn clamp(&mut self, a: Value) -> Value {
        let upper = self.min(a, Value::scalar(1.0));
        self.max(upper, Value::scalar(0.0))
    }

    pub fn select(&mut self, a: Value, lane: usize) -> Value {
        self.unary(ArithmeticOp::select(lane), a)
    }

    /// Assemble `(x, y, z, 1)` from the first lanes of three values
    pub fn combine(&mut self, x: Value, y: Value, z: Value) -> Value {
        let x = self.mul(x, Value::vec4(1.0, 0.0, 0.0, 0.0));
        let y = self.mul(y, Value::vec4(0.0, 1.0, 0.0, 0.0));
        let z = self.mul(z, Value::vec4(0.0, 0.0, 1.0, 0.0));
        let xy = self.add(x, y);
        let xyz = self.add(xy, z);
        self.add(xyz, Value::vec4(0.0, 0.0, 0.0, 1.0))
    }

    /// Luminance in rgb, alpha kept
    pub fn to_bw(&mut self, color: Value) -> Value {
        let mut result = Value::Unset;
        for (lane, coef) in LUMA.iter().enumerate() {
            let channel = self.select(color, lane);
            let weighted = self.mul(channel, Value::vec4(*coef, *coef, *coef, 0.0));
            result = if result.is_unset() {
                weighted
            } else {
                self.add(result, weighted)
            };
        }
        let alpha = self.select(color, 3);
        let alpha = self.mul(alpha, Value::vec4(0.0, 0.0, 0.0, 1.0));
        self.add(result, alpha)
    }

    /// Value blend `a * (1 - weight) + b * weight`
    ///
    /// A constant weight of exactly 0 or 1 returns the matching branch without
    /// creating a node; all-constant operands fold.
    pub fn blend(&mut self, weight: Value, a: Value, b: Value) -> Value {
        if weight.is_splat(0.0) {
            return a;
        }
        if weight.is_splat(1.0) {
            return b;
        }
        if let (Value::Constant(w), Value::Constant(a), Value::Constant(b)) = (weight, a, b) {
            return Value::Constant([0, 1, 2, 3].map(|i| a[i] + (b[i] - a[i]) * w[i]));
        }

        let node = self.backend.create_native_node(NativeNodeKind::BlendValue);
        set_param(self.backend, node, "weight", weight);
        set_param(self.backend, node, "color0", a);
        set_param(self.backend, node, "color1", b);
        Value::Node(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{ParamValue, RecordingBackend};
    use proptest::prelude::*;

    #[test]
    fn literal_chain_folds_without_nodes() {
        let mut backend = RecordingBackend::new();
        let mut folder = Folder::new(&mut backend);

        let product = folder.mul(Value::scalar(2.0), Value::scalar(3.0));
        let sum = folder.add(product, Value::scalar(4.0));

        assert_eq!(sum, Value::scalar(10.0));
        assert_eq!(backend.node_count(), 0);
    }

    #[test]
    fn division_by_zero_is_zero() {
        assert_eq!(
            fold_binary(ArithmeticOp::Div, [1.0, -2.0, 3.0, 4.0], [0.0, 2.0, 0.0, 1.0]),
            [0.0, -1.0, 0.0, 4.0]
        );
        assert_eq!(fold_binary(ArithmeticOp::Mod, [5.0; 4], [0.0; 4]), [0.0; 4]);
    }

    #[test]
    fn modulo_follows_dividend_sign() {
        assert_eq!(fold_binary(ArithmeticOp::Mod, [-1.0; 4], [3.0; 4]), [-1.0; 4]);
        assert_eq!(fold_binary(ArithmeticOp::Mod, [7.5; 4], [-2.0; 4]), [1.5; 4]);
        assert_eq!(fold_binary(ArithmeticOp::Mod, [7.5; 4], [2.0; 4]), [1.5; 4]);
    }

    #[test]
    fn fract_of_negative_is_positive() {
        let mut backend = RecordingBackend::new();
        let mut folder = Folder::new(&mut backend);
        assert_eq!(folder.fract(Value::scalar(-1.25)), Value::scalar(0.75));
        assert_eq!(folder.fract(Value::scalar(2.5)), Value::scalar(0.5));
        assert_eq!(backend.node_count(), 0);
    }

    #[test]
    fn inverse_trig_clamps_its_domain() {
        let asin = fold_unary(ArithmeticOp::Asin, [2.0; 4]);
        assert!((asin[0] - std::f32::consts::FRAC_PI_2).abs() < 1e-6);
        let acos = fold_unary(ArithmeticOp::Acos, [-5.0; 4]);
        assert!((acos[0] - std::f32::consts::PI).abs() < 1e-6);
    }

    #[test]
    fn vector_products() {
        let x = [1.0, 0.0, 0.0, 1.0];
        let y = [0.0, 1.0, 0.0, 1.0];
        assert_eq!(fold_binary(ArithmeticOp::Cross3, x, y), [0.0, 0.0, 1.0, 1.0]);
        assert_eq!(fold_binary(ArithmeticOp::Dot3, x, y), [0.0; 4]);
        assert_eq!(fold_binary(ArithmeticOp::Dot4, x, y), [1.0; 4]);
        assert_eq!(fold_unary(ArithmeticOp::Length3, [3.0, 4.0, 0.0, 9.0]), [5.0; 4]);
    }

    #[test]
    fn normalize3_collapses_to_broadcast() {
        assert_eq!(fold_unary(ArithmeticOp::Normalize3, [3.0, 4.0, 0.0, 0.0]), [1.4; 4]);
        assert_eq!(fold_unary(ArithmeticOp::Normalize3, [0.0, 0.0, 2.0, 0.0]), [1.0; 4]);
        assert_eq!(fold_unary(ArithmeticOp::Normalize3, ZERO), ZERO);
    }

    #[test]
    fn select_and_averages_broadcast() {
        let v = [1.0, 2.0, 6.0, 8.0];
        assert_eq!(fold_unary(ArithmeticOp::SelectZ, v), [6.0; 4]);
        assert_eq!(fold_unary(ArithmeticOp::AverageXyz, v), [3.0; 4]);
        assert_eq!(fold_binary(ArithmeticOp::Average, v, ZERO), [0.5, 1.0, 3.0, 4.0]);
    }

    #[test]
    fn combine_assembles_lanes() {
        let mut backend = RecordingBackend::new();
        let mut folder = Folder::new(&mut backend);
        let v = folder.combine(Value::scalar(0.1), Value::scalar(0.2), Value::scalar(0.3));
        assert_eq!(v, Value::vec4(0.1, 0.2, 0.3, 1.0));
        assert_eq!(backend.node_count(), 0);
    }

    #[test]
    fn ceil_and_round_fold() {
        let mut backend = RecordingBackend::new();
        let mut folder = Folder::new(&mut backend);
        assert_eq!(folder.ceil(Value::scalar(1.2)), Value::scalar(2.0));
        assert_eq!(folder.ceil(Value::scalar(3.0)), Value::scalar(3.0));
        assert_eq!(folder.round(Value::scalar(1.5)), Value::scalar(2.0));
        assert_eq!(folder.round(Value::scalar(1.49)), Value::scalar(1.0));
        assert_eq!(backend.node_count(), 0);
    }

    #[test]
    fn node_operand_emits_arithmetic_node() {
        let mut backend = RecordingBackend::new();
        let texture = backend.create_native_node(NativeNodeKind::ImageTexture);
        let mut folder = Folder::new(&mut backend);

        let result = folder.mul(Value::Node(texture), Value::scalar(0.5));

        let handle = result.as_node().unwrap();
        assert_eq!(
            backend.node(handle).unwrap().kind,
            NativeNodeKind::Arithmetic(ArithmeticOp::Mul)
        );
        assert_eq!(backend.param(handle, "color0"), Some(&ParamValue::Node(texture)));
        assert_eq!(backend.param(handle, "color1"), Some(&ParamValue::Constant([0.5; 4])));
    }

    #[test]
    fn unset_operand_forces_node_with_zero() {
        let mut backend = RecordingBackend::new();
        let mut folder = Folder::new(&mut backend);

        let result = folder.add(Value::Unset, Value::scalar(1.0));

        let handle = result.as_node().unwrap();
        assert_eq!(backend.param(handle, "color0"), Some(&ParamValue::Constant(ZERO)));
    }

    #[test]
    fn clamp_applies_on_both_paths() {
        let mut backend = RecordingBackend::new();
        let texture = backend.create_native_node(NativeNodeKind::ImageTexture);
        let mut folder = Folder::new(&mut backend);

        assert_eq!(
            folder.clamp(Value::vec4(-1.0, 0.5, 2.0, 1.0)),
            Value::vec4(0.0, 0.5, 1.0, 1.0)
        );

        let clamped = folder.clamp(Value::Node(texture)).as_node().unwrap();
        assert_eq!(
            backend.node(clamped).unwrap().kind,
            NativeNodeKind::Arithmetic(ArithmeticOp::Max)
        );
        assert_eq!(backend.node_count(), 3);
    }

    #[test]
    fn blend_shortcuts_on_exact_weights() {
        let mut backend = RecordingBackend::new();
        let a = backend.create_native_node(NativeNodeKind::ImageTexture);
        let b = backend.create_native_node(NativeNodeKind::ImageTexture);
        let mut folder = Folder::new(&mut backend);

        assert_eq!(folder.blend(Value::scalar(0.0), Value::Node(a), Value::Node(b)), Value::Node(a));
        assert_eq!(folder.blend(Value::scalar(1.0), Value::Node(a), Value::Node(b)), Value::Node(b));
        assert_eq!(
            folder.blend(Value::scalar(0.25), Value::scalar(0.0), Value::scalar(1.0)),
            Value::scalar(0.25)
        );
        assert_eq!(backend.node_count(), 2);
    }

    fn ops() -> impl Strategy<Value = ArithmeticOp> {
        prop::sample::select(vec![
            ArithmeticOp::Add,
            ArithmeticOp::Sub,
            ArithmeticOp::Mul,
            ArithmeticOp::Div,
            ArithmeticOp::Min,
            ArithmeticOp::Max,
            ArithmeticOp::Mod,
        ])
    }

    fn direct(op: ArithmeticOp, x: f32, y: f32) -> f32 {
        match op {
            ArithmeticOp::Add => x + y,
            ArithmeticOp::Sub => x - y,
            ArithmeticOp::Mul => x * y,
            ArithmeticOp::Div if y == 0.0 => 0.0,
            ArithmeticOp::Div => x / y,
            ArithmeticOp::Min => x.min(y),
            ArithmeticOp::Max => x.max(y),
            ArithmeticOp::Mod if y == 0.0 => 0.0,
            ArithmeticOp::Mod => x % y,
            _ => unreachable!(),
        }
    }

    proptest! {
        #[test]
        fn folded_chains_match_direct_evaluation(
            a in -100.0f32..100.0,
            b in -100.0f32..100.0,
            c in -100.0f32..100.0,
            op1 in ops(),
            op2 in ops(),
        ) {
            let mut backend = RecordingBackend::new();
            let mut folder = Folder::new(&mut backend);

            let inner = folder.binary(op1, Value::scalar(a), Value::scalar(b));
            let outer = folder.binary(op2, inner, Value::scalar(c));

            let expected = direct(op2, direct(op1, a, b), c);
            prop_assert_eq!(outer, Value::scalar(expected));
            prop_assert_eq!(backend.node_count(), 0);
        }
    }
}
