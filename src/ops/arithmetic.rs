//! Arithmetic and trigonometric operators
//!
//! Integer division by zero yields `i32::MAX` and integer modulo by zero
//! yields 0; float operations follow IEEE semantics.
//!
//! Author: Moroya Sakamoto

use super::{Binding, F, I, V};
use crate::nodes::{NodeCategory, NodeRegistry, NodeType};
use crate::types::Value;
use glam::Vec3;

/// Overloads of `Negate`
pub static NEGATE: &[Binding] = &[
    Binding::pure(&[F], F, negate),
    Binding::pure(&[I], I, negate),
    Binding::pure(&[V], V, negate),
];
/// Overloads of `Abs`
pub static ABS: &[Binding] = &[
    Binding::pure(&[F], F, abs),
    Binding::pure(&[I], I, abs),
    Binding::pure(&[V], V, abs),
];
/// Overloads of `Floor`
pub static FLOOR: &[Binding] = &[Binding::pure(&[F], F, floor), Binding::pure(&[V], V, floor)];
/// Overloads of `Ceil`
pub static CEIL: &[Binding] = &[Binding::pure(&[F], F, ceil), Binding::pure(&[V], V, ceil)];
/// Overloads of `Sqrt`
pub static SQRT: &[Binding] = &[Binding::pure(&[F], F, sqrt)];
/// Overloads of `Log`
pub static LOG: &[Binding] = &[Binding::pure(&[F], F, ln)];

/// Overloads of `Add`
pub static ADD: &[Binding] = &[
    Binding::pure(&[F, F], F, add),
    Binding::pure(&[I, I], I, add),
    Binding::pure(&[V, V], V, add),
];
/// Overloads of `Subtract`
pub static SUB: &[Binding] = &[
    Binding::pure(&[F, F], F, sub),
    Binding::pure(&[I, I], I, sub),
    Binding::pure(&[V, V], V, sub),
];
/// Overloads of `Multiply`
pub static MUL: &[Binding] = &[
    Binding::pure(&[F, F], F, mul),
    Binding::pure(&[I, I], I, mul),
    Binding::pure(&[F, V], V, mul),
    Binding::pure(&[V, F], V, mul),
    Binding::pure(&[V, V], V, mul),
];
/// Overloads of `Divide`
pub static DIV: &[Binding] = &[
    Binding::pure(&[F, F], F, div),
    Binding::pure(&[I, I], I, div),
    Binding::pure(&[V, F], V, div),
    Binding::pure(&[V, V], V, div),
];
/// Overloads of `Modulo`
pub static MOD: &[Binding] = &[
    Binding::pure(&[F, F], F, modulo),
    Binding::pure(&[I, I], I, modulo),
    Binding::pure(&[V, F], V, modulo),
    Binding::pure(&[V, V], V, modulo),
];
/// Overloads of `Power`
pub static POW: &[Binding] = &[
    Binding::pure(&[F, F], F, pow),
    Binding::pure(&[F, I], F, pow),
    Binding::pure(&[I, I], I, pow),
    Binding::pure(&[V, F], V, pow),
];

/// Overloads of `Blend`
pub static BLEND: &[Binding] = &[
    Binding::pure(&[F, F, F], F, blend),
    Binding::pure(&[V, V, F], V, blend),
];
/// Overloads of `Clamp`
pub static CLAMP: &[Binding] = &[
    Binding::pure(&[F, F, F], F, clamp),
    Binding::pure(&[I, I, I], I, clamp),
    Binding::pure(&[V, F, F], V, clamp),
];

/// Overloads of `Cos`
pub static COS: &[Binding] = &[Binding::pure(&[F], F, cos)];
/// Overloads of `ACos`
pub static ACOS: &[Binding] = &[Binding::pure(&[F], F, acos)];
/// Overloads of `Sin`
pub static SIN: &[Binding] = &[Binding::pure(&[F], F, sin)];
/// Overloads of `ASin`
pub static ASIN: &[Binding] = &[Binding::pure(&[F], F, asin)];
/// Overloads of `Tan`
pub static TAN: &[Binding] = &[Binding::pure(&[F], F, tan)];
/// Overloads of `ATan`
pub static ATAN: &[Binding] = &[Binding::pure(&[F], F, atan)];
/// Overloads of `ATan2`
pub static ATAN2: &[Binding] = &[Binding::pure(&[F, F], F, atan2)];

macro_rules! float_fn {
    ($($name:ident => $f:path),* $(,)?) => {
        $(
            fn $name(a: &[Value]) -> Value {
                Value::Float($f(a[0].as_f32()))
            }
        )*
    };
}

float_fn! {
    sqrt => f32::sqrt,
    ln => f32::ln,
    cos => f32::cos,
    acos => f32::acos,
    sin => f32::sin,
    asin => f32::asin,
    tan => f32::tan,
    atan => f32::atan,
}

fn map_vec(v: Vec3, f: impl Fn(f32) -> f32) -> Vec3 {
    Vec3::new(f(v.x), f(v.y), f(v.z))
}

fn negate(a: &[Value]) -> Value {
    match a[0] {
        Value::Int(x) => Value::Int(x.wrapping_neg()),
        Value::Vec3(v) => Value::Vec3(-v),
        other => Value::Float(-other.as_f32()),
    }
}

fn abs(a: &[Value]) -> Value {
    match a[0] {
        Value::Int(x) => Value::Int(x.wrapping_abs()),
        Value::Vec3(v) => Value::Vec3(v.abs()),
        other => Value::Float(other.as_f32().abs()),
    }
}

fn floor(a: &[Value]) -> Value {
    match a[0] {
        Value::Vec3(v) => Value::Vec3(v.floor()),
        other => Value::Float(other.as_f32().floor()),
    }
}

fn ceil(a: &[Value]) -> Value {
    match a[0] {
        Value::Vec3(v) => Value::Vec3(v.ceil()),
        other => Value::Float(other.as_f32().ceil()),
    }
}

fn add(a: &[Value]) -> Value {
    match (a[0], a[1]) {
        (Value::Int(x), Value::Int(y)) => Value::Int(x.wrapping_add(y)),
        (Value::Vec3(x), Value::Vec3(y)) => Value::Vec3(x + y),
        (x, y) => Value::Float(x.as_f32() + y.as_f32()),
    }
}

fn sub(a: &[Value]) -> Value {
    match (a[0], a[1]) {
        (Value::Int(x), Value::Int(y)) => Value::Int(x.wrapping_sub(y)),
        (Value::Vec3(x), Value::Vec3(y)) => Value::Vec3(x - y),
        (x, y) => Value::Float(x.as_f32() - y.as_f32()),
    }
}

fn mul(a: &[Value]) -> Value {
    match (a[0], a[1]) {
        (Value::Int(x), Value::Int(y)) => Value::Int(x.wrapping_mul(y)),
        (Value::Vec3(x), Value::Vec3(y)) => Value::Vec3(x * y),
        (Value::Vec3(x), y) => Value::Vec3(x * y.as_f32()),
        (x, Value::Vec3(y)) => Value::Vec3(x.as_f32() * y),
        (x, y) => Value::Float(x.as_f32() * y.as_f32()),
    }
}

fn div(a: &[Value]) -> Value {
    match (a[0], a[1]) {
        (Value::Int(x), Value::Int(y)) => Value::Int(if y != 0 {
            x.wrapping_div(y)
        } else {
            i32::MAX
        }),
        (Value::Vec3(x), Value::Vec3(y)) => Value::Vec3(x / y),
        (Value::Vec3(x), y) => Value::Vec3(x / y.as_f32()),
        (x, y) => Value::Float(x.as_f32() / y.as_f32()),
    }
}

fn modulo(a: &[Value]) -> Value {
    match (a[0], a[1]) {
        (Value::Int(x), Value::Int(y)) => Value::Int(if y != 0 { x.wrapping_rem(y) } else { 0 }),
        (Value::Vec3(x), Value::Vec3(y)) => Value::Vec3(Vec3::new(x.x % y.x, x.y % y.y, x.z % y.z)),
        (Value::Vec3(x), y) => {
            let d = y.as_f32();
            Value::Vec3(map_vec(x, |c| c % d))
        }
        (x, y) => Value::Float(x.as_f32() % y.as_f32()),
    }
}

fn pow(a: &[Value]) -> Value {
    match (a[0], a[1]) {
        (Value::Int(base), Value::Int(exp)) => {
            if exp < 0 {
                Value::Int(if base == 1 { 1 } else { 0 })
            } else {
                Value::Int(base.wrapping_pow(exp as u32))
            }
        }
        (Value::Float(base), Value::Int(exp)) => Value::Float(base.powi(exp)),
        (Value::Vec3(v), e) => {
            let e = e.as_f32();
            Value::Vec3(map_vec(v, |c| c.powf(e)))
        }
        (x, y) => Value::Float(x.as_f32().powf(y.as_f32())),
    }
}

fn atan2(a: &[Value]) -> Value {
    Value::Float(a[0].as_f32().atan2(a[1].as_f32()))
}

fn blend(a: &[Value]) -> Value {
    let t = a[2].as_f32();
    match (a[0], a[1]) {
        (Value::Vec3(x), Value::Vec3(y)) => Value::Vec3(x + (y - x) * t),
        (x, y) => {
            let (x, y) = (x.as_f32(), y.as_f32());
            Value::Float(x + (y - x) * t)
        }
    }
}

fn clamp(a: &[Value]) -> Value {
    match (a[0], a[1], a[2]) {
        (Value::Int(v), Value::Int(lo), Value::Int(hi)) => Value::Int(v.max(lo).min(hi)),
        (Value::Vec3(v), lo, hi) => {
            let (lo, hi) = (lo.as_f32(), hi.as_f32());
            Value::Vec3(map_vec(v, |c| c.max(lo).min(hi)))
        }
        (v, lo, hi) => Value::Float(v.as_f32().max(lo.as_f32()).min(hi.as_f32())),
    }
}

pub(crate) fn register(reg: &mut NodeRegistry) {
    use NodeCategory::{Arithmetic, Function, Trigonometry};

    let unary = |name: &'static str, cat, input: &'static str, b: &'static [Binding], desc| {
        NodeType::operator(name, cat, b).input_required(input).describe(desc)
    };

    reg.register(unary("Negate", Arithmetic, "Value", NEGATE, "Flips the sign of the input."));
    reg.register(unary("Abs", Arithmetic, "Value", ABS, "Returns the absolute value of the input."));
    reg.register(unary("Floor", Arithmetic, "Value", FLOOR, "Rounds towards negative infinity."));
    reg.register(unary("Ceil", Arithmetic, "Value", CEIL, "Rounds towards positive infinity."));
    reg.register(unary("Sqrt", Arithmetic, "Value", SQRT, "Returns the positive square root of the input."));
    reg.register(unary("Log", Arithmetic, "Value", LOG, "Returns the natural logarithm of the input."));

    reg.register(
        NodeType::operator("Add", Arithmetic, ADD)
            .input("Left Value", 0.0f32)
            .input("Right Value", 0.0f32)
            .describe("Returns the sum of the two inputs."),
    );
    reg.register(
        NodeType::operator("Subtract", Arithmetic, SUB)
            .input("Left Value", 1.0f32)
            .input("Right Value", 0.0f32)
            .describe("Returns the difference between the two inputs."),
    );
    reg.register(
        NodeType::operator("Multiply", Arithmetic, MUL)
            .input("Left Value", 1.0f32)
            .input("Right Value", 1.0f32)
            .describe("Returns the product of the two inputs."),
    );
    reg.register(
        NodeType::operator("Divide", Arithmetic, DIV)
            .input("Dividend", 1.0f32)
            .input("Divisor", 1.0f32)
            .describe("Returns the quotient of the two inputs."),
    );
    reg.register(
        NodeType::operator("Modulo", Arithmetic, MOD)
            .input("Dividend", 0i32)
            .input("Divisor", 1i32)
            .describe("Returns the remainder of the quotient of the two inputs."),
    );
    reg.register(
        NodeType::operator("Power", Arithmetic, POW)
            .input("Base", 1.0f32)
            .input("Exponent", 1.0f32)
            .describe("Raises 'Base' to the power 'Exponent'."),
    );

    reg.register(
        NodeType::operator("Blend", Function, BLEND)
            .input_required("Value At 0")
            .input_required("Value At 1")
            .input("Blend Amount", 0.0f32)
            .describe("Linear combination of the first two inputs."),
    );
    reg.register(
        NodeType::operator("Clamp", Function, CLAMP)
            .input_required("Value")
            .input("Min", 0.0f32)
            .input("Max", 1.0f32)
            .describe("Forces the input into the range [Min, Max]."),
    );

    reg.register(unary("Cos", Trigonometry, "Radians", COS, "Cosine of an angle in radians."));
    reg.register(unary("ACos", Trigonometry, "Value", ACOS, "Inverse cosine, in [0, pi]."));
    reg.register(unary("Sin", Trigonometry, "Radians", SIN, "Sine of an angle in radians."));
    reg.register(unary("ASin", Trigonometry, "Value", ASIN, "Inverse sine, in [-pi/2, pi/2]."));
    reg.register(unary("Tan", Trigonometry, "Radians", TAN, "Tangent of an angle in radians."));
    reg.register(unary("ATan", Trigonometry, "Value", ATAN, "Inverse tangent, in [-pi/2, pi/2]."));
    reg.register(
        NodeType::operator("ATan2", Trigonometry, ATAN2)
            .input_required("Dividend")
            .input_required("Divisor")
            .describe("Quadrant-aware inverse tangent of the quotient, in [-pi, pi]."),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_division_by_zero() {
        assert_eq!(div(&[Value::Int(7), Value::Int(0)]), Value::Int(i32::MAX));
        assert_eq!(modulo(&[Value::Int(7), Value::Int(0)]), Value::Int(0));
        assert_eq!(div(&[Value::Int(7), Value::Int(2)]), Value::Int(3));
    }

    #[test]
    fn test_int_pow() {
        assert_eq!(pow(&[Value::Int(2), Value::Int(10)]), Value::Int(1024));
        assert_eq!(pow(&[Value::Int(2), Value::Int(-1)]), Value::Int(0));
        assert_eq!(pow(&[Value::Int(1), Value::Int(-3)]), Value::Int(1));
    }

    #[test]
    fn test_blend_and_clamp() {
        let v = blend(&[Value::Float(2.0), Value::Float(4.0), Value::Float(0.25)]);
        assert!((v.as_f32() - 2.5).abs() < 0.0001);

        let c = clamp(&[
            Value::Vec3(Vec3::new(-1.0, 0.5, 3.0)),
            Value::Float(0.0),
            Value::Float(1.0),
        ]);
        assert_eq!(c, Value::Vec3(Vec3::new(0.0, 0.5, 1.0)));
    }

    #[test]
    fn test_vector_mul_either_side() {
        let v = Value::Vec3(Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(mul(&[Value::Float(2.0), v]), mul(&[v, Value::Float(2.0)]));
    }
}
