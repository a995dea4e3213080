//! Comparison, boolean logic and scalar conversion operators
//!
//! Comparisons have a second overload table used when the node's
//! `useTolerance` property is set. The tolerance is `10^-toleranceExp`,
//! scaled by `1 + |rhs|`.
//!
//! Author: Moroya Sakamoto

use super::{Binding, B, F, I, Q, V};
use crate::nodes::{NodeCategory, NodeRegistry, NodeType};
use crate::types::Value;
use glam::Vec3;

/// Overloads of `Less`
pub static LESS: &[Binding] = &[Binding::pure(&[F, F], B, less), Binding::pure(&[I, I], B, less)];
/// Tolerant overloads of `Less`
pub static LESS_TOL: &[Binding] = &[Binding::tolerant(&[F, F], B, less_tol)];
/// Overloads of `LessOrEqual`
pub static LESS_EQ: &[Binding] = &[
    Binding::pure(&[F, F], B, less_eq),
    Binding::pure(&[I, I], B, less_eq),
];
/// Tolerant overloads of `LessOrEqual`
pub static LESS_EQ_TOL: &[Binding] = &[Binding::tolerant(&[F, F], B, less_eq_tol)];
/// Overloads of `Greater`
pub static GREATER: &[Binding] = &[
    Binding::pure(&[F, F], B, greater),
    Binding::pure(&[I, I], B, greater),
];
/// Tolerant overloads of `Greater`
pub static GREATER_TOL: &[Binding] = &[Binding::tolerant(&[F, F], B, greater_tol)];
/// Overloads of `GreaterOrEqual`
pub static GREATER_EQ: &[Binding] = &[
    Binding::pure(&[F, F], B, greater_eq),
    Binding::pure(&[I, I], B, greater_eq),
];
/// Tolerant overloads of `GreaterOrEqual`
pub static GREATER_EQ_TOL: &[Binding] = &[Binding::tolerant(&[F, F], B, greater_eq_tol)];
/// Overloads of `Equal`
pub static EQUAL: &[Binding] = &[
    Binding::pure(&[F, F], B, equal),
    Binding::pure(&[I, I], B, equal),
    Binding::pure(&[B, B], B, equal),
    Binding::pure(&[V, V], B, equal),
    Binding::pure(&[Q, Q], B, equal),
];
/// Tolerant overloads of `Equal`
pub static EQUAL_TOL: &[Binding] = &[
    Binding::tolerant(&[F, F], B, equal_tol),
    Binding::tolerant(&[V, V], B, equal_tol),
    Binding::tolerant(&[Q, Q], B, equal_tol),
];
/// Overloads of `NotEqual`
pub static NOT_EQUAL: &[Binding] = &[
    Binding::pure(&[F, F], B, not_equal),
    Binding::pure(&[I, I], B, not_equal),
    Binding::pure(&[B, B], B, not_equal),
    Binding::pure(&[V, V], B, not_equal),
];
/// Tolerant overloads of `NotEqual`
pub static NOT_EQUAL_TOL: &[Binding] = &[
    Binding::tolerant(&[F, F], B, not_equal_tol),
    Binding::tolerant(&[V, V], B, not_equal_tol),
];

/// Overloads of `LogicalNot`
pub static NOT: &[Binding] = &[Binding::pure(&[B], B, not)];
/// Overloads of `LogicalAnd`
pub static AND: &[Binding] = &[Binding::pure(&[B, B], B, and)];
/// Overloads of `LogicalOr`
pub static OR: &[Binding] = &[Binding::pure(&[B, B], B, or)];
/// Overloads of `LogicalXor`
pub static XOR: &[Binding] = &[Binding::pure(&[B, B], B, xor)];

/// Overloads of `Switch`
pub static SWITCH: &[Binding] = &[
    Binding::pure(&[F, F, B], F, switch),
    Binding::pure(&[I, I, B], I, switch),
    Binding::pure(&[B, B, B], B, switch),
    Binding::pure(&[V, V, B], V, switch),
    Binding::pure(&[Q, Q, B], Q, switch),
    Binding::pure(&[F, F, I], F, switch),
    Binding::pure(&[I, I, I], I, switch),
    Binding::pure(&[B, B, I], B, switch),
    Binding::pure(&[V, V, I], V, switch),
    Binding::pure(&[Q, Q, I], Q, switch),
];

/// Overloads of `ToFloat`
pub static TO_FLOAT: &[Binding] = &[
    Binding::pure(&[F], F, to_float),
    Binding::pure(&[I], F, to_float),
    Binding::pure(&[B], F, to_float),
];
/// Overloads of `ToInt`
pub static TO_INT: &[Binding] = &[
    Binding::pure(&[F], I, to_int),
    Binding::pure(&[I], I, to_int),
    Binding::pure(&[B], I, to_int),
];

fn less(a: &[Value]) -> Value {
    Value::Bool(match (a[0], a[1]) {
        (Value::Int(x), Value::Int(y)) => x < y,
        (x, y) => x.as_f32() < y.as_f32(),
    })
}

fn less_eq(a: &[Value]) -> Value {
    Value::Bool(match (a[0], a[1]) {
        (Value::Int(x), Value::Int(y)) => x <= y,
        (x, y) => x.as_f32() <= y.as_f32(),
    })
}

fn greater(a: &[Value]) -> Value {
    Value::Bool(match (a[0], a[1]) {
        (Value::Int(x), Value::Int(y)) => x > y,
        (x, y) => x.as_f32() > y.as_f32(),
    })
}

fn greater_eq(a: &[Value]) -> Value {
    Value::Bool(match (a[0], a[1]) {
        (Value::Int(x), Value::Int(y)) => x >= y,
        (x, y) => x.as_f32() >= y.as_f32(),
    })
}

#[inline]
fn scaled(tol: f32, rhs: f32) -> f32 {
    tol * (1.0 + rhs.abs())
}

fn less_tol(a: &[Value], tol: f32) -> Value {
    let (l, r) = (a[0].as_f32(), a[1].as_f32());
    Value::Bool(r - l > scaled(tol, r))
}

fn less_eq_tol(a: &[Value], tol: f32) -> Value {
    let (l, r) = (a[0].as_f32(), a[1].as_f32());
    Value::Bool(l - r <= scaled(tol, r))
}

fn greater_tol(a: &[Value], tol: f32) -> Value {
    let (l, r) = (a[0].as_f32(), a[1].as_f32());
    Value::Bool(l - r > scaled(tol, r))
}

fn greater_eq_tol(a: &[Value], tol: f32) -> Value {
    let (l, r) = (a[0].as_f32(), a[1].as_f32());
    Value::Bool(r - l <= scaled(tol, r))
}

fn equal(a: &[Value]) -> Value {
    Value::Bool(a[0] == a[1])
}

fn not_equal(a: &[Value]) -> Value {
    Value::Bool(a[0] != a[1])
}

fn close(l: f32, r: f32, tol: f32) -> bool {
    (l - r).abs() <= scaled(tol, r)
}

fn lanes(v: Value) -> [f32; 4] {
    match v {
        Value::Vec3(Vec3 { x, y, z }) => [x, y, z, 0.0],
        Value::Quat(q) => [q.x, q.y, q.z, q.w],
        other => [other.as_f32(), 0.0, 0.0, 0.0],
    }
}

fn equal_tol(a: &[Value], tol: f32) -> Value {
    let (l, r) = (lanes(a[0]), lanes(a[1]));
    Value::Bool(l.iter().zip(&r).all(|(x, y)| close(*x, *y, tol)))
}

fn not_equal_tol(a: &[Value], tol: f32) -> Value {
    let (l, r) = (lanes(a[0]), lanes(a[1]));
    Value::Bool(l.iter().zip(&r).any(|(x, y)| !close(*x, *y, tol)))
}

fn not(a: &[Value]) -> Value {
    Value::Bool(!a[0].as_bool())
}

fn and(a: &[Value]) -> Value {
    Value::Bool(a[0].as_bool() && a[1].as_bool())
}

fn or(a: &[Value]) -> Value {
    Value::Bool(a[0].as_bool() || a[1].as_bool())
}

fn xor(a: &[Value]) -> Value {
    Value::Bool(a[0].as_bool() ^ a[1].as_bool())
}

fn switch(a: &[Value]) -> Value {
    if a[2].as_bool() {
        a[0]
    } else {
        a[1]
    }
}

fn to_float(a: &[Value]) -> Value {
    Value::Float(a[0].as_f32())
}

fn to_int(a: &[Value]) -> Value {
    Value::Int(a[0].as_i32())
}

pub(crate) fn register(reg: &mut NodeRegistry) {
    use NodeCategory::{Convert, Logic};

    let compare = |name: &'static str, b: &'static [Binding], tol: &'static [Binding], desc| {
        NodeType::operator(name, Logic, b)
            .with_tolerance(tol)
            .input_required("Left Scalar")
            .input("Right Scalar", 0.0f32)
            .describe(desc)
    };
    reg.register(compare("Less", LESS, LESS_TOL, "True if left < right."));
    reg.register(compare("LessOrEqual", LESS_EQ, LESS_EQ_TOL, "True if left <= right."));
    reg.register(compare("Greater", GREATER, GREATER_TOL, "True if left > right."));
    reg.register(compare("GreaterOrEqual", GREATER_EQ, GREATER_EQ_TOL, "True if left >= right."));
    reg.register(compare("Equal", EQUAL, EQUAL_TOL, "True if left equals right."));
    reg.register(compare("NotEqual", NOT_EQUAL, NOT_EQUAL_TOL, "True if left differs from right."));

    reg.register(
        NodeType::operator("LogicalNot", Logic, NOT)
            .input_required("Boolean")
            .describe("Negates a boolean."),
    );
    for (name, b, desc) in [
        ("LogicalAnd", AND, "True if both inputs are true."),
        ("LogicalOr", OR, "True if either input is true."),
        ("LogicalXor", XOR, "True if exactly one input is true."),
    ] {
        reg.register(
            NodeType::operator(name, Logic, b)
                .input_required("Boolean")
                .input_required("Boolean")
                .describe(desc),
        );
    }
    reg.register(
        NodeType::operator("Switch", Logic, SWITCH)
            .input_required("If True")
            .input_required("If False")
            .input("Boolean", true)
            .describe("Picks an input from a boolean (or non-zero integer) selector."),
    );

    reg.register(
        NodeType::operator("ToFloat", Convert, TO_FLOAT)
            .input_required("Scalar")
            .describe("Converts a scalar to a float."),
    );
    reg.register(
        NodeType::operator("ToInt", Convert, TO_INT)
            .input_required("Scalar")
            .describe("Converts a scalar to an integer, truncating."),
    );
}
