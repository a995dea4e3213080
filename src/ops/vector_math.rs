//! Vector and quaternion operators
//!
//! Author: Moroya Sakamoto

use super::{Binding, F, I, Q, V};
use crate::nodes::{NodeCategory, NodeRegistry, NodeType};
use crate::types::Value;
use glam::{EulerRot, Mat3, Quat, Vec3};

/// Overloads of `ComponentSum`
pub static COMPONENT_SUM: &[Binding] = &[
    Binding::pure(&[F], F, component_sum),
    Binding::pure(&[I], I, component_sum),
    Binding::pure(&[V], F, component_sum),
    Binding::pure(&[Q], F, component_sum),
];
/// Overloads of `Magnitude`
pub static MAGNITUDE: &[Binding] = &[Binding::pure(&[V], F, magnitude)];
/// Overloads of `Normalize`
pub static NORMALIZE: &[Binding] = &[Binding::pure(&[V], V, normalize)];
/// Overloads of `VectorDot`
pub static DOT: &[Binding] = &[Binding::pure(&[V, V], F, dot)];
/// Overloads of `VectorCross`
pub static CROSS: &[Binding] = &[Binding::pure(&[V, V], V, cross)];
/// Overloads of `TransformByQuat`
pub static QUAT_MUL: &[Binding] = &[
    Binding::pure(&[Q, V], V, quat_mul),
    Binding::pure(&[Q, Q], Q, quat_mul),
];
/// Overloads of `MatrixMulVec`
pub static MATRIX_MUL: &[Binding] = &[Binding::pure(&[V, V, V, V], V, matrix_mul)];
/// Overloads of `VectorsToQuat`
pub static VECTORS_TO_QUAT: &[Binding] = &[Binding::pure(&[V, V, V], Q, vectors_to_quat)];
/// Overloads of `EulerAnglesToQuat`
pub static EULER_TO_QUAT: &[Binding] = &[Binding::pure(&[F, F, F], Q, euler_to_quat)];
/// Overloads of `AngleAxisToQuat`
pub static ANGLE_AXIS_TO_QUAT: &[Binding] = &[Binding::pure(&[F, V], Q, angle_axis_to_quat)];
/// Overloads of `ToVector`
pub static TO_VECTOR: &[Binding] = &[Binding::pure(&[F, F, F], V, to_vector)];

fn component_sum(a: &[Value]) -> Value {
    match a[0] {
        Value::Int(x) => Value::Int(x),
        Value::Vec3(v) => Value::Float(v.x + v.y + v.z),
        Value::Quat(q) => Value::Float(q.x + q.y + q.z + q.w),
        other => Value::Float(other.as_f32()),
    }
}

fn magnitude(a: &[Value]) -> Value {
    Value::Float(a[0].as_vec3().length())
}

fn normalize(a: &[Value]) -> Value {
    Value::Vec3(a[0].as_vec3().normalize_or_zero())
}

fn dot(a: &[Value]) -> Value {
    Value::Float(a[0].as_vec3().dot(a[1].as_vec3()))
}

fn cross(a: &[Value]) -> Value {
    Value::Vec3(a[0].as_vec3().cross(a[1].as_vec3()))
}

fn quat_mul(a: &[Value]) -> Value {
    let q = a[0].as_quat();
    match a[1] {
        Value::Quat(r) => Value::Quat(q * r),
        other => Value::Vec3(q * other.as_vec3()),
    }
}

fn matrix_mul(a: &[Value]) -> Value {
    let m = Mat3::from_cols(a[1].as_vec3(), a[2].as_vec3(), a[3].as_vec3());
    Value::Vec3(m * a[0].as_vec3())
}

fn vectors_to_quat(a: &[Value]) -> Value {
    let m = Mat3::from_cols(a[0].as_vec3(), a[1].as_vec3(), a[2].as_vec3());
    Value::Quat(Quat::from_mat3(&m))
}

fn euler_to_quat(a: &[Value]) -> Value {
    // Rotate about X, then Y, then Z
    Value::Quat(Quat::from_euler(
        EulerRot::ZYX,
        a[2].as_f32(),
        a[1].as_f32(),
        a[0].as_f32(),
    ))
}

fn angle_axis_to_quat(a: &[Value]) -> Value {
    let axis = a[1].as_vec3().normalize_or_zero();
    if axis == Vec3::ZERO {
        return Value::Quat(Quat::IDENTITY);
    }
    Value::Quat(Quat::from_axis_angle(axis, a[0].as_f32()))
}

fn to_vector(a: &[Value]) -> Value {
    Value::Vec3(Vec3::new(a[0].as_f32(), a[1].as_f32(), a[2].as_f32()))
}

pub(crate) fn register(reg: &mut NodeRegistry) {
    use NodeCategory::{Convert, Transform, Vector};

    reg.register(
        NodeType::operator("ComponentSum", Vector, COMPONENT_SUM)
            .input_required("Vector")
            .describe("Sum of the components of a vector."),
    );
    reg.register(
        NodeType::operator("Magnitude", Vector, MAGNITUDE)
            .input_required("Vector")
            .describe("Length of a vector."),
    );
    reg.register(
        NodeType::operator("Normalize", Vector, NORMALIZE)
            .input_required("Vector")
            .describe("Scales a vector to unit length; the zero vector stays zero."),
    );
    reg.register(
        NodeType::operator("VectorDot", Vector, DOT)
            .input_required("Left Vector")
            .input_required("Right Vector")
            .describe("Inner product of two vectors."),
    );
    reg.register(
        NodeType::operator("VectorCross", Vector, CROSS)
            .input_required("Left Vector")
            .input_required("Right Vector")
            .describe("Cross product of two vectors."),
    );
    reg.register(
        NodeType::operator("MatrixMulVec", Vector, MATRIX_MUL)
            .input("Vec", Vec3::ZERO)
            .input("Col1", Vec3::X)
            .input("Col2", Vec3::Y)
            .input("Col3", Vec3::Z)
            .describe("Multiplies a vector by the 3x3 matrix built from three columns."),
    );
    reg.register(
        NodeType::operator("TransformByQuat", Transform, QUAT_MUL)
            .input("Quat", Quat::IDENTITY)
            .input("QuatOrVector", Vec3::ZERO)
            .describe("Transforms a quaternion or vector by another quaternion."),
    );
    reg.register(
        NodeType::operator("ToVector", Convert, TO_VECTOR)
            .input("X", 0.0f32)
            .input("Y", 0.0f32)
            .input("Z", 0.0f32)
            .not_disableable()
            .describe("Creates a vector from three floats."),
    );
    reg.register(
        NodeType::operator("VectorsToQuat", Convert, VECTORS_TO_QUAT)
            .input("X", Vec3::X)
            .input("Y", Vec3::Y)
            .input("Z", Vec3::Z)
            .not_disableable()
            .describe("Creates a quaternion from an orthonormal basis."),
    );
    reg.register(
        NodeType::operator("EulerAnglesToQuat", Convert, EULER_TO_QUAT)
            .input("XAngleRadians", 0.0f32)
            .input("YAngleRadians", 0.0f32)
            .input("ZAngleRadians", 0.0f32)
            .not_disableable()
            .describe("Creates a quaternion from X, Y then Z rotations in radians."),
    );
    reg.register(
        NodeType::operator("AngleAxisToQuat", Convert, ANGLE_AXIS_TO_QUAT)
            .input("AngleRadians", 0.0f32)
            .input("Axis", Vec3::Z)
            .not_disableable()
            .describe("Creates a quaternion rotating by an angle about an axis."),
    );
}
