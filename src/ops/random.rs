//! Seeded random distributions
//!
//! Each operator takes an integer seed (usually derived from a record
//! channel such as `Index`) and reseeds a small splitmix generator on every
//! call, so the same seed always produces the same value on any thread.
//!
//! Author: Moroya Sakamoto

use super::{Binding, F, I, V};
use crate::nodes::{NodeCategory, NodeRegistry, NodeType};
use crate::types::Value;
use glam::Vec3;

/// Overloads of `UniformRandom`
pub static UNIFORM: &[Binding] = &[Binding::pure(&[I, F, F], F, uniform)];
/// Overloads of `VecUniformRandom`
pub static VEC_UNIFORM: &[Binding] = &[
    Binding::pure(&[I, F, F], V, vec_uniform),
    Binding::pure(&[I, V, F], V, vec_uniform),
    Binding::pure(&[I, F, V], V, vec_uniform),
    Binding::pure(&[I, V, V], V, vec_uniform),
];
/// Overloads of `ExponentialRandom`
pub static EXPONENTIAL: &[Binding] = &[Binding::pure(&[I, F], F, exponential)];
/// Overloads of `WeibullRandom`
pub static WEIBULL: &[Binding] = &[Binding::pure(&[I, F, F], F, weibull)];
/// Overloads of `GaussianRandom`
pub static GAUSSIAN: &[Binding] = &[Binding::pure(&[I, F, F], F, gaussian)];
/// Overloads of `TriangleRandom`
pub static TRIANGLE: &[Binding] = &[Binding::pure(&[I, F, F, F], F, triangle)];
/// Overloads of `UniformOnSphere`
pub static ON_SPHERE: &[Binding] = &[Binding::pure(&[I, I], V, on_sphere)];

/// Deterministic splitmix64 generator
struct Rng64 {
    state: u64,
}

impl Rng64 {
    fn new(seed: i32) -> Self {
        Self {
            state: (seed as u32 as u64).wrapping_add(0x9E3779B97F4A7C15),
        }
    }

    #[inline(always)]
    fn next(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9E3779B97F4A7C15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
        z ^ (z >> 31)
    }

    /// Uniform f32 in [0, 1).
    #[inline(always)]
    fn next_f32(&mut self) -> f32 {
        (self.next() >> 40) as f32 / (1u64 << 24) as f32
    }

    /// Uniform f32 in [lo, hi).
    #[inline(always)]
    fn next_range(&mut self, lo: f32, hi: f32) -> f32 {
        lo + self.next_f32() * (hi - lo)
    }

    /// Uniform f32 in (0, 1], safe for logarithms.
    #[inline(always)]
    fn next_open(&mut self) -> f32 {
        1.0 - self.next_f32()
    }

    /// Standard normal sample (Box-Muller)
    fn next_normal(&mut self) -> f32 {
        let u1 = self.next_open();
        let u2 = self.next_f32();
        (-2.0 * u1.ln()).sqrt() * (std::f32::consts::TAU * u2).cos()
    }
}

#[inline]
fn ensure_positive(v: f32) -> f32 {
    if v > 0.0 {
        v
    } else {
        f32::EPSILON
    }
}

fn uniform(a: &[Value]) -> Value {
    let mut rng = Rng64::new(a[0].as_i32());
    Value::Float(rng.next_range(a[1].as_f32(), a[2].as_f32()))
}

fn vec_uniform(a: &[Value]) -> Value {
    let mut rng = Rng64::new(a[0].as_i32());
    let (lo, hi) = (a[1].as_vec3(), a[2].as_vec3());
    Value::Vec3(Vec3::new(
        rng.next_range(lo.x, hi.x),
        rng.next_range(lo.y, hi.y),
        rng.next_range(lo.z, hi.z),
    ))
}

fn exponential(a: &[Value]) -> Value {
    let mut rng = Rng64::new(a[0].as_i32());
    let lambda = ensure_positive(a[1].as_f32());
    Value::Float(-rng.next_open().ln() / lambda)
}

fn weibull(a: &[Value]) -> Value {
    let mut rng = Rng64::new(a[0].as_i32());
    let lambda = ensure_positive(a[1].as_f32());
    let kappa = ensure_positive(a[2].as_f32());
    Value::Float(lambda * (-rng.next_open().ln()).powf(1.0 / kappa))
}

fn gaussian(a: &[Value]) -> Value {
    let mut rng = Rng64::new(a[0].as_i32());
    let sigma = ensure_positive(a[2].as_f32());
    Value::Float(a[1].as_f32() + sigma * rng.next_normal())
}

fn triangle(a: &[Value]) -> Value {
    let mut rng = Rng64::new(a[0].as_i32());
    let mut lo = a[1].as_f32();
    let mut hi = a[3].as_f32();
    if lo > hi {
        std::mem::swap(&mut lo, &mut hi);
    }
    let mode = a[2].as_f32().clamp(lo, hi);
    if hi - lo <= 0.0 {
        return Value::Float(lo);
    }

    let u = rng.next_f32();
    let split = (mode - lo) / (hi - lo);
    let out = if u < split {
        lo + (u * (hi - lo) * (mode - lo)).sqrt()
    } else {
        hi - ((1.0 - u) * (hi - lo) * (hi - mode)).sqrt()
    };
    Value::Float(out)
}

fn on_sphere(a: &[Value]) -> Value {
    let mut rng = Rng64::new(a[0].as_i32());
    let dims = a[1].as_i32().clamp(0, 16) as usize;
    if dims == 0 {
        return Value::Vec3(Vec3::ZERO);
    }

    let mut lanes = [0.0f32; 16];
    let mut len2 = 0.0;
    for lane in lanes.iter_mut().take(dims) {
        *lane = rng.next_normal();
        len2 += *lane * *lane;
    }
    let inv = if len2 > 0.0 { 1.0 / len2.sqrt() } else { 0.0 };
    Value::Vec3(Vec3::new(lanes[0], lanes[1], lanes[2]) * inv)
}

pub(crate) fn register(reg: &mut NodeRegistry) {
    use NodeCategory::Function;

    reg.register(
        NodeType::operator("UniformRandom", Function, UNIFORM)
            .input_required("Seed")
            .input("Min. Value", 0.0f32)
            .input("Max. Value", 1.0f32)
            .describe("Uniformly distributed value in [Min, Max)."),
    );
    reg.register(
        NodeType::operator("VecUniformRandom", Function, VEC_UNIFORM)
            .input_required("Seed")
            .input("Min. Value", 0.0f32)
            .input("Max. Value", 1.0f32)
            .describe("Uniformly distributed vector in [Min, Max)."),
    );
    reg.register(
        NodeType::operator("ExponentialRandom", Function, EXPONENTIAL)
            .input_required("Seed")
            .input("Lambda", 1.0f32)
            .describe("Exponentially distributed value."),
    );
    reg.register(
        NodeType::operator("WeibullRandom", Function, WEIBULL)
            .input_required("Seed")
            .input("Lambda", 1.0f32)
            .input("Kappa", 1.0f32)
            .describe("Weibull distributed value."),
    );
    reg.register(
        NodeType::operator("GaussianRandom", Function, GAUSSIAN)
            .input_required("Seed")
            .input("Mean", 0.0f32)
            .input("Sigma", 1.0f32)
            .describe("Normally distributed value."),
    );
    reg.register(
        NodeType::operator("TriangleRandom", Function, TRIANGLE)
            .input_required("Seed")
            .input("Min.", 0.0f32)
            .input("Probable", 0.5f32)
            .input("Max.", 1.0f32)
            .describe("Value drawn from a triangle distribution."),
    );
    reg.register(
        NodeType::operator("UniformOnSphere", Function, ON_SPHERE)
            .input_required("Seed")
            .input("Dimensions", 3i32)
            .describe("Random direction on the unit sphere."),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_value() {
        let a = [Value::Int(42), Value::Float(0.0), Value::Float(1.0)];
        assert_eq!(uniform(&a), uniform(&a));
        let b = [Value::Int(43), Value::Float(0.0), Value::Float(1.0)];
        assert_ne!(uniform(&a), uniform(&b));
    }

    #[test]
    fn test_uniform_range() {
        for seed in 0..500 {
            let v = uniform(&[Value::Int(seed), Value::Float(2.0), Value::Float(3.0)]).as_f32();
            assert!((2.0..3.0).contains(&v));
        }
    }

    #[test]
    fn test_on_sphere_unit_length() {
        for seed in 0..100 {
            let v = on_sphere(&[Value::Int(seed), Value::Int(3)]).as_vec3();
            assert!((v.length() - 1.0).abs() < 0.0001);
        }
    }

    #[test]
    fn test_triangle_bounds() {
        for seed in 0..200 {
            let v = triangle(&[
                Value::Int(seed),
                Value::Float(-1.0),
                Value::Float(0.0),
                Value::Float(1.0),
            ])
            .as_f32();
            assert!((-1.0..=1.0).contains(&v));
        }
    }

    #[test]
    fn test_exponential_positive() {
        for seed in 0..200 {
            let v = exponential(&[Value::Int(seed), Value::Float(2.0)]).as_f32();
            assert!(v >= 0.0 && v.is_finite());
        }
    }
}
