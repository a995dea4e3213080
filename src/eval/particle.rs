//! Particle-domain driver
//!
//! Author: Moroya Sakamoto

use super::{run_pass, EvalConfig, EvalError, PassStats};
use crate::compiled::{CompiledGraph, Domain};
use crate::particles::ParticleSet;

/// Evaluate a particle pass over every particle of `particles`
///
/// The set's k-d tree is dropped and rebuilt on the next spatial query.
pub fn eval_particles(
    compiled: &CompiledGraph,
    particles: &mut ParticleSet,
    config: &EvalConfig,
) -> Result<PassStats, EvalError> {
    if compiled.domain() != Domain::Particles {
        return Err(EvalError::DomainMismatch {
            expected: compiled.domain(),
            found: Domain::Particles,
        });
    }
    run_pass(compiled, particles.records_mut(), config)
}
