//! Mesh-domain driver
//!
//! Vertex passes iterate a mesh's vertex records, face passes its face
//! records. A vertex pass writing `Position` drops the set's acceleration
//! structure so the next spatial query sees the moved surface.
//!
//! Author: Moroya Sakamoto

use super::{run_pass, EvalConfig, EvalError, PassStats};
use crate::compiled::{CompiledGraph, Domain};
use crate::geometry::GeometrySet;

/// Evaluate a vertex or face pass over mesh `obj` of `geometry`
pub fn eval_mesh(
    compiled: &CompiledGraph,
    geometry: &mut GeometrySet,
    obj: usize,
    config: &EvalConfig,
) -> Result<PassStats, EvalError> {
    let domain = compiled.domain();
    if domain == Domain::Particles {
        return Err(EvalError::DomainMismatch {
            expected: domain,
            found: Domain::Vertices,
        });
    }
    let moves = domain == Domain::Vertices && compiled.writes().contains("Position");

    let mesh = geometry
        .mesh_channels_mut(obj)
        .ok_or(EvalError::NoSuchMesh(obj))?;
    let records = match domain {
        Domain::Faces => mesh.face_data_mut(),
        _ => mesh.vertices_mut(),
    };
    let stats = run_pass(compiled, records, config)?;

    if moves {
        log::debug!("mesh {} positions written; dropping acceleration", obj);
        geometry.invalidate();
    }
    Ok(stats)
}
