//! Geometry collaborator: triangle meshes and spatial queries on them
//!
//! Compiled graphs only talk to geometry through the [`Geometry`] trait.
//! [`GeometrySet`] is the built-in implementation: a list of [`TriMesh`]es
//! sharing one BVH that is built on first use and dropped whenever a mesh
//! is borrowed mutably.
//!
//! Author: Moroya Sakamoto

pub mod bvh;
mod trimesh;

pub use bvh::{Aabb, MeshBvh, Triangle};
pub use trimesh::{MeshEdge, TriMesh};

use crate::types::{ChannelError, DataType, Value};
use glam::Vec3;
use std::sync::OnceLock;
use thiserror::Error;

/// Mesh construction errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    /// Vertex records need a three component float `Position` channel
    #[error("Vertex records have no Vec3 Position channel")]
    MissingPosition,

    /// One face record per face is required
    #[error("Expected {expected} face records, found {found}")]
    FaceCountMismatch {
        /// Number of faces
        expected: usize,
        /// Number of face records
        found: usize,
    },

    /// A face refers to a vertex that does not exist
    #[error("Face {face} uses missing vertex {vertex}")]
    VertexOutOfRange {
        /// Face index
        face: usize,
        /// Offending vertex index
        vertex: u32,
    },

    /// Channel layout error
    #[error(transparent)]
    Channel(#[from] ChannelError),
}

/// Where a mesh channel is stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelDomain {
    /// One value per vertex
    Vertex,
    /// One value per face
    Face,
    /// One value per face corner
    FaceVertex,
    /// One value per mesh
    Element,
}

/// Storage and type of a mesh channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshChannelInfo {
    /// Storage domain
    pub domain: ChannelDomain,
    /// Stored type
    pub data_type: DataType,
}

/// A located point on a surface
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceHit {
    /// World space position
    pub position: Vec3,
    /// Mesh index in the geometry set
    pub obj_index: i32,
    /// Face index in the mesh
    pub face_index: i32,
    /// Distance to the query point, or ray parameter for ray queries
    pub distance: f32,
    /// Unit face normal
    pub normal: Vec3,
    /// Barycentric coordinates on the face
    pub bary: Vec3,
}

/// Spatial queries the interpreter may issue against a set of meshes
///
/// Implementations are shared read-only between worker threads for the
/// whole evaluation pass. Queries report failure as `None`/`false` and
/// never panic on bad indices.
pub trait Geometry: Send + Sync + std::fmt::Debug {
    /// Number of meshes
    fn num_meshes(&self) -> usize;

    /// `(faces, vertices)` of one mesh
    fn mesh_counts(&self, obj: usize) -> Option<(usize, usize)>;

    /// Closest surface point within `max_distance`
    fn find_nearest_point(&self, point: Vec3, max_distance: f32, ignore_backfaces: bool) -> Option<SurfaceHit>;

    /// First hit along `origin + t * dir` with `t` in `[0, max_distance]`
    fn intersect_ray(
        &self,
        origin: Vec3,
        dir: Vec3,
        max_distance: f32,
        ignore_backfaces: bool,
    ) -> Option<SurfaceHit>;

    /// True if the point is enclosed by the surface
    fn in_volume(&self, point: Vec3) -> bool;

    /// Storage and type of a named mesh channel
    fn channel_info(&self, name: &str) -> Option<MeshChannelInfo>;

    /// Position at a barycentric location on a face
    fn face_position(&self, obj: usize, face: usize, bary: Vec3) -> Option<Vec3>;

    /// Channel value at a barycentric location on a face
    fn sample_face(&self, obj: usize, face: usize, bary: Vec3, channel: &str) -> Option<Value>;

    /// Position of a vertex
    fn vertex_position(&self, obj: usize, vertex: usize) -> Option<Vec3>;

    /// Channel value at a vertex
    fn sample_vertex(&self, obj: usize, vertex: usize, channel: &str) -> Option<Value>;

    /// Edges leaving a vertex
    fn vertex_neighbors(&self, obj: usize, vertex: usize) -> &[MeshEdge];

    /// Faces using a vertex
    fn vertex_faces(&self, obj: usize, vertex: usize) -> &[u32];
}

/// Meshes queried as one surface
#[derive(Debug, Default)]
pub struct GeometrySet {
    meshes: Vec<TriMesh>,
    bvh: OnceLock<MeshBvh>,
}

impl Clone for GeometrySet {
    fn clone(&self) -> Self {
        GeometrySet {
            meshes: self.meshes.clone(),
            bvh: OnceLock::new(),
        }
    }
}

/// Triangles per BVH leaf
const LEAF_SIZE: usize = 4;

impl GeometrySet {
    /// Set holding the given meshes
    pub fn new(meshes: Vec<TriMesh>) -> Self {
        GeometrySet {
            meshes,
            bvh: OnceLock::new(),
        }
    }

    /// Add a mesh
    pub fn push(&mut self, mesh: TriMesh) {
        self.meshes.push(mesh);
        self.invalidate();
    }

    /// All meshes
    #[inline]
    pub fn meshes(&self) -> &[TriMesh] {
        &self.meshes
    }

    /// Mutable access to a mesh; the acceleration structure is rebuilt on next query
    pub fn mesh_mut(&mut self, obj: usize) -> Option<&mut TriMesh> {
        self.invalidate();
        self.meshes.get_mut(obj)
    }

    /// Mutable access to a mesh that keeps the acceleration structure
    ///
    /// Callers must not move vertices through it.
    pub(crate) fn mesh_channels_mut(&mut self, obj: usize) -> Option<&mut TriMesh> {
        self.meshes.get_mut(obj)
    }

    /// Drop the acceleration structure after positions changed
    pub fn invalidate(&mut self) {
        self.bvh = OnceLock::new();
    }

    /// True if the acceleration structure is currently built
    pub fn is_prepared(&self) -> bool {
        self.bvh.get().is_some()
    }

    /// Build (if needed) and return the acceleration structure
    pub fn acceleration(&self) -> &MeshBvh {
        self.bvh.get_or_init(|| {
            let mut triangles = Vec::new();
            for (obj, mesh) in self.meshes.iter().enumerate() {
                let pos = mesh.positions();
                for (face, [a, b, c]) in mesh.faces().iter().enumerate() {
                    triangles.push(Triangle::new(
                        pos[*a as usize],
                        pos[*b as usize],
                        pos[*c as usize],
                        obj as u32,
                        face as u32,
                    ));
                }
            }
            log::debug!("built BVH over {} triangles", triangles.len());
            MeshBvh::build(triangles, LEAF_SIZE)
        })
    }

    fn to_surface_hit(&self, hit: bvh::TriangleHit) -> SurfaceHit {
        let tri = &self.acceleration().triangles[hit.triangle];
        SurfaceHit {
            position: hit.position,
            obj_index: tri.obj as i32,
            face_index: tri.face as i32,
            distance: hit.t,
            normal: tri.normal,
            bary: hit.bary,
        }
    }
}

impl Geometry for GeometrySet {
    fn num_meshes(&self) -> usize {
        self.meshes.len()
    }

    fn mesh_counts(&self, obj: usize) -> Option<(usize, usize)> {
        self.meshes
            .get(obj)
            .map(|m| (m.num_faces(), m.num_vertices()))
    }

    fn find_nearest_point(&self, point: Vec3, max_distance: f32, ignore_backfaces: bool) -> Option<SurfaceHit> {
        let hit = self
            .acceleration()
            .nearest(point, max_distance, ignore_backfaces)?;
        Some(self.to_surface_hit(hit))
    }

    fn intersect_ray(
        &self,
        origin: Vec3,
        dir: Vec3,
        max_distance: f32,
        ignore_backfaces: bool,
    ) -> Option<SurfaceHit> {
        if dir == Vec3::ZERO {
            return None;
        }
        let hit = self
            .acceleration()
            .raycast(origin, dir, max_distance, ignore_backfaces)?;
        Some(self.to_surface_hit(hit))
    }

    fn in_volume(&self, point: Vec3) -> bool {
        // Skewed direction keeps the ray off axis-aligned edges
        let dir = Vec3::new(0.8017, 0.4423, 0.4021).normalize();
        self.acceleration().count_crossings(point, dir) % 2 == 1
    }

    fn channel_info(&self, name: &str) -> Option<MeshChannelInfo> {
        let mesh = self.meshes.first()?;
        if let Ok(acc) = mesh.vertices().map().get_accessor(name) {
            return Some(MeshChannelInfo {
                domain: ChannelDomain::Vertex,
                data_type: acc.data_type,
            });
        }
        let acc = mesh.face_data().map().get_accessor(name).ok()?;
        Some(MeshChannelInfo {
            domain: ChannelDomain::Face,
            data_type: acc.data_type,
        })
    }

    fn face_position(&self, obj: usize, face: usize, bary: Vec3) -> Option<Vec3> {
        self.meshes.get(obj)?.face_point(face, bary)
    }

    fn sample_face(&self, obj: usize, face: usize, bary: Vec3, channel: &str) -> Option<Value> {
        self.meshes.get(obj)?.sample_face(face, bary, channel)
    }

    fn vertex_position(&self, obj: usize, vertex: usize) -> Option<Vec3> {
        self.meshes.get(obj)?.position(vertex)
    }

    fn sample_vertex(&self, obj: usize, vertex: usize, channel: &str) -> Option<Value> {
        self.meshes.get(obj)?.sample_vertex(vertex, channel)
    }

    fn vertex_neighbors(&self, obj: usize, vertex: usize) -> &[MeshEdge] {
        self.meshes
            .get(obj)
            .map_or(&[][..], |m| m.neighbors(vertex))
    }

    fn vertex_faces(&self, obj: usize, vertex: usize) -> &[u32] {
        self.meshes
            .get(obj)
            .map_or(&[][..], |m| m.vertex_faces(vertex))
    }
}

/// Closed axis-aligned cube of half-size `h` centred on the origin (12 triangles, outward normals)
pub fn cube(h: f32) -> Result<TriMesh, GeometryError> {
    let p = [
        Vec3::new(-h, -h, -h),
        Vec3::new(h, -h, -h),
        Vec3::new(h, h, -h),
        Vec3::new(-h, h, -h),
        Vec3::new(-h, -h, h),
        Vec3::new(h, -h, h),
        Vec3::new(h, h, h),
        Vec3::new(-h, h, h),
    ];
    let faces = vec![
        [0, 2, 1],
        [0, 3, 2],
        [4, 5, 6],
        [4, 6, 7],
        [0, 1, 5],
        [0, 5, 4],
        [2, 3, 7],
        [2, 7, 6],
        [1, 2, 6],
        [1, 6, 5],
        [0, 4, 7],
        [0, 7, 3],
    ];
    TriMesh::new(&p, faces)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cube_normals_point_out() {
        let set = GeometrySet::new(vec![cube(1.0).unwrap()]);
        for tri in &set.acceleration().triangles {
            let centre = (tri.v0 + tri.v1 + tri.v2) / 3.0;
            assert!(tri.normal.dot(centre) > 0.0);
        }
    }

    #[test]
    fn test_in_volume() {
        let set = GeometrySet::new(vec![cube(1.0).unwrap()]);
        assert!(set.in_volume(Vec3::ZERO));
        assert!(set.in_volume(Vec3::new(0.9, -0.5, 0.3)));
        assert!(!set.in_volume(Vec3::new(1.5, 0.0, 0.0)));
    }

    #[test]
    fn test_nearest_point_on_cube() {
        let set = GeometrySet::new(vec![cube(1.0).unwrap()]);
        let hit = set
            .find_nearest_point(Vec3::new(3.0, 0.2, 0.1), f32::INFINITY, false)
            .unwrap();
        assert!((hit.position - Vec3::new(1.0, 0.2, 0.1)).length() < 0.0001);
        assert!((hit.distance - 2.0).abs() < 0.0001);
        assert!((hit.normal - Vec3::X).length() < 0.0001);
        assert_eq!(hit.obj_index, 0);
    }

    #[test]
    fn test_ray_distance_in_direction_units() {
        let set = GeometrySet::new(vec![cube(1.0).unwrap()]);
        let hit = set
            .intersect_ray(Vec3::new(0.1, 0.2, 5.0), Vec3::new(0.0, 0.0, -2.0), f32::INFINITY, false)
            .unwrap();
        assert!((hit.distance - 2.0).abs() < 0.0001);
        assert!((hit.position.z - 1.0).abs() < 0.0001);
    }

    #[test]
    fn test_mutation_invalidates_bvh() {
        let mut set = GeometrySet::new(vec![cube(1.0).unwrap()]);
        set.acceleration();
        assert!(set.is_prepared());
        set.mesh_mut(0).unwrap();
        assert!(!set.is_prepared());
        assert_eq!(set.mesh_counts(0), Some((12, 8)));
        assert_eq!(
            set.channel_info("Position").unwrap().domain,
            ChannelDomain::Vertex
        );
    }
}
