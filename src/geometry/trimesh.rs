//! Indexed triangle mesh with per-vertex and per-face channels
//!
//! Author: Moroya Sakamoto

use super::GeometryError;
use crate::types::{ChannelBuffer, ChannelMap, DataType, Value};
use glam::Vec3;
use std::collections::HashMap;
use std::sync::OnceLock;

/// An edge leaving a vertex
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshEdge {
    /// Vertex at the other end
    pub vertex: u32,
    /// False if every face using this edge marks it hidden
    pub visible: bool,
    /// True if only one face uses this edge
    pub boundary: bool,
}

/// Per-vertex edges and incident faces
#[derive(Debug, Default)]
struct Adjacency {
    edges: Vec<Vec<MeshEdge>>,
    faces: Vec<Vec<u32>>,
}

/// Triangle mesh whose vertex records always carry a `Position` channel
#[derive(Debug)]
pub struct TriMesh {
    vertices: ChannelBuffer,
    faces: Vec<[u32; 3]>,
    face_data: ChannelBuffer,
    edge_visibility: Vec<[bool; 3]>,
    adjacency: OnceLock<Adjacency>,
}

impl Clone for TriMesh {
    fn clone(&self) -> Self {
        TriMesh {
            vertices: self.vertices.clone(),
            faces: self.faces.clone(),
            face_data: self.face_data.clone(),
            edge_visibility: self.edge_visibility.clone(),
            adjacency: OnceLock::new(),
        }
    }
}

impl TriMesh {
    /// Mesh with positions only
    pub fn new(positions: &[Vec3], faces: Vec<[u32; 3]>) -> Result<Self, GeometryError> {
        let map = ChannelMap::from_channels([("Position", DataType::VEC3)])?;
        let mut vertices = ChannelBuffer::with_len(map, positions.len())?;
        for (i, p) in positions.iter().enumerate() {
            vertices.set(i, "Position", &Value::Vec3(*p))?;
        }
        let mut face_map = ChannelMap::new();
        face_map.seal(4, false)?;
        let face_data = ChannelBuffer::with_len(face_map, faces.len())?;
        Self::from_buffers(vertices, faces, face_data)
    }

    /// Mesh from prepared vertex and face records
    pub fn from_buffers(
        vertices: ChannelBuffer,
        faces: Vec<[u32; 3]>,
        face_data: ChannelBuffer,
    ) -> Result<Self, GeometryError> {
        let acc = vertices
            .map()
            .get_accessor("Position")
            .map_err(|_| GeometryError::MissingPosition)?;
        if acc.data_type.canonical() != DataType::VEC3 {
            return Err(GeometryError::MissingPosition);
        }
        if face_data.len() != faces.len() {
            return Err(GeometryError::FaceCountMismatch {
                expected: faces.len(),
                found: face_data.len(),
            });
        }
        for (f, face) in faces.iter().enumerate() {
            if let Some(&v) = face.iter().find(|&&v| v as usize >= vertices.len()) {
                return Err(GeometryError::VertexOutOfRange { face: f, vertex: v });
            }
        }

        let edge_visibility = vec![[true; 3]; faces.len()];
        Ok(TriMesh {
            vertices,
            faces,
            face_data,
            edge_visibility,
            adjacency: OnceLock::new(),
        })
    }

    /// Vertex records
    #[inline]
    pub fn vertices(&self) -> &ChannelBuffer {
        &self.vertices
    }

    /// Vertex records, mutable
    #[inline]
    pub fn vertices_mut(&mut self) -> &mut ChannelBuffer {
        &mut self.vertices
    }

    /// Face records
    #[inline]
    pub fn face_data(&self) -> &ChannelBuffer {
        &self.face_data
    }

    /// Face records, mutable
    #[inline]
    pub fn face_data_mut(&mut self) -> &mut ChannelBuffer {
        &mut self.face_data
    }

    /// Vertex indices of every face
    #[inline]
    pub fn faces(&self) -> &[[u32; 3]] {
        &self.faces
    }

    /// Number of vertices
    #[inline]
    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    /// Number of faces
    #[inline]
    pub fn num_faces(&self) -> usize {
        self.faces.len()
    }

    /// Position of a vertex
    pub fn position(&self, vertex: usize) -> Option<Vec3> {
        if vertex >= self.vertices.len() {
            return None;
        }
        self.vertices.get(vertex, "Position").ok().map(|v| v.as_vec3())
    }

    /// Positions of every vertex
    pub fn positions(&self) -> Vec<Vec3> {
        (0..self.vertices.len())
            .map(|i| self.position(i).unwrap_or(Vec3::ZERO))
            .collect()
    }

    /// Mark the three edges of a face visible or hidden
    ///
    /// Edge `k` runs from corner `k` to corner `k + 1`.
    pub fn set_edge_visibility(&mut self, face: usize, visible: [bool; 3]) {
        if let Some(slot) = self.edge_visibility.get_mut(face) {
            *slot = visible;
            self.adjacency = OnceLock::new();
        }
    }

    /// Edges leaving a vertex, sorted by neighbor index
    pub fn neighbors(&self, vertex: usize) -> &[MeshEdge] {
        self.adjacency()
            .edges
            .get(vertex)
            .map_or(&[][..], Vec::as_slice)
    }

    /// Faces using a vertex, in ascending order
    pub fn vertex_faces(&self, vertex: usize) -> &[u32] {
        self.adjacency()
            .faces
            .get(vertex)
            .map_or(&[][..], Vec::as_slice)
    }

    fn adjacency(&self) -> &Adjacency {
        self.adjacency.get_or_init(|| self.build_adjacency())
    }

    fn build_adjacency(&self) -> Adjacency {
        // (lo, hi) -> (face count, any face shows it)
        let mut edges: HashMap<(u32, u32), (u32, bool)> = HashMap::new();
        let mut faces = vec![Vec::new(); self.vertices.len()];
        for (f, (face, vis)) in self.faces.iter().zip(&self.edge_visibility).enumerate() {
            for k in 0..3 {
                let (a, b) = (face[k], face[(k + 1) % 3]);
                let key = (a.min(b), a.max(b));
                let entry = edges.entry(key).or_insert((0, false));
                entry.0 += 1;
                entry.1 |= vis[k];

                let list: &mut Vec<u32> = &mut faces[a as usize];
                if list.last() != Some(&(f as u32)) {
                    list.push(f as u32);
                }
            }
        }

        let mut adjacency = vec![Vec::new(); self.vertices.len()];
        for ((a, b), (count, visible)) in edges {
            let boundary = count == 1;
            adjacency[a as usize].push(MeshEdge {
                vertex: b,
                visible,
                boundary,
            });
            adjacency[b as usize].push(MeshEdge {
                vertex: a,
                visible,
                boundary,
            });
        }
        for list in &mut adjacency {
            list.sort_by_key(|e| e.vertex);
        }
        Adjacency {
            edges: adjacency,
            faces,
        }
    }

    /// Point on a face from barycentric coordinates
    pub fn face_point(&self, face: usize, bary: Vec3) -> Option<Vec3> {
        let [a, b, c] = *self.faces.get(face)?;
        Some(
            self.position(a as usize)? * bary.x
                + self.position(b as usize)? * bary.y
                + self.position(c as usize)? * bary.z,
        )
    }

    /// A channel at a location on a face
    ///
    /// Face channels are constant over the face. Vertex channels are
    /// interpolated for float types; integer and bool channels take the
    /// value of the corner with the largest weight.
    pub fn sample_face(&self, face: usize, bary: Vec3, channel: &str) -> Option<Value> {
        if self.face_data.map().has_channel(channel) {
            return self.face_data.get(face, channel).ok();
        }
        let corners = *self.faces.get(face)?;
        let values: Vec<Value> = corners
            .iter()
            .map(|&v| self.vertices.get(v as usize, channel).ok())
            .collect::<Option<_>>()?;
        let weights = [bary.x, bary.y, bary.z];
        Some(match values[0] {
            Value::Float(_) => Value::Float(
                values.iter().zip(weights).map(|(v, w)| v.as_f32() * w).sum(),
            ),
            Value::Vec3(_) => Value::Vec3(
                values.iter().zip(weights).map(|(v, w)| v.as_vec3() * w).sum(),
            ),
            Value::Quat(_) => {
                let q = values
                    .iter()
                    .zip(weights)
                    .fold(glam::Vec4::ZERO, |acc, (v, w)| acc + glam::Vec4::from(v.as_quat()) * w);
                Value::Quat(glam::Quat::from_vec4(q).normalize())
            }
            _ => {
                let k = (0..3)
                    .max_by(|&i, &j| weights[i].total_cmp(&weights[j]))
                    .unwrap_or(0);
                values[k]
            }
        })
    }

    /// A vertex channel of one vertex
    pub fn sample_vertex(&self, vertex: usize, channel: &str) -> Option<Value> {
        if vertex >= self.vertices.len() {
            return None;
        }
        self.vertices.get(vertex, channel).ok()
    }
}
