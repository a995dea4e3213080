//! Drivers: run a compiled pass over every record of a buffer
//!
//! A pass splits records into contiguous chunks processed on the rayon
//! pool; each worker owns one arena. Passes that read and write the same
//! channel run buffered, so every record sees the pre-pass snapshot.
//!
//! # Example
//!
//! ```rust
//! use alice_magma::prelude::*;
//!
//! let mut graph = Graph::standard();
//! let index = graph.create_node("InputChannel").unwrap();
//! graph.set_property(index, "channelName", "Index").unwrap();
//! let to_float = graph.create_node("ToFloat").unwrap();
//! graph.set_input(to_float, 0, index, 0).unwrap();
//! let out = graph.create_node("Output").unwrap();
//! graph.set_property(out, "channelName", "Weight").unwrap();
//! graph.set_input(out, 0, to_float, 0).unwrap();
//!
//! let map = ChannelMap::from_channels([("Weight", DataType::FLOAT)]).unwrap();
//! let compiled = CompiledGraph::compile(&graph, &CompileContext::new(map.clone())).unwrap();
//! let mut buffer = ChannelBuffer::with_len(map, 1000).unwrap();
//! run_pass(&compiled, &mut buffer, &EvalConfig::default()).unwrap();
//! assert_eq!(buffer.get(999, "Weight").unwrap(), Value::Float(999.0));
//! ```
//!
//! Author: Moroya Sakamoto

mod mesh;
pub mod parallel;
mod particle;

pub use mesh::eval_mesh;
pub use parallel::{run_pass, PassStats};
pub use particle::eval_particles;

use crate::compiled::Domain;
use crate::geometry::GeometryError;
use crate::types::ChannelError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Pass execution settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalConfig {
    /// Evaluate chunks on worker threads
    pub threaded: bool,
    /// Records per chunk
    pub chunk_size: usize,
    /// Size of a dedicated pool; the global rayon pool when `None`
    pub num_threads: Option<usize>,
    /// Stage writes even if no channel is both read and written
    pub force_buffering: bool,
}

impl Default for EvalConfig {
    fn default() -> Self {
        EvalConfig {
            threaded: true,
            chunk_size: 200,
            num_threads: None,
            force_buffering: false,
        }
    }
}

impl EvalConfig {
    /// Single-threaded evaluation
    pub fn sequential() -> Self {
        EvalConfig {
            threaded: false,
            ..Default::default()
        }
    }

    /// Set records per chunk
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Run on a dedicated pool of `n` threads
    pub fn with_threads(mut self, n: usize) -> Self {
        self.num_threads = Some(n);
        self
    }

    /// Always stage writes
    pub fn buffered(mut self) -> Self {
        self.force_buffering = true;
        self
    }
}

/// Error type for driver failures
#[derive(Error, Debug)]
pub enum EvalError {
    /// The buffer's channel map differs from the one the pass was compiled against
    #[error("Record layout does not match the compiled pass")]
    LayoutMismatch,

    /// The pass was compiled for another iteration domain
    #[error("Pass iterates {expected} but the driver iterates {found}")]
    DomainMismatch {
        /// Domain the pass was compiled for
        expected: Domain,
        /// Domain of the driver
        found: Domain,
    },

    /// The mesh index is out of range
    #[error("No mesh at index {0}")]
    NoSuchMesh(usize),

    /// A dedicated pool could not be started
    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// Geometry error
    #[error(transparent)]
    Geometry(#[from] GeometryError),

    /// Channel error
    #[error(transparent)]
    Channel(#[from] ChannelError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults_and_serde() {
        let config = EvalConfig::default();
        assert!(config.threaded);
        assert_eq!(config.chunk_size, 200);

        let parsed: EvalConfig = serde_json::from_str(r#"{"chunk_size": 64}"#).unwrap();
        assert_eq!(parsed, EvalConfig::default().with_chunk_size(64));
    }
}
