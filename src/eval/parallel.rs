//! Chunked pass runner
//!
//! Records are processed in contiguous blocks of `chunk_size`, one arena
//! per block. Direct mode reads and writes each record in place. Buffered
//! mode reads from a snapshot taken before the pass, so a record never sees
//! another record's writes; the buffer itself receives the writes and is
//! the committed result once the pass ends.
//!
//! Author: Moroya Sakamoto

use super::{EvalConfig, EvalError};
use crate::compiled::{CompiledGraph, RecordRow};
use crate::types::ChannelBuffer;
use rayon::prelude::*;

/// Summary of one pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassStats {
    /// Records evaluated
    pub records: usize,
    /// Chunks processed
    pub chunks: usize,
    /// True if reads came from a pre-pass snapshot
    pub buffered: bool,
}

/// Evaluate `compiled` over every record of `buffer`
pub fn run_pass(
    compiled: &CompiledGraph,
    buffer: &mut ChannelBuffer,
    config: &EvalConfig,
) -> Result<PassStats, EvalError> {
    if buffer.map() != compiled.map() {
        return Err(EvalError::LayoutMismatch);
    }

    let records = buffer.len();
    let stride = buffer.stride();
    let chunk_size = config.chunk_size.max(1);
    let buffered = config.force_buffering || compiled.is_self_referential();
    if compiled.is_self_referential() {
        log::warn!(
            "pass reads and writes {:?}; buffering writes",
            compiled
                .reads()
                .intersection(compiled.writes())
                .collect::<Vec<_>>()
        );
    }

    let stats = PassStats {
        records,
        chunks: records.div_ceil(chunk_size),
        buffered,
    };
    if records == 0 || stride == 0 || compiled.is_empty() {
        return Ok(stats);
    }
    log::debug!(
        "pass over {} records: {} chunks, {}, {}",
        records,
        stats.chunks,
        if config.threaded { "threaded" } else { "sequential" },
        if buffered { "buffered" } else { "direct" }
    );

    let snapshot = buffered.then(|| buffer.as_bytes().to_vec());
    let chunk_bytes = chunk_size * stride;
    let bytes = buffer.as_bytes_mut();
    let process = |(c, chunk): (usize, &mut [u8])| {
        let start = c * chunk_bytes;
        let read = snapshot.as_deref().map(|s| &s[start..start + chunk.len()]);
        eval_chunk(compiled, c * chunk_size, stride, chunk, read);
    };

    match (config.threaded, config.num_threads) {
        (false, _) => bytes.chunks_mut(chunk_bytes).enumerate().for_each(process),
        (true, None) => bytes.par_chunks_mut(chunk_bytes).enumerate().for_each(process),
        (true, Some(n)) => {
            let pool = rayon::ThreadPoolBuilder::new().num_threads(n).build()?;
            pool.install(|| bytes.par_chunks_mut(chunk_bytes).enumerate().for_each(process));
        }
    }
    Ok(stats)
}

/// Evaluate one block of records with a fresh arena
fn eval_chunk(
    compiled: &CompiledGraph,
    first: usize,
    stride: usize,
    chunk: &mut [u8],
    snapshot: Option<&[u8]>,
) {
    let mut arena = compiled.new_arena();
    match snapshot {
        None => {
            for (j, record) in chunk.chunks_mut(stride).enumerate() {
                compiled.eval_row(
                    &mut arena,
                    &mut RecordRow::InPlace {
                        index: first + j,
                        record,
                    },
                );
            }
        }
        Some(read) => {
            for (j, (write, read)) in chunk
                .chunks_mut(stride)
                .zip(read.chunks(stride))
                .enumerate()
            {
                compiled.eval_row(
                    &mut arena,
                    &mut RecordRow::Buffered {
                        index: first + j,
                        read,
                        write,
                    },
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiled::CompileContext;
    use crate::graph::Graph;
    use crate::types::{ChannelMap, DataType, Value};

    fn index_to_value() -> (Graph, ChannelMap) {
        let mut graph = Graph::standard();
        let index = graph.create_node("InputChannel").unwrap();
        graph.set_property(index, "channelName", "Index").unwrap();
        let out = graph.create_node("Output").unwrap();
        graph.set_property(out, "channelName", "Value").unwrap();
        graph.set_input(out, 0, index, 0).unwrap();
        let map = ChannelMap::from_channels([("Value", DataType::INT)]).unwrap();
        (graph, map)
    }

    #[test]
    fn test_every_record_visited() {
        let (graph, map) = index_to_value();
        let compiled = CompiledGraph::compile(&graph, &CompileContext::new(map.clone())).unwrap();
        let mut buffer = ChannelBuffer::with_len(map, 1001).unwrap();

        let stats = run_pass(&compiled, &mut buffer, &EvalConfig::default().with_chunk_size(7)).unwrap();
        assert_eq!(stats.records, 1001);
        assert_eq!(stats.chunks, 143);
        assert!(!stats.buffered);
        for i in 0..1001 {
            assert_eq!(buffer.get(i, "Value").unwrap(), Value::Int(i as i32));
        }
    }

    #[test]
    fn test_layout_mismatch() {
        let (graph, map) = index_to_value();
        let compiled = CompiledGraph::compile(&graph, &CompileContext::new(map)).unwrap();
        let other = ChannelMap::from_channels([("Value", DataType::FLOAT)]).unwrap();
        let mut buffer = ChannelBuffer::with_len(other, 4).unwrap();
        assert!(matches!(
            run_pass(&compiled, &mut buffer, &EvalConfig::default()),
            Err(EvalError::LayoutMismatch)
        ));
    }

    #[test]
    fn test_dedicated_pool() {
        let (graph, map) = index_to_value();
        let compiled = CompiledGraph::compile(&graph, &CompileContext::new(map.clone())).unwrap();
        let mut buffer = ChannelBuffer::with_len(map, 50).unwrap();
        run_pass(&compiled, &mut buffer, &EvalConfig::default().with_threads(2).with_chunk_size(8)).unwrap();
        assert_eq!(buffer.get(49, "Value").unwrap(), Value::Int(49));
    }
}
