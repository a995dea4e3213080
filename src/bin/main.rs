//! ALICE-Magma CLI
//!
//! Command-line interface for graph documents.
//!
//! Author: Moroya Sakamoto

#![allow(clippy::uninlined_format_args, clippy::needless_pass_by_value)]

#[cfg(feature = "cli")]
use alice_magma::prelude::*;
#[cfg(feature = "cli")]
use std::path::PathBuf;
#[cfg(feature = "cli")]
use std::time::Instant;

#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};

#[cfg(feature = "cli")]
#[derive(Parser)]
#[command(name = "alice-magma")]
#[command(author = "Moroya Sakamoto")]
#[command(version = alice_magma::VERSION)]
#[command(about = "ALICE-Magma: node-graph expressions over particles and meshes", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[cfg(feature = "cli")]
#[derive(Subcommand)]
enum Commands {
    /// Display graph document information
    Info {
        /// Graph document (.json)
        file: PathBuf,
    },

    /// Compile a graph against a particle layout and print the listing
    Compile {
        /// Graph document (.json)
        file: PathBuf,
        /// Extra particle channels, e.g. "Color:Vec3,Mass:Float"
        #[arg(short, long, default_value = "Color:Vec3")]
        channels: String,
    },

    /// Write the demo graph (Color = Position + offset)
    Demo {
        /// Output file
        #[arg(short, long, default_value = "demo.json")]
        output: PathBuf,
    },

    /// Evaluate a graph over a generated grid of particles
    Run {
        /// Graph document (.json)
        file: PathBuf,
        /// Extra particle channels, e.g. "Color:Vec3,Mass:Float"
        #[arg(short, long, default_value = "Color:Vec3")]
        channels: String,
        /// Number of particles
        #[arg(short, long, default_value = "100000")]
        particles: usize,
        /// Records per chunk
        #[arg(long, default_value = "200")]
        chunk_size: usize,
        /// Dedicated pool size
        #[arg(short, long)]
        threads: Option<usize>,
        /// Evaluate on the calling thread only
        #[arg(long)]
        sequential: bool,
        /// Records to print after the pass
        #[arg(long, default_value = "4")]
        show: usize,
    },
}

#[cfg(feature = "cli")]
fn main() {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Info { file } => cmd_info(file),
        Commands::Compile { file, channels } => cmd_compile(file, &channels),
        Commands::Demo { output } => cmd_demo(output),
        Commands::Run {
            file,
            channels,
            particles,
            chunk_size,
            threads,
            sequential,
            show,
        } => {
            let config = EvalConfig {
                threaded: !sequential,
                chunk_size,
                num_threads: threads,
                force_buffering: false,
            };
            cmd_run(file, &channels, particles, &config, show)
        }
    }
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI not enabled. Build with --features cli");
    std::process::exit(1);
}

#[cfg(feature = "cli")]
fn fail(context: &str, e: impl std::fmt::Display) -> ! {
    eprintln!("{}: {}", context, e);
    std::process::exit(1);
}

#[cfg(feature = "cli")]
fn load(path: &PathBuf) -> Graph {
    load_graph_json(path).unwrap_or_else(|e| fail("Load error", e))
}

#[cfg(feature = "cli")]
fn parse_channels(list: &str) -> Vec<(String, DataType)> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|item| {
            let (name, ty) = item.split_once(':').unwrap_or((item, "Float"));
            let data_type = DataType::from_name(ty.trim()).unwrap_or_else(|| {
                fail(
                    "Unknown channel type",
                    format!("{} (expected one of {:?})", ty, DataType::named_types()),
                )
            });
            (name.trim().to_string(), data_type)
        })
        .collect()
}

/// Particles on a cubic grid of unit spacing
#[cfg(feature = "cli")]
fn grid_particles(count: usize, channels: &[(String, DataType)]) -> ParticleSet {
    let side = (count as f64).cbrt().ceil().max(1.0) as usize;
    let positions: Vec<Vec3> = (0..count)
        .map(|i| {
            Vec3::new(
                (i % side) as f32,
                ((i / side) % side) as f32,
                (i / (side * side)) as f32,
            )
        })
        .collect();
    let extra: Vec<(&str, DataType)> = channels
        .iter()
        .filter(|(name, _)| name != "Position")
        .map(|(name, ty)| (name.as_str(), *ty))
        .collect();
    ParticleSet::from_positions(&positions, &extra).unwrap_or_else(|e| fail("Layout error", e))
}

#[cfg(feature = "cli")]
fn cmd_info(path: PathBuf) {
    let graph = load(&path);
    let mut counts = std::collections::BTreeMap::new();
    for node in graph.nodes() {
        *counts.entry(node.type_name().to_string()).or_insert(0usize) += 1;
    }

    println!("File: {}", path.display());
    println!("Nodes: {} ({} top-level)", graph.len(), graph.num_nodes(None).unwrap_or(0));
    let outputs: Vec<String> = graph
        .outputs()
        .iter()
        .map(|id| {
            let channel = graph
                .property(*id, "channelName")
                .ok()
                .and_then(PropertyValue::as_str)
                .unwrap_or("?");
            format!("{} -> {}", id, channel)
        })
        .collect();
    println!("Outputs: {}", outputs.join(", "));
    for (type_name, n) in counts {
        println!("  {:<20} {}", type_name, n);
    }
}

#[cfg(feature = "cli")]
fn cmd_compile(path: PathBuf, channels: &str) {
    let graph = load(&path);
    let particles = grid_particles(0, &parse_channels(channels));
    let ctx = CompileContext::new(particles.map().clone());
    match CompiledGraph::compile(&graph, &ctx) {
        Ok(compiled) => print!("{}", compiled),
        Err(e) => fail("Compile error", e),
    }
}

#[cfg(feature = "cli")]
fn cmd_demo(output: PathBuf) {
    let build = || -> Result<Graph, GraphError> {
        let mut graph = Graph::standard();
        let pos = graph.create_node("InputChannel")?;
        let add = graph.create_node("Add")?;
        graph.set_input(add, 0, pos, 0)?;
        graph.set_input_default_value(add, 1, Vec3::new(0.5, 0.25, 0.0))?;
        let out = graph.create_node("Output")?;
        graph.set_property(out, "channelName", "Color")?;
        graph.set_input(out, 0, add, 0)?;
        Ok(graph)
    };
    let graph = build().unwrap_or_else(|e| fail("Graph error", e));
    match save_graph_json(&graph, &output) {
        Ok(()) => println!("Created demo graph: {}", output.display()),
        Err(e) => fail("Save error", e),
    }
}

#[cfg(feature = "cli")]
fn cmd_run(path: PathBuf, channels: &str, count: usize, config: &EvalConfig, show: usize) {
    let graph = load(&path);
    let mut particles = grid_particles(count, &parse_channels(channels));
    let ctx = CompileContext::new(particles.map().clone());

    let start = Instant::now();
    let compiled = CompiledGraph::compile(&graph, &ctx).unwrap_or_else(|e| fail("Compile error", e));
    let compile_time = start.elapsed();

    let start = Instant::now();
    let stats =
        eval_particles(&compiled, &mut particles, config).unwrap_or_else(|e| fail("Eval error", e));
    let eval_time = start.elapsed();

    println!(
        "Compiled {} expressions in {:.2?}; arena {} bytes",
        compiled.len(),
        compile_time,
        compiled.arena_size()
    );
    println!(
        "Evaluated {} particles in {} chunks ({}) in {:.2?}",
        stats.records,
        stats.chunks,
        if stats.buffered { "buffered" } else { "direct" },
        eval_time
    );
    for i in 0..show.min(particles.len()) {
        let fields: Vec<String> = compiled
            .writes()
            .iter()
            .filter_map(|name| particles.get(i, name).map(|v| format!("{}={}", name, v)))
            .collect();
        println!("  [{}] {}", i, fields.join(" "));
    }
}
