// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Tetralink Team

//! Tetralink CLI

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use nalgebra::Point3;
use std::path::{Path, PathBuf};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use tetralink::cli::{load_surface, MeshInfo, Reporter, Runner};
use tetralink::hypothesis::{Algorithm, EnforcedVertex, Hypothesis, OptimizationLevel};
use tetralink::io::{read_volume_mesh, write_exchange_mesh, write_volume_mesh, DEFAULT_VERSION};
use tetralink::mesh::{ExchangeMesh, SurfaceMesh};
use tetralink::strategy::CommandLine;
use tetralink::{MeshingReport, Mesher};

#[derive(Parser)]
#[command(name = "tetralink")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Tetrahedral meshing through MG-Tetra compatible engines", long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "warn")]
    log_level: String,

    /// Hypothesis file (TOML); defaults and environment otherwise
    #[arg(long, global = true, value_name = "FILE")]
    hypothesis: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fill a closed surface mesh with tetrahedra
    Mesh {
        /// Input surface (.mesh or .meshb)
        input: PathBuf,

        /// Output volume mesh
        #[arg(short, long)]
        output: PathBuf,

        /// Enforced vertex "x,y,z[,size]" (repeatable)
        #[arg(long = "enforce", value_name = "X,Y,Z[,SIZE]")]
        enforced: Vec<String>,

        /// Optimisation level (none, light, standard, standard+, strong)
        #[arg(long)]
        level: Option<String>,

        /// Run the engine executable instead of the in-process engine
        #[arg(long)]
        use_executable: bool,

        /// Do not draw a progress bar
        #[arg(short, long)]
        quiet: bool,
    },

    /// Improve an existing tetrahedral mesh
    Optimize {
        /// Input volume mesh
        input: PathBuf,

        /// Output volume mesh
        #[arg(short, long)]
        output: PathBuf,

        /// Run the engine executable instead of the in-process engine
        #[arg(long)]
        use_executable: bool,

        #[arg(short, long)]
        quiet: bool,
    },

    /// Show the content of a mesh file
    Info {
        input: PathBuf,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Print the engine options the hypothesis renders to
    Cmdline {
        /// Mesh every component
        #[arg(long)]
        all_components: bool,
    },

    /// Write an axis-aligned box surface
    Cube {
        /// Output surface mesh
        output: PathBuf,

        /// Edge length
        #[arg(long, default_value = "1.0")]
        size: f64,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let hyp = load_hypothesis(cli.hypothesis.as_deref())?;

    let result = match cli.command {
        Commands::Mesh {
            input,
            output,
            enforced,
            level,
            use_executable,
            quiet,
        } => mesh_command(hyp, &input, &output, &enforced, level, use_executable, quiet),
        Commands::Optimize {
            input,
            output,
            use_executable,
            quiet,
        } => optimize_command(hyp, &input, &output, use_executable, quiet),
        Commands::Info { input, json } => info_command(&input, json),
        Commands::Cmdline { all_components } => {
            println!("{}", CommandLine::build(&hyp, all_components));
            Ok(())
        }
        Commands::Cube { output, size } => cube_command(&output, size),
    };

    if let Err(e) = &result {
        Reporter::report_error(&format!("{:#}", e));
        std::process::exit(1);
    }
    Ok(())
}

fn load_hypothesis(path: Option<&Path>) -> Result<Hypothesis> {
    match path {
        Some(path) => {
            let mut hyp = Hypothesis::from_file(path)
                .with_context(|| format!("Failed to load hypothesis {}", path.display()))?;
            hyp.apply_env_overrides();
            Ok(hyp)
        }
        None => Hypothesis::load().context("Failed to load hypothesis"),
    }
}

fn parse_enforced(text: &str) -> Result<EnforcedVertex> {
    let values = text
        .split(',')
        .map(|v| v.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("Invalid enforced vertex '{}'", text))?;
    match values.as_slice() {
        [x, y, z] => Ok(EnforcedVertex::at(*x, *y, *z, 0.0)),
        [x, y, z, size] => Ok(EnforcedVertex::at(*x, *y, *z, *size)),
        _ => bail!("Enforced vertex '{}' needs 3 or 4 numbers", text),
    }
}

fn parse_level(text: &str) -> Result<OptimizationLevel> {
    Ok(match text {
        "none" => OptimizationLevel::None,
        "light" => OptimizationLevel::Light,
        "standard" | "medium" => OptimizationLevel::Medium,
        "standard+" => OptimizationLevel::StandardPlus,
        "strong" => OptimizationLevel::Strong,
        other => bail!("Unknown optimisation level '{}'", other),
    })
}

fn mesh_command(
    mut hyp: Hypothesis,
    input: &Path,
    output: &Path,
    enforced: &[String],
    level: Option<String>,
    use_executable: bool,
    quiet: bool,
) -> Result<()> {
    hyp.algorithm = Algorithm::Generator;
    hyp.use_executable |= use_executable;
    if let Some(level) = level {
        hyp.optimization_level = parse_level(&level)?;
    }
    for text in enforced {
        hyp.set_enforced_vertex(parse_enforced(text)?)?;
    }

    let surface = load_surface(input)?;
    if !surface.is_closed() {
        Reporter::report_warning(&format!("{} is not a closed surface", input.display()));
    }

    let mesher = Mesher::new(hyp);
    let report = Runner::new(!quiet).run(mesher.channel(), "meshing", || {
        mesher.mesh(&surface).context("Meshing failed")
    })?;
    finish(report, output)
}

fn optimize_command(
    mut hyp: Hypothesis,
    input: &Path,
    output: &Path,
    use_executable: bool,
    quiet: bool,
) -> Result<()> {
    hyp.algorithm = Algorithm::Optimizer;
    hyp.use_executable |= use_executable;

    let volume = read_volume_mesh(input)
        .with_context(|| format!("Failed to read volume mesh {}", input.display()))?;
    let mesher = Mesher::new(hyp);
    let report = Runner::new(!quiet).run(mesher.channel(), "optimising", || {
        mesher.optimize(&volume).context("Optimisation failed")
    })?;
    finish(report, output)
}

fn finish(report: MeshingReport, output: &Path) -> Result<()> {
    write_volume_mesh(output, &report.mesh, DEFAULT_VERSION)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    Reporter::report_mesh(
        output,
        &report.mesh.stats(),
        report.kind,
        report.elapsed,
        report.mesh.groups.len(),
    );
    if let Some(log) = &report.log_file {
        Reporter::report_info(&format!("Engine log: {}", log.display()));
    }
    Ok(())
}

fn info_command(input: &Path, json: bool) -> Result<()> {
    let info = MeshInfo::read(input)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    println!("{} {}", "File:".bold(), info.path.display().to_string().cyan());
    println!(
        "  {} {} v{} ({}D)",
        "Format:".bright_black(),
        info.encoding,
        info.version,
        info.dimension
    );
    Reporter::report_stats(&info.stats);
    println!(
        "  {} [{:.4}, {:.4}, {:.4}] - [{:.4}, {:.4}, {:.4}]",
        "Bounds:".bright_black(),
        info.bbox_min[0],
        info.bbox_min[1],
        info.bbox_min[2],
        info.bbox_max[0],
        info.bbox_max[1],
        info.bbox_max[2]
    );
    Ok(())
}

fn cube_command(output: &Path, size: f64) -> Result<()> {
    if size <= 0.0 {
        bail!("Cube size must be positive, got {}", size);
    }
    let surface = SurfaceMesh::cuboid(Point3::origin(), Point3::new(size, size, size), 0);
    write_exchange_mesh(output, &ExchangeMesh::from_surface(&surface), DEFAULT_VERSION)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    Reporter::success(&format!("Wrote {}", output.display()));
    Ok(())
}
