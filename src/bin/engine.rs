// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Tetralink Team

//! Stand-alone reference engine with the mesher executable's command line

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, Level};
use tracing_subscriber::FmtSubscriber;

use tetralink::engine::StarEngine;
use tetralink::io::{load_volume_mesh, read_exchange_mesh, write_volume_mesh, DEFAULT_VERSION};
use tetralink::session::{ComputeStatus, ProgressChannel, Session};
use tetralink::strategy::{split_parameters, REQUIRED_PARAMETERS};

#[derive(Parser)]
#[command(name = "tetralink-engine")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Reference tetrahedral engine driven through mesh files", long_about = None)]
struct Args {
    /// Input surface or volume mesh
    #[arg(long = "in", value_name = "FILE")]
    input: PathBuf,

    /// Output volume mesh
    #[arg(long = "out", value_name = "FILE")]
    output: PathBuf,

    /// Size map at the input vertices
    #[arg(long, value_name = "FILE")]
    sizemap: Option<PathBuf>,

    /// Engine options, e.g. --optimisation_level strong
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    options: Vec<String>,
}

fn main() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::WARN)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("cannot install log subscriber");
    }

    if let Err(e) = run(Args::parse()) {
        eprintln!("{:#}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let input = read_exchange_mesh(&args.input, args.sizemap.as_deref())
        .with_context(|| format!("cannot read {}", args.input.display()))?;
    let volume = input.is_volume();

    let mut session = Session::new(ProgressChannel::new()).with_echo(true);
    session.attach(&StarEngine::new())?;
    if volume {
        session.bind_input_volume(Arc::new(input))?;
    } else {
        session.bind_input_surface(Arc::new(input))?;
    }

    for (name, value) in split_parameters(args.options.iter().map(String::as_str)) {
        if !session.set_parameter(&name, &value) && REQUIRED_PARAMETERS.contains(&name.as_str()) {
            bail!("invalid value '{}' for {}", value, name);
        }
    }

    match session.compute()? {
        ComputeStatus::Succeeded => {}
        ComputeStatus::Failed(_) => bail!("meshing failed"),
        ComputeStatus::Cancelled => bail!("meshing interrupted"),
    }

    let mesh = load_volume_mesh(&mut session)?;
    session.release();
    write_volume_mesh(&args.output, &mesh, DEFAULT_VERSION)
        .with_context(|| format!("cannot write {}", args.output.display()))?;
    debug!("wrote {} tetrahedra to {}", mesh.tetra_count(), args.output.display());
    Ok(())
}
