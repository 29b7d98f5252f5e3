// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Tetralink Team

//! In-process or executable execution of one computation
//!
//! [`select_strategy`] picks the in-process engine when one is available and
//! the executable was not requested. Both strategies take the same input and
//! hypothesis and return a [`StrategyOutcome`]; a cancelled run never carries
//! a mesh.

mod command;
mod files;
mod subprocess;

pub use command::{split_parameters, CommandLine, CommandOption};
pub use files::{WorkingFiles, FILE_PREFIX};
pub use subprocess::{run_executable, ExecutableRun, ExitOutcome};

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::diagnostics::describe_failure;
use crate::engine::TetraEngine;
use crate::error::{TetraError, TetraResult};
use crate::hypothesis::{Algorithm, Hypothesis};
use crate::io::{
    load_volume_mesh, read_volume_mesh, write_exchange_mesh, write_size_map, DEFAULT_VERSION,
};
use crate::mesh::{ExchangeMesh, VolumeMesh};
use crate::session::{ComputeStatus, ProgressChannel, ProgressTracker, Session};

/// Options whose rejection aborts the computation.
pub const REQUIRED_PARAMETERS: &[&str] = &["max_memory", "automatic_memory", "max_number_of_threads"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    /// Engine linked into the process, fed through callbacks.
    Library,
    /// Engine executable fed through mesh files.
    Executable,
}

/// Result of one computation.
#[derive(Debug, Clone)]
pub struct StrategyOutcome {
    pub status: ComputeStatus,
    /// Only present on success.
    pub mesh: Option<VolumeMesh>,
    /// Raw engine output.
    pub log: String,
    /// Where the log was written, executable runs only.
    pub log_file: Option<PathBuf>,
    /// Exit status of the executable, when it ran.
    pub exit_status: Option<String>,
}

impl StrategyOutcome {
    pub fn is_success(&self) -> bool {
        self.status == ComputeStatus::Succeeded
    }

    pub fn has_log(&self) -> bool {
        self.log_file.as_deref().map_or(false, Path::exists)
    }

    pub fn log_file(&self) -> Option<&Path> {
        self.log_file.as_deref()
    }

    /// The mesh on success, the matching error otherwise.
    pub fn into_result(self) -> TetraResult<VolumeMesh> {
        match self.status {
            ComputeStatus::Succeeded => self
                .mesh
                .ok_or_else(|| TetraError::EngineCompute { log: self.log }),
            ComputeStatus::Cancelled => Err(TetraError::Cancelled),
            ComputeStatus::Failed(description) => match self.exit_status {
                Some(status) => Err(TetraError::Subprocess {
                    status,
                    log: description,
                }),
                None => Err(TetraError::EngineCompute { log: description }),
            },
        }
    }
}

/// One way of running the engine.
pub trait ExecutionStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    /// Mesh `input` with `hyp`. Blocks until the run ends.
    fn run(
        &self,
        input: Arc<ExchangeMesh>,
        hyp: &Hypothesis,
        has_shape_to_mesh: bool,
        channel: &ProgressChannel,
    ) -> TetraResult<StrategyOutcome>;
}

fn check_input(input: &ExchangeMesh, hyp: &Hypothesis) -> TetraResult<()> {
    input.validate()?;
    if hyp.algorithm == Algorithm::Optimizer && !input.is_volume() {
        return Err(TetraError::BadInput(
            "the optimizer needs an input mesh with tetrahedra".into(),
        ));
    }
    if hyp.algorithm == Algorithm::Generator && input.triangles().is_empty() {
        return Err(TetraError::BadInput("the input surface has no triangles".into()));
    }
    Ok(())
}

/// Drives an in-process engine through a [`Session`].
pub struct InProcessStrategy {
    engine: Arc<dyn TetraEngine>,
}

impl InProcessStrategy {
    pub fn new(engine: Arc<dyn TetraEngine>) -> Self {
        Self { engine }
    }
}

impl ExecutionStrategy for InProcessStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Library
    }

    fn run(
        &self,
        input: Arc<ExchangeMesh>,
        hyp: &Hypothesis,
        has_shape_to_mesh: bool,
        channel: &ProgressChannel,
    ) -> TetraResult<StrategyOutcome> {
        check_input(&input, hyp)?;
        let mut session = Session::initialize(self.engine.as_ref(), channel.clone())?;

        match hyp.algorithm {
            Algorithm::Optimizer => session.bind_input_volume(input)?,
            Algorithm::Generator => session.bind_input_surface(input)?,
        }

        let command = CommandLine::build(hyp, has_shape_to_mesh);
        for (name, value) in command.parameters() {
            if !session.set_parameter(&name, &value) && REQUIRED_PARAMETERS.contains(&name.as_str())
            {
                return Err(TetraError::EngineSetup(format!(
                    "engine rejected required parameter {} = '{}'",
                    name, value
                )));
            }
        }

        info!("meshing in process with '{}'", self.engine.name());
        let status = session.compute()?;
        let log = session.log();
        let (status, mesh) = match status {
            ComputeStatus::Succeeded => (ComputeStatus::Succeeded, Some(load_volume_mesh(&mut session)?)),
            ComputeStatus::Failed(text) => (ComputeStatus::Failed(describe_failure(&text, None)), None),
            ComputeStatus::Cancelled => (ComputeStatus::Cancelled, None),
        };
        session.release();

        Ok(StrategyOutcome {
            status,
            mesh,
            log,
            log_file: None,
            exit_status: None,
        })
    }
}

/// Drives the engine executable through working files.
pub struct SubprocessStrategy {
    program: String,
}

impl SubprocessStrategy {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl ExecutionStrategy for SubprocessStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Executable
    }

    fn run(
        &self,
        input: Arc<ExchangeMesh>,
        hyp: &Hypothesis,
        has_shape_to_mesh: bool,
        channel: &ProgressChannel,
    ) -> TetraResult<StrategyOutcome> {
        check_input(&input, hyp)?;
        if !hyp.working_directory.is_dir() {
            return Err(TetraError::Hypothesis(format!(
                "working directory {} does not exist",
                hyp.working_directory.display()
            )));
        }

        let files = WorkingFiles::unique(hyp)?;
        write_exchange_mesh(files.input_mesh(), &input, DEFAULT_VERSION)?;
        let with_size_map = input.has_size_map();
        if with_size_map {
            write_size_map(files.size_map(), input.required_sizes(), DEFAULT_VERSION)?;
        }

        let command = CommandLine::build(hyp, has_shape_to_mesh);
        let tracker = ProgressTracker::new(channel.clone());
        let run = match run_executable(
            &self.program,
            &command,
            &files,
            with_size_map,
            &tracker,
            hyp.standard_output_log,
        ) {
            Ok(run) => run,
            Err(e) => {
                files.cleanup(false);
                return Err(e);
            }
        };
        let log_file = files.log_file();

        let mut outcome = StrategyOutcome {
            status: ComputeStatus::Cancelled,
            mesh: None,
            log: run.log.clone(),
            log_file: Some(log_file.clone()),
            exit_status: None,
        };

        match run.outcome {
            ExitOutcome::Cancelled => {
                // partial output is never read back
                files.discard();
                outcome.log_file = None;
                return Ok(outcome);
            }
            ExitOutcome::Exited(status) => outcome.exit_status = Some(status.to_string()),
        }

        if run.success() && files.output_mesh().exists() {
            match read_volume_mesh(files.output_mesh()) {
                Ok(mesh) => {
                    outcome.status = ComputeStatus::Succeeded;
                    outcome.mesh = Some(mesh);
                }
                Err(e) => {
                    warn!("cannot read mesher output: {}", e);
                    outcome.status = ComputeStatus::Failed(format!(
                        "{}\n{}",
                        e,
                        describe_failure(&run.log, Some(&log_file))
                    ));
                }
            }
        } else {
            outcome.status = ComputeStatus::Failed(describe_failure(&run.log, Some(&log_file)));
        }

        files.cleanup(outcome.is_success());
        Ok(outcome)
    }
}

/// Which strategy `hyp` gets when an in-process engine is or is not available.
pub fn strategy_kind(hyp: &Hypothesis, library_available: bool) -> StrategyKind {
    if library_available && !hyp.wants_executable() {
        StrategyKind::Library
    } else {
        StrategyKind::Executable
    }
}

/// Build the strategy for `hyp`, preferring the in-process `library`.
pub fn select_strategy(
    hyp: &Hypothesis,
    library: Option<Arc<dyn TetraEngine>>,
) -> Box<dyn ExecutionStrategy> {
    match (strategy_kind(hyp, library.is_some()), library) {
        (StrategyKind::Library, Some(engine)) => Box::new(InProcessStrategy::new(engine)),
        _ => Box::new(SubprocessStrategy::new(hyp.executable.clone())),
    }
}

#[cfg(all(test, feature = "reference-engine"))]
mod tests {
    use super::*;
    use crate::engine::StarEngine;
    use crate::mesh::SurfaceMesh;

    fn cube() -> Arc<ExchangeMesh> {
        let surface = SurfaceMesh::unit_cube();
        let mut mesh = ExchangeMesh::new();
        for p in &surface.vertices {
            mesh.push_vertex(*p).unwrap();
        }
        for t in &surface.triangles {
            mesh.push_triangle(*t).unwrap();
        }
        Arc::new(mesh)
    }

    #[test]
    fn test_library_is_preferred() {
        let hyp = Hypothesis::default();
        if std::env::var(crate::hypothesis::ENV_USE_EXE).is_err() {
            assert_eq!(strategy_kind(&hyp, true), StrategyKind::Library);
        }
        assert_eq!(strategy_kind(&hyp, false), StrategyKind::Executable);

        let hyp = Hypothesis {
            use_executable: true,
            ..Hypothesis::default()
        };
        let strategy = select_strategy(&hyp, Some(Arc::new(StarEngine::new())));
        assert_eq!(strategy.kind(), StrategyKind::Executable);
    }

    #[test]
    fn test_in_process_run() {
        let strategy = InProcessStrategy::new(Arc::new(StarEngine::new()));
        let outcome = strategy
            .run(cube(), &Hypothesis::default(), false, &ProgressChannel::new())
            .unwrap();
        assert!(outcome.is_success());
        assert!(!outcome.has_log());
        let mesh = outcome.into_result().unwrap();
        assert!(mesh.tetra_count() > 0);
    }

    #[test]
    fn test_rejected_required_parameter_aborts() {
        let mut hyp = Hypothesis::default();
        hyp.text_option = "--max_memory lots".into();
        let strategy = InProcessStrategy::new(Arc::new(StarEngine::new()));
        let err = strategy
            .run(cube(), &hyp, false, &ProgressChannel::new())
            .unwrap_err();
        assert!(matches!(err, TetraError::EngineSetup(_)));
    }

    #[test]
    fn test_optimizer_needs_volume() {
        let strategy = InProcessStrategy::new(Arc::new(StarEngine::new()));
        let err = strategy
            .run(cube(), &Hypothesis::optimizer(), false, &ProgressChannel::new())
            .unwrap_err();
        assert!(matches!(err, TetraError::BadInput(_)));
    }

    #[test]
    fn test_missing_executable() {
        let dir = tempfile::TempDir::new().unwrap();
        let hyp = Hypothesis {
            working_directory: dir.path().to_path_buf(),
            ..Hypothesis::default()
        };
        let strategy = SubprocessStrategy::new("/nonexistent/mg-tetra.exe");
        let err = strategy
            .run(cube(), &hyp, false, &ProgressChannel::new())
            .unwrap_err();
        assert!(matches!(err, TetraError::Subprocess { .. }));
    }
}
