// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Tetralink Team

//! Meshing parameters
//!
//! A [`Hypothesis`] holds every tunable of one computation. It is plain data:
//! the strategy layer turns it into engine options or a command line. It is
//! stored as TOML; [`Hypothesis::load`] also applies the environment
//! overrides `MG_TETRA_USE_EXE`, `MG_TETRA_EXE` and `TETRALINK_TMP_DIR`.

mod enforced;
mod options;

pub use enforced::{
    ElementKind, EnforcedMesh, EnforcedVertex, EntityResolver, MapResolver, MeshElements,
    VertexLocation,
};
pub use options::{known_option, AdvancedOptions, OptionType};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{TetraError, TetraResult};

/// Selects the executable strategy when set to a truthy value.
pub const ENV_USE_EXE: &str = "MG_TETRA_USE_EXE";
/// Overrides [`Hypothesis::executable`].
pub const ENV_EXE: &str = "MG_TETRA_EXE";
/// Overrides [`Hypothesis::working_directory`].
pub const ENV_TMP_DIR: &str = "TETRALINK_TMP_DIR";
/// File read by [`Hypothesis::load`] when present in the current directory.
pub const DEFAULT_CONFIG_FILE: &str = "tetralink.toml";

pub const DEFAULT_GRADATION: f64 = 1.05;
pub const DEFAULT_VERBOSE: u32 = 10;
pub const DEFAULT_MAX_THREADS: u32 = 4;
pub const DEFAULT_EXECUTABLE: &str = "mg-tetra.exe";

/// Surface filling or volume optimisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    #[default]
    Generator,
    Optimizer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationLevel {
    None,
    Light,
    #[default]
    Medium,
    StandardPlus,
    Strong,
}

impl OptimizationLevel {
    /// Engine spelling of the level.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Light => "light",
            Self::Medium => "standard",
            Self::StandardPlus => "standard+",
            Self::Strong => "strong",
        }
    }
}

/// Three-way switch used by several optimiser options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    #[default]
    No,
    Yes,
    Only,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::No => "no",
            Self::Yes => "yes",
            Self::Only => "only",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PThreadsMode {
    #[default]
    None,
    Safe,
    Aggressive,
}

impl PThreadsMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Safe => "safe",
            Self::Aggressive => "aggressive",
        }
    }
}

fn default_working_directory() -> PathBuf {
    std::env::var_os(ENV_TMP_DIR)
        .map(PathBuf::from)
        .unwrap_or_else(std::env::temp_dir)
}

fn truthy(value: &str) -> bool {
    !matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "" | "0" | "no" | "false" | "off"
    )
}

/// Parameters of one computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Hypothesis {
    pub algorithm: Algorithm,
    /// Also mesh the inner cavities of the domain.
    pub to_mesh_holes: bool,
    /// One group per resulting sub-domain.
    pub to_make_groups_of_domains: bool,
    /// Memory limit in MB.
    pub maximum_memory: Option<u32>,
    /// Initial memory in MB.
    pub initial_memory: Option<u32>,
    pub optimization_level: OptimizationLevel,
    pub working_directory: PathBuf,
    pub keep_files: bool,
    /// 0 (silent) to 10 (everything).
    pub verbose_level: u32,
    /// `false` forbids interior points.
    pub to_create_new_nodes: bool,
    pub to_use_boundary_recovery: bool,
    pub fem_correction: bool,
    pub gradation: f64,
    /// Echo the engine output on stdout as well as in the log file.
    pub standard_output_log: bool,
    pub remove_log_on_success: bool,
    pub use_executable: bool,
    pub executable: String,
    // Optimizer
    pub optimization: Mode,
    pub split_overconstrained: Mode,
    pub smooth_off_slivers: bool,
    pub max_threads: u32,
    pub pthreads_mode: PThreadsMode,
    /// Raw text appended to the engine options.
    pub text_option: String,
    pub advanced_options: AdvancedOptions,
    pub enforced_vertices: Vec<EnforcedVertex>,
    pub enforced_meshes: Vec<EnforcedMesh>,
}

impl Default for Hypothesis {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::Generator,
            to_mesh_holes: false,
            to_make_groups_of_domains: false,
            maximum_memory: None,
            initial_memory: None,
            optimization_level: OptimizationLevel::Medium,
            working_directory: default_working_directory(),
            keep_files: false,
            verbose_level: DEFAULT_VERBOSE,
            to_create_new_nodes: true,
            to_use_boundary_recovery: false,
            fem_correction: false,
            gradation: DEFAULT_GRADATION,
            standard_output_log: false,
            remove_log_on_success: true,
            use_executable: false,
            executable: DEFAULT_EXECUTABLE.to_string(),
            optimization: Mode::Yes,
            split_overconstrained: Mode::No,
            smooth_off_slivers: false,
            max_threads: DEFAULT_MAX_THREADS,
            pthreads_mode: PThreadsMode::None,
            text_option: String::new(),
            advanced_options: AdvancedOptions::new(),
            enforced_vertices: Vec::new(),
            enforced_meshes: Vec::new(),
        }
    }
}

impl Hypothesis {
    /// Parameters for volume optimisation.
    pub fn optimizer() -> Self {
        Self {
            algorithm: Algorithm::Optimizer,
            ..Self::default()
        }
    }

    /// Load from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> TetraResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            TetraError::Hypothesis(format!("failed to read {}: {}", path.display(), e))
        })?;
        let hypothesis: Hypothesis = toml::from_str(&content).map_err(|e| {
            TetraError::Hypothesis(format!("failed to parse {}: {}", path.display(), e))
        })?;
        hypothesis.validate()?;
        Ok(hypothesis)
    }

    /// Load `tetralink.toml` if present, else defaults, then apply the environment.
    pub fn load() -> TetraResult<Self> {
        let mut hypothesis = if Path::new(DEFAULT_CONFIG_FILE).exists() {
            Self::from_file(DEFAULT_CONFIG_FILE)?
        } else {
            Self::default()
        };
        hypothesis.apply_env_overrides();
        Ok(hypothesis)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(value) = std::env::var(ENV_USE_EXE) {
            self.use_executable = truthy(&value);
        }
        if let Ok(exe) = std::env::var(ENV_EXE) {
            if !exe.trim().is_empty() {
                self.executable = exe;
            }
        }
        if let Some(dir) = std::env::var_os(ENV_TMP_DIR) {
            self.working_directory = PathBuf::from(dir);
        }
        debug!(
            "hypothesis after environment: executable={} use_executable={} workdir={}",
            self.executable,
            self.use_executable,
            self.working_directory.display()
        );
    }

    pub fn save(&self, path: impl AsRef<Path>) -> TetraResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| TetraError::Hypothesis(format!("failed to serialize: {}", e)))?;
        std::fs::write(path.as_ref(), content)?;
        Ok(())
    }

    /// Check value ranges and enforced entities.
    pub fn validate(&self) -> TetraResult<()> {
        let invalid = |msg: String| Err(TetraError::Hypothesis(msg));
        if !(self.gradation >= 1.0) {
            return invalid(format!("gradation {} is below 1", self.gradation));
        }
        if self.verbose_level > 10 {
            return invalid(format!("verbose level {} exceeds 10", self.verbose_level));
        }
        if self.max_threads == 0 {
            return invalid("thread count must be positive".into());
        }
        if self.maximum_memory == Some(0) || self.initial_memory == Some(0) {
            return invalid("memory limits must be positive".into());
        }
        for vertex in &self.enforced_vertices {
            if !(vertex.size >= 0.0) {
                return invalid(format!("enforced vertex size {} is negative", vertex.size));
            }
        }
        for mesh in &self.enforced_meshes {
            if mesh.entry.is_empty() {
                return invalid("enforced mesh without entry".into());
            }
        }
        self.advanced_options.validate()
    }

    /// Add an enforced vertex, replacing one at the same location.
    pub fn set_enforced_vertex(&mut self, vertex: EnforcedVertex) -> TetraResult<()> {
        if !(vertex.size >= 0.0) {
            return Err(TetraError::Hypothesis(format!(
                "enforced vertex size {} is negative",
                vertex.size
            )));
        }
        match self
            .enforced_vertices
            .iter_mut()
            .find(|v| v.location == vertex.location)
        {
            Some(existing) => *existing = vertex,
            None => self.enforced_vertices.push(vertex),
        }
        Ok(())
    }

    pub fn remove_enforced_vertex(&mut self, location: &VertexLocation) -> bool {
        let before = self.enforced_vertices.len();
        self.enforced_vertices.retain(|v| &v.location != location);
        self.enforced_vertices.len() != before
    }

    pub fn clear_enforced_vertices(&mut self) {
        self.enforced_vertices.clear();
    }

    pub fn add_enforced_mesh(&mut self, mesh: EnforcedMesh) {
        self.enforced_meshes.push(mesh);
    }

    pub fn clear_enforced_meshes(&mut self) {
        self.enforced_meshes.clear();
    }

    /// Whether the executable is requested, by the hypothesis or the environment.
    pub fn wants_executable(&self) -> bool {
        self.use_executable || std::env::var(ENV_USE_EXE).map_or(false, |v| truthy(&v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let hyp = Hypothesis::default();
        assert_eq!(hyp.gradation, 1.05);
        assert_eq!(hyp.verbose_level, 10);
        assert_eq!(hyp.max_threads, 4);
        assert_eq!(hyp.optimization_level.as_str(), "standard");
        assert!(hyp.to_create_new_nodes);
        assert!(hyp.remove_log_on_success);
        assert!(hyp.validate().is_ok());
    }

    #[test]
    fn test_toml_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hyp.toml");

        let mut hyp = Hypothesis::default();
        hyp.gradation = 1.2;
        hyp.maximum_memory = Some(512);
        hyp.set_enforced_vertex(EnforcedVertex::at(2.0, 2.0, 2.0, 0.1).in_group("extra"))
            .unwrap();
        hyp.add_enforced_mesh(EnforcedMesh::new("0:1:3", ElementKind::Edge));
        hyp.advanced_options.set("target_quality", "4").unwrap();
        hyp.save(&path).unwrap();

        let loaded = Hypothesis::from_file(&path).unwrap();
        assert_eq!(loaded, hyp);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hyp.toml");
        std::fs::write(&path, "optimization_level = \"strong\"\nkeep_files = true\n").unwrap();
        let hyp = Hypothesis::from_file(&path).unwrap();
        assert_eq!(hyp.optimization_level, OptimizationLevel::Strong);
        assert!(hyp.keep_files);
        assert_eq!(hyp.max_threads, DEFAULT_MAX_THREADS);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let mut hyp = Hypothesis::default();
        hyp.gradation = 0.5;
        assert!(matches!(hyp.validate(), Err(TetraError::Hypothesis(_))));
        assert!(hyp
            .set_enforced_vertex(EnforcedVertex::at(0.0, 0.0, 0.0, -1.0))
            .is_err());
    }

    #[test]
    fn test_enforced_vertex_is_replaced() {
        let mut hyp = Hypothesis::default();
        hyp.set_enforced_vertex(EnforcedVertex::at(1.0, 1.0, 1.0, 0.1)).unwrap();
        hyp.set_enforced_vertex(EnforcedVertex::at(1.0, 1.0, 1.0, 0.3)).unwrap();
        assert_eq!(hyp.enforced_vertices.len(), 1);
        assert_eq!(hyp.enforced_vertices[0].size, 0.3);
        assert!(hyp.remove_enforced_vertex(&VertexLocation::Coordinates {
            x: 1.0,
            y: 1.0,
            z: 1.0
        }));
        assert!(hyp.enforced_vertices.is_empty());
    }
}
