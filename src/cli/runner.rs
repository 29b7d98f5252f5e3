// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Tetralink Team

//! Computation runner with a live progress bar

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crate::io::{read_exchange_mesh, Encoding, MeshReader};
use crate::mesh::{MeshStats, SurfaceMesh, VolumeMesh};
use crate::session::ProgressChannel;

const REFRESH: Duration = Duration::from_millis(100);
const BAR_LENGTH: u64 = 1000;

/// Runs a computation while a bar follows its [`ProgressChannel`]
pub struct Runner {
    show_progress: bool,
}

impl Runner {
    pub fn new(show_progress: bool) -> Self {
        Self { show_progress }
    }

    /// Run `work` on the current thread and draw the progress of `channel`
    /// until it returns.
    pub fn run<T>(
        &self,
        channel: &ProgressChannel,
        message: &str,
        work: impl FnOnce() -> Result<T>,
    ) -> Result<T> {
        if !self.show_progress {
            return work();
        }

        let pb = ProgressBar::new(BAR_LENGTH);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {percent}% {msg}")
                .context("invalid progress template")?
                .progress_chars("#>-"),
        );
        pb.set_message(message.to_string());

        let done = AtomicBool::new(false);
        let result = thread::scope(|scope| {
            scope.spawn(|| {
                while !done.load(Ordering::Acquire) {
                    pb.set_position(to_position(channel.progress()));
                    thread::sleep(REFRESH);
                }
            });
            let result = work();
            done.store(true, Ordering::Release);
            result
        });

        match &result {
            Ok(_) => {
                pb.set_position(BAR_LENGTH);
                pb.finish_with_message("done");
            }
            Err(_) => pb.abandon_with_message("failed"),
        }
        result
    }
}

impl Default for Runner {
    fn default() -> Self {
        Self::new(true)
    }
}

fn to_position(progress: f64) -> u64 {
    (progress.clamp(0.0, 1.0) * BAR_LENGTH as f64).round() as u64
}

/// Load the free vertices and triangles of a mesh file as a surface.
pub fn load_surface(path: &Path) -> Result<SurfaceMesh> {
    let exchange = read_exchange_mesh(path, None)
        .with_context(|| format!("Failed to read surface mesh {}", path.display()))?;
    let mut surface = SurfaceMesh::new();
    for point in exchange.vertices() {
        surface.add_vertex(*point);
    }
    for triangle in exchange.triangles() {
        surface.add_triangle(*triangle);
    }
    Ok(surface)
}

/// Summary printed by `tetralink info`.
#[derive(Debug, Clone, Serialize)]
pub struct MeshInfo {
    pub path: PathBuf,
    pub encoding: String,
    pub version: i32,
    pub dimension: i32,
    /// Keyword blocks present in the file, with their record counts.
    pub blocks: Vec<(String, usize)>,
    pub stats: MeshStats,
    pub bbox_min: [f64; 3],
    pub bbox_max: [f64; 3],
}

impl MeshInfo {
    pub fn read(path: &Path) -> Result<Self> {
        let reader = MeshReader::open(path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        let blocks = reader
            .keywords()
            .into_iter()
            .map(|k| (k.name().to_string(), reader.stat_block(k)))
            .collect();
        let encoding = match reader.encoding() {
            Encoding::Ascii => "ascii",
            Encoding::Binary => "binary",
        };
        let (version, dimension) = (reader.version(), reader.dimension());
        drop(reader);

        let mesh = crate::io::read_volume_mesh(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Ok(Self::from_mesh(path, encoding, version, dimension, blocks, &mesh))
    }

    fn from_mesh(
        path: &Path,
        encoding: &str,
        version: i32,
        dimension: i32,
        blocks: Vec<(String, usize)>,
        mesh: &VolumeMesh,
    ) -> Self {
        let bbox = mesh.bounding_box();
        Self {
            path: path.to_path_buf(),
            encoding: encoding.to_string(),
            version,
            dimension,
            blocks,
            stats: mesh.stats(),
            bbox_min: [bbox.min.x, bbox.min.y, bbox.min.z],
            bbox_max: [bbox.max.x, bbox.max.y, bbox.max.z],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{write_exchange_mesh, DEFAULT_VERSION};
    use crate::mesh::ExchangeMesh;
    use tempfile::TempDir;

    #[test]
    fn test_to_position() {
        assert_eq!(to_position(0.0), 0);
        assert_eq!(to_position(0.25), 250);
        assert_eq!(to_position(7.0), BAR_LENGTH);
    }

    #[test]
    fn test_run_without_bar() {
        let runner = Runner::new(false);
        let value = runner
            .run(&ProgressChannel::new(), "noop", || Ok(42))
            .unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn test_run_with_bar_returns_error() {
        let runner = Runner::new(true);
        let channel = ProgressChannel::new();
        let result: Result<()> = runner.run(&channel, "work", || {
            channel.advance(0.5);
            anyhow::bail!("boom")
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_load_surface_and_info() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cube.mesh");
        let cube = SurfaceMesh::unit_cube();
        write_exchange_mesh(&path, &ExchangeMesh::from_surface(&cube), DEFAULT_VERSION).unwrap();

        let surface = load_surface(&path).unwrap();
        assert_eq!(surface.vertex_count(), 8);
        assert_eq!(surface.triangle_count(), 12);
        assert!(surface.is_closed());

        let info = MeshInfo::read(&path).unwrap();
        assert_eq!(info.encoding, "ascii");
        assert_eq!(info.stats.nodes, 8);
        assert_eq!(info.bbox_max, [1.0, 1.0, 1.0]);
        assert!(info.blocks.iter().any(|(name, count)| name == "Triangles" && *count == 12));
    }
}
