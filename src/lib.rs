// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Tetralink Team

//! Tetralink
//!
//! Exchange layer between a host's surface meshes and an MG-Tetra compatible
//! tetrahedral mesher. The mesher runs either in process, pulling its input
//! through callbacks, or as an executable fed through keyword mesh files.

pub mod cli;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod hypothesis;
pub mod io;
pub mod mesh;
pub mod mesher;
pub mod session;
pub mod strategy;

pub use error::{FormatError, FormatResult, TetraError, TetraResult};
pub use hypothesis::Hypothesis;
pub use mesh::{ExchangeMesh, SurfaceMesh, VolumeMesh};
pub use mesher::{Mesher, MeshingReport};
pub use session::{ComputeStatus, ProgressChannel, Session, SessionState};
pub use strategy::{select_strategy, ExecutionStrategy, StrategyKind, StrategyOutcome};

/// Fill `surface` with tetrahedra using the default hypothesis.
pub fn mesh_surface(surface: &SurfaceMesh) -> TetraResult<VolumeMesh> {
    Mesher::new(Hypothesis::default())
        .mesh(surface)
        .map(|report| report.mesh)
}

#[cfg(all(test, feature = "reference-engine"))]
mod tests {
    use super::*;

    #[test]
    fn test_basic_cube() {
        let mesh = mesh_surface(&SurfaceMesh::unit_cube()).unwrap();
        assert!(mesh.tetra_count() > 0);
    }
}
