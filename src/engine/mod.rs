// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Tetralink Team

//! Contract of an in-process tetrahedral mesh generator
//!
//! The engine pulls its input through [`MeshSource`] and [`SizeMapSource`],
//! reports through the message callback, polls the interrupt callback, and
//! exposes its result as an [`EngineMesh`]. Every index crossing this boundary
//! is 1-based, as the native engines expect.

#[cfg(feature = "reference-engine")]
pub mod reference;

use std::sync::Arc;

use crate::error::TetraResult;
use crate::mesh::SeedKind;

#[cfg(feature = "reference-engine")]
pub use reference::StarEngine;

/// Answer of the interrupt callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptStatus {
    Continue,
    Stop,
}

/// Receives every diagnostic line the engine emits. May be called from any
/// engine worker thread.
pub type MessageCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Polled by the engine between work units.
pub type InterruptCallback = Arc<dyn Fn() -> InterruptStatus + Send + Sync>;

/// Outcome of [`EngineSession::compute`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineStatus {
    Ok,
    /// The interrupt callback answered [`InterruptStatus::Stop`].
    Interrupted,
    /// Any other failure, with the engine's own description.
    Error(String),
}

/// Pull access to the input mesh. Indices are 1-based.
pub trait MeshSource: Send + Sync {
    fn vertex_count(&self) -> usize;

    fn vertex_coordinates(&self, index: usize) -> Option<[f64; 3]>;

    /// Whether the vertex must be kept exactly where it is.
    fn vertex_required(&self, index: usize) -> bool;

    fn edge_count(&self) -> usize;

    fn edge_vertices(&self, index: usize) -> Option<([usize; 2], i32)>;

    /// Whether the edge is an enforced constraint rather than a feature line.
    fn edge_required(&self, _index: usize) -> bool {
        false
    }

    fn triangle_count(&self) -> usize;

    fn triangle_vertices(&self, index: usize) -> Option<([usize; 3], i32)>;

    /// Whether the triangle is an enforced constraint. Required triangles may
    /// lie inside the domain and never take part in the boundary.
    fn triangle_required(&self, _index: usize) -> bool {
        false
    }

    fn tetrahedron_count(&self) -> usize;

    fn tetrahedron_vertices(&self, index: usize) -> Option<([usize; 4], i32)>;
}

/// Isotropic target size per input vertex, 1-based. 0 means unconstrained.
pub trait SizeMapSource: Send + Sync {
    fn size_at_vertex(&self, index: usize) -> f64;
}

/// Sub-domain seed as reported by the engine (1-based seed index).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubDomainDescription {
    pub tag: i32,
    pub seed_kind: SeedKind,
    pub seed_index: usize,
    pub orientation: i32,
}

/// Output mesh of a successful computation. Indices are 1-based.
pub trait EngineMesh: Send {
    fn vertex_count(&self) -> usize;
    fn vertex_coordinates(&self, index: usize) -> Option<[f64; 3]>;
    /// Reference (tag) the engine attached to the vertex.
    fn vertex_reference(&self, index: usize) -> Option<i32>;

    fn required_vertex_count(&self) -> usize;
    fn required_vertex(&self, index: usize) -> Option<usize>;

    fn edge_count(&self) -> usize;
    fn edge(&self, index: usize) -> Option<([usize; 2], i32)>;

    fn triangle_count(&self) -> usize;
    fn triangle(&self, index: usize) -> Option<([usize; 3], i32)>;

    fn quadrangle_count(&self) -> usize;
    fn quadrangle(&self, index: usize) -> Option<([usize; 4], i32)>;

    fn tetrahedron_count(&self) -> usize;
    fn tetrahedron(&self, index: usize) -> Option<([usize; 4], i32)>;

    fn hexahedron_count(&self) -> usize;
    fn hexahedron(&self, index: usize) -> Option<([usize; 8], i32)>;

    fn subdomain_count(&self) -> usize;
    fn subdomain(&self, index: usize) -> Option<SubDomainDescription>;
}

/// One computation inside an engine context.
pub trait EngineSession: Send {
    fn set_message_callback(&mut self, callback: MessageCallback);

    fn set_interrupt_callback(&mut self, callback: InterruptCallback);

    /// Forward one named option; `false` when the name or value is refused.
    fn set_param(&mut self, name: &str, value: &str) -> bool;

    /// Fill the closed surface `mesh` with tetrahedra.
    fn set_surface_mesh(&mut self, mesh: Arc<dyn MeshSource>) -> TetraResult<()>;

    /// Modify the existing volume `mesh`.
    fn set_volume_mesh(&mut self, mesh: Arc<dyn MeshSource>) -> TetraResult<()>;

    fn set_sizemap(&mut self, sizemap: Arc<dyn SizeMapSource>) -> TetraResult<()>;

    fn compute(&mut self) -> EngineStatus;

    /// Hand over the result of the last successful [`EngineSession::compute`].
    fn take_mesh(&mut self) -> TetraResult<Box<dyn EngineMesh>>;
}

/// Factory of engine sessions, the Rust counterpart of a linked engine library.
pub trait TetraEngine: Send + Sync {
    fn name(&self) -> &str;

    fn new_session(&self) -> TetraResult<Box<dyn EngineSession>>;
}

/// The engine compiled into this build, if any.
pub fn default_engine() -> Option<Arc<dyn TetraEngine>> {
    #[cfg(feature = "reference-engine")]
    {
        Some(Arc::new(StarEngine::new()))
    }
    #[cfg(not(feature = "reference-engine"))]
    {
        None
    }
}
