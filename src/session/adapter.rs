// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Tetralink Team

//! Pull-callback views over host data

use std::sync::Arc;

use crate::engine::{MeshSource, SizeMapSource};
use crate::io::{from_one_based, to_one_based};
use crate::mesh::{Element, ExchangeMesh};

/// Serves an [`ExchangeMesh`] to the engine without copying it.
#[derive(Debug, Clone)]
pub struct InputAdapter {
    mesh: Arc<ExchangeMesh>,
}

impl InputAdapter {
    pub fn new(mesh: Arc<ExchangeMesh>) -> Self {
        Self { mesh }
    }

    pub fn mesh(&self) -> &ExchangeMesh {
        &self.mesh
    }
}

fn engine_element<const N: usize>(
    elements: &[Element<N>],
    index: usize,
) -> Option<([usize; N], i32)> {
    let element = elements.get(from_one_based(index)?)?;
    Some((element.nodes.map(to_one_based), element.tag))
}

impl MeshSource for InputAdapter {
    fn vertex_count(&self) -> usize {
        self.mesh.nb_vertices()
    }

    fn vertex_coordinates(&self, index: usize) -> Option<[f64; 3]> {
        let p = self.mesh.vertex(from_one_based(index)?)?;
        Some([p.x, p.y, p.z])
    }

    fn vertex_required(&self, index: usize) -> bool {
        from_one_based(index).map_or(false, |i| self.mesh.is_required(i))
    }

    fn edge_count(&self) -> usize {
        self.mesh.edges().len()
    }

    fn edge_vertices(&self, index: usize) -> Option<([usize; 2], i32)> {
        engine_element(self.mesh.edges(), index)
    }

    fn edge_required(&self, index: usize) -> bool {
        from_one_based(index).map_or(false, |i| self.mesh.required_edge_range().contains(&i))
    }

    fn triangle_count(&self) -> usize {
        self.mesh.triangles().len()
    }

    fn triangle_vertices(&self, index: usize) -> Option<([usize; 3], i32)> {
        engine_element(self.mesh.triangles(), index)
    }

    fn triangle_required(&self, index: usize) -> bool {
        from_one_based(index).map_or(false, |i| self.mesh.required_triangle_range().contains(&i))
    }

    fn tetrahedron_count(&self) -> usize {
        self.mesh.tetrahedra().len()
    }

    fn tetrahedron_vertices(&self, index: usize) -> Option<([usize; 4], i32)> {
        engine_element(self.mesh.tetrahedra(), index)
    }
}

impl SizeMapSource for InputAdapter {
    fn size_at_vertex(&self, index: usize) -> f64 {
        from_one_based(index).map_or(0.0, |i| self.mesh.size_at(i))
    }
}

/// Explicit per-vertex sizes, 0-based in memory.
#[derive(Debug, Clone)]
pub struct VertexSizes {
    sizes: Vec<f64>,
}

impl VertexSizes {
    pub fn new(sizes: Vec<f64>) -> Self {
        Self { sizes }
    }

    pub fn len(&self) -> usize {
        self.sizes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }
}

impl SizeMapSource for VertexSizes {
    fn size_at_vertex(&self, index: usize) -> f64 {
        from_one_based(index)
            .and_then(|i| self.sizes.get(i))
            .copied()
            .unwrap_or(0.0)
    }
}
