// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Tetralink Team

//! Exchange mesh passed across the engine boundary
//!
//! Required (enforced) entities are always the trailing part of their list:
//! a vertex is required if and only if its index is at least
//! [`ExchangeMesh::nb_free_vertices`]. The same suffix rule applies to edges
//! and triangles. Appending a free entity after a required one is rejected so
//! the rule can never be broken.

use nalgebra::Point3;
use std::ops::Range;

use super::{Edge, SurfaceMesh, Tetrahedron, Triangle, VolumeMesh};
use crate::error::{TetraError, TetraResult};

/// In-memory surface or volume mesh handed to the engine.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExchangeMesh {
    vertices: Vec<Point3<f64>>,
    required_sizes: Vec<f64>,
    edges: Vec<Edge>,
    nb_required_edges: usize,
    triangles: Vec<Triangle>,
    nb_required_triangles: usize,
    tetrahedra: Vec<Tetrahedron>,
}

impl ExchangeMesh {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(vertex_count: usize, triangle_count: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(vertex_count),
            triangles: Vec::with_capacity(triangle_count),
            ..Self::default()
        }
    }

    /// Free vertices and triangles of a host surface.
    pub fn from_surface(surface: &SurfaceMesh) -> Self {
        Self {
            vertices: surface.vertices.clone(),
            triangles: surface.triangles.clone(),
            ..Self::default()
        }
    }

    /// Free vertices, boundary triangles and tetrahedra of a volume mesh.
    pub fn from_volume(volume: &VolumeMesh) -> Self {
        Self {
            vertices: volume.nodes.clone(),
            triangles: volume.triangles.clone(),
            tetrahedra: volume.tetrahedra.clone(),
            ..Self::default()
        }
    }

    /// Append a free vertex and return its index.
    pub fn push_vertex(&mut self, point: Point3<f64>) -> TetraResult<usize> {
        if !self.required_sizes.is_empty() {
            return Err(TetraError::BadInput(
                "free vertex appended after required vertices".into(),
            ));
        }
        self.vertices.push(point);
        Ok(self.vertices.len() - 1)
    }

    /// Append a required vertex with its target size (0 means no constraint).
    pub fn push_required_vertex(&mut self, point: Point3<f64>, size: f64) -> usize {
        self.vertices.push(point);
        self.required_sizes.push(size);
        self.vertices.len() - 1
    }

    pub fn push_edge(&mut self, edge: Edge) -> TetraResult<usize> {
        if self.nb_required_edges > 0 {
            return Err(TetraError::BadInput(
                "free edge appended after required edges".into(),
            ));
        }
        self.edges.push(edge);
        Ok(self.edges.len() - 1)
    }

    pub fn push_required_edge(&mut self, edge: Edge) -> usize {
        self.edges.push(edge);
        self.nb_required_edges += 1;
        self.edges.len() - 1
    }

    pub fn push_triangle(&mut self, triangle: Triangle) -> TetraResult<usize> {
        if self.nb_required_triangles > 0 {
            return Err(TetraError::BadInput(
                "free triangle appended after required triangles".into(),
            ));
        }
        self.triangles.push(triangle);
        Ok(self.triangles.len() - 1)
    }

    pub fn push_required_triangle(&mut self, triangle: Triangle) -> usize {
        self.triangles.push(triangle);
        self.nb_required_triangles += 1;
        self.triangles.len() - 1
    }

    pub fn push_tetrahedron(&mut self, tetra: Tetrahedron) -> usize {
        self.tetrahedra.push(tetra);
        self.tetrahedra.len() - 1
    }

    pub fn vertices(&self) -> &[Point3<f64>] {
        &self.vertices
    }

    pub fn vertex(&self, index: usize) -> Option<&Point3<f64>> {
        self.vertices.get(index)
    }

    pub fn nb_vertices(&self) -> usize {
        self.vertices.len()
    }

    pub fn nb_free_vertices(&self) -> usize {
        self.vertices.len() - self.required_sizes.len()
    }

    pub fn nb_required_vertices(&self) -> usize {
        self.required_sizes.len()
    }

    pub fn required_vertex_range(&self) -> Range<usize> {
        self.nb_free_vertices()..self.vertices.len()
    }

    /// Whether the engine must keep this vertex exactly where it is.
    pub fn is_required(&self, index: usize) -> bool {
        index >= self.nb_free_vertices() && index < self.vertices.len()
    }

    /// Target size at a vertex; 0 for free vertices.
    pub fn size_at(&self, index: usize) -> f64 {
        if self.is_required(index) {
            self.required_sizes[index - self.nb_free_vertices()]
        } else {
            0.0
        }
    }

    pub fn required_sizes(&self) -> &[f64] {
        &self.required_sizes
    }

    /// True when at least one required vertex carries a positive size.
    pub fn has_size_map(&self) -> bool {
        self.required_sizes.iter().any(|&size| size > 0.0)
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn nb_required_edges(&self) -> usize {
        self.nb_required_edges
    }

    pub fn required_edge_range(&self) -> Range<usize> {
        self.edges.len() - self.nb_required_edges..self.edges.len()
    }

    pub fn triangles(&self) -> &[Triangle] {
        &self.triangles
    }

    pub fn nb_required_triangles(&self) -> usize {
        self.nb_required_triangles
    }

    pub fn required_triangle_range(&self) -> Range<usize> {
        self.triangles.len() - self.nb_required_triangles..self.triangles.len()
    }

    pub fn tetrahedra(&self) -> &[Tetrahedron] {
        &self.tetrahedra
    }

    /// A mesh with tetrahedra is a volume to be modified, otherwise a surface to fill.
    pub fn is_volume(&self) -> bool {
        !self.tetrahedra.is_empty()
    }

    /// Check that every connectivity entry references an existing vertex.
    pub fn validate(&self) -> TetraResult<()> {
        let nb = self.vertices.len();
        let out_of_range = |max: Option<usize>| max.map_or(false, |m| m >= nb);

        if let Some(i) = self.edges.iter().position(|e| out_of_range(e.max_node())) {
            return Err(TetraError::BadInput(format!(
                "edge {} references a missing vertex ({} vertices)",
                i, nb
            )));
        }
        if let Some(i) = self
            .triangles
            .iter()
            .position(|t| out_of_range(t.max_node()))
        {
            return Err(TetraError::BadInput(format!(
                "triangle {} references a missing vertex ({} vertices)",
                i, nb
            )));
        }
        if let Some(i) = self
            .tetrahedra
            .iter()
            .position(|t| out_of_range(t.max_node()))
        {
            return Err(TetraError::BadInput(format!(
                "tetrahedron {} references a missing vertex ({} vertices)",
                i, nb
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ExchangeMesh {
        let mut mesh = ExchangeMesh::new();
        for i in 0..4 {
            mesh.push_vertex(Point3::new(i as f64, 0.0, 0.0)).unwrap();
        }
        mesh.push_required_vertex(Point3::new(5.0, 5.0, 5.0), 0.5);
        mesh.push_required_vertex(Point3::new(6.0, 6.0, 6.0), 0.0);
        mesh
    }

    #[test]
    fn test_required_suffix() {
        let mesh = sample();
        assert_eq!(mesh.nb_free_vertices(), 4);
        assert_eq!(mesh.required_vertex_range(), 4..6);
        for i in 0..4 {
            assert!(!mesh.is_required(i));
            assert_eq!(mesh.size_at(i), 0.0);
        }
        assert!(mesh.is_required(4));
        assert_eq!(mesh.size_at(4), 0.5);
        assert!(mesh.is_required(5));
        assert_eq!(mesh.size_at(5), 0.0);
        assert!(!mesh.is_required(6));
        assert!(mesh.has_size_map());
    }

    #[test]
    fn test_free_vertex_after_required_is_rejected() {
        let mut mesh = sample();
        assert!(mesh.push_vertex(Point3::origin()).is_err());
    }

    #[test]
    fn test_required_edges_are_trailing() {
        let mut mesh = sample();
        mesh.push_edge(Edge::untagged([0, 1])).unwrap();
        mesh.push_required_edge(Edge::new([1, 2], 3));
        assert_eq!(mesh.required_edge_range(), 1..2);
        assert!(mesh.push_edge(Edge::untagged([2, 3])).is_err());
    }

    #[test]
    fn test_validate_detects_dangling_index() {
        let mut mesh = sample();
        mesh.push_triangle(Triangle::untagged([0, 1, 9])).unwrap();
        assert!(mesh.validate().is_err());
    }

    #[test]
    fn test_surface_vs_volume() {
        let mut mesh = sample();
        assert!(!mesh.is_volume());
        mesh.push_tetrahedron(Tetrahedron::untagged([0, 1, 2, 3]));
        assert!(mesh.is_volume());
    }
}
