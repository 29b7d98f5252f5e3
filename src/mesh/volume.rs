// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Tetralink Team

//! Volume mesh produced by a computation

use nalgebra::Point3;
use serde::Serialize;
use std::collections::BTreeMap;

use super::{BoundingBox, Edge, Hexahedron, Quadrilateral, SubDomain, Tetrahedron, Triangle};

/// Named collection of mesh entities, by 0-based index per kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Group {
    pub nodes: Vec<usize>,
    pub edges: Vec<usize>,
    pub triangles: Vec<usize>,
    pub tetrahedra: Vec<usize>,
}

impl Group {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
            && self.edges.is_empty()
            && self.triangles.is_empty()
            && self.tetrahedra.is_empty()
    }

    pub fn len(&self) -> usize {
        self.nodes.len() + self.edges.len() + self.triangles.len() + self.tetrahedra.len()
    }
}

/// Tetrahedral mesh reconstructed from an engine session or an output file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VolumeMesh {
    pub nodes: Vec<Point3<f64>>,
    pub node_tags: Vec<i32>,
    pub edges: Vec<Edge>,
    pub triangles: Vec<Triangle>,
    pub quadrilaterals: Vec<Quadrilateral>,
    pub tetrahedra: Vec<Tetrahedron>,
    pub hexahedra: Vec<Hexahedron>,
    pub subdomains: Vec<SubDomain>,
    /// 0-based indices of nodes the engine was told to keep.
    pub required_vertices: Vec<usize>,
    pub groups: BTreeMap<String, Group>,
}

/// Summary counts, used by `info` output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MeshStats {
    pub nodes: usize,
    pub edges: usize,
    pub triangles: usize,
    pub quadrilaterals: usize,
    pub tetrahedra: usize,
    pub hexahedra: usize,
    pub subdomains: usize,
    pub required_vertices: usize,
    pub volume: f64,
}

impl VolumeMesh {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn tetra_count(&self) -> usize {
        self.tetrahedra.len()
    }

    /// Signed volume of one tetrahedron.
    pub fn tetra_volume(&self, index: usize) -> f64 {
        let [a, b, c, d] = self.tetrahedra[index].nodes;
        let p0 = self.nodes[a];
        let e1 = self.nodes[b] - p0;
        let e2 = self.nodes[c] - p0;
        let e3 = self.nodes[d] - p0;
        e1.dot(&e2.cross(&e3)) / 6.0
    }

    /// Sum of the absolute tetrahedron volumes.
    pub fn total_volume(&self) -> f64 {
        (0..self.tetrahedra.len())
            .map(|i| self.tetra_volume(i).abs())
            .sum()
    }

    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::from_points(&self.nodes)
    }

    /// Index of the first node within `tolerance` of `point`.
    pub fn find_node(&self, point: &Point3<f64>, tolerance: f64) -> Option<usize> {
        self.nodes
            .iter()
            .position(|node| (node - point).norm() <= tolerance)
    }

    pub fn is_required(&self, index: usize) -> bool {
        self.required_vertices.contains(&index)
    }

    /// Group by name, created empty on first use.
    pub fn group_mut(&mut self, name: &str) -> &mut Group {
        self.groups.entry(name.to_string()).or_default()
    }

    pub fn stats(&self) -> MeshStats {
        MeshStats {
            nodes: self.nodes.len(),
            edges: self.edges.len(),
            triangles: self.triangles.len(),
            quadrilaterals: self.quadrilaterals.len(),
            tetrahedra: self.tetrahedra.len(),
            hexahedra: self.hexahedra.len(),
            subdomains: self.subdomains.len(),
            required_vertices: self.required_vertices.len(),
            volume: self.total_volume(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn single_tetra() -> VolumeMesh {
        let mut mesh = VolumeMesh::new();
        mesh.nodes = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(0.0, 0.0, 1.0),
        ];
        mesh.tetrahedra.push(Tetrahedron::new([0, 1, 2, 3], 1));
        mesh
    }

    #[test]
    fn test_tetra_volume() {
        let mesh = single_tetra();
        assert_relative_eq!(mesh.tetra_volume(0), 1.0 / 6.0, epsilon = 1e-12);
        assert_relative_eq!(mesh.total_volume(), 1.0 / 6.0, epsilon = 1e-12);
    }

    #[test]
    fn test_find_node() {
        let mesh = single_tetra();
        assert_eq!(mesh.find_node(&Point3::new(1.0, 1e-9, 0.0), 1e-6), Some(1));
        assert_eq!(mesh.find_node(&Point3::new(2.0, 0.0, 0.0), 1e-6), None);
    }

    #[test]
    fn test_group_mut_creates_group() {
        let mut mesh = single_tetra();
        mesh.group_mut("corner").nodes.push(0);
        mesh.group_mut("corner").nodes.push(3);
        assert_eq!(mesh.groups["corner"].len(), 2);
        assert!(!mesh.groups["corner"].is_empty());
    }
}
