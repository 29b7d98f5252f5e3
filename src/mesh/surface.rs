// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Tetralink Team

//! Closed triangulated surface supplied by the host

use nalgebra::{Point3, Vector3};
use std::collections::HashMap;

use super::{BoundingBox, Triangle};

/// Triangulated boundary of the domain to fill.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SurfaceMesh {
    pub vertices: Vec<Point3<f64>>,
    pub triangles: Vec<Triangle>,
}

impl SurfaceMesh {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_vertex(&mut self, point: Point3<f64>) -> usize {
        self.vertices.push(point);
        self.vertices.len() - 1
    }

    pub fn add_triangle(&mut self, triangle: Triangle) {
        self.triangles.push(triangle);
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::from_points(&self.vertices)
    }

    /// Axis-aligned box between `min` and `max`, outward oriented, tagged `tag`.
    pub fn cuboid(min: Point3<f64>, max: Point3<f64>, tag: i32) -> Self {
        let positions = [
            Point3::new(min.x, min.y, min.z),
            Point3::new(max.x, min.y, min.z),
            Point3::new(max.x, max.y, min.z),
            Point3::new(min.x, max.y, min.z),
            Point3::new(min.x, min.y, max.z),
            Point3::new(max.x, min.y, max.z),
            Point3::new(max.x, max.y, max.z),
            Point3::new(min.x, max.y, max.z),
        ];

        // Two triangles per face, counter-clockwise seen from outside
        let faces = [
            [4, 5, 6],
            [4, 6, 7],
            [1, 0, 3],
            [1, 3, 2],
            [5, 1, 2],
            [5, 2, 6],
            [0, 4, 7],
            [0, 7, 3],
            [7, 6, 2],
            [7, 2, 3],
            [0, 1, 5],
            [0, 5, 4],
        ];

        Self {
            vertices: positions.to_vec(),
            triangles: faces.iter().map(|f| Triangle::new(*f, tag)).collect(),
        }
    }

    /// The unit cube `[0,1]^3`: 8 vertices, 12 triangles.
    pub fn unit_cube() -> Self {
        Self::cuboid(Point3::origin(), Point3::new(1.0, 1.0, 1.0), 1)
    }

    /// Append another surface, shifting its indices.
    pub fn merge(&mut self, other: &SurfaceMesh) {
        let offset = self.vertices.len();
        self.vertices.extend_from_slice(&other.vertices);
        self.triangles
            .extend(other.triangles.iter().map(|t| t.offset(offset)));
    }

    /// Reverse the orientation of every triangle.
    pub fn flipped(mut self) -> Self {
        for triangle in &mut self.triangles {
            triangle.nodes.swap(1, 2);
        }
        self
    }

    /// Every edge is shared by exactly two triangles with opposite orientation.
    pub fn is_closed(&self) -> bool {
        let mut half_edges: HashMap<(usize, usize), i32> = HashMap::new();
        for triangle in &self.triangles {
            let [a, b, c] = triangle.nodes;
            for (from, to) in [(a, b), (b, c), (c, a)] {
                *half_edges.entry((from, to)).or_insert(0) += 1;
            }
        }
        !self.triangles.is_empty()
            && half_edges
                .iter()
                .all(|(&(from, to), &count)| count == 1 && half_edges.get(&(to, from)) == Some(&1))
    }

    /// Signed enclosed volume (positive for outward orientation).
    pub fn enclosed_volume(&self) -> f64 {
        self.triangles
            .iter()
            .map(|t| {
                let a = self.vertices[t.nodes[0]].coords;
                let b = self.vertices[t.nodes[1]].coords;
                let c = self.vertices[t.nodes[2]].coords;
                a.dot(&b.cross(&c)) / 6.0
            })
            .sum()
    }

    /// Unit normal of a triangle, or zero for a degenerate one.
    pub fn triangle_normal(&self, index: usize) -> Vector3<f64> {
        let t = &self.triangles[index];
        let p0 = self.vertices[t.nodes[0]];
        let e1 = self.vertices[t.nodes[1]] - p0;
        let e2 = self.vertices[t.nodes[2]] - p0;
        e1.cross(&e2).try_normalize(f64::EPSILON).unwrap_or_else(Vector3::zeros)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_unit_cube_is_closed() {
        let cube = SurfaceMesh::unit_cube();
        assert_eq!(cube.vertex_count(), 8);
        assert_eq!(cube.triangle_count(), 12);
        assert!(cube.is_closed());
        assert_relative_eq!(cube.enclosed_volume(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_flipped_volume_is_negative() {
        let cube = SurfaceMesh::unit_cube().flipped();
        assert!(cube.is_closed());
        assert_relative_eq!(cube.enclosed_volume(), -1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_open_surface_detected() {
        let mut cube = SurfaceMesh::unit_cube();
        cube.triangles.pop();
        assert!(!cube.is_closed());
    }

    #[test]
    fn test_merge_with_cavity() {
        let mut outer = SurfaceMesh::cuboid(Point3::origin(), Point3::new(3.0, 3.0, 3.0), 1);
        let inner =
            SurfaceMesh::cuboid(Point3::new(1.0, 1.0, 1.0), Point3::new(2.0, 2.0, 2.0), 2).flipped();
        outer.merge(&inner);
        assert_eq!(outer.vertex_count(), 16);
        assert!(outer.is_closed());
        assert_relative_eq!(outer.enclosed_volume(), 26.0, epsilon = 1e-9);
    }

    #[test]
    fn test_triangle_normal_points_out() {
        let cube = SurfaceMesh::unit_cube();
        let n = cube.triangle_normal(0);
        assert_relative_eq!(n.z, 1.0, epsilon = 1e-12);
    }
}
