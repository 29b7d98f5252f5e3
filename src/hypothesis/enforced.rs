// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Tetralink Team

//! Enforced vertices and enforced mesh elements

use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Where an enforced vertex comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "by", rename_all = "snake_case")]
pub enum VertexLocation {
    Coordinates { x: f64, y: f64, z: f64 },
    /// Host geometry entry: a vertex, or a compound of vertices.
    Geometry { entry: String },
}

/// A point the engine must keep, with its target size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnforcedVertex {
    pub location: VertexLocation,
    /// Target element size around the vertex; 0 for none.
    #[serde(default)]
    pub size: f64,
    /// Group receiving the resulting node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

impl EnforcedVertex {
    pub fn at(x: f64, y: f64, z: f64, size: f64) -> Self {
        Self {
            location: VertexLocation::Coordinates { x, y, z },
            size,
            group: None,
        }
    }

    pub fn from_geometry(entry: impl Into<String>, size: f64) -> Self {
        Self {
            location: VertexLocation::Geometry {
                entry: entry.into(),
            },
            size,
            group: None,
        }
    }

    pub fn in_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }
}

/// Which elements of an enforced mesh are used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    Node,
    Edge,
    Face,
}

/// Elements of another host mesh the engine must keep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnforcedMesh {
    pub entry: String,
    pub kind: ElementKind,
    #[serde(default)]
    pub size: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

impl EnforcedMesh {
    pub fn new(entry: impl Into<String>, kind: ElementKind) -> Self {
        Self {
            entry: entry.into(),
            kind,
            size: 0.0,
            group: None,
        }
    }

    pub fn in_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }
}

/// Elements resolved from a host mesh; connectivity indexes `nodes`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshElements {
    pub nodes: Vec<Point3<f64>>,
    pub edges: Vec<[usize; 2]>,
    pub triangles: Vec<[usize; 3]>,
}

/// Host lookup of geometry and mesh entries.
pub trait EntityResolver {
    /// Points of a geometry vertex or vertex compound.
    fn resolve_vertices(&self, entry: &str) -> Option<Vec<Point3<f64>>>;

    /// Elements of a host mesh, restricted to `kind`.
    fn resolve_mesh(&self, entry: &str, kind: ElementKind) -> Option<MeshElements>;
}

/// Resolver over entries registered up front.
#[derive(Debug, Clone, Default)]
pub struct MapResolver {
    vertices: HashMap<String, Vec<Point3<f64>>>,
    meshes: HashMap<String, MeshElements>,
}

impl MapResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_vertices(&mut self, entry: impl Into<String>, points: Vec<Point3<f64>>) {
        self.vertices.insert(entry.into(), points);
    }

    pub fn insert_mesh(&mut self, entry: impl Into<String>, elements: MeshElements) {
        self.meshes.insert(entry.into(), elements);
    }
}

impl EntityResolver for MapResolver {
    fn resolve_vertices(&self, entry: &str) -> Option<Vec<Point3<f64>>> {
        self.vertices.get(entry).cloned()
    }

    fn resolve_mesh(&self, entry: &str, kind: ElementKind) -> Option<MeshElements> {
        let mesh = self.meshes.get(entry)?;
        Some(match kind {
            ElementKind::Node => MeshElements {
                nodes: mesh.nodes.clone(),
                ..MeshElements::default()
            },
            ElementKind::Edge => MeshElements {
                nodes: mesh.nodes.clone(),
                edges: mesh.edges.clone(),
                triangles: Vec::new(),
            },
            ElementKind::Face => MeshElements {
                nodes: mesh.nodes.clone(),
                edges: Vec::new(),
                triangles: mesh.triangles.clone(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolver_filters_by_kind() {
        let mut resolver = MapResolver::new();
        resolver.insert_mesh(
            "0:1:2",
            MeshElements {
                nodes: vec![Point3::origin(), Point3::new(1.0, 0.0, 0.0), Point3::new(0.0, 1.0, 0.0)],
                edges: vec![[0, 1]],
                triangles: vec![[0, 1, 2]],
            },
        );
        let edges = resolver.resolve_mesh("0:1:2", ElementKind::Edge).unwrap();
        assert_eq!(edges.edges.len(), 1);
        assert!(edges.triangles.is_empty());
        let nodes = resolver.resolve_mesh("0:1:2", ElementKind::Node).unwrap();
        assert_eq!(nodes.nodes.len(), 3);
        assert!(nodes.edges.is_empty());
        assert!(resolver.resolve_mesh("missing", ElementKind::Face).is_none());
    }

    #[test]
    fn test_vertex_builders() {
        let v = EnforcedVertex::at(1.0, 2.0, 3.0, 0.5).in_group("corners");
        assert_eq!(v.group.as_deref(), Some("corners"));
        assert!(matches!(v.location, VertexLocation::Coordinates { z, .. } if z == 3.0));
    }
}
