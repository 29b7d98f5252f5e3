// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Tetralink Team

//! One computation from host surface to volume mesh
//!
//! [`Mesher`] turns a surface (or a volume to optimise) plus a [`Hypothesis`]
//! into an [`ExchangeMesh`], runs the selected execution strategy and puts
//! enforced entities carrying a group name into the resulting mesh's groups.

use nalgebra::Point3;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::engine::{default_engine, TetraEngine};
use crate::error::{TetraError, TetraResult};
use crate::hypothesis::{
    Algorithm, ElementKind, EntityResolver, Hypothesis, MeshElements, VertexLocation,
};
use crate::mesh::{Edge, ExchangeMesh, SurfaceMesh, Triangle, VolumeMesh};
use crate::session::ProgressChannel;
use crate::strategy::{select_strategy, strategy_kind, StrategyKind};

/// Enforced coordinates waiting for a group, collected while preparing the input.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupPlan {
    nodes: BTreeMap<String, Vec<Point3<f64>>>,
    edges: BTreeMap<String, Vec<[Point3<f64>; 2]>>,
    triangles: BTreeMap<String, Vec<[Point3<f64>; 3]>>,
}

impl GroupPlan {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty() && self.triangles.is_empty()
    }

    /// Names of every planned group.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .nodes
            .keys()
            .chain(self.edges.keys())
            .chain(self.triangles.keys())
            .map(String::as_str)
            .collect();
        names.sort_unstable();
        names.dedup();
        names
    }

    fn add_node(&mut self, group: &str, point: Point3<f64>) {
        self.nodes.entry(group.to_string()).or_default().push(point);
    }

    /// Fill the groups of `mesh` with the elements found at the planned coordinates.
    pub fn apply(&self, mesh: &mut VolumeMesh) {
        let tolerance = 1e-6 * mesh.bounding_box().diagonal().max(1.0);

        let mut found = HashMap::new();
        for (name, points) in &self.nodes {
            let nodes: Vec<usize> = points
                .iter()
                .filter_map(|p| mesh.find_node(p, tolerance))
                .collect();
            if nodes.len() < points.len() {
                warn!(
                    "group '{}': {} of {} enforced vertices not found in the result",
                    name,
                    points.len() - nodes.len(),
                    points.len()
                );
            }
            found.insert(name.clone(), nodes);
        }
        for (name, nodes) in found {
            let group = mesh.group_mut(&name);
            group.nodes.extend(nodes);
            group.nodes.sort_unstable();
            group.nodes.dedup();
        }

        let edge_index: HashMap<[usize; 2], usize> = mesh
            .edges
            .iter()
            .enumerate()
            .map(|(i, e)| (sorted(e.nodes), i))
            .collect();
        let mut found = HashMap::new();
        for (name, segments) in &self.edges {
            let edges: Vec<usize> = segments
                .iter()
                .filter_map(|[a, b]| {
                    let key = sorted([
                        mesh.find_node(a, tolerance)?,
                        mesh.find_node(b, tolerance)?,
                    ]);
                    edge_index.get(&key).copied()
                })
                .collect();
            found.insert(name.clone(), edges);
        }
        for (name, edges) in found {
            mesh.group_mut(&name).edges.extend(edges);
        }

        let triangle_index: HashMap<[usize; 3], usize> = mesh
            .triangles
            .iter()
            .enumerate()
            .map(|(i, t)| (sorted(t.nodes), i))
            .collect();
        let mut found = HashMap::new();
        for (name, faces) in &self.triangles {
            let triangles: Vec<usize> = faces
                .iter()
                .filter_map(|[a, b, c]| {
                    let key = sorted([
                        mesh.find_node(a, tolerance)?,
                        mesh.find_node(b, tolerance)?,
                        mesh.find_node(c, tolerance)?,
                    ]);
                    triangle_index.get(&key).copied()
                })
                .collect();
            found.insert(name.clone(), triangles);
        }
        for (name, triangles) in found {
            mesh.group_mut(&name).triangles.extend(triangles);
        }
    }
}

fn sorted<const N: usize>(mut nodes: [usize; N]) -> [usize; N] {
    nodes.sort_unstable();
    nodes
}

/// Name of the group holding the tetrahedra of sub-domain `tag`.
pub fn domain_group_name(tag: i32) -> String {
    format!("domain_{}", tag)
}

/// One group per tetrahedron tag.
pub fn make_groups_of_domains(mesh: &mut VolumeMesh) {
    let mut by_tag: BTreeMap<i32, Vec<usize>> = BTreeMap::new();
    for (i, tetra) in mesh.tetrahedra.iter().enumerate() {
        by_tag.entry(tetra.tag).or_default().push(i);
    }
    for (tag, tetrahedra) in by_tag {
        mesh.group_mut(&domain_group_name(tag)).tetrahedra = tetrahedra;
    }
}

/// Result of [`Mesher::mesh`] or [`Mesher::optimize`].
#[derive(Debug, Clone)]
pub struct MeshingReport {
    pub mesh: VolumeMesh,
    pub kind: StrategyKind,
    /// Raw engine output.
    pub log: String,
    /// Log file kept by the executable strategy.
    pub log_file: Option<PathBuf>,
    pub elapsed: Duration,
}

/// Runs computations with one hypothesis.
pub struct Mesher {
    hypothesis: Hypothesis,
    engine: Option<Arc<dyn TetraEngine>>,
    resolver: Option<Box<dyn EntityResolver>>,
    channel: ProgressChannel,
}

impl Mesher {
    /// A mesher using the built-in engine when there is one.
    pub fn new(hypothesis: Hypothesis) -> Self {
        Self {
            hypothesis,
            engine: default_engine(),
            resolver: None,
            channel: ProgressChannel::new(),
        }
    }

    /// Use `engine` in process, or the executable only when `None`.
    pub fn with_engine(mut self, engine: Option<Arc<dyn TetraEngine>>) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_resolver(mut self, resolver: Box<dyn EntityResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Share progress and cancellation with the caller.
    pub fn with_channel(mut self, channel: ProgressChannel) -> Self {
        self.channel = channel;
        self
    }

    pub fn channel(&self) -> &ProgressChannel {
        &self.channel
    }

    pub fn hypothesis(&self) -> &Hypothesis {
        &self.hypothesis
    }

    pub fn strategy_kind(&self) -> StrategyKind {
        strategy_kind(&self.hypothesis, self.engine.is_some())
    }

    /// Exchange mesh for `surface`: its vertices and triangles, then the
    /// enforced entities of the hypothesis as the required part.
    pub fn prepare(&self, surface: &SurfaceMesh) -> TetraResult<(ExchangeMesh, GroupPlan)> {
        let mut exchange = ExchangeMesh::from_surface(surface);
        let plan = self.append_enforced(&mut exchange)?;
        Ok((exchange, plan))
    }

    fn append_enforced(&self, exchange: &mut ExchangeMesh) -> TetraResult<GroupPlan> {
        let hyp = &self.hypothesis;
        let mut plan = GroupPlan::default();

        for vertex in &hyp.enforced_vertices {
            let points = match &vertex.location {
                VertexLocation::Coordinates { x, y, z } => vec![Point3::new(*x, *y, *z)],
                VertexLocation::Geometry { entry } => self
                    .resolver()?
                    .resolve_vertices(entry)
                    .ok_or_else(|| {
                        TetraError::Hypothesis(format!("cannot resolve enforced vertex '{}'", entry))
                    })?,
            };
            for point in points {
                exchange.push_required_vertex(point, vertex.size);
                if let Some(group) = &vertex.group {
                    plan.add_node(group, point);
                }
            }
        }

        // required edges and triangles reference their own required vertices
        let mut pending_edges = Vec::new();
        let mut pending_triangles = Vec::new();
        for enforced in &hyp.enforced_meshes {
            let elements = self
                .resolver()?
                .resolve_mesh(&enforced.entry, enforced.kind)
                .ok_or_else(|| {
                    TetraError::Hypothesis(format!(
                        "cannot resolve enforced mesh '{}'",
                        enforced.entry
                    ))
                })?;
            let MeshElements {
                nodes,
                edges,
                triangles,
            } = elements;

            let base = exchange.nb_vertices();
            let used = used_nodes(nodes.len(), enforced.kind, &edges, &triangles);
            let mut mapped = vec![None; nodes.len()];
            for (i, point) in nodes.iter().enumerate() {
                if used[i] {
                    mapped[i] = Some(exchange.push_required_vertex(*point, enforced.size));
                }
            }
            debug!(
                "enforced mesh '{}': {} vertices from index {}",
                enforced.entry,
                exchange.nb_vertices() - base,
                base
            );

            let lookup = |i: usize| {
                mapped.get(i).copied().flatten().ok_or_else(|| {
                    TetraError::BadInput(format!(
                        "enforced mesh '{}' references missing node {}",
                        enforced.entry, i
                    ))
                })
            };
            match enforced.kind {
                ElementKind::Node => {
                    if let Some(group) = &enforced.group {
                        for point in &nodes {
                            plan.add_node(group, *point);
                        }
                    }
                }
                ElementKind::Edge => {
                    for [a, b] in &edges {
                        pending_edges.push(Edge::untagged([lookup(*a)?, lookup(*b)?]));
                        if let Some(group) = &enforced.group {
                            plan.edges
                                .entry(group.clone())
                                .or_default()
                                .push([nodes[*a], nodes[*b]]);
                        }
                    }
                }
                ElementKind::Face => {
                    for [a, b, c] in &triangles {
                        pending_triangles
                            .push(Triangle::untagged([lookup(*a)?, lookup(*b)?, lookup(*c)?]));
                        if let Some(group) = &enforced.group {
                            plan.triangles
                                .entry(group.clone())
                                .or_default()
                                .push([nodes[*a], nodes[*b], nodes[*c]]);
                        }
                    }
                }
            }
        }
        for edge in pending_edges {
            exchange.push_required_edge(edge);
        }
        for triangle in pending_triangles {
            exchange.push_required_triangle(triangle);
        }
        Ok(plan)
    }

    fn resolver(&self) -> TetraResult<&dyn EntityResolver> {
        self.resolver.as_deref().ok_or_else(|| {
            TetraError::Hypothesis("geometry entries need an entity resolver".into())
        })
    }

    /// Fill the volume bounded by `surface`.
    pub fn mesh(&self, surface: &SurfaceMesh) -> TetraResult<MeshingReport> {
        if self.hypothesis.algorithm != Algorithm::Generator {
            return Err(TetraError::Hypothesis(
                "meshing a surface needs the generator algorithm".into(),
            ));
        }
        let (exchange, plan) = self.prepare(surface)?;
        info!(
            "meshing surface: {} vertices, {} triangles, {} required vertices",
            surface.vertex_count(),
            surface.triangle_count(),
            exchange.nb_required_vertices()
        );
        self.run(exchange, plan)
    }

    /// Improve the quality of an existing tetrahedral mesh.
    pub fn optimize(&self, volume: &VolumeMesh) -> TetraResult<MeshingReport> {
        if self.hypothesis.algorithm != Algorithm::Optimizer {
            return Err(TetraError::Hypothesis(
                "optimising a volume needs the optimizer algorithm".into(),
            ));
        }
        let mut exchange = ExchangeMesh::from_volume(volume);
        let plan = self.append_enforced(&mut exchange)?;
        info!(
            "optimising volume: {} nodes, {} tetrahedra",
            volume.node_count(),
            volume.tetra_count()
        );
        self.run(exchange, plan)
    }

    fn run(&self, exchange: ExchangeMesh, plan: GroupPlan) -> TetraResult<MeshingReport> {
        let started = Instant::now();
        let strategy = select_strategy(&self.hypothesis, self.engine.clone());
        let kind = strategy.kind();
        let outcome = strategy.run(Arc::new(exchange), &self.hypothesis, false, &self.channel)?;
        let log = outcome.log.clone();
        let log_file = outcome.log_file.clone().filter(|p| p.exists());
        let mut mesh = outcome.into_result()?;

        plan.apply(&mut mesh);
        if self.hypothesis.to_make_groups_of_domains {
            make_groups_of_domains(&mut mesh);
        }

        let elapsed = started.elapsed();
        info!(
            "{} nodes, {} tetrahedra in {:.2?}",
            mesh.node_count(),
            mesh.tetra_count(),
            elapsed
        );
        Ok(MeshingReport {
            mesh,
            kind,
            log,
            log_file,
            elapsed,
        })
    }
}

/// Which resolved nodes the engine receives for an enforced mesh of `kind`.
fn used_nodes(
    count: usize,
    kind: ElementKind,
    edges: &[[usize; 2]],
    triangles: &[[usize; 3]],
) -> Vec<bool> {
    let mut used = vec![kind == ElementKind::Node; count];
    let mut mark = |i: &usize| {
        if let Some(slot) = used.get_mut(*i) {
            *slot = true;
        }
    };
    match kind {
        ElementKind::Node => {}
        ElementKind::Edge => edges.iter().flatten().for_each(&mut mark),
        ElementKind::Face => triangles.iter().flatten().for_each(&mut mark),
    }
    used
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hypothesis::{EnforcedMesh, EnforcedVertex, MapResolver};

    fn hypothesis() -> Hypothesis {
        let mut hyp = Hypothesis::default();
        hyp.set_enforced_vertex(EnforcedVertex::at(0.5, 0.5, 0.25, 0.1).in_group("sensors"))
            .unwrap();
        hyp.set_enforced_vertex(EnforcedVertex::at(0.5, 0.5, 0.75, 0.0))
            .unwrap();
        hyp
    }

    #[test]
    fn test_prepare_appends_required_suffix() {
        let mesher = Mesher::new(hypothesis()).with_engine(None);
        let (exchange, plan) = mesher.prepare(&SurfaceMesh::unit_cube()).unwrap();
        assert_eq!(exchange.nb_free_vertices(), 8);
        assert_eq!(exchange.required_vertex_range(), 8..10);
        assert_eq!(exchange.size_at(8), 0.1);
        assert!(exchange.has_size_map());
        assert_eq!(plan.names(), vec!["sensors"]);
    }

    #[test]
    fn test_geometry_entry_needs_resolver() {
        let mut hyp = Hypothesis::default();
        hyp.set_enforced_vertex(EnforcedVertex::from_geometry("0:1:2", 0.0))
            .unwrap();
        let mesher = Mesher::new(hyp.clone()).with_engine(None);
        let err = mesher.prepare(&SurfaceMesh::unit_cube()).unwrap_err();
        assert!(matches!(err, TetraError::Hypothesis(_)));

        let mut resolver = MapResolver::default();
        resolver.insert_vertices(
            "0:1:2",
            vec![Point3::new(0.2, 0.2, 0.2), Point3::new(0.8, 0.8, 0.8)],
        );
        let mesher = Mesher::new(hyp)
            .with_engine(None)
            .with_resolver(Box::new(resolver));
        let (exchange, _) = mesher.prepare(&SurfaceMesh::unit_cube()).unwrap();
        assert_eq!(exchange.nb_required_vertices(), 2);
    }

    #[test]
    fn test_enforced_edges_use_own_vertices() {
        let mut hyp = Hypothesis::default();
        hyp.add_enforced_mesh(EnforcedMesh::new("wire", ElementKind::Edge).in_group("wire"));
        let mut resolver = MapResolver::default();
        resolver.insert_mesh(
            "wire",
            MeshElements {
                nodes: vec![
                    Point3::new(0.2, 0.5, 0.5),
                    Point3::new(0.5, 0.5, 0.5),
                    Point3::new(0.8, 0.5, 0.5),
                    Point3::new(9.0, 9.0, 9.0),
                ],
                edges: vec![[0, 1], [1, 2]],
                triangles: Vec::new(),
            },
        );
        let mesher = Mesher::new(hyp)
            .with_engine(None)
            .with_resolver(Box::new(resolver));
        let (exchange, plan) = mesher.prepare(&SurfaceMesh::unit_cube()).unwrap();
        // the unused node is not sent
        assert_eq!(exchange.nb_required_vertices(), 3);
        assert_eq!(exchange.required_edge_range(), 0..2);
        assert_eq!(exchange.edges()[0].nodes, [8, 9]);
        assert_eq!(plan.names(), vec!["wire"]);
    }

    #[test]
    fn test_wrong_algorithm() {
        let mesher = Mesher::new(Hypothesis::optimizer()).with_engine(None);
        assert!(matches!(
            mesher.mesh(&SurfaceMesh::unit_cube()),
            Err(TetraError::Hypothesis(_))
        ));
    }

    #[test]
    fn test_groups_of_domains() {
        let mut mesh = VolumeMesh::new();
        mesh.nodes = vec![Point3::origin(); 4];
        mesh.tetrahedra = vec![
            crate::mesh::Tetrahedron::new([0, 1, 2, 3], 1),
            crate::mesh::Tetrahedron::new([0, 1, 2, 3], 2),
            crate::mesh::Tetrahedron::new([0, 1, 2, 3], 1),
        ];
        make_groups_of_domains(&mut mesh);
        assert_eq!(mesh.groups["domain_1"].tetrahedra, vec![0, 2]);
        assert_eq!(mesh.groups["domain_2"].tetrahedra, vec![1]);
    }

    #[cfg(feature = "reference-engine")]
    #[test]
    fn test_mesh_keeps_enforced_vertices_in_groups() {
        let mut hyp = hypothesis();
        hyp.to_make_groups_of_domains = true;
        let report = Mesher::new(hyp).mesh(&SurfaceMesh::unit_cube()).unwrap();
        assert_eq!(report.kind, StrategyKind::Library);
        let mesh = &report.mesh;
        let sensor = mesh.find_node(&Point3::new(0.5, 0.5, 0.25), 1e-9).unwrap();
        assert!(mesh.is_required(sensor));
        assert_eq!(mesh.groups["sensors"].nodes, vec![sensor]);
        assert!(mesh.groups.contains_key("domain_1"));
        assert!((mesh.total_volume() - 1.0).abs() < 1e-9);
    }
}
