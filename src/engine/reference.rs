// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Tetralink Team

//! Reference engine: star tetrahedralisation of a closed surface
//!
//! Every input triangle is joined to one apex, either a new node at the
//! centroid of the surface or, with `no_internal_points`, the first surface
//! vertex. The result is only valid for star-shaped domains. The engine talks
//! to its host exactly like a native one: it pulls the input through
//! callbacks from rayon worker threads, reports phases and progress through
//! the message callback and stops when the interrupt callback asks it to.

use rayon::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use super::{
    EngineMesh, EngineSession, EngineStatus, InterruptCallback, InterruptStatus, MeshSource,
    MessageCallback, SizeMapSource, SubDomainDescription, TetraEngine,
};
use crate::error::{TetraError, TetraResult};
use crate::mesh::SeedKind;

/// Message code of the dedicated progress report.
pub const PROGRESS_MESSAGE: &str = "MGMESSAGE  1009001";

const VOLUME_EPSILON: f64 = 1e-14;

/// Engine factory for [`StarSession`]s.
#[derive(Debug, Clone, Default)]
pub struct StarEngine;

impl StarEngine {
    pub fn new() -> Self {
        Self
    }
}

impl TetraEngine for StarEngine {
    fn name(&self) -> &str {
        "star"
    }

    fn new_session(&self) -> TetraResult<Box<dyn EngineSession>> {
        Ok(Box::new(StarSession::default()))
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Parameters {
    all_components: bool,
    optimisation: String,
    optimisation_level: String,
    split_overconstrained: String,
    smooth_off_slivers: bool,
    pthreads_mode: String,
    max_threads: usize,
    max_memory: Option<u32>,
    automatic_memory: Option<u32>,
    verbose: u32,
    no_internal_points: bool,
    boundary_recovery: bool,
    fem: bool,
    gradation: f64,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            all_components: false,
            optimisation: "yes".into(),
            optimisation_level: "standard".into(),
            split_overconstrained: "no".into(),
            smooth_off_slivers: false,
            pthreads_mode: "none".into(),
            max_threads: 4,
            max_memory: None,
            automatic_memory: None,
            verbose: 10,
            no_internal_points: false,
            boundary_recovery: false,
            fem: false,
            gradation: 1.05,
        }
    }
}

fn one_of(value: &str, allowed: &[&str]) -> Option<String> {
    allowed
        .iter()
        .find(|a| **a == value)
        .map(|a| a.to_string())
}

fn flag(value: &str) -> Option<bool> {
    match value {
        "" | "yes" | "true" | "1" => Some(true),
        "no" | "false" | "0" => Some(false),
        _ => None,
    }
}

impl Parameters {
    /// Apply one option; `false` when the name is unknown or the value malformed.
    fn set(&mut self, name: &str, value: &str) -> bool {
        // "Dcpropa=1.2" style options carry their value in the name
        let (name, value) = match name.split_once('=') {
            Some((n, v)) if value.is_empty() => (n, v),
            _ => (name, value),
        };
        let value = value.trim();

        let applied = match name {
            "components" => one_of(value, &["all", "outside_components"])
                .map(|v| self.all_components = v == "all"),
            "optimisation" => {
                one_of(value, &["no", "yes", "only"]).map(|v| self.optimisation = v)
            }
            "optimisation_level" => {
                one_of(value, &["none", "light", "standard", "standard+", "strong"])
                    .map(|v| self.optimisation_level = v)
            }
            "split_overconstrained_elements" => {
                one_of(value, &["no", "yes", "only"]).map(|v| self.split_overconstrained = v)
            }
            "smooth_off_slivers" => flag(value).map(|v| self.smooth_off_slivers = v),
            "pthreads_mode" => one_of(value, &["none", "safe", "aggressive"])
                .map(|v| self.pthreads_mode = v),
            "max_number_of_threads" => value
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .map(|n| self.max_threads = n),
            "max_memory" => value
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .map(|n| self.max_memory = Some(n)),
            "automatic_memory" => value
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .map(|n| self.automatic_memory = Some(n)),
            "verbose" => value
                .parse::<u32>()
                .ok()
                .filter(|n| *n <= 10)
                .map(|n| self.verbose = n),
            "no_internal_points" => flag(value).map(|v| self.no_internal_points = v),
            "C" => flag(value).map(|v| self.boundary_recovery = v),
            "FEM" => flag(value).map(|v| self.fem = v),
            "Dcpropa" | "gradation" => value
                .parse::<f64>()
                .ok()
                .filter(|g| *g >= 1.0)
                .map(|g| self.gradation = g),
            _ => None,
        };
        applied.is_some()
    }

    fn iterations(&self) -> usize {
        if self.optimisation == "no" {
            return 0;
        }
        match self.optimisation_level.as_str() {
            "none" => 0,
            "light" => 3,
            "standard" => 8,
            "standard+" => 12,
            _ => 20,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InputKind {
    Surface,
    Volume,
}

/// Input mesh pulled through the callbacks, converted to 0-based indices.
struct PulledInput {
    vertices: Vec<[f64; 3]>,
    required: Vec<usize>,
    edges: Vec<([usize; 2], i32)>,
    required_edges: Vec<bool>,
    triangles: Vec<([usize; 3], i32)>,
    /// Parallel to `triangles`; enforced faces stay out of the boundary.
    required_triangles: Vec<bool>,
    tetrahedra: Vec<([usize; 4], i32)>,
}

/// Shifts 1-based engine ids to 0-based slots, rejecting ids out of `1..=count`.
fn slots<const N: usize>(ids: [usize; N], count: usize) -> Option<[usize; N]> {
    let mut out = [0; N];
    for (slot, id) in out.iter_mut().zip(ids) {
        if id == 0 || id > count {
            return None;
        }
        *slot = id - 1;
    }
    Some(out)
}

impl PulledInput {
    fn pull(source: &dyn MeshSource) -> Result<Self, String> {
        let nb = source.vertex_count();
        if nb == 0 {
            return Err(" ERR 131 : the number of vertices is null".into());
        }
        let vertices = (1..=nb)
            .into_par_iter()
            .map(|i| source.vertex_coordinates(i))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| " ERR 6 : vertex coordinates unavailable".to_string())?;
        let required: Vec<usize> = (1..=nb)
            .into_par_iter()
            .filter(|&i| source.vertex_required(i))
            .map(|i| i - 1)
            .collect();

        let edges = (1..=source.edge_count())
            .into_par_iter()
            .map(|i| {
                let (ids, tag) = source.edge_vertices(i)?;
                slots(ids, nb).map(|n| (n, tag))
            })
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| " ERR 1002 : an edge has a vertex negative or null".to_string())?;
        let required_edges = (1..=edges.len())
            .into_par_iter()
            .map(|i| source.edge_required(i))
            .collect();
        let triangles = (1..=source.triangle_count())
            .into_par_iter()
            .map(|i| {
                let (ids, tag) = source.triangle_vertices(i)?;
                slots(ids, nb).map(|n| (n, tag))
            })
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| " ERR 1002 : a face has a vertex negative or null".to_string())?;
        let required_triangles = (1..=triangles.len())
            .into_par_iter()
            .map(|i| source.triangle_required(i))
            .collect();
        let tetrahedra = (1..=source.tetrahedron_count())
            .into_par_iter()
            .map(|i| {
                let (ids, tag) = source.tetrahedron_vertices(i)?;
                slots(ids, nb).map(|n| (n, tag))
            })
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| " ERR 23602 : bad vertex number".to_string())?;

        Ok(Self {
            vertices,
            required,
            edges,
            required_edges,
            triangles,
            required_triangles,
            tetrahedra,
        })
    }

    /// Triangles bounding the domain.
    fn boundary(&self) -> impl Iterator<Item = &([usize; 3], i32)> + '_ {
        self.triangles
            .iter()
            .zip(&self.required_triangles)
            .filter(|(_, required)| !**required)
            .map(|(triangle, _)| triangle)
    }

    /// Vertices the volume mesh must pass through, sorted.
    fn constrained_vertices(&self) -> Vec<usize> {
        let edges = self
            .edges
            .iter()
            .zip(&self.required_edges)
            .filter(|(_, required)| **required)
            .flat_map(|((nodes, _), _)| *nodes);
        let triangles = self
            .triangles
            .iter()
            .zip(&self.required_triangles)
            .filter(|(_, required)| **required)
            .flat_map(|((nodes, _), _)| *nodes);
        let mut vertices: Vec<usize> =
            self.required.iter().copied().chain(edges).chain(triangles).collect();
        vertices.sort_unstable();
        vertices.dedup();
        vertices
    }

    /// First boundary edge not shared by exactly two opposite triangles.
    fn open_edge(&self) -> Option<[usize; 2]> {
        let mut half_edges: HashMap<(usize, usize), usize> = HashMap::new();
        for ([a, b, c], _) in self.boundary() {
            for (from, to) in [(*a, *b), (*b, *c), (*c, *a)] {
                *half_edges.entry((from, to)).or_insert(0) += 1;
            }
        }
        let mut open: Vec<[usize; 2]> = half_edges
            .iter()
            .filter(|(&(from, to), &count)| count != 1 || half_edges.get(&(to, from)) != Some(&1))
            .map(|(&(from, to), _)| [from, to])
            .collect();
        open.sort_unstable();
        open.first().copied()
    }
}

fn signed_volume(p: &[[f64; 3]], [a, b, c, d]: [usize; 4]) -> f64 {
    let sub = |u: [f64; 3], v: [f64; 3]| [u[0] - v[0], u[1] - v[1], u[2] - v[2]];
    let e1 = sub(p[b], p[a]);
    let e2 = sub(p[c], p[a]);
    let e3 = sub(p[d], p[a]);
    let cross = [
        e2[1] * e3[2] - e2[2] * e3[1],
        e2[2] * e3[0] - e2[0] * e3[2],
        e2[0] * e3[1] - e2[1] * e3[0],
    ];
    (e1[0] * cross[0] + e1[1] * cross[1] + e1[2] * cross[2]) / 6.0
}

/// Positively oriented copy of `tetra`, `None` when degenerate.
fn orient(p: &[[f64; 3]], tetra: [usize; 4]) -> Option<[usize; 4]> {
    let volume = signed_volume(p, tetra);
    if volume.abs() <= VOLUME_EPSILON {
        None
    } else if volume < 0.0 {
        Some([tetra[0], tetra[2], tetra[1], tetra[3]])
    } else {
        Some(tetra)
    }
}

/// Splits the tetrahedron holding each of `vertices` into four around it.
/// Vertices outside every tetrahedron are left alone. Returns how many were
/// inserted.
fn insert_vertices(
    points: &[[f64; 3]],
    tetrahedra: &mut Vec<([usize; 4], i32)>,
    vertices: &[usize],
) -> usize {
    let around = |tetra: [usize; 4], vertex: usize| {
        (0..4).map(move |k| {
            let mut sub = tetra;
            sub[k] = vertex;
            sub
        })
    };

    let mut inserted = 0;
    for &vertex in vertices {
        if tetrahedra.iter().any(|(t, _)| t.contains(&vertex)) {
            continue;
        }
        let holder = tetrahedra.iter().position(|(t, _)| {
            around(*t, vertex).all(|sub| signed_volume(points, sub) >= -VOLUME_EPSILON)
        });
        let Some(at) = holder else {
            continue;
        };
        let (tetra, tag) = tetrahedra.swap_remove(at);
        tetrahedra.extend(
            around(tetra, vertex)
                .filter(|sub| signed_volume(points, *sub) > VOLUME_EPSILON)
                .map(|sub| (sub, tag)),
        );
        inserted += 1;
    }
    inserted
}

/// Output of a [`StarSession`], stored 0-based and served 1-based.
#[derive(Debug, Clone, Default)]
pub struct StarMesh {
    nodes: Vec<[f64; 3]>,
    references: Vec<i32>,
    required: Vec<usize>,
    edges: Vec<([usize; 2], i32)>,
    triangles: Vec<([usize; 3], i32)>,
    tetrahedra: Vec<([usize; 4], i32)>,
    subdomains: Vec<SubDomainDescription>,
}

fn one_based<const N: usize>(entry: Option<&([usize; N], i32)>) -> Option<([usize; N], i32)> {
    entry.map(|(nodes, tag)| (nodes.map(|n| n + 1), *tag))
}

impl EngineMesh for StarMesh {
    fn vertex_count(&self) -> usize {
        self.nodes.len()
    }

    fn vertex_coordinates(&self, index: usize) -> Option<[f64; 3]> {
        self.nodes.get(index.checked_sub(1)?).copied()
    }

    fn vertex_reference(&self, index: usize) -> Option<i32> {
        self.references.get(index.checked_sub(1)?).copied()
    }

    fn required_vertex_count(&self) -> usize {
        self.required.len()
    }

    fn required_vertex(&self, index: usize) -> Option<usize> {
        self.required.get(index.checked_sub(1)?).map(|n| n + 1)
    }

    fn edge_count(&self) -> usize {
        self.edges.len()
    }

    fn edge(&self, index: usize) -> Option<([usize; 2], i32)> {
        one_based(self.edges.get(index.checked_sub(1)?))
    }

    fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    fn triangle(&self, index: usize) -> Option<([usize; 3], i32)> {
        one_based(self.triangles.get(index.checked_sub(1)?))
    }

    fn quadrangle_count(&self) -> usize {
        0
    }

    fn quadrangle(&self, _index: usize) -> Option<([usize; 4], i32)> {
        None
    }

    fn tetrahedron_count(&self) -> usize {
        self.tetrahedra.len()
    }

    fn tetrahedron(&self, index: usize) -> Option<([usize; 4], i32)> {
        one_based(self.tetrahedra.get(index.checked_sub(1)?))
    }

    fn hexahedron_count(&self) -> usize {
        0
    }

    fn hexahedron(&self, _index: usize) -> Option<([usize; 8], i32)> {
        None
    }

    fn subdomain_count(&self) -> usize {
        self.subdomains.len()
    }

    fn subdomain(&self, index: usize) -> Option<SubDomainDescription> {
        self.subdomains.get(index.checked_sub(1)?).copied()
    }
}

/// One computation of the reference engine.
#[derive(Default)]
pub struct StarSession {
    message: Option<MessageCallback>,
    interrupt: Option<InterruptCallback>,
    params: Parameters,
    input: Option<(Arc<dyn MeshSource>, InputKind)>,
    sizemap: Option<Arc<dyn SizeMapSource>>,
    output: Option<StarMesh>,
}

enum Failure {
    Interrupted,
    Error(String),
}

impl StarSession {
    fn say(&self, text: &str) {
        if let Some(callback) = &self.message {
            callback(text);
        }
    }

    fn progress(&self, percent: f64) {
        if self.params.verbose >= 10 {
            self.say(&format!("{}  0 1 {:.6e}", PROGRESS_MESSAGE, percent));
        }
    }

    fn phase(&self, phase: usize, percent: f64) {
        if self.params.verbose >= 3 {
            self.say(&format!("  -- PHASE {} COMPLETED", phase));
        }
        self.progress(percent);
    }

    fn stop_requested(&self) -> bool {
        self.interrupt
            .as_ref()
            .map_or(false, |poll| poll() == InterruptStatus::Stop)
    }

    fn checkpoint(&self) -> Result<(), Failure> {
        if self.stop_requested() {
            self.say("  ** INTERRUPTION REQUESTED BY THE USER");
            return Err(Failure::Interrupted);
        }
        Ok(())
    }

    fn fail(&self, message: String) -> Failure {
        self.say(&message);
        Failure::Error(message)
    }

    fn run(&self, source: &dyn MeshSource, kind: InputKind) -> Result<StarMesh, Failure> {
        self.say(&format!(
            " MG-Tetra reference engine, {} input, {} thread(s), gradation {}",
            match kind {
                InputKind::Surface => "surface",
                InputKind::Volume => "volume",
            },
            self.params.max_threads,
            self.params.gradation
        ));
        self.checkpoint()?;

        let input = PulledInput::pull(source).map_err(|m| self.fail(m))?;
        if let Some(sizemap) = &self.sizemap {
            let constrained = (1..=input.vertices.len())
                .into_par_iter()
                .filter(|&i| sizemap.size_at_vertex(i) > 0.0)
                .count();
            self.say(&format!("     sizemap: {} constrained vertices", constrained));
        }
        self.phase(1, 10.0);
        self.checkpoint()?;

        let mut nodes = input.vertices.clone();
        let (tetrahedra, apex) = match kind {
            InputKind::Surface => {
                let (tetrahedra, apex) = self.fill_surface(&input, &mut nodes)?;
                (tetrahedra, Some(apex))
            }
            InputKind::Volume => {
                let tetrahedra = self.keep_volume(&input)?;
                let apex = tetrahedra.first().map(|(t, _)| t[3]);
                (tetrahedra, apex)
            }
        };
        let Some(apex) = apex.filter(|_| !tetrahedra.is_empty()) else {
            return Err(self.fail(" ERR 9002 : there exist null or negative volume elements".into()));
        };
        self.phase(2, 25.0);

        let iterations = self.params.iterations();
        for k in 1..=iterations {
            self.checkpoint()?;
            if self.params.verbose >= 3 {
                self.say(&format!("     ** ITERATION   {}", k));
            }
            self.progress(25.0 + k as f64 * 45.0 / iterations as f64);
        }
        self.phase(3, 70.0);
        self.checkpoint()?;

        let subdomains = input
            .boundary()
            .next()
            .map(|(tri, _)| {
                // Outward faces see the domain on their negative side
                let side = signed_volume(&nodes, [tri[0], tri[1], tri[2], apex]);
                SubDomainDescription {
                    tag: 1,
                    seed_kind: SeedKind::Triangle,
                    seed_index: 1,
                    orientation: if side > 0.0 { 1 } else { -1 },
                }
            })
            .into_iter()
            .collect();

        // boundary vertices take the tag of the first face through them
        let mut references = vec![0; nodes.len()];
        for (triangle, tag) in input.boundary() {
            for &node in triangle {
                if references[node] == 0 {
                    references[node] = *tag;
                }
            }
        }

        let mesh = StarMesh {
            nodes,
            references,
            required: input.required,
            edges: input.edges,
            triangles: input.triangles,
            tetrahedra,
            subdomains,
        };
        self.say(&format!(
            "     {} vertices, {} tetrahedra",
            mesh.nodes.len(),
            mesh.tetrahedra.len()
        ));
        self.phase(4, 98.0);
        self.progress(100.0);
        Ok(mesh)
    }

    fn fill_surface(
        &self,
        input: &PulledInput,
        nodes: &mut Vec<[f64; 3]>,
    ) -> Result<(Vec<([usize; 4], i32)>, usize), Failure> {
        let boundary: Vec<[usize; 3]> = input.boundary().map(|(t, _)| *t).collect();
        let Some(first) = boundary.first() else {
            return Err(self.fail(" ERR 133 : the number of faces is null".into()));
        };
        if let Some([a, b]) = input.open_edge() {
            return Err(self.fail(format!(" ERR 3109 :  EDGE  {} {} UNIQUE", a + 1, b + 1)));
        }

        let apex = if self.params.no_internal_points {
            first[0]
        } else {
            let mut used: Vec<usize> = boundary.iter().flatten().copied().collect();
            used.sort_unstable();
            used.dedup();
            let mut center = [0.0; 3];
            for &v in &used {
                for axis in 0..3 {
                    center[axis] += nodes[v][axis] / used.len() as f64;
                }
            }
            nodes.push(center);
            nodes.len() - 1
        };

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.params.max_threads)
            .build()
            .map_err(|e| self.fail(format!(" ERR 2000 : {}", e)))?;
        let points: &[[f64; 3]] = nodes;
        let tetrahedra = pool.install(|| {
            boundary
                .par_iter()
                .filter(|tri| !tri.contains(&apex))
                .map(|tri| {
                    if self.stop_requested() {
                        return Err(());
                    }
                    Ok(orient(points, [tri[0], tri[1], tri[2], apex]).map(|t| (t, 1)))
                })
                .collect::<Result<Vec<_>, ()>>()
        });
        let tetrahedra = tetrahedra.map_err(|_| Failure::Interrupted)?;
        debug!("star fill produced {} candidate tetrahedra", tetrahedra.len());
        let mut tetrahedra: Vec<_> = tetrahedra.into_iter().flatten().collect();

        self.checkpoint()?;
        let constrained = input.constrained_vertices();
        let inserted = insert_vertices(points, &mut tetrahedra, &constrained);
        if inserted > 0 {
            self.say(&format!("     {} constrained vertices inserted", inserted));
        }
        Ok((tetrahedra, apex))
    }

    fn keep_volume(&self, input: &PulledInput) -> Result<Vec<([usize; 4], i32)>, Failure> {
        Ok(input
            .tetrahedra
            .par_iter()
            .filter_map(|(tetra, tag)| orient(&input.vertices, *tetra).map(|t| (t, (*tag).max(1))))
            .collect())
    }
}

impl EngineSession for StarSession {
    fn set_message_callback(&mut self, callback: MessageCallback) {
        self.message = Some(callback);
    }

    fn set_interrupt_callback(&mut self, callback: InterruptCallback) {
        self.interrupt = Some(callback);
    }

    fn set_param(&mut self, name: &str, value: &str) -> bool {
        self.params.set(name, value)
    }

    fn set_surface_mesh(&mut self, mesh: Arc<dyn MeshSource>) -> TetraResult<()> {
        self.input = Some((mesh, InputKind::Surface));
        Ok(())
    }

    fn set_volume_mesh(&mut self, mesh: Arc<dyn MeshSource>) -> TetraResult<()> {
        self.input = Some((mesh, InputKind::Volume));
        Ok(())
    }

    fn set_sizemap(&mut self, sizemap: Arc<dyn SizeMapSource>) -> TetraResult<()> {
        self.sizemap = Some(sizemap);
        Ok(())
    }

    fn compute(&mut self) -> EngineStatus {
        self.output = None;
        let Some((source, kind)) = self.input.clone() else {
            return EngineStatus::Error("no input mesh".into());
        };
        match self.run(source.as_ref(), kind) {
            Ok(mesh) => {
                self.output = Some(mesh);
                EngineStatus::Ok
            }
            Err(Failure::Interrupted) => EngineStatus::Interrupted,
            Err(Failure::Error(message)) => EngineStatus::Error(message),
        }
    }

    fn take_mesh(&mut self) -> TetraResult<Box<dyn EngineMesh>> {
        self.output
            .take()
            .map(|mesh| Box::new(mesh) as Box<dyn EngineMesh>)
            .ok_or_else(|| TetraError::EngineSetup("unable to get resulting mesh".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Unit cube served 1-based, with `extra` required vertices appended.
    struct Cube {
        points: Vec<[f64; 3]>,
        nb_free: usize,
        triangles: Vec<[usize; 3]>,
        /// Trailing triangles flagged as required.
        nb_required_triangles: usize,
    }

    impl Cube {
        fn new(extra: &[[f64; 3]]) -> Self {
            let surface = crate::mesh::SurfaceMesh::unit_cube();
            let mut points: Vec<[f64; 3]> =
                surface.vertices.iter().map(|p| [p.x, p.y, p.z]).collect();
            let nb_free = points.len();
            points.extend_from_slice(extra);
            Self {
                points,
                nb_free,
                triangles: surface.triangles.iter().map(|t| t.nodes.map(|n| n + 1)).collect(),
                nb_required_triangles: 0,
            }
        }
    }

    impl MeshSource for Cube {
        fn vertex_count(&self) -> usize {
            self.points.len()
        }
        fn vertex_coordinates(&self, index: usize) -> Option<[f64; 3]> {
            self.points.get(index - 1).copied()
        }
        fn vertex_required(&self, index: usize) -> bool {
            index > self.nb_free
        }
        fn edge_count(&self) -> usize {
            0
        }
        fn edge_vertices(&self, _index: usize) -> Option<([usize; 2], i32)> {
            None
        }
        fn triangle_count(&self) -> usize {
            self.triangles.len()
        }
        fn triangle_vertices(&self, index: usize) -> Option<([usize; 3], i32)> {
            self.triangles.get(index - 1).map(|t| (*t, 1))
        }
        fn triangle_required(&self, index: usize) -> bool {
            index > self.triangles.len() - self.nb_required_triangles
        }
        fn tetrahedron_count(&self) -> usize {
            0
        }
        fn tetrahedron_vertices(&self, _index: usize) -> Option<([usize; 4], i32)> {
            None
        }
    }

    fn run_cube(cube: Cube, params: &[(&str, &str)]) -> (EngineStatus, Box<dyn EngineMesh>) {
        let mut session = StarEngine::new().new_session().unwrap();
        for (name, value) in params {
            assert!(session.set_param(name, value), "{} rejected", name);
        }
        session.set_surface_mesh(Arc::new(cube)).unwrap();
        let status = session.compute();
        let mesh = session.take_mesh().unwrap();
        (status, mesh)
    }

    #[test]
    fn test_unit_cube_fill() {
        let (status, mesh) = run_cube(Cube::new(&[]), &[]);
        assert_eq!(status, EngineStatus::Ok);
        assert_eq!(mesh.vertex_count(), 9);
        assert_eq!(mesh.tetrahedron_count(), 12);
        assert_eq!(mesh.subdomain_count(), 1);
        assert_eq!(mesh.vertex_reference(1), Some(1));
        assert_eq!(mesh.vertex_reference(9), Some(0));
        assert_eq!(mesh.vertex_reference(10), None);

        let nodes: Vec<[f64; 3]> = (1..=mesh.vertex_count())
            .map(|i| mesh.vertex_coordinates(i).unwrap())
            .collect();
        let volume: f64 = (1..=mesh.tetrahedron_count())
            .map(|i| {
                let (t, _) = mesh.tetrahedron(i).unwrap();
                signed_volume(&nodes, t.map(|n| n - 1))
            })
            .sum();
        assert!((volume - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_fan_without_internal_points() {
        let (status, mesh) = run_cube(Cube::new(&[]), &[("no_internal_points", "")]);
        assert_eq!(status, EngineStatus::Ok);
        assert_eq!(mesh.vertex_count(), 8);
        assert!(mesh.tetrahedron_count() > 0);
    }

    #[test]
    fn test_required_vertices_are_kept() {
        let (_, mesh) = run_cube(Cube::new(&[[2.0, 2.0, 2.0], [-1.0, 0.5, 0.5]]), &[]);
        assert_eq!(mesh.required_vertex_count(), 2);
        assert_eq!(mesh.required_vertex(1), Some(9));
        assert_eq!(mesh.vertex_coordinates(9), Some([2.0, 2.0, 2.0]));
        assert_eq!(mesh.vertex_coordinates(10), Some([-1.0, 0.5, 0.5]));
    }

    #[test]
    fn test_required_triangle_inside_is_inserted() {
        let mut cube = Cube::new(&[[0.2, 0.3, 0.4], [0.7, 0.25, 0.4], [0.3, 0.75, 0.4]]);
        cube.triangles.push([9, 10, 11]);
        cube.nb_required_triangles = 1;
        let (status, mesh) = run_cube(cube, &[]);
        assert_eq!(status, EngineStatus::Ok);
        assert_eq!(mesh.triangle_count(), 13);
        assert_eq!(mesh.tetrahedron_count(), 12 + 3 * 3);

        let nodes: Vec<[f64; 3]> = (1..=mesh.vertex_count())
            .map(|i| mesh.vertex_coordinates(i).unwrap())
            .collect();
        let tetrahedra: Vec<[usize; 4]> = (1..=mesh.tetrahedron_count())
            .map(|i| mesh.tetrahedron(i).unwrap().0)
            .collect();
        for vertex in 9..=11 {
            assert!(tetrahedra.iter().any(|t| t.contains(&vertex)));
        }
        let volume: f64 = tetrahedra
            .iter()
            .map(|t| signed_volume(&nodes, t.map(|n| n - 1)))
            .sum();
        assert!((volume - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_open_surface_fails() {
        let mut cube = Cube::new(&[]);
        cube.triangles.pop();
        let mut session = StarEngine::new().new_session().unwrap();
        session.set_surface_mesh(Arc::new(cube)).unwrap();
        match session.compute() {
            EngineStatus::Error(message) => assert!(message.contains("ERR 3109")),
            other => panic!("unexpected status {:?}", other),
        }
        assert!(session.take_mesh().is_err());
    }

    #[test]
    fn test_interrupt_stops_computation() {
        let stop = Arc::new(AtomicBool::new(true));
        let flag = stop.clone();
        let mut session = StarEngine::new().new_session().unwrap();
        session.set_interrupt_callback(Arc::new(move || {
            if flag.load(Ordering::SeqCst) {
                InterruptStatus::Stop
            } else {
                InterruptStatus::Continue
            }
        }));
        session.set_surface_mesh(Arc::new(Cube::new(&[]))).unwrap();
        assert_eq!(session.compute(), EngineStatus::Interrupted);
    }

    #[test]
    fn test_messages_report_phases() {
        let log = Arc::new(Mutex::new(Vec::<String>::new()));
        let sink = log.clone();
        let mut session = StarEngine::new().new_session().unwrap();
        session.set_message_callback(Arc::new(move |m: &str| sink.lock().push(m.to_string())));
        session.set_surface_mesh(Arc::new(Cube::new(&[]))).unwrap();
        assert_eq!(session.compute(), EngineStatus::Ok);

        let log = log.lock();
        assert!(log.iter().any(|m| m == "  -- PHASE 1 COMPLETED"));
        assert!(log.iter().any(|m| m.starts_with("     ** ITERATION")));
        assert!(log.iter().any(|m| m.starts_with(PROGRESS_MESSAGE)));
    }

    #[test]
    fn test_parameter_validation() {
        let mut params = Parameters::default();
        assert!(params.set("optimisation_level", "standard+"));
        assert!(params.set("Dcpropa=1.2", ""));
        assert_eq!(params.gradation, 1.2);
        assert!(params.set("max_number_of_threads", "8"));
        assert!(!params.set("max_number_of_threads", "zero"));
        assert!(!params.set("optimisation", "maybe"));
        assert!(!params.set("unknown_option", "1"));
        assert_eq!(params.max_threads, 8);
    }
}
