// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Tetralink Team

//! In-process exchange session with an engine
//!
//! A [`Session`] drives one computation:
//!
//! ```text
//! Created -> Initialized -> InputBound -> Computing -> Succeeded | Failed | Cancelled
//! ```
//!
//! The engine pulls the input through an [`InputAdapter`] and talks back
//! through two callbacks: messages go to the [`DiagnosticLog`] and the
//! [`ProgressTracker`], interrupt polls read the [`ProgressChannel`] cancel
//! flag. After success the output mesh is read back 0-based, either with the
//! `read_*` accessors or through [`RecordSource`].

mod adapter;
mod channel;
mod log;
mod progress;

pub use adapter::{InputAdapter, VertexSizes};
pub use channel::ProgressChannel;
pub use log::DiagnosticLog;
pub use progress::{
    MgMessageParser, Milestone, MilestoneParser, ProgressTracker, MAX_ITERATIONS,
    OPTIMISATION_END, OPTIMISATION_START,
};

use nalgebra::Point3;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::engine::{
    EngineMesh, EngineSession, EngineStatus, InterruptStatus, SizeMapSource, TetraEngine,
};
use crate::error::{FormatError, TetraError, TetraResult};
use crate::io::{from_one_based, Keyword, Record, RecordSource};
use crate::mesh::{Element, ExchangeMesh, SubDomain};

/// Lifecycle of a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Created,
    Initialized,
    InputBound,
    Computing,
    Succeeded,
    Failed,
    Cancelled,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Outcome of [`Session::compute`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComputeStatus {
    Succeeded,
    /// Engine failure, with the accumulated diagnostic text.
    Failed(String),
    Cancelled,
}

/// One computation with an in-process engine.
pub struct Session {
    state: SessionState,
    // Released in field order: most dependent first
    output: Option<Box<dyn EngineMesh>>,
    engine: Option<Box<dyn EngineSession>>,
    input: Option<Arc<InputAdapter>>,
    sizemap: Option<Arc<dyn SizeMapSource>>,
    channel: ProgressChannel,
    tracker: Arc<ProgressTracker>,
    log: DiagnosticLog,
    echo: bool,
    cursor: Option<(Keyword, usize)>,
}

impl Session {
    /// A session with no engine attached yet.
    pub fn new(channel: ProgressChannel) -> Self {
        Self {
            state: SessionState::Created,
            output: None,
            engine: None,
            input: None,
            sizemap: None,
            tracker: Arc::new(ProgressTracker::new(channel.clone())),
            channel,
            log: DiagnosticLog::new(),
            echo: false,
            cursor: None,
        }
    }

    /// Create the engine session and install the message and interrupt callbacks.
    pub fn initialize(engine: &dyn TetraEngine, channel: ProgressChannel) -> TetraResult<Self> {
        let mut session = Self::new(channel);
        session.attach(engine)?;
        Ok(session)
    }

    /// Replace the milestone parser; only valid before the engine is attached.
    pub fn with_tracker(mut self, tracker: ProgressTracker) -> TetraResult<Self> {
        self.expect_state("with_tracker", &[SessionState::Created])?;
        self.channel = tracker.channel().clone();
        self.tracker = Arc::new(tracker);
        Ok(self)
    }

    /// Also print every engine message on stdout.
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    /// Attach `engine` to a session in the `Created` state.
    pub fn attach(&mut self, engine: &dyn TetraEngine) -> TetraResult<()> {
        self.expect_state("initialize", &[SessionState::Created])?;

        let mut engine_session = engine.new_session().map_err(|e| match e {
            TetraError::EngineSetup(_) => e,
            other => TetraError::EngineSetup(other.to_string()),
        })?;

        let log = self.log.clone();
        let tracker = Arc::clone(&self.tracker);
        let echo = self.echo;
        engine_session.set_message_callback(Arc::new(move |message: &str| {
            if echo {
                println!("{}", message);
            }
            log.append(message);
            tracker.observe(message);
        }));

        let channel = self.channel.clone();
        engine_session.set_interrupt_callback(Arc::new(move || {
            if channel.is_cancelled() {
                InterruptStatus::Stop
            } else {
                InterruptStatus::Continue
            }
        }));

        debug!("engine session created by '{}'", engine.name());
        self.engine = Some(engine_session);
        self.state = SessionState::Initialized;
        Ok(())
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn channel(&self) -> &ProgressChannel {
        &self.channel
    }

    pub fn progress(&self) -> f64 {
        self.channel.progress()
    }

    /// Everything the engine reported so far.
    pub fn log(&self) -> String {
        self.log.contents()
    }

    fn expect_state(&self, operation: &'static str, allowed: &[SessionState]) -> TetraResult<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(TetraError::InvalidState {
                operation,
                state: self.state.to_string(),
            })
        }
    }

    fn engine_mut(&mut self, operation: &'static str) -> TetraResult<&mut Box<dyn EngineSession>> {
        let state = self.state;
        self.engine.as_mut().ok_or_else(|| TetraError::InvalidState {
            operation,
            state: state.to_string(),
        })
    }

    fn bind(&mut self, mesh: Arc<ExchangeMesh>, volume: bool) -> TetraResult<()> {
        let operation = if volume {
            "bind_input_volume"
        } else {
            "bind_input_surface"
        };
        self.expect_state(operation, &[SessionState::Initialized])?;
        mesh.validate()?;

        let adapter = Arc::new(InputAdapter::new(mesh));
        let engine = self.engine_mut(operation)?;
        if volume {
            engine.set_volume_mesh(adapter.clone())?;
        } else {
            engine.set_surface_mesh(adapter.clone())?;
        }
        debug!(
            "bound {} input: {} vertices ({} required), {} triangles, {} tetrahedra",
            if volume { "volume" } else { "surface" },
            adapter.mesh().nb_vertices(),
            adapter.mesh().nb_required_vertices(),
            adapter.mesh().triangles().len(),
            adapter.mesh().tetrahedra().len()
        );
        self.input = Some(adapter);
        self.state = SessionState::InputBound;
        Ok(())
    }

    /// Hand a closed surface to fill.
    pub fn bind_input_surface(&mut self, mesh: Arc<ExchangeMesh>) -> TetraResult<()> {
        self.bind(mesh, false)
    }

    /// Hand an existing volume mesh to modify.
    pub fn bind_input_volume(&mut self, mesh: Arc<ExchangeMesh>) -> TetraResult<()> {
        self.bind(mesh, true)
    }

    /// Attach explicit per-vertex sizes (0-based, one per input vertex).
    pub fn bind_size_map(&mut self, sizes: Vec<f64>) -> TetraResult<()> {
        self.expect_state("bind_size_map", &[SessionState::InputBound])?;
        let expected = self.input.as_ref().map_or(0, |i| i.mesh().nb_vertices());
        if sizes.len() != expected {
            return Err(TetraError::BadInput(format!(
                "size map has {} values for {} vertices",
                sizes.len(),
                expected
            )));
        }
        let sizemap: Arc<dyn SizeMapSource> = Arc::new(VertexSizes::new(sizes));
        self.engine_mut("bind_size_map")?
            .set_sizemap(sizemap.clone())?;
        self.sizemap = Some(sizemap);
        Ok(())
    }

    /// Forward one option; `false` when the engine refuses it.
    pub fn set_parameter(&mut self, name: &str, value: &str) -> bool {
        let Some(engine) = self.engine.as_mut() else {
            warn!("parameter '{}' set without an engine session", name);
            return false;
        };
        let accepted = engine.set_param(name, value);
        if accepted {
            debug!("engine parameter {} = '{}'", name, value);
        } else {
            warn!("engine rejected parameter '{}' = '{}'", name, value);
        }
        accepted
    }

    /// Run the engine. Blocks until it returns.
    pub fn compute(&mut self) -> TetraResult<ComputeStatus> {
        self.expect_state("compute", &[SessionState::InputBound])?;

        // Required-vertex sizes act as the size map unless one was bound
        if self.sizemap.is_none() {
            if let Some(adapter) = self.input.clone() {
                if adapter.mesh().has_size_map() {
                    let sizemap: Arc<dyn SizeMapSource> = adapter;
                    self.engine_mut("compute")?.set_sizemap(sizemap.clone())?;
                    self.sizemap = Some(sizemap);
                }
            }
        }

        self.state = SessionState::Computing;
        info!("engine computation started");
        let status = self.engine_mut("compute")?.compute();

        let outcome = match status {
            EngineStatus::Interrupted => ComputeStatus::Cancelled,
            _ if self.channel.is_cancelled() => ComputeStatus::Cancelled,
            EngineStatus::Error(message) => {
                if !self.log.contents().contains(message.as_str()) {
                    self.log.append(&message);
                }
                ComputeStatus::Failed(self.log.contents())
            }
            EngineStatus::Ok => match self.engine_mut("compute")?.take_mesh() {
                Ok(mesh) => {
                    self.output = Some(mesh);
                    ComputeStatus::Succeeded
                }
                Err(e) => {
                    self.log.append(&e.to_string());
                    ComputeStatus::Failed(self.log.contents())
                }
            },
        };

        self.state = match outcome {
            ComputeStatus::Succeeded => SessionState::Succeeded,
            ComputeStatus::Failed(_) => SessionState::Failed,
            ComputeStatus::Cancelled => SessionState::Cancelled,
        };
        info!("engine computation finished: {}", self.state);

        // Only the output mesh outlives a terminal state
        self.release_engine();
        Ok(outcome)
    }

    fn release_engine(&mut self) {
        self.engine = None;
        self.input = None;
        self.sizemap = None;
    }

    /// Drop every engine handle, output mesh first.
    pub fn release(&mut self) {
        self.cursor = None;
        self.output = None;
        self.release_engine();
    }

    fn output(&self, operation: &'static str) -> TetraResult<&dyn EngineMesh> {
        match (&self.output, self.state) {
            (Some(mesh), SessionState::Succeeded) => Ok(mesh.as_ref()),
            _ => Err(TetraError::InvalidState {
                operation,
                state: self.state.to_string(),
            }),
        }
    }

    fn missing(keyword: Keyword, count: usize, index: usize) -> TetraError {
        FormatError::CountExceeded {
            keyword,
            count,
            index,
        }
        .into()
    }

    fn element<const N: usize>(
        keyword: Keyword,
        entry: Option<([usize; N], i32)>,
        count: usize,
        index: usize,
    ) -> TetraResult<Element<N>> {
        let (ids, tag) = entry.ok_or_else(|| Self::missing(keyword, count, index))?;
        let mut nodes = [0; N];
        for (node, id) in nodes.iter_mut().zip(ids) {
            *node = from_one_based(id).ok_or(FormatError::BadIndex {
                keyword,
                position: index as u64,
                value: id as i64,
            })?;
        }
        Ok(Element::new(nodes, tag))
    }

    pub fn read_node_count(&self) -> TetraResult<usize> {
        Ok(self.output("read_node_count")?.vertex_count())
    }

    pub fn read_node(&self, index: usize) -> TetraResult<Point3<f64>> {
        let mesh = self.output("read_node")?;
        mesh.vertex_coordinates(index + 1)
            .map(Point3::from)
            .ok_or_else(|| Self::missing(Keyword::Vertices, mesh.vertex_count(), index))
    }

    pub fn read_node_tag(&self, index: usize) -> TetraResult<i32> {
        let mesh = self.output("read_node_tag")?;
        mesh.vertex_reference(index + 1)
            .ok_or_else(|| Self::missing(Keyword::Vertices, mesh.vertex_count(), index))
    }

    pub fn read_required_vertex_count(&self) -> TetraResult<usize> {
        Ok(self.output("read_required_vertex_count")?.required_vertex_count())
    }

    /// 0-based node index of the `index`-th required vertex.
    pub fn read_required_vertex(&self, index: usize) -> TetraResult<usize> {
        let mesh = self.output("read_required_vertex")?;
        let count = mesh.required_vertex_count();
        let id = mesh
            .required_vertex(index + 1)
            .ok_or_else(|| Self::missing(Keyword::RequiredVertices, count, index))?;
        from_one_based(id).ok_or_else(|| {
            FormatError::BadIndex {
                keyword: Keyword::RequiredVertices,
                position: index as u64,
                value: 0,
            }
            .into()
        })
    }

    pub fn read_edge_count(&self) -> TetraResult<usize> {
        Ok(self.output("read_edge_count")?.edge_count())
    }

    pub fn read_edge(&self, index: usize) -> TetraResult<Element<2>> {
        let mesh = self.output("read_edge")?;
        Self::element(Keyword::Edges, mesh.edge(index + 1), mesh.edge_count(), index)
    }

    pub fn read_triangle_count(&self) -> TetraResult<usize> {
        Ok(self.output("read_triangle_count")?.triangle_count())
    }

    pub fn read_triangle(&self, index: usize) -> TetraResult<Element<3>> {
        let mesh = self.output("read_triangle")?;
        Self::element(
            Keyword::Triangles,
            mesh.triangle(index + 1),
            mesh.triangle_count(),
            index,
        )
    }

    pub fn read_quad_count(&self) -> TetraResult<usize> {
        Ok(self.output("read_quad_count")?.quadrangle_count())
    }

    pub fn read_quad(&self, index: usize) -> TetraResult<Element<4>> {
        let mesh = self.output("read_quad")?;
        Self::element(
            Keyword::Quadrilaterals,
            mesh.quadrangle(index + 1),
            mesh.quadrangle_count(),
            index,
        )
    }

    pub fn read_tetra_count(&self) -> TetraResult<usize> {
        Ok(self.output("read_tetra_count")?.tetrahedron_count())
    }

    pub fn read_tetra(&self, index: usize) -> TetraResult<Element<4>> {
        let mesh = self.output("read_tetra")?;
        Self::element(
            Keyword::Tetrahedra,
            mesh.tetrahedron(index + 1),
            mesh.tetrahedron_count(),
            index,
        )
    }

    pub fn read_hexa_count(&self) -> TetraResult<usize> {
        Ok(self.output("read_hexa_count")?.hexahedron_count())
    }

    pub fn read_hexa(&self, index: usize) -> TetraResult<Element<8>> {
        let mesh = self.output("read_hexa")?;
        Self::element(
            Keyword::Hexahedra,
            mesh.hexahedron(index + 1),
            mesh.hexahedron_count(),
            index,
        )
    }

    pub fn read_subdomain_count(&self) -> TetraResult<usize> {
        Ok(self.output("read_subdomain_count")?.subdomain_count())
    }

    pub fn read_subdomain(&self, index: usize) -> TetraResult<SubDomain> {
        let mesh = self.output("read_subdomain")?;
        let count = mesh.subdomain_count();
        let description = mesh
            .subdomain(index + 1)
            .ok_or_else(|| Self::missing(Keyword::SubDomainFromGeom, count, index))?;
        let seed_index = from_one_based(description.seed_index).ok_or(FormatError::BadIndex {
            keyword: Keyword::SubDomainFromGeom,
            position: index as u64,
            value: description.seed_index as i64,
        })?;
        Ok(SubDomain::new(
            description.tag,
            description.seed_kind,
            seed_index,
            description.orientation,
        ))
    }
}

impl RecordSource for Session {
    fn stat_block(&self, keyword: Keyword) -> TetraResult<usize> {
        match keyword {
            Keyword::Vertices => self.read_node_count(),
            Keyword::RequiredVertices => self.read_required_vertex_count(),
            Keyword::Edges => self.read_edge_count(),
            Keyword::Triangles => self.read_triangle_count(),
            Keyword::Quadrilaterals => self.read_quad_count(),
            Keyword::Tetrahedra => self.read_tetra_count(),
            Keyword::Hexahedra => self.read_hexa_count(),
            Keyword::SubDomainFromGeom => self.read_subdomain_count(),
            _ => {
                self.output("stat_block")?;
                Ok(0)
            }
        }
    }

    fn seek_block(&mut self, keyword: Keyword) -> TetraResult<()> {
        self.output("seek_block")?;
        self.cursor = Some((keyword, 0));
        Ok(())
    }

    fn read_record(&mut self, keyword: Keyword) -> TetraResult<Record> {
        let index = match self.cursor {
            Some((current, index)) if current == keyword => index,
            _ => return Err(FormatError::NotPositioned { keyword }.into()),
        };
        let element = |e: Vec<usize>, tag: i32| Record::Element { nodes: e, tag };
        let record = match keyword {
            Keyword::Vertices => {
                let p = self.read_node(index)?;
                Record::vertex(p.x, p.y, p.z, self.read_node_tag(index)?)
            }
            Keyword::RequiredVertices => Record::Index(self.read_required_vertex(index)?),
            Keyword::Edges => {
                let e = self.read_edge(index)?;
                element(e.nodes.to_vec(), e.tag)
            }
            Keyword::Triangles => {
                let e = self.read_triangle(index)?;
                element(e.nodes.to_vec(), e.tag)
            }
            Keyword::Quadrilaterals => {
                let e = self.read_quad(index)?;
                element(e.nodes.to_vec(), e.tag)
            }
            Keyword::Tetrahedra => {
                let e = self.read_tetra(index)?;
                element(e.nodes.to_vec(), e.tag)
            }
            Keyword::Hexahedra => {
                let e = self.read_hexa(index)?;
                element(e.nodes.to_vec(), e.tag)
            }
            Keyword::SubDomainFromGeom => Record::SubDomain(self.read_subdomain(index)?),
            _ => return Err(Self::missing(keyword, 0, index)),
        };
        self.cursor = Some((keyword, index + 1));
        Ok(record)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(all(test, feature = "reference-engine"))]
mod tests {
    use super::*;
    use crate::engine::StarEngine;
    use crate::io::load_volume_mesh;
    use crate::mesh::SurfaceMesh;

    fn cube_input() -> Arc<ExchangeMesh> {
        let surface = SurfaceMesh::unit_cube();
        let mut mesh = ExchangeMesh::new();
        for p in &surface.vertices {
            mesh.push_vertex(*p).unwrap();
        }
        for t in &surface.triangles {
            mesh.push_triangle(*t).unwrap();
        }
        Arc::new(mesh)
    }

    #[test]
    fn test_surface_session_lifecycle() {
        let mut session = Session::initialize(&StarEngine::new(), ProgressChannel::new()).unwrap();
        assert_eq!(session.state(), SessionState::Initialized);
        session.bind_input_surface(cube_input()).unwrap();
        assert!(session.set_parameter("verbose", "10"));
        assert!(!session.set_parameter("no_such_option", "1"));

        assert_eq!(session.compute().unwrap(), ComputeStatus::Succeeded);
        assert!(session.read_node_count().unwrap() >= 8);
        assert!(session.read_tetra_count().unwrap() > 0);
        let tetra = session.read_tetra(0).unwrap();
        assert!(tetra.nodes.iter().all(|&n| n < session.read_node_count().unwrap()));
        assert_eq!(session.progress(), 1.0);
        assert!(session.log().contains("PHASE 4 COMPLETED"));
    }

    #[test]
    fn test_second_bind_is_rejected() {
        let mut session = Session::initialize(&StarEngine::new(), ProgressChannel::new()).unwrap();
        session.bind_input_surface(cube_input()).unwrap();
        let err = session.bind_input_volume(cube_input()).unwrap_err();
        assert!(matches!(err, TetraError::InvalidState { .. }));
    }

    #[test]
    fn test_reads_before_success_are_rejected() {
        let session = Session::initialize(&StarEngine::new(), ProgressChannel::new()).unwrap();
        assert!(matches!(
            session.read_node_count(),
            Err(TetraError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_record_source_matches_readers() {
        let mut session = Session::initialize(&StarEngine::new(), ProgressChannel::new()).unwrap();
        session.bind_input_surface(cube_input()).unwrap();
        session.compute().unwrap();

        let mesh = load_volume_mesh(&mut session).unwrap();
        assert_eq!(mesh.node_count(), session.read_node_count().unwrap());
        assert_eq!(mesh.tetra_count(), session.read_tetra_count().unwrap());
        assert_eq!(mesh.subdomains.len(), 1);
        assert!((mesh.total_volume() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_read_without_seek() {
        let mut session = Session::initialize(&StarEngine::new(), ProgressChannel::new()).unwrap();
        session.bind_input_surface(cube_input()).unwrap();
        session.compute().unwrap();
        let err = session.read_record(Keyword::Tetrahedra).unwrap_err();
        assert!(matches!(
            err,
            TetraError::Format(FormatError::NotPositioned { .. })
        ));
    }

    #[test]
    fn test_size_map_length_is_checked() {
        let mut session = Session::initialize(&StarEngine::new(), ProgressChannel::new()).unwrap();
        session.bind_input_surface(cube_input()).unwrap();
        assert!(session.bind_size_map(vec![0.1; 3]).is_err());
        session.bind_size_map(vec![0.1; 8]).unwrap();
    }
}
