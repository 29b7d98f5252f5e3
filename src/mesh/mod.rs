// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Tetralink Team

//! Mesh data structures exchanged with the engine

pub mod bbox;
pub mod element;
pub mod exchange;
pub mod surface;
pub mod volume;

pub use bbox::BoundingBox;
pub use element::{
    Edge, Element, Hexahedron, Quadrilateral, SeedKind, SubDomain, Tetrahedron, Triangle,
};
pub use exchange::ExchangeMesh;
pub use surface::SurfaceMesh;
pub use volume::{Group, MeshStats, VolumeMesh};
