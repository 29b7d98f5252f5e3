// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Tetralink Team

//! CLI subsystem for Tetralink

pub mod reporter;
pub mod runner;

pub use reporter::Reporter;
pub use runner::{load_surface, MeshInfo, Runner};
