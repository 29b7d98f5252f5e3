// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Tetralink Team

//! I/O module - keyword mesh file codec

mod format;
mod keyword;
mod mesh_file;
mod reader;
mod record;
mod writer;

pub use format::Encoding;
pub use keyword::{Keyword, RecordShape, SolType};
pub use mesh_file::{
    load_volume_mesh, read_exchange_mesh, read_size_map, read_volume_mesh, write_exchange_mesh,
    write_size_map, write_volume_mesh, RecordSource, DEFAULT_VERSION,
};
pub use reader::MeshReader;
pub use record::{from_one_based, to_one_based, Record};
pub use writer::MeshWriter;
