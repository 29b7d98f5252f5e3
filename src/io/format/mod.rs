// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Tetralink Team

//! ASCII and binary encodings of the keyword block stream

pub(crate) mod ascii;
pub(crate) mod binary;

use std::path::Path;

use super::keyword::{Keyword, SolType};
use super::record::{FieldKind, Value};
use crate::error::FormatResult;

/// On-disk encoding, chosen from the file extension when writing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Ascii,
    Binary,
}

impl Encoding {
    /// `.meshb` and `.solb` are binary, anything else is ASCII.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("meshb") || ext.eq_ignore_ascii_case("solb") => {
                Self::Binary
            }
            _ => Self::Ascii,
        }
    }
}

/// A block found while indexing a file opened for read.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct BlockInfo {
    pub keyword: Keyword,
    pub count: usize,
    pub sol_types: Vec<SolType>,
    /// Byte offset (binary) or token index (ASCII) of the first record.
    pub offset: u64,
}

/// Encoder side of a format.
pub(crate) trait BlockSink {
    fn begin_block(
        &mut self,
        keyword: Keyword,
        count: usize,
        sol_types: &[SolType],
        layout: &[FieldKind],
    ) -> FormatResult<()>;

    fn write_values(&mut self, keyword: Keyword, values: &[Value]) -> FormatResult<()>;

    /// Write the `End` marker and flush.
    fn finish(&mut self) -> FormatResult<()>;
}

/// Decoder side of a format.
pub(crate) trait BlockSource {
    fn version(&self) -> i32;

    fn dimension(&self) -> i32;

    fn blocks(&self) -> &[BlockInfo];

    fn seek(&mut self, block: &BlockInfo) -> FormatResult<()>;

    /// Read one record laid out as `layout`; returns the values and the
    /// position the record started at.
    fn read_values(
        &mut self,
        keyword: Keyword,
        layout: &[FieldKind],
    ) -> FormatResult<(Vec<Value>, u64)>;
}

pub(crate) fn check_header(version: i32, dimension: i32) -> FormatResult<()> {
    use crate::error::FormatError;

    if !(1..=3).contains(&version) {
        return Err(FormatError::UnsupportedVersion(version));
    }
    if !(2..=3).contains(&dimension) {
        return Err(FormatError::UnsupportedDimension(dimension));
    }
    Ok(())
}
