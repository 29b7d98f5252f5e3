// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Tetralink Team

//! Streaming writer for keyword mesh files

use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::format::ascii::AsciiSink;
use super::format::binary::BinarySink;
use super::format::{check_header, BlockSink, Encoding};
use super::keyword::{Keyword, RecordShape, SolType};
use super::record::{encode, layout, FieldKind, Record};
use crate::error::{FormatError, FormatResult};

struct OpenBlock {
    keyword: Keyword,
    declared: usize,
    written: usize,
    layout: Vec<FieldKind>,
}

/// Writes a mesh file block by block.
///
/// Every block is announced with [`MeshWriter::declare_block`] and then filled
/// with exactly the declared number of records before the next block starts.
pub struct MeshWriter {
    path: PathBuf,
    encoding: Encoding,
    version: i32,
    dimension: i32,
    sink: Option<Box<dyn BlockSink>>,
    block: Option<OpenBlock>,
}

impl MeshWriter {
    /// Create `path` and write the version/dimension header. The encoding
    /// follows the extension (`.meshb`/`.solb` are binary).
    pub fn create(path: impl AsRef<Path>, version: i32, dimension: i32) -> FormatResult<Self> {
        let path = path.as_ref();
        check_header(version, dimension)?;
        let encoding = Encoding::from_path(path);
        let sink: Box<dyn BlockSink> = match encoding {
            Encoding::Ascii => Box::new(AsciiSink::create(path, version, dimension)?),
            Encoding::Binary => Box::new(BinarySink::create(path, version, dimension)?),
        };
        debug!(
            "writing {} (version {}, {:?}, dimension {})",
            path.display(),
            version,
            encoding,
            dimension
        );
        Ok(Self {
            path: path.to_path_buf(),
            encoding,
            version,
            dimension,
            sink: Some(sink),
            block: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    pub fn version(&self) -> i32 {
        self.version
    }

    pub fn dimension(&self) -> i32 {
        self.dimension
    }

    /// Announce `count` records of `keyword`. Solution keywords default to
    /// one scalar per entity.
    pub fn declare_block(&mut self, keyword: Keyword, count: usize) -> FormatResult<()> {
        if keyword.is_solution() {
            return self.declare_solution_block(keyword, count, &[SolType::Scalar]);
        }
        self.begin(keyword, count, &[])
    }

    /// Announce `count` solution records whose components follow `types`.
    pub fn declare_solution_block(
        &mut self,
        keyword: Keyword,
        count: usize,
        types: &[SolType],
    ) -> FormatResult<()> {
        if !keyword.is_solution() {
            return Err(FormatError::InvalidContent(format!(
                "{} is not a solution keyword",
                keyword
            )));
        }
        self.begin(keyword, count, types)
    }

    fn begin(&mut self, keyword: Keyword, count: usize, types: &[SolType]) -> FormatResult<()> {
        if keyword.shape() == RecordShape::Marker {
            return Err(FormatError::InvalidContent(format!(
                "{} cannot be declared as a block",
                keyword
            )));
        }
        self.check_complete()?;
        let fields = layout(keyword, self.dimension as usize, types);
        let sink = self.sink.as_mut().ok_or(FormatError::Closed)?;
        sink.begin_block(keyword, count, types, &fields)?;
        self.block = Some(OpenBlock {
            keyword,
            declared: count,
            written: 0,
            layout: fields,
        });
        Ok(())
    }

    fn check_complete(&self) -> FormatResult<()> {
        match &self.block {
            Some(block) if block.written < block.declared => Err(FormatError::IncompleteBlock {
                keyword: block.keyword,
                declared: block.declared,
                written: block.written,
            }),
            _ => Ok(()),
        }
    }

    /// Append one record to the current block of `keyword`.
    pub fn write_record(&mut self, keyword: Keyword, record: &Record) -> FormatResult<()> {
        let sink = self.sink.as_mut().ok_or(FormatError::Closed)?;
        let block = match self.block.as_mut() {
            Some(block) if block.keyword == keyword => block,
            _ => return Err(FormatError::BlockNotDeclared { keyword }),
        };
        if block.written >= block.declared {
            return Err(FormatError::CountExceeded {
                keyword,
                count: block.declared,
                index: block.written,
            });
        }
        let values = encode(keyword, record, &block.layout)?;
        sink.write_values(keyword, &values)?;
        block.written += 1;
        Ok(())
    }

    /// Declare a block and write all its records.
    pub fn write_block(&mut self, keyword: Keyword, records: &[Record]) -> FormatResult<()> {
        self.declare_block(keyword, records.len())?;
        records
            .iter()
            .try_for_each(|record| self.write_record(keyword, record))
    }

    /// Write the `End` marker and flush. Closing twice is a no-op.
    pub fn close(&mut self) -> FormatResult<()> {
        let Some(mut sink) = self.sink.take() else {
            return Ok(());
        };
        let complete = self.check_complete();
        self.block = None;
        sink.finish()?;
        complete
    }

    pub fn is_closed(&self) -> bool {
        self.sink.is_none()
    }
}

impl Drop for MeshWriter {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("closing {} failed: {}", self.path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_write_before_declare() {
        let dir = tempdir().unwrap();
        let mut writer = MeshWriter::create(dir.path().join("a.mesh"), 2, 3).unwrap();
        let err = writer
            .write_record(Keyword::Vertices, &Record::vertex(0.0, 0.0, 0.0, 0))
            .unwrap_err();
        assert!(matches!(err, FormatError::BlockNotDeclared { .. }));
    }

    #[test]
    fn test_too_many_records() {
        let dir = tempdir().unwrap();
        let mut writer = MeshWriter::create(dir.path().join("a.meshb"), 2, 3).unwrap();
        writer.declare_block(Keyword::RequiredVertices, 1).unwrap();
        writer
            .write_record(Keyword::RequiredVertices, &Record::Index(0))
            .unwrap();
        let err = writer
            .write_record(Keyword::RequiredVertices, &Record::Index(1))
            .unwrap_err();
        assert!(matches!(err, FormatError::CountExceeded { count: 1, .. }));
    }

    #[test]
    fn test_incomplete_block_reported() {
        let dir = tempdir().unwrap();
        let mut writer = MeshWriter::create(dir.path().join("a.mesh"), 2, 3).unwrap();
        writer.declare_block(Keyword::Edges, 2).unwrap();
        writer
            .write_record(Keyword::Edges, &Record::element(&[0, 1], 0))
            .unwrap();
        assert!(matches!(
            writer.declare_block(Keyword::Triangles, 0),
            Err(FormatError::IncompleteBlock { written: 1, .. })
        ));
    }

    #[test]
    fn test_double_close_is_noop() {
        let dir = tempdir().unwrap();
        let mut writer = MeshWriter::create(dir.path().join("a.mesh"), 2, 3).unwrap();
        writer.close().unwrap();
        writer.close().unwrap();
        assert!(writer.is_closed());
        assert!(matches!(
            writer.declare_block(Keyword::Vertices, 0),
            Err(FormatError::Closed)
        ));
    }

    #[test]
    fn test_bad_header_values() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            MeshWriter::create(dir.path().join("a.mesh"), 4, 3),
            Err(FormatError::UnsupportedVersion(4))
        ));
        assert!(matches!(
            MeshWriter::create(dir.path().join("a.mesh"), 2, 1),
            Err(FormatError::UnsupportedDimension(1))
        ));
    }

    #[test]
    fn test_unwritable_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing").join("a.mesh");
        assert!(matches!(
            MeshWriter::create(path, 2, 3),
            Err(FormatError::Io { .. })
        ));
    }
}
