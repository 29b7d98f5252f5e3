// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Tetralink Team

//! Random-access reader for keyword mesh files

use std::path::{Path, PathBuf};
use tracing::debug;

use super::format::ascii::AsciiSource;
use super::format::binary::BinarySource;
use super::format::{BlockSource, Encoding};
use super::keyword::{Keyword, SolType};
use super::record::{decode, layout, FieldKind, Record};
use crate::error::{FormatError, FormatResult};

struct Cursor {
    keyword: Keyword,
    count: usize,
    next: usize,
    layout: Vec<FieldKind>,
}

/// Reads a mesh file opened with [`MeshReader::open`].
///
/// Blocks are indexed at open time. Reading a block means positioning on it
/// with [`MeshReader::seek_block`] and then calling
/// [`MeshReader::read_record`] at most [`MeshReader::stat_block`] times.
pub struct MeshReader {
    path: PathBuf,
    encoding: Encoding,
    version: i32,
    dimension: i32,
    source: Option<Box<dyn BlockSource>>,
    cursor: Option<Cursor>,
}

impl MeshReader {
    /// Open `path`, detecting the encoding from its first bytes.
    pub fn open(path: impl AsRef<Path>) -> FormatResult<Self> {
        let path = path.as_ref();
        let (encoding, source): (Encoding, Box<dyn BlockSource>) =
            match BinarySource::open(path)? {
                Some(binary) => (Encoding::Binary, Box::new(binary)),
                None => {
                    let bytes = std::fs::read(path).map_err(|e| FormatError::io(path, e))?;
                    let text = String::from_utf8(bytes).map_err(|_| FormatError::BadMagic {
                        path: path.to_path_buf(),
                    })?;
                    (
                        Encoding::Ascii,
                        Box::new(AsciiSource::parse(path, &text)?),
                    )
                }
            };
        debug!(
            "opened {} ({:?}, version {}, {} blocks)",
            path.display(),
            encoding,
            source.version(),
            source.blocks().len()
        );
        Ok(Self {
            path: path.to_path_buf(),
            encoding,
            version: source.version(),
            dimension: source.dimension(),
            source: Some(source),
            cursor: None,
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

    /// Keywords present in the file, in file order.
    pub fn keywords(&self) -> Vec<Keyword> {
        self.source
            .as_ref()
            .map(|s| s.blocks().iter().map(|b| b.keyword).collect())
            .unwrap_or_default()
    }

    /// Number of records under `keyword`, 0 when absent.
    pub fn stat_block(&self, keyword: Keyword) -> usize {
        self.source
            .as_ref()
            .and_then(|s| s.blocks().iter().find(|b| b.keyword == keyword))
            .map_or(0, |b| b.count)
    }

    /// Component types of a solution block, empty when absent.
    pub fn solution_types(&self, keyword: Keyword) -> Vec<SolType> {
        self.source
            .as_ref()
            .and_then(|s| s.blocks().iter().find(|b| b.keyword == keyword))
            .map(|b| b.sol_types.clone())
            .unwrap_or_default()
    }

    /// Position the cursor on the first record of `keyword`. An absent
    /// keyword positions on an empty block.
    pub fn seek_block(&mut self, keyword: Keyword) -> FormatResult<()> {
        let source = self.source.as_mut().ok_or(FormatError::Closed)?;
        let block = source
            .blocks()
            .iter()
            .find(|b| b.keyword == keyword)
            .cloned();

        let cursor = match block {
            Some(block) => {
                source.seek(&block)?;
                Cursor {
                    keyword,
                    count: block.count,
                    next: 0,
                    layout: layout(keyword, self.dimension as usize, &block.sol_types),
                }
            }
            None => Cursor {
                keyword,
                count: 0,
                next: 0,
                layout: Vec::new(),
            },
        };
        self.cursor = Some(cursor);
        Ok(())
    }

    /// Read the next record of the block selected by the last seek.
    pub fn read_record(&mut self, keyword: Keyword) -> FormatResult<Record> {
        let source = self.source.as_mut().ok_or(FormatError::Closed)?;
        let cursor = match self.cursor.as_mut() {
            Some(cursor) if cursor.keyword == keyword => cursor,
            _ => return Err(FormatError::NotPositioned { keyword }),
        };
        if cursor.next >= cursor.count {
            return Err(FormatError::CountExceeded {
                keyword,
                count: cursor.count,
                index: cursor.next,
            });
        }
        let (values, position) = source.read_values(keyword, &cursor.layout)?;
        cursor.next += 1;
        decode(keyword, &values, position)
    }

    /// Seek and read every record of `keyword`.
    pub fn read_block(&mut self, keyword: Keyword) -> FormatResult<Vec<Record>> {
        self.seek_block(keyword)?;
        (0..self.stat_block(keyword))
            .map(|_| self.read_record(keyword))
            .collect()
    }

    /// Release the file. Closing twice is a no-op.
    pub fn close(&mut self) {
        self.source = None;
        self.cursor = None;
    }

    pub fn is_closed(&self) -> bool {
        self.source.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MeshWriter;
    use tempfile::tempdir;

    fn sample(path: &Path) {
        let mut writer = MeshWriter::create(path, 2, 3).unwrap();
        writer
            .write_block(
                Keyword::Vertices,
                &[
                    Record::vertex(0.0, 0.0, 0.0, 1),
                    Record::vertex(1.0, 0.5, 0.25, 2),
                ],
            )
            .unwrap();
        writer.declare_block(Keyword::Tetrahedra, 0).unwrap();
        writer.close().unwrap();
    }

    #[test]
    fn test_read_without_seek() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.meshb");
        sample(&path);
        let mut reader = MeshReader::open(&path).unwrap();
        assert!(matches!(
            reader.read_record(Keyword::Vertices),
            Err(FormatError::NotPositioned { .. })
        ));
    }

    #[test]
    fn test_read_past_count() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.mesh");
        sample(&path);
        let mut reader = MeshReader::open(&path).unwrap();
        reader.seek_block(Keyword::Vertices).unwrap();
        assert_eq!(
            reader.read_record(Keyword::Vertices).unwrap(),
            Record::vertex(0.0, 0.0, 0.0, 1)
        );
        assert_eq!(
            reader.read_record(Keyword::Vertices).unwrap(),
            Record::vertex(1.0, 0.5, 0.25, 2)
        );
        assert!(matches!(
            reader.read_record(Keyword::Vertices),
            Err(FormatError::CountExceeded { count: 2, index: 2, .. })
        ));
    }

    #[test]
    fn test_absent_and_empty_blocks() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.meshb");
        sample(&path);
        let mut reader = MeshReader::open(&path).unwrap();
        assert_eq!(reader.stat_block(Keyword::Tetrahedra), 0);
        assert_eq!(reader.stat_block(Keyword::Hexahedra), 0);
        assert!(reader.read_block(Keyword::Hexahedra).unwrap().is_empty());
        assert_eq!(reader.keywords(), vec![Keyword::Vertices, Keyword::Tetrahedra]);
    }

    #[test]
    fn test_close_twice() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.mesh");
        sample(&path);
        let mut reader = MeshReader::open(&path).unwrap();
        reader.close();
        reader.close();
        assert!(matches!(
            reader.seek_block(Keyword::Vertices),
            Err(FormatError::Closed)
        ));
    }

    #[test]
    fn test_garbage_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("junk.meshb");
        std::fs::write(&path, [0xffu8, 0xfe, 0x00, 0x07, 0x01]).unwrap();
        assert!(matches!(
            MeshReader::open(&path),
            Err(FormatError::BadMagic { .. })
        ));
    }
}
