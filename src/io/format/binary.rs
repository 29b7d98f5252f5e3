// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Tetralink Team

//! Binary `.meshb`/`.solb` encoding
//!
//! ```text
//! +------------------+
//! | magic   (i32 1)  |  byte order marker
//! | version (i32)    |  1: f32 reals, 2: f64 reals, 3: f64 reals + 64-bit offsets
//! +------------------+
//! | keyword (i32)    |
//! | next    (offset) |  absolute position of the following block
//! | count   (i32)    |
//! | [ntypes, types]  |  solution blocks only
//! | records ...      |
//! +------------------+
//! | End     (i32 54) |
//! +------------------+
//! ```
//!
//! Files are written little-endian; either byte order is accepted on read.

use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use super::{check_header, BlockInfo, BlockSink, BlockSource};
use crate::error::{FormatError, FormatResult};
use crate::io::keyword::{Keyword, RecordShape, SolType};
use crate::io::record::{layout, FieldKind, Value};

const MAGIC: i32 = 1;
const INT_SIZE: u64 = 4;

fn offset_size(version: i32) -> u64 {
    if version >= 3 {
        8
    } else {
        4
    }
}

fn real_size(version: i32) -> u64 {
    if version == 1 {
        4
    } else {
        8
    }
}

fn record_size(version: i32, layout: &[FieldKind]) -> u64 {
    layout
        .iter()
        .map(|kind| match kind {
            FieldKind::Int => INT_SIZE,
            FieldKind::Real => real_size(version),
        })
        .sum()
}

pub(crate) struct BinarySink {
    path: PathBuf,
    out: BufWriter<File>,
    version: i32,
    position: u64,
}

impl BinarySink {
    pub fn create(path: &Path, version: i32, dimension: i32) -> FormatResult<Self> {
        let file = File::create(path).map_err(|e| FormatError::io(path, e))?;
        let mut sink = Self {
            path: path.to_path_buf(),
            out: BufWriter::new(file),
            version,
            position: 0,
        };
        sink.put_i32(MAGIC)?;
        sink.put_i32(version)?;

        let next = sink.position + INT_SIZE + offset_size(version) + INT_SIZE;
        sink.put_i32(Keyword::Dimension.code())?;
        sink.put_offset(Keyword::Dimension, next)?;
        sink.put_i32(dimension)?;
        Ok(sink)
    }

    fn put(&mut self, bytes: &[u8]) -> FormatResult<()> {
        self.out
            .write_all(bytes)
            .map_err(|e| FormatError::io(&self.path, e))?;
        self.position += bytes.len() as u64;
        Ok(())
    }

    fn put_i32(&mut self, value: i32) -> FormatResult<()> {
        self.put(&value.to_le_bytes())
    }

    fn put_offset(&mut self, keyword: Keyword, offset: u64) -> FormatResult<()> {
        if self.version >= 3 {
            self.put(&offset.to_le_bytes())
        } else {
            let narrow = i32::try_from(offset).map_err(|_| {
                FormatError::InvalidContent(format!(
                    "{} block ends past 2 GiB, version 3 is required",
                    keyword
                ))
            })?;
            self.put_i32(narrow)
        }
    }
}

impl BlockSink for BinarySink {
    fn begin_block(
        &mut self,
        keyword: Keyword,
        count: usize,
        sol_types: &[SolType],
        layout: &[FieldKind],
    ) -> FormatResult<()> {
        let mut header = INT_SIZE + offset_size(self.version) + INT_SIZE;
        if keyword.is_solution() {
            header += INT_SIZE * (1 + sol_types.len() as u64);
        }
        let next = self.position + header + count as u64 * record_size(self.version, layout);
        let count = i32::try_from(count).map_err(|_| {
            FormatError::InvalidContent(format!("{} block holds too many records", keyword))
        })?;

        self.put_i32(keyword.code())?;
        self.put_offset(keyword, next)?;
        self.put_i32(count)?;
        if keyword.is_solution() {
            self.put_i32(sol_types.len() as i32)?;
            for sol_type in sol_types {
                self.put_i32(sol_type.code())?;
            }
        }
        Ok(())
    }

    fn write_values(&mut self, keyword: Keyword, values: &[Value]) -> FormatResult<()> {
        for value in values {
            match *value {
                Value::Int(i) => {
                    let narrow = i32::try_from(i).map_err(|_| FormatError::InvalidValue {
                        keyword,
                        position: self.position,
                        text: i.to_string(),
                    })?;
                    self.put_i32(narrow)?;
                }
                Value::Real(r) if self.version == 1 => self.put(&(r as f32).to_le_bytes())?,
                Value::Real(r) => self.put(&r.to_le_bytes())?,
            }
        }
        Ok(())
    }

    fn finish(&mut self) -> FormatResult<()> {
        self.put_i32(Keyword::End.code())?;
        self.put_offset(Keyword::End, 0)?;
        self.out.flush().map_err(|e| FormatError::io(&self.path, e))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ByteOrder {
    Little,
    Big,
}

pub(crate) struct BinarySource {
    path: PathBuf,
    reader: BufReader<File>,
    order: ByteOrder,
    version: i32,
    dimension: i32,
    length: u64,
    position: u64,
    blocks: Vec<BlockInfo>,
}

impl BinarySource {
    /// Open `path` if it starts with the binary magic, `None` otherwise.
    pub fn open(path: &Path) -> FormatResult<Option<Self>> {
        let file = File::open(path).map_err(|e| FormatError::io(path, e))?;
        let length = file
            .metadata()
            .map_err(|e| FormatError::io(path, e))?
            .len();
        let mut reader = BufReader::new(file);

        let mut magic = [0u8; 4];
        if reader.read_exact(&mut magic).is_err() {
            return Ok(None);
        }
        let order = if i32::from_le_bytes(magic) == MAGIC {
            ByteOrder::Little
        } else if i32::from_be_bytes(magic) == MAGIC {
            ByteOrder::Big
        } else {
            return Ok(None);
        };

        let mut source = Self {
            path: path.to_path_buf(),
            reader,
            order,
            version: 0,
            dimension: 3,
            length,
            position: 4,
            blocks: Vec::new(),
        };
        source.version = source.get_i32(Keyword::Dimension)?;
        if !(1..=3).contains(&source.version) {
            return Err(FormatError::UnsupportedVersion(source.version));
        }
        source.index()?;
        Ok(Some(source))
    }

    fn get<const N: usize>(&mut self, keyword: Keyword) -> FormatResult<[u8; N]> {
        let mut buf = [0u8; N];
        match self.reader.read_exact(&mut buf) {
            Ok(()) => {
                self.position += N as u64;
                Ok(buf)
            }
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => Err(FormatError::Truncated {
                keyword,
                position: self.position,
            }),
            Err(e) => Err(FormatError::io(&self.path, e)),
        }
    }

    fn get_i32(&mut self, keyword: Keyword) -> FormatResult<i32> {
        let bytes = self.get::<4>(keyword)?;
        Ok(match self.order {
            ByteOrder::Little => i32::from_le_bytes(bytes),
            ByteOrder::Big => i32::from_be_bytes(bytes),
        })
    }

    fn get_offset(&mut self, keyword: Keyword) -> FormatResult<u64> {
        if self.version >= 3 {
            let bytes = self.get::<8>(keyword)?;
            let value = match self.order {
                ByteOrder::Little => i64::from_le_bytes(bytes),
                ByteOrder::Big => i64::from_be_bytes(bytes),
            };
            Ok(value.max(0) as u64)
        } else {
            Ok(self.get_i32(keyword)?.max(0) as u64)
        }
    }

    fn get_real(&mut self, keyword: Keyword) -> FormatResult<f64> {
        if self.version == 1 {
            let bytes = self.get::<4>(keyword)?;
            Ok(f64::from(match self.order {
                ByteOrder::Little => f32::from_le_bytes(bytes),
                ByteOrder::Big => f32::from_be_bytes(bytes),
            }))
        } else {
            let bytes = self.get::<8>(keyword)?;
            Ok(match self.order {
                ByteOrder::Little => f64::from_le_bytes(bytes),
                ByteOrder::Big => f64::from_be_bytes(bytes),
            })
        }
    }

    fn seek_to(&mut self, position: u64) -> FormatResult<()> {
        self.reader
            .seek(SeekFrom::Start(position))
            .map_err(|e| FormatError::io(&self.path, e))?;
        self.position = position;
        Ok(())
    }

    fn index(&mut self) -> FormatResult<()> {
        while self.position + INT_SIZE <= self.length {
            let start = self.position;
            let code = self.get_i32(Keyword::End)?;
            if code == Keyword::End.code() {
                break;
            }
            let keyword = Keyword::from_code(code);
            let next = self.get_offset(keyword.unwrap_or(Keyword::End))?;

            match keyword {
                Some(Keyword::Dimension) => {
                    self.dimension = self.get_i32(Keyword::Dimension)?;
                    check_header(self.version, self.dimension)?;
                }
                Some(keyword) if keyword.shape() != RecordShape::Marker => {
                    self.index_block(keyword)?;
                }
                _ => tracing::debug!("skipping unknown keyword code {} at {}", code, start),
            }

            if next == 0 {
                break;
            }
            if next <= start {
                return Err(FormatError::InvalidContent(format!(
                    "block at {} points backwards to {}",
                    start, next
                )));
            }
            self.seek_to(next)?;
        }
        check_header(self.version, self.dimension)
    }

    fn index_block(&mut self, keyword: Keyword) -> FormatResult<()> {
        let count = self.get_i32(keyword)?;
        let count = usize::try_from(count).map_err(|_| FormatError::InvalidValue {
            keyword,
            position: self.position,
            text: count.to_string(),
        })?;

        let mut sol_types = Vec::new();
        if keyword.is_solution() {
            let ntypes = self.get_i32(keyword)?;
            for _ in 0..ntypes {
                let code = self.get_i32(keyword)?;
                sol_types.push(SolType::from_code(i64::from(code)).ok_or_else(|| {
                    FormatError::InvalidValue {
                        keyword,
                        position: self.position,
                        text: code.to_string(),
                    }
                })?);
            }
        }

        let offset = self.position;
        let fields = layout(keyword, self.dimension as usize, &sol_types);
        let end = (count as u64)
            .checked_mul(record_size(self.version, &fields))
            .and_then(|n| n.checked_add(offset));
        if end.map_or(true, |end| end > self.length) {
            return Err(FormatError::Truncated {
                keyword,
                position: offset,
            });
        }
        if !self.blocks.iter().any(|b| b.keyword == keyword) {
            self.blocks.push(BlockInfo {
                keyword,
                count,
                sol_types,
                offset,
            });
        }
        Ok(())
    }
}

impl BlockSource for BinarySource {
    fn version(&self) -> i32 {
        self.version
    }

    fn dimension(&self) -> i32 {
        self.dimension
    }

    fn blocks(&self) -> &[BlockInfo] {
        &self.blocks
    }

    fn seek(&mut self, block: &BlockInfo) -> FormatResult<()> {
        self.seek_to(block.offset)
    }

    fn read_values(
        &mut self,
        keyword: Keyword,
        layout: &[FieldKind],
    ) -> FormatResult<(Vec<Value>, u64)> {
        let position = self.position;
        let mut values = Vec::with_capacity(layout.len());
        for kind in layout {
            values.push(match kind {
                FieldKind::Int => Value::Int(i64::from(self.get_i32(keyword)?)),
                FieldKind::Real => Value::Real(self.get_real(keyword)?),
            });
        }
        Ok((values, position))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_block_offsets_chain() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("chain.meshb");
        let fields = layout(Keyword::Edges, 3, &[]);

        let mut sink = BinarySink::create(&path, 2, 3).unwrap();
        sink.begin_block(Keyword::Edges, 1, &[], &fields).unwrap();
        sink.write_values(Keyword::Edges, &[Value::Int(1), Value::Int(2), Value::Int(0)])
            .unwrap();
        sink.begin_block(Keyword::Tetrahedra, 0, &[], &layout(Keyword::Tetrahedra, 3, &[]))
            .unwrap();
        sink.finish().unwrap();

        let mut source = BinarySource::open(&path).unwrap().unwrap();
        assert_eq!(source.version(), 2);
        assert_eq!(source.dimension(), 3);
        assert_eq!(source.blocks().len(), 2);
        let block = source.blocks()[0].clone();
        source.seek(&block).unwrap();
        let (values, _) = source.read_values(Keyword::Edges, &fields).unwrap();
        assert_eq!(values, vec![Value::Int(1), Value::Int(2), Value::Int(0)]);
    }

    #[test]
    fn test_ascii_file_is_not_binary() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("plain.mesh");
        std::fs::write(&path, "MeshVersionFormatted 2\n").unwrap();
        assert!(BinarySource::open(&path).unwrap().is_none());
    }

    #[test]
    fn test_big_endian_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("be.meshb");
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&1i32.to_be_bytes());
        bytes.extend_from_slice(&2i32.to_be_bytes());
        bytes.extend_from_slice(&3i32.to_be_bytes());
        bytes.extend_from_slice(&20i32.to_be_bytes());
        bytes.extend_from_slice(&3i32.to_be_bytes());
        bytes.extend_from_slice(&54i32.to_be_bytes());
        bytes.extend_from_slice(&0i32.to_be_bytes());
        std::fs::write(&path, bytes).unwrap();

        let source = BinarySource::open(&path).unwrap().unwrap();
        assert_eq!(source.version(), 2);
        assert_eq!(source.dimension(), 3);
        assert!(source.blocks().is_empty());
    }
}
