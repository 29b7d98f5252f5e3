// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Tetralink Team

//! ASCII `.mesh`/`.sol` encoding
//!
//! ```text
//! MeshVersionFormatted 2
//! Dimension 3
//! Vertices
//! 8
//! 0 0 0 1
//! ...
//! End
//! ```
//!
//! Tokens are whitespace separated and `#` starts a comment. Records of known
//! keywords are read token by token from their fixed layout; blocks of unknown
//! keywords are skipped one line per declared record.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use super::{check_header, BlockInfo, BlockSink, BlockSource};
use crate::error::{FormatError, FormatResult};
use crate::io::keyword::{Keyword, RecordShape, SolType};
use crate::io::record::{layout, FieldKind, Value};

const VERSION_KEYWORD: &str = "MeshVersionFormatted";

pub(crate) struct AsciiSink {
    path: PathBuf,
    out: BufWriter<File>,
}

impl AsciiSink {
    pub fn create(path: &Path, version: i32, dimension: i32) -> FormatResult<Self> {
        let file = File::create(path).map_err(|e| FormatError::io(path, e))?;
        let mut sink = Self {
            path: path.to_path_buf(),
            out: BufWriter::new(file),
        };
        sink.emit(format_args!(
            "{} {}\n\nDimension {}\n",
            VERSION_KEYWORD, version, dimension
        ))?;
        Ok(sink)
    }

    fn emit(&mut self, args: std::fmt::Arguments<'_>) -> FormatResult<()> {
        self.out
            .write_fmt(args)
            .map_err(|e| FormatError::io(&self.path, e))
    }
}

impl BlockSink for AsciiSink {
    fn begin_block(
        &mut self,
        keyword: Keyword,
        count: usize,
        sol_types: &[SolType],
        _layout: &[FieldKind],
    ) -> FormatResult<()> {
        self.emit(format_args!("\n{}\n{}\n", keyword, count))?;
        if keyword.is_solution() {
            let codes: Vec<String> = sol_types.iter().map(|t| t.code().to_string()).collect();
            self.emit(format_args!("{} {}\n", sol_types.len(), codes.join(" ")))?;
        }
        Ok(())
    }

    fn write_values(&mut self, _keyword: Keyword, values: &[Value]) -> FormatResult<()> {
        let line: Vec<String> = values
            .iter()
            .map(|v| match v {
                Value::Int(i) => i.to_string(),
                Value::Real(r) => r.to_string(),
            })
            .collect();
        self.emit(format_args!("{}\n", line.join(" ")))
    }

    fn finish(&mut self) -> FormatResult<()> {
        self.emit(format_args!("\nEnd\n"))?;
        self.out.flush().map_err(|e| FormatError::io(&self.path, e))
    }
}

#[derive(Debug)]
struct Token {
    text: String,
    /// Physical line, 1-based, for error reporting.
    line: usize,
    /// Ordinal of the non-empty line the token sits on.
    row: usize,
}

fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut row = 0;
    for (number, raw) in text.lines().enumerate() {
        let content = raw.split('#').next().unwrap_or("");
        let mut words = content.split_whitespace().peekable();
        if words.peek().is_none() {
            continue;
        }
        row += 1;
        tokens.extend(words.map(|w| Token {
            text: w.to_string(),
            line: number + 1,
            row,
        }));
    }
    tokens
}

pub(crate) struct AsciiSource {
    tokens: Vec<Token>,
    version: i32,
    dimension: i32,
    blocks: Vec<BlockInfo>,
    cursor: usize,
}

impl AsciiSource {
    pub fn parse(path: &Path, text: &str) -> FormatResult<Self> {
        let tokens = tokenize(text);
        if tokens.first().map(|t| t.text.as_str()) != Some(VERSION_KEYWORD) {
            return Err(FormatError::BadMagic {
                path: path.to_path_buf(),
            });
        }

        let mut source = Self {
            tokens,
            version: 0,
            dimension: 3,
            blocks: Vec::new(),
            cursor: 1,
        };
        source.version = source.header_int(Keyword::Dimension)? as i32;
        if !(1..=3).contains(&source.version) {
            return Err(FormatError::UnsupportedVersion(source.version));
        }
        source.index()?;
        Ok(source)
    }

    fn header_int(&mut self, keyword: Keyword) -> FormatResult<i64> {
        let token = self.tokens.get(self.cursor).ok_or(FormatError::Truncated {
            keyword,
            position: self.last_line(),
        })?;
        let value = token.text.parse().map_err(|_| FormatError::InvalidValue {
            keyword,
            position: token.line as u64,
            text: token.text.clone(),
        })?;
        self.cursor += 1;
        Ok(value)
    }

    fn last_line(&self) -> u64 {
        self.tokens.last().map_or(0, |t| t.line as u64)
    }

    fn index(&mut self) -> FormatResult<()> {
        while let Some(token) = self.tokens.get(self.cursor) {
            let name = token.text.clone();
            let line = token.line;
            self.cursor += 1;

            match Keyword::from_name(&name) {
                Some(Keyword::End) => break,
                Some(Keyword::Dimension) => {
                    self.dimension = self.header_int(Keyword::Dimension)? as i32;
                    check_header(self.version, self.dimension)?;
                }
                Some(keyword) => self.index_block(keyword)?,
                None => self.skip_unknown(name, line)?,
            }
        }
        check_header(self.version, self.dimension)
    }

    fn index_block(&mut self, keyword: Keyword) -> FormatResult<()> {
        let count = self.header_int(keyword)?;
        let count = usize::try_from(count).map_err(|_| FormatError::InvalidValue {
            keyword,
            position: self.last_line(),
            text: count.to_string(),
        })?;

        let mut sol_types = Vec::new();
        if keyword.is_solution() {
            let ntypes = self.header_int(keyword)?;
            let remaining = self.tokens.len() - self.cursor;
            if usize::try_from(ntypes).map_or(true, |n| n > remaining) {
                return Err(FormatError::InvalidValue {
                    keyword,
                    position: self.last_line(),
                    text: ntypes.to_string(),
                });
            }
            for _ in 0..ntypes {
                let code = self.header_int(keyword)?;
                sol_types.push(SolType::from_code(code).ok_or_else(|| {
                    FormatError::InvalidValue {
                        keyword,
                        position: self.last_line(),
                        text: code.to_string(),
                    }
                })?);
            }
        }

        let offset = self.cursor;
        let width = layout(keyword, self.dimension as usize, &sol_types).len();
        let end = count
            .checked_mul(width)
            .and_then(|n| n.checked_add(offset))
            .filter(|&end| end <= self.tokens.len());
        let Some(end) = end else {
            let position = self.tokens.get(offset).map_or(self.last_line(), |t| t.line as u64);
            return Err(FormatError::Truncated { keyword, position });
        };
        self.cursor = end;

        // A repeated keyword keeps its first block
        if keyword.shape() != RecordShape::Marker
            && !self.blocks.iter().any(|b| b.keyword == keyword)
        {
            self.blocks.push(BlockInfo {
                keyword,
                count,
                sol_types,
                offset: offset as u64,
            });
        }
        Ok(())
    }

    fn skip_unknown(&mut self, name: String, line: usize) -> FormatResult<()> {
        let count = self
            .tokens
            .get(self.cursor)
            .and_then(|t| t.text.parse::<usize>().ok().map(|c| (c, t.row)));
        let Some((count, count_row)) = count else {
            return Err(FormatError::UnknownKeyword { name, line });
        };
        tracing::debug!("skipping unknown keyword {} ({} records)", name, count);
        self.cursor += 1;
        while self
            .tokens
            .get(self.cursor)
            .map_or(false, |t| t.row <= count_row.saturating_add(count))
        {
            self.cursor += 1;
        }
        Ok(())
    }
}

impl BlockSource for AsciiSource {
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
        self.cursor = block.offset as usize;
        Ok(())
    }

    fn read_values(
        &mut self,
        keyword: Keyword,
        layout: &[FieldKind],
    ) -> FormatResult<(Vec<Value>, u64)> {
        let position = self
            .tokens
            .get(self.cursor)
            .map_or(self.last_line(), |t| t.line as u64);
        let mut values = Vec::with_capacity(layout.len());
        for kind in layout {
            let token = self
                .tokens
                .get(self.cursor)
                .ok_or(FormatError::Truncated { keyword, position })?;
            let invalid = || FormatError::InvalidValue {
                keyword,
                position: token.line as u64,
                text: token.text.clone(),
            };
            let value = match kind {
                FieldKind::Int => Value::Int(token.text.parse().map_err(|_| invalid())?),
                FieldKind::Real => Value::Real(token.text.parse().map_err(|_| invalid())?),
            };
            values.push(value);
            self.cursor += 1;
        }
        Ok((values, position))
    }
}
