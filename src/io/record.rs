// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Tetralink Team

//! Typed records and their on-disk value layout
//!
//! This is the only place where node indices change convention: records and
//! meshes hold 0-based indices in memory, values on disk and on the engine side
//! are 1-based. The session and its input adapter use [`to_one_based`] and
//! [`from_one_based`] from here.

use super::keyword::{Keyword, RecordShape, SolType};
use crate::error::{FormatError, FormatResult};
use crate::mesh::{SeedKind, SubDomain};

/// One record of a keyword block.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    /// Coordinates (the third is 0 in 2D files) and a reference tag.
    Vertex { coords: [f64; 3], tag: i32 },
    /// 0-based node indices and a domain tag.
    Element { nodes: Vec<usize>, tag: i32 },
    /// 0-based index into another block.
    Index(usize),
    SubDomain(SubDomain),
    Solution(Vec<f64>),
}

impl Record {
    pub fn vertex(x: f64, y: f64, z: f64, tag: i32) -> Self {
        Self::Vertex {
            coords: [x, y, z],
            tag,
        }
    }

    pub fn element(nodes: &[usize], tag: i32) -> Self {
        Self::Element {
            nodes: nodes.to_vec(),
            tag,
        }
    }
}

/// Storage class of a single value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FieldKind {
    Int,
    Real,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Value {
    Int(i64),
    Real(f64),
}

/// Value layout of one record of `keyword`.
pub(crate) fn layout(keyword: Keyword, dimension: usize, sol_types: &[SolType]) -> Vec<FieldKind> {
    match keyword.shape() {
        RecordShape::Vertex => {
            let mut fields = vec![FieldKind::Real; dimension];
            fields.push(FieldKind::Int);
            fields
        }
        RecordShape::Element(n) => vec![FieldKind::Int; n + 1],
        RecordShape::Index => vec![FieldKind::Int],
        RecordShape::SubDomain => vec![FieldKind::Int; 4],
        RecordShape::Solution => {
            let width = sol_types.iter().map(|t| t.width(dimension)).sum();
            vec![FieldKind::Real; width]
        }
        RecordShape::Marker => Vec::new(),
    }
}

/// Convert a 0-based index to the 1-based convention of files and engines.
pub fn to_one_based(index: usize) -> usize {
    index + 1
}

/// Convert a 1-based index back to 0-based; `None` for 0.
pub fn from_one_based(index: usize) -> Option<usize> {
    index.checked_sub(1)
}

fn to_disk_index(index: usize) -> Value {
    Value::Int(to_one_based(index) as i64)
}

/// Encode `record` into on-disk values matching `layout`.
pub(crate) fn encode(
    keyword: Keyword,
    record: &Record,
    layout: &[FieldKind],
) -> FormatResult<Vec<Value>> {
    let mismatch = |got: usize| FormatError::ArityMismatch {
        keyword,
        expected: layout.len(),
        got,
    };

    let values = match (keyword.shape(), record) {
        (RecordShape::Vertex, Record::Vertex { coords, tag }) => {
            let dimension = layout.len() - 1;
            let mut values: Vec<Value> =
                coords[..dimension].iter().map(|&c| Value::Real(c)).collect();
            values.push(Value::Int(i64::from(*tag)));
            values
        }
        (RecordShape::Element(n), Record::Element { nodes, tag }) => {
            if nodes.len() != n {
                return Err(mismatch(nodes.len() + 1));
            }
            let mut values: Vec<Value> = nodes.iter().map(|&i| to_disk_index(i)).collect();
            values.push(Value::Int(i64::from(*tag)));
            values
        }
        (RecordShape::Index, Record::Index(index)) => vec![to_disk_index(*index)],
        (RecordShape::SubDomain, Record::SubDomain(sub)) => vec![
            Value::Int(i64::from(sub.seed_kind.node_count())),
            to_disk_index(sub.seed_index),
            Value::Int(i64::from(sub.orientation)),
            Value::Int(i64::from(sub.tag)),
        ],
        (RecordShape::Solution, Record::Solution(values)) => {
            if values.len() != layout.len() {
                return Err(mismatch(values.len()));
            }
            values.iter().map(|&v| Value::Real(v)).collect()
        }
        (_, other) => return Err(mismatch(record_len(other))),
    };
    Ok(values)
}

fn record_len(record: &Record) -> usize {
    match record {
        Record::Vertex { .. } => 4,
        Record::Element { nodes, .. } => nodes.len() + 1,
        Record::Index(_) => 1,
        Record::SubDomain(_) => 4,
        Record::Solution(values) => values.len(),
    }
}

/// Decode on-disk values read at `position` into a record of `keyword`.
pub(crate) fn decode(keyword: Keyword, values: &[Value], position: u64) -> FormatResult<Record> {
    let int = |i: usize| -> FormatResult<i64> {
        match values.get(i) {
            Some(Value::Int(v)) => Ok(*v),
            Some(Value::Real(v)) => Err(FormatError::InvalidValue {
                keyword,
                position,
                text: v.to_string(),
            }),
            None => Err(FormatError::Truncated { keyword, position }),
        }
    };
    let real = |i: usize| -> FormatResult<f64> {
        match values.get(i) {
            Some(Value::Real(v)) => Ok(*v),
            Some(Value::Int(v)) => Ok(*v as f64),
            None => Err(FormatError::Truncated { keyword, position }),
        }
    };
    let index = |i: usize| -> FormatResult<usize> {
        let value = int(i)?;
        usize::try_from(value)
            .ok()
            .and_then(from_one_based)
            .ok_or(FormatError::BadIndex {
                keyword,
                position,
                value,
            })
    };
    let tag = |i: usize| -> FormatResult<i32> {
        let value = int(i)?;
        i32::try_from(value).map_err(|_| FormatError::InvalidValue {
            keyword,
            position,
            text: value.to_string(),
        })
    };

    match keyword.shape() {
        RecordShape::Vertex => {
            let dimension = values.len().saturating_sub(1);
            let mut coords = [0.0; 3];
            for (axis, coord) in coords.iter_mut().enumerate().take(dimension) {
                *coord = real(axis)?;
            }
            Ok(Record::Vertex {
                coords,
                tag: tag(dimension)?,
            })
        }
        RecordShape::Element(n) => {
            let nodes = (0..n).map(index).collect::<FormatResult<Vec<_>>>()?;
            Ok(Record::Element {
                nodes,
                tag: tag(n)?,
            })
        }
        RecordShape::Index => Ok(Record::Index(index(0)?)),
        RecordShape::SubDomain => {
            let count = int(0)?;
            let seed_kind =
                SeedKind::from_node_count(count).ok_or_else(|| FormatError::InvalidValue {
                    keyword,
                    position,
                    text: count.to_string(),
                })?;
            Ok(Record::SubDomain(SubDomain::new(
                tag(3)?,
                seed_kind,
                index(1)?,
                tag(2)?,
            )))
        }
        RecordShape::Solution => Ok(Record::Solution(
            (0..values.len()).map(real).collect::<FormatResult<_>>()?,
        )),
        RecordShape::Marker => Err(FormatError::InvalidContent(format!(
            "{} carries no records",
            keyword
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_indices_are_shifted() {
        let fields = layout(Keyword::Tetrahedra, 3, &[]);
        let record = Record::element(&[0, 1, 2, 3], 5);
        let values = encode(Keyword::Tetrahedra, &record, &fields).unwrap();
        assert_eq!(
            values,
            vec![
                Value::Int(1),
                Value::Int(2),
                Value::Int(3),
                Value::Int(4),
                Value::Int(5)
            ]
        );
        assert_eq!(decode(Keyword::Tetrahedra, &values, 0).unwrap(), record);
    }

    #[test]
    fn test_arity_is_fixed_by_keyword() {
        let fields = layout(Keyword::Triangles, 3, &[]);
        let err = encode(Keyword::Triangles, &Record::element(&[0, 1], 0), &fields).unwrap_err();
        assert!(matches!(err, FormatError::ArityMismatch { expected: 4, .. }));
    }

    #[test]
    fn test_zero_index_on_disk_is_rejected() {
        let values = [Value::Int(0)];
        let err = decode(Keyword::RequiredVertices, &values, 12).unwrap_err();
        assert!(matches!(err, FormatError::BadIndex { value: 0, position: 12, .. }));
    }

    #[test]
    fn test_subdomain_layout() {
        let sub = SubDomain::new(2, SeedKind::Triangle, 9, -1);
        let fields = layout(Keyword::SubDomainFromGeom, 3, &[]);
        let values = encode(Keyword::SubDomainFromGeom, &Record::SubDomain(sub), &fields).unwrap();
        assert_eq!(values[0], Value::Int(3));
        assert_eq!(values[1], Value::Int(10));
        assert_eq!(
            decode(Keyword::SubDomainFromGeom, &values, 0).unwrap(),
            Record::SubDomain(sub)
        );
    }

    #[test]
    fn test_solution_width_follows_types() {
        let fields = layout(Keyword::SolAtVertices, 3, &[SolType::Scalar, SolType::Vector]);
        assert_eq!(fields.len(), 4);
    }
}
