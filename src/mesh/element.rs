// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Tetralink Team

//! Fixed-arity connectivity records and sub-domain descriptors

/// An element with `N` node indices (0-based) and a domain/group tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Element<const N: usize> {
    pub nodes: [usize; N],
    pub tag: i32,
}

impl<const N: usize> Element<N> {
    pub fn new(nodes: [usize; N], tag: i32) -> Self {
        Self { nodes, tag }
    }

    /// Element with tag 0.
    pub fn untagged(nodes: [usize; N]) -> Self {
        Self { nodes, tag: 0 }
    }

    /// Shift every node index by `offset`.
    pub fn offset(&self, offset: usize) -> Self {
        let mut nodes = self.nodes;
        for node in &mut nodes {
            *node += offset;
        }
        Self {
            nodes,
            tag: self.tag,
        }
    }

    pub fn max_node(&self) -> Option<usize> {
        self.nodes.iter().copied().max()
    }
}

pub type Edge = Element<2>;
pub type Triangle = Element<3>;
pub type Quadrilateral = Element<4>;
pub type Tetrahedron = Element<4>;
pub type Hexahedron = Element<8>;

/// Kind of face used as a sub-domain seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SeedKind {
    Triangle,
    Quadrilateral,
}

impl SeedKind {
    /// Node count of the seed face, as stored in `SubDomainFromGeom` records.
    pub fn node_count(self) -> i32 {
        match self {
            Self::Triangle => 3,
            Self::Quadrilateral => 4,
        }
    }

    pub fn from_node_count(count: i64) -> Option<Self> {
        match count {
            3 => Some(Self::Triangle),
            4 => Some(Self::Quadrilateral),
            _ => None,
        }
    }
}

/// One connected volume region, identified by a tag and a seed face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubDomain {
    pub tag: i32,
    pub seed_kind: SeedKind,
    /// 0-based index of the seed face in the triangle (or quad) list.
    pub seed_index: usize,
    /// +1 when the seed face normal points into the sub-domain, -1 otherwise.
    pub orientation: i32,
}

impl SubDomain {
    pub fn new(tag: i32, seed_kind: SeedKind, seed_index: usize, orientation: i32) -> Self {
        Self {
            tag,
            seed_kind,
            seed_index,
            orientation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_keeps_tag() {
        let tri = Triangle::new([0, 1, 2], 7);
        let shifted = tri.offset(10);
        assert_eq!(shifted.nodes, [10, 11, 12]);
        assert_eq!(shifted.tag, 7);
        assert_eq!(shifted.max_node(), Some(12));
    }

    #[test]
    fn test_seed_kind_node_count() {
        assert_eq!(SeedKind::from_node_count(3), Some(SeedKind::Triangle));
        assert_eq!(SeedKind::from_node_count(4), Some(SeedKind::Quadrilateral));
        assert_eq!(SeedKind::from_node_count(5), None);
        assert_eq!(SeedKind::Quadrilateral.node_count(), 4);
    }
}
