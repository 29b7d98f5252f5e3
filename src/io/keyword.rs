// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Tetralink Team

//! Keyword table of the mesh exchange format
//!
//! Codes follow the libMesh5 numbering so files interoperate with other
//! readers of `.mesh`/`.meshb`. `SubDomainFromGeom` uses slot 29, which that
//! numbering leaves reserved.

use std::fmt;

/// Semantic kind of a block in a mesh file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Keyword {
    Dimension,
    Vertices,
    Edges,
    Triangles,
    Quadrilaterals,
    Tetrahedra,
    Prisms,
    Hexahedra,
    Corners,
    Ridges,
    RequiredVertices,
    RequiredEdges,
    RequiredTriangles,
    RequiredQuadrilaterals,
    SubDomainFromGeom,
    Pyramids,
    End,
    SolAtVertices,
    SolAtEdges,
    SolAtTriangles,
    SolAtQuadrilaterals,
    SolAtTetrahedra,
    SolAtPrisms,
    SolAtHexahedra,
}

/// Fixed shape of the records stored under a keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordShape {
    /// `dimension` coordinates and a tag.
    Vertex,
    /// `n` node indices and a tag.
    Element(usize),
    /// A single index into another block.
    Index,
    /// Seed node count, seed face index, orientation, tag.
    SubDomain,
    /// Real values laid out by the block's solution types.
    Solution,
    /// Header or terminator, carries no records.
    Marker,
}

impl Keyword {
    pub const ALL: [Keyword; 24] = [
        Keyword::Dimension,
        Keyword::Vertices,
        Keyword::Edges,
        Keyword::Triangles,
        Keyword::Quadrilaterals,
        Keyword::Tetrahedra,
        Keyword::Prisms,
        Keyword::Hexahedra,
        Keyword::Corners,
        Keyword::Ridges,
        Keyword::RequiredVertices,
        Keyword::RequiredEdges,
        Keyword::RequiredTriangles,
        Keyword::RequiredQuadrilaterals,
        Keyword::SubDomainFromGeom,
        Keyword::Pyramids,
        Keyword::End,
        Keyword::SolAtVertices,
        Keyword::SolAtEdges,
        Keyword::SolAtTriangles,
        Keyword::SolAtQuadrilaterals,
        Keyword::SolAtTetrahedra,
        Keyword::SolAtPrisms,
        Keyword::SolAtHexahedra,
    ];

    /// Numeric code stored in binary files.
    pub fn code(self) -> i32 {
        match self {
            Self::Dimension => 3,
            Self::Vertices => 4,
            Self::Edges => 5,
            Self::Triangles => 6,
            Self::Quadrilaterals => 7,
            Self::Tetrahedra => 8,
            Self::Prisms => 9,
            Self::Hexahedra => 10,
            Self::Corners => 13,
            Self::Ridges => 14,
            Self::RequiredVertices => 15,
            Self::RequiredEdges => 16,
            Self::RequiredTriangles => 17,
            Self::RequiredQuadrilaterals => 18,
            Self::SubDomainFromGeom => 29,
            Self::Pyramids => 49,
            Self::End => 54,
            Self::SolAtVertices => 62,
            Self::SolAtEdges => 63,
            Self::SolAtTriangles => 64,
            Self::SolAtQuadrilaterals => 65,
            Self::SolAtTetrahedra => 66,
            Self::SolAtPrisms => 67,
            Self::SolAtHexahedra => 68,
        }
    }

    /// Name written in ASCII files.
    pub fn name(self) -> &'static str {
        match self {
            Self::Dimension => "Dimension",
            Self::Vertices => "Vertices",
            Self::Edges => "Edges",
            Self::Triangles => "Triangles",
            Self::Quadrilaterals => "Quadrilaterals",
            Self::Tetrahedra => "Tetrahedra",
            Self::Prisms => "Prisms",
            Self::Hexahedra => "Hexahedra",
            Self::Corners => "Corners",
            Self::Ridges => "Ridges",
            Self::RequiredVertices => "RequiredVertices",
            Self::RequiredEdges => "RequiredEdges",
            Self::RequiredTriangles => "RequiredTriangles",
            Self::RequiredQuadrilaterals => "RequiredQuadrilaterals",
            Self::SubDomainFromGeom => "SubDomainFromGeom",
            Self::Pyramids => "Pyramids",
            Self::End => "End",
            Self::SolAtVertices => "SolAtVertices",
            Self::SolAtEdges => "SolAtEdges",
            Self::SolAtTriangles => "SolAtTriangles",
            Self::SolAtQuadrilaterals => "SolAtQuadrilaterals",
            Self::SolAtTetrahedra => "SolAtTetrahedra",
            Self::SolAtPrisms => "SolAtPrisms",
            Self::SolAtHexahedra => "SolAtHexahedra",
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.code() == code)
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.name() == name)
    }

    pub fn shape(self) -> RecordShape {
        match self {
            Self::Vertices => RecordShape::Vertex,
            Self::Edges => RecordShape::Element(2),
            Self::Triangles => RecordShape::Element(3),
            Self::Quadrilaterals | Self::Tetrahedra => RecordShape::Element(4),
            Self::Pyramids => RecordShape::Element(5),
            Self::Prisms => RecordShape::Element(6),
            Self::Hexahedra => RecordShape::Element(8),
            Self::Corners
            | Self::Ridges
            | Self::RequiredVertices
            | Self::RequiredEdges
            | Self::RequiredTriangles
            | Self::RequiredQuadrilaterals => RecordShape::Index,
            Self::SubDomainFromGeom => RecordShape::SubDomain,
            Self::SolAtVertices
            | Self::SolAtEdges
            | Self::SolAtTriangles
            | Self::SolAtQuadrilaterals
            | Self::SolAtTetrahedra
            | Self::SolAtPrisms
            | Self::SolAtHexahedra => RecordShape::Solution,
            Self::Dimension | Self::End => RecordShape::Marker,
        }
    }

    pub fn is_solution(self) -> bool {
        self.shape() == RecordShape::Solution
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Component type of a solution field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SolType {
    Scalar,
    Vector,
    SymMatrix,
    Matrix,
}

impl SolType {
    pub fn code(self) -> i32 {
        match self {
            Self::Scalar => 1,
            Self::Vector => 2,
            Self::SymMatrix => 3,
            Self::Matrix => 4,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Self::Scalar),
            2 => Some(Self::Vector),
            3 => Some(Self::SymMatrix),
            4 => Some(Self::Matrix),
            _ => None,
        }
    }

    /// Number of reals one value of this type occupies.
    pub fn width(self, dimension: usize) -> usize {
        match self {
            Self::Scalar => 1,
            Self::Vector => dimension,
            Self::SymMatrix => dimension * (dimension + 1) / 2,
            Self::Matrix => dimension * dimension,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_codes_and_names_are_unique() {
        let codes: HashSet<_> = Keyword::ALL.iter().map(|k| k.code()).collect();
        let names: HashSet<_> = Keyword::ALL.iter().map(|k| k.name()).collect();
        assert_eq!(codes.len(), Keyword::ALL.len());
        assert_eq!(names.len(), Keyword::ALL.len());
    }

    #[test]
    fn test_lookup() {
        assert_eq!(Keyword::from_code(8), Some(Keyword::Tetrahedra));
        assert_eq!(Keyword::from_name("RequiredVertices"), Some(Keyword::RequiredVertices));
        assert_eq!(Keyword::from_code(1000), None);
        assert_eq!(Keyword::Tetrahedra.shape(), RecordShape::Element(4));
    }

    #[test]
    fn test_sol_type_width() {
        assert_eq!(SolType::Scalar.width(3), 1);
        assert_eq!(SolType::Vector.width(3), 3);
        assert_eq!(SolType::SymMatrix.width(3), 6);
        assert_eq!(SolType::Matrix.width(2), 4);
    }
}
