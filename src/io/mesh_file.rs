// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Tetralink Team

//! Whole-mesh helpers on top of the record codec

use nalgebra::Point3;
use std::path::Path;
use tracing::debug;

use super::keyword::{Keyword, SolType};
use super::reader::MeshReader;
use super::record::Record;
use super::writer::MeshWriter;
use crate::error::{FormatError, FormatResult, TetraError, TetraResult};
use crate::mesh::{Element, ExchangeMesh, VolumeMesh};

/// Default format version for files handed to the engine.
pub const DEFAULT_VERSION: i32 = 2;

/// Anything that serves keyword blocks record by record: a file reader or an
/// engine session holding an output mesh.
pub trait RecordSource {
    fn stat_block(&self, keyword: Keyword) -> TetraResult<usize>;

    fn seek_block(&mut self, keyword: Keyword) -> TetraResult<()>;

    fn read_record(&mut self, keyword: Keyword) -> TetraResult<Record>;
}

impl RecordSource for MeshReader {
    fn stat_block(&self, keyword: Keyword) -> TetraResult<usize> {
        Ok(MeshReader::stat_block(self, keyword))
    }

    fn seek_block(&mut self, keyword: Keyword) -> TetraResult<()> {
        Ok(MeshReader::seek_block(self, keyword)?)
    }

    fn read_record(&mut self, keyword: Keyword) -> TetraResult<Record> {
        Ok(MeshReader::read_record(self, keyword)?)
    }
}

fn write_elements<const N: usize>(
    writer: &mut MeshWriter,
    keyword: Keyword,
    elements: &[Element<N>],
) -> FormatResult<()> {
    writer.declare_block(keyword, elements.len())?;
    for element in elements {
        writer.write_record(keyword, &Record::element(&element.nodes, element.tag))?;
    }
    Ok(())
}

fn write_indices(
    writer: &mut MeshWriter,
    keyword: Keyword,
    indices: std::ops::Range<usize>,
) -> FormatResult<()> {
    writer.declare_block(keyword, indices.len())?;
    for index in indices {
        writer.write_record(keyword, &Record::Index(index))?;
    }
    Ok(())
}

/// Write the engine input file: every vertex, the required vertex suffix,
/// edges, triangles and tetrahedra with their required trailing ranges.
pub fn write_exchange_mesh(
    path: impl AsRef<Path>,
    mesh: &ExchangeMesh,
    version: i32,
) -> FormatResult<()> {
    let mut writer = MeshWriter::create(path.as_ref(), version, 3)?;

    writer.declare_block(Keyword::Vertices, mesh.nb_vertices())?;
    for p in mesh.vertices() {
        writer.write_record(Keyword::Vertices, &Record::vertex(p.x, p.y, p.z, 0))?;
    }
    write_indices(&mut writer, Keyword::RequiredVertices, mesh.required_vertex_range())?;

    write_elements(&mut writer, Keyword::Edges, mesh.edges())?;
    write_indices(&mut writer, Keyword::RequiredEdges, mesh.required_edge_range())?;

    write_elements(&mut writer, Keyword::Triangles, mesh.triangles())?;
    write_indices(
        &mut writer,
        Keyword::RequiredTriangles,
        mesh.required_triangle_range(),
    )?;

    write_elements(&mut writer, Keyword::Tetrahedra, mesh.tetrahedra())?;
    writer.close()?;

    debug!(
        "wrote {} vertices ({} required), {} triangles, {} tetrahedra to {}",
        mesh.nb_vertices(),
        mesh.nb_required_vertices(),
        mesh.triangles().len(),
        mesh.tetrahedra().len(),
        path.as_ref().display()
    );
    Ok(())
}

/// Write one scalar size per entry of `sizes` as `SolAtVertices`.
pub fn write_size_map(path: impl AsRef<Path>, sizes: &[f64], version: i32) -> FormatResult<()> {
    let mut writer = MeshWriter::create(path, version, 3)?;
    writer.declare_solution_block(Keyword::SolAtVertices, sizes.len(), &[SolType::Scalar])?;
    for &size in sizes {
        writer.write_record(Keyword::SolAtVertices, &Record::Solution(vec![size]))?;
    }
    writer.close()
}

/// Read the scalar sizes of a `.sol`/`.solb` file.
pub fn read_size_map(path: impl AsRef<Path>) -> FormatResult<Vec<f64>> {
    let mut reader = MeshReader::open(path)?;
    let types = reader.solution_types(Keyword::SolAtVertices);
    if !types.is_empty() && types != [SolType::Scalar] {
        return Err(FormatError::InvalidContent(format!(
            "size map must hold one scalar per vertex, found {:?}",
            types
        )));
    }
    reader
        .read_block(Keyword::SolAtVertices)?
        .into_iter()
        .map(|record| match record {
            Record::Solution(values) => Ok(values.first().copied().unwrap_or(0.0)),
            _ => Err(FormatError::InvalidContent(
                "unexpected record in size map".into(),
            )),
        })
        .collect()
}

fn read_indices(reader: &mut MeshReader, keyword: Keyword) -> FormatResult<Vec<usize>> {
    reader
        .read_block(keyword)?
        .into_iter()
        .map(|record| match record {
            Record::Index(i) => Ok(i),
            _ => Err(FormatError::InvalidContent(format!(
                "unexpected record in {}",
                keyword
            ))),
        })
        .collect()
}

/// Start of the trailing range described by `indices`, which must be exactly
/// the last `indices.len()` entries of a list of `total`.
fn required_suffix(keyword: Keyword, indices: &[usize], total: usize) -> FormatResult<usize> {
    let start = total.checked_sub(indices.len()).ok_or_else(|| {
        FormatError::InvalidContent(format!("{} lists more entries than exist", keyword))
    })?;
    let mut sorted = indices.to_vec();
    sorted.sort_unstable();
    if sorted.iter().copied().ne(start..total) {
        return Err(FormatError::InvalidContent(format!(
            "{} must designate the trailing entries",
            keyword
        )));
    }
    Ok(start)
}

fn elements<const N: usize>(
    source: &mut dyn RecordSource,
    keyword: Keyword,
) -> TetraResult<Vec<Element<N>>> {
    let count = source.stat_block(keyword)?;
    source.seek_block(keyword)?;
    (0..count)
        .map(|_| match source.read_record(keyword)? {
            Record::Element { nodes, tag } => {
                let nodes: [usize; N] = nodes.as_slice().try_into().map_err(|_| {
                    FormatError::ArityMismatch {
                        keyword,
                        expected: N,
                        got: nodes.len(),
                    }
                })?;
                Ok(Element::new(nodes, tag))
            }
            _ => Err(FormatError::InvalidContent(format!("unexpected record in {}", keyword)).into()),
        })
        .collect()
}

/// Read an engine input file back into an [`ExchangeMesh`], with the sizes of
/// the required vertices taken from `size_map` when given.
pub fn read_exchange_mesh(
    path: impl AsRef<Path>,
    size_map: Option<&Path>,
) -> FormatResult<ExchangeMesh> {
    let mut reader = MeshReader::open(path)?;
    let invalid = |e: TetraError| FormatError::InvalidContent(e.to_string());

    let vertices: Vec<Point3<f64>> = reader
        .read_block(Keyword::Vertices)?
        .into_iter()
        .filter_map(|record| match record {
            Record::Vertex { coords, .. } => Some(Point3::from(coords)),
            _ => None,
        })
        .collect();
    let required = read_indices(&mut reader, Keyword::RequiredVertices)?;
    let first_required = required_suffix(Keyword::RequiredVertices, &required, vertices.len())?;

    let sizes = match size_map {
        Some(sol) => read_size_map(sol)?,
        None => Vec::new(),
    };
    if !sizes.is_empty() && sizes.len() != required.len() {
        return Err(FormatError::InvalidContent(format!(
            "size map holds {} values for {} required vertices",
            sizes.len(),
            required.len()
        )));
    }

    let mut mesh = ExchangeMesh::with_capacity(vertices.len(), reader.stat_block(Keyword::Triangles));
    for (i, point) in vertices.into_iter().enumerate() {
        if i < first_required {
            mesh.push_vertex(point).map_err(invalid)?;
        } else {
            let size = sizes.get(i - first_required).copied().unwrap_or(0.0);
            mesh.push_required_vertex(point, size);
        }
    }

    let edges = elements::<2>(&mut reader, Keyword::Edges).map_err(invalid)?;
    let required = read_indices(&mut reader, Keyword::RequiredEdges)?;
    let first_required = required_suffix(Keyword::RequiredEdges, &required, edges.len())?;
    for (i, edge) in edges.into_iter().enumerate() {
        if i < first_required {
            mesh.push_edge(edge).map_err(invalid)?;
        } else {
            mesh.push_required_edge(edge);
        }
    }

    let triangles = elements::<3>(&mut reader, Keyword::Triangles).map_err(invalid)?;
    let required = read_indices(&mut reader, Keyword::RequiredTriangles)?;
    let first_required = required_suffix(Keyword::RequiredTriangles, &required, triangles.len())?;
    for (i, triangle) in triangles.into_iter().enumerate() {
        if i < first_required {
            mesh.push_triangle(triangle).map_err(invalid)?;
        } else {
            mesh.push_required_triangle(triangle);
        }
    }

    for tetra in elements::<4>(&mut reader, Keyword::Tetrahedra).map_err(invalid)? {
        mesh.push_tetrahedron(tetra);
    }
    reader.close();

    mesh.validate().map_err(invalid)?;
    Ok(mesh)
}

/// Rebuild a [`VolumeMesh`] from any record source.
pub fn load_volume_mesh(source: &mut dyn RecordSource) -> TetraResult<VolumeMesh> {
    let mut mesh = VolumeMesh::new();

    let count = source.stat_block(Keyword::Vertices)?;
    source.seek_block(Keyword::Vertices)?;
    mesh.nodes.reserve(count);
    for _ in 0..count {
        match source.read_record(Keyword::Vertices)? {
            Record::Vertex { coords, tag } => {
                mesh.nodes.push(Point3::from(coords));
                mesh.node_tags.push(tag);
            }
            _ => {
                return Err(FormatError::InvalidContent("unexpected record in Vertices".into()).into())
            }
        }
    }

    mesh.edges = elements(source, Keyword::Edges)?;
    mesh.triangles = elements(source, Keyword::Triangles)?;
    mesh.quadrilaterals = elements(source, Keyword::Quadrilaterals)?;
    mesh.tetrahedra = elements(source, Keyword::Tetrahedra)?;
    mesh.hexahedra = elements(source, Keyword::Hexahedra)?;

    let count = source.stat_block(Keyword::SubDomainFromGeom)?;
    source.seek_block(Keyword::SubDomainFromGeom)?;
    for _ in 0..count {
        if let Record::SubDomain(sub) = source.read_record(Keyword::SubDomainFromGeom)? {
            mesh.subdomains.push(sub);
        }
    }

    let count = source.stat_block(Keyword::RequiredVertices)?;
    source.seek_block(Keyword::RequiredVertices)?;
    for _ in 0..count {
        if let Record::Index(i) = source.read_record(Keyword::RequiredVertices)? {
            mesh.required_vertices.push(i);
        }
    }

    let nb_nodes = mesh.nodes.len();
    let dangling = mesh.edges.iter().filter_map(|e| e.max_node())
        .chain(mesh.triangles.iter().filter_map(|e| e.max_node()))
        .chain(mesh.quadrilaterals.iter().filter_map(|e| e.max_node()))
        .chain(mesh.tetrahedra.iter().filter_map(|e| e.max_node()))
        .chain(mesh.hexahedra.iter().filter_map(|e| e.max_node()))
        .chain(mesh.required_vertices.iter().copied())
        .find(|&node| node >= nb_nodes);
    if let Some(node) = dangling {
        return Err(FormatError::InvalidContent(format!(
            "node {} referenced but only {} nodes exist",
            node + 1,
            nb_nodes
        ))
        .into());
    }

    debug!(
        "loaded {} nodes, {} tetrahedra, {} sub-domains",
        mesh.nodes.len(),
        mesh.tetrahedra.len(),
        mesh.subdomains.len()
    );
    Ok(mesh)
}

/// Read a volume mesh file.
pub fn read_volume_mesh(path: impl AsRef<Path>) -> TetraResult<VolumeMesh> {
    let mut reader = MeshReader::open(path)?;
    let mesh = load_volume_mesh(&mut reader)?;
    reader.close();
    Ok(mesh)
}

/// Write a volume mesh file.
pub fn write_volume_mesh(
    path: impl AsRef<Path>,
    mesh: &VolumeMesh,
    version: i32,
) -> FormatResult<()> {
    let mut writer = MeshWriter::create(path, version, 3)?;

    writer.declare_block(Keyword::Vertices, mesh.nodes.len())?;
    for (i, p) in mesh.nodes.iter().enumerate() {
        let tag = mesh.node_tags.get(i).copied().unwrap_or(0);
        writer.write_record(Keyword::Vertices, &Record::vertex(p.x, p.y, p.z, tag))?;
    }
    writer.declare_block(Keyword::RequiredVertices, mesh.required_vertices.len())?;
    for &i in &mesh.required_vertices {
        writer.write_record(Keyword::RequiredVertices, &Record::Index(i))?;
    }
    write_elements(&mut writer, Keyword::Edges, &mesh.edges)?;
    write_elements(&mut writer, Keyword::Triangles, &mesh.triangles)?;
    write_elements(&mut writer, Keyword::Quadrilaterals, &mesh.quadrilaterals)?;
    write_elements(&mut writer, Keyword::Tetrahedra, &mesh.tetrahedra)?;
    write_elements(&mut writer, Keyword::Hexahedra, &mesh.hexahedra)?;
    writer.declare_block(Keyword::SubDomainFromGeom, mesh.subdomains.len())?;
    for sub in &mesh.subdomains {
        writer.write_record(Keyword::SubDomainFromGeom, &Record::SubDomain(*sub))?;
    }
    writer.close()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{Edge, Tetrahedron, Triangle};
    use tempfile::tempdir;

    #[test]
    fn test_required_suffix_check() {
        assert_eq!(required_suffix(Keyword::RequiredVertices, &[4, 3], 5).unwrap(), 3);
        assert_eq!(required_suffix(Keyword::RequiredVertices, &[], 5).unwrap(), 5);
        assert!(required_suffix(Keyword::RequiredVertices, &[1], 5).is_err());
        assert!(required_suffix(Keyword::RequiredVertices, &[0, 1, 2], 2).is_err());
    }

    #[test]
    fn test_size_map_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sizes.solb");
        write_size_map(&path, &[0.5, 0.0, 2.0], DEFAULT_VERSION).unwrap();
        assert_eq!(read_size_map(&path).unwrap(), vec![0.5, 0.0, 2.0]);
    }

    #[test]
    fn test_exchange_mesh_with_required_entities() {
        let dir = tempdir().unwrap();
        let mesh_path = dir.path().join("in.mesh");
        let sol_path = dir.path().join("in.sol");

        let mut mesh = ExchangeMesh::new();
        for i in 0..4 {
            mesh.push_vertex(Point3::new(i as f64, (i * i) as f64, 0.5)).unwrap();
        }
        mesh.push_required_vertex(Point3::new(9.0, 9.0, 9.0), 0.25);
        mesh.push_edge(Edge::new([0, 1], 0)).unwrap();
        mesh.push_required_edge(Edge::new([1, 4], 3));
        mesh.push_triangle(Triangle::new([0, 1, 2], 1)).unwrap();
        mesh.push_tetrahedron(Tetrahedron::new([0, 1, 2, 3], 2));

        write_exchange_mesh(&mesh_path, &mesh, DEFAULT_VERSION).unwrap();
        write_size_map(&sol_path, mesh.required_sizes(), DEFAULT_VERSION).unwrap();

        let back = read_exchange_mesh(&mesh_path, Some(&sol_path)).unwrap();
        assert_eq!(back, mesh);
    }

    #[test]
    fn test_volume_mesh_file_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.meshb");
        let mut mesh = VolumeMesh::new();
        mesh.nodes = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(0.0, 0.0, 1.0),
        ];
        mesh.node_tags = vec![0; 4];
        mesh.triangles.push(Triangle::new([0, 2, 1], 1));
        mesh.tetrahedra.push(Tetrahedron::new([0, 1, 2, 3], 1));
        mesh.required_vertices.push(3);
        mesh.subdomains.push(crate::mesh::SubDomain::new(
            1,
            crate::mesh::SeedKind::Triangle,
            0,
            1,
        ));

        write_volume_mesh(&path, &mesh, 3).unwrap();
        let back = read_volume_mesh(&path).unwrap();
        assert_eq!(back, mesh);
    }
}
