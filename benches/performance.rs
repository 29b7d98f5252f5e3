// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Tetralink Team

//! Performance benchmarks

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use nalgebra::{Point3, Vector3};
use std::collections::HashMap;
use std::sync::Arc;
use tempfile::TempDir;

use tetralink::engine::StarEngine;
use tetralink::io::{read_exchange_mesh, write_exchange_mesh};
use tetralink::mesh::{ExchangeMesh, SurfaceMesh, Triangle};
use tetralink::session::ProgressTracker;
use tetralink::{ProgressChannel, Session};

/// Unit cube surface with `n` x `n` quads per face, split into triangles.
fn tessellated_cube(n: i64) -> SurfaceMesh {
    let mut surface = SurfaceMesh::new();
    let mut index: HashMap<[i64; 3], usize> = HashMap::new();
    let scale = 1.0 / n as f64;

    let mut vertex = |surface: &mut SurfaceMesh, lattice: [i64; 3]| {
        *index.entry(lattice).or_insert_with(|| {
            surface.add_vertex(Point3::new(
                lattice[0] as f64 * scale,
                lattice[1] as f64 * scale,
                lattice[2] as f64 * scale,
            ))
        })
    };

    for axis in 0..3 {
        for side in [0, n] {
            let (u, v) = ((axis + 1) % 3, (axis + 2) % 3);
            let mut outward = Vector3::zeros();
            outward[axis] = if side == 0 { -1.0 } else { 1.0 };
            for i in 0..n {
                for j in 0..n {
                    let mut corners = [[0i64; 3]; 4];
                    for (k, (di, dj)) in [(0, 0), (1, 0), (1, 1), (0, 1)].into_iter().enumerate() {
                        corners[k][axis] = side;
                        corners[k][u] = i + di;
                        corners[k][v] = j + dj;
                    }
                    let ids = corners.map(|c| vertex(&mut surface, c));
                    for tri in [[ids[0], ids[1], ids[2]], [ids[0], ids[2], ids[3]]] {
                        let [a, b, c] = tri.map(|id| surface.vertices[id]);
                        let normal = (b - a).cross(&(c - a));
                        let nodes = if normal.dot(&outward) > 0.0 {
                            tri
                        } else {
                            [tri[0], tri[2], tri[1]]
                        };
                        surface.add_triangle(Triangle::new(nodes, 1));
                    }
                }
            }
        }
    }
    surface
}

fn bench_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec");
    let dir = TempDir::new().unwrap();

    for n in [8, 32] {
        let input = ExchangeMesh::from_surface(&tessellated_cube(n));
        for name in ["surface.mesh", "surface.meshb"] {
            let id = format!("{}_{}", n, name);
            let path = dir.path().join(&id);
            group.bench_with_input(BenchmarkId::new("write", &id), &input, |b, mesh| {
                b.iter(|| write_exchange_mesh(black_box(&path), mesh, 2).unwrap());
            });
            write_exchange_mesh(&path, &input, 2).unwrap();
            group.bench_with_input(BenchmarkId::new("read", &id), &path, |b, path| {
                b.iter(|| read_exchange_mesh(black_box(path), None).unwrap());
            });
        }
    }

    group.finish();
}

fn bench_star_fill(c: &mut Criterion) {
    let mut group = c.benchmark_group("star_fill");
    let engine = StarEngine::new();

    for n in [4, 16, 32] {
        let input = Arc::new(ExchangeMesh::from_surface(&tessellated_cube(n)));
        group.bench_with_input(BenchmarkId::new("cube", n), &input, |b, input| {
            b.iter(|| {
                let mut session = Session::initialize(&engine, ProgressChannel::new()).unwrap();
                session.bind_input_surface(Arc::clone(input)).unwrap();
                session.set_parameter("verbose", "0");
                black_box(session.compute().unwrap())
            });
        });
    }

    group.finish();
}

fn bench_progress(c: &mut Criterion) {
    let tracker = ProgressTracker::new(ProgressChannel::new());
    let lines = [
        "  -- PHASE 1 COMPLETED",
        "     ** ITERATION   3",
        "MGMESSAGE  1009001  0 1 4.200000e1",
        " some unrelated engine output",
    ];
    c.bench_function("progress_observe", |b| {
        b.iter(|| {
            for line in &lines {
                black_box(tracker.observe(black_box(line)));
            }
        });
    });
}

criterion_group!(benches, bench_codec, bench_star_fill, bench_progress);
criterion_main!(benches);
