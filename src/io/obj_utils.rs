// Copyright @yucwang 2026

use crate::math::constants::{Float, Vector2f, Vector3f};
use crate::shapes::triangle_mesh::{TriangleI, Vertex};

use wavefront_obj::{obj, ParseError};

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;

#[derive(Debug)]
pub enum ObjLoadError {
    Io(std::io::Error),
    Parse(ParseError),
}

impl From<std::io::Error> for ObjLoadError {
    fn from(err: std::io::Error) -> Self {
        ObjLoadError::Io(err)
    }
}

impl From<ParseError> for ObjLoadError {
    fn from(err: ParseError) -> Self {
        ObjLoadError::Parse(err)
    }
}

impl fmt::Display for ObjLoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjLoadError::Io(err) => write!(f, "io error: {}", err),
            ObjLoadError::Parse(err) => write!(f, "parse error: {}", err),
        }
    }
}

impl std::error::Error for ObjLoadError {}

/// Loads an OBJ file into a flat vertex/triangle pair. Corners sharing the
/// same position/uv/normal triplet collapse to one vertex.
pub fn load_mesh<P: AsRef<Path>>(path: P) -> Result<(Vec<Vertex>, Vec<TriangleI>), ObjLoadError> {
    let data = fs::read_to_string(path)?;
    let obj_set = obj::parse(data)?;

    let mut verts = Vec::new();
    let mut tris = Vec::new();
    for object in &obj_set.objects {
        let mut corner_cache: HashMap<(usize, Option<usize>, Option<usize>), u32> = HashMap::new();

        let mut resolve = |key: obj::VTNIndex| -> u32 {
            let (vi, ti, ni) = key;
            if let Some(&idx) = corner_cache.get(&(vi, ti, ni)) {
                return idx;
            }

            let pos = object.vertices[vi];
            let mut vertex = Vertex::new(Vector3f::new(pos.x as Float, pos.y as Float, pos.z as Float));
            if let Some(ti) = ti {
                let uv = object.tex_vertices[ti];
                vertex.uv = Vector2f::new(uv.u as Float, uv.v as Float);
            }
            if let Some(ni) = ni {
                let n = object.normals[ni];
                vertex.normal = Vector3f::new(n.x as Float, n.y as Float, n.z as Float);
            }

            let idx = verts.len() as u32;
            verts.push(vertex);
            corner_cache.insert((vi, ti, ni), idx);
            idx
        };

        for geometry in &object.geometry {
            for shape in &geometry.shapes {
                if let obj::Primitive::Triangle(a, b, c) = shape.primitive {
                    let v0 = resolve(a);
                    let v1 = resolve(b);
                    let v2 = resolve(c);
                    tris.push(TriangleI::new(v0, v1, v2));
                }
            }
        }
    }

    Ok((verts, tris))
}

/* Tests for the OBJ loader */
