// Copyright @yucwang 2026

use crate::core::bsdf::Bsdf;
use crate::core::bvh::{AccelBuilder, Intersector};
use crate::core::intersection::{IntersectionInfo, IntersectionTemporary};
use crate::core::primitive::{EmissionSample, LightSample, Primitive};
use crate::io::obj_utils;
use crate::math::aabb::AABB;
use crate::math::constants::{Float, Vector2f, Vector3f, PI};
use crate::math::frame::TangentFrame;
use crate::math::ray::Ray3f;
use crate::math::transform::Transform;
use crate::math::warp::{
    sample_cosine_hemisphere, sample_cosine_hemisphere_pdf, sample_uniform_triangle, triangle_area,
};
use crate::sampling::distribution::Distribution1D;
use crate::sampling::sample_generator::SampleGenerator;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone, Copy)]
pub struct Vertex {
    pub pos: Vector3f,
    pub normal: Vector3f,
    pub uv: Vector2f,
}

impl Vertex {
    pub fn new(pos: Vector3f) -> Self {
        Self { pos, normal: Vector3f::zeros(), uv: Vector2f::zeros() }
    }

    pub fn with_uv(pos: Vector3f, uv: Vector2f) -> Self {
        Self { pos, normal: Vector3f::zeros(), uv }
    }

    pub fn with_normal_uv(pos: Vector3f, normal: Vector3f, uv: Vector2f) -> Self {
        Self { pos, normal, uv }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TriangleI {
    pub vs: [u32; 3],
    pub material: usize,
}

impl TriangleI {
    pub fn new(v0: u32, v1: u32, v2: u32) -> Self {
        Self { vs: [v0, v1, v2], material: 0 }
    }
}

// Vertices whose accumulated normal disagrees with an incident face by more
// than 0.15 pi radians are split instead of averaged.
fn smooth_split_limit() -> Float {
    (PI * 0.15).cos()
}

fn position_key(p: &Vector3f) -> [u32; 3] {
    [p.x.to_bits(), p.y.to_bits(), p.z.to_bits()]
}

/// Indexed triangle mesh. Ray traversal is delegated to an accelerator
/// built in `prepare_for_render`; area sampling runs off a per-triangle
/// area table built at the same time.
pub struct TriangleMesh {
    verts: Vec<Vertex>,
    tris: Vec<TriangleI>,
    bsdfs: Vec<Arc<dyn Bsdf>>,
    smoothed: bool,
    backface_culling: bool,
    normals_computed: bool,
    transform: Transform,
    tf_verts: Vec<Vertex>,
    bounds: AABB,
    total_area: Float,
    tri_sampler: Option<Distribution1D>,
    intersector: Option<Box<dyn Intersector>>,
}

impl TriangleMesh {
    pub fn new(
        verts: Vec<Vertex>,
        tris: Vec<TriangleI>,
        bsdfs: Vec<Arc<dyn Bsdf>>,
        smoothed: bool,
        backface_culling: bool,
    ) -> Self {
        assert!(!bsdfs.is_empty(), "triangle mesh needs at least one bsdf");
        Self {
            verts,
            tris,
            bsdfs,
            smoothed,
            backface_culling,
            normals_computed: false,
            transform: Transform::default(),
            tf_verts: Vec::new(),
            bounds: AABB::default(),
            total_area: 0.0,
            tri_sampler: None,
            intersector: None,
        }
    }

    /// Loads an OBJ file; an unreadable file leaves the mesh empty, which
    /// downstream treats as a delta (degenerate) primitive.
    pub fn from_file<P: AsRef<Path>>(
        path: P,
        bsdf: Arc<dyn Bsdf>,
        smoothed: bool,
        backface_culling: bool,
    ) -> Self {
        let (verts, tris) = match obj_utils::load_mesh(&path) {
            Ok(mesh) => mesh,
            Err(err) => {
                log::warn!(
                    "unable to load triangle mesh at '{}': {}",
                    path.as_ref().display(),
                    err
                );
                (Vec::new(), Vec::new())
            }
        };
        Self::new(verts, tris, vec![bsdf], smoothed, backface_culling)
    }

    /// Unit cube centered at the origin, four vertices per face.
    pub fn make_cube(bsdf: Arc<dyn Bsdf>, smoothed: bool) -> Self {
        const FACES: [[[Float; 3]; 4]; 6] = [
            [[-0.5, -0.5, -0.5], [-0.5, -0.5, 0.5], [0.5, -0.5, 0.5], [0.5, -0.5, -0.5]],
            [[-0.5, 0.5, 0.5], [-0.5, 0.5, -0.5], [0.5, 0.5, -0.5], [0.5, 0.5, 0.5]],
            [[-0.5, 0.5, -0.5], [-0.5, -0.5, -0.5], [0.5, -0.5, -0.5], [0.5, 0.5, -0.5]],
            [[0.5, 0.5, 0.5], [0.5, -0.5, 0.5], [-0.5, -0.5, 0.5], [-0.5, 0.5, 0.5]],
            [[-0.5, 0.5, 0.5], [-0.5, -0.5, 0.5], [-0.5, -0.5, -0.5], [-0.5, 0.5, -0.5]],
            [[0.5, 0.5, -0.5], [0.5, -0.5, -0.5], [0.5, -0.5, 0.5], [0.5, 0.5, 0.5]],
        ];
        const UVS: [[Float; 2]; 4] = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];

        let mut verts = Vec::with_capacity(24);
        let mut tris = Vec::with_capacity(12);
        for face in &FACES {
            let idx = verts.len() as u32;
            tris.push(TriangleI::new(idx, idx + 2, idx + 1));
            tris.push(TriangleI::new(idx, idx + 3, idx + 2));
            for (corner, uv) in face.iter().zip(UVS.iter()) {
                verts.push(Vertex::with_uv(
                    Vector3f::new(corner[0], corner[1], corner[2]),
                    Vector2f::new(uv[0], uv[1]),
                ));
            }
        }

        Self::new(verts, tris, vec![bsdf], smoothed, false)
    }

    /// Sphere tessellated from a subdivided cube projected outward.
    pub fn make_sphere(radius: Float, bsdf: Arc<dyn Bsdf>, smoothed: bool) -> Self {
        const SUB_DIV: i32 = 10;
        const SKIP: u32 = (SUB_DIV * 2 + 1) as u32;

        let mut verts = Vec::new();
        let mut tris = Vec::new();
        let mut idx = 0u32;
        for f in 0..3usize {
            for s in [-1.0 as Float, 1.0] {
                for u in -SUB_DIV..=SUB_DIV {
                    for v in -SUB_DIV..=SUB_DIV {
                        let mut p = Vector3f::zeros();
                        p[f] = s;
                        p[(f + 1) % 3] = u as Float * (1.0 / SUB_DIV as Float) * s;
                        p[(f + 2) % 3] = v as Float * (1.0 / SUB_DIV as Float);
                        verts.push(Vertex::new(p.normalize() * radius));

                        if v > -SUB_DIV && u > -SUB_DIV {
                            tris.push(TriangleI::new(idx - SKIP - 1, idx, idx - SKIP));
                            tris.push(TriangleI::new(idx - SKIP - 1, idx - 1, idx));
                        }
                        idx += 1;
                    }
                }
            }
        }

        Self::new(verts, tris, vec![bsdf], smoothed, false)
    }

    pub fn set_transform(&mut self, transform: Transform) {
        self.transform = transform;
    }

    pub fn verts(&self) -> &[Vertex] {
        &self.verts
    }

    pub fn tris(&self) -> &[TriangleI] {
        &self.tris
    }

    pub fn total_area(&self) -> Float {
        self.total_area
    }

    fn unnormalized_geometric_normal_at(&self, triangle: usize) -> Vector3f {
        let t = &self.tris[triangle];
        let p0 = self.tf_verts[t.vs[0] as usize].pos;
        let p1 = self.tf_verts[t.vs[1] as usize].pos;
        let p2 = self.tf_verts[t.vs[2] as usize].pos;
        (p1 - p0).cross(&(p2 - p0))
    }

    fn normal_at(&self, triangle: usize, u: Float, v: Float) -> Vector3f {
        let t = &self.tris[triangle];
        let n0 = self.tf_verts[t.vs[0] as usize].normal;
        let n1 = self.tf_verts[t.vs[1] as usize].normal;
        let n2 = self.tf_verts[t.vs[2] as usize].normal;
        ((1.0 - u - v) * n0 + u * n1 + v * n2).normalize()
    }

    fn uv_at(&self, triangle: usize, u: Float, v: Float) -> Vector2f {
        let t = &self.tris[triangle];
        let uv0 = self.tf_verts[t.vs[0] as usize].uv;
        let uv1 = self.tf_verts[t.vs[1] as usize].uv;
        let uv2 = self.tf_verts[t.vs[2] as usize].uv;
        (1.0 - u - v) * uv0 + u * uv1 + v * uv2
    }

    /// Accumulates face normals into per-vertex normals, duplicating any
    /// vertex where an incident face disagrees with the representative
    /// normal beyond the split threshold.
    pub fn calc_smooth_vertex_normals(&mut self) {
        let split_limit = smooth_split_limit();

        let mut geometric_n = vec![Vector3f::zeros(); self.verts.len()];
        let mut pos_to_vert: HashMap<[u32; 3], Vec<u32>> = HashMap::new();

        for (i, vert) in self.verts.iter_mut().enumerate() {
            vert.normal = Vector3f::zeros();
            pos_to_vert.entry(position_key(&vert.pos)).or_default().push(i as u32);
        }

        // First pass: pick a representative normal per vertex, splitting
        // hard edges.
        for ti in 0..self.tris.len() {
            let t = self.tris[ti];
            let p0 = self.verts[t.vs[0] as usize].pos;
            let p1 = self.verts[t.vs[1] as usize].pos;
            let p2 = self.verts[t.vs[2] as usize].pos;
            let mut normal = (p1 - p0).cross(&(p2 - p0));
            if normal == Vector3f::zeros() {
                normal = Vector3f::new(0.0, 1.0, 0.0);
            } else {
                normal = normal.normalize();
            }

            for corner in 0..3 {
                let vi = self.tris[ti].vs[corner] as usize;
                let n = geometric_n[vi];
                if n == Vector3f::zeros() {
                    geometric_n[vi] = normal;
                } else if n.dot(&normal) < split_limit {
                    self.verts.push(self.verts[vi]);
                    geometric_n.push(normal);
                    self.tris[ti].vs[corner] = (self.verts.len() - 1) as u32;
                }
            }
        }

        // Second pass: sum face normals across position-colocated vertices
        // that agree within the threshold.
        for ti in 0..self.tris.len() {
            let t = self.tris[ti];
            let p0 = self.verts[t.vs[0] as usize].pos;
            let p1 = self.verts[t.vs[1] as usize].pos;
            let p2 = self.verts[t.vs[2] as usize].pos;
            let normal = (p1 - p0).cross(&(p2 - p0));
            let n_normalized = if normal == Vector3f::zeros() {
                Vector3f::new(0.0, 1.0, 0.0)
            } else {
                normal.normalize()
            };

            for corner in 0..3 {
                let vi = t.vs[corner] as usize;
                if let Some(colocated) = pos_to_vert.get(&position_key(&self.verts[vi].pos)) {
                    for &other in colocated {
                        if geometric_n[other as usize].dot(&n_normalized) >= split_limit {
                            self.verts[other as usize].normal += normal;
                        }
                    }
                }
            }
        }

        for (i, vert) in self.verts.iter_mut().enumerate() {
            if vert.normal == Vector3f::zeros() {
                vert.normal = geometric_n[i];
            } else {
                vert.normal = vert.normal.normalize();
            }
        }

        self.normals_computed = true;
    }

    fn compute_bounds(&mut self) {
        let mut bounds = AABB::default();
        for vert in &self.verts {
            bounds.expand_by_point(&self.transform.apply_point(vert.pos));
        }
        self.bounds = bounds;
    }
}

impl Primitive for TriangleMesh {
    fn intersect(&self, ray: &mut Ray3f, data: &mut IntersectionTemporary) -> bool {
        let intersector = match &self.intersector {
            Some(i) => i,
            None => return false,
        };

        let hit = match intersector.intersect(ray) {
            Some(hit) => hit,
            None => return false,
        };
        if !ray.update(hit.t) {
            return false;
        }

        data.ng = self.unnormalized_geometric_normal_at(hit.triangle as usize);
        data.u = hit.u;
        data.v = hit.v;
        data.triangle = hit.triangle;
        data.back_side = data.ng.dot(&ray.dir()) > 0.0;
        true
    }

    fn occluded(&self, ray: &Ray3f) -> bool {
        match &self.intersector {
            Some(intersector) => intersector.occluded(ray),
            None => false,
        }
    }

    fn intersection_info(&self, data: &IntersectionTemporary, p: Vector3f, t: Float) -> IntersectionInfo {
        let ng = data.ng.normalize();
        let ns = if self.smoothed {
            self.normal_at(data.triangle as usize, data.u, data.v)
        } else {
            ng
        };
        let uv = self.uv_at(data.triangle as usize, data.u, data.v);
        let bsdf = Arc::clone(&self.bsdfs[self.tris[data.triangle as usize].material]);

        IntersectionInfo { p, ng, ns, uv, t, primitive: data.primitive, bsdf }
    }

    fn tangent_space(&self, data: &IntersectionTemporary) -> Option<(Vector3f, Vector3f)> {
        let t = &self.tris[data.triangle as usize];
        let p0 = self.tf_verts[t.vs[0] as usize].pos;
        let p1 = self.tf_verts[t.vs[1] as usize].pos;
        let p2 = self.tf_verts[t.vs[2] as usize].pos;
        let uv0 = self.tf_verts[t.vs[0] as usize].uv;
        let uv1 = self.tf_verts[t.vs[1] as usize].uv;
        let uv2 = self.tf_verts[t.vs[2] as usize].uv;

        let q1 = p1 - p0;
        let q2 = p2 - p0;
        let s1 = uv1.x - uv0.x;
        let t1 = uv1.y - uv0.y;
        let s2 = uv2.x - uv0.x;
        let t2 = uv2.y - uv0.y;
        let inv_det = s1 * t2 - s2 * t1;
        if inv_det.abs() < 1e-6 {
            return None;
        }

        let det = 1.0 / inv_det;
        let tangent = det * (q1 * t2 - q2 * t1);
        let bitangent = det * (q2 * s1 - q1 * s2);
        Some((tangent, bitangent))
    }

    fn is_samplable(&self) -> bool {
        self.tri_sampler.as_ref().map(|s| s.is_valid()).unwrap_or(false)
    }

    fn sample_inbound(&self, p: Vector3f, sampler: &mut dyn SampleGenerator) -> Option<LightSample> {
        let tri_sampler = self.tri_sampler.as_ref()?;
        let (idx, _) = tri_sampler.warp(sampler.next_1d());

        let t = &self.tris[idx];
        let p0 = self.tf_verts[t.vs[0] as usize].pos;
        let p1 = self.tf_verts[t.vs[1] as usize].pos;
        let p2 = self.tf_verts[t.vs[2] as usize].pos;
        let normal = (p1 - p0).cross(&(p2 - p0)).normalize();

        let q = sample_uniform_triangle(&sampler.next_2d(), &p0, &p1, &p2);
        let l = q - p;
        let r_sq = l.norm_squared();
        if r_sq <= 0.0 {
            return None;
        }
        let dist = r_sq.sqrt();
        let d = l / dist;
        let cos_theta = -normal.dot(&d);
        if cos_theta <= 0.0 {
            return None;
        }

        Some(LightSample { d, dist, pdf: r_sq / (cos_theta * self.total_area) })
    }

    fn inbound_pdf(&self, info: &IntersectionInfo, p: Vector3f, d: Vector3f) -> Float {
        (p - info.p).norm_squared() / (-d.dot(&info.ng) * self.total_area)
    }

    fn sample_outbound(&self, sampler: &mut dyn SampleGenerator) -> Option<EmissionSample> {
        let tri_sampler = self.tri_sampler.as_ref()?;
        let (idx, _) = tri_sampler.warp(sampler.next_1d());

        let t = &self.tris[idx];
        let p0 = self.tf_verts[t.vs[0] as usize].pos;
        let p1 = self.tf_verts[t.vs[1] as usize].pos;
        let p2 = self.tf_verts[t.vs[2] as usize].pos;
        let normal = (p1 - p0).cross(&(p2 - p0)).normalize();
        let frame = TangentFrame::from_normal(&normal);

        let p = sample_uniform_triangle(&sampler.next_2d(), &p0, &p1, &p2);
        let d_local = sample_cosine_hemisphere(&sampler.next_2d());
        let pdf = sample_cosine_hemisphere_pdf(d_local.z) / self.total_area;

        Some(EmissionSample { p, d: frame.to_global(&d_local), pdf })
    }

    fn bounds(&self) -> AABB {
        self.bounds
    }

    fn is_delta(&self) -> bool {
        self.verts.is_empty() || self.tris.is_empty()
    }

    fn prepare_for_render(&mut self, accel: &dyn AccelBuilder) {
        if self.smoothed && !self.normals_computed {
            self.calc_smooth_vertex_normals();
        }

        self.compute_bounds();
        if self.is_delta() {
            return;
        }

        for tri in self.tris.iter_mut() {
            tri.material = tri.material.min(self.bsdfs.len() - 1);
        }

        self.tf_verts = self
            .verts
            .iter()
            .map(|v| {
                Vertex::with_normal_uv(
                    self.transform.apply_point(v.pos),
                    self.transform.apply_normal(v.normal),
                    v.uv,
                )
            })
            .collect();

        let mut areas = Vec::with_capacity(self.tris.len());
        self.total_area = 0.0;
        for t in &self.tris {
            let area = triangle_area(
                &self.tf_verts[t.vs[0] as usize].pos,
                &self.tf_verts[t.vs[1] as usize].pos,
                &self.tf_verts[t.vs[2] as usize].pos,
            );
            areas.push(area);
            self.total_area += area;
        }
        self.tri_sampler = Some(Distribution1D::new(areas));

        let positions: Vec<Vector3f> = self.tf_verts.iter().map(|v| v.pos).collect();
        let indices: Vec<[u32; 3]> = self.tris.iter().map(|t| t.vs).collect();
        self.intersector = Some(accel.build(&positions, &indices, self.backface_culling));
    }

    fn cleanup_after_render(&mut self) {
        self.intersector = None;
        self.tri_sampler = None;
        self.tf_verts.clear();
    }

    fn num_bsdfs(&self) -> usize {
        self.bsdfs.len()
    }

    fn bsdf(&self, index: usize) -> &Arc<dyn Bsdf> {
        &self.bsdfs[index]
    }
}

/* Tests for TriangleMesh */

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bvh::BvhAccel;
    use crate::materials::lambert::LambertBsdf;
    use crate::math::spectrum::RGBSpectrum;
    use crate::sampling::sample_generator::UniformSampler;
    use crate::textures::constant::ConstantTexture;

    fn test_bsdf() -> Arc<dyn Bsdf> {
        Arc::new(LambertBsdf::new(Box::new(ConstantTexture::new(RGBSpectrum::from_scalar(0.5)))))
    }

    fn quad_mesh() -> TriangleMesh {
        // Unit square in the z = 0 plane, normal facing +z.
        let verts = vec![
            Vertex::with_uv(Vector3f::new(0.0, 0.0, 0.0), Vector2f::new(0.0, 0.0)),
            Vertex::with_uv(Vector3f::new(1.0, 0.0, 0.0), Vector2f::new(1.0, 0.0)),
            Vertex::with_uv(Vector3f::new(1.0, 1.0, 0.0), Vector2f::new(1.0, 1.0)),
            Vertex::with_uv(Vector3f::new(0.0, 1.0, 0.0), Vector2f::new(0.0, 1.0)),
        ];
        let tris = vec![TriangleI::new(0, 1, 2), TriangleI::new(0, 2, 3)];
        TriangleMesh::new(verts, tris, vec![test_bsdf()], false, false)
    }

    #[test]
    fn test_intersect_records_hit_data() {
        let mut mesh = quad_mesh();
        mesh.prepare_for_render(&BvhAccel);

        let mut ray = Ray3f::new(
            Vector3f::new(0.25, 0.25, 2.0),
            Vector3f::new(0.0, 0.0, -1.0),
            None,
            None,
        );
        let mut data = IntersectionTemporary::default();
        assert!(mesh.intersect(&mut ray, &mut data));
        assert!((ray.max_t - 2.0).abs() < 1e-5);

        // Geometric normal faces +z; ray arrives from +z, so front side.
        assert!(data.ng.z > 0.0);
        assert!(!data.back_side);

        let info = mesh.intersection_info(&data, ray.at(ray.max_t), ray.max_t);
        assert!((info.ng - Vector3f::new(0.0, 0.0, 1.0)).norm() < 1e-5);
        assert!((info.uv - Vector2f::new(0.25, 0.25)).norm() < 1e-5);

        // Same ray from behind reports a back-side hit.
        let mut back_ray = Ray3f::new(
            Vector3f::new(0.25, 0.25, -2.0),
            Vector3f::new(0.0, 0.0, 1.0),
            None,
            None,
        );
        assert!(mesh.intersect(&mut back_ray, &mut data));
        assert!(data.back_side);
    }

    #[test]
    fn test_tangent_space_matches_uv_layout() {
        let mut mesh = quad_mesh();
        mesh.prepare_for_render(&BvhAccel);

        let mut ray = Ray3f::new(
            Vector3f::new(0.25, 0.25, 2.0),
            Vector3f::new(0.0, 0.0, -1.0),
            None,
            None,
        );
        let mut data = IntersectionTemporary::default();
        assert!(mesh.intersect(&mut ray, &mut data));

        let (tangent, bitangent) = mesh.tangent_space(&data).expect("tangent space");
        // uv x runs along world x, uv y along world y.
        assert!((tangent.normalize() - Vector3f::new(1.0, 0.0, 0.0)).norm() < 1e-5);
        assert!((bitangent.normalize() - Vector3f::new(0.0, 1.0, 0.0)).norm() < 1e-5);
    }

    #[test]
    fn test_degenerate_uv_tangent_space() {
        let verts = vec![
            Vertex::with_uv(Vector3f::new(0.0, 0.0, 0.0), Vector2f::new(0.5, 0.5)),
            Vertex::with_uv(Vector3f::new(1.0, 0.0, 0.0), Vector2f::new(0.5, 0.5)),
            Vertex::with_uv(Vector3f::new(0.0, 1.0, 0.0), Vector2f::new(0.5, 0.5)),
        ];
        let tris = vec![TriangleI::new(0, 1, 2)];
        let mut mesh = TriangleMesh::new(verts, tris, vec![test_bsdf()], false, false);
        mesh.prepare_for_render(&BvhAccel);

        let data = IntersectionTemporary { triangle: 0, ..Default::default() };
        assert!(mesh.tangent_space(&data).is_none());
    }

    #[test]
    fn test_empty_mesh_is_delta() {
        let mut mesh = TriangleMesh::new(Vec::new(), Vec::new(), vec![test_bsdf()], false, false);
        assert!(mesh.is_delta());
        mesh.prepare_for_render(&BvhAccel);
        assert!(!mesh.is_samplable());

        let mut ray = Ray3f::new(Vector3f::zeros(), Vector3f::new(0.0, 0.0, 1.0), None, None);
        let mut data = IntersectionTemporary::default();
        assert!(!mesh.intersect(&mut ray, &mut data));
        assert!(!mesh.occluded(&ray));
    }

    #[test]
    fn test_missing_file_leaves_empty_mesh() {
        let mesh = TriangleMesh::from_file("/nonexistent/mesh.obj", test_bsdf(), false, false);
        assert!(mesh.is_delta());
    }

    #[test]
    fn test_material_index_clamped() {
        let verts = vec![
            Vertex::new(Vector3f::new(0.0, 0.0, 0.0)),
            Vertex::new(Vector3f::new(1.0, 0.0, 0.0)),
            Vertex::new(Vector3f::new(0.0, 1.0, 0.0)),
        ];
        let mut tri = TriangleI::new(0, 1, 2);
        tri.material = 17;
        let mut mesh = TriangleMesh::new(verts, vec![tri], vec![test_bsdf()], false, false);
        mesh.prepare_for_render(&BvhAccel);
        assert_eq!(mesh.tris()[0].material, 0);
    }

    #[test]
    fn test_smooth_normals_split_cube_corners() {
        // With the split threshold tighter than 90 degrees, no averaging
        // may happen across cube faces: every shading normal stays equal
        // to its face normal.
        let mut mesh = TriangleMesh::make_cube(test_bsdf(), true);
        mesh.calc_smooth_vertex_normals();

        for t in mesh.tris() {
            let p0 = mesh.verts()[t.vs[0] as usize].pos;
            let p1 = mesh.verts()[t.vs[1] as usize].pos;
            let p2 = mesh.verts()[t.vs[2] as usize].pos;
            let face_normal = (p1 - p0).cross(&(p2 - p0)).normalize();
            for &vi in &t.vs {
                let n = mesh.verts()[vi as usize].normal;
                assert!(
                    (n - face_normal).norm() < 1e-5,
                    "vertex normal {:?} != face normal {:?}",
                    n,
                    face_normal
                );
            }
        }
    }

    #[test]
    fn test_smooth_normals_average_on_sphere() {
        let mut mesh = TriangleMesh::make_sphere(1.0, test_bsdf(), true);
        mesh.calc_smooth_vertex_normals();

        // On a tessellated sphere the smoothed vertex normal approximates
        // the radial direction.
        for vert in mesh.verts() {
            let radial = vert.pos.normalize();
            assert!(
                vert.normal.dot(&radial) > 0.9,
                "normal {:?} deviates from radial {:?}",
                vert.normal,
                radial
            );
        }
    }

    #[test]
    fn test_area_sampling_histogram() {
        // Two triangles with a 3:1 area ratio.
        let verts = vec![
            Vertex::new(Vector3f::new(0.0, 0.0, 0.0)),
            Vertex::new(Vector3f::new(3.0, 0.0, 0.0)),
            Vertex::new(Vector3f::new(0.0, 2.0, 0.0)),
            Vertex::new(Vector3f::new(10.0, 0.0, 0.0)),
            Vertex::new(Vector3f::new(11.0, 0.0, 0.0)),
            Vertex::new(Vector3f::new(10.0, 2.0, 0.0)),
        ];
        let tris = vec![TriangleI::new(0, 1, 2), TriangleI::new(3, 4, 5)];
        let mut mesh = TriangleMesh::new(verts, tris, vec![test_bsdf()], false, false);
        mesh.prepare_for_render(&BvhAccel);
        assert!(mesh.is_samplable());
        assert!((mesh.total_area() - 4.0).abs() < 1e-5);

        let mut sampler = UniformSampler::new(77);
        sampler.setup(0, 0);
        let p = Vector3f::new(2.0, 1.0, 5.0);
        let n = 100_000;
        let mut first = 0usize;
        let mut accepted = 0usize;
        for _ in 0..n {
            if let Some(sample) = mesh.sample_inbound(p, &mut sampler) {
                accepted += 1;
                assert!(sample.pdf > 0.0);
                assert!(sample.dist > 0.0);
                // The sampled point lies in the z = 0 plane.
                let hit = p + sample.d * sample.dist;
                assert!(hit.z.abs() < 1e-4);
                if hit.x < 5.0 {
                    first += 1;
                }
            }
        }

        // Both triangles face +z and p sits above them: nothing rejected.
        assert_eq!(accepted, n);
        let fraction = first as Float / accepted as Float;
        assert!((fraction - 0.75).abs() < 0.01, "fraction = {}", fraction);
    }

    #[test]
    fn test_sample_outbound_leaves_front_side() {
        let mut mesh = quad_mesh();
        mesh.prepare_for_render(&BvhAccel);

        let mut sampler = UniformSampler::new(29);
        sampler.setup(0, 0);
        for _ in 0..1000 {
            let sample = mesh.sample_outbound(&mut sampler).expect("sample");
            // The point lies on the quad, the direction in its upper
            // hemisphere (+z), the pdf under cos / (pi * area).
            assert!(sample.p.z.abs() < 1e-5);
            assert!((0.0..=1.0).contains(&sample.p.x));
            assert!((0.0..=1.0).contains(&sample.p.y));
            assert!(sample.d.z >= 0.0);
            assert!(sample.pdf > 0.0);
            assert!(sample.pdf <= crate::math::constants::INV_PI / mesh.total_area() + 1e-4);
        }
    }

    #[test]
    fn test_sample_inbound_rejects_backside() {
        let verts = vec![
            Vertex::new(Vector3f::new(0.0, 0.0, 0.0)),
            Vertex::new(Vector3f::new(1.0, 0.0, 0.0)),
            Vertex::new(Vector3f::new(0.0, 1.0, 0.0)),
        ];
        let tris = vec![TriangleI::new(0, 1, 2)];
        let mut mesh = TriangleMesh::new(verts, tris, vec![test_bsdf()], false, false);
        mesh.prepare_for_render(&BvhAccel);

        // The triangle faces +z; a receiver below it sees the back.
        let mut sampler = UniformSampler::new(3);
        sampler.setup(0, 0);
        let p = Vector3f::new(0.25, 0.25, -4.0);
        for _ in 0..100 {
            assert!(mesh.sample_inbound(p, &mut sampler).is_none());
        }
    }

    #[test]
    fn test_inbound_pdf_matches_sample() {
        let mut mesh = quad_mesh();
        mesh.prepare_for_render(&BvhAccel);

        let p = Vector3f::new(0.3, 0.4, 2.5);
        let mut sampler = UniformSampler::new(13);
        sampler.setup(0, 0);
        let sample = mesh.sample_inbound(p, &mut sampler).expect("sample");

        // Trace the sampled direction back onto the mesh and compare pdfs.
        let mut ray = Ray3f::new(p, sample.d, Some(1e-4), None);
        let mut data = IntersectionTemporary::default();
        assert!(mesh.intersect(&mut ray, &mut data));
        let info = mesh.intersection_info(&data, ray.at(ray.max_t), ray.max_t);
        let pdf = mesh.inbound_pdf(&info, p, sample.d);
        assert!(
            (pdf - sample.pdf).abs() / sample.pdf < 1e-3,
            "pdf {} vs sampled {}",
            pdf,
            sample.pdf
        );
    }

    #[test]
    fn test_transform_applied_at_prepare() {
        let mut mesh = quad_mesh();
        mesh.set_transform(Transform::translate(Vector3f::new(0.0, 0.0, 5.0)));
        mesh.prepare_for_render(&BvhAccel);

        let mut ray = Ray3f::new(
            Vector3f::new(0.5, 0.5, 10.0),
            Vector3f::new(0.0, 0.0, -1.0),
            None,
            None,
        );
        let mut data = IntersectionTemporary::default();
        assert!(mesh.intersect(&mut ray, &mut data));
        assert!((ray.max_t - 5.0).abs() < 1e-4);
        assert!(mesh.bounds().p_min.z > 4.9);
    }
}
