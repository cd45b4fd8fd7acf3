//! Displaced terrain mesh construction
//!
//! The mesh is a planar grid in the XZ plane, Y up, centered on the origin
//! and sized to the region's real-world footprint. North is -Z. Vertex
//! heights are offset by the grid's minimum elevation only, never normalized
//! by range, so relative height differences survive at the configured
//! exaggeration.

use bytemuck::{Pod, Zeroable};
use tracing::info;

use crate::error::{Result, TerrainError};
use crate::geo::{EnrichedPoint, GeoBounds};
use crate::providers::SurfaceTexture;

/// Interleaved vertex layout handed to the renderer
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct TerrainVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

/// Surface material for the terrain
#[derive(Clone, Debug)]
pub enum Material {
    /// Satellite-derived texture mapped over the whole footprint
    Textured(SurfaceTexture),
    /// Flat procedural terrain color (linear RGB)
    Flat { color: [f32; 3] },
}

/// Parameters controlling mesh footprint and displacement
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MeshParams {
    pub vertical_scale: f32,
    /// Multiplier on the real-world footprint
    pub zoom_scale: f32,
}

impl Default for MeshParams {
    fn default() -> Self {
        Self {
            vertical_scale: 1.0,
            zoom_scale: 1.0,
        }
    }
}

/// World-space width (X) and depth (Z) of the terrain in meters
pub fn terrain_footprint(bounds: &GeoBounds, zoom_scale: f32) -> (f32, f32) {
    let width = bounds.width_m() as f32 * zoom_scale;
    let height = bounds.height_m() as f32 * zoom_scale;
    (width, height)
}

/// Displaced grid geometry with its material
#[derive(Clone, Debug)]
pub struct TerrainMesh {
    pub vertices: Vec<TerrainVertex>,
    /// Triangle list, counter-clockwise seen from +Y
    pub indices: Vec<u32>,
    pub material: Material,
    pub resolution: usize,
    /// Footprint along X in meters
    pub width: f32,
    /// Footprint along Z in meters
    pub height: f32,
    pub min_elevation: f64,
    pub max_elevation: f64,
    pub vertical_scale: f32,
}

impl TerrainMesh {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Raw vertex buffer for upload
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    /// Surface height at a world-space XZ position, bilinear over the
    /// displaced vertices. `None` outside the footprint.
    pub fn height_at(&self, x: f32, z: f32) -> Option<f32> {
        let r = self.resolution as f32;
        let gx = (x / self.width + 0.5) * r;
        let gy = (0.5 - z / self.height) * r;
        if !(gx >= 0.0 && gx <= r && gy >= 0.0 && gy <= r) {
            return None;
        }

        let x0 = (gx.floor() as usize).min(self.resolution.saturating_sub(1));
        let y0 = (gy.floor() as usize).min(self.resolution.saturating_sub(1));
        let x1 = (x0 + 1).min(self.resolution);
        let y1 = (y0 + 1).min(self.resolution);
        let fx = gx - x0 as f32;
        let fy = gy - y0 as f32;

        let side = self.resolution + 1;
        let h = |gx: usize, gy: usize| self.vertices[gy * side + gx].position[1];

        let h0 = h(x0, y0) * (1.0 - fx) + h(x1, y0) * fx;
        let h1 = h(x0, y1) * (1.0 - fx) + h(x1, y1) * fx;
        Some(h0 * (1.0 - fy) + h1 * fy)
    }
}

/// Build the displaced mesh from the enriched `(R+1)²` grid.
///
/// Also writes each point's world position back into `points`.
pub fn build_mesh(
    points: &mut [EnrichedPoint],
    resolution: usize,
    bounds: &GeoBounds,
    params: &MeshParams,
    material: Material,
) -> Result<TerrainMesh> {
    if points.is_empty() {
        return Err(TerrainError::EmptyInput(
            "cannot build a terrain mesh from zero points".to_string(),
        ));
    }
    let side = resolution + 1;
    if resolution == 0 || points.len() != side * side {
        return Err(TerrainError::InvalidConfig(format!(
            "expected {} points for resolution {}, got {}",
            side * side,
            resolution,
            points.len()
        )));
    }

    let (width, height) = terrain_footprint(bounds, params.zoom_scale);

    let mut min_elevation = f64::INFINITY;
    let mut max_elevation = f64::NEG_INFINITY;
    for p in points.iter() {
        min_elevation = min_elevation.min(p.elevation);
        max_elevation = max_elevation.max(p.elevation);
    }

    let mut vertices = Vec::with_capacity(points.len());
    for p in points.iter_mut() {
        let x = (p.point.norm_x as f32 - 0.5) * width;
        let z = (0.5 - p.point.norm_y as f32) * height;
        let y = ((p.elevation - min_elevation) as f32) * params.vertical_scale;
        p.x = x;
        p.y = y;
        p.z = z;

        vertices.push(TerrainVertex {
            position: [x, y, z],
            normal: [0.0, 1.0, 0.0],
            uv: [p.point.norm_x as f32, 1.0 - p.point.norm_y as f32],
        });
    }

    let indices = grid_indices(resolution);
    compute_smooth_normals(&mut vertices, &indices);

    info!(
        resolution,
        width,
        height,
        min_elevation,
        max_elevation,
        triangles = indices.len() / 3,
        "built terrain mesh"
    );

    Ok(TerrainMesh {
        vertices,
        indices,
        material,
        resolution,
        width,
        height,
        min_elevation,
        max_elevation,
        vertical_scale: params.vertical_scale,
    })
}

/// Two triangles per cell, counter-clockwise seen from +Y
fn grid_indices(resolution: usize) -> Vec<u32> {
    let side = resolution + 1;
    let mut indices = Vec::with_capacity(resolution * resolution * 6);
    for gy in 0..resolution {
        for gx in 0..resolution {
            let a = (gy * side + gx) as u32;
            let b = a + 1;
            let c = ((gy + 1) * side + gx) as u32;
            let d = c + 1;
            indices.extend_from_slice(&[a, b, c, b, d, c]);
        }
    }
    indices
}

/// Area-weighted vertex normals accumulated from the displaced faces
fn compute_smooth_normals(vertices: &mut [TerrainVertex], indices: &[u32]) {
    let mut accum = vec![[0.0f32; 3]; vertices.len()];

    for tri in indices.chunks_exact(3) {
        let (ia, ib, ic) = (tri[0] as usize, tri[1] as usize, tri[2] as usize);
        let a = vertices[ia].position;
        let b = vertices[ib].position;
        let c = vertices[ic].position;
        let e1 = [b[0] - a[0], b[1] - a[1], b[2] - a[2]];
        let e2 = [c[0] - a[0], c[1] - a[1], c[2] - a[2]];
        let n = [
            e1[1] * e2[2] - e1[2] * e2[1],
            e1[2] * e2[0] - e1[0] * e2[2],
            e1[0] * e2[1] - e1[1] * e2[0],
        ];
        for &i in &[ia, ib, ic] {
            accum[i][0] += n[0];
            accum[i][1] += n[1];
            accum[i][2] += n[2];
        }
    }

    for (vertex, n) in vertices.iter_mut().zip(accum) {
        let len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
        vertex.normal = if len > 1e-12 {
            [n[0] / len, n[1] / len, n[2] / len]
        } else {
            [0.0, 1.0, 0.0]
        };
    }
}
