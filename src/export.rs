use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use image::{ImageBuffer, Rgb, RgbImage};

use crate::error::Result;
use crate::geo::EnrichedPoint;
use crate::mesh::TerrainMesh;
use crate::stats::DiagnosticExport;
use crate::vegetation::VegetationInstance;

/// Write the terrain mesh as Wavefront OBJ (positions, UVs, normals).
pub fn export_obj(mesh: &TerrainMesh, path: &Path) -> Result<()> {
    let mut file = BufWriter::new(File::create(path)?);
    write_obj(mesh, &mut file)?;
    file.flush()?;
    Ok(())
}

pub fn write_obj<W: Write>(mesh: &TerrainMesh, out: &mut W) -> Result<()> {
    writeln!(out, "# terrain {}x{} cells", mesh.resolution, mesh.resolution)?;
    writeln!(
        out,
        "# footprint {:.1}m x {:.1}m, elevation {:.1}m..{:.1}m",
        mesh.width, mesh.height, mesh.min_elevation, mesh.max_elevation
    )?;
    writeln!(out, "o terrain")?;

    for v in &mesh.vertices {
        writeln!(out, "v {} {} {}", v.position[0], v.position[1], v.position[2])?;
    }
    for v in &mesh.vertices {
        writeln!(out, "vt {} {}", v.uv[0], v.uv[1])?;
    }
    for v in &mesh.vertices {
        writeln!(out, "vn {} {} {}", v.normal[0], v.normal[1], v.normal[2])?;
    }

    // OBJ indices are 1-based
    for tri in mesh.indices.chunks_exact(3) {
        let (a, b, c) = (tri[0] + 1, tri[1] + 1, tri[2] + 1);
        writeln!(out, "f {a}/{a}/{a} {b}/{b}/{b} {c}/{c}/{c}")?;
    }
    Ok(())
}

/// Write placed vegetation as a JSON array
pub fn export_vegetation_json(instances: &[VegetationInstance], path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(instances)?;
    std::fs::write(path, json)?;
    Ok(())
}

pub fn export_diagnostics(diagnostics: &DiagnosticExport, path: &Path) -> Result<()> {
    std::fs::write(path, diagnostics.to_json()?)?;
    Ok(())
}

/// Render the enriched grid as a spectral-colored heightmap, north up.
pub fn render_heightmap(points: &[EnrichedPoint], resolution: usize) -> RgbImage {
    let side = resolution + 1;
    let (min, max) = points.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
        (lo.min(p.elevation), hi.max(p.elevation))
    });
    let range = max - min;

    let mut img: RgbImage = ImageBuffer::new(side as u32, side as u32);
    for p in points {
        let t = if range > 0.0 {
            ((p.elevation - min) / range) as f32
        } else {
            0.0
        };
        // Grid row 0 is the southern edge, image row 0 the top
        let px = p.point.grid_x as u32;
        let py = (resolution - p.point.grid_y) as u32;
        img.put_pixel(px, py, Rgb(spectral_colormap(t.clamp(0.0, 1.0))));
    }
    img
}

pub fn export_heightmap(points: &[EnrichedPoint], resolution: usize, path: &Path) -> Result<()> {
    render_heightmap(points, resolution).save(path)?;
    Ok(())
}

/// Spectral colormap (matplotlib style): dark blue -> cyan -> green -> yellow -> orange -> red
fn spectral_colormap(t: f32) -> [u8; 3] {
    let colors: [[f32; 3]; 11] = [
        [0.37, 0.31, 0.64],
        [0.20, 0.53, 0.74],
        [0.40, 0.76, 0.65],
        [0.67, 0.87, 0.64],
        [0.90, 0.96, 0.60],
        [1.00, 1.00, 0.75],
        [1.00, 0.88, 0.55],
        [0.99, 0.68, 0.38],
        [0.96, 0.43, 0.26],
        [0.84, 0.24, 0.31],
        [0.62, 0.00, 0.26],
    ];

    let t_scaled = t * 10.0;
    let idx = (t_scaled as usize).min(9);
    let frac = t_scaled - idx as f32;

    let c1 = colors[idx];
    let c2 = colors[idx + 1];

    [
        ((c1[0] + (c2[0] - c1[0]) * frac) * 255.0) as u8,
        ((c1[1] + (c2[1] - c1[1]) * frac) * 255.0) as u8,
        ((c1[2] + (c2[2] - c1[2]) * frac) * 255.0) as u8,
    ]
}
