//! PNG rendering of decode diagnostics.
//!
//! Three kinds of figures are produced per utterance: a feature heatmap, the
//! stop-token probability curve and the attention maps. Figures are plain
//! rasters with no axes; each data cell covers a `CELL x CELL` pixel block.

use anyhow::{Context, Result};
use image::{ImageBuffer, Rgb, RgbImage};
use ndarray::{Array1, Array2, Array3, ArrayView2};
use std::fs;
use std::path::Path;

/// Pixels per data cell along each axis.
pub const CELL: u32 = 2;
/// Height of curve plots in pixels.
pub const CURVE_HEIGHT: u32 = 120;
/// Separator between tiled attention maps.
pub const TILE_GAP: u32 = 4;

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const SEPARATOR: Rgb<u8> = Rgb([200, 200, 200]);
const LINE: Rgb<u8> = Rgb([31, 119, 180]);

// Viridis sampled at five points.
const VIRIDIS: [[f32; 3]; 5] = [
    [68.0, 1.0, 84.0],
    [59.0, 82.0, 139.0],
    [33.0, 145.0, 140.0],
    [94.0, 201.0, 98.0],
    [253.0, 231.0, 37.0],
];

fn colormap(t: f32) -> Rgb<u8> {
    let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
    let pos = t * (VIRIDIS.len() - 1) as f32;
    let lo = (pos.floor() as usize).min(VIRIDIS.len() - 2);
    let frac = pos - lo as f32;
    let mix = |c: usize| {
        let value = VIRIDIS[lo][c] + (VIRIDIS[lo + 1][c] - VIRIDIS[lo][c]) * frac;
        value.round() as u8
    };
    Rgb([mix(0), mix(1), mix(2)])
}

fn value_range<'a>(values: impl Iterator<Item = &'a f32>) -> (f32, f32) {
    values
        .filter(|v| v.is_finite())
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        })
}

fn scaler(lo: f32, hi: f32) -> impl Fn(f32) -> f32 {
    let span = hi - lo;
    move |v| {
        if span > 0.0 && span.is_finite() {
            (v - lo) / span
        } else {
            0.5
        }
    }
}

/// Draw `matrix[(col, row)]` with columns on the x axis, starting at pixel `x0`.
fn draw_heatmap(
    img: &mut RgbImage,
    matrix: ArrayView2<'_, f32>,
    x0: u32,
    origin_lower: bool,
    scale: &dyn Fn(f32) -> f32,
) {
    let (cols, rows) = matrix.dim();
    for col in 0..cols {
        for row in 0..rows {
            let color = colormap(scale(matrix[(col, row)]));
            let cell_row = if origin_lower { rows - 1 - row } else { row };
            let (x, y) = (x0 + col as u32 * CELL, cell_row as u32 * CELL);
            for dy in 0..CELL {
                for dx in 0..CELL {
                    img.put_pixel(x + dx, y + dy, color);
                }
            }
        }
    }
}

fn save(img: &RgbImage, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    img.save(path)
        .with_context(|| format!("Failed to write {}", path.display()))
}

/// Heatmap of `(frames, channels)` features, time on the x axis.
///
/// With `origin_lower` channel 0 is the bottom row.
pub fn plot_feats(feats: &Array2<f32>, path: impl AsRef<Path>, origin_lower: bool) -> Result<()> {
    let (frames, channels) = feats.dim();
    let width = (frames.max(1) as u32) * CELL;
    let height = (channels.max(1) as u32) * CELL;
    let mut img: RgbImage = ImageBuffer::from_pixel(width, height, BACKGROUND);
    let (lo, hi) = value_range(feats.iter());
    draw_heatmap(&mut img, feats.view(), 0, origin_lower, &scaler(lo, hi));
    save(&img, path.as_ref())
}

/// Line plot of a 1D series, one `CELL` wide column per value.
///
/// The y range always includes `[0, 1]` so probability curves share a scale.
pub fn plot_curve(values: &Array1<f32>, path: impl AsRef<Path>) -> Result<()> {
    let width = (values.len().max(1) as u32) * CELL;
    let mut img: RgbImage = ImageBuffer::from_pixel(width, CURVE_HEIGHT, BACKGROUND);
    let (lo, hi) = value_range(values.iter());
    let scale = scaler(lo.min(0.0), hi.max(1.0));
    let to_y = |v: f32| {
        let t = scale(v);
        let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
        ((1.0 - t) * (CURVE_HEIGHT - 1) as f32).round() as u32
    };

    let mut previous: Option<u32> = None;
    for (i, &v) in values.iter().enumerate() {
        let y = to_y(v);
        // Vertical segment joins consecutive points.
        let (top, bottom) = match previous {
            Some(prev) => (prev.min(y), prev.max(y)),
            None => (y, y),
        };
        for x in (i as u32) * CELL..(i as u32 + 1) * CELL {
            for yy in top..=bottom {
                img.put_pixel(x, yy, LINE);
            }
        }
        previous = Some(y);
    }
    save(&img, path.as_ref())
}

/// Attention maps `(maps, out_frames, in_frames)` tiled left to right.
///
/// Each tile has input frames on the x axis and output frames on the y axis,
/// origin at the bottom. Tiles share one color scale.
pub fn plot_attention(att_ws: &Array3<f32>, path: impl AsRef<Path>) -> Result<()> {
    let (maps, out_frames, in_frames) = att_ws.dim();
    let maps_drawn = maps.max(1) as u32;
    let tile_width = (in_frames.max(1) as u32) * CELL;
    let width = maps_drawn * tile_width + (maps_drawn - 1) * TILE_GAP;
    let height = (out_frames.max(1) as u32) * CELL;
    let mut img: RgbImage = ImageBuffer::from_pixel(width, height, SEPARATOR);
    let (lo, hi) = value_range(att_ws.iter());
    let scale = scaler(lo, hi);

    for (index, map) in att_ws.outer_iter().enumerate() {
        let x0 = index as u32 * (tile_width + TILE_GAP);
        // `map` is (out, in); columns are input frames.
        draw_heatmap(&mut img, map.t(), x0, true, &scale);
    }
    save(&img, path.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array};

    #[test]
    fn colormap_endpoints() {
        assert_eq!(colormap(0.0), Rgb([68, 1, 84]));
        assert_eq!(colormap(1.0), Rgb([253, 231, 37]));
        assert_eq!(colormap(f32::NAN), Rgb([68, 1, 84]));
    }

    #[test]
    fn feats_plot_has_cell_geometry() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("outs").join("u1.png");
        let feats = Array::from_shape_fn((5, 3), |(t, c)| (t + c) as f32);
        plot_feats(&feats, &path, true).expect("plot");

        let img = image::open(&path).expect("decode png").to_rgb8();
        assert_eq!(img.dimensions(), (5 * CELL, 3 * CELL));
        // Smallest value (t = 0, c = 0) sits bottom-left with origin lower.
        assert_eq!(*img.get_pixel(0, 3 * CELL - 1), colormap(0.0));
        assert_eq!(*img.get_pixel(5 * CELL - 1, 0), colormap(1.0));
    }

    #[test]
    fn curve_plot_spans_values() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("u1_prob.png");
        plot_curve(&array![0.0_f32, 0.0, 1.0], &path).expect("plot");

        let img = image::open(&path).expect("decode png").to_rgb8();
        assert_eq!(img.dimensions(), (3 * CELL, CURVE_HEIGHT));
        assert_eq!(*img.get_pixel(0, CURVE_HEIGHT - 1), LINE);
        assert_eq!(*img.get_pixel(2 * CELL, 0), LINE);
    }

    #[test]
    fn attention_maps_are_tiled() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("u1_att_ws.png");
        let att_ws = Array::from_shape_fn((2, 4, 3), |(m, o, i)| (m + o + i) as f32);
        plot_attention(&att_ws, &path).expect("plot");

        let img = image::open(&path).expect("decode png").to_rgb8();
        assert_eq!(img.dimensions(), (2 * 3 * CELL + TILE_GAP, 4 * CELL));
        assert_eq!(*img.get_pixel(3 * CELL, 0), SEPARATOR);
    }

    #[test]
    fn empty_inputs_still_write_an_image() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("empty.png");
        plot_feats(&Array2::zeros((0, 4)), &path, false).expect("plot");
        assert!(path.exists());
    }
}
