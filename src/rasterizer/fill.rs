//! Scanline polygon filler
//!
//! Polygons are filled top to bottom one raster line at a time. The vertices
//! are first rearranged into a left and a right edge chain, then both chains
//! are walked down in lockstep and the span between them is filled.
//!
//! Texturing is affine and uses 8.8 fixed point: one V step per scanline and
//! one U step per pixel, both truncated. Depth is a single value per polygon.

use std::cmp::Ordering;

use super::math::lerp;
use super::render::RenderSurface;
use super::types::{Polygon, RasterSettings, Texture, Vertex};
use super::MAX_VERTEX_COUNT;

/// Fractional bits of the texture coordinate accumulators
const FIXED_SHIFT: u32 = 8;
const FIXED_ONE: f32 = (1u32 << FIXED_SHIFT) as f32;

/// Where a polygon's pixel colors come from
#[derive(Debug, Clone, Copy)]
pub enum FillSource<'a> {
    Color(u8),
    Texture(&'a Texture),
}

/// Quantized depth shared by every pixel of the polygon.
///
/// The average vertex depth shifted down to 8 bits, clamped so it never
/// collides with the empty value 0. A non-positive average also comes out
/// as 1; `transform_polygon` hides polygons reaching behind the camera, so
/// only untransformed input can get there.
pub fn polygon_depth(verts: &[Vertex], depth_shift: u32) -> u8 {
    if verts.is_empty() {
        return u8::MAX;
    }

    let sum: f32 = verts.iter().map(|v| v.pos.z).sum();
    let average = (sum / verts.len() as f32) as i64;
    let shifted = if average <= 0 { 0 } else { average >> depth_shift.min(63) };

    shifted.clamp(1, u8::MAX as i64) as u8
}

/// Rearrange vertices into `[top, left chain.., bottom, right chain reversed..]`
/// and return its first and last scanline.
///
/// `verts` holds the polygon's vertices without the closing slot.
fn sort_vertices(verts: &mut [Vertex]) -> (i64, i64) {
    let n = verts.len();

    for v in verts.iter_mut() {
        v.pos.y = v.pos.y.trunc();
    }

    verts.sort_by(|a, b| a.pos.y.partial_cmp(&b.pos.y).unwrap_or(Ordering::Equal));

    let top = verts[0];
    let bottom = verts[n - 1];
    let height = bottom.pos.y - top.pos.y;

    let mut left = [Vertex::default(); MAX_VERTEX_COUNT];
    let mut right = [Vertex::default(); MAX_VERTEX_COUNT];
    let mut num_left = 0;
    let mut num_right = 0;

    left[num_left] = top;
    num_left += 1;

    for v in verts.iter().take(n.saturating_sub(1)).skip(1) {
        let t = if height == 0.0 { 0.0 } else { (v.pos.y - top.pos.y) / height };
        let edge_x = lerp(top.pos.x, bottom.pos.x, t);

        if v.pos.x < edge_x {
            left[num_left] = *v;
            num_left += 1;
        } else {
            right[num_right] = *v;
            num_right += 1;
        }
    }

    if n > 1 {
        left[num_left] = bottom;
        num_left += 1;
    }

    verts[..num_left].copy_from_slice(&left[..num_left]);
    for i in 0..num_right {
        verts[num_left + i] = right[num_right - i - 1];
    }

    (top.pos.y as i64, bottom.pos.y as i64)
}

/// X step per scanline along the edge from `verts[idx]` to `verts[next]`
fn edge_delta(verts: &[Vertex], idx: usize, next: usize) -> f32 {
    let a = verts[idx].pos;
    let b = verts[next].pos;

    if a.y == b.y {
        0.0
    } else {
        (b.x - a.x) / (b.y - a.y)
    }
}

/// X of the edge leaving `verts[idx]` at the given scanline
fn edge_x_at(verts: &[Vertex], idx: usize, delta: f32, scanline: i64) -> f32 {
    let v = verts[idx].pos;
    if scanline as f32 == v.y {
        v.x
    } else {
        v.x + (scanline as f32 - v.y) * delta
    }
}

/// Fill a screen-space polygon into the surface.
///
/// The polygon's vertices are reordered in place and its closing slot is
/// rewritten. Invisible and empty polygons are skipped. Rows above and below
/// the surface are never walked, so vertices far off screen cost nothing.
pub fn fill_polygon(
    surface: &mut RenderSurface,
    poly: &mut Polygon,
    source: FillSource<'_>,
    settings: &RasterSettings,
) {
    if !poly.visible || poly.num_verts() == 0 {
        return;
    }

    let n = poly.num_verts();
    let verts = poly.closed_loop_mut();

    let (top_y, bottom_y) = sort_vertices(&mut verts[..n]);
    let depth = polygon_depth(&verts[..n], settings.depth_shift);

    // Close the loop so the right chain can walk back up to the top vertex.
    verts[n] = verts[0];

    let verts: &[Vertex] = verts;
    let poly_height = bottom_y.saturating_sub(top_y) as f32;

    let first_row = top_y.max(0);
    let last_row = bottom_y.min(surface.height as i64);
    if first_row >= last_row {
        return;
    }

    let mut left_idx = 0;
    let mut right_idx = n;

    let mut delta_start_x = edge_delta(verts, left_idx, left_idx + 1);
    let mut delta_end_x = edge_delta(verts, right_idx, right_idx - 1);
    let mut start_x = edge_x_at(verts, left_idx, delta_start_x, first_row);
    let mut end_x = edge_x_at(verts, right_idx, delta_end_x, first_row);

    let texture = match source {
        FillSource::Texture(tex) => Some(tex),
        FillSource::Color(_) => None,
    };
    let flat_color = match source {
        FillSource::Color(c) => c,
        FillSource::Texture(_) => 0,
    };
    let alpha_test = settings.alpha_test && texture.map_or(false, |t| t.alpha_test);

    let texture_v_delta: u16 = texture
        .map(|t| (t.height as f32 / poly_height * FIXED_ONE) as u16)
        .unwrap_or(0);
    // Same value the accumulator would reach stepping through the skipped rows.
    let mut texture_v: u16 = texture_v_delta.wrapping_mul(first_row.wrapping_sub(top_y) as u16);

    let surface_width = surface.width as i64;

    for y in first_row..last_row {
        let scanline = y as f32;

        // Vertices above the first drawn row are passed over in one go.
        while left_idx < n && verts[left_idx + 1].pos.y <= scanline {
            left_idx += 1;
            delta_start_x = edge_delta(verts, left_idx, (left_idx + 1).min(n));
            start_x = edge_x_at(verts, left_idx, delta_start_x, y);
        }

        while right_idx >= 1 && verts[right_idx - 1].pos.y <= scanline {
            right_idx -= 1;
            delta_end_x = edge_delta(verts, right_idx, right_idx.saturating_sub(1));
            end_x = edge_x_at(verts, right_idx, delta_end_x, y);
        }

        if end_x > start_x {
            let line_width = end_x - start_x + 1.0;

            let (delta_u, row_v) = match texture {
                Some(tex) => (
                    (tex.width as f32 / line_width * FIXED_ONE) as u16,
                    (texture_v >> FIXED_SHIFT) as usize,
                ),
                None => (0, 0),
            };

            let mut x = start_x as i64;
            let mut texture_u: u16 = 0;
            if x < 0 {
                texture_u = delta_u.wrapping_mul(x.wrapping_neg() as u16);
                x = 0;
            }

            while x < surface_width && (x as f32) < end_x {
                let color = match texture {
                    Some(tex) => tex.texel((texture_u >> FIXED_SHIFT) as usize, row_v),
                    None => flat_color,
                };

                if !(alpha_test && color == 0) {
                    surface.plot(x as usize, y as usize, color, depth);
                }

                texture_u = texture_u.wrapping_add(delta_u);
                x += 1;
            }
        }

        start_x += delta_start_x;
        end_x += delta_end_x;
        texture_v = texture_v.wrapping_add(texture_v_delta);
    }
}
