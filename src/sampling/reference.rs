//! CPU evaluation of the emitted samplers over `Rgba32FImage`.
//!
//! Mirrors the shader math step for step (texel-center conventions, tap
//! plans, LUT interpolation) with clamp-to-edge fetches, so numeric
//! properties of the generated shaders can be checked without a GPU.

use image::{Rgba, Rgba32FImage};

use super::filters::GeneratedFilter;
use super::ortho::SeparablePass;
use super::polar::polar_taps;
use super::source::ResolvedSource;
use super::texture::SampleMode;

pub type Texel = [f32; 4];

pub fn fetch_clamped(img: &Rgba32FImage, x: i64, y: i64) -> Texel {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return [0.0; 4];
    }
    let x = x.clamp(0, w as i64 - 1) as u32;
    let y = y.clamp(0, h as i64 - 1) as u32;
    img.get_pixel(x, y).0
}

/// Bilinear fetch at a texel-space position (centers at `i + 0.5`).
pub fn bilinear(img: &Rgba32FImage, px: f32, py: f32) -> Texel {
    let (fx, fy) = (px - 0.5, py - 0.5);
    let (x0, y0) = (fx.floor(), fy.floor());
    let (tx, ty) = (fx - x0, fy - y0);
    let (x0, y0) = (x0 as i64, y0 as i64);
    let top = lerp(fetch_clamped(img, x0, y0), fetch_clamped(img, x0 + 1, y0), tx);
    let bottom = lerp(
        fetch_clamped(img, x0, y0 + 1),
        fetch_clamped(img, x0 + 1, y0 + 1),
        tx,
    );
    lerp(top, bottom, ty)
}

fn lerp(a: Texel, b: Texel, t: f32) -> Texel {
    std::array::from_fn(|i| a[i] * (1.0 - t) + b[i] * t)
}

fn madd(acc: &mut Texel, w: f32, c: Texel) {
    for i in 0..4 {
        acc[i] += w * c[i];
    }
}

/// Component selection and scaling, as the shaders apply it.
pub fn finalize(c: Texel, components: u32, scale: f32) -> Texel {
    match components {
        0 | 1 => [c[0] * scale, 0.0, 0.0, 1.0],
        2 => [c[0] * scale, c[1] * scale, 0.0, 1.0],
        3 => [c[0] * scale, c[1] * scale, c[2] * scale, 1.0],
        _ => c.map(|v| v * scale),
    }
}

fn render(r: &ResolvedSource, mut f: impl FnMut([f32; 2]) -> Texel) -> Rgba32FImage {
    let mut out = Rgba32FImage::new(r.out_w, r.out_h);
    for (x, y, px) in out.enumerate_pixels_mut() {
        let pos = r.map([x as f32 + 0.5, y as f32 + 0.5]);
        *px = Rgba(finalize(f(pos), r.components, r.scale));
    }
    out
}

pub fn direct(img: &Rgba32FImage, r: &ResolvedSource, mode: SampleMode) -> Rgba32FImage {
    render(r, |[px, py]| match mode {
        SampleMode::Nearest => fetch_clamped(img, px.floor() as i64, py.floor() as i64),
        SampleMode::Linear => bilinear(img, px, py),
    })
}

/// Four-fetch cubic B-spline.
pub fn bicubic(img: &Rgba32FImage, r: &ResolvedSource) -> Rgba32FImage {
    render(r, |[px, py]| {
        let axis = |p: f32| {
            let fc = p - 0.5;
            let base = fc.floor();
            let f = fc - base;
            let inv = 1.0 - f;
            let w0 = inv * inv * inv / 6.0;
            let w1 = 2.0 / 3.0 - 0.5 * f * f * (2.0 - f);
            let w2 = 2.0 / 3.0 - 0.5 * inv * inv * (2.0 - inv);
            let w3 = f * f * f / 6.0;
            let (g0, g1) = (w0 + w1, w2 + w3);
            // Texel-space positions of the two linear taps.
            (g0, g1, base - 0.5 + w1 / g0, base + 1.5 + w3 / g1)
        };
        let (gx0, gx1, hx0, hx1) = axis(px);
        let (gy0, gy1, hy0, hy1) = axis(py);
        let mut acc = [0.0; 4];
        madd(&mut acc, gx0 * gy0, bilinear(img, hx0, hy0));
        madd(&mut acc, gx1 * gy0, bilinear(img, hx1, hy0));
        madd(&mut acc, gx0 * gy1, bilinear(img, hx0, hy1));
        madd(&mut acc, gx1 * gy1, bilinear(img, hx1, hy1));
        acc
    })
}

pub fn polar(img: &Rgba32FImage, r: &ResolvedSource, filter: &GeneratedFilter) -> Rgba32FImage {
    let (_, taps) = polar_taps(filter.radius_cutoff);
    let rc = filter.radius_cutoff as f32;
    render(r, |[px, py]| {
        let (fx, fy) = (px - 0.5, py - 0.5);
        let (bx, by) = (fx.floor(), fy.floor());
        let (ox, oy) = (fx - bx, fy - by);
        let mut acc = [0.0; 4];
        let mut wsum = 0.0;
        for t in &taps {
            let d = (t.x as f32 - ox).hypot(t.y as f32 - oy);
            if d >= rc {
                continue;
            }
            let w = filter.polar_weight(d as f64);
            madd(
                &mut acc,
                w,
                fetch_clamped(img, bx as i64 + t.x as i64, by as i64 + t.y as i64),
            );
            wsum += w;
        }
        acc.map(|v| v / wsum)
    })
}

/// One separable pass; `r` is the unrestricted source, as passed to the
/// shader entry point.
pub fn ortho(
    img: &Rgba32FImage,
    pass: SeparablePass,
    r: &ResolvedSource,
    filter: &GeneratedFilter,
    antiring: f32,
) -> Rgba32FImage {
    let r = pass.restrict(r);
    let axis = pass.axis();
    let n = filter.row_size as i64;
    let antiring = antiring.clamp(0.0, 1.0);
    render(&r, |pos| {
        let fc = pos[axis] - 0.5;
        let fcoord = fc - fc.floor();
        let first = fc.floor() as i64 - (n / 2 - 1);
        let other = (pos[1 - axis] - 0.5).floor() as i64;
        let row = filter.row_at(fcoord as f64);
        let taps: Vec<Texel> = (0..n)
            .map(|j| {
                let i = first + j;
                if axis == 0 {
                    fetch_clamped(img, i, other)
                } else {
                    fetch_clamped(img, other, i)
                }
            })
            .collect();
        let mut acc = [0.0; 4];
        for (w, c) in row.iter().zip(&taps) {
            madd(&mut acc, *w, *c);
        }
        if antiring > 0.0 {
            let (a, b) = (taps[(n / 2 - 1) as usize], taps[(n / 2) as usize]);
            for i in 0..4 {
                let clamped = acc[i].clamp(a[i].min(b[i]), a[i].max(b[i]));
                acc[i] = acc[i] * (1.0 - antiring) + clamped * antiring;
            }
        }
        acc
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampling::types::Rect2D;

    fn resolved(w: u32, h: u32, out_w: u32, out_h: u32) -> ResolvedSource {
        ResolvedSource {
            rect: Rect2D::full(w, h),
            out_w,
            out_h,
            components: 4,
            scale: 1.0,
            tex_w: w,
            tex_h: h,
        }
    }

    #[test]
    fn identity_direct_copies_the_image() {
        let img = Rgba32FImage::from_fn(4, 3, |x, y| Rgba([x as f32, y as f32, 0.0, 1.0]));
        let r = resolved(4, 3, 4, 3);
        assert_eq!(direct(&img, &r, SampleMode::Nearest), img);
        assert_eq!(direct(&img, &r, SampleMode::Linear), img);
    }

    #[test]
    fn bicubic_matches_explicit_bspline() {
        let img = Rgba32FImage::from_fn(8, 8, |x, y| {
            let v = ((x * 7 + y * 3) % 5) as f32 / 4.0;
            Rgba([v, 1.0 - v, v * v, 1.0])
        });
        let r = resolved(8, 8, 13, 11);
        let fast = bicubic(&img, &r);
        let spline = |t: f32| {
            let t = t.abs();
            if t < 1.0 {
                (4.0 - 6.0 * t * t + 3.0 * t * t * t) / 6.0
            } else if t < 2.0 {
                (2.0 - t).powi(3) / 6.0
            } else {
                0.0
            }
        };
        for (x, y, px) in fast.enumerate_pixels() {
            let [sx, sy] = r.map([x as f32 + 0.5, y as f32 + 0.5]);
            let (fx, fy) = (sx - 0.5, sy - 0.5);
            let (bx, by) = (fx.floor() as i64, fy.floor() as i64);
            let mut acc = [0.0f32; 4];
            for j in -1..=2 {
                for i in -1..=2 {
                    let w = spline(fx - (bx + i) as f32) * spline(fy - (by + j) as f32);
                    madd(&mut acc, w, fetch_clamped(&img, bx + i, by + j));
                }
            }
            for c in 0..4 {
                assert!((px.0[c] - acc[c]).abs() < 1e-4, "({x},{y}) ch{c}");
            }
        }
    }

    #[test]
    fn finalize_follows_component_count() {
        assert_eq!(finalize([1.0, 2.0, 3.0, 4.0], 2, 2.0), [2.0, 4.0, 0.0, 1.0]);
        assert_eq!(finalize([1.0, 2.0, 3.0, 4.0], 4, 0.5), [0.5, 1.0, 1.5, 2.0]);
    }
}
