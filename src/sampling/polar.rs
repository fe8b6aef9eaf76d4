//! Polar (EWA) sampler: radially symmetric 2D convolution weighted by a
//! distance-keyed LUT.
//!
//! Runs as a compute shader that stages the workgroup's source footprint in
//! workgroup memory when the device and builder allow it and the tile fits,
//! otherwise as a fragment shader fetching every tap directly.

use log::debug;

use super::error::{NotApplicable, SampleOutcome, SamplingError};
use super::lut::LutRequest;
use super::params::SampleFilterParams;
use super::shader::{BindingKind, ShaderBuilder};
use super::source::{BoundSource, ResolvedSource, SampleSource, bind_source, check_sampleable_2d};
use super::types::{TypedExpr, ValueType};
use super::utils::{fmt_f32, scaled_color};

pub const POLAR_WORKGROUP: [u32; 2] = [32, 8];

/// One source texel offset (relative to `floor(fc)`) inside the cutoff.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct PolarTap {
    pub x: i32,
    pub y: i32,
    /// Some subpixel offsets put this tap outside the cutoff, so the shader
    /// has to test the distance.
    pub guarded: bool,
}

/// Taps in `[1 - bound, bound]^2` that can fall within `radius_cutoff` for
/// some subpixel offset in `[0, 1)^2`.
pub(crate) fn polar_taps(radius_cutoff: f64) -> (i32, Vec<PolarTap>) {
    let bound = radius_cutoff.ceil().max(1.0) as i32;
    let near = |v: i32| if v > 0 { (v - 1) as f64 } else { -v as f64 };
    let far = |v: i32| if v > 0 { v as f64 } else { (1 - v) as f64 };
    let mut taps = Vec::new();
    for y in (1 - bound)..=bound {
        for x in (1 - bound)..=bound {
            if near(x).hypot(near(y)) >= radius_cutoff {
                continue;
            }
            taps.push(PolarTap {
                x,
                y,
                guarded: far(x).hypot(far(y)) >= radius_cutoff,
            });
        }
    }
    (bound, taps)
}

/// Shared-memory tile covering one workgroup's taps.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct PolarTile {
    pub width: u32,
    pub height: u32,
    pub offset: i32,
    /// `width * height`.
    pub texels: u32,
    /// `texels` as `vec4f`.
    pub bytes: u32,
}

/// `None` for flipped rects, whose workgroup origin is not the tile minimum,
/// and for footprints whose size does not fit in `u32`.
pub(crate) fn polar_tile(r: &ResolvedSource, bound: i32, workgroup: [u32; 2]) -> Option<PolarTile> {
    let [sx, sy] = r.step();
    if !(sx > 0.0 && sy > 0.0) {
        return None;
    }
    let span = |step: f32, n: u32| (n.saturating_sub(1) as f64 * step as f64).ceil() as u64;
    let pad = 2 * u64::try_from(bound).ok()? + 1;
    let width = span(sx, workgroup[0]).checked_add(pad)?;
    let height = span(sy, workgroup[1]).checked_add(pad)?;
    let texels = width.checked_mul(height)?;
    Some(PolarTile {
        width: u32::try_from(width).ok()?,
        height: u32::try_from(height).ok()?,
        offset: bound - 1,
        texels: u32::try_from(texels).ok()?,
        bytes: u32::try_from(texels.checked_mul(16)?).ok()?,
    })
}

pub fn sample_polar(
    sh: &mut ShaderBuilder,
    src: &SampleSource<'_>,
    params: SampleFilterParams<'_>,
) -> Result<SampleOutcome, SamplingError> {
    src.check_context(sh)?;
    let tex = src.texture;
    if let Err(reason) = check_sampleable_2d(sh, tex) {
        return Ok(reason.into());
    }
    if !params.filter.polar {
        return Ok(NotApplicable::FilterNotPolar.into());
    }

    let r = src.resolve();
    let [rx, ry] = r.ratio();
    let filter_scale = params.filter_scale(rx.min(ry));
    let req = LutRequest {
        config: &params.filter,
        entries: params.lut_entries,
        cutoff: params.cutoff,
        antiring: params.antiring,
        filter_scale,
    };
    let lut = match params.lut.ensure(sh.context(), &req) {
        Ok(lut) => lut,
        Err(reason) => return Ok(reason.into()),
    };

    let (bound, taps) = polar_taps(lut.radius_cutoff);
    let tile = if params.no_compute {
        debug!("polar sampler: fragment path (no_compute set)");
        None
    } else {
        match polar_tile(&r, bound, POLAR_WORKGROUP) {
            None => {
                debug!("polar sampler: fragment path (flipped rect or oversized tile)");
                None
            }
            Some(tile) => match sh.try_compute(POLAR_WORKGROUP, tile.bytes) {
                Ok(()) => {
                    debug!(
                        "polar sampler: compute path, {}x{} tile ({} bytes)",
                        tile.width, tile.height, tile.bytes
                    );
                    Some(tile)
                }
                Err(reason) => {
                    debug!("polar sampler: fragment path ({reason})");
                    None
                }
            },
        }
    };

    let b = bind_source(sh, tex, &r);
    let lut_tex = sh.bind("lut_tex", BindingKind::LutTexture(lut.name.clone()));
    let lut_samp = sh.bind("lut_samp", BindingKind::LutSampler);

    let fc = sh.fresh("fc");
    let base = sh.fresh("base");
    let f = sh.fresh("f");
    let acc = sh.fresh("acc");
    let wsum = sh.fresh("wsum");
    let color = sh.fresh("color");
    sh.push(format!(
        "let {fc} = {}(out_px) * {} - vec2f(0.5);\nlet {base} = floor({fc});\nlet {f} = {fc} - {base};\nvar {acc} = vec4f(0.0);\nvar {wsum}: f32 = 0.0;",
        b.map_fn, b.size
    ));

    let fetch: Box<dyn Fn(&PolarTap) -> String> = match tile {
        Some(tile) => {
            let tile_var = emit_tile_load(sh, &b, tile);
            let rel = sh.fresh("rel");
            sh.push(format!(
                "let {rel} = vec2i({base} - floor({}(wg_px) * {} - vec2f(0.5))) + vec2i({off}, {off});",
                b.map_fn,
                b.size,
                off = tile.offset
            ));
            let (iw, last) = (tile.width as i32, tile.texels as i32 - 1);
            Box::new(move |t: &PolarTap| {
                format!(
                    "{tile_var}[u32(clamp(({rel}.y + {y}) * {iw} + {rel}.x + {x}, 0, {last}))]",
                    x = t.x,
                    y = t.y
                )
            })
        }
        None => {
            let (tv, sv, pt, base) = (b.tex.clone(), b.samp.clone(), b.pt.clone(), base.clone());
            Box::new(move |t: &PolarTap| {
                format!(
                    "textureSampleLevel({tv}, {sv}, ({base} + vec2f({})) * {pt}, 0.0)",
                    fmt_xy(t.x as f32 + 0.5, t.y as f32 + 0.5)
                )
            })
        }
    };

    let entries = lut.entries as f64;
    let lut_k = fmt_f32(((entries - 1.0) / (entries * lut.radius)) as f32);
    let lut_k0 = fmt_f32((0.5 / entries) as f32);
    let rc = fmt_f32(lut.radius_cutoff as f32);
    for t in &taps {
        let accumulate = format!(
            "let w = textureSampleLevel({lut_tex}, {lut_samp}, vec2f(d * {lut_k} + {lut_k0}, 0.5), 0.0).x;\n{acc} = {acc} + w * {};\n{wsum} = {wsum} + w;",
            fetch(t)
        );
        let inner = if t.guarded {
            format!("if (d < {rc}) {{\n{}\n}}", indent(&accumulate))
        } else {
            accumulate
        };
        let block = format!(
            "let d = length(vec2f({}) - {f});\n{inner}",
            fmt_xy(t.x as f32, t.y as f32)
        );
        sh.push(format!("{{\n{}\n}}", indent(&block)));
    }
    sh.push(format!(
        "let {color} = {};",
        scaled_color(&format!("({acc} / {wsum})"), r.components, r.scale)
    ));
    sh.set_output(TypedExpr::new(color, ValueType::Vec4), [r.out_w, r.out_h]);
    debug!(
        "polar sampler: {} taps, bound {bound}, radius cutoff {:.3}",
        taps.len(),
        lut.radius_cutoff
    );
    Ok(SampleOutcome::Emitted)
}

/// Stage the workgroup footprint in `var<workgroup>` memory. Every
/// invocation runs the same trip count so the barrier stays in uniform
/// control flow.
fn emit_tile_load(sh: &mut ShaderBuilder, b: &BoundSource, tile: PolarTile) -> String {
    let tile_var = sh.fresh("tile");
    let origin = sh.fresh("tile_origin");
    let n = tile.texels;
    let invocations = POLAR_WORKGROUP[0] * POLAR_WORKGROUP[1];
    let loops = n.div_ceil(invocations);
    sh.header(format!("var<workgroup> {tile_var}: array<vec4f, {n}>;"));
    sh.push(format!(
        r#"let {origin} = floor({map}(wg_px) * {size} - vec2f(0.5)) - vec2f({off});
for (var k: u32 = 0u; k < {loops}u; k = k + 1u) {{
    let idx = lidx + k * {invocations}u;
    if (idx < {n}u) {{
        let ty = idx / {iw}u;
        let tx = idx - ty * {iw}u;
        {tile_var}[idx] = textureSampleLevel({tex}, {samp}, ({origin} + vec2f(f32(tx), f32(ty)) + vec2f(0.5)) * {pt}, 0.0);
    }}
}}
workgroupBarrier();"#,
        map = b.map_fn,
        size = b.size,
        off = fmt_f32(tile.offset as f32),
        iw = tile.width,
        tex = b.tex,
        samp = b.samp,
        pt = b.pt,
    ));
    tile_var
}

fn fmt_xy(x: f32, y: f32) -> String {
    format!("{}, {}", fmt_f32(x), fmt_f32(y))
}

fn indent(s: &str) -> String {
    s.lines().map(|l| format!("    {l}")).collect::<Vec<_>>().join("\n")
}
