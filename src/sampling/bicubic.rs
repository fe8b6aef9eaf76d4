//! Bicubic fast path: a cubic B-spline (B = 1, C = 0) evaluated with four
//! bilinear fetches instead of sixteen point fetches.
//!
//! Each axis splits its four weights into two pairs; each pair becomes one
//! linear fetch placed between the two texels at the ratio of their weights.
//! Meant for upscaling: downscaling with it aliases.

use super::error::{SampleOutcome, SamplingError};
use super::shader::ShaderBuilder;
use super::source::{SampleSource, bind_source, check_linear_2d};
use super::types::{TypedExpr, ValueType};
use super::utils::scaled_color;

const BSPLINE_WEIGHTS_WGSL: &str = r#"
struct BicubicTaps {
    g0: vec2f,
    g1: vec2f,
    h0: vec2f,
    h1: vec2f,
};

// Cubic B-spline weights for subpixel offset `f`, folded into two
// bilinear taps per axis. `h0`/`h1` are offsets from `base` in texels.
fn bicubic_taps(f: vec2f) -> BicubicTaps {
    let inv = vec2f(1.0) - f;
    let w0 = inv * inv * inv / 6.0;
    let w1 = vec2f(2.0 / 3.0) - 0.5 * f * f * (vec2f(2.0) - f);
    let w2 = vec2f(2.0 / 3.0) - 0.5 * inv * inv * (vec2f(2.0) - inv);
    let w3 = f * f * f / 6.0;
    var t: BicubicTaps;
    t.g0 = w0 + w1;
    t.g1 = w2 + w3;
    t.h0 = w1 / t.g0 - vec2f(0.5);
    t.h1 = w3 / t.g1 + vec2f(1.5);
    return t;
}
"#;

pub fn sample_bicubic(
    sh: &mut ShaderBuilder,
    src: &SampleSource<'_>,
) -> Result<SampleOutcome, SamplingError> {
    src.check_context(sh)?;
    let tex = src.texture;
    if let Err(reason) = check_linear_2d(sh, tex) {
        return Ok(reason.into());
    }

    let r = src.resolve();
    let b = bind_source(sh, tex, &r);
    sh.helper("bicubic_taps", BSPLINE_WEIGHTS_WGSL);

    let fc = sh.fresh("fc");
    let base = sh.fresh("base");
    let taps = sh.fresh("taps");
    let acc = sh.fresh("acc");
    let color = sh.fresh("color");
    let (t, s) = (&b.tex, &b.samp);
    let pt = &b.pt;
    sh.push(format!(
        r#"let {fc} = {map}(out_px) * {size} - vec2f(0.5);
let {base} = floor({fc});
let {taps} = bicubic_taps({fc} - {base});
let {acc} =
    {taps}.g0.y * ({taps}.g0.x * textureSampleLevel({t}, {s}, ({base} + {taps}.h0) * {pt}, 0.0)
        + {taps}.g1.x * textureSampleLevel({t}, {s}, ({base} + vec2f({taps}.h1.x, {taps}.h0.y)) * {pt}, 0.0))
    + {taps}.g1.y * ({taps}.g0.x * textureSampleLevel({t}, {s}, ({base} + vec2f({taps}.h0.x, {taps}.h1.y)) * {pt}, 0.0)
        + {taps}.g1.x * textureSampleLevel({t}, {s}, ({base} + {taps}.h1) * {pt}, 0.0));
let {color} = {scaled};"#,
        map = b.map_fn,
        size = b.size,
        scaled = scaled_color(&acc, r.components, r.scale),
    ));
    sh.set_output(TypedExpr::new(color, ValueType::Vec4), [r.out_w, r.out_h]);
    Ok(SampleOutcome::Emitted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampling::device::{DeviceCaps, GpuContext};
    use crate::sampling::error::NotApplicable;
    use crate::sampling::texture::{SampleMode, SamplerKind, SourceTexture};
    use crate::sampling::validation::validate_wgsl;

    #[test]
    fn emits_four_linear_fetches() {
        let ctx = GpuContext::headless(DeviceCaps::default());
        let tex = SourceTexture::new(&ctx, "img", 32, 32, 4);
        let mut sh = ShaderBuilder::new(&ctx);
        let src = SampleSource::new(&tex).with_output_size(64, 64);
        assert!(sample_bicubic(&mut sh, &src).unwrap().is_emitted());
        let shader = sh.finish().unwrap();
        assert_eq!(shader.wgsl.matches("textureSampleLevel(").count(), 4);
        assert_eq!(shader.output_size, [64, 64]);
        validate_wgsl(&shader.wgsl).unwrap();
    }

    #[test]
    fn nearest_sampler_declines() {
        let ctx = GpuContext::headless(DeviceCaps::default());
        let tex =
            SourceTexture::new(&ctx, "img", 32, 32, 4).with_sampler(SamplerKind::NearestRepeat);
        let mut sh = ShaderBuilder::new(&ctx);
        let out = sample_bicubic(&mut sh, &SampleSource::new(&tex)).unwrap();
        assert_eq!(
            out,
            SampleOutcome::NotApplicable(NotApplicable::SampleMode {
                required: SampleMode::Linear,
                actual: SamplerKind::NearestRepeat,
            })
        );
        assert!(sh.is_empty());
    }
}
