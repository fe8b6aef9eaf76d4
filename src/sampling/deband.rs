//! Debanding: stochastic gradient smoothing followed by grain.
//!
//! Each round draws a random direction and distance, averages four fetches
//! at quarter turns around the pixel, and takes the average when it is
//! within the round's threshold of the current estimate. Grain is added
//! afterwards, also when no rounds run.

use std::f32::consts::TAU;

use log::debug;

use super::error::{NotApplicable, SamplingError};
use super::params::{DebandParams, MAX_DEBAND_ITERATIONS};
use super::shader::ShaderBuilder;
use super::source::{SampleSource, bind_source, check_sampleable_2d};
use super::types::{TypedExpr, ValueType};
use super::utils::{color_channel_mask, fmt_f32, scaled_color};

const PRNG_WGSL: &str = r#"
// Permutation polynomial PRNG: state in [0, 289), outputs in [0, 1).
fn prng_mod289(x: f32) -> f32 {
    return x - floor(x / 289.0) * 289.0;
}

fn prng_permute(x: f32) -> f32 {
    return prng_mod289((34.0 * x + 1.0) * x);
}

fn prng_rand(x: f32) -> f32 {
    return fract(x / 41.0);
}
"#;

/// Emit debanding and return the resulting color expression.
///
/// The texture is expected to be bound with a linear sampler; this is not
/// checked. Non-2D or unsampleable textures are rejected. At most
/// [`MAX_DEBAND_ITERATIONS`] rounds are emitted.
pub fn sample_deband(
    sh: &mut ShaderBuilder,
    src: &SampleSource<'_>,
    params: Option<&DebandParams>,
) -> Result<TypedExpr, SamplingError> {
    src.check_context(sh)?;
    let tex = src.texture;
    check_sampleable_2d(sh, tex).map_err(|reason| match reason {
        NotApplicable::SignatureMismatch => SamplingError::SignatureMismatch,
        other => SamplingError::UnsupportedSource(other),
    })?;
    let mut params = params.copied().unwrap_or_default();
    if params.iterations > MAX_DEBAND_ITERATIONS {
        debug!(
            "clamping {} deband rounds to {MAX_DEBAND_ITERATIONS}",
            params.iterations
        );
        params.iterations = MAX_DEBAND_ITERATIONS;
    }
    if !tex.sampler().is_linear() {
        debug!(
            "debanding `{}` with {:?}; expected a linear sampler",
            tex.name(),
            tex.sampler()
        );
    }

    let r = src.resolve();
    let b = bind_source(sh, tex, &r);
    sh.helper("prng", PRNG_WGSL);

    let pos = sh.fresh("pos");
    let h = sh.fresh("prng");
    let color = sh.fresh("color");
    let seed = fmt_f32(sh.prng_seed());
    let (t, s, pt) = (b.tex.clone(), b.samp.clone(), b.pt.clone());
    let fetch = |at: String| format!("textureSampleLevel({t}, {s}, {at}, 0.0)");

    sh.push(format!("let {pos} = {}(out_px);", b.map_fn));
    sh.push(format!(
        "var {h} = prng_permute(prng_permute(prng_permute(out_px.x + 1.0) + out_px.y + 1.0) + {seed} + 1.0);"
    ));
    sh.push(format!("var {color} = {};", fetch(pos.clone())));

    for i in 1..=params.iterations {
        let range = fmt_f32(i as f32 * params.radius);
        let threshold = fmt_f32(params.threshold / (1000.0 * i as f32));
        let o = sh.fresh("off");
        let avg = sh.fresh("avg");
        sh.push(format!(
            r#"{{
    let dist = prng_rand({h}) * {range};
    {h} = prng_permute({h});
    let dir = prng_rand({h}) * {tau};
    {h} = prng_permute({h});
    let {o} = dist * vec2f(cos(dir), sin(dir)) * {pt};
    let {avg} = 0.25 * ({a} + {b_} + {c} + {d});
    let diff = abs({color} - {avg});
    {color} = select({color}, {avg}, all(diff < vec4f({threshold})));
}}"#,
            tau = fmt_f32(TAU),
            a = fetch(format!("{pos} + vec2f({o}.x, {o}.y)")),
            b_ = fetch(format!("{pos} + vec2f(-{o}.x, -{o}.y)")),
            c = fetch(format!("{pos} + vec2f(-{o}.y, {o}.x)")),
            d = fetch(format!("{pos} + vec2f({o}.y, -{o}.x)")),
        ));
    }

    sh.push(format!(
        "{color} = {};",
        scaled_color(&color, r.components, r.scale)
    ));
    if params.grain > 0.0 {
        let noise = sh.fresh("noise");
        sh.push(format!(
            r#"var {noise} = vec4f(0.0);
{noise}.x = prng_rand({h});
{h} = prng_permute({h});
{noise}.y = prng_rand({h});
{h} = prng_permute({h});
{noise}.z = prng_rand({h});
{color} = {color} + {mask} * ({grain} * ({noise} - vec4f(0.5)));"#,
            mask = color_channel_mask(r.components),
            grain = fmt_f32(params.grain / 1000.0),
        ));
    }

    let out = TypedExpr::new(color, ValueType::Vec4);
    sh.set_output(out.clone(), [r.out_w, r.out_h]);
    Ok(out)
}
