//! Orthogonal (separable) sampler: one 1D convolution per pass.
//!
//! A vertical pass followed by a horizontal pass resamples in both
//! directions at a cost linear in the kernel width. Each pass ignores the
//! other axis of the source rect and samples it at native resolution.
//! Only 2D textures are supported.

use serde::{Deserialize, Serialize};

use super::error::{NotApplicable, SampleOutcome, SamplingError};
use super::lut::LutRequest;
use super::params::SampleFilterParams;
use super::shader::{BindingKind, ShaderBuilder};
use super::source::{ResolvedSource, SampleSource, bind_source, check_sampleable_2d};
use super::types::{TypedExpr, ValueType};
use super::utils::{fmt_f32, scaled_color};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SeparablePass {
    Vertical,
    Horizontal,
}

impl SeparablePass {
    /// Index of the convolved axis (`0` = x, `1` = y).
    pub fn axis(self) -> usize {
        match self {
            SeparablePass::Horizontal => 0,
            SeparablePass::Vertical => 1,
        }
    }

    /// Source as seen by this pass: the other axis spans the whole texture
    /// at identity scale.
    pub fn restrict(self, r: &ResolvedSource) -> ResolvedSource {
        let mut out = *r;
        match self {
            SeparablePass::Vertical => {
                out.rect.x0 = 0.0;
                out.rect.x1 = r.tex_w as f32;
                out.out_w = r.tex_w;
            }
            SeparablePass::Horizontal => {
                out.rect.y0 = 0.0;
                out.rect.y1 = r.tex_h as f32;
                out.out_h = r.tex_h;
            }
        }
        out
    }
}

pub fn sample_ortho(
    sh: &mut ShaderBuilder,
    pass: SeparablePass,
    src: &SampleSource<'_>,
    params: SampleFilterParams<'_>,
) -> Result<SampleOutcome, SamplingError> {
    src.check_context(sh)?;
    let tex = src.texture;
    if let Err(reason) = check_sampleable_2d(sh, tex) {
        return Ok(reason.into());
    }
    if params.filter.polar {
        return Ok(NotApplicable::FilterIsPolar.into());
    }

    let r = pass.restrict(&src.resolve());
    let axis = pass.axis();
    let req = LutRequest {
        config: &params.filter,
        entries: params.lut_entries,
        cutoff: params.cutoff,
        antiring: params.antiring,
        filter_scale: params.filter_scale(r.ratio()[axis]),
    };
    let lut = match params.lut.ensure(sh.context(), &req) {
        Ok(lut) => lut,
        Err(reason) => return Ok(reason.into()),
    };

    let b = bind_source(sh, tex, &r);
    let lut_tex = sh.bind("lut_tex", BindingKind::LutTexture(lut.name.clone()));
    let lut_samp = sh.bind("lut_samp", BindingKind::LutSampler);

    let n = lut.row_size as usize;
    let groups = (lut.row_stride / 4) as usize;
    let tex_len = if axis == 0 { r.tex_w } else { r.tex_h }.max(1) as f32;
    let texel = fmt_f32(1.0 / tex_len);
    let dir = if axis == 0 {
        format!("vec2f({texel}, 0.0)")
    } else {
        format!("vec2f(0.0, {texel})")
    };
    let comp = ["x", "y"][axis];

    let pos = sh.fresh("pos");
    let fcoord = sh.fresh("fcoord");
    let base = sh.fresh("base");
    let weights = sh.fresh("weights");
    let tap = sh.fresh("tap");
    let acc = sh.fresh("acc");
    let color = sh.fresh("color");
    let entries = lut.entries as f32;
    let row_v = format!(
        "{fcoord} * {} + {}",
        fmt_f32((entries - 1.0) / entries),
        fmt_f32(0.5 / entries)
    );

    sh.push(format!(
        "let {pos} = {}(out_px);\nlet {fcoord} = fract(({pos} * {} - vec2f(0.5)).{comp});\nlet {base} = {pos} - {dir} * ({fcoord} + {});",
        b.map_fn,
        b.size,
        fmt_f32((n / 2) as f32 - 1.0),
    ));
    for g in 0..groups {
        sh.push(format!(
            "let {weights}_{g} = textureSampleLevel({lut_tex}, {lut_samp}, vec2f({}, {row_v}), 0.0);",
            fmt_f32((g as f32 + 0.5) / groups as f32)
        ));
    }
    sh.push(format!("var {acc} = vec4f(0.0);"));
    for j in 0..n {
        sh.push(format!(
            "let {tap}_{j} = textureSampleLevel({}, {}, {base} + {dir} * {}, 0.0);\n{acc} = {acc} + {weights}_{}.{} * {tap}_{j};",
            b.tex,
            b.samp,
            fmt_f32(j as f32),
            j / 4,
            ["x", "y", "z", "w"][j % 4],
        ));
    }
    let antiring = params.antiring.clamp(0.0, 1.0);
    if antiring > 0.0 {
        let (lo, hi) = (n / 2 - 1, n / 2);
        sh.push(format!(
            "{acc} = mix({acc}, clamp({acc}, min({tap}_{lo}, {tap}_{hi}), max({tap}_{lo}, {tap}_{hi})), vec4f({}));",
            fmt_f32(antiring)
        ));
    }
    sh.push(format!(
        "let {color} = {};",
        scaled_color(&acc, r.components, r.scale)
    ));
    sh.set_output(TypedExpr::new(color, ValueType::Vec4), [r.out_w, r.out_h]);
    Ok(SampleOutcome::Emitted)
}
