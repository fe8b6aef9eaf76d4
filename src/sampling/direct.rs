//! Direct sampling: one hardware fetch with the texture's own sampler.
//!
//! Cheapest and lowest quality path. Only exact for integer-ratio scaling.

use super::error::{NotApplicable, SampleOutcome, SamplingError};
use super::shader::ShaderBuilder;
use super::source::{SampleSource, bind_source, check_sampleable_2d};
use super::types::{TypedExpr, ValueType};
use super::utils::scaled_color;

pub fn sample_direct(
    sh: &mut ShaderBuilder,
    src: &SampleSource<'_>,
) -> Result<SampleOutcome, SamplingError> {
    src.check_context(sh)?;
    let tex = src.texture;
    if let Err(reason) = check_sampleable_2d(sh, tex) {
        return Ok(reason.into());
    }
    if tex.sampler().is_linear() && !tex.is_filterable() {
        return Ok(NotApplicable::NotFilterable(tex.name().clone()).into());
    }

    let r = src.resolve();
    let b = bind_source(sh, tex, &r);
    let raw = sh.fresh("raw");
    let color = sh.fresh("color");
    sh.push(format!(
        "let {raw} = textureSampleLevel({}, {}, {}(out_px), 0.0);",
        b.tex, b.samp, b.map_fn
    ));
    sh.push(format!(
        "let {color} = {};",
        scaled_color(&raw, r.components, r.scale)
    ));
    sh.set_output(TypedExpr::new(color, ValueType::Vec4), [r.out_w, r.out_h]);
    Ok(SampleOutcome::Emitted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampling::device::{DeviceCaps, GpuContext};
    use crate::sampling::texture::{SamplerKind, SourceTexture};
    use crate::sampling::validation::validate_wgsl;

    #[test]
    fn emits_single_fetch() {
        let ctx = GpuContext::headless(DeviceCaps::default());
        let tex = SourceTexture::new(&ctx, "img", 64, 64, 3).with_sampler(SamplerKind::NearestClamp);
        let mut sh = ShaderBuilder::new(&ctx);
        let out = sample_direct(&mut sh, &SampleSource::new(&tex).with_scale(2.0)).unwrap();
        assert!(out.is_emitted());
        let shader = sh.finish().unwrap();
        assert_eq!(shader.wgsl.matches("textureSampleLevel(").count(), 1);
        assert!(shader.wgsl.contains(".xyz * 2.0, 1.0)"));
        assert_eq!(shader.output_size, [64, 64]);
        validate_wgsl(&shader.wgsl).unwrap();
    }

    #[test]
    fn linear_on_unfilterable_format_declines() {
        let ctx = GpuContext::headless(DeviceCaps::default());
        let tex = SourceTexture::new(&ctx, "f32", 8, 8, 4).with_capabilities(true, false);
        let mut sh = ShaderBuilder::new(&ctx);
        let out = sample_direct(&mut sh, &SampleSource::new(&tex)).unwrap();
        assert!(matches!(
            out,
            SampleOutcome::NotApplicable(NotApplicable::NotFilterable(_))
        ));
        assert!(sh.is_empty());
        assert!(sh.bindings().is_empty());
    }

    #[test]
    fn unsampleable_texture_declines() {
        let ctx = GpuContext::headless(DeviceCaps::default());
        let tex = SourceTexture::new(&ctx, "storage", 8, 8, 4).with_capabilities(false, false);
        let mut sh = ShaderBuilder::new(&ctx);
        let out = sample_direct(&mut sh, &SampleSource::new(&tex)).unwrap();
        assert!(!out.is_emitted());
    }

    #[test]
    fn foreign_texture_is_an_error() {
        let a = GpuContext::headless(DeviceCaps::default());
        let b = GpuContext::headless(DeviceCaps::default());
        let tex = SourceTexture::new(&b, "img", 8, 8, 4);
        let mut sh = ShaderBuilder::new(&a);
        assert!(matches!(
            sample_direct(&mut sh, &SampleSource::new(&tex)),
            Err(SamplingError::ContextMismatch { .. })
        ));
    }
}
