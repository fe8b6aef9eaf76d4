//! Sample source descriptor: what region of which texture to sample, and at
//! what output size.

use super::error::{NotApplicable, SamplingError};
use super::shader::{BindingKind, ShaderBuilder};
use super::texture::{SampleMode, SourceTexture, TextureDimension};
use super::types::Rect2D;
use super::utils::fmt_f32;

#[derive(Clone, Copy, Debug)]
pub struct SampleSource<'a> {
    pub texture: &'a SourceTexture,
    /// Sub-rectangle in source texels; the full image when `None`.
    pub rect: Option<Rect2D>,
    pub new_w: Option<u32>,
    pub new_h: Option<u32>,
    pub components: Option<u32>,
    pub scale: f32,
}

impl<'a> SampleSource<'a> {
    pub fn new(texture: &'a SourceTexture) -> Self {
        Self {
            texture,
            rect: None,
            new_w: None,
            new_h: None,
            components: None,
            scale: 1.0,
        }
    }

    pub fn with_rect(mut self, rect: Rect2D) -> Self {
        self.rect = Some(rect);
        self
    }

    pub fn with_output_size(mut self, width: u32, height: u32) -> Self {
        self.new_w = Some(width);
        self.new_h = Some(height);
        self
    }

    pub fn with_components(mut self, components: u32) -> Self {
        self.components = Some(components);
        self
    }

    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }

    /// Apply defaults: full rect, output size of the rect, the texture's
    /// component count.
    pub fn resolve(&self) -> ResolvedSource {
        let tex = self.texture;
        let rect = self
            .rect
            .unwrap_or_else(|| Rect2D::full(tex.width(), tex.height()));
        let out_w = self
            .new_w
            .unwrap_or_else(|| rect.width().abs().round().max(1.0) as u32);
        let out_h = self
            .new_h
            .unwrap_or_else(|| rect.height().abs().round().max(1.0) as u32);
        let components = self
            .components
            .map(|c| c.clamp(1, tex.components()))
            .unwrap_or(tex.components());
        ResolvedSource {
            rect,
            out_w,
            out_h,
            components,
            scale: self.scale,
            tex_w: tex.width(),
            tex_h: tex.height(),
        }
    }

    pub(crate) fn check_context(&self, sh: &ShaderBuilder) -> Result<(), SamplingError> {
        if self.texture.context() != sh.context_id() {
            return Err(SamplingError::ContextMismatch {
                builder: sh.context_id(),
                texture: self.texture.context(),
                texture_name: self.texture.name().clone(),
            });
        }
        Ok(())
    }
}

/// Checks shared by every entry point that may decline: the builder must be
/// blank, the texture a sampleable 2D image.
pub(crate) fn check_sampleable_2d(
    sh: &ShaderBuilder,
    texture: &SourceTexture,
) -> Result<(), NotApplicable> {
    if !sh.is_empty() {
        return Err(NotApplicable::SignatureMismatch);
    }
    if texture.dimension() != TextureDimension::D2 {
        return Err(NotApplicable::UnsupportedDimension(texture.dimension()));
    }
    if !texture.is_sampleable() {
        return Err(NotApplicable::NotSampleable(texture.name().clone()));
    }
    Ok(())
}

/// Like [`check_sampleable_2d`], additionally requiring a linear sampler on
/// a filterable format.
pub(crate) fn check_linear_2d(
    sh: &ShaderBuilder,
    texture: &SourceTexture,
) -> Result<(), NotApplicable> {
    check_sampleable_2d(sh, texture)?;
    if !texture.sampler().is_linear() {
        return Err(NotApplicable::SampleMode {
            required: SampleMode::Linear,
            actual: texture.sampler(),
        });
    }
    if !texture.is_filterable() {
        return Err(NotApplicable::NotFilterable(texture.name().clone()));
    }
    Ok(())
}

/// A [`SampleSource`] with every default filled in.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ResolvedSource {
    pub rect: Rect2D,
    pub out_w: u32,
    pub out_h: u32,
    pub components: u32,
    pub scale: f32,
    pub tex_w: u32,
    pub tex_h: u32,
}

impl ResolvedSource {
    /// Source texels per output pixel, signed (negative for flipped rects).
    pub fn step(&self) -> [f32; 2] {
        [
            self.rect.width() / self.out_w.max(1) as f32,
            self.rect.height() / self.out_h.max(1) as f32,
        ]
    }

    /// Output pixels per source texel along each axis, unsigned.
    pub fn ratio(&self) -> [f32; 2] {
        let [sx, sy] = self.step();
        [inv_or_one(sx.abs()), inv_or_one(sy.abs())]
    }

    /// Source texel position (texel centers at `i + 0.5`) of an output
    /// pixel center.
    pub fn map(&self, out_px: [f32; 2]) -> [f32; 2] {
        let [sx, sy] = self.step();
        [
            self.rect.x0 + out_px[0] * sx,
            self.rect.y0 + out_px[1] * sy,
        ]
    }
}

fn inv_or_one(v: f32) -> f32 {
    if v > 0.0 && v.is_finite() { 1.0 / v } else { 1.0 }
}

/// Names of the source resources bound into a shader.
#[derive(Clone, Debug)]
pub(crate) struct BoundSource {
    pub tex: String,
    pub samp: String,
    /// Helper mapping output pixel coordinates to normalized texture
    /// coordinates.
    pub map_fn: String,
    /// `vec2f` literal of the texture size in texels.
    pub size: String,
    /// `vec2f` literal of one texel in normalized units.
    pub pt: String,
}

pub(crate) fn bind_source(
    sh: &mut ShaderBuilder,
    texture: &SourceTexture,
    resolved: &ResolvedSource,
) -> BoundSource {
    let tex = sh.bind("src_tex", BindingKind::SourceTexture(texture.name().clone()));
    let samp = sh.bind("src_samp", BindingKind::SourceSampler(texture.sampler()));
    let map_fn = sh.fresh("src_map");
    let [sx, sy] = resolved.step();
    let (tw, th) = (resolved.tex_w.max(1) as f32, resolved.tex_h.max(1) as f32);
    let size = format!("vec2f({}, {})", fmt_f32(tw), fmt_f32(th));
    sh.header(format!(
        "fn {map_fn}(p: vec2f) -> vec2f {{\n    return (vec2f({}, {}) + p * vec2f({}, {})) / {size};\n}}",
        fmt_f32(resolved.rect.x0),
        fmt_f32(resolved.rect.y0),
        fmt_f32(sx),
        fmt_f32(sy),
    ));
    BoundSource {
        tex,
        samp,
        map_fn,
        pt: format!("vec2f({}, {})", fmt_f32(1.0 / tw), fmt_f32(1.0 / th)),
        size,
    }
}
