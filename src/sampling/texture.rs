//! Source texture description and sampler configuration.
//!
//! A [`SourceTexture`] carries what the sampling code needs to know about an
//! image: its size and dimensionality, how many components it holds, which
//! sampler (nearest/linear × clamp/mirror/repeat) it is bound with, and the
//! format capabilities that decide whether a hardware fetch is legal.

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

use super::device::{ContextId, GpuContext};
use super::types::ResourceName;

/// Hardware filtering mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SampleMode {
    Nearest,
    Linear,
}

/// Sampler configuration bound together with a texture.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SamplerKind {
    NearestClamp,
    NearestMirror,
    NearestRepeat,
    LinearClamp,
    LinearMirror,
    LinearRepeat,
}

impl SamplerKind {
    pub fn mode(self) -> SampleMode {
        match self {
            SamplerKind::NearestClamp | SamplerKind::NearestMirror | SamplerKind::NearestRepeat => {
                SampleMode::Nearest
            }
            SamplerKind::LinearClamp | SamplerKind::LinearMirror | SamplerKind::LinearRepeat => {
                SampleMode::Linear
            }
        }
    }

    pub fn is_linear(self) -> bool {
        self.mode() == SampleMode::Linear
    }

    pub fn descriptor(self) -> wgpu::SamplerDescriptor<'static> {
        let filter = match self.mode() {
            SampleMode::Nearest => wgpu::FilterMode::Nearest,
            SampleMode::Linear => wgpu::FilterMode::Linear,
        };
        let address = match self {
            SamplerKind::NearestClamp | SamplerKind::LinearClamp => {
                wgpu::AddressMode::ClampToEdge
            }
            SamplerKind::NearestMirror | SamplerKind::LinearMirror => {
                wgpu::AddressMode::MirrorRepeat
            }
            SamplerKind::NearestRepeat | SamplerKind::LinearRepeat => wgpu::AddressMode::Repeat,
        };
        wgpu::SamplerDescriptor {
            label: Some("sys.sampling.sampler"),
            mag_filter: filter,
            min_filter: filter,
            mipmap_filter: wgpu::FilterMode::Nearest,
            address_mode_u: address,
            address_mode_v: address,
            address_mode_w: address,
            ..Default::default()
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureDimension {
    D1,
    D2,
    D3,
}

/// A texture visible to the sampling entry points.
#[derive(Clone, Debug)]
pub struct SourceTexture {
    name: ResourceName,
    context: ContextId,
    width: u32,
    height: u32,
    dimension: TextureDimension,
    components: u32,
    sampler: SamplerKind,
    sampleable: bool,
    filterable: bool,
}

impl SourceTexture {
    /// 2D, sampleable, filterable texture bound with a linear clamp sampler.
    pub fn new(
        ctx: &GpuContext,
        name: impl Into<ResourceName>,
        width: u32,
        height: u32,
        components: u32,
    ) -> Self {
        Self {
            name: name.into(),
            context: ctx.id(),
            width,
            height,
            dimension: TextureDimension::D2,
            components: components.clamp(1, 4),
            sampler: SamplerKind::LinearClamp,
            sampleable: true,
            filterable: true,
        }
    }

    pub fn with_sampler(mut self, sampler: SamplerKind) -> Self {
        self.sampler = sampler;
        self
    }

    pub fn with_dimension(mut self, dimension: TextureDimension) -> Self {
        self.dimension = dimension;
        self
    }

    pub fn with_capabilities(mut self, sampleable: bool, filterable: bool) -> Self {
        self.sampleable = sampleable;
        self.filterable = filterable;
        self
    }

    /// Describe an existing wgpu texture.
    ///
    /// Capabilities come from the format's guaranteed features under
    /// `device_features`, plus the texture's own usage flags.
    pub fn from_wgpu(
        ctx: &GpuContext,
        name: impl Into<ResourceName>,
        texture: &wgpu::Texture,
        sampler: SamplerKind,
        device_features: wgpu::Features,
    ) -> Result<Self> {
        let name = name.into();
        let format = texture.format();
        let size = texture.size();
        let dimension = match texture.dimension() {
            wgpu::TextureDimension::D1 => TextureDimension::D1,
            wgpu::TextureDimension::D2 => TextureDimension::D2,
            wgpu::TextureDimension::D3 => TextureDimension::D3,
        };
        if texture.sample_count() > 1 {
            bail!("texture `{name}` is multisampled and cannot be resampled");
        }
        let float_sample = matches!(
            format.sample_type(None, Some(device_features)),
            Some(wgpu::TextureSampleType::Float { .. })
        );
        let sampleable =
            float_sample && texture.usage().contains(wgpu::TextureUsages::TEXTURE_BINDING);
        let filterable = format
            .guaranteed_format_features(device_features)
            .flags
            .contains(wgpu::TextureFormatFeatureFlags::FILTERABLE);

        Ok(Self {
            name,
            context: ctx.id(),
            width: size.width,
            height: size.height,
            dimension,
            components: u32::from(format.components()).clamp(1, 4),
            sampler,
            sampleable,
            filterable,
        })
    }

    pub fn name(&self) -> &ResourceName {
        &self.name
    }

    pub fn context(&self) -> ContextId {
        self.context
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimension(&self) -> TextureDimension {
        self.dimension
    }

    pub fn components(&self) -> u32 {
        self.components
    }

    pub fn sampler(&self) -> SamplerKind {
        self.sampler
    }

    pub fn is_sampleable(&self) -> bool {
        self.sampleable
    }

    pub fn is_filterable(&self) -> bool {
        self.filterable
    }
}
