//! [`GpuDevice`] over a real `wgpu` device and queue.

use std::collections::HashMap;
use std::sync::Mutex;

use log::{debug, warn};

use super::device::{DeviceCaps, GpuDevice, LutFormat, LutShape, check_lut_upload};
use super::error::DeviceError;
use super::types::ResourceName;

fn effective_texture_format_features(
    format: wgpu::TextureFormat,
    device_features: wgpu::Features,
    adapter: &wgpu::Adapter,
) -> wgpu::TextureFormatFeatures {
    if device_features.contains(wgpu::Features::TEXTURE_ADAPTER_SPECIFIC_FORMAT_FEATURES) {
        return adapter.get_texture_format_features(format);
    }
    format.guaranteed_format_features(device_features)
}

/// Capabilities of `device` as created from `adapter`.
pub fn device_caps(adapter: &wgpu::Adapter, device: &wgpu::Device) -> DeviceCaps {
    let limits = device.limits();
    let compute_shaders = adapter
        .get_downlevel_capabilities()
        .flags
        .contains(wgpu::DownlevelFlags::COMPUTE_SHADERS);
    let storage_output = effective_texture_format_features(
        wgpu::TextureFormat::Rgba16Float,
        device.features(),
        adapter,
    )
    .allowed_usages
    .contains(wgpu::TextureUsages::STORAGE_BINDING);
    DeviceCaps {
        compute_shaders,
        storage_output,
        max_workgroup_storage_bytes: limits.max_compute_workgroup_storage_size,
        max_workgroup_invocations: limits.max_compute_invocations_per_workgroup,
        max_texture_dimension_2d: limits.max_texture_dimension_2d,
    }
}

fn wgpu_format(format: LutFormat) -> wgpu::TextureFormat {
    match format {
        LutFormat::R16Float => wgpu::TextureFormat::R16Float,
        LutFormat::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
    }
}

/// Linear, clamp-to-edge sampler for LUT lookups.
pub fn lut_sampler_descriptor() -> wgpu::SamplerDescriptor<'static> {
    wgpu::SamplerDescriptor {
        label: Some("sys.sampling.lut.sampler"),
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::FilterMode::Nearest,
        ..Default::default()
    }
}

pub struct WgpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    caps: DeviceCaps,
    luts: Mutex<HashMap<ResourceName, (wgpu::Texture, LutShape)>>,
}

impl WgpuDevice {
    pub fn new(adapter: &wgpu::Adapter, device: wgpu::Device, queue: wgpu::Queue) -> Self {
        let caps = device_caps(adapter, &device);
        debug!("sampling device caps: {caps:?}");
        Self::with_caps(device, queue, caps)
    }

    /// Device with explicit caps, e.g. to force the fragment path.
    pub fn with_caps(device: wgpu::Device, queue: wgpu::Queue, caps: DeviceCaps) -> Self {
        Self {
            device,
            queue,
            caps,
            luts: Mutex::new(HashMap::new()),
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// View of a resident LUT, for bind groups built from
    /// [`BindingKind::LutTexture`](super::shader::BindingKind::LutTexture).
    pub fn lut_view(&self, name: &ResourceName) -> Option<wgpu::TextureView> {
        let luts = self.luts.lock().ok()?;
        let (texture, _) = luts.get(name)?;
        Some(texture.create_view(&wgpu::TextureViewDescriptor::default()))
    }

    fn write(&self, texture: &wgpu::Texture, shape: LutShape, texels: &[u8]) {
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            texels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(shape.width * shape.format.bytes_per_texel()),
                rows_per_image: Some(shape.height),
            },
            wgpu::Extent3d {
                width: shape.width,
                height: shape.height,
                depth_or_array_layers: 1,
            },
        );
    }
}

fn poisoned() -> DeviceError {
    DeviceError::UploadRejected("LUT store poisoned".to_string())
}

impl GpuDevice for WgpuDevice {
    fn caps(&self) -> DeviceCaps {
        self.caps
    }

    fn create_lut(
        &self,
        name: &ResourceName,
        shape: LutShape,
        texels: &[u8],
    ) -> Result<(), DeviceError> {
        check_lut_upload(&self.caps, shape, texels)?;
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(name.as_str()),
            size: wgpu::Extent3d {
                width: shape.width,
                height: shape.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu_format(shape.format),
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        self.write(&texture, shape, texels);
        let mut luts = self.luts.lock().map_err(|_| poisoned())?;
        if let Some((old, _)) = luts.insert(name.clone(), (texture, shape)) {
            warn!("LUT `{name}` was created twice; dropping the previous texture");
            old.destroy();
        }
        Ok(())
    }

    fn update_lut(
        &self,
        name: &ResourceName,
        shape: LutShape,
        texels: &[u8],
    ) -> Result<(), DeviceError> {
        check_lut_upload(&self.caps, shape, texels)?;
        let luts = self.luts.lock().map_err(|_| poisoned())?;
        match luts.get(name) {
            Some((texture, current)) if *current == shape => {
                self.write(texture, shape, texels);
                Ok(())
            }
            Some(_) => Err(DeviceError::UploadRejected(format!(
                "shape of `{name}` changed"
            ))),
            None => Err(DeviceError::UnknownLut(name.clone())),
        }
    }

    fn release_lut(&self, name: &ResourceName) {
        let Ok(mut luts) = self.luts.lock() else {
            return;
        };
        if let Some((texture, _)) = luts.remove(name) {
            texture.destroy();
        }
    }
}
