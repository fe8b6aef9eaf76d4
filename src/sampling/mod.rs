//! WGSL sampling shaders: debanding, direct, bicubic, polar (EWA) and
//! separable resampling, plus the LUT textures the filtered samplers need.
//!
//! This module is organized into several submodules:
//! - `types`: Core type definitions (ValueType, TypedExpr, ResourceName, Rect2D)
//! - `utils`: WGSL literal formatting and half-float texel packing
//! - `validation`: WGSL validation using naga
//! - `device`: GPU context token, device caps and the `GpuDevice` seam
//! - `wgpu_device`: `GpuDevice` backed by a real wgpu device
//! - `texture`: Source textures and their sampler kinds
//! - `shader`: The shader builder samplers emit into
//! - `filters`: Kernel library, presets and filter table generation
//! - `lut`: LUT handles with get-or-create by fingerprint
//! - `deband`, `direct`, `bicubic`, `polar`, `ortho`: The sampling entry points
//! - `reference`: CPU evaluation of the emitted samplers
//! - `config`: JSON resampling configuration
//!
//! The main entry points are:
//! - `sample_deband`, `sample_direct`, `sample_bicubic`, `sample_polar`, `sample_ortho`
//! - `ShaderBuilder::finish`: Wrap the emitted code into a WGSL module

pub mod bicubic;
pub mod config;
pub mod deband;
pub mod device;
pub mod direct;
pub mod error;
pub mod filters;
pub mod lut;
pub mod ortho;
pub mod params;
pub mod polar;
pub mod reference;
pub mod shader;
pub mod source;
pub mod texture;
pub mod types;
pub mod utils;
pub mod validation;
pub mod wgpu_device;

pub use bicubic::sample_bicubic;
pub use config::ResampleConfig;
pub use deband::sample_deband;
pub use device::{
    ContextId, DeviceCaps, GpuContext, GpuDevice, HeadlessDevice, LutFormat, LutShape,
};
pub use direct::sample_direct;
pub use error::{DeviceError, NotApplicable, SampleOutcome, SamplingError};
pub use filters::{FilterConfig, GeneratedFilter, Kernel, generate_filter};
pub use lut::{LutHandle, LutInfo};
pub use ortho::{SeparablePass, sample_ortho};
pub use params::{DebandParams, SampleFilterParams};
pub use polar::sample_polar;
pub use shader::{Binding, BindingKind, GeneratedShader, ShaderBuilder, ShaderStage};
pub use source::{ResolvedSource, SampleSource};
pub use texture::{SampleMode, SamplerKind, SourceTexture, TextureDimension};
pub use types::{Rect2D, ResourceName, TypedExpr, ValueType};
pub use validation::{validate_wgsl, validate_wgsl_with_context};
pub use wgpu_device::WgpuDevice;
