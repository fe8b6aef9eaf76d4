//! Error and outcome types for the sampling entry points.

use thiserror::Error;

use super::device::ContextId;
use super::texture::{SampleMode, SamplerKind, TextureDimension};
use super::types::ResourceName;

/// Hard failures: the caller broke a construction-time contract.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SamplingError {
    #[error("texture `{texture_name}` belongs to GPU context {texture}, shader builder to {builder}")]
    ContextMismatch {
        builder: ContextId,
        texture: ContextId,
        texture_name: ResourceName,
    },
    #[error("shader builder already carries an input or output")]
    SignatureMismatch,
    #[error("shader builder has no output to finish")]
    EmptyShader,
    #[error("cannot deband: {0}")]
    UnsupportedSource(NotApplicable),
}

/// Failures reported by a [`GpuDevice`](super::device::GpuDevice) while
/// managing LUT textures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DeviceError {
    #[error("LUT of {width}x{height} texels exceeds the device limit of {max}")]
    LutTooLarge { width: u32, height: u32, max: u32 },
    #[error("unknown LUT texture `{0}`")]
    UnknownLut(ResourceName),
    #[error("LUT upload rejected: {0}")]
    UploadRejected(String),
}

/// Why a sampling entry point declined to emit anything.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NotApplicable {
    #[error("sampler requires {required:?} filtering, texture declares {actual:?}")]
    SampleMode {
        required: SampleMode,
        actual: SamplerKind,
    },
    #[error("texture `{0}` is not sampleable")]
    NotSampleable(ResourceName),
    #[error("texture `{0}` declares linear filtering on a non-filterable format")]
    NotFilterable(ResourceName),
    #[error("filter is not polar")]
    FilterNotPolar,
    #[error("filter is polar")]
    FilterIsPolar,
    #[error("{0:?} textures are not supported by this sampler")]
    UnsupportedDimension(TextureDimension),
    #[error("shader builder already carries an input or output")]
    SignatureMismatch,
    #[error("LUT unavailable: {0}")]
    LutUnavailable(String),
}

/// Result of a sampling entry point that may legitimately not apply.
///
/// `NotApplicable` guarantees the shader builder was left untouched.
#[must_use]
#[derive(Debug, Clone, PartialEq)]
pub enum SampleOutcome {
    Emitted,
    NotApplicable(NotApplicable),
}

impl SampleOutcome {
    pub fn is_emitted(&self) -> bool {
        matches!(self, SampleOutcome::Emitted)
    }

    pub fn reason(&self) -> Option<&NotApplicable> {
        match self {
            SampleOutcome::Emitted => None,
            SampleOutcome::NotApplicable(reason) => Some(reason),
        }
    }
}

impl From<NotApplicable> for SampleOutcome {
    fn from(reason: NotApplicable) -> Self {
        SampleOutcome::NotApplicable(reason)
    }
}
