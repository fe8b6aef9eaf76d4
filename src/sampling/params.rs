//! Parameter descriptors for the debanding and filtered entry points.

use serde::{Deserialize, Serialize};

use super::filters::FilterConfig;
use super::lut::LutHandle;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebandParams {
    /// Rounds of gradient estimation; `0` leaves only the grain step.
    /// Values above ~4 are pointless.
    pub iterations: u32,
    /// Higher values remove more banding and more detail.
    pub threshold: f32,
    /// Sampling distance of the first round, in source texels. Round `i`
    /// reaches `i * radius`.
    pub radius: f32,
    /// Additive noise amplitude.
    pub grain: f32,
}

impl Default for DebandParams {
    fn default() -> Self {
        Self {
            iterations: 1,
            threshold: 4.0,
            radius: 16.0,
            grain: 6.0,
        }
    }
}

/// Rounds past this add nothing visible; larger requests are clamped.
pub const MAX_DEBAND_ITERATIONS: u32 = 16;

pub const DEFAULT_LUT_ENTRIES: u32 = 64;
pub const DEFAULT_POLAR_CUTOFF: f32 = 0.001;

/// Parameters for the LUT-based samplers.
///
/// `lut` is the caller-owned slot the weight table lives in. Sharing one
/// slot between different filters or scaling ratios is legal but rebuilds
/// the table on every switch.
#[derive(Debug)]
pub struct SampleFilterParams<'a> {
    pub filter: FilterConfig,
    pub lut_entries: u32,
    /// Polar only.
    pub cutoff: f32,
    /// Antiringing strength in `[0, 1]`.
    pub antiring: f32,
    /// Keep the polar sampler on the fragment path.
    pub no_compute: bool,
    /// Do not widen the kernel when downscaling.
    pub no_widening: bool,
    pub lut: &'a mut LutHandle,
}

impl<'a> SampleFilterParams<'a> {
    pub fn new(filter: FilterConfig, lut: &'a mut LutHandle) -> Self {
        Self {
            filter,
            lut_entries: DEFAULT_LUT_ENTRIES,
            cutoff: DEFAULT_POLAR_CUTOFF,
            antiring: 0.0,
            no_compute: false,
            no_widening: false,
            lut,
        }
    }

    pub fn with_antiring(mut self, antiring: f32) -> Self {
        self.antiring = antiring;
        self
    }

    pub fn with_lut_entries(mut self, entries: u32) -> Self {
        self.lut_entries = entries;
        self
    }

    pub fn with_no_compute(mut self, no_compute: bool) -> Self {
        self.no_compute = no_compute;
        self
    }

    pub fn with_no_widening(mut self, no_widening: bool) -> Self {
        self.no_widening = no_widening;
        self
    }

    /// Kernel widening factor for a downscale `ratio` (output / input).
    pub(crate) fn filter_scale(&self, ratio: f32) -> f64 {
        if !self.no_widening && ratio > 0.0 && ratio < 1.0 {
            1.0 / ratio as f64
        } else {
            1.0
        }
    }
}
