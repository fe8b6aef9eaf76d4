//! JSON-backed resampling configuration.
//!
//! ```json
//! { "upscaler": "ewa_lanczos", "downscaler": "mitchell", "antiring": 0.5,
//!   "deband": { "iterations": 2 } }
//! ```
//!
//! Missing fields take their defaults. Filter names resolve through
//! [`FilterConfig::preset`].

use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};

use super::filters::FilterConfig;
use super::lut::LutHandle;
use super::params::{DEFAULT_LUT_ENTRIES, DEFAULT_POLAR_CUTOFF, DebandParams, SampleFilterParams};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResampleConfig {
    pub upscaler: String,
    pub downscaler: String,
    pub lut_entries: u32,
    pub cutoff: f32,
    pub antiring: f32,
    pub no_compute: bool,
    pub no_widening: bool,
    pub deband: Option<DebandParams>,
}

impl Default for ResampleConfig {
    fn default() -> Self {
        Self {
            upscaler: "spline36".to_string(),
            downscaler: "mitchell".to_string(),
            lut_entries: DEFAULT_LUT_ENTRIES,
            cutoff: DEFAULT_POLAR_CUTOFF,
            antiring: 0.0,
            no_compute: false,
            no_widening: false,
            deband: None,
        }
    }
}

impl ResampleConfig {
    pub fn from_json_str(s: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(s).context("failed to parse resample config")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        for name in [&self.upscaler, &self.downscaler] {
            if FilterConfig::preset(name).is_none() {
                bail!("unknown filter preset `{name}`");
            }
        }
        if self.lut_entries < 2 {
            bail!("lut_entries must be at least 2, got {}", self.lut_entries);
        }
        if !(0.0..=1.0).contains(&self.antiring) {
            bail!("antiring must lie in [0, 1], got {}", self.antiring);
        }
        Ok(())
    }

    /// Filter for a scaling `ratio` (output / input): the downscaler below
    /// 1, the upscaler otherwise.
    pub fn filter_for_ratio(&self, ratio: f32) -> Result<FilterConfig> {
        let name = if ratio < 1.0 {
            &self.downscaler
        } else {
            &self.upscaler
        };
        FilterConfig::preset(name).ok_or_else(|| anyhow!("unknown filter preset `{name}`"))
    }

    pub fn filter_params<'a>(
        &self,
        ratio: f32,
        lut: &'a mut LutHandle,
    ) -> Result<SampleFilterParams<'a>> {
        let filter = self
            .filter_for_ratio(ratio)
            .with_context(|| format!("no filter for ratio {ratio}"))?;
        Ok(SampleFilterParams {
            filter,
            lut_entries: self.lut_entries,
            cutoff: self.cutoff,
            antiring: self.antiring,
            no_compute: self.no_compute,
            no_widening: self.no_widening,
            lut,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_yields_defaults() {
        let cfg = ResampleConfig::from_json_str("{}").unwrap();
        assert_eq!(cfg, ResampleConfig::default());
    }

    #[test]
    fn picks_filter_by_ratio() {
        let cfg = ResampleConfig::from_json_str(
            r#"{"upscaler": "EWA_Lanczos", "downscaler": "catmull-rom", "deband": {"grain": 0}}"#,
        )
        .unwrap();
        assert!(cfg.filter_for_ratio(2.0).unwrap().polar);
        assert!(!cfg.filter_for_ratio(0.5).unwrap().polar);
        assert_eq!(cfg.deband.unwrap().grain, 0.0);
        assert_eq!(cfg.deband.unwrap().iterations, 1);
    }

    #[test]
    fn filter_params_carry_config() {
        let cfg = ResampleConfig {
            antiring: 0.75,
            no_compute: true,
            ..ResampleConfig::default()
        };
        let mut lut = LutHandle::default();
        let p = cfg.filter_params(0.5, &mut lut).unwrap();
        assert_eq!(p.antiring, 0.75);
        assert!(p.no_compute);
        assert_eq!(p.filter, FilterConfig::preset("mitchell").unwrap());
    }

    #[test]
    fn rejects_bad_values() {
        assert!(ResampleConfig::from_json_str(r#"{"upscaler": "bogus"}"#).is_err());
        assert!(ResampleConfig::from_json_str(r#"{"antiring": 2.0}"#).is_err());
        assert!(ResampleConfig::from_json_str(r#"{"lut_entries": 1}"#).is_err());
        let err = ResampleConfig::from_json_str("[").unwrap_err();
        assert!(format!("{err:#}").contains("resample config"));
    }
}
