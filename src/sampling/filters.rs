//! Filter kernels, named presets and weight table generation.
//!
//! A [`FilterConfig`] describes a 1D response `f(|x|)`, used either
//! separably (one row of taps per subpixel offset) or polar (one weight per
//! radial distance). [`generate_filter`] samples it into the table that the
//! LUT manager uploads.

use std::f64::consts::PI;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

use super::device::{LutFormat, LutShape};

/// First zero of `jinc`.
pub const JINC_ZERO_1: f64 = 1.2196698912665045;
/// Third zero of `jinc`, the usual EWA radius.
pub const JINC_ZERO_3: f64 = 3.2383154841662362;
const SPHINX_ZERO_1: f64 = 1.4302966531242027;

/// Largest separable row the samplers will unroll.
pub const MAX_ROW_SIZE: u32 = 256;
/// Largest polar footprint, `(2 * ceil(radius_cutoff))^2` texels, the
/// polar sampler will unroll.
pub const MAX_POLAR_TAPS: u32 = 4096;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Kernel {
    Box,
    Triangle,
    Cosine,
    Hann,
    Hamming,
    Welch,
    Kaiser { beta: f64 },
    Blackman { alpha: f64 },
    Gaussian { sigma: f64 },
    Sinc,
    Jinc,
    Sphinx,
    BcSpline { b: f64, c: f64 },
    Spline16,
    Spline36,
    Spline64,
}

impl Kernel {
    /// Natural support of the kernel.
    pub fn radius(&self) -> f64 {
        match self {
            Kernel::Box
            | Kernel::Triangle
            | Kernel::Hann
            | Kernel::Hamming
            | Kernel::Welch
            | Kernel::Kaiser { .. }
            | Kernel::Blackman { .. }
            | Kernel::Sinc => 1.0,
            Kernel::Cosine => PI / 2.0,
            Kernel::Gaussian { .. } => 2.0,
            Kernel::Jinc => JINC_ZERO_1,
            Kernel::Sphinx => SPHINX_ZERO_1,
            Kernel::BcSpline { .. } | Kernel::Spline16 => 2.0,
            Kernel::Spline36 => 3.0,
            Kernel::Spline64 => 4.0,
        }
    }

    /// Whether the support may be overridden by [`FilterConfig::radius`].
    pub fn resizable(&self) -> bool {
        matches!(
            self,
            Kernel::Box
                | Kernel::Triangle
                | Kernel::Gaussian { .. }
                | Kernel::Sinc
                | Kernel::Jinc
                | Kernel::Sphinx
        )
    }

    /// Response at `x >= 0` for a kernel of support `r`.
    pub fn weight(&self, x: f64, r: f64) -> f64 {
        match *self {
            Kernel::Box => 1.0,
            Kernel::Triangle => (1.0 - x / r).max(0.0),
            Kernel::Cosine => x.cos(),
            Kernel::Hann => 0.5 + 0.5 * (PI * x).cos(),
            Kernel::Hamming => 0.54 + 0.46 * (PI * x).cos(),
            Kernel::Welch => 1.0 - x * x,
            Kernel::Kaiser { beta } => {
                bessel_i0(beta * (1.0 - x * x).max(0.0).sqrt()) / bessel_i0(beta)
            }
            Kernel::Blackman { alpha } => {
                let a0 = (1.0 - alpha) / 2.0;
                let a2 = alpha / 2.0;
                a0 + 0.5 * (PI * x).cos() + a2 * (2.0 * PI * x).cos()
            }
            Kernel::Gaussian { sigma } => (-2.0 * x * x / sigma).exp(),
            Kernel::Sinc => {
                if x < 1e-8 {
                    1.0
                } else {
                    let px = PI * x;
                    px.sin() / px
                }
            }
            Kernel::Jinc => {
                if x < 1e-8 {
                    1.0
                } else {
                    let px = PI * x;
                    2.0 * bessel_j1(px) / px
                }
            }
            Kernel::Sphinx => {
                if x < 1e-8 {
                    1.0
                } else {
                    let px = PI * x;
                    3.0 * (px.sin() - px * px.cos()) / (px * px * px)
                }
            }
            Kernel::BcSpline { b, c } => bc_spline(x, b, c),
            Kernel::Spline16 => {
                if x < 1.0 {
                    ((x - 9.0 / 5.0) * x - 1.0 / 5.0) * x + 1.0
                } else {
                    let x = x - 1.0;
                    ((-1.0 / 3.0 * x + 4.0 / 5.0) * x - 7.0 / 15.0) * x
                }
            }
            Kernel::Spline36 => {
                if x < 1.0 {
                    ((13.0 / 11.0 * x - 453.0 / 209.0) * x - 3.0 / 209.0) * x + 1.0
                } else if x < 2.0 {
                    let x = x - 1.0;
                    ((-6.0 / 11.0 * x + 270.0 / 209.0) * x - 156.0 / 209.0) * x
                } else {
                    let x = x - 2.0;
                    ((1.0 / 11.0 * x - 45.0 / 209.0) * x + 26.0 / 209.0) * x
                }
            }
            Kernel::Spline64 => {
                if x < 1.0 {
                    ((49.0 / 41.0 * x - 6387.0 / 2911.0) * x - 3.0 / 2911.0) * x + 1.0
                } else if x < 2.0 {
                    let x = x - 1.0;
                    ((-24.0 / 41.0 * x + 4032.0 / 2911.0) * x - 2328.0 / 2911.0) * x
                } else if x < 3.0 {
                    let x = x - 2.0;
                    ((6.0 / 41.0 * x - 1008.0 / 2911.0) * x + 582.0 / 2911.0) * x
                } else {
                    let x = x - 3.0;
                    ((-1.0 / 41.0 * x + 168.0 / 2911.0) * x - 97.0 / 2911.0) * x
                }
            }
        }
    }
}

fn bc_spline(x: f64, b: f64, c: f64) -> f64 {
    let out = if x < 1.0 {
        (12.0 - 9.0 * b - 6.0 * c) * x * x * x + (-18.0 + 12.0 * b + 6.0 * c) * x * x
            + (6.0 - 2.0 * b)
    } else if x < 2.0 {
        (-b - 6.0 * c) * x * x * x
            + (6.0 * b + 30.0 * c) * x * x
            + (-12.0 * b - 48.0 * c) * x
            + (8.0 * b + 24.0 * c)
    } else {
        0.0
    };
    out / 6.0
}

/// Modified Bessel function of the first kind, order 0.
fn bessel_i0(x: f64) -> f64 {
    let half = x / 2.0;
    let mut term = 1.0;
    let mut sum = 1.0;
    for k in 1..64 {
        term *= half / k as f64;
        let sq = term * term;
        sum += sq;
        if sq < sum * 1e-16 {
            break;
        }
    }
    sum
}

/// Bessel function of the first kind, order 1 (rational approximation).
fn bessel_j1(x: f64) -> f64 {
    let ax = x.abs();
    if ax < 8.0 {
        let y = x * x;
        let p = x
            * (72362614232.0
                + y * (-7895059235.0
                    + y * (242396853.1
                        + y * (-2972611.439 + y * (15704.48260 + y * -30.16036606)))));
        let q = 144725228442.0
            + y * (2300535178.0
                + y * (18583304.74 + y * (99447.43394 + y * (376.9991397 + y))));
        p / q
    } else {
        let z = 8.0 / ax;
        let y = z * z;
        let xx = ax - 2.356194491;
        let p = 1.0
            + y * (0.183105e-2
                + y * (-0.3516396496e-4 + y * (0.2457520174e-5 + y * -0.240337019e-6)));
        let q = 0.04687499995
            + y * (-0.2002690873e-3
                + y * (0.8449199096e-5 + y * (-0.88228987e-6 + y * 0.105787412e-6)));
        let ans = (0.636619772 / ax).sqrt() * (xx.cos() * p - z * xx.sin() * q);
        if x < 0.0 { -ans } else { ans }
    }
}

/// Filter shape plus tunables.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub kernel: Kernel,
    pub window: Option<Kernel>,
    /// Support override, honored for resizable kernels only.
    pub radius: Option<f64>,
    /// Horizontal stretch of the kernel; `0` or `1` for none.
    pub blur: f64,
    /// Flat region in `[0, taper]` before the kernel starts.
    pub taper: f64,
    /// Attenuation of negative lobes in `[0, 1]`.
    pub clamp: f64,
    pub polar: bool,
}

impl Default for FilterConfig {
    /// `spline36`.
    fn default() -> Self {
        Self::new(Kernel::Spline36)
    }
}

/// Names accepted by [`FilterConfig::preset`].
pub const PRESET_NAMES: &[&str] = &[
    "nearest",
    "bilinear",
    "bicubic",
    "catmull_rom",
    "mitchell",
    "robidoux",
    "robidoux_sharp",
    "hermite",
    "spline16",
    "spline36",
    "spline64",
    "lanczos",
    "ginseng",
    "gaussian",
    "ewa_jinc",
    "ewa_lanczos",
    "ewa_ginseng",
    "ewa_hann",
    "ewa_robidoux",
    "ewa_robidoux_sharp",
    "haasnsoft",
];

fn robidoux() -> Kernel {
    let s2 = std::f64::consts::SQRT_2;
    Kernel::BcSpline {
        b: 12.0 / (19.0 + 9.0 * s2),
        c: 113.0 / (58.0 + 216.0 * s2),
    }
}

fn robidoux_sharp() -> Kernel {
    let s2 = std::f64::consts::SQRT_2;
    Kernel::BcSpline {
        b: 6.0 / (13.0 + 7.0 * s2),
        c: 7.0 / (2.0 + 12.0 * s2),
    }
}

impl FilterConfig {
    pub fn new(kernel: Kernel) -> Self {
        Self {
            kernel,
            window: None,
            radius: None,
            blur: 0.0,
            taper: 0.0,
            clamp: 0.0,
            polar: false,
        }
    }

    pub fn windowed(mut self, window: Kernel) -> Self {
        self.window = Some(window);
        self
    }

    pub fn with_radius(mut self, radius: f64) -> Self {
        self.radius = Some(radius);
        self
    }

    pub fn with_blur(mut self, blur: f64) -> Self {
        self.blur = blur;
        self
    }

    pub fn polar(mut self) -> Self {
        self.polar = true;
        self
    }

    /// Look up a named preset. Names are case-insensitive and `-` is
    /// accepted for `_`.
    pub fn preset(name: &str) -> Option<Self> {
        let key = name.trim().to_ascii_lowercase().replace('-', "_");
        let cfg = match key.as_str() {
            "nearest" => Self::new(Kernel::Box).with_radius(0.5),
            "bilinear" | "triangle" => Self::new(Kernel::Triangle),
            "bicubic" => Self::new(Kernel::BcSpline { b: 1.0, c: 0.0 }),
            "catmull_rom" => Self::new(Kernel::BcSpline { b: 0.0, c: 0.5 }),
            "mitchell" => Self::new(Kernel::BcSpline {
                b: 1.0 / 3.0,
                c: 1.0 / 3.0,
            }),
            "robidoux" => Self::new(robidoux()),
            "robidoux_sharp" => Self::new(robidoux_sharp()),
            "hermite" => Self::new(Kernel::BcSpline { b: 0.0, c: 0.0 }),
            "spline16" => Self::new(Kernel::Spline16),
            "spline36" => Self::new(Kernel::Spline36),
            "spline64" => Self::new(Kernel::Spline64),
            "lanczos" => Self::new(Kernel::Sinc)
                .with_radius(3.0)
                .windowed(Kernel::Sinc),
            "ginseng" => Self::new(Kernel::Sinc)
                .with_radius(3.0)
                .windowed(Kernel::Jinc),
            "gaussian" => Self::new(Kernel::Gaussian { sigma: 1.0 }),
            "ewa_jinc" => Self::new(Kernel::Jinc).with_radius(3.0).polar(),
            "ewa_lanczos" => Self::new(Kernel::Jinc)
                .with_radius(JINC_ZERO_3)
                .windowed(Kernel::Jinc)
                .polar(),
            "ewa_ginseng" => Self::new(Kernel::Jinc)
                .with_radius(JINC_ZERO_3)
                .windowed(Kernel::Sinc)
                .polar(),
            "ewa_hann" => Self::new(Kernel::Jinc)
                .with_radius(JINC_ZERO_3)
                .windowed(Kernel::Hann)
                .polar(),
            "ewa_robidoux" => Self::new(robidoux()).polar(),
            "ewa_robidoux_sharp" => Self::new(robidoux_sharp()).polar(),
            "haasnsoft" => Self::new(Kernel::Jinc)
                .with_radius(JINC_ZERO_3)
                .windowed(Kernel::Hann)
                .with_blur(1.11)
                .polar(),
            _ => return None,
        };
        Some(cfg)
    }

    /// Effective support, including blur.
    pub fn radius(&self) -> f64 {
        let base = match self.radius {
            Some(r) if self.kernel.resizable() && r > 0.0 => r,
            _ => self.kernel.radius(),
        };
        base * self.blur_factor()
    }

    fn blur_factor(&self) -> f64 {
        if self.blur > 0.0 { self.blur } else { 1.0 }
    }

    /// Response at distance `x`; zero outside `[-radius, radius]`.
    pub fn evaluate(&self, x: f64) -> f64 {
        let radius = self.radius();
        let x = x.abs();
        if x > radius {
            return 0.0;
        }
        let taper = self.taper.clamp(0.0, radius);
        let mut kx = if x <= taper {
            0.0
        } else {
            (x - taper) / (1.0 - taper / radius)
        };
        kx /= self.blur_factor();
        let kernel_radius = radius / self.blur_factor();
        let mut k = self.kernel.weight(kx, kernel_radius);
        if let Some(window) = &self.window {
            let wr = window.radius();
            k *= window.weight(x / radius * wr, wr);
        }
        if k < 0.0 {
            k * (1.0 - self.clamp.clamp(0.0, 1.0))
        } else {
            k
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct FilterRequest<'a> {
    pub config: &'a FilterConfig,
    pub entries: u32,
    /// Kernel widening factor, `>= 1` when downscaling.
    pub filter_scale: f64,
    /// Polar only: weights below this magnitude bound the radius.
    pub cutoff: f64,
    /// Polar only: attenuation of negative lobes.
    pub antiring: f64,
}

/// A sampled weight table.
#[derive(Clone, Debug, PartialEq)]
pub struct GeneratedFilter {
    pub polar: bool,
    pub entries: u32,
    /// Taps per row; `1` for polar tables.
    pub row_size: u32,
    /// Row length padded to whole texels; `1` for polar tables.
    pub row_stride: u32,
    /// Support in source texels, after widening.
    pub radius: f64,
    /// Polar: distance beyond which every weight is below the cutoff.
    pub radius_cutoff: f64,
    /// `entries * row_stride` weights, row-major.
    pub weights: Vec<f32>,
}

impl GeneratedFilter {
    pub fn row(&self, i: usize) -> &[f32] {
        let stride = self.row_stride as usize;
        &self.weights[i * stride..i * stride + self.row_size as usize]
    }

    pub fn lut_shape(&self) -> LutShape {
        if self.polar {
            LutShape {
                width: self.entries,
                height: 1,
                format: LutFormat::R16Float,
            }
        } else {
            LutShape {
                width: self.row_stride / 4,
                height: self.entries,
                format: LutFormat::Rgba16Float,
            }
        }
    }

    /// Polar weight at distance `d`, interpolated like a linear LUT fetch.
    pub fn polar_weight(&self, d: f64) -> f32 {
        let t = (d / self.radius).clamp(0.0, 1.0) * (self.entries - 1) as f64;
        let i0 = t.floor() as usize;
        let i1 = (i0 + 1).min(self.entries as usize - 1);
        let f = (t - i0 as f64) as f32;
        self.weights[i0] * (1.0 - f) + self.weights[i1] * f
    }

    /// Separable row for subpixel offset `fcoord` in `[0, 1)`, interpolated
    /// between neighbouring rows like a linear LUT fetch.
    pub fn row_at(&self, fcoord: f64) -> Vec<f32> {
        let t = fcoord.clamp(0.0, 1.0) * (self.entries - 1) as f64;
        let i0 = t.floor() as usize;
        let i1 = (i0 + 1).min(self.entries as usize - 1);
        let f = (t - i0 as f64) as f32;
        self.row(i0)
            .iter()
            .zip(self.row(i1))
            .map(|(a, b)| a * (1.0 - f) + b * f)
            .collect()
    }
}

pub fn generate_filter(req: &FilterRequest<'_>) -> Result<GeneratedFilter> {
    if req.entries < 2 {
        bail!("LUT needs at least 2 entries, got {}", req.entries);
    }
    let scale = if req.filter_scale.is_finite() && req.filter_scale >= 1.0 {
        req.filter_scale
    } else {
        1.0
    };
    let radius = req.config.radius() * scale;
    if !(radius > 0.0 && radius.is_finite()) {
        bail!("filter radius {radius} is not positive");
    }
    let entries = req.entries as usize;
    let step = 1.0 / (entries - 1) as f64;

    if req.config.polar {
        let antiring = req.antiring.clamp(0.0, 1.0);
        let weights: Vec<f32> = (0..entries)
            .map(|i| {
                let w = req.config.evaluate(i as f64 * step * radius / scale);
                let w = if w < 0.0 { w * (1.0 - antiring) } else { w };
                w as f32
            })
            .collect();
        let cutoff = req.cutoff.max(0.0) as f32;
        let Some(last) = weights.iter().rposition(|w| w.abs() > cutoff) else {
            bail!("no polar weight exceeds the cutoff {cutoff}");
        };
        let radius_cutoff = (((last + 1) as f64) * step * radius).min(radius);
        let side = 2.0 * radius_cutoff.ceil().max(1.0);
        if side * side > MAX_POLAR_TAPS as f64 {
            bail!(
                "polar filter needs up to {} taps, limit is {MAX_POLAR_TAPS}",
                side * side
            );
        }
        return Ok(GeneratedFilter {
            polar: true,
            entries: req.entries,
            row_size: 1,
            row_stride: 1,
            radius,
            radius_cutoff,
            weights,
        });
    }

    let row_size = (2.0 * radius.ceil()).max(2.0) as u32;
    if row_size > MAX_ROW_SIZE {
        bail!("separable filter needs {row_size} taps, limit is {MAX_ROW_SIZE}");
    }
    let row_stride = row_size.div_ceil(4) * 4;
    let half = (row_size / 2) as f64;
    let mut weights = vec![0.0_f32; entries * row_stride as usize];
    for i in 0..entries {
        let off = i as f64 * step;
        let row: Vec<f64> = (0..row_size)
            .map(|j| req.config.evaluate((j as f64 - half + 1.0 - off) / scale))
            .collect();
        let sum: f64 = row.iter().sum();
        if sum.abs() < 1e-12 {
            bail!("filter row {i} sums to zero");
        }
        let base = i * row_stride as usize;
        for (j, w) in row.iter().enumerate() {
            weights[base + j] = (w / sum) as f32;
        }
    }
    Ok(GeneratedFilter {
        polar: false,
        entries: req.entries,
        row_size,
        row_stride,
        radius,
        radius_cutoff: radius,
        weights,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(config: &FilterConfig) -> FilterRequest<'_> {
        FilterRequest {
            config,
            entries: 64,
            filter_scale: 1.0,
            cutoff: 0.001,
            antiring: 0.0,
        }
    }

    #[test]
    fn every_preset_resolves() {
        for name in PRESET_NAMES {
            let cfg = FilterConfig::preset(name).unwrap_or_else(|| panic!("{name}"));
            assert!(cfg.radius() > 0.0, "{name}");
            assert!((cfg.evaluate(0.0) - cfg.evaluate(-0.0)).abs() < 1e-12);
        }
        assert_eq!(
            FilterConfig::preset("EWA-Lanczos"),
            FilterConfig::preset("ewa_lanczos")
        );
        assert!(FilterConfig::preset("nope").is_none());
    }

    #[test]
    fn kernels_interpolate_at_integers() {
        for name in ["spline16", "spline36", "spline64", "catmull_rom", "lanczos"] {
            let cfg = FilterConfig::preset(name).unwrap();
            assert!((cfg.evaluate(0.0) - 1.0).abs() < 1e-9, "{name}");
            for k in 1..4 {
                assert!(cfg.evaluate(k as f64).abs() < 1e-9, "{name} at {k}");
            }
        }
    }

    #[test]
    fn jinc_vanishes_at_its_zeros() {
        let cfg = FilterConfig::new(Kernel::Jinc).with_radius(4.0);
        assert!(cfg.evaluate(JINC_ZERO_1).abs() < 1e-6);
        assert!(cfg.evaluate(JINC_ZERO_3).abs() < 1e-6);
    }

    #[test]
    fn clamp_attenuates_negative_lobes() {
        let mut cfg = FilterConfig::preset("lanczos").unwrap();
        let neg = cfg.evaluate(1.5);
        assert!(neg < 0.0);
        cfg.clamp = 1.0;
        assert_eq!(cfg.evaluate(1.5), 0.0);
    }

    #[test]
    fn separable_rows_are_normalized_and_padded() {
        let cfg = FilterConfig::default();
        let f = generate_filter(&request(&cfg)).unwrap();
        assert_eq!(f.row_size, 6);
        assert_eq!(f.row_stride, 8);
        assert_eq!(f.lut_shape().width, 2);
        assert_eq!(f.lut_shape().height, 64);
        for i in 0..64 {
            let sum: f32 = f.row(i).iter().sum();
            assert!((sum - 1.0).abs() < 1e-5);
        }
        // Offset 0 lands exactly on tap N/2 - 1.
        assert!((f.row(0)[2] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn widening_scales_support() {
        let cfg = FilterConfig::preset("bilinear").unwrap();
        let mut req = request(&cfg);
        req.filter_scale = 2.0;
        let f = generate_filter(&req).unwrap();
        assert_eq!(f.radius, 2.0);
        assert_eq!(f.row_size, 4);
    }

    #[test]
    fn polar_table_tracks_cutoff_and_antiring() {
        let cfg = FilterConfig::preset("ewa_lanczos").unwrap();
        let plain = generate_filter(&request(&cfg)).unwrap();
        assert_eq!(plain.lut_shape().format, LutFormat::R16Float);
        assert!(plain.radius_cutoff <= plain.radius);
        assert!(plain.radius_cutoff > 2.5);
        assert!(plain.weights.iter().any(|w| *w < 0.0));

        let mut req = request(&cfg);
        req.antiring = 1.0;
        let ar = generate_filter(&req).unwrap();
        assert!(ar.weights.iter().all(|w| *w >= 0.0));
    }

    #[test]
    fn polar_footprint_is_capped() {
        let cfg = FilterConfig::preset("ewa_lanczos").unwrap();
        let mut req = request(&cfg);
        req.filter_scale = 8.0;
        let wide = generate_filter(&req).unwrap();
        let side = 2.0 * wide.radius_cutoff.ceil();
        assert!(side * side <= MAX_POLAR_TAPS as f64);

        req.filter_scale = 800.0;
        let err = generate_filter(&req).unwrap_err();
        assert!(err.to_string().contains("polar filter needs"), "{err}");
    }

    #[test]
    fn degenerate_requests_fail() {
        let cfg = FilterConfig::default();
        let mut req = request(&cfg);
        req.entries = 1;
        assert!(generate_filter(&req).is_err());
    }
}
