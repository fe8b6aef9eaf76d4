//! Numeric properties of the emitted samplers, checked through the CPU
//! reference model with the LUTs the entry points actually built.

mod common;

use forge_sampling::sampling::filters::{FilterRequest, PRESET_NAMES, generate_filter};
use forge_sampling::sampling::lut::LutRequest;
use forge_sampling::sampling::params::{DEFAULT_LUT_ENTRIES, DEFAULT_POLAR_CUTOFF};
use forge_sampling::sampling::reference;
use forge_sampling::{
    DebandParams, DeviceCaps, FilterConfig, GeneratedFilter, GpuContext, LutHandle,
    SampleFilterParams, SampleSource, SeparablePass, ShaderBuilder, SourceTexture, sample_deband,
    sample_ortho, sample_polar,
};
use image::{Rgba, Rgba32FImage};
use proptest::prelude::*;

fn ctx() -> GpuContext {
    GpuContext::headless(DeviceCaps::default())
}

/// Run one separable pass through the entry point and evaluate it on the CPU.
fn ortho_pass(
    ctx: &GpuContext,
    img: &Rgba32FImage,
    pass: SeparablePass,
    out: (u32, u32),
    filter: &FilterConfig,
    antiring: f32,
) -> Rgba32FImage {
    let tex = SourceTexture::new(ctx, "src", img.width(), img.height(), 4);
    let src = SampleSource::new(&tex).with_output_size(out.0, out.1);
    let mut lut = LutHandle::default();
    let mut sh = ShaderBuilder::new(ctx);
    let params = SampleFilterParams::new(filter.clone(), &mut lut).with_antiring(antiring);
    assert!(sample_ortho(&mut sh, pass, &src, params).unwrap().is_emitted());
    let table: GeneratedFilter = lut.filter().unwrap().clone();
    reference::ortho(img, pass, &src.resolve(), &table, antiring)
}

fn separable(
    ctx: &GpuContext,
    img: &Rgba32FImage,
    out: (u32, u32),
    filter: &FilterConfig,
    antiring: f32,
) -> Rgba32FImage {
    let mid = ortho_pass(ctx, img, SeparablePass::Vertical, out, filter, antiring);
    assert_eq!(mid.dimensions(), (img.width(), out.1));
    ortho_pass(ctx, &mid, SeparablePass::Horizontal, out, filter, antiring)
}

fn polar(
    ctx: &GpuContext,
    img: &Rgba32FImage,
    out: (u32, u32),
    filter: &FilterConfig,
) -> Rgba32FImage {
    let tex = SourceTexture::new(ctx, "src", img.width(), img.height(), 4);
    let src = SampleSource::new(&tex).with_output_size(out.0, out.1);
    let mut lut = LutHandle::default();
    let mut sh = ShaderBuilder::new(ctx);
    let params = SampleFilterParams::new(filter.clone(), &mut lut);
    assert!(sample_polar(&mut sh, &src, params).unwrap().is_emitted());
    reference::polar(img, &src.resolve(), lut.filter().unwrap())
}

fn smooth_image(w: u32, h: u32) -> Rgba32FImage {
    Rgba32FImage::from_fn(w, h, |x, y| {
        let (fx, fy) = (x as f32, y as f32);
        Rgba([
            0.5 + 0.25 * (fx * 0.4).sin() * (fy * 0.3).cos(),
            fx / w as f32,
            0.5 + 0.4 * ((fx + fy) * 0.2).sin(),
            1.0,
        ])
    })
}

#[test]
fn defaults_match_the_documented_values() {
    let d = DebandParams::default();
    assert_eq!((d.iterations, d.threshold, d.radius, d.grain), (1, 4.0, 16.0, 6.0));

    let c = ctx();
    let tex = SourceTexture::new(&c, "src", 40, 30, 3);
    let r = SampleSource::new(&tex).resolve();
    assert_eq!((r.out_w, r.out_h, r.components, r.scale), (40, 30, 3, 1.0));
    assert_eq!(r.rect, forge_sampling::Rect2D::full(40, 30));

    let mut lut = LutHandle::default();
    let p = SampleFilterParams::new(FilterConfig::default(), &mut lut);
    assert_eq!(p.lut_entries, DEFAULT_LUT_ENTRIES);
    assert_eq!(p.cutoff, DEFAULT_POLAR_CUTOFF);
    assert_eq!(p.antiring, 0.0);
    assert!(!p.no_compute && !p.no_widening);
    assert_eq!(p.filter, FilterConfig::preset("spline36").unwrap());
}

#[test]
fn zero_iterations_is_pure_grain() {
    let c = ctx();
    let tex = SourceTexture::new(&c, "src", 16, 16, 4);
    let mut sh = ShaderBuilder::new(&c);
    let params = DebandParams {
        iterations: 0,
        ..DebandParams::default()
    };
    let _ = sample_deband(&mut sh, &SampleSource::new(&tex), Some(&params)).unwrap();
    let shader = sh.finish().unwrap();
    assert_eq!(shader.wgsl.matches("textureSampleLevel(").count(), 1);
    assert!(!shader.wgsl.contains("select("));
    assert!(shader.wgsl.contains("0.006 * ("));
}

#[test]
fn separable_gaussian_matches_polar_gaussian() {
    common::init_logging();
    let c = ctx();
    let img = smooth_image(32, 32);
    let sep = FilterConfig::preset("gaussian").unwrap();
    let radial = sep.clone().polar();
    for out in [16, 32, 64] {
        let a = separable(&c, &img, (out, out), &sep, 0.0);
        let b = polar(&c, &img, (out, out), &radial);
        assert_eq!(a.dimensions(), b.dimensions());
        let worst = a
            .pixels()
            .zip(b.pixels())
            .flat_map(|(p, q)| (0..4).map(move |i| (p.0[i] - q.0[i]).abs()))
            .fold(0.0f32, f32::max);
        assert!(worst < 1e-2, "{out}px: max difference {worst}");
    }
}

#[test]
fn antiring_keeps_results_inside_the_nearest_taps() {
    let c = ctx();
    let img = Rgba32FImage::from_fn(24, 4, |x, _| {
        let v = if x < 12 { 0.1 } else { 0.9 };
        Rgba([v, 1.0 - v, v, 1.0])
    });
    let lanczos = FilterConfig::preset("lanczos").unwrap();

    let ringing = ortho_pass(&c, &img, SeparablePass::Horizontal, (60, 4), &lanczos, 0.0);
    assert!(ringing.pixels().any(|p| p.0[0] < 0.1 - 1e-3 || p.0[0] > 0.9 + 1e-3));

    let tex = SourceTexture::new(&c, "src", 24, 4, 4);
    let resolved = SampleSource::new(&tex).with_output_size(60, 4).resolve();
    let r = SeparablePass::Horizontal.restrict(&resolved);
    let clamped = ortho_pass(&c, &img, SeparablePass::Horizontal, (60, 4), &lanczos, 1.0);
    for (x, y, px) in clamped.enumerate_pixels() {
        let [sx, sy] = r.map([x as f32 + 0.5, y as f32 + 0.5]);
        let lo = (sx - 0.5).floor() as i64;
        let row = (sy - 0.5).floor() as i64;
        let a = reference::fetch_clamped(&img, lo, row);
        let b = reference::fetch_clamped(&img, lo + 1, row);
        for i in 0..4 {
            let (min, max) = (a[i].min(b[i]), a[i].max(b[i]));
            assert!(px.0[i] >= min - 1e-5 && px.0[i] <= max + 1e-5, "({x},{y}) ch{i}");
        }
    }
}

#[test]
fn partial_antiring_blends_toward_the_clamped_result() {
    let c = ctx();
    let img = Rgba32FImage::from_fn(24, 4, |x, _| {
        let v = if x < 12 { 0.1 } else { 0.9 };
        Rgba([v, 1.0 - v, v, 1.0])
    });
    let lanczos = FilterConfig::preset("lanczos").unwrap();
    let run = |s: f32| ortho_pass(&c, &img, SeparablePass::Horizontal, (60, 4), &lanczos, s);
    let (free, clamped) = (run(0.0), run(1.0));
    let overshoot = |out: &Rgba32FImage| {
        out.pixels()
            .map(|p| (0.1 - p.0[0]).max(p.0[0] - 0.9))
            .fold(0.0f32, f32::max)
    };

    for s in [0.25, 0.5, 0.75] {
        let out = run(s);
        for ((p, f), k) in out.pixels().zip(free.pixels()).zip(clamped.pixels()) {
            for i in 0..4 {
                let blend = f.0[i] * (1.0 - s) + k.0[i] * s;
                assert!((p.0[i] - blend).abs() < 1e-5, "strength {s} ch{i}");
            }
        }
        // Only full strength stays inside the envelope.
        let o = overshoot(&out);
        assert!(o > 1e-3, "strength {s}");
        assert!((o - (1.0 - s) * overshoot(&free)).abs() < 1e-4, "strength {s}");
    }
    assert!(overshoot(&clamped) < 1e-5);
}

#[test]
fn upscaled_ramp_is_monotone_without_overshoot() {
    let c = ctx();
    let img = Rgba32FImage::from_fn(100, 100, |x, _| {
        let v = x as f32 / 99.0;
        Rgba([v, v, v, 1.0])
    });
    let spline36 = FilterConfig::preset("spline36").unwrap();
    let out = separable(&c, &img, (200, 200), &spline36, 1.0);
    for y in 0..200 {
        let mut prev = f32::NEG_INFINITY;
        for x in 0..200 {
            let v = out.get_pixel(x, y).0[0];
            assert!((-1e-5..=1.0 + 1e-5).contains(&v), "({x},{y}) = {v}");
            assert!(v >= prev - 1e-5, "({x},{y}): {v} after {prev}");
            prev = v;
        }
    }
}

fn separable_presets() -> Vec<&'static str> {
    PRESET_NAMES
        .iter()
        .copied()
        .filter(|name| FilterConfig::preset(name).is_some_and(|f| !f.polar))
        .collect()
}

fn table(name: &str, entries: u32, filter_scale: f64) -> GeneratedFilter {
    let config = FilterConfig::preset(name).unwrap();
    generate_filter(&FilterRequest {
        config: &config,
        entries,
        filter_scale,
        cutoff: 0.001,
        antiring: 0.0,
    })
    .unwrap()
}

proptest! {
    #[test]
    fn separable_rows_sum_to_one(
        name in prop::sample::select(separable_presets()),
        entries in 2u32..96,
        filter_scale in 1.0f64..4.0,
    ) {
        let f = table(name, entries, filter_scale);
        for i in 0..entries as usize {
            let sum: f32 = f.row(i).iter().sum();
            prop_assert!((sum - 1.0).abs() < 1e-4, "row {} sums to {}", i, sum);
        }
    }

    #[test]
    fn separable_rows_mirror_each_other(
        name in prop::sample::select(separable_presets()),
        entries in 2u32..96,
    ) {
        let f = table(name, entries, 1.0);
        let last = entries as usize - 1;
        for i in 0..entries as usize {
            let forward = f.row(i);
            let mirrored: Vec<f32> = f.row(last - i).iter().rev().copied().collect();
            for (a, b) in forward.iter().zip(&mirrored) {
                prop_assert!((a - b).abs() < 1e-5);
            }
        }
    }

    #[test]
    fn fingerprint_tracks_table_inputs(
        entries in 2u32..256,
        scale in 1.0f64..8.0,
        cutoff in 0.0001f32..0.01,
    ) {
        let sep = FilterConfig::preset("spline36").unwrap();
        let ewa = FilterConfig::preset("ewa_lanczos").unwrap();
        let req = |config, entries, filter_scale, cutoff| LutRequest {
            config,
            entries,
            cutoff,
            antiring: 0.0,
            filter_scale,
        };
        let fp = |r: LutRequest<'_>| r.fingerprint().unwrap();

        let base = fp(req(&sep, entries, scale, cutoff));
        prop_assert_eq!(base, fp(req(&sep, entries, scale, cutoff)));
        prop_assert_ne!(base, fp(req(&sep, entries + 1, scale, cutoff)));
        prop_assert_ne!(base, fp(req(&sep, entries, scale + 0.5, cutoff)));
        prop_assert_ne!(base, fp(req(&ewa, entries, scale, cutoff)));
        // The cutoff only shapes polar tables.
        prop_assert_eq!(base, fp(req(&sep, entries, scale, cutoff * 2.0)));
        prop_assert_ne!(
            fp(req(&ewa, entries, scale, cutoff)),
            fp(req(&ewa, entries, scale, cutoff * 2.0))
        );
    }
}
