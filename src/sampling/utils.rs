//! Utility functions for WGSL emission and LUT texel packing.

use half::f16;

/// Format a float for WGSL.
///
/// Always carries a decimal point or exponent so the literal is an
/// abstract float, never an abstract int. Non-finite values become `0.0`.
pub fn fmt_f32(v: f32) -> String {
    if !v.is_finite() {
        return "0.0".to_string();
    }
    let s = format!("{v:?}");
    if s.contains('.') || s.contains('e') || s.contains("inf") {
        s
    } else {
        format!("{s}.0")
    }
}

/// Widen the first `comps` channels of a vec4 expression to a color,
/// multiplied by `scale`. Missing color channels become 0 and alpha 1.
pub fn scaled_color(expr: &str, comps: u32, scale: f32) -> String {
    let s = fmt_f32(scale);
    match comps {
        0 | 1 => format!("vec4f({expr}.x * {s}, 0.0, 0.0, 1.0)"),
        2 => format!("vec4f({expr}.xy * {s}, 0.0, 1.0)"),
        3 => format!("vec4f({expr}.xyz * {s}, 1.0)"),
        _ => format!("({expr} * {s})"),
    }
}

/// Channel mask selecting the first `min(comps, 3)` channels, used to keep
/// additive noise off alpha.
pub fn color_channel_mask(comps: u32) -> &'static str {
    match comps {
        0 | 1 => "vec4f(1.0, 0.0, 0.0, 0.0)",
        2 => "vec4f(1.0, 1.0, 0.0, 0.0)",
        _ => "vec4f(1.0, 1.0, 1.0, 0.0)",
    }
}

/// Encode f32 texels as little-endian IEEE half floats for upload.
pub fn encode_f16_texels(values: &[f32]) -> Vec<u8> {
    let halves: Vec<f16> = values.iter().map(|v| f16::from_f32(*v)).collect();
    bytemuck::cast_slice::<f16, u8>(&halves).to_vec()
}

/// Decode what [`encode_f16_texels`] produced. Trailing odd bytes are ignored.
pub fn decode_f16_texels(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(2)
        .map(|c| f16::from_le_bytes([c[0], c[1]]).to_f32())
        .collect()
}

pub fn ceil_div(a: u32, b: u32) -> u32 {
    if b == 0 { 0 } else { a.div_ceil(b) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fmt_f32_always_emits_float_literals() {
        assert_eq!(fmt_f32(1.0), "1.0");
        assert_eq!(fmt_f32(0.25), "0.25");
        assert_eq!(fmt_f32(-3.0), "-3.0");
        assert_eq!(fmt_f32(f32::NAN), "0.0");
        assert!(fmt_f32(1.0e-7).contains('e'));
    }

    #[test]
    fn scaled_color_fills_missing_channels() {
        assert_eq!(
            scaled_color("c", 1, 1.0),
            "vec4f(c.x * 1.0, 0.0, 0.0, 1.0)"
        );
        assert_eq!(scaled_color("c", 3, 2.0), "vec4f(c.xyz * 2.0, 1.0)");
        assert_eq!(scaled_color("c", 4, 0.5), "(c * 0.5)");
    }

    #[test]
    fn f16_texels_preserve_representable_values() {
        let src = [0.0_f32, 1.0, -0.5, 0.125];
        let bytes = encode_f16_texels(&src);
        assert_eq!(bytes.len(), 8);
        assert_eq!(decode_f16_texels(&bytes), src.to_vec());
    }
}
