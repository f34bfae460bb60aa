//! Pure, composable pixel-buffer transforms.
//!
//! Every function operates in place on a premultiplied RGBA8 buffer of
//! `width * height * 4` bytes and validates that length up front. Effects
//! are deterministic: grain takes an explicit seed. Chains are declared per
//! document template as [`PhotoEffectSpec`] lists; the order of a chain is
//! part of the visual contract.

use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::error::{DocforgeError, DocforgeResult};

/// A single named effect with parameters, as declared in template config.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum PhotoEffectSpec {
    GrayscaleBlend { ratio: f32 },
    Darken { factor: f32 },
    Grain { amplitude: f32 },
    Vignette { strength: f32 },
    WarmOverlay { tint: [u8; 3], opacity: f32 },
    Blur { radius: u32, sigma: f32 },
}

/// Apply a declared effect chain in order. `seed` feeds the grain noise;
/// successive grain entries in one chain use successive derived seeds.
pub fn apply_chain(
    buf: &mut [u8],
    width: u32,
    height: u32,
    chain: &[PhotoEffectSpec],
    seed: u64,
) -> DocforgeResult<()> {
    for (i, spec) in chain.iter().enumerate() {
        match *spec {
            PhotoEffectSpec::GrayscaleBlend { ratio } => {
                grayscale_blend_in_place(buf, width, height, ratio)?;
            }
            PhotoEffectSpec::Darken { factor } => darken_in_place(buf, width, height, factor)?,
            PhotoEffectSpec::Grain { amplitude } => {
                grain_in_place(buf, width, height, amplitude, seed.wrapping_add(i as u64))?;
            }
            PhotoEffectSpec::Vignette { strength } => {
                vignette_in_place(buf, width, height, strength)?;
            }
            PhotoEffectSpec::WarmOverlay { tint, opacity } => {
                warm_overlay_in_place(buf, width, height, tint, opacity)?;
            }
            PhotoEffectSpec::Blur { radius, sigma } => {
                blur_in_place(buf, width, height, radius, sigma)?;
            }
        }
    }
    Ok(())
}

/// Blend each pixel toward its BT.601 luminance:
/// `out = orig * (1 - ratio) + luma * ratio` with
/// `luma = 0.299 R + 0.587 G + 0.114 B`.
pub fn grayscale_blend_in_place(
    buf: &mut [u8],
    width: u32,
    height: u32,
    ratio: f32,
) -> DocforgeResult<()> {
    expect_rgba_len(buf, width, height)?;
    let ratio = ratio.clamp(0.0, 1.0);
    if ratio == 0.0 {
        return Ok(());
    }
    for px in buf.chunks_exact_mut(4) {
        let luma =
            0.299 * f32::from(px[0]) + 0.587 * f32::from(px[1]) + 0.114 * f32::from(px[2]);
        for c in 0..3 {
            let orig = f32::from(px[c]);
            px[c] = (orig * (1.0 - ratio) + luma * ratio).round().clamp(0.0, 255.0) as u8;
        }
    }
    Ok(())
}

/// Multiply RGB channels by `factor`; alpha is untouched. Used for the
/// low-alpha "shadow" photo duplicates.
pub fn darken_in_place(
    buf: &mut [u8],
    width: u32,
    height: u32,
    factor: f32,
) -> DocforgeResult<()> {
    expect_rgba_len(buf, width, height)?;
    if !factor.is_finite() || factor < 0.0 {
        return Err(DocforgeError::invalid_input(
            "darken factor must be finite and >= 0",
        ));
    }
    for px in buf.chunks_exact_mut(4) {
        for c in 0..3 {
            px[c] = (f32::from(px[c]) * factor).round().clamp(0.0, 255.0) as u8;
        }
    }
    Ok(())
}

/// Add independent uniform noise in `[-amplitude/2, amplitude/2]` to each
/// color channel, clamped to `0..=255`. Deterministic for a fixed seed.
pub fn grain_in_place(
    buf: &mut [u8],
    width: u32,
    height: u32,
    amplitude: f32,
    seed: u64,
) -> DocforgeResult<()> {
    expect_rgba_len(buf, width, height)?;
    if !amplitude.is_finite() || amplitude < 0.0 {
        return Err(DocforgeError::invalid_input(
            "grain amplitude must be finite and >= 0",
        ));
    }
    if amplitude == 0.0 {
        return Ok(());
    }
    let half = amplitude / 2.0;
    let mut rng = StdRng::seed_from_u64(seed);
    for px in buf.chunks_exact_mut(4) {
        for c in 0..3 {
            let noise: f32 = rng.random_range(-half..=half);
            px[c] = (f32::from(px[c]) + noise).round().clamp(0.0, 255.0) as u8;
        }
    }
    Ok(())
}

/// Darken pixels proportionally to their distance from the image center:
/// `out = px * (1 - (dist / max_dist) * strength)`.
pub fn vignette_in_place(
    buf: &mut [u8],
    width: u32,
    height: u32,
    strength: f32,
) -> DocforgeResult<()> {
    expect_rgba_len(buf, width, height)?;
    let strength = strength.clamp(0.0, 1.0);
    if strength == 0.0 || width == 0 || height == 0 {
        return Ok(());
    }
    let cx = (width as f32 - 1.0) / 2.0;
    let cy = (height as f32 - 1.0) / 2.0;
    let max_dist = (cx * cx + cy * cy).sqrt().max(1.0);
    for (i, px) in buf.chunks_exact_mut(4).enumerate() {
        let x = (i as u32 % width) as f32;
        let y = (i as u32 / width) as f32;
        let dx = x - cx;
        let dy = y - cy;
        let dist = (dx * dx + dy * dy).sqrt();
        let scale = (1.0 - (dist / max_dist) * strength).clamp(0.0, 1.0);
        for c in 0..3 {
            px[c] = (f32::from(px[c]) * scale).round() as u8;
        }
    }
    Ok(())
}

/// Blend a constant tint over the buffer with the photographic "overlay"
/// formula (`2ab` below mid-gray, `1 - 2(1-a)(1-b)` above), mixed in at
/// `opacity`.
pub fn warm_overlay_in_place(
    buf: &mut [u8],
    width: u32,
    height: u32,
    tint: [u8; 3],
    opacity: f32,
) -> DocforgeResult<()> {
    expect_rgba_len(buf, width, height)?;
    let opacity = opacity.clamp(0.0, 1.0);
    if opacity == 0.0 {
        return Ok(());
    }
    let tint_f = [
        f32::from(tint[0]) / 255.0,
        f32::from(tint[1]) / 255.0,
        f32::from(tint[2]) / 255.0,
    ];
    for px in buf.chunks_exact_mut(4) {
        for c in 0..3 {
            let base = f32::from(px[c]) / 255.0;
            let blended = overlay_channel(base, tint_f[c]);
            let out = base * (1.0 - opacity) + blended * opacity;
            px[c] = (out * 255.0).round().clamp(0.0, 255.0) as u8;
        }
    }
    Ok(())
}

fn overlay_channel(base: f32, blend: f32) -> f32 {
    if base <= 0.5 {
        2.0 * base * blend
    } else {
        1.0 - 2.0 * (1.0 - base) * (1.0 - blend)
    }
}

/// Separable Gaussian blur with a Q16 fixed-point kernel. Radius 0 is the
/// identity.
pub fn blur_in_place(
    buf: &mut [u8],
    width: u32,
    height: u32,
    radius: u32,
    sigma: f32,
) -> DocforgeResult<()> {
    expect_rgba_len(buf, width, height)?;
    if radius == 0 {
        return Ok(());
    }
    let kernel = gaussian_kernel_q16(radius, sigma)?;
    let mut tmp = vec![0u8; buf.len()];
    horizontal_pass(buf, &mut tmp, width, height, &kernel);
    vertical_pass(&tmp, buf, width, height, &kernel);
    Ok(())
}

fn gaussian_kernel_q16(radius: u32, sigma: f32) -> DocforgeResult<Vec<u32>> {
    if !sigma.is_finite() || sigma <= 0.0 {
        return Err(DocforgeError::invalid_input("blur sigma must be > 0"));
    }

    let r = radius as i32;
    let mut weights_f = Vec::<f64>::with_capacity((2 * r + 1) as usize);
    let mut sum = 0.0f64;
    let sigma = f64::from(sigma);
    let denom = 2.0 * sigma * sigma;
    for i in -r..=r {
        let x = f64::from(i);
        let w = (-x * x / denom).exp();
        weights_f.push(w);
        sum += w;
    }
    if sum <= 0.0 {
        return Err(DocforgeError::render("gaussian kernel sum is zero"));
    }

    // Quantize to Q16 and push any rounding drift into the center tap so
    // the kernel still sums to exactly 1.0.
    let mut weights = Vec::<u32>::with_capacity(weights_f.len());
    let mut acc: i64 = 0;
    for &wf in &weights_f {
        let q = ((wf / sum) * 65536.0).round() as i64;
        let q = q.clamp(0, 65536);
        weights.push(q as u32);
        acc += q;
    }
    let delta = 65536 - acc;
    if delta != 0 {
        let mid = weights.len() / 2;
        let mid_val = i64::from(weights[mid]);
        weights[mid] = (mid_val + delta).clamp(0, 65536) as u32;
    }

    Ok(weights)
}

fn horizontal_pass(src: &[u8], dst: &mut [u8], width: u32, height: u32, k: &[u32]) {
    let radius = (k.len() / 2) as i32;
    let w = width as i32;
    for y in 0..height as i32 {
        for x in 0..w {
            let mut acc = [0u64; 4];
            for (ki, &kw) in k.iter().enumerate() {
                let dx = ki as i32 - radius;
                let sx = (x + dx).clamp(0, w - 1);
                let idx = ((y * w + sx) as usize) * 4;
                for c in 0..4 {
                    acc[c] += u64::from(kw) * u64::from(src[idx + c]);
                }
            }
            let out_idx = ((y * w + x) as usize) * 4;
            for c in 0..4 {
                dst[out_idx + c] = q16_to_u8(acc[c]);
            }
        }
    }
}

fn vertical_pass(src: &[u8], dst: &mut [u8], width: u32, height: u32, k: &[u32]) {
    let radius = (k.len() / 2) as i32;
    let w = width as i32;
    let h = height as i32;
    for y in 0..h {
        for x in 0..w {
            let mut acc = [0u64; 4];
            for (ki, &kw) in k.iter().enumerate() {
                let dy = ki as i32 - radius;
                let sy = (y + dy).clamp(0, h - 1);
                let idx = ((sy * w + x) as usize) * 4;
                for c in 0..4 {
                    acc[c] += u64::from(kw) * u64::from(src[idx + c]);
                }
            }
            let out_idx = ((y * w + x) as usize) * 4;
            for c in 0..4 {
                dst[out_idx + c] = q16_to_u8(acc[c]);
            }
        }
    }
}

fn q16_to_u8(acc: u64) -> u8 {
    let v = (acc + 32768) >> 16;
    v.min(255) as u8
}

fn expect_rgba_len(buf: &[u8], width: u32, height: u32) -> DocforgeResult<()> {
    let expected = (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(4))
        .ok_or_else(|| DocforgeError::render("effect buffer size overflow"))?;
    if buf.len() != expected {
        return Err(DocforgeError::render(format!(
            "effect buffer is {} bytes, expected {expected} for {width}x{height}",
            buf.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, px: [u8; 4]) -> Vec<u8> {
        px.repeat((width * height) as usize)
    }

    #[test]
    fn grayscale_full_ratio_pins_bt601_red() {
        let mut buf = solid(1, 1, [255, 0, 0, 255]);
        grayscale_blend_in_place(&mut buf, 1, 1, 1.0).unwrap();
        // 0.299 * 255 = 76.245
        assert_eq!(&buf[0..3], &[76, 76, 76]);
        assert_eq!(buf[3], 255);
    }

    #[test]
    fn grayscale_ratio_zero_is_identity() {
        let mut buf = solid(2, 2, [10, 200, 40, 255]);
        let before = buf.clone();
        grayscale_blend_in_place(&mut buf, 2, 2, 0.0).unwrap();
        assert_eq!(buf, before);
    }

    #[test]
    fn darken_halves_rgb_but_not_alpha() {
        let mut buf = solid(1, 1, [100, 50, 200, 255]);
        darken_in_place(&mut buf, 1, 1, 0.5).unwrap();
        assert_eq!(buf, vec![50, 25, 100, 255]);
    }

    #[test]
    fn grain_is_deterministic_per_seed_and_bounded() {
        let mut a = solid(4, 4, [128, 128, 128, 255]);
        let mut b = a.clone();
        grain_in_place(&mut a, 4, 4, 20.0, 7).unwrap();
        grain_in_place(&mut b, 4, 4, 20.0, 7).unwrap();
        assert_eq!(a, b);
        for px in a.chunks_exact(4) {
            for c in 0..3 {
                assert!((f32::from(px[c]) - 128.0).abs() <= 10.5);
            }
            assert_eq!(px[3], 255);
        }

        let mut c = solid(4, 4, [128, 128, 128, 255]);
        grain_in_place(&mut c, 4, 4, 20.0, 8).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn grain_amplitude_zero_is_identity() {
        let mut buf = solid(2, 1, [9, 9, 9, 255]);
        let before = buf.clone();
        grain_in_place(&mut buf, 2, 1, 0.0, 1).unwrap();
        assert_eq!(buf, before);
    }

    #[test]
    fn vignette_center_pixel_is_untouched_and_corner_darkens() {
        let mut buf = solid(3, 3, [200, 200, 200, 255]);
        vignette_in_place(&mut buf, 3, 3, 0.5).unwrap();
        let center = &buf[(1 * 3 + 1) * 4..(1 * 3 + 1) * 4 + 4];
        assert_eq!(center, &[200, 200, 200, 255]);
        // Corner sits at max distance: scale = 1 - 0.5 = 0.5.
        assert_eq!(&buf[0..3], &[100, 100, 100]);
    }

    #[test]
    fn warm_overlay_pins_the_overlay_formula() {
        // base 64/255 is below mid-gray: 2 * (64/255) * 1.0 * 255 = 128.
        let mut buf = solid(1, 1, [64, 64, 64, 255]);
        warm_overlay_in_place(&mut buf, 1, 1, [255, 255, 255], 1.0).unwrap();
        assert_eq!(&buf[0..3], &[128, 128, 128]);

        // base 192/255 is above mid-gray against a zero tint:
        // 1 - 2 * (1 - 192/255) * 1 = 0.50588 -> 129.
        let mut buf = solid(1, 1, [192, 192, 192, 255]);
        warm_overlay_in_place(&mut buf, 1, 1, [0, 0, 0], 1.0).unwrap();
        assert_eq!(&buf[0..3], &[129, 129, 129]);
    }

    #[test]
    fn blur_radius_zero_and_constant_image_are_identities() {
        let mut buf = solid(1, 2, [1, 2, 3, 4]);
        let before = buf.clone();
        blur_in_place(&mut buf, 1, 2, 0, 1.0).unwrap();
        assert_eq!(buf, before);

        let mut buf = solid(4, 3, [10, 20, 30, 40]);
        let before = buf.clone();
        blur_in_place(&mut buf, 4, 3, 3, 2.0).unwrap();
        assert_eq!(buf, before);
    }

    #[test]
    fn blur_spreads_energy_from_single_pixel() {
        let (w, h) = (5u32, 5u32);
        let mut buf = vec![0u8; (w * h * 4) as usize];
        let center = ((2 * w + 2) * 4) as usize;
        buf[center..center + 4].copy_from_slice(&[255, 255, 255, 255]);

        blur_in_place(&mut buf, w, h, 2, 1.2).unwrap();

        let nonzero = buf.chunks_exact(4).filter(|px| px[3] != 0).count();
        assert!(nonzero > 1);
        let sum_a: u32 = buf.chunks_exact(4).map(|px| u32::from(px[3])).sum();
        assert!((sum_a as i32 - 255).abs() <= 4);
    }

    #[test]
    fn chain_applies_in_declared_order() {
        // Darken then grayscale differs from grayscale then darken on a
        // saturated pixel only in rounding; pin both orders explicitly.
        let chain_a = [
            PhotoEffectSpec::Darken { factor: 0.5 },
            PhotoEffectSpec::GrayscaleBlend { ratio: 1.0 },
        ];
        let chain_b = [
            PhotoEffectSpec::GrayscaleBlend { ratio: 1.0 },
            PhotoEffectSpec::Darken { factor: 0.5 },
        ];
        let mut a = solid(1, 1, [255, 0, 0, 255]);
        let mut b = a.clone();
        apply_chain(&mut a, 1, 1, &chain_a, 0).unwrap();
        apply_chain(&mut b, 1, 1, &chain_b, 0).unwrap();
        // a: darken -> 128,0,0 -> luma 38.272 -> 38
        // b: luma 76.245 -> 76 -> darken -> 38
        assert_eq!(&a[0..3], &[38, 38, 38]);
        assert_eq!(&b[0..3], &[38, 38, 38]);
    }

    #[test]
    fn wrong_buffer_length_is_rejected() {
        let mut buf = vec![0u8; 7];
        assert!(grayscale_blend_in_place(&mut buf, 2, 2, 0.5).is_err());
        assert!(blur_in_place(&mut buf, 2, 2, 1, 1.0).is_err());
    }

    #[test]
    fn spec_json_roundtrip() {
        let chain = vec![
            PhotoEffectSpec::GrayscaleBlend { ratio: 0.2 },
            PhotoEffectSpec::WarmOverlay {
                tint: [255, 240, 205],
                opacity: 0.1,
            },
        ];
        let s = serde_json::to_string(&chain).unwrap();
        let back: Vec<PhotoEffectSpec> = serde_json::from_str(&s).unwrap();
        assert_eq!(chain, back);
    }
}
