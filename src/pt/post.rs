use super::*;

//
// Post-processing
//

// Canonical pipeline: Uncharted 2 tone map (optional, exposure
// pre-multiplied) -> gamma encode -> +1/512 dither -> clamp.

const DITHER: f32 = 1.0 / 512.0;

pub fn post_process(image: &mut Image, camera: &Camera, tonemap: bool) {
    if tonemap {
        let white_scale = 1.0 / uncharted2(11.2);
        let exposure = camera.exposure;
        image.for_each_pixel_mut(|pixel| {
            (pixel * exposure).map(|c| uncharted2(c) * white_scale)
        });
    }
    let gamma = camera.gamma;
    image.for_each_pixel_mut(|pixel| {
        pixel
            .map(|c| gamma_encode(c, gamma) + DITHER)
            .clamped(0.0, 1.0)
    });
}

// Filmic curve from Uncharted 2 (Hable).
fn uncharted2(x: f32) -> f32 {
    const A: f32 = 0.15;
    const B: f32 = 0.50;
    const C: f32 = 0.10;
    const D: f32 = 0.20;
    const E: f32 = 0.02;
    const F: f32 = 0.30;
    ((x * (A * x + C * B) + D * E) / (x * (A * x + B) + D * F)) - E / F
}

// sRGB encode for the standard 2.2 display gamma, plain power curve for
// anything else the scene asks for.
fn gamma_encode(c: f32, gamma: f32) -> f32 {
    let c = c.max(0.0);
    if (gamma - 2.2).abs() < 1e-3 {
        if c <= 0.003_130_8 {
            12.92 * c
        } else {
            1.055 * c.powf(1.0 / 2.4) - 0.055
        }
    } else {
        c.powf(1.0 / gamma)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uncharted2_curve() {
        assert_abs_diff_eq!(uncharted2(0.0), 0.0, epsilon = 1e-6);
        // Monotonically increasing over the working range.
        let mut previous = 0.0;
        for i in 1..200 {
            let x = i as f32 * 0.1;
            let y = uncharted2(x);
            assert!(y > previous);
            previous = y;
        }
        // White point normalizes to 1.
        let white_scale = 1.0 / uncharted2(11.2);
        assert_abs_diff_eq!(uncharted2(11.2) * white_scale, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_gamma_encode_endpoints() {
        assert_abs_diff_eq!(gamma_encode(0.0, 2.2), 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(gamma_encode(1.0, 2.2), 1.0, epsilon = 1e-3);
        assert_abs_diff_eq!(gamma_encode(0.0, 1.0), 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(gamma_encode(1.0, 1.0), 1.0, epsilon = 1e-6);
        // Dark values use the linear segment of the sRGB curve.
        assert_abs_diff_eq!(gamma_encode(0.001, 2.2), 0.01292, epsilon = 1e-5);
        // Negative inputs clamp instead of producing NaN.
        assert_eq!(gamma_encode(-0.5, 2.2), 0.0);
    }

    #[test]
    fn test_post_process_clamps_and_dithers() {
        let mut image = Image::new(2, 1);
        image.set_pixel(0, 0, ColorRgb::new(50.0, -1.0, 0.0));
        image.set_pixel(0, 1, ColorRgb::new(0.5, 0.5, 0.5));
        let camera = Camera {
            gamma: 1.0,
            ..Camera::default()
        };
        post_process(&mut image, &camera, false);

        let hot = image.pixel(0, 0);
        assert_ulps_eq!(hot.red(), 1.0, max_ulps = 1);
        assert_ulps_eq!(hot.green(), DITHER, max_ulps = 4);
        assert_ulps_eq!(hot.blue(), DITHER, max_ulps = 4);

        let mid = image.pixel(0, 1);
        assert_abs_diff_eq!(mid.red(), 0.5 + DITHER, epsilon = 1e-6);
    }

    #[test]
    fn test_tonemap_compresses_highlights() {
        let mut bright = Image::new(1, 1);
        bright.set_pixel(0, 0, ColorRgb::new(8.0, 8.0, 8.0));
        let camera = Camera {
            gamma: 1.0,
            exposure: 1.0,
            ..Camera::default()
        };
        post_process(&mut bright, &camera, true);
        let pixel = bright.pixel(0, 0);
        // Below clipping but far above the mid tones.
        assert!(pixel.red() < 1.0);
        assert!(pixel.red() > 0.8);
    }
}
