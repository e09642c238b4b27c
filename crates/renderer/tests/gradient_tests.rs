//! Integration tests for the gradient engine over the built-in colormaps.

use renderer::{apply_gradient, build_gradient, normalize, Colormaps, Rgb};

// ============================================================================
// Built-in colormap coverage
// ============================================================================

#[test]
fn test_every_builtin_colormap_covers_all_intensities() {
    let colormaps = Colormaps::builtin();
    for name in colormaps.names() {
        let stops = colormaps.get(name).unwrap();
        let lut = build_gradient(stops).unwrap();

        // The truncated table plus the trailing clamp must resolve every
        // possible intensity.
        for intensity in 0..=255u8 {
            let _ = lut.color_for(intensity);
        }

        // First and last stop survive interpolation exactly.
        assert_eq!(lut.color_for(0), stops[0]);
        assert_eq!(lut.color_for(255), stops[stops.len() - 1]);
    }
}

#[test]
fn test_apply_gradient_output_shape() {
    let colormaps = Colormaps::builtin();
    let lut = build_gradient(colormaps.get("default").unwrap()).unwrap();

    let intensities: Vec<u8> = (0..=255).collect();
    let canvas = apply_gradient(&lut, &intensities);
    assert_eq!(canvas.len(), intensities.len() * 3);
}

// ============================================================================
// Normalization composed with gradients
// ============================================================================

#[test]
fn test_normalized_extremes_land_on_end_stops() {
    let colormaps = Colormaps::builtin();
    let stops = colormaps.get("thermal").unwrap();
    let lut = build_gradient(stops).unwrap();

    let samples = vec![250.0f32, 275.0, 300.0];
    let intensities = normalize(&samples, 250.0, 300.0);
    let canvas = apply_gradient(&lut, &intensities);

    // Coldest sample takes the first stop, hottest the last.
    assert_eq!(Rgb(canvas[0], canvas[1], canvas[2]), stops[0]);
    let n = canvas.len();
    assert_eq!(
        Rgb(canvas[n - 3], canvas[n - 2], canvas[n - 1]),
        stops[stops.len() - 1]
    );
}

#[test]
fn test_grayscale_colormap_matches_plain_intensities() {
    let colormaps = Colormaps::builtin();
    let lut = build_gradient(colormaps.get("grayscale").unwrap()).unwrap();

    // The 2-stop black-to-white map reproduces the intensity ramp: every
    // output channel is a monotone function of the input intensity with
    // the endpoints pinned.
    let mut previous = 0u8;
    for intensity in 0..=255u8 {
        let Rgb(r, g, b) = lut.color_for(intensity);
        assert_eq!(r, g);
        assert_eq!(g, b);
        assert!(r >= previous);
        previous = r;
    }
    assert_eq!(lut.color_for(0), Rgb(0, 0, 0));
    assert_eq!(lut.color_for(255), Rgb(255, 255, 255));
}
