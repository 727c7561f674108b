pub(crate) fn mul_div255_u16(x: u16, y: u16) -> u16 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u16
}

pub(crate) fn mul_div255_u8(x: u16, y: u16) -> u8 {
    mul_div255_u16(x, y) as u8
}

/// Average absolute difference between two equal-length sample runs, each scaled.
///
/// Returns 0 for empty input.
pub(crate) fn mean_abs_diff(a: &[f32], a_scale: f64, b: &[f32]) -> f64 {
    let n = a.len().min(b.len());
    if n == 0 {
        return 0.0;
    }
    let sum: f64 = a
        .iter()
        .zip(b)
        .map(|(&x, &y)| (f64::from(x) * a_scale - f64::from(y)).abs())
        .sum();
    sum / n as f64
}
