//! Numerics kernel: primitive operations on real sequences.
//!
//! These are the building blocks of the averaged-periodogram PSD
//! estimate: detrend, debias, cosine taper (with window power
//! accounting), linear interpolation, and the one-sided forward FFT.
//!
//! # Taper power accounting
//!
//! ```text
//! wss = sum of squared window weights over the full sequence
//! ```
//!
//! The PSD normalization divides by `wss / N` to undo the power lost to
//! the taper; for a 10% taper the factor is about 0.875.

use num_complex::Complex64;
use rustfft::FftPlanner;

/// Remove the best-fit least-squares line in place.
pub fn detrend(data: &mut [f64]) {
    let n = data.len();
    if n < 2 {
        return;
    }
    let nf = n as f64;
    // x = 0..n-1; closed forms for sum(x) and sum(x^2)
    let sx = nf * (nf - 1.0) / 2.0;
    let sxx = nf * (nf - 1.0) * (2.0 * nf - 1.0) / 6.0;
    let sy: f64 = data.iter().sum();
    let sxy: f64 = data.iter().enumerate().map(|(i, &y)| i as f64 * y).sum();
    let denom = nf * sxx - sx * sx;
    if denom == 0.0 {
        return;
    }
    let slope = (nf * sxy - sx * sy) / denom;
    let intercept = (sy - slope * sx) / nf;
    for (i, y) in data.iter_mut().enumerate() {
        *y -= intercept + slope * i as f64;
    }
}

/// Subtract the arithmetic mean in place.
pub fn debias(data: &mut [f64]) {
    if data.is_empty() {
        return;
    }
    let mean: f64 = data.iter().sum::<f64>() / data.len() as f64;
    for y in data.iter_mut() {
        *y -= mean;
    }
}

/// Apply a cosine taper with fraction `p` (0 < p <= 0.5) in place and
/// return the window sum of squares.
///
/// A half-cosine ramp covers the first and last `floor(p * N) + 1`
/// samples; the middle of the window is unity. The returned `wss` is
/// the sum of squared weights over all `N` samples (about `0.875 * N`
/// for `p = 0.10`).
pub fn cosine_taper(data: &mut [f64], p: f64) -> f64 {
    let n = data.len();
    if n == 0 {
        return 0.0;
    }
    let ramp = ((p * n as f64).floor() as usize + 1).min(n / 2);
    let mut wss = (n - 2 * ramp) as f64;
    for i in 0..ramp {
        let w = 0.5 * (1.0 - (std::f64::consts::PI * i as f64 / ramp as f64).cos());
        data[i] *= w;
        data[n - 1 - i] *= w;
        wss += 2.0 * w * w;
    }
    wss
}

/// Linearly interpolate `(x, y)` onto the target abscissa `xi`.
///
/// Both `x` and `xi` must be monotonically increasing. Targets outside
/// the source range clamp to the nearest endpoint value.
pub fn interpolate(x: &[f64], y: &[f64], xi: &[f64]) -> Vec<f64> {
    debug_assert_eq!(x.len(), y.len());
    debug_assert!(x.windows(2).all(|w| w[0] <= w[1]));
    debug_assert!(xi.windows(2).all(|w| w[0] <= w[1]));
    if x.is_empty() {
        return vec![0.0; xi.len()];
    }
    xi.iter()
        .map(|&t| {
            if t <= x[0] {
                y[0]
            } else if t >= x[x.len() - 1] {
                y[y.len() - 1]
            } else {
                let hi = x.partition_point(|&v| v < t);
                let lo = hi - 1;
                let frac = (t - x[lo]) / (x[hi] - x[lo]);
                y[lo] + frac * (y[hi] - y[lo])
            }
        })
        .collect()
}

/// Forward FFT of a real sequence whose length is a power of two,
/// returning the `N/2 + 1` non-negative-frequency bins (DC through
/// Nyquist).
pub fn fft2(input: &[f64]) -> Vec<Complex64> {
    let n = input.len();
    debug_assert!(n.is_power_of_two(), "fft2 length must be a power of two");
    let mut buf: Vec<Complex64> = input.iter().map(|&v| Complex64::new(v, 0.0)).collect();
    let mut planner = FftPlanner::new();
    planner.plan_fft_forward(n).process(&mut buf);
    buf.truncate(n / 2 + 1);
    buf
}
