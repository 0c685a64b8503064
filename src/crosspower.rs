//! Cross-power spectral density engine and per-day cache.
//!
//! One computation produces the one-sided, taper-corrected,
//! response-deconvolved cross-power of an ordered channel pair over the
//! day's largest contiguous block, averaged over 13 segments with 75%
//! overlap (Welch). Results are memoized per unordered pair so every
//! metric in a station-day pass shares one computation.

use std::collections::HashMap;
use std::rc::Rc;

use num_complex::Complex64;
use tracing::warn;

use crate::daytime;
use crate::dsp;
use crate::error::{QcError, Result};
use crate::response::OutputUnits;
use crate::station::{ChannelKey, ChannelMeta, StationMeta};
use crate::timeseries::{self, DataSet, DayData};

/// Taper fraction applied to every segment.
const TAPER_FRACTION: f64 = 0.10;
/// Segment length as a fraction of the overlap: `ndata / 4`.
const SEGMENT_DIVISOR: usize = 4;
/// Segment step as a fraction of the segment: 75% overlap.
const OFFSET_DIVISOR: usize = 4;
/// Boxcar smoothing half-width (11-bin window).
const SMOOTH_HALF_WIDTH: usize = 5;

/// One-sided smoothed cross-power spectral density.
#[derive(Debug, Clone, PartialEq)]
pub struct CrossPower {
    /// `|Gxy|` at frequencies `k * df`, `k = 0..nfft/2`; bin 0 is zero
    pub spectrum: Vec<f64>,
    /// Frequency bin width in Hz
    pub df: f64,
}

impl CrossPower {
    /// Number of one-sided frequency bins.
    pub fn len(&self) -> usize {
        self.spectrum.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spectrum.is_empty()
    }
}

// ─── Cache ──────────────────────────────────────────────────────────

/// Memoized cross-powers for one station-day metric pass.
///
/// Keys are unordered channel pairs in canonical (lexicographic)
/// order, so `(A, B)` and `(B, A)` share one entry.
#[derive(Default)]
pub struct CrossPowerCache {
    map: HashMap<(ChannelKey, ChannelKey), Rc<CrossPower>>,
}

impl CrossPowerCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Cross-power of `(a, b)`, computed on first request and shared
    /// afterwards.
    pub fn get_or_compute(
        &mut self,
        a: &ChannelKey,
        b: &ChannelKey,
        data: &DayData,
        meta: &StationMeta,
    ) -> Result<Rc<CrossPower>> {
        let key = if a <= b {
            (a.clone(), b.clone())
        } else {
            (b.clone(), a.clone())
        };
        if let Some(hit) = self.map.get(&key) {
            return Ok(Rc::clone(hit));
        }
        let (x, y) = (&key.0, &key.1);
        let xm = meta
            .get(x)
            .ok_or_else(|| QcError::MissingData(format!("no metadata for {x}")))?;
        let ym = meta
            .get(y)
            .ok_or_else(|| QcError::MissingData(format!("no metadata for {y}")))?;
        let xd = data
            .get(x)
            .ok_or_else(|| QcError::MissingData(format!("no samples for {x}")))?;
        let yd = data
            .get(y)
            .ok_or_else(|| QcError::MissingData(format!("no samples for {y}")))?;
        let cp = Rc::new(compute_cross_power(xd, yd, xm, ym)?);
        self.map.insert(key, Rc::clone(&cp));
        Ok(cp)
    }
}

// ─── Computation ────────────────────────────────────────────────────

/// Compute the smoothed, deconvolved cross-power of two channel-day
/// lists over their largest contiguous block.
pub fn compute_cross_power(
    x: &[DataSet],
    y: &[DataSet],
    xm: &ChannelMeta,
    ym: &ChannelMeta,
) -> Result<CrossPower> {
    let block = timeseries::largest_contiguous_block(&[x, y]).ok_or_else(|| {
        QcError::MissingData(format!(
            "no contiguous overlap between {} and {}",
            xm.key, ym.key
        ))
    })?;
    let mut xs = timeseries::extract(x, &block);
    let mut ys = timeseries::extract(y, &block);
    if xs.is_empty() || ys.is_empty() || xs.len() != ys.len() {
        // Known soft behavior: proceed with the common prefix.
        warn!(
            x = %xm.key,
            y = %ym.key,
            block_start = %daytime::us_to_utc(block.start_us),
            nx = xs.len(),
            ny = ys.len(),
            "extraction lengths disagree, truncating to the common prefix"
        );
        let n = xs.len().min(ys.len());
        xs.truncate(n);
        ys.truncate(n);
    }

    let rate_x = x[0].sample_rate();
    let rate_y = y[0].sample_rate();
    if (rate_x - rate_y).abs() > 1e-9 {
        return Err(QcError::SampleRateMismatch {
            a: rate_x,
            b: rate_y,
        });
    }
    let dt = 1.0 / rate_x;

    let ndata = xs.len();
    let nseg_pnts = ndata / SEGMENT_DIVISOR;
    if nseg_pnts == 0 {
        return Err(QcError::MissingData(format!(
            "overlap of {ndata} samples is too short to segment"
        )));
    }
    let noff = (nseg_pnts / OFFSET_DIVISOR).max(1);
    let nfft = nseg_pnts.next_power_of_two();
    let nf = nfft / 2 + 1;
    let df = 1.0 / (nfft as f64 * dt);

    let mut pxy = vec![Complex64::new(0.0, 0.0); nf];
    let mut n_windows = 0usize;
    let mut wss = 0.0;
    let mut seg_x = vec![0.0; nfft];
    let mut seg_y = vec![0.0; nfft];
    let mut start = 0usize;
    while start + nseg_pnts <= ndata {
        seg_x[..nseg_pnts].copy_from_slice(&xs[start..start + nseg_pnts]);
        seg_y[..nseg_pnts].copy_from_slice(&ys[start..start + nseg_pnts]);
        seg_x[nseg_pnts..].fill(0.0);
        seg_y[nseg_pnts..].fill(0.0);
        for seg in [&mut seg_x, &mut seg_y] {
            dsp::detrend(&mut seg[..nseg_pnts]);
            dsp::debias(&mut seg[..nseg_pnts]);
        }
        wss = dsp::cosine_taper(&mut seg_x[..nseg_pnts], TAPER_FRACTION);
        dsp::cosine_taper(&mut seg_y[..nseg_pnts], TAPER_FRACTION);
        let fx = dsp::fft2(&seg_x);
        let fy = dsp::fft2(&seg_y);
        for (p, (a, b)) in pxy.iter_mut().zip(fx.iter().zip(&fy)) {
            *p += a * b.conj();
        }
        n_windows += 1;
        start += noff;
    }

    // One-sided PSD normalization (Bendat & Piersol): window count,
    // taper power correction, 2*dt/nfft.
    let mut norm = 2.0 * dt / nfft as f64 / n_windows as f64;
    if wss > 0.0 {
        norm /= wss / nseg_pnts as f64;
    } else {
        warn!(x = %xm.key, y = %ym.key, "zero window power, skipping taper correction");
    }
    for p in pxy.iter_mut() {
        *p *= norm;
    }

    // Deconvolve the instrument responses (acceleration units).
    let freqs: Vec<f64> = (0..nf).map(|k| k as f64 * df).collect();
    let rx = xm.response(&freqs, OutputUnits::Acceleration)?;
    let ry = ym.response(&freqs, OutputUnits::Acceleration)?;
    for k in 1..nf {
        if rx[k].norm() == 0.0 || ry[k].norm() == 0.0 {
            return Err(QcError::ZeroResponse {
                frequency: freqs[k],
            });
        }
        pxy[k] /= rx[k] * ry[k].conj();
    }

    Ok(CrossPower {
        spectrum: smooth_magnitude(&pxy),
        df,
    })
}

/// 11-bin boxcar smoothing of the complex series; boundary bins copy
/// the unsmoothed value. Returns the magnitude series with bin 0
/// forced to zero.
fn smooth_magnitude(series: &[Complex64]) -> Vec<f64> {
    let nf = series.len();
    let hw = SMOOTH_HALF_WIDTH;
    let mut out = Vec::with_capacity(nf);
    for k in 0..nf {
        let v = if k >= hw && k + hw < nf {
            series[k - hw..=k + hw].iter().sum::<Complex64>() / (2 * hw + 1) as f64
        } else {
            series[k]
        };
        out.push(v.norm());
    }
    if let Some(dc) = out.first_mut() {
        *dc = 0.0;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::station::StationMeta;
    use chrono::NaiveDate;

    fn test_meta() -> StationMeta {
        StationMeta::builder("IU", "ANMO")
            .channel("00", "LHZ", |ch| {
                ch.sample_rate(1.0)
                    .sensitivity(1.0, 0.02)
                    .pole_zero(
                        'A',
                        1.0,
                        vec![Complex64::new(-1.0, 0.0)],
                        vec![],
                        1.0,
                        0.02,
                    )
                    .digital(1.0, 1, 1.0, 0.0)
            })
            .channel("10", "LHZ", |ch| {
                ch.sample_rate(1.0)
                    .sensitivity(1.0, 0.02)
                    .pole_zero(
                        'A',
                        1.0,
                        vec![Complex64::new(-1.0, 0.0)],
                        vec![],
                        1.0,
                        0.02,
                    )
                    .digital(1.0, 1, 1.0, 0.0)
            })
            .build()
    }

    fn day_with(samples: Vec<i32>) -> DayData {
        let date = NaiveDate::from_ymd_opt(2026, 2, 20).unwrap();
        let mut data = DayData::new(date);
        data.add(
            ChannelKey::new("00", "LHZ"),
            DataSet::new(0, 1_000_000, samples.clone()),
        );
        data.add(
            ChannelKey::new("10", "LHZ"),
            DataSet::new(0, 1_000_000, samples),
        );
        data
    }

    #[test]
    fn zero_input_yields_zero_spectrum() {
        let meta = test_meta();
        let data = day_with(vec![0; 4096]);
        let key = ChannelKey::new("00", "LHZ");
        let mut cache = CrossPowerCache::new();
        let cp = cache.get_or_compute(&key, &key, &data, &meta).unwrap();
        assert!(cp.spectrum.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn segmentation_gives_thirteen_windows_shape() {
        // 4096 samples -> nseg 1024, step 256, nfft 1024, nf 513
        let meta = test_meta();
        let data = day_with(vec![1; 4096]);
        let key = ChannelKey::new("00", "LHZ");
        let mut cache = CrossPowerCache::new();
        let cp = cache.get_or_compute(&key, &key, &data, &meta).unwrap();
        assert_eq!(cp.len(), 513);
        assert!((cp.df - 1.0 / 1024.0).abs() < 1e-15);
        assert_eq!(cp.spectrum[0], 0.0);
    }

    #[test]
    fn cache_is_symmetric_and_shares_one_object() {
        let meta = test_meta();
        let data = day_with((0..4096).map(|i| (i % 17) - 8).collect());
        let a = ChannelKey::new("00", "LHZ");
        let b = ChannelKey::new("10", "LHZ");
        let mut cache = CrossPowerCache::new();
        let ab = cache.get_or_compute(&a, &b, &data, &meta).unwrap();
        let ba = cache.get_or_compute(&b, &a, &data, &meta).unwrap();
        assert!(Rc::ptr_eq(&ab, &ba));
        assert_eq!(ab.spectrum, ba.spectrum);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn sample_rate_mismatch_is_rejected() {
        let date = NaiveDate::from_ymd_opt(2026, 2, 20).unwrap();
        let mut data = DayData::new(date);
        data.add(
            ChannelKey::new("00", "LHZ"),
            DataSet::new(0, 50_000, vec![0; 4096]), // 20 Hz
        );
        data.add(
            ChannelKey::new("10", "LHZ"),
            DataSet::new(0, 25_000, vec![0; 8192]), // 40 Hz
        );
        let meta = test_meta();
        let a = ChannelKey::new("00", "LHZ");
        let b = ChannelKey::new("10", "LHZ");
        let mut cache = CrossPowerCache::new();
        let err = cache.get_or_compute(&a, &b, &data, &meta).unwrap_err();
        assert!(matches!(err, QcError::SampleRateMismatch { .. }));
    }

    #[test]
    fn missing_channel_is_missing_data() {
        let meta = test_meta();
        let data = DayData::new(NaiveDate::from_ymd_opt(2026, 2, 20).unwrap());
        let key = ChannelKey::new("00", "LHZ");
        let mut cache = CrossPowerCache::new();
        let err = cache.get_or_compute(&key, &key, &data, &meta).unwrap_err();
        assert!(matches!(err, QcError::MissingData(_)));
    }

    #[test]
    fn psd_uses_largest_contiguous_block() {
        // A short early run and a long late run: the long one drives
        // the FFT size.
        let date = NaiveDate::from_ymd_opt(2026, 2, 20).unwrap();
        let mut data = DayData::new(date);
        let key = ChannelKey::new("00", "LHZ");
        data.add(key.clone(), DataSet::new(0, 1_000_000, vec![1; 512]));
        data.add(
            key.clone(),
            DataSet::new(10_000_000_000, 1_000_000, vec![1; 4096]),
        );
        let meta = test_meta();
        let mut cache = CrossPowerCache::new();
        let cp = cache.get_or_compute(&key, &key, &data, &meta).unwrap();
        // 4096-sample block -> nseg 1024 -> nfft 1024 -> nf 513
        assert_eq!(cp.len(), 513);
    }
}
