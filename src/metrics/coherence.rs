//! Channel-pair coherence metric.
//!
//! Magnitude-squared coherence between two channels,
//! `gamma^2(f) = |Gxy|^2 / (Gxx * Gyy)`, averaged over the configured
//! period band. A pair of identical noise fields scores 1; independent
//! noise scores near 1/13 for the 13-window average.

use tracing::{error, info, warn};

use crate::digest::ChangeDetector;
use crate::error::{QcError, Result};
use crate::metrics::{ArgumentBag, Metric, MetricContext, MetricResult};
use crate::station::ChannelKey;
use crate::store::MetricStore;

/// Band-averaged magnitude-squared coherence of channel pairs.
pub struct Coherence {
    pairs: Vec<(ChannelKey, ChannelKey)>,
    args: ArgumentBag,
}

impl Coherence {
    pub fn new(pairs: Vec<(ChannelKey, ChannelKey)>) -> Self {
        let mut args = ArgumentBag::new();
        args.add_argument("lower-limit");
        args.add_argument("upper-limit");
        Self { pairs, args }
    }

    /// Populate a declared argument.
    pub fn set(&mut self, name: &str, value: impl Into<String>) -> Result<()> {
        self.args.set(name, value)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.args.get(name)
    }

    /// Canonical result key for an unordered pair: both channel-ids in
    /// lexicographic order, joined by `-`.
    pub fn pair_id(x: &ChannelKey, y: &ChannelKey) -> String {
        if x <= y {
            format!("{x}-{y}")
        } else {
            format!("{y}-{x}")
        }
    }

    fn coherence_for<S: MetricStore>(
        &self,
        ctx: &mut MetricContext<'_, S>,
        x: &ChannelKey,
        y: &ChannelKey,
        low: f64,
        high: f64,
    ) -> Result<Option<f64>> {
        let gxy = ctx.crosspower.get_or_compute(x, y, ctx.data, ctx.meta)?;
        let gxx = ctx.crosspower.get_or_compute(x, x, ctx.data, ctx.meta)?;
        let gyy = ctx.crosspower.get_or_compute(y, y, ctx.data, ctx.meta)?;

        let nf = gxy.len().min(gxx.len()).min(gyy.len());
        if nf < 2 {
            return Ok(None);
        }
        if gxy.len() != gxx.len() || gxx.len() != gyy.len() {
            // Different gap structure per channel can shrink the auto
            // spectra; compare only the shared low-frequency bins.
            warn!(
                x = %x,
                y = %y,
                "auto and cross spectra differ in length, using the common bins"
            );
        }

        // Band average on the period axis, excluding the DC bin. Bins
        // with zero power are unusable and are left out of the mean.
        let mut sum = 0.0;
        let mut count = 0usize;
        let mut in_band = false;
        for k in 1..nf {
            let period = 1.0 / (k as f64 * gxy.df);
            if period < low || period > high {
                continue;
            }
            in_band = true;
            let denom = gxx.spectrum[k] * gyy.spectrum[k];
            if denom <= 0.0 {
                continue;
            }
            let gamma2 = gxy.spectrum[k] * gxy.spectrum[k] / denom;
            if gamma2.is_finite() {
                sum += gamma2;
                count += 1;
            }
        }
        if !in_band {
            return Err(QcError::EmptyBand { low, high });
        }
        if count == 0 {
            return Ok(None);
        }
        Ok(Some(sum / count as f64))
    }
}

impl Metric for Coherence {
    fn base_name(&self) -> &'static str {
        "Coherence"
    }

    fn version(&self) -> u32 {
        1
    }

    fn process<S: MetricStore>(&mut self, ctx: &mut MetricContext<'_, S>) -> Result<MetricResult> {
        let low = self.args.get_f64("lower-limit")?;
        let high = self.args.get_f64("upper-limit")?;

        let name = self.metric_name();
        let mut result = self.bind(ctx);
        for (x, y) in &self.pairs {
            // Canonical order keeps the digest independent of how the
            // pair was configured.
            let (x, y) = if x <= y { (x, y) } else { (y, x) };
            let (Some(xm), Some(ym)) = (ctx.meta.get(x), ctx.meta.get(y)) else {
                info!(x = %x, y = %y, "missing metadata, skipping pair");
                continue;
            };
            let (Some(xd), Some(yd)) = (ctx.data.get(x), ctx.data.get(y)) else {
                info!(x = %x, y = %y, "missing data, skipping pair");
                continue;
            };
            let id = Self::pair_id(x, y);
            let detector =
                ChangeDetector::new(ctx.store, ctx.data.date, &name, &ctx.meta.station);
            let Some(digest) =
                detector.value_digest_changed(&[xm, ym], &[xd, yd], &id, ctx.force_update)?
            else {
                info!(pair = %id, "inputs unchanged, skipping");
                continue;
            };
            match self.coherence_for(ctx, x, y, low, high) {
                Ok(Some(value)) => result.add(id, value, digest),
                Ok(None) => info!(pair = %id, "no usable bins, no result"),
                Err(err) => error!(pair = %id, error = %err, "pair failed"),
            }
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_id_is_canonical() {
        let a = ChannelKey::new("00", "LHZ");
        let b = ChannelKey::new("10", "LHZ");
        assert_eq!(Coherence::pair_id(&a, &b), "00,LHZ-10,LHZ");
        assert_eq!(Coherence::pair_id(&b, &a), "00,LHZ-10,LHZ");
    }

    #[test]
    fn band_limits_are_required() {
        let mut metric = Coherence::new(vec![]);
        assert!(matches!(
            metric.args.get_f64("lower-limit").unwrap_err(),
            QcError::MissingArgument(_)
        ));
        metric.set("lower-limit", "20").unwrap();
        metric.set("upper-limit", "50").unwrap();
        assert_eq!(metric.args.get_f64("upper-limit").unwrap(), 50.0);
    }
}
