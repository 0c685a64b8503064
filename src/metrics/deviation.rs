//! Noise-model deviation metric.
//!
//! For each channel, the deconvolved PSD is converted to dB, flipped
//! from the frequency axis to the period axis, interpolated onto the
//! reference model's period grid, and averaged against the model over
//! the configured period band. The result is the mean height of the
//! station's noise floor above (positive) or below (negative) the
//! reference curve.

use tracing::{error, info};

use crate::digest::ChangeDetector;
use crate::dsp;
use crate::error::{QcError, Result};
use crate::metrics::{ArgumentBag, Metric, MetricContext, MetricResult};
use crate::model::{self, NoiseModel};
use crate::station::ChannelKey;
use crate::store::MetricStore;

/// Deviation of the daily PSD from a reference noise model.
pub struct NoiseModelDeviation {
    channels: Vec<ChannelKey>,
    args: ArgumentBag,
}

impl NoiseModelDeviation {
    pub fn new(channels: Vec<ChannelKey>) -> Self {
        let mut args = ArgumentBag::new();
        args.add_argument("nlnm-modelfile");
        args.add_argument("nhnm-modelfile");
        args.add_argument("lower-limit");
        args.add_argument("upper-limit");
        Self { channels, args }
    }

    /// Populate a declared argument.
    pub fn set(&mut self, name: &str, value: impl Into<String>) -> Result<()> {
        self.args.set(name, value)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.args.get(name)
    }

    fn load_model(&self, arg: &str, embedded: fn() -> &'static NoiseModel) -> Result<NoiseModel> {
        match self.args.get(arg) {
            Some(path) => NoiseModel::from_path(path),
            None => Ok(embedded().clone()),
        }
    }

    fn deviation_for<S: MetricStore>(
        &self,
        ctx: &mut MetricContext<'_, S>,
        key: &ChannelKey,
        reference: &NoiseModel,
        low: f64,
        high: f64,
    ) -> Result<Option<f64>> {
        let psd = ctx
            .crosspower
            .get_or_compute(key, key, ctx.data, ctx.meta)?;
        let nf = psd.len();
        if nf < 2 {
            return Ok(None);
        }

        // Flip to the period axis, excluding the DC bin.
        let mut periods = Vec::with_capacity(nf - 1);
        let mut psd_db = Vec::with_capacity(nf - 1);
        for k in 0..nf - 1 {
            let idx = nf - 1 - k;
            periods.push(1.0 / (idx as f64 * psd.df));
            psd_db.push(10.0 * psd.spectrum[idx].log10());
        }

        let on_grid = dsp::interpolate(&periods, &psd_db, &reference.periods);
        let band = reference.band(low, high);
        if band.is_empty() {
            return Err(QcError::EmptyBand { low, high });
        }
        let mean = band
            .iter()
            .map(|&i| on_grid[i] - reference.powers[i])
            .sum::<f64>()
            / band.len() as f64;
        Ok(Some(mean))
    }
}

impl Metric for NoiseModelDeviation {
    fn base_name(&self) -> &'static str {
        "NoiseModelDeviation"
    }

    fn version(&self) -> u32 {
        1
    }

    fn process<S: MetricStore>(&mut self, ctx: &mut MetricContext<'_, S>) -> Result<MetricResult> {
        let low = self.args.get_f64("lower-limit")?;
        let high = self.args.get_f64("upper-limit")?;
        // Both tables are read up front so a malformed file aborts the
        // metric before any channel is touched. Deviation is measured
        // against the low model.
        let reference = self.load_model("nlnm-modelfile", model::nlnm)?;
        let _high_model = self.load_model("nhnm-modelfile", model::nhnm)?;

        let name = self.metric_name();
        let mut result = self.bind(ctx);
        for key in &self.channels {
            let Some(meta) = ctx.meta.get(key) else {
                info!(channel = %key, "no metadata, skipping");
                continue;
            };
            let Some(runs) = ctx.data.get(key) else {
                info!(channel = %key, "no data, skipping");
                continue;
            };
            let id = key.to_string();
            let detector =
                ChangeDetector::new(ctx.store, ctx.data.date, &name, &ctx.meta.station);
            let Some(digest) =
                detector.value_digest_changed(&[meta], &[runs], &id, ctx.force_update)?
            else {
                info!(channel = %key, "inputs unchanged, skipping");
                continue;
            };
            match self.deviation_for(ctx, key, &reference, low, high) {
                Ok(Some(value)) => result.add(id, value, digest),
                Ok(None) => info!(channel = %key, "no usable PSD, no result"),
                Err(err) => error!(channel = %key, error = %err, "channel failed"),
            }
        }
        Ok(result)
    }
}
