//! Content digests and change detection.
//!
//! Every metric evaluation is fingerprinted by a digest over its inputs:
//! the response parameters of each involved channel plus the raw sample
//! stream of each involved run. Identical fingerprints let a re-run skip
//! the evaluation; fresh fingerprints stamp the stored result.
//!
//! # Byte discipline
//!
//! The digest must be byte-identical across process runs and machine
//! architectures, so the accumulator fixes the encoding: 64-bit floats
//! as little-endian IEEE doubles, 32-bit lengths as big-endian words,
//! samples as little-endian 32-bit words, tags as single bytes.

use chrono::NaiveDate;
use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::station::{ChannelMeta, StageKind, StationKey};
use crate::store::MetricStore;
use crate::timeseries::DataSet;

// ─── Accumulator ────────────────────────────────────────────────────

/// Additive digest accumulator over SHA-256.
#[derive(Default)]
pub struct DigestWriter {
    hasher: Sha256,
}

impl DigestWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Little-endian IEEE double.
    pub fn put_f64(&mut self, v: f64) {
        self.hasher.update(v.to_le_bytes());
    }

    /// Big-endian 32-bit length/count word.
    pub fn put_u32(&mut self, v: u32) {
        self.hasher.update(v.to_be_bytes());
    }

    /// Little-endian 32-bit sample word.
    pub fn put_i32(&mut self, v: i32) {
        self.hasher.update(v.to_le_bytes());
    }

    /// Single tag byte.
    pub fn put_u8(&mut self, v: u8) {
        self.hasher.update([v]);
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) {
        self.hasher.update(bytes);
    }

    pub fn finish(self) -> Vec<u8> {
        self.hasher.finalize().to_vec()
    }
}

/// A fingerprintable entity.
pub trait Digestible {
    /// Mix this entity's identifying content into `w`.
    fn digest_into(&self, w: &mut DigestWriter);

    /// Standalone digest of this entity.
    fn digest(&self) -> Vec<u8> {
        let mut w = DigestWriter::new();
        self.digest_into(&mut w);
        w.finish()
    }
}

// Stage-type tags. Stage 0 (gain-only) is 0.
const TAG_GAIN_ONLY: u8 = 0;
const TAG_POLE_ZERO: u8 = 1;
const TAG_POLYNOMIAL: u8 = 2;
const TAG_DIGITAL: u8 = 3;

impl Digestible for ChannelMeta {
    fn digest_into(&self, w: &mut DigestWriter) {
        w.put_f64(self.sample_rate);
        w.put_u32(self.stages.len() as u32);
        for stage in self.stages.values() {
            w.put_f64(stage.gain);
            w.put_f64(stage.gain_frequency);
            match &stage.kind {
                None => w.put_u8(TAG_GAIN_ONLY),
                Some(StageKind::PoleZero {
                    normalization,
                    poles,
                    zeros,
                    ..
                }) => {
                    w.put_u8(TAG_POLE_ZERO);
                    w.put_f64(*normalization);
                    w.put_u32(poles.len() as u32);
                    for p in poles {
                        w.put_f64(p.re);
                        w.put_f64(p.im);
                    }
                    w.put_u32(zeros.len() as u32);
                    for z in zeros {
                        w.put_f64(z.re);
                        w.put_f64(z.im);
                    }
                }
                Some(StageKind::Polynomial {
                    bounds,
                    coefficients,
                }) => {
                    w.put_u8(TAG_POLYNOMIAL);
                    w.put_f64(bounds.0);
                    w.put_f64(bounds.1);
                    w.put_u32(coefficients.len() as u32);
                    for c in coefficients {
                        w.put_f64(*c);
                    }
                }
                Some(StageKind::Digital {
                    input_sample_rate,
                    decimation,
                }) => {
                    w.put_u8(TAG_DIGITAL);
                    w.put_f64(*input_sample_rate);
                    w.put_u32(*decimation);
                }
            }
        }
    }
}

/// Combined fingerprint of one metric evaluation: the metadata digest of
/// each involved channel, then the data digest of each involved run.
pub fn value_digest(metas: &[&ChannelMeta], runs: &[&[DataSet]]) -> Vec<u8> {
    let mut w = DigestWriter::new();
    for meta in metas {
        w.put_bytes(&meta.digest());
    }
    for list in runs {
        for run in *list {
            w.put_bytes(&run.digest);
        }
    }
    w.finish()
}

// ─── Change detection ───────────────────────────────────────────────

/// Decides whether a metric evaluation can be skipped, by comparing the
/// current input fingerprint with what the store recorded last run.
pub struct ChangeDetector<'a, S: MetricStore + ?Sized> {
    store: &'a S,
    date: NaiveDate,
    metric_name: &'a str,
    station: &'a StationKey,
}

impl<'a, S: MetricStore + ?Sized> ChangeDetector<'a, S> {
    pub fn new(
        store: &'a S,
        date: NaiveDate,
        metric_name: &'a str,
        station: &'a StationKey,
    ) -> Self {
        Self {
            store,
            date,
            metric_name,
            station,
        }
    }

    /// Compute the combined (data + metadata) fingerprint for one
    /// evaluation and compare it with the store's record for
    /// `identifier`. Returns the fresh digest when it differs (or when
    /// `force` is set), `None` when unchanged.
    pub fn value_digest_changed(
        &self,
        metas: &[&ChannelMeta],
        runs: &[&[DataSet]],
        identifier: &str,
        force: bool,
    ) -> Result<Option<Vec<u8>>> {
        let current = value_digest(metas, runs);
        if force {
            return Ok(Some(current));
        }
        let recorded = self.store.get_metric_value_digest(
            self.date,
            self.metric_name,
            self.station,
            identifier,
        )?;
        match recorded {
            Some(old) if old == current => Ok(None),
            _ => Ok(Some(current)),
        }
    }

    /// Coarser predicate: true when the channel's combined fingerprint
    /// differs from the station-level record (or no record exists).
    pub fn hash_changed(&self, meta: &ChannelMeta, runs: &[DataSet]) -> Result<bool> {
        let current = value_digest(&[meta], &[runs]);
        let recorded = self
            .store
            .get_metric_digest(self.date, self.metric_name, self.station)?;
        Ok(recorded.is_none_or(|old| old != current))
    }
}
