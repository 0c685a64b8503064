//! Time-series containers: contiguous sample runs, channel-day lists,
//! and the contiguous-block locator.
//!
//! A channel-day is an ordered list of [`DataSet`] runs, potentially
//! with gaps between them. Gap handling never interpolates; PSD
//! computation is driven by the single largest interval during which
//! every involved channel is gapless.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::daytime;
use crate::digest::DigestWriter;
use crate::station::ChannelKey;

// ─── DataSet ────────────────────────────────────────────────────────

/// A contiguous run of integer samples.
#[derive(Debug, Clone, PartialEq)]
pub struct DataSet {
    /// Time of the first sample, microseconds since the Unix epoch
    pub start_us: i64,
    /// Inter-sample interval in microseconds
    pub interval_us: i64,
    pub samples: Vec<i32>,
    /// Digest over the raw sample stream
    pub digest: Vec<u8>,
}

impl DataSet {
    /// Build a run and stamp it with its sample-stream digest.
    pub fn new(start_us: i64, interval_us: i64, samples: Vec<i32>) -> Self {
        let digest = Self::compute_digest(&samples);
        Self {
            start_us,
            interval_us,
            samples,
            digest,
        }
    }

    /// Exclusive end time: one interval past the last sample.
    pub fn end_us(&self) -> i64 {
        self.start_us + self.samples.len() as i64 * self.interval_us
    }

    /// Sample rate in Hz.
    pub fn sample_rate(&self) -> f64 {
        1.0e6 / self.interval_us as f64
    }

    /// Digest over the raw sample stream: big-endian sample count, then
    /// each sample as a little-endian 32-bit word.
    pub fn compute_digest(samples: &[i32]) -> Vec<u8> {
        let mut w = DigestWriter::new();
        w.put_u32(samples.len() as u32);
        for &s in samples {
            w.put_i32(s);
        }
        w.finish()
    }
}

// ─── Channel-day map ────────────────────────────────────────────────

/// All sample data for one station-day, keyed by channel.
#[derive(Debug, Clone)]
pub struct DayData {
    pub date: NaiveDate,
    channels: BTreeMap<ChannelKey, Vec<DataSet>>,
}

impl DayData {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            channels: BTreeMap::new(),
        }
    }

    /// Add a run to a channel's list, keeping the list ordered by start
    /// time. Runs outside the civil day are accepted; the block locator
    /// does not care.
    pub fn add(&mut self, key: ChannelKey, run: DataSet) {
        let list = self.channels.entry(key).or_default();
        let at = list.partition_point(|d| d.start_us <= run.start_us);
        list.insert(at, run);
    }

    pub fn get(&self, key: &ChannelKey) -> Option<&[DataSet]> {
        self.channels.get(key).map(Vec::as_slice)
    }

    pub fn keys(&self) -> impl Iterator<Item = &ChannelKey> {
        self.channels.keys()
    }

    /// Epoch-microsecond bounds of this day.
    pub fn day_bounds_us(&self) -> (i64, i64) {
        (
            daytime::day_start_us(self.date),
            daytime::day_end_us(self.date),
        )
    }
}

// ─── Contiguous blocks ──────────────────────────────────────────────

/// A maximal interval during which two or more channel streams have
/// aligned, gapless samples. Times are microseconds since the epoch;
/// the end is exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContiguousBlock {
    pub start_us: i64,
    pub end_us: i64,
}

impl ContiguousBlock {
    pub fn duration_us(&self) -> i64 {
        self.end_us - self.start_us
    }
}

/// Intersect the contiguous runs of every channel list.
///
/// Returns the maximal intervals covered by a single run in each list,
/// sorted by start time. Lists must be ordered by start time (as
/// [`DayData::add`] keeps them).
pub fn contiguous_blocks(lists: &[&[DataSet]]) -> Vec<ContiguousBlock> {
    let Some((first, rest)) = lists.split_first() else {
        return vec![];
    };
    let mut blocks: Vec<ContiguousBlock> = first
        .iter()
        .map(|d| ContiguousBlock {
            start_us: d.start_us,
            end_us: d.end_us(),
        })
        .collect();
    for list in rest {
        let mut next = Vec::new();
        for block in &blocks {
            for run in list.iter() {
                let start = block.start_us.max(run.start_us);
                let end = block.end_us.min(run.end_us());
                if start < end {
                    next.push(ContiguousBlock {
                        start_us: start,
                        end_us: end,
                    });
                }
            }
        }
        blocks = next;
    }
    blocks.sort_by_key(|b| b.start_us);
    blocks
}

/// Select the single longest block common to every list.
pub fn largest_contiguous_block(lists: &[&[DataSet]]) -> Option<ContiguousBlock> {
    contiguous_blocks(lists)
        .into_iter()
        .max_by_key(ContiguousBlock::duration_us)
}

/// Pull the integer samples covering `block` out of a channel list and
/// promote them to reals. Returns an empty vector when no single run
/// covers the block.
pub fn extract(list: &[DataSet], block: &ContiguousBlock) -> Vec<f64> {
    for run in list {
        if run.start_us <= block.start_us && block.end_us <= run.end_us() {
            let i0 = ((block.start_us - run.start_us) / run.interval_us) as usize;
            let n = (block.duration_us() / run.interval_us) as usize;
            return run.samples[i0..i0 + n].iter().map(|&s| s as f64).collect();
        }
    }
    vec![]
}
