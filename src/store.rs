//! Persistence interface.
//!
//! The engine talks to its result store through exactly four operations;
//! everything else about persistence (schema, connection handling,
//! retries) belongs to the embedding application. Each call is an
//! independent request with parameters; no statement handles are shared.
//!
//! [`MemoryStore`] is the in-process implementation used by tests and
//! as the reference for the change-detection contract.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::error::{QcError, Result};
use crate::station::StationKey;

/// The four persistence operations the engine needs.
///
/// Digests are opaque byte strings; channel ids use the `"LOC,CODE"`
/// serialization (or the canonical pair form for two-channel metrics);
/// dates are civil calendar days at UTC.
pub trait MetricStore {
    /// Station-level digest recorded for `(date, metric, station)`,
    /// if any.
    fn get_metric_digest(
        &self,
        date: NaiveDate,
        metric_name: &str,
        station: &StationKey,
    ) -> Result<Option<Vec<u8>>>;

    /// Per-channel value digest recorded for
    /// `(date, metric, station, channel-id)`, if any.
    fn get_metric_value_digest(
        &self,
        date: NaiveDate,
        metric_name: &str,
        station: &StationKey,
        channel_id: &str,
    ) -> Result<Option<Vec<u8>>>;

    /// Record one per-channel scalar and its input fingerprint.
    fn insert_metric_data(
        &mut self,
        date: NaiveDate,
        metric_name: &str,
        station: &StationKey,
        channel_id: &str,
        value: f64,
        digest: &[u8],
    ) -> Result<()>;

    /// Opaque bulk dump of every row in the closed date range.
    fn select_all(&self, start: NaiveDate, end: NaiveDate) -> Result<String>;
}

// ─── In-memory store ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
struct Row {
    date: NaiveDate,
    metric_name: String,
    station: String,
    channel_id: String,
    value: f64,
    digest: String,
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// In-process [`MetricStore`] backed by ordered maps.
#[derive(Debug, Default)]
pub struct MemoryStore {
    // (date, metric, station, channel-id) → (value, digest)
    rows: BTreeMap<(NaiveDate, String, String, String), (f64, Vec<u8>)>,
    // (date, metric, station) → digest of the most recent insert
    station_digests: BTreeMap<(NaiveDate, String, String), Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Recorded value for one row, mainly for assertions in tests.
    pub fn value(
        &self,
        date: NaiveDate,
        metric_name: &str,
        station: &StationKey,
        channel_id: &str,
    ) -> Option<f64> {
        self.rows
            .get(&(
                date,
                metric_name.to_string(),
                station.to_string(),
                channel_id.to_string(),
            ))
            .map(|(value, _)| *value)
    }
}

impl MetricStore for MemoryStore {
    fn get_metric_digest(
        &self,
        date: NaiveDate,
        metric_name: &str,
        station: &StationKey,
    ) -> Result<Option<Vec<u8>>> {
        Ok(self
            .station_digests
            .get(&(date, metric_name.to_string(), station.to_string()))
            .cloned())
    }

    fn get_metric_value_digest(
        &self,
        date: NaiveDate,
        metric_name: &str,
        station: &StationKey,
        channel_id: &str,
    ) -> Result<Option<Vec<u8>>> {
        Ok(self
            .rows
            .get(&(
                date,
                metric_name.to_string(),
                station.to_string(),
                channel_id.to_string(),
            ))
            .map(|(_, digest)| digest.clone()))
    }

    fn insert_metric_data(
        &mut self,
        date: NaiveDate,
        metric_name: &str,
        station: &StationKey,
        channel_id: &str,
        value: f64,
        digest: &[u8],
    ) -> Result<()> {
        self.rows.insert(
            (
                date,
                metric_name.to_string(),
                station.to_string(),
                channel_id.to_string(),
            ),
            (value, digest.to_vec()),
        );
        self.station_digests.insert(
            (date, metric_name.to_string(), station.to_string()),
            digest.to_vec(),
        );
        Ok(())
    }

    fn select_all(&self, start: NaiveDate, end: NaiveDate) -> Result<String> {
        let rows: Vec<Row> = self
            .rows
            .iter()
            .filter(|((date, ..), _)| (start..=end).contains(date))
            .map(|((date, metric_name, station, channel_id), (value, digest))| Row {
                date: *date,
                metric_name: metric_name.clone(),
                station: station.clone(),
                channel_id: channel_id.clone(),
                value: *value,
                digest: hex(digest),
            })
            .collect();
        serde_json::to_string(&rows).map_err(|e| QcError::Storage(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, d).unwrap()
    }

    #[test]
    fn value_digest_roundtrip() {
        let mut store = MemoryStore::new();
        let station = StationKey::new("IU", "ANMO");
        store
            .insert_metric_data(day(20), "Coherence:v1", &station, "00,LHZ", 0.98, &[1, 2])
            .unwrap();

        let got = store
            .get_metric_value_digest(day(20), "Coherence:v1", &station, "00,LHZ")
            .unwrap();
        assert_eq!(got, Some(vec![1, 2]));
        assert_eq!(
            store.value(day(20), "Coherence:v1", &station, "00,LHZ"),
            Some(0.98)
        );
    }

    #[test]
    fn missing_rows_are_none() {
        let store = MemoryStore::new();
        let station = StationKey::new("IU", "ANMO");
        assert_eq!(
            store
                .get_metric_value_digest(day(20), "Coherence:v1", &station, "00,LHZ")
                .unwrap(),
            None
        );
        assert_eq!(
            store
                .get_metric_digest(day(20), "Coherence:v1", &station)
                .unwrap(),
            None
        );
    }

    #[test]
    fn station_digest_tracks_latest_insert() {
        let mut store = MemoryStore::new();
        let station = StationKey::new("IU", "ANMO");
        store
            .insert_metric_data(day(20), "M:v1", &station, "00,LHZ", 1.0, &[1])
            .unwrap();
        store
            .insert_metric_data(day(20), "M:v1", &station, "10,LHZ", 2.0, &[9])
            .unwrap();
        assert_eq!(
            store.get_metric_digest(day(20), "M:v1", &station).unwrap(),
            Some(vec![9])
        );
    }

    #[test]
    fn select_all_filters_by_date_and_is_json() {
        let mut store = MemoryStore::new();
        let station = StationKey::new("IU", "ANMO");
        store
            .insert_metric_data(day(19), "M:v1", &station, "00,LHZ", 1.0, &[1])
            .unwrap();
        store
            .insert_metric_data(day(20), "M:v1", &station, "00,LHZ", 2.0, &[2])
            .unwrap();
        store
            .insert_metric_data(day(21), "M:v1", &station, "00,LHZ", 3.0, &[3])
            .unwrap();

        let dump = store.select_all(day(20), day(21)).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&dump).unwrap();
        assert_eq!(parsed.as_array().unwrap().len(), 2);
        assert!(dump.contains("\"02\""));
        assert!(!dump.contains("\"01\""));
    }
}
