use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::{MetricKey, Sample, Timestamp, Value};

/// All readings collected for one tick. A batch is appended atomically:
/// either every sample lands in the buffer or none does.
#[derive(Clone, Debug)]
pub struct TickBatch {
    pub timestamp: Timestamp,
    samples: Vec<(MetricKey, Value)>,
}

impl TickBatch {
    pub fn new(timestamp: Timestamp) -> Self {
        Self {
            timestamp,
            samples: Vec::new(),
        }
    }

    pub fn push(&mut self, key: MetricKey, value: Value) {
        self.samples.push((key, value));
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Append-only time-series store with a key set fixed at construction.
/// The sampler is the sole writer; readers take an owned [`Snapshot`].
#[derive(Debug)]
pub struct SeriesBuffer {
    keys: Vec<MetricKey>,
    series: HashMap<MetricKey, Vec<Sample>>,
    ticks: Vec<Timestamp>,
    max_ticks: Option<usize>,
}

impl SeriesBuffer {
    pub fn new(keys: Vec<MetricKey>, max_ticks: Option<usize>) -> Self {
        let series = keys.iter().cloned().map(|key| (key, Vec::new())).collect();
        Self {
            keys,
            series,
            ticks: Vec::new(),
            max_ticks,
        }
    }

    pub fn keys(&self) -> &[MetricKey] {
        &self.keys
    }

    pub fn tick_count(&self) -> usize {
        self.ticks.len()
    }

    /// Appends one tick's samples. Returns `false` (and applies nothing) if
    /// the batch timestamp is not strictly after the last accepted tick, so
    /// no duplicate or out-of-order sample ever lands in a series. Samples
    /// for keys outside the fixed set are ignored.
    pub fn append_batch(&mut self, batch: TickBatch) -> bool {
        if let Some(last) = self.ticks.last()
            && batch.timestamp <= *last
        {
            return false;
        }
        self.ticks.push(batch.timestamp);
        for (key, value) in batch.samples {
            if let Some(series) = self.series.get_mut(&key) {
                series.push(Sample {
                    timestamp: batch.timestamp,
                    value,
                });
            }
        }
        self.apply_trim();
        true
    }

    // Drop-oldest trim keyed on the tick axis; relative order of the
    // surviving samples is untouched.
    fn apply_trim(&mut self) {
        let Some(max) = self.max_ticks else {
            return;
        };
        if max == 0 || self.ticks.len() <= max {
            return;
        }
        let cutoff = self.ticks[self.ticks.len() - max];
        self.ticks.drain(..self.ticks.len() - max);
        for series in self.series.values_mut() {
            let keep_from = series.partition_point(|sample| sample.timestamp < cutoff);
            series.drain(..keep_from);
        }
    }

    /// Owned, consistent copy of every series at the current tick boundary.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            keys: self.keys.clone(),
            series: self.series.clone(),
            ticks: self.ticks.clone(),
        }
    }
}

/// Immutable view of the buffer at one instant. Reports and the live
/// channel render from this copy so no lock is held while they work.
#[derive(Clone, Debug, Default)]
pub struct Snapshot {
    keys: Vec<MetricKey>,
    series: HashMap<MetricKey, Vec<Sample>>,
    ticks: Vec<Timestamp>,
}

impl Snapshot {
    pub fn keys(&self) -> &[MetricKey] {
        &self.keys
    }

    pub fn ticks(&self) -> &[Timestamp] {
        &self.ticks
    }

    pub fn tick_count(&self) -> usize {
        self.ticks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }

    /// Samples for one key, empty for unknown keys.
    pub fn series(&self, key: &MetricKey) -> &[Sample] {
        self.series.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn latest(&self, key: &MetricKey) -> Option<&Sample> {
        self.series(key).last()
    }

    /// Samples at or after `since`. The iterator is cloneable, so a consumer
    /// can restart the walk without re-querying the snapshot.
    pub fn since(
        &self,
        key: &MetricKey,
        since: Timestamp,
    ) -> impl Iterator<Item = &Sample> + Clone {
        let series = self.series(key);
        let start = series.partition_point(|sample| sample.timestamp < since);
        series[start..].iter()
    }

    /// Values for one key aligned to the tick axis, `None` at ticks where
    /// the series has no sample. CSV rows and the wire payload both build
    /// on this so columns never shift when a reading was skipped.
    pub fn aligned_column(&self, key: &MetricKey) -> Vec<Option<Value>> {
        let series = self.series(key);
        let mut column = Vec::with_capacity(self.ticks.len());
        let mut cursor = 0;
        for tick in &self.ticks {
            if cursor < series.len() && series[cursor].timestamp == *tick {
                column.push(Some(series[cursor].value));
                cursor += 1;
            } else {
                column.push(None);
            }
        }
        column
    }

    /// Distinct target names in key order.
    pub fn target_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for key in &self.keys {
            if let Some(name) = key.target_name()
                && !names.contains(&name)
            {
                names.push(name);
            }
        }
        names
    }

    /// Number of per-core CPU series in the key set (constant for a run).
    pub fn core_count(&self) -> usize {
        self.keys
            .iter()
            .filter(|key| matches!(key, MetricKey::CpuCore(_)))
            .count()
    }
}

/// Shared handle over the buffer. The sampler is the only caller of
/// [`BufferHandle::append_batch`]; everything else reads snapshots.
#[derive(Clone, Debug)]
pub struct BufferHandle(Arc<RwLock<SeriesBuffer>>);

impl BufferHandle {
    pub fn new(buffer: SeriesBuffer) -> Self {
        Self(Arc::new(RwLock::new(buffer)))
    }

    pub fn append_batch(&self, batch: TickBatch) -> bool {
        self.0
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .append_batch(batch)
    }

    pub fn snapshot(&self) -> Snapshot {
        self.0
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .snapshot()
    }
}
