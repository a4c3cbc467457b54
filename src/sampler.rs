use std::time::Duration;

use chrono::Local;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::ProcessTarget;
use crate::metrics::buffer::{BufferHandle, Snapshot, TickBatch};
use crate::metrics::{LoadWindow, Measure, MetricKey, Value};
use crate::system::collector::MetricSource;

/// Drives fixed-interval collection. Sole writer to the buffer; every
/// accepted tick is fanned out to subscribers as a fresh snapshot.
pub struct Sampler<S: MetricSource> {
    source: S,
    buffer: BufferHandle,
    targets: Vec<ProcessTarget>,
    interval: Duration,
    updates: watch::Sender<Snapshot>,
}

impl<S: MetricSource> Sampler<S> {
    pub fn new(
        source: S,
        buffer: BufferHandle,
        targets: Vec<ProcessTarget>,
        interval: Duration,
    ) -> (Self, watch::Receiver<Snapshot>) {
        let (updates, subscription) = watch::channel(Snapshot::default());
        (
            Sampler {
                source,
                buffer,
                targets,
                interval,
                updates,
            },
            subscription,
        )
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.updates.subscribe()
    }

    /// Loops until the stop signal flips or the optional duration bound
    /// elapses. An in-flight tick always completes before the loop exits;
    /// a tick that overruns the interval delays the next one instead of
    /// skipping or double-firing it.
    pub async fn run(mut self, duration: Option<Duration>, mut stop: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first interval tick completes immediately; consume it so the
        // first collection lands one interval after start.
        ticker.tick().await;
        let started = Instant::now();

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.collect_tick();
                    if let Some(bound) = duration
                        && started.elapsed() >= bound
                    {
                        info!("run duration elapsed, stopping sampler");
                        break;
                    }
                }
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        info!("stop signal received, stopping sampler");
                        break;
                    }
                }
            }
        }
    }

    /// One tick: read everything first, then append as a single batch so
    /// readers never observe a partially collected tick. A failed system
    /// read or an unresolved target degrades only its own samples.
    fn collect_tick(&mut self) {
        let timestamp = Local::now();
        self.source.refresh();
        let mut batch = TickBatch::new(timestamp);

        match self.source.system_reading() {
            Ok(reading) => {
                batch.push(
                    MetricKey::LoadAvg(LoadWindow::One),
                    Value::Num(reading.load_1),
                );
                batch.push(
                    MetricKey::LoadAvg(LoadWindow::Five),
                    Value::Num(reading.load_5),
                );
                batch.push(
                    MetricKey::LoadAvg(LoadWindow::Fifteen),
                    Value::Num(reading.load_15),
                );
                // Cores beyond the count discovered at startup are not part
                // of the key set and fall away in the buffer.
                for (index, usage) in reading.per_core.iter().enumerate() {
                    batch.push(MetricKey::CpuCore(index), Value::Num(f64::from(*usage)));
                }
            }
            Err(err) => {
                warn!(error = %err, "system counters unavailable, skipping system samples this tick");
            }
        }

        for target in &self.targets {
            let reading = self.source.target_reading(target);
            if reading.is_resolved() {
                batch.push(
                    MetricKey::target(&target.name, Measure::CpuPercent),
                    Value::Num(reading.cpu_percent),
                );
                batch.push(
                    MetricKey::target(&target.name, Measure::MemoryRss),
                    Value::Num(reading.memory_rss as f64),
                );
            } else {
                debug!(target = %target.name, "target not resolved this tick");
            }
            batch.push(
                MetricKey::target(&target.name, Measure::Status),
                Value::State(reading.state),
            );
        }

        if self.buffer.append_batch(batch) {
            let snapshot = self.buffer.snapshot();
            debug!(ticks = snapshot.tick_count(), "tick collected");
            let _ = self.updates.send(snapshot);
        } else {
            warn!("tick dropped: timestamp not after the previous tick");
        }
    }
}
