use serde_json::{Map, Value as JsonValue};

use crate::metrics::TIMESTAMP_FORMAT;
use crate::metrics::buffer::Snapshot;

/// Serializes a snapshot into the dashboard wire object: a `timestamp`
/// array plus one array per metric field name, each holding the full
/// accumulated series aligned to the tick axis (`null` where a tick has no
/// sample). Push and pull both emit exactly this structure; the field names
/// come from [`MetricKey::field_name`](crate::metrics::MetricKey::field_name)
/// and are the contract the dashboard parses against.
pub fn payload(snapshot: &Snapshot) -> JsonValue {
    let mut fields = Map::new();
    let timestamps: Vec<JsonValue> = snapshot
        .ticks()
        .iter()
        .map(|tick| JsonValue::String(tick.format(TIMESTAMP_FORMAT).to_string()))
        .collect();
    fields.insert("timestamp".to_string(), JsonValue::Array(timestamps));

    for key in snapshot.keys() {
        let column: Vec<JsonValue> = snapshot
            .aligned_column(key)
            .into_iter()
            .map(|value| match value {
                Some(value) => value.to_json(),
                None => JsonValue::Null,
            })
            .collect();
        fields.insert(key.field_name(), JsonValue::Array(column));
    }

    JsonValue::Object(fields)
}

#[cfg(test)]
mod tests {
    use chrono::{Local, TimeZone};

    use super::*;
    use crate::config::ProcessTarget;
    use crate::metrics::buffer::{SeriesBuffer, TickBatch};
    use crate::metrics::{LoadWindow, Measure, MetricKey, TargetState, Value, metric_keys};

    #[test]
    fn payload_has_one_array_per_field_plus_timestamp() {
        let targets = vec![ProcessTarget::named("bash")];
        let mut buffer = SeriesBuffer::new(metric_keys(2, &targets), None);
        for i in 0..2 {
            let ts = Local.timestamp_opt(1_700_000_000 + i * 5, 0).unwrap();
            let mut batch = TickBatch::new(ts);
            batch.push(MetricKey::LoadAvg(LoadWindow::One), Value::Num(0.2));
            batch.push(MetricKey::LoadAvg(LoadWindow::Five), Value::Num(0.3));
            batch.push(MetricKey::LoadAvg(LoadWindow::Fifteen), Value::Num(0.4));
            batch.push(MetricKey::CpuCore(0), Value::Num(10.0));
            batch.push(MetricKey::CpuCore(1), Value::Num(20.0));
            batch.push(
                MetricKey::target("bash", Measure::CpuPercent),
                Value::Num(1.0),
            );
            batch.push(
                MetricKey::target("bash", Measure::MemoryRss),
                Value::Num(2048.0),
            );
            batch.push(
                MetricKey::target("bash", Measure::Status),
                Value::State(TargetState::Running),
            );
            buffer.append_batch(batch);
        }

        let payload = payload(&buffer.snapshot());
        let object = payload.as_object().unwrap();
        // timestamp + 3 load + 2 cores + 3 bash fields
        assert_eq!(object.len(), 9);
        for (field, column) in object {
            assert_eq!(column.as_array().unwrap().len(), 2, "field {field}");
        }
        assert_eq!(object["bash_status"][1], "running");
        assert_eq!(object["cpu_1_percent"][0], 20.0);
    }

    #[test]
    fn skipped_readings_serialize_as_null() {
        let keys = vec![MetricKey::LoadAvg(LoadWindow::One)];
        let mut buffer = SeriesBuffer::new(keys, None);
        let mut with_load = TickBatch::new(Local.timestamp_opt(1_700_000_000, 0).unwrap());
        with_load.push(MetricKey::LoadAvg(LoadWindow::One), Value::Num(0.9));
        buffer.append_batch(with_load);
        buffer.append_batch(TickBatch::new(
            Local.timestamp_opt(1_700_000_010, 0).unwrap(),
        ));

        let payload = payload(&buffer.snapshot());
        assert_eq!(payload["system_load_1"][0], 0.9);
        assert!(payload["system_load_1"][1].is_null());
    }
}
