//! Measurement recording.
//!
//! Components take a `&dyn MetricsRecorder` at construction or call time;
//! there is no process-wide registry.

use std::collections::BTreeMap;
use std::sync::Mutex;

use serde::Serialize;

use crate::{Error, Result};

pub const EXECUTION_TIME: &str = "execution_time";
pub const COMPUTE_TIME: &str = "compute_time";
pub const FAILED: &str = "failed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MeasureKind {
    Int,
    Float,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    Sum,
    LastValue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Measure {
    pub description: String,
    pub unit: String,
    pub kind: MeasureKind,
    pub aggregation: Aggregation,
}

impl Measure {
    pub fn float(description: &str, unit: &str, aggregation: Aggregation) -> Self {
        Self {
            description: description.to_string(),
            unit: unit.to_string(),
            kind: MeasureKind::Float,
            aggregation,
        }
    }

    pub fn int(description: &str, unit: &str, aggregation: Aggregation) -> Self {
        Self {
            description: description.to_string(),
            unit: unit.to_string(),
            kind: MeasureKind::Int,
            aggregation,
        }
    }

    /// Wall time of a whole tool run, in seconds.
    pub fn execution_time() -> Self {
        Self::float("process execution time", "s", Aggregation::LastValue)
    }
}

pub trait MetricsRecorder: Send + Sync {
    fn define(&self, name: &str, measure: Measure) -> Result<()>;

    fn put(&self, name: &str, value: f64) -> Result<()>;

    /// Flush aggregated values to the sink and return what was flushed.
    fn record(&self) -> Result<Vec<MetricSample>>;
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRecorder;

impl MetricsRecorder for NoopRecorder {
    fn define(&self, _name: &str, _measure: Measure) -> Result<()> {
        Ok(())
    }

    fn put(&self, _name: &str, _value: f64) -> Result<()> {
        Ok(())
    }

    fn record(&self) -> Result<Vec<MetricSample>> {
        Ok(Vec::new())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSample {
    pub name: String,
    pub description: String,
    pub unit: String,
    pub kind: MeasureKind,
    pub aggregation: Aggregation,
    pub value: f64,
    pub tags: BTreeMap<String, String>,
}

#[derive(Debug)]
struct Slot {
    measure: Measure,
    value: Option<f64>,
}

/// Aggregates values per measurement and logs them as JSON on `record`.
#[derive(Debug)]
pub struct StatsRecorder {
    tags: BTreeMap<String, String>,
    slots: Mutex<BTreeMap<String, Slot>>,
}

impl StatsRecorder {
    pub fn new(tags: BTreeMap<String, String>) -> Self {
        Self {
            tags,
            slots: Mutex::new(BTreeMap::new()),
        }
    }

    /// Default tags for a tool, extended by user-supplied ones.
    pub fn for_app(app: &str, extra: BTreeMap<String, String>) -> Self {
        let mut tags = BTreeMap::new();
        tags.insert("app".to_string(), app.to_string());
        tags.insert("package".to_string(), env!("CARGO_PKG_NAME").to_string());
        tags.extend(extra);
        Self::new(tags)
    }

    pub fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }

    /// Current aggregated values, for measurements that received any.
    pub fn snapshot(&self) -> Result<Vec<MetricSample>> {
        let slots = self.lock()?;
        Ok(slots
            .iter()
            .filter_map(|(name, slot)| {
                slot.value.map(|value| MetricSample {
                    name: name.clone(),
                    description: slot.measure.description.clone(),
                    unit: slot.measure.unit.clone(),
                    kind: slot.measure.kind,
                    aggregation: slot.measure.aggregation,
                    value,
                    tags: self.tags.clone(),
                })
            })
            .collect())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, Slot>>> {
        self.slots
            .lock()
            .map_err(|_| Error::Corrupt("metrics lock poisoned"))
    }
}

impl MetricsRecorder for StatsRecorder {
    fn define(&self, name: &str, measure: Measure) -> Result<()> {
        let mut slots = self.lock()?;
        slots
            .entry(name.to_string())
            .and_modify(|slot| slot.measure = measure.clone())
            .or_insert(Slot {
                measure,
                value: None,
            });
        Ok(())
    }

    fn put(&self, name: &str, value: f64) -> Result<()> {
        let mut slots = self.lock()?;
        let slot = slots
            .get_mut(name)
            .ok_or_else(|| Error::Configuration(format!("unknown measurement: {name}")))?;
        let value = match slot.measure.kind {
            MeasureKind::Int => value.trunc(),
            MeasureKind::Float => value,
        };
        slot.value = Some(match (slot.measure.aggregation, slot.value) {
            (Aggregation::Sum, Some(current)) => current + value,
            _ => value,
        });
        Ok(())
    }

    fn record(&self) -> Result<Vec<MetricSample>> {
        let samples = self.snapshot()?;
        for sample in &samples {
            log::info!("{:10}: {}", "METRIC", serde_json::to_string(sample)?);
        }
        Ok(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sum_and_last_value_aggregate_differently() {
        let recorder = StatsRecorder::for_app("runner", BTreeMap::new());
        recorder
            .define(COMPUTE_TIME, Measure::float("compute", "s", Aggregation::Sum))
            .expect("define");
        recorder
            .define(EXECUTION_TIME, Measure::execution_time())
            .expect("define");
        recorder
            .define(FAILED, Measure::int("failed", "count", Aggregation::LastValue))
            .expect("define");

        recorder.put(COMPUTE_TIME, 1.5).expect("put");
        recorder.put(COMPUTE_TIME, 2.0).expect("put");
        recorder.put(EXECUTION_TIME, 4.0).expect("put");
        recorder.put(EXECUTION_TIME, 3.0).expect("put");
        recorder.put(FAILED, 1.7).expect("put");

        let samples = recorder.snapshot().expect("snapshot");
        let value = |name: &str| samples.iter().find(|s| s.name == name).map(|s| s.value);
        assert_eq!(value(COMPUTE_TIME), Some(3.5));
        assert_eq!(value(EXECUTION_TIME), Some(3.0));
        assert_eq!(value(FAILED), Some(1.0));
        assert_eq!(samples[0].tags.get("app").map(String::as_str), Some("runner"));
        assert_eq!(recorder.record().expect("record"), samples);
    }

    #[test]
    fn put_requires_definition() {
        let recorder = StatsRecorder::new(BTreeMap::new());
        assert!(matches!(
            recorder.put("missing", 1.0),
            Err(Error::Configuration(_))
        ));
        assert!(NoopRecorder.put("missing", 1.0).is_ok());
        assert!(NoopRecorder.record().expect("record").is_empty());
    }

    #[test]
    fn untouched_measurements_are_not_reported() {
        let recorder = StatsRecorder::new(BTreeMap::new());
        recorder
            .define(EXECUTION_TIME, Measure::execution_time())
            .expect("define");
        assert!(recorder.snapshot().expect("snapshot").is_empty());
    }
}
