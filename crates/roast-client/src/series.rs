//! Append-only telemetry series for the current run.

use std::fmt;

use roast_protocol::ProtocolError;
use smol_str::SmolStr;
use tracing::warn;

/// Number of comma-separated fields in a telemetry record. Extra fields are
/// ignored.
pub const SAMPLE_FIELDS: usize = 4;

/// One decoded `timestamp,setpoint,output,temperature` record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetrySample {
    /// Controller clock in milliseconds.
    pub timestamp: i64,
    pub setpoint: f64,
    pub output: f64,
    pub temperature: f64,
}

impl TelemetrySample {
    pub fn parse(raw: &str) -> Result<Self, ProtocolError> {
        let fields: Vec<&str> = raw.split(',').take(SAMPLE_FIELDS).collect();
        if fields.len() < SAMPLE_FIELDS {
            let reason = format!("expected {SAMPLE_FIELDS} fields, got {}", fields.len());
            return Err(malformed(raw, reason));
        }
        let stamp = fields[0].trim();
        let Ok(timestamp) = stamp.parse::<i64>() else {
            let reason = format!("timestamp '{stamp}' is not an integer");
            return Err(malformed(raw, reason));
        };
        Ok(Self {
            timestamp,
            setpoint: parse_reading(raw, "setpoint", fields[1])?,
            output: parse_reading(raw, "output", fields[2])?,
            temperature: parse_reading(raw, "temperature", fields[3])?,
        })
    }
}

fn parse_reading(raw: &str, name: &str, field: &str) -> Result<f64, ProtocolError> {
    let field = field.trim();
    field
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| malformed(raw, format!("{name} '{field}' is not a number")))
}

fn malformed(raw: &str, reason: impl AsRef<str>) -> ProtocolError {
    ProtocolError::MalformedSample {
        raw: SmolStr::new(raw),
        reason: SmolStr::new(reason),
    }
}

/// Point on a chart: time relative to the first sample of the run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesPoint {
    pub t: i64,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SeriesKind {
    Temperature,
    Setpoint,
    Output,
}

impl SeriesKind {
    pub const ALL: [Self; 3] = [Self::Temperature, Self::Setpoint, Self::Output];

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Temperature => "temperature",
            Self::Setpoint => "setpoint",
            Self::Output => "output",
        }
    }
}

impl fmt::Display for SeriesKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Min/avg/max summary of a run of consecutive points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BucketPoint {
    /// Relative time of the last point in the bucket.
    pub t: i64,
    pub avg: f64,
    pub min: f64,
    pub max: f64,
    pub samples: usize,
}

/// Extents across all three series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesBounds {
    pub t_min: i64,
    pub t_max: i64,
    pub value_min: f64,
    pub value_max: f64,
}

/// Temperature, setpoint, and output series sharing one time origin.
///
/// All three always hold the same number of points; the n-th point of each
/// comes from the same sample.
#[derive(Debug, Clone, Default)]
pub struct TelemetrySeries {
    t0: Option<i64>,
    temperature: Vec<SeriesPoint>,
    setpoint: Vec<SeriesPoint>,
    output: Vec<SeriesPoint>,
    generation: u64,
    regressions: u64,
}

impl TelemetrySeries {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears every series and the time origin. Calling it on an already
    /// empty store is a no-op, generation included.
    pub fn reset(&mut self) {
        if self.t0.is_none() && self.temperature.is_empty() {
            return;
        }
        self.t0 = None;
        self.temperature.clear();
        self.setpoint.clear();
        self.output.clear();
        self.regressions = 0;
        self.generation += 1;
    }

    /// Parses and appends one raw record. A rejected record leaves the
    /// series untouched.
    pub fn ingest(&mut self, raw: &str) -> Result<TelemetrySample, ProtocolError> {
        let sample = TelemetrySample::parse(raw)?;
        self.push(sample);
        Ok(sample)
    }

    pub fn push(&mut self, sample: TelemetrySample) {
        let t0 = *self.t0.get_or_insert(sample.timestamp);
        let t = sample.timestamp.saturating_sub(t0);
        if let Some(last) = self.temperature.last() {
            if t < last.t {
                self.regressions += 1;
                warn!(t, last = last.t, "telemetry timestamp went backwards");
            }
        }
        self.temperature.push(SeriesPoint {
            t,
            value: sample.temperature,
        });
        self.setpoint.push(SeriesPoint {
            t,
            value: sample.setpoint,
        });
        self.output.push(SeriesPoint {
            t,
            value: sample.output,
        });
    }

    #[must_use]
    pub fn points(&self, kind: SeriesKind) -> &[SeriesPoint] {
        match kind {
            SeriesKind::Temperature => &self.temperature,
            SeriesKind::Setpoint => &self.setpoint,
            SeriesKind::Output => &self.output,
        }
    }

    #[must_use]
    pub fn t0(&self) -> Option<i64> {
        self.t0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.temperature.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.temperature.is_empty()
    }

    /// Bumped by every reset that cleared something.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Accepted samples whose time went backwards in this run.
    #[must_use]
    pub fn regressions(&self) -> u64 {
        self.regressions
    }

    #[must_use]
    pub fn bounds(&self) -> Option<SeriesBounds> {
        let mut points = SeriesKind::ALL
            .into_iter()
            .flat_map(|kind| self.points(kind).iter());
        let first = points.next()?;
        let mut bounds = SeriesBounds {
            t_min: first.t,
            t_max: first.t,
            value_min: first.value,
            value_max: first.value,
        };
        for point in points {
            bounds.t_min = bounds.t_min.min(point.t);
            bounds.t_max = bounds.t_max.max(point.t);
            bounds.value_min = bounds.value_min.min(point.value);
            bounds.value_max = bounds.value_max.max(point.value);
        }
        Some(bounds)
    }

    /// Groups consecutive points into at most `buckets` min/avg/max points.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn downsample(&self, kind: SeriesKind, buckets: usize) -> Vec<BucketPoint> {
        let points = self.points(kind);
        if points.is_empty() || buckets == 0 {
            return Vec::new();
        }
        if points.len() <= buckets {
            return points
                .iter()
                .map(|point| BucketPoint {
                    t: point.t,
                    avg: point.value,
                    min: point.value,
                    max: point.value,
                    samples: 1,
                })
                .collect();
        }
        let chunk_size = points.len().div_ceil(buckets);
        points
            .chunks(chunk_size.max(1))
            .map(|chunk| {
                let mut min = f64::INFINITY;
                let mut max = f64::NEG_INFINITY;
                let mut sum = 0.0;
                for point in chunk {
                    min = min.min(point.value);
                    max = max.max(point.value);
                    sum += point.value;
                }
                BucketPoint {
                    t: chunk.last().map(|point| point.t).unwrap_or_default(),
                    avg: sum / chunk.len() as f64,
                    min,
                    max,
                    samples: chunk.len(),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn times(series: &TelemetrySeries, kind: SeriesKind) -> Vec<i64> {
        series.points(kind).iter().map(|point| point.t).collect()
    }

    fn assert_parallel(series: &TelemetrySeries) {
        let len = series.points(SeriesKind::Temperature).len();
        assert_eq!(series.points(SeriesKind::Setpoint).len(), len);
        assert_eq!(series.points(SeriesKind::Output).len(), len);
    }

    #[test]
    fn times_are_relative_to_first_sample() {
        let mut series = TelemetrySeries::new();
        for raw in ["100,125,75,103", "150,125,80,110", "200,125,60,118"] {
            series.ingest(raw).expect("sample");
            assert_parallel(&series);
        }
        assert_eq!(series.t0(), Some(100));
        assert_eq!(times(&series, SeriesKind::Temperature), [0, 50, 100]);
        assert_eq!(times(&series, SeriesKind::Output), [0, 50, 100]);
        let values = series
            .points(SeriesKind::Temperature)
            .iter()
            .map(|point| point.value)
            .collect::<Vec<_>>();
        assert_eq!(values, [103.0, 110.0, 118.0]);
    }

    #[test]
    fn reset_starts_a_new_origin() {
        let mut series = TelemetrySeries::new();
        series.ingest("100,1,2,3").expect("sample");
        series.ingest("200,1,2,3").expect("sample");
        series.reset();
        assert!(series.is_empty());
        assert_eq!(series.t0(), None);
        series.ingest("500,1,2,3").expect("sample");
        assert_eq!(series.len(), 1);
        for kind in SeriesKind::ALL {
            assert_eq!(times(&series, kind), [0]);
        }
    }

    #[test]
    fn reset_is_idempotent() {
        let mut series = TelemetrySeries::new();
        series.reset();
        assert_eq!(series.generation(), 0);
        series.ingest("1,1,1,1").expect("sample");
        series.reset();
        series.reset();
        assert_eq!(series.generation(), 1);
        assert!(series.is_empty());
    }

    #[test]
    fn short_record_is_rejected_without_side_effects() {
        let mut series = TelemetrySeries::new();
        series.ingest("50,1,1,1").expect("sample");
        let err = series.ingest("100,125,75").expect_err("three fields");
        assert_eq!(
            err,
            ProtocolError::MalformedSample {
                raw: "100,125,75".into(),
                reason: "expected 4 fields, got 3".into(),
            }
        );
        assert_eq!(series.len(), 1);
        assert_parallel(&series);
    }

    #[test]
    fn non_numeric_fields_are_rejected() {
        let mut series = TelemetrySeries::new();
        let rejected = [
            "x,1,2,3",
            "12.5,1,2,3",
            "1,abc,2,3",
            "1,2,NaN,3",
            "1,2,3,inf",
            "",
        ];
        for raw in rejected {
            assert!(series.ingest(raw).is_err(), "{raw} should be rejected");
        }
        assert!(series.is_empty());
        assert_eq!(series.t0(), None);
    }

    #[test]
    fn fields_are_trimmed_and_extras_ignored() {
        let sample = TelemetrySample::parse(" 10 , 125.5 ,40, 99.5,extra,more").expect("sample");
        assert_eq!(
            sample,
            TelemetrySample {
                timestamp: 10,
                setpoint: 125.5,
                output: 40.0,
                temperature: 99.5,
            }
        );
    }

    #[test]
    fn regressions_are_kept_and_counted() {
        let mut series = TelemetrySeries::new();
        series.ingest("1000,1,1,1").expect("sample");
        series.ingest("1500,1,1,1").expect("sample");
        series.ingest("900,1,1,1").expect("sample");
        assert_eq!(times(&series, SeriesKind::Setpoint), [0, 500, -100]);
        assert_eq!(series.regressions(), 1);
        series.reset();
        assert_eq!(series.regressions(), 0);
    }

    #[test]
    fn bounds_span_all_series() {
        let mut series = TelemetrySeries::new();
        assert_eq!(series.bounds(), None);
        series.ingest("0,200,10,25").expect("sample");
        series.ingest("30,200,95,60").expect("sample");
        assert_eq!(
            series.bounds(),
            Some(SeriesBounds {
                t_min: 0,
                t_max: 30,
                value_min: 10.0,
                value_max: 200.0,
            })
        );
    }

    #[test]
    fn downsample_summarises_buckets() {
        let mut series = TelemetrySeries::new();
        for step in 0..10 {
            series
                .ingest(&format!("{},0,0,{}", step * 10, step))
                .expect("sample");
        }
        let buckets = series.downsample(SeriesKind::Temperature, 4);
        assert_eq!(buckets.len(), 4);
        assert_eq!(buckets[0].min, 0.0);
        assert_eq!(buckets[0].max, 2.0);
        assert_eq!(buckets[0].avg, 1.0);
        assert_eq!(buckets[0].t, 20);
        assert_eq!(buckets[3].samples, 1);
        assert_eq!(buckets[3].t, 90);

        let raw = series.downsample(SeriesKind::Temperature, 32);
        assert_eq!(raw.len(), 10);
        assert!(series.downsample(SeriesKind::Output, 0).is_empty());
    }
}
