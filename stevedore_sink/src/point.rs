//! Data point model and encoding.
//!
//! A [`DataPoint`] is the unit of transmission: one timestamp, a set of
//! string dimensions and a set of string measures, all captured from a
//! single observation. [`encode`] is the only constructor the pipeline
//! uses; it is pure and total, so every observation becomes exactly one
//! point.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

/// A tag or measure value prior to stringification.
///
/// The backend stores every dimension and measure as a string; this type
/// carries the original value so stringification happens in exactly one
/// place, its `Display` impl.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// UTF-8 text, passed through unchanged.
    String(String),
    /// Boolean, rendered `true` or `false`.
    Bool(bool),
    /// Signed integer.
    Signed(i64),
    /// Unsigned integer.
    Unsigned(u64),
    /// Floating point, rendered in Rust's shortest form: `50.0` renders
    /// as `50`.
    Float(f64),
    /// An absent value, rendered `None`.
    None,
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => f.write_str(s),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Signed(i) => write!(f, "{i}"),
            Value::Unsigned(u) => write!(f, "{u}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::None => f.write_str("None"),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Signed(i)
    }
}

impl From<u64> for Value {
    fn from(u: u64) -> Self {
        Value::Unsigned(u)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

/// One named tag on a point.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Dimension {
    /// Tag name.
    pub name: String,
    /// Stringified tag value.
    pub value: String,
}

/// One named measure on a point.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Record {
    /// Measure name.
    pub measure_name: String,
    /// Stringified measure value.
    pub measure_value: String,
}

/// The measure value kind declared to the backend.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum MeasureType {
    /// 64-bit floating point, the only kind this pipeline emits.
    #[serde(rename = "DOUBLE")]
    Double,
}

/// Metadata shared by every record of a point.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CommonAttributes {
    /// Tag set, in insertion order.
    pub dimensions: Vec<Dimension>,
    /// Measure value kind, always [`MeasureType::Double`].
    pub measure_value_type: MeasureType,
    /// Milliseconds since the Unix epoch, string encoded.
    pub time: String,
    /// Upsert ordering hint for the backend. Numerically equal to `time`.
    pub version: i64,
}

/// One timestamped, tagged, multi-measure data point.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DataPoint {
    /// Metadata shared by all records of this point.
    pub common_attributes: CommonAttributes,
    /// Measure set, in insertion order.
    pub records: Vec<Record>,
}

impl DataPoint {
    /// Value of the dimension named `name`, if present.
    #[must_use]
    pub fn dimension(&self, name: &str) -> Option<&str> {
        self.common_attributes
            .dimensions
            .iter()
            .find(|d| d.name == name)
            .map(|d| d.value.as_str())
    }

    /// Value of the record named `name`, if present.
    #[must_use]
    pub fn record(&self, name: &str) -> Option<&str> {
        self.records
            .iter()
            .find(|r| r.measure_name == name)
            .map(|r| r.measure_value.as_str())
    }
}

/// Encode `tags` and `fields` captured at `time` into a [`DataPoint`].
///
/// Dimension and record order follow slice order. The timestamp and
/// version are derived from the same reading of `time`, so the version of
/// a point always equals the integer value of its timestamp string. Never
/// fails: a `time` before the Unix epoch encodes as zero.
#[must_use]
pub fn encode(tags: &[(&str, Value)], fields: &[(&str, Value)], time: SystemTime) -> DataPoint {
    let millis = match time.duration_since(UNIX_EPOCH) {
        Ok(elapsed) => elapsed.as_millis(),
        Err(_) => 0,
    };
    // Milliseconds do not overflow i64 until roughly the year 292 million.
    let version = i64::try_from(millis).unwrap_or(i64::MAX);

    let dimensions = tags
        .iter()
        .map(|(name, value)| Dimension {
            name: (*name).to_string(),
            value: value.to_string(),
        })
        .collect();
    let records = fields
        .iter()
        .map(|(name, value)| Record {
            measure_name: (*name).to_string(),
            measure_value: value.to_string(),
        })
        .collect();

    DataPoint {
        common_attributes: CommonAttributes {
            dimensions,
            measure_value_type: MeasureType::Double,
            time: version.to_string(),
            version,
        },
        records,
    }
}
