use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

#[derive(Debug, Clone, PartialEq)]
/// A decoded field value
pub enum Value {
    /// Free text, e.g. the callsign
    Text(String),
    /// A numeric reading or coordinate
    Number(f64),
    /// The instant the sentence was decoded
    Timestamp(DateTime<Utc>),
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Text(text) => serializer.serialize_str(text),
            Value::Number(value) => serializer.serialize_f64(*value),
            Value::Timestamp(time) => serializer.serialize_str(&iso_timestamp(time)),
        }
    }
}

/// ISO 8601 in UTC with a `Z` suffix, microseconds shown only when non-zero
fn iso_timestamp(time: &DateTime<Utc>) -> String {
    let seconds = time.format("%Y-%m-%dT%H:%M:%S");
    match time.timestamp_subsec_micros() {
        0 => format!("{seconds}Z"),
        micros => format!("{seconds}.{micros:06}Z"),
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
/// The result of decoding one sentence.
///
/// An insertion-ordered map from field name to an optional value. A name
/// mapped to `None` was looked for but not found in the sentence.
pub struct Record {
    fields: Vec<(&'static str, Option<Value>)>,
}

impl Record {
    /// Station callsign
    pub const CALLSIGN: &'static str = "callsign";
    /// Beacon latitude
    pub const LATITUDE: &'static str = "latitude";
    /// Beacon longitude
    pub const LONGITUDE: &'static str = "longitude";
    /// Decode time
    pub const TIMESTAMP: &'static str = "timestamp";
    /// Sentence text without the `APRS:` marker
    pub const RAW_APRS: &'static str = "raw_aprs";

    pub(crate) fn set(&mut self, name: &'static str, value: Option<Value>) {
        match self.fields.iter_mut().find(|(key, _)| *key == name) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((name, value)),
        }
    }

    /// The value of a field, if it was decoded
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(key, _)| *key == name)
            .and_then(|(_, value)| value.as_ref())
    }

    /// Whether the decoder looked for this field, found or not
    pub fn contains(&self, name: &str) -> bool {
        self.fields.iter().any(|(key, _)| *key == name)
    }

    /// The value of a numeric field, if it was decoded
    pub fn number(&self, name: &str) -> Option<f64> {
        match self.get(name) {
            Some(Value::Number(value)) => Some(*value),
            _ => None,
        }
    }

    fn text(&self, name: &str) -> Option<&str> {
        match self.get(name) {
            Some(Value::Text(text)) => Some(text.as_str()),
            _ => None,
        }
    }

    /// Station callsign
    pub fn callsign(&self) -> Option<&str> {
        self.text(Self::CALLSIGN)
    }

    /// Latitude in signed decimal degrees
    pub fn latitude(&self) -> Option<f64> {
        self.number(Self::LATITUDE)
    }

    /// Longitude in signed decimal degrees
    pub fn longitude(&self) -> Option<f64> {
        self.number(Self::LONGITUDE)
    }

    /// Sentence text without the marker, for audit and replay
    pub fn raw_aprs(&self) -> Option<&str> {
        self.text(Self::RAW_APRS)
    }

    /// Decode time, when the schema stamps records
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        match self.get(Self::TIMESTAMP) {
            Some(Value::Timestamp(time)) => Some(*time),
            _ => None,
        }
    }

    /// Iterate over fields in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, Option<&Value>)> + '_ {
        self.fields.iter().map(|(key, value)| (*key, value.as_ref()))
    }

    /// Number of fields, found or not
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the record has no fields at all
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Serialize to a flat JSON object
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl Serialize for Record {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (key, value) in &self.fields {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}
