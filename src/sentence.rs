use chrono::{DateTime, SubsecRound, Utc};
use thiserror::Error;

use crate::{decode_position, Record, Schema, Value};

/// Marker that opens every telemetry sentence
pub const APRS_MARKER: &str = "APRS:";

#[derive(Error, Clone, Debug, PartialEq)]
/// Errors raised while decoding a sentence
pub enum DecodeError {
    /// The line does not start with the sentence marker
    #[error("Line does not start with {:?}", APRS_MARKER)]
    NotATelemetrySentence,
    /// The header does not hold two position tokens
    #[error("Malformed position: {0}")]
    MalformedPosition(String),
    /// The sentence could not be split into its parts
    #[error("Unexpected fault decoding sentence: {0}")]
    UnexpectedDecodeFault(String),
}

/// A sentence split into its parts, borrowed from the marker-stripped text
#[derive(Debug, Clone, Copy, PartialEq)]
struct Sentence<'a> {
    callsign: &'a str,
    header: &'a str,
    body: &'a str,
}

impl<'a> Sentence<'a> {
    fn split(text: &'a str) -> Result<Self, DecodeError> {
        let (first, body) = text.split_once(' ').unwrap_or((text, ""));
        let mut path = first.split('>');
        let callsign = path.next().unwrap_or(first);
        // the header ends at the next '>', if any
        let header = path.next().ok_or_else(|| {
            DecodeError::UnexpectedDecodeFault(format!("no '>' after callsign in {first:?}"))
        })?;
        Ok(Self {
            callsign,
            header,
            body,
        })
    }
}

fn strip_marker(line: &str) -> Result<&str, DecodeError> {
    line.trim()
        .strip_prefix(APRS_MARKER)
        .map(str::trim)
        .ok_or(DecodeError::NotATelemetrySentence)
}

#[derive(Debug, Clone, Default)]
/// Decodes sentences into records according to a [`Schema`].
///
/// The decoder holds no state between lines and can be shared freely across
/// threads.
pub struct SentenceDecoder {
    schema: Schema,
}

impl SentenceDecoder {
    /// Create a decoder for the given schema
    pub fn new(schema: Schema) -> Self {
        Self { schema }
    }

    /// The schema this decoder applies
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Decode one line, stamping the record with the current time.
    ///
    /// Only a missing `APRS:` marker is an error. Anything else that goes
    /// wrong is logged and yields a partial record.
    pub fn decode(&self, line: &str) -> Result<Record, DecodeError> {
        self.decode_at(line, Utc::now())
    }

    /// Decode one line as if it had been captured at `now`.
    ///
    /// The timestamp is kept to microsecond precision.
    pub fn decode_at(&self, line: &str, now: DateTime<Utc>) -> Result<Record, DecodeError> {
        let text = strip_marker(line)?;
        let now = now.trunc_subsecs(6);
        let mut record = Record::default();
        if let Err(e) = self.fill(&mut record, text, now) {
            log::error!("Error decoding APRS data: {e}");
        }
        record.set(Record::RAW_APRS, Some(Value::Text(text.to_string())));
        Ok(record)
    }

    fn fill(&self, record: &mut Record, text: &str, now: DateTime<Utc>) -> Result<(), DecodeError> {
        let sentence = Sentence::split(text)?;
        record.set(
            Record::CALLSIGN,
            Some(Value::Text(sentence.callsign.to_string())),
        );
        let position = decode_position(sentence.header)
            .map_err(|e| log::warn!("{e}, continuing without position"))
            .ok();
        record.set(
            Record::LATITUDE,
            position.map(|p| Value::Number(p.latitude)),
        );
        record.set(
            Record::LONGITUDE,
            position.map(|p| Value::Number(p.longitude)),
        );
        for group in self.schema.groups() {
            for (name, value) in group.extract(sentence.body) {
                record.set(name, value.map(Value::Number));
            }
        }
        if self.schema.timestamp() {
            record.set(Record::TIMESTAMP, Some(Value::Timestamp(now)));
        }
        Ok(())
    }
}
