#![deny(missing_docs)]
//! # CubeSatSim APRS decoder
//! Decodes the telemetry sentences emitted by the CubeSatSim beacon.
//!
//! A sentence is an `APRS:` line carrying a callsign, an encoded position and
//! a free-text body of tagged sensor readings (`BAT`, `BME280`, `MPU6050`,
//! `GPS`, `TMP`, `VOL`). Each line decodes independently into a [`Record`].
mod extract;
mod position;
mod record;
mod schema;
mod sentence;

pub use extract::Group;
pub use position::{decode_position, Position};
pub use record::{Record, Value};
pub use schema::{InertialShape, Schema, SchemaKind};
pub use sentence::{DecodeError, SentenceDecoder, APRS_MARKER};

/// Decode a single sentence using the default schema.
pub fn decode(line: &str) -> Result<Record, DecodeError> {
    SentenceDecoder::default().decode(line)
}
