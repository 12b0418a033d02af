use std::io::Write;

use thiserror::Error;

#[derive(Error, Debug)]
/// Errors raised while handing a record to its destination
pub enum PublishError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("MQTT client error: {0}")]
    Client(#[from] rumqttc::ClientError),
    #[error("MQTT connection error: {0}")]
    Connection(#[from] rumqttc::ConnectionError),
    #[error("Timed out waiting for the broker")]
    Timeout,
}

/// A destination for published records
pub trait Publisher {
    /// Deliver one payload to `topic`
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), PublishError>;
}

/// Writes `<topic> <payload>` lines, used for dry runs
pub struct ConsolePublisher<W: Write> {
    out: W,
}

impl ConsolePublisher<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> ConsolePublisher<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Publisher for ConsolePublisher<W> {
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), PublishError> {
        self.out.write_all(topic.as_bytes())?;
        self.out.write_all(b" ")?;
        self.out.write_all(payload)?;
        self.out.write_all(b"\n")?;
        self.out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn console_lines() {
        let mut console = ConsolePublisher::new(Vec::new());
        console.publish("cubesatsim/data", br#"{"callsign":"N0CALL"}"#).unwrap();
        assert_eq!(
            console.into_inner(),
            b"cubesatsim/data {\"callsign\":\"N0CALL\"}\n".to_vec()
        );
    }
}
