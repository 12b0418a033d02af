//! MQTT publisher on top of the `rumqttc` synchronous client.
use std::{
    sync::{
        atomic::{AtomicBool, Ordering::SeqCst},
        mpsc, Arc,
    },
    thread,
    time::Duration,
};

use rumqttc::{Client, Connection, Event, MqttOptions, Packet, QoS};

use crate::publish::{PublishError, Publisher};

/// Requests queued between the relay and the network thread
const REQUEST_CAPACITY: usize = 64;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const RECONNECT_DELAY: Duration = Duration::from_secs(1);
const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Publishes records at QoS 1 to an MQTT broker.
///
/// The connection is driven on a background thread which reconnects when the
/// link drops; unacknowledged messages are sent again once the broker is back.
pub struct MqttPublisher {
    client: Client,
    closing: Arc<AtomicBool>,
    done_rx: mpsc::Receiver<()>,
}

impl MqttPublisher {
    /// Connect to the broker, failing if it cannot be reached or refuses us
    pub fn connect(options: MqttOptions) -> Result<Self, PublishError> {
        let (host, port) = options.broker_address();
        let (client, mut connection) = Client::new(options, REQUEST_CAPACITY);
        loop {
            match connection.recv_timeout(CONNECT_TIMEOUT) {
                Ok(Ok(Event::Incoming(Packet::ConnAck(_)))) => break,
                Ok(Ok(_)) => continue,
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => return Err(PublishError::Timeout),
            }
        }
        log::info!("Connected to MQTT broker at {host}:{port}");
        let closing = Arc::new(AtomicBool::new(false));
        let (done_tx, done_rx) = mpsc::channel();
        let flag = closing.clone();
        thread::spawn(move || {
            drive(connection, &flag);
            drop(done_tx);
        });
        Ok(Self {
            client,
            closing,
            done_rx,
        })
    }
}

/// Run the network event loop until the client goes away
fn drive(mut connection: Connection, closing: &AtomicBool) {
    for notification in connection.iter() {
        match notification {
            Ok(Event::Incoming(Packet::ConnAck(_))) => log::info!("Reconnected to MQTT broker"),
            Ok(Event::Incoming(Packet::PubAck(ack))) => {
                log::debug!("Broker acknowledged message {}", ack.pkid)
            }
            Ok(_) => {}
            Err(e) => {
                if closing.load(SeqCst) {
                    break;
                }
                log::warn!("MQTT connection lost ({e}). Reconnecting...");
                thread::sleep(RECONNECT_DELAY);
            }
        }
    }
    log::info!("MQTT network thread exiting");
}

impl Publisher for MqttPublisher {
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), PublishError> {
        self.client
            .try_publish(topic, QoS::AtLeastOnce, false, payload.to_vec())?;
        Ok(())
    }
}

impl Drop for MqttPublisher {
    fn drop(&mut self) {
        self.closing.store(true, SeqCst);
        if let Err(e) = self.client.try_disconnect() {
            log::warn!("Could not disconnect from MQTT broker: {e}");
        }
        if let Err(mpsc::RecvTimeoutError::Timeout) = self.done_rx.recv_timeout(DISCONNECT_TIMEOUT) {
            log::warn!("MQTT network thread did not stop");
        }
        log::info!("Disconnected from MQTT broker");
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};

    const CONNECT: u8 = 0x10;
    const PUBLISH: u8 = 0x30;

    fn read_packet(socket: &mut TcpStream) -> (u8, Vec<u8>) {
        let mut kind = [0; 1];
        socket.read_exact(&mut kind).unwrap();
        let (mut len, mut shift) = (0usize, 0);
        loop {
            let mut byte = [0; 1];
            socket.read_exact(&mut byte).unwrap();
            len |= ((byte[0] & 0x7F) as usize) << shift;
            if byte[0] & 0x80 == 0 {
                break;
            }
            shift += 7;
        }
        let mut body = vec![0; len];
        socket.read_exact(&mut body).unwrap();
        (kind[0], body)
    }

    /// Accept a client and answer its CONNECT with `code`
    fn accept(listener: &TcpListener, code: u8) -> TcpStream {
        let (mut socket, _) = listener.accept().unwrap();
        let (kind, _) = read_packet(&mut socket);
        assert_eq!(kind, CONNECT);
        socket.write_all(&[0x20, 2, 0, code]).unwrap();
        socket
    }

    /// Wait for the next PUBLISH, returning topic, QoS, packet id and payload
    fn next_publish(socket: &mut TcpStream) -> (String, u8, [u8; 2], Vec<u8>) {
        loop {
            let (kind, body) = read_packet(socket);
            if kind & 0xF0 != PUBLISH {
                continue;
            }
            let topic_len = u16::from_be_bytes([body[0], body[1]]) as usize;
            let topic = String::from_utf8(body[2..2 + topic_len].to_vec()).unwrap();
            let pkid = [body[2 + topic_len], body[3 + topic_len]];
            return (topic, (kind >> 1) & 0x03, pkid, body[4 + topic_len..].to_vec());
        }
    }

    fn puback(socket: &mut TcpStream, pkid: [u8; 2]) {
        socket.write_all(&[0x40, 2, pkid[0], pkid[1]]).unwrap();
    }

    fn options(port: u16) -> MqttOptions {
        let mut options = MqttOptions::new("relay-test", "127.0.0.1", port);
        options.set_clean_session(false);
        options
    }

    #[test]
    fn publishes_to_a_broker() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let broker = thread::spawn(move || {
            let mut socket = accept(&listener, 0);
            let (topic, qos, pkid, payload) = next_publish(&mut socket);
            puback(&mut socket, pkid);
            (topic, qos, payload)
        });
        let mut publisher = MqttPublisher::connect(options(port)).unwrap();
        publisher.publish("cubesatsim/data", b"{}").unwrap();
        let (topic, qos, payload) = broker.join().unwrap();
        assert_eq!(topic, "cubesatsim/data");
        assert_eq!(qos, 1);
        assert_eq!(payload, b"{}");
    }

    #[test]
    fn resends_after_the_broker_drops() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let broker = thread::spawn(move || {
            let mut first = accept(&listener, 0);
            let (_, _, _, lost) = next_publish(&mut first);
            // close without acknowledging
            drop(first);
            let mut second = accept(&listener, 0);
            let (_, _, pkid, resent) = next_publish(&mut second);
            puback(&mut second, pkid);
            (lost, resent)
        });
        let mut publisher = MqttPublisher::connect(options(port)).unwrap();
        publisher
            .publish("cubesatsim/data", b"{\"record\":1}")
            .unwrap();
        let (lost, resent) = broker.join().unwrap();
        assert_eq!(lost, b"{\"record\":1}");
        assert_eq!(resent, b"{\"record\":1}");
    }

    #[test]
    fn refused_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let broker = thread::spawn(move || {
            let _socket = accept(&listener, 5);
            thread::sleep(Duration::from_millis(200));
        });
        assert!(matches!(
            MqttPublisher::connect(options(port)),
            Err(PublishError::Connection(_))
        ));
        broker.join().unwrap();
    }

    #[test]
    fn unreachable_broker() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        assert!(MqttPublisher::connect(options(port)).is_err());
    }
}
