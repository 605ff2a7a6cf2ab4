//! Store client seam
//!
//! The dispatcher only sees [`RedisClient`]; tests substitute a scripted
//! double, the server binary uses [`TcpClient`].

use std::io::BufReader;
use std::net::TcpStream;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::ClientError;
use crate::reply::Reply;
use crate::resp;

/// Executes one store command and returns the raw reply tree.
pub trait RedisClient {
    fn run_cmd(&self, command: &str, args: &[&str]) -> Result<Reply, ClientError>;
}

struct Connection {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

impl Connection {
    fn open(addr: &str, timeout: Option<Duration>) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr)?;
        stream.set_read_timeout(timeout)?;
        stream.set_write_timeout(timeout)?;
        stream.set_nodelay(true)?;
        let writer = stream.try_clone()?;

        Ok(Self {
            reader: BufReader::new(stream),
            writer,
        })
    }

    fn exchange(&mut self, command: &str, args: &[&str]) -> Result<Reply, ClientError> {
        resp::write_command(&mut self.writer, command, args)?;
        resp::read_reply(&mut self.reader)
    }
}

/// Single-connection RESP2 client over TCP.
///
/// Calls from several threads are serialized on the connection mutex.
/// A transport or codec failure leaves the stream position unknown, so the
/// connection is dropped and the next call dials a fresh one. Failed calls
/// are not retried.
pub struct TcpClient {
    addr: String,
    timeout: Option<Duration>,
    conn: Mutex<Option<Connection>>,
}

impl TcpClient {
    pub fn connect(addr: &str, timeout: Option<Duration>) -> Result<Self, ClientError> {
        let conn = Connection::open(addr, timeout)?;

        Ok(Self {
            addr: addr.to_string(),
            timeout,
            conn: Mutex::new(Some(conn)),
        })
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }
}

impl RedisClient for TcpClient {
    fn run_cmd(&self, command: &str, args: &[&str]) -> Result<Reply, ClientError> {
        debug!(addr = %self.addr, command, args = args.len(), "store command");
        let mut slot = self.conn.lock().unwrap_or_else(PoisonError::into_inner);

        let mut conn = match slot.take() {
            Some(conn) => conn,
            None => {
                debug!(addr = %self.addr, "reconnecting to store");
                Connection::open(&self.addr, self.timeout)?
            }
        };

        let result = conn.exchange(command, args);
        match &result {
            Err(err @ (ClientError::Transport(_) | ClientError::Codec(_))) => {
                warn!(addr = %self.addr, command, error = %err, "dropping store connection");
            }
            _ => *slot = Some(conn),
        }
        result
    }
}

#[cfg(test)]
mod client_tests {
    use super::*;
    use std::io::{BufRead, Read, Write};
    use std::net::TcpListener;
    use std::thread;

    /// Read one RESP command off the wire and return its raw bytes.
    fn read_command<R: BufRead>(reader: &mut R) -> Vec<u8> {
        let mut header = String::new();
        reader.read_line(&mut header).unwrap();
        let parts: usize = header.trim_start_matches('*').trim().parse().unwrap();
        let mut received = header.into_bytes();
        for _ in 0..parts {
            let mut len_line = String::new();
            reader.read_line(&mut len_line).unwrap();
            let len: usize = len_line.trim_start_matches('$').trim().parse().unwrap();
            let mut body = vec![0u8; len + 2];
            reader.read_exact(&mut body).unwrap();
            received.extend_from_slice(len_line.as_bytes());
            received.extend_from_slice(&body);
        }
        received
    }

    /// Fake store serving one command per accepted connection, in order.
    /// Each session waits `delay` before answering with its reply bytes.
    fn fake_store(
        sessions: Vec<(Duration, &'static [u8])>,
    ) -> (String, thread::JoinHandle<Vec<Vec<u8>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let handle = thread::spawn(move || {
            let mut commands = Vec::new();
            for (delay, reply) in sessions {
                let (stream, _) = listener.accept().unwrap();
                let mut reader = BufReader::new(stream.try_clone().unwrap());
                commands.push(read_command(&mut reader));
                thread::sleep(delay);
                // The client may already have hung up on a late answer
                let mut writer = stream;
                let _ = writer.write_all(reply);
            }
            commands
        });
        (addr, handle)
    }

    fn one_shot(reply: &'static [u8]) -> (String, thread::JoinHandle<Vec<Vec<u8>>>) {
        fake_store(vec![(Duration::ZERO, reply)])
    }

    #[test]
    fn test_tcp_client_round_trip() {
        let (addr, store) = one_shot(b"*2\r\n:1\r\n$3\r\nfoo\r\n");
        let client = TcpClient::connect(&addr, Some(Duration::from_secs(5))).unwrap();

        let reply = client.run_cmd("GRAPH.SLOWLOG", &["social"]).unwrap();
        assert_eq!(reply, Reply::Array(vec![Reply::Int(1), Reply::from("foo")]));

        let received = store.join().unwrap();
        assert_eq!(received, [resp::encode_command("GRAPH.SLOWLOG", &["social"])]);
        assert_eq!(client.addr(), addr);
    }

    #[test]
    fn test_tcp_client_protocol_error() {
        let (addr, store) =
            one_shot(b"-WRONGTYPE Operation against a key holding the wrong kind of value\r\n");
        let client = TcpClient::connect(&addr, None).unwrap();

        match client.run_cmd("HLEN", &["mylist"]) {
            Err(ClientError::Protocol(message)) => assert!(message.starts_with("WRONGTYPE")),
            other => panic!("Expected Protocol error, got {:?}", other),
        }
        store.join().unwrap();
    }

    #[test]
    fn test_tcp_client_connect_refused() {
        // Bind then drop to get a port with nothing listening
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().to_string()
        };
        assert!(matches!(TcpClient::connect(&addr, None), Err(ClientError::Transport(_))));
    }

    #[test]
    fn test_late_reply_is_not_handed_to_next_command() {
        let (addr, store) = fake_store(vec![
            (Duration::from_millis(400), b"*0\r\n"),
            (Duration::ZERO, b":3600\r\n"),
        ]);
        let client = TcpClient::connect(&addr, Some(Duration::from_millis(100))).unwrap();

        assert!(matches!(
            client.run_cmd("GRAPH.SLOWLOG", &["social"]),
            Err(ClientError::Transport(_))
        ));
        // Let the stale answer land on the old socket
        thread::sleep(Duration::from_millis(500));

        assert_eq!(client.run_cmd("TTL", &["k"]).unwrap(), Reply::Int(3600));

        let received = store.join().unwrap();
        assert_eq!(received[1], resp::encode_command("TTL", &["k"]));
    }

    #[test]
    fn test_codec_error_drops_connection() {
        let (addr, store) = fake_store(vec![
            (Duration::ZERO, b"?garbage\r\n:1\r\n"),
            (Duration::ZERO, b"+PONG\r\n"),
        ]);
        let client = TcpClient::connect(&addr, Some(Duration::from_secs(5))).unwrap();

        assert!(matches!(client.run_cmd("GET", &["k"]), Err(ClientError::Codec(_))));
        assert_eq!(client.run_cmd("PING", &[]).unwrap(), Reply::Str("PONG".into()));
        assert_eq!(store.join().unwrap().len(), 2);
    }

    #[test]
    fn test_protocol_error_keeps_connection() {
        // One connection, two commands: the error reply leaves the stream aligned
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let store = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut writer = stream;
            read_command(&mut reader);
            writer.write_all(b"-ERR no such key\r\n").unwrap();
            read_command(&mut reader);
            writer.write_all(b":7\r\n").unwrap();
        });
        let client = TcpClient::connect(&addr, Some(Duration::from_secs(5))).unwrap();

        assert!(matches!(client.run_cmd("GET", &["k"]), Err(ClientError::Protocol(_))));
        assert_eq!(client.run_cmd("LLEN", &["l"]).unwrap(), Reply::Int(7));
        store.join().unwrap();
    }
}
