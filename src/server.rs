//! Host connection handler
//!
//! Protocol:
//!   Request:  [4-byte length BE] [MessagePack RequestEnvelope]
//!   Response: [4-byte length BE] [MessagePack ResponseEnvelope]
//!
//! Requests on one connection are handled in order. A request that fails to
//! decode gets an error response and the connection stays open.

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::client::RedisClient;
use crate::dispatcher;
use crate::query::{DataQuery, DataResponse};

/// Largest accepted request payload
pub const MAX_MESSAGE_SIZE: usize = 100 * 1024 * 1024;

#[derive(Debug, Serialize, Deserialize)]
pub struct RequestEnvelope {
    #[serde(rename = "requestId", default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub query: DataQuery,
}

#[derive(Debug, Serialize)]
pub struct ResponseEnvelope {
    #[serde(rename = "requestId", skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub response: DataResponse,
}

/// Read one length-prefixed message. `Ok(None)` on clean EOF.
pub fn read_message<R: Read>(stream: &mut R) -> std::io::Result<Option<Vec<u8>>> {
    let mut len_buf = [0u8; 4];
    match stream.read_exact(&mut len_buf) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    }

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_MESSAGE_SIZE {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("Message too large: {} bytes", len),
        ));
    }

    let mut buf = vec![0u8; len];
    stream.read_exact(&mut buf)?;
    Ok(Some(buf))
}

pub fn write_message<W: Write>(stream: &mut W, data: &[u8]) -> std::io::Result<()> {
    let len = u32::try_from(data.len()).map_err(|_| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "message exceeds 4 GiB")
    })?;
    stream.write_all(&len.to_be_bytes())?;
    stream.write_all(data)?;
    stream.flush()
}

/// Decode one request payload and produce its response envelope.
pub fn handle_message(msg: &[u8], client: &dyn RedisClient) -> ResponseEnvelope {
    match rmp_serde::from_slice::<RequestEnvelope>(msg) {
        Ok(env) => ResponseEnvelope {
            request_id: env.request_id,
            response: dispatcher::execute(&env.query, client),
        },
        Err(e) => ResponseEnvelope {
            request_id: None,
            response: DataResponse::Error {
                error: format!("Invalid request: {}", e),
                code: "MALFORMED_REQUEST".to_string(),
            },
        },
    }
}

/// Serve one host connection until EOF or an I/O error.
pub fn handle_connection<S: Read + Write>(mut stream: S, client: &dyn RedisClient, conn_id: usize) {
    info!(conn_id, "host connected");

    loop {
        let msg = match read_message(&mut stream) {
            Ok(Some(msg)) => msg,
            Ok(None) => {
                info!(conn_id, "host disconnected");
                break;
            }
            Err(e) => {
                warn!(conn_id, error = %e, "read error");
                break;
            }
        };

        let envelope = handle_message(&msg, client);
        let bytes = match rmp_serde::to_vec_named(&envelope) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(conn_id, error = %e, "serialize error");
                continue;
            }
        };

        if let Err(e) = write_message(&mut stream, &bytes) {
            warn!(conn_id, error = %e, "write error");
            break;
        }
    }
}
