//! Command dispatcher
//!
//! Routes one [`DataQuery`] to exactly one decoder:
//! - non-empty `query` → custom command, executed verbatim
//! - otherwise `command` → entry in the handler table
//!
//! Error policy:
//! - malformed body → error response, store never called
//! - store protocol/transport error → error response with the store's message
//! - unknown command → empty response, logged
//! - decoding fault (bad reply shape, frame error, panic) → empty response, logged

use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::OnceLock;

use tracing::{debug, error};

use crate::client::RedisClient;
use crate::error::{FrameError, QueryError, Result, ShapeError};
use crate::frame::{FieldType, FieldValue, Frame};
use crate::graph;
use crate::query::{DataQuery, DataResponse, QueryModel};
use crate::reply::Reply;

/// Decoder for one named command
pub type Handler = fn(&QueryModel, &dyn RedisClient) -> Result<Vec<Frame>>;

/// Commands taking one key and returning one scalar
pub const KEY_COMMANDS: &[&str] = &["type", "get", "ttl", "hlen", "xlen", "llen", "scard"];

fn handlers() -> &'static HashMap<&'static str, Handler> {
    static HANDLERS: OnceLock<HashMap<&'static str, Handler>> = OnceLock::new();
    HANDLERS.get_or_init(|| {
        let mut table: HashMap<&'static str, Handler> = HashMap::new();
        table.insert("graph.query", graph::query_graph);
        table.insert("graph.slowlog", graph::query_graph_slowlog);
        for &name in KEY_COMMANDS {
            table.insert(name, query_key_command);
        }
        table
    })
}

/// Names accepted in the `command` field, sorted
pub fn supported_commands() -> Vec<&'static str> {
    let mut names: Vec<_> = handlers().keys().copied().collect();
    names.sort_unstable();
    names
}

/// Execute one query and build its response. Never panics.
pub fn execute(query: &DataQuery, client: &dyn RedisClient) -> DataResponse {
    debug!(ref_id = %query.ref_id, json = %query.json, "QueryData");

    let qm: QueryModel = match serde_json::from_str(&query.json) {
        Ok(qm) => qm,
        Err(e) => return DataResponse::from_error(&QueryError::from(e)),
    };
    debug!(
        from = query.time_range.from,
        to = query.time_range.to,
        command = %qm.command,
        "time range"
    );

    match panic::catch_unwind(AssertUnwindSafe(|| dispatch(&qm, client))) {
        Ok(Ok(frames)) => DataResponse::with_frames(frames),
        Ok(Err(err)) if err.is_decoding_fault() => {
            error!(command = %command_label(&qm), error = %err, "failed to decode reply");
            DataResponse::empty()
        }
        Ok(Err(err)) => DataResponse::from_error(&err),
        Err(payload) => {
            error!(command = %command_label(&qm), panic = %panic_message(&*payload), "PANIC");
            DataResponse::empty()
        }
    }
}

fn dispatch(qm: &QueryModel, client: &dyn RedisClient) -> Result<Vec<Frame>> {
    if !qm.query.is_empty() {
        return query_custom_command(qm, client);
    }

    match handlers().get(qm.command.as_str()) {
        Some(handler) => handler(qm, client),
        None => {
            error!(
                command = %qm.command,
                supported = ?supported_commands(),
                "unsupported command"
            );
            Ok(Vec::new())
        }
    }
}

fn command_label(qm: &QueryModel) -> &str {
    if qm.query.is_empty() {
        &qm.command
    } else {
        qm.query.split_whitespace().next().unwrap_or_default()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

// ============================================================================
// Custom command
// ============================================================================

/// Run `qm.query` verbatim and map the reply generically.
pub fn query_custom_command(qm: &QueryModel, client: &dyn RedisClient) -> Result<Vec<Frame>> {
    let words = split_command_line(&qm.query)?;
    let (command, args) = words
        .split_first()
        .ok_or_else(|| QueryError::MalformedRequest("empty command".to_string()))?;
    let args: Vec<&str> = args.iter().map(String::as_str).collect();

    let reply = client.run_cmd(command, &args)?;
    Ok(vec![reply_to_frame(command, &reply)?])
}

/// Split a command line into words. Double or single quotes group words;
/// inside double quotes `\"` and `\\` are escapes.
pub fn split_command_line(line: &str) -> Result<Vec<String>> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(escaped @ ('"' | '\\')) => current.push(escaped),
                            Some(other) => {
                                current.push('\\');
                                current.push(other);
                            }
                            None => return Err(unterminated_quote()),
                        },
                        Some(other) => current.push(other),
                        None => return Err(unterminated_quote()),
                    }
                }
            }
            '\'' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(other) => current.push(other),
                        None => return Err(unterminated_quote()),
                    }
                }
            }
            c if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            c => {
                in_word = true;
                current.push(c);
            }
        }
    }
    if in_word {
        words.push(current);
    }
    Ok(words)
}

fn unterminated_quote() -> QueryError {
    QueryError::MalformedRequest("unterminated quote in command".to_string())
}

/// Generic mapping: scalar → one `Value` row, array → one row per element.
pub fn reply_to_frame(name: &str, reply: &Reply) -> std::result::Result<Frame, FrameError> {
    let mut frame = Frame::new(name);
    match reply {
        Reply::Int(n) => {
            frame.add_column("Value", FieldType::Int64)?;
            frame.append_row(vec![FieldValue::from(*n)])?;
        }
        Reply::Str(_) | Reply::Bytes(_) => {
            frame.add_column("Value", FieldType::String)?;
            frame.append_row(vec![FieldValue::from(reply.to_string())])?;
        }
        Reply::Array(items) => {
            frame.add_column("Value", FieldType::String)?;
            for item in items {
                frame.append_row(vec![FieldValue::from(item.to_string())])?;
            }
        }
        Reply::Nil => {
            frame.add_column("Value", FieldType::String)?;
        }
    }
    Ok(frame)
}

// ============================================================================
// Key commands
// ============================================================================

/// TYPE / GET / TTL / HLEN / XLEN / LLEN / SCARD <key>
pub fn query_key_command(qm: &QueryModel, client: &dyn RedisClient) -> Result<Vec<Frame>> {
    let reply = client.run_cmd(&qm.command, &[qm.key.as_str()])?;
    if reply.is_array() {
        return Err(ShapeError::new("scalar", reply.shape()).at(&qm.command).into());
    }
    Ok(vec![create_frame_value(&qm.key, reply.to_string())?])
}

fn create_frame_value(key: &str, value: String) -> std::result::Result<Frame, FrameError> {
    let mut frame = Frame::new(key);
    frame.add_column("Value", FieldType::String)?;
    frame.append_row(vec![FieldValue::from(value)])?;
    Ok(frame)
}
