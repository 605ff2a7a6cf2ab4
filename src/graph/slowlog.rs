//! GRAPH.SLOWLOG reply → one frame
//!
//! Each row is `[timestamp, command, query, duration]`, all strings:
//! timestamp in epoch seconds, duration in microseconds.

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::client::RedisClient;
use crate::error::{Result, ShapeError};
use crate::frame::{FieldType, FieldValue, Frame};
use crate::query::QueryModel;
use crate::reply::Reply;

pub const SLOWLOG_FIELDS: usize = 4;

pub const DURATION_UNIT: &str = "µs";

pub fn decode_slowlog(reply: &Reply) -> Result<Frame> {
    let mut frame = Frame::new("GRAPH.SLOWLOG");
    frame.add_column("timestamp", FieldType::Time)?;
    frame.add_column("command", FieldType::String)?;
    frame.add_column("query", FieldType::String)?;
    frame.add_column("duration", FieldType::Float64)?.set_unit(DURATION_UNIT);

    let entries = reply.as_array().map_err(|e| e.at("slowlog"))?;
    for (i, entry) in entries.iter().enumerate() {
        let fields = entry.as_array().map_err(|e| e.at(&format!("slowlog.{}", i)))?;
        if fields.len() < SLOWLOG_FIELDS {
            let expected = format!("array of at least {}", SLOWLOG_FIELDS);
            return Err(ShapeError::new(expected, entry.shape())
                .at(&format!("slowlog.{}", i))
                .into());
        }
        let text = |j: usize| {
            fields[j]
                .as_text()
                .map_err(|e| e.at(&format!("slowlog.{}.{}", i, j)))
        };

        let timestamp = text(0)?;
        let seconds = timestamp.parse::<i64>().unwrap_or_else(|_| {
            warn!(value = %timestamp, "unparsable slowlog timestamp, using 0");
            0
        });
        let duration = text(3)?;
        let micros = duration.parse::<f64>().unwrap_or_else(|_| {
            warn!(value = %duration, "unparsable slowlog duration, using 0");
            0.0
        });

        frame.append_row(vec![
            FieldValue::from(DateTime::<Utc>::from_timestamp(seconds, 0).unwrap_or_default()),
            FieldValue::from(text(1)?.into_owned()),
            FieldValue::from(text(2)?.into_owned()),
            FieldValue::from(micros),
        ])?;
    }

    Ok(frame)
}

/// GRAPH.SLOWLOG <graph>
pub fn query_graph_slowlog(qm: &QueryModel, client: &dyn RedisClient) -> Result<Vec<Frame>> {
    let reply = client.run_cmd("GRAPH.SLOWLOG", &[qm.key.as_str()])?;
    Ok(vec![decode_slowlog(&reply)?])
}

#[cfg(test)]
mod slowlog_tests {
    use super::*;
    use crate::error::QueryError;

    fn row(values: &[&str]) -> Reply {
        Reply::Array(values.iter().map(|v| Reply::from(*v)).collect())
    }

    #[test]
    fn test_decode_slowlog_row() {
        let reply = Reply::Array(vec![row(&[
            "1620000000",
            "GRAPH.QUERY",
            "MATCH (n) RETURN n",
            "1234.5",
        ])]);
        let frame = decode_slowlog(&reply).unwrap();

        assert_eq!(frame.name, "GRAPH.SLOWLOG");
        assert_eq!(frame.rows(), 1);

        let times = frame.field("timestamp").unwrap().values().as_times().unwrap();
        assert_eq!(times[0].to_rfc3339(), "2021-05-03T00:00:00+00:00");
        assert_eq!(frame.field("command").unwrap().values().as_strings().unwrap(), ["GRAPH.QUERY"]);
        assert_eq!(
            frame.field("query").unwrap().values().as_strings().unwrap(),
            ["MATCH (n) RETURN n"]
        );

        let duration = frame.field("duration").unwrap();
        assert_eq!(duration.values().as_float64s().unwrap(), [1234.5]);
        assert_eq!(duration.unit(), Some("µs"));
    }

    #[test]
    fn test_decode_slowlog_empty() {
        let frame = decode_slowlog(&Reply::Array(vec![])).unwrap();
        assert_eq!(frame.rows(), 0);
        assert_eq!(frame.fields().len(), 4);
    }

    #[test]
    fn test_decode_slowlog_bad_numbers_default_to_zero() {
        let reply = Reply::Array(vec![row(&["yesterday", "GRAPH.QUERY", "q", "slow"])]);
        let frame = decode_slowlog(&reply).unwrap();

        let times = frame.field("timestamp").unwrap().values().as_times().unwrap();
        assert_eq!(times[0].timestamp(), 0);
        assert_eq!(frame.field("duration").unwrap().values().as_float64s().unwrap(), [0.0]);
    }

    #[test]
    fn test_decode_slowlog_short_row_is_shape_error() {
        let reply = Reply::Array(vec![row(&["1620000000", "GRAPH.QUERY"])]);
        let err = decode_slowlog(&reply).unwrap_err();
        assert!(matches!(err, QueryError::Shape(ref e) if e.path == "slowlog.0"));
    }

    #[test]
    fn test_decode_slowlog_integer_field_is_shape_error() {
        let reply = Reply::Array(vec![Reply::Array(vec![
            Reply::Int(1620000000),
            Reply::from("GRAPH.QUERY"),
            Reply::from("q"),
            Reply::from("1.0"),
        ])]);
        let err = decode_slowlog(&reply).unwrap_err();
        assert!(matches!(err, QueryError::Shape(ref e) if e.path == "slowlog.0.0"));
    }
}
