//! Frame - named table of homogeneously-typed columns
//!
//! Column types are fixed when a decoder builds the frame; rows are checked
//! against them on append. A rejected row leaves the frame untouched.
//!
//! # Example
//!
//! ```
//! use redis_frames::frame::{Frame, FieldType, FieldValue};
//!
//! let mut frame = Frame::new("nodes").with_visualization("nodeGraph");
//! frame.add_column("id", FieldType::String).unwrap();
//! frame.add_column("arc__", FieldType::Int64).unwrap();
//!
//! frame.append_row(vec![FieldValue::from("1"), FieldValue::from(1_i64)]).unwrap();
//! assert!(frame.append_row(vec![FieldValue::from(1_i64), FieldValue::from(1_i64)]).is_err());
//! assert_eq!(frame.rows(), 1);
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::FrameError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Int64,
    Float64,
    Time,
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FieldType::String => "string",
            FieldType::Int64 => "int64",
            FieldType::Float64 => "float64",
            FieldType::Time => "time",
        })
    }
}

/// One cell of a row being appended
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    String(String),
    Int64(i64),
    Float64(f64),
    Time(DateTime<Utc>),
}

impl FieldValue {
    pub fn field_type(&self) -> FieldType {
        match self {
            FieldValue::String(_) => FieldType::String,
            FieldValue::Int64(_) => FieldType::Int64,
            FieldValue::Float64(_) => FieldType::Float64,
            FieldValue::Time(_) => FieldType::Time,
        }
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::String(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::String(v.to_string())
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Int64(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float64(v)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(v: DateTime<Utc>) -> Self {
        FieldValue::Time(v)
    }
}

/// Column storage, one vector per element type
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValues {
    String(Vec<String>),
    Int64(Vec<i64>),
    Float64(Vec<f64>),
    Time(Vec<DateTime<Utc>>),
}

impl FieldValues {
    fn empty(field_type: FieldType) -> Self {
        match field_type {
            FieldType::String => FieldValues::String(Vec::new()),
            FieldType::Int64 => FieldValues::Int64(Vec::new()),
            FieldType::Float64 => FieldValues::Float64(Vec::new()),
            FieldType::Time => FieldValues::Time(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            FieldValues::String(v) => v.len(),
            FieldValues::Int64(v) => v.len(),
            FieldValues::Float64(v) => v.len(),
            FieldValues::Time(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn field_type(&self) -> FieldType {
        match self {
            FieldValues::String(_) => FieldType::String,
            FieldValues::Int64(_) => FieldType::Int64,
            FieldValues::Float64(_) => FieldType::Float64,
            FieldValues::Time(_) => FieldType::Time,
        }
    }

    /// Caller has already checked the type.
    fn push(&mut self, value: FieldValue) {
        match (self, value) {
            (FieldValues::String(v), FieldValue::String(x)) => v.push(x),
            (FieldValues::Int64(v), FieldValue::Int64(x)) => v.push(x),
            (FieldValues::Float64(v), FieldValue::Float64(x)) => v.push(x),
            (FieldValues::Time(v), FieldValue::Time(x)) => v.push(x),
            _ => unreachable!("field type checked before push"),
        }
    }

    pub fn as_strings(&self) -> Option<&[String]> {
        match self {
            FieldValues::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_int64s(&self) -> Option<&[i64]> {
        match self {
            FieldValues::Int64(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_float64s(&self) -> Option<&[f64]> {
        match self {
            FieldValues::Float64(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_times(&self) -> Option<&[DateTime<Utc>]> {
        match self {
            FieldValues::Time(v) => Some(v),
            _ => None,
        }
    }
}

/// Display settings for a column
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FieldConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    field_type: FieldType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<FieldConfig>,
    values: FieldValues,
}

impl Field {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            config: None,
            values: FieldValues::empty(field_type),
        }
    }

    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    pub fn values(&self) -> &FieldValues {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn set_unit(&mut self, unit: impl Into<String>) {
        self.config.get_or_insert_with(FieldConfig::default).unit = Some(unit.into());
    }

    pub fn unit(&self) -> Option<&str> {
        self.config.as_ref().and_then(|c| c.unit.as_deref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_visualization: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Frame {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<FrameMeta>,
    fields: Vec<Field>,
}

impl Frame {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            meta: None,
            fields: Vec::new(),
        }
    }

    /// Set the preferred visualization hint (e.g. `nodeGraph`)
    pub fn with_visualization(mut self, hint: impl Into<String>) -> Self {
        self.meta = Some(FrameMeta {
            preferred_visualization: Some(hint.into()),
        });
        self
    }

    /// Add a column. Columns can only be added while the frame has no rows.
    pub fn add_column(
        &mut self,
        name: impl Into<String>,
        field_type: FieldType,
    ) -> Result<&mut Field, FrameError> {
        let name = name.into();
        if self.rows() > 0 {
            return Err(FrameError::FrameNotEmpty(name));
        }
        self.fields.push(Field::new(name, field_type));
        let index = self.fields.len() - 1;
        Ok(&mut self.fields[index])
    }

    /// Append one row. Fails without modifying the frame if the row length
    /// differs from the column count or any value has the wrong type.
    pub fn append_row(&mut self, values: Vec<FieldValue>) -> Result<(), FrameError> {
        if values.len() != self.fields.len() {
            return Err(FrameError::ArityMismatch {
                expected: self.fields.len(),
                actual: values.len(),
            });
        }

        for (field, value) in self.fields.iter().zip(&values) {
            if field.field_type != value.field_type() {
                return Err(FrameError::TypeMismatch {
                    column: field.name.clone(),
                    expected: field.field_type,
                    actual: value.field_type(),
                });
            }
        }

        for (field, value) in self.fields.iter_mut().zip(values) {
            field.values.push(value);
        }
        Ok(())
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_mut(&mut self, name: &str) -> Option<&mut Field> {
        self.fields.iter_mut().find(|f| f.name == name)
    }

    /// Number of rows (all columns have equal length)
    pub fn rows(&self) -> usize {
        self.fields.first().map(Field::len).unwrap_or(0)
    }

    pub fn preferred_visualization(&self) -> Option<&str> {
        self.meta.as_ref().and_then(|m| m.preferred_visualization.as_deref())
    }
}

#[cfg(test)]
mod frame_tests {
    use super::*;

    fn sample_frame() -> Frame {
        let mut frame = Frame::new("GRAPH.SLOWLOG");
        frame.add_column("timestamp", FieldType::Time).unwrap();
        frame.add_column("command", FieldType::String).unwrap();
        frame.add_column("duration", FieldType::Float64).unwrap();
        frame
    }

    #[test]
    fn test_new_frame_is_empty() {
        let frame = Frame::new("nodes");
        assert_eq!(frame.name, "nodes");
        assert!(frame.meta.is_none());
        assert_eq!(frame.rows(), 0);
        assert!(frame.fields().is_empty());
    }

    #[test]
    fn test_visualization_hint() {
        let frame = Frame::new("edges").with_visualization("nodeGraph");
        assert_eq!(frame.preferred_visualization(), Some("nodeGraph"));
    }

    #[test]
    fn test_append_row_in_order() {
        let mut frame = sample_frame();
        let ts = DateTime::from_timestamp(1_620_000_000, 0).unwrap();
        frame
            .append_row(vec![ts.into(), "GRAPH.QUERY".into(), 12.5.into()])
            .unwrap();
        frame
            .append_row(vec![ts.into(), "GRAPH.EXPLAIN".into(), 3.0.into()])
            .unwrap();

        assert_eq!(frame.rows(), 2);
        let commands = frame.field("command").unwrap().values().as_strings().unwrap();
        assert_eq!(commands, ["GRAPH.QUERY", "GRAPH.EXPLAIN"]);
        let durations = frame.field("duration").unwrap().values().as_float64s().unwrap();
        assert_eq!(durations, [12.5, 3.0]);
    }

    #[test]
    fn test_append_row_type_mismatch_leaves_frame_untouched() {
        let mut frame = sample_frame();
        let ts = DateTime::from_timestamp(0, 0).unwrap();
        let err = frame
            .append_row(vec![ts.into(), "GRAPH.QUERY".into(), "slow".into()])
            .unwrap_err();

        assert_eq!(
            err,
            FrameError::TypeMismatch {
                column: "duration".to_string(),
                expected: FieldType::Float64,
                actual: FieldType::String,
            }
        );
        assert_eq!(frame.rows(), 0);
        assert!(frame.fields().iter().all(|f| f.is_empty()));
    }

    #[test]
    fn test_append_row_arity_mismatch() {
        let mut frame = sample_frame();
        let err = frame.append_row(vec!["only".into()]).unwrap_err();
        assert_eq!(
            err,
            FrameError::ArityMismatch {
                expected: 3,
                actual: 1
            }
        );
    }

    #[test]
    fn test_add_column_after_rows_rejected() {
        let mut frame = Frame::new("value");
        frame.add_column("Value", FieldType::Int64).unwrap();
        frame.append_row(vec![5_i64.into()]).unwrap();

        let err = frame.add_column("extra", FieldType::String).unwrap_err();
        assert_eq!(err, FrameError::FrameNotEmpty("extra".to_string()));
        assert_eq!(frame.fields().len(), 1);
    }

    #[test]
    fn test_field_unit() {
        let mut frame = sample_frame();
        frame.field_mut("duration").unwrap().set_unit("µs");
        assert_eq!(frame.field("duration").unwrap().unit(), Some("µs"));
        assert_eq!(frame.field("command").unwrap().unit(), None);
    }

    #[test]
    fn test_serialized_shape() {
        let mut frame = Frame::new("nodes").with_visualization("nodeGraph");
        frame.add_column("id", FieldType::String).unwrap();
        frame.add_column("arc__", FieldType::Int64).unwrap();
        frame.append_row(vec!["7".into(), 1_i64.into()]).unwrap();

        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "name": "nodes",
                "meta": { "preferredVisualization": "nodeGraph" },
                "fields": [
                    { "name": "id", "type": "string", "values": ["7"] },
                    { "name": "arc__", "type": "int64", "values": [1] }
                ]
            })
        );
    }
}
