//! redis-frames - Redis reply to typed frame translation
//!
//! Turns untyped reply trees (notably GRAPH.QUERY results) into named,
//! column-typed frames for visualization.
//!
//! Flow: [`dispatcher::execute`] parses a [`query::DataQuery`], runs the
//! store command through a [`client::RedisClient`], and hands the
//! [`reply::Reply`] to the decoder selected for the command.

pub mod client;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod frame;
pub mod graph;
pub mod query;
pub mod reply;
pub mod resp;
pub mod server;

pub use client::{RedisClient, TcpClient};
pub use dispatcher::execute;
pub use error::{ClientError, FrameError, QueryError, Result, ShapeError};
pub use frame::{Field, FieldType, FieldValue, Frame};
pub use graph::{EdgeEntry, NodeEntry};
pub use query::{DataQuery, DataResponse, QueryModel, TimeRange};
pub use reply::Reply;
