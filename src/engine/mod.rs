//! Query engine access: record types and the REST client

pub mod client;
pub mod model;

pub use client::{EngineClient, EngineError, QuerySource};
pub use model::{ConnectorInfo, Input, Query, QueryState, Session};
