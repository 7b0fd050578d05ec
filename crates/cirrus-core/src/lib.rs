//! Resilient request-execution core for cloud storage and secrets clients:
//! retry policy, primary/secondary failover, continuation-token pagination
//! and long-running operation polling over a pluggable transport.

pub mod config;
pub mod logging;

pub mod control;
pub mod engine;
pub mod error;
pub mod location;
pub mod lro;
pub mod retry;
pub mod segmented;
pub mod transport;

pub use control::OperationControl;
pub use engine::{Engine, Executed, ExecutionSummary, OperationDescriptor, OperationMeta};
pub use error::{Error, Result, ServiceError};
pub use location::{AccessKind, Endpoints, LocationMode, StorageLocation};
pub use lro::{JobFailure, JobHandle, JobStatus, LroState, Poller};
pub use retry::RetryPolicy;
pub use segmented::{ContinuationToken, Page, PageRequest, PageResponse, Segmented};
