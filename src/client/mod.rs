//! # Data-access layer.
//!
//! - [`DataClient`]: async trait implemented by backend drivers;
//! - [`RetryClient`]: retrying CRUD facade with named presets;
//! - [`MemoryClient`]: in-process backend with failure injection.

mod data_client;
mod facade;
mod memory;

pub use data_client::{BackendError, DataClient, Envelope, Filter, FilterOp, Filters};
pub use facade::RetryClient;
pub use memory::{MemoryClient, RpcHandler};
