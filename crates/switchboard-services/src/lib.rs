pub mod client;
pub mod context;
pub mod error;
pub mod mcp;
pub mod rest;

pub use client::{ClientResponse, ServiceClient, ServiceRequest};
pub use context::ServiceContext;
pub use error::ClientError;
pub use mcp::McpClient;
pub use rest::RestClient;
