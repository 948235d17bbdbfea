use thiserror::Error;

/// Failures that let the dispatcher move on to the next client.
///
/// A client that reached the service and got a negative answer returns
/// `Ok(ClientResponse { success: false, .. })` instead.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{service} is not connected")]
    NotConnected { service: String },

    #[error("no endpoint configured for {service}")]
    NotConfigured { service: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("upstream returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("protocol error: {0}")]
    Protocol(String),

    /// The backing collaborator (e.g. the LLM behind the assistant) failed.
    #[error("service unavailable: {0}")]
    Unavailable(String),
}
