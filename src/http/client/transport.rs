use std::{collections::HashMap, future::Future};

use crate::utils::error::Error;

/// Everything a transport needs for one outbound call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportCall {
    pub url: String,
    pub method: String,
    pub headers: HashMap<String, String>,
    pub body: String,
}

/// Raw result of a completed call.
///
/// The status line and header lines are handed back as one block, separate
/// from the body, so the response can split and parse them itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawResult {
    pub header_block: String,
    pub body: String,
}

impl RawResult {
    pub fn new<H: Into<String>, B: Into<String>>(header_block: H, body: B) -> Self {
        RawResult {
            header_block: header_block.into(),
            body: body.into(),
        }
    }

    /// Byte offset where the body starts in the combined message.
    pub fn header_size(&self) -> usize {
        self.header_block.len()
    }
}

/// Performs exactly one blocking (awaited) HTTP call.
///
/// HTTP error statuses are not failures here; only a failed network call
/// (DNS, connect, timeout, TLS) is reported as [`Error::Transport`]. Nothing is
/// retried.
pub trait Transport {
    fn execute(&self, call: TransportCall) -> impl Future<Output = Result<RawResult, Error>> + Send;
}
