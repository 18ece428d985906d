//! Transport seams
//!
//! A `Connector` opens fresh connections; each connection is a
//! `MessageSource` yielding complete messages until it closes. Nothing is
//! carried over from one connection to the next.

use std::future::Future;

use colis_core::ColisResult;
use colis_wire::InboundMessage;

/// One live connection
pub trait MessageSource: Send {
    /// Next complete message.
    ///
    /// `None` means the peer closed the connection; `Some(Err(_))` is a
    /// transport fault. Either ends the connection.
    fn next_message(&mut self) -> impl Future<Output = Option<ColisResult<InboundMessage>>> + Send;

    /// Close the connection (best effort)
    fn close(&mut self) -> impl Future<Output = ()> + Send;
}

/// Factory for connections
pub trait Connector: Send + Sync + 'static {
    type Source: MessageSource + 'static;

    fn connect(&self) -> impl Future<Output = ColisResult<Self::Source>> + Send;

    /// Human-readable endpoint, for logs
    fn endpoint(&self) -> String;
}
