use crate::frame::message_error::ErrorBody;
use crate::frame::Opcode;
use crate::types::{CInt, CShort};
use std::fmt::Display;
use std::io;
use std::net::SocketAddr;
use std::result;
use std::str::Utf8Error;
use std::string::FromUtf8Error;
use thiserror::Error as ThisError;

pub type Result<T> = result::Result<T, Error>;

/// Driver error type. Errors fall into two groups: errors returned by a server via `ERROR`
/// frames (`Server`) and errors raised within the driver itself, either while decoding frames or
/// while managing connections.
#[derive(Debug, ThisError)]
pub enum Error {
    /// Internal IO error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    /// General error
    #[error("General error: {0}")]
    General(String),
    /// Internal error that may be raised during `String::from_utf8`
    #[error("FromUtf8 error: {0}")]
    FromUtf8(#[from] FromUtf8Error),
    /// Internal error that may be raised during `str::from_utf8`
    #[error("Utf8 error: {0}")]
    Utf8(#[from] Utf8Error),
    /// Server error.
    #[error("Server {addr} error: {body}")]
    Server { body: ErrorBody, addr: SocketAddr },
    /// Timed out waiting for an operation to complete.
    #[error("Timeout: {0}")]
    Timeout(String),
    /// Unknown consistency.
    #[error("Unknown consistency: {0}")]
    UnknownConsistency(CShort),
    /// Unknown server event.
    #[error("Unknown server event: {0}")]
    UnknownServerEvent(String),
    /// Unexpected topology change event type.
    #[error("Unexpected topology change type: {0}")]
    UnexpectedTopologyChangeType(String),
    /// Unexpected status change event type.
    #[error("Unexpected status change type: {0}")]
    UnexpectedStatusChangeType(String),
    /// Unexpected schema change event type.
    #[error("Unexpected schema change type: {0}")]
    UnexpectedSchemaChangeType(String),
    /// The frame carries an opcode this codec cannot decode as a response.
    #[error("Unsupported opcode: {0}")]
    UnsupportedOpcode(Opcode),
    /// Unexpected result kind.
    #[error("Unexpected result kind: {0}")]
    UnexpectedResultKind(CInt),
    /// Column type which is known, but cannot be decoded.
    #[error("Unsupported column type: {0}")]
    UnsupportedColumnType(String),
    /// Unexpected startup response.
    #[error("Unexpected startup response: {0}")]
    UnexpectedStartupResponse(Opcode),
    /// The connection has not finished its handshake or is reconnecting.
    #[error("Connection to {0} is not ready")]
    NotReady(SocketAddr),
    /// All stream ids of a connection are in use.
    #[error("No available streams on connection to {0}")]
    NoAvailableStreams(SocketAddr),
    /// The connection was lost while the request was in flight.
    #[error("Client disconnected from {0}")]
    Disconnected(SocketAddr),
    /// No connection of the session is ready to take a request.
    #[error("No connections available")]
    NoConnectionsAvailable,
    /// None of the contact points accepted a connection.
    #[error("No live nodes to connect to")]
    NoLiveNodes,
}

pub fn column_is_empty_err<T: Display>(column_name: T) -> Error {
    Error::General(format!("Column '{column_name}' is empty"))
}

impl From<String> for Error {
    fn from(err: String) -> Error {
        Error::General(err)
    }
}

impl From<&str> for Error {
    fn from(err: &str) -> Error {
        Error::General(err.to_string())
    }
}
