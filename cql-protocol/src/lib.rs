//! A CQL native protocol v2 codec.
//! Built in coordination with cql-driver, but does no I/O of its own: it translates between
//! wire bytes and typed requests/responses, so it can back any transport.

pub mod frame;
pub mod types;

pub mod consistency;
pub mod error;

pub type Error = error::Error;
pub type Result<T> = error::Result<T>;
