//! Python `marshal` codec
//! ----------------------
//! Encoder and reference decoder for the stream format the sandbox process reads with
//! `marshal.load`. Result buffers are written as protocol version 2 in keys-are-buffers
//! mode: `{b"col": [v0, v1, ...], ...}`.
//!
//! The tag table in `codes` is a compatibility contract. The decoder exists so the
//! encoder can be checked against it and so the CLI and channel can read buffers back.

pub mod codes;
pub mod decode;
pub mod encode;
pub mod value;

pub use codes::MarshalVersion;
pub use decode::{loads, Unmarshaller};
pub use encode::{dumps, MarshalOptions, Marshaller};
pub use value::MarshalValue;

/// Maximum container nesting accepted by the encoder and decoder.
pub const MAX_DEPTH: usize = 256;
