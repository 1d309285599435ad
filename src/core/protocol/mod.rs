// src/core/protocol/mod.rs

//! Wire-level pieces of the line protocol: framing, quoting, and reply decoding.

pub mod line_codec;
pub mod quote;
pub mod response;
pub use line_codec::LineCodec;
pub use quote::{is_identifier, quote};
pub use response::Response;
