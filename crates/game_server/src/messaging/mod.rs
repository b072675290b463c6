//! Message encoding and decoding between wire text and script values.
//!
//! The gateway never interprets client payloads. It only converts a text frame
//! into an opaque [`ScriptValue`] on the way in, and back on the way out, through
//! a [`MessageCodec`].

pub mod codec;
pub mod value;

pub use codec::{CodecLimits, JsonCodec, MessageCodec};
pub use value::ScriptValue;
