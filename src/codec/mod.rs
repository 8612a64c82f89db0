//! Codec module - serialization/deserialization for frame payloads.
//!
//! - [`MsgPackCodec`] - MessagePack using `rmp-serde` (`to_vec_named`, so
//!   records travel as maps the host can read by field name)
//!
//! # Example
//!
//! ```
//! use rpc_worker::codec::MsgPackCodec;
//! use serde_json::{json, Value};
//!
//! let encoded = MsgPackCodec::encode(&json!({"method": "add"})).unwrap();
//! let decoded: Value = MsgPackCodec::decode(&encoded).unwrap();
//! assert_eq!(decoded["method"], "add");
//! ```

mod msgpack;

pub use msgpack::MsgPackCodec;
