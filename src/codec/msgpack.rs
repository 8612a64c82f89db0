//! MsgPack codec using `rmp-serde`.
//!
//! Always `to_vec_named`, never `to_vec`: `to_vec` writes structs as
//! positional arrays, and the host decodes requests and replies as maps.
//!
//! # Example
//!
//! ```
//! use rpc_worker::codec::MsgPackCodec;
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Serialize, Deserialize, PartialEq, Debug)]
//! struct Request {
//!     method: String,
//!     params: Vec<i32>,
//! }
//!
//! let req = Request { method: "sum".to_string(), params: vec![1, 2] };
//! let encoded = MsgPackCodec::encode(&req).unwrap();
//! let decoded: Request = MsgPackCodec::decode(&encoded).unwrap();
//! assert_eq!(decoded, req);
//! ```

use crate::error::Result;

/// MessagePack codec for structured payloads.
pub struct MsgPackCodec;

impl MsgPackCodec {
    /// Encode a value to MsgPack bytes (struct-as-map).
    ///
    /// # Errors
    ///
    /// Returns error if the value cannot be serialized.
    #[inline]
    pub fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(value)?)
    }

    /// Decode MsgPack bytes to a value.
    ///
    /// # Errors
    ///
    /// Returns error if the bytes cannot be deserialized to type T.
    #[inline]
    pub fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}
