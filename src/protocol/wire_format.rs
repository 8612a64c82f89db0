//! Wire format encoding and decoding.
//!
//! Implements the 9-byte header format of the framed queue transport:
//! ```text
//! ┌───────┬────────────────┬──────────┐
//! │ Flags │ Correlation ID │ Length   │
//! │ 1 byte│ 4 bytes        │ 4 bytes  │
//! │       │ uint32 BE      │ uint32 BE│
//! └───────┴────────────────┴──────────┘
//! ```
//!
//! All multi-byte integers are Big Endian. The payload that follows is a
//! MsgPack document.

use crate::error::{Result, WorkerError};

/// Header size in bytes (fixed, exactly 9).
pub const HEADER_SIZE: usize = 9;

/// Default maximum payload size (64 MiB).
pub const DEFAULT_MAX_PAYLOAD_SIZE: u32 = 64 * 1024 * 1024;

/// Flag constants for the protocol.
pub mod flags {
    /// Message type: reply (1) or request (0).
    pub const IS_RESPONSE: u8 = 0b0000_0001;
    /// Error flag: failed outcome (1) or ok (0).
    pub const IS_ERROR: u8 = 0b0000_0010;

    /// Reserved bits mask (bits 2-7).
    pub const RESERVED_MASK: u8 = 0b1111_1100;

    /// Check if a specific flag is set.
    #[inline]
    pub fn has_flag(flags: u8, flag: u8) -> bool {
        flags & flag != 0
    }

    /// Successful reply.
    pub const RESPONSE: u8 = IS_RESPONSE;
    /// Failed reply.
    pub const ERROR_RESPONSE: u8 = IS_RESPONSE | IS_ERROR;
}

/// Decoded header from wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Flags byte (see `flags` module).
    pub flags: u8,
    /// Pairs a reply with its request.
    pub correlation_id: u32,
    /// Payload length in bytes.
    pub payload_length: u32,
}

impl Header {
    /// Create a new header.
    pub fn new(flags: u8, correlation_id: u32, payload_length: u32) -> Self {
        Self {
            flags,
            correlation_id,
            payload_length,
        }
    }

    /// Request header.
    pub fn request(correlation_id: u32, payload_length: u32) -> Self {
        Self::new(0, correlation_id, payload_length)
    }

    /// Reply header; `ok` selects between the two response flag sets.
    pub fn reply(correlation_id: u32, ok: bool, payload_length: u32) -> Self {
        let flags = if ok {
            flags::RESPONSE
        } else {
            flags::ERROR_RESPONSE
        };
        Self::new(flags, correlation_id, payload_length)
    }

    /// Encode header to bytes (Big Endian).
    ///
    /// # Example
    ///
    /// ```
    /// use rpc_worker::protocol::{Header, flags};
    ///
    /// let header = Header::new(flags::RESPONSE, 42, 100);
    /// let bytes = header.encode();
    /// assert_eq!(bytes.len(), 9);
    /// ```
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0] = self.flags;
        buf[1..5].copy_from_slice(&self.correlation_id.to_be_bytes());
        buf[5..9].copy_from_slice(&self.payload_length.to_be_bytes());
        buf
    }

    /// Decode header from bytes (Big Endian).
    ///
    /// Returns `None` if buffer is too short.
    ///
    /// # Example
    ///
    /// ```
    /// use rpc_worker::protocol::Header;
    ///
    /// let bytes = [0x01, 0, 0, 0, 42, 0, 0, 0, 100];
    /// let header = Header::decode(&bytes).unwrap();
    /// assert_eq!(header.correlation_id, 42);
    /// assert_eq!(header.payload_length, 100);
    /// ```
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < HEADER_SIZE {
            return None;
        }
        Some(Self {
            flags: buf[0],
            correlation_id: u32::from_be_bytes([buf[1], buf[2], buf[3], buf[4]]),
            payload_length: u32::from_be_bytes([buf[5], buf[6], buf[7], buf[8]]),
        })
    }

    /// Validate the header for protocol compliance.
    ///
    /// Checks:
    /// - Payload length doesn't exceed max
    /// - Reserved flag bits are 0
    pub fn validate(&self, max_payload_size: u32) -> Result<()> {
        if self.payload_length > max_payload_size {
            return Err(WorkerError::Protocol(format!(
                "Payload size {} exceeds maximum {}",
                self.payload_length, max_payload_size
            )));
        }

        if self.flags & flags::RESERVED_MASK != 0 {
            return Err(WorkerError::Protocol(
                "Reserved flag bits must be 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Check if this is a reply.
    #[inline]
    pub fn is_response(&self) -> bool {
        flags::has_flag(self.flags, flags::IS_RESPONSE)
    }

    /// Check if this is an error reply.
    #[inline]
    pub fn is_error(&self) -> bool {
        flags::has_flag(self.flags, flags::IS_ERROR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_big_endian_byte_order() {
        let header = Header::new(0x03, 0x01020304, 0x05060708);
        let bytes = header.encode();

        assert_eq!(bytes, [0x03, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08]);
        assert_eq!(Header::decode(&bytes), Some(header));
    }

    #[test]
    fn test_decode_too_short_buffer() {
        let buf = [0u8; HEADER_SIZE - 1];
        assert!(Header::decode(&buf).is_none());
    }

    #[test]
    fn test_validate_payload_too_large() {
        let header = Header::request(1, 1_000_000);
        let result = header.validate(100);
        assert!(result.unwrap_err().to_string().contains("exceeds maximum"));
    }

    #[test]
    fn test_validate_reserved_bits_must_be_zero() {
        let header = Header::new(0b1000_0000, 1, 0);
        let result = header.validate(DEFAULT_MAX_PAYLOAD_SIZE);
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Reserved flag bits"));
    }

    #[test]
    fn test_reply_flags() {
        let ok = Header::reply(7, true, 0);
        assert!(ok.is_response());
        assert!(!ok.is_error());

        let failed = Header::reply(7, false, 0);
        assert!(failed.is_response());
        assert!(failed.is_error());
        assert_eq!(failed.flags, 0x03);

        assert!(!Header::request(7, 0).is_response());
    }
}
