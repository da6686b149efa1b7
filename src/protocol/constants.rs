//! Protocol constants
//!
//! Frame layout (all integers big-endian):
//!
//! ```text
//! +---------+----------------+--------------------+-----------------+
//! | command | payload length | channel identifier | payload         |
//! | 1 byte  | 8 bytes (u64)  | 128 bytes          | length bytes    |
//! +---------+----------------+--------------------+-----------------+
//! ```

/// Size of the command discriminant
pub const COMMAND_SIZE: usize = 1;

/// Size of the big-endian payload length field
pub const PAYLOAD_LENGTH_SIZE: usize = 8;

/// Size of the zero-padded channel identifier slot
pub const IDENTIFIER_SIZE: usize = 128;

/// Total header size preceding every payload
pub const HEADER_SIZE: usize = COMMAND_SIZE + PAYLOAD_LENGTH_SIZE + IDENTIFIER_SIZE;

/// Broadcast publish
pub const PUBLISH_COMMAND: u8 = b'p';

/// Publish to a single least-recently-served subscriber
pub const EXCLUSIVE_PUBLISH_COMMAND: u8 = b'e';

/// Subscribe, and the tag on server push frames
pub const SUBSCRIBE_COMMAND: u8 = b's';

/// Listen/connect address used when none is configured
pub const DEFAULT_ADDRESS: &str = "localhost:9261";

/// Size of each socket read
pub const DEFAULT_READ_BUFFER_SIZE: usize = 32 * 1024;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_size() {
        assert_eq!(HEADER_SIZE, 137);
    }
}
