//! Command discriminant

use super::constants::{EXCLUSIVE_PUBLISH_COMMAND, PUBLISH_COMMAND, SUBSCRIBE_COMMAND};

/// Command carried in the first byte of a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Deliver to every subscriber of the channel
    Publish,
    /// Deliver to exactly one subscriber of the channel
    ExclusivePublish,
    /// Register the sending connection on the channel.
    ///
    /// Server push frames reuse this tag.
    Subscribe,
}

impl Command {
    /// Parse a command byte, `None` for unknown values
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            PUBLISH_COMMAND => Some(Command::Publish),
            EXCLUSIVE_PUBLISH_COMMAND => Some(Command::ExclusivePublish),
            SUBSCRIBE_COMMAND => Some(Command::Subscribe),
            _ => None,
        }
    }

    /// Wire byte for this command
    pub fn as_u8(self) -> u8 {
        match self {
            Command::Publish => PUBLISH_COMMAND,
            Command::ExclusivePublish => EXCLUSIVE_PUBLISH_COMMAND,
            Command::Subscribe => SUBSCRIBE_COMMAND,
        }
    }

    /// Publish command for the requested delivery mode
    pub fn publish(exclusive: bool) -> Self {
        if exclusive {
            Command::ExclusivePublish
        } else {
            Command::Publish
        }
    }
}

impl From<Command> for u8 {
    fn from(command: Command) -> u8 {
        command.as_u8()
    }
}
