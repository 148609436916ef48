//! Wire protocol for the BLE remote filesystem (BLEFS).
//!
//! Every exchange is a single request frame written to the filesystem
//! characteristic followed by one (or, for directory listings, several)
//! response notifications. All multi-byte integers are little-endian and
//! the command byte values are fixed by the watch firmware.
//!
//! Both directions of every frame are implemented: the client encodes
//! requests and decodes responses, while the firmware-side helpers
//! ([`Request::decode`] and the `encode` methods on responses) are used by
//! simulators and golden-frame tests.

pub mod constants;
mod cursor;
mod error;
pub mod path;
pub mod request;
pub mod response;

pub use constants::Command;
pub use error::ProtocolError;
pub use path::{clean_path, join_paths, wire_path};
pub use request::Request;
pub use response::{
    DeleteResponse, DirEntry, MkdirResponse, MoveResponse, ReadResponse, WriteResponse,
    expect_command,
};
