//! Wire format for the porter archive protocol.
//!
//! The channel is a strict request/response rendezvous: the client sends a
//! fixed 6-byte request packet and the server answers with exactly one
//! `[status][size][data]` response. Neither direction carries a request
//! identifier, so correlation is positional — at most one request may be on
//! the wire at a time, and that discipline is enforced one layer up in
//! `porter-core`.
//!
//! All multi-byte fields are big-endian. Fixed layouts use compile-time
//! verified `zerocopy` types rather than hand-rolled shifting, so an encoded
//! packet or record is correct by construction on any host.
//!
//! # Components
//!
//! - [`RequestPacket`]: the 6-byte archive request
//! - [`FrameDecoder`]: incremental response parser, tolerant of arbitrary
//!   chunk boundaries
//! - [`ResultRecord`]: the 32-byte shared-memory handoff record read by the
//!   sandboxed engine
#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod errors;
pub mod frame;
pub mod packet;
pub mod record;

pub use errors::{ProtocolError, Result};
pub use frame::{FrameDecoder, ResponseFrame, STATUS_OK};
pub use packet::{ArchiveKey, RequestPacket, REFERENCE_TABLE, REQUEST_CODE};
pub use record::{ResultRecord, RECORD_MAGIC};
