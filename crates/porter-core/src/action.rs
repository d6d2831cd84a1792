//! Actions returned by the core state machines.
//!
//! The core never performs I/O. Instead its transitions return these
//! declarative actions; the driver (production session or test harness)
//! executes them and feeds any completions back in as events. Actions within
//! one returned batch must be executed in order.

use bytes::Bytes;
use porter_proto::ArchiveKey;

/// An intended effect produced by a state transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoaderAction {
    /// Write these bytes to the transport. Fire-and-forget: the core does not
    /// wait for a delivery acknowledgment.
    Send(Bytes),

    /// Look the key up in the archive store and report the outcome via
    /// `ArchiveLoader::cache_lookup_completed`.
    Lookup {
        /// Request the lookup belongs to.
        request_id: u32,
        /// Key to resolve.
        key: ArchiveKey,
    },

    /// Persist a fetched payload. Best-effort: a failure is logged by the
    /// driver and otherwise ignored.
    Store {
        /// Key the payload belongs to.
        key: ArchiveKey,
        /// Payload to persist.
        data: Bytes,
    },
}
