//! Production driver for the porter archive loader.
//!
//! `porter-core` is a pure state machine; something still has to execute its
//! actions against a real store and a real socket, and hand transport
//! notifications back in. That something is the [`Session`] here: it owns the
//! loader, an [`ArchiveStore`] backend, and a [`Transport`], and exposes the
//! engine-facing `submit`/`poll` surface.
//!
//! - [`RedbStore`]: persistent archive cache backed by `redb`.
//! - [`TcpTransport`] (feature `transport`): tokio TCP byte stream whose
//!   reader task forwards chunks into the session's event drain.
//!
//! [`ArchiveStore`]: porter_core::ArchiveStore
//! [`Transport`]: porter_core::Transport

pub mod session;
pub mod store;
#[cfg(feature = "transport")]
pub mod transport;

pub use session::Session;
pub use store::RedbStore;
#[cfg(feature = "transport")]
pub use transport::TcpTransport;
