//! Deterministic simulation harness for the porter archive loader.
//!
//! In-process implementations of every collaborator the core needs — store,
//! transport, server, shared heap — plus a [`SimWorld`] that wires them to an
//! [`ArchiveLoader`](porter_core::ArchiveLoader) exactly the way the
//! production session does. Chunk boundaries, failure injection, and event
//! ordering are all under test control, and every random choice flows from a
//! caller-supplied seed.

pub mod sim_heap;
pub mod sim_server;
pub mod sim_store;
pub mod sim_transport;
pub mod world;

pub use sim_heap::SimHeap;
pub use sim_server::SimServer;
pub use sim_store::MemoryStore;
pub use sim_transport::{Chunker, SimTransport};
pub use world::SimWorld;
