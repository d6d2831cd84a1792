//! Scenario world: a loader wired to simulated collaborators.

use porter_core::{ArchiveLoader, ArchiveStore, LoaderAction, LoaderConfig, Transport};
use porter_proto::ArchiveKey;

use crate::{
    sim_heap::SimHeap,
    sim_server::SimServer,
    sim_store::MemoryStore,
    sim_transport::{Chunker, SimTransport},
};

/// A complete simulated deployment: loader, store, transport, server, heap.
///
/// Drives the core exactly the way the production session does — drain
/// events, let the loader react, execute the actions — but with every
/// collaborator inspectable and every byte movement under test control.
/// Server responses are only produced when a test asks for them, so the
/// world between calls is frozen and assertable.
#[derive(Debug)]
pub struct SimWorld {
    /// The core under test.
    pub loader: ArchiveLoader,
    /// Archive cache.
    pub store: MemoryStore,
    /// Byte channel to the server.
    pub transport: SimTransport,
    /// The far end of the channel.
    pub server: SimServer,
    /// Shared region results are materialized into.
    pub heap: SimHeap,
    chunker: Chunker,
}

impl SimWorld {
    /// Connected world; chunk boundaries derive from `seed`.
    pub fn new(seed: u64) -> Self {
        let mut world = Self::disconnected(seed);
        world.connect();
        world
    }

    /// World whose channel has not opened yet.
    pub fn disconnected(seed: u64) -> Self {
        Self {
            loader: ArchiveLoader::new(),
            store: MemoryStore::new(),
            transport: SimTransport::new(),
            server: SimServer::new(),
            heap: SimHeap::roomy(),
            chunker: Chunker::new(seed),
        }
    }

    /// World with an explicit loader configuration.
    pub fn with_config(seed: u64, config: LoaderConfig) -> Self {
        let mut world = Self::disconnected(seed);
        world.loader = ArchiveLoader::with_config(config);
        world.connect();
        world
    }

    /// Open the channel and let the loader observe it.
    pub fn connect(&mut self) {
        self.transport.open();
        self.pump();
    }

    /// Close the channel and let the loader observe it.
    pub fn disconnect(&mut self) {
        self.transport.close();
        self.pump();
    }

    /// Engine-side submit.
    pub fn submit(&mut self, request_id: u32, table_id: u8, archive_id: u32) {
        self.pump();
        let actions = self.loader.submit(request_id, table_id, archive_id);
        self.run(actions);
    }

    /// Engine-side poll; returns the contract codes `-1`/`0`/`1`.
    pub fn poll(&mut self, dest: u32, request_id: u32) -> i32 {
        self.pump();
        match self.loader.poll(&mut self.heap, dest, request_id) {
            Ok(outcome) => outcome.code(),
            // Same policy as the production driver: a heap failure is
            // "not ready yet", the entry survives.
            Err(_) => 0,
        }
    }

    /// Drain transport notifications into the loader.
    pub fn pump(&mut self) {
        loop {
            let events = self.transport.drain();
            if events.is_empty() {
                return;
            }
            for event in events {
                let actions = self.loader.on_transport_event(event);
                self.run(actions);
            }
        }
    }

    /// Let the server answer every request packet currently on the wire,
    /// delivering each response in seeded random chunks.
    ///
    /// Returns how many responses were delivered. Answering may put the next
    /// queued request on the wire; call again to keep the conversation going.
    pub fn answer_requests(&mut self) -> porter_proto::Result<usize> {
        let packets = self.transport.take_sent();
        let answered = packets.len();
        for packet in packets {
            let response = self.server.respond_to(&packet)?;
            self.transport.deliver_chunked(&response, &mut self.chunker);
        }
        self.pump();
        Ok(answered)
    }

    /// Answer until the wire falls silent.
    pub fn settle(&mut self) -> porter_proto::Result<()> {
        while self.answer_requests()? > 0 {}
        Ok(())
    }

    /// Packets sent over the channel's lifetime.
    pub fn wire_sends(&self) -> usize {
        self.transport.total_sends()
    }

    /// Make the server hold an archive.
    pub fn publish(&mut self, table_id: u8, archive_id: u32, data: &[u8]) {
        self.server.insert(ArchiveKey::new(table_id, archive_id), data);
    }

    /// Seed the local cache directly.
    pub fn cache(&mut self, table_id: u8, archive_id: u32, data: &[u8]) {
        self.store.insert(ArchiveKey::new(table_id, archive_id), data);
    }

    fn run(&mut self, actions: Vec<LoaderAction>) {
        let mut work: std::collections::VecDeque<LoaderAction> = actions.into();
        while let Some(action) = work.pop_front() {
            match action {
                LoaderAction::Send(packet) => {
                    // Mirrors the production driver: a failed send is left
                    // for the Closed event to clean up.
                    let _ = self.transport.send(&packet);
                }
                LoaderAction::Lookup { request_id, key } => {
                    let cached = self.store.lookup(key).ok().flatten();
                    work.extend(self.loader.cache_lookup_completed(request_id, cached));
                }
                LoaderAction::Store { key, data } => {
                    let _ = self.store.store(key, &data);
                }
            }
        }
    }
}
