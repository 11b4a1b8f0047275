//! A bidirectional client<->backend tunnel, run to completion by a single
//! task spawned onto its owning Worker's `JoinSet`.

use tokio::net::TcpStream;

use crate::decoder::Decoder;
use crate::engine::buffer::OutboundBuffer;

/// Back-pressure state of one direction's outbound buffer: read interest on
/// the feeding socket is paused once the buffer crosses the high-water mark
/// and resumed once it drains back to the low-water mark.
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct InterestState {
    pub read_paused: bool,
}

pub struct Session {
    pub client: TcpStream,
    pub backend: TcpStream,

    /// Bytes read from the client, awaiting a write to the backend.
    pub client_to_backend: OutboundBuffer,
    /// Bytes read from the backend, awaiting a write to the client.
    pub backend_to_client: OutboundBuffer,

    pub client_interest: InterestState,
    pub backend_interest: InterestState,

    /// Per-session decoder state: prepared statements and portals never
    /// cross session boundaries.
    pub decoder: Decoder,
}

impl Session {
    pub fn new(client: TcpStream, backend: TcpStream) -> Self {
        Self {
            client,
            backend,
            client_to_backend: OutboundBuffer::new(),
            backend_to_client: OutboundBuffer::new(),
            client_interest: InterestState::default(),
            backend_interest: InterestState::default(),
            decoder: Decoder::new(),
        }
    }
}
