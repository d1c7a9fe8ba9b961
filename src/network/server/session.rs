//! Connected players and every send that goes to more than one of them.
//!
//! Nothing in here touches a socket while the caller holds the manager lock. Stream
//! frames are pushed onto a bounded per-session queue that a dedicated writer thread
//! drains. A session whose queue is full, or whose writer hits the write timeout, is
//! shut down; its peer thread then sees the closed stream and removes it. Player
//! states are collected into a [`StateBroadcast`] that is sent after the lock is
//! released.

use std::collections::{HashMap, HashSet};
use std::io;
use std::net::{Shutdown, SocketAddr, TcpStream, UdpSocket};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, error, info, warn};

use crate::error::RealmError;
use crate::network::protocol::{framing, Packet, PlayerAction, PlayerState, ProtocolError};

use super::player::Player;

/// Frames a session may have waiting for its writer before it counts as stalled.
pub const OUTBOUND_CAPACITY: usize = 256;
/// A single frame write that takes longer than this drops the session.
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// One encoded packet, shared between every recipient it is queued for.
type Frame = Arc<[u8]>;

pub struct PlayerSession {
    pub client_id: u16,
    pub name: String,
    pub player: Player,
    outbound: SyncSender<Frame>,
    writer: JoinHandle<()>,
    /// Kept for shutting the connection down; never written to directly.
    stream: TcpStream,
    udp_addr: Option<SocketAddr>,
    pending_actions: HashSet<PlayerAction>,
    pending_rotation: (f32, f32),
}

impl PlayerSession {
    pub fn udp_addr(&self) -> Option<SocketAddr> {
        self.udp_addr
    }

    /// Inputs and look deltas received since the last tick.
    pub fn take_pending(&mut self) -> (HashSet<PlayerAction>, (f32, f32)) {
        (
            std::mem::take(&mut self.pending_actions),
            std::mem::take(&mut self.pending_rotation),
        )
    }

    fn queue_frame(&self, frame: &Frame) -> Result<(), ProtocolError> {
        match self.outbound.try_send(Arc::clone(frame)) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                warn!(
                    "Client {} is not reading its stream, disconnecting it",
                    self.client_id
                );
                self.shutdown_stream();
                Err(io::Error::new(io::ErrorKind::WouldBlock, "outbound queue full").into())
            }
            Err(TrySendError::Disconnected(_)) => {
                Err(io::Error::new(io::ErrorKind::BrokenPipe, "stream writer stopped").into())
            }
        }
    }

    fn shutdown_stream(&self) {
        let _ = self.stream.shutdown(Shutdown::Both);
    }

    /// Lets the writer flush what is queued, then closes the stream.
    ///
    /// Call this after the session left the manager, never under its lock: it waits
    /// for the writer thread.
    pub fn close(self) {
        let PlayerSession {
            client_id,
            outbound,
            writer,
            stream,
            ..
        } = self;
        drop(outbound);
        if writer.join().is_err() {
            error!("Writer of client {} panicked", client_id);
        }
        let _ = stream.shutdown(Shutdown::Both);
    }
}

fn write_loop(mut stream: TcpStream, frames: Receiver<Frame>, client_id: u16) {
    for frame in frames {
        if let Err(err) = framing::write_frame(&mut stream, &frame) {
            warn!("Stream write to client {} failed: {}", client_id, err);
            let _ = stream.shutdown(Shutdown::Both);
            return;
        }
    }
}

/// Player-state datagrams and the addresses they go to, collected under the lock.
#[derive(Debug, Default)]
pub struct StateBroadcast {
    targets: Vec<SocketAddr>,
    datagrams: Vec<Vec<u8>>,
}

impl StateBroadcast {
    /// Number of datagrams `send` will attempt.
    pub fn len(&self) -> usize {
        self.targets.len() * self.datagrams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sends every state to every target, one datagram each.
    ///
    /// # Returns
    /// The number of datagrams that failed to send.
    pub fn send(&self, socket: &UdpSocket) -> usize {
        let mut failed = 0;
        for addr in &self.targets {
            for datagram in &self.datagrams {
                if let Err(err) = socket.send_to(datagram, addr) {
                    debug!("Failed to send state to {}: {}", addr, err);
                    failed += 1;
                }
            }
        }
        failed
    }
}

pub struct SessionManager {
    sessions: HashMap<u16, PlayerSession>,
    addresses: HashMap<SocketAddr, u16>,
    next_id: u16,
    outbound_capacity: usize,
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::with_outbound_capacity(OUTBOUND_CAPACITY)
    }
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// A manager whose sessions buffer at most `capacity` frames (minimum 1).
    pub fn with_outbound_capacity(capacity: usize) -> Self {
        SessionManager {
            sessions: HashMap::new(),
            addresses: HashMap::new(),
            next_id: 0,
            outbound_capacity: capacity.max(1),
        }
    }

    fn fresh_id(&mut self) -> u16 {
        while self.sessions.contains_key(&self.next_id) {
            self.next_id = self.next_id.wrapping_add(1);
        }
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        id
    }

    /// Registers a player that completed the handshake and starts its stream writer.
    ///
    /// # Returns
    /// The new session identifier. Fails when every `u16` is taken or the stream
    /// cannot be set up for writing.
    pub fn add_session(
        &mut self,
        name: String,
        stream: TcpStream,
        player: Player,
    ) -> Result<u16, RealmError> {
        if self.sessions.len() > u16::MAX as usize {
            return Err(RealmError::Handshake("no free client ids".to_owned()));
        }
        stream.set_write_timeout(Some(WRITE_TIMEOUT))?;
        let writer_stream = stream.try_clone()?;

        let client_id = self.fresh_id();
        let (outbound, frames) = sync_channel(self.outbound_capacity);
        let writer = thread::Builder::new()
            .name(format!("server-writer-{}", client_id))
            .spawn(move || write_loop(writer_stream, frames, client_id))?;

        info!("Player '{}' joined as client {}", name, client_id);
        self.sessions.insert(
            client_id,
            PlayerSession {
                client_id,
                name,
                player,
                outbound,
                writer,
                stream,
                udp_addr: None,
                pending_actions: HashSet::new(),
                pending_rotation: (0.0, 0.0),
            },
        );
        Ok(client_id)
    }

    /// Unregisters a player. The caller should `close` the returned session once the
    /// manager lock is released.
    pub fn remove_session(&mut self, client_id: u16) -> Option<PlayerSession> {
        let session = self.sessions.remove(&client_id)?;
        if let Some(addr) = session.udp_addr {
            self.addresses.remove(&addr);
        }
        info!("Player '{}' (client {}) left", session.name, client_id);
        Some(session)
    }

    pub fn get_session(&self, client_id: u16) -> Option<&PlayerSession> {
        self.sessions.get(&client_id)
    }

    pub fn sessions_mut(&mut self) -> impl Iterator<Item = &mut PlayerSession> {
        self.sessions.values_mut()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Remembers which datagram address belongs to a client.
    ///
    /// # Returns
    /// `false` if the client is unknown.
    pub fn register_address(&mut self, client_id: u16, addr: SocketAddr) -> bool {
        let Some(session) = self.sessions.get_mut(&client_id) else {
            return false;
        };
        if session.udp_addr != Some(addr) {
            if let Some(old) = session.udp_addr.replace(addr) {
                self.addresses.remove(&old);
            }
            self.addresses.insert(addr, client_id);
            debug!("Client {} sends datagrams from {}", client_id, addr);
        }
        true
    }

    pub fn client_for_address(&self, addr: SocketAddr) -> Option<u16> {
        self.addresses.get(&addr).copied()
    }

    pub fn queue_actions(&mut self, client_id: u16, actions: &[PlayerAction]) {
        if let Some(session) = self.sessions.get_mut(&client_id) {
            session.pending_actions.extend(actions.iter().copied());
        }
    }

    pub fn queue_rotation(&mut self, client_id: u16, yaw_delta: f32, pitch_delta: f32) {
        if let Some(session) = self.sessions.get_mut(&client_id) {
            session.pending_rotation.0 += yaw_delta;
            session.pending_rotation.1 += pitch_delta;
        }
    }

    /// Queues one packet for a single player's stream.
    pub fn send_to(&self, client_id: u16, packet: &Packet) -> Result<(), ProtocolError> {
        let frame: Frame = packet.encode()?.into();
        match self.sessions.get(&client_id) {
            Some(session) => session.queue_frame(&frame),
            None => Ok(()),
        }
    }

    /// Queues one packet for every player's stream.
    ///
    /// A failed send is logged and skipped; the others still go out.
    ///
    /// # Returns
    /// The number of players the packet could not be queued for.
    pub fn broadcast_packet(&self, packet: &Packet) -> Result<usize, ProtocolError> {
        let frame: Frame = packet.encode()?.into();
        Ok(self.broadcast_frame(&frame))
    }

    fn broadcast_frame(&self, frame: &Frame) -> usize {
        let mut failed = 0;
        for session in self.sessions.values() {
            if let Err(err) = session.queue_frame(frame) {
                warn!("Failed to send to client {}: {}", session.client_id, err);
                failed += 1;
            }
        }
        failed
    }

    pub fn player_states(&self) -> Vec<PlayerState> {
        self.sessions
            .values()
            .map(|session| session.player.state(session.client_id))
            .collect()
    }

    /// Encodes every player's state for every player with a known datagram address.
    /// The result is sent with [`StateBroadcast::send`] after the lock is released.
    pub fn state_broadcast(&self) -> StateBroadcast {
        let datagrams = self
            .player_states()
            .into_iter()
            .filter_map(|state| match Packet::PlayerState(state).encode() {
                Ok(bytes) => Some(bytes),
                Err(err) => {
                    warn!("Failed to encode state of client {}: {}", state.client_id, err);
                    None
                }
            })
            .collect();
        let targets = self
            .sessions
            .values()
            .filter_map(|session| session.udp_addr)
            .collect();
        StateBroadcast { targets, datagrams }
    }

    /// Closes every player's stream, unblocking their reader and writer threads.
    pub fn shutdown_all(&self) {
        for session in self.sessions.values() {
            session.shutdown_stream();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::Point3;
    use std::net::TcpListener;
    use web_time::Instant;

    fn stream_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (server, _) = listener.accept().unwrap();
        (server, client)
    }

    fn player() -> Player {
        Player::new(Point3::new(0.5, 10.0, 0.5))
    }

    #[test]
    fn test_ids_are_unique() {
        let mut manager = SessionManager::new();
        let (a, _keep_a) = stream_pair();
        let (b, _keep_b) = stream_pair();
        let first = manager.add_session("a".to_owned(), a, player()).unwrap();
        let second = manager.add_session("b".to_owned(), b, player()).unwrap();
        assert_ne!(first, second);
        assert_eq!(manager.len(), 2);
        assert_eq!(manager.get_session(second).unwrap().name, "b");
    }

    #[test]
    fn test_addresses_follow_sessions() {
        let mut manager = SessionManager::new();
        let (stream, _keep) = stream_pair();
        let id = manager.add_session("a".to_owned(), stream, player()).unwrap();
        let addr: SocketAddr = "127.0.0.1:4000".parse().unwrap();

        assert!(!manager.register_address(id.wrapping_add(1), addr));
        assert!(manager.register_address(id, addr));
        assert_eq!(manager.client_for_address(addr), Some(id));
        assert_eq!(manager.get_session(id).unwrap().udp_addr(), Some(addr));

        manager.remove_session(id).unwrap().close();
        assert_eq!(manager.client_for_address(addr), None);
        assert!(manager.get_session(id).is_none());
    }

    #[test]
    fn test_pending_input_accumulates_until_taken() {
        let mut manager = SessionManager::new();
        let (stream, _keep) = stream_pair();
        let id = manager.add_session("a".to_owned(), stream, player()).unwrap();

        manager.queue_actions(id, &[PlayerAction::Jump, PlayerAction::Jump]);
        manager.queue_actions(id, &[PlayerAction::Break]);
        manager.queue_rotation(id, 5.0, 1.0);
        manager.queue_rotation(id, 5.0, -3.0);

        let session = manager.sessions_mut().next().unwrap();
        let (actions, rotation) = session.take_pending();
        assert_eq!(actions.len(), 2);
        assert_eq!(rotation, (10.0, -2.0));
        assert_eq!(session.take_pending().0.len(), 0);
    }

    #[test]
    fn test_queued_frames_reach_the_peer_in_order() {
        let mut manager = SessionManager::new();
        let (stream, mut peer) = stream_pair();
        let id = manager.add_session("a".to_owned(), stream, player()).unwrap();

        let names = ["one", "two", "three"];
        for name in names {
            let packet = Packet::Connect {
                name: name.to_owned(),
            };
            assert_eq!(manager.broadcast_packet(&packet).unwrap(), 0);
        }
        for name in names {
            let frame = framing::read_frame(&mut peer, 1024).unwrap().unwrap();
            assert_eq!(
                Packet::decode(&frame).unwrap(),
                Packet::Connect {
                    name: name.to_owned()
                }
            );
        }

        manager.remove_session(id).unwrap().close();
        assert_matches::assert_matches!(framing::read_frame(&mut peer, 1024), Ok(None));
    }

    #[test]
    fn test_peer_that_never_reads_is_dropped_without_blocking() {
        let mut manager = SessionManager::with_outbound_capacity(4);
        let (stalled, _stalled_peer) = stream_pair();
        manager.add_session("stalled".to_owned(), stalled, player()).unwrap();

        let frame: Frame = Packet::Connect {
            name: "x".repeat(60_000),
        }
        .encode()
        .unwrap()
        .into();

        // Fill the socket buffers and then the queue; none of this may block.
        let start = Instant::now();
        let mut failed = 0;
        for _ in 0..10_000 {
            failed = manager.broadcast_frame(&frame);
            if failed > 0 {
                break;
            }
        }
        assert_eq!(failed, 1);
        assert!(start.elapsed() < Duration::from_secs(5));

        // Another session on the same manager is still served.
        let (live, mut live_peer) = stream_pair();
        let live_id = manager.add_session("live".to_owned(), live, player()).unwrap();
        manager
            .send_to(live_id, &Packet::Connect { name: "hi".to_owned() })
            .unwrap();
        let received = framing::read_frame(&mut live_peer, 1024).unwrap().unwrap();
        assert_eq!(
            Packet::decode(&received).unwrap(),
            Packet::Connect {
                name: "hi".to_owned()
            }
        );
    }

    #[test]
    fn test_state_broadcast_reaches_every_registered_address() {
        let mut manager = SessionManager::new();
        let server_socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        let receivers: Vec<UdpSocket> = (0..2).map(|_| UdpSocket::bind("127.0.0.1:0").unwrap()).collect();

        let mut keep = Vec::new();
        for (index, receiver) in receivers.iter().enumerate() {
            let (stream, peer) = stream_pair();
            keep.push(peer);
            let id = manager
                .add_session(format!("p{}", index), stream, player())
                .unwrap();
            manager.register_address(id, receiver.local_addr().unwrap());
        }

        let broadcast = manager.state_broadcast();
        assert_eq!(broadcast.len(), 4);
        assert_eq!(broadcast.send(&server_socket), 0);
        for receiver in &receivers {
            receiver
                .set_read_timeout(Some(Duration::from_secs(2)))
                .unwrap();
            let mut buffer = [0u8; 128];
            for _ in 0..2 {
                let (len, _) = receiver.recv_from(&mut buffer).unwrap();
                assert!(matches!(
                    Packet::decode(&buffer[..len]).unwrap(),
                    Packet::PlayerState(_)
                ));
            }
        }
    }
}
