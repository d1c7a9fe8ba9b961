//! # Server
//!
//! The authoritative side of the realm. `Server::start` binds a stream listener and a
//! datagram socket and runs four kinds of threads over two shared resources:
//!
//! * the accept thread, which spawns one peer thread per connection;
//! * peer threads, which do the handshake and answer chunk requests;
//! * the datagram thread, which receives movement input and head rotation;
//! * the tick thread, which applies queued input, re-broadcasts edited chunks and
//!   sends every player's state to every player.
//!
//! ## Locking
//!
//! The tick thread takes the session lock and then the world lock. Peer threads never
//! hold the world lock while taking the session lock. No socket is written under either
//! lock: stream frames go through each session's writer thread (see [`session`]) and
//! player-state datagrams are sent after the tick releases both locks.

use std::collections::{BTreeSet, HashSet};
use std::io;
use std::net::{IpAddr, Ipv4Addr, Shutdown, SocketAddr, TcpListener, TcpStream, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use cgmath::Point3;
use log::{debug, error, info, warn};
use web_time::Instant;

use crate::config::{RealmConfig, TerrainSettings};
use crate::core::MtResource;
use crate::error::RealmError;
use crate::network::protocol::{framing, Packet, PlayerAction, ProtocolError};
use crate::voxels::block::block_type::VoxelType;
use crate::voxels::chunk::ChunkCoords;
use crate::voxels::generation::TerrainGenerator;
use crate::voxels::world::World;

pub mod player;
pub mod session;

use player::{raycast, Player, REACH};
use session::{SessionManager, StateBroadcast};

const DATAGRAM_POLL: Duration = Duration::from_millis(100);
const MAX_DATAGRAM: usize = 1500;

/// Everything [`Server::start`] needs, usually built with [`ServerOptions::from_config`].
#[derive(Clone, Debug)]
pub struct ServerOptions {
    /// Interface both sockets bind to.
    pub address: String,
    /// `0` binds an ephemeral port.
    pub tcp_port: u16,
    pub udp_port: u16,
    /// Simulation steps per second.
    pub tick_rate: u32,
    /// Largest stream payload accepted or sent, in bytes.
    pub max_frame_len: u32,
    pub terrain: TerrainSettings,
    pub world_seed: u32,
}

impl ServerOptions {
    /// Picks a random world seed when the configuration leaves it unset.
    pub fn from_config(config: &RealmConfig) -> Self {
        let world_seed = match config.terrain.world_seed {
            Some(seed) => seed,
            None => {
                let seed = fastrand::u32(..);
                info!("No world seed configured, using {}", seed);
                seed
            }
        };
        ServerOptions {
            address: config.network.address.clone(),
            tcp_port: config.network.tcp_port,
            udp_port: config.network.udp_port,
            tick_rate: config.network.tick_rate,
            max_frame_len: config.network.max_frame_len,
            terrain: config.terrain.clone(),
            world_seed,
        }
    }
}

/// State shared by every server thread.
#[derive(Clone)]
struct Shared {
    world: MtResource<World>,
    sessions: MtResource<SessionManager>,
    shutdown: Arc<AtomicBool>,
    max_frame_len: u32,
}

impl Shared {
    fn running(&self) -> bool {
        !self.shutdown.load(Ordering::Acquire)
    }
}

/// Entry point of the server role. See [`Server::start`].
pub struct Server;

impl Server {
    /// Binds both sockets and spawns the server threads.
    ///
    /// The terrain settings and the frame limit are validated first, so a bad
    /// configuration fails here instead of in a peer thread.
    pub fn start(options: ServerOptions) -> Result<ServerHandle, RealmError> {
        options.terrain.validate()?;
        options.terrain.check_frame_limit(options.max_frame_len)?;
        let listener = TcpListener::bind((options.address.as_str(), options.tcp_port))?;
        let udp = UdpSocket::bind((options.address.as_str(), options.udp_port))?;
        udp.set_read_timeout(Some(DATAGRAM_POLL))?;
        let tcp_addr = listener.local_addr()?;
        let udp_addr = udp.local_addr()?;
        info!("Listening for streams on {}", tcp_addr);
        info!("Listening for datagrams on {}", udp_addr);

        let generator = TerrainGenerator::new(options.terrain.clone(), options.world_seed);
        let shared = Shared {
            world: MtResource::new(World::new(generator)),
            sessions: MtResource::new(SessionManager::new()),
            shutdown: Arc::new(AtomicBool::new(false)),
            max_frame_len: options.max_frame_len,
        };
        let peers: MtResource<Vec<PeerThread>> = MtResource::new(Vec::new());

        let udp = Arc::new(udp);
        let tick_period = Duration::from_secs_f64(1.0 / options.tick_rate.max(1) as f64);

        let threads = vec![
            spawn_named("accept", {
                let shared = shared.clone();
                let peers = peers.clone();
                move || accept_loop(listener, shared, peers)
            })?,
            spawn_named("datagram", {
                let shared = shared.clone();
                let udp = Arc::clone(&udp);
                move || datagram_loop(&udp, shared)
            })?,
            spawn_named("tick", {
                let shared = shared.clone();
                let udp = Arc::clone(&udp);
                move || tick_loop(&udp, shared, tick_period)
            })?,
        ];

        Ok(ServerHandle {
            tcp_addr,
            udp_addr,
            shared,
            peers,
            threads,
        })
    }
}

fn spawn_named<F>(name: &str, body: F) -> io::Result<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    thread::Builder::new()
        .name(format!("server-{}", name))
        .spawn(body)
}

struct PeerThread {
    stream: TcpStream,
    thread: JoinHandle<()>,
}

/// A running server. Dropping it leaves the threads running; call
/// [`ServerHandle::shutdown`] to stop them.
pub struct ServerHandle {
    tcp_addr: SocketAddr,
    udp_addr: SocketAddr,
    shared: Shared,
    peers: MtResource<Vec<PeerThread>>,
    threads: Vec<JoinHandle<()>>,
}

impl ServerHandle {
    /// Address the stream listener is bound to, with the real port when `0` was asked for.
    pub fn tcp_addr(&self) -> SocketAddr {
        self.tcp_addr
    }

    pub fn udp_addr(&self) -> SocketAddr {
        self.udp_addr
    }

    /// The authoritative chunk store.
    pub fn world(&self) -> MtResource<World> {
        self.shared.world.clone()
    }

    /// Players that completed the handshake and have not left yet.
    pub fn player_count(&self) -> usize {
        self.shared.sessions.get().len()
    }

    /// Stops every thread and waits for them to exit.
    pub fn shutdown(mut self) {
        info!("Shutting down server");
        self.shared.shutdown.store(true, Ordering::Release);

        // Wake the accept thread out of its blocking accept.
        let mut wake_addr = self.tcp_addr;
        if wake_addr.ip().is_unspecified() {
            wake_addr.set_ip(IpAddr::V4(Ipv4Addr::LOCALHOST));
        }
        let _ = TcpStream::connect(wake_addr);

        for handle in self.threads.drain(..) {
            join_logged(handle);
        }
        self.shared.sessions.get().shutdown_all();

        // The accept thread is gone, so the peer list can no longer grow.
        let peers = std::mem::take(&mut *self.peers.get_mut());
        for peer in &peers {
            let _ = peer.stream.shutdown(Shutdown::Both);
        }
        for peer in peers {
            join_logged(peer.thread);
        }
        info!("Server stopped");
    }

    /// Blocks until the server threads exit on their own.
    pub fn wait(mut self) {
        for handle in self.threads.drain(..) {
            join_logged(handle);
        }
    }
}

fn join_logged(handle: JoinHandle<()>) {
    let name = handle.thread().name().unwrap_or("server").to_owned();
    if handle.join().is_err() {
        error!("Thread {} panicked", name);
    }
}

fn accept_loop(listener: TcpListener, shared: Shared, peers: MtResource<Vec<PeerThread>>) {
    for incoming in listener.incoming() {
        if !shared.running() {
            break;
        }
        let stream = match incoming {
            Ok(stream) => stream,
            Err(err) => {
                warn!("Failed to accept connection: {}", err);
                continue;
            }
        };
        let peer_addr = stream.peer_addr().ok();
        info!("Accepted connection from {:?}", peer_addr);

        let registered = stream.try_clone().and_then(|kept| {
            let shared = shared.clone();
            let thread = spawn_named("peer", move || peer_loop(stream, shared))?;
            Ok(PeerThread {
                stream: kept,
                thread,
            })
        });
        match registered {
            Ok(peer) => {
                let mut peers = peers.get_mut();
                peers.retain(|peer| !peer.thread.is_finished());
                peers.push(peer);
            }
            Err(err) => error!("Failed to start peer thread for {:?}: {}", peer_addr, err),
        }
    }
    debug!("Accept thread exiting");
}

/// Reads the `Connect` frame and registers the player.
///
/// # Returns
/// The new client id, or `None` if the peer left or misbehaved before joining.
fn handshake(stream: &mut TcpStream, shared: &Shared) -> Result<Option<u16>, RealmError> {
    let Some(frame) = framing::read_frame(stream, shared.max_frame_len)? else {
        return Ok(None);
    };
    let name = match Packet::decode(&frame)? {
        Packet::Connect { name } => name,
        other => {
            return Err(RealmError::Handshake(format!(
                "expected Connect, got {:?}",
                other.packet_type()
            )))
        }
    };

    let spawn = {
        let mut world = shared.world.get_mut();
        let height = world.surface_height(0, 0);
        Point3::new(0.5, height as f32, 0.5)
    };

    let mut sessions = shared.sessions.get_mut();
    let client_id = sessions.add_session(name.clone(), stream.try_clone()?, Player::new(spawn))?;
    if let Err(err) = sessions.send_to(client_id, &Packet::JoinConfirm { client_id, name }) {
        let removed = sessions.remove_session(client_id);
        drop(sessions);
        if let Some(session) = removed {
            session.close();
        }
        return Err(err.into());
    }
    Ok(Some(client_id))
}

fn peer_loop(mut stream: TcpStream, shared: Shared) {
    let peer_addr = stream.peer_addr().ok();
    let client_id = match handshake(&mut stream, &shared) {
        Ok(Some(client_id)) => client_id,
        Ok(None) => {
            debug!("{:?} closed before joining", peer_addr);
            let _ = stream.shutdown(Shutdown::Both);
            return;
        }
        Err(err) => {
            warn!("Handshake with {:?} failed: {}", peer_addr, err);
            let _ = stream.shutdown(Shutdown::Both);
            return;
        }
    };

    while shared.running() {
        let frame = match framing::read_frame(&mut stream, shared.max_frame_len) {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(err) => {
                warn!("Stream of client {} failed: {}", client_id, err);
                break;
            }
        };
        match Packet::decode(&frame) {
            Ok(packet) => {
                if let Err(err) = handle_stream_packet(client_id, packet, &shared) {
                    warn!("Failed to answer client {}: {}", client_id, err);
                    break;
                }
            }
            Err(err) => error!("Dropping bad packet from client {}: {}", client_id, err),
        }
    }

    let removed = shared.sessions.get_mut().remove_session(client_id);
    if let Some(session) = removed {
        session.close();
    }
    let _ = stream.shutdown(Shutdown::Both);
    info!("Connection from {:?} closed", peer_addr);
}

fn handle_stream_packet(client_id: u16, packet: Packet, shared: &Shared) -> Result<(), ProtocolError> {
    match packet {
        Packet::ChunkRequest { coords } => {
            let chunk = shared.world.get_mut().get_or_generate(coords).clone();
            shared.sessions.get().send_to(client_id, &Packet::ChunkInfo(chunk))
        }
        Packet::PlayerInput { inputs, .. } => {
            shared.sessions.get_mut().queue_actions(client_id, &inputs);
            Ok(())
        }
        Packet::PlayerRotation {
            yaw_delta,
            pitch_delta,
        } => {
            shared
                .sessions
                .get_mut()
                .queue_rotation(client_id, yaw_delta, pitch_delta);
            Ok(())
        }
        other => {
            warn!(
                "Ignoring unexpected {:?} from client {}",
                other.packet_type(),
                client_id
            );
            Ok(())
        }
    }
}

fn datagram_loop(socket: &UdpSocket, shared: Shared) {
    let mut buffer = [0u8; MAX_DATAGRAM];
    while shared.running() {
        let (len, addr) = match socket.recv_from(&mut buffer) {
            Ok(received) => received,
            Err(err)
                if matches!(
                    err.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
                ) =>
            {
                continue
            }
            Err(err) => {
                warn!("Datagram receive failed: {}", err);
                continue;
            }
        };

        match Packet::decode(&buffer[..len]) {
            Ok(Packet::PlayerInput { client_id, inputs }) => {
                let mut sessions = shared.sessions.get_mut();
                if sessions.register_address(client_id, addr) {
                    sessions.queue_actions(client_id, &inputs);
                } else {
                    warn!("Datagram from {} names unknown client {}", addr, client_id);
                }
            }
            Ok(Packet::PlayerRotation {
                yaw_delta,
                pitch_delta,
            }) => {
                let mut sessions = shared.sessions.get_mut();
                match sessions.client_for_address(addr) {
                    Some(client_id) => sessions.queue_rotation(client_id, yaw_delta, pitch_delta),
                    None => debug!("Rotation from unregistered address {}", addr),
                }
            }
            Ok(other) => warn!("Ignoring {:?} datagram from {}", other.packet_type(), addr),
            Err(err) => warn!("Dropping bad datagram from {}: {}", addr, err),
        }
    }
    debug!("Datagram thread exiting");
}

fn tick_loop(socket: &UdpSocket, shared: Shared, period: Duration) {
    let dt = period.as_secs_f32();
    while shared.running() {
        let start = Instant::now();
        tick(socket, &shared, dt);

        let elapsed = start.elapsed();
        if elapsed < period {
            thread::sleep(period - elapsed);
        } else {
            warn!(
                "Tick took {:?}, longer than the {:?} period",
                elapsed, period
            );
        }
    }
    debug!("Tick thread exiting");
}

/// One simulation step.
fn tick(socket: &UdpSocket, shared: &Shared, dt: f32) {
    let states = step_world(shared, dt);
    states.send(socket);
}

/// Applies queued input and queues edited chunks for every stream.
///
/// # Returns
/// The player states to send once both locks are released.
fn step_world(shared: &Shared, dt: f32) -> StateBroadcast {
    let mut sessions = shared.sessions.get_mut();
    let mut world = shared.world.get_mut();

    let mut edited = BTreeSet::new();
    for session in sessions.sessions_mut() {
        let (actions, (yaw_delta, pitch_delta)) = session.take_pending();
        session.player.rotate(yaw_delta, pitch_delta);
        session.player.step(&actions, dt);
        edited.extend(apply_edits(&session.player, &actions, &mut world));
    }

    for coords in edited {
        if let Some(chunk) = world.get_chunk_at(coords) {
            let packet = Packet::ChunkInfo(chunk.clone());
            match sessions.broadcast_packet(&packet) {
                Ok(0) => {}
                Ok(failed) => debug!("Chunk {:?} missed {} players", coords, failed),
                Err(err) => error!("Failed to encode chunk {:?}: {}", coords, err),
            }
        }
    }
    drop(world);

    sessions.state_broadcast()
}

/// Breaks the voxel under the crosshair or places dirt in front of it.
fn apply_edits(player: &Player, actions: &HashSet<PlayerAction>, world: &mut World) -> Vec<ChunkCoords> {
    let breaking = actions.contains(&PlayerAction::Break);
    let placing = actions.contains(&PlayerAction::Place);
    if !breaking && !placing {
        return Vec::new();
    }

    let Some((hit, previous)) = raycast(player.eye(), player.look_direction(), REACH, |[x, y, z]| {
        world.get_voxel_world(x, y, z).is_solid()
    }) else {
        return Vec::new();
    };

    let mut edited = Vec::new();
    if breaking {
        edited.extend(world.set_voxel_world(hit[0], hit[1], hit[2], VoxelType::Empty));
    }
    if placing && previous != hit {
        edited.extend(world.set_voxel_world(previous[0], previous[1], previous[2], VoxelType::Dirt));
    }
    edited
}
