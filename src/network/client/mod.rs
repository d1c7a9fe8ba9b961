//! # Client
//!
//! The client side of a connection. `Client::connect` does the handshake and starts two
//! reader threads:
//!
//! * the stream reader stores every delivered chunk in the `ClientWorldCache` and queues
//!   exactly one `ChunkRebuildTask` for it on the render thread's work queue;
//! * the datagram reader keeps the latest `PlayerState` of every player.
//!
//! Neither thread meshes or touches render resources.

use std::collections::HashMap;
use std::io;
use std::net::{Shutdown, TcpStream, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, error, info, warn};
use web_time::Instant;

use crate::config::RealmConfig;
use crate::core::MtResource;
use crate::error::RealmError;
use crate::network::protocol::{framing, Packet, PlayerAction, PlayerState};
use crate::rendering::meshing::{MeshBackend, RenderContext};
use crate::rendering::tasks::ChunkRebuildTask;
use crate::task_management::{EnqueueError, WorkQueueSender};
use crate::voxels::chunk::ChunkCoords;

pub mod world_cache;

use world_cache::ClientWorldCache;

const DATAGRAM_POLL: Duration = Duration::from_millis(100);
const MAX_DATAGRAM: usize = 1500;
const ENQUEUE_RETRY: Duration = Duration::from_millis(5);

#[derive(Clone, Debug)]
pub struct ClientOptions {
    pub host: String,
    pub tcp_port: u16,
    pub udp_port: u16,
    pub name: String,
    pub max_frame_len: u32,
}

impl ClientOptions {
    pub fn from_config(config: &RealmConfig, host: impl Into<String>, name: impl Into<String>) -> Self {
        ClientOptions {
            host: host.into(),
            tcp_port: config.network.tcp_port,
            udp_port: config.network.udp_port,
            name: name.into(),
            max_frame_len: config.network.max_frame_len,
        }
    }
}

type RemotePlayers = MtResource<HashMap<u16, PlayerState>>;

pub struct Client {
    client_id: u16,
    name: String,
    stream: MtResource<TcpStream>,
    udp: Arc<UdpSocket>,
    cache: MtResource<ClientWorldCache>,
    players: RemotePlayers,
    running: Arc<AtomicBool>,
    threads: Vec<JoinHandle<()>>,
}

impl Client {
    /// Joins the server and starts the reader threads.
    ///
    /// Chunks land in `cache`; one rebuild task per delivery goes to `sender`.
    pub fn connect<B>(
        options: ClientOptions,
        cache: MtResource<ClientWorldCache>,
        sender: WorkQueueSender<RenderContext<B>>,
    ) -> Result<Client, RealmError>
    where
        B: MeshBackend + 'static,
    {
        let mut stream = TcpStream::connect((options.host.as_str(), options.tcp_port))?;
        stream.set_nodelay(true)?;
        framing::send_packet(
            &mut stream,
            &Packet::Connect {
                name: options.name.clone(),
            },
        )?;

        let Some(frame) = framing::read_frame(&mut stream, options.max_frame_len)? else {
            return Err(RealmError::Disconnected);
        };
        let (client_id, name) = match Packet::decode(&frame)? {
            Packet::JoinConfirm { client_id, name } => (client_id, name),
            other => {
                return Err(RealmError::Handshake(format!(
                    "expected JoinConfirm, got {:?}",
                    other.packet_type()
                )))
            }
        };
        info!("Joined {} as '{}' (client {})", options.host, name, client_id);

        let udp = UdpSocket::bind("0.0.0.0:0")?;
        udp.connect((options.host.as_str(), options.udp_port))?;
        udp.set_read_timeout(Some(DATAGRAM_POLL))?;
        let udp = Arc::new(udp);
        // An empty input tells the server where to send player states.
        udp.send(&Packet::PlayerInput {
            client_id,
            inputs: Vec::new(),
        }
        .encode()?)?;

        let running = Arc::new(AtomicBool::new(true));
        let players: RemotePlayers = MtResource::new(HashMap::new());

        let stream_thread = {
            let reader = stream.try_clone()?;
            let cache = cache.clone();
            let players = players.clone();
            let running = Arc::clone(&running);
            let max_frame_len = options.max_frame_len;
            thread::Builder::new()
                .name("client-stream".to_owned())
                .spawn(move || stream_loop(reader, max_frame_len, cache, sender, players, running))?
        };
        let datagram_thread = {
            let udp = Arc::clone(&udp);
            let players = players.clone();
            let running = Arc::clone(&running);
            thread::Builder::new()
                .name("client-datagram".to_owned())
                .spawn(move || datagram_loop(&udp, players, running))?
        };

        Ok(Client {
            client_id,
            name,
            stream: MtResource::new(stream),
            udp,
            cache,
            players,
            running,
            threads: vec![stream_thread, datagram_thread],
        })
    }

    pub fn client_id(&self) -> u16 {
        self.client_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cache(&self) -> &MtResource<ClientWorldCache> {
        &self.cache
    }

    /// `false` once the server closed the stream or the client disconnected.
    pub fn is_connected(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn request_chunk(&self, coords: ChunkCoords) -> Result<(), RealmError> {
        let mut stream = self.stream.get_mut();
        framing::send_packet(&mut *stream, &Packet::ChunkRequest { coords })?;
        Ok(())
    }

    /// Sends the actions held this frame as one datagram.
    pub fn send_inputs(&self, inputs: &[PlayerAction]) -> Result<(), RealmError> {
        let packet = Packet::PlayerInput {
            client_id: self.client_id,
            inputs: inputs.to_vec(),
        };
        self.udp.send(&packet.encode()?)?;
        Ok(())
    }

    pub fn send_rotation(&self, yaw_delta: f32, pitch_delta: f32) -> Result<(), RealmError> {
        let packet = Packet::PlayerRotation {
            yaw_delta,
            pitch_delta,
        };
        self.udp.send(&packet.encode()?)?;
        Ok(())
    }

    /// Latest known state of every other player.
    pub fn remote_players(&self) -> Vec<PlayerState> {
        self.players
            .get()
            .values()
            .filter(|state| state.client_id != self.client_id)
            .copied()
            .collect()
    }

    /// Latest state the server reported for this client.
    pub fn own_state(&self) -> Option<PlayerState> {
        self.players.get().get(&self.client_id).copied()
    }

    /// Polls the cache until `coords` has arrived.
    ///
    /// # Returns
    /// `false` if the chunk did not arrive within `timeout`.
    pub fn wait_for_chunk(&self, coords: ChunkCoords, timeout: Duration) -> bool {
        let start = Instant::now();
        while start.elapsed() < timeout {
            if self.cache.get().contains(coords) {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        self.cache.get().contains(coords)
    }

    /// Closes the connection and joins the reader threads.
    pub fn disconnect(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if self.threads.is_empty() {
            return;
        }
        self.running.store(false, Ordering::Release);
        let _ = self.stream.get().shutdown(Shutdown::Both);
        for handle in self.threads.drain(..) {
            if handle.join().is_err() {
                error!("Client reader thread panicked");
            }
        }
        info!("Client {} disconnected", self.client_id);
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.stop();
    }
}

fn stream_loop<B: MeshBackend + 'static>(
    mut reader: TcpStream,
    max_frame_len: u32,
    cache: MtResource<ClientWorldCache>,
    sender: WorkQueueSender<RenderContext<B>>,
    players: RemotePlayers,
    running: Arc<AtomicBool>,
) {
    loop {
        let frame = match framing::read_frame(&mut reader, max_frame_len) {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                info!("Server closed the connection");
                break;
            }
            Err(err) => {
                if running.load(Ordering::Acquire) {
                    warn!("Stream read failed: {}", err);
                }
                break;
            }
        };

        match Packet::decode(&frame) {
            Ok(Packet::ChunkInfo(data)) => {
                let update = cache.get_mut().insert_chunk(data);
                debug!(
                    "Chunk {:?} revision {} (replaced: {})",
                    update.coords, update.revision, update.replaced
                );
                if !queue_rebuild(&sender, ChunkRebuildTask::new(update), &running) {
                    break;
                }
            }
            Ok(Packet::PlayerState(state)) => {
                players.get_mut().insert(state.client_id, state);
            }
            Ok(other) => warn!("Ignoring unexpected {:?} on stream", other.packet_type()),
            Err(err) => {
                error!("Bad packet on stream, closing connection: {}", err);
                break;
            }
        }
    }
    running.store(false, Ordering::Release);
    let _ = reader.shutdown(Shutdown::Both);
}

/// Hands a rebuild to the render thread, retrying while its queue is full so that a
/// disconnect is noticed even when nothing drains the queue.
///
/// # Returns
/// `false` if the client is shutting down or the render queue is gone.
fn queue_rebuild<B: MeshBackend + 'static>(
    sender: &WorkQueueSender<RenderContext<B>>,
    task: ChunkRebuildTask,
    running: &AtomicBool,
) -> bool {
    loop {
        match sender.try_enqueue(task) {
            Ok(()) => return true,
            Err(EnqueueError::Full(_)) if running.load(Ordering::Acquire) => {
                thread::sleep(ENQUEUE_RETRY);
            }
            Err(EnqueueError::Full(_)) => {
                debug!("Dropping rebuild of {:?} on disconnect", task.update().coords);
                return false;
            }
            Err(EnqueueError::Disconnected(_)) => {
                warn!("Render queue closed, stopping stream reader");
                return false;
            }
        }
    }
}

fn datagram_loop(socket: &UdpSocket, players: RemotePlayers, running: Arc<AtomicBool>) {
    let mut buffer = [0u8; MAX_DATAGRAM];
    while running.load(Ordering::Acquire) {
        let len = match socket.recv(&mut buffer) {
            Ok(len) => len,
            Err(err)
                if matches!(
                    err.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
                ) =>
            {
                continue
            }
            Err(err) => {
                // Connected sockets surface ICMP errors here while the server is away.
                debug!("Datagram receive failed: {}", err);
                thread::sleep(DATAGRAM_POLL);
                continue;
            }
        };
        match Packet::decode(&buffer[..len]) {
            Ok(Packet::PlayerState(state)) => {
                players.get_mut().insert(state.client_id, state);
            }
            Ok(other) => warn!("Ignoring {:?} datagram", other.packet_type()),
            Err(err) => warn!("Dropping bad datagram: {}", err),
        }
    }
}
