#![allow(dead_code)]

use std::thread;
use std::time::Duration;

use voxel_realm::config::{RealmConfig, TerrainSettings};
use voxel_realm::core::MtResource;
use voxel_realm::network::client::{world_cache::ClientWorldCache, Client, ClientOptions};
use voxel_realm::network::server::{Server, ServerHandle, ServerOptions};
use voxel_realm::rendering::{HeadlessBackend, RenderContext};
use voxel_realm::task_management::WorkQueue;
use web_time::Instant;

pub const TIMEOUT: Duration = Duration::from_secs(5);

pub struct TestClient {
    pub client: Client,
    pub context: RenderContext<HeadlessBackend>,
    pub queue: WorkQueue<RenderContext<HeadlessBackend>>,
}

/// Starts a server on ephemeral loopback ports with a fixed seed.
pub fn start_server() -> ServerHandle {
    voxel_realm::logging::init();
    let mut config = RealmConfig::default();
    config.terrain = TerrainSettings {
        world_seed: Some(1234),
        ..TerrainSettings::default()
    };
    config.network.address = "127.0.0.1".to_owned();
    config.network.tcp_port = 0;
    config.network.udp_port = 0;
    Server::start(ServerOptions::from_config(&config)).expect("server should start")
}

pub fn connect_client(server: &ServerHandle, name: &str) -> TestClient {
    let options = ClientOptions {
        host: "127.0.0.1".to_owned(),
        tcp_port: server.tcp_addr().port(),
        udp_port: server.udp_addr().port(),
        name: name.to_owned(),
        max_frame_len: 1 << 20,
    };
    let cache = MtResource::new(ClientWorldCache::new());
    let (sender, queue) = WorkQueue::new(64);
    let context = RenderContext::new(cache.clone(), HeadlessBackend::new());
    let client = Client::connect(options, cache, sender).expect("client should connect");
    TestClient {
        client,
        context,
        queue,
    }
}

/// Polls `condition` until it holds or the timeout passes.
pub fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < TIMEOUT {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    condition()
}
