//! # Voxel Realm Entry Point
//!
//! ## Usage
//!
//! ```bash
//! voxel-realm server [config.json]
//! voxel-realm client <host> [name] [config.json]
//! voxel-realm host [config.json]
//! ```
//!
//! `host` runs a server and a headless client in the same process.

use std::process::ExitCode;
use std::thread;
use std::time::Duration;

use log::{error, info};
use web_time::Instant;

use voxel_realm::config::RealmConfig;
use voxel_realm::core::MtResource;
use voxel_realm::error::RealmError;
use voxel_realm::logging;
use voxel_realm::network::client::{world_cache::ClientWorldCache, Client, ClientOptions};
use voxel_realm::network::server::{Server, ServerOptions};
use voxel_realm::rendering::{HeadlessBackend, RenderContext};
use voxel_realm::task_management::WorkQueue;
use voxel_realm::voxels::chunk::ChunkCoords;

const USAGE: &str = "usage: voxel-realm server [config.json]\n       \
                     voxel-realm client <host> [name] [config.json]\n       \
                     voxel-realm host [config.json]";

/// Chunks requested around the origin by the headless client, in chunk units.
const VIEW_RADIUS: i32 = 2;
const FRAME: Duration = Duration::from_millis(16);

fn load_config(path: Option<&String>) -> Result<RealmConfig, RealmError> {
    match path {
        Some(path) => {
            info!("Loading configuration from {}", path);
            RealmConfig::load(path)
        }
        None => Ok(RealmConfig::default()),
    }
}

/// Drains rebuilds on this thread until the connection closes.
fn run_headless_client(options: ClientOptions, config: &RealmConfig) -> Result<(), RealmError> {
    let cache = MtResource::new(ClientWorldCache::new());
    let (sender, queue) = WorkQueue::new(config.network.work_queue_capacity);
    let mut context = RenderContext::new(cache.clone(), HeadlessBackend::new());
    let client = Client::connect(options, cache, sender)?;

    for x in -VIEW_RADIUS..=VIEW_RADIUS {
        for z in -VIEW_RADIUS..=VIEW_RADIUS {
            client.request_chunk(ChunkCoords::new(x, z))?;
        }
    }

    let mut last_report = Instant::now();
    while client.is_connected() {
        let report = context.process_frame(&queue);
        if report.failed > 0 {
            error!("{} rebuilds failed this frame", report.failed);
        }
        if last_report.elapsed() >= Duration::from_secs(5) {
            info!(
                "{} chunks cached, {} meshes live ({} indices, {} bytes), {} rebuilds, {} other players",
                context.cache.get().len(),
                context.meshes.backend().live_meshes(),
                context.meshes.backend().live_indices(),
                context.meshes.backend().live_bytes(),
                context.meshes.rebuilds(),
                client.remote_players().len()
            );
            last_report = Instant::now();
        }
        thread::sleep(FRAME);
    }
    info!("Connection closed");
    Ok(())
}

fn run(args: &[String]) -> Result<(), RealmError> {
    match args.first().map(String::as_str) {
        Some("server") => {
            let config = load_config(args.get(1))?;
            Server::start(ServerOptions::from_config(&config))?.wait();
            Ok(())
        }
        Some("client") => {
            let Some(host) = args.get(1) else {
                eprintln!("{}", USAGE);
                return Ok(());
            };
            let name = args.get(2).cloned().unwrap_or_else(|| "player".to_owned());
            let config = load_config(args.get(3))?;
            run_headless_client(ClientOptions::from_config(&config, host.as_str(), name), &config)
        }
        Some("host") => {
            let config = load_config(args.get(1))?;
            let server = Server::start(ServerOptions::from_config(&config))?;
            let mut options = ClientOptions::from_config(&config, "127.0.0.1", "host");
            options.tcp_port = server.tcp_addr().port();
            options.udp_port = server.udp_addr().port();
            let result = run_headless_client(options, &config);
            server.shutdown();
            result
        }
        _ => {
            eprintln!("{}", USAGE);
            Ok(())
        }
    }
}

fn main() -> ExitCode {
    logging::init();
    let args: Vec<String> = std::env::args().skip(1).collect();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{}", err);
            ExitCode::FAILURE
        }
    }
}
