use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use nocturne_bus::{MessageBus, RedisBus};
use nocturne_gateway::{Gateway, GatewayConfig, GuestAuthProvider};
use nocturne_registry::ZoneRegistry;
use nocturne_store::Services;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// The Nocturne gateway: terminates client sockets and routes to zones.
#[derive(Parser, Debug)]
#[command(name = "gateway", version)]
struct Args {
    /// Port for client connections.
    #[arg(long, env = "PORT", default_value_t = 4000)]
    port: u16,

    /// Identifier of this process in the cluster.
    #[arg(long, env = "SERVER_ID", default_value = "gateway-1")]
    server_id: String,

    /// Redis connection URL for the message bus.
    #[arg(long, env = "REDIS_URL", default_value = "redis://127.0.0.1:6379")]
    redis_url: String,

    /// Zone new characters spawn into.
    #[arg(long, env = "STARTER_ZONE", default_value = "haven-square")]
    starter_zone: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let bus: Arc<dyn MessageBus> = Arc::new(
        RedisBus::connect(&args.redis_url)
            .await
            .context("connecting to the message bus")?,
    );

    let registry = Arc::new(ZoneRegistry::new(Arc::clone(&bus), args.server_id.clone()));

    // Gateways read through the same store services the zone tier uses;
    // the SQL-backed implementations plug in here.
    let services = Services::in_memory();
    let auth = Arc::new(GuestAuthProvider::new(Arc::clone(&services.accounts)));

    let config = GatewayConfig {
        port: args.port,
        starter_zone_id: args.starter_zone,
        ..Default::default()
    };

    info!(server_id = args.server_id, port = config.port, "gateway starting");

    let gateway = Arc::new(Gateway::new(config, bus, registry, services, auth));
    gateway
        .start_output_forwarder()
        .await
        .context("subscribing to gateway:output")?;

    tokio::select! {
        result = Arc::clone(&gateway).run_accept_loop() => result,
        _ = tokio::signal::ctrl_c() => {
            info!("shutting down");
            Ok(())
        }
    }
}
