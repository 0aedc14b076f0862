use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use nocturne_bus::{InMemoryBus, MessageBus, RedisBus};
use nocturne_gateway::{Gateway, GatewayConfig, GuestAuthProvider};
use nocturne_protocol::types::Position;
use nocturne_registry::ZoneRegistry;
use nocturne_server::{SilentResponder, WorldManager, COMBINED_TICK_RATE, DEFAULT_TICK_RATE};
use nocturne_store::{AbilityDef, Companion, MemoryStore, Services, ZoneRecord};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// The Nocturne zone server: authoritative simulation of assigned zones.
#[derive(Parser, Debug)]
#[command(name = "zone-server", version)]
struct Args {
    /// Identifier of this process in the cluster.
    #[arg(long, env = "SERVER_ID", default_value = "zone-server-1")]
    server_id: String,

    /// Redis connection URL for the message bus.
    #[arg(long, env = "REDIS_URL", default_value = "redis://127.0.0.1:6379")]
    redis_url: String,

    /// Simulation ticks per second.
    #[arg(long, env = "TICK_RATE")]
    tick_rate: Option<f64>,

    /// Comma-separated zone ids to own; empty means every zone in the
    /// store.
    #[arg(long, env = "ASSIGNED_ZONES", value_delimiter = ',', num_args = 0..)]
    assigned_zones: Vec<String>,

    /// Host address advertised in zone assignments.
    #[arg(long, env = "HOST", default_value = "127.0.0.1")]
    host: String,

    /// Deployment environment name.
    #[arg(long, env = "NODE_ENV", default_value = "development")]
    node_env: String,

    /// Run a gateway and the zones in one process over an in-memory bus.
    #[arg(long)]
    combined: bool,

    /// Gateway port in combined mode.
    #[arg(long, env = "PORT", default_value_t = 4000)]
    port: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_filter = if args.node_env == "production" {
        "info"
    } else {
        "debug"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    let tick_rate = args.tick_rate.unwrap_or(if args.combined {
        COMBINED_TICK_RATE
    } else {
        DEFAULT_TICK_RATE
    });

    let bus: Arc<dyn MessageBus> = if args.combined {
        Arc::new(InMemoryBus::new())
    } else {
        Arc::new(
            RedisBus::connect(&args.redis_url)
                .await
                .context("connecting to the message bus")?,
        )
    };

    let registry = Arc::new(ZoneRegistry::new(Arc::clone(&bus), args.server_id.clone()));

    // The SQL-backed services plug in here; development runs on the
    // in-memory store with a seeded starter world.
    let store = Arc::new(MemoryStore::new());
    seed_dev_world(&store);
    let services = Services::from_memory(store);

    info!(
        server_id = args.server_id,
        tick_rate,
        combined = args.combined,
        "zone server starting"
    );

    let manager = WorldManager::start(
        Arc::clone(&bus),
        Arc::clone(&registry),
        services.clone(),
        Arc::new(SilentResponder),
        &args.assigned_zones,
        &args.host,
        tick_rate,
    )
    .await?;

    if args.combined {
        let auth = Arc::new(GuestAuthProvider::new(Arc::clone(&services.accounts)));
        let gateway = Arc::new(Gateway::new(
            GatewayConfig {
                port: args.port,
                ..Default::default()
            },
            Arc::clone(&bus),
            Arc::new(ZoneRegistry::new(
                Arc::clone(&bus),
                format!("{}-gateway", args.server_id),
            )),
            services,
            auth,
        ));

        gateway
            .start_output_forwarder()
            .await
            .context("subscribing to gateway:output")?;

        let accept = Arc::clone(&gateway);
        tokio::spawn(async move {
            if let Err(e) = accept.run_accept_loop().await {
                tracing::error!(error = %e, "gateway accept loop failed");
            }
        });
    }

    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;

    info!("shutting down");
    manager.shutdown().await;

    Ok(())
}

/// A small starter world so combined mode boots without a datastore.
fn seed_dev_world(store: &MemoryStore) {
    store.seed_zone(ZoneRecord {
        id: "haven-square".to_owned(),
        name: "Haven Square".to_owned(),
        description: "Lantern-lit cobbles under a starless sky.".to_owned(),
        content_rating: "general".to_owned(),
        origin: Position::default(),
        size: 500.0,
    });

    store.seed_ability(AbilityDef::basic_attack());

    store.seed_companion(Companion {
        id: "comp-warden".to_owned(),
        name: "The Warden".to_owned(),
        description: "Keeps the square, and its secrets.".to_owned(),
        zone_id: "haven-square".to_owned(),
        position: Position::new(5.0, 0.0, 5.0),
        stats: None,
        resources: Default::default(),
        level: 5,
    });
}
