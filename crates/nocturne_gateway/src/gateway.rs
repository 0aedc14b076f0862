//! The gateway process shell: socket table, accept loop, and the
//! `gateway:output` forwarder.

use std::collections::HashMap;
use std::sync::Arc;

use nocturne_bus::MessageBus;
use nocturne_protocol::envelope::{Envelope, EnvelopeKind};
use nocturne_protocol::event::ServerFrame;
use nocturne_protocol::keys;
use nocturne_protocol::types::SocketId;
use nocturne_registry::ZoneRegistry;
use nocturne_store::Services;
use parking_lot::RwLock;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::auth::AuthProvider;
use crate::session::Session;
use crate::transport::{tcp_transport, SocketReader, SocketWriter};
use crate::GatewayConfig;

/// Socket id → outbound frame queue of every live local session.
#[derive(Default)]
pub struct SocketTable {
    sockets: RwLock<HashMap<SocketId, flume::Sender<ServerFrame>>>,
}

impl SocketTable {
    pub fn register(&self, socket_id: SocketId, sender: flume::Sender<ServerFrame>) {
        self.sockets.write().insert(socket_id, sender);
    }

    pub fn unregister(&self, socket_id: SocketId) {
        self.sockets.write().remove(&socket_id);
    }

    pub fn forward(&self, socket_id: SocketId, frame: ServerFrame) -> bool {
        match self.sockets.read().get(&socket_id) {
            Some(sender) => sender.send(frame).is_ok(),
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.sockets.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sockets.read().is_empty()
    }
}

/// One gateway process: shared state handed to every session.
pub struct Gateway {
    config: Arc<GatewayConfig>,
    bus: Arc<dyn MessageBus>,
    registry: Arc<ZoneRegistry>,
    services: Services,
    auth: Arc<dyn AuthProvider>,
    sockets: Arc<SocketTable>,
}

impl Gateway {
    pub fn new(
        config: GatewayConfig,
        bus: Arc<dyn MessageBus>,
        registry: Arc<ZoneRegistry>,
        services: Services,
        auth: Arc<dyn AuthProvider>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            bus,
            registry,
            services,
            auth,
            sockets: Arc::new(SocketTable::default()),
        }
    }

    pub fn sockets(&self) -> Arc<SocketTable> {
        Arc::clone(&self.sockets)
    }

    /// Subscribes to `gateway:output` and forwards client messages to
    /// whichever local socket they address. Messages for sockets another
    /// gateway owns are dropped silently.
    pub async fn start_output_forwarder(&self) -> Result<(), nocturne_bus::BusError> {
        let mut subscription = self.bus.subscribe(keys::GATEWAY_OUTPUT).await?;
        let sockets = Arc::clone(&self.sockets);

        tokio::spawn(async move {
            while let Some(message) = subscription.next().await {
                let envelope = match Envelope::from_json(&message.payload) {
                    Ok(envelope) => envelope,
                    Err(e) => {
                        warn!(error = %e, "dropping malformed gateway:output envelope");
                        continue;
                    }
                };

                let EnvelopeKind::ClientMessage(client_message) = envelope.kind else {
                    warn!("dropping non-client message on gateway:output");
                    continue;
                };

                let frame = ServerFrame {
                    event: client_message.event,
                    data: client_message.data,
                };

                sockets.forward(client_message.socket_id, frame);
            }

            debug!("gateway:output forwarder ended");
        });

        Ok(())
    }

    /// Accepts connections until the listener fails. Each connection gets
    /// a session task and a writer task.
    pub async fn run_accept_loop(self: Arc<Self>) -> anyhow::Result<()> {
        let address = format!("0.0.0.0:{}", self.config.port);
        let listener = TcpListener::bind(&address).await?;

        info!(address, "gateway listening");

        loop {
            match listener.accept().await {
                Ok((stream, remote)) => {
                    debug!(%remote, "connection accepted");

                    if let Err(e) = stream.set_nodelay(true) {
                        debug!(error = %e, "failed to set TCP_NODELAY");
                    }

                    let gateway = Arc::clone(&self);

                    tokio::spawn(async move {
                        let (mut reader, writer) = tcp_transport(stream);
                        gateway.drive_session(&mut reader, writer).await;
                    });
                }
                Err(e) => {
                    error!(error = %e, "accept failed");
                }
            }
        }
    }

    /// Runs one session over an arbitrary transport pair. Used by the TCP
    /// accept loop and directly by tests.
    pub async fn drive_session(
        &self,
        reader: &mut dyn SocketReader,
        mut writer: impl SocketWriter,
    ) {
        let socket_id = SocketId::random();
        let (outbound_tx, outbound_rx) = flume::unbounded::<ServerFrame>();

        self.sockets.register(socket_id, outbound_tx.clone());

        let writer_task = tokio::spawn(async move {
            while let Ok(frame) = outbound_rx.recv_async().await {
                if !writer.send(&frame).await {
                    break;
                }
            }
        });

        let session = Session::new(
            socket_id,
            Arc::clone(&self.config),
            Arc::clone(&self.bus),
            Arc::clone(&self.registry),
            self.services.clone(),
            Arc::clone(&self.auth),
            outbound_tx,
        );

        session.run(reader).await;

        self.sockets.unregister(socket_id);

        // Every sender is gone now; the writer drains what is queued and
        // exits on its own.
        let _ = writer_task.await;
    }
}
