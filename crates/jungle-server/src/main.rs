//! Jungle Duel server binary.

use std::time::{Duration, Instant};

use renet::{ConnectionConfig, RenetServer, ServerEvent};
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use jungle_protocol::wire::serialize_server_message;
use jungle_server::{
    channel_for, channel_id, create_channel_configs, Outbound, ServerConfig, ServerRunner,
    SessionHandler, TransportConfig, PROTOCOL_ID,
};

struct Server {
    renet: RenetServer,
    sessions: SessionHandler,
}

impl Server {
    fn new(config: &ServerConfig) -> Self {
        let connection_config = ConnectionConfig {
            available_bytes_per_tick: 60_000,
            server_channels_config: create_channel_configs(),
            client_channels_config: create_channel_configs(),
        };

        Self {
            renet: RenetServer::new(connection_config),
            sessions: SessionHandler::from_config(config),
        }
    }

    /// Drain transport events and messages, then run housekeeping.
    fn process(&mut self, now: Instant) {
        while let Some(event) = self.renet.get_event() {
            self.handle_server_event(event);
        }

        for client_id in self.renet.clients_id() {
            for channel in [channel_id::COMMANDS, channel_id::HEARTBEAT] {
                while let Some(message) = self.renet.receive_message(client_id, channel) {
                    let out = self.sessions.handle_message(client_id, &message);
                    self.deliver(out);
                }
            }
        }

        let out = self.sessions.on_tick(now);
        self.deliver(out);
    }

    fn handle_server_event(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::ClientConnected { client_id } => {
                info!(client_id, "Client connected");
                self.sessions.on_connect(client_id);
            }
            ServerEvent::ClientDisconnected { client_id, reason } => {
                info!(client_id, ?reason, "Client disconnected");
                let out = self.sessions.on_disconnect(client_id);
                self.deliver(out);
            }
        }
    }

    fn deliver(&mut self, out: Vec<Outbound>) {
        for Outbound { client_id, message } in out {
            if !self.renet.is_connected(client_id) {
                continue;
            }
            match serialize_server_message(&message) {
                Ok(data) => self.renet.send_message(client_id, channel_for(&message), data),
                Err(e) => warn!(client_id, error = %e, "Failed to encode server message"),
            }
        }
    }
}

#[tokio::main]
async fn main() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("jungle_server=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load config: {}", e);
            std::process::exit(1);
        }
    };

    let mut server = Server::new(&config);

    let transport_config = TransportConfig {
        public_address: config.bind_address,
        max_clients: config.max_clients,
        private_key: None, // Unsecure mode for development
    };
    let mut transport = match ServerRunner::new(transport_config) {
        Ok(t) => t,
        Err(e) => {
            error!("Failed to create transport: {}", e);
            std::process::exit(1);
        }
    };

    info!("Jungle Duel server v{}", env!("CARGO_PKG_VERSION"));
    if let Some(addr) = transport.local_addr() {
        info!("Listening on {}", addr);
    }
    info!("Protocol ID: {:016x}", PROTOCOL_ID);

    let mut ticker = tokio::time::interval(config.tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut last_tick = Instant::now();
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let now = Instant::now();
                let delta: Duration = now - last_tick;
                last_tick = now;

                server.renet.update(delta);
                transport.receive(&mut server.renet, delta);
                server.process(now);
                transport.send(&mut server.renet);
            }
            _ = &mut shutdown => {
                info!("Shutdown requested");
                break;
            }
        }
    }

    transport.disconnect_all(&mut server.renet);
    info!(rooms = server.sessions.registry().len(), "Server stopped");
}
