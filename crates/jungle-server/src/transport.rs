//! UDP transport via renet_netcode.

use std::net::{SocketAddr, UdpSocket};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use renet::RenetServer;
use renet_netcode::{NetcodeServerTransport, ServerAuthentication, ServerConfig};
use tracing::{error, info};

/// Netcode protocol id; clients must present the same value.
pub const PROTOCOL_ID: u64 = 0x4A55_4E47_4C45_0001;

pub struct TransportConfig {
    /// Address clients connect to
    pub public_address: SocketAddr,
    pub max_clients: usize,
    /// 32-byte key for secure authentication. `None` runs unsecure, which is
    /// only meant for development.
    pub private_key: Option<[u8; 32]>,
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Failed to bind socket to {0}: {1}")]
    BindFailed(SocketAddr, std::io::Error),

    #[error("Failed to determine bound address for {0}: {1}")]
    LocalAddrFailed(SocketAddr, std::io::Error),

    #[error("Failed to configure socket: {0}")]
    SocketConfig(std::io::Error),

    #[error("System clock is before the Unix epoch")]
    Clock,

    #[error("Failed to create transport: {0}")]
    TransportCreation(String),
}

pub fn create_server_transport(
    config: TransportConfig,
) -> Result<NetcodeServerTransport, TransportError> {
    let socket = UdpSocket::bind(config.public_address)
        .map_err(|e| TransportError::BindFailed(config.public_address, e))?;

    let bound_addr = socket
        .local_addr()
        .map_err(|e| TransportError::LocalAddrFailed(config.public_address, e))?;

    socket
        .set_nonblocking(true)
        .map_err(TransportError::SocketConfig)?;

    let current_time = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|_| TransportError::Clock)?;

    let authentication = match config.private_key {
        Some(key) => ServerAuthentication::Secure { private_key: key },
        None => ServerAuthentication::Unsecure,
    };

    let server_config = ServerConfig {
        current_time,
        max_clients: config.max_clients,
        protocol_id: PROTOCOL_ID,
        public_addresses: vec![bound_addr],
        authentication,
    };

    let transport = NetcodeServerTransport::new(server_config, socket)
        .map_err(|e| TransportError::TransportCreation(e.to_string()))?;

    info!(
        address = %bound_addr,
        max_clients = config.max_clients,
        "Transport bound (protocol {:016x})",
        PROTOCOL_ID
    );

    Ok(transport)
}

/// Pairs the netcode transport with the server's tick.
pub struct ServerRunner {
    transport: NetcodeServerTransport,
}

impl ServerRunner {
    pub fn new(config: TransportConfig) -> Result<Self, TransportError> {
        let transport = create_server_transport(config)?;
        Ok(Self { transport })
    }

    /// Receive pending packets into `renet_server`.
    pub fn receive(&mut self, renet_server: &mut RenetServer, delta: Duration) {
        if let Err(e) = self.transport.update(delta, renet_server) {
            error!(error = %e, "Transport update error");
        }
    }

    /// Flush queued messages to the network.
    pub fn send(&mut self, renet_server: &mut RenetServer) {
        self.transport.send_packets(renet_server);
    }

    /// Disconnect every client and flush the disconnect packets.
    pub fn disconnect_all(&mut self, renet_server: &mut RenetServer) {
        self.transport.disconnect_all(renet_server);
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.transport.addresses().first().copied()
    }
}
