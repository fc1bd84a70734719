use std::fmt;
use std::net::{IpAddr, SocketAddr};

use tokio::net::TcpStream;

/// The destination a client asked a handler to connect to, either a resolved
/// address or a hostname left for `connect` to resolve via the system resolver.
#[derive(Debug, Clone)]
pub enum Target {
    Addr(SocketAddr),
    Domain(String, u16),
}

impl Target {
    pub fn ipv4(addr: [u8; 4], port: u16) -> Self {
        Target::Addr(SocketAddr::new(IpAddr::from(addr), port))
    }

    pub fn ipv6(addr: [u8; 16], port: u16) -> Self {
        Target::Addr(SocketAddr::new(IpAddr::from(addr), port))
    }

    pub fn port(&self) -> u16 {
        match self {
            Target::Addr(addr) => addr.port(),
            Target::Domain(_, port) => *port,
        }
    }

    pub async fn connect(&self) -> std::io::Result<TcpStream> {
        match self {
            Target::Addr(addr) => TcpStream::connect(addr).await,
            Target::Domain(host, port) => TcpStream::connect((host.as_str(), *port)).await,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Addr(addr) => write!(f, "{addr}"),
            Target::Domain(host, port) => write!(f, "{host}:{port}"),
        }
    }
}
