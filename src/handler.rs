use crate::error::ProxyError;
use crate::http::{HttpConfig, HttpHandler};
use crate::socks::socks4::{Socks4Config, Socks4Handler};
use crate::socks::socks5::{Socks5Config, Socks5Handler};
use crate::stream::BufferedStream;

/// A protocol-specific handler, chosen once per listener at startup. The
/// driver is generic over the three variants rather than a trait object:
/// the protocol set is closed and known ahead of time.
pub enum Handler {
    Socks5(Socks5Handler),
    Socks4(Socks4Handler),
    Http(HttpHandler),
}

impl Handler {
    pub fn socks5(config: Socks5Config) -> Self {
        Handler::Socks5(Socks5Handler::new(config))
    }

    pub fn socks4(config: Socks4Config) -> Self {
        Handler::Socks4(Socks4Handler::new(config))
    }

    pub fn http(config: HttpConfig) -> Self {
        Handler::Http(HttpHandler::new(config))
    }

    pub async fn connect_to_remote(&self, client: &mut BufferedStream) -> Result<BufferedStream, ProxyError> {
        match self {
            Handler::Socks5(h) => h.connect_to_remote(client).await,
            Handler::Socks4(h) => h.connect_to_remote(client).await,
            Handler::Http(h) => h.connect_to_remote(client).await,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Handler::Socks5(_) => "socks5",
            Handler::Socks4(_) => "socks4",
            Handler::Http(_) => "http-connect",
        }
    }
}
