use crate::error::ProxyError;
use crate::stream::BufferedStream;
use crate::target::Target;

const VERSION: u8 = 0x05;

const METHOD_NONE: u8 = 0x00;
const METHOD_USERPASS: u8 = 0x02;
const METHOD_NO_ACCEPTABLE: u8 = 0xFF;

const CMD_CONNECT: u8 = 0x01;

const ATYP_IPV4: u8 = 0x01;
const ATYP_DOMAIN: u8 = 0x03;
const ATYP_IPV6: u8 = 0x04;

const REP_OK: u8 = 0x00;
const REP_COMMAND_NOT_SUPPORTED: u8 = 0x07;
const REP_ADDRESS_TYPE_NOT_SUPPORTED: u8 = 0x08;
const REP_CONNECTION_REFUSED: u8 = 0x05;

// when set, username/password subnegotiation (RFC 1929) is required
#[derive(Debug, Clone, Default)]
pub struct Socks5Config {
    pub credentials: Option<(String, String)>,
}

pub struct Socks5Handler {
    config: Socks5Config,
}

impl Socks5Handler {
    pub fn new(config: Socks5Config) -> Self {
        Self { config }
    }

    pub async fn connect_to_remote(&self, client: &mut BufferedStream) -> Result<BufferedStream, ProxyError> {
        self.negotiate(client).await?;
        let target = self.read_request(client).await?;

        let remote_socket = match target.connect().await {
            Ok(socket) => socket,
            Err(source) => {
                let _ = client
                    .send(&[VERSION, REP_CONNECTION_REFUSED, 0x00, 0x00, 0x00, 0x00])
                    .await;
                return Err(ProxyError::RemoteConnect {
                    host: target.to_string(),
                    port: target.port(),
                    source,
                });
            }
        };

        let bind_addr = remote_socket.local_addr().map_err(crate::error::classify_io_error)?;
        let mut reply = vec![VERSION, REP_OK, 0x00];
        encode_bind_address(&mut reply, bind_addr);
        client.send(&reply).await.map_err(crate::error::classify_io_error)?;

        Ok(BufferedStream::new(remote_socket))
    }

    async fn negotiate(&self, client: &mut BufferedStream) -> Result<(), ProxyError> {
        let header = client.receive_exactly(2).await.map_err(crate::error::classify_io_error)?;
        if header[0] != VERSION {
            let _ = client.send(&[0x00, 0x00]).await;
            return Err(ProxyError::Protocol(format!("unsupported SOCKS version {}", header[0])));
        }
        let nmethods = header[1] as usize;
        let methods = client.receive_exactly(nmethods).await.map_err(crate::error::classify_io_error)?;

        let wants_auth = self.config.credentials.is_some();
        let chosen = if wants_auth {
            if methods.contains(&METHOD_USERPASS) {
                METHOD_USERPASS
            } else {
                METHOD_NO_ACCEPTABLE
            }
        } else if methods.contains(&METHOD_NONE) {
            METHOD_NONE
        } else {
            METHOD_NO_ACCEPTABLE
        };

        client.send(&[VERSION, chosen]).await.map_err(crate::error::classify_io_error)?;
        if chosen == METHOD_NO_ACCEPTABLE {
            return Err(ProxyError::Protocol("no acceptable authentication method".into()));
        }

        if chosen == METHOD_USERPASS {
            self.subnegotiate(client).await?;
        }

        Ok(())
    }

    async fn subnegotiate(&self, client: &mut BufferedStream) -> Result<(), ProxyError> {
        let ver = client.receive_exactly(1).await.map_err(crate::error::classify_io_error)?;
        if ver[0] != 0x01 {
            let _ = client.send(&[0x01, 0xFF]).await;
            return Err(ProxyError::Protocol(format!("unsupported subnegotiation version {}", ver[0])));
        }

        let ulen = client.receive_exactly(1).await.map_err(crate::error::classify_io_error)?[0] as usize;
        let user = client.receive_exactly(ulen).await.map_err(crate::error::classify_io_error)?;
        let plen = client.receive_exactly(1).await.map_err(crate::error::classify_io_error)?[0] as usize;
        let pass = client.receive_exactly(plen).await.map_err(crate::error::classify_io_error)?;

        let user = String::from_utf8(user).map_err(|_| ProxyError::Protocol("non-UTF8 username".into()))?;
        let pass = String::from_utf8(pass).map_err(|_| ProxyError::Protocol("non-UTF8 password".into()))?;

        let (expected_user, expected_pass) = self.config.credentials.as_ref().expect("auth method implies credentials configured");
        if &user == expected_user && &pass == expected_pass {
            client.send(&[0x01, 0x00]).await.map_err(crate::error::classify_io_error)?;
            Ok(())
        } else {
            let _ = client.send(&[0x01, 0xFF]).await;
            Err(ProxyError::AuthFailed)
        }
    }

    async fn read_request(&self, client: &mut BufferedStream) -> Result<Target, ProxyError> {
        let header = client.receive_exactly(4).await.map_err(crate::error::classify_io_error)?;
        if header[0] != VERSION {
            let _ = client.send(&[VERSION, 0x01, 0x00]).await;
            return Err(ProxyError::Protocol(format!("unsupported request version {}", header[0])));
        }
        if header[1] != CMD_CONNECT {
            let _ = client.send(&[VERSION, REP_COMMAND_NOT_SUPPORTED, 0x00]).await;
            return Err(ProxyError::Protocol(format!("unsupported command {}", header[1])));
        }

        let atyp = header[3];
        let target = match atyp {
            ATYP_IPV4 => {
                let addr = client.receive_exactly(4).await.map_err(crate::error::classify_io_error)?;
                let port = read_port(client).await?;
                Target::ipv4([addr[0], addr[1], addr[2], addr[3]], port)
            }
            ATYP_IPV6 => {
                let addr = client.receive_exactly(16).await.map_err(crate::error::classify_io_error)?;
                let port = read_port(client).await?;
                let mut octets = [0u8; 16];
                octets.copy_from_slice(&addr);
                Target::ipv6(octets, port)
            }
            ATYP_DOMAIN => {
                let len = client.receive_exactly(1).await.map_err(crate::error::classify_io_error)?[0] as usize;
                let host = client.receive_exactly(len).await.map_err(crate::error::classify_io_error)?;
                let host = String::from_utf8(host).map_err(|_| ProxyError::Protocol("non-ASCII hostname".into()))?;
                let port = read_port(client).await?;
                Target::Domain(host, port)
            }
            other => {
                let _ = client.send(&[VERSION, REP_ADDRESS_TYPE_NOT_SUPPORTED, 0x00, 0x00, 0x00, 0x00]).await;
                return Err(ProxyError::Protocol(format!("unsupported address type {other}")));
            }
        };

        Ok(target)
    }
}

async fn read_port(client: &mut BufferedStream) -> Result<u16, ProxyError> {
    let bytes = client.receive_exactly(2).await.map_err(crate::error::classify_io_error)?;
    Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
}

fn encode_bind_address(out: &mut Vec<u8>, addr: std::net::SocketAddr) {
    match addr.ip() {
        std::net::IpAddr::V4(v4) => {
            out.push(ATYP_IPV4);
            out.extend_from_slice(&v4.octets());
        }
        std::net::IpAddr::V6(v6) => {
            out.push(ATYP_IPV6);
            out.extend_from_slice(&v6.octets());
        }
    }
    out.extend_from_slice(&addr.port().to_be_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    async fn handshake(client_bytes: &[u8], config: Socks5Config) -> (Vec<u8>, Option<TcpStream>) {
        let remote_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let remote_addr = remote_listener.local_addr().unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let mut client_socket = TcpStream::connect(addr).await.unwrap();
        let (server_socket, _) = listener.accept().await.unwrap();

        let accept_remote = tokio::spawn(async move { remote_listener.accept().await });

        client_socket.write_all(client_bytes).await.unwrap();

        let handler = Socks5Handler::new(config);
        let mut buffered = BufferedStream::new(server_socket);
        let result = handler.connect_to_remote(&mut buffered).await;

        let mut response = vec![0u8; 256];
        client_socket.set_nodelay(true).ok();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        let n = tokio::time::timeout(std::time::Duration::from_millis(200), client_socket.read(&mut response))
            .await
            .unwrap_or(Ok(0))
            .unwrap_or(0);
        response.truncate(n);

        let remote = if result.is_ok() {
            accept_remote.await.ok().and_then(|r| r.ok()).map(|(s, _)| s)
        } else {
            accept_remote.abort();
            None
        };

        (response, remote)
    }

    #[tokio::test]
    async fn unauth_connect_gets_success_reply() {
        let remote_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let remote_addr = remote_listener.local_addr().unwrap();
        let ip_octets = match remote_addr.ip() {
            std::net::IpAddr::V4(v4) => v4.octets(),
            _ => panic!("expected ipv4"),
        };

        let mut req = vec![0x05, 0x01, 0x00];
        req.extend_from_slice(&[0x05, 0x01, 0x00, 0x01]);
        req.extend_from_slice(&ip_octets);
        req.extend_from_slice(&remote_addr.port().to_be_bytes());

        let (response, remote) = handshake(&req, Socks5Config::default()).await;
        assert_eq!(&response[..2], &[0x05, 0x00]);
        assert_eq!(response[2], 0x05);
        assert_eq!(response[3], 0x00);
        assert_eq!(response[4], 0x01);
        assert!(remote.is_some());
    }

    #[tokio::test]
    async fn auth_failure_sends_ff_and_aborts() {
        let mut req = vec![0x05, 0x01, 0x02];
        req.extend_from_slice(&[0x01, 0x04]);
        req.extend_from_slice(b"user");
        req.extend_from_slice(&[0x04]);
        req.extend_from_slice(b"pass");

        let config = Socks5Config {
            credentials: Some(("user".into(), "wrong".into())),
        };
        let (response, remote) = handshake(&req, config).await;
        assert_eq!(&response[..2], &[0x05, 0x02]);
        assert_eq!(&response[2..4], &[0x01, 0xFF]);
        assert!(remote.is_none());
    }

    #[tokio::test]
    async fn bad_version_rejected() {
        let req = vec![0x04, 0x01, 0x00];
        let (response, remote) = handshake(&req, Socks5Config::default()).await;
        assert_eq!(&response, &[0x00, 0x00]);
        assert!(remote.is_none());
    }

    #[tokio::test]
    async fn connection_refused_sends_six_byte_reply() {
        // Bind to grab a free port, then drop the listener so nothing is
        // listening there and the connect attempt is refused.
        let dead_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let dead_addr = dead_listener.local_addr().unwrap();
        drop(dead_listener);

        let ip_octets = match dead_addr.ip() {
            std::net::IpAddr::V4(v4) => v4.octets(),
            _ => panic!("expected ipv4"),
        };

        let mut req = vec![0x05, 0x01, 0x00];
        req.extend_from_slice(&[0x05, 0x01, 0x00, 0x01]);
        req.extend_from_slice(&ip_octets);
        req.extend_from_slice(&dead_addr.port().to_be_bytes());

        let (response, remote) = handshake(&req, Socks5Config::default()).await;
        assert_eq!(&response[..2], &[0x05, 0x00]);
        assert_eq!(&response[2..], &[0x05, REP_CONNECTION_REFUSED, 0x00, 0x00, 0x00, 0x00]);
        assert!(remote.is_none());
    }

    #[tokio::test]
    async fn unsupported_atyp_sends_six_byte_reply() {
        let req = vec![0x05, 0x01, 0x00, 0x05, 0x01, 0x00, 0x02];
        let (response, remote) = handshake(&req, Socks5Config::default()).await;
        assert_eq!(&response[..2], &[0x05, 0x00]);
        assert_eq!(&response[2..], &[0x05, REP_ADDRESS_TYPE_NOT_SUPPORTED, 0x00, 0x00, 0x00, 0x00]);
        assert!(remote.is_none());
    }
}
