use crate::error::ProxyError;
use crate::stream::BufferedStream;
use crate::target::Target;

const VERSION: u8 = 0x04;
const CMD_CONNECT: u8 = 0x01;

const REPLY_GRANTED: u8 = 0x5A;
const REPLY_REJECTED: u8 = 0x5B;
const REPLY_IDENTD_FAIL: u8 = 0x5C;
const REPLY_IDENT_MISMATCH: u8 = 0x5D;

// no password field: the original only ever compares userid
#[derive(Debug, Clone, Default)]
pub struct Socks4Config {
    pub userid: Option<String>,
}

pub struct Socks4Handler {
    config: Socks4Config,
}

impl Socks4Handler {
    pub fn new(config: Socks4Config) -> Self {
        Self { config }
    }

    pub async fn connect_to_remote(&self, client: &mut BufferedStream) -> Result<BufferedStream, ProxyError> {
        let header = client.receive_exactly(2).await.map_err(crate::error::classify_io_error)?;
        if header[0] != VERSION {
            let _ = reply(client, REPLY_REJECTED).await;
            return Err(ProxyError::Protocol(format!("unsupported SOCKS version {}", header[0])));
        }
        if header[1] != CMD_CONNECT {
            let _ = reply(client, REPLY_REJECTED).await;
            return Err(ProxyError::Protocol(format!("unsupported command {}", header[1])));
        }

        let port_bytes = client.receive_exactly(2).await.map_err(crate::error::classify_io_error)?;
        let port = u16::from_be_bytes([port_bytes[0], port_bytes[1]]);

        let addr_bytes = client.receive_exactly(4).await.map_err(crate::error::classify_io_error)?;
        let is_socks4a = addr_bytes[0] == 0 && addr_bytes[1] == 0 && addr_bytes[2] == 0 && addr_bytes[3] != 0;

        let userid = read_nullterminated(client).await?;
        if let Some(expected) = &self.config.userid {
            if expected.as_bytes() != userid.as_slice() {
                let _ = reply(client, REPLY_IDENT_MISMATCH).await;
                return Err(ProxyError::AuthFailed);
            }
        }

        let target = if is_socks4a {
            let host_bytes = read_nullterminated(client).await?;
            let host = String::from_utf8(host_bytes).map_err(|_| ProxyError::Protocol("non-ASCII hostname".into()))?;
            Target::Domain(host, port)
        } else {
            Target::ipv4([addr_bytes[0], addr_bytes[1], addr_bytes[2], addr_bytes[3]], port)
        };

        match target.connect().await {
            Ok(remote_socket) => {
                reply(client, REPLY_GRANTED).await.map_err(crate::error::classify_io_error)?;
                Ok(BufferedStream::new(remote_socket))
            }
            Err(source) => {
                let _ = reply(client, REPLY_IDENTD_FAIL).await;
                Err(ProxyError::RemoteConnect {
                    host: target.to_string(),
                    port,
                    source,
                })
            }
        }
    }
}

async fn read_nullterminated(client: &mut BufferedStream) -> Result<Vec<u8>, ProxyError> {
    let mut field = client.receive_until(0x00, 256).await.map_err(crate::error::classify_io_error)?;
    field.pop();
    Ok(field)
}

async fn reply(client: &mut BufferedStream, code: u8) -> std::io::Result<()> {
    client.send(&[0x00, code, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]).await
}
