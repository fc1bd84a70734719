use std::sync::Arc;

use tokio::net::TcpStream;
use tracing::{debug, error, info};

use crate::handler::Handler;
use crate::stream::BufferedStream;
use crate::tunnel::run_tunnel;

/// Drives a single accepted connection end to end: handshake, remote
/// connect, tunnel, cleanup. No failure here is allowed to escape and affect
/// any other connection or the accept loop it was spawned from.
pub async fn handle_connection(socket: TcpStream, peer: std::net::SocketAddr, handler: Arc<Handler>) {
    let mut client = BufferedStream::new(socket);

    let remote = match handler.connect_to_remote(&mut client).await {
        Ok(remote) => remote,
        Err(err) => {
            error!("{} connection from {} failed: {}", handler.name(), peer, err);
            debug!("{} connection from {} failed: {:?}", handler.name(), peer, err);
            let _ = client.close().await;
            return;
        }
    };

    info!("{} connection from {} tunneling", handler.name(), peer);
    run_tunnel(client, remote).await;
    debug!("{} connection from {} closed", handler.name(), peer);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpConfig;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn failed_handshake_does_not_panic_or_hang() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let mut client = TcpStream::connect(addr).await.unwrap();
        let (server, peer) = listener.accept().await.unwrap();

        client.write_all(b"not a valid request\r\n\r\n").await.unwrap();

        let handler = Arc::new(Handler::http(HttpConfig::default()));
        handle_connection(server, peer, handler).await;
    }
}
