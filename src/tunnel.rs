use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::stream::{BufferedReadHalf, BufferedStream};

const COPY_BUFFER_SIZE: usize = 65536;

pub async fn run_tunnel(client: BufferedStream, remote: BufferedStream) {
    let (client_read, client_write) = client.into_split();
    let (remote_read, remote_write) = remote.into_split();

    tokio::join!(
        pump(client_read, remote_write),
        pump(remote_read, client_write),
    );
}

async fn pump<W: AsyncWrite + Unpin>(mut reader: BufferedReadHalf, mut writer: W) {
    let mut buf = vec![0u8; COPY_BUFFER_SIZE];
    loop {
        let n = match reader.receive_into(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(_) => break,
        };
        if writer.write_all(&buf[..n]).await.is_err() {
            break;
        }
    }
    let _ = writer.shutdown().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::net::TcpStream;

    async fn connected_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let connector = tokio::spawn(async move { TcpStream::connect(addr).await.unwrap() });
        let (server, _) = listener.accept().await.unwrap();
        let client = connector.await.unwrap();
        (server, client)
    }

    #[tokio::test]
    async fn data_flows_both_ways_and_close_propagates() {
        let (client_server_side, mut client_peer) = connected_pair().await;
        let (remote_server_side, mut remote_peer) = connected_pair().await;

        let tunnel = tokio::spawn(run_tunnel(
            BufferedStream::new(client_server_side),
            BufferedStream::new(remote_server_side),
        ));

        client_peer.write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 4];
        remote_peer.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");

        remote_peer.write_all(b"pong").await.unwrap();
        let mut buf = [0u8; 4];
        client_peer.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"pong");

        drop(client_peer);
        let mut out = Vec::new();
        remote_peer.read_to_end(&mut out).await.unwrap();
        assert!(out.is_empty());

        tunnel.await.unwrap();
    }
}
