use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{debug, error, info};

use crate::driver::handle_connection;
use crate::handler::Handler;
use crate::settings::ProxyEntry;

/// Binds one listener and accepts connections for as long as the process
/// runs, spawning a child task per connection. An accept error is logged and
/// retried; it never brings the listener down.
pub async fn run_listener(entry: ProxyEntry) -> std::io::Result<()> {
    let listener = TcpListener::bind(entry.bind_addr).await?;
    let handler = Arc::new(entry.handler);
    info!("{} listening on {}", handler.name(), entry.bind_addr);

    loop {
        match listener.accept().await {
            Ok((socket, peer)) => {
                debug!("{} accepted connection from {}", handler.name(), peer);
                let handler = Arc::clone(&handler);
                tokio::spawn(async move {
                    handle_connection(socket, peer, handler).await;
                });
            }
            Err(err) => {
                error!("{} accept error: {}", handler.name(), err);
            }
        }
    }
}
