mod args;
mod driver;
mod error;
mod handler;
mod http;
mod listener;
mod logging;
mod settings;
mod socks;
mod stream;
mod target;
mod tunnel;

use clap::Parser;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = args::Args::parse();
    logging::init(args.verbose, args.quiet);

    let settings = settings::load_or_default(args.config.as_deref())?;
    let entries = settings.into_entries();

    let mut tasks = Vec::with_capacity(entries.len());
    for entry in entries {
        let bind_addr = entry.bind_addr;
        tasks.push(tokio::spawn(async move {
            if let Err(err) = listener::run_listener(entry).await {
                error!("listener on {} failed: {}", bind_addr, err);
            }
        }));
    }

    tokio::select! {
        _ = futures_all(tasks) => {}
        _ = tokio::signal::ctrl_c() => {
            info!("shutting down on ctrl-c");
        }
    }

    Ok(())
}

async fn futures_all(tasks: Vec<tokio::task::JoinHandle<()>>) {
    for task in tasks {
        let _ = task.await;
    }
}
