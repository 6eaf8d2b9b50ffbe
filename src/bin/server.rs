//!
//! `reseau-dht-server`: binds a UDP/IPv6 endpoint, services the DHT command
//! protocol, and runs the deprecation collector alongside it.
//!
//! Startup order, signal handling, and the joinable-collector shutdown path
//! are grounded on `original_source/src/server.c`'s `main`, redesigned so a
//! `tokio::sync::watch` channel replaces the original's process-wide
//! shutdown pointers, and the collector is `.await`ed instead of abandoned
//! by `exit()`.
//!

use clap::Parser;
use log::{error, info, warn};
use tokio::sync::watch;

use reseau_dht::config::{self, ServerArgs};
use reseau_dht::dispatcher;
use reseau_dht::error::DhtError;
use reseau_dht::net::{NetHandle, OpenMode};
use reseau_dht::table::Table;

#[tokio::main]
async fn main() {
    if let Err(e) = config::setup_logger() {
        panic!("unable to initialize the logger: {e}");
    }

    let args = ServerArgs::parse();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    spawn_signal_handlers(shutdown_tx.clone());

    let table = Table::new();
    let collector = tokio::spawn(reseau_dht::collector::run(
        table.clone(),
        args.hash_deprecation_time,
        args.garbage_col_time,
        shutdown_rx.clone(),
    ));

    let host = if args.host.is_empty() {
        None
    } else {
        Some(args.host.as_str())
    };
    let mut listener = match NetHandle::open(host, args.port, OpenMode::Listen).await {
        Ok(handle) => handle,
        Err(e) => {
            error!("failed to open listening endpoint: {e}");
            std::process::exit(1);
        }
    };

    if args.multicast {
        if let Err(e) = listener.join_multicast_v6(0) {
            warn!("multicast join did not succeed, continuing unicast-only: {e}");
        }
    }

    info!(
        "reseau-dht-server listening on {}:{}",
        if args.host.is_empty() { "[::]" } else { &args.host },
        args.port
    );

    run_receive_loop(listener, table, args.hash_deprecation_time, shutdown_rx).await;

    info!("receive loop exited, joining collector");
    shutdown_tx.send(true).ok();
    if let Err(e) = collector.await {
        warn!("collector task panicked: {e}");
    }
}

async fn run_receive_loop(
    mut listener: NetHandle,
    table: Table,
    hash_deprecation_time: u64,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            received = listener.receive() => {
                match received {
                    Ok((len, reply_to)) => {
                        let payload = match std::str::from_utf8(&listener.payload()[..len]) {
                            Ok(text) => text,
                            Err(_) => {
                                warn!("dropping non-UTF-8 datagram");
                                continue;
                            }
                        };
                        dispatcher::dispatch(payload, &reply_to, &table, hash_deprecation_time).await;
                    }
                    Err(DhtError::SocketClosed) | Err(DhtError::RecvFailed(_)) => {
                        warn!("receive loop ending: socket closed or recv failed");
                        break;
                    }
                    Err(e) => {
                        warn!("unexpected error from receive: {e}");
                        break;
                    }
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("shutdown signal received, ending receive loop");
                    break;
                }
            }
        }
    }

    listener.close();
    table.free_all().await;
}

fn spawn_signal_handlers(shutdown_tx: watch::Sender<bool>) {
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            let mut terminate = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler");
            tokio::select! {
                _ = ctrl_c => info!("received SIGINT"),
                _ = terminate.recv() => info!("received SIGTERM"),
            }
        }
        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
            info!("received Ctrl-C");
        }

        shutdown_tx.send(true).ok();
    });
}
