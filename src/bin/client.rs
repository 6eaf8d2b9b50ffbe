//!
//! `reseau-dht-client`: issues a single `put` or `get` command against a DHT
//! node.
//!
//! Grounded on `original_source/src/client.c`'s argument handling and its
//! get-loop that reads replies until it sees the literal `(null)` terminator.
//!

use clap::Parser;
use log::error;

use reseau_dht::config::{self, ClientArgs, ClientCommand};
use reseau_dht::net::{NetHandle, OpenMode};

#[tokio::main]
async fn main() {
    if let Err(e) = config::setup_logger() {
        panic!("unable to initialize the logger: {e}");
    }

    let args = ClientArgs::parse();

    let mut server = match NetHandle::open(Some(&args.host), args.port, OpenMode::Send).await {
        Ok(handle) => handle,
        Err(e) => {
            error!("failed to reach {}:{}: {e}", args.host, args.port);
            std::process::exit(1);
        }
    };

    let outcome = match args.command {
        ClientCommand::Put { hash, ip } => run_put(&server, &hash, &ip).await,
        ClientCommand::Get { hash } => run_get(&mut server, &hash).await,
    };

    if let Err(e) = outcome {
        error!("{e}");
        std::process::exit(1);
    }
}

async fn run_put(server: &NetHandle, hash: &str, ip: &str) -> Result<(), reseau_dht::error::DhtError> {
    server.send_text(&format!("put {hash} {ip}")).await?;
    Ok(())
}

/// A `Send`-mode handle binds a real local socket (see `NetHandle::open`),
/// so the same handle used to send the request can read the reply stream
/// off of it, since the server's replies arrive addressed at our ephemeral
/// port.
async fn run_get(server: &mut NetHandle, hash: &str) -> Result<(), reseau_dht::error::DhtError> {
    server.send_text(&format!("get {hash}")).await?;

    loop {
        let (len, _reply_from) = server.receive().await?;
        let text = String::from_utf8_lossy(&server.payload()[..len]).into_owned();
        if text == config::NULL_TERMINATOR {
            break;
        }
        println!("{text}");
    }
    Ok(())
}
