//!
//! Static configuration: tunable protocol parameters and the CLI surfaces
//! for the server and client binaries.
//!

use clap::{Parser, Subcommand};

use crate::utils;

/// Maximum size of a single UDP datagram payload we'll ever read or build.
pub const BUFF_SIZE: usize = 131_072;

/// Maximum age (seconds) for a record to still be returned to a `get`, and
/// the collector's sleep interval between sweeps.
pub const HASH_DEPRECATION_TIME: u64 = 30;

/// Maximum age (seconds) before the collector evicts a record outright.
pub const GARBAGE_COL_TIME: u64 = 300;

/// Number of slots the table grows by each time it runs out of room.
pub const TABLE_GROWTH: usize = 512;

/// The terminator datagram sent to end a `get` reply stream.
pub const NULL_TERMINATOR: &str = "(null)";

/// CLI arguments for `reseau-dht-server`.
#[derive(Parser, Debug)]
#[clap(author, version, about = "A naive DHT node over UDP/IPv6.", long_about = None)]
pub struct ServerArgs {
    /// Host to bind to. Pass an empty string to passively bind `[::]:<port>`.
    pub host: String,
    /// Port to bind to.
    pub port: u16,

    /// Maximum age (seconds) for a record to still satisfy a `get`.
    #[clap(long, default_value_t = HASH_DEPRECATION_TIME)]
    pub hash_deprecation_time: u64,
    /// Maximum age (seconds) before the collector evicts a record.
    #[clap(long, default_value_t = GARBAGE_COL_TIME)]
    pub garbage_col_time: u64,
    /// Attempt the best-effort IPv6 multicast join at startup.
    #[clap(long, action)]
    pub multicast: bool,
}

/// Modes in which the client can operate.
#[derive(Subcommand, Debug, Clone)]
pub enum ClientCommand {
    /// Look up every holder of a hash; prints one IP per line, terminates on `(null)`.
    Get {
        /// Hash to look up.
        hash: String,
    },
    /// Publish an association between a hash and the IP that holds it.
    Put {
        /// Hash being published.
        hash: String,
        /// IP advertising that hash.
        ip: String,
    },
}

/// CLI arguments for `reseau-dht-client`.
#[derive(Parser, Debug)]
#[clap(author, version, about = "A client for the naive DHT protocol.", long_about = None)]
pub struct ClientArgs {
    /// Host of the DHT node to contact.
    pub host: String,
    /// Port of the DHT node to contact.
    pub port: u16,
    #[clap(subcommand)]
    pub command: ClientCommand,
}

/// Maps the `DEBUG_RESEAU` environment variable onto a `log` level filter.
///
/// `0` (or unset) is quiet, `1` surfaces warnings, `2` or higher surfaces
/// info/success messages too.
fn debug_reseau_level() -> log::LevelFilter {
    let raw = std::env::var("DEBUG_RESEAU")
        .ok()
        .and_then(|s| s.parse::<i32>().ok())
        .unwrap_or(0);

    match raw {
        i32::MIN..=0 => log::LevelFilter::Error,
        1 => log::LevelFilter::Warn,
        2 => log::LevelFilter::Info,
        _ => log::LevelFilter::Debug,
    }
}

/// Sets up the logger, gating third-party crates at `Warn` and this binary
/// at the level `DEBUG_RESEAU` requests.
pub fn setup_logger() -> Result<(), fern::InitError> {
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{}][{}] {}",
                chrono::Local::now().format("%H:%M:%S"),
                record.level(),
                message
            ))
        })
        .level(log::LevelFilter::Warn)
        .level_for(utils::binary_name(), debug_reseau_level())
        .chain(std::io::stdout())
        .apply()?;
    Ok(())
}
