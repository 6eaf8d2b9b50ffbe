//!
//! Command dispatcher: turns one received datagram into an opcode + args and
//! executes it against the table, the sender's reply handle, and gossip.
//!
//! Grounded on `original_source/src/server.c`'s `treat_cmd` opcode table.
//! Tokenization here uses `str::split_whitespace` rather than the literal
//! single-space `splitter::split`, so runs of spaces don't shift positional
//! argument indices; `splitter` remains available as its own standalone
//! component.
//!

use log::{info, warn};

use crate::config::NULL_TERMINATOR;
use crate::error::DhtError;
use crate::gossip;
use crate::net::NetHandle;
use crate::table::Table;

/// Parses and executes one datagram's payload. `reply_to` is the
/// send-capable handle synthesized from the datagram's sender address.
/// `hash_deprecation_time` is the configured freshness bound a `get` uses
/// to decide whether a record is still returnable.
pub async fn dispatch(
    payload: &str,
    reply_to: &NetHandle,
    table: &Table,
    hash_deprecation_time: u64,
) {
    let mut tokens = payload.split_whitespace();
    let opcode = match tokens.next() {
        Some(op) => op,
        None => return,
    };
    let args: Vec<&str> = tokens.collect();

    let result = match opcode {
        "put" => handle_put(&args, table).await,
        "get" => handle_get(&args, reply_to, table, hash_deprecation_time).await,
        "plzgibhashes" => handle_plzgibhashes(&args, reply_to, table).await,
        "kktakethis" => handle_kktakethis(&args, table).await,
        "i_exist" => handle_i_exist(&args),
        other => {
            warn!("ignoring unknown opcode '{other}'");
            Ok(())
        }
    };

    if let Err(e) = result {
        warn!("dispatch of '{opcode}' failed: {e}");
    }
}

async fn handle_put(args: &[&str], table: &Table) -> Result<(), DhtError> {
    let [hash, ip] = require_arity(args, "put")?;
    table.update(hash, ip, None).await
}

async fn handle_get(
    args: &[&str],
    reply_to: &NetHandle,
    table: &Table,
    hash_deprecation_time: u64,
) -> Result<(), DhtError> {
    let [hash] = require_arity::<1>(args, "get")?;

    let (mut cursor, mut next) = table.lookup_first(hash).await;
    while let Some(record) = next {
        let now = crate::utils::unix_ts();
        if record.is_fresh(now, hash_deprecation_time) {
            if let Err(e) = reply_to.send_text(&record.ip).await {
                warn!("get reply send failed: {e}");
            }
        }
        next = table.lookup_next(&mut cursor).await;
    }

    reply_to
        .send_text(NULL_TERMINATOR)
        .await
        .map(|_| ())
}

async fn handle_plzgibhashes(
    args: &[&str],
    reply_to: &NetHandle,
    table: &Table,
) -> Result<(), DhtError> {
    let [] = require_arity::<0>(args, "plzgibhashes")?;
    gossip::share_hashes(table, reply_to).await;
    Ok(())
}

async fn handle_kktakethis(args: &[&str], table: &Table) -> Result<(), DhtError> {
    let [hash, ip, ts] = require_arity::<3>(args, "kktakethis")?;
    let timestamp: u64 = ts
        .parse()
        .map_err(|_| DhtError::BadArgument(format!("kktakethis timestamp '{ts}' not an integer")))?;
    table.update(hash, ip, Some(timestamp)).await
}

fn handle_i_exist(args: &[&str]) -> Result<(), DhtError> {
    let [] = require_arity::<0>(args, "i_exist")?;
    info!("i_exist keep-alive received");
    Ok(())
}

fn require_arity<const N: usize>(args: &[&str], opcode: &str) -> Result<[&str; N], DhtError> {
    <[&str; N]>::try_from(args).map_err(|_| {
        DhtError::BadArgument(format!(
            "{opcode} expects {N} argument(s), got {}",
            args.len()
        ))
    })
}
