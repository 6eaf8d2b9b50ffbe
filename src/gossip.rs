//!
//! Gossip fan-out: serializing table entries into `kktakethis` datagrams.
//!
//! Grounded on `original_source/src/server.c`'s `share_hash`/`share_hashes`.
//!

use log::warn;

use crate::net::NetHandle;
use crate::table::Table;

/// Sends one `kktakethis <hash> <ip> <timestamp>` datagram to `peer`,
/// preserving the record's own timestamp so deprecation stays consistent
/// across the mesh.
pub async fn share_hash(record: &crate::common::Record, peer: &NetHandle) {
    let message = format!(
        "kktakethis {} {} {}",
        record.hash, record.ip, record.timestamp
    );
    if let Err(e) = peer.send_text(&message).await {
        warn!("gossip send failed for {}: {e}", record.hash);
    }
}

/// Iterates every live slot and gossips it to `peer`. Not atomic with
/// respect to concurrent mutation: it may miss or double-send records
/// inserted mid-scan, which callers tolerate.
pub async fn share_hashes(table: &Table, peer: &NetHandle) {
    for record in table.live_records().await {
        share_hash(&record, peer).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::OpenMode;

    #[tokio::test]
    async fn test_share_hashes_sends_one_datagram_per_record() {
        let table = Table::new();
        table.update("h1", "::1", Some(10)).await.unwrap();
        table.update("h2", "::2", Some(20)).await.unwrap();

        let mut listener = NetHandle::open(Some("::1"), 0, OpenMode::Listen)
            .await
            .unwrap();
        let port = listener.local_addr().unwrap().port();
        let sender = NetHandle::open(Some("::1"), port, OpenMode::Send)
            .await
            .unwrap();

        share_hashes(&table, &sender).await;

        let mut seen = Vec::new();
        for _ in 0..2 {
            let (len, _) = listener.receive().await.unwrap();
            seen.push(String::from_utf8(listener.payload()[..len].to_vec()).unwrap());
        }
        seen.sort();
        assert_eq!(
            seen,
            vec!["kktakethis h1 ::1 10".to_string(), "kktakethis h2 ::2 20".to_string()]
        );
    }
}
