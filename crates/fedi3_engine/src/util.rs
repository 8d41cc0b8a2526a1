/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use rand::{rngs::OsRng, RngCore};

pub fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// New lexically sortable ID: 12 hex chars of millisecond time followed by
/// 16 random hex chars. IDs created in a later millisecond always sort after.
pub fn new_id() -> String {
    new_id_at(now_ms())
}

pub fn new_id_at(ms: i64) -> String {
    let mut b = [0u8; 8];
    OsRng.fill_bytes(&mut b);
    format!("{:012x}{}", ms.max(0) as u64 & 0xffff_ffff_ffff, hex::encode(b))
}

pub fn host_from_url(url: &str) -> Option<String> {
    let rest = url.split_once("://").map(|(_, r)| r).unwrap_or(url);
    let host = rest.split(['/', '?', '#']).next()?.trim();
    if host.is_empty() {
        return None;
    }
    Some(host.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_sort_by_time() {
        let a = new_id_at(1_000);
        let b = new_id_at(1_001);
        assert!(a < b);
        assert_eq!(a.len(), 28);
    }

    #[test]
    fn host_is_extracted() {
        assert_eq!(
            host_from_url("https://Example.org/users/a/inbox").as_deref(),
            Some("example.org")
        );
        assert_eq!(host_from_url("https://"), None);
    }
}
