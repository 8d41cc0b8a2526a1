/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::CacheSettings;

/// Engine settings. Every field is optional; the accessors apply defaults
/// and clamp to sane ranges.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EngineConfig {
    /// Public host of this instance, used to mint local URIs.
    #[serde(default)]
    pub host: Option<String>,
    /// "https" unless set.
    #[serde(default)]
    pub protocol: Option<String>,
    #[serde(default)]
    pub db_path: Option<String>,
    /// Worker counts per pool. 0 or unset: four per available CPU.
    #[serde(default)]
    pub client_workers: Option<usize>,
    #[serde(default)]
    pub fedi_workers: Option<usize>,
    #[serde(default)]
    pub delivery_workers: Option<usize>,
    /// Queue capacity as a multiple of the worker count. 0 or unset: 100.
    #[serde(default)]
    pub queue_ratio: Option<usize>,
    #[serde(default)]
    pub cache_sweep_interval_secs: Option<u64>,
    #[serde(default)]
    pub cache_max_entries: Option<usize>,
    #[serde(default)]
    pub visibility_ttl_secs: Option<u64>,
    #[serde(default)]
    pub mutes_ttl_secs: Option<u64>,
    /// Remote copies younger than this are not refetched.
    #[serde(default)]
    pub fresh_window_secs: Option<u64>,
    #[serde(default)]
    pub timeline_max_items: Option<usize>,
    #[serde(default)]
    pub timeline_prune_to: Option<usize>,
    #[serde(default)]
    pub delivery_timeout_secs: Option<u64>,
    #[serde(default)]
    pub delivery_attempts: Option<u32>,
    #[serde(default)]
    pub delivery_max_per_host: Option<usize>,
    #[serde(default)]
    pub user_agent: Option<String>,
}

impl EngineConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("parse engine config")
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read engine config: {}", path.display()))?;
        Self::from_json(&text)
    }

    pub fn host(&self) -> &str {
        self.host
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or("localhost")
    }

    pub fn protocol(&self) -> &str {
        self.protocol
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or("https")
    }

    pub fn db_path(&self) -> PathBuf {
        PathBuf::from(self.db_path.as_deref().unwrap_or("fedi3.db"))
    }

    pub fn client_workers(&self) -> usize {
        self.client_workers.unwrap_or(0)
    }

    pub fn fedi_workers(&self) -> usize {
        self.fedi_workers.unwrap_or(0)
    }

    pub fn delivery_workers(&self) -> usize {
        self.delivery_workers.unwrap_or(0)
    }

    pub fn queue_ratio(&self) -> usize {
        self.queue_ratio.unwrap_or(0)
    }

    pub fn cache_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.cache_sweep_interval_secs.unwrap_or(30).clamp(1, 3600))
    }

    pub fn cache_settings(&self) -> CacheSettings {
        CacheSettings {
            max_entries: self.cache_max_entries.unwrap_or(10_000).max(16),
            visibility_ttl: Duration::from_secs(self.visibility_ttl_secs.unwrap_or(300)),
            mutes_ttl: Duration::from_secs(self.mutes_ttl_secs.unwrap_or(300)),
        }
    }

    pub fn fresh_window(&self) -> Duration {
        Duration::from_secs(self.fresh_window_secs.unwrap_or(300))
    }

    pub fn timeline_max_items(&self) -> usize {
        self.timeline_max_items.unwrap_or(400).max(1)
    }

    pub fn timeline_prune_to(&self) -> usize {
        self.timeline_prune_to
            .unwrap_or(200)
            .min(self.timeline_max_items())
    }

    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_secs(self.delivery_timeout_secs.unwrap_or(30).clamp(5, 120))
    }

    pub fn delivery_attempts(&self) -> u32 {
        self.delivery_attempts.unwrap_or(5).clamp(1, 5)
    }

    pub fn delivery_max_per_host(&self) -> usize {
        self.delivery_max_per_host.unwrap_or(4).max(1)
    }

    pub fn user_agent(&self) -> String {
        self.user_agent
            .clone()
            .unwrap_or_else(|| format!("fedi3/{}", env!("CARGO_PKG_VERSION")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_to_an_empty_document() {
        let cfg = EngineConfig::from_json("{}").unwrap();
        assert_eq!(cfg.host(), "localhost");
        assert_eq!(cfg.protocol(), "https");
        assert_eq!(cfg.fresh_window(), Duration::from_secs(300));
        assert_eq!(cfg.timeline_max_items(), 400);
        assert_eq!(cfg.timeline_prune_to(), 200);
        assert_eq!(cfg.delivery_attempts(), 5);
        assert_eq!(cfg.cache_settings().max_entries, 10_000);
    }

    #[test]
    fn values_are_clamped() {
        let cfg = EngineConfig::from_json(
            r#"{"delivery_timeout_secs": 1, "timeline_max_items": 50, "timeline_prune_to": 80, "host": " social.example "}"#,
        )
        .unwrap();
        assert_eq!(cfg.delivery_timeout(), Duration::from_secs(5));
        assert_eq!(cfg.timeline_prune_to(), 50);
        assert_eq!(cfg.host(), "social.example");
    }

    #[test]
    fn load_reads_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");
        std::fs::write(&path, r#"{"client_workers": 3}"#).unwrap();
        assert_eq!(EngineConfig::load(&path).unwrap().client_workers(), 3);
        assert!(EngineConfig::load(dir.path().join("missing.json")).is_err());
    }
}
