// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Configuration file support for iqsim-generator.
//!
//! Config is loaded from the `[iqsim-generator]` section of `iqsim.toml`.
//! Default search order:
//! 1. Path specified via `--config` CLI argument
//! 2. `./iqsim.toml`
//! 3. `~/.config/iqsim/iqsim.toml`
//! 4. `/etc/iqsim/iqsim.toml`

use std::net::{IpAddr, Ipv4Addr};

use serde::{Deserialize, Serialize};

use iqsim_app::ConfigFile;

/// Top-level generator configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// General settings
    pub general: GeneralConfig,
    /// TCP listener configuration
    pub listen: ListenConfig,
    /// Stream session timing and behavior
    pub stream: StreamConfig,
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: Option<String>,
}

/// TCP listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenConfig {
    /// IP address both listeners bind to
    pub listen: IpAddr,
    /// Port of the stream-plane listener (framed IQ chunks)
    pub stream_port: u16,
    /// Port of the JSON control listener
    pub control_port: u16,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            listen: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            stream_port: 4700,
            control_port: 4701,
        }
    }
}

/// Stream session timing and behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Start the stream sessions at boot
    pub auto_start: bool,
    /// Duration of each synthesized segment (ms)
    pub segment_ms: u64,
    /// Duration of the silence gap between segments (ms)
    pub silence_ms: u64,
    /// Chunk emission period (ms)
    pub chunk_period_ms: u16,
    /// Per-mode broadcast channel capacity (chunks)
    pub channel_capacity: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            auto_start: true,
            segment_ms: iqsim_dsp::SEGMENT_DURATION_MS,
            silence_ms: iqsim_dsp::SILENCE_DURATION_MS,
            chunk_period_ms: 100,
            channel_capacity: 256,
        }
    }
}

fn validate_log_level(level: Option<&str>) -> Result<(), String> {
    match level {
        None | Some("trace") | Some("debug") | Some("info") | Some("warn") | Some("error") => {
            Ok(())
        }
        Some(other) => Err(format!("[general].log_level is invalid: {}", other)),
    }
}

impl GeneratorConfig {
    pub fn validate(&self) -> Result<(), String> {
        validate_log_level(self.general.log_level.as_deref())?;

        if self.listen.stream_port == 0 {
            return Err("[listen].stream_port must be > 0".to_string());
        }
        if self.listen.control_port == 0 {
            return Err("[listen].control_port must be > 0".to_string());
        }
        if self.stream.chunk_period_ms == 0 {
            return Err("[stream].chunk_period_ms must be > 0".to_string());
        }
        if self.stream.segment_ms < self.stream.chunk_period_ms as u64 {
            return Err("[stream].segment_ms must be >= chunk_period_ms".to_string());
        }
        if self.stream.silence_ms == 0 {
            return Err("[stream].silence_ms must be > 0".to_string());
        }
        if self.stream.channel_capacity == 0 {
            return Err("[stream].channel_capacity must be > 0".to_string());
        }
        Ok(())
    }

    /// Example configuration with all defaults, for `--print-config`.
    pub fn example_toml() -> String {
        let value =
            toml::Value::try_from(Self::default()).expect("default config serializes to TOML");
        let mut root = toml::map::Map::new();
        root.insert(Self::section_key().to_string(), value);
        toml::to_string_pretty(&toml::Value::Table(root))
            .expect("default config serializes to TOML")
    }
}

impl ConfigFile for GeneratorConfig {
    fn section_key() -> &'static str {
        "iqsim-generator"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(GeneratorConfig::default().validate().is_ok());
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut cfg = GeneratorConfig::default();
        cfg.stream.chunk_period_ms = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = GeneratorConfig::default();
        cfg.stream.segment_ms = 50;
        assert!(cfg.validate().is_err());

        let mut cfg = GeneratorConfig::default();
        cfg.general.log_level = Some("loud".to_string());
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn example_toml_round_trips() {
        let toml_str = GeneratorConfig::example_toml();
        let table: toml::Table = toml::from_str(&toml_str).unwrap();
        assert!(table.contains_key("iqsim-generator"));
    }
}
