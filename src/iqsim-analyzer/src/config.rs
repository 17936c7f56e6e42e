// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Configuration file support for iqsim-analyzer.
//!
//! Config is loaded from the `[iqsim-analyzer]` section of `iqsim.toml`;
//! the search order matches the generator (CLI path → CWD → XDG → /etc).

use std::net::{IpAddr, Ipv4Addr};

use serde::{Deserialize, Serialize};

use iqsim_app::{normalize_name, ConfigFile};
use iqsim_core::Mode;

/// Top-level analyzer configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// General settings
    pub general: GeneralConfig,
    /// Upstream IQ generator connection
    pub generator: GeneratorLinkConfig,
    /// TCP listener configuration
    pub listen: ListenConfig,
    /// Analysis pipeline settings
    pub analysis: AnalysisConfig,
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: Option<String>,
}

/// Upstream IQ generator connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorLinkConfig {
    /// Generator host
    pub host: String,
    /// Generator stream-plane port
    pub port: u16,
    /// Mode subscribed on connect
    pub mode: String,
}

impl Default for GeneratorLinkConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 4700,
            mode: "noise".to_string(),
        }
    }
}

impl GeneratorLinkConfig {
    pub fn connect_addr(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

/// TCP listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenConfig {
    /// IP address all listeners bind to
    pub listen: IpAddr,
    /// Port of the analysis-plane listener (framed analysis frames)
    pub analysis_port: u16,
    /// Port of the JSON control listener
    pub control_port: u16,
    /// Port of the WAV audio stream listener
    pub audio_port: u16,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            listen: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            analysis_port: 4800,
            control_port: 4801,
            audio_port: 4802,
        }
    }
}

/// Analysis pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Sample rate the filters are designed for (Hz)
    pub sample_rate: u32,
    /// Analysis frame broadcast channel capacity
    pub channel_capacity: usize,
    /// Incoming chunk queue depth
    pub chunk_queue: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            sample_rate: iqsim_dsp::SAMPLE_RATE_HZ,
            channel_capacity: 256,
            chunk_queue: 64,
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

impl AnalyzerConfig {
    pub fn validate(&self) -> Result<(), String> {
        validate_log_level(self.general.log_level.as_deref())?;

        if self.generator.host.trim().is_empty() {
            return Err("[generator].host must not be empty".to_string());
        }
        if self.generator.port == 0 {
            return Err("[generator].port must be > 0".to_string());
        }
        self.initial_mode()
            .map_err(|e| format!("[generator].mode is invalid: {}", e))?;

        if self.listen.analysis_port == 0 {
            return Err("[listen].analysis_port must be > 0".to_string());
        }
        if self.listen.control_port == 0 {
            return Err("[listen].control_port must be > 0".to_string());
        }
        if self.listen.audio_port == 0 {
            return Err("[listen].audio_port must be > 0".to_string());
        }

        if self.analysis.sample_rate == 0 {
            return Err("[analysis].sample_rate must be > 0".to_string());
        }
        if self.analysis.channel_capacity == 0 {
            return Err("[analysis].channel_capacity must be > 0".to_string());
        }
        if self.analysis.chunk_queue == 0 {
            return Err("[analysis].chunk_queue must be > 0".to_string());
        }
        Ok(())
    }

    /// Mode subscribed when the upstream connection comes up.
    pub fn initial_mode(&self) -> Result<Mode, String> {
        normalize_name(&self.generator.mode).parse()
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

impl ConfigFile for AnalyzerConfig {
    fn section_key() -> &'static str {
        "iqsim-analyzer"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let cfg = AnalyzerConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.initial_mode().unwrap(), Mode::Noise);
        assert_eq!(cfg.generator.connect_addr(), "127.0.0.1:4700");
    }

    #[test]
    fn unknown_initial_mode_is_a_config_error() {
        let mut cfg = AnalyzerConfig::default();
        cfg.generator.mode = "triangle".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn ipv6_host_is_bracketed() {
        let link = GeneratorLinkConfig {
            host: "::1".to_string(),
            port: 4700,
            mode: "noise".to_string(),
        };
        assert_eq!(link.connect_addr(), "[::1]:4700");
    }
}
