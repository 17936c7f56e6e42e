// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Named signal-generation profile. Doubles as the broadcast-group key:
/// subscribers join the group named after the mode they want to receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Noise,
    Sines,
}

impl Mode {
    pub const ALL: [Mode; 2] = [Mode::Noise, Mode::Sines];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Noise => "noise",
            Mode::Sines => "sines",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "noise" => Ok(Mode::Noise),
            "sines" => Ok(Mode::Sines),
            other => Err(format!(
                "unknown mode: {} (available: noise, sines)",
                other
            )),
        }
    }
}
