// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Control-plane protocol (JSON lines over TCP).

use serde::{Deserialize, Serialize};

use crate::filter::FilterCutoffs;

/// Command received from control clients (JSON).
///
/// The generator answers `Start`/`Stop`/`GetStatus`; the analyzer answers
/// the filter and mode commands. Unknown commands fail to parse and are
/// rejected with an error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum ClientCommand {
    Start,
    Stop,
    GetStatus,
    SetFilter { low_cut: f64, high_cut: f64 },
    GetFilter,
    ResetFilter,
    SetMode { mode: String },
    GetMode,
}

/// Response sent to control clients over TCP.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<FilterCutoffs>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl ClientResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
            filter: None,
            mode: None,
            status: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
            filter: None,
            mode: None,
            status: None,
        }
    }

    pub fn with_filter(mut self, cutoffs: FilterCutoffs) -> Self {
        self.filter = Some(cutoffs);
        self
    }

    pub fn with_mode(mut self, mode: impl Into<String>) -> Self {
        self.mode = Some(mode.into());
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_parse_from_tagged_json() {
        let cmd: ClientCommand =
            serde_json::from_str(r#"{"cmd":"set_filter","low_cut":100.0,"high_cut":8000.0}"#)
                .unwrap();
        assert!(matches!(
            cmd,
            ClientCommand::SetFilter {
                low_cut,
                high_cut,
            } if low_cut == 100.0 && high_cut == 8000.0
        ));

        let cmd: ClientCommand = serde_json::from_str(r#"{"cmd":"start"}"#).unwrap();
        assert!(matches!(cmd, ClientCommand::Start));
    }

    #[test]
    fn set_filter_requires_both_cutoffs() {
        let parsed =
            serde_json::from_str::<ClientCommand>(r#"{"cmd":"set_filter","low_cut":100.0}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn response_omits_empty_fields() {
        let json = serde_json::to_string(&ClientResponse::ok()).unwrap();
        assert_eq!(json, r#"{"success":true}"#);

        let json =
            serde_json::to_string(&ClientResponse::ok().with_mode("noise")).unwrap();
        assert!(json.contains(r#""mode":"noise""#));
    }
}
