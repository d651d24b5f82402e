//! QR-code login ticket model

use serde::{Deserialize, Serialize};

/// Lifecycle of a QR-code login
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum QrCodeState {
    #[default]
    Waiting,
    Scanned,
    ConfirmAuth,
    CancelAuth,
    Expired,
}

/// QR-code login ticket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QrCode {
    pub id: String,
    pub state: QrCodeState,
    #[serde(default)]
    pub login_id: String,
    #[serde(default)]
    pub ticket: String,
}

impl QrCode {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            state: QrCodeState::Waiting,
            login_id: String::new(),
            ticket: String::new(),
        }
    }

    /// Mark the code as scanned by `login_id`
    pub fn scan(&mut self, login_id: impl Into<String>) -> bool {
        if self.state != QrCodeState::Waiting {
            return false;
        }
        self.login_id = login_id.into();
        self.state = QrCodeState::Scanned;
        true
    }

    /// Confirm the login and attach the temporary ticket
    pub fn confirm(&mut self, ticket: impl Into<String>) -> bool {
        if self.state != QrCodeState::Scanned {
            return false;
        }
        self.ticket = ticket.into();
        self.state = QrCodeState::ConfirmAuth;
        true
    }

    pub fn cancel(&mut self) -> bool {
        if self.state != QrCodeState::Scanned {
            return false;
        }
        self.state = QrCodeState::CancelAuth;
        true
    }
}
