// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Session configuration

use serde::{Deserialize, Serialize};

use crate::trust::SecurityLevel;

/// Session configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// TLS trust tier for HTTPS exchanges
    pub security_level: SecurityLevel,
    /// Send cookies from the jar and store cookies the server sets
    pub handle_cookies: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            security_level: SecurityLevel::Medium,
            handle_cookies: true,
        }
    }
}

impl SessionConfig {
    /// Configuration for tests against self-signed servers
    pub fn insecure() -> Self {
        Self {
            security_level: SecurityLevel::Low,
            ..Default::default()
        }
    }

    /// Configuration that only trusts certificates chaining to known roots
    pub fn strict() -> Self {
        Self {
            security_level: SecurityLevel::High,
            ..Default::default()
        }
    }

    pub fn security_level(mut self, level: SecurityLevel) -> Self {
        self.security_level = level;
        self
    }

    pub fn handle_cookies(mut self, handle: bool) -> Self {
        self.handle_cookies = handle;
        self
    }
}
