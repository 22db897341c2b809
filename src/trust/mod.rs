// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! TLS trust policy
//!
//! Three tiers of certificate validation:
//! - [`SecurityLevel::Low`] accepts every certificate (testing only)
//! - [`SecurityLevel::Medium`] accepts certificates that chain to a trusted
//!   root and asks a [`TrustDecider`] about everything else
//! - [`SecurityLevel::High`] rejects anything not chaining to a trusted root

mod verifier;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use rustls::{ClientConfig, RootCertStore};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use verifier::{AcceptAllVerifier, DelegatingVerifier};

/// Certificate validation tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SecurityLevel {
    Low,
    #[default]
    Medium,
    High,
}

impl fmt::Display for SecurityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecurityLevel::Low => write!(f, "low"),
            SecurityLevel::Medium => write!(f, "medium"),
            SecurityLevel::High => write!(f, "high"),
        }
    }
}

/// Decides whether to trust a certificate the root store does not vouch for.
///
/// Consulted only at [`SecurityLevel::Medium`]. The handshake waits for the
/// answer, so implementations that prompt a user should resolve promptly
/// and must not depend on the handshake's own task to make progress.
#[async_trait]
pub trait TrustDecider: Send + Sync + fmt::Debug {
    /// `certificate` is the DER encoded end-entity certificate
    async fn is_server_trusted(&self, host: &str, certificate: &[u8]) -> bool;
}

/// Rejects every unknown certificate
#[derive(Debug, Clone, Copy, Default)]
pub struct RejectUnknown;

#[async_trait]
impl TrustDecider for RejectUnknown {
    async fn is_server_trusted(&self, _host: &str, _certificate: &[u8]) -> bool {
        false
    }
}

/// Accepts every unknown certificate
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptUnknown;

#[async_trait]
impl TrustDecider for AcceptUnknown {
    async fn is_server_trusted(&self, _host: &str, _certificate: &[u8]) -> bool {
        true
    }
}

/// A security level paired with the decider used at the Medium tier
#[derive(Debug, Clone)]
pub struct TrustPolicy {
    level: SecurityLevel,
    decider: Arc<dyn TrustDecider>,
}

impl Default for TrustPolicy {
    fn default() -> Self {
        Self::new(SecurityLevel::default())
    }
}

impl TrustPolicy {
    /// Create a policy that rejects unknown certificates
    pub fn new(level: SecurityLevel) -> Self {
        Self {
            level,
            decider: Arc::new(RejectUnknown),
        }
    }

    /// Set the decider consulted for unknown certificates
    pub fn with_decider(mut self, decider: Arc<dyn TrustDecider>) -> Self {
        self.decider = decider;
        self
    }

    pub fn level(&self) -> SecurityLevel {
        self.level
    }

    pub fn decider(&self) -> &Arc<dyn TrustDecider> {
        &self.decider
    }

    /// Identity used to share TLS clients between equal policies
    pub(crate) fn cache_key(&self) -> (SecurityLevel, usize) {
        let decider = match self.level {
            SecurityLevel::Medium => Arc::as_ptr(&self.decider) as *const () as usize,
            _ => 0,
        };
        (self.level, decider)
    }

    /// Build a rustls client configuration enforcing this policy
    pub fn client_config(&self) -> Result<ClientConfig> {
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let builder = ClientConfig::builder_with_provider(provider.clone())
            .with_safe_default_protocol_versions()?;

        let config = match self.level {
            SecurityLevel::Low => builder
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(AcceptAllVerifier::new(provider)))
                .with_no_client_auth(),
            SecurityLevel::High => builder
                .with_root_certificates(root_store())
                .with_no_client_auth(),
            SecurityLevel::Medium => {
                let webpki = rustls::client::WebPkiServerVerifier::builder_with_provider(
                    Arc::new(root_store()),
                    provider,
                )
                .build()
                .map_err(|e| Error::Tls(e.to_string()))?;
                builder
                    .dangerous()
                    .with_custom_certificate_verifier(Arc::new(DelegatingVerifier::new(
                        webpki,
                        self.decider.clone(),
                    )))
                    .with_no_client_auth()
            }
        };

        tracing::debug!(level = %self.level, "Built TLS client configuration");
        Ok(config)
    }
}

fn root_store() -> RootCertStore {
    RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    }
}
