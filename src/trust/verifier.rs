// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! rustls certificate verifiers for the Low and Medium tiers

use std::future::Future;
use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::client::WebPkiServerVerifier;
use rustls::crypto::{verify_tls12_signature, verify_tls13_signature, CryptoProvider};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{DigitallySignedStruct, Error as TlsError, SignatureScheme};
use tokio::runtime::{Handle, RuntimeFlavor};

use super::TrustDecider;

/// Accepts any certificate; handshake signatures are still checked
#[derive(Debug)]
pub(super) struct AcceptAllVerifier {
    provider: Arc<CryptoProvider>,
}

impl AcceptAllVerifier {
    pub(super) fn new(provider: Arc<CryptoProvider>) -> Self {
        Self { provider }
    }
}

impl ServerCertVerifier for AcceptAllVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, TlsError> {
        tracing::debug!(host = %server_name.to_str(), "Accepting certificate without validation");
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, TlsError> {
        verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, TlsError> {
        verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

/// Validates against the root store, then defers certificate errors to a
/// [`TrustDecider`]
#[derive(Debug)]
pub(super) struct DelegatingVerifier {
    webpki: Arc<WebPkiServerVerifier>,
    decider: Arc<dyn TrustDecider>,
}

impl DelegatingVerifier {
    pub(super) fn new(webpki: Arc<WebPkiServerVerifier>, decider: Arc<dyn TrustDecider>) -> Self {
        Self { webpki, decider }
    }
}

impl ServerCertVerifier for DelegatingVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, TlsError> {
        match self
            .webpki
            .verify_server_cert(end_entity, intermediates, server_name, ocsp_response, now)
        {
            Err(TlsError::InvalidCertificate(reason)) => {
                let host = server_name.to_str();
                tracing::debug!(host = %host, reason = ?reason, "Asking trust decider about certificate");
                let trusted = wait_for_decision(
                    self.decider
                        .is_server_trusted(host.as_ref(), end_entity.as_ref()),
                );
                if trusted {
                    Ok(ServerCertVerified::assertion())
                } else {
                    tracing::warn!(host = %host, reason = ?reason, "Certificate rejected");
                    Err(TlsError::InvalidCertificate(reason))
                }
            }
            other => other,
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, TlsError> {
        self.webpki.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, TlsError> {
        self.webpki.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.webpki.supported_verify_schemes()
    }
}

/// Block the handshake until the decider answers.
///
/// On a multi-threaded runtime the worker is handed off first so other
/// tasks keep running while this one waits. A current-thread runtime is
/// parked inside this handshake and cannot drive the decider, so the
/// decision runs on a helper thread with a runtime of its own.
fn wait_for_decision<F: Future<Output = bool> + Send>(decision: F) -> bool {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(|| handle.block_on(decision))
        }
        _ => std::thread::scope(|scope| {
            scope
                .spawn(move || {
                    match tokio::runtime::Builder::new_current_thread()
                        .enable_all()
                        .build()
                    {
                        Ok(runtime) => runtime.block_on(decision),
                        Err(e) => {
                            tracing::warn!(error = %e, "No runtime for trust decider, rejecting");
                            false
                        }
                    }
                })
                .join()
                .unwrap_or(false)
        }),
    }
}
