//! Error taxonomy surfaced across the core (§6.5).

use std::fmt;

use crate::host::Address;

/// The top-level error kind a caller of this core can observe.
///
/// Variants map 1:1 onto the §6.5 taxonomy. `UNABLE_TO_DETERMINE_PROTOCOL`
/// is folded into `InvalidProtocol` at this layer — the session-layer alias
/// is purely a renaming at a boundary this crate doesn't implement.
#[derive(thiserror::Error, Debug, Clone)]
pub enum ClusterError {
    #[error("no hosts available: {0}")]
    NoHostsAvailable(String),

    #[error("invalid protocol version: {0}")]
    InvalidProtocol(String),

    #[error("SSL error: {message}")]
    SslError {
        message: String,
        sub_code: Option<SslErrorCode>,
    },

    #[error("authentication error: {0}")]
    AuthError(String),

    #[error("unable to connect: {0}")]
    UnableToConnect(String),

    #[error("unable to close: {0}")]
    UnableToClose(String),

    #[error("unable to initialize event loop: {0}")]
    UnableToInit(String),

    #[error("cluster connection attempt was canceled")]
    Canceled,
}

/// Mirrors the TLS-layer sub-code `SSL_ERROR` may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SslErrorCode {
    CertChainInvalid,
    PeerIdentityMismatch,
    HandshakeFailure,
}

impl fmt::Display for SslErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SslErrorCode::CertChainInvalid => "cert_chain_invalid",
            SslErrorCode::PeerIdentityMismatch => "peer_identity_mismatch",
            SslErrorCode::HandshakeFailure => "handshake_failure",
        };
        f.write_str(s)
    }
}

/// The severity ordering §4.H fixes for classifying the worst error observed
/// across a set of parallel contact-point attempts. Higher is worse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum ErrorSeverity {
    NoHostsAvailable,
    InvalidProtocol,
    AuthError,
    SslError,
}

impl ErrorSeverity {
    pub(crate) fn of(err: &ClusterError) -> Option<Self> {
        match err {
            ClusterError::SslError { .. } => Some(ErrorSeverity::SslError),
            ClusterError::AuthError(_) => Some(ErrorSeverity::AuthError),
            ClusterError::InvalidProtocol(_) => Some(ErrorSeverity::InvalidProtocol),
            ClusterError::NoHostsAvailable(_) => Some(ErrorSeverity::NoHostsAvailable),
            _ => None,
        }
    }
}

/// Error raised while attempting to establish or maintain the single control
/// connection to one host (§4.G). Distinct from [`ClusterError`], which is
/// the cluster-wide classification produced after trying every contact point.
#[derive(thiserror::Error, Debug, Clone)]
pub enum ControlConnectionError {
    #[error("connect timed out contacting {0}")]
    ConnectTimeout(Address),

    #[error("DNS resolution timed out for {0}")]
    ResolveTimeout(String),

    #[error("socket error contacting {address}: {message}")]
    Io { address: Address, message: String },

    #[error("protocol version rejected at {address}, lowest supported version also failed")]
    ProtocolExhausted { address: Address },

    #[error("authentication required by {address} but rejected: {message}")]
    AuthenticationFailed { address: Address, message: String },

    #[error("TLS handshake with {address} failed: {message}")]
    Tls { address: Address, message: String },
}

/// Error raised parsing a token string for a given partitioner (§4.A).
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenParseError {
    #[error("empty token string")]
    Empty,

    #[error("token string is not a valid integer: {0}")]
    NotAnInteger(String),

    #[error("token {0} is out of the partitioner's range")]
    OutOfRange(String),
}

/// Error building a [`crate::settings::ClusterSettings`] value.
#[derive(thiserror::Error, Debug, Clone)]
pub enum BuildError {
    #[error("at least one contact point is required")]
    NoContactPoints,

    #[error("invalid reconnection policy: {0}")]
    InvalidReconnectionPolicy(String),
}
