// crates/cachito-client/src/auth.rs
// ============================================================================
// Module: API Authentication
// Description: Authentication modes accepted by the Cachito API.
// Purpose: Map configured auth types onto client TLS identity or headers.
// Dependencies: reqwest
// ============================================================================

//! ## Overview
//! Cachito deployments accept anonymous access, TLS client certificates, or
//! Kerberos (SPNEGO `Negotiate`). The client does not run a Kerberos exchange
//! itself: the `Negotiate` token is acquired out of band and passed in.

use std::fmt;
use std::str::FromStr;

// ============================================================================
// SECTION: Auth Type
// ============================================================================

/// Authentication mode named in test configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthType {
    /// No authentication.
    #[default]
    None,
    /// TLS client certificate.
    Cert,
    /// Kerberos via an HTTP `Negotiate` token.
    Kerberos,
}

impl AuthType {
    /// Returns the canonical configuration label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Cert => "cert",
            Self::Kerberos => "kerberos",
        }
    }
}

impl fmt::Display for AuthType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthType {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
            return Ok(Self::None);
        }
        if trimmed.eq_ignore_ascii_case("cert") {
            return Ok(Self::Cert);
        }
        if trimmed.eq_ignore_ascii_case("kerberos") {
            return Ok(Self::Kerberos);
        }
        Err(format!("unsupported api auth type: {trimmed} (expected none, cert, or kerberos)"))
    }
}

// ============================================================================
// SECTION: Auth Material
// ============================================================================

/// Resolved authentication material for a client.
#[derive(Clone, Default, PartialEq, Eq)]
pub enum AuthConfig {
    /// Anonymous access.
    #[default]
    None,
    /// TLS client identity as concatenated PEM certificate and private key.
    Cert {
        /// PEM bytes holding the certificate chain followed by the key.
        identity_pem: Vec<u8>,
    },
    /// Pre-acquired SPNEGO token sent as `Authorization: Negotiate <token>`.
    Negotiate {
        /// Base64 token value.
        token: String,
    },
}

impl AuthConfig {
    /// Returns the auth mode this material belongs to.
    #[must_use]
    pub const fn auth_type(&self) -> AuthType {
        match self {
            Self::None => AuthType::None,
            Self::Cert {
                ..
            } => AuthType::Cert,
            Self::Negotiate {
                ..
            } => AuthType::Kerberos,
        }
    }

    /// Returns the `Authorization` header value, if any.
    pub(crate) fn authorization_header(&self) -> Option<String> {
        match self {
            Self::Negotiate {
                token,
            } => Some(format!("Negotiate {token}")),
            Self::None
            | Self::Cert {
                ..
            } => None,
        }
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Key material and tokens stay out of debug output.
        match self {
            Self::None => f.write_str("AuthConfig::None"),
            Self::Cert {
                identity_pem,
            } => write!(f, "AuthConfig::Cert({} bytes)", identity_pem.len()),
            Self::Negotiate {
                ..
            } => f.write_str("AuthConfig::Negotiate(<redacted>)"),
        }
    }
}
