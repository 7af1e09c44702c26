//! Download integrity checks
//!
//! Artifacts are checked against the SHA-256 published in the repository.
//! Either the whole content matches or the install is refused.

use sha2::{Digest, Sha256};

use crate::error::{OpmError, Result};

/// What to do with artifacts that have no published checksum
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TrustPolicy {
    /// Refuse to install unverifiable artifacts
    #[default]
    RequireChecksum,
    /// Install them anyway, tagging the result as unverified
    AllowUnverified,
}

impl TrustPolicy {
    pub fn from_untrusted_flag(untrusted: bool) -> Self {
        if untrusted {
            Self::AllowUnverified
        } else {
            Self::RequireChecksum
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    /// Content hash matched the published checksum
    Verified,
    /// No checksum was published; only the computed hash is known
    Unverified,
}

/// Downloaded bytes that passed [`verify`]
#[derive(Debug)]
pub struct VerifiedBytes {
    bytes: Vec<u8>,
    sha256: String,
    verification: Verification,
}

impl VerifiedBytes {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Lower-case hex SHA-256 of the content
    pub fn sha256(&self) -> &str {
        &self.sha256
    }

    pub fn verification(&self) -> &Verification {
        &self.verification
    }

    pub fn is_verified(&self) -> bool {
        self.verification == Verification::Verified
    }
}

/// Lower-case hex SHA-256 of `content`
pub fn sha256_hex(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}

/// Refuse early when an artifact without checksum would not be accepted.
///
/// Lets callers skip the download of something [`verify`] would reject.
pub fn ensure_trusted(
    expected: Option<&str>,
    policy: TrustPolicy,
    plugin: &str,
    version: &str,
) -> Result<()> {
    if expected.is_none() && policy == TrustPolicy::RequireChecksum {
        return Err(OpmError::UntrustedArtifact {
            plugin: plugin.to_string(),
            version: version.to_string(),
        });
    }
    Ok(())
}

/// Check `bytes` against the `expected` hex digest under `policy`.
///
/// The bytes are handed back untouched on success.
pub fn verify(
    bytes: Vec<u8>,
    expected: Option<&str>,
    policy: TrustPolicy,
    plugin: &str,
    version: &str,
) -> Result<VerifiedBytes> {
    ensure_trusted(expected, policy, plugin, version)?;
    let actual = sha256_hex(&bytes);

    let verification = match expected {
        Some(expected) => {
            if !actual.eq_ignore_ascii_case(expected.trim()) {
                return Err(OpmError::ChecksumMismatch {
                    expected: expected.to_string(),
                    actual,
                });
            }
            Verification::Verified
        }
        None => {
            tracing::warn!(
                "(untrusted) {} {} downloaded with checksum {}",
                plugin,
                version,
                actual
            );
            Verification::Unverified
        }
    };

    Ok(VerifiedBytes {
        bytes,
        sha256: actual,
        verification,
    })
}
