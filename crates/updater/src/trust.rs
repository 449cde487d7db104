use crate::error::{Result, UpdaterError};
use crate::plan::UpdateTarget;
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::pkcs1v15::{Signature, VerifyingKey};
use rsa::pkcs8::DecodePublicKey;
use rsa::signature::Verifier;
use rsa::RsaPublicKey;
use sha2::Sha256;

/// Public half of the release signing key, compiled into the binary.
pub const RELEASE_SIGNING_KEY_PEM: &str = include_str!("../keys/release-signing.pub.pem");

/// Public key every release binary must be signed with.
///
/// Signatures are RSASSA-PKCS1-v1_5 over the SHA-256 digest of the binary.
#[derive(Clone)]
pub struct TrustAnchor {
    key: RsaPublicKey,
}

impl TrustAnchor {
    /// The key embedded at build time.
    pub fn embedded() -> Result<Self> {
        Self::from_pem(RELEASE_SIGNING_KEY_PEM)
    }

    /// Parse a PEM public key, either SubjectPublicKeyInfo (`PUBLIC KEY`) or
    /// PKCS#1 (`RSA PUBLIC KEY`).
    pub fn from_pem(pem: &str) -> Result<Self> {
        let key = RsaPublicKey::from_public_key_pem(pem)
            .or_else(|_| RsaPublicKey::from_pkcs1_pem(pem))
            .map_err(|err| UpdaterError::InvalidTrustAnchor(err.to_string()))?;
        Ok(Self::from_public_key(key))
    }

    pub fn from_public_key(key: RsaPublicKey) -> Self {
        Self { key }
    }

    /// Check the detached `signature` of `target`'s `payload`.
    pub fn verify(&self, target: &UpdateTarget, payload: &[u8], signature: &[u8]) -> Result<()> {
        let signature = Signature::try_from(signature)
            .map_err(|_| UpdaterError::Verification(target.to_string()))?;
        VerifyingKey::<Sha256>::new(self.key.clone())
            .verify(payload, &signature)
            .map_err(|_| UpdaterError::Verification(target.to_string()))
    }
}

impl std::fmt::Debug for TrustAnchor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrustAnchor").finish_non_exhaustive()
    }
}
