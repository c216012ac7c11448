//! SAE-PK password format and commit signatures.
//!
//! A PK password is a base32 string grouped by hyphens (`xxxx-xxxx-xxxx`).
//! Commits sent in PK mode carry an ECDSA P-256 signature made with the
//! profile's private key over `group || scalar || element || own || peer`.

use crate::{Error, Result};
use p256::ecdsa::{
    signature::{Signer, Verifier},
    Signature, SigningKey, VerifyingKey,
};

/// Shortest PK password (three groups of four plus separators).
pub const PK_PASSWORD_MIN_LEN: usize = 14;

/// Longest PK password.
pub const PK_PASSWORD_MAX_LEN: usize = 59;

/// ECDSA P-256 signature length (r || s).
pub const SIGNATURE_LEN: usize = 64;

/// Check whether `password` has the SAE-PK shape.
///
/// Length is 14..=59 and `len % 5 == 4`; every fifth character (index
/// `i % 5 == 4`) is `-`; all others are lowercase base32 (`a-z`, `2-7`).
///
/// ```
/// use wpas_crypto::pk::is_pk_password;
///
/// assert!(is_pk_password("a2bc-de3f-ghi4"));
/// assert!(!is_pk_password("correcthorsebatterystaple"));
/// ```
pub fn is_pk_password(password: &str) -> bool {
    let len = password.len();
    if !(PK_PASSWORD_MIN_LEN..=PK_PASSWORD_MAX_LEN).contains(&len) || len % 5 != 4 {
        return false;
    }
    password.bytes().enumerate().all(|(i, c)| {
        if i % 5 == 4 {
            c == b'-'
        } else {
            matches!(c, b'a'..=b'z' | b'2'..=b'7')
        }
    })
}

/// Private key used to sign commits in PK mode.
pub struct PkSigner {
    key: SigningKey,
}

impl PkSigner {
    /// Load a raw 32-byte P-256 private scalar.
    ///
    /// # Errors
    ///
    /// `Error::InvalidPrivateKey` if the scalar is zero or out of range.
    pub fn from_bytes(secret: &[u8]) -> Result<Self> {
        let key = SigningKey::from_slice(secret)
            .map_err(|e| Error::InvalidPrivateKey(format!("{e}")))?;
        Ok(Self { key })
    }

    /// Generate a random key.
    pub fn generate() -> Self {
        Self {
            key: SigningKey::random(&mut rand::rngs::OsRng),
        }
    }

    /// Uncompressed SEC1 encoding of the public key.
    pub fn public_key(&self) -> Vec<u8> {
        self.key
            .verifying_key()
            .to_encoded_point(false)
            .as_bytes()
            .to_vec()
    }

    /// Sign `message`, returning the fixed-width `r || s` encoding.
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        let signature: Signature = self.key.sign(message);
        signature.to_bytes().to_vec()
    }
}

impl Clone for PkSigner {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
        }
    }
}

impl core::fmt::Debug for PkSigner {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PkSigner").finish_non_exhaustive()
    }
}

/// Verify a commit signature against a SEC1-encoded public key.
pub fn verify(public_key: &[u8], message: &[u8], signature: &[u8]) -> Result<()> {
    let key = VerifyingKey::from_sec1_bytes(public_key)
        .map_err(|e| Error::InvalidPublicKey(format!("{e}")))?;
    let signature = Signature::from_slice(signature).map_err(|_| Error::BadSignature)?;
    key.verify(message, &signature).map_err(|_| Error::BadSignature)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pk_password_shapes() {
        assert!(is_pk_password("a2bc-de3f-ghi4"));
        assert!(is_pk_password("abcd-efgh-ijkl-mnop-qrst-uvwx-yz23-4567"));
        // wrong length modulus
        assert!(!is_pk_password("a2bc-de3f-ghi4a"));
        // misplaced separator
        assert!(!is_pk_password("a2b-cde3f-ghi4"));
        // uppercase and digits outside base32
        assert!(!is_pk_password("A2BC-DE3F-GHI4"));
        assert!(!is_pk_password("a2bc-de0f-ghi4"));
        // too short, trailing separator
        assert!(!is_pk_password("abcd-efgh"));
        assert!(!is_pk_password("abcd-efgh-ijkl-"));
        // too long
        let long = ["abcd"; 13].join("-");
        assert!(long.len() > PK_PASSWORD_MAX_LEN);
        assert!(!is_pk_password(&long));
    }

    #[test]
    fn test_sign_verify() {
        let signer = PkSigner::generate();
        let public = signer.public_key();
        assert_eq!(public.len(), 65);
        let sig = signer.sign(b"commit body");
        assert_eq!(sig.len(), SIGNATURE_LEN);
        verify(&public, b"commit body", &sig).unwrap();
        assert!(matches!(
            verify(&public, b"tampered", &sig),
            Err(Error::BadSignature)
        ));
    }

    #[test]
    fn test_from_bytes() {
        let signer = PkSigner::from_bytes(&[0x01; 32]).unwrap();
        let again = PkSigner::from_bytes(&[0x01; 32]).unwrap();
        assert_eq!(signer.public_key(), again.public_key());
        assert!(PkSigner::from_bytes(&[0u8; 32]).is_err());
        assert!(PkSigner::from_bytes(&[1u8; 7]).is_err());
    }
}
