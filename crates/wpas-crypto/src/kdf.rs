//! Hash-based key derivation used by SAE and PSK.
//!
//! - HMAC over a list of input fragments
//! - IEEE 802.11 KDF-Hash-Length (counter || label || context || length)
//! - HKDF extract/expand (RFC 5869) for hash-to-element
//! - PBKDF2-HMAC-SHA1 passphrase to PSK mapping

use crate::{Error, Result};
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::{Sha256, Sha384};
use zeroize::Zeroizing;

/// Hash function selection for HMAC-based derivations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlg {
    /// SHA-256 (32-byte output).
    Sha256,
    /// SHA-384 (48-byte output).
    Sha384,
}

impl HashAlg {
    /// Digest length in bytes.
    pub fn output_len(self) -> usize {
        match self {
            HashAlg::Sha256 => 32,
            HashAlg::Sha384 => 48,
        }
    }
}

/// Compute HMAC over the concatenation of `parts`.
///
/// # Example
/// ```
/// use wpas_crypto::kdf::{hmac, HashAlg};
///
/// let tag = hmac(HashAlg::Sha256, b"Jefe", &[b"what do ya want ", b"for nothing?"]).unwrap();
/// assert_eq!(tag.len(), 32);
/// ```
pub fn hmac(alg: HashAlg, key: &[u8], parts: &[&[u8]]) -> Result<Zeroizing<Vec<u8>>> {
    fn run<M: Mac + hmac::digest::KeyInit>(key: &[u8], parts: &[&[u8]]) -> Result<Vec<u8>> {
        let mut mac = <M as hmac::digest::KeyInit>::new_from_slice(key)
            .map_err(|_| Error::KeyDerivation("HMAC key rejected".into()))?;
        for part in parts {
            mac.update(part);
        }
        Ok(mac.finalize().into_bytes().to_vec())
    }

    let out = match alg {
        HashAlg::Sha256 => run::<Hmac<Sha256>>(key, parts)?,
        HashAlg::Sha384 => run::<Hmac<Sha384>>(key, parts)?,
    };
    Ok(Zeroizing::new(out))
}

/// IEEE 802.11 KDF-Hash-Length.
///
/// Output is `bits` long; each block is
/// `HMAC(key, i (LE16) || label || context || bits (LE16))` for `i = 1..`.
/// A trailing partial octet keeps only its high-order bits.
pub fn kdf_hash_length(
    alg: HashAlg,
    key: &[u8],
    label: &str,
    context: &[&[u8]],
    bits: usize,
) -> Result<Zeroizing<Vec<u8>>> {
    if bits == 0 || bits > u16::MAX as usize {
        return Err(Error::KeyDerivation(format!("unsupported KDF length {bits}")));
    }
    let out_len = (bits + 7) / 8;
    let length = (bits as u16).to_le_bytes();
    let mut out = Zeroizing::new(Vec::with_capacity(out_len + alg.output_len()));

    let mut counter: u16 = 1;
    while out.len() < out_len {
        let counter_bytes = counter.to_le_bytes();
        let mut parts: Vec<&[u8]> = Vec::with_capacity(context.len() + 3);
        parts.push(&counter_bytes);
        parts.push(label.as_bytes());
        parts.extend_from_slice(context);
        parts.push(&length);
        let block = hmac(alg, key, &parts)?;
        out.extend_from_slice(&block);
        counter = counter
            .checked_add(1)
            .ok_or_else(|| Error::KeyDerivation("KDF counter overflow".into()))?;
    }
    out.truncate(out_len);

    let spare = out_len * 8 - bits;
    if spare > 0 {
        if let Some(last) = out.last_mut() {
            *last &= 0xffu8 << spare;
        }
    }
    Ok(out)
}

/// HKDF-Extract: returns the pseudorandom key.
pub fn hkdf_extract(alg: HashAlg, salt: &[u8], ikm: &[u8]) -> Zeroizing<Vec<u8>> {
    let prk = match alg {
        HashAlg::Sha256 => Hkdf::<Sha256>::extract(Some(salt), ikm).0.to_vec(),
        HashAlg::Sha384 => Hkdf::<Sha384>::extract(Some(salt), ikm).0.to_vec(),
    };
    Zeroizing::new(prk)
}

/// HKDF-Expand from a pseudorandom key.
pub fn hkdf_expand(
    alg: HashAlg,
    prk: &[u8],
    info: &[u8],
    output_len: usize,
) -> Result<Zeroizing<Vec<u8>>> {
    let mut okm = Zeroizing::new(vec![0u8; output_len]);
    match alg {
        HashAlg::Sha256 => Hkdf::<Sha256>::from_prk(prk)
            .map_err(|_| Error::KeyDerivation("HKDF PRK too short".into()))?
            .expand(info, &mut okm)
            .map_err(|_| Error::KeyDerivation("HKDF expansion failed".into()))?,
        HashAlg::Sha384 => Hkdf::<Sha384>::from_prk(prk)
            .map_err(|_| Error::KeyDerivation("HKDF PRK too short".into()))?
            .expand(info, &mut okm)
            .map_err(|_| Error::KeyDerivation("HKDF expansion failed".into()))?,
    }
    Ok(okm)
}

/// Derive the 256-bit PSK from an 8..=63 character passphrase.
///
/// PSK = PBKDF2-HMAC-SHA1(passphrase, ssid, 4096, 32)
pub fn psk_from_passphrase(passphrase: &[u8], ssid: &[u8]) -> Result<Zeroizing<[u8; 32]>> {
    if !(8..=63).contains(&passphrase.len()) {
        return Err(Error::InvalidLength {
            expected: 8,
            actual: passphrase.len(),
        });
    }
    let mut psk = Zeroizing::new([0u8; 32]);
    pbkdf2::pbkdf2_hmac::<Sha1>(passphrase, ssid, 4096, &mut psk[..]);
    Ok(psk)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// RFC 4231 test case 2.
    #[test]
    fn test_hmac_sha256_rfc4231() {
        let tag = hmac(
            HashAlg::Sha256,
            b"Jefe",
            &[b"what do ya want ", b"for nothing?"],
        )
        .unwrap();
        assert_eq!(
            hex::encode(&*tag),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    /// RFC 5869 test case 1, split into extract and expand.
    #[test]
    fn test_hkdf_rfc5869_case1() {
        let ikm = [0x0b; 22];
        let salt = hex::decode("000102030405060708090a0b0c").unwrap();
        let info = hex::decode("f0f1f2f3f4f5f6f7f8f9").unwrap();

        let prk = hkdf_extract(HashAlg::Sha256, &salt, &ikm);
        assert_eq!(
            hex::encode(&*prk),
            "077709362c2e32df0ddc3f0dc47bba6390b6c73bb50f9c3122ec844ad7c2b3e5"
        );

        let okm = hkdf_expand(HashAlg::Sha256, &prk, &info, 42).unwrap();
        assert_eq!(
            hex::encode(&*okm),
            "3cb25f25faacd57a90434f64d0362f2a2d2d0a90cf1a5a4c5db02d56ecc4c5bf34007208d5b887185865"
        );
    }

    /// IEEE 802.11 Annex J PSK vector.
    #[test]
    fn test_psk_from_passphrase() {
        let psk = psk_from_passphrase(b"password", b"IEEE").unwrap();
        assert_eq!(
            hex::encode(*psk),
            "f42c6fc52df0ebef9ebb4b90b38a5f902e83fe1b135a70e23aed762e9710a12e"
        );
    }

    #[test]
    fn test_psk_rejects_short_passphrase() {
        assert!(psk_from_passphrase(b"short", b"ssid").is_err());
    }

    #[test]
    fn test_kdf_length_and_prefix() {
        let key = [0x11u8; 32];
        let short = kdf_hash_length(HashAlg::Sha256, &key, "label", &[b"ctx"], 256).unwrap();
        let long = kdf_hash_length(HashAlg::Sha256, &key, "label", &[b"ctx"], 512).unwrap();
        assert_eq!(short.len(), 32);
        assert_eq!(long.len(), 64);
        // Length is bound into every block
        assert_ne!(&short[..], &long[..32]);
    }

    #[test]
    fn test_kdf_first_block_matches_hmac() {
        let key = [0x22u8; 32];
        let out = kdf_hash_length(HashAlg::Sha256, &key, "SAE KCK and PMK", &[b"abc"], 256).unwrap();
        let expected = hmac(
            HashAlg::Sha256,
            &key,
            &[&1u16.to_le_bytes(), b"SAE KCK and PMK", b"abc", &256u16.to_le_bytes()],
        )
        .unwrap();
        assert_eq!(&out[..], &expected[..]);
    }

    #[test]
    fn test_kdf_masks_partial_octet() {
        let out = kdf_hash_length(HashAlg::Sha256, &[1u8; 16], "x", &[], 12).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[1] & 0x0f, 0);
    }
}
