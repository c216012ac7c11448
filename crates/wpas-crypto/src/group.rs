//! SAE finite cyclic groups.
//!
//! Only the NIST ECC groups are implemented:
//! - Group 19: NIST P-256 (hash-to-element uses SHA-256)
//! - Group 20: NIST P-384 (hash-to-element uses SHA-384)
//!
//! Scalars and elements cross this module boundary as big-endian octet
//! strings in their 802.11 wire encoding (scalar: `len(r)` octets, element:
//! `x || y`). Secret values are returned inside `Zeroizing`.

use crate::{kdf::HashAlg, Error, Result};
use zeroize::Zeroizing;

/// Group 19 prime.
const P256_PRIME: [u8; 32] = [
    0xff, 0xff, 0xff, 0xff, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
];

/// Group 19 order.
const P256_ORDER: [u8; 32] = [
    0xff, 0xff, 0xff, 0xff, 0x00, 0x00, 0x00, 0x00, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0xbc, 0xe6, 0xfa, 0xad, 0xa7, 0x17, 0x9e, 0x84, 0xf3, 0xb9, 0xca, 0xc2, 0xfc, 0x63, 0x25, 0x51,
];

/// Group 20 prime.
const P384_PRIME: [u8; 48] = [
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xfe,
    0xff, 0xff, 0xff, 0xff, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xff, 0xff, 0xff, 0xff,
];

/// Group 20 order.
const P384_ORDER: [u8; 48] = [
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xc7, 0x63, 0x4d, 0x81, 0xf4, 0x37, 0x2d, 0xdf,
    0x58, 0x1a, 0x0d, 0xb2, 0x48, 0xb0, 0xa7, 0x7a, 0xec, 0xec, 0x19, 0x6a, 0xcc, 0xc5, 0x29, 0x73,
];

/// Per-curve arithmetic over the RustCrypto NIST curve crates.
macro_rules! nist_curve_ops {
    ($module:ident, $krate:ident, $curve:ty, $len:expr) => {
        mod $module {
            use crate::{Error, Result};
            use $krate::elliptic_curve::{
                generic_array::GenericArray,
                group::Group,
                hash2curve::{FromOkm, GroupDigest, MapToCurve},
                point::DecompressPoint,
                sec1::{FromEncodedPoint, ToEncodedPoint},
                subtle::Choice,
                Field, PrimeField,
            };
            use $krate::{AffinePoint, EncodedPoint, FieldBytes, ProjectivePoint, Scalar};
            use zeroize::Zeroizing;

            type FieldElement = <$curve as GroupDigest>::FieldElement;

            const LEN: usize = $len;

            fn field_bytes(bytes: &[u8]) -> Result<FieldBytes> {
                if bytes.len() != LEN {
                    return Err(Error::InvalidLength {
                        expected: LEN,
                        actual: bytes.len(),
                    });
                }
                Ok(FieldBytes::clone_from_slice(bytes))
            }

            fn scalar(bytes: &[u8]) -> Result<Scalar> {
                Option::from(Scalar::from_repr(field_bytes(bytes)?)).ok_or(Error::InvalidScalar)
            }

            fn point(bytes: &[u8]) -> Result<ProjectivePoint> {
                if bytes.len() != 2 * LEN {
                    return Err(Error::InvalidLength {
                        expected: 2 * LEN,
                        actual: bytes.len(),
                    });
                }
                let (x, y) = bytes.split_at(LEN);
                let encoded =
                    EncodedPoint::from_affine_coordinates(&field_bytes(x)?, &field_bytes(y)?, false);
                let affine: Option<AffinePoint> = AffinePoint::from_encoded_point(&encoded).into();
                affine.map(ProjectivePoint::from).ok_or(Error::InvalidElement)
            }

            fn encode(point: &ProjectivePoint) -> Result<Zeroizing<Vec<u8>>> {
                if bool::from(point.is_identity()) {
                    return Err(Error::Degenerate("point at infinity"));
                }
                let encoded = AffinePoint::from(*point).to_encoded_point(false);
                match (encoded.x(), encoded.y()) {
                    (Some(x), Some(y)) => {
                        let mut out = Zeroizing::new(Vec::with_capacity(2 * LEN));
                        out.extend_from_slice(x);
                        out.extend_from_slice(y);
                        Ok(out)
                    }
                    _ => Err(Error::Degenerate("point at infinity")),
                }
            }

            pub(super) fn decompress(x: &[u8], y_is_odd: bool) -> Option<Zeroizing<Vec<u8>>> {
                let x = field_bytes(x).ok()?;
                let affine: Option<AffinePoint> =
                    AffinePoint::decompress(&x, Choice::from(u8::from(y_is_odd))).into();
                encode(&ProjectivePoint::from(affine?)).ok()
            }

            pub(super) fn map_to_curve(okm: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
                let expected = LEN + LEN / 2;
                if okm.len() != expected {
                    return Err(Error::InvalidLength {
                        expected,
                        actual: okm.len(),
                    });
                }
                let u = FieldElement::from_okm(GenericArray::from_slice(okm));
                encode(&u.map_to_curve())
            }

            pub(super) fn random_scalar() -> Zeroizing<Vec<u8>> {
                loop {
                    let s = Scalar::random(&mut rand::rngs::OsRng);
                    if !bool::from(s.is_zero()) && s != Scalar::ONE {
                        return Zeroizing::new(s.to_repr().to_vec());
                    }
                }
            }

            pub(super) fn scalar_add(a: &[u8], b: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
                let sum = scalar(a)? + scalar(b)?;
                Ok(Zeroizing::new(sum.to_repr().to_vec()))
            }

            pub(super) fn check_scalar(s: &[u8]) -> Result<()> {
                let s = scalar(s)?;
                if bool::from(s.is_zero()) || s == Scalar::ONE {
                    return Err(Error::InvalidScalar);
                }
                Ok(())
            }

            pub(super) fn check_element(e: &[u8]) -> Result<()> {
                point(e).map(|_| ())
            }

            pub(super) fn scalar_mul(s: &[u8], e: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
                encode(&(point(e)? * scalar(s)?))
            }

            pub(super) fn point_add(a: &[u8], b: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
                encode(&(point(a)? + point(b)?))
            }

            pub(super) fn point_neg(e: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
                encode(&(-point(e)?))
            }
        }
    };
}

nist_curve_ops!(nist256, p256, p256::NistP256, 32);
nist_curve_ops!(nist384, p384, p384::NistP384, 48);

macro_rules! dispatch {
    ($group:expr, $func:ident ( $($arg:expr),* )) => {
        match $group {
            SaeGroup::Nist256 => nist256::$func($($arg),*),
            SaeGroup::Nist384 => nist384::$func($($arg),*),
        }
    };
}

/// SAE finite cyclic group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SaeGroup {
    /// IANA group 19, 256-bit random ECP group.
    Nist256,
    /// IANA group 20, 384-bit random ECP group.
    Nist384,
}

impl SaeGroup {
    /// Every implemented group, in default preference order.
    pub const ALL: [SaeGroup; 2] = [SaeGroup::Nist256, SaeGroup::Nist384];

    /// Look up a group by its IANA identifier.
    pub fn from_id(id: u16) -> Result<Self> {
        match id {
            19 => Ok(SaeGroup::Nist256),
            20 => Ok(SaeGroup::Nist384),
            other => Err(Error::UnsupportedGroup(other)),
        }
    }

    /// IANA group identifier.
    pub fn id(self) -> u16 {
        match self {
            SaeGroup::Nist256 => 19,
            SaeGroup::Nist384 => 20,
        }
    }

    /// Length of the prime in octets.
    pub fn prime_len(self) -> usize {
        match self {
            SaeGroup::Nist256 => 32,
            SaeGroup::Nist384 => 48,
        }
    }

    /// Length of the group order in octets (the scalar length).
    pub fn order_len(self) -> usize {
        self.prime_len()
    }

    /// Length of an encoded element (`x || y`).
    pub fn element_len(self) -> usize {
        2 * self.prime_len()
    }

    /// Big-endian prime.
    pub fn prime(self) -> &'static [u8] {
        match self {
            SaeGroup::Nist256 => &P256_PRIME,
            SaeGroup::Nist384 => &P384_PRIME,
        }
    }

    /// Big-endian group order.
    pub fn order(self) -> &'static [u8] {
        match self {
            SaeGroup::Nist256 => &P256_ORDER,
            SaeGroup::Nist384 => &P384_ORDER,
        }
    }

    /// Hash used by hash-to-element and by H2E key derivation.
    pub fn h2e_hash(self) -> HashAlg {
        match self {
            SaeGroup::Nist256 => HashAlg::Sha256,
            SaeGroup::Nist384 => HashAlg::Sha384,
        }
    }

    /// Decompress `x` with the requested y parity. `None` if `x` is not a
    /// valid coordinate (>= p or not on the curve).
    pub fn decompress(self, x: &[u8], y_is_odd: bool) -> Option<Zeroizing<Vec<u8>>> {
        dispatch!(self, decompress(x, y_is_odd))
    }

    /// Reduce `okm` modulo p and map it to the curve with simplified SWU.
    pub fn map_to_curve(self, okm: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        dispatch!(self, map_to_curve(okm))
    }

    /// Uniformly random scalar in `[2, r-1]`.
    pub fn random_scalar(self) -> Zeroizing<Vec<u8>> {
        dispatch!(self, random_scalar())
    }

    /// `(a + b) mod r`.
    pub fn scalar_add(self, a: &[u8], b: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        dispatch!(self, scalar_add(a, b))
    }

    /// Validate a peer scalar: `1 < s < r`.
    pub fn check_scalar(self, s: &[u8]) -> Result<()> {
        dispatch!(self, check_scalar(s))
    }

    /// Validate a peer element: on the curve and not the identity.
    pub fn check_element(self, e: &[u8]) -> Result<()> {
        dispatch!(self, check_element(e))
    }

    /// `s * E`.
    pub fn scalar_mul(self, s: &[u8], e: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        dispatch!(self, scalar_mul(s, e))
    }

    /// `A + B`.
    pub fn point_add(self, a: &[u8], b: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        dispatch!(self, point_add(a, b))
    }

    /// `-E`.
    pub fn point_neg(self, e: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        dispatch!(self, point_neg(e))
    }
}

impl TryFrom<u16> for SaeGroup {
    type Error = Error;

    fn try_from(id: u16) -> Result<Self> {
        Self::from_id(id)
    }
}

impl core::fmt::Display for SaeGroup {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.id())
    }
}
