//! SAE password element derivation and key schedule.
//!
//! Implements the cryptographic half of Simultaneous Authentication of Equals:
//! - Hunting-and-pecking PWE derivation (legacy)
//! - Hash-to-element PT derivation and PWE = val * PT
//! - Commit scalar/element generation
//! - KCK / PMK / PMKID derivation and the Confirm tag
//!
//! Protocol state (who sent what, retries, rejected groups) lives in
//! `wpas-core`; everything here is a pure function of its inputs plus the RNG.

use crate::{
    group::SaeGroup,
    kdf::{hkdf_expand, hkdf_extract, hmac, kdf_hash_length, HashAlg},
    Error, Result,
};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// Hunting-and-pecking iterations; all of them run regardless of when a
/// point is found.
pub const HUNTING_AND_PECKING_ROUNDS: u8 = 40;

/// PMK length in octets.
pub const PMK_LEN: usize = 32;

/// PMKID length in octets.
pub const PMKID_LEN: usize = 16;

const LABEL_HUNT: &str = "SAE Hunting and Pecking";
const LABEL_KCK_PMK: &str = "SAE KCK and PMK";
const LABEL_H2E_U1: &[u8] = b"SAE Hash to Element u1 P1";
const LABEL_H2E_U2: &[u8] = b"SAE Hash to Element u2 P2";

fn ordered_addresses(a: &[u8; 6], b: &[u8; 6]) -> [u8; 12] {
    let (hi, lo) = if a >= b { (a, b) } else { (b, a) };
    let mut out = [0u8; 12];
    out[..6].copy_from_slice(hi);
    out[6..].copy_from_slice(lo);
    out
}

/// Password element for one group and one pair of peers.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Pwe {
    #[zeroize(skip)]
    group: SaeGroup,
    point: Vec<u8>,
}

impl Pwe {
    /// Group the element belongs to.
    pub fn group(&self) -> SaeGroup {
        self.group
    }

    /// Encoded element. Secret.
    pub fn as_bytes(&self) -> &[u8] {
        &self.point
    }
}

impl core::fmt::Debug for Pwe {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Pwe").field("group", &self.group).finish_non_exhaustive()
    }
}

/// Derive the PWE with the legacy hunting-and-pecking loop.
///
/// `pwd-seed = HMAC-SHA256(max(a1,a2) || min(a1,a2), password || [identifier] || counter)`,
/// `pwd-value = KDF-SHA256(pwd-seed, "SAE Hunting and Pecking", p)`.
///
/// # Errors
///
/// `Error::PasswordElement` when none of the 40 rounds produced a point.
pub fn derive_pwe_hunting_and_pecking(
    group: SaeGroup,
    addr1: &[u8; 6],
    addr2: &[u8; 6],
    password: &[u8],
    identifier: Option<&[u8]>,
) -> Result<Pwe> {
    let key = ordered_addresses(addr1, addr2);
    let bits = group.prime_len() * 8;
    let mut found: Option<Zeroizing<Vec<u8>>> = None;

    for counter in 1..=HUNTING_AND_PECKING_ROUNDS {
        let counter_octet = [counter];
        let seed = match identifier {
            Some(id) => hmac(HashAlg::Sha256, &key, &[password, id, &counter_octet])?,
            None => hmac(HashAlg::Sha256, &key, &[password, &counter_octet])?,
        };
        let value = kdf_hash_length(HashAlg::Sha256, &seed, LABEL_HUNT, &[group.prime()], bits)?;
        let y_is_odd = seed.last().map(|b| b & 1 == 1).unwrap_or(false);
        let candidate = group.decompress(&value, y_is_odd);
        if found.is_none() {
            found = candidate;
        }
    }

    found
        .map(|point| Pwe {
            group,
            point: point.to_vec(),
        })
        .ok_or_else(|| Error::PasswordElement("no point found in 40 rounds".into()))
}

/// Password-derived element for hash-to-element, independent of the peers.
///
/// Cached per profile and group; PWE is derived from it per peer.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Pt {
    #[zeroize(skip)]
    group: SaeGroup,
    point: Vec<u8>,
}

impl core::fmt::Debug for Pt {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Pt").field("group", &self.group).finish_non_exhaustive()
    }
}

impl Pt {
    /// Derive PT for `group` from the SSID, password and optional identifier.
    ///
    /// ```
    /// use wpas_crypto::{group::SaeGroup, sae::Pt};
    ///
    /// let pt = Pt::derive(SaeGroup::Nist256, b"byteme", b"mekmitasdigoat", None).unwrap();
    /// assert_eq!(pt.group(), SaeGroup::Nist256);
    /// ```
    pub fn derive(
        group: SaeGroup,
        ssid: &[u8],
        password: &[u8],
        identifier: Option<&[u8]>,
    ) -> Result<Self> {
        let hash = group.h2e_hash();
        let mut ikm = Zeroizing::new(Vec::with_capacity(password.len() + 32));
        ikm.extend_from_slice(password);
        if let Some(id) = identifier {
            ikm.extend_from_slice(id);
        }
        let seed = hkdf_extract(hash, ssid, &ikm);

        let okm_len = group.prime_len() + group.prime_len() / 2;
        let u1 = hkdf_expand(hash, &seed, LABEL_H2E_U1, okm_len)?;
        let p1 = group.map_to_curve(&u1)?;
        let u2 = hkdf_expand(hash, &seed, LABEL_H2E_U2, okm_len)?;
        let p2 = group.map_to_curve(&u2)?;
        let pt = group.point_add(&p1, &p2)?;

        Ok(Self {
            group,
            point: pt.to_vec(),
        })
    }

    /// Group the element belongs to.
    pub fn group(&self) -> SaeGroup {
        self.group
    }

    /// Derive the PWE for a specific pair of peers.
    ///
    /// `val = H(0^n, max(a1,a2) || min(a1,a2)) mod (r - 1) + 1`, `PWE = val * PT`.
    pub fn derive_pwe(&self, addr1: &[u8; 6], addr2: &[u8; 6]) -> Result<Pwe> {
        let group = self.group;
        let hash = group.h2e_hash();
        let salt = vec![0u8; hash.output_len()];
        let addrs = ordered_addresses(addr1, addr2);
        let digest = hmac(hash, &salt, &[&addrs])?;

        let val = reduce_order_minus_one_plus_one(&digest, group.order())?;
        let point = group.scalar_mul(&val, &self.point)?;
        Ok(Pwe {
            group,
            point: point.to_vec(),
        })
    }
}

/// `v mod (r - 1) + 1` for a `v` no wider than `r`.
///
/// `r - 1 > 2^(8*len - 1)` for the NIST groups, so a single conditional
/// subtraction is enough.
fn reduce_order_minus_one_plus_one(v: &[u8], order: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
    if v.len() != order.len() {
        return Err(Error::InvalidLength {
            expected: order.len(),
            actual: v.len(),
        });
    }
    let mut modulus = order.to_vec();
    sub_one_be(&mut modulus);

    let mut out = Zeroizing::new(v.to_vec());
    if out.as_slice() >= modulus.as_slice() {
        sub_be(&mut out, &modulus);
    }
    add_one_be(&mut out);
    Ok(out)
}

fn sub_be(a: &mut [u8], b: &[u8]) {
    let mut borrow = 0i16;
    for (x, y) in a.iter_mut().rev().zip(b.iter().rev()) {
        let mut d = i16::from(*x) - i16::from(*y) - borrow;
        borrow = if d < 0 {
            d += 256;
            1
        } else {
            0
        };
        *x = d as u8;
    }
}

fn sub_one_be(a: &mut [u8]) {
    for x in a.iter_mut().rev() {
        let (v, under) = x.overflowing_sub(1);
        *x = v;
        if !under {
            break;
        }
    }
}

fn add_one_be(a: &mut [u8]) {
    for x in a.iter_mut().rev() {
        let (v, over) = x.overflowing_add(1);
        *x = v;
        if !over {
            break;
        }
    }
}

/// Local commit: public scalar and element plus the private `rand`.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct CommitValues {
    #[zeroize(skip)]
    group: SaeGroup,
    scalar: Vec<u8>,
    element: Vec<u8>,
    rand: Vec<u8>,
}

impl core::fmt::Debug for CommitValues {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CommitValues")
            .field("group", &self.group)
            .field("scalar", &self.scalar)
            .field("element", &self.element)
            .finish_non_exhaustive()
    }
}

impl CommitValues {
    /// Generate fresh commit values for `pwe`.
    ///
    /// `scalar = (rand + mask) mod r`, `element = -(mask * PWE)`; `rand` and
    /// `mask` are drawn from `[2, r-1]` and the pair is redrawn if the scalar
    /// falls below 2.
    pub fn generate(pwe: &Pwe) -> Result<Self> {
        let group = pwe.group;
        loop {
            let rand = group.random_scalar();
            let mask = group.random_scalar();
            match Self::from_rand_mask(pwe, &rand, &mask) {
                Err(Error::InvalidScalar) => continue,
                other => return other,
            }
        }
    }

    /// Commit values for caller-chosen `rand` and `mask`.
    ///
    /// # Errors
    ///
    /// `Error::InvalidScalar` if either input is not below `r` or the
    /// resulting scalar is below 2.
    pub fn from_rand_mask(pwe: &Pwe, rand: &[u8], mask: &[u8]) -> Result<Self> {
        let group = pwe.group;
        let scalar = group.scalar_add(rand, mask)?;
        group.check_scalar(&scalar)?;
        let masked = group.scalar_mul(mask, pwe.as_bytes())?;
        let element = group.point_neg(&masked)?;
        Ok(Self {
            group,
            scalar: scalar.to_vec(),
            element: element.to_vec(),
            rand: rand.to_vec(),
        })
    }

    /// Group of the commit.
    pub fn group(&self) -> SaeGroup {
        self.group
    }

    /// Commit scalar as sent on the wire.
    pub fn scalar(&self) -> &[u8] {
        &self.scalar
    }

    /// Commit element as sent on the wire.
    pub fn element(&self) -> &[u8] {
        &self.element
    }
}

/// Keys produced by a completed commit exchange.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SaeKeys {
    /// Hash used for the Confirm tag.
    #[zeroize(skip)]
    pub hash: HashAlg,
    /// Key confirmation key (hash length).
    pub kck: Vec<u8>,
    /// Pairwise master key.
    pub pmk: [u8; PMK_LEN],
    /// PMK identifier.
    pub pmkid: [u8; PMKID_LEN],
}

impl core::fmt::Debug for SaeKeys {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SaeKeys")
            .field("hash", &self.hash)
            .field("pmkid", &self.pmkid)
            .finish_non_exhaustive()
    }
}

/// Key schedule parameters that depend on the negotiated PWE method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySchedule {
    /// Hunting-and-pecking: SHA-256, all-zero salt.
    Legacy,
    /// Hash-to-element: group hash, salt is the rejected-groups list when non-empty.
    HashToElement {
        /// Groups rejected earlier in this exchange, in order.
        rejected_groups: Vec<u16>,
    },
}

impl KeySchedule {
    /// Hash used for keyseed, KCK/PMK and Confirm.
    pub fn hash(&self, group: SaeGroup) -> HashAlg {
        match self {
            KeySchedule::Legacy => HashAlg::Sha256,
            KeySchedule::HashToElement { .. } => group.h2e_hash(),
        }
    }

    fn salt(&self, hash: HashAlg) -> Vec<u8> {
        match self {
            KeySchedule::HashToElement { rejected_groups } if !rejected_groups.is_empty() => {
                rejected_groups.iter().flat_map(|g| g.to_le_bytes()).collect()
            }
            _ => vec![0u8; hash.output_len()],
        }
    }
}

/// Derive KCK, PMK and PMKID from our commit and the peer's.
///
/// Peer scalar and element must already have been validated.
///
/// # Errors
///
/// `Error::Degenerate` if the shared point is the identity.
pub fn derive_keys(
    pwe: &Pwe,
    own: &CommitValues,
    peer_scalar: &[u8],
    peer_element: &[u8],
    schedule: &KeySchedule,
) -> Result<SaeKeys> {
    let group = pwe.group;
    if own.group != group {
        return Err(Error::UnsupportedGroup(own.group.id()));
    }
    group.check_scalar(peer_scalar)?;
    group.check_element(peer_element)?;

    // K = rand * (peer_scalar * PWE + peer_element)
    let scaled = group.scalar_mul(peer_scalar, pwe.as_bytes())?;
    let sum = group.point_add(&scaled, peer_element)?;
    let shared = group.scalar_mul(&own.rand, &sum)?;
    let k = &shared[..group.prime_len()];

    let hash = schedule.hash(group);
    let keyseed = hmac(hash, &schedule.salt(hash), &[k])?;
    let context = group.scalar_add(&own.scalar, peer_scalar)?;

    let kck_len = hash.output_len();
    let bits = (kck_len + PMK_LEN) * 8;
    let okm = kdf_hash_length(hash, &keyseed, LABEL_KCK_PMK, &[context.as_slice()], bits)?;

    let mut pmk = [0u8; PMK_LEN];
    pmk.copy_from_slice(&okm[kck_len..kck_len + PMK_LEN]);
    let mut pmkid = [0u8; PMKID_LEN];
    pmkid.copy_from_slice(&context[..PMKID_LEN]);

    Ok(SaeKeys {
        hash,
        kck: okm[..kck_len].to_vec(),
        pmk,
        pmkid,
    })
}

/// Confirm tag: `HMAC(KCK, send_confirm || scalar || element || peer_scalar || peer_element)`.
pub fn compute_confirm(
    keys: &SaeKeys,
    send_confirm: u16,
    scalar: &[u8],
    element: &[u8],
    peer_scalar: &[u8],
    peer_element: &[u8],
) -> Result<Vec<u8>> {
    let counter = send_confirm.to_le_bytes();
    let tag = hmac(
        keys.hash,
        &keys.kck,
        &[&counter, scalar, element, peer_scalar, peer_element],
    )?;
    Ok(tag.to_vec())
}

/// Constant-time Confirm comparison.
pub fn confirm_matches(expected: &[u8], received: &[u8]) -> bool {
    expected.len() == received.len() && bool::from(expected.ct_eq(received))
}
