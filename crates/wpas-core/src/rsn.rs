//! RSN, WPA and OSEN security elements.
//!
//! Parsing follows the field order of IEEE 802.11 §9.4.2.24: version, group
//! cipher, pairwise list, AKM list, capabilities, PMKID list, group
//! management cipher. Every field after the version is optional and parsing
//! stops cleanly at the end of the body; a field that is started but not
//! finished is an error.

use crate::{
    ie::{EID_RSN, EID_VENDOR, OSEN_VENDOR_TYPE, WPA_VENDOR_TYPE},
    suite::{
        akm_from_selector, akm_selector, cipher_from_selector, cipher_selector, Akm, Cipher, Proto,
        OUI_WFA, OUI_WPA,
    },
    Error, Result,
};

/// RSN capabilities: management frame protection required.
pub const RSN_CAP_MFPR: u16 = 1 << 6;
/// RSN capabilities: management frame protection capable.
pub const RSN_CAP_MFPC: u16 = 1 << 7;

const SELECTOR_LEN: usize = 4;
const PMKID_LEN: usize = 16;

/// A parsed security element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityElement {
    /// Protocol family the element was parsed as.
    pub proto: Proto,
    /// Group data cipher.
    pub group: Cipher,
    /// Union of the advertised pairwise ciphers.
    pub pairwise: Cipher,
    /// Union of the advertised AKMs.
    pub akm: Akm,
    /// RSN capabilities field.
    pub capabilities: u16,
    /// PMKID list.
    pub pmkids: Vec<[u8; PMKID_LEN]>,
    /// Group management cipher.
    pub group_mgmt: Cipher,
}

struct Reader<'a> {
    data: &'a [u8],
}

impl<'a> Reader<'a> {
    fn remaining(&self) -> usize {
        self.data.len()
    }

    fn take(&mut self, n: usize, what: &str) -> Result<&'a [u8]> {
        if self.data.len() < n {
            return Err(Error::InvalidElement(format!(
                "truncated {what}: need {n} octets, have {}",
                self.data.len()
            )));
        }
        let (head, tail) = self.data.split_at(n);
        self.data = tail;
        Ok(head)
    }

    fn u16_le(&mut self, what: &str) -> Result<u16> {
        let b = self.take(2, what)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn selector(&mut self, what: &str) -> Result<[u8; SELECTOR_LEN]> {
        let b = self.take(SELECTOR_LEN, what)?;
        Ok([b[0], b[1], b[2], b[3]])
    }

    fn selector_list(&mut self, what: &str) -> Result<Vec<[u8; SELECTOR_LEN]>> {
        let count = self.u16_le(what)? as usize;
        if count == 0 {
            return Err(Error::InvalidElement(format!("empty {what} list")));
        }
        if self.remaining() < count * SELECTOR_LEN {
            return Err(Error::InvalidElement(format!(
                "{what} count {count} exceeds element"
            )));
        }
        (0..count).map(|_| self.selector(what)).collect()
    }
}

impl SecurityElement {
    /// Parse an RSN element body (after `48 || len`).
    pub fn parse_rsn(body: &[u8]) -> Result<Self> {
        let mut r = Reader { data: body };
        let version = r.u16_le("version")?;
        if version != 1 {
            return Err(Error::InvalidElement(format!("unsupported RSN version {version}")));
        }
        let element = Self {
            proto: Proto::RSN,
            group: Cipher::CCMP,
            pairwise: Cipher::CCMP,
            akm: Akm::IEEE8021X,
            capabilities: 0,
            pmkids: Vec::new(),
            group_mgmt: Cipher::empty(),
        };
        Self::parse_rsn_fields(r, element)
    }

    /// Parse an OSEN vendor element body (after `50-6F-9A || 0x12`).
    pub fn parse_osen(body: &[u8]) -> Result<Self> {
        let element = Self {
            proto: Proto::OSEN,
            group: Cipher::GTK_NOT_USED,
            pairwise: Cipher::CCMP,
            akm: Akm::OSEN,
            capabilities: 0,
            pmkids: Vec::new(),
            group_mgmt: Cipher::empty(),
        };
        Self::parse_rsn_fields(Reader { data: body }, element)
    }

    fn parse_rsn_fields(mut r: Reader<'_>, mut element: Self) -> Result<Self> {
        let proto = element.proto;

        if r.remaining() >= SELECTOR_LEN {
            element.group = cipher_from_selector(proto, r.selector("group cipher")?);
            if element.group.intersects(Cipher::GROUP_MGMT) {
                return Err(Error::InvalidElement("BIP used as group data cipher".into()));
            }
        } else if r.remaining() > 0 {
            return Err(Error::InvalidElement("truncated group cipher".into()));
        }

        if r.remaining() > 0 {
            element.pairwise = r
                .selector_list("pairwise cipher")?
                .into_iter()
                .fold(Cipher::empty(), |acc, s| acc | cipher_from_selector(proto, s));
        }

        if r.remaining() > 0 {
            element.akm = r
                .selector_list("AKM")?
                .into_iter()
                .fold(Akm::empty(), |acc, s| acc | akm_from_selector(proto, s));
        }

        if r.remaining() > 0 {
            element.capabilities = r.u16_le("capabilities")?;
        }

        if element.capabilities & RSN_CAP_MFPC != 0 {
            element.group_mgmt = Cipher::BIP_CMAC_128;
        }

        if r.remaining() > 0 {
            let count = r.u16_le("PMKID count")? as usize;
            if r.remaining() < count * PMKID_LEN {
                return Err(Error::InvalidElement(format!(
                    "PMKID count {count} exceeds element"
                )));
            }
            for _ in 0..count {
                let mut pmkid = [0u8; PMKID_LEN];
                pmkid.copy_from_slice(r.take(PMKID_LEN, "PMKID")?);
                element.pmkids.push(pmkid);
            }
        }

        if r.remaining() > 0 {
            let cipher = cipher_from_selector(proto, r.selector("group management cipher")?);
            if cipher.is_empty() || !Cipher::GROUP_MGMT.contains(cipher) {
                return Err(Error::InvalidElement(
                    "unsupported group management cipher".into(),
                ));
            }
            element.group_mgmt = cipher;
        }

        Ok(element)
    }

    /// Parse a WPA vendor element body (after `00-50-F2 || 0x01`).
    pub fn parse_wpa(body: &[u8]) -> Result<Self> {
        let mut r = Reader { data: body };
        let version = r.u16_le("version")?;
        if version != 1 {
            return Err(Error::InvalidElement(format!("unsupported WPA version {version}")));
        }
        let proto = Proto::WPA;
        let mut element = Self {
            proto,
            group: Cipher::TKIP,
            pairwise: Cipher::TKIP,
            akm: Akm::IEEE8021X,
            capabilities: 0,
            pmkids: Vec::new(),
            group_mgmt: Cipher::empty(),
        };

        if r.remaining() >= SELECTOR_LEN {
            element.group = cipher_from_selector(proto, r.selector("group cipher")?);
        } else if r.remaining() > 0 {
            return Err(Error::InvalidElement("truncated group cipher".into()));
        }
        if r.remaining() > 0 {
            element.pairwise = r
                .selector_list("pairwise cipher")?
                .into_iter()
                .fold(Cipher::empty(), |acc, s| acc | cipher_from_selector(proto, s));
        }
        if r.remaining() > 0 {
            element.akm = r
                .selector_list("AKM")?
                .into_iter()
                .fold(Akm::empty(), |acc, s| acc | akm_from_selector(proto, s));
        }
        if r.remaining() >= 2 {
            element.capabilities = r.u16_le("capabilities")?;
        }
        Ok(element)
    }

    /// Management frame protection capable.
    pub fn mfp_capable(&self) -> bool {
        self.capabilities & RSN_CAP_MFPC != 0
    }

    /// Management frame protection required.
    pub fn mfp_required(&self) -> bool {
        self.capabilities & RSN_CAP_MFPR != 0
    }
}

/// Station's own security element for the association request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnSecurityElement {
    /// Protocol family.
    pub proto: Proto,
    /// Selected group cipher.
    pub group: Cipher,
    /// Selected pairwise cipher.
    pub pairwise: Cipher,
    /// Selected AKM.
    pub akm: Akm,
    /// RSN capabilities.
    pub capabilities: u16,
    /// PMKID to advertise, if any.
    pub pmkid: Option<[u8; PMKID_LEN]>,
    /// Selected group management cipher.
    pub group_mgmt: Option<Cipher>,
}

impl OwnSecurityElement {
    /// Serialize including the element header.
    ///
    /// # Errors
    ///
    /// `Error::InvalidElement` if a selected suite has no selector for the protocol.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let proto = self.proto;
        let group = cipher_selector(proto, self.group)
            .ok_or_else(|| Error::InvalidElement(format!("no selector for {:?}", self.group)))?;
        let pairwise = cipher_selector(proto, self.pairwise)
            .ok_or_else(|| Error::InvalidElement(format!("no selector for {:?}", self.pairwise)))?;
        let akm = akm_selector(proto, self.akm)
            .ok_or_else(|| Error::InvalidElement(format!("no selector for {:?}", self.akm)))?;

        let mut body = Vec::with_capacity(64);
        if proto == Proto::WPA {
            body.extend_from_slice(&OUI_WPA);
            body.push(WPA_VENDOR_TYPE);
        } else if proto == Proto::OSEN {
            body.extend_from_slice(&OUI_WFA);
            body.push(OSEN_VENDOR_TYPE);
        }
        if proto != Proto::OSEN {
            body.extend_from_slice(&1u16.to_le_bytes());
        }
        body.extend_from_slice(&group);
        body.extend_from_slice(&1u16.to_le_bytes());
        body.extend_from_slice(&pairwise);
        body.extend_from_slice(&1u16.to_le_bytes());
        body.extend_from_slice(&akm);

        if proto != Proto::WPA {
            body.extend_from_slice(&self.capabilities.to_le_bytes());
            let mgmt = self.group_mgmt.filter(|c| *c != Cipher::BIP_CMAC_128);
            if let Some(pmkid) = &self.pmkid {
                body.extend_from_slice(&1u16.to_le_bytes());
                body.extend_from_slice(pmkid);
            } else if mgmt.is_some() {
                body.extend_from_slice(&0u16.to_le_bytes());
            }
            if let Some(mgmt) = mgmt {
                let selector = cipher_selector(proto, mgmt).ok_or_else(|| {
                    Error::InvalidElement(format!("no selector for {mgmt:?}"))
                })?;
                body.extend_from_slice(&selector);
            }
        }

        let id = if proto == Proto::RSN { EID_RSN } else { EID_VENDOR };
        let len = u8::try_from(body.len())
            .map_err(|_| Error::InvalidElement("security element too long".into()))?;
        let mut out = Vec::with_capacity(body.len() + 2);
        out.push(id);
        out.push(len);
        out.extend_from_slice(&body);
        Ok(out)
    }
}
