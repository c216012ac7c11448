//! Information element framing.
//!
//! Walks `id || len || body` sequences from management frames and builds the
//! small capability elements the station appends to its association request:
//! - RSNXE (H2E and SAE-PK capability bits)
//! - Extended Capabilities
//! - Multi-AP

use crate::{suite::OUI_WFA, Error, Result};

/// RSN element.
pub const EID_RSN: u8 = 48;
/// Extended Capabilities element.
pub const EID_EXT_CAPAB: u8 = 127;
/// Vendor Specific element.
pub const EID_VENDOR: u8 = 221;
/// RSN Extension element.
pub const EID_RSNX: u8 = 244;
/// Element ID Extension.
pub const EID_EXTENSION: u8 = 255;

/// WPA vendor type under the 00-50-F2 OUI.
pub const WPA_VENDOR_TYPE: u8 = 0x01;
/// OSEN vendor type under the WFA OUI.
pub const OSEN_VENDOR_TYPE: u8 = 0x12;
/// Multi-AP vendor type under the WFA OUI.
pub const MULTI_AP_VENDOR_TYPE: u8 = 0x1b;

/// RSNXE: SAE hash-to-element support.
pub const RSNX_SAE_H2E: u32 = 1 << 5;
/// RSNXE: SAE-PK support.
pub const RSNX_SAE_PK: u32 = 1 << 6;

const MULTI_AP_SUB_ELEM_TYPE: u8 = 0x06;
const MULTI_AP_BACKHAUL_STA: u8 = 0x80;

/// One element borrowed from a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Element<'a> {
    /// Element ID.
    pub id: u8,
    /// Body without the two header octets.
    pub body: &'a [u8],
}

impl<'a> Element<'a> {
    /// Vendor element body after `oui || type`, if it matches.
    pub fn vendor_body(&self, oui: [u8; 3], vendor_type: u8) -> Option<&'a [u8]> {
        if self.id != EID_VENDOR || self.body.len() < 4 {
            return None;
        }
        if self.body[..3] == oui && self.body[3] == vendor_type {
            Some(&self.body[4..])
        } else {
            None
        }
    }
}

/// Iterator over the elements of a buffer.
///
/// Yields `Err` once on a truncated element and then stops.
pub struct Elements<'a> {
    data: &'a [u8],
    failed: bool,
}

/// Iterate over the elements in `data`.
pub fn elements(data: &[u8]) -> Elements<'_> {
    Elements {
        data,
        failed: false,
    }
}

impl<'a> Iterator for Elements<'a> {
    type Item = Result<Element<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.data.is_empty() {
            return None;
        }
        if self.data.len() < 2 {
            self.failed = true;
            return Some(Err(Error::InvalidElement("truncated element header".into())));
        }
        let id = self.data[0];
        let len = self.data[1] as usize;
        if self.data.len() < 2 + len {
            self.failed = true;
            return Some(Err(Error::InvalidElement(format!(
                "element {id} claims {len} octets, {} available",
                self.data.len() - 2
            ))));
        }
        let body = &self.data[2..2 + len];
        self.data = &self.data[2 + len..];
        Some(Ok(Element { id, body }))
    }
}

/// First element with `id`.
pub fn find(data: &[u8], id: u8) -> Result<Option<&[u8]>> {
    for element in elements(data) {
        let element = element?;
        if element.id == id {
            return Ok(Some(element.body));
        }
    }
    Ok(None)
}

/// First vendor element with `oui || vendor_type`; returns the body after the type octet.
pub fn find_vendor(data: &[u8], oui: [u8; 3], vendor_type: u8) -> Result<Option<&[u8]>> {
    for element in elements(data) {
        if let Some(body) = element?.vendor_body(oui, vendor_type) {
            return Ok(Some(body));
        }
    }
    Ok(None)
}

/// Decode RSNXE capability bits (up to 32).
///
/// The low nibble of the first octet holds the field length minus one; the
/// nibble itself occupies bits 0..=3 and is masked out.
pub fn parse_rsnxe(body: &[u8]) -> u32 {
    let mut caps = 0u32;
    for (i, octet) in body.iter().take(4).enumerate() {
        caps |= u32::from(*octet) << (8 * i);
    }
    caps & !0x0f
}

/// Build an RSNXE carrying `caps`, or nothing when no capability is set.
pub fn build_rsnxe(caps: u32) -> Vec<u8> {
    let caps = caps & !0x0f;
    if caps == 0 {
        return Vec::new();
    }
    let bytes = caps.to_le_bytes();
    let used = bytes.iter().rposition(|b| *b != 0).map_or(1, |i| i + 1);
    let mut field = bytes[..used].to_vec();
    field[0] |= (used - 1) as u8;
    let mut out = vec![EID_RSNX, used as u8];
    out.extend_from_slice(&field);
    out
}

/// Station extended capabilities to advertise.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtCapabConfig {
    /// WNM-Sleep mode (bit 17).
    pub wnm_sleep_mode: bool,
    /// BSS transition management (bit 19).
    pub bss_transition: bool,
    /// Interworking (bit 31).
    pub interworking: bool,
    /// QoS Map (bit 32).
    pub qos_map: bool,
    /// FTM responder (bit 70).
    pub ftm_responder: bool,
    /// FTM initiator (bit 71).
    pub ftm_initiator: bool,
    /// FILS capability (bit 72).
    pub fils: bool,
}

impl ExtCapabConfig {
    fn bits(&self) -> [(bool, usize); 7] {
        [
            (self.wnm_sleep_mode, 17),
            (self.bss_transition, 19),
            (self.interworking, 31),
            (self.qos_map, 32),
            (self.ftm_responder, 70),
            (self.ftm_initiator, 71),
            (self.fils, 72),
        ]
    }
}

/// Build the Extended Capabilities element; trailing zero octets are trimmed
/// and an all-zero field produces nothing.
pub fn build_ext_capab(config: &ExtCapabConfig) -> Vec<u8> {
    let mut field = [0u8; 10];
    for (set, bit) in config.bits() {
        if set {
            field[bit / 8] |= 1 << (bit % 8);
        }
    }
    let Some(last) = field.iter().rposition(|b| *b != 0) else {
        return Vec::new();
    };
    let mut out = vec![EID_EXT_CAPAB, (last + 1) as u8];
    out.extend_from_slice(&field[..=last]);
    out
}

/// Build the Multi-AP element announcing a backhaul station.
pub fn build_multi_ap_backhaul_sta() -> Vec<u8> {
    vec![
        EID_VENDOR,
        7,
        OUI_WFA[0],
        OUI_WFA[1],
        OUI_WFA[2],
        MULTI_AP_VENDOR_TYPE,
        MULTI_AP_SUB_ELEM_TYPE,
        1,
        MULTI_AP_BACKHAUL_STA,
    ]
}
