//! Candidate BSS records from the scan cache.

use crate::{
    ie::{self, EID_RSN, EID_RSNX, OSEN_VENDOR_TYPE, WPA_VENDOR_TYPE},
    rsn::SecurityElement,
    suite::{OUI_WFA, OUI_WPA},
    types::MacAddr,
    Result,
};

/// One observed access point. Read-only to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BssRecord {
    /// BSSID.
    pub bssid: MacAddr,
    /// SSID octets.
    pub ssid: Vec<u8>,
    /// Channel center frequency in MHz.
    pub freq: u32,
    /// Signal level in dBm.
    pub signal: i32,
    /// Raw information elements from the beacon or probe response.
    pub ies: Vec<u8>,
}

impl BssRecord {
    /// Parsed RSN element, if advertised.
    pub fn rsn(&self) -> Result<Option<SecurityElement>> {
        ie::find(&self.ies, EID_RSN)?
            .map(SecurityElement::parse_rsn)
            .transpose()
    }

    /// Parsed WPA element, if advertised.
    pub fn wpa(&self) -> Result<Option<SecurityElement>> {
        ie::find_vendor(&self.ies, OUI_WPA, WPA_VENDOR_TYPE)?
            .map(SecurityElement::parse_wpa)
            .transpose()
    }

    /// Parsed OSEN element, if advertised.
    pub fn osen(&self) -> Result<Option<SecurityElement>> {
        ie::find_vendor(&self.ies, OUI_WFA, OSEN_VENDOR_TYPE)?
            .map(SecurityElement::parse_osen)
            .transpose()
    }

    /// RSNXE capability bits, zero when absent.
    pub fn rsnxe_capabilities(&self) -> Result<u32> {
        Ok(ie::find(&self.ies, EID_RSNX)?
            .map(ie::parse_rsnxe)
            .unwrap_or(0))
    }
}
