//! Small value types shared across the engine.

use core::fmt;
use zeroize::Zeroizing;

/// IEEE 802 MAC address (BSSID or station address).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct MacAddr(pub [u8; 6]);

impl MacAddr {
    /// The all-zero address.
    pub const ZERO: MacAddr = MacAddr([0; 6]);

    /// Raw octets.
    pub fn octets(&self) -> &[u8; 6] {
        &self.0
    }
}

impl From<[u8; 6]> for MacAddr {
    fn from(octets: [u8; 6]) -> Self {
        MacAddr(octets)
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let o = &self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            o[0], o[1], o[2], o[3], o[4], o[5]
        )
    }
}

impl fmt::Debug for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// PMK identifier.
pub type Pmkid = [u8; 16];

/// Pairwise master key. Debug output is redacted.
#[derive(Clone, PartialEq, Eq)]
pub struct Pmk(Zeroizing<[u8; 32]>);

impl Pmk {
    /// Wrap raw key material.
    pub fn new(bytes: [u8; 32]) -> Self {
        Pmk(Zeroizing::new(bytes))
    }

    /// Key bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for Pmk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Pmk(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mac_display() {
        let mac = MacAddr([0x02, 0xab, 0x00, 0x10, 0xff, 0x01]);
        assert_eq!(mac.to_string(), "02:ab:00:10:ff:01");
        assert_eq!(format!("{mac:?}"), "02:ab:00:10:ff:01");
    }

    #[test]
    fn test_pmk_debug_is_redacted() {
        let pmk = Pmk::new([0x42; 32]);
        assert_eq!(format!("{pmk:?}"), "Pmk(..)");
    }
}
