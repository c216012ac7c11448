//! Cipher, AKM and protocol sets plus their 802.11 suite selectors.

use bitflags::bitflags;

/// RSN suite OUI (00-0F-AC).
pub const OUI_RSN: [u8; 3] = [0x00, 0x0f, 0xac];
/// WPA suite OUI (00-50-F2).
pub const OUI_WPA: [u8; 3] = [0x00, 0x50, 0xf2];
/// Wi-Fi Alliance OUI (50-6F-9A), used by OSEN.
pub const OUI_WFA: [u8; 3] = [0x50, 0x6f, 0x9a];

bitflags! {
    /// Security protocol family.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Proto: u8 {
        /// WPA (vendor element).
        const WPA = 1 << 0;
        /// RSN / WPA2 / WPA3.
        const RSN = 1 << 1;
        /// Hotspot 2.0 OSU server-only authenticated layer 2.
        const OSEN = 1 << 2;
    }
}

bitflags! {
    /// Pairwise, group and group-management cipher suites.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Cipher: u32 {
        /// Use group cipher / no encryption.
        const NONE = 1 << 0;
        /// WEP-40.
        const WEP40 = 1 << 1;
        /// WEP-104.
        const WEP104 = 1 << 2;
        /// TKIP.
        const TKIP = 1 << 3;
        /// CCMP-128.
        const CCMP = 1 << 4;
        /// GCMP-128.
        const GCMP = 1 << 5;
        /// CCMP-256.
        const CCMP_256 = 1 << 6;
        /// GCMP-256.
        const GCMP_256 = 1 << 7;
        /// Group addressed traffic not allowed.
        const GTK_NOT_USED = 1 << 8;
        /// BIP-CMAC-128.
        const BIP_CMAC_128 = 1 << 9;
        /// BIP-GMAC-128.
        const BIP_GMAC_128 = 1 << 10;
        /// BIP-GMAC-256.
        const BIP_GMAC_256 = 1 << 11;
        /// BIP-CMAC-256.
        const BIP_CMAC_256 = 1 << 12;

        /// Every group-management cipher.
        const GROUP_MGMT = Self::BIP_CMAC_128.bits()
            | Self::BIP_GMAC_128.bits()
            | Self::BIP_GMAC_256.bits()
            | Self::BIP_CMAC_256.bits();
    }
}

bitflags! {
    /// Authenticated key management suites.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Akm: u32 {
        /// IEEE 802.1X.
        const IEEE8021X = 1 << 0;
        /// PSK.
        const PSK = 1 << 1;
        /// WPA-None (IBSS).
        const WPA_NONE = 1 << 2;
        /// FT over IEEE 802.1X.
        const FT_IEEE8021X = 1 << 3;
        /// FT PSK.
        const FT_PSK = 1 << 4;
        /// IEEE 802.1X with SHA-256.
        const IEEE8021X_SHA256 = 1 << 5;
        /// PSK with SHA-256.
        const PSK_SHA256 = 1 << 6;
        /// SAE.
        const SAE = 1 << 7;
        /// FT over SAE.
        const FT_SAE = 1 << 8;
        /// Suite B.
        const SUITE_B = 1 << 9;
        /// Suite B 192-bit.
        const SUITE_B_192 = 1 << 10;
        /// FT over IEEE 802.1X with SHA-384.
        const FT_IEEE8021X_SHA384 = 1 << 11;
        /// FILS with SHA-256.
        const FILS_SHA256 = 1 << 12;
        /// FILS with SHA-384.
        const FILS_SHA384 = 1 << 13;
        /// FT over FILS with SHA-256.
        const FT_FILS_SHA256 = 1 << 14;
        /// FT over FILS with SHA-384.
        const FT_FILS_SHA384 = 1 << 15;
        /// OSEN.
        const OSEN = 1 << 16;
        /// Opportunistic Wireless Encryption.
        const OWE = 1 << 17;
    }
}

impl Akm {
    /// SAE or FT-SAE.
    pub fn is_sae(self) -> bool {
        self.intersects(Akm::SAE | Akm::FT_SAE)
    }

    /// Passphrase/PSK based (excluding SAE).
    pub fn is_psk(self) -> bool {
        self.intersects(Akm::PSK | Akm::FT_PSK | Akm::PSK_SHA256)
    }

    /// IEEE 802.1X family, including FILS, Suite B and OSEN.
    pub fn is_ieee8021x(self) -> bool {
        self.intersects(
            Akm::IEEE8021X
                | Akm::FT_IEEE8021X
                | Akm::FT_IEEE8021X_SHA384
                | Akm::IEEE8021X_SHA256
                | Akm::SUITE_B
                | Akm::SUITE_B_192
                | Akm::FILS_SHA256
                | Akm::FILS_SHA384
                | Akm::FT_FILS_SHA256
                | Akm::FT_FILS_SHA384
                | Akm::OSEN,
        )
    }
}

impl Cipher {
    /// Pairwise choice: CCMP-256 > GCMP-256 > CCMP > GCMP > TKIP > NONE.
    pub fn pick_pairwise(self) -> Option<Cipher> {
        [
            Cipher::CCMP_256,
            Cipher::GCMP_256,
            Cipher::CCMP,
            Cipher::GCMP,
            Cipher::TKIP,
            Cipher::NONE,
        ]
        .into_iter()
        .find(|c| self.contains(*c))
    }

    /// Group choice: CCMP-256 > GCMP-256 > CCMP > GCMP > GTK-not-used > TKIP.
    pub fn pick_group(self) -> Option<Cipher> {
        [
            Cipher::CCMP_256,
            Cipher::GCMP_256,
            Cipher::CCMP,
            Cipher::GCMP,
            Cipher::GTK_NOT_USED,
            Cipher::TKIP,
        ]
        .into_iter()
        .find(|c| self.contains(*c))
    }

    /// Group-management choice: BIP-CMAC-128 > BIP-GMAC-128 > BIP-GMAC-256 > BIP-CMAC-256.
    pub fn pick_group_mgmt(self) -> Option<Cipher> {
        [
            Cipher::BIP_CMAC_128,
            Cipher::BIP_GMAC_128,
            Cipher::BIP_GMAC_256,
            Cipher::BIP_CMAC_256,
        ]
        .into_iter()
        .find(|c| self.contains(*c))
    }
}

const RSN_CIPHERS: [(u8, Cipher); 13] = [
    (0, Cipher::NONE),
    (1, Cipher::WEP40),
    (2, Cipher::TKIP),
    (4, Cipher::CCMP),
    (5, Cipher::WEP104),
    (6, Cipher::BIP_CMAC_128),
    (7, Cipher::GTK_NOT_USED),
    (8, Cipher::GCMP),
    (9, Cipher::GCMP_256),
    (10, Cipher::CCMP_256),
    (11, Cipher::BIP_GMAC_128),
    (12, Cipher::BIP_GMAC_256),
    (13, Cipher::BIP_CMAC_256),
];

const WPA_CIPHERS: [(u8, Cipher); 5] = [
    (0, Cipher::NONE),
    (1, Cipher::WEP40),
    (2, Cipher::TKIP),
    (4, Cipher::CCMP),
    (5, Cipher::WEP104),
];

const RSN_AKMS: [(u8, Akm); 16] = [
    (1, Akm::IEEE8021X),
    (2, Akm::PSK),
    (3, Akm::FT_IEEE8021X),
    (4, Akm::FT_PSK),
    (5, Akm::IEEE8021X_SHA256),
    (6, Akm::PSK_SHA256),
    (8, Akm::SAE),
    (9, Akm::FT_SAE),
    (11, Akm::SUITE_B),
    (12, Akm::SUITE_B_192),
    (13, Akm::FT_IEEE8021X_SHA384),
    (14, Akm::FILS_SHA256),
    (15, Akm::FILS_SHA384),
    (16, Akm::FT_FILS_SHA256),
    (17, Akm::FT_FILS_SHA384),
    (18, Akm::OWE),
];

const WPA_AKMS: [(u8, Akm); 3] = [(0, Akm::WPA_NONE), (1, Akm::IEEE8021X), (2, Akm::PSK)];

/// OSEN AKM selector (50-6F-9A:1).
const OSEN_AKM_TYPE: u8 = 1;

fn suite_oui(proto: Proto) -> [u8; 3] {
    if proto == Proto::WPA {
        OUI_WPA
    } else {
        OUI_RSN
    }
}

/// Decode a cipher selector; unknown selectors map to the empty set.
pub fn cipher_from_selector(proto: Proto, selector: [u8; 4]) -> Cipher {
    if selector[..3] != suite_oui(proto) {
        return Cipher::empty();
    }
    let table: &[(u8, Cipher)] = if proto == Proto::WPA {
        &WPA_CIPHERS
    } else {
        &RSN_CIPHERS
    };
    table
        .iter()
        .find(|(t, _)| *t == selector[3])
        .map(|(_, c)| *c)
        .unwrap_or_else(Cipher::empty)
}

/// Encode a single cipher as a selector.
pub fn cipher_selector(proto: Proto, cipher: Cipher) -> Option<[u8; 4]> {
    let table: &[(u8, Cipher)] = if proto == Proto::WPA {
        &WPA_CIPHERS
    } else {
        &RSN_CIPHERS
    };
    let oui = suite_oui(proto);
    table
        .iter()
        .find(|(_, c)| *c == cipher)
        .map(|(t, _)| [oui[0], oui[1], oui[2], *t])
}

/// Decode an AKM selector; unknown selectors map to the empty set.
pub fn akm_from_selector(proto: Proto, selector: [u8; 4]) -> Akm {
    if selector[..3] == OUI_WFA && selector[3] == OSEN_AKM_TYPE && proto != Proto::WPA {
        return Akm::OSEN;
    }
    if selector[..3] != suite_oui(proto) {
        return Akm::empty();
    }
    let table: &[(u8, Akm)] = if proto == Proto::WPA {
        &WPA_AKMS
    } else {
        &RSN_AKMS
    };
    table
        .iter()
        .find(|(t, _)| *t == selector[3])
        .map(|(_, a)| *a)
        .unwrap_or_else(Akm::empty)
}

/// Encode a single AKM as a selector.
pub fn akm_selector(proto: Proto, akm: Akm) -> Option<[u8; 4]> {
    if akm == Akm::OSEN {
        return Some([OUI_WFA[0], OUI_WFA[1], OUI_WFA[2], OSEN_AKM_TYPE]);
    }
    let table: &[(u8, Akm)] = if proto == Proto::WPA {
        &WPA_AKMS
    } else {
        &RSN_AKMS
    };
    let oui = suite_oui(proto);
    table
        .iter()
        .find(|(_, a)| *a == akm)
        .map(|(t, _)| [oui[0], oui[1], oui[2], *t])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selectors() {
        assert_eq!(
            cipher_from_selector(Proto::RSN, [0x00, 0x0f, 0xac, 4]),
            Cipher::CCMP
        );
        assert_eq!(
            cipher_from_selector(Proto::WPA, [0x00, 0x50, 0xf2, 2]),
            Cipher::TKIP
        );
        // RSN selector inside a WPA element is not recognised
        assert!(cipher_from_selector(Proto::WPA, [0x00, 0x0f, 0xac, 4]).is_empty());
        assert_eq!(akm_from_selector(Proto::RSN, [0x00, 0x0f, 0xac, 8]), Akm::SAE);
        assert_eq!(akm_from_selector(Proto::OSEN, [0x50, 0x6f, 0x9a, 1]), Akm::OSEN);
        assert!(akm_from_selector(Proto::RSN, [0x00, 0x0f, 0xac, 99]).is_empty());

        assert_eq!(akm_selector(Proto::RSN, Akm::FT_SAE), Some([0x00, 0x0f, 0xac, 9]));
        assert_eq!(cipher_selector(Proto::WPA, Cipher::CCMP), Some([0x00, 0x50, 0xf2, 4]));
        assert_eq!(cipher_selector(Proto::WPA, Cipher::GCMP), None);
    }

    #[test]
    fn test_cipher_priority() {
        assert_eq!((Cipher::CCMP | Cipher::TKIP).pick_pairwise(), Some(Cipher::CCMP));
        assert_eq!((Cipher::GCMP_256 | Cipher::CCMP).pick_pairwise(), Some(Cipher::GCMP_256));
        assert_eq!((Cipher::TKIP | Cipher::GTK_NOT_USED).pick_group(), Some(Cipher::GTK_NOT_USED));
        assert_eq!(Cipher::WEP40.pick_group(), None);
        assert_eq!(
            (Cipher::BIP_CMAC_256 | Cipher::BIP_GMAC_128).pick_group_mgmt(),
            Some(Cipher::BIP_GMAC_128)
        );
    }

    #[test]
    fn test_akm_families() {
        assert!(Akm::FT_SAE.is_sae());
        assert!(!Akm::PSK.is_sae());
        assert!(Akm::PSK_SHA256.is_psk());
        assert!(Akm::SUITE_B_192.is_ieee8021x());
        assert!(!Akm::SAE.is_ieee8021x());
    }
}
