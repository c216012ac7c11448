//! SAE Commit / Confirm / anti-clogging message codec.
//!
//! Commit layout:
//!
//! ```text
//! group (LE16) | [token, legacy only] | scalar | element
//!   | [Password Identifier 255/33] | [Rejected Groups 255/92, H2E]
//!   | [Anti-Clogging Token Container 255/93, H2E] | [SAE-PK signature 255/98]
//! ```

use crate::{
    ie::{elements, EID_EXTENSION},
    types::MacAddr,
    Error, Result,
};
use wpas_crypto::SaeGroup;

/// Extension ID of the Password Identifier element.
pub const EXT_PASSWORD_IDENTIFIER: u8 = 33;
/// Extension ID of the Rejected Groups element.
pub const EXT_REJECTED_GROUPS: u8 = 92;
/// Extension ID of the Anti-Clogging Token Container element.
pub const EXT_ANTI_CLOGGING_TOKEN: u8 = 93;
/// Extension ID of the SAE-PK signature element.
pub const EXT_SAE_PK_SIGNATURE: u8 = 98;

const MAX_EXT_DATA: usize = 254;

fn check_len(data: &[u8], needed: usize, what: &str) -> Result<()> {
    if data.len() < needed {
        return Err(Error::MalformedFrame(format!(
            "{what}: need {needed} octets, have {}",
            data.len()
        )));
    }
    Ok(())
}

fn read_u16_le(data: &[u8]) -> u16 {
    u16::from_le_bytes([data[0], data[1]])
}

fn push_ext(out: &mut Vec<u8>, ext_id: u8, data: &[u8]) -> Result<()> {
    if data.len() > MAX_EXT_DATA {
        return Err(Error::MalformedFrame(format!(
            "extension element {ext_id} too long: {}",
            data.len()
        )));
    }
    out.push(EID_EXTENSION);
    out.push(data.len() as u8 + 1);
    out.push(ext_id);
    out.extend_from_slice(data);
    Ok(())
}

fn group_lengths(group: u16) -> Result<(SaeGroup, usize, usize)> {
    let sae_group = SaeGroup::from_id(group).map_err(|_| Error::UnsupportedGroup(group))?;
    Ok((sae_group, sae_group.order_len(), sae_group.element_len()))
}

fn is_password_id_element(data: &[u8]) -> bool {
    data.len() >= 3
        && data[0] == EID_EXTENSION
        && data[2] == EXT_PASSWORD_IDENTIFIER
        && data[1] as usize + 2 == data.len()
}

fn password_id_from(data: &[u8]) -> Result<String> {
    String::from_utf8(data.to_vec())
        .map_err(|_| Error::MalformedFrame("password identifier is not UTF-8".into()))
}

/// SAE-PK signature carried in a Commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkSignature {
    /// SEC1 encoded public key.
    pub public_key: Vec<u8>,
    /// ECDSA signature (r || s).
    pub signature: Vec<u8>,
}

/// SAE Commit message.
#[derive(Clone, PartialEq, Eq)]
pub struct CommitMessage {
    /// Finite cyclic group.
    pub group: u16,
    /// Anti-clogging token echoed back to the peer.
    pub token: Option<Vec<u8>>,
    /// Commit scalar.
    pub scalar: Vec<u8>,
    /// Commit element (uncompressed x || y).
    pub element: Vec<u8>,
    /// Password identifier.
    pub password_id: Option<String>,
    /// Groups rejected earlier in the exchange (H2E only).
    pub rejected_groups: Vec<u16>,
    /// SAE-PK signature.
    pub pk_signature: Option<PkSignature>,
}

impl core::fmt::Debug for CommitMessage {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CommitMessage")
            .field("group", &self.group)
            .field("token_len", &self.token.as_ref().map(Vec::len))
            .field("password_id", &self.password_id)
            .field("rejected_groups", &self.rejected_groups)
            .field("pk", &self.pk_signature.is_some())
            .finish_non_exhaustive()
    }
}

impl CommitMessage {
    /// Parse a Commit body.
    ///
    /// In legacy mode everything between the group and the scalar is the
    /// anti-clogging token and only a Password Identifier may follow the
    /// element.
    ///
    /// # Errors
    ///
    /// `Error::UnsupportedGroup` for a group we do not implement,
    /// `Error::MalformedFrame` for anything truncated or inconsistent.
    pub fn parse(payload: &[u8], h2e: bool) -> Result<Self> {
        check_len(payload, 2, "commit group")?;
        let group = read_u16_le(payload);
        let (_, scalar_len, element_len) = group_lengths(group)?;
        let fixed = scalar_len + element_len;
        let rest = &payload[2..];
        check_len(rest, fixed, "commit scalar/element")?;

        let mut msg = CommitMessage {
            group,
            token: None,
            scalar: Vec::new(),
            element: Vec::new(),
            password_id: None,
            rejected_groups: Vec::new(),
            pk_signature: None,
        };

        let tail;
        if h2e {
            msg.scalar = rest[..scalar_len].to_vec();
            msg.element = rest[scalar_len..fixed].to_vec();
            tail = &rest[fixed..];
        } else {
            if rest.len() > fixed && is_password_id_element(&rest[fixed..]) {
                msg.scalar = rest[..scalar_len].to_vec();
                msg.element = rest[scalar_len..fixed].to_vec();
                msg.password_id = Some(password_id_from(&rest[fixed + 3..])?);
            } else {
                let token_len = rest.len() - fixed;
                if token_len > 0 {
                    msg.token = Some(rest[..token_len].to_vec());
                }
                msg.scalar = rest[token_len..token_len + scalar_len].to_vec();
                msg.element = rest[token_len + scalar_len..].to_vec();
            }
            return Ok(msg);
        }

        for element in elements(tail) {
            let element = element.map_err(|e| Error::MalformedFrame(e.to_string()))?;
            if element.id != EID_EXTENSION || element.body.is_empty() {
                return Err(Error::MalformedFrame(format!(
                    "unexpected element {} in commit",
                    element.id
                )));
            }
            let data = &element.body[1..];
            match element.body[0] {
                EXT_PASSWORD_IDENTIFIER => msg.password_id = Some(password_id_from(data)?),
                EXT_REJECTED_GROUPS => {
                    if data.is_empty() || data.len() % 2 != 0 {
                        return Err(Error::MalformedFrame("bad Rejected Groups element".into()));
                    }
                    msg.rejected_groups = data.chunks_exact(2).map(read_u16_le).collect();
                }
                EXT_ANTI_CLOGGING_TOKEN => msg.token = Some(data.to_vec()),
                EXT_SAE_PK_SIGNATURE => {
                    check_len(data, 1, "SAE-PK key length")?;
                    let key_len = data[0] as usize;
                    let sig = &data[1..];
                    check_len(sig, key_len + 1, "SAE-PK signature")?;
                    msg.pk_signature = Some(PkSignature {
                        public_key: sig[..key_len].to_vec(),
                        signature: sig[key_len..].to_vec(),
                    });
                }
                other => {
                    return Err(Error::MalformedFrame(format!(
                        "unexpected extension element {other} in commit"
                    )))
                }
            }
        }
        Ok(msg)
    }

    /// Serialize a Commit body.
    pub fn serialize(&self, h2e: bool) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(2 + self.scalar.len() + self.element.len() + 64);
        out.extend_from_slice(&self.group.to_le_bytes());
        if let (false, Some(token)) = (h2e, &self.token) {
            out.extend_from_slice(token);
        }
        out.extend_from_slice(&self.scalar);
        out.extend_from_slice(&self.element);
        if let Some(id) = &self.password_id {
            push_ext(&mut out, EXT_PASSWORD_IDENTIFIER, id.as_bytes())?;
        }
        if h2e {
            if !self.rejected_groups.is_empty() {
                let groups: Vec<u8> =
                    self.rejected_groups.iter().flat_map(|g| g.to_le_bytes()).collect();
                push_ext(&mut out, EXT_REJECTED_GROUPS, &groups)?;
            }
            if let Some(token) = &self.token {
                push_ext(&mut out, EXT_ANTI_CLOGGING_TOKEN, token)?;
            }
        }
        if let Some(pk) = &self.pk_signature {
            let mut data = Vec::with_capacity(1 + pk.public_key.len() + pk.signature.len());
            data.push(pk.public_key.len() as u8);
            data.extend_from_slice(&pk.public_key);
            data.extend_from_slice(&pk.signature);
            push_ext(&mut out, EXT_SAE_PK_SIGNATURE, &data)?;
        }
        Ok(out)
    }

    /// Octets covered by the SAE-PK signature:
    /// `group || scalar || element || signer || verifier`.
    pub fn signed_data(&self, signer: &MacAddr, verifier: &MacAddr) -> Vec<u8> {
        let mut data = Vec::with_capacity(2 + self.scalar.len() + self.element.len() + 12);
        data.extend_from_slice(&self.group.to_le_bytes());
        data.extend_from_slice(&self.scalar);
        data.extend_from_slice(&self.element);
        data.extend_from_slice(signer.octets());
        data.extend_from_slice(verifier.octets());
        data
    }
}

/// SAE Confirm message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmMessage {
    /// Send-confirm counter.
    pub send_confirm: u16,
    /// Confirm tag.
    pub confirm: Vec<u8>,
}

impl ConfirmMessage {
    /// Parse a Confirm body. The tag length is checked by the session.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        check_len(payload, 3, "confirm")?;
        Ok(ConfirmMessage {
            send_confirm: read_u16_le(payload),
            confirm: payload[2..].to_vec(),
        })
    }

    /// Serialize a Confirm body.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(2 + self.confirm.len());
        out.extend_from_slice(&self.send_confirm.to_le_bytes());
        out.extend_from_slice(&self.confirm);
        out
    }
}

/// Anti-clogging token request (status 76).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AntiCloggingRequest {
    /// Group the request applies to.
    pub group: u16,
    /// Token to echo.
    pub token: Vec<u8>,
}

impl AntiCloggingRequest {
    /// Parse a token request; in H2E the token sits in a 255/93 container.
    pub fn parse(payload: &[u8], h2e: bool) -> Result<Self> {
        check_len(payload, 2, "token request group")?;
        let group = read_u16_le(payload);
        let rest = &payload[2..];
        let token = if h2e {
            let mut token = None;
            for element in elements(rest) {
                let element = element.map_err(|e| Error::MalformedFrame(e.to_string()))?;
                if element.id == EID_EXTENSION
                    && element.body.first() == Some(&EXT_ANTI_CLOGGING_TOKEN)
                {
                    token = Some(element.body[1..].to_vec());
                    break;
                }
            }
            token.ok_or_else(|| Error::MalformedFrame("missing token container".into()))?
        } else {
            rest.to_vec()
        };
        if token.is_empty() {
            return Err(Error::MalformedFrame("empty anti-clogging token".into()));
        }
        Ok(AntiCloggingRequest { group, token })
    }

    /// Serialize a token request.
    pub fn serialize(&self, h2e: bool) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(2 + self.token.len() + 3);
        out.extend_from_slice(&self.group.to_le_bytes());
        if h2e {
            push_ext(&mut out, EXT_ANTI_CLOGGING_TOKEN, &self.token)?;
        } else {
            out.extend_from_slice(&self.token);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commit(group: u16, n: usize) -> CommitMessage {
        CommitMessage {
            group,
            token: None,
            scalar: vec![0x11; n],
            element: vec![0x22; 2 * n],
            password_id: None,
            rejected_groups: Vec::new(),
            pk_signature: None,
        }
    }

    #[test]
    fn test_legacy_commit_layout() {
        let mut msg = commit(19, 32);
        msg.token = Some(vec![0xaa; 5]);
        let bytes = msg.serialize(false).unwrap();
        assert_eq!(&bytes[..2], &[19, 0]);
        assert_eq!(&bytes[2..7], &[0xaa; 5]);
        assert_eq!(bytes.len(), 2 + 5 + 96);
        assert_eq!(CommitMessage::parse(&bytes, false).unwrap(), msg);
    }

    #[test]
    fn test_legacy_commit_with_password_id() {
        let mut msg = commit(19, 32);
        msg.password_id = Some("alice".into());
        let bytes = msg.serialize(false).unwrap();
        let parsed = CommitMessage::parse(&bytes, false).unwrap();
        assert_eq!(parsed.password_id.as_deref(), Some("alice"));
        assert_eq!(parsed.token, None);
    }

    #[test]
    fn test_h2e_commit_elements() {
        let mut msg = commit(20, 48);
        msg.password_id = Some("id".into());
        msg.rejected_groups = vec![19];
        msg.token = Some(vec![1, 2, 3]);
        let bytes = msg.serialize(true).unwrap();
        let tail = &bytes[2 + 48 + 96..];
        assert_eq!(
            tail,
            &[255, 3, 33, b'i', b'd', 255, 3, 92, 19, 0, 255, 4, 93, 1, 2, 3][..]
        );
        assert_eq!(CommitMessage::parse(&bytes, true).unwrap(), msg);
    }

    #[test]
    fn test_pk_signature_element() {
        let mut msg = commit(19, 32);
        msg.pk_signature = Some(PkSignature {
            public_key: vec![4; 65],
            signature: vec![9; 64],
        });
        let bytes = msg.serialize(true).unwrap();
        assert_eq!(CommitMessage::parse(&bytes, true).unwrap(), msg);
    }

    #[test]
    fn test_commit_rejects_bad_input() {
        assert!(matches!(CommitMessage::parse(&[19], false), Err(Error::MalformedFrame(_))));
        assert!(matches!(
            CommitMessage::parse(&[21, 0, 1, 2], false),
            Err(Error::UnsupportedGroup(21))
        ));
        let bytes = commit(19, 32).serialize(false).unwrap();
        assert!(CommitMessage::parse(&bytes[..90], false).is_err());

        let mut h2e = commit(19, 32).serialize(true).unwrap();
        h2e.extend_from_slice(&[255, 5, 92]);
        assert!(CommitMessage::parse(&h2e, true).is_err());

        let mut odd = commit(19, 32).serialize(true).unwrap();
        odd.extend_from_slice(&[255, 2, 92, 19]);
        assert!(CommitMessage::parse(&odd, true).is_err());
    }

    #[test]
    fn test_confirm() {
        let msg = ConfirmMessage {
            send_confirm: 1,
            confirm: vec![7; 32],
        };
        let bytes = msg.serialize();
        assert_eq!(&bytes[..2], &[1, 0]);
        assert_eq!(ConfirmMessage::parse(&bytes).unwrap(), msg);
        assert!(ConfirmMessage::parse(&[1, 0]).is_err());
    }

    #[test]
    fn test_token_request() {
        let req = AntiCloggingRequest {
            group: 19,
            token: vec![5; 32],
        };
        for h2e in [false, true] {
            let bytes = req.serialize(h2e).unwrap();
            assert_eq!(AntiCloggingRequest::parse(&bytes, h2e).unwrap(), req);
        }
        assert!(AntiCloggingRequest::parse(&[19, 0], false).is_err());
        assert!(AntiCloggingRequest::parse(&[19, 0, 1, 2], true).is_err());
    }

    #[test]
    fn test_signed_data() {
        let msg = commit(19, 32);
        let a = MacAddr([1; 6]);
        let b = MacAddr([2; 6]);
        let data = msg.signed_data(&a, &b);
        assert_eq!(data.len(), 2 + 96 + 12);
        assert_eq!(&data[data.len() - 12..data.len() - 6], &[1; 6]);
    }
}
