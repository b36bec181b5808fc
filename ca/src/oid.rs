//! Object identifiers used in MCP certificates and OCSP messages.
//!
//! The MCP-defined identifiers live under the `2.25` UUID arc and are fixed
//! for interoperability with existing deployments. Their arcs do not fit in
//! 64 bits, so [`Oid`] carries 128-bit arcs and does its own encoding.

use std::fmt;

use mir_common::params::NameAttribute;
use yasna::DERWriter;

use crate::der;

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Oid(&'static [u128]);

impl Oid {
    pub const fn new(arcs: &'static [u128]) -> Self {
        Self(arcs)
    }

    pub fn arcs(&self) -> &'static [u128] {
        self.0
    }

    /// The content octets of the OBJECT IDENTIFIER encoding.
    pub fn content(&self) -> Vec<u8> {
        let mut out = Vec::new();
        let (first, rest) = match self.0 {
            [a, b, rest @ ..] => (a * 40 + b, rest),
            [a] => (a * 40, &[][..]),
            [] => return out,
        };

        for arc in std::iter::once(first).chain(rest.iter().copied()) {
            let mut chunk = [0u8; 19];
            let mut len = 0;
            let mut value = arc;
            loop {
                chunk[len] = (value & 0x7f) as u8;
                len += 1;
                value >>= 7;
                if value == 0 {
                    break;
                }
            }
            for i in (0..len).rev() {
                out.push(if i > 0 { chunk[i] | 0x80 } else { chunk[i] });
            }
        }
        out
    }

    /// Complete DER encoding, tag and length included.
    pub fn to_der(&self) -> Vec<u8> {
        der::tlv(der::TAG_OID, &self.content())
    }

    pub fn write(&self, writer: DERWriter) {
        writer.write_der(&self.to_der());
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let arcs: Vec<String> = self.0.iter().map(u128::to_string).collect();
        f.write_str(&arcs.join("."))
    }
}

impl fmt::Debug for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Oid({self})")
    }
}

// Name attributes
pub const COUNTRY: Oid = Oid::new(&[2, 5, 4, 6]);
pub const NAME: Oid = Oid::new(&[2, 5, 4, 3]);
pub const EMAIL: Oid = Oid::new(&[1, 2, 840, 113549, 1, 9, 1]);
pub const ORGANIZATION: Oid = Oid::new(&[2, 5, 4, 10]);
pub const UNIT: Oid = Oid::new(&[2, 5, 4, 11]);
pub const UID: Oid = Oid::new(&[0, 9, 2342, 19200300, 100, 1, 1]);

// Extended key usage purposes
pub const ANY_KEY_USAGE: Oid = Oid::new(&[2, 5, 29, 37, 0]);
pub const SERVER_AUTH: Oid = Oid::new(&[1, 3, 6, 1, 5, 5, 7, 3, 1]);
pub const CLIENT_AUTH: Oid = Oid::new(&[1, 3, 6, 1, 5, 5, 7, 3, 2]);
pub const CODE_SIGNING: Oid = Oid::new(&[1, 3, 6, 1, 5, 5, 7, 3, 3]);
pub const EMAIL_PROTECTION: Oid = Oid::new(&[1, 3, 6, 1, 5, 5, 7, 3, 4]);
pub const TIME_STAMPING: Oid = Oid::new(&[1, 3, 6, 1, 5, 5, 7, 3, 8]);
pub const OCSP_SIGNING: Oid = Oid::new(&[1, 3, 6, 1, 5, 5, 7, 3, 9]);

// Certificate extensions
pub const SUBJECT_KEY_IDENTIFIER: Oid = Oid::new(&[2, 5, 29, 14]);
pub const KEY_USAGE: Oid = Oid::new(&[2, 5, 29, 15]);
pub const SUBJECT_ALT_NAME: Oid = Oid::new(&[2, 5, 29, 17]);
pub const BASIC_CONSTRAINTS: Oid = Oid::new(&[2, 5, 29, 19]);
pub const CRL_DISTRIBUTION_POINTS: Oid = Oid::new(&[2, 5, 29, 31]);
pub const AUTHORITY_KEY_IDENTIFIER: Oid = Oid::new(&[2, 5, 29, 35]);
pub const EXT_KEY_USAGE: Oid = Oid::new(&[2, 5, 29, 37]);
pub const AUTHORITY_INFO_ACCESS: Oid = Oid::new(&[1, 3, 6, 1, 5, 5, 7, 1, 1]);
pub const SUBJECT_INFO_ACCESS: Oid = Oid::new(&[1, 3, 6, 1, 5, 5, 7, 1, 11]);

// OCSP
pub const OCSP: Oid = Oid::new(&[1, 3, 6, 1, 5, 5, 7, 48, 1]);
pub const OCSP_BASIC: Oid = Oid::new(&[1, 3, 6, 1, 5, 5, 7, 48, 1, 1]);
pub const OCSP_NONCE: Oid = Oid::new(&[1, 3, 6, 1, 5, 5, 7, 48, 1, 2]);

// Digests and signatures
pub const SHA1: Oid = Oid::new(&[1, 3, 14, 3, 2, 26]);
pub const SHA256: Oid = Oid::new(&[2, 16, 840, 1, 101, 3, 4, 2, 1]);
pub const ECDSA_WITH_SHA256: Oid = Oid::new(&[1, 2, 840, 10045, 4, 3, 2]);
pub const ECDSA_WITH_SHA384: Oid = Oid::new(&[1, 2, 840, 10045, 4, 3, 3]);

// MCP
pub const FLAG_STATE: Oid = Oid::new(&[2, 25, 323100633285601570573910217875371967771]);
pub const CALL_SIGN: Oid = Oid::new(&[2, 25, 208070283325144527098121348946972755227]);
pub const IMO_NUMBER: Oid = Oid::new(&[2, 25, 291283622413876360871493815653100799259]);
pub const MMSI: Oid = Oid::new(&[2, 25, 328433707816814908768060331477217690907]);
pub const SHIP_TYPE: Oid = Oid::new(&[2, 25, 107857171638679641902842130101018412315]);
pub const HOME_PORT: Oid = Oid::new(&[2, 25, 285632790821948647314354670918887798603]);
pub const SECONDARY_MRN: Oid = Oid::new(&[2, 25, 268095117363717005222833833642941669792]);
pub const URL: Oid = Oid::new(&[2, 25, 245076023612240385163414144226581328607]);
pub const X5U: Oid = Oid::new(&[2, 25, 225758541249626787560521749862278982872]);
pub const MATP: Oid = Oid::new(&[2, 25, 47361115604972962060436004517940067660]);

/// Identifier for a Subject Alternative Name field, by its MCP field name.
pub fn alt_name_field(field: &str) -> Option<Oid> {
    Some(match field {
        "country" => COUNTRY,
        "name" => NAME,
        "email" => EMAIL,
        "organization" => ORGANIZATION,
        "unit" => UNIT,
        "UID" | "uid" => UID,
        "flagState" => FLAG_STATE,
        "callSign" => CALL_SIGN,
        "IMONumber" => IMO_NUMBER,
        "MMSI" => MMSI,
        "shipType" => SHIP_TYPE,
        "homePort" => HOME_PORT,
        "secondaryMRN" => SECONDARY_MRN,
        "URL" | "url" => URL,
        _ => return None,
    })
}

pub fn name_attribute(attribute: NameAttribute) -> Oid {
    match attribute {
        NameAttribute::Country => COUNTRY,
        NameAttribute::Name => NAME,
        NameAttribute::Email => EMAIL,
        NameAttribute::Organization => ORGANIZATION,
        NameAttribute::Unit => UNIT,
        NameAttribute::Uid => UID,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_small_arcs() {
        assert_eq!(SHA1.to_der(), vec![0x06, 0x05, 0x2b, 0x0e, 0x03, 0x02, 0x1a]);
        assert_eq!(
            UID.content(),
            vec![0x09, 0x92, 0x26, 0x89, 0x93, 0xf2, 0x2c, 0x64, 0x01, 0x01]
        );
    }

    #[test]
    fn encodes_uuid_arcs_past_64_bits() {
        let content = MMSI.content();
        assert_eq!(content[0], 0x69);

        // Decode the base-128 arc back and compare.
        let mut value: u128 = 0;
        for byte in &content[1..] {
            value = (value << 7) | u128::from(byte & 0x7f);
        }
        assert_eq!(value, 328433707816814908768060331477217690907);
        assert_eq!(content.last().map(|b| b & 0x80), Some(0));
        assert!(content[1..content.len() - 1].iter().all(|b| b & 0x80 != 0));
    }

    #[test]
    fn displays_dotted() {
        assert_eq!(X5U.to_string(), "2.25.225758541249626787560521749862278982872");
        assert_eq!(OCSP_NONCE.to_string(), "1.3.6.1.5.5.7.48.1.2");
    }

    #[test]
    fn alt_name_fields_resolve() {
        assert_eq!(alt_name_field("callSign"), Some(CALL_SIGN));
        assert_eq!(alt_name_field("url"), Some(URL));
        assert_eq!(alt_name_field("domain"), None);
    }
}
