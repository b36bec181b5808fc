//! Construction and signing of MCP X.509 certificates.

use std::{str::FromStr, sync::Arc};

use chrono::{DateTime, Duration, SubsecRound, Utc};
use mir_common::params::{DistinguishedName, SubjectAttributes};
use pem_rfc7468::LineEnding;
use sha2::{Digest, Sha256};
use tracing::debug;
use yasna::Tag;

use crate::{
    der,
    error::CaError,
    keys::{PublicKey, SigningKey},
    oid::{self, Oid},
};

mod extensions;
mod name;
mod parse;

pub use name::{name_as_der, write_name};
pub use parse::ParsedCertificate;

/// Validity used when the caller does not ask for one.
pub const DEFAULT_VALIDITY_DAYS: i64 = 731;

const SERIAL_LEN: usize = 20;

/// The key usage names a subject description may carry. The first five are
/// bits of the Key Usage extension, the rest are Extended Key Usage purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyUsage {
    DigitalSignature,
    KeyEncipherment,
    DataEncipherment,
    KeyAgreement,
    KeyCertSign,
    AnyKeyUsage,
    ServerAuth,
    ClientAuth,
    CodeSigning,
    EmailProtection,
    TimeStamping,
    OcspSigning,
}

impl KeyUsage {
    /// RFC 5280 bit number in the Key Usage bit string.
    pub fn bit(&self) -> Option<u8> {
        match self {
            KeyUsage::DigitalSignature => Some(0),
            KeyUsage::KeyEncipherment => Some(2),
            KeyUsage::DataEncipherment => Some(3),
            KeyUsage::KeyAgreement => Some(4),
            KeyUsage::KeyCertSign => Some(5),
            _ => None,
        }
    }

    pub fn purpose(&self) -> Option<Oid> {
        match self {
            KeyUsage::AnyKeyUsage => Some(oid::ANY_KEY_USAGE),
            KeyUsage::ServerAuth => Some(oid::SERVER_AUTH),
            KeyUsage::ClientAuth => Some(oid::CLIENT_AUTH),
            KeyUsage::CodeSigning => Some(oid::CODE_SIGNING),
            KeyUsage::EmailProtection => Some(oid::EMAIL_PROTECTION),
            KeyUsage::TimeStamping => Some(oid::TIME_STAMPING),
            KeyUsage::OcspSigning => Some(oid::OCSP_SIGNING),
            _ => None,
        }
    }
}

impl FromStr for KeyUsage {
    type Err = CaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "digitalSignature" => KeyUsage::DigitalSignature,
            "keyEncipherment" => KeyUsage::KeyEncipherment,
            "dataEncipherment" => KeyUsage::DataEncipherment,
            "keyAgreement" => KeyUsage::KeyAgreement,
            "keyCertSign" => KeyUsage::KeyCertSign,
            "anyKeyUsage" | "anyExtendedKeyUsage" => KeyUsage::AnyKeyUsage,
            "serverAuth" => KeyUsage::ServerAuth,
            "clientAuth" => KeyUsage::ClientAuth,
            "codeSigning" => KeyUsage::CodeSigning,
            "emailProtection" => KeyUsage::EmailProtection,
            "timeStamping" => KeyUsage::TimeStamping,
            "OCSPSigning" => KeyUsage::OcspSigning,
            other => {
                return Err(CaError::InvalidSubject(format!("unknown key usage: {other}")));
            }
        })
    }
}

/// Parse a list of key usage names, failing on the first unknown one.
pub fn key_usages<'a>(names: impl IntoIterator<Item = &'a str>) -> Result<Vec<KeyUsage>, CaError> {
    names.into_iter().map(KeyUsage::from_str).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BasicConstraints {
    pub ca: bool,
    pub path_len: Option<u8>,
}

impl BasicConstraints {
    pub fn ca(path_len: u8) -> Self {
        Self {
            ca: true,
            path_len: Some(path_len),
        }
    }
}

/// Subject Alternative Name values keyed by MCP field name. A field may carry
/// several values; each becomes its own otherName entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AltNames(Vec<(String, Vec<String>)>);

impl AltNames {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every present SAN-eligible field of `attributes`.
    pub fn from_attributes(attributes: &SubjectAttributes) -> Self {
        let mut names = Self::new();
        for (field, value) in attributes.alt_name_fields() {
            names.insert(field, value);
        }
        names
    }

    pub fn insert(&mut self, field: &str, value: impl Into<String>) {
        let value = value.into();
        match self.0.iter_mut().find(|(f, _)| f == field) {
            Some((_, values)) => values.push(value),
            None => self.0.push((field.to_string(), vec![value])),
        }
    }

    pub fn with(mut self, field: &str, value: impl Into<String>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Resolve field names to their OIDs, one pair per value.
    fn resolve(&self) -> Result<Vec<(Oid, &str)>, CaError> {
        let mut entries = Vec::new();
        for (field, values) in &self.0 {
            let id = oid::alt_name_field(field).ok_or_else(|| {
                CaError::InvalidSubject(format!("no alternative name type for field {field}"))
            })?;
            entries.extend(values.iter().map(|value| (id, value.as_str())));
        }
        Ok(entries)
    }
}

/// Everything about the subject that ends up in its certificate, apart from
/// its public key.
#[derive(Debug, Clone, Default)]
pub struct SubjectDescription {
    pub name: DistinguishedName,
    pub alt_names: AltNames,
    pub key_usage: Vec<KeyUsage>,
    pub basic_constraints: Option<BasicConstraints>,
    pub crl: Option<String>,
    pub ocsp: Option<String>,
    /// Base URL for chain retrieval. The certificate points at
    /// `{x5u_base}/{serial}.x5u`.
    pub x5u_base: Option<String>,
    /// Trust attestation endpoint, for intermediate CAs.
    pub matp: Option<String>,
}

/// The signing side of an issuance: the issuer's name and its private key.
#[derive(Debug, Clone)]
pub struct Issuer {
    pub name: DistinguishedName,
    pub key: Arc<SigningKey>,
}

/// A freshly signed certificate.
#[derive(Debug, Clone)]
pub struct IssuedCertificate {
    /// Lower-case hex SHA-256 of the DER.
    pub fingerprint: String,
    /// Lower-case hex of the serial number's content octets.
    pub serial: String,
    pub subject: DistinguishedName,
    pub not_after: DateTime<Utc>,
    pub pem: String,
    pub der: Vec<u8>,
    pub x5u: Option<String>,
}

impl IssuedCertificate {
    /// The subject's MRN, when its name carries a UID.
    pub fn mrn(&self) -> Option<&str> {
        self.subject.uid()
    }
}

pub struct CertificateBuilder<'a> {
    subject: &'a SubjectDescription,
    public_key: &'a PublicKey,
    serial: Vec<u8>,
    not_before: DateTime<Utc>,
    validity_days: i64,
}

impl<'a> CertificateBuilder<'a> {
    pub fn new(subject: &'a SubjectDescription, public_key: &'a PublicKey) -> Self {
        Self {
            subject,
            public_key,
            serial: random_serial(),
            not_before: Utc::now().trunc_subsecs(0),
            validity_days: DEFAULT_VALIDITY_DAYS,
        }
    }

    pub fn validity_days(mut self, days: i64) -> Self {
        self.validity_days = days;
        self
    }

    pub fn not_before(mut self, not_before: DateTime<Utc>) -> Self {
        self.not_before = not_before.trunc_subsecs(0);
        self
    }

    /// Use a fixed serial number instead of a random one. The bytes are
    /// taken as an unsigned big-endian number.
    pub fn serial(mut self, serial: &[u8]) -> Self {
        self.serial = unsigned_integer(serial);
        self
    }

    pub fn sign(self, issuer: &Issuer) -> Result<IssuedCertificate, CaError> {
        let not_after = self.not_before + Duration::days(self.validity_days);
        let serial = hex::encode(&self.serial);
        let x5u = self
            .subject
            .x5u_base
            .as_ref()
            .map(|base| format!("{}/{serial}.x5u", base.trim_end_matches('/')));

        let spki = self.public_key.spki_der()?;
        let extension_list = self.extensions(issuer, x5u.as_deref())?;
        let algorithm = issuer.key.algorithm();
        let validity = (
            der::offset_datetime(self.not_before)?,
            der::offset_datetime(not_after)?,
        );

        let tbs = yasna::construct_der(|writer| {
            writer.write_sequence(|writer| {
                writer
                    .next()
                    .write_tagged(Tag::context(0), |writer| writer.write_u8(2));
                writer.next().write_bigint_bytes(&self.serial, true);
                extensions::write_algorithm(writer.next(), algorithm);
                write_name(writer.next(), &issuer.name);
                writer.next().write_sequence(|writer| {
                    der::write_validity_time(writer.next(), validity.0);
                    der::write_validity_time(writer.next(), validity.1);
                });
                write_name(writer.next(), &self.subject.name);
                writer.next().write_der(&spki);
                writer.next().write_tagged(Tag::context(3), |writer| {
                    writer.write_sequence(|writer| {
                        for (id, critical, value) in &extension_list {
                            extensions::write_extension(writer.next(), *id, *critical, value);
                        }
                    });
                });
            });
        });

        let signature = issuer.key.sign(&tbs)?;
        let der = yasna::construct_der(|writer| {
            writer.write_sequence(|writer| {
                writer.next().write_der(&tbs);
                extensions::write_algorithm(writer.next(), algorithm);
                writer
                    .next()
                    .write_bitvec_bytes(&signature, signature.len() * 8);
            });
        });

        let fingerprint = fingerprint(&der);
        debug!(%serial, %fingerprint, "Signed certificate");

        Ok(IssuedCertificate {
            fingerprint,
            serial,
            subject: self.subject.name.clone(),
            not_after,
            pem: to_pem("CERTIFICATE", &der)?,
            der,
            x5u,
        })
    }

    fn extensions(
        &self,
        issuer: &Issuer,
        x5u: Option<&str>,
    ) -> Result<Vec<(Oid, bool, Vec<u8>)>, CaError> {
        let subject = self.subject;
        let mut out = vec![
            (
                oid::SUBJECT_KEY_IDENTIFIER,
                false,
                extensions::subject_key_identifier(&self.public_key.key_identifier()),
            ),
            (
                oid::AUTHORITY_KEY_IDENTIFIER,
                false,
                extensions::authority_key_identifier(&issuer.key.public_key().key_identifier()),
            ),
        ];

        let alt_names = subject.alt_names.resolve()?;
        if !alt_names.is_empty() {
            out.push((
                oid::SUBJECT_ALT_NAME,
                false,
                extensions::subject_alt_names(&alt_names),
            ));
        }

        let bits: Vec<u8> = subject.key_usage.iter().filter_map(KeyUsage::bit).collect();
        if !bits.is_empty() {
            out.push((oid::KEY_USAGE, false, extensions::key_usage(&bits)));
        }

        let purposes: Vec<Oid> = subject
            .key_usage
            .iter()
            .filter_map(KeyUsage::purpose)
            .collect();
        if !purposes.is_empty() {
            out.push((
                oid::EXT_KEY_USAGE,
                false,
                extensions::extended_key_usage(&purposes),
            ));
        }

        if let Some(constraints) = subject.basic_constraints {
            out.push((
                oid::BASIC_CONSTRAINTS,
                true,
                extensions::basic_constraints(constraints.ca, constraints.path_len),
            ));
        }

        if let Some(crl) = &subject.crl {
            out.push((
                oid::CRL_DISTRIBUTION_POINTS,
                false,
                extensions::crl_distribution_points(crl),
            ));
        }

        let mut access = Vec::new();
        if let Some(ocsp) = &subject.ocsp {
            access.push((oid::OCSP, ocsp.as_str()));
        }
        if let Some(x5u) = x5u {
            access.push((oid::X5U, x5u));
        }
        if !access.is_empty() {
            out.push((
                oid::AUTHORITY_INFO_ACCESS,
                false,
                extensions::info_access(&access),
            ));
        }

        if let Some(matp) = &subject.matp {
            out.push((
                oid::SUBJECT_INFO_ACCESS,
                false,
                extensions::info_access(&[(oid::MATP, matp.as_str())]),
            ));
        }

        Ok(out)
    }
}

/// 20 random bytes, positive and without a leading zero octet.
pub fn random_serial() -> Vec<u8> {
    let mut bytes: [u8; SERIAL_LEN] = rand::random();
    bytes[0] &= 0x7f;
    if bytes[0] == 0 {
        bytes[0] = 0x01;
    }
    bytes.to_vec()
}

/// Minimal two's complement content octets for an unsigned big-endian number.
fn unsigned_integer(bytes: &[u8]) -> Vec<u8> {
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    let trimmed = &bytes[start..];

    match trimmed.first() {
        None => vec![0],
        Some(first) if first & 0x80 != 0 => {
            let mut out = Vec::with_capacity(trimmed.len() + 1);
            out.push(0);
            out.extend_from_slice(trimmed);
            out
        }
        Some(_) => trimmed.to_vec(),
    }
}

/// Lower-case hex SHA-256 of `der`.
pub fn fingerprint(der: &[u8]) -> String {
    hex::encode(Sha256::digest(der))
}

/// PEM armor with 64 column base64 and a trailing newline.
pub fn to_pem(label: &str, der: &[u8]) -> Result<String, CaError> {
    let mut pem = pem_rfc7468::encode_string(label, LineEnding::LF, der)
        .map_err(|e| CaError::SigningFailure(format!("cannot encode PEM: {e}")))?;
    if !pem.ends_with('\n') {
        pem.push('\n');
    }
    Ok(pem)
}

#[cfg(test)]
mod tests {
    use mir_common::params::NameAttribute;
    use p384::ecdsa::signature::Verifier;
    use x509_parser::{
        x509::X509Version,
        extensions::{GeneralName, ParsedExtension},
        parse_x509_certificate,
    };

    use super::*;
    use crate::keys::Curve;

    fn issuer() -> Issuer {
        Issuer {
            name: DistinguishedName::from_uid("urn:mrn:mcp:id:acme"),
            key: Arc::new(SigningKey::generate(Curve::P384)),
        }
    }

    fn ship() -> SubjectDescription {
        SubjectDescription {
            name: DistinguishedName::from_uid("urn:mrn:mcp:id:acme:ship"),
            alt_names: AltNames::new()
                .with("MMSI", "230999999")
                .with("callSign", "ABCDEF"),
            key_usage: key_usages(["digitalSignature", "anyKeyUsage", "clientAuth"]).unwrap(),
            crl: Some("https://acme.example/acme/crl".into()),
            ocsp: Some("https://acme.example/acme/ocsp".into()),
            x5u_base: Some("https://acme.example/acme/certificates".into()),
            ..Default::default()
        }
    }

    #[test]
    fn entity_certificate_carries_its_extensions() {
        let issuer = issuer();
        let subject = ship();
        let key = SigningKey::generate(Curve::P256).public_key();
        let cert = CertificateBuilder::new(&subject, &key)
            .validity_days(10)
            .sign(&issuer)
            .unwrap();

        let (_, parsed) = parse_x509_certificate(&cert.der).unwrap();
        assert_eq!(parsed.version(), X509Version::V3);
        assert_eq!(hex::encode(parsed.raw_serial()), cert.serial);

        let ku = parsed.key_usage().unwrap().unwrap().value;
        assert!(ku.digital_signature());
        assert!(!ku.key_cert_sign());
        assert!(!ku.key_encipherment());

        let eku = parsed.extended_key_usage().unwrap().unwrap().value;
        assert!(eku.any);
        assert!(eku.client_auth);
        assert!(!eku.server_auth);

        assert!(parsed.basic_constraints().unwrap().is_none());

        let san = parsed.subject_alternative_name().unwrap().unwrap().value;
        let types: Vec<Vec<u8>> = san
            .general_names
            .iter()
            .map(|name| match name {
                GeneralName::OtherName(type_id, _) => type_id.as_bytes().to_vec(),
                other => panic!("unexpected general name {other:?}"),
            })
            .collect();
        assert_eq!(types, vec![oid::MMSI.content(), oid::CALL_SIGN.content()]);

        let aia = parsed
            .extensions()
            .iter()
            .find(|ext| ext.oid.as_bytes() == oid::AUTHORITY_INFO_ACCESS.content().as_slice())
            .unwrap();
        let ParsedExtension::AuthorityInfoAccess(aia) = aia.parsed_extension() else {
            panic!("authority info access did not parse");
        };
        let locations: Vec<String> = aia
            .accessdescs
            .iter()
            .map(|desc| match &desc.access_location {
                GeneralName::URI(uri) => uri.to_string(),
                other => panic!("unexpected location {other:?}"),
            })
            .collect();
        assert_eq!(
            locations,
            vec![
                "https://acme.example/acme/ocsp".to_string(),
                format!("https://acme.example/acme/certificates/{}.x5u", cert.serial),
            ]
        );
        assert_eq!(cert.x5u.as_deref(), Some(locations[1].as_str()));
        assert_eq!(cert.mrn(), Some("urn:mrn:mcp:id:acme:ship"));
    }

    #[test]
    fn ca_constraints_are_critical() {
        let issuer = issuer();
        let subject = SubjectDescription {
            name: DistinguishedName::from_uid("urn:mrn:mcp:id:acme:sub"),
            key_usage: key_usages(["digitalSignature", "keyCertSign", "clientAuth"]).unwrap(),
            basic_constraints: Some(BasicConstraints::ca(4)),
            matp: Some("https://acme.example/sub/matp".into()),
            ..Default::default()
        };
        let key = SigningKey::generate(Curve::P384).public_key();
        let cert = CertificateBuilder::new(&subject, &key).sign(&issuer).unwrap();

        let (_, parsed) = parse_x509_certificate(&cert.der).unwrap();
        let bc = parsed.basic_constraints().unwrap().unwrap();
        assert!(bc.critical);
        assert!(bc.value.ca);
        assert_eq!(bc.value.path_len_constraint, Some(4));

        let ku = parsed.key_usage().unwrap().unwrap().value;
        assert!(ku.digital_signature());
        assert!(ku.key_cert_sign());

        let sia = oid::SUBJECT_INFO_ACCESS.content();
        assert!(parsed.extensions().iter().any(|ext| ext.oid.as_bytes() == sia.as_slice()));
    }

    #[test]
    fn key_identifiers_link_subject_and_issuer() {
        let issuer = issuer();
        let subject = ship();
        let key = SigningKey::generate(Curve::P256).public_key();
        let cert = CertificateBuilder::new(&subject, &key).sign(&issuer).unwrap();

        let (_, parsed) = parse_x509_certificate(&cert.der).unwrap();
        let mut ski = None;
        let mut aki = None;
        for ext in parsed.extensions() {
            match ext.parsed_extension() {
                ParsedExtension::SubjectKeyIdentifier(id) => ski = Some(id.0.to_vec()),
                ParsedExtension::AuthorityKeyIdentifier(id) => {
                    aki = id.key_identifier.as_ref().map(|k| k.0.to_vec())
                }
                _ => {}
            }
        }
        assert_eq!(ski, Some(key.key_identifier()));
        assert_eq!(aki, Some(issuer.key.public_key().key_identifier()));
    }

    #[test]
    fn signature_verifies_with_issuer_key() {
        let issuer = issuer();
        let subject = ship();
        let key = SigningKey::generate(Curve::P256).public_key();
        let cert = CertificateBuilder::new(&subject, &key).sign(&issuer).unwrap();

        let (_, parsed) = parse_x509_certificate(&cert.der).unwrap();
        let PublicKey::P384(issuer_key) = issuer.key.public_key() else {
            panic!("expected a P-384 issuer");
        };
        let signature =
            p384::ecdsa::Signature::from_der(&parsed.signature_value.data).unwrap();
        let verifier = p384::ecdsa::VerifyingKey::from(&issuer_key);
        assert!(verifier.verify(parsed.tbs_certificate.as_ref(), &signature).is_ok());
        assert_eq!(
            parsed.signature_algorithm.algorithm.as_bytes(),
            oid::ECDSA_WITH_SHA384.content().as_slice()
        );
    }

    #[test]
    fn pem_round_trip_keeps_the_fingerprint() {
        let issuer = issuer();
        let subject = ship();
        let key = SigningKey::generate(Curve::P384).public_key();
        let cert = CertificateBuilder::new(&subject, &key).sign(&issuer).unwrap();

        assert!(cert.pem.starts_with("-----BEGIN CERTIFICATE-----\n"));
        assert!(cert.pem.ends_with("-----END CERTIFICATE-----\n"));
        assert!(cert.pem.lines().all(|line| line.len() <= 64));

        let parsed = ParsedCertificate::from_pem(&cert.pem).unwrap();
        assert_eq!(parsed.fingerprint, cert.fingerprint);
        assert_eq!(parsed.serial, cert.serial);
        assert_eq!(parsed.not_after, cert.not_after);
    }

    #[test]
    fn validity_window_and_fixed_serial() {
        let issuer = issuer();
        let subject = ship();
        let key = SigningKey::generate(Curve::P256).public_key();
        let start = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let cert = CertificateBuilder::new(&subject, &key)
            .not_before(start)
            .validity_days(731)
            .serial(&[0x00, 0x00, 0x9e, 0x0c])
            .sign(&issuer)
            .unwrap();

        assert_eq!(cert.serial, "009e0c");
        assert_eq!(cert.not_after, start + Duration::days(731));

        let (_, parsed) = parse_x509_certificate(&cert.der).unwrap();
        assert_eq!(parsed.validity().not_before.timestamp(), 1_700_000_000);
    }

    #[test]
    fn random_serials_are_positive_and_minimal() {
        for _ in 0..64 {
            let serial = random_serial();
            assert_eq!(serial.len(), SERIAL_LEN);
            assert_eq!(serial[0] & 0x80, 0);
            assert_ne!(serial[0], 0);
        }
        assert_ne!(random_serial(), random_serial());
    }

    #[test]
    fn unknown_inputs_are_rejected() {
        assert!(matches!(
            "contentCommitment".parse::<KeyUsage>(),
            Err(CaError::InvalidSubject(_))
        ));

        let issuer = issuer();
        let subject = SubjectDescription {
            name: DistinguishedName::new().with(NameAttribute::Name, "x"),
            alt_names: AltNames::new().with("favouriteColour", "blue"),
            ..Default::default()
        };
        let key = SigningKey::generate(Curve::P256).public_key();
        let err = CertificateBuilder::new(&subject, &key)
            .sign(&issuer)
            .unwrap_err();
        assert!(matches!(err, CaError::InvalidSubject(_)));
    }

    #[test]
    fn alt_names_collect_repeated_fields() {
        let names = AltNames::new()
            .with("secondaryMRN", "urn:mrn:a")
            .with("secondaryMRN", "urn:mrn:b")
            .with("URL", "https://x");
        let resolved = names.resolve().unwrap();
        assert_eq!(resolved.len(), 3);
        assert_eq!(resolved[0], (oid::SECONDARY_MRN, "urn:mrn:a"));
        assert_eq!(resolved[1], (oid::SECONDARY_MRN, "urn:mrn:b"));
    }
}
