//! OCSP (RFC 6960) request parsing and response construction.
//!
//! Requests are matched against the responder's issuer name only: certificate
//! ids that name a different issuer, or use a hash algorithm we do not
//! support, are dropped without an error. The CertID of every matched id is
//! kept as received and echoed byte for byte in the response.

use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, SubsecRound, Utc};
use mir_common::params::DistinguishedName;
use sha1::Sha1;
use sha2::{Digest, Sha256};
use tracing::debug;
use yasna::{ASN1Result, BERReader, DERWriter, Tag};

use crate::{
    certificate::{name_as_der, to_pem, write_name},
    der,
    error::CaError,
    keys::SigningKey,
    oid,
};

const PEM_LABEL: &str = "OCSP RESPONSE";

/// `OCSPResponseStatus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseStatus {
    Successful = 0,
    MalformedRequest = 1,
    InternalError = 2,
    TryLater = 3,
    SigRequired = 5,
    Unauthorized = 6,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    Sha1,
    Sha256,
}

impl HashAlgorithm {
    /// Recognize an AlgorithmIdentifier by the DER of its OID.
    fn from_oid_der(der: &[u8]) -> Option<Self> {
        if der == oid::SHA1.to_der().as_slice() {
            Some(HashAlgorithm::Sha1)
        } else if der == oid::SHA256.to_der().as_slice() {
            Some(HashAlgorithm::Sha256)
        } else {
            None
        }
    }

    pub fn digest(&self, data: &[u8]) -> Vec<u8> {
        match self {
            HashAlgorithm::Sha1 => Sha1::digest(data).to_vec(),
            HashAlgorithm::Sha256 => Sha256::digest(data).to_vec(),
        }
    }
}

/// One requested certificate id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertId {
    pub hash_algorithm: HashAlgorithm,
    pub issuer_name_hash: Vec<u8>,
    pub issuer_key_hash: Vec<u8>,
    /// Lower-case hex of the serial number's content octets.
    pub serial: String,
    /// The CertID exactly as it appeared in the request.
    pub raw: Vec<u8>,
}

impl CertId {
    /// `None` for a well-formed id with an unsupported hash algorithm.
    fn parse(raw: Vec<u8>) -> Result<Option<Self>, CaError> {
        let parsed = yasna::parse_der(&raw, |reader| {
            reader.read_sequence(|reader| {
                let algorithm = reader.next().read_sequence(|reader| {
                    let id = reader.next().read_der()?;
                    reader.read_optional(|reader| reader.read_der())?;
                    Ok(id)
                })?;
                let name_hash = reader.next().read_bytes()?;
                let key_hash = reader.next().read_bytes()?;
                let (serial, _) = reader.next().read_bigint_bytes()?;
                Ok((algorithm, name_hash, key_hash, serial))
            })
        })
        .map_err(CaError::malformed)?;

        let (algorithm, issuer_name_hash, issuer_key_hash, serial) = parsed;
        let Some(hash_algorithm) = HashAlgorithm::from_oid_der(&algorithm) else {
            return Ok(None);
        };
        let serial = hex::encode(serial);

        Ok(Some(Self {
            hash_algorithm,
            issuer_name_hash,
            issuer_key_hash,
            serial,
            raw,
        }))
    }
}

/// A parsed request, reduced to the ids this responder answers for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcspRequest {
    pub ids: Vec<CertId>,
    /// Content of the nonce extension value as lower-case hex.
    pub nonce: Option<String>,
    /// Number of ids in the request before matching.
    pub requested: usize,
}

impl OcspRequest {
    /// Parse a DER request and keep the ids whose issuer name hash matches
    /// the name `{UID: issuer_uid}`.
    pub fn parse(request: &[u8], issuer_uid: &str) -> Result<Self, CaError> {
        let (raw_ids, extensions) = yasna::parse_der(request, |reader| {
            reader.read_sequence(|reader| {
                let tbs = reader.next().read_sequence(|reader| {
                    reader.read_optional(|reader| {
                        reader.read_tagged(Tag::context(0), |reader| reader.read_i64())
                    })?;
                    reader.read_optional(|reader| {
                        reader.read_tagged(Tag::context(1), |reader| reader.read_der())
                    })?;
                    let ids = reader.next().collect_sequence_of(read_request)?;
                    let extensions = reader.read_optional(|reader| {
                        reader.read_tagged(Tag::context(2), read_extensions)
                    })?;
                    Ok((ids, extensions.unwrap_or_default()))
                })?;
                reader.read_optional(|reader| {
                    reader.read_tagged(Tag::context(0), |reader| reader.read_der())
                })?;
                Ok(tbs)
            })
        })
        .map_err(CaError::malformed)?;

        let requested = raw_ids.len();
        let issuer_name = name_as_der(&DistinguishedName::from_uid(issuer_uid));
        let mut name_hashes: HashMap<HashAlgorithm, Vec<u8>> = HashMap::new();

        let mut ids = Vec::new();
        for raw in raw_ids {
            let Some(id) = CertId::parse(raw)? else {
                continue;
            };
            let expected = name_hashes
                .entry(id.hash_algorithm)
                .or_insert_with(|| id.hash_algorithm.digest(&issuer_name));
            if *expected == id.issuer_name_hash {
                ids.push(id);
            }
        }

        let nonce_id = oid::OCSP_NONCE.to_der();
        let nonce = extensions
            .into_iter()
            .find(|(id, _)| *id == nonce_id)
            .map(|(_, value)| hex::encode(value));

        debug!(requested, matched = ids.len(), nonce = ?nonce, "Parsed OCSP request");
        Ok(Self {
            ids,
            nonce,
            requested,
        })
    }

    pub fn serials(&self) -> Vec<String> {
        self.ids.iter().map(|id| id.serial.clone()).collect()
    }
}

trait CollectSequenceOf {
    fn collect_sequence_of<T>(
        self,
        item: impl FnMut(BERReader) -> ASN1Result<T>,
    ) -> ASN1Result<Vec<T>>;
}

impl CollectSequenceOf for BERReader<'_, '_> {
    fn collect_sequence_of<T>(
        self,
        mut item: impl FnMut(BERReader) -> ASN1Result<T>,
    ) -> ASN1Result<Vec<T>> {
        let mut out = Vec::new();
        self.read_sequence_of(|reader| {
            out.push(item(reader)?);
            Ok(())
        })?;
        Ok(out)
    }
}

/// `Request ::= SEQUENCE { reqCert CertID, singleRequestExtensions [0] ... }`,
/// returning the raw CertID.
fn read_request(reader: BERReader) -> ASN1Result<Vec<u8>> {
    reader.read_sequence(|reader| {
        let cert_id = reader.next().read_der()?;
        reader.read_optional(|reader| {
            reader.read_tagged(Tag::context(0), |reader| reader.read_der())
        })?;
        Ok(cert_id)
    })
}

/// Extensions as `(OID DER, extnValue content)` pairs.
fn read_extensions(reader: BERReader) -> ASN1Result<Vec<(Vec<u8>, Vec<u8>)>> {
    reader.collect_sequence_of(|reader| {
        reader.read_sequence(|reader| {
            let id = reader.next().read_der()?;
            reader.read_optional(|reader| reader.read_bool())?;
            let value = reader.next().read_bytes()?;
            Ok((id, value))
        })
    })
}

/// What the responder knows about a certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertStatus {
    Good,
    Revoked { at: DateTime<Utc> },
    Unknown,
}

/// The identity answering OCSP requests: the issuing organization's name,
/// its own certificate and its signing key.
#[derive(Debug, Clone)]
pub struct Responder {
    pub name: DistinguishedName,
    pub certificate: Vec<u8>,
    pub key: Arc<SigningKey>,
}

impl Responder {
    /// Build and sign a successful response with one SingleResponse per
    /// matched id. Serials missing from `statuses` are good.
    pub fn respond(
        &self,
        request: &OcspRequest,
        statuses: &HashMap<String, CertStatus>,
    ) -> Result<Vec<u8>, CaError> {
        let now = der::offset_datetime(Utc::now().trunc_subsecs(0))?;
        let nonce = request
            .nonce
            .as_deref()
            .map(hex::decode)
            .transpose()
            .map_err(CaError::malformed)?;

        let mut entries = Vec::with_capacity(request.ids.len());
        for id in &request.ids {
            let status = statuses.get(&id.serial).copied().unwrap_or(CertStatus::Good);
            let revoked_at = match status {
                CertStatus::Revoked { at } => Some(der::offset_datetime(at)?),
                _ => None,
            };
            entries.push((id, status, revoked_at));
        }

        let tbs = yasna::construct_der(|writer| {
            writer.write_sequence(|writer| {
                writer
                    .next()
                    .write_tagged(Tag::context(1), |writer| write_name(writer, &self.name));
                der::write_generalized_time(writer.next(), now);
                writer.next().write_sequence(|writer| {
                    for (id, status, revoked_at) in &entries {
                        writer.next().write_sequence(|writer| {
                            writer.next().write_der(&id.raw);
                            write_status(writer.next(), status, *revoked_at);
                            der::write_generalized_time(writer.next(), now);
                        });
                    }
                });
                if let Some(nonce) = &nonce {
                    writer.next().write_tagged(Tag::context(1), |writer| {
                        writer.write_sequence(|writer| {
                            writer.next().write_sequence(|writer| {
                                oid::OCSP_NONCE.write(writer.next());
                                writer.next().write_bytes(nonce);
                            });
                        });
                    });
                }
            });
        });

        let algorithm = self.key.algorithm();
        let signature = self.key.sign(&tbs)?;
        let basic = yasna::construct_der(|writer| {
            writer.write_sequence(|writer| {
                writer.next().write_der(&tbs);
                writer
                    .next()
                    .write_sequence(|writer| algorithm.write(writer.next()));
                writer
                    .next()
                    .write_bitvec_bytes(&signature, signature.len() * 8);
                writer.next().write_tagged(Tag::context(0), |writer| {
                    writer.write_sequence(|writer| writer.next().write_der(&self.certificate));
                });
            });
        });

        debug!(
            responses = entries.len(),
            nonce = ?request.nonce,
            "Signed OCSP response"
        );

        Ok(yasna::construct_der(|writer| {
            writer.write_sequence(|writer| {
                writer.next().write_enum(ResponseStatus::Successful as i64);
                writer.next().write_tagged(Tag::context(0), |writer| {
                    writer.write_sequence(|writer| {
                        oid::OCSP_BASIC.write(writer.next());
                        writer.next().write_bytes(&basic);
                    });
                });
            });
        }))
    }
}

fn write_status(writer: DERWriter, status: &CertStatus, revoked_at: Option<time::OffsetDateTime>) {
    match (status, revoked_at) {
        (CertStatus::Revoked { .. }, Some(at)) => {
            writer.write_tagged_implicit(Tag::context(1), |writer| {
                writer.write_sequence(|writer| der::write_generalized_time(writer.next(), at));
            });
        }
        (CertStatus::Good, _) => {
            writer.write_tagged_implicit(Tag::context(0), |writer| writer.write_null());
        }
        _ => {
            writer.write_tagged_implicit(Tag::context(2), |writer| writer.write_null());
        }
    }
}

/// A response envelope without response bytes, for requests that could not
/// be answered.
pub fn unsuccessful(status: ResponseStatus) -> Vec<u8> {
    yasna::construct_der(|writer| {
        writer.write_sequence(|writer| writer.next().write_enum(status as i64));
    })
}

pub fn response_pem(der: &[u8]) -> Result<String, CaError> {
    to_pem(PEM_LABEL, der)
}
