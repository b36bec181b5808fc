//! Encoders for the X.509v3 extensions MCP certificates carry.

use yasna::{DERWriter, DERWriterSeq, Tag};

use crate::oid::Oid;

/// Write one `Extension ::= SEQUENCE { extnID, critical DEFAULT FALSE,
/// extnValue }`. `critical` is omitted when false.
pub(crate) fn write_extension(writer: DERWriter, id: Oid, critical: bool, value: &[u8]) {
    writer.write_sequence(|writer| {
        id.write(writer.next());
        if critical {
            writer.next().write_bool(true);
        }
        writer.next().write_bytes(value);
    });
}

fn write_uri(writer: DERWriter, uri: &str) {
    writer.write_tagged_implicit(Tag::context(6), |writer| writer.write_ia5_string(uri));
}

pub(crate) fn subject_key_identifier(key_id: &[u8]) -> Vec<u8> {
    yasna::construct_der(|writer| writer.write_bytes(key_id))
}

pub(crate) fn authority_key_identifier(key_id: &[u8]) -> Vec<u8> {
    yasna::construct_der(|writer| {
        writer.write_sequence(|writer| {
            writer
                .next()
                .write_tagged_implicit(Tag::context(0), |writer| writer.write_bytes(key_id));
        });
    })
}

/// GeneralNames made of otherName entries with UTF8String values.
pub(crate) fn subject_alt_names(entries: &[(Oid, &str)]) -> Vec<u8> {
    yasna::construct_der(|writer| {
        writer.write_sequence(|writer| {
            for (type_id, value) in entries {
                writer
                    .next()
                    .write_tagged_implicit(Tag::context(0), |writer| {
                        writer.write_sequence(|writer| {
                            type_id.write(writer.next());
                            writer
                                .next()
                                .write_tagged(Tag::context(0), |writer| writer.write_utf8_string(value));
                        });
                    });
            }
        });
    })
}

/// KeyUsage bit string with the given bits (0 = digitalSignature) set.
pub(crate) fn key_usage(bits: &[u8]) -> Vec<u8> {
    let mut flags: u16 = 0;
    for bit in bits {
        flags |= 0x8000 >> *bit;
    }

    let len = 16 - flags.trailing_zeros() as usize;
    let bytes = flags.to_be_bytes();
    let used = len.div_ceil(8);

    yasna::construct_der(|writer| writer.write_bitvec_bytes(&bytes[..used], len))
}

pub(crate) fn extended_key_usage(purposes: &[Oid]) -> Vec<u8> {
    yasna::construct_der(|writer| {
        writer.write_sequence(|writer| {
            for purpose in purposes {
                purpose.write(writer.next());
            }
        });
    })
}

pub(crate) fn basic_constraints(ca: bool, path_len: Option<u8>) -> Vec<u8> {
    yasna::construct_der(|writer| {
        writer.write_sequence(|writer| {
            if ca {
                writer.next().write_bool(true);
                if let Some(path_len) = path_len {
                    writer.next().write_u8(path_len);
                }
            }
        });
    })
}

/// A single distribution point with one URI as its full name.
pub(crate) fn crl_distribution_points(uri: &str) -> Vec<u8> {
    yasna::construct_der(|writer| {
        writer.write_sequence(|writer| {
            writer.next().write_sequence(|writer| {
                writer.next().write_tagged(Tag::context(0), |writer| {
                    writer.write_tagged_implicit(Tag::context(0), |writer| {
                        writer.write_sequence(|writer| write_uri(writer.next(), uri));
                    });
                });
            });
        });
    })
}

/// AuthorityInfoAccess / SubjectInfoAccess syntax: a sequence of (method,
/// URI) access descriptions.
pub(crate) fn info_access(descriptions: &[(Oid, &str)]) -> Vec<u8> {
    yasna::construct_der(|writer| {
        writer.write_sequence(|writer| write_access_descriptions(writer, descriptions));
    })
}

fn write_access_descriptions(writer: &mut DERWriterSeq, descriptions: &[(Oid, &str)]) {
    for (method, uri) in descriptions {
        writer.next().write_sequence(|writer| {
            method.write(writer.next());
            write_uri(writer.next(), uri);
        });
    }
}

/// Identifier for a signature algorithm with absent parameters, as ECDSA
/// algorithm identifiers are encoded.
pub(crate) fn write_algorithm(writer: DERWriter, algorithm: Oid) {
    writer.write_sequence(|writer| algorithm.write(writer.next()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oid;

    #[test]
    fn key_usage_bits_are_minimal() {
        // digitalSignature only: one bit used, seven unused
        assert_eq!(key_usage(&[0]), vec![0x03, 0x02, 0x07, 0x80]);
        // keyCertSign only: bit 5
        assert_eq!(key_usage(&[5]), vec![0x03, 0x02, 0x02, 0x04]);
        // digitalSignature + keyCertSign
        assert_eq!(key_usage(&[0, 5]), vec![0x03, 0x02, 0x02, 0x84]);
    }

    #[test]
    fn basic_constraints_omits_false_ca() {
        assert_eq!(basic_constraints(false, None), vec![0x30, 0x00]);
        assert_eq!(
            basic_constraints(true, Some(4)),
            vec![0x30, 0x06, 0x01, 0x01, 0xff, 0x02, 0x01, 0x04]
        );
    }

    #[test]
    fn other_name_layout() {
        let der = subject_alt_names(&[(oid::NAME, "x")]);
        // SEQUENCE { [0] { OID 2.5.4.3, [0] { UTF8String "x" } } }
        assert_eq!(
            der,
            vec![
                0x30, 0x0c, 0xa0, 0x0a, 0x06, 0x03, 0x55, 0x04, 0x03, 0xa0, 0x03, 0x0c, 0x01, b'x'
            ]
        );
    }

    #[test]
    fn crl_distribution_point_layout() {
        let der = crl_distribution_points("u");
        assert_eq!(
            der,
            vec![0x30, 0x09, 0x30, 0x07, 0xa0, 0x05, 0xa0, 0x03, 0x86, 0x01, b'u']
        );
    }
}
