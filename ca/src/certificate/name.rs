use mir_common::params::{DistinguishedName, NameValue};
use yasna::DERWriter;

use crate::oid;

/// Write `name` as an X.501 Name: one single-valued RDN per entry, integers as
/// INTEGER and everything else as UTF8String.
pub fn write_name(writer: DERWriter, name: &DistinguishedName) {
    writer.write_sequence(|writer| {
        for entry in name.entries() {
            writer.next().write_set(|writer| {
                writer.next().write_sequence(|writer| {
                    oid::name_attribute(entry.attribute).write(writer.next());
                    match &entry.value {
                        NameValue::Integer(value) => writer.next().write_i64(*value),
                        NameValue::Text(value) => writer.next().write_utf8_string(value),
                    }
                });
            });
        }
    });
}

/// DER encoding of an arbitrary name, without needing a certificate.
pub fn name_as_der(name: &DistinguishedName) -> Vec<u8> {
    yasna::construct_der(|writer| write_name(writer, name))
}
