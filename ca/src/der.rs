//! Small DER helpers around yasna.

use chrono::{DateTime, Utc};
use time::OffsetDateTime;
use yasna::{
    DERWriter,
    models::{GeneralizedTime, UTCTime},
};

use crate::error::CaError;

pub(crate) const TAG_OID: u8 = 0x06;

/// Encode a primitive value with a single-octet tag.
pub(crate) fn tlv(tag: u8, content: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(content.len() + 6);
    out.push(tag);

    let len = content.len();
    if len < 0x80 {
        out.push(len as u8);
    } else {
        let bytes = len.to_be_bytes();
        let skip = bytes.iter().take_while(|b| **b == 0).count();
        out.push(0x80 | (bytes.len() - skip) as u8);
        out.extend_from_slice(&bytes[skip..]);
    }

    out.extend_from_slice(content);
    out
}

pub(crate) fn offset_datetime(dt: DateTime<Utc>) -> Result<OffsetDateTime, CaError> {
    OffsetDateTime::from_unix_timestamp(dt.timestamp())
        .map_err(|e| CaError::InvalidSubject(format!("timestamp out of range: {e}")))
}

/// Certificate validity times: UTCTime through 2049, GeneralizedTime after.
pub(crate) fn write_validity_time(writer: DERWriter, dt: OffsetDateTime) {
    if (1950..2050).contains(&dt.year()) {
        writer.write_utctime(&UTCTime::from_datetime(dt));
    } else {
        writer.write_generalized_time(&GeneralizedTime::from_datetime(dt));
    }
}

pub(crate) fn write_generalized_time(writer: DERWriter, dt: OffsetDateTime) {
    writer.write_generalized_time(&GeneralizedTime::from_datetime(dt));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_form_lengths() {
        let content = vec![0u8; 300];
        let encoded = tlv(0x04, &content);
        assert_eq!(&encoded[..4], &[0x04, 0x82, 0x01, 0x2c]);
        assert_eq!(encoded.len(), 304);
    }

    #[test]
    fn short_form_lengths() {
        assert_eq!(tlv(TAG_OID, &[0x2a, 0x03]), vec![0x06, 0x02, 0x2a, 0x03]);
        assert_eq!(tlv(TAG_OID, &[]), vec![0x06, 0x00]);
    }

    #[test]
    fn validity_switches_to_generalized_time_in_2050() {
        let utc = yasna::construct_der(|writer| {
            write_validity_time(writer, OffsetDateTime::from_unix_timestamp(2_524_607_999).unwrap())
        });
        assert_eq!(utc[0], 0x17);
        let generalized = yasna::construct_der(|writer| {
            write_validity_time(writer, OffsetDateTime::from_unix_timestamp(2_524_608_000).unwrap())
        });
        assert_eq!(generalized[0], 0x18);
    }
}
