//! Client reports.

use rand::prelude::*;

use crate::{Codec, Error};

/// Size of the per-report nonce in bytes.
pub const NONCE_SIZE: usize = 16;

/// A single client submission: an encoded measurement and the nonce that identifies it.
///
/// The nonce is chosen once when the report is created and is reused for every round of
/// aggregation over this report.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Report {
    measurement: u128,
    nonce: [u8; NONCE_SIZE],
}

impl Report {
    /// Create a report for `measurement` with a fresh random nonce.
    pub fn new(measurement: u128) -> Self {
        let mut nonce = [0u8; NONCE_SIZE];
        thread_rng().fill(&mut nonce[..]);
        Self::with_nonce(measurement, nonce)
    }

    /// Create a report with a caller-chosen nonce.
    pub fn with_nonce(measurement: u128, nonce: [u8; NONCE_SIZE]) -> Self {
        Self { measurement, nonce }
    }

    /// The encoded measurement.
    pub fn measurement(&self) -> u128 {
        self.measurement
    }

    /// The report nonce.
    pub fn nonce(&self) -> &[u8; NONCE_SIZE] {
        &self.nonce
    }
}

/// An error observed by a client, in the form collected by the heavy hitters search.
///
/// Encoded as `error_type || client_version || client_context || origin`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ErrorReport {
    pub error_type: u8,
    pub client_version: u8,
    pub client_context: u8,
    pub origin: String,
}

impl ErrorReport {
    const HEADER_LEN: usize = 3;

    /// Encode the report as a measurement.
    pub fn encode(&self, codec: &Codec) -> Result<u128, Error> {
        let mut payload = Vec::with_capacity(Self::HEADER_LEN + self.origin.len());
        payload.extend_from_slice(&[self.error_type, self.client_version, self.client_context]);
        payload.extend_from_slice(self.origin.as_bytes());
        codec.encode(&payload)
    }

    /// Decode a report from a measurement produced by [`Self::encode`].
    pub fn decode(codec: &Codec, encoded: u128) -> Result<Self, Error> {
        let mut payload = codec.decode(encoded)?;
        if payload.len() < Self::HEADER_LEN {
            return Err(Error::TruncatedRecord(payload.len()));
        }

        let origin = String::from_utf8(payload.split_off(Self::HEADER_LEN))?;
        Ok(Self {
            error_type: payload[0],
            client_version: payload[1],
            client_context: payload[2],
            origin,
        })
    }
}

/// Encode an error report from its fields.
pub fn encode_error(
    codec: &Codec,
    error_type: u8,
    client_version: u8,
    client_context: u8,
    origin: &str,
) -> Result<u128, Error> {
    ErrorReport {
        error_type,
        client_version,
        client_context,
        origin: origin.to_string(),
    }
    .encode(codec)
}

/// Decode an error report into `(error_type, client_version, client_context, origin)`.
pub fn decode_error(codec: &Codec, encoded: u128) -> Result<(u8, u8, u8, String), Error> {
    let ErrorReport {
        error_type,
        client_version,
        client_context,
        origin,
    } = ErrorReport::decode(codec, encoded)?;
    Ok((error_type, client_version, client_context, origin))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn error_report_roundtrip() {
        let codec = Codec::new(41).unwrap();
        let encoded = encode_error(&codec, 0x00, 0x10, 0x20, "A").unwrap();
        assert_eq!(encoded, 0x00_10_20_41u128 << 9 | 1 << 8);
        assert_eq!(
            decode_error(&codec, encoded).unwrap(),
            (0x00, 0x10, 0x20, "A".to_string())
        );

        let report = ErrorReport {
            error_type: 7,
            client_version: 1,
            client_context: 2,
            origin: String::new(),
        };
        assert_eq!(
            ErrorReport::decode(&codec, report.encode(&codec).unwrap()).unwrap(),
            report
        );
    }

    #[test]
    fn error_report_too_long() {
        let codec = Codec::new(41).unwrap();
        assert_matches!(
            encode_error(&codec, 0, 0, 0, "abc"),
            Err(Error::EncodingOverflow { len: 6, .. })
        );
    }

    #[test]
    fn error_report_truncated() {
        let codec = Codec::new(41).unwrap();
        let encoded = codec.encode(&[1, 2]).unwrap();
        assert_matches!(
            ErrorReport::decode(&codec, encoded),
            Err(Error::TruncatedRecord(2))
        );
    }

    #[test]
    fn error_report_invalid_origin() {
        let codec = Codec::new(41).unwrap();
        let encoded = codec.encode(&[1, 2, 3, 0xff]).unwrap();
        assert_matches!(
            ErrorReport::decode(&codec, encoded),
            Err(Error::InvalidOrigin(_))
        );
    }

    #[test]
    fn report_nonces_differ() {
        let a = Report::new(1);
        let b = Report::new(1);
        assert_eq!(a.measurement(), b.measurement());
        assert_ne!(a.nonce(), b.nonce());
    }
}
