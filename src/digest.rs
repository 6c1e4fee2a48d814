use std::fmt;

use sha2::Digest as _;

/// Algorithm to compute the digest of the raw header.
///
/// See [`Session::header_digest`](crate::Session::header_digest).
#[derive(Clone, Copy, Debug, PartialEq)]
#[non_exhaustive]
pub enum DigestAlgorithm {
    SHA256,
    SHA512,
}

impl DigestAlgorithm {
    fn hasher(self) -> Box<dyn digest::DynDigest> {
        match self {
            DigestAlgorithm::SHA256 => Box::new(sha2::Sha256::new()),
            DigestAlgorithm::SHA512 => Box::new(sha2::Sha512::new()),
        }
    }
}

/// Compute the digest of `data`, encoded as a lowercase hex string.
pub(crate) fn hex_digest(algorithm: DigestAlgorithm, data: &[u8]) -> String {
    let mut hasher = algorithm.hasher();
    hasher.update(data);
    HexString(hasher.finalize()).to_string()
}

/// Encode a byte buffer as hex string.
pub(crate) struct HexString<T>(pub T);

impl<T: AsRef<[u8]>> fmt::Display for HexString<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0
            .as_ref()
            .iter()
            .try_for_each(|byte| write!(f, "{:02x}", byte))
    }
}

#[test]
fn encode_hex_bytes() {
    assert_eq!(HexString(b"\x01\x20\xf0").to_string(), "0120f0");
}

#[test]
fn digest_of_known_data() {
    assert_eq!(
        hex_digest(DigestAlgorithm::SHA256, b"abc"),
        "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
    );

    assert_eq!(hex_digest(DigestAlgorithm::SHA512, b"abc").len(), 128);
}
