//! Content digests (`algorithm:hex`).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest as Sha2Digest, Sha256};

use crate::error::CleanerError;

/// Content address of a registry object, e.g. `sha256:3d65e9ef...`.
///
/// The inner field is private so the value is always a validated
/// `algorithm:hex` pair with a lowercase hex part.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Digest(String);

impl Digest {
    /// Compute the `sha256:` digest of the given bytes.
    pub fn sha256(data: &[u8]) -> Self {
        Digest(format!("sha256:{}", hex::encode(Sha256::digest(data))))
    }

    /// Return the full `algorithm:hex` string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Algorithm part (`sha256`).
    pub fn algorithm(&self) -> &str {
        self.0.split_once(':').map(|(a, _)| a).unwrap_or_default()
    }

    /// Hex part without the algorithm prefix.
    pub fn hex(&self) -> &str {
        self.0.split_once(':').map(|(_, h)| h).unwrap_or_default()
    }

    /// Short form (algorithm plus first 12 hex chars).
    pub fn short(&self) -> String {
        let hex = self.hex();
        format!("{}:{}", self.algorithm(), &hex[..12.min(hex.len())])
    }
}

impl FromStr for Digest {
    type Err = CleanerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (algorithm, encoded) = s
            .split_once(':')
            .ok_or_else(|| CleanerError::InvalidDigest(s.to_string()))?;

        let algorithm_ok = !algorithm.is_empty()
            && algorithm
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || "+._-".contains(c));
        if !algorithm_ok || encoded.is_empty() {
            return Err(CleanerError::InvalidDigest(s.to_string()));
        }

        let bytes = hex::decode(encoded).map_err(|_| CleanerError::InvalidDigest(s.to_string()))?;
        if algorithm == "sha256" && bytes.len() != 32 {
            return Err(CleanerError::InvalidDigest(s.to_string()));
        }

        Ok(Digest(format!("{algorithm}:{}", encoded.to_ascii_lowercase())))
    }
}

impl TryFrom<String> for Digest {
    type Error = CleanerError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Digest> for String {
    fn from(d: Digest) -> Self {
        d.0
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
