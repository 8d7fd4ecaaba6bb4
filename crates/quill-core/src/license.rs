//! Workbench license tiers and resolution.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::QuillError;

/// A workbench license tier, ordered from most to least potent.
///
/// `None` is the universal "no license" sentinel: a user whose group
/// memberships resolve to `None` is not entitled to an account.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum License {
    #[serde(rename = "DATA_SCIENTIST")]
    DataScientist,
    #[serde(rename = "DATA_ANALYST")]
    DataAnalyst,
    #[serde(rename = "READER")]
    Reader,
    #[serde(rename = "EXPLORER")]
    Explorer,
    #[serde(rename = "NONE")]
    None,
}

/// All license tiers, most potent first, ending in the sentinel.
pub const ALL_LICENSES: [License; 5] = [
    License::DataScientist,
    License::DataAnalyst,
    License::Reader,
    License::Explorer,
    License::None,
];

impl License {
    /// Resolve the most potent license present in `licenses`.
    ///
    /// Returns [`License::None`] for an empty input. Total and deterministic:
    /// the derived `Ord` follows declaration order, so the minimum element is
    /// the most potent tier present.
    pub fn resolve<I>(licenses: I) -> License
    where
        I: IntoIterator<Item = License>,
    {
        licenses.into_iter().min().unwrap_or(License::None)
    }

    /// The wire/CSV representation of this tier.
    pub fn as_str(&self) -> &'static str {
        match self {
            License::DataScientist => "DATA_SCIENTIST",
            License::DataAnalyst => "DATA_ANALYST",
            License::Reader => "READER",
            License::Explorer => "EXPLORER",
            License::None => "NONE",
        }
    }
}

impl fmt::Display for License {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for License {
    type Err = QuillError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DATA_SCIENTIST" => Ok(License::DataScientist),
            "DATA_ANALYST" => Ok(License::DataAnalyst),
            "READER" => Ok(License::Reader),
            "EXPLORER" => Ok(License::Explorer),
            "NONE" => Ok(License::None),
            other => Err(QuillError::Config(format!(
                "invalid license type: {other:?} (valid values: DATA_SCIENTIST, DATA_ANALYST, READER, EXPLORER, NONE)"
            ))),
        }
    }
}
