//! Supported pass styles.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Visual style of a pass.
///
/// The style names the key under which a pass keeps its structure
/// (`primaryFields`, `backFields`, ...) inside `pass.json`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PassStyle {
    BoardingPass,
    Coupon,
    EventTicket,
    Generic,
    StoreCard,
}

impl PassStyle {
    /// All supported styles.
    pub const ALL: [PassStyle; 5] = [
        PassStyle::BoardingPass,
        PassStyle::Coupon,
        PassStyle::EventTicket,
        PassStyle::Generic,
        PassStyle::StoreCard,
    ];

    /// Key of the structure object in `pass.json`.
    pub fn as_str(&self) -> &'static str {
        match self {
            PassStyle::BoardingPass => "boardingPass",
            PassStyle::Coupon => "coupon",
            PassStyle::EventTicket => "eventTicket",
            PassStyle::Generic => "generic",
            PassStyle::StoreCard => "storeCard",
        }
    }
}

impl fmt::Display for PassStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PassStyle {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        PassStyle::ALL
            .into_iter()
            .find(|style| style.as_str() == s)
            .ok_or_else(|| Error::UnsupportedStyle(s.to_string()))
    }
}
