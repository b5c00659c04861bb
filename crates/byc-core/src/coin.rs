//! Coin denominations.
//!
//! Every transaction, output, and UTXO carries a [`CoinType`] tag from a
//! closed set. Mixing tags within a transaction is forbidden except for
//! Antion, the bridge denomination between the gold and silver families.
//! Completion coins are never mined and have hard supply ceilings.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::DecodeError;
use crate::serialize::{write_sized_bytes, Reader};

/// Denomination class: how a coin type enters circulation and converts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoinClass {
    /// Mineable base units.
    Base,
    /// Gold-family units derived from Senine.
    Gold,
    /// Silver-family units derived from Senum.
    Silver,
    /// Completion coins with hard supply ceilings.
    Completion,
}

/// A tagged denomination from the closed protocol set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CoinType {
    #[default]
    Leah,
    Shiblum,
    Shiblon,
    Senine,
    Seon,
    Shum,
    Limnah,
    Antion,
    Senum,
    Amnor,
    Ezrom,
    Onti,
    Ephraim,
    Manasseh,
    Joseph,
}

/// Hard supply ceiling for each completion coin, in smallest units.
pub const COMPLETION_SUPPLY_CEILING: u64 = 11_000_000;

impl CoinType {
    /// All coin types in canonical order.
    pub const ALL: [CoinType; 15] = [
        CoinType::Leah,
        CoinType::Shiblum,
        CoinType::Shiblon,
        CoinType::Senine,
        CoinType::Seon,
        CoinType::Shum,
        CoinType::Limnah,
        CoinType::Antion,
        CoinType::Senum,
        CoinType::Amnor,
        CoinType::Ezrom,
        CoinType::Onti,
        CoinType::Ephraim,
        CoinType::Manasseh,
        CoinType::Joseph,
    ];

    /// Uppercase ASCII tag carried in canonical encodings.
    pub const fn tag(self) -> &'static str {
        match self {
            CoinType::Leah => "LEAH",
            CoinType::Shiblum => "SHIBLUM",
            CoinType::Shiblon => "SHIBLON",
            CoinType::Senine => "SENINE",
            CoinType::Seon => "SEON",
            CoinType::Shum => "SHUM",
            CoinType::Limnah => "LIMNAH",
            CoinType::Antion => "ANTION",
            CoinType::Senum => "SENUM",
            CoinType::Amnor => "AMNOR",
            CoinType::Ezrom => "EZROM",
            CoinType::Onti => "ONTI",
            CoinType::Ephraim => "EPHRAIM",
            CoinType::Manasseh => "MANASSEH",
            CoinType::Joseph => "JOSEPH",
        }
    }

    pub const fn class(self) -> CoinClass {
        match self {
            CoinType::Leah | CoinType::Shiblum | CoinType::Shiblon => CoinClass::Base,
            CoinType::Senine
            | CoinType::Seon
            | CoinType::Shum
            | CoinType::Limnah
            | CoinType::Antion => CoinClass::Gold,
            CoinType::Senum | CoinType::Amnor | CoinType::Ezrom | CoinType::Onti => {
                CoinClass::Silver
            }
            CoinType::Ephraim | CoinType::Manasseh | CoinType::Joseph => CoinClass::Completion,
        }
    }

    /// Whether coinbase transactions may create this coin type.
    pub const fn is_mineable(self) -> bool {
        matches!(self.class(), CoinClass::Base)
    }

    /// Fixed conversion rate to the smallest base unit (one Leah).
    /// Completion coins do not convert and report 1.
    pub const fn base_unit_rate(self) -> u64 {
        match self {
            CoinType::Leah => 1,
            CoinType::Shiblum => 2,
            CoinType::Shiblon => 4,
            CoinType::Senine | CoinType::Senum => 8,
            CoinType::Seon | CoinType::Amnor => 16,
            CoinType::Shum | CoinType::Ezrom => 32,
            CoinType::Limnah | CoinType::Onti => 56,
            CoinType::Antion => 12,
            CoinType::Ephraim | CoinType::Manasseh | CoinType::Joseph => 1,
        }
    }

    /// Supply ceiling in smallest units, if this coin type has one.
    pub const fn supply_ceiling(self) -> Option<u64> {
        match self.class() {
            CoinClass::Completion => Some(COMPLETION_SUPPLY_CEILING),
            _ => None,
        }
    }

    /// Convert a value of this coin type into base units (Leah).
    /// Returns `None` on overflow or for completion coins.
    pub fn to_base_units(self, value: u64) -> Option<u64> {
        if matches!(self.class(), CoinClass::Completion) {
            return None;
        }
        value.checked_mul(self.base_unit_rate())
    }

    /// Parse from the canonical uppercase tag.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.tag() == tag)
    }

    /// Append the canonical tag encoding: one length byte then ASCII bytes.
    pub fn encode(self, out: &mut Vec<u8>) {
        write_sized_bytes(out, self.tag().as_bytes());
    }

    /// Serialized tag length in bytes.
    pub fn encoded_len(self) -> usize {
        1 + self.tag().len()
    }

    pub fn decode(reader: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let bytes = reader.read_sized_bytes(16)?;
        let tag = std::str::from_utf8(&bytes)
            .map_err(|_| DecodeError::UnknownCoinType(format!("{bytes:?}")))?;
        Self::from_tag(tag).ok_or_else(|| DecodeError::UnknownCoinType(tag.to_string()))
    }
}

impl fmt::Display for CoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}
