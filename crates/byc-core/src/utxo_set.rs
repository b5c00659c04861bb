//! The unspent transaction output set.
//!
//! A primary map from outpoint to entry plus a secondary index from
//! address (the script's hex payload) to outpoints. Both maps mutate only
//! through [`UtxoSet::add`] and [`UtxoSet::spend`], which keeps them
//! consistent; a duplicate insert is a corruption signal, not a recoverable
//! error.
//!
//! The set serializes to a canonical byte image — entries sorted ascending
//! by outpoint — used for snapshots and the rolling integrity hash.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::coin::CoinType;
use crate::constants::{COINBASE_MATURITY, MAX_SCRIPT_SIZE, SNAPSHOT_VERSION};
use crate::error::{ChainStateError, DecodeError};
use crate::hash::{hash256, Hash256};
use crate::script::templates;
use crate::serialize::{write_sized_bytes, Reader};
use crate::types::Outpoint;

/// Flag bit: the entry came from a coinbase transaction.
const FLAG_COINBASE: u8 = 0b0000_0001;
/// Flag bit: the entry's script is a witness program.
const FLAG_SEGWIT: u8 = 0b0000_0010;

/// An unspent transaction output. Immutable once created; removal is the
/// only state change.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Utxo {
    pub outpoint: Outpoint,
    pub value: u64,
    /// Locking script, owned by the entry.
    pub script_pub_key: Vec<u8>,
    pub coin_type: CoinType,
    /// Height of the block that created this output.
    pub block_height: u64,
    pub is_coinbase: bool,
    pub is_segwit: bool,
}

impl Utxo {
    /// Build an entry, deriving the segwit flag from the script.
    pub fn new(
        outpoint: Outpoint,
        value: u64,
        script_pub_key: Vec<u8>,
        coin_type: CoinType,
        block_height: u64,
        is_coinbase: bool,
    ) -> Self {
        let is_segwit = templates::witness_program(&script_pub_key).is_some();
        Self { outpoint, value, script_pub_key, coin_type, block_height, is_coinbase, is_segwit }
    }

    /// The script's indexable hex payload, if the script is standard.
    pub fn address(&self) -> Option<String> {
        templates::script_address(&self.script_pub_key)
    }

    /// Coinbase outputs need [`COINBASE_MATURITY`] confirmations.
    pub fn is_mature(&self, current_height: u64) -> bool {
        if !self.is_coinbase {
            return true;
        }
        current_height >= self.block_height + COINBASE_MATURITY
    }

    /// Canonical entry bytes: `outpoint || value (8 LE) ||
    /// varint(script_len) || script || coin_type_tag || block_height (8 LE)
    /// || flags (1)`.
    pub fn encode(&self, out: &mut Vec<u8>) {
        self.outpoint.encode(out);
        out.extend_from_slice(&self.value.to_le_bytes());
        write_sized_bytes(out, &self.script_pub_key);
        self.coin_type.encode(out);
        out.extend_from_slice(&self.block_height.to_le_bytes());
        let mut flags = 0u8;
        if self.is_coinbase {
            flags |= FLAG_COINBASE;
        }
        if self.is_segwit {
            flags |= FLAG_SEGWIT;
        }
        out.push(flags);
    }

    pub fn decode(reader: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let outpoint = Outpoint::decode(reader)?;
        let value = reader.read_u64()?;
        let script_pub_key = reader.read_sized_bytes(MAX_SCRIPT_SIZE)?;
        let coin_type = CoinType::decode(reader)?;
        let block_height = reader.read_u64()?;
        let flags = reader.read_u8()?;
        Ok(Self {
            outpoint,
            value,
            script_pub_key,
            coin_type,
            block_height,
            is_coinbase: flags & FLAG_COINBASE != 0,
            is_segwit: flags & FLAG_SEGWIT != 0,
        })
    }
}

/// The authoritative UTXO map with its address index.
#[derive(Debug, Clone, Default)]
pub struct UtxoSet {
    primary: HashMap<Outpoint, Utxo>,
    /// Address → outpoints, kept strictly in step with `primary`.
    by_address: HashMap<String, BTreeSet<Outpoint>>,
}

impl UtxoSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.primary.len()
    }

    pub fn is_empty(&self) -> bool {
        self.primary.is_empty()
    }

    /// O(1) expected lookup.
    pub fn get(&self, outpoint: &Outpoint) -> Option<&Utxo> {
        self.primary.get(outpoint)
    }

    pub fn contains(&self, outpoint: &Outpoint) -> bool {
        self.primary.contains_key(outpoint)
    }

    /// Insert a new entry into both maps.
    ///
    /// A duplicate outpoint means the chain produced the same output twice —
    /// state corruption, surfaced as a fatal error.
    pub fn add(&mut self, utxo: Utxo) -> Result<(), ChainStateError> {
        if self.primary.contains_key(&utxo.outpoint) {
            warn!(outpoint = %utxo.outpoint, "duplicate UTXO insert");
            return Err(ChainStateError::DuplicateUtxo(utxo.outpoint.to_string()));
        }
        if let Some(address) = utxo.address() {
            self.by_address.entry(address).or_default().insert(utxo.outpoint.clone());
        }
        self.primary.insert(utxo.outpoint.clone(), utxo);
        Ok(())
    }

    /// Remove and return an entry, maintaining the address index.
    pub fn spend(&mut self, outpoint: &Outpoint) -> Result<Utxo, ChainStateError> {
        let utxo = self
            .primary
            .remove(outpoint)
            .ok_or_else(|| ChainStateError::MissingUtxo(outpoint.to_string()))?;
        if let Some(address) = utxo.address() {
            if let Some(set) = self.by_address.get_mut(&address) {
                set.remove(outpoint);
                if set.is_empty() {
                    self.by_address.remove(&address);
                }
            }
        }
        Ok(utxo)
    }

    /// Outpoints currently locked to an address, in canonical order.
    pub fn by_address(&self, address: &str) -> Vec<Outpoint> {
        self.by_address.get(address).map(|set| set.iter().cloned().collect()).unwrap_or_default()
    }

    /// Sum of unspent values for an address in one coin type.
    pub fn balance(&self, address: &str, coin_type: CoinType) -> u64 {
        self.by_address
            .get(address)
            .map(|outpoints| {
                outpoints
                    .iter()
                    .filter_map(|op| self.primary.get(op))
                    .filter(|utxo| utxo.coin_type == coin_type)
                    .map(|utxo| utxo.value)
                    .sum()
            })
            .unwrap_or(0)
    }

    /// Iterate in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = &Utxo> {
        self.primary.values()
    }

    /// Entries sorted ascending by outpoint — the canonical order.
    fn sorted_entries(&self) -> Vec<&Utxo> {
        let mut entries: Vec<&Utxo> = self.primary.values().collect();
        entries.sort_by(|a, b| a.outpoint.cmp(&b.outpoint));
        entries
    }

    /// Canonical byte image: `version (1) || count (u32 LE) || entries`
    /// sorted ascending by outpoint.
    pub fn snapshot(&self) -> Vec<u8> {
        let entries = self.sorted_entries();
        let mut out = Vec::with_capacity(5 + entries.len() * 64);
        out.push(SNAPSHOT_VERSION);
        out.extend_from_slice(&(entries.len() as u32).to_le_bytes());
        for entry in entries {
            entry.encode(&mut out);
        }
        out
    }

    /// Rebuild a set from a canonical image, verifying order.
    pub fn restore(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut reader = Reader::new(bytes);
        let version = reader.read_u8()?;
        if version != SNAPSHOT_VERSION {
            return Err(DecodeError::UnsupportedVersion(version));
        }
        let count = reader.read_u32()?;
        let mut set = Self::new();
        let mut previous: Option<Outpoint> = None;
        for _ in 0..count {
            let utxo = Utxo::decode(&mut reader)?;
            if let Some(prev) = &previous {
                if utxo.outpoint <= *prev {
                    return Err(DecodeError::UnorderedSnapshot);
                }
            }
            previous = Some(utxo.outpoint.clone());
            set.add(utxo).map_err(|_| DecodeError::UnorderedSnapshot)?;
        }
        reader.finish()?;
        Ok(set)
    }

    /// Rolling hash over the canonical snapshot: starting from the zero
    /// hash, fold in `hash256(entry)` for each entry in canonical order.
    pub fn integrity_root(&self) -> Hash256 {
        let mut acc = Hash256::ZERO;
        for entry in self.sorted_entries() {
            let mut bytes = Vec::with_capacity(64 + entry.script_pub_key.len());
            entry.encode(&mut bytes);
            let entry_hash = hash256(&bytes);
            let mut pair = Vec::with_capacity(64);
            pair.extend_from_slice(acc.as_bytes());
            pair.extend_from_slice(entry_hash.as_bytes());
            acc = hash256(&pair);
        }
        acc
    }

    /// Compare the rolling hash against an expected root.
    pub fn integrity_check(&self, expected_root: &Hash256) -> Result<(), ChainStateError> {
        if self.integrity_root() != *expected_root {
            return Err(ChainStateError::IntegrityFailure);
        }
        Ok(())
    }
}
