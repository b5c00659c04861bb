//! End-to-end scenarios across the core: chain growth, fee priority,
//! double spends, coinbase maturity, retargeting, and cross-chain
//! transfers.

use byc_core::chain_state::ChainStore;
use byc_core::coin::CoinType;
use byc_core::error::{MempoolError, ValidationError};
use byc_core::fee::{cross_chain_min_fee, FeeEstimator};
use byc_core::hash::Hash256;
use byc_core::mempool::Mempool;
use byc_core::script::templates::p2pkh_script;
use byc_core::target;
use byc_core::traits::NoPool;
use byc_core::types::{Outpoint, Transaction, TxInput, TxOutput};
use byc_core::utxo_set::Utxo;
use byc_core::validation::{validate_transaction, ValidationContext};

use byc_tests::helpers::*;

// ----------------------------------------------------------------------
// Scenario: genesis plus one coinbase
// ----------------------------------------------------------------------

#[test]
fn genesis_coinbase_pays_fifty_leah() {
    let engine = test_engine();

    // Address A = hex"00..01".
    let mut a = [0u8; 20];
    a[19] = 0x01;

    let block = raw_block(
        Hash256::ZERO,
        1,
        T0,
        vec![coinbase_to(1, 50, &a, CoinType::Leah)],
    );
    engine.apply_block(&block).unwrap();

    let store = engine.store().read();
    assert_eq!(store.balance(&addr(&a), CoinType::Leah), 50);
    assert_eq!(store.tip().height, 1);
    assert_eq!(store.supply(CoinType::Leah), 50);
}

// ----------------------------------------------------------------------
// Scenario: fee priority
// ----------------------------------------------------------------------

#[test]
fn higher_fee_rate_wins_selection() {
    let mut pool = Mempool::new(100, 0.0);
    let now = T0;

    // Equal-size transactions with fees 1000 and 2500: rates 4x apart in
    // the same proportion as 1000/250 vs 2500/250.
    let t1 = {
        let input = TxInput::new(Outpoint::new(Hash256([0x01; 32]), 0), vec![0xAA; 72]);
        Transaction::new(1, vec![input], vec![TxOutput::new(9, p2pkh_script(&[0x11; 20]))], 0, CoinType::Leah)
    };
    let t2 = {
        let input = TxInput::new(Outpoint::new(Hash256([0x02; 32]), 0), vec![0xAA; 72]);
        Transaction::new(1, vec![input], vec![TxOutput::new(8, p2pkh_script(&[0x22; 20]))], 0, CoinType::Leah)
    };
    assert_eq!(t1.size(), t2.size());

    pool.insert(t1, 1000, now).unwrap();
    let t2_id = pool.insert(t2, 2500, now).unwrap();

    let best = pool.best(1, now);
    assert_eq!(best.len(), 1);
    assert_eq!(best[0].hash(), t2_id);
}

// ----------------------------------------------------------------------
// Scenario: double-spend rejection
// ----------------------------------------------------------------------

#[test]
fn second_spend_of_same_outpoint_is_rejected() {
    let engine = test_engine();
    let owner = key(7);
    let funded = advance(&engine, &owner.public_key().pubkey_hash(), &[]);
    advance_n(&engine, 100);

    let o = coinbase_outpoint(&funded);
    let t1 = signed_transfer(&owner, o.clone(), 40, &[0xA1; 20], CoinType::Leah);
    let t2 = signed_transfer(&owner, o, 39, &[0xA2; 20], CoinType::Leah);

    let mut pool = Mempool::with_defaults();
    let fees = FeeEstimator::new();
    let store = engine.store().read();
    let tip = store.tip();
    let ctx = ValidationContext {
        tip_height: tip.height,
        tip_timestamp: T0 + 1_000_000,
        fees: &fees,
    };

    let view_t1 = validate_transaction(&t1, &StoreView(&*store), &pool, &ctx).unwrap();
    pool.insert(t1.clone(), view_t1.fee, T0).unwrap();

    // T2 spends the same outpoint: rejected as a double spend.
    let err = validate_transaction(&t2, &StoreView(&*store), &pool, &ctx).unwrap_err();
    assert!(matches!(err, ValidationError::DoubleSpend(_)));

    // Selection still contains only T1.
    let best = pool.best(2, T0);
    assert_eq!(best.len(), 1);
    assert_eq!(best[0].hash(), t1.hash());
}

// ----------------------------------------------------------------------
// Scenario: coinbase immaturity
// ----------------------------------------------------------------------

#[test]
fn coinbase_spend_matures_at_one_hundred_confirmations() {
    let engine = test_engine();
    let miner_key = key(9);
    let mined = advance(&engine, &miner_key.public_key().pubkey_hash(), &[]);
    let spend =
        signed_transfer(&miner_key, coinbase_outpoint(&mined), 40, &[0xB1; 20], CoinType::Leah);
    let fees = FeeEstimator::new();

    // Tip height 50: 49 confirmations, rejected as immature.
    advance_n(&engine, 49);
    {
        let store = engine.store().read();
        assert_eq!(store.tip().height, 50);
        let ctx = ValidationContext {
            tip_height: 50,
            tip_timestamp: T0 + 1_000_000,
            fees: &fees,
        };
        let err = validate_transaction(&spend, &StoreView(&*store), &NoPool, &ctx).unwrap_err();
        assert!(matches!(err, ValidationError::Immature { .. }));
    }

    // Tip height 101: accepted.
    advance_n(&engine, 51);
    {
        let store = engine.store().read();
        assert_eq!(store.tip().height, 101);
        let ctx = ValidationContext {
            tip_height: 101,
            tip_timestamp: T0 + 1_000_000,
            fees: &fees,
        };
        assert!(validate_transaction(&spend, &StoreView(&*store), &NoPool, &ctx).is_ok());
    }
}

// ----------------------------------------------------------------------
// Scenario: difficulty retarget
// ----------------------------------------------------------------------

#[test]
fn four_times_faster_blocks_quarter_the_target() {
    let old_bits = 0x1D00_FFFF;
    let new_bits = target::retarget_bits(old_bits, 2016 * 150);
    assert_eq!(
        target::bits_to_target(new_bits),
        target::bits_to_target(old_bits) / 4,
    );
}

#[test]
fn retarget_only_fires_on_the_boundary() {
    assert!(target::is_retarget_height(2016));
    assert!(!target::is_retarget_height(2015));
    assert!(!target::is_retarget_height(2017));
}

// ----------------------------------------------------------------------
// Scenario: cross-chain transfers
// ----------------------------------------------------------------------

fn antion_fixture(
    out_value: u64,
    fee: u64,
    input_coin: CoinType,
    output_coin: CoinType,
) -> Result<(), ValidationError> {
    let owner = key(3);
    let o = Outpoint::new(Hash256([0x31; 32]), 0);
    let utxo = Utxo::new(
        o.clone(),
        out_value + fee,
        p2pkh_script(&owner.public_key().pubkey_hash()),
        input_coin,
        1,
        false,
    );
    let tx = signed_transfer(&owner, o.clone(), out_value, &[0xC1; 20], output_coin);

    let mut view = std::collections::HashMap::new();
    view.insert(o, utxo);
    let fees = FeeEstimator::new();
    let ctx = ValidationContext { tip_height: 500, tip_timestamp: T0, fees: &fees };
    validate_transaction(&tx, &view, &NoPool, &ctx).map(|_| ())
}

#[test]
fn antion_transfer_with_sufficient_fee_is_valid() {
    let out = 90_000;
    let floor = cross_chain_min_fee(out);
    assert_eq!(floor, 90);
    assert!(antion_fixture(out, floor, CoinType::Antion, CoinType::Antion).is_ok());
}

#[test]
fn antion_transfer_below_the_floor_is_rejected() {
    let out = 90_000;
    let floor = cross_chain_min_fee(out);
    let err = antion_fixture(out, floor - 1, CoinType::Antion, CoinType::Antion).unwrap_err();
    assert!(matches!(err, ValidationError::FeeTooLow { .. }));
}

#[test]
fn leah_funding_an_antion_transfer_is_rejected() {
    let err = antion_fixture(90_000, 1_000, CoinType::Leah, CoinType::Antion).unwrap_err();
    assert_eq!(err, ValidationError::InvalidCrossChain);
}

// ----------------------------------------------------------------------
// Universal properties at the integration level
// ----------------------------------------------------------------------

#[test]
fn conservation_holds_across_a_spending_chain() {
    let engine = test_engine();
    let owner = key(11);
    let funded = advance(&engine, &owner.public_key().pubkey_hash(), &[]);
    advance_n(&engine, 100);

    let spend =
        signed_transfer(&owner, coinbase_outpoint(&funded), 40, &[0xD1; 20], CoinType::Leah);
    let block = advance(&engine, &[0xD2; 20], std::slice::from_ref(&spend));
    assert_eq!(block.transactions.len(), 2);

    // Minted supply equals the subsidy schedule: 102 blocks of 50, plus
    // the 10-unit fee recycled into the coinbase (not new supply beyond
    // the reward bound).
    let store = engine.store().read();
    let coinbase_value = block.transactions[0].total_output_value().unwrap();
    assert_eq!(coinbase_value, 50 + 10);
    assert_eq!(store.supply(CoinType::Leah), 101 * 50 + coinbase_value);
}

#[test]
fn no_outpoint_is_spent_twice_across_blocks() {
    let engine = test_engine();
    let owner = key(13);
    let funded = advance(&engine, &owner.public_key().pubkey_hash(), &[]);
    advance_n(&engine, 100);

    let spend =
        signed_transfer(&owner, coinbase_outpoint(&funded), 40, &[0xE1; 20], CoinType::Leah);
    advance(&engine, &[0xE2; 20], std::slice::from_ref(&spend));

    // Offering the same spend again cannot enter a template (stale) and
    // fails validation outright.
    let retry = advance(&engine, &[0xE3; 20], std::slice::from_ref(&spend));
    assert_eq!(retry.transactions.len(), 1);

    let store = engine.store().read();
    let fees = FeeEstimator::new();
    let ctx = ValidationContext {
        tip_height: store.tip().height,
        tip_timestamp: T0 + 1_000_000,
        fees: &fees,
    };
    assert!(matches!(
        validate_transaction(&spend, &StoreView(&*store), &NoPool, &ctx).unwrap_err(),
        ValidationError::UnknownInput(_),
    ));
}

#[test]
fn work_strictly_increases_per_block() {
    let engine = test_engine();
    let mut last = engine.tip().work;
    for _ in 0..5 {
        advance(&engine, &[0xF1; 20], &[]);
        let work = engine.tip().work;
        assert!(work > last);
        last = work;
    }
}

#[test]
fn snapshot_stability_round_trip() {
    let engine = test_engine();
    advance_n(&engine, 5);
    let store = engine.store().read();
    let snapshot = store.snapshot_utxos();
    let restored = byc_core::UtxoSet::restore(&snapshot).unwrap();
    assert_eq!(restored.snapshot(), snapshot);
    assert_eq!(restored.integrity_root(), store.utxo_integrity_root());
}

#[test]
fn pool_full_eviction_prefers_better_rates() {
    let mut pool = Mempool::new(1, 0.0);
    let t1 = {
        let input = TxInput::new(Outpoint::new(Hash256([0x41; 32]), 0), vec![0xAA; 72]);
        Transaction::new(1, vec![input], vec![TxOutput::new(9, p2pkh_script(&[0x11; 20]))], 0, CoinType::Leah)
    };
    let t2 = {
        let input = TxInput::new(Outpoint::new(Hash256([0x42; 32]), 0), vec![0xAA; 72]);
        Transaction::new(1, vec![input], vec![TxOutput::new(8, p2pkh_script(&[0x22; 20]))], 0, CoinType::Leah)
    };
    let t3 = {
        let input = TxInput::new(Outpoint::new(Hash256([0x43; 32]), 0), vec![0xAA; 72]);
        Transaction::new(1, vec![input], vec![TxOutput::new(7, p2pkh_script(&[0x33; 20]))], 0, CoinType::Leah)
    };

    pool.insert(t1, 1_000, T0).unwrap();
    // Better rate evicts.
    let kept = pool.insert(t2, 5_000, T0).unwrap();
    assert!(pool.contains(&kept));
    assert_eq!(pool.len(), 1);
    // Worse rate bounces with PoolFull.
    assert!(matches!(pool.insert(t3, 100, T0), Err(MempoolError::PoolFull)));
}

/// Thin adapter for reading a locked store as a UtxoView in tests.
struct StoreView<'a>(&'a byc_core::chain_state::MemoryChainStore);

impl byc_core::traits::UtxoView for StoreView<'_> {
    fn utxo(&self, outpoint: &Outpoint) -> Option<Utxo> {
        self.0.utxo(outpoint)
    }
}
