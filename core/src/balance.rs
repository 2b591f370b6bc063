//! The balance delta engine: pure functions applying signed deltas to
//! typed balance representations.
//!
//! Every error here is recoverable per transaction: the committer marks
//! the transaction Failed and moves on. Balances are unbounded integers
//! throughout; a negative result is detected, never stored.

use num_bigint::{BigInt, BigUint, Sign};
use thiserror::Error;

use rollup_types::{AssetBalance, AssetDelta, LiquidityDelta, LiquidityPool};

#[derive(Debug, Error)]
pub enum DeltaError {
    #[error("insufficient balance for asset {asset_id}: {component} would go negative")]
    InsufficientBalance { asset_id: u64, component: &'static str },
    #[error("pool {pair_index} reserve {component} would go negative")]
    NegativeReserve { pair_index: u16, component: &'static str },
}

fn add_signed(base: &BigUint, delta: &BigInt) -> Option<BigUint> {
    let result = BigInt::from(base.clone()) + delta;
    match result.sign() {
        Sign::Minus => None,
        _ => result.to_biguint(),
    }
}

/// Apply a component-wise signed delta to a general asset balance.
pub fn apply_general(
    asset_id: u64,
    base: &AssetBalance,
    delta: &AssetDelta,
) -> Result<AssetBalance, DeltaError> {
    let balance = add_signed(&base.balance, &delta.balance).ok_or(
        DeltaError::InsufficientBalance {
            asset_id,
            component: "balance",
        },
    )?;
    let lp_amount = add_signed(&base.lp_amount, &delta.lp_amount).ok_or(
        DeltaError::InsufficientBalance {
            asset_id,
            component: "lp_amount",
        },
    )?;
    let offer_canceled_or_finalized = add_signed(
        &base.offer_canceled_or_finalized,
        &delta.offer_canceled_or_finalized,
    )
    .ok_or(DeltaError::InsufficientBalance {
        asset_id,
        component: "offer_canceled_or_finalized",
    })?;
    Ok(AssetBalance {
        balance,
        lp_amount,
        offer_canceled_or_finalized,
    })
}

/// Apply a pool delta: reserves and LP supply move by signed amounts, the
/// accumulated-product checkpoint and rate fields are replaced outright.
pub fn apply_liquidity(
    base: &LiquidityPool,
    delta: &LiquidityDelta,
) -> Result<LiquidityPool, DeltaError> {
    let pair_index = base.pair_index;
    let asset_a = add_signed(&base.asset_a, &delta.asset_a).ok_or(DeltaError::NegativeReserve {
        pair_index,
        component: "asset_a",
    })?;
    let asset_b = add_signed(&base.asset_b, &delta.asset_b).ok_or(DeltaError::NegativeReserve {
        pair_index,
        component: "asset_b",
    })?;
    let lp_supply = add_signed(&base.lp_supply, &delta.lp_supply).ok_or(
        DeltaError::NegativeReserve {
            pair_index,
            component: "lp_supply",
        },
    )?;
    Ok(LiquidityPool {
        pair_index,
        asset_a_id: delta.asset_a_id,
        asset_a,
        asset_b_id: delta.asset_b_id,
        asset_b,
        lp_supply,
        k_last: delta.k_last.clone(),
        fee_rate: delta.fee_rate,
        treasury_account_index: delta.treasury_account_index,
        treasury_rate: delta.treasury_rate,
    })
}
