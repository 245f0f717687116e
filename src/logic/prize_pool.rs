//! Prize pool: entry fees times paid players, split by a percentage table.

use serde::{Deserialize, Serialize};

/// Payout for one place.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PrizePlace {
    pub place: u32,
    pub amount: f64,
}

/// Total pot and the per-place distribution.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PrizeDistribution {
    pub total_prize_money: f64,
    pub distribution: Vec<PrizePlace>,
}

/// One place per percentage entry. Percentages need not sum to 100; that is up to the caller.
pub fn calculate_prize_pool(
    entry_fee: f64,
    paid_player_count: u32,
    percentages: &[f64],
) -> PrizeDistribution {
    let total_prize_money = entry_fee * f64::from(paid_player_count);
    let distribution = percentages
        .iter()
        .enumerate()
        .map(|(i, pct)| PrizePlace {
            place: i as u32 + 1,
            amount: total_prize_money * pct / 100.0,
        })
        .collect();
    PrizeDistribution {
        total_prize_money,
        distribution,
    }
}
