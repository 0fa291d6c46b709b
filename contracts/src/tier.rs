// Risk tiers
//
// Each pair blueprint belongs to one tier; the tier fixes the pair's
// collateral and interest parameters at deployment.

/// Pair risk tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RiskTier {
    /// Like-kind assets (e.g. stablecoin/stablecoin)
    Stable,
    Low,
    Medium,
    High,
}

/// Per-tier deployment parameters
///
/// Rates are scaled by 1e5; interest is a per-second rate scaled by 1e18.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierParameters {
    pub collateralization_rate: u64,
    pub liquidation_multiplier: u64,
    pub minimum_interest_per_second: u64,
    pub maximum_interest_per_second: u64,
}

impl RiskTier {
    /// All tiers, in ascending order of risk
    pub const ALL: [RiskTier; 4] = [
        RiskTier::Stable,
        RiskTier::Low,
        RiskTier::Medium,
        RiskTier::High,
    ];

    /// Wire tag for the tier
    pub fn tag(self) -> u8 {
        match self {
            RiskTier::Stable => 0,
            RiskTier::Low => 1,
            RiskTier::Medium => 2,
            RiskTier::High => 3,
        }
    }

    /// Tier for a wire tag
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(RiskTier::Stable),
            1 => Some(RiskTier::Low),
            2 => Some(RiskTier::Medium),
            3 => Some(RiskTier::High),
            _ => None,
        }
    }

    /// Deployment parameters for the tier
    pub fn parameters(self) -> TierParameters {
        match self {
            RiskTier::Stable => TierParameters {
                collateralization_rate: 95_000,
                liquidation_multiplier: 103_000,
                minimum_interest_per_second: 158_548_960,
                maximum_interest_per_second: 3_170_979_200,
            },
            RiskTier::Low => TierParameters {
                collateralization_rate: 85_000,
                liquidation_multiplier: 106_000,
                minimum_interest_per_second: 317_097_920,
                maximum_interest_per_second: 15_854_896_000,
            },
            RiskTier::Medium => TierParameters {
                collateralization_rate: 75_000,
                liquidation_multiplier: 112_000,
                minimum_interest_per_second: 317_097_920,
                maximum_interest_per_second: 31_709_792_000,
            },
            RiskTier::High => TierParameters {
                collateralization_rate: 65_000,
                liquidation_multiplier: 120_000,
                minimum_interest_per_second: 634_195_840,
                maximum_interest_per_second: 63_419_584_000,
            },
        }
    }
}
