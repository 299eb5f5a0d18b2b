use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;

pub type Timestamp = u64;
pub type PoolId = String;

/// 10 000 bps = 100%
pub const BPS_DENOMINATOR: u32 = 10_000;

/// 0.3%
pub const DEFAULT_FEE_BPS: u32 = 30;

pub fn now() -> Timestamp {
    chrono::Utc::now().timestamp_millis() as u64
}

// ============================================================================
// Token Information
// ============================================================================

/// Token metadata
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenInfo {
    pub symbol: String,
    pub decimals: u8,
    #[serde(default)]
    pub name: Option<String>,
}

impl TokenInfo {
    pub fn new(symbol: impl Into<String>, decimals: u8) -> Self {
        Self {
            symbol: symbol.into(),
            decimals,
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Display name, falling back to the symbol
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.symbol)
    }

    /// Round an amount down to this token's precision.
    /// Rounding toward zero never pays out more than the curve allows.
    pub fn quantize(&self, amount: Decimal) -> Decimal {
        amount.round_dp_with_strategy(self.decimals as u32, RoundingStrategy::ToZero)
    }

    /// Smallest representable amount (eg 0.000001 for 6 decimals)
    pub fn min_unit(&self) -> Decimal {
        Decimal::new(1, self.decimals as u32)
    }
}

impl fmt::Display for TokenInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol)
    }
}

// ============================================================================
// Token Pair
// ============================================================================

/// Trading pair (eg GLD/USDC)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenPair {
    pub base: TokenInfo,   // The token being bought/sold
    pub quote: TokenInfo,  // The token used for pricing
}

impl TokenPair {
    pub fn new(base: TokenInfo, quote: TokenInfo) -> Self {
        Self { base, quote }
    }

    /// Get pair symbol (eg "GLD/USDC"), also used as the oracle feed key
    pub fn symbol(&self) -> String {
        format!("{}/{}", self.base.symbol, self.quote.symbol)
    }

    /// Check whether a symbol is one of the two pair tokens
    pub fn contains(&self, symbol: &str) -> bool {
        self.base.symbol == symbol || self.quote.symbol == symbol
    }
}

impl fmt::Display for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

// ============================================================================
// Swap Direction
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SwapDirection {
    BaseToQuote,
    QuoteToBase,
}

impl SwapDirection {
    pub fn reverse(self) -> Self {
        match self {
            SwapDirection::BaseToQuote => SwapDirection::QuoteToBase,
            SwapDirection::QuoteToBase => SwapDirection::BaseToQuote,
        }
    }

    pub fn direction_str(&self) -> &'static str {
        match self {
            SwapDirection::BaseToQuote => "BASE -> QUOTE",
            SwapDirection::QuoteToBase => "QUOTE -> BASE",
        }
    }
}

impl fmt::Display for SwapDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.direction_str())
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn test_quantize_rounds_toward_zero() {
        let usdc = TokenInfo::new("USDC", 6);
        assert_eq!(usdc.quantize(dec!(5.1628365199)), dec!(5.162836));
        assert_eq!(usdc.quantize(dec!(0.0000009)), Decimal::ZERO);
        assert_eq!(usdc.min_unit(), dec!(0.000001));
    }

    #[test]
    fn test_pair_symbol_and_membership() {
        let pair = TokenPair::new(TokenInfo::new("HBAR", 8), TokenInfo::new("USDC", 6));
        assert_eq!(pair.symbol(), "HBAR/USDC");
        assert!(pair.contains("USDC"));
        assert!(!pair.contains("BTC"));
    }

    #[test]
    fn test_display_name_falls_back_to_symbol() {
        let plain = TokenInfo::new("GLD", 4);
        assert_eq!(plain.display_name(), "GLD");
        let named = plain.with_name("Tokenized Gold");
        assert_eq!(named.display_name(), "Tokenized Gold");
    }
}
