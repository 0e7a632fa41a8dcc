use thiserror::Error;

pub const ETH_DECIMALS: usize = 18;
pub const WEI_PER_ETH: u128 = 1_000_000_000_000_000_000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    #[error("amount is empty")]
    Empty,
    #[error("invalid amount: {0}")]
    Invalid(String),
    #[error("amount has more than {ETH_DECIMALS} decimal places")]
    TooPrecise,
    #[error("amount is too large")]
    Overflow,
}

/// Parse a decimal ETH amount ("1.5", ".25", "10") into wei.
pub fn parse_ether(input: &str) -> Result<u128, AmountError> {
    let s = input.trim();
    if s.is_empty() {
        return Err(AmountError::Empty);
    }

    let (whole, fraction) = match s.split_once('.') {
        Some((w, f)) => (w, f),
        None => (s, ""),
    };
    if whole.is_empty() && fraction.is_empty() {
        return Err(AmountError::Invalid(s.to_string()));
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !fraction.chars().all(|c| c.is_ascii_digit()) {
        return Err(AmountError::Invalid(s.to_string()));
    }
    if fraction.len() > ETH_DECIMALS {
        return Err(AmountError::TooPrecise);
    }

    let whole_wei = if whole.is_empty() {
        0u128
    } else {
        whole
            .parse::<u128>()
            .map_err(|_| AmountError::Overflow)?
            .checked_mul(WEI_PER_ETH)
            .ok_or(AmountError::Overflow)?
    };

    let fraction_wei = if fraction.is_empty() {
        0u128
    } else {
        let padded = format!("{:0<width$}", fraction, width = ETH_DECIMALS);
        padded.parse::<u128>().map_err(|_| AmountError::Invalid(s.to_string()))?
    };

    whole_wei.checked_add(fraction_wei).ok_or(AmountError::Overflow)
}

/// Exact decimal rendering of a wei amount in ETH, trailing zeros trimmed.
pub fn format_ether(wei: u128) -> String {
    let whole = wei / WEI_PER_ETH;
    let fraction = wei % WEI_PER_ETH;
    if fraction == 0 {
        return whole.to_string();
    }
    let digits = format!("{:0>width$}", fraction, width = ETH_DECIMALS);
    format!("{}.{}", whole, digits.trim_end_matches('0'))
}

pub fn to_eth(wei: u128) -> f64 {
    let whole = (wei / WEI_PER_ETH) as f64;
    let fraction = (wei % WEI_PER_ETH) as f64 / 1e18;
    whole + fraction
}

/// Decimal wei string as served by the indexer. Malformed input counts as zero.
pub fn wei_from_str(value: &str) -> u128 {
    value.trim().parse::<u128>().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_whole_and_fractional_amounts() {
        assert_eq!(parse_ether("1"), Ok(WEI_PER_ETH));
        assert_eq!(parse_ether("1.5"), Ok(1_500_000_000_000_000_000));
        assert_eq!(parse_ether(".25"), Ok(250_000_000_000_000_000));
        assert_eq!(parse_ether("0.000000000000000001"), Ok(1));
        assert_eq!(parse_ether(" 2. "), Ok(2 * WEI_PER_ETH));
    }

    #[test]
    fn rejects_malformed_amounts() {
        assert_eq!(parse_ether(""), Err(AmountError::Empty));
        assert_eq!(parse_ether("   "), Err(AmountError::Empty));
        assert!(matches!(parse_ether("-1"), Err(AmountError::Invalid(_))));
        assert!(matches!(parse_ether("1e18"), Err(AmountError::Invalid(_))));
        assert!(matches!(parse_ether("."), Err(AmountError::Invalid(_))));
        assert!(matches!(parse_ether("1.2.3"), Err(AmountError::Invalid(_))));
        assert_eq!(parse_ether("0.0000000000000000001"), Err(AmountError::TooPrecise));
        assert_eq!(
            parse_ether("999999999999999999999999999999"),
            Err(AmountError::Overflow)
        );
    }

    #[test]
    fn formats_ether_without_trailing_zeros() {
        assert_eq!(format_ether(0), "0");
        assert_eq!(format_ether(WEI_PER_ETH), "1");
        assert_eq!(format_ether(1_500_000_000_000_000_000), "1.5");
        assert_eq!(format_ether(1), "0.000000000000000001");
        assert_eq!(format_ether(120_000_000_000_000_000), "0.12");
    }

    #[test]
    fn wei_round_trips_through_ether_strings() {
        let samples = [
            0u128,
            1,
            999,
            WEI_PER_ETH - 1,
            WEI_PER_ETH,
            WEI_PER_ETH + 1,
            123_456_789_012_345_678_901_234,
            u128::MAX,
        ];
        for wei in samples {
            assert_eq!(parse_ether(&format_ether(wei)), Ok(wei), "round trip of {wei}");
        }
    }

    #[test]
    fn converts_wei_to_float_eth() {
        assert_eq!(to_eth(0), 0.0);
        assert_eq!(to_eth(WEI_PER_ETH), 1.0);
        assert_eq!(to_eth(2_500_000_000_000_000_000), 2.5);
    }

    #[test]
    fn malformed_wei_strings_are_zero() {
        assert_eq!(wei_from_str("1000"), 1000);
        assert_eq!(wei_from_str("abc"), 0);
        assert_eq!(wei_from_str(""), 0);
        assert_eq!(wei_from_str("-5"), 0);
    }
}
