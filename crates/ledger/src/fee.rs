use alloy_primitives::U256;

/// Platform fee, in basis points of the invoice amount (1%).
pub const PLATFORM_FEE_BPS: u64 = 100;
pub const BASIS_POINTS: u64 = 10_000;

/// Fee taken from a payment of `amount` wei, truncated toward zero.
/// `None` on overflow.
pub fn platform_fee(amount: U256) -> Option<U256> {
    amount
        .checked_mul(U256::from(PLATFORM_FEE_BPS))
        .map(|scaled| scaled / U256::from(BASIS_POINTS))
}

/// What the merchant can withdraw once `amount` has been paid.
pub fn merchant_share(amount: U256) -> Option<U256> {
    platform_fee(amount).and_then(|fee| amount.checked_sub(fee))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_percent_truncated() {
        assert_eq!(platform_fee(U256::from(10_000u64)), Some(U256::from(100u64)));
        assert_eq!(platform_fee(U256::from(199u64)), Some(U256::from(1u64)));
        assert_eq!(platform_fee(U256::from(99u64)), Some(U256::ZERO));
        assert_eq!(merchant_share(U256::from(199u64)), Some(U256::from(198u64)));
    }

    #[test]
    fn fee_plus_share_is_amount() {
        for raw in [1u64, 7, 100, 12_345, 1_000_000_000_000_000_000] {
            let amount = U256::from(raw);
            let fee = platform_fee(amount).unwrap();
            assert_eq!(fee + merchant_share(amount).unwrap(), amount);
            assert_eq!(fee, amount * U256::from(100u64) / U256::from(10_000u64));
        }
    }

    #[test]
    fn overflow_is_reported() {
        assert_eq!(platform_fee(U256::MAX), None);
    }
}
