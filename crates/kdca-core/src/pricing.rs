//! Limit price and volume derivation for DCA purchases.

use crate::decimal::{Price, Size};
use rust_decimal::Decimal;

/// Decimal places of the submitted limit price.
pub const PRICE_DECIMALS: u32 = 2;

/// Decimal places of the submitted volume.
pub const VOLUME_DECIMALS: u32 = 8;

/// Flat amount subtracted from the rounded best bid, in quote currency.
///
/// Absolute, not relative: sensible for high-priced pairs only.
pub const DEFAULT_PRICE_MARGIN: Decimal = Decimal::from_parts(5, 0, 0, false, 1);

/// Limit price resting just below the best bid.
///
/// `round_half_even(best_bid, 2) - margin`. The result may be zero or
/// negative for low-priced pairs; callers must check `is_positive`.
pub fn derive_limit_price(best_bid: Price, margin: Decimal) -> Price {
    best_bid.round_half_even(PRICE_DECIMALS) - margin
}

/// Volume purchasable with `amount_worth` at `price`, truncated to 8 places.
///
/// Truncation guarantees `volume * price <= amount_worth`. Returns `None`
/// when the price is not positive.
pub fn compute_volume(amount_worth: Decimal, price: Price) -> Option<Size> {
    if !price.is_positive() {
        return None;
    }
    let raw = amount_worth.checked_div(price.inner())?;
    Some(Size::new(raw).truncate(VOLUME_DECIMALS))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_limit_price_from_bid() {
        let bid: Price = "50000.125".parse().unwrap();
        let limit = derive_limit_price(bid, DEFAULT_PRICE_MARGIN);
        assert_eq!(limit.inner(), dec!(49999.62));
    }

    #[test]
    fn test_limit_price_custom_margin() {
        let bid = Price::new(dec!(2500.456));
        let limit = derive_limit_price(bid, dec!(1));
        assert_eq!(limit.inner(), dec!(2499.46));
    }

    #[test]
    fn test_limit_price_can_go_non_positive() {
        let bid = Price::new(dec!(0.30));
        let limit = derive_limit_price(bid, DEFAULT_PRICE_MARGIN);
        assert!(!limit.is_positive());
    }

    #[test]
    fn test_volume_never_overspends() {
        let price = Price::new(dec!(50000.01));
        let volume = compute_volume(dec!(10), price).unwrap();
        assert_eq!(volume.inner(), dec!(0.00019999));
        assert!(volume.notional(price) <= dec!(10));
    }

    #[test]
    fn test_volume_truncates_rather_than_rounds() {
        // 20 / 3 = 6.666...
        assert_eq!(
            compute_volume(dec!(20), Price::new(dec!(3))).unwrap().inner(),
            dec!(6.66666666)
        );
    }

    #[test]
    fn test_volume_is_idempotent() {
        let price = Price::new(dec!(1234.56));
        let a = compute_volume(dec!(25), price).unwrap();
        let b = compute_volume(dec!(25), price).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_volume_monotonic_in_budget() {
        let price = Price::new(dec!(1999.99));
        let mut prev = Size::ZERO;
        for budget in [dec!(1), dec!(5), dec!(10), dec!(50), dec!(100)] {
            let v = compute_volume(budget, price).unwrap();
            assert!(v >= prev);
            assert!(v.notional(price) <= budget);
            prev = v;
        }
    }

    #[test]
    fn test_volume_rejects_non_positive_price() {
        assert!(compute_volume(dec!(10), Price::ZERO).is_none());
        assert!(compute_volume(dec!(10), Price::new(dec!(-1))).is_none());
    }
}
