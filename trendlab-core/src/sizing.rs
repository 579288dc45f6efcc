//! Risk-based position sizing: converts a recommendation's target allocation
//! into an integer share count, rejecting fills the account can't afford.

/// Compute the integer quantity to buy.
///
/// `qty = floor(position_target_pct * equity / entry_price)`. Returns 0 if
/// the computed quantity would be zero, or if `qty * entry_price` exceeds
/// `available_cash` — both are sizing rejections, not errors.
pub fn size_position(equity: i64, entry_price: f64, position_target_pct: f64, available_cash: i64) -> u64 {
    if entry_price <= 0.0 || position_target_pct <= 0.0 {
        return 0;
    }

    let target_value = position_target_pct * equity as f64;
    let qty = (target_value / entry_price).floor();
    if qty <= 0.0 || !qty.is_finite() {
        return 0;
    }

    let qty = qty as u64;
    let cost = (qty as f64 * entry_price).round() as i64;
    if cost > available_cash {
        return 0;
    }

    qty
}

/// Fixed-size sizing: buy `floor(order_size / entry_price)` shares, regardless
/// of the recommendation's risk-based allocation hint. Rejects (returns 0) on
/// a non-positive `order_size`/`entry_price`, or if the cost would exceed
/// `available_cash` — same rejection rules as `size_position`.
pub fn size_position_fixed(order_size: i64, entry_price: f64, available_cash: i64) -> u64 {
    if entry_price <= 0.0 || order_size <= 0 {
        return 0;
    }

    let qty = (order_size as f64 / entry_price).floor();
    if qty <= 0.0 || !qty.is_finite() {
        return 0;
    }

    let qty = qty as u64;
    let cost = (qty as f64 * entry_price).round() as i64;
    if cost > available_cash {
        return 0;
    }

    qty
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_within_budget() {
        let qty = size_position(10_000_000, 100.0, 0.10, 10_000_000);
        assert_eq!(qty, 10_000);
    }

    #[test]
    fn rejects_when_cash_insufficient() {
        let qty = size_position(10_000_000, 100.0, 0.10, 500);
        assert_eq!(qty, 0);
    }

    #[test]
    fn rejects_zero_or_negative_entry_price() {
        assert_eq!(size_position(10_000_000, 0.0, 0.1, 10_000_000), 0);
        assert_eq!(size_position(10_000_000, -5.0, 0.1, 10_000_000), 0);
    }

    #[test]
    fn floors_fractional_shares() {
        let qty = size_position(1_000_000, 333.0, 0.05, 1_000_000);
        // target_value = 50_000, 50_000/333 = 150.15 -> 150
        assert_eq!(qty, 150);
    }

    #[test]
    fn rejects_zero_target_pct() {
        assert_eq!(size_position(10_000_000, 100.0, 0.0, 10_000_000), 0);
    }

    #[test]
    fn fixed_size_floors_to_affordable_shares() {
        let qty = size_position_fixed(1_000_000, 333.0, 1_000_000);
        assert_eq!(qty, 3_003);
    }

    #[test]
    fn fixed_size_rejects_when_cash_insufficient() {
        assert_eq!(size_position_fixed(1_000_000, 100.0, 500), 0);
    }

    #[test]
    fn fixed_size_rejects_zero_or_negative_inputs() {
        assert_eq!(size_position_fixed(0, 100.0, 1_000_000), 0);
        assert_eq!(size_position_fixed(1_000_000, 0.0, 1_000_000), 0);
        assert_eq!(size_position_fixed(1_000_000, -5.0, 1_000_000), 0);
    }
}
