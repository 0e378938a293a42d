use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    config::PricingConfig,
    error::{AppError, AppResult},
};

pub const MSG_TOTAL_TOO_LARGE: &str = "Order total is too large";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct OrderTotals {
    pub items_total: i64,
    pub tax_amount: i64,
    pub shipping_fee: i64,
    pub total_amount: i64,
}

/// Totals for `(unit_price, quantity)` lines, in minor units. Amounts that
/// do not fit in an `i64` are rejected instead of wrapping.
pub fn compute_totals(lines: &[(i64, i32)], config: &PricingConfig) -> AppResult<OrderTotals> {
    let too_large = || AppError::BadRequest(MSG_TOTAL_TOO_LARGE.into());

    let items_total = lines.iter().try_fold(0_i64, |acc, (price, quantity)| {
        price
            .checked_mul(i64::from(*quantity))
            .and_then(|line| acc.checked_add(line))
    });
    let items_total = items_total.ok_or_else(too_large)?;

    let shipping_fee = if items_total >= config.free_shipping_threshold {
        0
    } else {
        config.shipping_fee
    };

    // round half up
    let tax_amount = items_total
        .checked_mul(config.tax_rate_bps)
        .and_then(|t| t.checked_add(5_000))
        .map(|t| t / 10_000)
        .ok_or_else(too_large)?;

    let total_amount = items_total
        .checked_add(tax_amount)
        .and_then(|t| t.checked_add(shipping_fee))
        .ok_or_else(too_large)?;

    Ok(OrderTotals {
        items_total,
        tax_amount,
        shipping_fee,
        total_amount,
    })
}
