use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::domain::setup::AddOn;
use crate::errors::DomainError;

/// Every intermediate figure of a priced quotation. Kept in full
/// precision; rounding happens only at display through [`round_display`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingBreakdown {
    pub base_price: Decimal,
    pub add_ons_total: Decimal,
    pub subtotal: Decimal,
    pub discount_amount: Decimal,
    pub final_price: Decimal,
    pub base_delivery_days: u32,
    pub add_ons_delivery_days: u32,
    pub final_delivery_days: u32,
}

/// Half-up rounding to the currency minor unit, applied at the point of
/// display rather than inside the arithmetic.
pub fn round_display(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

pub fn subtotal(base_price: Decimal, selected: &[AddOn]) -> Result<Decimal, DomainError> {
    if base_price.is_sign_negative() {
        return Err(DomainError::Validation(format!("base price {base_price} is negative")));
    }
    let mut total = base_price;
    for add_on in selected {
        if add_on.price.is_sign_negative() {
            return Err(DomainError::Validation(format!(
                "add-on `{}` has negative price {}",
                add_on.id.0, add_on.price
            )));
        }
        total += add_on.price;
    }
    Ok(total)
}

/// A discount can never push the final price below zero, whatever the
/// coupon kind produced.
pub fn final_price(subtotal: Decimal, discount: Decimal) -> Decimal {
    (subtotal - discount).max(Decimal::ZERO)
}

/// Add-on delivery impacts are additive; they never shorten the window.
pub fn delivery_days(base_days: u32, selected: &[AddOn]) -> u32 {
    base_days + selected.iter().map(|add_on| add_on.extra_delivery_days).sum::<u32>()
}

pub fn price_selection(
    base_price: Decimal,
    base_delivery_days: u32,
    selected: &[AddOn],
    discount: Decimal,
) -> Result<PricingBreakdown, DomainError> {
    let subtotal = subtotal(base_price, selected)?;
    let add_ons_total = subtotal - base_price;
    let add_ons_delivery_days = selected.iter().map(|a| a.extra_delivery_days).sum();

    Ok(PricingBreakdown {
        base_price,
        add_ons_total,
        subtotal,
        discount_amount: discount,
        final_price: final_price(subtotal, discount),
        base_delivery_days,
        add_ons_delivery_days,
        final_delivery_days: base_delivery_days + add_ons_delivery_days,
    })
}
