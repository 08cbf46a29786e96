use crate::calendar::DayRange;
use crate::limits::MAX_AMOUNT;
use crate::model::*;

use super::EngineError;

/// Total price of a stay.
///
/// Rooms charge per night with a one-night minimum. Every other category
/// charges the flat rate once, whatever the duration or time slot.
pub fn price(
    category: Category,
    pricing_type: PricingType,
    rates: &Rates,
    range: &DayRange,
) -> Result<Amount, EngineError> {
    let rate = rates.for_pricing(pricing_type);
    let amount = if category.is_multi_night() {
        let nights = range.len_days().max(1);
        nights
            .checked_mul(rate)
            .ok_or(EngineError::LimitExceeded("price overflow"))?
    } else {
        rate
    };
    if amount > MAX_AMOUNT {
        return Err(EngineError::LimitExceeded("price too large"));
    }
    Ok(amount)
}
