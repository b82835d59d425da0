use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::{AppError, AppResult};
use crate::models::Discount;

/// Largest amount a money column (`NUMERIC(12,2)`) can hold.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(3_567_587_327, 232, 0, false, 2);

fn out_of_range(what: &str) -> AppError {
    AppError::BadRequest(format!("{what} is out of the supported range"))
}

/// Rejects amounts a money column cannot store.
pub fn ensure_amount(value: Decimal, what: &str) -> AppResult<Decimal> {
    if value.abs() > MAX_AMOUNT {
        return Err(out_of_range(what));
    }
    Ok(value)
}

fn mul(a: Decimal, b: Decimal, what: &str) -> AppResult<Decimal> {
    a.checked_mul(b).ok_or_else(|| out_of_range(what))
}

/// Adds two amounts, failing instead of overflowing.
pub fn add_amounts(a: Decimal, b: Decimal, what: &str) -> AppResult<Decimal> {
    let sum = a.checked_add(b).ok_or_else(|| out_of_range(what))?;
    ensure_amount(sum, what)
}

/// Rounds to cents, half away from zero.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

pub fn nights_between(check_in: NaiveDate, check_out: NaiveDate) -> AppResult<i32> {
    let nights = (check_out - check_in).num_days();
    if nights < 1 {
        return Err(AppError::BadRequest(
            "Check-out must be at least one day after check-in".into(),
        ));
    }
    i32::try_from(nights).map_err(|_| AppError::BadRequest("Stay is too long".into()))
}

/// Occupancy terms of the room type, for the extra-guest surcharge.
#[derive(Debug, Clone, Copy)]
pub struct Occupancy {
    pub base: i32,
    pub max: i32,
    pub extra_person_rate: Decimal,
}

#[derive(Debug, Clone)]
pub struct StayRequest {
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub nightly_rate: Decimal,
    pub adults: i32,
    pub children: i32,
    pub occupancy: Option<Occupancy>,
    pub discount: Option<Discount>,
    pub tax_rate: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StayQuote {
    pub nights: i32,
    pub subtotal: Decimal,
    pub extras: Decimal,
    pub discount: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

/// Prices a stay. The discount applies before tax and never exceeds the
/// pre-discount amount.
pub fn quote_stay(req: &StayRequest) -> AppResult<StayQuote> {
    let nights = nights_between(req.check_in, req.check_out)?;

    if req.adults < 1 || req.children < 0 {
        return Err(AppError::BadRequest(
            "At least one adult is required and children cannot be negative".into(),
        ));
    }
    if req.nightly_rate < Decimal::ZERO {
        return Err(AppError::BadRequest("Nightly rate cannot be negative".into()));
    }
    ensure_amount(req.nightly_rate, "Nightly rate")?;

    let nights_dec = Decimal::from(nights);
    let subtotal = ensure_amount(round_money(mul(req.nightly_rate, nights_dec, "Stay subtotal")?), "Stay subtotal")?;

    let guests = req
        .adults
        .checked_add(req.children)
        .ok_or_else(|| out_of_range("Guest count"))?;
    let extras = match req.occupancy {
        Some(occ) => {
            if guests > occ.max {
                return Err(AppError::BadRequest(format!(
                    "Room type allows at most {} guests",
                    occ.max
                )));
            }
            let extra_guests = (guests - occ.base).max(0);
            let per_night = mul(Decimal::from(extra_guests), occ.extra_person_rate, "Extra guest charge")?;
            ensure_amount(round_money(mul(per_night, nights_dec, "Extra guest charge")?), "Extra guest charge")?
        }
        None => Decimal::ZERO,
    };

    let gross = add_amounts(subtotal, extras, "Stay amount")?;
    let discount = discount_amount(req.discount, gross)?;
    let discounted = gross - discount;
    let tax = round_money(mul(discounted, req.tax_rate, "Stay tax")?);

    Ok(StayQuote {
        nights,
        subtotal,
        extras,
        discount,
        tax,
        total: add_amounts(discounted, tax, "Stay total")?,
    })
}

fn discount_amount(discount: Option<Discount>, gross: Decimal) -> AppResult<Decimal> {
    let amount = match discount {
        None => return Ok(Decimal::ZERO),
        Some(Discount::Amount(value)) => {
            if value < Decimal::ZERO {
                return Err(AppError::BadRequest("Discount cannot be negative".into()));
            }
            value
        }
        Some(Discount::Percent(pct)) => {
            if pct < Decimal::ZERO || pct > Decimal::ONE_HUNDRED {
                return Err(AppError::BadRequest(
                    "Discount percentage must be between 0 and 100".into(),
                ));
            }
            gross * pct / Decimal::ONE_HUNDRED
        }
    };
    Ok(round_money(amount.min(gross)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineAmounts {
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

/// Prices a folio line. `tax_rate` is `None` for untaxed concepts.
pub fn price_line(quantity: i32, unit_price: Decimal, tax_rate: Option<Decimal>) -> AppResult<LineAmounts> {
    if quantity < 1 {
        return Err(AppError::BadRequest("Quantity must be at least 1".into()));
    }
    if unit_price < Decimal::ZERO {
        return Err(AppError::BadRequest("Unit price cannot be negative".into()));
    }
    ensure_amount(unit_price, "Unit price")?;

    let subtotal = ensure_amount(round_money(mul(unit_price, Decimal::from(quantity), "Line amount")?), "Line amount")?;
    let tax = match tax_rate {
        Some(rate) => round_money(mul(subtotal, rate, "Line tax")?),
        None => Decimal::ZERO,
    };
    Ok(LineAmounts {
        subtotal,
        tax,
        total: add_amounts(subtotal, tax, "Line total")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn stay(rate: &str) -> StayRequest {
        StayRequest {
            check_in: date(2025, 6, 1),
            check_out: date(2025, 6, 3),
            nightly_rate: dec(rate),
            adults: 2,
            children: 0,
            occupancy: None,
            discount: None,
            tax_rate: dec("0.16"),
        }
    }

    #[test]
    fn two_night_stay_at_standard_tax() {
        let quote = quote_stay(&stay("1000")).unwrap();
        assert_eq!(quote.nights, 2);
        assert_eq!(quote.subtotal, dec("2000"));
        assert_eq!(quote.tax, dec("320"));
        assert_eq!(quote.total, dec("2320"));
    }

    #[test]
    fn same_day_checkout_is_rejected() {
        let mut req = stay("1000");
        req.check_out = req.check_in;
        assert!(matches!(quote_stay(&req), Err(AppError::BadRequest(_))));
        assert!(nights_between(date(2025, 6, 3), date(2025, 6, 1)).is_err());
    }

    #[test]
    fn extra_guests_are_charged_per_night() {
        let mut req = stay("1000");
        req.adults = 3;
        req.children = 1;
        req.occupancy = Some(Occupancy {
            base: 2,
            max: 4,
            extra_person_rate: dec("150"),
        });
        let quote = quote_stay(&req).unwrap();
        assert_eq!(quote.extras, dec("600"));
        assert_eq!(quote.tax, dec("416"));
        assert_eq!(quote.total, dec("3016"));
    }

    #[test]
    fn occupancy_above_maximum_is_rejected() {
        let mut req = stay("1000");
        req.adults = 5;
        req.occupancy = Some(Occupancy {
            base: 2,
            max: 4,
            extra_person_rate: dec("150"),
        });
        assert!(quote_stay(&req).is_err());
    }

    #[test]
    fn percentage_discount_applies_before_tax() {
        let mut req = stay("1000");
        req.discount = Some(Discount::Percent(dec("10")));
        let quote = quote_stay(&req).unwrap();
        assert_eq!(quote.discount, dec("200"));
        assert_eq!(quote.tax, dec("288"));
        assert_eq!(quote.total, dec("2088"));
    }

    #[test]
    fn flat_discount_is_capped_at_the_stay() {
        let mut req = stay("100");
        req.discount = Some(Discount::Amount(dec("500")));
        let quote = quote_stay(&req).unwrap();
        assert_eq!(quote.discount, dec("200"));
        assert_eq!(quote.total, Decimal::ZERO);
    }

    #[test]
    fn invalid_discounts_are_rejected() {
        let mut req = stay("100");
        req.discount = Some(Discount::Percent(dec("120")));
        assert!(quote_stay(&req).is_err());
        req.discount = Some(Discount::Amount(dec("-1")));
        assert!(quote_stay(&req).is_err());
    }

    #[test]
    fn tax_is_rounded_to_cents() {
        let mut req = stay("33.33");
        req.check_out = date(2025, 6, 2);
        let quote = quote_stay(&req).unwrap();
        // 33.33 * 0.16 = 5.3328
        assert_eq!(quote.tax, dec("5.33"));
        assert_eq!(quote.total, dec("38.66"));
    }

    #[test]
    fn line_pricing_with_and_without_tax() {
        let taxed = price_line(3, dec("45.50"), Some(dec("0.16"))).unwrap();
        assert_eq!(taxed.subtotal, dec("136.50"));
        assert_eq!(taxed.tax, dec("21.84"));
        assert_eq!(taxed.total, dec("158.34"));

        let untaxed = price_line(1, dec("80"), None).unwrap();
        assert_eq!(untaxed.tax, Decimal::ZERO);
        assert_eq!(untaxed.total, dec("80"));

        assert!(price_line(0, dec("1"), None).is_err());
    }

    #[test]
    fn max_amount_matches_the_money_column() {
        assert_eq!(MAX_AMOUNT, dec("9999999999.99"));
    }

    #[test]
    fn oversized_rates_are_rejected_not_panicking() {
        let mut req = stay("1000");
        req.nightly_rate = Decimal::MAX;
        req.check_out = date(2025, 6, 30);
        assert!(matches!(quote_stay(&req), Err(AppError::BadRequest(_))));

        // a valid rate whose stay total no longer fits
        let mut req = stay("9999999999.99");
        req.check_out = date(2025, 6, 30);
        assert!(matches!(quote_stay(&req), Err(AppError::BadRequest(_))));

        let mut req = stay("1000");
        req.adults = i32::MAX;
        req.children = 1;
        assert!(matches!(quote_stay(&req), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn oversized_lines_are_rejected_not_panicking() {
        assert!(matches!(
            price_line(i32::MAX, Decimal::MAX, Some(dec("0.16"))),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            price_line(i32::MAX, dec("9999999999.99"), None),
            Err(AppError::BadRequest(_))
        ));
    }
}
