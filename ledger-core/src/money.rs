//! Minor-unit scaling
//!
//! The gateway speaks in minor units (kobo); the ledger stores base-unit
//! decimals. The conversion lives here as one explicit, tested function in
//! each direction — mismatched scale is a direct financial-correctness bug,
//! so it is never an implicit cast.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::error::{LedgerError, Result};

/// Minor units per base unit (kobo per naira)
pub const MINOR_UNITS_PER_BASE: i64 = 100;

/// Convert a base-unit amount to gateway minor units.
///
/// Rejects amounts with sub-minor-unit precision rather than rounding, and
/// amounts that overflow the gateway's integer representation.
pub fn to_minor_units(amount: Decimal) -> Result<i64> {
    let scaled = amount
        .checked_mul(Decimal::from(MINOR_UNITS_PER_BASE))
        .ok_or_else(|| LedgerError::Validation(format!("amount out of range: {amount}")))?;

    if scaled.fract() != Decimal::ZERO {
        return Err(LedgerError::Validation(format!(
            "amount {amount} has sub-minor-unit precision"
        )));
    }

    scaled
        .to_i64()
        .ok_or_else(|| LedgerError::Validation(format!("amount out of range: {amount}")))
}

/// Convert a gateway minor-unit amount to a base-unit decimal.
pub fn from_minor_units(minor: i64) -> Decimal {
    Decimal::new(minor, 2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn base_to_minor() {
        assert_eq!(to_minor_units(dec!(1000)).unwrap(), 100_000);
        assert_eq!(to_minor_units(dec!(10.50)).unwrap(), 1_050);
        assert_eq!(to_minor_units(dec!(0.01)).unwrap(), 1);
    }

    #[test]
    fn minor_to_base() {
        assert_eq!(from_minor_units(100_000), dec!(1000));
        assert_eq!(from_minor_units(1), dec!(0.01));
        assert_eq!(from_minor_units(0), Decimal::ZERO);
    }

    #[test]
    fn sub_minor_precision_rejected() {
        assert!(to_minor_units(dec!(10.505)).is_err());
        assert!(to_minor_units(dec!(0.001)).is_err());
    }

    #[test]
    fn roundtrip() {
        let amount = dec!(123456.78);
        assert_eq!(from_minor_units(to_minor_units(amount).unwrap()), amount);
    }
}
