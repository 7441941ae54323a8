use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::cpq::pricing::round_money;
use crate::domain::quote::QuoteLine;

const QUOTE_CGST_PCT: Decimal = Decimal::from_parts(9, 0, 0, false, 0);
const QUOTE_SGST_PCT: Decimal = Decimal::from_parts(9, 0, 0, false, 0);
const INVOICE_SPLIT_PCT: Decimal = Decimal::from_parts(25, 0, 0, false, 1);
const INVOICE_IGST_PCT: Decimal = Decimal::from_parts(5, 0, 0, false, 0);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scheme", rename_all = "snake_case")]
pub enum TaxScheme {
    /// CGST 9% + SGST 9%.
    Quote,
    /// 5% GST, split CGST/SGST 2.5% each intra-state or charged as IGST inter-state.
    Invoice { interstate: bool },
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxBreakdown {
    pub cgst: Decimal,
    pub sgst: Decimal,
    pub igst: Decimal,
    pub total: Decimal,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteSummary {
    pub subtotal: Decimal,
    pub total_discount: Decimal,
    pub taxable_amount: Decimal,
    pub tax: TaxBreakdown,
    pub total: Decimal,
}

/// Monetary inputs of one line, as the summary sees them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LineAmounts {
    pub quantity: Decimal,
    pub rate: Decimal,
    pub discount_amount: Decimal,
}

impl From<&QuoteLine> for LineAmounts {
    fn from(line: &QuoteLine) -> Self {
        Self { quantity: line.quantity, rate: line.rate, discount_amount: line.discount_amount }
    }
}

pub fn line_total(line: &LineAmounts) -> Decimal {
    round_money(line.quantity * line.rate) - line.discount_amount
}

pub fn tax_for(taxable_amount: Decimal, scheme: TaxScheme) -> TaxBreakdown {
    let percent_of = |pct: Decimal| round_money(taxable_amount * pct / Decimal::ONE_HUNDRED);

    let (cgst, sgst, igst) = match scheme {
        TaxScheme::Quote => (percent_of(QUOTE_CGST_PCT), percent_of(QUOTE_SGST_PCT), Decimal::ZERO),
        TaxScheme::Invoice { interstate: false } => {
            (percent_of(INVOICE_SPLIT_PCT), percent_of(INVOICE_SPLIT_PCT), Decimal::ZERO)
        }
        TaxScheme::Invoice { interstate: true } => {
            (Decimal::ZERO, Decimal::ZERO, percent_of(INVOICE_IGST_PCT))
        }
    };

    TaxBreakdown { cgst, sgst, igst, total: cgst + sgst + igst }
}

/// Aggregates priced lines. Each line and each tax component is rounded where
/// it is produced, so totals differ from a single rounding at the end.
pub fn aggregate(lines: &[LineAmounts], scheme: TaxScheme) -> QuoteSummary {
    let subtotal: Decimal = lines.iter().map(line_total).sum();
    let total_discount: Decimal = lines.iter().map(|line| line.discount_amount).sum();
    let taxable_amount = subtotal;
    let tax = tax_for(taxable_amount, scheme);
    let total = taxable_amount + tax.total;

    QuoteSummary { subtotal, total_discount, taxable_amount, tax, total }
}

pub fn aggregate_quote_lines(lines: &[QuoteLine], scheme: TaxScheme) -> QuoteSummary {
    let amounts = lines.iter().map(LineAmounts::from).collect::<Vec<_>>();
    aggregate(&amounts, scheme)
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{aggregate, tax_for, LineAmounts, TaxScheme};

    fn line(quantity: i64, rate: i64, discount_amount: i64) -> LineAmounts {
        LineAmounts {
            quantity: Decimal::from(quantity),
            rate: Decimal::from(rate),
            discount_amount: Decimal::from(discount_amount),
        }
    }

    #[test]
    fn quote_scheme_charges_nine_plus_nine() {
        let summary = aggregate(&[line(1000, 100, 0)], TaxScheme::Quote);

        assert_eq!(summary.taxable_amount, Decimal::from(100_000));
        assert_eq!(summary.tax.cgst, Decimal::from(9_000));
        assert_eq!(summary.tax.sgst, Decimal::from(9_000));
        assert_eq!(summary.tax.igst, Decimal::ZERO);
        assert_eq!(summary.total, Decimal::from(118_000));
    }

    #[test]
    fn subtotal_already_nets_line_discounts() {
        let summary = aggregate(&[line(100, 50, 500), line(10, 20, 0)], TaxScheme::Quote);

        assert_eq!(summary.subtotal, Decimal::from(4_700));
        assert_eq!(summary.total_discount, Decimal::from(500));
        assert_eq!(summary.taxable_amount, summary.subtotal);
    }

    #[test]
    fn tax_components_round_independently() {
        // 9% of 1,005 is 90.45 per component, so each rounds to 90.
        let tax = tax_for(Decimal::from(1_005), TaxScheme::Quote);

        assert_eq!(tax.cgst, Decimal::from(90));
        assert_eq!(tax.sgst, Decimal::from(90));
        assert_eq!(tax.total, Decimal::from(180));
    }

    #[test]
    fn invoice_scheme_splits_intra_state_and_charges_igst_inter_state() {
        let intra = tax_for(Decimal::from(10_010), TaxScheme::Invoice { interstate: false });
        assert_eq!(intra.cgst, Decimal::from(250));
        assert_eq!(intra.sgst, Decimal::from(250));
        assert_eq!(intra.igst, Decimal::ZERO);
        assert_eq!(intra.total, Decimal::from(500));

        let inter = tax_for(Decimal::from(10_010), TaxScheme::Invoice { interstate: true });
        assert_eq!(inter.cgst, Decimal::ZERO);
        assert_eq!(inter.igst, Decimal::from(501));
        assert_eq!(inter.total, Decimal::from(501));
    }

    #[test]
    fn fractional_quantities_round_per_line() {
        let lines = [
            LineAmounts {
                quantity: Decimal::new(125, 1),
                rate: Decimal::from(33),
                discount_amount: Decimal::ZERO,
            },
            LineAmounts {
                quantity: Decimal::new(125, 1),
                rate: Decimal::from(33),
                discount_amount: Decimal::ZERO,
            },
        ];

        // 412.5 rounds to 413 on each line; rounding only the sum would give 825.
        let summary = aggregate(&lines, TaxScheme::Quote);
        assert_eq!(summary.subtotal, Decimal::from(826));
    }

    #[test]
    fn aggregation_is_idempotent() {
        let lines = [line(750, 90, 1_350), line(40, 215, 0)];

        let first = aggregate(&lines, TaxScheme::Quote);
        let second = aggregate(&lines, TaxScheme::Quote);

        assert_eq!(first, second);
    }

    #[test]
    fn empty_input_sums_to_zero() {
        let summary = aggregate(&[], TaxScheme::Invoice { interstate: false });
        assert_eq!(summary.total, Decimal::ZERO);
    }
}
