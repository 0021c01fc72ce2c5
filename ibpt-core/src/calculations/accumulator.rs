//! Running estimate of the taxes embedded in a sale.
//!
//! A [`TaxAccumulator`] collects, item by item, the approximate tax burden
//! of every product and service on a document, split by taxing sphere:
//!
//! | Sphere              | Products | Services |
//! |---------------------|----------|----------|
//! | National (domestic) | yes      | yes      |
//! | National (imported) | yes      | yes      |
//! | State               | yes      | yes      |
//! | Municipal           | no       | yes      |
//!
//! Each contribution is `subtotal × rate / 100` in exact decimal arithmetic.
//! Nothing is rounded while accumulating; [`TaxSummary::rounded`] exists for
//! display.
//!
//! Adding an item is all-or-nothing: if the rate lookup fails, the subtotal
//! is negative, or a sum would leave the range of [`Decimal`], every total
//! keeps its previous value.

use std::fmt;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::calculations::common::round_half_up;
use crate::models::{LineItem, ProductRate, RateKey, ServiceRate, Sphere};
use crate::provider::{RateError, RateProvider};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccumulatorError {
    #[error(transparent)]
    Lookup(#[from] RateError),

    #[error("subtotal must not be negative, got {0}")]
    NegativeSubtotal(Decimal),

    #[error("adding {0} with subtotal {1} overflows the running totals")]
    Overflow(RateKey, Decimal),
}

/// Sums held by a [`TaxAccumulator`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AccumulatorState {
    pub national_domestic: Decimal,
    pub national_imported: Decimal,
    pub state: Decimal,
    pub municipal: Decimal,
    /// Sum of the subtotals of every item added.
    pub base: Decimal,
    /// Number of items added.
    pub items: usize,
}

impl AccumulatorState {
    /// The sums after adding `contribution`, or `None` if any of them, or the
    /// combined total scaled to a percentage, would overflow.
    fn applied(
        &self,
        contribution: &Contribution,
    ) -> Option<Self> {
        let next = Self {
            national_domestic: self
                .national_domestic
                .checked_add(contribution.national_domestic)?,
            national_imported: self
                .national_imported
                .checked_add(contribution.national_imported)?,
            state: self.state.checked_add(contribution.state)?,
            municipal: self.municipal.checked_add(contribution.municipal)?,
            base: self.base.checked_add(contribution.subtotal)?,
            items: self.items + 1,
        };
        checked_sum(&[
            next.national_domestic,
            next.national_imported,
            next.state,
            next.municipal,
        ])?
        .checked_mul(Decimal::ONE_HUNDRED)?;
        Some(next)
    }
}

/// Estimated taxes for a single line item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Contribution {
    pub key: RateKey,
    pub subtotal: Decimal,
    pub national_domestic: Decimal,
    pub national_imported: Decimal,
    pub state: Decimal,
    pub municipal: Decimal,
}

impl Contribution {
    fn for_product(
        key: RateKey,
        rate: &ProductRate,
        subtotal: Decimal,
    ) -> Result<Self, AccumulatorError> {
        Self::build(key, subtotal, [rate.national, rate.imported, rate.state, Decimal::ZERO])
    }

    fn for_service(
        key: RateKey,
        rate: &ServiceRate,
        subtotal: Decimal,
    ) -> Result<Self, AccumulatorError> {
        Self::build(
            key,
            subtotal,
            [rate.national, rate.imported, rate.state, rate.municipal],
        )
    }

    /// `rates` in sphere order: domestic, imported, state, municipal.
    fn build(
        key: RateKey,
        subtotal: Decimal,
        rates: [Decimal; 4],
    ) -> Result<Self, AccumulatorError> {
        let Some([national_domestic, national_imported, state, municipal]) =
            shares(subtotal, rates)
        else {
            return Err(AccumulatorError::Overflow(key, subtotal));
        };
        Ok(Self {
            key,
            subtotal,
            national_domestic,
            national_imported,
            state,
            municipal,
        })
    }

    pub fn total(&self) -> Decimal {
        self.national_domestic + self.national_imported + self.state + self.municipal
    }
}

fn share(
    subtotal: Decimal,
    rate: Decimal,
) -> Option<Decimal> {
    subtotal.checked_mul(rate)?.checked_div(Decimal::ONE_HUNDRED)
}

/// Every sphere's share of `subtotal`, provided they and their sum fit.
fn shares(
    subtotal: Decimal,
    rates: [Decimal; 4],
) -> Option<[Decimal; 4]> {
    let [national, imported, state, municipal] = rates;
    let shares = [
        share(subtotal, national)?,
        share(subtotal, imported)?,
        share(subtotal, state)?,
        share(subtotal, municipal)?,
    ];
    checked_sum(&shares)?;
    Some(shares)
}

fn checked_sum(values: &[Decimal]) -> Option<Decimal> {
    values
        .iter()
        .try_fold(Decimal::ZERO, |acc, value| acc.checked_add(*value))
}

/// Snapshot of an accumulator's totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TaxSummary {
    pub national_domestic: Decimal,
    pub national_imported: Decimal,
    pub federal: Decimal,
    pub state: Decimal,
    pub municipal: Decimal,
    pub total: Decimal,
    pub base: Decimal,
    /// `total` as a percentage of `base`.
    pub percentage: Decimal,
}

impl TaxSummary {
    /// Every amount rounded half-up to two decimal places.
    pub fn rounded(&self) -> Self {
        Self {
            national_domestic: round_half_up(self.national_domestic),
            national_imported: round_half_up(self.national_imported),
            federal: round_half_up(self.federal),
            state: round_half_up(self.state),
            municipal: round_half_up(self.municipal),
            total: round_half_up(self.total),
            base: round_half_up(self.base),
            percentage: round_half_up(self.percentage),
        }
    }
}

impl fmt::Display for TaxSummary {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        writeln!(f, "{:<22}{:>14}", "Base", self.base)?;
        writeln!(f, "{:<22}{:>14}", Sphere::NationalDomestic.label(), self.national_domestic)?;
        writeln!(f, "{:<22}{:>14}", Sphere::NationalImported.label(), self.national_imported)?;
        writeln!(f, "{:<22}{:>14}", "Federal", self.federal)?;
        writeln!(f, "{:<22}{:>14}", Sphere::State.label(), self.state)?;
        writeln!(f, "{:<22}{:>14}", Sphere::Municipal.label(), self.municipal)?;
        writeln!(f, "{:<22}{:>14}", "Total taxes", self.total)?;
        write!(f, "{:<22}{:>13}%", "Share of base", self.percentage)
    }
}

/// Accumulates per-sphere tax estimates for one document.
///
/// Starts empty; becomes non-empty after the first successful add and
/// returns to empty on [`reset`](Self::reset).
pub struct TaxAccumulator {
    provider: Arc<dyn RateProvider>,
    state: AccumulatorState,
}

impl TaxAccumulator {
    pub fn new(provider: Arc<dyn RateProvider>) -> Self {
        Self {
            provider,
            state: AccumulatorState::default(),
        }
    }

    /// Looks up the product rate and adds `subtotal`'s share of it to the
    /// national and state totals.
    ///
    /// # Errors
    /// [`AccumulatorError::NegativeSubtotal`] before any lookup, or
    /// [`AccumulatorError::Lookup`] with the provider's failure, or
    /// [`AccumulatorError::Overflow`] when the amounts leave the range of
    /// [`Decimal`]. Totals are unchanged in every case.
    pub async fn add_product_contribution(
        &mut self,
        code: &str,
        exception: u32,
        subtotal: Decimal,
    ) -> Result<Contribution, AccumulatorError> {
        ensure_non_negative(subtotal)?;
        let rate = self.provider.get_product_rate(code, exception).await?;
        let key = RateKey::product(code, exception);
        let contribution = Contribution::for_product(key, &rate, subtotal)?;
        self.record(contribution)
    }

    /// Looks up the service rate and adds `subtotal`'s share of it to all
    /// four sphere totals.
    ///
    /// # Errors
    /// Same as [`add_product_contribution`](Self::add_product_contribution).
    pub async fn add_service_contribution(
        &mut self,
        code: &str,
        subtotal: Decimal,
    ) -> Result<Contribution, AccumulatorError> {
        ensure_non_negative(subtotal)?;
        let rate = self.provider.get_service_rate(code).await?;
        let contribution = Contribution::for_service(RateKey::service(code), &rate, subtotal)?;
        self.record(contribution)
    }

    pub async fn add_item(
        &mut self,
        item: &LineItem,
    ) -> Result<Contribution, AccumulatorError> {
        match &item.key {
            RateKey::Product { code, exception } => {
                self.add_product_contribution(code, *exception, item.subtotal)
                    .await
            }
            RateKey::Service { code } => self.add_service_contribution(code, item.subtotal).await,
        }
    }

    fn record(
        &mut self,
        contribution: Contribution,
    ) -> Result<Contribution, AccumulatorError> {
        self.state = self.state.applied(&contribution).ok_or_else(|| {
            AccumulatorError::Overflow(contribution.key.clone(), contribution.subtotal)
        })?;
        debug!(
            key = %contribution.key,
            subtotal = %contribution.subtotal,
            taxes = %contribution.total(),
            "contribution added"
        );
        Ok(contribution)
    }

    pub fn reset(&mut self) {
        self.state = AccumulatorState::default();
    }

    /// True until the first successful add, and again after a reset.
    pub fn is_empty(&self) -> bool {
        self.state.items == 0
    }

    pub fn state(&self) -> &AccumulatorState {
        &self.state
    }

    pub fn national_domestic_total(&self) -> Decimal {
        self.state.national_domestic
    }

    pub fn national_imported_total(&self) -> Decimal {
        self.state.national_imported
    }

    /// Domestic plus imported national taxes.
    pub fn federal_total(&self) -> Decimal {
        self.state.national_domestic + self.state.national_imported
    }

    pub fn state_total(&self) -> Decimal {
        self.state.state
    }

    pub fn municipal_total(&self) -> Decimal {
        self.state.municipal
    }

    pub fn sphere_total(
        &self,
        sphere: Sphere,
    ) -> Decimal {
        match sphere {
            Sphere::NationalDomestic => self.state.national_domestic,
            Sphere::NationalImported => self.state.national_imported,
            Sphere::State => self.state.state,
            Sphere::Municipal => self.state.municipal,
        }
    }

    /// Federal, state and municipal taxes combined.
    pub fn total_taxes(&self) -> Decimal {
        self.federal_total() + self.state.state + self.state.municipal
    }

    pub fn base(&self) -> Decimal {
        self.state.base
    }

    /// Combined taxes as a percentage of the base; zero when the base is zero.
    pub fn tax_percentage(&self) -> Decimal {
        if self.state.base.is_zero() {
            return Decimal::ZERO;
        }
        self.total_taxes() * Decimal::ONE_HUNDRED / self.state.base
    }

    pub fn summary(&self) -> TaxSummary {
        TaxSummary {
            national_domestic: self.state.national_domestic,
            national_imported: self.state.national_imported,
            federal: self.federal_total(),
            state: self.state.state,
            municipal: self.state.municipal,
            total: self.total_taxes(),
            base: self.state.base,
            percentage: self.tax_percentage(),
        }
    }
}

fn ensure_non_negative(subtotal: Decimal) -> Result<(), AccumulatorError> {
    if subtotal < Decimal::ZERO {
        return Err(AccumulatorError::NegativeSubtotal(subtotal));
    }
    Ok(())
}
