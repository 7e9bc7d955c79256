//! Per-account holdings: plain balances or cost-basis lots.
//!
//! An inventory starts plain (a currency-to-balance map) and switches to
//! booked the first time a posting carries a lot spec. Once booked, every
//! posting must speak in lots: augmentations create them, reductions select
//! them by the account's booking method. The policy is fixed when the
//! account is opened.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::date::Date;
use crate::number::Decimal;
use crate::syntax::ast::{BookingMethod, LotSpec};

/// Booking failures, surfaced as pipeline diagnostics on the posting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InventoryError {
    #[error("account does not hold this currency")]
    DoesNotHoldCurrency,

    #[error("account holds lots; a plain amount cannot be posted")]
    IsBooked,

    #[error("account does not support lot specs")]
    DoesNotSupportLotSpec,

    #[error("lot spec matches more than one lot")]
    AmbiguousMatch,

    #[error("matched lots are smaller than the reduction")]
    MatchTooSmall,

    #[error("lot spec matches no lot")]
    NoMatch,

    #[error("strict booking is ambiguous")]
    AmbiguousStrictBooking,
}

/// One acquired parcel with its cost basis.
#[derive(Debug, Clone, PartialEq)]
pub struct Lot {
    pub cost_currency: String,
    pub cost_amount: Decimal,
    pub date: Date,
    pub label: Option<String>,
    pub remaining: Decimal,
}

impl Lot {
    /// Does this lot satisfy every selector the spec provides?
    fn matches(&self, spec: &LotSpec) -> bool {
        if let Some(number) = &spec.cost.number {
            if self.cost_amount != *number {
                return false;
            }
        }
        if let Some(currency) = &spec.cost.currency {
            if &self.cost_currency != currency {
                return false;
            }
        }
        if let Some(date) = &spec.date {
            if &self.date != date {
                return false;
            }
        }
        if let Some(label) = &spec.label {
            if self.label.as_deref() != Some(label.as_str()) {
                return false;
            }
        }
        true
    }
}

/// Units and total cost held in one currency.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Position {
    pub units: Decimal,
    /// Total cost per cost currency; empty for plain holdings.
    pub cost: BTreeMap<String, Decimal>,
}

/// Per-currency rollup of an inventory or a subtree.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Summary {
    pub positions: BTreeMap<String, Position>,
}

impl Summary {
    /// Units held in `currency`, zero when absent.
    pub fn units(&self, currency: &str) -> Decimal {
        self.positions
            .get(currency)
            .map(|p| p.units)
            .unwrap_or_else(Decimal::zero)
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    fn add_units(&mut self, currency: &str, units: &Decimal) {
        let position = self.positions.entry(currency.to_string()).or_default();
        position.units = position.units.add(units);
    }

    fn add_cost(&mut self, currency: &str, cost_currency: &str, cost: &Decimal) {
        let position = self.positions.entry(currency.to_string()).or_default();
        let slot = position
            .cost
            .entry(cost_currency.to_string())
            .or_insert_with(Decimal::zero);
        *slot = slot.add(cost);
    }

    /// Merge another summary into this one.
    pub fn merge(&mut self, other: &Summary) {
        for (currency, position) in &other.positions {
            self.add_units(currency, &position.units);
            for (cost_currency, cost) in &position.cost {
                self.add_cost(currency, cost_currency, cost);
            }
        }
    }
}

/// An account's holdings: plain currency balances or booked lots.
#[derive(Debug, Clone, PartialEq)]
pub enum Inventory {
    /// Currency to balance; zero entries are pruned.
    Plain(BTreeMap<String, Decimal>),
    /// Unit currency to lots in insertion order.
    Booked {
        method: BookingMethod,
        lots: BTreeMap<String, Vec<Lot>>,
    },
}

impl Default for Inventory {
    fn default() -> Self {
        Inventory::Plain(BTreeMap::new())
    }
}

impl Inventory {
    /// Apply one concrete posting: `number currency`, optionally carrying a
    /// lot spec. `date` is the transaction date, used for lots without an
    /// explicit acquisition date. `method` is the account's booking policy.
    pub fn apply_posting(
        &mut self,
        date: Date,
        number: &Decimal,
        currency: &str,
        lot: Option<&LotSpec>,
        method: Option<BookingMethod>,
    ) -> Result<(), InventoryError> {
        match lot {
            None => self.add_plain(currency, number),
            Some(spec) => {
                self.ensure_booked(method)?;
                if number.is_negative() {
                    self.match_and_remove(currency, &number.abs(), spec)
                } else {
                    self.add_lot(date, currency, number, spec);
                    Ok(())
                }
            }
        }
    }

    /// Sum a plain amount into the balance map.
    fn add_plain(&mut self, currency: &str, number: &Decimal) -> Result<(), InventoryError> {
        match self {
            Inventory::Plain(balances) => {
                let balance = balances
                    .entry(currency.to_string())
                    .or_insert_with(Decimal::zero);
                *balance = balance.add(number);
                if balance.is_zero() {
                    balances.remove(currency);
                }
                Ok(())
            }
            Inventory::Booked { .. } => Err(InventoryError::IsBooked),
        }
    }

    /// Switch a pristine plain inventory to booked; an account with plain
    /// history cannot start holding lots.
    fn ensure_booked(&mut self, method: Option<BookingMethod>) -> Result<(), InventoryError> {
        match self {
            Inventory::Booked { .. } => Ok(()),
            Inventory::Plain(balances) if balances.is_empty() => {
                *self = Inventory::Booked {
                    method: method.unwrap_or(BookingMethod::Strict),
                    lots: BTreeMap::new(),
                };
                Ok(())
            }
            Inventory::Plain(_) => Err(InventoryError::DoesNotSupportLotSpec),
        }
    }

    fn add_lot(&mut self, date: Date, currency: &str, number: &Decimal, spec: &LotSpec) {
        let Inventory::Booked { lots, .. } = self else {
            unreachable!("ensure_booked ran first");
        };
        lots.entry(currency.to_string()).or_default().push(Lot {
            cost_currency: spec.cost.currency.clone().unwrap_or_default(),
            cost_amount: spec.cost.number.unwrap_or_else(Decimal::zero),
            date: spec.date.unwrap_or(date),
            label: spec.label.clone(),
            remaining: *number,
        });
    }

    /// Remove `quantity` units of `currency`, selecting lots according to
    /// the booking method and the spec's selectors.
    pub fn match_and_remove(
        &mut self,
        currency: &str,
        quantity: &Decimal,
        spec: &LotSpec,
    ) -> Result<(), InventoryError> {
        let Inventory::Booked { method, lots } = self else {
            return Err(InventoryError::DoesNotSupportLotSpec);
        };
        let method = *method;
        let all = lots.get_mut(currency).ok_or(InventoryError::NoMatch)?;

        let selective = !spec.cost.is_empty() || spec.date.is_some() || spec.label.is_some();
        let candidates: Vec<usize> = all
            .iter()
            .enumerate()
            .filter(|(_, lot)| lot.matches(spec))
            .map(|(index, _)| index)
            .collect();
        if candidates.is_empty() {
            return Err(InventoryError::NoMatch);
        }

        match method {
            BookingMethod::Strict => {
                if candidates.len() == 1 {
                    let lot = &mut all[candidates[0]];
                    if lot.remaining.cmp(quantity) == std::cmp::Ordering::Less {
                        return Err(InventoryError::MatchTooSmall);
                    }
                    lot.remaining = lot.remaining.sub(quantity);
                } else if selective {
                    return Err(InventoryError::AmbiguousMatch);
                } else {
                    // Without selectors a reduction must cancel the whole
                    // holding exactly.
                    let total = all
                        .iter()
                        .fold(Decimal::zero(), |sum, lot| sum.add(&lot.remaining));
                    if total != *quantity {
                        return Err(InventoryError::AmbiguousStrictBooking);
                    }
                    for lot in all.iter_mut() {
                        lot.remaining = Decimal::zero();
                    }
                }
            }
            BookingMethod::Fifo | BookingMethod::Lifo => {
                let mut order = candidates;
                // Stable sort keeps insertion order between equal dates.
                match method {
                    BookingMethod::Fifo => order.sort_by_key(|&i| all[i].date),
                    _ => order.sort_by_key(|&i| std::cmp::Reverse(all[i].date)),
                }
                let available = order
                    .iter()
                    .fold(Decimal::zero(), |sum, &i| sum.add(&all[i].remaining));
                if available.cmp(quantity) == std::cmp::Ordering::Less {
                    return Err(InventoryError::MatchTooSmall);
                }
                let mut left = *quantity;
                for index in order {
                    if left.is_zero() {
                        break;
                    }
                    let lot = &mut all[index];
                    let take = lot.remaining.min(left);
                    lot.remaining = lot.remaining.sub(&take);
                    left = left.sub(&take);
                }
            }
        }

        all.retain(|lot| !lot.remaining.is_zero());
        if all.is_empty() {
            lots.remove(currency);
        }
        Ok(())
    }

    /// Roll up to per-currency totals.
    pub fn aggregate_by_currency(&self) -> Summary {
        let mut summary = Summary::default();
        match self {
            Inventory::Plain(balances) => {
                for (currency, balance) in balances {
                    summary.add_units(currency, balance);
                }
            }
            Inventory::Booked { lots, .. } => {
                for (currency, lots) in lots {
                    for lot in lots {
                        summary.add_units(currency, &lot.remaining);
                        if !lot.cost_currency.is_empty() {
                            let cost = lot.remaining.mul(&lot.cost_amount);
                            summary.add_cost(currency, &lot.cost_currency, &cost);
                        }
                    }
                }
            }
        }
        summary
    }

    /// Merge another inventory's aggregate into a summary of this one.
    pub fn merge(&self, other: &Inventory) -> Summary {
        let mut summary = self.aggregate_by_currency();
        summary.merge(&other.aggregate_by_currency());
        summary
    }
}
