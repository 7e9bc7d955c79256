//! The transaction-balancing solver.
//!
//! Every posting contributes a triple (coefficient, number, currency) whose
//! components are literals or variables: a plain posting is `(1, amount,
//! currency)`, a priced posting `(price, amount, price-currency)`, a cost
//! posting `(cost, amount, cost-currency)`. For every currency the sum of
//! `coefficient * number` must vanish.
//!
//! Rather than Gaussian elimination the solver enumerates: currency
//! variables range over the currencies that appear literally in the same
//! transaction, and within each candidate assignment a currency group with
//! one unknown solves directly. Transactions are tiny, the caps below are
//! generous, and enumeration pinpoints exactly which group failed.

use crate::number::Decimal;
use crate::report::{Diagnostic, ErrorKind};
use crate::syntax::ast::{Data, EntryPayload};
use crate::syntax::token::Token;

/// Most distinct currencies one transaction may mention.
pub const MAX_CURRENCIES: usize = 8;
/// Most unknown numbers one transaction may carry.
pub const MAX_NUMBER_VARS: usize = 8;
/// Most unknown currencies one transaction may carry.
pub const MAX_CURRENCY_VARS: usize = 8;

/// Which field of a posting a variable resolves into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Units,
    Price,
}

/// An unknown number: posting index plus target field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct NumberSlot {
    posting: usize,
    field: Field,
}

/// An unknown currency: posting index, target field, and its digit in the
/// enumeration counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CurrencySlot {
    posting: usize,
    field: Field,
    digit: usize,
}

#[derive(Debug, Clone, Copy)]
enum Value {
    Lit(Decimal),
    Var(NumberSlot),
}

#[derive(Debug, Clone)]
enum CurrencyRef {
    Lit(String),
    Var(usize),
}

/// One posting's contribution to the balance.
#[derive(Debug, Clone)]
struct Triple {
    coefficient: Value,
    number: Value,
    currency: CurrencyRef,
}

/// A per-currency accumulator: the literal part and at most one variable
/// term `coefficient * var`.
#[derive(Debug, Clone)]
struct Group {
    currency: String,
    constant: Decimal,
    var: Option<(NumberSlot, Decimal)>,
}

/// One way to complete the transaction.
#[derive(Debug, Clone, PartialEq)]
struct Solution {
    numbers: Vec<(usize, Field, Decimal)>,
    currencies: Vec<(usize, Field, String)>,
}

/// Run the solver over every transaction in a file, writing resolved
/// amounts back into the postings and appending diagnostics.
pub fn solve_all(data: &mut Data) {
    for index in 0..data.entries.len() {
        solve_transaction(data, index);
    }
}

/// Balance one transaction entry. Non-transactions are ignored.
pub fn solve_transaction(data: &mut Data, entry_index: usize) {
    let entry = &data.entries[entry_index];
    let main_token = entry.main_token;
    let range = match &entry.payload {
        EntryPayload::Transaction(tx) => tx.postings.clone(),
        _ => return,
    };
    let start = range.start as usize;
    let end = range.end as usize;
    if start == end {
        return;
    }

    // ------------------------------------------------------------------
    // Build triples and collect the literal currency universe.
    // ------------------------------------------------------------------
    let mut currencies: Vec<String> = Vec::new();
    let mut collect = |currency: &Option<String>, out: &mut Vec<String>| {
        if let Some(name) = currency {
            if !out.iter().any(|c| c == name) {
                out.push(name.clone());
            }
        }
    };
    for posting in &data.postings[start..end] {
        collect(&posting.amount.currency, &mut currencies);
        if let Some(lot) = &posting.lot {
            collect(&lot.cost.currency, &mut currencies);
        }
        if let Some(price) = &posting.price {
            collect(&price.amount.currency, &mut currencies);
        }
    }
    if currencies.len() > MAX_CURRENCIES {
        data.diagnostics
            .push(Diagnostic::new(ErrorKind::TxTooManyVariables, main_token));
        return;
    }

    let mut triples: Vec<Triple> = Vec::with_capacity(end - start);
    let mut number_vars = 0usize;
    let mut currency_digits = 0usize;
    let mut currency_slots: Vec<CurrencySlot> = Vec::new();
    let mut warnings: Vec<Diagnostic> = Vec::new();

    for (offset, posting) in data.postings[start..end].iter().enumerate() {
        let units = match posting.amount.number {
            Some(number) => Value::Lit(number),
            None => {
                number_vars += 1;
                Value::Var(NumberSlot {
                    posting: offset,
                    field: Field::Units,
                })
            }
        };

        let cost = posting.lot.as_ref().filter(|lot| lot.cost.is_complete());
        if let Some(lot) = cost {
            // Weight at cost. Without an explicit price annotation this is
            // the inferred price the warning points at.
            if posting.price.is_none() {
                warnings.push(Diagnostic::new(ErrorKind::InferredPrice, posting.account));
            }
            let cost_number = lot.cost.number.expect("cost is complete");
            let cost_currency = lot.cost.currency.clone().expect("cost is complete");
            let triple = if lot.total {
                let sign = match posting.amount.number {
                    Some(number) if number.is_negative() => Decimal::from_int(-1),
                    _ => Decimal::from_int(1),
                };
                Triple {
                    coefficient: Value::Lit(sign),
                    number: Value::Lit(cost_number),
                    currency: CurrencyRef::Lit(cost_currency),
                }
            } else {
                Triple {
                    coefficient: Value::Lit(cost_number),
                    number: units,
                    currency: CurrencyRef::Lit(cost_currency),
                }
            };
            triples.push(triple);
            continue;
        }

        if let Some(price) = &posting.price {
            if posting.amount.currency.is_none() {
                data.diagnostics.push(Diagnostic::new(
                    ErrorKind::CannotInferAmountCurrencyWhenPriceSet,
                    posting.account,
                ));
                return;
            }
            let price_number = match price.amount.number {
                Some(number) => Value::Lit(number),
                None => {
                    number_vars += 1;
                    Value::Var(NumberSlot {
                        posting: offset,
                        field: Field::Price,
                    })
                }
            };
            let currency = match &price.amount.currency {
                Some(name) => CurrencyRef::Lit(name.clone()),
                None => {
                    let slot = CurrencySlot {
                        posting: offset,
                        field: Field::Price,
                        digit: currency_digits,
                    };
                    currency_digits += 1;
                    currency_slots.push(slot);
                    CurrencyRef::Var(slot.digit)
                }
            };
            let triple = if price.total {
                let sign = match posting.amount.number {
                    Some(number) if number.is_negative() => Decimal::from_int(-1),
                    _ => Decimal::from_int(1),
                };
                Triple {
                    coefficient: Value::Lit(sign),
                    number: price_number,
                    currency,
                }
            } else {
                Triple {
                    coefficient: price_number,
                    number: units,
                    currency,
                }
            };
            triples.push(triple);
            continue;
        }

        let currency = match &posting.amount.currency {
            Some(name) => CurrencyRef::Lit(name.clone()),
            None => {
                let slot = CurrencySlot {
                    posting: offset,
                    field: Field::Units,
                    digit: currency_digits,
                };
                currency_digits += 1;
                currency_slots.push(slot);
                CurrencyRef::Var(slot.digit)
            }
        };
        triples.push(Triple {
            coefficient: Value::Lit(Decimal::from_int(1)),
            number: units,
            currency,
        });
    }

    if number_vars > MAX_NUMBER_VARS || currency_digits > MAX_CURRENCY_VARS {
        data.diagnostics
            .push(Diagnostic::new(ErrorKind::TxTooManyVariables, main_token));
        return;
    }
    if currency_digits > 0 && currencies.is_empty() {
        data.diagnostics
            .push(Diagnostic::new(ErrorKind::TxBalanceNoCurrency, main_token));
        return;
    }

    // ------------------------------------------------------------------
    // Enumerate currency assignments; solve each one.
    // ------------------------------------------------------------------
    let assignment_count = if currency_digits == 0 {
        1
    } else {
        currencies.len().pow(currency_digits as u32)
    };
    let mut assignment: Vec<usize> = vec![0; currency_digits];
    let mut groups: Vec<Group> = Vec::new();
    let mut solutions: Vec<Solution> = Vec::new();
    let mut single_failures: Vec<Diagnostic> = Vec::new();

    for counter in 0..assignment_count {
        // Decode the base-|currencies| counter into digits.
        let mut rest = counter;
        for digit in assignment.iter_mut() {
            *digit = rest % currencies.len().max(1);
            rest /= currencies.len().max(1);
        }

        groups.clear();
        let mut failed = false;
        let mut failures: Vec<Diagnostic> = Vec::new();

        for triple in &triples {
            let currency = match &triple.currency {
                CurrencyRef::Lit(name) => name.clone(),
                CurrencyRef::Var(digit) => currencies[assignment[*digit]].clone(),
            };
            let index = match groups.iter().position(|g| g.currency == currency) {
                Some(index) => index,
                None => {
                    groups.push(Group {
                        currency,
                        constant: Decimal::zero(),
                        var: None,
                    });
                    groups.len() - 1
                }
            };
            let group = &mut groups[index];
            match (triple.coefficient, triple.number) {
                (Value::Lit(coefficient), Value::Lit(number)) => {
                    group.constant = group.constant.add(&coefficient.mul(&number));
                }
                (Value::Lit(coefficient), Value::Var(slot))
                | (Value::Var(slot), Value::Lit(coefficient)) => {
                    if group.var.is_some() {
                        failures.push(Diagnostic::new(ErrorKind::TxTooManyVariables, main_token));
                        failed = true;
                        break;
                    }
                    group.var = Some((slot, coefficient));
                }
                (Value::Var(_), Value::Var(_)) => {
                    failures.push(Diagnostic::new(ErrorKind::TxTooManyVariables, main_token));
                    failed = true;
                    break;
                }
            }
        }

        let mut numbers: Vec<(usize, Field, Decimal)> = Vec::new();
        if !failed {
            for group in &groups {
                match &group.var {
                    Some((slot, coefficient)) => {
                        if coefficient.is_zero() {
                            failures.push(Diagnostic::new(ErrorKind::TxDivisionByZero, main_token));
                            failed = true;
                            continue;
                        }
                        let value = match group.constant.neg().div(coefficient) {
                            Ok(value) => value,
                            Err(_) => {
                                failures
                                    .push(Diagnostic::new(ErrorKind::TxDivisionByZero, main_token));
                                failed = true;
                                continue;
                            }
                        };
                        numbers.push((slot.posting, slot.field, value));
                    }
                    None => {
                        if !group.constant.is_within_tolerance(&Decimal::zero()) {
                            failures.push(Diagnostic::new(
                                ErrorKind::TxDoesNotBalance {
                                    sum: group.constant,
                                    currency: group.currency.clone(),
                                },
                                main_token,
                            ));
                            failed = true;
                        }
                    }
                }
            }
        }

        if failed {
            if assignment_count == 1 {
                single_failures = failures;
            }
            continue;
        }

        let solution = Solution {
            numbers,
            currencies: currency_slots
                .iter()
                .map(|slot| (slot.posting, slot.field, currencies[assignment[slot.digit]].clone()))
                .collect(),
        };
        if !solutions.contains(&solution) {
            solutions.push(solution);
        }
    }

    // ------------------------------------------------------------------
    // Report or write back.
    // ------------------------------------------------------------------
    match solutions.len() {
        0 => {
            if assignment_count == 1 {
                data.diagnostics.extend(single_failures);
            } else {
                data.diagnostics
                    .push(Diagnostic::new(ErrorKind::TxNoSolution, main_token));
            }
        }
        1 => {
            let solution = solutions.remove(0);
            apply_solution(data, start, end, &solution, main_token);
            data.diagnostics.extend(warnings);
        }
        _ => {
            data.diagnostics
                .push(Diagnostic::new(ErrorKind::TxMultipleSolutions, main_token));
        }
    }
}

/// Write a solution's numbers and currencies into the postings, then check
/// nothing stayed unresolved.
fn apply_solution(data: &mut Data, start: usize, end: usize, solution: &Solution, main_token: Token) {
    for (offset, field, value) in &solution.numbers {
        let posting = &mut data.postings[start + offset];
        match field {
            Field::Units => posting.amount.number = Some(*value),
            Field::Price => {
                if let Some(price) = posting.price.as_mut() {
                    price.amount.number = Some(*value);
                }
            }
        }
    }
    for (offset, field, currency) in &solution.currencies {
        let posting = &mut data.postings[start + offset];
        match field {
            Field::Units => posting.amount.currency = Some(currency.clone()),
            Field::Price => {
                if let Some(price) = posting.price.as_mut() {
                    price.amount.currency = Some(currency.clone());
                }
            }
        }
    }
    // A units number can stay open when only a total price tied it down.
    for posting in data.postings[start..end].iter() {
        if posting.amount.number.is_none() {
            data.diagnostics
                .push(Diagnostic::new(ErrorKind::TxNoSolution, main_token));
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use indoc::indoc;

    use super::*;
    use crate::syntax::ast::Amount;
    use crate::syntax::parser::parse;

    fn solved(source: &str) -> Data {
        let mut bytes = source.as_bytes().to_vec();
        bytes.push(0);
        let mut data = parse(Arc::new(bytes), true);
        assert!(data.diagnostics.is_empty(), "parse: {:?}", data.diagnostics);
        solve_all(&mut data);
        data
    }

    fn dec(text: &str) -> Decimal {
        Decimal::parse(text).unwrap()
    }

    fn tx_postings(data: &Data) -> &[crate::syntax::ast::Posting] {
        match &data.entries[0].payload {
            EntryPayload::Transaction(tx) => data.postings_of(tx),
            other => panic!("expected transaction, got {other:?}"),
        }
    }

    #[test]
    fn test_fills_missing_amount() {
        let data = solved(indoc! {r#"
            2020-01-01 *
              Assets:A 10 USD
              Assets:B
        "#});
        assert!(data.diagnostics.is_empty(), "{:?}", data.diagnostics);
        let postings = tx_postings(&data);
        assert_eq!(postings[1].amount, Amount::new(dec("-10"), "USD"));
    }

    #[test]
    fn test_balanced_two_currencies_via_price() {
        let data = solved(indoc! {r#"
            2020-01-01 *
              Assets:A 10.00 CHF @ 1.10 USD
              Assets:B -11.00 USD
        "#});
        assert!(data.diagnostics.is_empty(), "{:?}", data.diagnostics);
    }

    #[test]
    fn test_does_not_balance_reports_both_currencies() {
        let data = solved(indoc! {r#"
            2020-01-01 *
              Assets:A 5 EUR
              Assets:B -5 USD
        "#});
        let kinds: Vec<_> = data
            .diagnostics
            .iter()
            .map(|d| match &d.kind {
                ErrorKind::TxDoesNotBalance { currency, .. } => currency.clone(),
                other => panic!("unexpected diagnostic {other:?}"),
            })
            .collect();
        assert_eq!(kinds, vec!["EUR".to_string(), "USD".to_string()]);
    }

    #[test]
    fn test_missing_price_solved() {
        let data = solved(indoc! {r#"
            2020-01-01 *
              Assets:A 10.00 CHF @ USD
              Assets:B -11.00 USD
        "#});
        assert!(data.diagnostics.is_empty(), "{:?}", data.diagnostics);
        let postings = tx_postings(&data);
        let price = postings[0].price.as_ref().unwrap();
        assert_eq!(price.amount.number, Some(dec("1.10")));
    }

    #[test]
    fn test_missing_currency_inferred() {
        let data = solved(indoc! {r#"
            2020-01-01 *
              Assets:A 10 USD
              Assets:B -10
        "#});
        assert!(data.diagnostics.is_empty(), "{:?}", data.diagnostics);
        let postings = tx_postings(&data);
        assert_eq!(postings[1].amount.currency.as_deref(), Some("USD"));
    }

    #[test]
    fn test_total_price() {
        let data = solved(indoc! {r#"
            2020-01-01 *
              Assets:A -10.00 CHF @@ 11.00 USD
              Assets:B 11.00 USD
        "#});
        assert!(data.diagnostics.is_empty(), "{:?}", data.diagnostics);
    }

    #[test]
    fn test_cost_weight_and_inferred_price_warning() {
        let data = solved(indoc! {r#"
            2020-01-01 *
              Assets:Broker 10 AAPL {2.00 USD}
              Assets:Cash -20.00 USD
        "#});
        let kinds: Vec<_> = data.diagnostics.iter().map(|d| d.kind.clone()).collect();
        assert_eq!(kinds, vec![ErrorKind::InferredPrice]);
    }

    #[test]
    fn test_no_solution() {
        let data = solved(indoc! {r#"
            2020-01-01 *
              Assets:A 10 USD
              Assets:B -5 EUR
              Assets:C
        "#});
        let kinds: Vec<_> = data.diagnostics.iter().map(|d| d.kind.clone()).collect();
        assert_eq!(kinds, vec![ErrorKind::TxNoSolution]);
    }

    #[test]
    fn test_multiple_solutions() {
        let data = solved(indoc! {r#"
            2020-01-01 *
              Assets:A 10 USD
              Assets:B -10 USD
              Assets:C 5 EUR
              Assets:D -5 EUR
              Assets:E
        "#});
        let kinds: Vec<_> = data.diagnostics.iter().map(|d| d.kind.clone()).collect();
        assert_eq!(kinds, vec![ErrorKind::TxMultipleSolutions]);
    }

    #[test]
    fn test_two_unknowns_in_one_group() {
        let data = solved(indoc! {r#"
            2020-01-01 *
              Assets:A USD
              Assets:B USD
        "#});
        let kinds: Vec<_> = data.diagnostics.iter().map(|d| d.kind.clone()).collect();
        assert_eq!(kinds, vec![ErrorKind::TxTooManyVariables]);
    }

    #[test]
    fn test_cannot_infer_amount_currency_with_price() {
        let data = solved(indoc! {r#"
            2020-01-01 *
              Assets:A 10 @ 1.10 USD
              Assets:B -11.00 USD
        "#});
        let kinds: Vec<_> = data.diagnostics.iter().map(|d| d.kind.clone()).collect();
        assert_eq!(kinds, vec![ErrorKind::CannotInferAmountCurrencyWhenPriceSet]);
    }

    #[test]
    fn test_no_currency_at_all() {
        let data = solved(indoc! {r#"
            2020-01-01 *
              Assets:A
              Assets:B
        "#});
        let kinds: Vec<_> = data.diagnostics.iter().map(|d| d.kind.clone()).collect();
        assert_eq!(kinds, vec![ErrorKind::TxBalanceNoCurrency]);
    }

    #[test]
    fn test_balances_within_tolerance() {
        // One ulp of the sum's precision is allowed.
        let data = solved(indoc! {r#"
            2020-01-01 *
              Assets:A 10.01 USD
              Assets:B -10.02 USD
        "#});
        assert!(data.diagnostics.is_empty(), "{:?}", data.diagnostics);
    }
}
