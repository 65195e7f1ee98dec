//! Balance derivation
//!
//! Balances are never stored. An account's balance is its immutable starting
//! balance plus credits minus debits over every transaction linked to it, and
//! is recomputed from the transaction log on every read.
//!
//! Amounts are stored as decimal `f64` values. Sums are taken in integer cents
//! so repeated additions cannot drift, and equality checks on floats use a
//! one-cent tolerance.

use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub, SubAssign};

use crate::models::{Transaction, TransactionType};

/// Comparison tolerance for currency values
pub const TOLERANCE: f64 = 0.01;

/// Signed money amount in integer cents
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Cents(i64);

impl Cents {
    pub const ZERO: Cents = Cents(0);

    pub const fn new(cents: i64) -> Self {
        Self(cents)
    }

    /// Round a decimal amount to the nearest cent
    pub fn from_amount(amount: f64) -> Self {
        Self((amount * 100.0).round() as i64)
    }

    pub const fn cents(self) -> i64 {
        self.0
    }

    pub fn to_amount(self) -> f64 {
        self.0 as f64 / 100.0
    }
}

impl Add for Cents {
    type Output = Cents;

    fn add(self, rhs: Cents) -> Cents {
        Cents(self.0 + rhs.0)
    }
}

impl AddAssign for Cents {
    fn add_assign(&mut self, rhs: Cents) {
        self.0 += rhs.0;
    }
}

impl Sub for Cents {
    type Output = Cents;

    fn sub(self, rhs: Cents) -> Cents {
        Cents(self.0 - rhs.0)
    }
}

impl SubAssign for Cents {
    fn sub_assign(&mut self, rhs: Cents) {
        self.0 -= rhs.0;
    }
}

impl Sum for Cents {
    fn sum<I: Iterator<Item = Cents>>(iter: I) -> Cents {
        iter.fold(Cents::ZERO, Add::add)
    }
}

impl std::fmt::Display for Cents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

/// Signed effect of one transaction on its account
pub fn signed_effect(tx: &Transaction) -> Cents {
    let amount = Cents::from_amount(tx.amount);
    match tx.transaction_type {
        TransactionType::Credit => amount,
        TransactionType::Debit => Cents::ZERO - amount,
        TransactionType::Other(_) => Cents::ZERO,
    }
}

/// `starting_balance + Σcredits − Σdebits`
///
/// Callers pass only the transactions that belong to the account.
pub fn account_balance<'a, I>(starting_balance: f64, transactions: I) -> f64
where
    I: IntoIterator<Item = &'a Transaction>,
{
    let total = Cents::from_amount(starting_balance)
        + transactions.into_iter().map(signed_effect).sum::<Cents>();
    total.to_amount()
}

/// Whether two currency amounts are equal within a cent
pub fn amounts_match(a: f64, b: f64) -> bool {
    let tolerance = Cents::from_amount(TOLERANCE).cents();
    (Cents::from_amount(a) - Cents::from_amount(b)).cents().abs() <= tolerance
}
