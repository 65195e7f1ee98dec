//! Transaction filter builder for constructing dynamic SQL queries
//!
//! This module provides a builder pattern for constructing WHERE clauses
//! and related SQL components for transaction queries. Every condition
//! composes with AND; the owner condition is always present.

use chrono::NaiveDate;

use crate::models::TransactionType;

/// Builder for constructing transaction query filters
///
/// The lifetime `'query` represents how long the filter parameters
/// (category and bank names) must remain valid.
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter<'query> {
    pub account_id: Option<i64>,
    /// Inclusive range of calendar dates (UTC)
    pub date_range: Option<(NaiveDate, NaiveDate)>,
    pub transaction_type: Option<TransactionType>,
    pub category: Option<&'query str>,
    pub bank: Option<&'query str>,
    pub limit: Option<i64>,
}

/// Result of building a filter - contains SQL components and parameters
pub struct FilterResult {
    /// WHERE clause including "WHERE" keyword
    pub where_clause: String,
    /// ORDER BY clause including "ORDER BY" keyword
    pub order_clause: String,
    /// LIMIT clause, empty when unbounded
    pub limit_clause: String,
    /// Parameters for the query (boxed for rusqlite compatibility)
    pub params: Vec<Box<dyn rusqlite::ToSql>>,
}

impl<'query> TransactionFilter<'query> {
    /// Create a new filter builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set account_id filter
    pub fn account_id(mut self, id: Option<i64>) -> Self {
        self.account_id = id;
        self
    }

    /// Set date range filter
    pub fn date_range(mut self, range: Option<(NaiveDate, NaiveDate)>) -> Self {
        self.date_range = range;
        self
    }

    /// Set exact type filter
    pub fn transaction_type(mut self, kind: Option<TransactionType>) -> Self {
        self.transaction_type = kind;
        self
    }

    /// Set exact category filter
    pub fn category(mut self, category: Option<&'query str>) -> Self {
        self.category = category;
        self
    }

    /// Set exact bank filter
    pub fn bank(mut self, bank: Option<&'query str>) -> Self {
        self.bank = bank;
        self
    }

    pub fn limit(mut self, limit: Option<i64>) -> Self {
        self.limit = limit;
        self
    }

    /// Build the filter components for one owner
    pub fn build(&self, owner: i64) -> FilterResult {
        let mut conditions = vec!["t.user_id = ?".to_string()];
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(owner)];

        // Account filter
        if let Some(aid) = self.account_id {
            conditions.push("t.account_id = ?".to_string());
            params.push(Box::new(aid));
        }

        // Date range filter on the stored instant's calendar date
        if let Some((from_date, to_date)) = self.date_range {
            conditions.push("substr(t.date, 1, 10) >= ? AND substr(t.date, 1, 10) <= ?".to_string());
            params.push(Box::new(from_date.format("%Y-%m-%d").to_string()));
            params.push(Box::new(to_date.format("%Y-%m-%d").to_string()));
        }

        if let Some(kind) = &self.transaction_type {
            conditions.push("t.type = ?".to_string());
            params.push(Box::new(kind.as_str().to_string()));
        }

        if let Some(category) = self.category {
            conditions.push("t.category = ?".to_string());
            params.push(Box::new(category.to_string()));
        }

        if let Some(bank) = self.bank {
            conditions.push("t.bank = ?".to_string());
            params.push(Box::new(bank.to_string()));
        }

        let limit_clause = match self.limit {
            Some(n) if n > 0 => {
                params.push(Box::new(n));
                "LIMIT ?".to_string()
            }
            _ => String::new(),
        };

        FilterResult {
            where_clause: format!("WHERE {}", conditions.join(" AND ")),
            order_clause: "ORDER BY t.date DESC, t.id DESC".to_string(),
            limit_clause,
            params,
        }
    }
}

impl FilterResult {
    /// Build a COUNT query
    pub fn build_count_query(&self) -> String {
        format!("SELECT COUNT(*) FROM transactions t {}", self.where_clause)
    }

    /// Get parameter references for query execution
    pub fn params_refs(&self) -> Vec<&dyn rusqlite::ToSql> {
        self.params.iter().map(|p| p.as_ref()).collect()
    }
}
