//! Store filter expressions and paging

use crate::record::Record;
use serde::{Deserialize, Serialize};

/// One condition on a named field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Condition {
    Equal { field: String, value: String },
    In { field: String, values: Vec<String> },
}

impl Condition {
    fn matches<R: Record>(&self, record: &R) -> bool {
        match self {
            Condition::Equal { field, value } => record
                .field(field)
                .is_some_and(|actual| actual.as_ref() == value),
            Condition::In { field, values } => record
                .field(field)
                .is_some_and(|actual| values.iter().any(|v| v == actual.as_ref())),
        }
    }
}

/// Conjunction of conditions. An empty expression matches every row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expression {
    pub rules: Vec<Condition>,
}

impl Expression {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn equal(mut self, field: impl Into<String>, value: impl ToString) -> Self {
        self.rules.push(Condition::Equal {
            field: field.into(),
            value: value.to_string(),
        });
        self
    }

    pub fn is_in<I, S>(mut self, field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: ToString,
    {
        self.rules.push(Condition::In {
            field: field.into(),
            values: values.into_iter().map(|v| v.to_string()).collect(),
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn matches<R: Record>(&self, record: &R) -> bool {
        self.rules.iter().all(|c| c.matches(record))
    }
}

/// Offset page request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub start: usize,
    pub limit: usize,
}

impl Page {
    pub fn new(start: usize, limit: usize) -> Self {
        Self { start, limit }
    }

    pub fn first(limit: usize) -> Self {
        Self { start: 0, limit }
    }

    pub fn next_page(&self) -> Self {
        Self {
            start: self.start + self.limit,
            limit: self.limit,
        }
    }
}

/// One page of rows and the total number of matches
#[derive(Debug, Clone, PartialEq)]
pub struct ListResult<R> {
    pub details: Vec<R>,
    pub count: usize,
}
