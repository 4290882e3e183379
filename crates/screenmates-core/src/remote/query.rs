use std::cmp::Ordering;

use super::record::{FieldValue, Record};

/// Filter over record fields.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    All,
    Eq(String, FieldValue),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
}

impl Predicate {
    pub fn eq(field: &str, value: impl Into<FieldValue>) -> Self {
        Predicate::Eq(field.to_string(), value.into())
    }

    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Predicate::All => true,
            Predicate::Eq(field, value) => record.get(field) == Some(value),
            Predicate::And(preds) => preds.iter().all(|p| p.matches(record)),
            Predicate::Or(preds) => preds.iter().any(|p| p.matches(record)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortDescriptor {
    pub field: String,
    pub ascending: bool,
}

impl SortDescriptor {
    pub fn descending(field: &str) -> Self {
        Self {
            field: field.to_string(),
            ascending: false,
        }
    }

    pub fn ascending(field: &str) -> Self {
        Self {
            field: field.to_string(),
            ascending: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub record_type: String,
    pub predicate: Predicate,
    pub sort: Vec<SortDescriptor>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new(record_type: &str, predicate: Predicate) -> Self {
        Self {
            record_type: record_type.to_string(),
            predicate,
            sort: Vec::new(),
            limit: None,
        }
    }

    pub fn sorted_by(mut self, sort: SortDescriptor) -> Self {
        self.sort.push(sort);
        self
    }

    pub fn limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    /// Order two records by this query's sort descriptors.
    /// Missing fields sort before present ones.
    pub fn compare(&self, a: &Record, b: &Record) -> Ordering {
        for sort in &self.sort {
            let ord = compare_fields(a.get(&sort.field), b.get(&sort.field));
            let ord = if sort.ascending { ord } else { ord.reverse() };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}

fn compare_fields(a: Option<&FieldValue>, b: Option<&FieldValue>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => match (a, b) {
            (FieldValue::Int(x), FieldValue::Int(y)) => x.cmp(y),
            (FieldValue::Text(x), FieldValue::Text(y)) => x.cmp(y),
            (FieldValue::Timestamp(x), FieldValue::Timestamp(y)) => x.cmp(y),
            _ => Ordering::Equal,
        },
    }
}
