//! Filter, sort and projection evaluation shared by the embedded
//! document-store backends.

use std::cmp::Ordering;

use serde_json::{Map, Value};

use strata_core::constants::INTERNAL_ID;
use strata_core::traits::{Document, Filter, FindQuery, SortOrder};

/// Does `document` satisfy `filter`?
///
/// A filter maps field names to either a literal (equality; a missing field
/// matches a `null` literal) or an operator object combining `$gt`, `$gte`,
/// `$lt`, `$lte`, `$ne`, `$in` and `$exists`.
pub fn matches(document: &Document, filter: &Filter) -> bool {
    filter.iter().all(|(field, condition)| {
        let actual = document.get(field);
        match condition {
            Value::Object(ops) if is_operator_object(ops) => {
                ops.iter().all(|(op, operand)| {
                    apply_operator(actual, op, operand)
                })
            }
            literal => actual.unwrap_or(&Value::Null) == literal,
        }
    })
}

fn is_operator_object(ops: &Map<String, Value>) -> bool {
    !ops.is_empty() && ops.keys().all(|k| k.starts_with('$'))
}

fn apply_operator(actual: Option<&Value>, op: &str, operand: &Value) -> bool {
    let present = actual.unwrap_or(&Value::Null);
    match op {
        "$ne" => present != operand,
        "$exists" => operand.as_bool() == Some(actual.is_some()),
        "$in" => operand
            .as_array()
            .is_some_and(|candidates| candidates.contains(present)),
        "$gt" => compare(present, operand) == Some(Ordering::Greater),
        "$gte" => matches!(
            compare(present, operand),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        "$lt" => compare(present, operand) == Some(Ordering::Less),
        "$lte" => matches!(
            compare(present, operand),
            Some(Ordering::Less | Ordering::Equal)
        ),
        _ => false,
    }
}

/// Order two values when comparable: numbers by magnitude, strings lexically.
fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => {
            let (a, b) = (a.as_f64()?, b.as_f64()?);
            a.partial_cmp(&b)
        }
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// Total order used for sorting result sets: null/missing, then booleans,
/// then numbers, then strings, then everything else.
fn sort_rank(value: Option<&Value>) -> u8 {
    match value.unwrap_or(&Value::Null) {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

fn sort_cmp(left: Option<&Value>, right: Option<&Value>) -> Ordering {
    let by_rank = sort_rank(left).cmp(&sort_rank(right));
    if by_rank != Ordering::Equal {
        return by_rank;
    }
    compare(left.unwrap_or(&Value::Null), right.unwrap_or(&Value::Null))
        .unwrap_or(Ordering::Equal)
}

/// Apply the sort, limit and projection of `query` to matching documents.
pub fn run_query(documents: impl Iterator<Item = Document>, query: &FindQuery) -> Vec<Document> {
    let mut results: Vec<Document> = documents
        .filter(|doc| matches(doc, &query.filter))
        .collect();

    if !query.sort.is_empty() {
        results.sort_by(|a, b| {
            for (field, order) in &query.sort {
                let ordering = sort_cmp(a.get(field), b.get(field));
                let ordering = match order {
                    SortOrder::Ascending => ordering,
                    SortOrder::Descending => ordering.reverse(),
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });
    }

    if let Some(limit) = query.limit {
        results.truncate(limit);
    }

    results.into_iter().map(|doc| project(doc, query)).collect()
}

/// Strip the internal id and apply an inclusion projection if present.
pub fn project(mut document: Document, query: &FindQuery) -> Document {
    document.remove(INTERNAL_ID);
    match &query.projection {
        None => document,
        Some(fields) => {
            let mut projected = Map::new();
            for field in fields {
                if let Some(value) = document.get(field) {
                    projected.insert(field.clone(), value.clone());
                }
            }
            projected
        }
    }
}
