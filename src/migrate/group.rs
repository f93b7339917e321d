//! Partitioning of a collection snapshot by group key.

use std::collections::HashMap;

use serde_json::{Number, Value};

use crate::types::{Document, Fields};

/// Records sharing one group-key value, in scan order.
#[derive(Clone, Debug, PartialEq)]
pub struct Bucket {
    /// Group-key value.
    pub key: String,
    /// Member records.
    pub documents: Vec<Document>,
}

impl Bucket {
    /// Number of records in the bucket.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// True when the bucket holds no record.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// Output of [`group_documents`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Grouping {
    /// Buckets in first-seen order.
    pub buckets: Vec<Bucket>,
    /// Ids of records without a usable group key, in scan order.
    pub skipped: Vec<String>,
    /// Records examined.
    pub total: usize,
}

impl Grouping {
    /// Records routed into some bucket.
    pub fn routed(&self) -> usize {
        self.buckets.iter().map(Bucket::len).sum()
    }

    /// Bucket for `key`, if any record carried it.
    pub fn bucket(&self, key: &str) -> Option<&Bucket> {
        self.buckets.iter().find(|b| b.key == key)
    }
}

/// Group-key value of `fields`, or `None` when the key is missing or empty.
///
/// Strings are used verbatim and numbers by their shortest decimal rendering,
/// so `1` and `1.0` select the same bucket. `null`, the empty string and any
/// other JSON type count as missing.
pub fn group_key_of(fields: &Fields, group_key: &str) -> Option<String> {
    match fields.get(group_key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(render_number(n)),
        _ => None,
    }
}

// Largest magnitude below which every whole f64 is an exact integer.
const EXACT_INT_LIMIT: f64 = 9_007_199_254_740_992.0;

fn render_number(n: &Number) -> String {
    if n.is_f64() {
        if let Some(f) = n.as_f64().filter(|f| f.fract() == 0.0 && f.abs() < EXACT_INT_LIMIT) {
            return (f as i64).to_string();
        }
    }
    n.to_string()
}

/// Partitions `docs` into buckets keyed by `group_key`.
pub fn group_documents(docs: Vec<Document>, group_key: &str) -> Grouping {
    let mut grouping = Grouping {
        total: docs.len(),
        ..Grouping::default()
    };
    let mut index: HashMap<String, usize> = HashMap::new();
    for doc in docs {
        let Some(key) = group_key_of(&doc.fields, group_key) else {
            grouping.skipped.push(doc.id);
            continue;
        };
        let slot = *index.entry(key.clone()).or_insert_with(|| {
            grouping.buckets.push(Bucket {
                key,
                documents: Vec::new(),
            });
            grouping.buckets.len() - 1
        });
        grouping.buckets[slot].documents.push(doc);
    }
    grouping
}
