//! Batch to columnar table conversion
//!
//! Every column of the produced table is a nullable `Utf8` column, whatever
//! the kinds observed for that field. A batch can therefore always be written,
//! no matter how much its documents disagree on a field's type.

use crate::domain::{RecordValue, Result};
use arrow::array::{ArrayRef, RecordBatch, RecordBatchOptions, StringBuilder};
use arrow::datatypes::{DataType, Field, Schema};
use bson::Document;
use std::collections::HashSet;
use std::sync::Arc;

/// Union of field names across the batch, in first-seen order
pub fn column_order(docs: &[Document]) -> Vec<String> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut columns = Vec::new();
    for doc in docs {
        for key in doc.keys() {
            if seen.insert(key.as_str()) {
                columns.push(key.clone());
            }
        }
    }
    columns
}

/// Converts one batch of documents into a rectangular table
///
/// Absent fields and explicit nulls become nulls; every other value is
/// rendered through [`RecordValue::render`].
///
/// # Errors
///
/// Only fails if Arrow rejects the assembled arrays, which cannot happen for
/// builders of equal length.
pub fn normalize_batch(docs: &[Document]) -> Result<RecordBatch> {
    let columns = column_order(docs);

    let mut builders: Vec<StringBuilder> = columns
        .iter()
        .map(|_| StringBuilder::with_capacity(docs.len(), docs.len() * 16))
        .collect();

    for doc in docs {
        for (name, builder) in columns.iter().zip(builders.iter_mut()) {
            match doc.get(name).map(RecordValue::from).and_then(|v| v.render()) {
                Some(text) => builder.append_value(text),
                None => builder.append_null(),
            }
        }
    }

    let schema = Arc::new(Schema::new(
        columns
            .iter()
            .map(|name| Field::new(name, DataType::Utf8, true))
            .collect::<Vec<_>>(),
    ));
    let arrays: Vec<ArrayRef> = builders
        .into_iter()
        .map(|mut b| Arc::new(b.finish()) as ArrayRef)
        .collect();

    let options = RecordBatchOptions::new().with_row_count(Some(docs.len()));
    Ok(RecordBatch::try_new_with_options(schema, arrays, &options)?)
}
