//! Command handlers behind the clap surface in `main.rs`.
//!
//! Each handler prints its own text rendering and delegates the structured
//! formats (json/csv/md/xml) to [`crate::format`].

pub mod collection;
pub mod context;
pub mod document;
pub mod maintenance;
pub mod memory;
pub mod search;
pub mod status;

use serde_json::Value;

use crate::format::{render_record, render_records, OutputFormat};

/// Print records in the requested format; the closure renders text mode.
pub(crate) fn emit_records<F>(records: &[Value], format: OutputFormat, text: F)
where
    F: FnOnce(&[Value]),
{
    match render_records(records, format) {
        Some(rendered) => println!("{rendered}"),
        None => text(records),
    }
}

/// Print one record in the requested format; the closure renders text mode.
pub(crate) fn emit_record<F>(record: &Value, format: OutputFormat, text: F)
where
    F: FnOnce(&Value),
{
    match render_record(record, format) {
        Some(rendered) => println!("{rendered}"),
        None => text(record),
    }
}
