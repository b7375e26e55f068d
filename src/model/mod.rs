//! Core data model types: the date filter and the exported CSV row.

pub mod range;
pub mod record;
