//! Export functionality: CSV output.

pub mod csv;
