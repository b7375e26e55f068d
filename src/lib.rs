//! `mbox2csv`: export an MBOX mail archive to CSV.
//!
//! This crate provides the core library for streaming MBOX files, decoding
//! message headers and dates, locating plain-text bodies, and writing one CSV
//! row per message within a date range.

pub mod config;
pub mod convert;
pub mod error;
pub mod export;
pub mod model;
pub mod parser;
