//! Email parsing: MBOX streaming parser, header decoding, and MIME body extraction.

pub mod header;
pub mod mbox;
pub mod mime;
