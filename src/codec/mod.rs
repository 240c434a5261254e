//! Transport encodings for a single trade record.
//!
//! - `binary`: compact self-describing payload stored under one key in the
//!   remote backend.
//! - `text`: delimited row cells for the file backend.

pub mod binary;
pub mod text;

pub use binary::{decode_record, encode_record};
pub use text::{decode_row, encode_row, parse_cell};
