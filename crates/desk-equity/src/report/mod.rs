//! Report rendering
//!
//! Every facade category is rendered as a titled text block,
//! `--- <title> ---\n<body>`, so the stages always receive the same shape
//! whether data was found or not.

mod format;
mod table;

pub use format::{NOT_AVAILABLE, ReportValue, format_block, group_thousands, unavailable};
pub use table::{Row, Table};
