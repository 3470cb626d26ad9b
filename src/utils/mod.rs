pub mod date_utils;

pub use date_utils::{format_local, same_or_between_dates};
