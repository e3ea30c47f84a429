#![allow(clippy::needless_return, clippy::explicit_auto_deref, clippy::redundant_field_names, clippy::too_many_arguments)]

// interface and cellfs are public because otherwise there isn't a great
// way to 'use' them for benchmarking.
pub mod interface;
pub mod cellfs;
#[cfg(test)]
mod tests;
