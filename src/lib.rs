// Library exports for mapify

pub mod classify;
pub mod config;
pub mod csv_reader;
pub mod error;
pub mod filter;
pub mod kind;
pub mod legend;
pub mod model;
pub mod options;
pub mod palette;
pub mod scale;
pub mod session;
pub mod transform;
