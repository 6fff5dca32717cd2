// src/processors/mod.rs
pub mod resp_time;

pub use resp_time::RespTimeFilter;
