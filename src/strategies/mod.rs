// src/strategies/mod.rs
pub mod grid;
pub mod traits;
