// src/connectors/mod.rs
pub mod coincheck;
pub mod messages;
pub mod traits;
