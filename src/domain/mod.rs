//! Core domain types and logic.

pub mod ohlcv;
pub mod condition;
pub mod indicator;
pub mod evaluator;
pub mod scanner;
pub mod error;
