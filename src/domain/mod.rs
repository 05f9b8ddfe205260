//! Core domain types and logic.

pub mod bar;
pub mod condition;
pub mod condition_parser;
pub mod condition_eval;
pub mod indicator;
pub mod macro_context;
pub mod risk;
pub mod simulator;
pub mod signal_locator;
pub mod backtest;
pub mod strategy;
pub mod signal;
pub mod scan;
pub mod config_validation;
pub mod error;
