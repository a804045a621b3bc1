//! Core domain types and logic.

pub mod calendar;
pub mod dataset;
pub mod error;
pub mod holdings;
pub mod issues;
pub mod simulator;
pub mod strategy;
