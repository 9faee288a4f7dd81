//! Command handlers

pub mod baselines;
pub mod config;
pub mod diff;
