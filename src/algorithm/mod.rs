//! Algorithm implementations
//!
//! This module contains the matching engine and the outcome regression
//! models it uses to score covariate drops.

pub mod matching;
pub mod regression;
