// ─────────────────────────────────────────────────────────────────────
// Mean-Field IIM — Kernel Types
// (C) 2026 Mean-Field IIM contributors. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
#![deny(unsafe_code)]
//! Configuration and error hierarchy for the mean-field Ising
//! influence-maximisation (IIM) kernel.

pub mod config;
pub mod error;

pub use config::{IimConfig, InitMag, OptimiserType, SteffensenUpdate};
pub use error::{IimError, IimResult};
