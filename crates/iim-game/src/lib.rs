// ─────────────────────────────────────────────────────────────────────
// Mean-Field IIM — Competitive Influence Game
// (C) 2026 Mean-Field IIM contributors. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
#![deny(unsafe_code)]
//! Two opposing agents spend fixed field budgets on the nodes of a
//! mean-field Ising network, each following the susceptibility
//! gradient of total magnetisation under an L1 budget, until both
//! allocations stop moving.
//!
//! Architecture:
//!   - AgentUpdater: projected SGD / SGD-with-momentum step per agent
//!   - MomentumBuffer: explicit per-run momentum sequence
//!   - MfIsingSystem: bilevel orchestrator (update → re-solve → check)
//!
//! # Invariants
//!
//! 1. Every allocation in either history has L1 norm within its budget.
//! 2. Every recorded magnetisation lies in [-1, 1]^N.
//! 3. Run state (histories, momentum, log) belongs to one `run_game`
//!    call and is reset by the next.

pub mod agent;
pub mod game;

pub use agent::{AgentRole, AgentUpdater, MomentumBuffer};
pub use game::{GameOutcome, GameStepLog, MfIsingSystem};
