//! citysim-core — city economic baselines, multi-stage policy snapshots and
//! the trajectory engine that projects them term by term.

pub mod analysis;
pub mod city;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod fixtures;
pub mod health;
pub mod parameter;
pub mod rng;
pub mod snapshot;
pub mod stage;
pub mod store;
pub mod trajectory;
pub mod types;
