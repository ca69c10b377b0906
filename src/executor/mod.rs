//! Statement execution module
//!
//! This module contains the CRUD engine and the SQL it renders.

pub mod engine;
pub mod statement;

pub use engine::{Engine, EngineConfig};
