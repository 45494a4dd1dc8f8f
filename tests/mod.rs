//! Top-level test module for sqbc
//!
//! This file organizes all integration tests into categories.

mod cli;
mod engine;
mod helpers;
