//! Declarative, idempotent task orchestration engine.
//!
//! A YAML document declares named scripts, each an ordered list of typed
//! tasks (`cmd.run`, `file.managed`, `win_reg.*`,
//! `realvnc_server.config_update`). Scripts are ordered by their declared
//! requirements and every task is reconciled against the live system
//! through a chain of skip gates, so re-running an unchanged document
//! changes nothing.
//!
//! The public API is organised into layers:
//!
//! - **[`config`]**: run settings and the script document loader
//! - **[`tasks`]**: raw values, the field tracker, the declarative mapper and task kinds
//! - **[`resources`]**: idempotent primitives (checksums, downloads, encodings, attributes, registry)
//! - **[`executors`]**: per-kind executors behind a router
//! - **[`commands`]**: scheduler, orchestrator, run summary and subcommands
#![deny(clippy::or_fun_call)]
#![deny(clippy::bool_to_int_with_if)]

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod exec;
pub mod executors;
pub mod logging;
pub mod platform;
pub mod resources;
pub mod tasks;
