//! Usage: Library crate behind the `vehicle-console` binary.
//!
//! Layers: `auth` (provider flows), `domain` (persisted session), `api`
//! (downstream calls), `commands` (CLI orchestration), `infra`/`app`/`shared`
//! (configuration, storage, logging, cross-cutting helpers).

pub mod api;
pub mod app;
pub mod auth;
pub mod commands;
pub mod domain;
pub mod infra;
pub mod shared;
