//! # Vehicle Catalog
//!
//! Reconciles US vehicle make/model/trim data from three public providers
//! (CarQuery, NHTSA vPIC and the DOE fuel-economy menus) into one canonical
//! catalog stored in SQLite.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────────┐   ┌───────────┐
//! │   Sources    │──▶│     Pipeline     │──▶│  SQLite   │
//! │ DOE/CQ/vPIC  │   │ discover+validate│   │  catalog  │
//! └──────────────┘   │ upsert+retire    │   └───────────┘
//!                    └────────┬─────────┘
//!                             ▼
//!                      ┌────────────┐
//!                      │ CSV report │
//!                      │ (anomalies)│
//!                      └────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! vcat init                                   # create database
//! vcat sync --only-year 2024 --only-make Toyota
//! vcat sync --dry-run --report ./reports/dq.csv
//! vcat stats
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and environment overrides |
//! | [`normalize`] | Name normalization and spelling variants |
//! | [`sources`] | Provider adapters (DOE, CarQuery, vPIC) |
//! | [`http`] | Retried, cached HTTP transport |
//! | [`discover`] | Make set and candidate searches |
//! | [`validate`] | Cross-source model checks |
//! | [`merge`] | Per-entity merge policy |
//! | [`upsert`] | Catalog writer and run counters |
//! | [`store`] | Storage trait and in-memory backend |
//! | [`sqlite_store`] | SQLite backend |
//! | [`anomaly`] | Data-quality anomalies |
//! | [`report`] | CSV anomaly report |
//! | [`pipeline`] | Sync run loop |
//! | [`stats`] | Catalog statistics |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema creation |

pub mod anomaly;
pub mod config;
pub mod db;
pub mod discover;
pub mod http;
pub mod merge;
pub mod migrate;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod report;
pub mod sources;
pub mod sqlite_store;
pub mod stats;
pub mod store;
pub mod upsert;
pub mod validate;
