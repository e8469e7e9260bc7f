//! # dashq
//!
//! Filter-aware composition and execution of saved analytical SQL.
//!
//! ## Architecture
//!
//! A dashboard holds a library of hand-written aggregation queries over one
//! order-line table and lets the user narrow all of them by date range,
//! segment, region and category. dashq turns "template + selection" into a
//! single parameterized statement, runs it, and memoizes the typed result:
//!
//! ```text
//! ┌──────────────────────┐      ┌──────────────────────────────────────┐
//! │   FilterSelection    │      │  TemplateRegistry (built at startup) │
//! │ dates, sets of values│      │  name → parsed QueryTemplate         │
//! └──────────────────────┘      └──────────────────────────────────────┘
//!            │                                    │
//!            └──────────────┬─────────────────────┘
//!                           ▼ [compose]
//! ┌─────────────────────────────────────────────────────────┐
//! │ WITH filtered_base AS (SELECT * FROM "sales" WHERE …)   │
//! │ <template, every base reference → filtered_base>        │
//! │ + bound parameters ?1..?n                                │
//! └─────────────────────────────────────────────────────────┘
//!                           │
//!                           ▼ [gateway]
//! ┌─────────────────────────────────────────────────────────┐
//! │ StorageEngine (SQLite, pooled, query-only, timed)       │
//! └─────────────────────────────────────────────────────────┘
//!                           │
//!                           ▼ [cache]
//! ┌─────────────────────────────────────────────────────────┐
//! │ (template, filter fingerprint, dataset version) → rows  │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! Filter values never appear in statement text; they are always bound.

pub mod cache;
pub mod compose;
pub mod config;
pub mod engine;
pub mod filter;
pub mod gateway;
pub mod result;
pub mod sql;
pub mod template;

pub use engine::{Engine, EngineError, EngineResult};
pub use filter::FilterSelection;
pub use result::{Cell, TabularResult};
