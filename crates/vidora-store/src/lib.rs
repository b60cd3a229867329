//! # vidora-store
//!
//! Persistence layer for the Vidora video platform, backed by SQLite.
//!
//! The crate exposes a synchronous [`Database`] handle that wraps a
//! `rusqlite::Connection` and provides typed CRUD helpers for every domain
//! model, plus the two read/compose operations the platform is built around:
//! home-feed composition ([`Database::compose_home_feed`]) and watch-page
//! assembly ([`Database::open_video`]).

pub mod comments;
pub mod database;
pub mod feed;
pub mod migrations;
pub mod models;
pub mod users;
pub mod videos;

mod error;

#[cfg(test)]
pub(crate) mod testutil;

pub use database::Database;
pub use error::StoreError;
pub use models::*;
