//! Collects Hive matches from BoardGameArena and Entomology into SQLite and
//! exports them as UHP game strings.

pub mod clients;
pub mod config;
pub mod context;
pub mod db;
pub mod discovery;
pub mod entomology;
pub mod error;
pub mod expansions;
pub mod export;
pub mod fetch;
pub mod identity;
pub mod pipeline;
pub mod progress;
