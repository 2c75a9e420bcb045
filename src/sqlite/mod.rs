// SQLite module - a pool cluster backed by rusqlite
//
// - config: cluster options, builder and the bb8 connection manager
// - cluster: role-addressed pools implementing `Cluster`
// - connection: checked-out connection, blocking work moved off the runtime
// - params: conversion between `RowValues` and rusqlite values
// - query: statement execution and result extraction

pub mod cluster;
pub mod config;
pub mod connection;
pub mod params;
pub mod query;

pub use cluster::SqliteCluster;
pub use config::{ClusterOptions, ClusterOptionsBuilder, NodeOptions, SqliteManager};
pub use connection::SqliteConnection;
