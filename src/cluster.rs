//! The boundary to the pooled database client.
//!
//! A [`Cluster`] hands out a connection for a role token such as `master` or `slave*`;
//! the connection runs one expanded statement at a time and goes back to its pool when
//! dropped. [`NodeSet`] holds the role-matching and node-selection rules shared by
//! implementations.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use clap::ValueEnum;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::DaoError;
use crate::results::ResultSet;
use crate::types::RowValues;

/// A group of named connection pools addressed by role tokens.
#[async_trait]
pub trait Cluster: Send + Sync {
    type Connection: ClusterConnection;

    /// Check out a connection from a node matching `role`.
    ///
    /// # Errors
    /// `DaoError::PoolNotFound` when no node matches, or the checkout error of the last
    /// node tried.
    async fn get_connection(&self, role: &str) -> Result<Self::Connection, DaoError>;

    /// Statement shapes the backend accepts.
    fn dialect(&self) -> Dialect {
        Dialect::MySql
    }
}

/// SQL flavour of a cluster's backend, consulted where generated statements differ.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Dialect {
    /// `INSERT INTO t SET col = ?`.
    #[default]
    MySql,
    /// `INSERT INTO t (col) VALUES (?)`.
    Sqlite,
}

/// A checked-out connection. Dropping it returns it to its pool.
#[async_trait]
pub trait ClusterConnection: Send {
    /// Run one statement with positional `?` placeholders.
    async fn query(&mut self, sql: &str, params: &[RowValues]) -> Result<ResultSet, DaoError>;
}

/// How a node is chosen when a role matches several.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Selector {
    /// Rotate the starting node on every checkout.
    #[default]
    RoundRobin,
    /// Always prefer the first matching node in configuration order.
    Order,
}

/// A role token compiled for matching node ids. `*` matches any run of characters.
#[derive(Debug, Clone)]
pub struct RolePattern {
    raw: String,
    regex: Option<Regex>,
}

impl RolePattern {
    /// # Errors
    /// Returns `DaoError::ConfigError` if the wildcard pattern cannot be compiled.
    pub fn parse(pattern: &str) -> Result<Self, DaoError> {
        let regex = if pattern.contains('*') {
            let body = pattern
                .split('*')
                .map(regex::escape)
                .collect::<Vec<_>>()
                .join(".*");
            Some(Regex::new(&format!("^{body}$")).map_err(|e| {
                DaoError::ConfigError(format!("invalid role pattern {pattern}: {e}"))
            })?)
        } else {
            None
        };
        Ok(Self {
            raw: pattern.to_string(),
            regex,
        })
    }

    #[must_use]
    pub fn matches(&self, node_id: &str) -> bool {
        match &self.regex {
            Some(re) => re.is_match(node_id),
            None => self.raw == node_id,
        }
    }
}

/// Named nodes plus the selector state. Role patterns are compiled once per token.
#[derive(Debug)]
pub struct NodeSet<T> {
    nodes: Vec<(String, T)>,
    selector: Selector,
    cursor: AtomicUsize,
    patterns: Mutex<HashMap<String, RolePattern>>,
}

impl<T> NodeSet<T> {
    #[must_use]
    pub fn new(selector: Selector) -> Self {
        Self {
            nodes: Vec::new(),
            selector,
            cursor: AtomicUsize::new(0),
            patterns: Mutex::new(HashMap::new()),
        }
    }

    /// Register a node. Ids must be unique and must not contain `*`.
    ///
    /// # Errors
    /// Returns `DaoError::ConfigError` for a duplicate or wildcard id.
    pub fn add(&mut self, id: impl Into<String>, node: T) -> Result<(), DaoError> {
        let id = id.into();
        if id.is_empty() || id.contains('*') {
            return Err(DaoError::ConfigError(format!("invalid node id: {id:?}")));
        }
        if self.nodes.iter().any(|(existing, _)| *existing == id) {
            return Err(DaoError::ConfigError(format!("duplicate node id: {id}")));
        }
        self.nodes.push((id, node));
        Ok(())
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(|(id, _)| id.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes matching `role`, in the order they should be tried.
    ///
    /// # Errors
    /// Returns `DaoError::PoolNotFound` when nothing matches.
    pub fn select(&self, role: &str) -> Result<Vec<(&str, &T)>, DaoError> {
        let pattern = self.pattern(role)?;
        let mut matched: Vec<(&str, &T)> = self
            .nodes
            .iter()
            .filter(|(id, _)| pattern.matches(id))
            .map(|(id, node)| (id.as_str(), node))
            .collect();
        if matched.is_empty() {
            return Err(DaoError::PoolNotFound(role.to_string()));
        }
        if self.selector == Selector::RoundRobin {
            let start = self.cursor.fetch_add(1, Ordering::Relaxed) % matched.len();
            matched.rotate_left(start);
        }
        Ok(matched)
    }

    fn pattern(&self, role: &str) -> Result<RolePattern, DaoError> {
        let mut cache = self.patterns.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(pattern) = cache.get(role) {
            return Ok(pattern.clone());
        }
        let pattern = RolePattern::parse(role)?;
        cache.insert(role.to_string(), pattern.clone());
        Ok(pattern)
    }
}
