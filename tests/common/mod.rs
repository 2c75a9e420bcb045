#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use cluster_dao::cluster::NodeSet;
use cluster_dao::prelude::*;
use serde_json::Value as JsonValue;

/// A statement as the scripted cluster received it.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub node: String,
    pub sql: String,
    pub params: Vec<RowValues>,
}

type Script = Arc<Mutex<VecDeque<Result<ResultSet, DaoError>>>>;

/// In-memory cluster that answers from a queue of scripted results and records
/// every statement. Unscripted statements succeed with an empty result.
pub struct ScriptedCluster {
    nodes: NodeSet<()>,
    script: Script,
    calls: Arc<Mutex<Vec<Call>>>,
    checked_out: Arc<AtomicUsize>,
}

impl ScriptedCluster {
    pub fn new(node_ids: &[&str]) -> Self {
        let mut nodes = NodeSet::new(Selector::Order);
        for id in node_ids {
            nodes.add(*id, ()).expect("node id");
        }
        Self {
            nodes,
            script: Arc::default(),
            calls: Arc::default(),
            checked_out: Arc::default(),
        }
    }

    pub fn push(&self, result: Result<ResultSet, DaoError>) {
        self.script.lock().unwrap().push_back(result);
    }

    pub fn push_rows(&self, columns: &[&str], rows: Vec<Vec<RowValues>>) {
        let mut rs = ResultSet::with_fields(
            columns.iter().map(|c| FieldInfo::new(*c)).collect(),
            rows.len(),
        );
        for row in rows {
            rs.add_row_values(row);
        }
        self.push(Ok(rs));
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn last_call(&self) -> Call {
        self.calls().pop().expect("at least one call")
    }

    pub fn checked_out(&self) -> usize {
        self.checked_out.load(Ordering::SeqCst)
    }
}

pub struct ScriptedConnection {
    node: String,
    script: Script,
    calls: Arc<Mutex<Vec<Call>>>,
    checked_out: Arc<AtomicUsize>,
}

impl Drop for ScriptedConnection {
    fn drop(&mut self) {
        self.checked_out.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Cluster for ScriptedCluster {
    type Connection = ScriptedConnection;

    async fn get_connection(&self, role: &str) -> Result<ScriptedConnection, DaoError> {
        let (node, _) = self.nodes.select(role)?[0];
        self.checked_out.fetch_add(1, Ordering::SeqCst);
        Ok(ScriptedConnection {
            node: node.to_string(),
            script: Arc::clone(&self.script),
            calls: Arc::clone(&self.calls),
            checked_out: Arc::clone(&self.checked_out),
        })
    }
}

#[async_trait]
impl ClusterConnection for ScriptedConnection {
    async fn query(&mut self, sql: &str, params: &[RowValues]) -> Result<ResultSet, DaoError> {
        self.calls.lock().unwrap().push(Call {
            node: self.node.clone(),
            sql: sql.to_string(),
            params: params.to_vec(),
        });
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(ResultSet::default()))
    }
}

pub fn record(value: JsonValue) -> Record {
    match value {
        JsonValue::Object(map) => map,
        other => panic!("expected an object, got {other}"),
    }
}
