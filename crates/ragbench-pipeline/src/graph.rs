//! A small DAG executor over named stages.
//!
//! Stages are wired with `connect("producer.port", "consumer.port")`. At run
//! time stages execute level by level in topological order; stages on the same
//! level run on scoped threads. Several edges into one input port arrive as
//! `PortValue::Many` in connection order.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;
use tracing::debug;

use ragbench_core::error::{Error, Result};
use ragbench_core::ports::{PortValue, Ports};
use ragbench_core::traits::Stage;

pub const DEFAULT_PORT: &str = "documents";

#[derive(Debug, Clone, PartialEq, Eq)]
struct Edge {
    from: String,
    from_port: String,
    to: String,
    to_port: String,
}

/// Serializable shape of a pipeline: stage names and `stage.port` edges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineDescription {
    pub stages: Vec<String>,
    pub connections: Vec<Connection>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub sender: String,
    pub receiver: String,
}

#[derive(Default)]
pub struct Pipeline {
    stages: IndexMap<String, Box<dyn Stage>>,
    edges: Vec<Edge>,
}

impl Pipeline {
    pub fn new() -> Self { Self::default() }

    pub fn add_stage(&mut self, name: impl Into<String>, stage: impl Stage + 'static) -> Result<()> {
        let name = name.into();
        if self.stages.contains_key(&name) {
            return Err(Error::config(format!("stage '{name}' already exists")));
        }
        self.stages.insert(name, Box::new(stage));
        Ok(())
    }

    pub fn has_stage(&self, name: &str) -> bool { self.stages.contains_key(name) }

    pub fn stage_names(&self) -> impl Iterator<Item = &str> { self.stages.keys().map(String::as_str) }

    pub fn describe(&self) -> PipelineDescription {
        PipelineDescription {
            stages: self.stage_names().map(String::from).collect(),
            connections: self
                .edges
                .iter()
                .map(|e| Connection { sender: format!("{}.{}", e.from, e.from_port), receiver: format!("{}.{}", e.to, e.to_port) })
                .collect(),
        }
    }

    /// Connect `from` (`stage` or `stage.port`) to `to`. A missing port means
    /// `documents`.
    pub fn connect(&mut self, from: &str, to: &str) -> Result<()> {
        let (from, from_port) = split_endpoint(from);
        let (to, to_port) = split_endpoint(to);
        for stage in [from, to] {
            if !self.has_stage(stage) {
                return Err(Error::config(format!("cannot connect unknown stage '{stage}'")));
            }
        }
        if from == to || self.reaches(to, from) {
            return Err(Error::config(format!("connecting {from} -> {to} would create a cycle")));
        }
        self.edges.push(Edge { from: from.into(), from_port: from_port.into(), to: to.into(), to_port: to_port.into() });
        Ok(())
    }

    /// Execute once. `inputs` maps stage name to the caller-provided ports;
    /// the result holds the outputs of leaf stages plus `include_outputs_from`.
    pub fn run(&self, mut inputs: BTreeMap<String, Ports>, include_outputs_from: &[&str]) -> Result<BTreeMap<String, Ports>> {
        self.check_inputs(&inputs, include_outputs_from)?;
        let mut outputs: HashMap<String, Ports> = HashMap::new();

        for level in self.levels() {
            let mut prepared = Vec::with_capacity(level.len());
            for name in &level {
                let mut ports = inputs.remove(*name).unwrap_or_default();
                for (port, value) in self.delivered(name, &outputs)? {
                    ports.insert(port, value);
                }
                prepared.push((*name, ports));
            }

            let results = self.run_level(prepared)?;
            for (name, ports) in results {
                outputs.insert(name.to_string(), ports);
            }
        }

        Ok(outputs
            .into_iter()
            .filter(|(name, _)| include_outputs_from.contains(&name.as_str()) || !self.edges.iter().any(|e| &e.from == name))
            .collect())
    }

    fn run_level<'a>(&self, prepared: Vec<(&'a str, Ports)>) -> Result<Vec<(&'a str, Ports)>> {
        if prepared.len() == 1 {
            return prepared
                .into_iter()
                .map(|(name, ports)| {
                    let ran = panic::catch_unwind(AssertUnwindSafe(|| self.run_stage(name, ports)));
                    Ok((name, ran.map_err(|_| panicked(name))??))
                })
                .collect();
        }
        std::thread::scope(|scope| {
            let handles: Vec<_> = prepared
                .into_iter()
                .map(|(name, ports)| (name, scope.spawn(move || self.run_stage(name, ports))))
                .collect();
            handles
                .into_iter()
                .map(|(name, handle)| {
                    let ports = handle.join().map_err(|_| panicked(name))??;
                    Ok((name, ports))
                })
                .collect()
        })
    }

    fn run_stage(&self, name: &str, ports: Ports) -> Result<Ports> {
        let stage = self.stages.get(name).ok_or_else(|| Error::config(format!("unknown stage '{name}'")))?;
        let start = Instant::now();
        let out = stage.run(ports)?;
        debug!(stage = name, elapsed = ?start.elapsed(), ports = out.len(), "stage finished");
        Ok(out)
    }

    /// Values flowing into `name`, one entry per connected input port.
    fn delivered(&self, name: &str, outputs: &HashMap<String, Ports>) -> Result<Vec<(String, PortValue)>> {
        let mut by_port: IndexMap<&str, Vec<PortValue>> = IndexMap::new();
        for edge in self.edges.iter().filter(|e| e.to == name) {
            let value = outputs
                .get(&edge.from)
                .and_then(|ports| ports.get(&edge.from_port))
                .ok_or_else(|| Error::config(format!("stage '{}' did not produce '{}' for '{}'", edge.from, edge.from_port, name)))?;
            by_port.entry(edge.to_port.as_str()).or_default().push(value.clone());
        }
        Ok(by_port
            .into_iter()
            .map(|(port, mut values)| {
                let value = if values.len() == 1 { values.remove(0) } else { PortValue::Many(values) };
                (port.to_string(), value)
            })
            .collect())
    }

    fn check_inputs(&self, inputs: &BTreeMap<String, Ports>, include_outputs_from: &[&str]) -> Result<()> {
        for (stage, ports) in inputs {
            if !self.has_stage(stage) {
                return Err(Error::config(format!("inputs given for unknown stage '{stage}'")));
            }
            if let Some(edge) = self.edges.iter().find(|e| &e.to == stage && ports.contains(&e.to_port)) {
                return Err(Error::config(format!("input '{}.{}' is already connected to '{}'", stage, edge.to_port, edge.from)));
            }
        }
        if let Some(unknown) = include_outputs_from.iter().find(|name| !self.has_stage(name)) {
            return Err(Error::config(format!("cannot include outputs of unknown stage '{unknown}'")));
        }
        Ok(())
    }

    /// Stage names grouped by longest distance from a source, in insertion
    /// order within a level.
    fn levels(&self) -> Vec<Vec<&str>> {
        let mut depth: HashMap<&str, usize> = HashMap::new();
        let mut remaining: Vec<&str> = self.stages.keys().map(String::as_str).collect();
        while !remaining.is_empty() {
            let before = remaining.len();
            remaining.retain(|name| {
                let parents: Vec<&str> = self.edges.iter().filter(|e| e.to == *name).map(|e| e.from.as_str()).collect();
                if parents.iter().all(|p| depth.contains_key(p)) {
                    let d = parents.iter().filter_map(|p| depth.get(p)).map(|d| d + 1).max().unwrap_or(0);
                    depth.insert(*name, d);
                    false
                } else {
                    true
                }
            });
            if remaining.len() == before { break; }
        }
        let max = depth.values().copied().max().unwrap_or(0);
        let mut levels = vec![Vec::new(); if depth.is_empty() { 0 } else { max + 1 }];
        for name in self.stages.keys() {
            if let Some(d) = depth.get(name.as_str()) { levels[*d].push(name.as_str()); }
        }
        levels
    }

    fn reaches(&self, from: &str, target: &str) -> bool {
        let mut stack = vec![from];
        let mut seen = HashSet::new();
        while let Some(node) = stack.pop() {
            if node == target { return true; }
            if !seen.insert(node) { continue; }
            stack.extend(self.edges.iter().filter(|e| e.from == node).map(|e| e.to.as_str()));
        }
        false
    }
}

fn panicked(name: &str) -> Error { Error::Operation(format!("stage '{name}' panicked")) }

fn split_endpoint(endpoint: &str) -> (&str, &str) {
    endpoint.split_once('.').unwrap_or((endpoint, DEFAULT_PORT))
}
