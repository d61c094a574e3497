// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 assetflow contributors

//! Task composition graph
//!
//! Sequence and parallel tasks refer to other tasks by name. This module
//! builds the graph of those references, rejects unknown names and cycles,
//! and renders it for `assetflow graph`.

use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::{HashMap, HashSet};

use crate::errors::AssetflowError;
use crate::pipeline::{BuildFile, TaskDef};

/// Graph of tasks; an edge `a → b` means composite `a` runs `b`
pub struct TaskGraph {
    graph: DiGraph<String, usize>,
    name_to_index: HashMap<String, NodeIndex>,
    kinds: HashMap<String, &'static str>,
}

impl TaskGraph {
    /// Build and validate the graph for a build file
    pub fn build(build: &BuildFile) -> Result<Self, AssetflowError> {
        let mut graph = DiGraph::new();
        let mut name_to_index = HashMap::new();
        let mut kinds = HashMap::new();

        for (name, task) in &build.tasks {
            let node = graph.add_node(name.clone());
            name_to_index.insert(name.clone(), node);
            kinds.insert(name.clone(), task.kind());
        }

        for (name, task) in &build.tasks {
            let from = name_to_index[name];
            for (position, member) in task.members().iter().enumerate() {
                let to = name_to_index.get(member).ok_or_else(|| {
                    AssetflowError::UnknownDependency {
                        task: name.clone(),
                        dependency: member.clone(),
                    }
                })?;
                graph.add_edge(from, *to, position);
            }
        }

        let dag = Self {
            graph,
            name_to_index,
            kinds,
        };
        dag.validate_acyclic()?;
        Ok(dag)
    }

    fn validate_acyclic(&self) -> Result<(), AssetflowError> {
        match toposort(&self.graph, None) {
            Ok(_) => Ok(()),
            Err(cycle) => Err(AssetflowError::CircularDependency {
                tasks: self.cycle_through(cycle.node_id()),
            }),
        }
    }

    /// Names along one cycle, starting and ending at a task on it
    fn cycle_through(&self, start: NodeIndex) -> Vec<String> {
        // Tarjan gives the strongly connected component; walk it back to
        // the start to get a readable loop.
        let component: HashSet<NodeIndex> = tarjan_scc(&self.graph)
            .into_iter()
            .find(|scc| scc.contains(&start))
            .unwrap_or_default()
            .into_iter()
            .collect();

        let mut path = vec![start];
        let mut visited = HashSet::new();
        if self.walk_back(start, start, &component, &mut path, &mut visited) {
            path.into_iter().map(|n| self.graph[n].clone()).collect()
        } else {
            vec![self.graph[start].clone()]
        }
    }

    fn walk_back(
        &self,
        node: NodeIndex,
        start: NodeIndex,
        component: &HashSet<NodeIndex>,
        path: &mut Vec<NodeIndex>,
        visited: &mut HashSet<NodeIndex>,
    ) -> bool {
        let mut next: Vec<NodeIndex> = self
            .graph
            .neighbors_directed(node, Direction::Outgoing)
            .filter(|n| component.contains(n))
            .collect();
        next.sort_by(|a, b| self.graph[*a].cmp(&self.graph[*b]));

        for n in next {
            if n == start {
                path.push(n);
                return true;
            }
            if visited.insert(n) {
                path.push(n);
                if self.walk_back(n, start, component, path, visited) {
                    return true;
                }
                path.pop();
            }
        }
        false
    }

    /// Direct members of a task, in declaration order
    pub fn members(&self, name: &str) -> Vec<String> {
        let Some(node) = self.name_to_index.get(name) else {
            return Vec::new();
        };

        let mut edges: Vec<_> = self
            .graph
            .edges_directed(*node, Direction::Outgoing)
            .map(|e| (*e.weight(), self.graph[e.target()].clone()))
            .collect();
        edges.sort();
        edges.into_iter().map(|(_, name)| name).collect()
    }

    /// Composite tasks that include a task directly
    pub fn parents(&self, name: &str) -> Vec<String> {
        let Some(node) = self.name_to_index.get(name) else {
            return Vec::new();
        };

        let mut parents: Vec<String> = self
            .graph
            .neighbors_directed(*node, Direction::Incoming)
            .map(|n| self.graph[n].clone())
            .collect();
        parents.sort();
        parents.dedup();
        parents
    }

    /// Pipeline tasks reachable from `name`, in run order, without repeats
    pub fn pipelines_under(&self, name: &str) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_pipelines(name, &mut out);
        out
    }

    fn collect_pipelines(&self, name: &str, out: &mut Vec<String>) {
        match self.kinds.get(name) {
            Some(&"pipeline") => {
                if !out.iter().any(|n| n == name) {
                    out.push(name.to_string());
                }
            }
            Some(_) => {
                for member in self.members(name) {
                    self.collect_pipelines(&member, out);
                }
            }
            None => {}
        }
    }

    /// Tasks no composite refers to
    pub fn roots(&self) -> Vec<String> {
        let mut roots: Vec<String> = self
            .graph
            .node_indices()
            .filter(|n| {
                self.graph
                    .neighbors_directed(*n, Direction::Incoming)
                    .next()
                    .is_none()
            })
            .map(|n| self.graph[n].clone())
            .collect();
        roots.sort();
        roots
    }

    /// Mermaid flowchart
    pub fn to_mermaid(&self) -> String {
        let mut out = String::from("graph TD\n");

        let mut names: Vec<&String> = self.name_to_index.keys().collect();
        names.sort();
        for name in &names {
            let shape = match self.kinds[*name] {
                "pipeline" => format!("{}[{}]", mermaid_id(name), name),
                kind => format!("{}{{{{{} ({})}}}}", mermaid_id(name), name, kind),
            };
            out.push_str(&format!("    {}\n", shape));
        }

        for name in &names {
            for member in self.members(name) {
                out.push_str(&format!("    {} --> {}\n", mermaid_id(name), mermaid_id(&member)));
            }
        }

        out
    }

    /// Graphviz digraph
    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph tasks {\n");
        out.push_str("    rankdir=TB;\n");
        out.push_str("    node [shape=box, style=rounded];\n\n");

        let mut names: Vec<&String> = self.name_to_index.keys().collect();
        names.sort();
        for name in &names {
            if self.kinds[*name] != "pipeline" {
                out.push_str(&format!("    \"{}\" [shape=ellipse];\n", name));
            }
        }

        for name in &names {
            let members = self.members(name);
            for (i, member) in members.iter().enumerate() {
                if self.kinds[*name] == "sequence" {
                    out.push_str(&format!("    \"{}\" -> \"{}\" [label=\"{}\"];\n", name, member, i + 1));
                } else {
                    out.push_str(&format!("    \"{}\" -> \"{}\";\n", name, member));
                }
            }
        }

        for name in &names {
            let node = self.name_to_index[*name];
            if self.graph.neighbors_undirected(node).next().is_none() {
                out.push_str(&format!("    \"{}\";\n", name));
            }
        }

        out.push_str("}\n");
        out
    }

    /// Indented tree from each root task
    pub fn to_text(&self, build: &BuildFile) -> String {
        let mut out = String::new();
        for root in self.roots() {
            self.write_tree(build, &root, 0, &mut out);
        }
        out
    }

    fn write_tree(&self, build: &BuildFile, name: &str, depth: usize, out: &mut String) {
        let detail = match build.task(name) {
            Some(TaskDef::Pipeline(p)) => format!(
                "{} stage(s): {}",
                p.stages.len(),
                p.stages.iter().map(|s| s.name()).collect::<Vec<_>>().join(" → ")
            ),
            Some(task) => task.kind().to_string(),
            None => String::new(),
        };
        out.push_str(&format!("{}{} ({})\n", "  ".repeat(depth), name, detail));

        for member in self.members(name) {
            self.write_tree(build, &member, depth + 1, out);
        }
    }
}

/// Mermaid node ids cannot contain `-`
fn mermaid_id(name: &str) -> String {
    name.replace(|c: char| !c.is_ascii_alphanumeric() && c != '_', "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(yaml: &str) -> BuildFile {
        BuildFile::from_yaml(yaml).unwrap()
    }

    const TASKS: &str = r#"
tasks:
  scripts: { src: "js/*.js" }
  styles: { src: "css/*.css" }
  images: { src: "img/*" }
  assets: { parallel: [styles, images] }
  default: { sequence: [scripts, assets, scripts] }
"#;

    #[test]
    fn test_members_keep_order() {
        let graph = TaskGraph::build(&build(TASKS)).unwrap();
        assert_eq!(graph.members("default"), vec!["scripts", "assets", "scripts"]);
        assert_eq!(graph.parents("styles"), vec!["assets"]);
        assert_eq!(graph.roots(), vec!["default"]);
    }

    #[test]
    fn test_pipelines_under_composite() {
        let graph = TaskGraph::build(&build(TASKS)).unwrap();
        assert_eq!(
            graph.pipelines_under("default"),
            vec!["scripts", "styles", "images"]
        );
        assert_eq!(graph.pipelines_under("styles"), vec!["styles"]);
        assert!(graph.pipelines_under("missing").is_empty());
    }

    #[test]
    fn test_cycle_detection() {
        let yaml = r#"
tasks:
  a: { sequence: [b] }
  b: { parallel: [a] }
"#;
        match TaskGraph::build(&build(yaml)) {
            Err(AssetflowError::CircularDependency { tasks }) => {
                assert_eq!(tasks.len(), 3);
                assert_eq!(tasks.first(), tasks.last());
            }
            other => panic!("Expected cycle, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_self_reference_is_a_cycle() {
        let yaml = "tasks:\n  a: { sequence: [a] }\n";
        assert!(matches!(
            TaskGraph::build(&build(yaml)),
            Err(AssetflowError::CircularDependency { .. })
        ));
    }

    #[test]
    fn test_unknown_member() {
        let yaml = "tasks:\n  a: { sequence: [ghost] }\n";
        match TaskGraph::build(&build(yaml)) {
            Err(AssetflowError::UnknownDependency { task, dependency }) => {
                assert_eq!(task, "a");
                assert_eq!(dependency, "ghost");
            }
            other => panic!("Expected unknown dependency, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_renderings() {
        let file = build(TASKS);
        let graph = TaskGraph::build(&file).unwrap();

        let mermaid = graph.to_mermaid();
        assert!(mermaid.starts_with("graph TD"));
        assert!(mermaid.contains("assets --> styles"));

        let dot = graph.to_dot();
        assert!(dot.contains("\"default\" -> \"assets\" [label=\"2\"];"));

        let text = graph.to_text(&file);
        assert!(text.starts_with("default (sequence)\n  scripts (0 stage(s): )\n"));
        assert!(text.contains("    images (0 stage(s): )\n"));
    }
}
