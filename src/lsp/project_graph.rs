// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Include-dependency graph between workspace files.
//!
//! Edges point both ways (child to parents and parent to children) so the
//! analysis can walk up to candidate entry points and down to included
//! files. An included file may be reachable from several entry points;
//! [`ProjectGraph::select_root`] picks one deterministically.

use std::collections::{HashMap, HashSet, VecDeque};

#[derive(Debug, Default, Clone)]
pub struct ProjectGraph {
    child_to_parents: HashMap<String, HashSet<String>>,
    parent_to_children: HashMap<String, HashSet<String>>,
}

impl ProjectGraph {
    /// Idempotent edge insert; duplicate registrations are no-ops.
    pub fn register_dependency(&mut self, parent_uri: &str, child_uri: &str) {
        self.child_to_parents
            .entry(child_uri.to_string())
            .or_default()
            .insert(parent_uri.to_string());
        self.parent_to_children
            .entry(parent_uri.to_string())
            .or_default()
            .insert(child_uri.to_string());
    }

    pub fn parents(&self, uri: &str) -> HashSet<String> {
        self.child_to_parents.get(uri).cloned().unwrap_or_default()
    }

    /// BFS shortest distance from `uri` to every reachable ancestor,
    /// including `uri` itself at distance 0.
    pub fn ancestor_distances(&self, uri: &str) -> HashMap<String, u32> {
        let mut distances = HashMap::new();
        if uri.is_empty() {
            return distances;
        }
        let mut pending = VecDeque::new();
        distances.insert(uri.to_string(), 0);
        pending.push_back(uri.to_string());
        while let Some(current) = pending.pop_front() {
            let current_distance = distances[&current];
            let Some(parents) = self.child_to_parents.get(&current) else {
                continue;
            };
            for parent in parents {
                if distances.contains_key(parent) {
                    continue;
                }
                distances.insert(parent.clone(), current_distance + 1);
                pending.push_back(parent.clone());
            }
        }
        distances
    }

    /// Canonical analysis root for `uri`: the nearest reachable preferred
    /// root if any, otherwise the nearest parentless ancestor ("true
    /// root"), otherwise `uri` itself. Ties break on the smaller URI.
    pub fn select_root(&self, uri: &str, preferred_roots: &HashSet<String>) -> String {
        if uri.is_empty() {
            return uri.to_string();
        }
        let distances = self.ancestor_distances(uri);
        if distances.is_empty() {
            return uri.to_string();
        }

        let pick_best = |candidates: &[&String]| -> Option<String> {
            let mut best: Option<(&String, u32)> = None;
            for candidate in candidates {
                let Some(&distance) = distances.get(*candidate) else {
                    continue;
                };
                best = match best {
                    None => Some((candidate, distance)),
                    Some((best_uri, best_distance)) => {
                        if distance < best_distance
                            || (distance == best_distance && candidate.as_str() < best_uri.as_str())
                        {
                            Some((candidate, distance))
                        } else {
                            Some((best_uri, best_distance))
                        }
                    }
                };
            }
            best.map(|(uri, _)| uri.clone())
        };

        if !preferred_roots.is_empty() {
            let preferred: Vec<&String> = distances
                .keys()
                .filter(|candidate| preferred_roots.contains(*candidate))
                .collect();
            if let Some(best) = pick_best(&preferred) {
                return best;
            }
        }

        let true_roots: Vec<&String> = distances
            .keys()
            .filter(|candidate| {
                self.child_to_parents
                    .get(*candidate)
                    .map(HashSet::is_empty)
                    .unwrap_or(true)
            })
            .collect();
        if let Some(best) = pick_best(&true_roots) {
            return best;
        }
        uri.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(edges: &[(&str, &str)]) -> ProjectGraph {
        let mut graph = ProjectGraph::default();
        for (parent, child) in edges {
            graph.register_dependency(parent, child);
        }
        graph
    }

    #[test]
    fn duplicate_edges_are_idempotent() {
        let graph = graph(&[("a", "b"), ("a", "b")]);
        assert_eq!(graph.parents("b").len(), 1);
    }

    #[test]
    fn distances_are_bfs_shortest() {
        let graph = graph(&[("p", "c"), ("gp", "p"), ("gp", "c")]);
        let distances = graph.ancestor_distances("c");
        assert_eq!(distances["c"], 0);
        assert_eq!(distances["p"], 1);
        assert_eq!(distances["gp"], 1);
    }

    #[test]
    fn preferred_root_wins_over_more_distant_true_root() {
        let graph = graph(&[
            ("parentA", "child"),
            ("parentB", "child"),
            ("grandparent", "parentA"),
        ]);
        let preferred: HashSet<String> = ["parentB".to_string()].into_iter().collect();
        assert_eq!(graph.select_root("child", &preferred), "parentB");
    }

    #[test]
    fn isolated_file_is_its_own_root() {
        let graph = ProjectGraph::default();
        assert_eq!(graph.select_root("alone", &HashSet::new()), "alone");
    }

    #[test]
    fn ties_break_lexicographically() {
        let graph = graph(&[("rootB", "child"), ("rootA", "child")]);
        assert_eq!(graph.select_root("child", &HashSet::new()), "rootA");
    }

    #[test]
    fn cycle_still_selects_deterministically() {
        // a includes b, b includes a; neither is parentless, fall back to
        // the queried file.
        let graph = graph(&[("a", "b"), ("b", "a")]);
        assert_eq!(graph.select_root("b", &HashSet::new()), "b");
    }
}
