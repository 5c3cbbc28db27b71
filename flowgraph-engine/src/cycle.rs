//! Cycle analysis over directed edge lists
//!
//! All traversals are iterative and follow edge declaration order, so the
//! results are deterministic and deep chains cannot overflow the stack.

use std::collections::{HashMap, HashSet};

use crate::vertex::VertexId;

type Pair = (VertexId, VertexId);

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Visited,
}

/// Vertices in first-seen order and de-duplicated out-neighbours
fn adjacency(edges: &[Pair]) -> (Vec<&VertexId>, HashMap<&VertexId, Vec<&VertexId>>) {
    let mut order = Vec::new();
    let mut seen = HashSet::new();
    let mut adj: HashMap<&VertexId, Vec<&VertexId>> = HashMap::new();
    for (source, target) in edges {
        for id in [source, target] {
            if seen.insert(id) {
                order.push(id);
            }
        }
        let children = adj.entry(source).or_default();
        if !children.contains(&target) {
            children.push(target);
        }
    }
    (order, adj)
}

/// Depth-first walk from `entry`, calling `on_back_edge` for every edge into
/// a vertex still on the stack. Stops early when the callback returns false.
fn walk<'a, F>(
    entry: &'a VertexId,
    adj: &HashMap<&'a VertexId, Vec<&'a VertexId>>,
    marks: &mut HashMap<&'a VertexId, Mark>,
    mut on_back_edge: F,
) where
    F: FnMut(&'a VertexId, &'a VertexId) -> bool,
{
    if marks.contains_key(entry) {
        return;
    }
    marks.insert(entry, Mark::Visiting);
    let mut stack: Vec<(&VertexId, usize)> = vec![(entry, 0)];

    while let Some(frame) = stack.last_mut() {
        let node = frame.0;
        let children = adj.get(node).map(Vec::as_slice).unwrap_or(&[]);
        if frame.1 < children.len() {
            let child = children[frame.1];
            frame.1 += 1;
            match marks.get(child) {
                Some(Mark::Visiting) => {
                    if !on_back_edge(node, child) {
                        return;
                    }
                }
                Some(Mark::Visited) => {}
                None => {
                    marks.insert(child, Mark::Visiting);
                    stack.push((child, 0));
                }
            }
        } else {
            marks.insert(node, Mark::Visited);
            stack.pop();
        }
    }
}

/// First back-edge reachable from `entry`
pub fn find_cycle_edge(entry: &VertexId, edges: &[Pair]) -> Option<Pair> {
    let (_, adj) = adjacency(edges);
    let mut marks = HashMap::new();
    let mut found = None;
    walk(entry, &adj, &mut marks, |source, target| {
        found = Some((source.clone(), target.clone()));
        false
    });
    found
}

/// Every back-edge reachable from `entry`, self-loops included
pub fn find_all_cycle_edges(entry: &VertexId, edges: &[Pair]) -> Vec<Pair> {
    let (_, adj) = adjacency(edges);
    let mut marks = HashMap::new();
    let mut found = Vec::new();
    walk(entry, &adj, &mut marks, |source, target| {
        found.push((source.clone(), target.clone()));
        true
    });
    found
}

/// Whether any edge among `vertices` closes a cycle
pub fn has_cycle(vertices: &[VertexId], edges: &[Pair]) -> bool {
    let (order, adj) = adjacency(edges);
    let mut marks = HashMap::new();
    let mut cyclic = false;
    for root in vertices.iter().chain(order.iter().copied()) {
        walk(root, &adj, &mut marks, |_, _| {
            cyclic = true;
            false
        });
        if cyclic {
            return true;
        }
    }
    false
}

/// Every vertex lying on some directed cycle, in first-seen order
///
/// Strongly connected components (Tarjan) of more than one vertex, plus
/// vertices with a self-loop.
pub fn find_cycle_vertices(edges: &[Pair]) -> Vec<VertexId> {
    let (order, adj) = adjacency(edges);
    let mut index: HashMap<&VertexId, usize> = HashMap::new();
    let mut low: HashMap<&VertexId, usize> = HashMap::new();
    let mut on_stack: HashSet<&VertexId> = HashSet::new();
    let mut component_stack: Vec<&VertexId> = Vec::new();
    let mut in_cycle: HashSet<&VertexId> = HashSet::new();
    let mut next = 0usize;

    for &root in &order {
        if index.contains_key(root) {
            continue;
        }
        index.insert(root, next);
        low.insert(root, next);
        next += 1;
        component_stack.push(root);
        on_stack.insert(root);
        let mut calls: Vec<(&VertexId, usize)> = vec![(root, 0)];

        while let Some(frame) = calls.last_mut() {
            let node = frame.0;
            let children = adj.get(node).map(Vec::as_slice).unwrap_or(&[]);
            if frame.1 < children.len() {
                let child = children[frame.1];
                frame.1 += 1;
                if !index.contains_key(child) {
                    index.insert(child, next);
                    low.insert(child, next);
                    next += 1;
                    component_stack.push(child);
                    on_stack.insert(child);
                    calls.push((child, 0));
                } else if on_stack.contains(child) {
                    let child_index = index[child];
                    if let Some(node_low) = low.get_mut(node) {
                        *node_low = (*node_low).min(child_index);
                    }
                }
                continue;
            }

            calls.pop();
            let node_low = low[node];
            if let Some(&(parent, _)) = calls.last() {
                if let Some(parent_low) = low.get_mut(parent) {
                    *parent_low = (*parent_low).min(node_low);
                }
            }
            if node_low == index[node] {
                let mut component = Vec::new();
                while let Some(member) = component_stack.pop() {
                    on_stack.remove(member);
                    component.push(member);
                    if member == node {
                        break;
                    }
                }
                let self_loop = children.contains(&node);
                if component.len() > 1 || self_loop {
                    in_cycle.extend(component);
                }
            }
        }
    }

    order
        .into_iter()
        .filter(|id| in_cycle.contains(id))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edges(pairs: &[(&str, &str)]) -> Vec<Pair> {
        pairs
            .iter()
            .map(|(s, t)| (VertexId::from(*s), VertexId::from(*t)))
            .collect()
    }

    fn pair(s: &str, t: &str) -> Pair {
        (VertexId::from(s), VertexId::from(t))
    }

    fn ids(found: Vec<VertexId>) -> HashSet<String> {
        found.into_iter().map(|id| id.0).collect()
    }

    #[test]
    fn test_find_cycle_edge_simple() {
        let e = edges(&[("A", "B"), ("B", "C"), ("C", "A")]);
        assert_eq!(find_cycle_edge(&VertexId::from("A"), &e), Some(pair("C", "A")));
    }

    #[test]
    fn test_find_cycle_edge_none() {
        let e = edges(&[("A", "B"), ("B", "C")]);
        assert_eq!(find_cycle_edge(&VertexId::from("A"), &e), None);
        assert_eq!(find_cycle_edge(&VertexId::from("A"), &[]), None);
    }

    #[test]
    fn test_find_cycle_edge_unreachable_cycle() {
        let e = edges(&[("A", "B"), ("C", "D"), ("D", "C")]);
        assert_eq!(find_cycle_edge(&VertexId::from("A"), &e), None);
    }

    #[test]
    fn test_find_cycle_edge_self_loop() {
        let e = edges(&[("A", "A")]);
        assert_eq!(find_cycle_edge(&VertexId::from("A"), &e), Some(pair("A", "A")));
    }

    #[test]
    fn test_find_cycle_edge_long_chain() {
        let names: Vec<String> = (0..5000).map(|i| format!("v{i}")).collect();
        let mut e: Vec<Pair> = names
            .windows(2)
            .map(|w| (VertexId::new(w[0].clone()), VertexId::new(w[1].clone())))
            .collect();
        e.push((VertexId::from("v4999"), VertexId::from("v0")));
        assert_eq!(
            find_cycle_edge(&VertexId::from("v0"), &e),
            Some(pair("v4999", "v0"))
        );
    }

    #[test]
    fn test_find_all_cycle_edges_two_loops() {
        let e = edges(&[("A", "B"), ("B", "C"), ("C", "A"), ("B", "D"), ("D", "B")]);
        let found: HashSet<Pair> = find_all_cycle_edges(&VertexId::from("A"), &e)
            .into_iter()
            .collect();
        assert_eq!(found, HashSet::from([pair("C", "A"), pair("D", "B")]));
    }

    #[test]
    fn test_find_all_cycle_edges_duplicate_edges() {
        let e = edges(&[("A", "B"), ("A", "B"), ("B", "C"), ("C", "A"), ("C", "A")]);
        assert_eq!(find_all_cycle_edges(&VertexId::from("A"), &e), vec![pair("C", "A")]);
    }

    #[test]
    fn test_find_cycle_vertices_nested_loops() {
        let e = edges(&[
            ("A", "B"),
            ("B", "C"),
            ("C", "A"),
            ("C", "D"),
            ("D", "E"),
            ("E", "F"),
            ("F", "C"),
            ("F", "G"),
            ("X", "Y"),
            ("Y", "Z"),
        ]);
        assert_eq!(
            ids(find_cycle_vertices(&e)),
            HashSet::from(["A", "B", "C", "D", "E", "F"].map(String::from))
        );
    }

    #[test]
    fn test_find_cycle_vertices_side_entry() {
        // concatenate only joins the loop through a side edge into router
        let e = edges(&[
            ("chat_input", "router"),
            ("chat_input", "concatenate"),
            ("concatenate", "router"),
            ("router", "chat_input"),
            ("text_output", "chat_output"),
            ("router", "text_output"),
        ]);
        assert_eq!(
            ids(find_cycle_vertices(&e)),
            HashSet::from(["router", "chat_input", "concatenate"].map(String::from))
        );
    }

    #[test]
    fn test_find_cycle_vertices_acyclic_and_self_loop() {
        assert!(find_cycle_vertices(&edges(&[("A", "B"), ("B", "C"), ("D", "E")])).is_empty());
        assert!(find_cycle_vertices(&[]).is_empty());
        assert_eq!(
            find_cycle_vertices(&edges(&[("A", "B"), ("B", "B")])),
            vec![VertexId::from("B")]
        );
    }

    #[test]
    fn test_has_cycle() {
        let vertices: Vec<VertexId> = ["A", "B", "C", "D", "E"].map(VertexId::from).to_vec();
        assert!(has_cycle(
            &vertices,
            &edges(&[("A", "B"), ("B", "C"), ("C", "D"), ("D", "E"), ("E", "B")])
        ));
        assert!(!has_cycle(&vertices, &edges(&[("A", "B"), ("B", "C")])));
    }
}
