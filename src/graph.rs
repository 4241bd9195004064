// graph.rs
// Description: Depth first search over adjacency lists, connected components, and grouping of
//              nearby points through a distance threshold graph.
// History:
// - 2026-10-06: Add iterative DFS and point clustering.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::error::{MlpError, Result};
use crate::geometry::{point_to_point, Point};

/// Vertex -> adjacent vertices.
pub type AdjacencyList = BTreeMap<usize, Vec<usize>>;

/// Vertices reachable from `i_start`, including `i_start`.
///
/// A vertex that appears only as a neighbour has no outgoing edges.
pub fn dfs(adjacency: &AdjacencyList, i_start: usize) -> BTreeSet<usize> {
    let mut s_seen: BTreeSet<usize> = BTreeSet::new();
    let mut v_stack: Vec<usize> = vec![i_start];

    while let Some(i_vertex) = v_stack.pop() {
        if !s_seen.insert(i_vertex) {
            continue;
        }
        if let Some(v_next) = adjacency.get(&i_vertex) {
            v_stack.extend(v_next.iter().rev().filter(|i| !s_seen.contains(*i)));
        }
    }

    s_seen
}

/// Removes the largest vertex key from `adjacency` and returns its component.
pub fn pop_component(adjacency: &mut AdjacencyList) -> Option<BTreeSet<usize>> {
    let (i_start, v_neighbours) = adjacency.pop_last()?;

    let mut s_group = dfs(adjacency, i_start);
    for i_next in v_neighbours {
        if !s_group.contains(&i_next) {
            s_group.extend(dfs(adjacency, i_next));
        }
    }
    Some(s_group)
}

/// Copy of `adjacency` with every edge present in both directions.
pub fn symmetrize(adjacency: &AdjacencyList) -> AdjacencyList {
    let mut undirected: AdjacencyList = adjacency.clone();
    for (&i_from, v_next) in adjacency.iter() {
        for &i_to in v_next.iter() {
            let v_back = undirected.entry(i_to).or_default();
            if !v_back.contains(&i_from) {
                v_back.push(i_from);
            }
        }
    }
    undirected
}

/// All connected components, ordered by their smallest vertex.
///
/// Edges count in both directions, so every vertex lands in exactly one component.
pub fn connected_components(adjacency: &AdjacencyList) -> Vec<BTreeSet<usize>> {
    let undirected = symmetrize(adjacency);
    let mut s_assigned: BTreeSet<usize> = BTreeSet::new();
    let mut v_components: Vec<BTreeSet<usize>> = Vec::new();

    for &i_vertex in undirected.keys() {
        if s_assigned.contains(&i_vertex) {
            continue;
        }
        let s_group = dfs(&undirected, i_vertex);
        s_assigned.extend(s_group.iter().copied());
        v_components.push(s_group);
    }

    v_components
}

/// Undirected graph joining points whose distance is at most `d_threshold`.
pub fn proximity_graph(points: &[Point], d_threshold: f64) -> Result<AdjacencyList> {
    if !d_threshold.is_finite() || d_threshold < 0.0 {
        return Err(MlpError::invalid_parameter("threshold_invalid"));
    }

    let mut adjacency: AdjacencyList = (0..points.len()).map(|i| (i, Vec::new())).collect();
    for (i, a) in points.iter().enumerate() {
        for (j, b) in points.iter().enumerate().skip(i + 1) {
            if point_to_point(a, b) <= d_threshold {
                adjacency.entry(i).or_default().push(j);
                adjacency.entry(j).or_default().push(i);
            }
        }
    }
    Ok(adjacency)
}

/// Groups point indexes that are chained together by gaps of at most `d_threshold`.
pub fn cluster_points(points: &[Point], d_threshold: f64) -> Result<Vec<BTreeSet<usize>>> {
    let adjacency = proximity_graph(points, d_threshold)?;
    let v_clusters = connected_components(&adjacency);
    debug!(i_points = points.len(), i_clusters = v_clusters.len(), d_threshold, "points clustered");
    Ok(v_clusters)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn graph(v_edges: Vec<(usize, Vec<usize>)>) -> AdjacencyList {
        v_edges.into_iter().collect()
    }

    fn set(v: &[usize]) -> BTreeSet<usize> {
        v.iter().copied().collect()
    }

    #[test]
    fn test_dfs_reaches_component_only() {
        let g = graph(vec![(0, vec![1]), (1, vec![0, 2]), (2, vec![1]), (3, vec![4]), (4, vec![3])]);
        assert_eq!(dfs(&g, 0), set(&[0, 1, 2]));
        assert_eq!(dfs(&g, 4), set(&[3, 4]));
        // unknown start vertex is its own component
        assert_eq!(dfs(&g, 9), set(&[9]));
    }

    #[test]
    fn test_dfs_handles_cycles_and_missing_keys() {
        let g = graph(vec![(0, vec![1, 2]), (1, vec![2, 0]), (2, vec![0, 7])]);
        assert_eq!(dfs(&g, 1), set(&[0, 1, 2, 7]));
    }

    #[test]
    fn test_dfs_deep_chain_does_not_overflow() {
        let i_n = 200_000;
        let g: AdjacencyList = (0..i_n).map(|i| (i, vec![i + 1])).collect();
        assert_eq!(dfs(&g, 0).len(), i_n + 1);
    }

    #[test]
    fn test_pop_component_removes_largest_key() {
        let mut g = graph(vec![(0, vec![1]), (1, vec![0]), (5, vec![6]), (6, vec![5])]);
        let s_group = pop_component(&mut g).unwrap();
        assert_eq!(s_group, set(&[5, 6]));
        assert!(!g.contains_key(&6));
        assert!(g.contains_key(&5));

        assert!(pop_component(&mut AdjacencyList::new()).is_none());
    }

    #[test]
    fn test_connected_components() {
        let g = graph(vec![(4, vec![2]), (2, vec![4]), (0, vec![]), (1, vec![3]), (3, vec![1])]);
        assert_eq!(
            connected_components(&g),
            vec![set(&[0]), set(&[1, 3]), set(&[2, 4])]
        );
    }

    #[test]
    fn test_connected_components_one_way_edges() {
        let g = graph(vec![(0, vec![]), (1, vec![0])]);
        assert_eq!(connected_components(&g), vec![set(&[0, 1])]);

        // neighbour without its own entry
        let g = graph(vec![(2, vec![7]), (5, vec![2]), (3, vec![])]);
        let v_components = connected_components(&g);
        assert_eq!(v_components, vec![set(&[2, 5, 7]), set(&[3])]);
        let i_total: usize = v_components.iter().map(|s| s.len()).sum();
        assert_eq!(i_total, 4);
    }

    #[test]
    fn test_symmetrize() {
        let g = graph(vec![(0, vec![1]), (1, vec![0, 2])]);
        let undirected = symmetrize(&g);
        assert_eq!(undirected.get(&0), Some(&vec![1]));
        assert_eq!(undirected.get(&1), Some(&vec![0, 2]));
        assert_eq!(undirected.get(&2), Some(&vec![1]));
    }

    #[test]
    fn test_cluster_points() {
        let v = vec![
            Point::new(0.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(0.5, 0.0),
            Point::new(1.0, 0.0),
            Point::new(10.5, 10.0),
        ];
        let v_clusters = cluster_points(&v, 0.6).unwrap();
        assert_eq!(v_clusters, vec![set(&[0, 2, 3]), set(&[1, 4])]);

        // zero threshold keeps distinct points apart
        assert_eq!(cluster_points(&v, 0.0).unwrap().len(), 5);
        assert!(cluster_points(&v, -1.0).is_err());
        assert!(cluster_points(&[], 1.0).unwrap().is_empty());
    }
}
