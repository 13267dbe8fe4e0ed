//! Graph search primitives: truncated best-first search, RobustPrune, and
//! the medoid of a corpus.

use crate::distance::sum_of_squares;
use crate::matrix::{ColMajorMatrix, Feature};
use crate::minset::BoundedMinSet;
use crate::stats::SearchStats;
use crate::vamana::graph::AdjacencyGraph;
use std::collections::{HashMap, HashSet};

/// Result of a greedy search: top-k scores and ids (ascending), plus every
/// vertex visited along the way (the candidate pool for RobustPrune).
pub struct GreedyResult {
    pub scores: Vec<f32>,
    pub ids: Vec<u32>,
    pub visited: HashSet<u32>,
}

/// Truncated best-first search from `source` toward `query`.
///
/// Maintains a result set of at most `l` id-unique `(score, id)` pairs. Each
/// round expands the unvisited member with the smallest score (the frontier
/// is `result \ visited`) and scores its unvisited out-neighbors into the
/// result set; the search ends when every retained candidate has been
/// visited. Requires `l >= k`, which the callers validate.
pub fn greedy_search<T: Feature>(
    graph: &AdjacencyGraph,
    vectors: &ColMajorMatrix<T>,
    source: u32,
    query: &[T],
    k: usize,
    l: usize,
    stats: Option<&SearchStats>,
) -> GreedyResult {
    let mut result = BoundedMinSet::new(l);
    let mut visited: HashSet<u32> = HashSet::new();
    let mut comps = 0u64;

    result.insert_unique(sum_of_squares(vectors.column(source as usize), query), source);
    comps += 1;

    loop {
        // p* = argmin over result \ visited, smaller id on ties.
        let mut best: Option<(f32, u32)> = None;
        for (score, id) in result.iter() {
            if visited.contains(&id) {
                continue;
            }
            match best {
                Some((bs, bid)) if (bs, bid) <= (score, id) => {}
                _ => best = Some((score, id)),
            }
        }
        let Some((_, p_star)) = best else {
            break;
        };

        visited.insert(p_star);

        for &(_, neighbor) in graph.out_edges(p_star) {
            if visited.contains(&neighbor) {
                continue;
            }
            let score = sum_of_squares(vectors.column(neighbor as usize), query);
            comps += 1;
            result.insert_unique(score, neighbor);
        }
    }

    if let Some(stats) = stats {
        stats.add_distance_comps(comps);
        stats.add_visited_vertices(visited.len() as u64);
    }

    let ranked = result.drain_sorted();
    let take = k.min(ranked.len());
    let scores = ranked[..take].iter().map(|&(s, _)| s).collect();
    let ids = ranked[..take].iter().map(|&(_, id)| id).collect();
    GreedyResult {
        scores,
        ids,
        visited,
    }
}

/// RobustPrune: rebuild the out-neighborhood of `p` from the candidate set
/// `candidates` (typically a greedy search's visited set) under slack
/// `alpha`, bounded by degree `r`.
///
/// The working set is `(candidates ∪ out(p)) \ {p}` scored against p. Each
/// round commits the closest remaining candidate as an edge, then discards
/// every candidate that the committed one already covers:
/// `alpha · L2²(p*, p') <= L2²(p, p')`.
pub fn robust_prune<T: Feature>(
    graph: &mut AdjacencyGraph,
    vectors: &ColMajorMatrix<T>,
    p: u32,
    candidates: impl IntoIterator<Item = u32>,
    alpha: f32,
    r: usize,
) {
    let p_col = vectors.column(p as usize);

    let mut pool: HashMap<u32, f32> = HashMap::new();
    for v in candidates {
        if v != p {
            pool.entry(v)
                .or_insert_with(|| sum_of_squares(vectors.column(v as usize), p_col));
        }
    }
    for &(score, dst) in graph.out_edges(p) {
        if dst != p {
            pool.entry(dst).or_insert(score);
        }
    }

    let mut working: Vec<(f32, u32)> = pool.into_iter().map(|(id, s)| (s, id)).collect();
    graph.clear_edges(p);

    while !working.is_empty() {
        let mut best = 0usize;
        for (i, &(s, id)) in working.iter().enumerate() {
            let (bs, bid) = working[best];
            if (s, id) < (bs, bid) {
                best = i;
            }
        }
        let (s_star, p_star) = working[best];

        graph.add_edge(p, p_star, s_star);
        if graph.out_degree(p) == r {
            break;
        }

        let star_col = vectors.column(p_star as usize);
        working.retain(|&(score_to_p, candidate)| {
            alpha * sum_of_squares(star_col, vectors.column(candidate as usize)) > score_to_p
        });
    }
}

/// The corpus vector nearest to the corpus mean. Deterministic: strict `<`
/// keeps the first (smallest-id) minimum.
pub fn medoid<T: Feature>(vectors: &ColMajorMatrix<T>) -> u32 {
    let dim = vectors.num_rows();
    let n = vectors.num_cols();

    let mut centroid = vec![0.0f32; dim];
    for i in 0..n {
        for (slot, x) in centroid.iter_mut().zip(vectors.column(i)) {
            *slot += x.to_f32();
        }
    }
    let inv = 1.0 / n as f32;
    for slot in centroid.iter_mut() {
        *slot *= inv;
    }

    let mut best = 0u32;
    let mut best_score = f32::INFINITY;
    for i in 0..n {
        let score = sum_of_squares(vectors.column(i), &centroid);
        if score < best_score {
            best_score = score;
            best = i as u32;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_vectors(n: usize) -> ColMajorMatrix<f32> {
        let cols: Vec<Vec<f32>> = (0..n).map(|i| vec![i as f32]).collect();
        ColMajorMatrix::from_columns(&cols).unwrap()
    }

    /// 0 - 1 - 2 - 3 - 4 chain with symmetric edges.
    fn line_graph(vectors: &ColMajorMatrix<f32>) -> AdjacencyGraph {
        let n = vectors.num_cols();
        let mut g = AdjacencyGraph::new(n);
        for i in 0..n - 1 {
            let s = sum_of_squares(vectors.column(i), vectors.column(i + 1));
            g.add_edge(i as u32, (i + 1) as u32, s);
            g.add_edge((i + 1) as u32, i as u32, s);
        }
        g
    }

    #[test]
    fn greedy_walks_to_the_target() {
        let vectors = line_vectors(5);
        let graph = line_graph(&vectors);

        let out = greedy_search(&graph, &vectors, 0, vectors.column(4), 1, 3, None);
        assert_eq!(out.ids[0], 4);
        assert_eq!(out.scores[0], 0.0);
        assert!(out.visited.contains(&4));
    }

    #[test]
    fn greedy_returns_ascending_unique_ids() {
        let vectors = line_vectors(8);
        let graph = line_graph(&vectors);

        let out = greedy_search(&graph, &vectors, 0, vectors.column(5), 4, 6, None);
        assert_eq!(out.ids.len(), 4);
        let mut seen = out.ids.clone();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), 4);
        assert!(out.scores.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn prune_respects_degree_bound_and_scores() {
        let vectors = line_vectors(10);
        let mut graph = AdjacencyGraph::new(10);

        robust_prune(&mut graph, &vectors, 0, 1..10u32, 1.0, 3);

        assert!(graph.out_degree(0) <= 3);
        for &(score, dst) in graph.out_edges(0) {
            assert_ne!(dst, 0);
            let expect = sum_of_squares(vectors.column(0), vectors.column(dst as usize));
            assert_eq!(score, expect);
        }
        // The nearest candidate always survives pruning.
        assert!(graph.has_edge(0, 1));
    }

    #[test]
    fn prune_with_alpha_one_drops_covered_candidates() {
        // Points on a line: once 1 is chosen, everything farther in the same
        // direction is covered (d(1, x) < d(0, x) for x >= 2).
        let vectors = line_vectors(6);
        let mut graph = AdjacencyGraph::new(6);
        robust_prune(&mut graph, &vectors, 0, 1..6u32, 1.0, 5);
        assert_eq!(graph.out_degree(0), 1);
        assert!(graph.has_edge(0, 1));
    }

    #[test]
    fn medoid_of_symmetric_set_is_center() {
        let vectors = line_vectors(7);
        assert_eq!(medoid(&vectors), 3);
    }

    #[test]
    fn medoid_is_deterministic_under_ties() {
        // Two coincident points: smaller id wins.
        let vectors =
            ColMajorMatrix::from_columns(&[vec![1.0f32], vec![1.0], vec![4.0], vec![-2.0]])
                .unwrap();
        assert_eq!(medoid(&vectors), 0);
    }
}
