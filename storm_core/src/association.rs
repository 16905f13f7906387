//! One-to-one assignment of previous objects to current objects.
//!
//! # Algorithm
//! 1. Every (previous, current) pair that passed the distance gate becomes a
//!    [`Candidate`] of the [`CandidateGraph`].
//! 2. Candidates are split into independent groups: two objects share a group
//!    when a chain of candidates links them ([`DisjointSets`]).
//! 3. Each group is solved as a rectangular minimum-cost assignment with the
//!    smaller side as rows, so every object on that side is paired. Pairs that
//!    are not candidates are priced at the unmatched cost and dropped again.

use nalgebra::DMatrix;
use std::collections::BTreeMap;

/// A gated pairing of previous object `previous` with current object `current`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Candidate {
    pub previous: usize,
    pub current: usize,
    /// Distance between predicted and observed centres (pixels)
    pub distance: f64,
}

/// Candidate pairs between `n_previous` previous and `n_current` current
/// objects, both indexed from 0.
#[derive(Clone, Debug, Default)]
pub struct CandidateGraph {
    pub n_previous: usize,
    pub n_current: usize,
    pub candidates: Vec<Candidate>,
}

impl CandidateGraph {
    pub fn new(n_previous: usize, n_current: usize) -> Self {
        Self {
            n_previous,
            n_current,
            candidates: Vec::new(),
        }
    }

    pub fn add(&mut self, previous: usize, current: usize, distance: f64) {
        debug_assert!(previous < self.n_previous && current < self.n_current);
        self.candidates.push(Candidate {
            previous,
            current,
            distance,
        });
    }

    /// Independent groups of candidates, ordered by their lowest previous index.
    fn groups(&self) -> Vec<Group> {
        let mut sets = DisjointSets::new(self.n_previous + self.n_current);
        for c in &self.candidates {
            sets.union(c.previous, self.n_previous + c.current);
        }

        let mut by_root: BTreeMap<usize, Group> = BTreeMap::new();
        for c in &self.candidates {
            let group = by_root.entry(sets.find(c.previous)).or_default();
            group.previous.push(c.previous);
            group.current.push(c.current);
            group.candidates.push(*c);
        }

        let mut groups: Vec<Group> = by_root.into_values().collect();
        for g in &mut groups {
            g.previous.sort_unstable();
            g.previous.dedup();
            g.current.sort_unstable();
            g.current.dedup();
        }
        groups.sort_by_key(|g| g.previous[0]);
        groups
    }
}

#[derive(Debug, Default)]
struct Group {
    previous: Vec<usize>,
    current: Vec<usize>,
    candidates: Vec<Candidate>,
}

/// Best one-to-one matching over the candidates of `graph`. Entry `i` holds
/// the current object paired with previous object `i`, if any.
///
/// `unmatched_cost` prices a pair that is not a candidate; it should exceed
/// every candidate distance.
pub fn assign(graph: &CandidateGraph, unmatched_cost: f64) -> Vec<Option<usize>> {
    let mut matches = vec![None; graph.n_previous];
    for group in graph.groups() {
        // Rows are the smaller side
        let by_current = group.previous.len() > group.current.len();
        let (rows, cols) = if by_current {
            (&group.current, &group.previous)
        } else {
            (&group.previous, &group.current)
        };

        let mut cost = DMatrix::from_element(rows.len(), cols.len(), unmatched_cost);
        let mut is_candidate = DMatrix::from_element(rows.len(), cols.len(), false);
        for c in &group.candidates {
            let (row, col) = if by_current {
                (c.current, c.previous)
            } else {
                (c.previous, c.current)
            };
            // Both sides are sorted and contain every candidate endpoint
            let (Ok(r), Ok(k)) = (rows.binary_search(&row), cols.binary_search(&col)) else {
                continue;
            };
            cost[(r, k)] = c.distance;
            is_candidate[(r, k)] = true;
        }

        for (r, k) in min_cost_assignment(&cost).into_iter().enumerate() {
            if !is_candidate[(r, k)] {
                continue;
            }
            let (previous, current) = if by_current {
                (cols[k], rows[r])
            } else {
                (rows[r], cols[k])
            };
            matches[previous] = Some(current);
        }
    }
    matches
}

/// Minimum-cost assignment of every row of `cost` to a distinct column
/// (shortest augmenting paths with dual potentials). Requires
/// `nrows <= ncols`; returns the column of each row.
fn min_cost_assignment(cost: &DMatrix<f64>) -> Vec<usize> {
    let (n, m) = cost.shape();
    debug_assert!(n <= m);
    // Index 0 is a virtual column; rows and columns are 1-based below
    let mut row_potential = vec![0.0_f64; n + 1];
    let mut col_potential = vec![0.0_f64; m + 1];
    let mut owner = vec![0usize; m + 1];
    let mut came_from = vec![0usize; m + 1];

    for row in 1..=n {
        owner[0] = row;
        let mut col = 0usize;
        let mut slack = vec![f64::INFINITY; m + 1];
        let mut visited = vec![false; m + 1];

        // Grow the alternating tree until it reaches a free column
        loop {
            visited[col] = true;
            let r = owner[col];
            let mut delta = f64::INFINITY;
            let mut next = 0usize;
            for c in 1..=m {
                if visited[c] {
                    continue;
                }
                let reduced = cost[(r - 1, c - 1)] - row_potential[r] - col_potential[c];
                if reduced < slack[c] {
                    slack[c] = reduced;
                    came_from[c] = col;
                }
                if slack[c] < delta {
                    delta = slack[c];
                    next = c;
                }
            }
            for c in 0..=m {
                if visited[c] {
                    row_potential[owner[c]] += delta;
                    col_potential[c] -= delta;
                } else {
                    slack[c] -= delta;
                }
            }
            col = next;
            if owner[col] == 0 {
                break;
            }
        }

        // Flip the path back to the virtual column
        while col != 0 {
            let from = came_from[col];
            owner[col] = owner[from];
            col = from;
        }
    }

    let mut assignment = vec![0usize; n];
    for c in 1..=m {
        if owner[c] != 0 {
            assignment[owner[c] - 1] = c - 1;
        }
    }
    assignment
}

// ---------------------------------------------------------------------------
// Disjoint sets
// ---------------------------------------------------------------------------

/// Disjoint-set forest with union by size and full path compression. Also
/// used to label connected regions of a grid.
pub(crate) struct DisjointSets {
    parent: Vec<usize>,
    size: Vec<usize>,
}

impl DisjointSets {
    pub(crate) fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            size: vec![1; n],
        }
    }

    pub(crate) fn find(&mut self, x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut node = x;
        while node != root {
            let up = self.parent[node];
            self.parent[node] = root;
            node = up;
        }
        root
    }

    /// Merge the sets of `a` and `b`; false if they were already one set.
    pub(crate) fn union(&mut self, a: usize, b: usize) -> bool {
        let (mut big, mut small) = (self.find(a), self.find(b));
        if big == small {
            return false;
        }
        if self.size[big] < self.size[small] {
            std::mem::swap(&mut big, &mut small);
        }
        self.parent[small] = big;
        self.size[big] += self.size[small];
        true
    }
}
