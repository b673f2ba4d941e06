// ─────────────────────────────────────────────────────────────────────
// Mean-Field IIM — Adjacency Model
// ─────────────────────────────────────────────────────────────────────
//! Dense symmetric adjacency matrix for the spin network.
//!
//! Stored row-major (`a[i * n + j]`). Construction guarantees:
//! A = Aᵀ, diag(A) = 0, all entries finite. Immutable afterwards.

use iim_types::{IimError, IimResult};

const SYMMETRY_TOL: f64 = 1e-12;

/// Immutable graph: node count plus dense adjacency.
#[derive(Debug, Clone, PartialEq)]
pub struct Graph {
    n: usize,
    adjacency: Vec<f64>,
}

impl Graph {
    /// Graph with `n` nodes and no edges.
    pub fn empty(n: usize) -> IimResult<Self> {
        if n == 0 {
            return Err(IimError::Validation(
                "graph must have at least one node".to_string(),
            ));
        }
        Ok(Self {
            n,
            adjacency: vec![0.0; n * n],
        })
    }

    /// Build from a row-major n×n weight matrix.
    pub fn from_dense(n: usize, adjacency: Vec<f64>) -> IimResult<Self> {
        if n == 0 {
            return Err(IimError::Validation(
                "graph must have at least one node".to_string(),
            ));
        }
        if adjacency.len() != n * n {
            return Err(IimError::Validation(format!(
                "adjacency length {} does not match {n}x{n}",
                adjacency.len()
            )));
        }
        if adjacency.iter().any(|w| !w.is_finite()) {
            return Err(IimError::Validation(
                "adjacency contains NaN or Inf".to_string(),
            ));
        }
        for i in 0..n {
            if adjacency[i * n + i] != 0.0 {
                return Err(IimError::Validation(format!(
                    "adjacency diagonal must be zero, A[{i},{i}] = {}",
                    adjacency[i * n + i]
                )));
            }
            for j in (i + 1)..n {
                if (adjacency[i * n + j] - adjacency[j * n + i]).abs() > SYMMETRY_TOL {
                    return Err(IimError::Validation(format!(
                        "adjacency must be symmetric, A[{i},{j}] != A[{j},{i}]"
                    )));
                }
            }
        }
        Ok(Self { n, adjacency })
    }

    /// Build an unweighted undirected graph from an edge list.
    ///
    /// Duplicate edges collapse to weight 1.0.
    pub fn from_edges(n: usize, edges: &[(usize, usize)]) -> IimResult<Self> {
        let mut g = Self::empty(n)?;
        for &(i, j) in edges {
            if i >= n || j >= n {
                return Err(IimError::Validation(format!(
                    "edge ({i}, {j}) out of range for {n} nodes"
                )));
            }
            if i == j {
                return Err(IimError::Validation(format!("self-loop on node {i}")));
            }
            g.adjacency[i * n + j] = 1.0;
            g.adjacency[j * n + i] = 1.0;
        }
        Ok(g)
    }

    pub fn node_count(&self) -> usize {
        self.n
    }

    /// Row-major n×n adjacency.
    pub fn adjacency(&self) -> &[f64] {
        &self.adjacency
    }

    /// Row `i` of the adjacency matrix.
    #[inline]
    pub fn row(&self, i: usize) -> &[f64] {
        &self.adjacency[i * self.n..(i + 1) * self.n]
    }

    #[inline]
    pub fn weight(&self, i: usize, j: usize) -> f64 {
        self.adjacency[i * self.n + j]
    }

    /// Weighted degree Σ_j A_ij.
    pub fn degree(&self, i: usize) -> f64 {
        self.row(i).iter().sum()
    }

    /// Number of undirected edges with non-zero weight.
    pub fn edge_count(&self) -> usize {
        let n = self.n;
        (0..n)
            .flat_map(|i| ((i + 1)..n).map(move |j| (i, j)))
            .filter(|&(i, j)| self.adjacency[i * n + j] != 0.0)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path3() -> Graph {
        Graph::from_edges(3, &[(0, 1), (1, 2)]).unwrap()
    }

    #[test]
    fn test_path_symmetric() {
        let g = path3();
        for i in 0..3 {
            for j in 0..3 {
                assert_eq!(g.weight(i, j), g.weight(j, i), "A[{i},{j}] != A[{j},{i}]");
            }
        }
    }

    #[test]
    fn test_path_zero_diagonal() {
        let g = path3();
        for i in 0..3 {
            assert_eq!(g.weight(i, i), 0.0);
        }
    }

    #[test]
    fn test_path_degrees() {
        let g = path3();
        assert_eq!(g.degree(0), 1.0);
        assert_eq!(g.degree(1), 2.0);
        assert_eq!(g.degree(2), 1.0);
        assert_eq!(g.edge_count(), 2);
    }

    #[test]
    fn test_row_slice() {
        let g = path3();
        assert_eq!(g.row(1), &[1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_empty_graph() {
        let g = Graph::empty(4).unwrap();
        assert_eq!(g.node_count(), 4);
        assert_eq!(g.edge_count(), 0);
        assert!(g.adjacency().iter().all(|&w| w == 0.0));
    }

    #[test]
    fn test_zero_nodes_rejected() {
        assert!(Graph::empty(0).is_err());
        assert!(Graph::from_dense(0, vec![]).is_err());
    }

    #[test]
    fn test_dense_asymmetric_rejected() {
        let a = vec![0.0, 1.0, 0.0, 0.0];
        assert!(matches!(
            Graph::from_dense(2, a),
            Err(IimError::Validation(_))
        ));
    }

    #[test]
    fn test_dense_diagonal_rejected() {
        let a = vec![1.0, 0.0, 0.0, 0.0];
        assert!(Graph::from_dense(2, a).is_err());
    }

    #[test]
    fn test_dense_wrong_length_rejected() {
        assert!(Graph::from_dense(3, vec![0.0; 4]).is_err());
    }

    #[test]
    fn test_dense_weighted_accepted() {
        let a = vec![0.0, 0.5, 0.5, 0.0];
        let g = Graph::from_dense(2, a).unwrap();
        assert_eq!(g.weight(0, 1), 0.5);
    }

    #[test]
    fn test_self_loop_rejected() {
        assert!(Graph::from_edges(3, &[(1, 1)]).is_err());
    }

    #[test]
    fn test_edge_out_of_range_rejected() {
        assert!(Graph::from_edges(3, &[(0, 3)]).is_err());
    }
}
