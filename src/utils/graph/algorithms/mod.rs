//! Graph algorithms for program analysis.
//!
//! # Available Algorithms
//!
//! ## Traversal
//!
//! - [`dfs`] - Depth-first preorder traversal
//! - [`reachable`] - Reachability from a set of roots
//!
//! ## Dominator Analysis
//!
//! - [`compute_dominators`] - Compute the dominator tree using Lengauer-Tarjan
//! - [`DominatorTree`] - Result of dominator computation
//!
//! | Algorithm | Time Complexity | Use Case |
//! |-----------|-----------------|----------|
//! | DFS/BFS | O(V + E) | General traversal, dead block detection |
//! | Dominators | O(E log V) | Loop analysis |

mod dominators;
mod traversal;

pub use dominators::{compute_dominators, DominatorIterator, DominatorTree};
pub use traversal::{dfs, reachable, Dfs};
