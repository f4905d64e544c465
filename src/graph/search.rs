//! Depth-first path search over an explicit stack.
//!
//! The stack always holds the current root-to-top path, so a successful
//! search returns it directly. Each frame keeps a cursor over its remaining
//! neighbours, so every vertex is expanded once. No recursion: call depth
//! stays constant on long chains.

use std::collections::HashSet;
use std::hash::Hash;
use std::vec::IntoIter;

/// Find any path from `start` to `target`, expanding vertices with `neighbours`.
///
/// Returns the vertices root-first, or `None` if `target` is unreachable.
/// There is no shortest-path guarantee.
pub fn depth_first_path<T, F>(start: &T, target: &T, mut neighbours: F) -> Option<Vec<T>>
where
    T: Eq + Hash + Clone,
    F: FnMut(&T) -> Vec<T>,
{
    if start == target {
        return Some(vec![start.clone()]);
    }

    let mut visited: HashSet<T> = HashSet::new();
    visited.insert(start.clone());
    let mut path: Vec<T> = vec![start.clone()];
    let mut cursors: Vec<IntoIter<T>> = vec![neighbours(start).into_iter()];

    while let Some(cursor) = cursors.last_mut() {
        match cursor.find(|candidate| !visited.contains(candidate)) {
            Some(vertex) => {
                if vertex == *target {
                    path.push(vertex);
                    return Some(path);
                }
                visited.insert(vertex.clone());
                cursors.push(neighbours(&vertex).into_iter());
                path.push(vertex);
            }
            None => {
                // Dead end, backtrack
                cursors.pop();
                path.pop();
            }
        }
    }

    None
}
