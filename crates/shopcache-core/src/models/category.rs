use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::utils::cmp_ignore_case;

/// A catalog category as persisted in the store.
///
/// Child lists are not stored; they are derived from parent pointers
/// when a hierarchy is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: u64,
    pub name: String,
    pub active: bool,
    pub parent_id: Option<u64>,
}

impl Category {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// A category with its children resolved, ordered alphabetically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct CategoryNode {
    pub id: u64,
    pub name: String,
    pub active: bool,
    pub parent_id: Option<u64>,
    pub is_root: bool,
    pub has_children: bool,
    pub children: Vec<CategoryNode>,
}

impl CategoryNode {
    /// Ids of the direct children, in display order.
    pub fn child_ids(&self) -> Vec<u64> {
        self.children.iter().map(|c| c.id).collect()
    }

    /// Total number of nodes in this subtree, including self.
    pub fn subtree_len(&self) -> usize {
        1 + self.children.iter().map(|c| c.subtree_len()).sum::<usize>()
    }
}

/// Build the parent/children tree from a flat category list.
///
/// A category whose parent is unknown is promoted to a root. Categories
/// caught in a parent cycle are unreachable from any root and get the
/// same treatment, so every input category appears exactly once.
pub fn build_hierarchy(categories: Vec<Category>) -> Vec<CategoryNode> {
    let by_id: HashMap<u64, Category> = categories.into_iter().map(|c| (c.id, c)).collect();

    let mut children: HashMap<u64, Vec<u64>> = HashMap::new();
    let mut roots: Vec<u64> = Vec::new();

    for category in by_id.values() {
        match category.parent_id {
            Some(parent) if parent != category.id && by_id.contains_key(&parent) => {
                children.entry(parent).or_default().push(category.id);
            }
            Some(parent) => {
                debug!(category_id = category.id, parent_id = parent, "Unknown parent, promoting to root");
                roots.push(category.id);
            }
            None => roots.push(category.id),
        }
    }

    let mut visited: HashSet<u64> = HashSet::new();
    let mut nodes: Vec<CategoryNode> = roots
        .iter()
        .filter_map(|id| build_node(*id, &by_id, &children, &mut visited))
        .collect();

    // Anything not visited sits in a parent cycle
    let mut orphaned: Vec<u64> = by_id
        .keys()
        .filter(|id| !visited.contains(id))
        .copied()
        .collect();
    orphaned.sort_unstable();
    for id in orphaned {
        if visited.contains(&id) {
            continue;
        }
        warn!(category_id = id, "Category parent chain forms a cycle, promoting to root");
        if let Some(mut node) = build_node(id, &by_id, &children, &mut visited) {
            node.is_root = true;
            node.parent_id = None;
            nodes.push(node);
        }
    }

    sort_nodes(&mut nodes);
    nodes
}

fn build_node(
    id: u64,
    by_id: &HashMap<u64, Category>,
    children: &HashMap<u64, Vec<u64>>,
    visited: &mut HashSet<u64>,
) -> Option<CategoryNode> {
    if !visited.insert(id) {
        return None;
    }
    let category = by_id.get(&id)?;

    let mut child_nodes: Vec<CategoryNode> = children
        .get(&id)
        .map(|ids| {
            ids.iter()
                .filter_map(|child| build_node(*child, by_id, children, visited))
                .collect()
        })
        .unwrap_or_default();
    sort_nodes(&mut child_nodes);

    let parent_known = category
        .parent_id
        .is_some_and(|p| p != id && by_id.contains_key(&p));

    Some(CategoryNode {
        id,
        name: category.name.clone(),
        active: category.active,
        parent_id: if parent_known { category.parent_id } else { None },
        is_root: !parent_known,
        has_children: !child_nodes.is_empty(),
        children: child_nodes,
    })
}

fn sort_nodes(nodes: &mut [CategoryNode]) {
    nodes.sort_by(|a, b| cmp_ignore_case(&a.name, &b.name).then_with(|| a.id.cmp(&b.id)));
}
