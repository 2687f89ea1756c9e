//! Cluster hierarchy assembly and validation

use crate::error::CoreError;
use crate::types::Cluster;
use petgraph::algo::is_cyclic_directed;
use petgraph::graph::DiGraph;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A node in the assembled cluster hierarchy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterTreeNode {
    pub id: String,
    pub name: String,
    pub description: String,
    pub slug: String,
    pub count: usize,
    pub children: Vec<ClusterTreeNode>,
}

/// Assemble the flat cluster list into a forest rooted at clusters without a
/// parent, validating that parent links form a tree.
pub fn build_cluster_tree(clusters: &[Cluster]) -> Result<Vec<ClusterTreeNode>, CoreError> {
    validate_hierarchy(clusters)?;

    let mut children_of: HashMap<&str, Vec<&Cluster>> = HashMap::new();
    for cluster in clusters {
        if let Some(parent_id) = &cluster.parent_id {
            children_of
                .entry(parent_id.as_str())
                .or_default()
                .push(cluster);
        }
    }

    let mut roots: Vec<ClusterTreeNode> = clusters
        .iter()
        .filter(|c| c.parent_id.is_none())
        .map(|c| assemble(c, &children_of))
        .collect();
    roots.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(roots)
}

/// Depth of every cluster below its root (roots are level 0)
pub fn cluster_levels(clusters: &[Cluster]) -> Result<HashMap<String, usize>, CoreError> {
    let by_id: HashMap<&str, &Cluster> = clusters.iter().map(|c| (c.id.as_str(), c)).collect();

    let mut levels = HashMap::with_capacity(clusters.len());
    for cluster in clusters {
        let mut depth = 0usize;
        let mut current = cluster;
        while let Some(parent_id) = &current.parent_id {
            if depth > clusters.len() {
                return Err(CoreError::CycleDetected {
                    id: cluster.id.clone(),
                });
            }
            current = by_id
                .get(parent_id.as_str())
                .ok_or_else(|| CoreError::UnknownParent {
                    id: current.id.clone(),
                    parent_id: parent_id.clone(),
                })?;
            depth += 1;
        }
        levels.insert(cluster.id.clone(), depth);
    }
    Ok(levels)
}

/// Check that every parent reference resolves and no parent chain revisits a
/// node.
pub fn validate_hierarchy(clusters: &[Cluster]) -> Result<(), CoreError> {
    let mut graph = DiGraph::<&str, ()>::new();
    let mut nodes = HashMap::with_capacity(clusters.len());
    for cluster in clusters {
        nodes.insert(cluster.id.as_str(), graph.add_node(cluster.id.as_str()));
    }

    for cluster in clusters {
        if let Some(parent_id) = &cluster.parent_id {
            let parent = *nodes
                .get(parent_id.as_str())
                .ok_or_else(|| CoreError::UnknownParent {
                    id: cluster.id.clone(),
                    parent_id: parent_id.clone(),
                })?;
            graph.add_edge(parent, nodes[cluster.id.as_str()], ());
        }
    }

    if is_cyclic_directed(&graph) {
        return Err(CoreError::CycleDetected {
            id: find_cycle_member(clusters).unwrap_or_default(),
        });
    }
    Ok(())
}

/// Locate a cluster whose parent chain revisits a node. Each cluster has at
/// most one parent, so any cycle is reachable by chain-walking.
fn find_cycle_member(clusters: &[Cluster]) -> Option<String> {
    let by_id: HashMap<&str, &Cluster> = clusters.iter().map(|c| (c.id.as_str(), c)).collect();
    for cluster in clusters {
        let mut hops = 0usize;
        let mut current = cluster;
        while let Some(parent_id) = &current.parent_id {
            if hops > clusters.len() {
                return Some(cluster.id.clone());
            }
            match by_id.get(parent_id.as_str()) {
                Some(parent) => current = parent,
                None => break,
            }
            hops += 1;
        }
    }
    None
}

fn assemble(cluster: &Cluster, children_of: &HashMap<&str, Vec<&Cluster>>) -> ClusterTreeNode {
    let mut children: Vec<ClusterTreeNode> = children_of
        .get(cluster.id.as_str())
        .map(|kids| kids.iter().map(|kid| assemble(kid, children_of)).collect())
        .unwrap_or_default();
    children.sort_by(|a, b| a.name.cmp(&b.name));

    ClusterTreeNode {
        id: cluster.id.clone(),
        name: cluster.name.clone(),
        description: cluster.description.clone(),
        slug: cluster.slug.clone(),
        count: cluster.count(),
        children,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cluster(id: &str, name: &str, parent: Option<&str>) -> Cluster {
        Cluster {
            id: id.to_string(),
            name: name.to_string(),
            description: String::new(),
            slug: crate::types::slugify(name),
            chat_ids: vec![format!("chat-{id}")],
            parent_id: parent.map(String::from),
        }
    }

    #[test]
    fn test_tree_from_flat_clusters() {
        let clusters = vec![
            cluster("p", "Parent", None),
            cluster("a", "Alpha", Some("p")),
            cluster("b", "Beta", Some("p")),
            cluster("lone", "Lone", None),
        ];

        let roots = build_cluster_tree(&clusters).unwrap();
        assert_eq!(roots.len(), 2);
        assert_eq!(roots[0].name, "Lone");
        assert_eq!(roots[1].name, "Parent");
        assert_eq!(roots[1].children.len(), 2);
        assert_eq!(roots[1].children[0].name, "Alpha");
    }

    #[test]
    fn test_unknown_parent_rejected() {
        let clusters = vec![cluster("a", "Alpha", Some("missing"))];
        let err = build_cluster_tree(&clusters).unwrap_err();
        assert!(matches!(err, CoreError::UnknownParent { .. }));
    }

    #[test]
    fn test_cycle_rejected() {
        let clusters = vec![
            cluster("a", "Alpha", Some("b")),
            cluster("b", "Beta", Some("a")),
        ];
        let err = build_cluster_tree(&clusters).unwrap_err();
        assert!(matches!(err, CoreError::CycleDetected { .. }));
    }

    #[test]
    fn test_levels() {
        let clusters = vec![
            cluster("root", "Root", None),
            cluster("mid", "Mid", Some("root")),
            cluster("leaf", "Leaf", Some("mid")),
        ];

        let levels = cluster_levels(&clusters).unwrap();
        assert_eq!(levels["root"], 0);
        assert_eq!(levels["mid"], 1);
        assert_eq!(levels["leaf"], 2);
    }
}
