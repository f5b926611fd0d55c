use k8s_openapi::api::core::v1::{Node, Taint};

/// A node's current taints; a missing spec or taints field reads as empty.
pub(crate) fn node_taints(node: &Node) -> &[Taint] {
    node.spec
        .as_ref()
        .and_then(|spec| spec.taints.as_deref())
        .unwrap_or_default()
}

/// Full-scan candidate filter: keeps nodes carrying any taint at all.
/// Exact matching happens in the diff.
pub(crate) fn tainted_nodes(nodes: Vec<Node>) -> Vec<Node> {
    nodes
        .into_iter()
        .filter(|node| !node_taints(node).is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use k8s_openapi::api::core::v1::{Node, NodeSpec, Taint};
    use kube::api::ObjectMeta;

    use super::{node_taints, tainted_nodes};

    fn make_node(name: &str, taints: Option<Vec<Taint>>) -> Node {
        Node {
            metadata: ObjectMeta {
                name: Some(name.into()),
                ..Default::default()
            },
            spec: Some(NodeSpec {
                taints,
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn make_taint(key: &str) -> Taint {
        Taint {
            key: key.into(),
            effect: "NoSchedule".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_node_taints_missing_fields_read_empty() {
        let bare = Node::default();
        assert!(node_taints(&bare).is_empty());
        assert!(node_taints(&make_node("a", None)).is_empty());
        assert_eq!(node_taints(&make_node("a", Some(vec![make_taint("k")]))).len(), 1);
    }

    #[test]
    fn test_tainted_nodes_keeps_only_tainted() {
        let nodes = vec![
            make_node("tainted", Some(vec![make_taint("k")])),
            make_node("clean", Some(Vec::new())),
            make_node("no-spec", None),
        ];

        let selected = tainted_nodes(nodes);

        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].metadata.name.as_deref(), Some("tainted"));
    }
}
