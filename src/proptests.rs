use super::*;

use proptest::prelude::*;
use proptest_derive::Arbitrary;
use std::collections::BTreeSet;
use std::io::Cursor;
use std::ops::ControlFlow;

const ITEM: NodeType = NodeType::from_fourcc(*b"ITEM");
const LEAF: NodeType = NodeType::from_fourcc(*b"LEAF");

fn preorder<P>(t: &Tree<P>, node: NodeHandle, out: &mut Vec<NodeHandle>) {
    out.push(node);
    for &child in t.children(node) {
        preorder(t, child, out);
    }
}

fn postorder<P>(t: &Tree<P>, node: NodeHandle, out: &mut Vec<NodeHandle>) {
    for &child in t.children(node) {
        postorder(t, child, out);
    }
    out.push(node);
}

fn walk_order<P>(t: &mut Tree<P>, start: NodeHandle, timing: Timing, scope: Scope) -> Vec<NodeHandle> {
    let mut seen = Vec::new();
    let aborted = t.walk(start, timing, scope, |_, n| {
        seen.push(n);
        ControlFlow::Continue(())
    });
    assert!(!aborted);
    seen
}

fn validate_tree<P>(t: &mut Tree<P>) {
    let issues = t.verify_integrity();
    assert!(issues.is_empty(), "integrity issues: {issues:?}");

    let root = t.root();
    let mut pre = Vec::new();
    preorder(t, root, &mut pre);
    let mut post = Vec::new();
    postorder(t, root, &mut post);

    assert_eq!(
        walk_order(t, root, Timing::OnEntry, Scope::WholeTree),
        pre,
        "entry walk must be pre-order"
    );
    assert_eq!(
        walk_order(t, root, Timing::OnExit, Scope::WholeTree),
        post,
        "exit walk must be post-order"
    );

    for &node in &pre {
        let mut expected = Vec::new();
        preorder(t, node, &mut expected);
        assert_eq!(
            walk_order(t, node, Timing::OnEntry, Scope::ThisBranch),
            expected,
            "branch walk must stay inside the branch"
        );
    }

    let unique: BTreeSet<_> = pre.iter().collect();
    assert_eq!(unique.len(), pre.len(), "every node visited exactly once");
    assert_eq!(t.visited.depth(), 1);
}

fn live(t: &Tree<u32>) -> Vec<NodeHandle> {
    t.nodes.iter().map(|(h, _)| h).collect()
}

#[derive(Clone, Debug, Arbitrary)]
enum Op {
    #[proptest(weight = 4)]
    Create,
    #[proptest(weight = 6)]
    Attach(usize, usize, #[proptest(strategy = "0..8usize")] usize),
    Detach(usize),
    #[proptest(weight = 2)]
    Move(usize, usize, #[proptest(strategy = "0..8usize")] usize),
    Delete(usize),
    Prune(usize),
    /// Entry walk that gives every leaf carrying an even payload a new child.
    GrowLeaves,
}

fn pick(nodes: &[NodeHandle], i: usize) -> NodeHandle {
    nodes[i % nodes.len()]
}

fn apply(t: &mut Tree<u32>, op: Op) {
    let nodes = live(t);
    match op {
        Op::Create => {
            let id = t.allocate_id();
            let ty = if id.get() % 2 == 0 { ITEM } else { LEAF };
            t.create(ty, id, id.get() as u32);
        }
        Op::Attach(p, c, index) => {
            let (parent, child) = (pick(&nodes, p), pick(&nodes, c));
            let before = t.children(parent).to_vec();
            match t.insert_child_at(parent, child, index) {
                Ok(()) => {
                    let at = index.min(before.len());
                    assert_eq!(t.child(parent, at), Some(child));
                    assert_eq!(t.child_count(parent), before.len() + 1);
                }
                Err(Error::AlreadyAttached(_)) => assert!(t.parent(child).is_some()),
                Err(Error::RootProtected) => assert!(t.is_root(child)),
                Err(Error::WouldCycle { .. }) => assert!(t.is_ancestor_or_self(child, parent)),
                Err(err) => panic!("unexpected error: {err}"),
            }
            if t.parent(child) != Some(parent) {
                assert_eq!(t.children(parent), before.as_slice());
            }
        }
        Op::Detach(n) => {
            let node = pick(&nodes, n);
            t.detach(node).unwrap();
            assert_eq!(t.parent(node), None);
        }
        Op::Move(n, p, index) => {
            let (node, parent) = (pick(&nodes, n), pick(&nodes, p));
            let old_parent = t.parent(node);
            match t.move_to(node, parent, index) {
                Ok(()) if old_parent.is_some() => assert_eq!(t.parent(node), Some(parent)),
                Ok(()) => assert_eq!(t.parent(node), None),
                Err(Error::RootProtected) => assert!(t.is_root(node)),
                Err(Error::WouldCycle { .. }) => assert_eq!(t.parent(node), old_parent),
                Err(err) => panic!("unexpected error: {err}"),
            }
        }
        Op::Delete(n) => {
            let node = pick(&nodes, n);
            let children = t.children(node).to_vec();
            match t.delete(node) {
                Ok(_) => {
                    assert!(!t.contains(node));
                    assert!(children.iter().all(|&c| t.parent(c).is_none()));
                }
                Err(Error::RootProtected) => assert!(t.is_root(node)),
                Err(err) => panic!("unexpected error: {err}"),
            }
        }
        Op::Prune(n) => {
            let node = pick(&nodes, n);
            let mut doomed = Vec::new();
            preorder(t, node, &mut doomed);
            let before = t.len();
            t.prune(node).unwrap();
            let removed = doomed.iter().filter(|&&h| !t.is_root(h)).count();
            assert_eq!(t.len(), before - removed);
            assert!(doomed.iter().all(|&h| t.is_root(h) || !t.contains(h)));
        }
        Op::GrowLeaves => {
            let root = t.root();
            let mut grown = 0usize;
            t.walk(root, Timing::OnEntry, Scope::WholeTree, |w, n| {
                if grown < 16 && w.child_count(n) == 0 && w.payload(n).is_some_and(|p| p % 2 == 0) {
                    let id = w.allocate_id();
                    let child = w.create(LEAF, id, 1);
                    w.insert_child(n, child).unwrap();
                    grown += 1;
                }
                ControlFlow::Continue(())
            });
        }
    }
}

fn shape(t: &mut Tree<u32>) -> Vec<(usize, NodeType, NodeId, u16)> {
    let root = t.root();
    walk_order(t, root, Timing::OnEntry, Scope::WholeTree)
        .into_iter()
        .map(|n| {
            let node = t.node(n).unwrap();
            (t.depth_of(n), node.node_type(), node.id(), node.flags())
        })
        .collect()
}

/// Builds an attached tree from `parents[i] % (i + 1)` picks: node `i + 1`
/// hangs under one of the nodes created before it (0 is the root).
fn build_shape(parents: &[(usize, u16)]) -> Tree<u32> {
    let mut t = Tree::with_root(0);
    let mut nodes = vec![t.root()];
    for (i, &(p, flags)) in parents.iter().enumerate() {
        let id = t.allocate_id();
        let node = t.create(if i % 3 == 0 { LEAF } else { ITEM }, id, id.get() as u32);
        t.set_flags(node, flags).unwrap();
        t.insert_child(nodes[p % nodes.len()], node).unwrap();
        nodes.push(node);
    }
    t
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        max_shrink_iters: 10_000,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_ops_keep_tree_valid(ops in prop::collection::vec(any::<Op>(), 0..=120)) {
        let mut t: Tree<u32> = Tree::new();
        for op in ops {
            apply(&mut t, op);
            prop_assert!(t.verify_integrity().is_empty(), "{:?}", t.verify_integrity());
        }
        validate_tree(&mut t);
    }

    #[test]
    fn prop_binary_round_trip(parents in prop::collection::vec((any::<usize>(), any::<u16>()), 0..=80)) {
        let mut t = build_shape(&parents);
        let mut buf = Cursor::new(Vec::new());
        let written = t.write(&mut buf, &mut 0, FORMAT_VERSION).unwrap();

        let mut restored: Tree<u32> = Tree::new();
        let consumed = restored
            .read(&mut buf, &mut 0, FORMAT_VERSION, |ty: NodeType| Some(ty.get()))
            .unwrap();
        prop_assert_eq!(consumed, written);
        prop_assert_eq!(shape(&mut restored), shape(&mut t));
        validate_tree(&mut restored);
    }

    #[cfg(feature = "xml")]
    #[test]
    fn prop_xml_round_trip(parents in prop::collection::vec((any::<usize>(), any::<u16>()), 0..=80)) {
        let mut t = build_shape(&parents);
        let text = t.to_xml_string();

        let mut restored: Tree<u32> = Tree::new();
        restored
            .read_xml(&text, |elem| {
                let (ty, id, flags) = structural_fields(elem)?;
                Some(NewNode::new(ty, id, 0).with_flags(flags))
            })
            .unwrap();
        prop_assert_eq!(shape(&mut restored), shape(&mut t));
    }
}

fn for_each_permutation<T: Clone>(items: &[T], mut f: impl FnMut(Vec<T>)) {
    fn rec<T: Clone>(items: &[T], used: &mut [bool], out: &mut Vec<T>, f: &mut impl FnMut(Vec<T>)) {
        if out.len() == items.len() {
            f(out.clone());
            return;
        }
        for i in 0..items.len() {
            if used[i] {
                continue;
            }
            used[i] = true;
            out.push(items[i].clone());
            rec(items, used, out, f);
            out.pop();
            used[i] = false;
        }
    }

    let mut used = vec![false; items.len()];
    let mut out = Vec::with_capacity(items.len());
    rec(items, &mut used, &mut out, &mut f);
}

#[test]
fn exhaustive_insert_order_keeps_sorted_children() {
    let labels: Vec<u32> = (1..=6).collect();

    for_each_permutation(&labels, |perm| {
        let mut t: Tree<u32> = Tree::new();
        let root = t.root();
        for label in perm {
            let node = t.create(ITEM, NodeId(label as u16), label);
            // Position among the siblings already present keeps the array sorted.
            let index = t
                .children(root)
                .iter()
                .filter(|&&c| t.payload(c).is_some_and(|&p| p < label))
                .count();
            t.insert_child_at(root, node, index).unwrap();
        }
        let got: Vec<u32> = t.children(root).iter().map(|&c| *t.payload(c).unwrap()).collect();
        assert_eq!(got, labels);
        validate_tree(&mut t);
    });
}

#[test]
fn exhaustive_delete_order_small_tree() {
    // root -> 1 -> {2, 3 -> 4}, root -> 5 -> 6
    let mut base: Tree<u32> = Tree::new();
    let root = base.root();
    let nodes: Vec<NodeHandle> = (1..=6).map(|i| base.create(ITEM, NodeId(i), i as u32)).collect();
    base.insert_child(root, nodes[0]).unwrap();
    base.insert_child(nodes[0], nodes[1]).unwrap();
    base.insert_child(nodes[0], nodes[2]).unwrap();
    base.insert_child(nodes[2], nodes[3]).unwrap();
    base.insert_child(root, nodes[4]).unwrap();
    base.insert_child(nodes[4], nodes[5]).unwrap();

    for_each_permutation(&nodes, |perm| {
        let mut t = base.clone();
        for node in perm {
            t.delete(node).unwrap();
            validate_tree(&mut t);
        }
        assert_eq!(t.len(), 1);
        assert_eq!(t.child_count(root), 0);
    });
}

#[test]
fn test_randomized_prune_matches_model() {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    let mut rng = StdRng::seed_from_u64(1);
    for _ in 0..50 {
        let parents: Vec<(usize, u16)> = (0..rng.gen_range(1..200))
            .map(|_| (rng.gen(), 0))
            .collect();
        let mut t = build_shape(&parents);
        let before: BTreeSet<NodeHandle> = live(&t).into_iter().collect();

        let all = live(&t);
        let target = all[rng.gen_range(0..all.len())];
        let mut doomed = Vec::new();
        preorder(&t, target, &mut doomed);
        let doomed: BTreeSet<NodeHandle> = doomed.into_iter().filter(|&h| !t.is_root(h)).collect();

        t.prune(target).unwrap();
        let after: BTreeSet<NodeHandle> = live(&t).into_iter().collect();
        let expected: BTreeSet<NodeHandle> = before.difference(&doomed).copied().collect();
        assert_eq!(after, expected);
        validate_tree(&mut t);
    }
}

#[test]
fn test_randomized_find_by_id() {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    let mut rng = StdRng::seed_from_u64(2);
    let parents: Vec<(usize, u16)> = (0..500).map(|_| (rng.gen(), 0)).collect();
    let mut t = build_shape(&parents);
    for _ in 0..200 {
        let id = NodeId(rng.gen_range(1..=600));
        let expected = live(&t).into_iter().find(|&h| t.node_id(h) == Some(id));
        assert_eq!(t.find_node_by_id(id), expected);
    }
}
