use fenris_adapt::element::{ElementState, QElement, RefineableElement};
use fenris_adapt::forest::{RootCell, TreeForest};
use fenris_adapt::node::NodeStore;
use fenris_adapt::quadtree::QuadSonType;
use fenris_adapt::topology::SonType;
use fenris_adapt::tree::TreeId;
use nalgebra::Point2;

fn unit_square_forest() -> TreeForest<QElement<2>, 2> {
    let cell = RootCell {
        object: QElement::new(2, 1),
        corner_vertices: vec![0, 1, 2, 3],
        corner_positions: vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(0.0, 1.0),
            Point2::new(1.0, 1.0),
        ],
    };
    TreeForest::new(vec![cell]).unwrap()
}

fn root_of(forest: &TreeForest<QElement<2>, 2>) -> TreeId {
    forest.root(0).tree()
}

#[test]
fn split_creates_sons_in_son_type_order() {
    let mut forest = unit_square_forest();
    let root = root_of(&forest);
    forest.arena_mut().object_mut(root).set_internal_value(0, 2.5);

    let sons = forest.arena_mut().split(root);
    assert_eq!(sons.len(), 4);

    let arena = forest.arena();
    assert_eq!(arena.len(), 5);
    assert!(!arena.node(root).is_leaf());
    assert!(arena.node(root).is_root());
    assert_eq!(arena.node(root).sons(), sons.as_slice());
    assert_eq!(arena.object(root).state(), ElementState::Inactive);

    let expected_indices = [[0, 0], [1, 0], [0, 1], [1, 1]];
    for (i, &son) in sons.iter().enumerate() {
        let node = arena.node(son);
        assert!(node.is_leaf());
        assert_eq!(node.level(), 1);
        assert_eq!(node.father(), Some(root));
        assert_eq!(node.root(), 0);
        assert_eq!(node.son_type(), Some(SonType::from_index(i)));
        assert_eq!(node.index(), &expected_indices[i]);
        assert_eq!(arena.object(son).tree_id(), Some(son));
        assert_eq!(arena.object(son).internal_value(0), 2.5);
        assert!(arena.object(son).is_active());
        assert_eq!(arena.node(root).son(SonType::from_index(i)), Some(son));
    }

    assert_eq!(forest.quad_son_type(sons[0]), Some(QuadSonType::SW));
    assert_eq!(forest.quad_son_type(sons[3]), Some(QuadSonType::NE));
    assert_eq!(forest.quad_son_type(root), None);
}

#[test]
fn son_boxes_map_to_root_coordinates() {
    let mut forest = unit_square_forest();
    let root = root_of(&forest);
    let sons = forest.arena_mut().split(root);
    let ne = forest.arena().node(sons[3]);

    assert_eq!(ne.root_local_box(), ([0.5, 0.5], 0.5));
    assert_eq!(ne.to_root_local(&[-1.0, 1.0]), [0.0, 1.0]);
    assert_eq!(ne.from_root_local(&[0.0, 1.0]), [-1.0, 1.0]);
    assert_eq!(forest.global_position(sons[3], &[-1.0, -1.0]), Point2::new(0.5, 0.5));
    assert_eq!(forest.global_position(sons[1], &[1.0, -1.0]), Point2::new(1.0, 0.0));
}

#[test]
fn traversals_visit_nodes_in_preorder() {
    let mut forest = unit_square_forest();
    let root = root_of(&forest);
    let sons = forest.arena_mut().split(root);
    let grandsons = forest.arena_mut().split(sons[1]);

    let mut all = Vec::new();
    forest.stick_all_tree_nodes_into_vector(&mut all);
    let mut expected = vec![root, sons[0], sons[1]];
    expected.extend_from_slice(&grandsons);
    expected.extend_from_slice(&sons[2..]);
    assert_eq!(all, expected);

    let mut leaves = Vec::new();
    forest.stick_leaves_into_vector(&mut leaves);
    let mut expected_leaves = vec![sons[0]];
    expected_leaves.extend_from_slice(&grandsons);
    expected_leaves.extend_from_slice(&sons[2..]);
    assert_eq!(leaves, expected_leaves);
    assert_eq!(forest.nleaf(), 7);

    let mut non_leaves = Vec::new();
    forest
        .arena()
        .traverse_all_but_leaves(root, |id, _| non_leaves.push(id));
    assert_eq!(non_leaves, vec![root, sons[1]]);

    let mut levels = Vec::new();
    forest
        .arena()
        .traverse_leaves(root, |_, node| levels.push(node.level()));
    assert_eq!(levels, vec![1, 2, 2, 2, 2, 1, 1]);
}

#[test]
fn merge_restores_father_and_invalidates_sons() {
    let mut forest = unit_square_forest();
    let mut nodes = NodeStore::<2>::new();
    let root = root_of(&forest);
    let sons = forest.arena_mut().split(root);
    for (i, &son) in sons.iter().enumerate() {
        forest
            .arena_mut()
            .object_mut(son)
            .set_internal_value(0, i as f64);
    }

    // Nothing happens unless the father asks for it
    assert!(!forest.arena_mut().merge_sons_if_required(root, &mut nodes));

    forest
        .arena_mut()
        .object_mut(root)
        .select_sons_for_unrefinement();
    assert!(forest.arena_mut().merge_sons_if_required(root, &mut nodes));

    let arena = forest.arena();
    assert_eq!(arena.len(), 1);
    assert!(arena.node(root).is_leaf());
    for son in sons {
        assert!(!arena.contains(son));
        assert!(arena.get(son).is_none());
    }
    let father = arena.object(root);
    assert!(father.is_active());
    assert!(!father.sons_to_be_unrefined());
    assert_eq!(father.internal_value(0), 1.5);
}

#[test]
fn merge_is_refused_when_a_son_is_refined() {
    let mut forest = unit_square_forest();
    let mut nodes = NodeStore::<2>::new();
    let root = root_of(&forest);
    let sons = forest.arena_mut().split(root);
    forest.arena_mut().split(sons[0]);

    forest
        .arena_mut()
        .object_mut(root)
        .select_sons_for_unrefinement();
    assert!(!forest.arena_mut().merge_sons_if_required(root, &mut nodes));
    assert_eq!(forest.arena().len(), 9);
    assert!(!forest.arena().object(root).sons_to_be_unrefined());
}

#[test]
fn split_followed_by_merge_preserves_constant_internal_data() {
    let mut forest = unit_square_forest();
    let mut nodes = NodeStore::<2>::new();
    let root = root_of(&forest);
    forest.arena_mut().object_mut(root).set_internal_value(0, 0.75);

    forest.arena_mut().split(root);
    forest
        .arena_mut()
        .object_mut(root)
        .select_sons_for_unrefinement();
    forest.arena_mut().merge_sons_if_required(root, &mut nodes);
    assert_eq!(forest.arena().object(root).internal_value(0), 0.75);
}

#[test]
#[should_panic]
fn splitting_a_non_leaf_panics() {
    let mut forest = unit_square_forest();
    let root = root_of(&forest);
    forest.arena_mut().split(root);
    forest.arena_mut().split(root);
}

#[test]
#[should_panic]
fn constructing_sons_out_of_order_panics() {
    let mut forest = unit_square_forest();
    let root = root_of(&forest);
    forest
        .arena_mut()
        .construct_son(QElement::new(2, 1), root, SonType::from_index(1));
}
