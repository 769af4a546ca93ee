use fenris_adapt::element::{NodalElement, PRefineableElement, QElement};
use fenris_adapt::mesh::procedural::{create_rectangular_uniform_box_mesh, create_unit_square_refineable_quad_mesh};
use fenris_adapt::mesh::RefineableQuadMesh;
use fenris_adapt::settings::{AdaptivitySettings, MAX_NNODE_1D};
use matrixcompare::assert_scalar_eq;
use nalgebra::Point2;

fn two_linear_squares() -> RefineableQuadMesh {
    create_rectangular_uniform_box_mesh(1.0, [2, 1], 1, 1, AdaptivitySettings::default(), |_| {
        QElement::new(2, 0)
    })
    .unwrap()
}

#[test]
fn raising_the_order_interpolates_the_previous_field() {
    let mut mesh = create_unit_square_refineable_quad_mesh(1, 2).unwrap();
    let f = |p: &Point2<f64>| 1.0 + 2.0 * p.x - p.y + 3.0 * p.x * p.y;
    mesh.set_values_from_function(0, f);
    let leaf = mesh.leaves()[0];

    assert!(mesh.p_refine(leaf, 1));
    let element = mesh.element(leaf);
    assert_eq!(element.nnode_1d(), 3);
    assert_eq!(element.p_order(), 3);
    assert_eq!(element.initial_p_order(), 2);
    assert_eq!(element.node_ids().len(), 9);
    assert_eq!(mesh.nodes().len(), 9);
    assert_eq!(mesh.prune_dead_nodes(), 0);

    // The bilinear field is represented exactly at the new nodes
    for (_, node) in mesh.nodes().iter() {
        assert_scalar_eq!(node.value(0), f(node.position()), comp = abs, tol = 1e-14);
    }
}

#[test]
fn lowering_the_order_removes_nodes() {
    let mut mesh = create_unit_square_refineable_quad_mesh(1, 3).unwrap();
    let leaf = mesh.leaves()[0];
    assert!(mesh.p_refine(leaf, -1));
    assert_eq!(mesh.element(leaf).nnode_1d(), 2);
    assert_eq!(mesh.prune_dead_nodes(), 5);
    assert_eq!(mesh.nodes().len(), 4);
    assert_eq!(mesh.element(leaf).initial_p_order(), 3);
}

#[test]
fn order_is_limited() {
    let mut mesh = create_unit_square_refineable_quad_mesh(1, 2).unwrap();
    let leaf = mesh.leaves()[0];
    assert!(!mesh.p_refine(leaf, -1));
    assert_eq!(mesh.element(leaf).nnode_1d(), 2);

    assert!(mesh.p_refine(leaf, 10));
    assert_eq!(mesh.element(leaf).nnode_1d(), MAX_NNODE_1D);
    assert!(!mesh.p_refine(leaf, 1));
    assert_eq!(mesh.nodes().len(), MAX_NNODE_1D * MAX_NNODE_1D);
}

#[test]
fn p_adapt_constrains_the_higher_order_side() {
    let mut mesh = two_linear_squares();
    let second = mesh.forest().root(1).tree();

    mesh.select_for_p_refinement(second);
    let summary = mesh.p_adapt().unwrap();
    assert_eq!(summary.np_refined, 1);
    assert_eq!(summary.np_unrefined, 0);
    assert_eq!(summary.npruned, 0);
    assert_eq!(summary.nhanging, 1);
    assert_eq!(summary.nleaf, 2);
    assert_eq!(mesh.nodes().len(), 11);
    assert!(!mesh.element(second).to_be_p_refined());

    let hanging = mesh.hanging_nodes()[0];
    assert_eq!(mesh.node(hanging).position(), &Point2::new(1.0, 0.5));
    // The free values are the nodes of both squares except the hanging one
    assert_eq!(mesh.assign_eqn_numbers().unwrap(), 10);

    mesh.select_for_p_unrefinement(second);
    let summary = mesh.p_adapt().unwrap();
    assert_eq!(summary.np_unrefined, 1);
    assert_eq!(summary.npruned, 5);
    assert_eq!(summary.nhanging, 0);
    assert_eq!(mesh.nodes().len(), 6);
    assert_eq!(mesh.assign_eqn_numbers().unwrap(), 6);
}

#[test]
fn merging_restores_father_nodes_unused_by_the_sons() {
    let mut mesh = create_unit_square_refineable_quad_mesh(1, 4).unwrap();
    let root = mesh.forest().root(0).tree();
    mesh.refine_uniformly().unwrap();
    assert_eq!(mesh.nodes().len(), 49);

    // Quadratic sons no longer use the nodes at one and two thirds of the father
    for leaf in mesh.leaves() {
        assert!(mesh.p_refine(leaf, -1));
    }
    assert_eq!(mesh.prune_dead_nodes(), 28);
    assert_eq!(mesh.active_nodes().len(), 25);
    assert_eq!(mesh.nodes().len(), 37);

    let g = |p: &Point2<f64>| 1.0 + p.x * p.x - p.x * p.y;
    for id in mesh.active_nodes() {
        let value = g(mesh.node(id).position());
        mesh.node_mut(id).set_value(0, value);
    }

    mesh.select_sons_for_unrefinement(root);
    let summary = mesh.adapt().unwrap();
    assert_eq!(summary.nunrefined, 1);
    assert_eq!(mesh.element(root).nnode_1d(), 4);
    assert_eq!(mesh.nodes().len(), 16);
    for (_, node) in mesh.nodes().iter() {
        assert_scalar_eq!(node.value(0), g(node.position()), comp = abs, tol = 1e-13);
    }
}
