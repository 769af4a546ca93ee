use fenris_adapt::element::{NodalElement, QElement};
use fenris_adapt::mesh::procedural::{create_rectangular_uniform_box_mesh, create_rotated_quad_pair};
use fenris_adapt::mesh::{RefineableBrickMesh, RefineableQuadMesh};
use fenris_adapt::mesh::HangingNodeError;
use fenris_adapt::node::{Eqn, NodeId};
use fenris_adapt::settings::AdaptivitySettings;
use matrixcompare::{assert_matrix_eq, assert_scalar_eq};
use nalgebra::{DVector, Point2, Point3};

fn two_squares(nnode_1d: usize) -> RefineableQuadMesh {
    create_rectangular_uniform_box_mesh(1.0, [2, 1], 1, 1, AdaptivitySettings::default(), |_| {
        QElement::new(nnode_1d, 0)
    })
    .unwrap()
}

fn two_cubes() -> RefineableBrickMesh {
    create_rectangular_uniform_box_mesh(1.0, [2, 1, 1], 1, 1, AdaptivitySettings::default(), |_| {
        QElement::linear()
    })
    .unwrap()
}

fn refine_first_root<const D: usize>(mesh: &mut fenris_adapt::mesh::RefineableMesh<QElement<D>, D>) {
    let root = mesh.forest().root(0).tree();
    mesh.select_for_refinement(root);
    mesh.adapt().unwrap();
}

fn sorted_master_positions(mesh: &RefineableQuadMesh, node: NodeId) -> Vec<(Point2<f64>, f64)> {
    let mut masters: Vec<_> = mesh
        .node(node)
        .hang_info()
        .unwrap()
        .masters()
        .iter()
        .map(|&(master, w)| (*mesh.node(master).position(), w))
        .collect();
    masters.sort_by(|a, b| a.0.y.partial_cmp(&b.0.y).unwrap());
    masters
}

fn assert_masters(mesh: &RefineableQuadMesh, node: NodeId, expected: &[(Point2<f64>, f64)]) {
    let masters = sorted_master_positions(mesh, node);
    assert_eq!(masters.len(), expected.len());
    for ((position, weight), (expected_position, expected_weight)) in masters.iter().zip(expected) {
        assert_eq!(position, expected_position);
        assert_scalar_eq!(*weight, *expected_weight, comp = abs, tol = 1e-14);
    }
}

#[test]
fn one_level_mismatch_in_2d_has_two_masters() {
    let mut mesh = two_squares(2);
    refine_first_root(&mut mesh);

    let hanging = mesh.hanging_nodes();
    assert_eq!(hanging.len(), 1);
    let node = hanging[0];
    assert_eq!(mesh.node(node).position(), &Point2::new(1.0, 0.5));

    let hang = mesh.node(node).hang_info().unwrap();
    assert_eq!(hang.nmaster(), 2);
    assert_scalar_eq!(hang.weight_sum(), 1.0, comp = abs, tol = 1e-14);
    assert_masters(&mesh, node, &[(Point2::new(1.0, 0.0), 0.5), (Point2::new(1.0, 1.0), 0.5)]);
    for &(master, _) in hang.masters() {
        assert!(!mesh.node(master).is_hanging());
    }
}

#[test]
fn one_level_mismatch_in_2d_with_quadratic_elements() {
    let mut mesh = two_squares(3);
    refine_first_root(&mut mesh);

    let hanging = mesh.hanging_nodes();
    assert_eq!(hanging.len(), 2);
    for node in hanging {
        let hang = mesh.node(node).hang_info().unwrap();
        assert_eq!(hang.nmaster(), 3);
        assert_scalar_eq!(hang.weight_sum(), 1.0, comp = abs, tol = 1e-14);

        // The weights are the quadratic basis on the coarse edge at s = -1/2 or s = 1/2
        let mut weights: Vec<f64> = hang.masters().iter().map(|&(_, w)| w).collect();
        weights.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let weights = DVector::from_vec(weights);
        let expected = DVector::from_vec(vec![-0.125, 0.375, 0.75]);
        assert_matrix_eq!(weights, expected, comp = abs, tol = 1e-14);
    }
}

#[test]
fn one_level_mismatch_in_3d_has_two_or_four_masters() {
    let mut mesh = two_cubes();
    refine_first_root(&mut mesh);

    let hanging = mesh.hanging_nodes();
    assert_eq!(hanging.len(), 5);
    let mut nmasters: Vec<usize> = hanging
        .iter()
        .map(|&node| mesh.node(node).hang_info().unwrap().nmaster())
        .collect();
    nmasters.sort_unstable();
    assert_eq!(nmasters, vec![2, 2, 2, 2, 4]);

    for &node in &hanging {
        let hang = mesh.node(node).hang_info().unwrap();
        assert_scalar_eq!(hang.weight_sum(), 1.0, comp = abs, tol = 1e-14);
        let position = mesh.node(node).position();
        assert_eq!(position.x, 1.0);
        if position == &Point3::new(1.0, 0.5, 0.5) {
            for &(_, w) in hang.masters() {
                assert_scalar_eq!(w, 0.25, comp = abs, tol = 1e-14);
            }
        }
    }
}

#[test]
fn two_level_mismatch_constrains_to_the_coarsest_edge() {
    let mut mesh = two_squares(2);
    refine_first_root(&mut mesh);

    // Refine the son in the south east corner of the first square once more
    let root = mesh.forest().root(0).tree();
    let se = mesh.forest().arena().node(root).sons()[1];
    mesh.select_for_refinement(se);
    mesh.adapt().unwrap();

    // Two nodes hang on the edge of the second square, one on each of the two level 1
    // neighbours of the refined son
    let hanging = mesh.hanging_nodes();
    assert_eq!(hanging.len(), 4);
    for &node in &hanging {
        let hang = mesh.node(node).hang_info().unwrap();
        assert_eq!(hang.nmaster(), 2);
        assert_scalar_eq!(hang.weight_sum(), 1.0, comp = abs, tol = 1e-14);
        for &(master, _) in hang.masters() {
            assert!(!mesh.node(master).is_hanging());
        }
    }

    let on_interface: Vec<_> = hanging
        .into_iter()
        .filter(|&node| mesh.node(node).position().x == 1.0)
        .collect();
    assert_eq!(on_interface.len(), 2);
    for node in on_interface {
        let y = mesh.node(node).position().y;
        assert_masters(&mesh, node, &[(Point2::new(1.0, 0.0), 1.0 - y), (Point2::new(1.0, 1.0), y)]);
    }
    assert!(mesh.forest().self_test().is_ok());
}

#[test]
fn hanging_values_follow_their_masters() {
    let mut mesh = two_squares(2);
    let f = |p: &Point2<f64>| 2.0 * p.x - 3.0 * p.y + 1.0;
    mesh.set_values_from_function(0, f);
    refine_first_root(&mut mesh);

    for (_, node) in mesh.nodes().iter() {
        assert_scalar_eq!(node.value(0), f(node.position()), comp = abs, tol = 1e-14);
    }

    // Changing a master changes the hanging value
    let hanging = mesh.hanging_nodes()[0];
    let top = mesh
        .nodes()
        .iter()
        .find(|(_, node)| node.position() == &Point2::new(1.0, 1.0))
        .map(|(id, _)| id)
        .unwrap();
    let before = mesh.node(hanging).value(0);
    let top_value = mesh.node(top).value(0);
    mesh.node_mut(top).set_value(0, top_value + 1.0);
    mesh.update_hanging_values();
    assert_scalar_eq!(mesh.node(hanging).value(0), before + 0.5, comp = abs, tol = 1e-14);
}

#[test]
fn hanging_nodes_across_rotated_roots() {
    let mut mesh = create_rotated_quad_pair(2).unwrap();
    refine_first_root(&mut mesh);

    let hanging = mesh.hanging_nodes();
    assert_eq!(hanging.len(), 1);
    assert_eq!(mesh.node(hanging[0]).position(), &Point2::new(1.0, 0.5));
    assert_masters(
        &mesh,
        hanging[0],
        &[(Point2::new(1.0, 0.0), 0.5), (Point2::new(1.0, 1.0), 0.5)],
    );
}

#[test]
fn pinned_values_of_hanging_nodes_keep_their_values() {
    let mut mesh = two_squares(2);
    mesh.refine_uniformly().unwrap();
    let root = mesh.forest().root(0).tree();
    let ne = mesh.forest().arena().node(root).sons()[3];
    mesh.select_for_refinement(ne);
    mesh.adapt().unwrap();
    assert_eq!(mesh.hanging_nodes().len(), 3);

    let hanging = mesh.hanging_nodes()[0];
    mesh.pin_value(hanging, 0);
    mesh.node_mut(hanging).set_value(0, 42.0);
    assert_eq!(mesh.setup_hanging_nodes().unwrap(), 3);

    let node = mesh.node(hanging);
    assert!(node.is_hanging());
    assert!(!node.is_value_hanging(0));
    assert_eq!(node.hang_info().unwrap().pinned_values(), &[0]);
    mesh.update_hanging_values();
    assert_eq!(mesh.node(hanging).value(0), 42.0);
}

#[test]
fn partially_pinned_hanging_node_constrains_its_free_values() {
    // Value 0 is pinned on the face y = 0, value 1 is free everywhere
    let mut mesh: RefineableBrickMesh =
        create_rectangular_uniform_box_mesh(1.0, [2, 1, 1], 1, 2, AdaptivitySettings::default(), |_| {
            QElement::linear()
        })
        .unwrap();
    mesh.pin_boundary(2, 0);
    mesh.set_values_from_function(1, |p| p.z);
    refine_first_root(&mut mesh);
    assert_eq!(mesh.nodes().len(), 31);
    assert_eq!(mesh.hanging_nodes().len(), 5);

    let node = mesh
        .hanging_nodes()
        .into_iter()
        .find(|&id| mesh.node(id).position() == &Point3::new(1.0, 0.0, 0.5))
        .unwrap();
    assert!(!mesh.node(node).is_value_hanging(0));
    assert!(mesh.node(node).is_value_hanging(1));

    // 11 nodes lie on y = 0, and 5 nodes hang
    assert_eq!(mesh.assign_eqn_numbers().unwrap(), (31 - 11 - 4) + (31 - 5));
    assert_eq!(mesh.node(node).values()[0].eqn(), Eqn::Pinned);
    assert_eq!(mesh.node(node).values()[1].eqn(), Eqn::Hanging);
    assert!(mesh.value_equations(node, 0).is_empty());
    let equations = mesh.value_equations(node, 1);
    assert_eq!(equations.len(), 2);
    for (_, w) in equations {
        assert_scalar_eq!(w, 0.5, comp = abs, tol = 1e-14);
    }
    assert_scalar_eq!(mesh.node(node).value(1), 0.5, comp = abs, tol = 1e-14);
}

#[test]
fn lower_order_neighbour_constrains_the_shared_face() {
    let mut mesh = create_rectangular_uniform_box_mesh(1.0, [2, 1], 1, 1, AdaptivitySettings::default(), |cell| {
        QElement::<2>::new(2 + cell, 0)
    })
    .unwrap();
    assert_eq!(mesh.setup_hanging_nodes().unwrap(), 1);
    let hanging = mesh.hanging_nodes();
    assert_eq!(mesh.node(hanging[0]).position(), &Point2::new(1.0, 0.5));
    assert_masters(
        &mesh,
        hanging[0],
        &[(Point2::new(1.0, 0.0), 0.5), (Point2::new(1.0, 1.0), 0.5)],
    );
}

#[test]
fn finer_higher_order_sons_hang_on_a_lower_order_neighbour() {
    let mut mesh = create_rectangular_uniform_box_mesh(1.0, [2, 1], 1, 1, AdaptivitySettings::default(), |cell| {
        QElement::<2>::new(2 + cell, 0)
    })
    .unwrap();
    let second = mesh.forest().root(1).tree();
    mesh.select_for_refinement(second);
    mesh.adapt().unwrap();

    // The quadratic sons have five nodes on x = 1, the linear square only its two corners
    let hanging = mesh.hanging_nodes();
    assert_eq!(hanging.len(), 3);
    for node in hanging {
        let y = mesh.node(node).position().y;
        assert_eq!(mesh.node(node).position().x, 1.0);
        assert_masters(&mesh, node, &[(Point2::new(1.0, 0.0), 1.0 - y), (Point2::new(1.0, 1.0), y)]);
    }
}

#[test]
fn coarser_higher_order_neighbour_is_rejected() {
    let mut mesh = create_rectangular_uniform_box_mesh(1.0, [2, 1], 1, 1, AdaptivitySettings::default(), |cell| {
        QElement::<2>::new(2 + cell, 0)
    })
    .unwrap();
    let first = mesh.forest().root(0).tree();
    mesh.select_for_refinement(first);
    let result = mesh.adapt();
    assert!(matches!(
        result,
        Err(HangingNodeError::IncompatibleOrders {
            nnode_1d: 2,
            neighbour_nnode_1d: 3,
            ..
        })
    ));
}

#[test]
fn setup_is_idempotent() {
    let mut mesh = two_cubes();
    refine_first_root(&mut mesh);
    let first: Vec<_> = mesh
        .hanging_nodes()
        .into_iter()
        .map(|id| (id, mesh.node(id).hang_info().cloned()))
        .collect();
    assert_eq!(mesh.setup_hanging_nodes().unwrap(), first.len());
    let second: Vec<_> = mesh
        .hanging_nodes()
        .into_iter()
        .map(|id| (id, mesh.node(id).hang_info().cloned()))
        .collect();
    assert_eq!(first, second);
}

#[test]
fn leaf_nodes_include_hanging_nodes() {
    let mut mesh = two_squares(2);
    refine_first_root(&mut mesh);
    let hanging = mesh.hanging_nodes()[0];
    let users = mesh
        .leaves()
        .into_iter()
        .filter(|&leaf| mesh.element(leaf).node_ids().contains(&hanging))
        .count();
    assert_eq!(users, 2);
}
