use fenris_adapt::element::{NodalElement, QElement, RefineableElement};
use fenris_adapt::mesh::procedural::{
    create_rectangular_uniform_box_mesh, create_unit_box_refineable_brick_mesh, create_unit_line_refineable_mesh,
    create_unit_square_refineable_quad_mesh,
};
use fenris_adapt::mesh::{AdaptationSummary, MeshError, RefineableQuadMesh};
use fenris_adapt::quadtree::QuadSonType;
use fenris_adapt::settings::AdaptivitySettings;
use fenris_adapt::topology::SonType;
use matrixcompare::assert_scalar_eq;
use nalgebra::Point2;

/// Two unit squares side by side along x, with bilinear elements.
fn two_squares(settings: AdaptivitySettings) -> RefineableQuadMesh {
    create_rectangular_uniform_box_mesh(1.0, [2, 1], 1, 1, settings, |_| QElement::new(2, 0)).unwrap()
}

#[test]
fn single_quad_root_splits_into_four_sons() {
    let mut mesh = create_unit_square_refineable_quad_mesh(1, 2).unwrap();
    assert_eq!(mesh.nleaf(), 1);
    assert_eq!(mesh.nodes().len(), 4);

    let summary = mesh.refine_uniformly().unwrap();
    assert_eq!(
        summary,
        AdaptationSummary {
            nrefined: 1,
            nunrefined: 0,
            np_refined: 0,
            np_unrefined: 0,
            npruned: 0,
            nhanging: 0,
            nleaf: 4,
        }
    );

    let leaves = mesh.leaves();
    assert_eq!(leaves.len(), 4);
    for (i, &leaf) in leaves.iter().enumerate() {
        assert_eq!(mesh.level(leaf), 1);
        assert_eq!(
            mesh.forest().quad_son_type(leaf),
            Some(QuadSonType::from_son_type(SonType::from_index(i)))
        );
        assert_eq!(mesh.element(leaf).node_ids().len(), 4);
    }
    assert_eq!(mesh.nodes().len(), 9);

    // The sons share the nodes of the father and the new mid-edge and centre nodes
    let ne = mesh.element(leaves[3]);
    assert_eq!(mesh.node(ne.node_ids()[0]).position(), &Point2::new(0.5, 0.5));
    assert_eq!(mesh.node(ne.node_ids()[3]).position(), &Point2::new(1.0, 1.0));
    let sw = mesh.element(leaves[0]);
    assert_eq!(sw.node_ids()[3], ne.node_ids()[0]);
}

#[test]
fn single_brick_root_splits_into_eight_sons() {
    let mut mesh = create_unit_box_refineable_brick_mesh(1, 2).unwrap();
    let summary = mesh.refine_uniformly().unwrap();
    assert_eq!(summary.nleaf, 8);
    assert_eq!(summary.nhanging, 0);
    assert_eq!(mesh.nodes().len(), 27);
    for leaf in mesh.leaves() {
        assert_eq!(mesh.level(leaf), 1);
    }
}

#[test]
fn line_mesh_refines_into_two_sons() {
    let mut mesh = create_unit_line_refineable_mesh(2, 3).unwrap();
    assert_eq!(mesh.nodes().len(), 5);
    let first = mesh.leaves()[0];
    mesh.select_for_refinement(first);
    let summary = mesh.adapt().unwrap();
    assert_eq!(summary.nleaf, 3);
    assert_eq!(summary.nhanging, 0);
    assert_eq!(mesh.nodes().len(), 7);
}

#[test]
fn quadratic_son_nodes_reuse_father_nodes() {
    let mut mesh = create_unit_square_refineable_quad_mesh(1, 3).unwrap();
    assert_eq!(mesh.nodes().len(), 9);
    mesh.refine_uniformly().unwrap();
    assert_eq!(mesh.nodes().len(), 25);
    assert_eq!(mesh.lattice_extent(), 60 << 30);
}

#[test]
fn new_nodes_interpolate_father_values() {
    let mut mesh = create_unit_square_refineable_quad_mesh(1, 3).unwrap();
    let f = |p: &Point2<f64>| 1.0 + p.x * p.x - 2.0 * p.x * p.y + 0.5 * p.y;
    mesh.set_values_from_function(0, f);
    mesh.refine_uniformly().unwrap();

    // Biquadratic elements reproduce the quadratic function exactly
    for (_, node) in mesh.nodes().iter() {
        assert_scalar_eq!(node.value(0), f(node.position()), comp = abs, tol = 1e-13);
    }
}

#[test]
fn unrefinement_restores_the_original_mesh() {
    let mut mesh = two_squares(AdaptivitySettings::default());
    let root = mesh.forest().root(0).tree();
    mesh.select_for_refinement(root);
    let summary = mesh.adapt().unwrap();
    assert_eq!(summary.nleaf, 5);
    assert_eq!(mesh.nodes().len(), 11);

    mesh.select_sons_for_unrefinement(root);
    let summary = mesh.adapt().unwrap();
    assert_eq!(summary.nunrefined, 1);
    assert_eq!(summary.npruned, 5);
    assert_eq!(summary.nhanging, 0);
    assert_eq!(summary.nleaf, 2);
    assert_eq!(mesh.nodes().len(), 6);
    assert!(mesh.element(root).is_active());
    assert!(mesh.hanging_nodes().is_empty());
    assert_eq!(mesh.forest().arena().len(), 2);
}

#[test]
fn merge_keeps_constant_internal_data() {
    let mut mesh = create_unit_square_refineable_quad_mesh(1, 2).unwrap();
    let root = mesh.forest().root(0).tree();
    mesh.element_mut(root).set_internal_value(0, 4.0);
    mesh.refine_uniformly().unwrap();
    for leaf in mesh.leaves() {
        assert_eq!(mesh.element(leaf).internal_value(0), 4.0);
    }
    mesh.select_sons_for_unrefinement(root);
    mesh.adapt().unwrap();
    assert_eq!(mesh.element(root).internal_value(0), 4.0);
}

#[test]
fn refinement_stops_at_the_maximum_level() {
    let settings = AdaptivitySettings {
        max_refinement_level: 1,
        ..AdaptivitySettings::default()
    };
    let mut mesh = two_squares(settings);
    mesh.refine_uniformly().unwrap();
    assert_eq!(mesh.nleaf(), 8);

    let summary = mesh.refine_uniformly().unwrap();
    assert_eq!(summary.nrefined, 0);
    assert_eq!(mesh.nleaf(), 8);
    for leaf in mesh.leaves() {
        assert!(!mesh.element(leaf).to_be_refined());
    }
}

#[test]
fn unrefinement_stops_at_the_minimum_level() {
    let settings = AdaptivitySettings {
        min_refinement_level: 1,
        ..AdaptivitySettings::default()
    };
    let mut mesh = two_squares(settings);
    mesh.refine_uniformly().unwrap();
    mesh.refine_uniformly().unwrap();
    assert_eq!(mesh.nleaf(), 32);

    let mut fathers = Vec::new();
    mesh.forest().stick_all_tree_nodes_into_vector(&mut fathers);
    fathers.retain(|&id| !mesh.forest().arena().node(id).is_leaf());
    for &father in &fathers {
        mesh.select_sons_for_unrefinement(father);
    }
    let summary = mesh.adapt().unwrap();

    // Level 1 fathers merge, the roots keep their sons
    assert_eq!(summary.nunrefined, 8);
    assert_eq!(mesh.nleaf(), 8);
    for leaf in mesh.leaves() {
        assert_eq!(mesh.level(leaf), 1);
    }
}

#[test]
fn pinned_boundaries_apply_to_new_nodes() {
    let mut mesh = create_unit_square_refineable_quad_mesh(1, 2).unwrap();
    // Boundaries are numbered by root face: west, east, south, north
    for boundary in 0..4 {
        mesh.pin_boundary(boundary, 0);
    }
    assert!(mesh.nodes().iter().all(|(_, node)| node.values()[0].is_pinned()));

    mesh.refine_uniformly().unwrap();
    let free: Vec<_> = mesh
        .nodes()
        .iter()
        .filter(|(_, node)| !node.values()[0].is_pinned())
        .collect();
    assert_eq!(free.len(), 1);
    assert_eq!(free[0].1.position(), &Point2::new(0.5, 0.5));
    assert!(free[0].1.boundaries().is_empty());

    let corner = mesh
        .nodes()
        .iter()
        .find(|(_, node)| node.position() == &Point2::new(1.0, 0.0))
        .map(|(_, node)| node.boundaries().to_vec());
    assert_eq!(corner, Some(vec![1, 2]));
}

#[test]
fn pin_and_unpin_single_values() {
    let mut mesh = create_unit_square_refineable_quad_mesh(1, 2).unwrap();
    let id = mesh.nodes().ids()[0];
    mesh.pin_value(id, 0);
    assert!(mesh.node(id).has_pinned_value());
    mesh.unpin_value(id, 0);
    assert!(!mesh.node(id).has_pinned_value());
}

#[test]
fn stale_handles_are_detected_after_merge() {
    let mut mesh = create_unit_square_refineable_quad_mesh(1, 2).unwrap();
    let root = mesh.forest().root(0).tree();
    mesh.refine_uniformly().unwrap();
    let sons = mesh.leaves();
    let centre = mesh.element(sons[0]).node_ids()[3];

    mesh.select_sons_for_unrefinement(root);
    mesh.adapt().unwrap();
    assert!(sons.iter().all(|&son| mesh.forest().arena().get(son).is_none()));
    assert!(mesh.nodes().get(centre).is_none());
}

#[test]
fn invalid_settings_are_rejected() {
    let settings = AdaptivitySettings {
        min_refinement_level: 3,
        max_refinement_level: 2,
        ..AdaptivitySettings::default()
    };
    let result = create_rectangular_uniform_box_mesh(1.0, [1, 1], 1, 1, settings, |_| QElement::<2>::linear());
    assert!(matches!(result, Err(MeshError::Settings(_))));
}

#[test]
fn roots_of_different_order_share_their_corner_nodes() {
    let mesh = create_rectangular_uniform_box_mesh(1.0, [2, 1], 1, 1, AdaptivitySettings::default(), |cell| {
        QElement::<2>::new(2 + cell, 0)
    })
    .unwrap();
    assert_eq!(mesh.nodes().len(), 11);

    let [first, second] = [mesh.forest().root(0).tree(), mesh.forest().root(1).tree()];
    assert_eq!(mesh.element(first).nnode_1d(), 2);
    assert_eq!(mesh.element(second).nnode_1d(), 3);
    let shared: Vec<_> = mesh
        .element(first)
        .node_ids()
        .iter()
        .filter(|id| mesh.element(second).node_ids().contains(id))
        .map(|&id| *mesh.node(id).position())
        .collect();
    assert_eq!(shared, vec![Point2::new(1.0, 0.0), Point2::new(1.0, 1.0)]);
}

#[test]
fn too_many_nodes_per_axis_are_rejected() {
    let result = create_rectangular_uniform_box_mesh(1.0, [2, 1], 1, 1, AdaptivitySettings::default(), |cell| {
        QElement::<2>::new(2 + 6 * cell, 0)
    });
    assert_eq!(
        result.err(),
        Some(MeshError::UnsupportedNodeCount { root: 1, nnode_1d: 8 })
    );
}
