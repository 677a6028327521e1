//! End-to-end tests: populate raw containers the way the parsing stage
//! would, run the consolidation, and read the artifacts back.

use std::path::Path;

use tempfile::tempdir;
use waygraph::consolidate::{self, ConsolidateConfig, Containers, DEFAULT_SORT_MEMORY};
use waygraph::formats::{GraphFile, NamesFile, RawNamesFile, RestrictionsFile};
use waygraph::records::{Edge, Node, TurnRestriction, WayEndpoint, WeightSpec};
use waygraph::FixedCoord;

fn node(id: u64, lat_deg: f64, lon_deg: f64) -> Node {
    let coord = FixedCoord::from_degrees(lat_deg, lon_deg);
    Node {
        node_id: id,
        lat: coord.lat,
        lon: coord.lon,
        flags: 0,
    }
}

fn config(dir: &Path) -> ConsolidateConfig {
    ConsolidateConfig {
        sort_memory: DEFAULT_SORT_MEMORY,
        output_file: dir.join("out.graph"),
        restrictions_file: dir.join("out.restrictions"),
        names_file: dir.join("out.names"),
    }
}

/// A small scene exercising every artifact:
///
/// - nodes 1 and 2 are ~100 m apart (899 microdegree-of-latitude steps);
/// - node 5 exists but is unused, used id 77 references no node;
/// - two good edges 1→2 (one speed-based, one duration-based) plus one edge
///   with an unknown source and one with an unknown target;
/// - way 100 starts at via node 2 towards node 7, way 200 ends at via
///   node 2 coming from node 8; three restrictions of which only the first
///   is resolvable.
fn build_scene(workdir: &Path) -> Containers {
    let mut containers = Containers::create(workdir).unwrap();

    for id in [2u64, 77, 1, 2] {
        containers.used_node_ids.push(&id).unwrap();
    }
    for n in [
        node(5, 10.0, 10.0),
        node(2, 0.000899, 0.0),
        node(1, 0.0, 0.0),
    ] {
        containers.all_nodes.push(&n).unwrap();
    }

    containers
        .all_edges
        .push(&Edge::new(1, 2, 1, WeightSpec::Speed(36.0)))
        .unwrap();
    containers
        .all_edges
        .push(&Edge::new(1, 2, 2, WeightSpec::EdgeDuration(7.3)))
        .unwrap();
    containers
        .all_edges
        .push(&Edge::new(99, 2, 0, WeightSpec::Speed(50.0)))
        .unwrap();
    containers
        .all_edges
        .push(&Edge::new(1, 98, 0, WeightSpec::Speed(50.0)))
        .unwrap();

    containers
        .way_endpoints
        .push(&WayEndpoint {
            way_id: 100,
            first_source: 2,
            first_target: 7,
            last_source: 6,
            last_target: 7,
        })
        .unwrap();
    containers
        .way_endpoints
        .push(&WayEndpoint {
            way_id: 200,
            first_source: 8,
            first_target: 9,
            last_source: 8,
            last_target: 2,
        })
        .unwrap();

    // Resolvable: via 2 is the start of way 100 and the end of way 200.
    containers
        .restrictions
        .push(&TurnRestriction::new(100, 2, 200, false))
        .unwrap();
    // Via node interior to both ways: stays unresolved.
    containers
        .restrictions
        .push(&TurnRestriction::new(100, 999, 200, false))
        .unwrap();
    // Referenced way has no endpoint entry.
    containers
        .restrictions
        .push(&TurnRestriction::new(300, 2, 200, true))
        .unwrap();

    containers.names = RawNamesFile::write(
        workdir.join(consolidate::NAMES_RAW),
        &["", "Main St", &"x".repeat(260)],
    )
    .unwrap();

    containers
}

#[test]
fn test_full_consolidation() {
    let dir = tempdir().unwrap();
    let config = config(dir.path());
    let mut containers = build_scene(dir.path());

    let result = consolidate::run(&config, &mut containers).unwrap();
    assert_eq!(result.node_count, 2);
    assert_eq!(result.edge_count, 2);
    assert_eq!(result.restriction_count, 1);
    assert_eq!(result.name_count, 3);
    assert_eq!(result.dropped_edges, 2);

    // Nodes: exactly the used ids that exist, ascending.
    let (nodes, edges) = GraphFile::read_all(&config.output_file).unwrap();
    let ids: Vec<u64> = nodes.iter().map(|n| n.node_id).collect();
    assert_eq!(ids, vec![1, 2]);

    // Edges: 100 m at 36 km/h is 100 deciseconds; 7.3 s is 73.
    assert_eq!(edges.len(), 2);
    let mut weights: Vec<i32> = edges.iter().map(|e| e.weight).collect();
    weights.sort_unstable();
    assert_eq!(weights, vec![73, 100]);
    assert!(edges.iter().all(|e| e.source == 1 && e.target == 2));

    // Restrictions: only the resolvable one, with both neighbours filled.
    let restrictions = RestrictionsFile::read_all(&config.restrictions_file).unwrap();
    assert_eq!(restrictions.len(), 1);
    assert_eq!(restrictions[0].from_node, 7);
    assert_eq!(restrictions[0].via_node, 2);
    assert_eq!(restrictions[0].to_node, 8);
    assert!(!restrictions[0].is_only);

    // Names: clamped to 255 bytes, recoverable through the range table.
    let names = NamesFile::read_all(&config.names_file).unwrap();
    assert_eq!(names, vec!["".to_string(), "Main St".to_string(), "x".repeat(255)]);

    GraphFile::verify(&config.output_file).unwrap();
    RestrictionsFile::verify(&config.restrictions_file).unwrap();
    NamesFile::verify(&config.names_file).unwrap();
}

#[test]
fn test_consolidation_is_byte_idempotent() {
    let dir_a = tempdir().unwrap();
    let dir_b = tempdir().unwrap();
    let config_a = config(dir_a.path());
    let config_b = config(dir_b.path());

    let mut containers_a = build_scene(dir_a.path());
    let mut containers_b = build_scene(dir_b.path());

    consolidate::run(&config_a, &mut containers_a).unwrap();
    consolidate::run(&config_b, &mut containers_b).unwrap();

    for (a, b) in [
        (&config_a.output_file, &config_b.output_file),
        (&config_a.restrictions_file, &config_b.restrictions_file),
        (&config_a.names_file, &config_b.names_file),
    ] {
        assert_eq!(
            std::fs::read(a).unwrap(),
            std::fs::read(b).unwrap(),
            "{} differs between identical runs",
            a.file_name().unwrap().to_string_lossy()
        );
    }
}

#[test]
fn test_tiny_sort_budget_spills_and_agrees() {
    let dir = tempdir().unwrap();
    let mut config = config(dir.path());
    // Force every sort through the multi-run external path.
    config.sort_memory = 64;

    let mut containers = Containers::create(dir.path()).unwrap();
    // A few hundred nodes in a line, each ~111 m apart, edges chaining them.
    let count = 300u64;
    for i in (0..count).rev() {
        containers
            .all_nodes
            .push(&node(i + 1, i as f64 * 0.001, 0.0))
            .unwrap();
        containers.used_node_ids.push(&(i + 1)).unwrap();
        containers.used_node_ids.push(&(i + 1)).unwrap();
    }
    for i in 1..count {
        containers
            .all_edges
            .push(&Edge::new(i, i + 1, 0, WeightSpec::Speed(40.0)))
            .unwrap();
    }

    let result = consolidate::run(&config, &mut containers).unwrap();
    assert_eq!(result.node_count, count as u32);
    assert_eq!(result.edge_count, count as u32 - 1);
    assert_eq!(result.dropped_edges, 0);

    let (nodes, edges) = GraphFile::read_all(&config.output_file).unwrap();
    let ids: Vec<u64> = nodes.iter().map(|n| n.node_id).collect();
    assert_eq!(ids, (1..=count).collect::<Vec<_>>());

    // ~111 m at 40 km/h is ~100 deciseconds; allow fixed-point slack.
    assert!(edges.iter().all(|e| (e.weight - 100).abs() <= 2), "weights off");
}

#[test]
fn test_invalid_weight_type_aborts() {
    let dir = tempdir().unwrap();
    let config = config(dir.path());
    let mut containers = Containers::create(dir.path()).unwrap();

    containers.all_nodes.push(&node(1, 0.0, 0.0)).unwrap();
    containers.all_nodes.push(&node(2, 0.001, 0.0)).unwrap();
    containers.used_node_ids.push(&1).unwrap();
    containers.used_node_ids.push(&2).unwrap();
    containers
        .all_edges
        .push(&Edge::new(1, 2, 0, WeightSpec::Invalid))
        .unwrap();

    let err = consolidate::run(&config, &mut containers).unwrap_err();
    assert!(format!("{err:#}").contains("invalid weight type"), "{err:#}");
}

#[test]
fn test_broken_references_are_dropped_silently() {
    let dir = tempdir().unwrap();
    let config = config(dir.path());
    let mut containers = Containers::create(dir.path()).unwrap();

    containers.all_nodes.push(&node(1, 0.0, 0.0)).unwrap();
    containers.used_node_ids.push(&1).unwrap();
    // Both endpoints of the only edge are unknown nodes.
    containers
        .all_edges
        .push(&Edge::new(50, 60, 0, WeightSpec::Speed(30.0)))
        .unwrap();
    // The only restriction references ways nobody has endpoints for.
    containers
        .restrictions
        .push(&TurnRestriction::new(1, 2, 3, false))
        .unwrap();

    let result = consolidate::run(&config, &mut containers).unwrap();
    assert_eq!(result.node_count, 1);
    assert_eq!(result.edge_count, 0);
    assert_eq!(result.restriction_count, 0);
    assert_eq!(result.dropped_edges, 1);
}

#[test]
fn test_longer_edge_never_weighs_less() {
    // Same speed, growing distance: weights are monotone.
    let dir = tempdir().unwrap();
    let config = config(dir.path());
    let mut containers = Containers::create(dir.path()).unwrap();

    containers.all_nodes.push(&node(1, 0.0, 0.0)).unwrap();
    containers.used_node_ids.push(&1).unwrap();
    for (id, lat) in [(2u64, 0.001), (3, 0.002), (4, 0.005)] {
        containers.all_nodes.push(&node(id, lat, 0.0)).unwrap();
        containers.used_node_ids.push(&id).unwrap();
        containers
            .all_edges
            .push(&Edge::new(1, id, 0, WeightSpec::Speed(25.0)))
            .unwrap();
    }

    consolidate::run(&config, &mut containers).unwrap();
    let (_, edges) = GraphFile::read_all(&config.output_file).unwrap();
    let mut by_target: Vec<(u64, i32)> = edges.iter().map(|e| (e.target, e.weight)).collect();
    by_target.sort_unstable();
    assert_eq!(by_target.len(), 3);
    assert!(by_target[0].1 <= by_target[1].1 && by_target[1].1 <= by_target[2].1);
    assert!(by_target.iter().all(|&(_, w)| w >= 1));
}
