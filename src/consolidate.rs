//! Map-data consolidation pipeline
//!
//! Takes the unsorted containers deposited by the parsing stage and turns
//! them into the three routing artifacts, in a fixed order:
//!
//! 1. Turn restrictions: way references resolved to node references through
//!    two sort + merge-join passes against the way endpoint table, then
//!    written (unresolved ones dropped).
//! 2. Nodes: used node ids sorted and deduplicated, all nodes sorted, the
//!    intersection streamed into the graph file.
//! 3. Edges: two sort + merge-join passes against the sorted node table
//!    attach source coordinates and compute weights; edges that never got a
//!    weight are dropped at write time.
//! 4. Names: clamped and written as a range-table index plus byte blob.
//!
//! Everything runs single-threaded over containers that may exceed RAM;
//! only the external sorter parallelizes internally.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::container::ExternalVec;
use crate::formats::{GraphWriter, NamesFile, RawNamesFile, RestrictionsFile};
use crate::geo::flat_earth_distance;
use crate::join::{inner_join, semi_join_update};
use crate::records::{Edge, Node, TurnRestriction, WayEndpoint, WeightSpec};
use crate::sort::ExternalSorter;

pub const DEFAULT_SORT_MEMORY: usize = 1 << 30;

/// Conventional container file names inside a working directory.
pub const USED_NODES_RAW: &str = "used_nodes.raw";
pub const NODES_RAW: &str = "nodes.raw";
pub const EDGES_RAW: &str = "edges.raw";
pub const RESTRICTIONS_RAW: &str = "restrictions.raw";
pub const WAY_ENDPOINTS_RAW: &str = "way_endpoints.raw";
pub const NAMES_RAW: &str = "names.raw";

pub struct ConsolidateConfig {
    /// Byte budget for any one external sort pass.
    pub sort_memory: usize,
    pub output_file: PathBuf,
    pub restrictions_file: PathBuf,
    pub names_file: PathBuf,
}

/// The containers deposited by the upstream parser. Consolidation consumes
/// them destructively: they are re-sorted and rewritten in place.
pub struct Containers {
    pub used_node_ids: ExternalVec<u64>,
    pub all_nodes: ExternalVec<Node>,
    pub all_edges: ExternalVec<Edge>,
    pub restrictions: ExternalVec<TurnRestriction>,
    pub way_endpoints: ExternalVec<WayEndpoint>,
    pub names: RawNamesFile,
}

impl Containers {
    /// Open the containers a parser run left in `workdir`.
    pub fn open(workdir: &Path) -> Result<Self> {
        Ok(Self {
            used_node_ids: ExternalVec::open(workdir.join(USED_NODES_RAW))?,
            all_nodes: ExternalVec::open(workdir.join(NODES_RAW))?,
            all_edges: ExternalVec::open(workdir.join(EDGES_RAW))?,
            restrictions: ExternalVec::open(workdir.join(RESTRICTIONS_RAW))?,
            way_endpoints: ExternalVec::open(workdir.join(WAY_ENDPOINTS_RAW))?,
            names: RawNamesFile::open(workdir.join(NAMES_RAW))?,
        })
    }

    /// Create empty containers for a parser to fill. The name table starts
    /// with the empty string at id 0.
    pub fn create(workdir: &Path) -> Result<Self> {
        Ok(Self {
            used_node_ids: ExternalVec::create(workdir.join(USED_NODES_RAW))?,
            all_nodes: ExternalVec::create(workdir.join(NODES_RAW))?,
            all_edges: ExternalVec::create(workdir.join(EDGES_RAW))?,
            restrictions: ExternalVec::create(workdir.join(RESTRICTIONS_RAW))?,
            way_endpoints: ExternalVec::create(workdir.join(WAY_ENDPOINTS_RAW))?,
            names: RawNamesFile::write(workdir.join(NAMES_RAW), &[""])?,
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ConsolidateResult {
    pub node_count: u32,
    pub edge_count: u32,
    pub restriction_count: u32,
    pub name_count: u32,
    pub dropped_edges: u64,
}

/// Run the full consolidation: restrictions, nodes, edges, names.
pub fn run(config: &ConsolidateConfig, containers: &mut Containers) -> Result<ConsolidateResult> {
    let start = Instant::now();
    let sorter = ExternalSorter::new(config.sort_memory);

    println!(
        "Consolidating map data (sort budget {} MiB)",
        config.sort_memory >> 20
    );

    let timer = Instant::now();
    println!("Resolving turn restrictions...");
    resolve_restrictions(&sorter, containers).context("prepare_restrictions")?;
    let restriction_count =
        RestrictionsFile::write(&config.restrictions_file, containers.restrictions.iter()?)
            .context("write_restrictions")?;
    println!(
        "  ✓ {} usable restrictions ({:.2}s)",
        restriction_count,
        timer.elapsed().as_secs_f64()
    );

    let timer = Instant::now();
    println!("Consolidating nodes...");
    sorter
        .sort_by_key(&mut containers.used_node_ids, |id| *id)
        .context("sort_used_nodes")?;
    containers
        .used_node_ids
        .dedup_sorted()
        .context("dedup_used_nodes")?;
    sorter
        .sort_by_key(&mut containers.all_nodes, |n| n.node_id)
        .context("sort_nodes")?;

    let mut graph = GraphWriter::create(&config.output_file)?;
    inner_join(
        &mut containers.used_node_ids,
        &mut containers.all_nodes,
        |id| *id,
        |n| n.node_id,
        |_, node| graph.push_node(node),
    )
    .context("write_nodes")?;
    println!("  ✓ Wrote used nodes ({:.2}s)", timer.elapsed().as_secs_f64());

    let timer = Instant::now();
    println!("Attaching edge coordinates...");
    sorter
        .sort_by_key(&mut containers.all_edges, |e| e.source)
        .context("sort_edges_by_source")?;
    semi_join_update(
        &mut containers.all_edges,
        &mut containers.all_nodes,
        |e| e.source,
        |n| n.node_id,
        |edge, node| {
            edge.source_coord = node.coord();
            Ok(())
        },
    )
    .context("set_source_coordinates")?;
    println!("  ✓ Source pass done ({:.2}s)", timer.elapsed().as_secs_f64());

    let timer = Instant::now();
    println!("Computing edge weights...");
    sorter
        .sort_by_key(&mut containers.all_edges, |e| e.target)
        .context("sort_edges_by_target")?;
    let mut without_source_coord = 0u64;
    let target_stats = semi_join_update(
        &mut containers.all_edges,
        &mut containers.all_nodes,
        |e| e.target,
        |n| n.node_id,
        |edge, node| {
            if !edge.source_coord.is_set() {
                without_source_coord += 1;
                return Ok(());
            }
            let distance = flat_earth_distance(edge.source_coord, node.coord());
            let weight = match edge.weight {
                WeightSpec::EdgeDuration(duration) | WeightSpec::WayDuration(duration) => {
                    duration * 10.0
                }
                WeightSpec::Speed(speed_km_h) => (distance * 10.0) / (speed_km_h / 3.6),
                WeightSpec::Invalid => bail!("compute_weights: invalid weight type"),
            };
            edge.result_weight = ((weight + 0.5).floor() as i32).max(1);
            Ok(())
        },
    )
    .context("compute_weights")?;
    println!("  ✓ Weight pass done ({:.2}s)", timer.elapsed().as_secs_f64());

    let timer = Instant::now();
    println!("Writing used edges...");
    graph.begin_edges()?;
    for edge in containers.all_edges.iter()? {
        let edge = edge?;
        if edge.result_weight > 0 {
            graph.push_edge(&edge)?;
        }
    }
    let (node_count, edge_count) = graph.finish().context("write_edges")?;
    let dropped_edges = containers.all_edges.len() - edge_count as u64;
    if dropped_edges > 0 {
        log::warn!(
            "{} edges dropped: {} without a target node, {} without a source coordinate",
            dropped_edges,
            target_stats.unmatched_left,
            without_source_coord
        );
    }
    println!(
        "  ✓ Wrote {} edges ({:.2}s)",
        edge_count,
        timer.elapsed().as_secs_f64()
    );

    let timer = Instant::now();
    println!("Writing street name index...");
    let name_count =
        NamesFile::write(&config.names_file, &containers.names).context("write_names")?;
    println!(
        "  ✓ Wrote {} names ({:.2}s)",
        name_count,
        timer.elapsed().as_secs_f64()
    );

    println!(
        "✅ Consolidation complete: {} nodes, {} edges, {} restrictions ({:.2}s)",
        node_count,
        edge_count,
        restriction_count,
        start.elapsed().as_secs_f64()
    );

    Ok(ConsolidateResult {
        node_count,
        edge_count,
        restriction_count,
        name_count,
        dropped_edges,
    })
}

/// The neighbour of `via` along the way described by `endpoint`, if `via`
/// sits at either end of the way. An interior via node means the reference
/// is ambiguous at this granularity and stays unresolved.
fn neighbour_of_via(endpoint: &WayEndpoint, via: u64) -> Option<u64> {
    if endpoint.first_source == via {
        Some(endpoint.first_target)
    } else if endpoint.last_target == via {
        Some(endpoint.last_source)
    } else {
        None
    }
}

fn resolve_restrictions(sorter: &ExternalSorter, containers: &mut Containers) -> Result<()> {
    sorter
        .sort_by_key(&mut containers.way_endpoints, |w| w.way_id)
        .context("sort_way_endpoints")?;

    sorter
        .sort_by_key(&mut containers.restrictions, |r| r.from_way)
        .context("sort_restrictions_by_from")?;
    semi_join_update(
        &mut containers.restrictions,
        &mut containers.way_endpoints,
        |r| r.from_way,
        |w| w.way_id,
        |restriction, endpoint| {
            if let Some(node) = neighbour_of_via(endpoint, restriction.via_node) {
                restriction.from_node = node;
            }
            Ok(())
        },
    )
    .context("fix_restriction_starts")?;

    sorter
        .sort_by_key(&mut containers.restrictions, |r| r.to_way)
        .context("sort_restrictions_by_to")?;
    semi_join_update(
        &mut containers.restrictions,
        &mut containers.way_endpoints,
        |r| r.to_way,
        |w| w.way_id,
        |restriction, endpoint| {
            if let Some(node) = neighbour_of_via(endpoint, restriction.via_node) {
                restriction.to_node = node;
            }
            Ok(())
        },
    )
    .context("fix_restriction_ends")?;

    Ok(())
}
