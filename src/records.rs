//! Fixed-layout records shared by the consolidation containers and writers
//!
//! All records are packed little-endian with a stable byte layout, so the
//! same encoding serves the on-disk containers, the sort run files, and the
//! final artifacts.
//!
//! Container record layouts:
//!
//!   Node (20 bytes):
//!     node_id: u64, lat: i32, lon: i32, flags: u32
//!
//!   Edge (48 bytes):
//!     source: u64, target: u64, name_id: u32,
//!     forward: u8, backward: u8, roundabout: u8, in_tiny_cc: u8,
//!     access_restricted: u8, travel_mode: u8, weight_kind: u8, reserved: u8,
//!     weight_value: f64, source_lat: i32, source_lon: i32, result_weight: i32
//!
//!   TurnRestriction (48 bytes):
//!     from_way: u64, to_way: u64, from_node: u64, via_node: u64,
//!     to_node: u64, is_only: u8, reserved: [7]u8
//!
//!   WayEndpoint (40 bytes):
//!     way_id: u64, first_source: u64, first_target: u64,
//!     last_source: u64, last_target: u64

use crate::geo::FixedCoord;

/// Sentinel for an unresolved node reference.
pub const SPECIAL_NODEID: u64 = u64::MAX;

/// A type with a fixed-size packed binary layout.
pub trait Record: Sized {
    const SIZE: usize;

    fn encode(&self, buf: &mut [u8]);
    fn decode(buf: &[u8]) -> Self;
}

impl Record for u64 {
    const SIZE: usize = 8;

    fn encode(&self, buf: &mut [u8]) {
        buf[0..8].copy_from_slice(&self.to_le_bytes());
    }

    fn decode(buf: &[u8]) -> Self {
        u64::from_le_bytes(buf[0..8].try_into().unwrap())
    }
}

/// A geo-referenced OSM node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Node {
    pub node_id: u64,
    pub lat: i32,
    pub lon: i32,
    pub flags: u32,
}

impl Node {
    pub fn coord(&self) -> FixedCoord {
        FixedCoord {
            lat: self.lat,
            lon: self.lon,
        }
    }
}

impl Record for Node {
    const SIZE: usize = 20;

    fn encode(&self, buf: &mut [u8]) {
        buf[0..8].copy_from_slice(&self.node_id.to_le_bytes());
        buf[8..12].copy_from_slice(&self.lat.to_le_bytes());
        buf[12..16].copy_from_slice(&self.lon.to_le_bytes());
        buf[16..20].copy_from_slice(&self.flags.to_le_bytes());
    }

    fn decode(buf: &[u8]) -> Self {
        Self {
            node_id: u64::from_le_bytes(buf[0..8].try_into().unwrap()),
            lat: i32::from_le_bytes(buf[8..12].try_into().unwrap()),
            lon: i32::from_le_bytes(buf[12..16].try_into().unwrap()),
            flags: u32::from_le_bytes(buf[16..20].try_into().unwrap()),
        }
    }
}

/// How an edge's traversal cost is specified by the profiling stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WeightSpec {
    Invalid,
    /// Speed in km/h; cost derives from geometric distance.
    Speed(f64),
    /// Fixed traversal duration in seconds for this edge.
    EdgeDuration(f64),
    /// Fixed traversal duration in seconds spread over the whole way.
    WayDuration(f64),
}

impl WeightSpec {
    pub fn kind(&self) -> u8 {
        match self {
            WeightSpec::Invalid => 0,
            WeightSpec::Speed(_) => 1,
            WeightSpec::EdgeDuration(_) => 2,
            WeightSpec::WayDuration(_) => 3,
        }
    }

    pub fn value(&self) -> f64 {
        match self {
            WeightSpec::Invalid => 0.0,
            WeightSpec::Speed(v) | WeightSpec::EdgeDuration(v) | WeightSpec::WayDuration(v) => *v,
        }
    }

    fn from_parts(kind: u8, value: f64) -> Self {
        match kind {
            1 => WeightSpec::Speed(value),
            2 => WeightSpec::EdgeDuration(value),
            3 => WeightSpec::WayDuration(value),
            _ => WeightSpec::Invalid,
        }
    }
}

/// A directed node-based edge, carried through both coordinate passes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
    pub source: u64,
    pub target: u64,
    pub name_id: u32,
    pub forward: bool,
    pub backward: bool,
    pub roundabout: bool,
    pub in_tiny_cc: bool,
    pub access_restricted: bool,
    pub travel_mode: u8,
    pub weight: WeightSpec,
    pub source_coord: FixedCoord,
    pub result_weight: i32,
}

impl Edge {
    pub fn new(source: u64, target: u64, name_id: u32, weight: WeightSpec) -> Self {
        Self {
            source,
            target,
            name_id,
            forward: true,
            backward: false,
            roundabout: false,
            in_tiny_cc: false,
            access_restricted: false,
            travel_mode: 0,
            weight,
            source_coord: FixedCoord::UNSET,
            result_weight: 0,
        }
    }
}

impl Record for Edge {
    const SIZE: usize = 48;

    fn encode(&self, buf: &mut [u8]) {
        buf[0..8].copy_from_slice(&self.source.to_le_bytes());
        buf[8..16].copy_from_slice(&self.target.to_le_bytes());
        buf[16..20].copy_from_slice(&self.name_id.to_le_bytes());
        buf[20] = self.forward as u8;
        buf[21] = self.backward as u8;
        buf[22] = self.roundabout as u8;
        buf[23] = self.in_tiny_cc as u8;
        buf[24] = self.access_restricted as u8;
        buf[25] = self.travel_mode;
        buf[26] = self.weight.kind();
        buf[27] = 0;
        buf[28..36].copy_from_slice(&self.weight.value().to_le_bytes());
        buf[36..40].copy_from_slice(&self.source_coord.lat.to_le_bytes());
        buf[40..44].copy_from_slice(&self.source_coord.lon.to_le_bytes());
        buf[44..48].copy_from_slice(&self.result_weight.to_le_bytes());
    }

    fn decode(buf: &[u8]) -> Self {
        Self {
            source: u64::from_le_bytes(buf[0..8].try_into().unwrap()),
            target: u64::from_le_bytes(buf[8..16].try_into().unwrap()),
            name_id: u32::from_le_bytes(buf[16..20].try_into().unwrap()),
            forward: buf[20] != 0,
            backward: buf[21] != 0,
            roundabout: buf[22] != 0,
            in_tiny_cc: buf[23] != 0,
            access_restricted: buf[24] != 0,
            travel_mode: buf[25],
            weight: WeightSpec::from_parts(
                buf[26],
                f64::from_le_bytes(buf[28..36].try_into().unwrap()),
            ),
            source_coord: FixedCoord {
                lat: i32::from_le_bytes(buf[36..40].try_into().unwrap()),
                lon: i32::from_le_bytes(buf[40..44].try_into().unwrap()),
            },
            result_weight: i32::from_le_bytes(buf[44..48].try_into().unwrap()),
        }
    }
}

/// A turn restriction whose way references get resolved to node references.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnRestriction {
    pub from_way: u64,
    pub to_way: u64,
    pub from_node: u64,
    pub via_node: u64,
    pub to_node: u64,
    pub is_only: bool,
}

impl TurnRestriction {
    pub fn new(from_way: u64, via_node: u64, to_way: u64, is_only: bool) -> Self {
        Self {
            from_way,
            to_way,
            from_node: SPECIAL_NODEID,
            via_node,
            to_node: SPECIAL_NODEID,
            is_only,
        }
    }

    /// Both endpoints resolved to concrete nodes.
    pub fn is_resolved(&self) -> bool {
        self.from_node != SPECIAL_NODEID && self.to_node != SPECIAL_NODEID
    }
}

impl Record for TurnRestriction {
    const SIZE: usize = 48;

    fn encode(&self, buf: &mut [u8]) {
        buf[0..8].copy_from_slice(&self.from_way.to_le_bytes());
        buf[8..16].copy_from_slice(&self.to_way.to_le_bytes());
        buf[16..24].copy_from_slice(&self.from_node.to_le_bytes());
        buf[24..32].copy_from_slice(&self.via_node.to_le_bytes());
        buf[32..40].copy_from_slice(&self.to_node.to_le_bytes());
        buf[40] = self.is_only as u8;
        buf[41..48].fill(0);
    }

    fn decode(buf: &[u8]) -> Self {
        Self {
            from_way: u64::from_le_bytes(buf[0..8].try_into().unwrap()),
            to_way: u64::from_le_bytes(buf[8..16].try_into().unwrap()),
            from_node: u64::from_le_bytes(buf[16..24].try_into().unwrap()),
            via_node: u64::from_le_bytes(buf[24..32].try_into().unwrap()),
            to_node: u64::from_le_bytes(buf[32..40].try_into().unwrap()),
            is_only: buf[40] != 0,
        }
    }
}

/// First and last segment of a way, keyed by way id.
///
/// Used to decide which neighbour of a restriction's via node lies on the
/// referenced way: the via node can only be the way's first or last node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WayEndpoint {
    pub way_id: u64,
    pub first_source: u64,
    pub first_target: u64,
    pub last_source: u64,
    pub last_target: u64,
}

impl Record for WayEndpoint {
    const SIZE: usize = 40;

    fn encode(&self, buf: &mut [u8]) {
        buf[0..8].copy_from_slice(&self.way_id.to_le_bytes());
        buf[8..16].copy_from_slice(&self.first_source.to_le_bytes());
        buf[16..24].copy_from_slice(&self.first_target.to_le_bytes());
        buf[24..32].copy_from_slice(&self.last_source.to_le_bytes());
        buf[32..40].copy_from_slice(&self.last_target.to_le_bytes());
    }

    fn decode(buf: &[u8]) -> Self {
        Self {
            way_id: u64::from_le_bytes(buf[0..8].try_into().unwrap()),
            first_source: u64::from_le_bytes(buf[8..16].try_into().unwrap()),
            first_target: u64::from_le_bytes(buf[16..24].try_into().unwrap()),
            last_source: u64::from_le_bytes(buf[24..32].try_into().unwrap()),
            last_target: u64::from_le_bytes(buf[32..40].try_into().unwrap()),
        }
    }
}
