//! Combined node + edge graph file
//!
//! Format (little-endian):
//!
//!   FingerPrint (16 bytes)
//!   node_count: u32       // back-patched, offset 16
//!   nodes: node_count × 20 bytes      (records::Node layout)
//!   edge_count: u32       // back-patched
//!   edges: edge_count × 32 bytes
//!     source:  u64
//!     target:  u64
//!     name_id: u32
//!     weight:  i32        // deciseconds
//!     forward: u8, backward: u8, roundabout: u8, in_tiny_cc: u8,
//!     access_restricted: u8, travel_mode: u8
//!     reserved: [2]u8
//!
//! Both counts are placeholders while the sections stream and are patched
//! once the writer is finished.

use anyhow::{ensure, Context, Result};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

use super::fingerprint::{FingerPrint, FINGERPRINT_SIZE};
use crate::records::{Edge, Node, Record};

pub const EDGE_RECORD_SIZE: usize = 32;

const NODE_COUNT_OFFSET: u64 = FINGERPRINT_SIZE as u64;

/// The on-disk edge record, as read back by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackedEdge {
    pub source: u64,
    pub target: u64,
    pub name_id: u32,
    pub weight: i32,
    pub forward: bool,
    pub backward: bool,
    pub roundabout: bool,
    pub in_tiny_cc: bool,
    pub access_restricted: bool,
    pub travel_mode: u8,
}

enum Section {
    Nodes,
    Edges { count_offset: u64 },
    Finished,
}

/// Streams the node section, then the edge section, then patches both
/// counts.
pub struct GraphWriter {
    writer: BufWriter<File>,
    section: Section,
    node_count: u32,
    edge_count: u32,
}

impl GraphWriter {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path.as_ref())
            .with_context(|| format!("Failed to create {}", path.as_ref().display()))?;
        let mut writer = BufWriter::new(file);
        writer.write_all(&FingerPrint::current().to_bytes())?;
        writer.write_all(&0u32.to_le_bytes())?;
        Ok(Self {
            writer,
            section: Section::Nodes,
            node_count: 0,
            edge_count: 0,
        })
    }

    pub fn push_node(&mut self, node: &Node) -> Result<()> {
        debug_assert!(matches!(self.section, Section::Nodes));
        let mut buf = [0u8; Node::SIZE];
        node.encode(&mut buf);
        self.writer.write_all(&buf)?;
        self.node_count += 1;
        Ok(())
    }

    /// Close the node section and open the edge section.
    pub fn begin_edges(&mut self) -> Result<()> {
        debug_assert!(matches!(self.section, Section::Nodes));
        let count_offset =
            NODE_COUNT_OFFSET + 4 + self.node_count as u64 * Node::SIZE as u64;
        self.writer.write_all(&0u32.to_le_bytes())?;
        self.section = Section::Edges { count_offset };
        Ok(())
    }

    pub fn push_edge(&mut self, edge: &Edge) -> Result<()> {
        debug_assert!(matches!(self.section, Section::Edges { .. }));
        let mut buf = [0u8; EDGE_RECORD_SIZE];
        buf[0..8].copy_from_slice(&edge.source.to_le_bytes());
        buf[8..16].copy_from_slice(&edge.target.to_le_bytes());
        buf[16..20].copy_from_slice(&edge.name_id.to_le_bytes());
        buf[20..24].copy_from_slice(&edge.result_weight.to_le_bytes());
        buf[24] = edge.forward as u8;
        buf[25] = edge.backward as u8;
        buf[26] = edge.roundabout as u8;
        buf[27] = edge.in_tiny_cc as u8;
        buf[28] = edge.access_restricted as u8;
        buf[29] = edge.travel_mode;
        // bytes 30..32 reserved
        self.writer.write_all(&buf)?;
        self.edge_count += 1;
        Ok(())
    }

    /// Patch both counts and flush. Returns (node_count, edge_count).
    pub fn finish(mut self) -> Result<(u32, u32)> {
        let edge_count_offset = match self.section {
            Section::Edges { count_offset } => count_offset,
            _ => anyhow::bail!("Graph writer finished before the edge section"),
        };
        self.writer.seek(SeekFrom::Start(NODE_COUNT_OFFSET))?;
        self.writer.write_all(&self.node_count.to_le_bytes())?;
        self.writer.seek(SeekFrom::Start(edge_count_offset))?;
        self.writer.write_all(&self.edge_count.to_le_bytes())?;
        self.writer.flush()?;
        self.section = Section::Finished;
        Ok((self.node_count, self.edge_count))
    }
}

pub struct GraphFile;

impl GraphFile {
    pub fn read_all<P: AsRef<Path>>(path: P) -> Result<(Vec<Node>, Vec<PackedEdge>)> {
        let file = File::open(path.as_ref())
            .with_context(|| format!("Failed to open {}", path.as_ref().display()))?;
        let mut reader = BufReader::new(file);

        let mut header = [0u8; FINGERPRINT_SIZE + 4];
        reader.read_exact(&mut header)?;
        FingerPrint::from_bytes(&header[..FINGERPRINT_SIZE])?;
        let node_count = u32::from_le_bytes(header[FINGERPRINT_SIZE..].try_into()?);

        let mut nodes = Vec::with_capacity(node_count as usize);
        let mut node_buf = [0u8; Node::SIZE];
        for _ in 0..node_count {
            reader.read_exact(&mut node_buf)?;
            nodes.push(Node::decode(&node_buf));
        }

        let mut word = [0u8; 4];
        reader.read_exact(&mut word)?;
        let edge_count = u32::from_le_bytes(word);

        let mut edges = Vec::with_capacity(edge_count as usize);
        let mut edge_buf = [0u8; EDGE_RECORD_SIZE];
        for _ in 0..edge_count {
            reader.read_exact(&mut edge_buf)?;
            edges.push(PackedEdge {
                source: u64::from_le_bytes(edge_buf[0..8].try_into()?),
                target: u64::from_le_bytes(edge_buf[8..16].try_into()?),
                name_id: u32::from_le_bytes(edge_buf[16..20].try_into()?),
                weight: i32::from_le_bytes(edge_buf[20..24].try_into()?),
                forward: edge_buf[24] != 0,
                backward: edge_buf[25] != 0,
                roundabout: edge_buf[26] != 0,
                in_tiny_cc: edge_buf[27] != 0,
                access_restricted: edge_buf[28] != 0,
                travel_mode: edge_buf[29],
            });
        }
        Ok((nodes, edges))
    }

    pub fn verify<P: AsRef<Path>>(path: P) -> Result<()> {
        let mut file = File::open(path.as_ref())
            .with_context(|| format!("Failed to open {}", path.as_ref().display()))?;

        let mut header = [0u8; FINGERPRINT_SIZE + 4];
        file.read_exact(&mut header)?;
        FingerPrint::from_bytes(&header[..FINGERPRINT_SIZE])?;
        let node_count = u32::from_le_bytes(header[FINGERPRINT_SIZE..].try_into()?);

        let edge_count_offset = (FINGERPRINT_SIZE + 4) as u64 + node_count as u64 * Node::SIZE as u64;
        file.seek(SeekFrom::Start(edge_count_offset))?;
        let mut word = [0u8; 4];
        file.read_exact(&mut word)?;
        let edge_count = u32::from_le_bytes(word);

        let expected = edge_count_offset + 4 + edge_count as u64 * EDGE_RECORD_SIZE as u64;
        let actual = file.seek(SeekFrom::End(0))?;
        ensure!(
            actual == expected,
            "Size mismatch in {}: expected {} bytes, got {}",
            path.as_ref().display(),
            expected,
            actual
        );

        println!(
            "  ✓ {} verified ({} nodes, {} edges, {} bytes)",
            path.as_ref().display(),
            node_count,
            edge_count,
            actual
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::WeightSpec;
    use tempfile::tempdir;

    #[test]
    fn test_counts_are_back_patched() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("graph.bin");

        let mut writer = GraphWriter::create(&path).unwrap();
        for id in [10u64, 20, 30] {
            writer
                .push_node(&Node {
                    node_id: id,
                    lat: 1,
                    lon: 2,
                    flags: 0,
                })
                .unwrap();
        }
        writer.begin_edges().unwrap();
        let mut edge = Edge::new(10, 20, 1, WeightSpec::Speed(30.0));
        edge.result_weight = 55;
        writer.push_edge(&edge).unwrap();
        let (nodes, edges) = writer.finish().unwrap();
        assert_eq!((nodes, edges), (3, 1));

        let (read_nodes, read_edges) = GraphFile::read_all(&path).unwrap();
        assert_eq!(read_nodes.len(), 3);
        assert_eq!(read_nodes[2].node_id, 30);
        assert_eq!(read_edges.len(), 1);
        assert_eq!(read_edges[0].weight, 55);
        assert!(read_edges[0].forward);
        assert!(!read_edges[0].backward);

        GraphFile::verify(&path).unwrap();
    }

    #[test]
    fn test_empty_sections() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.bin");
        let mut writer = GraphWriter::create(&path).unwrap();
        writer.begin_edges().unwrap();
        assert_eq!(writer.finish().unwrap(), (0, 0));
        GraphFile::verify(&path).unwrap();
        let (nodes, edges) = GraphFile::read_all(&path).unwrap();
        assert!(nodes.is_empty() && edges.is_empty());
    }
}
