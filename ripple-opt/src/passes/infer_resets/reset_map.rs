//! The global view of all reset networks in a design.
//!
//! A [ResetMap] associates values in a design with a [ResetNet]. It does
//! this by creating a [ResetNode] for every value (represented by a
//! [FieldRef]), which records which reset network the value belongs to. The
//! core functionality is the [add](ResetMap::add) function, which stores a
//! connection between two values in the map. Doing so associates a "source"
//! as the value being driven onto a "destination" port or wire, and
//! combines the nets the values belong to into a single one. This
//! transitively establishes a net as the collection of all values in the IR
//! that must have the same reset type, since they are connected together
//! (through instance ports or connect ops).
//!
//! While building the map there will be a lot of small transient nets for
//! the initial connections to a wire or port. As more connections are
//! added, more and more of these nets are combined into larger ones. Since
//! a design only has a handful of resets, the number of final nets is
//! expected to be low; merged-away nets are retired to a free list and
//! reused.

use ripple_ir::{FieldRef, IndexedMap, Type};
use ripple_utils::GPosIdx;
use std::collections::HashMap;
use std::fmt;

/// Handle to a [ResetNode] in a [ResetMap].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct NodeIdx(u32);
ripple_ir::impl_index!(NodeIdx);

/// Handle to a [ResetNet] in a [ResetMap].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct NetIdx(u32);
ripple_ir::impl_index!(NetIdx);

/// The inferred kind of a reset network.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum ResetKind {
    #[default]
    Uninferred,
    Async,
    Sync,
}

impl fmt::Display for ResetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResetKind::Uninferred => write!(f, "<uninferred>"),
            ResetKind::Async => write!(f, "async"),
            ResetKind::Sync => write!(f, "sync"),
        }
    }
}

/// A driver association between two IR values, given as a "source" value
/// being driven onto a "destination" port or wire. Also contains location
/// information for error reporting to the user.
#[derive(Clone, Copy, Debug)]
pub struct ResetDrive {
    /// The output being driven.
    pub dst: NodeIdx,
    /// The input node to the drive.
    pub src: NodeIdx,
    /// The location to use for diagnostics.
    pub loc: GPosIdx,
}

/// Metadata associated with a single IR value (represented by a
/// [FieldRef]), and the reset network the value belongs to. Created
/// on-demand whenever [ResetMap::node_for] encounters a new value.
#[derive(Clone, Debug)]
pub struct ResetNode {
    /// The value in the IR that corresponds to this node.
    pub value: FieldRef,
    /// The declared type of the value.
    pub ty: Type,
    /// The reset net this node belongs to.
    pub net: Option<NetIdx>,
}

/// A collection of IR values (represented by their [ResetNode]) that are
/// connected together through instance ports or explicit connect ops, and
/// which thus must carry the same reset type.
#[derive(Clone, Debug, Default)]
pub struct ResetNet {
    /// The nodes in this reset network, in insertion order.
    pub nodes: Vec<NodeIdx>,
    /// The drives that contribute to this network.
    pub drives: Vec<ResetDrive>,
    /// The inferred kind of the reset.
    pub kind: ResetKind,
}

impl ResetNet {
    fn clear(&mut self) {
        self.nodes.clear();
        self.drives.clear();
        self.kind = ResetKind::Uninferred;
    }
}

/// A global view of all reset networks in a design.
#[derive(Default)]
pub struct ResetMap {
    /// All reset nodes, addressed by handle.
    nodes: IndexedMap<NodeIdx, ResetNode>,
    /// A mapping from signals to a corresponding node in a reset network.
    index: HashMap<FieldRef, NodeIdx>,
    /// All allocated nets, live or retired.
    nets: IndexedMap<NetIdx, ResetNet>,
    /// The live nets, in creation order.
    live: Vec<NetIdx>,
    /// Retired nets available for reuse.
    unused: Vec<NetIdx>,
}

impl ResetMap {
    /// Return the reset node associated with a value. This either returns
    /// the existing node, or creates a new one if needed.
    pub fn node_for(&mut self, value: FieldRef, ty: &Type) -> NodeIdx {
        if let Some(idx) = self.index.get(&value) {
            return *idx;
        }
        let idx = self.nodes.push(ResetNode {
            value,
            ty: ty.clone(),
            net: None,
        });
        self.index.insert(value, idx);
        idx
    }

    pub fn node(&self, idx: NodeIdx) -> &ResetNode {
        &self.nodes[idx]
    }

    pub fn net(&self, idx: NetIdx) -> &ResetNet {
        &self.nets[idx]
    }

    pub fn net_mut(&mut self, idx: NetIdx) -> &mut ResetNet {
        &mut self.nets[idx]
    }

    /// The live nets, in creation order.
    pub fn nets(&self) -> Vec<NetIdx> {
        self.live.clone()
    }

    /// Add a connection from `src` to `dst` to the reset map. This takes
    /// the existing reset networks that `src` and `dst` are already part
    /// of, or creates new ones if needed, and combines the two networks
    /// into one. Also adds driver metadata to the resulting network for
    /// diagnostic purposes.
    pub fn add(
        &mut self,
        dst: FieldRef,
        dst_ty: &Type,
        src: FieldRef,
        src_ty: &Type,
        loc: GPosIdx,
    ) {
        let dst_node = self.node_for(dst, dst_ty);
        let src_node = self.node_for(src, src_ty);

        // Decide which net to use. If neither node has a network, create a
        // new one (this is the case if we haven't seen the nodes before).
        // If one of the nodes has a net, add the other node to that. If
        // both nodes have a net, collapse them into a single network.
        let net = match (self.nodes[dst_node].net, self.nodes[src_node].net)
        {
            (None, None) => {
                let net = self.create_net();
                self.nodes[dst_node].net = Some(net);
                self.nodes[src_node].net = Some(net);
                self.nets[net].nodes.push(dst_node);
                if src_node != dst_node {
                    self.nets[net].nodes.push(src_node);
                }
                net
            }
            (None, Some(net)) => {
                self.nodes[dst_node].net = Some(net);
                self.nets[net].nodes.push(dst_node);
                net
            }
            (Some(net), None) => {
                self.nodes[src_node].net = Some(net);
                self.nets[net].nodes.push(src_node);
                net
            }
            (Some(dst_net), Some(src_net)) if dst_net == src_net => {
                // Both already in the same net (e.g. redundant connect).
                dst_net
            }
            (Some(dst_net), Some(src_net)) => {
                // Merge the smaller of the two networks into the larger
                // one; the smaller net gets abandoned.
                let (net, other) = if self.nets[dst_net].nodes.len()
                    < self.nets[src_net].nodes.len()
                {
                    (src_net, dst_net)
                } else {
                    (dst_net, src_net)
                };
                let migrated = std::mem::take(&mut self.nets[other].nodes);
                for node in &migrated {
                    self.nodes[*node].net = Some(net);
                }
                self.nets[net].nodes.extend(migrated);
                let drives = std::mem::take(&mut self.nets[other].drives);
                self.nets[net].drives.extend(drives);
                self.abandon_net(other);
                net
            }
        };

        // Add the drive entry with its location details.
        self.nets[net].drives.push(ResetDrive {
            dst: dst_node,
            src: src_node,
            loc,
        });
    }

    /// Determine a good location for a reset network to report to the
    /// user. A reset network is just a bag of IR values and associated
    /// connects, so it has no location per se. However for the sake of
    /// diagnostics, we can report a port or wire somewhere at the top of
    /// the network to the user: a node with a minimal number of incoming
    /// drives is most likely a source. Ties go to the earliest-inserted
    /// node.
    pub fn guess_root(&self, net: NetIdx) -> FieldRef {
        let net = &self.nets[net];
        let mut drive_counts: HashMap<NodeIdx, usize> = HashMap::new();
        for drive in &net.drives {
            *drive_counts.entry(drive.dst).or_default() += 1;
        }
        let lowest = net
            .nodes
            .iter()
            .min_by_key(|n| drive_counts.get(n).copied().unwrap_or(0))
            .expect("there are no empty nets");
        self.nodes[*lowest].value
    }

    /// Allocate a new reset network, reusing a retired one when available.
    fn create_net(&mut self) -> NetIdx {
        let net = match self.unused.pop() {
            Some(net) => net,
            None => self.nets.push(ResetNet::default()),
        };
        self.live.push(net);
        net
    }

    /// Abandon a reset network, marking it as available for reuse.
    fn abandon_net(&mut self, net: NetIdx) {
        self.nets[net].clear();
        self.live.retain(|n| *n != net);
        self.unused.push(net);
    }

    /// Drop all nodes and nets.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
