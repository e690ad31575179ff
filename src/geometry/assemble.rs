//! # Ring Stitching
//!
//! OSM multipolygon relations reference their rings as fragments: a single
//! ring may be split across many ways, stored in arbitrary order and
//! direction. This module reassembles those fragments into node-id rings
//! by matching endpoints.
//!
//! ## Algorithm
//!
//! A working set of open chains is grown over repeated passes of the input
//! ways, in input order:
//!
//! - a way that is already closed (first node == last node) is emitted as
//!   a standalone chain;
//! - an open way is joined to the first chain it shares an endpoint with,
//!   trying the four cases in a fixed order: append, append reversed,
//!   prepend, prepend reversed. The shared node is dropped from the joined
//!   fragment so rings carry no interior duplicates. A chain that has
//!   closed accepts no further ways.
//! - when a full pass joins nothing, the first remaining way seeds a new
//!   chain and the passes continue.
//!
//! Every way is consumed eventually, so the loop terminates; chains that
//! never close are still returned, and the caller materializes them as-is
//! (the documented failure mode for broken source data).
//!
//! Input order is the tie-break for both "which way next" and "which chain
//! to join", which keeps the output deterministic for a given relation.

use hashbrown::HashSet;

use crate::types::{NodeId, WayId};

/// Stitches resolved ways into rings. Each input pair is a way id and its
/// node sequence; the id is only used to track consumption, so duplicate
/// ids are processed once.
pub(crate) fn stitch_rings(ways: &[(WayId, &[NodeId])]) -> Vec<Vec<NodeId>> {
    let mut chains: Vec<Vec<NodeId>> = Vec::new();
    let mut done: HashSet<WayId> = HashSet::new();

    loop {
        let mut added = 0;

        for &(id, nodes) in ways {
            if done.contains(&id) || nodes.is_empty() {
                continue;
            }
            if nodes.first() == nodes.last() {
                chains.push(nodes.to_vec());
                done.insert(id);
                added += 1;
            } else if try_join(&mut chains, nodes) {
                done.insert(id);
                added += 1;
            }
        }

        if added == 0 {
            // Seed with the first unconsumed way so the next passes have
            // something to attract the rest.
            match ways
                .iter()
                .find(|(id, nodes)| !done.contains(id) && !nodes.is_empty())
            {
                Some(&(id, nodes)) => {
                    chains.push(nodes.to_vec());
                    done.insert(id);
                }
                None => break,
            }
        }
    }

    chains
}

fn try_join(chains: &mut [Vec<NodeId>], nodes: &[NodeId]) -> bool {
    let (Some(&first), Some(&last)) = (nodes.first(), nodes.last()) else {
        return false;
    };

    for chain in chains.iter_mut() {
        let chain_first = chain[0];
        let chain_last = chain[chain.len() - 1];
        if chain_first == chain_last {
            continue;
        }

        if chain_last == first {
            chain.extend_from_slice(&nodes[1..]);
        } else if chain_last == last {
            chain.extend(nodes[..nodes.len() - 1].iter().rev());
        } else if last == chain_first {
            chain.splice(0..0, nodes[..nodes.len() - 1].iter().copied());
        } else if first == chain_first {
            chain.splice(0..0, nodes[1..].iter().rev().copied());
        } else {
            continue;
        }
        return true;
    }
    false
}
