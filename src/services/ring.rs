use std::collections::BTreeMap;
use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::error::{AtriumError, Result};

pub const DEFAULT_VIRTUAL_NODES: usize = 64;

pub trait RingMember {
    fn member_id(&self) -> &str;
}

#[derive(Debug)]
pub struct HashRing<N> {
    virtual_nodes: usize,
    members: BTreeMap<String, Arc<N>>,
    positions: BTreeMap<u64, String>,
}

impl<N: RingMember> HashRing<N> {
    pub fn build(
        nodes: impl IntoIterator<Item = Arc<N>>,
        virtual_nodes_per_node: usize,
    ) -> Result<Self> {
        let mut ring = Self {
            virtual_nodes: virtual_nodes_per_node.max(1),
            members: BTreeMap::new(),
            positions: BTreeMap::new(),
        };
        for node in nodes {
            let id = node.member_id().to_string();
            if ring.members.contains_key(&id) {
                return Err(AtriumError::Runtime(format!("duplicate ring member `{id}`")));
            }
            ring.place(&id);
            ring.members.insert(id, node);
        }
        if ring.members.is_empty() {
            return Err(AtriumError::EmptyRing);
        }
        Ok(ring)
    }

    pub fn get_node(&self, key: impl AsRef<[u8]>) -> Option<&Arc<N>> {
        let point = ring_hash(key.as_ref());
        let (_, id) = self
            .positions
            .range(point..)
            .next()
            .or_else(|| self.positions.iter().next())?;
        self.members.get(id)
    }

    pub fn add_node(&mut self, node: Arc<N>) -> bool {
        let id = node.member_id().to_string();
        if self.members.contains_key(&id) {
            return false;
        }
        self.place(&id);
        self.members.insert(id, node);
        true
    }

    /// Remove a member; only keys on its arcs move. The last member cannot be
    /// removed.
    pub fn remove_node(&mut self, member_id: &str) -> Result<Option<Arc<N>>> {
        if !self.members.contains_key(member_id) {
            return Ok(None);
        }
        if self.members.len() == 1 {
            return Err(AtriumError::EmptyRing);
        }
        let removed = self.members.remove(member_id);

        // re-place survivors so positions lost to collisions come back
        self.positions.clear();
        let ids: Vec<String> = self.members.keys().cloned().collect();
        for id in &ids {
            self.place(id);
        }
        Ok(removed)
    }

    pub fn contains(&self, member_id: &str) -> bool {
        self.members.contains_key(member_id)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn virtual_nodes(&self) -> usize {
        self.virtual_nodes
    }

    pub fn members(&self) -> impl Iterator<Item = &Arc<N>> {
        self.members.values()
    }

    fn place(&mut self, id: &str) {
        for index in 0..self.virtual_nodes {
            let point = ring_hash(format!("{id}#{index}").as_bytes());
            match self.positions.get(&point) {
                // collision: the smaller id keeps the slot
                Some(owner) if owner.as_str() <= id => {}
                _ => {
                    self.positions.insert(point, id.to_string());
                }
            }
        }
    }
}

pub fn ring_hash(bytes: &[u8]) -> u64 {
    let digest = Sha256::digest(bytes);
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(prefix)
}
