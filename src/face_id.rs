//! Identity mapping between caller-facing face triplets and the opaque ids
//! the cache manager is keyed by.
//!
//! The registry is an append-only arena: ids come from a monotonic counter
//! and are never recycled, so an id can never alias a different face after
//! eviction. Closing a font does not free its ids because the cache may
//! still hold latent references that resolve through the face requester.

use std::collections::HashMap;

/// Logical identity of a renderable face variant.
///
/// `named_instance_index` 0 selects the default (non-variable) instance;
/// `n > 0` selects the face's predefined variation instance `n - 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FaceId {
    pub font_index: usize,
    pub face_index: u32,
    pub named_instance_index: u16,
}

impl FaceId {
    pub fn new(font_index: usize, face_index: u32, named_instance_index: u16) -> Self {
        Self {
            font_index,
            face_index,
            named_instance_index,
        }
    }
}

/// Stable opaque handle for a [`FaceId`], used as the cache manager's key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OpaqueFaceId(pub u64);

/// Bidirectional triplet ↔ opaque-id map. Append-only for the whole
/// session; growth is bounded by the number of faces ever opened.
#[derive(Debug, Default)]
pub struct FaceIdRegistry {
    forward: HashMap<FaceId, OpaqueFaceId>,
    reverse: Vec<FaceId>,
}

impl FaceIdRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the id for `face`, allocating the next counter value on
    /// first sight. Repeated calls for the same triplet return the same id.
    pub fn get_or_create(&mut self, face: FaceId) -> OpaqueFaceId {
        if let Some(id) = self.forward.get(&face) {
            return *id;
        }
        let id = OpaqueFaceId(self.reverse.len() as u64);
        self.reverse.push(face);
        self.forward.insert(face, id);
        log::debug!(
            "registered face ({}, {}, {}) as opaque id {}",
            face.font_index,
            face.face_index,
            face.named_instance_index,
            id.0
        );
        id
    }

    /// Resolve an opaque id back to its triplet (used by the face
    /// requester on cache misses).
    pub fn reverse_lookup(&self, id: OpaqueFaceId) -> Option<FaceId> {
        self.reverse.get(id.0 as usize).copied()
    }

    /// Ids issued for a given font index, in allocation order.
    pub fn ids_for_font(&self, font_index: usize) -> Vec<OpaqueFaceId> {
        self.reverse
            .iter()
            .enumerate()
            .filter(|(_, f)| f.font_index == font_index)
            .map(|(i, _)| OpaqueFaceId(i as u64))
            .collect()
    }

    /// Number of ids ever issued.
    pub fn len(&self) -> usize {
        self.reverse.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reverse.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_or_create_is_idempotent() {
        let mut reg = FaceIdRegistry::new();
        let a = reg.get_or_create(FaceId::new(0, 0, 0));
        let b = reg.get_or_create(FaceId::new(0, 0, 0));
        assert_eq!(a, b);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn distinct_triplets_get_distinct_ids() {
        let mut reg = FaceIdRegistry::new();
        let a = reg.get_or_create(FaceId::new(0, 0, 0));
        let b = reg.get_or_create(FaceId::new(0, 0, 1));
        let c = reg.get_or_create(FaceId::new(1, 0, 0));
        assert_ne!(a, b);
        assert_ne!(b, c);
        assert_ne!(a, c);
    }

    #[test]
    fn reverse_lookup_round_trips() {
        let mut reg = FaceIdRegistry::new();
        let face = FaceId::new(3, 1, 2);
        let id = reg.get_or_create(face);
        assert_eq!(reg.reverse_lookup(id), Some(face));
        assert_eq!(reg.reverse_lookup(OpaqueFaceId(999)), None);
    }

    #[test]
    fn ids_survive_for_session() {
        // No removal API exists at all; allocating more never disturbs
        // earlier ids.
        let mut reg = FaceIdRegistry::new();
        let first = reg.get_or_create(FaceId::new(0, 0, 0));
        for i in 1..100 {
            reg.get_or_create(FaceId::new(i, 0, 0));
        }
        assert_eq!(reg.get_or_create(FaceId::new(0, 0, 0)), first);
        assert_eq!(reg.reverse_lookup(first), Some(FaceId::new(0, 0, 0)));
    }

    #[test]
    fn ids_for_font_filters_by_font_index() {
        let mut reg = FaceIdRegistry::new();
        let a = reg.get_or_create(FaceId::new(0, 0, 0));
        let _b = reg.get_or_create(FaceId::new(1, 0, 0));
        let c = reg.get_or_create(FaceId::new(0, 1, 0));
        assert_eq!(reg.ids_for_font(0), vec![a, c]);
    }
}
