//! The broad phase: pairs up proxies whose fat AABBs overlap.

use super::aabb::AABB;
use super::dynamic_tree::{DynamicTree, ProxyId};
use super::ray::RayCastInput;
use crate::math::Vec2;

/// Wraps the dynamic tree with a moved-proxy set and turns tree overlap
/// queries into deduplicated candidate pairs for the narrow phase.
#[derive(Clone, Debug)]
pub struct BroadPhase<T> {
    tree: DynamicTree<T>,
    moved: Vec<ProxyId>,
    /// Scratch buffer of candidate pairs, reused between updates.
    pair_buffer: Vec<(ProxyId, ProxyId)>,
}

impl<T: Copy> Default for BroadPhase<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Copy> BroadPhase<T> {
    pub fn new() -> Self {
        Self {
            tree: DynamicTree::new(),
            moved: Vec::new(),
            pair_buffer: Vec::new(),
        }
    }

    pub fn proxy_count(&self) -> usize {
        self.tree.proxy_count()
    }

    pub fn create_proxy(&mut self, aabb: AABB, data: T, extension: f64) -> ProxyId {
        let id = self.tree.create_proxy(aabb, data, extension);
        self.moved.push(id);
        id
    }

    pub fn destroy_proxy(&mut self, id: ProxyId) {
        self.moved.retain(|&m| m != id);
        self.tree.destroy_proxy(id);
    }

    /// Record a proxy's new AABB. The proxy joins the moved set either way;
    /// the tree is only touched when the new box escapes the old fat box.
    pub fn move_proxy(
        &mut self,
        id: ProxyId,
        aabb: AABB,
        displacement: Vec2,
        extension: f64,
        displace_multiplier: f64,
    ) -> bool {
        let reinserted = self
            .tree
            .move_proxy(id, aabb, displacement, extension, displace_multiplier);
        self.buffer_move(id);
        reinserted
    }

    /// Force a proxy into the moved set without changing its AABB.
    /// Used when its collision filter changes.
    pub fn touch_proxy(&mut self, id: ProxyId) {
        self.buffer_move(id);
    }

    fn buffer_move(&mut self, id: ProxyId) {
        if !self.moved.contains(&id) {
            self.moved.push(id);
        }
    }

    pub fn fat_aabb(&self, id: ProxyId) -> AABB {
        self.tree.fat_aabb(id)
    }

    pub fn user_data(&self, id: ProxyId) -> T {
        self.tree.user_data(id)
    }

    /// Whether two proxies' fat AABBs overlap.
    pub fn test_overlap(&self, a: ProxyId, b: ProxyId) -> bool {
        self.tree.fat_aabb(a).overlaps(&self.tree.fat_aabb(b))
    }

    /// Emit each new candidate pair involving a moved proxy exactly once,
    /// then clear the moved set.
    pub fn update_pairs(&mut self, mut on_pair: impl FnMut(ProxyId, T, ProxyId, T)) {
        self.pair_buffer.clear();

        let moved = std::mem::take(&mut self.moved);
        for &proxy in &moved {
            let fat = self.tree.fat_aabb(proxy);
            let pair_buffer = &mut self.pair_buffer;
            self.tree.query(fat, |other, _| {
                if other != proxy {
                    pair_buffer.push((proxy.min(other), proxy.max(other)));
                }
                true
            });
        }
        self.moved = moved;
        self.moved.clear();

        self.pair_buffer.sort_unstable();
        self.pair_buffer.dedup();

        let pairs = std::mem::take(&mut self.pair_buffer);
        for &(a, b) in &pairs {
            on_pair(a, self.tree.user_data(a), b, self.tree.user_data(b));
        }
        self.pair_buffer = pairs;
    }

    pub fn query(&mut self, aabb: AABB, callback: impl FnMut(ProxyId, T) -> bool) {
        self.tree.query(aabb, callback)
    }

    pub fn ray_cast(
        &mut self,
        input: &RayCastInput,
        callback: impl FnMut(&RayCastInput, ProxyId, T) -> f64,
    ) {
        self.tree.ray_cast(input, callback)
    }

    /// Structural check of the underlying tree, for tests.
    pub fn validate(&self) -> bool {
        self.tree.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_box(center: Vec2) -> AABB {
        AABB::new(center - Vec2::new(0.5, 0.5), center + Vec2::new(0.5, 0.5))
    }

    #[test]
    fn overlapping_proxies_pair_up_once() {
        let mut bp: BroadPhase<u32> = BroadPhase::new();
        // both created (and thus both "moved"): the pair must still be
        // reported exactly once
        bp.create_proxy(unit_box(Vec2::zero()), 0, 0.1);
        bp.create_proxy(unit_box(Vec2::new(0.5, 0.0)), 1, 0.1);
        bp.create_proxy(unit_box(Vec2::new(10.0, 0.0)), 2, 0.1);

        let mut pairs = Vec::new();
        bp.update_pairs(|_, a, _, b| pairs.push((a.min(b), a.max(b))));
        assert_eq!(pairs, vec![(0, 1)]);

        // nothing moved since: no pairs
        let mut pairs = Vec::new();
        bp.update_pairs(|_, a, _, b| pairs.push((a, b)));
        assert!(pairs.is_empty());
    }

    #[test]
    fn moving_into_range_creates_a_pair() {
        let mut bp: BroadPhase<u32> = BroadPhase::new();
        let a = bp.create_proxy(unit_box(Vec2::zero()), 0, 0.1);
        let _b = bp.create_proxy(unit_box(Vec2::new(20.0, 0.0)), 1, 0.1);
        bp.update_pairs(|_, _, _, _| panic!("no pairs expected yet"));

        bp.move_proxy(a, unit_box(Vec2::new(19.5, 0.0)), Vec2::new(19.5, 0.0), 0.1, 2.0);
        let mut pairs = Vec::new();
        bp.update_pairs(|_, x, _, y| pairs.push((x.min(y), x.max(y))));
        assert_eq!(pairs, vec![(0, 1)]);
    }

    #[test]
    fn touch_proxy_reconsiders_existing_overlaps() {
        let mut bp: BroadPhase<u32> = BroadPhase::new();
        let a = bp.create_proxy(unit_box(Vec2::zero()), 0, 0.1);
        bp.create_proxy(unit_box(Vec2::new(0.25, 0.0)), 1, 0.1);
        bp.update_pairs(|_, _, _, _| {});

        bp.touch_proxy(a);
        let mut pairs = Vec::new();
        bp.update_pairs(|_, x, _, y| pairs.push((x.min(y), x.max(y))));
        assert_eq!(pairs, vec![(0, 1)]);
    }
}
