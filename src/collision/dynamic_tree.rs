//! A bounding volume hierarchy for broad-phase collision detection:
//! an incrementally updated, self-balancing binary AABB tree.

use super::aabb::AABB;
use super::ray::{ray_aabb, RayCastInput};
use crate::math::{self as m, Vec2};

const NULL_NODE: usize = usize::MAX;

/// Identifies a leaf in the tree. Stable for the lifetime of the proxy,
/// including across internal arena growth.
pub type ProxyId = usize;

#[derive(Clone, Copy, Debug)]
struct Node<T> {
    aabb: AABB,
    parent: usize,
    height: i32,
    kind: NodeKind<T>,
}

#[derive(Clone, Copy, Debug)]
enum NodeKind<T> {
    Branch { left: usize, right: usize },
    Leaf { data: T },
    Free { next: usize },
}

impl<T> Node<T> {
    fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Leaf { .. })
    }

    fn children(&self) -> (usize, usize) {
        match self.kind {
            NodeKind::Branch { left, right } => (left, right),
            _ => (NULL_NODE, NULL_NODE),
        }
    }
}

/// A dynamic AABB tree.
///
/// Leaves store a fattened copy of their proxy's AABB so that small motions
/// do not touch the tree at all; only a move past the fat margin triggers a
/// remove-and-reinsert. Insertion picks the sibling that minimizes added
/// surface area, and the tree is rebalanced with rotations on the way back
/// up, so query cost stays logarithmic under incremental updates.
#[derive(Clone, Debug)]
pub struct DynamicTree<T> {
    nodes: Vec<Node<T>>,
    root: usize,
    free_list: usize,
    proxy_count: usize,
    /// Single stack kept around so traversals don't allocate each call.
    shared_stack: Vec<usize>,
}

impl<T: Copy> Default for DynamicTree<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Copy> DynamicTree<T> {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            root: NULL_NODE,
            free_list: NULL_NODE,
            proxy_count: 0,
            shared_stack: Vec::new(),
        }
    }

    pub fn proxy_count(&self) -> usize {
        self.proxy_count
    }

    /// Create a leaf for `aabb`, fattened by `extension`.
    pub fn create_proxy(&mut self, aabb: AABB, data: T, extension: f64) -> ProxyId {
        let id = self.allocate_node();
        self.nodes[id].aabb = aabb.padded(extension);
        self.nodes[id].height = 0;
        self.nodes[id].kind = NodeKind::Leaf { data };
        self.insert_leaf(id);
        self.proxy_count += 1;
        id
    }

    pub fn destroy_proxy(&mut self, id: ProxyId) {
        debug_assert!(self.nodes[id].is_leaf());
        self.remove_leaf(id);
        self.free_node(id);
        self.proxy_count -= 1;
    }

    /// Update a moved proxy.
    ///
    /// If the new AABB still fits in the leaf's fat AABB nothing happens and
    /// false is returned. Otherwise the leaf is reinserted with a fat AABB
    /// stretched along `displacement * displace_multiplier` to anticipate
    /// continued motion, and true is returned.
    pub fn move_proxy(
        &mut self,
        id: ProxyId,
        aabb: AABB,
        displacement: Vec2,
        extension: f64,
        displace_multiplier: f64,
    ) -> bool {
        debug_assert!(self.nodes[id].is_leaf());
        if self.nodes[id].aabb.contains(&aabb) {
            return false;
        }

        self.remove_leaf(id);
        self.nodes[id].aabb = aabb
            .padded(extension)
            .extended(displacement * displace_multiplier);
        self.insert_leaf(id);
        true
    }

    /// The fat AABB stored at a leaf.
    pub fn fat_aabb(&self, id: ProxyId) -> AABB {
        debug_assert!(self.nodes[id].is_leaf());
        self.nodes[id].aabb
    }

    pub fn user_data(&self, id: ProxyId) -> T {
        match self.nodes[id].kind {
            NodeKind::Leaf { data } => data,
            _ => panic!("not a leaf node"),
        }
    }

    /// Visit every leaf whose fat AABB overlaps `aabb`.
    /// The callback returns false to stop the query.
    pub fn query(&mut self, aabb: AABB, mut callback: impl FnMut(ProxyId, T) -> bool) {
        let mut stack = std::mem::take(&mut self.shared_stack);
        stack.clear();
        if self.root != NULL_NODE {
            stack.push(self.root);
        }

        while let Some(id) = stack.pop() {
            let node = &self.nodes[id];
            if !node.aabb.overlaps(&aabb) {
                continue;
            }
            match node.kind {
                NodeKind::Leaf { data } => {
                    if !callback(id, data) {
                        break;
                    }
                }
                NodeKind::Branch { left, right } => {
                    stack.push(left);
                    stack.push(right);
                }
                NodeKind::Free { .. } => unreachable!(),
            }
        }

        stack.clear();
        self.shared_stack = stack;
    }

    /// Cast a segment through the tree, visiting leaves roughly front to
    /// back. The callback returns a new clip fraction: 0 terminates the
    /// cast, values below the current maximum shorten the remaining ray.
    pub fn ray_cast(
        &mut self,
        input: &RayCastInput,
        mut callback: impl FnMut(&RayCastInput, ProxyId, T) -> f64,
    ) {
        let p1 = input.p1;
        let p2 = input.p2;
        let r = p2 - p1;
        if r.mag_sq() <= 0.0 {
            return;
        }
        let r = r.normalized();
        // a separating axis perpendicular to the segment
        let v = m::left_normal(r);
        let abs_v = Vec2::new(v.x.abs(), v.y.abs());

        let mut max_fraction = input.max_fraction;
        let mut segment_aabb = AABB::point(p1).union(&AABB::point(p1 + (p2 - p1) * max_fraction));

        let mut stack = std::mem::take(&mut self.shared_stack);
        stack.clear();
        if self.root != NULL_NODE {
            stack.push(self.root);
        }

        while let Some(id) = stack.pop() {
            let node = &self.nodes[id];
            if !node.aabb.overlaps(&segment_aabb) {
                continue;
            }
            // |dot(v, p1 - c)| > dot(|v|, h) means the segment's line misses
            let c = node.aabb.center();
            let h = Vec2::new(node.aabb.width() * 0.5, node.aabb.height() * 0.5);
            let separation = v.dot(p1 - c).abs() - abs_v.dot(h);
            if separation > 0.0 {
                continue;
            }

            match node.kind {
                NodeKind::Leaf { data } => {
                    let sub_input = RayCastInput {
                        p1,
                        p2,
                        max_fraction,
                    };
                    let value = callback(&sub_input, id, data);
                    if value == 0.0 {
                        break;
                    }
                    if value > 0.0 {
                        max_fraction = value;
                        segment_aabb =
                            AABB::point(p1).union(&AABB::point(p1 + (p2 - p1) * max_fraction));
                    }
                }
                NodeKind::Branch { left, right } => {
                    stack.push(left);
                    stack.push(right);
                }
                NodeKind::Free { .. } => unreachable!(),
            }
        }

        stack.clear();
        self.shared_stack = stack;
    }

    //
    // Internals
    //

    fn allocate_node(&mut self) -> usize {
        if self.free_list == NULL_NODE {
            // arena grows by pushing; ids stay stable
            self.nodes.push(Node {
                aabb: AABB::EMPTY,
                parent: NULL_NODE,
                height: -1,
                kind: NodeKind::Free { next: NULL_NODE },
            });
            return self.nodes.len() - 1;
        }
        let id = self.free_list;
        self.free_list = match self.nodes[id].kind {
            NodeKind::Free { next } => next,
            _ => unreachable!(),
        };
        self.nodes[id].parent = NULL_NODE;
        id
    }

    fn free_node(&mut self, id: usize) {
        self.nodes[id].kind = NodeKind::Free {
            next: self.free_list,
        };
        self.nodes[id].height = -1;
        self.free_list = id;
    }

    fn insert_leaf(&mut self, leaf: usize) {
        if self.root == NULL_NODE {
            self.root = leaf;
            self.nodes[leaf].parent = NULL_NODE;
            return;
        }

        // find the sibling that minimizes the surface area added to the tree
        let leaf_aabb = self.nodes[leaf].aabb;
        let mut index = self.root;
        while let NodeKind::Branch { left, right } = self.nodes[index].kind {
            let area = self.nodes[index].aabb.perimeter();
            let combined_area = self.nodes[index].aabb.union(&leaf_aabb).perimeter();

            // cost of making a new parent for this node and the leaf
            let cost = 2.0 * combined_area;
            // minimum cost of pushing the leaf further down the tree
            let inheritance_cost = 2.0 * (combined_area - area);

            let child_cost = |child: usize, nodes: &Vec<Node<T>>| {
                let child_union = leaf_aabb.union(&nodes[child].aabb);
                let delta = if nodes[child].is_leaf() {
                    child_union.perimeter()
                } else {
                    child_union.perimeter() - nodes[child].aabb.perimeter()
                };
                delta + inheritance_cost
            };
            let cost_left = child_cost(left, &self.nodes);
            let cost_right = child_cost(right, &self.nodes);

            if cost < cost_left && cost < cost_right {
                break;
            }
            index = if cost_left < cost_right { left } else { right };
        }
        let sibling = index;

        // splice a new parent in above the sibling
        let old_parent = self.nodes[sibling].parent;
        let new_parent = self.allocate_node();
        self.nodes[new_parent].parent = old_parent;
        self.nodes[new_parent].aabb = leaf_aabb.union(&self.nodes[sibling].aabb);
        self.nodes[new_parent].height = self.nodes[sibling].height + 1;
        self.nodes[new_parent].kind = NodeKind::Branch {
            left: sibling,
            right: leaf,
        };
        self.nodes[sibling].parent = new_parent;
        self.nodes[leaf].parent = new_parent;

        if old_parent == NULL_NODE {
            self.root = new_parent;
        } else {
            let (left, right) = self.nodes[old_parent].children();
            self.nodes[old_parent].kind = if left == sibling {
                NodeKind::Branch {
                    left: new_parent,
                    right,
                }
            } else {
                NodeKind::Branch {
                    left,
                    right: new_parent,
                }
            };
        }

        self.refresh_upward(self.nodes[leaf].parent);
    }

    fn remove_leaf(&mut self, leaf: usize) {
        if leaf == self.root {
            self.root = NULL_NODE;
            return;
        }

        let parent = self.nodes[leaf].parent;
        let grand_parent = self.nodes[parent].parent;
        let (left, right) = self.nodes[parent].children();
        let sibling = if left == leaf { right } else { left };

        if grand_parent == NULL_NODE {
            self.root = sibling;
            self.nodes[sibling].parent = NULL_NODE;
            self.free_node(parent);
            return;
        }

        // destroy the parent and connect the sibling to the grandparent
        let (gleft, gright) = self.nodes[grand_parent].children();
        self.nodes[grand_parent].kind = if gleft == parent {
            NodeKind::Branch {
                left: sibling,
                right: gright,
            }
        } else {
            NodeKind::Branch {
                left: gleft,
                right: sibling,
            }
        };
        self.nodes[sibling].parent = grand_parent;
        self.free_node(parent);

        self.refresh_upward(grand_parent);
    }

    /// Walk from `index` to the root, rebalancing and refreshing heights
    /// and AABBs.
    fn refresh_upward(&mut self, mut index: usize) {
        while index != NULL_NODE {
            index = self.balance(index);

            let (left, right) = self.nodes[index].children();
            self.nodes[index].height =
                1 + self.nodes[left].height.max(self.nodes[right].height);
            self.nodes[index].aabb = self.nodes[left].aabb.union(&self.nodes[right].aabb);

            index = self.nodes[index].parent;
        }
    }

    /// Perform a left or right rotation if node `a`'s children differ in
    /// height by more than one. Returns the root of the rotated subtree.
    fn balance(&mut self, a: usize) -> usize {
        let (b, c) = match self.nodes[a].kind {
            NodeKind::Branch { left, right } if self.nodes[a].height >= 2 => (left, right),
            _ => return a,
        };

        let balance = self.nodes[c].height - self.nodes[b].height;
        if balance > 1 {
            self.rotate(a, c, b)
        } else if balance < -1 {
            self.rotate(a, b, c)
        } else {
            a
        }
    }

    /// Promote the taller child `up` above `a`; `other` stays below `a`.
    fn rotate(&mut self, a: usize, up: usize, other: usize) -> usize {
        let (up_left, up_right) = self.nodes[up].children();

        // up takes a's place
        self.nodes[up].parent = self.nodes[a].parent;
        self.nodes[a].parent = up;
        let up_parent = self.nodes[up].parent;
        if up_parent != NULL_NODE {
            let (pl, pr) = self.nodes[up_parent].children();
            self.nodes[up_parent].kind = if pl == a {
                NodeKind::Branch {
                    left: up,
                    right: pr,
                }
            } else {
                NodeKind::Branch { left: pl, right: up }
            };
        } else {
            self.root = up;
        }

        // the shorter grandchild moves under a
        let (keep, move_down) = if self.nodes[up_left].height > self.nodes[up_right].height {
            (up_left, up_right)
        } else {
            (up_right, up_left)
        };
        self.nodes[up].kind = NodeKind::Branch {
            left: a,
            right: keep,
        };
        self.nodes[a].kind = NodeKind::Branch {
            left: other,
            right: move_down,
        };
        self.nodes[move_down].parent = a;

        self.nodes[a].aabb = self.nodes[other].aabb.union(&self.nodes[move_down].aabb);
        self.nodes[up].aabb = self.nodes[a].aabb.union(&self.nodes[keep].aabb);
        self.nodes[a].height = 1 + self.nodes[other].height.max(self.nodes[move_down].height);
        self.nodes[up].height = 1 + self.nodes[a].height.max(self.nodes[keep].height);

        up
    }

    /// Height of the tree; 0 for a single leaf, -1 when empty.
    pub fn height(&self) -> i32 {
        if self.root == NULL_NODE {
            -1
        } else {
            self.nodes[self.root].height
        }
    }

    /// Walk the whole tree checking structural invariants.
    /// Intended for tests and debug assertions.
    pub fn validate(&self) -> bool {
        if self.root == NULL_NODE {
            return true;
        }
        if self.nodes[self.root].parent != NULL_NODE {
            return false;
        }
        self.validate_subtree(self.root)
    }

    fn validate_subtree(&self, index: usize) -> bool {
        let node = &self.nodes[index];
        match node.kind {
            NodeKind::Leaf { .. } => node.height == 0,
            NodeKind::Branch { left, right } => {
                let l = &self.nodes[left];
                let r = &self.nodes[right];
                l.parent == index
                    && r.parent == index
                    && node.height == 1 + l.height.max(r.height)
                    && (l.height - r.height).abs() <= 1
                    && node.aabb.contains(&l.aabb)
                    && node.aabb.contains(&r.aabb)
                    && self.validate_subtree(left)
                    && self.validate_subtree(right)
            }
            NodeKind::Free { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_box(center: Vec2) -> AABB {
        AABB::new(center - Vec2::new(0.5, 0.5), center + Vec2::new(0.5, 0.5))
    }

    #[test]
    fn insertion_keeps_tree_valid_and_balanced() {
        let mut tree: DynamicTree<u32> = DynamicTree::new();
        // a long row of boxes is the worst case for a naive insertion order
        for i in 0..64 {
            tree.create_proxy(unit_box(Vec2::new(i as f64 * 2.0, 0.0)), i, 0.1);
            assert!(tree.validate(), "invalid after inserting {}", i);
        }
        assert_eq!(tree.proxy_count(), 64);
        // a balanced tree over 64 leaves should be near log2(64)
        assert!(tree.height() <= 12, "height {} too large", tree.height());
    }

    #[test]
    fn query_finds_exactly_the_overlapping_leaves() {
        let mut tree: DynamicTree<u32> = DynamicTree::new();
        for i in 0..16 {
            tree.create_proxy(unit_box(Vec2::new(i as f64 * 3.0, 0.0)), i, 0.1);
        }
        let mut found = Vec::new();
        tree.query(
            AABB::new(Vec2::new(2.0, -0.4), Vec2::new(7.0, 0.4)),
            |_, data| {
                found.push(data);
                true
            },
        );
        found.sort_unstable();
        assert_eq!(found, vec![1, 2]);
    }

    #[test]
    fn move_within_fat_aabb_is_free() {
        let mut tree: DynamicTree<u32> = DynamicTree::new();
        let id = tree.create_proxy(unit_box(Vec2::zero()), 7, 0.5);
        // stays within the fattened bounds
        assert!(!tree.move_proxy(id, unit_box(Vec2::new(0.2, 0.0)), Vec2::new(0.2, 0.0), 0.5, 2.0));
        // jumps out
        assert!(tree.move_proxy(id, unit_box(Vec2::new(5.0, 0.0)), Vec2::new(4.8, 0.0), 0.5, 2.0));
        assert!(tree.validate());
        assert_eq!(tree.user_data(id), 7);
    }

    #[test]
    fn destroy_reuses_nodes() {
        let mut tree: DynamicTree<u32> = DynamicTree::new();
        let ids: Vec<_> = (0..8)
            .map(|i| tree.create_proxy(unit_box(Vec2::new(i as f64, 0.0)), i, 0.1))
            .collect();
        let nodes_before = tree.nodes.len();
        for id in ids {
            tree.destroy_proxy(id);
        }
        assert_eq!(tree.proxy_count(), 0);
        for i in 0..8 {
            tree.create_proxy(unit_box(Vec2::new(i as f64, 0.0)), i, 0.1);
        }
        // the arena should have been recycled rather than grown
        assert_eq!(tree.nodes.len(), nodes_before);
        assert!(tree.validate());
    }

    #[test]
    fn ray_cast_visits_leaves_and_respects_clipping() {
        let mut tree: DynamicTree<u32> = DynamicTree::new();
        for i in 0..8 {
            tree.create_proxy(unit_box(Vec2::new(i as f64 * 4.0 + 4.0, 0.0)), i, 0.0);
        }
        // without clipping, every box on the line is visited
        let input = RayCastInput::new(Vec2::new(0.0, 0.0), Vec2::new(40.0, 0.0));
        let mut visited = Vec::new();
        tree.ray_cast(&input, |sub, _, data| {
            visited.push(data);
            sub.max_fraction
        });
        visited.sort_unstable();
        assert_eq!(visited, (0..8).collect::<Vec<_>>());

        // a shortened ray only reaches the first two boxes
        let short = RayCastInput {
            p1: Vec2::new(0.0, 0.0),
            p2: Vec2::new(40.0, 0.0),
            max_fraction: 0.25,
        };
        let mut visited = Vec::new();
        tree.ray_cast(&short, |sub, _, data| {
            visited.push(data);
            sub.max_fraction
        });
        visited.sort_unstable();
        assert_eq!(visited, vec![0, 1]);

        // returning zero terminates immediately
        let mut count = 0;
        tree.ray_cast(&input, |_, _, _| {
            count += 1;
            0.0
        });
        assert_eq!(count, 1);

        // off-axis ray hits nothing
        let miss = RayCastInput::new(Vec2::new(0.0, 10.0), Vec2::new(40.0, 10.0));
        let mut count = 0;
        tree.ray_cast(&miss, |sub, _, _| {
            count += 1;
            sub.max_fraction
        });
        assert_eq!(count, 0);
    }
}
