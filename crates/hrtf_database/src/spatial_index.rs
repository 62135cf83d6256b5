//! A 3-d k-d tree over measurement positions.
//!
//! The tree is implicit: points are stored in an array where the median of every subrange is the node splitting it,
//! so there are no node allocations and a query needs no stack beyond its recursion, which is `O(log P)` deep.
use crate::Vec3;

pub(crate) struct KdTree {
    points: Vec<Vec3>,
    /// Measurement index of each entry of `points`.
    ids: Vec<u32>,
}

struct Best {
    distance: f32,
    id: u32,
}

impl Best {
    /// Keep the closer candidate, and on exact ties the lower index.
    #[inline(always)]
    fn offer(&mut self, distance: f32, id: u32) {
        if distance < self.distance || (distance == self.distance && id < self.id) {
            self.distance = distance;
            self.id = id;
        }
    }
}

impl KdTree {
    /// Build over `positions`, which must all be finite.
    pub(crate) fn new(positions: &[Vec3]) -> KdTree {
        let mut entries: Vec<(Vec3, u32)> = positions
            .iter()
            .enumerate()
            .map(|(i, p)| (*p, i as u32))
            .collect();
        build(&mut entries, 0);

        KdTree {
            points: entries.iter().map(|e| e.0).collect(),
            ids: entries.iter().map(|e| e.1).collect(),
        }
    }

    /// Index of the measurement closest to `query`, or `None` if the tree is empty.
    ///
    /// Equidistant measurements go to the lowest index.
    pub(crate) fn nearest(&self, query: Vec3) -> Option<usize> {
        if self.points.is_empty() {
            return None;
        }

        let mut best = Best {
            distance: f32::INFINITY,
            id: u32::MAX,
        };
        self.search(0, self.points.len(), 0, query, &mut best);
        Some(best.id as usize)
    }

    fn search(&self, lo: usize, hi: usize, depth: usize, query: Vec3, best: &mut Best) {
        if lo >= hi {
            return;
        }

        let mid = lo + (hi - lo) / 2;
        let point = self.points[mid];
        best.offer(query.distance_squared(point), self.ids[mid]);

        let axis = depth % 3;
        let diff = query.axis(axis) - point.axis(axis);
        let (near, far) = if diff < 0.0 {
            ((lo, mid), (mid + 1, hi))
        } else {
            ((mid + 1, hi), (lo, mid))
        };

        self.search(near.0, near.1, depth + 1, query, best);
        // `<=` rather than `<`: the far side may hold an equally close point with a lower index.
        if diff * diff <= best.distance {
            self.search(far.0, far.1, depth + 1, query, best);
        }
    }
}

fn build(entries: &mut [(Vec3, u32)], depth: usize) {
    if entries.len() <= 1 {
        return;
    }

    let axis = depth % 3;
    let mid = entries.len() / 2;
    entries.select_nth_unstable_by(mid, |a, b| a.0.axis(axis).total_cmp(&b.0.axis(axis)));

    let (left, right) = entries.split_at_mut(mid);
    build(left, depth + 1);
    build(&mut right[1..], depth + 1);
}
