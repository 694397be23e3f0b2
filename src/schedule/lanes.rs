//! Lane assignment for concurrent events in a day column.
//!
//! Events are colored greedily in `(start, id)` order: each takes the lowest
//! lane not used by an already placed event it overlaps. Every event then
//! reports the lane count of its connected overlap-group, so siblings share a
//! common width. A late arrival may raise the group's count but never moves an
//! earlier event to another lane.
//!
//! The group-wide count is a known limitation: a long chain of pairwise
//! overlaps can make every member as narrow as the widest point of the chain,
//! even where only two events are actually concurrent.

use std::collections::{HashMap, HashSet};

use super::event::{EventId, ScheduleEvent};
use super::overlap::overlaps;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LanePlacement {
    pub lane: usize,
    pub lane_count: usize,
}

impl LanePlacement {
    pub fn width_percent(&self) -> f64 {
        100.0 / self.lane_count.max(1) as f64
    }

    pub fn left_percent(&self) -> f64 {
        self.lane as f64 * self.width_percent()
    }
}

pub type LaneMap = HashMap<EventId, LanePlacement>;

/// Assigns lanes to the events of one day.
///
/// Input order does not matter. Events on different weekdays never overlap,
/// so passing a mixed set yields independent groups per day.
pub fn assign_lanes<'a, I>(events: I) -> LaneMap
where
    I: IntoIterator<Item = &'a ScheduleEvent>,
{
    let mut sorted: Vec<&ScheduleEvent> = events.into_iter().collect();
    sorted.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.id.cmp(&b.id)));

    let mut lanes: Vec<usize> = Vec::with_capacity(sorted.len());
    let mut groups = OverlapGroups::default();

    for (index, event) in sorted.iter().enumerate() {
        let neighbours: Vec<usize> = sorted[..index]
            .iter()
            .enumerate()
            .filter(|(_, placed)| overlaps(placed, event))
            .map(|(placed_index, _)| placed_index)
            .collect();

        let occupied: HashSet<usize> = neighbours.iter().map(|&n| lanes[n]).collect();
        let lane = (0..=occupied.len())
            .find(|candidate| !occupied.contains(candidate))
            .unwrap_or(occupied.len());
        lanes.push(lane);

        let member = groups.add(lane + 1);
        for neighbour in neighbours {
            groups.union(member, neighbour);
        }
    }

    sorted
        .iter()
        .enumerate()
        .map(|(index, event)| {
            let placement = LanePlacement {
                lane: lanes[index],
                lane_count: groups.lane_count(index),
            };
            (event.id, placement)
        })
        .collect()
}

/// Highest lane count in a day, at least 1.
pub fn max_lane_count(lanes: &LaneMap) -> usize {
    lanes
        .values()
        .map(|placement| placement.lane_count)
        .max()
        .unwrap_or(1)
        .max(1)
}

/// A day column widens by `increment` for every lane past the first.
pub fn column_width(base_width: f64, increment: f64, max_lane_count: usize) -> f64 {
    base_width + (max_lane_count.max(1) - 1) as f64 * increment
}

/// Union-find over placed events, tracking the lane count of each group.
#[derive(Debug, Default)]
struct OverlapGroups {
    parent: Vec<usize>,
    lane_count: Vec<usize>,
}

impl OverlapGroups {
    fn add(&mut self, lane_count: usize) -> usize {
        let index = self.parent.len();
        self.parent.push(index);
        self.lane_count.push(lane_count);
        index
    }

    fn find(&mut self, mut node: usize) -> usize {
        while self.parent[node] != node {
            self.parent[node] = self.parent[self.parent[node]];
            node = self.parent[node];
        }
        node
    }

    fn union(&mut self, a: usize, b: usize) {
        let root_a = self.find(a);
        let root_b = self.find(b);
        if root_a == root_b {
            return;
        }
        let merged = self.lane_count[root_a].max(self.lane_count[root_b]);
        self.parent[root_b] = root_a;
        self.lane_count[root_a] = merged;
    }

    fn lane_count(&mut self, node: usize) -> usize {
        let root = self.find(node);
        self.lane_count[root]
    }
}
