use crate::DanmuConfig;

/// A fixed horizontal slot used to avoid vertical overlap between
/// simultaneously traveling messages.
#[derive(Debug, Clone)]
pub struct Lane {
    pub index: usize,
    /// Distance from the top of the viewport, in pixels.
    pub vertical_offset: f32,
    /// Whether a message is currently assigned to this lane.
    pub occupied: bool,
    /// When the assigned message is expected to have fully exited.
    /// Advisory bookkeeping, kept even after the occupancy flag is freed.
    pub occupied_until_ms: u64,
}

/// The set of lanes computed from the viewport height.
#[derive(Debug, Default)]
pub struct LaneTable {
    lanes: Vec<Lane>,
}

impl LaneTable {
    pub fn new(config: &DanmuConfig, viewport_height: f32) -> Self {
        let lanes = (0..config.lane_count(viewport_height))
            .map(|index| Lane {
                index,
                vertical_offset: config.lane_offset(index),
                occupied: false,
                occupied_until_ms: 0,
            })
            .collect();

        Self { lanes }
    }

    pub fn len(&self) -> usize {
        self.lanes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lanes.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Lane> {
        self.lanes.get(index)
    }

    /// Finds the lane the next message should be placed on.
    ///
    /// A lane whose occupancy window has passed is preferred. If every lane
    /// is still occupied, the one that frees up earliest is chosen instead.
    /// Traveling messages desynchronize in practice, so a brief bookkeeping
    /// overlap is an accepted heuristic rather than a hard guarantee.
    pub fn pick(&self, now_ms: u64) -> Option<usize> {
        if self.lanes.is_empty() {
            return None;
        }

        let free = self
            .lanes
            .iter()
            .find(|lane| lane.occupied_until_ms <= now_ms);

        if let Some(lane) = free {
            return Some(lane.index);
        }

        self.lanes
            .iter()
            .min_by_key(|lane| lane.occupied_until_ms)
            .map(|lane| lane.index)
    }

    /// Marks a lane as holding a message until the given time.
    pub fn occupy(&mut self, index: usize, until_ms: u64) {
        if let Some(lane) = self.lanes.get_mut(index) {
            lane.occupied = true;
            lane.occupied_until_ms = until_ms;
        }
    }

    /// Frees the occupancy flag when a message finishes animating.
    /// The occupancy window stays as-is, it is informative only.
    pub fn release(&mut self, index: usize) {
        if let Some(lane) = self.lanes.get_mut(index) {
            lane.occupied = false;
        }
    }

    /// Returns every lane to the unoccupied state.
    pub fn reset(&mut self) {
        for lane in self.lanes.iter_mut() {
            lane.occupied = false;
            lane.occupied_until_ms = 0;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn table_of(count: usize) -> LaneTable {
        let config = DanmuConfig {
            lane_height: 40.,
            top_margin: 0.,
            bottom_margin: 0.,
            ..Default::default()
        };

        LaneTable::new(&config, count as f32 * 40.)
    }

    #[test]
    fn test_prefers_free_lanes_in_order() {
        let mut table = table_of(3);

        assert_eq!(table.pick(1000), Some(0));
        table.occupy(0, 5000);

        assert_eq!(table.pick(1000), Some(1));
        table.occupy(1, 5000);

        assert_eq!(table.pick(1000), Some(2));
    }

    #[test]
    fn test_falls_back_to_earliest_occupied() {
        let mut table = table_of(3);

        table.occupy(0, 8000);
        table.occupy(1, 3000);
        table.occupy(2, 5000);

        // Nothing is free at t=1000, so the least-bad lane wins
        assert_eq!(table.pick(1000), Some(1));

        // Once a window passes, that lane is free again
        assert_eq!(table.pick(3500), Some(1));
    }

    #[test]
    fn test_release_keeps_occupancy_window() {
        let mut table = table_of(2);

        table.occupy(0, 5000);
        table.release(0);

        let lane = table.get(0).unwrap();
        assert!(!lane.occupied);
        assert_eq!(lane.occupied_until_ms, 5000);
    }

    #[test]
    fn test_empty_viewport_has_no_lanes() {
        let table = table_of(0);
        assert_eq!(table.pick(0), None);
    }
}
