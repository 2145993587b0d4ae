//! The shared channel: carrier sense and per-tick frame propagation.
//!
//! `Medium` holds no station or frame state of its own beyond the list of
//! in-flight handles and which stations have already been notified about
//! each one — everything it reasons about (positions, frame metadata) is
//! borrowed from the simulation world each tick, so there is no ownership
//! cycle between `Medium`, `Station`, and `Frame`.
//!
//! A frame's propagation front expands outward from its sender at
//! `propagation_speed`; every station the front newly reaches this tick is
//! notified exactly once, whether or not it is the frame's intended
//! receiver — this is what lets an uninvolved station overhear an RTS/CTS
//! for NAV purposes.
//!
//! Propagation and occupancy are two different things. A station's front
//! *arrival* tells it a frame exists; the frame keeps occupying the medium
//! at that station for its full transmission time afterwards, not for a
//! single instant. `channel_busy_at` and frame retirement both key off that
//! occupancy window (`Frame::occupies`/`Frame::vanish_at`), not off bare
//! front position.

use std::collections::{HashMap, HashSet};

use crate::frame::{Frame, FrameHandle};
use crate::geometry::{self, Point};
use crate::station::StationId;

#[derive(Debug, Default)]
pub struct Medium {
    /// Handles currently propagating, in departure order.
    active: Vec<FrameHandle>,
    /// (frame, station) pairs whose front arrival has already been
    /// reported, so a station is only notified once even though the front
    /// keeps expanding tick to tick.
    notified: HashSet<(FrameHandle, StationId)>,
    /// (frame, station) pairs whose occupancy window has already closed at
    /// that station, so completion is only reported once.
    completed: HashSet<(FrameHandle, StationId)>,
}

#[derive(Debug, Default)]
pub struct MediumEvents {
    /// Every (frame, station) the propagation front newly reached this
    /// tick, in no particular order.
    pub arrived: Vec<(FrameHandle, StationId)>,
    /// Every (frame, station) whose occupancy window at that station just
    /// closed: the frame has now fully passed through, so this is when a
    /// station's own reception of an addressed frame is resolved.
    pub completed: Vec<(FrameHandle, StationId)>,
    /// Frames that have finished occupying the medium everywhere within
    /// `max_range` and so are no longer in flight.
    pub vanished: Vec<FrameHandle>,
}

impl Medium {
    pub fn new() -> Self {
        Medium { active: Vec::new(), notified: HashSet::new(), completed: HashSet::new() }
    }

    pub fn depart(&mut self, handle: FrameHandle) {
        self.active.push(handle);
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Physical carrier sense: the channel is busy at `location` if any
    /// active frame currently occupies it — front already arrived, full
    /// transmission time not yet elapsed.
    pub fn channel_busy_at(
        &self,
        frames: &HashMap<FrameHandle, Frame>,
        positions: &HashMap<StationId, Point>,
        location: Point,
        now: u64,
    ) -> bool {
        self.active.iter().any(|handle| {
            let Some(frame) = frames.get(handle) else { return false };
            let Some(&sender_pos) = positions.get(&frame.sender) else { return false };
            let distance = geometry::distance(sender_pos, location);
            frame.occupies(distance, now)
        })
    }

    /// Advances every active frame by one tick: notifies stations whose
    /// front just arrived, reports stations whose occupancy window just
    /// closed, and retires frames that have finished occupying the medium
    /// everywhere within `max_range`.
    pub fn advance(
        &mut self,
        frames: &mut HashMap<FrameHandle, Frame>,
        positions: &HashMap<StationId, Point>,
        now: u64,
    ) -> MediumEvents {
        let mut events = MediumEvents::default();
        let mut still_active = Vec::with_capacity(self.active.len());

        for handle in self.active.drain(..) {
            let Some(frame) = frames.get(&handle) else { continue };
            let Some(&sender_pos) = positions.get(&frame.sender) else { continue };
            let Some(vanish_at) = frame.vanish_at() else { continue };

            for (&station_id, &station_pos) in positions {
                if station_id == frame.sender {
                    continue;
                }
                let distance = geometry::distance(sender_pos, station_pos);
                if distance > frame.max_range {
                    continue;
                }

                let arrival_key = (handle, station_id);
                if !self.notified.contains(&arrival_key) {
                    if let Some(arrival) = frame.arrival_at(distance) {
                        if now >= arrival {
                            self.notified.insert(arrival_key);
                            events.arrived.push((handle, station_id));
                        }
                    }
                }

                let completion_key = (handle, station_id);
                if self.notified.contains(&arrival_key) && !self.completed.contains(&completion_key) {
                    if let Some(end) = frame.reception_ends_at(distance) {
                        if now >= end {
                            self.completed.insert(completion_key);
                            events.completed.push((handle, station_id));
                        }
                    }
                }
            }

            if now >= vanish_at {
                if let Some(frame) = frames.get_mut(&handle) {
                    frame.mark_vanished(now);
                }
                self.notified.retain(|&(h, _)| h != handle);
                self.completed.retain(|&(h, _)| h != handle);
                events.vanished.push(handle);
            } else {
                still_active.push(handle);
            }
        }

        self.active = still_active;
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{FrameHandle, FrameType};

    fn frame(sender: StationId, receiver: StationId, max_range: f64) -> Frame {
        Frame {
            handle: FrameHandle(1),
            id: 1,
            sender,
            receiver,
            frame_type: FrameType::Data,
            size: 12000.0,
            duration: 20,
            propagation_speed: 1.0,
            max_range,
            sent: Some(0),
            vanished: None,
            collision: false,
            is_duplicate: false,
        }
    }

    #[test]
    fn frame_within_range_notifies_then_completes_after_its_duration() {
        let mut medium = Medium::new();
        let mut frames = HashMap::new();
        frames.insert(FrameHandle(1), frame(StationId(0), StationId(1), 100.0));
        medium.depart(FrameHandle(1));

        let mut positions = HashMap::new();
        positions.insert(StationId(0), Point::new(0.0, 0.0));
        positions.insert(StationId(1), Point::new(10.0, 0.0));

        // Front arrives at tick 10, but the frame keeps occupying the medium
        // there until its duration elapses — arrival and vanishing are not
        // the same moment.
        let events = medium.advance(&mut frames, &positions, 10);
        assert_eq!(events.arrived, vec![(FrameHandle(1), StationId(1))]);
        assert!(events.completed.is_empty());
        assert!(events.vanished.is_empty());
        assert!(!medium.active.is_empty());

        // Reception completes at 10 + duration = 30; the frame itself stays
        // in flight until the farthest point within max_range has finished
        // receiving it, at 0 + max_range/speed + duration = 120.
        let events = medium.advance(&mut frames, &positions, 120);
        assert_eq!(events.completed, vec![(FrameHandle(1), StationId(1))]);
        assert_eq!(events.vanished, vec![FrameHandle(1)]);
        assert!(medium.active.is_empty());
    }

    #[test]
    fn a_bystander_within_range_overhears_without_being_the_receiver() {
        let mut medium = Medium::new();
        let mut frames = HashMap::new();
        frames.insert(FrameHandle(1), frame(StationId(0), StationId(1), 100.0));
        medium.depart(FrameHandle(1));

        let mut positions = HashMap::new();
        positions.insert(StationId(0), Point::new(0.0, 0.0));
        positions.insert(StationId(1), Point::new(90.0, 0.0));
        positions.insert(StationId(2), Point::new(5.0, 0.0));

        let events = medium.advance(&mut frames, &positions, 10);
        assert!(events.arrived.contains(&(FrameHandle(1), StationId(2))));
        assert!(!events.arrived.iter().any(|&(_, s)| s == StationId(1))); // receiver not yet reached
        assert!(!events.vanished.contains(&FrameHandle(1)));
    }

    #[test]
    fn frame_beyond_max_range_vanishes_without_reaching_its_receiver() {
        let mut medium = Medium::new();
        let mut frames = HashMap::new();
        frames.insert(FrameHandle(1), frame(StationId(0), StationId(1), 5.0));
        medium.depart(FrameHandle(1));

        let mut positions = HashMap::new();
        positions.insert(StationId(0), Point::new(0.0, 0.0));
        positions.insert(StationId(1), Point::new(100.0, 0.0));

        // vanish_at = 0 + max_range/speed + duration = 0 + 5 + 20 = 25.
        let events = medium.advance(&mut frames, &positions, 10);
        assert!(events.vanished.is_empty());

        let events = medium.advance(&mut frames, &positions, 25);
        assert_eq!(events.vanished, vec![FrameHandle(1)]);
        assert!(events.arrived.is_empty());
    }

    #[test]
    fn channel_busy_spans_the_frames_full_occupancy_window() {
        let mut medium = Medium::new();
        let mut frames = HashMap::new();
        frames.insert(FrameHandle(1), frame(StationId(0), StationId(1), 100.0));
        medium.depart(FrameHandle(1));

        let mut positions = HashMap::new();
        positions.insert(StationId(0), Point::new(0.0, 0.0));
        positions.insert(StationId(1), Point::new(10.0, 0.0));

        // Point is 50 units out; the front hasn't arrived by tick 1.
        assert!(!medium.channel_busy_at(&frames, &positions, Point::new(50.0, 0.0), 1));

        // Point is 5 units out: busy from arrival (tick 5) through
        // arrival + duration (tick 25), not just the instant of arrival.
        assert!(!medium.channel_busy_at(&frames, &positions, Point::new(5.0, 0.0), 4));
        assert!(medium.channel_busy_at(&frames, &positions, Point::new(5.0, 0.0), 5));
        assert!(medium.channel_busy_at(&frames, &positions, Point::new(5.0, 0.0), 24));
        assert!(!medium.channel_busy_at(&frames, &positions, Point::new(5.0, 0.0), 25));
    }
}
