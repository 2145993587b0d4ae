//! The simulation world: owns the frame arena and drives the per-tick
//! sequence of generation, propagation, delivery, and access control.
//! Frames live in a single arena keyed by handle; everything else
//! (`Station`, `Transmitter`, `Medium`) refers to them indirectly, which
//! keeps the ownership graph a tree instead of a cycle.

use std::collections::HashMap;

use log::{debug, trace};
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Exp};

use crate::config::{CONTROL_FRAME_SIZE, Config, ONE_SECOND};
use crate::frame::{Frame, FrameHandle, FrameType};
use crate::geometry::Point;
use crate::medium::Medium;
use crate::station::{self, Station, StationId};
use crate::stats::StationStats;
use crate::timeline::Timeline;
use crate::transmitter::{SendOutcome, Transmitter};

pub struct World {
    pub config: Config,
    pub timeline: Timeline,
    pub medium: Medium,
    pub stations: Vec<Station>,
    frames: HashMap<FrameHandle, Frame>,
    next_handle: u64,
    next_frame_id: u64,
    rng: StdRng,
    after_tick: Option<Box<dyn FnMut(&World)>>,
}

impl World {
    pub fn new(config: Config) -> Self {
        let mut rng = StdRng::seed_from_u64(config.seed);
        let timeline = Timeline::new(config.horizon, config.slot_time);
        let stations = (0..config.station_count)
            .map(|i| {
                let id = StationId(i);
                let location = if config.star_topology {
                    station::star_location(i, config.station_count, config.area_size)
                } else {
                    station::random_location(config.area_size, &mut rng)
                };
                let transmitter = Transmitter::new(&config, config.with_rts);
                Station::new(id, location, config.detect_range, transmitter)
            })
            .collect();

        World {
            config,
            timeline,
            medium: Medium::new(),
            stations,
            frames: HashMap::new(),
            next_handle: 0,
            next_frame_id: 0,
            rng,
            after_tick: None,
        }
    }

    pub fn set_after_tick(&mut self, hook: impl FnMut(&World) + 'static) {
        self.after_tick = Some(Box::new(hook));
    }

    fn alloc_handle(&mut self) -> FrameHandle {
        let handle = FrameHandle(self.next_handle);
        self.next_handle += 1;
        handle
    }

    fn alloc_frame_id(&mut self) -> u64 {
        let id = self.next_frame_id;
        self.next_frame_id += 1;
        id
    }

    fn positions(&self) -> HashMap<StationId, Point> {
        self.stations.iter().map(|s| (s.id, s.location)).collect()
    }

    /// Creates a frame, inserting it into the arena without departing it.
    /// `duration` — how long the frame occupies the medium once its front
    /// reaches a given point — is its serialization time at `data_rate`,
    /// the same quantity `Csma` uses to size `frame_time`/`cts_duration`.
    fn assemble_frame(&mut self, sender: StationId, receiver: StationId, frame_type: FrameType, size: f64) -> FrameHandle {
        let handle = self.alloc_handle();
        let duration = (size / self.config.data_rate * ONE_SECOND as f64) as u64;
        let frame = Frame {
            handle,
            id: self.alloc_frame_id(),
            sender,
            receiver,
            frame_type,
            size,
            duration,
            propagation_speed: self.config.propagation_speed,
            max_range: self.config.detect_range,
            sent: None,
            vanished: None,
            collision: false,
            is_duplicate: false,
        };
        self.frames.insert(handle, frame);
        handle
    }

    /// Marks a frame departed and registers it with the medium and
    /// timeline as an in-flight participant.
    fn depart_frame(&mut self, handle: FrameHandle, now: u64) {
        if let Some(frame) = self.frames.get_mut(&handle) {
            frame.mark_departed(now);
        }
        self.medium.depart(handle);
        self.timeline.add_participant(handle);
    }

    fn remove_frame(&mut self, handle: FrameHandle) -> Option<Frame> {
        self.timeline.remove_participant(handle);
        self.frames.remove(&handle)
    }

    pub fn run(mut self) -> Vec<StationStats> {
        while self.timeline.has_more_ticks() {
            self.tick();
            self.timeline.advance();
            if let Some(mut hook) = self.after_tick.take() {
                hook(&self);
                self.after_tick = Some(hook);
            }
        }
        self.stations.iter().map(|s| s.transmitter.stats.clone()).collect()
    }

    fn tick(&mut self) {
        let now = self.timeline.current;
        let step = self.timeline.step;

        self.generate_frames(now);
        self.advance_medium(now);
        self.dispatch_sends(now, step);
        self.check_timeouts(now);
    }

    /// Frame generation: each station's DATA traffic is an independent
    /// Poisson process at `frame_rate` frames per second, so interarrival
    /// times are exponentially distributed rather than fixed — a burst of
    /// several frames in one tick and a long quiet stretch afterward are
    /// both normal, not drift from rounding.
    fn generate_frames(&mut self, now: u64) {
        let station_count = self.stations.len();
        if station_count < 2 || self.config.frame_rate <= 0.0 {
            return;
        }
        let with_rts = self.config.with_rts;
        let frame_size = self.config.frame_size;
        let interarrival = Exp::new(self.config.frame_rate).expect("frame_rate must be positive");

        for i in 0..station_count {
            while now >= self.stations[i].next_generation_at {
                let next_in_seconds: f64 = interarrival.sample(&mut self.rng);
                let next_in_ticks = (next_in_seconds * ONE_SECOND as f64) as u64;
                self.stations[i].next_generation_at = now + next_in_ticks.max(1);

                let sender = self.stations[i].id;
                let mut receiver_index = self.rng.gen_range(0..station_count - 1);
                if receiver_index >= i {
                    receiver_index += 1;
                }
                let receiver = self.stations[receiver_index].id;

                let data_handle = self.assemble_frame(sender, receiver, FrameType::Data, frame_size);
                if with_rts {
                    let rts_handle =
                        self.assemble_frame(sender, receiver, FrameType::Rts, CONTROL_FRAME_SIZE);
                    let station = &mut self.stations[i];
                    station.transmitter.shield_data_behind_rts(rts_handle, data_handle);
                    let pushed = station.transmitter.push(rts_handle);
                    if !pushed {
                        station.transmitter.shielded_data.remove(&rts_handle);
                        self.remove_frame(rts_handle);
                        self.remove_frame(data_handle);
                    }
                } else {
                    let station = &mut self.stations[i];
                    if !station.transmitter.push(data_handle) {
                        self.remove_frame(data_handle);
                    }
                }
            }
        }
    }

    /// Advances every in-flight frame's occupancy window. A front arriving
    /// at a station is recorded in that station's detected-frame log and,
    /// for a bystander, sets NAV on RTS/CTS; a station's own addressed
    /// reception is resolved once its occupancy window closes, at which
    /// point overlap with another frame addressed to the same station
    /// (talkover) is the collision condition.
    fn advance_medium(&mut self, now: u64) {
        let positions = self.positions();
        let events = self.medium.advance(&mut self.frames, &positions, now);

        for (handle, station_id) in events.arrived {
            self.on_arrival(handle, station_id);
        }

        for (handle, station_id) in events.completed {
            self.on_reception_complete(handle, station_id, now);
        }

        for handle in events.vanished {
            self.remove_frame(handle);
        }
    }

    /// A frame's propagation front has just reached `station_id`. Every
    /// arrival — addressed to this station or merely overheard — goes into
    /// its detected-frame log; a bystander additionally sets NAV on
    /// RTS/CTS. If `station_id` is this frame's own intended receiver and
    /// another frame addressed to it is already mid-reception there, the
    /// two overlap in time (not just in the same tick) and both are marked
    /// as a talkover collision right away, rather than waiting for either
    /// to finish.
    fn on_arrival(&mut self, handle: FrameHandle, station_id: StationId) {
        let Some(frame) = self.frames.get(&handle).cloned() else { return };

        let overlapping: Vec<FrameHandle> = if station_id == frame.receiver {
            let detected: Vec<FrameHandle> = match self.stations.iter().find(|s| s.id == station_id) {
                Some(station) => station.transmitter.detected.all().copied().collect(),
                None => Vec::new(),
            };
            detected
                .into_iter()
                .filter(|&other| other != handle)
                .filter(|&other| self.frames.get(&other).map(|f| f.receiver) == Some(station_id))
                .collect()
        } else {
            Vec::new()
        };

        let Some(station) = self.station_mut(station_id) else { return };
        station.transmitter.on_detect(handle);
        if matches!(frame.frame_type, FrameType::Rts | FrameType::Cts) && station_id != frame.receiver {
            let nav = station.transmitter.csma.cts_duration;
            station.transmitter.csma.set_nav(nav);
        }

        if overlapping.is_empty() {
            return;
        }

        if let Some(frame) = self.frames.get_mut(&handle) {
            frame.collide();
        }
        for other in &overlapping {
            if let Some(frame) = self.frames.get_mut(other) {
                frame.collide();
            }
        }
        if let Some(station) = self.station_mut(station_id) {
            station.transmitter.stats.add_collision();
        }
    }

    /// A frame has finished occupying the medium at `station_id`. This
    /// closes out that station's detected-frame entry; if `station_id` is
    /// the frame's own intended receiver and it survived without
    /// colliding, its content is processed here.
    fn on_reception_complete(&mut self, handle: FrameHandle, station_id: StationId, now: u64) {
        let Some(frame) = self.frames.get(&handle).cloned() else { return };

        if let Some(station) = self.station_mut(station_id) {
            station.transmitter.on_reception_done(handle);
        }

        if station_id != frame.receiver || frame.collision {
            return;
        }

        self.deliver(handle, now);
    }

    fn deliver(&mut self, handle: FrameHandle, now: u64) {
        let Some(frame) = self.frames.get(&handle).cloned() else { return };

        match frame.frame_type {
            FrameType::Rts => {
                if let Some(receiver) = self.station_mut(frame.receiver) {
                    receiver.transmitter.on_data_or_rts_received(frame.frame_type, frame.size);
                    let ready_at = now + receiver.transmitter.csma.sifs_amount;
                    let cts_handle = self.assemble_frame(frame.receiver, frame.sender, FrameType::Cts, CONTROL_FRAME_SIZE);
                    if let Some(receiver) = self.station_mut(frame.receiver) {
                        receiver.transmitter.queue_reply(cts_handle, ready_at);
                    }
                }
            }
            FrameType::Data => {
                if let Some(receiver) = self.station_mut(frame.receiver) {
                    receiver.transmitter.on_data_or_rts_received(frame.frame_type, frame.size);
                    let ready_at = now + receiver.transmitter.csma.sifs_amount;
                    let ack_handle = self.assemble_frame(frame.receiver, frame.sender, FrameType::Ack, CONTROL_FRAME_SIZE);
                    if let Some(receiver) = self.station_mut(frame.receiver) {
                        receiver.transmitter.queue_reply(ack_handle, ready_at);
                    }
                }
            }
            FrameType::Cts => {
                if let Some(sender) = self.station_mut(frame.receiver) {
                    sender.transmitter.on_reply_received(frame.frame_type, frame.size);
                    sender.transmitter.csma.set_allocated(sender.transmitter.csma.cts_duration);
                    if let Some(data_handle) = sender.transmitter.release_shielded_data(handle) {
                        let ready_at = now + sender.transmitter.csma.sifs_amount;
                        sender.transmitter.queue_reply(data_handle, ready_at);
                    }
                }
            }
            FrameType::Ack => {
                if let Some(sender) = self.station_mut(frame.receiver) {
                    sender.transmitter.on_reply_received(frame.frame_type, frame.size);
                }
            }
        }

        trace!("t={now} delivered {} {:?} -> {:?}", frame.frame_type.label(), frame.sender, frame.receiver);
    }

    fn station_mut(&mut self, id: StationId) -> Option<&mut Station> {
        self.stations.iter_mut().find(|s| s.id == id)
    }

    /// Lets every station either send its pending reply (CTS/ACK/shielded
    /// DATA) or contend for fresh access, depending on what it owes.
    fn dispatch_sends(&mut self, now: u64, step: u64) {
        let positions = self.positions();
        for i in 0..self.stations.len() {
            let location = self.stations[i].location;
            let medium_busy = self.medium.channel_busy_at(&self.frames, &positions, location, now);

            if let Some(handle) = self.stations[i].transmitter.take_ready_reply(now, medium_busy) {
                self.depart_frame(handle, now);
                if let Some(frame) = self.frames.get(&handle).cloned() {
                    self.stations[i].transmitter.stats.add_sent_record(frame.frame_type, frame.size);
                }
                continue;
            }

            let head_type = self
                .stations[i]
                .transmitter
                .send_queue
                .get()
                .and_then(|h| self.frames.get(h))
                .map(|f| f.frame_type);
            let Some(head_type) = head_type else { continue };

            let outcome = self.stations[i].transmitter.proceed_send(head_type, medium_busy, step, &mut self.rng);
            if let SendOutcome::Go(handle) = outcome {
                let size = self.frames.get(&handle).map(|f| f.size).unwrap_or(0.0);
                self.depart_frame(handle, now);
                self.stations[i].transmitter.on_sent(handle, head_type, size, now);
                debug!("t={now} station {:?} departs {}", self.stations[i].id, head_type.label());
            }
        }
    }

    fn check_timeouts(&mut self, now: u64) {
        for station in self.stations.iter_mut() {
            if station.transmitter.timeout_occured(now) {
                station.transmitter.on_timeout();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn short_config() -> Config {
        let mut config = Config::default();
        config.station_count = 3;
        config.horizon = ONE_SECOND / 10;
        config.seed = 7;
        config
    }

    #[test]
    fn basic_exchange_produces_traffic() {
        let world = World::new(short_config());
        let stats = world.run();
        let total_sent: u64 = stats.iter().flat_map(|s| s.sent.iter()).map(|c| c.count).sum();
        assert!(total_sent > 0);
    }

    #[test]
    fn with_rts_enabled_rts_and_cts_are_exchanged() {
        let mut config = short_config();
        config.with_rts = true;
        config.frame_rate = 500.0;
        let world = World::new(config);
        let stats = world.run();
        let rts_sent: u64 = stats.iter().map(|s| s.sent[FrameType::Rts.index()].count).sum();
        assert!(rts_sent > 0);
    }

    #[test]
    fn overlapping_frames_addressed_to_same_receiver_collide_on_arrival() {
        let mut world = World::new(short_config());
        let sender_a = StationId(0);
        let sender_b = StationId(1);
        let receiver = StationId(2);
        let size = world.config.frame_size;

        let frame_a = world.assemble_frame(sender_a, receiver, FrameType::Data, size);
        let frame_b = world.assemble_frame(sender_b, receiver, FrameType::Data, size);

        world.on_arrival(frame_a, receiver);
        assert!(!world.frames[&frame_a].collision);

        world.on_arrival(frame_b, receiver);
        assert!(world.frames[&frame_a].collision);
        assert!(world.frames[&frame_b].collision);
    }

    #[test]
    fn a_frame_overheard_by_a_bystander_does_not_collide_with_its_own_receiver() {
        let mut world = World::new(short_config());
        let sender = StationId(0);
        let receiver = StationId(1);
        let bystander = StationId(2);
        let size = world.config.frame_size;

        let frame = world.assemble_frame(sender, receiver, FrameType::Data, size);
        world.on_arrival(frame, bystander);
        world.on_arrival(frame, receiver);
        assert!(!world.frames[&frame].collision);
    }

    #[test]
    fn deterministic_for_a_fixed_seed() {
        let stats_a = World::new(short_config()).run();
        let stats_b = World::new(short_config()).run();
        let sum = |stats: &[StationStats]| -> u64 {
            stats.iter().flat_map(|s| s.sent.iter()).map(|c| c.count).sum()
        };
        assert_eq!(sum(&stats_a), sum(&stats_b));
    }
}
