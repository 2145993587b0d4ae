//! Queues and access-control glue between a `Station` and the `Csma` state
//! machine it drives.
//!
//! The transmitter never touches a `Frame` directly — only `FrameHandle`s —
//! since the frame arena lives on the simulation world. Every method that
//! needs to reason about a frame's type or size takes it as an argument
//! rather than looking it up itself.

use std::collections::HashMap;

use rand::Rng;

use crate::config::Config;
use crate::csma::Csma;
use crate::frame::{FrameHandle, FrameStorage, FrameType};
use crate::station::StationId;
use crate::stats::StationStats;

#[derive(Debug)]
pub struct Transmitter {
    pub csma: Csma,
    pub send_queue: FrameStorage<FrameHandle>,
    pub detected: FrameStorage<FrameHandle>,
    pub with_rts: bool,

    /// Set once `Csma::set_difs`/`set_sifs` has been called for the frame
    /// currently at the head of `send_queue`, so repeated ticks don't
    /// re-arm (and so reset) the timer while it is still counting down.
    armed: bool,

    /// Handle of the DATA/RTS this station is waiting on a CTS/ACK for.
    pub awaiting_reply_for: Option<FrameHandle>,
    pub reply_deadline: Option<u64>,
    /// SIFS plus two frame times: long enough for a CTS or ACK to arrive
    /// after the frame that solicited it.
    pub timeout: u64,

    /// A CTS or ACK this station owes a SIFS after receiving the frame
    /// that solicited it. Replies bypass ordinary CSMA contention — a
    /// station doesn't re-enter backoff just to answer.
    pub pending_reply: Option<FrameHandle>,
    pub reply_ready_at: Option<u64>,

    /// RTS handle to the DATA frame it is shielding. Populated when RTS/CTS
    /// is in use; once the matching CTS arrives the DATA frame is released
    /// as an immediate SIFS-gated reply rather than re-contending.
    pub shielded_data: HashMap<FrameHandle, FrameHandle>,

    pub stats: StationStats,
}

pub enum SendOutcome {
    /// Access granted; pop and transmit this handle.
    Go(FrameHandle),
    /// Still contending, waiting on NAV, or queue empty.
    Wait,
}

impl Transmitter {
    pub fn new(config: &Config, with_rts: bool) -> Self {
        let csma = Csma::new(config);
        let timeout = csma.sifs_amount + 2 * csma.frame_time;
        Transmitter {
            csma,
            send_queue: FrameStorage::new(config.queue_size),
            detected: FrameStorage::new(config.queue_size),
            with_rts,
            armed: false,
            awaiting_reply_for: None,
            reply_deadline: None,
            timeout,
            pending_reply: None,
            reply_ready_at: None,
            shielded_data: HashMap::new(),
            stats: StationStats::new(StationId(0)),
        }
    }

    pub fn with_station_id(mut self, id: StationId) -> Self {
        self.stats = StationStats::new(id);
        self
    }

    /// Enqueues a freshly generated application frame. Returns `false` if
    /// the send queue was full and the frame was dropped.
    pub fn push(&mut self, handle: FrameHandle) -> bool {
        if self.send_queue.is_full() {
            return false;
        }
        self.send_queue.push(handle);
        true
    }

    /// Records a frame whose propagation front just reached this station,
    /// addressed to it or not, for the detected-frame log. Does not affect
    /// access control directly — NAV is set explicitly by the caller via
    /// `Csma::set_nav`. A station with more than one entry here addressed
    /// to it at once is in talkover: the caller uses `detected.all()` to
    /// tell whether a just-completed reception overlapped another frame.
    pub fn on_detect(&mut self, handle: FrameHandle) {
        self.detected.push(handle);
    }

    /// Pops `handle` out of the detected-frame log once its occupancy
    /// window at this station has closed.
    pub fn on_reception_done(&mut self, handle: FrameHandle) {
        self.detected.remove(&handle);
    }

    /// Gate called once per tick while `send_queue` is non-empty. `head`
    /// describes the frame at the head of the queue (looked up by the
    /// caller in the frame arena) so `Csma::is_difs` can pick DIFS or SIFS.
    pub fn proceed_send(
        &mut self,
        head: FrameType,
        medium_busy: bool,
        step: u64,
        rng: &mut impl Rng,
    ) -> SendOutcome {
        if self.send_queue.is_empty() {
            return SendOutcome::Wait;
        }
        if !self.armed {
            if self.csma.is_difs(self.with_rts, head) {
                self.csma.set_difs();
            } else {
                self.csma.set_sifs();
            }
            self.armed = true;
        }
        if self.csma.check_and_decrease(medium_busy, step, rng) {
            self.armed = false;
            match self.send_queue.pop() {
                Some(handle) => SendOutcome::Go(handle),
                None => SendOutcome::Wait,
            }
        } else {
            SendOutcome::Wait
        }
    }

    /// Call once a frame has actually departed the medium, to record the
    /// byte count and (for RTS senders) arm the reply timeout.
    pub fn on_sent(&mut self, handle: FrameHandle, frame_type: FrameType, size: f64, now: u64) {
        self.stats.add_sent_record(frame_type, size);
        match frame_type {
            FrameType::Rts | FrameType::Data => {
                self.awaiting_reply_for = Some(handle);
                self.reply_deadline = Some(now + self.timeout);
            }
            FrameType::Cts | FrameType::Ack => {}
        }
    }

    /// A CTS or ACK addressed to this station closes out the handshake:
    /// the backoff window resets and the station may contend again.
    pub fn on_reply_received(&mut self, frame_type: FrameType, size: f64) {
        self.stats.add_recv_record(frame_type, size);
        self.awaiting_reply_for = None;
        self.reply_deadline = None;
        self.csma.reset_backoff_range();
    }

    pub fn on_data_or_rts_received(&mut self, frame_type: FrameType, size: f64) {
        self.stats.add_recv_record(frame_type, size);
    }

    /// True once `now` has passed the reply deadline without `on_reply_received`
    /// having cleared it — an ACK/CTS that never arrived.
    pub fn timeout_occured(&self, now: u64) -> bool {
        matches!(self.reply_deadline, Some(deadline) if now >= deadline)
    }

    /// Clears the outstanding wait and doubles the contention window, the
    /// same penalty a detected collision applies.
    pub fn on_timeout(&mut self) {
        self.awaiting_reply_for = None;
        self.reply_deadline = None;
        self.csma.collision_occured();
        self.stats.add_collision();
    }

    pub fn record_wasted(&mut self, duration_ns: u64) {
        self.stats.add_wasted(duration_ns);
    }

    /// Arms an immediate SIFS-gated reply (CTS for an RTS, ACK for a DATA).
    pub fn queue_reply(&mut self, handle: FrameHandle, ready_at: u64) {
        self.pending_reply = Some(handle);
        self.reply_ready_at = Some(ready_at);
    }

    /// Pops the pending reply once its SIFS has elapsed and the medium is
    /// clear. Replies take priority over `send_queue` and skip CSMA
    /// contention entirely.
    pub fn take_ready_reply(&mut self, now: u64, medium_busy: bool) -> Option<FrameHandle> {
        if medium_busy {
            return None;
        }
        match (self.pending_reply, self.reply_ready_at) {
            (Some(handle), Some(ready_at)) if now >= ready_at => {
                self.pending_reply = None;
                self.reply_ready_at = None;
                Some(handle)
            }
            _ => None,
        }
    }

    /// Registers `data` as shielded behind `rts` — released as a reply
    /// once the matching CTS arrives, instead of re-entering `send_queue`.
    pub fn shield_data_behind_rts(&mut self, rts: FrameHandle, data: FrameHandle) {
        self.shielded_data.insert(rts, data);
    }

    pub fn release_shielded_data(&mut self, rts: FrameHandle) -> Option<FrameHandle> {
        self.shielded_data.remove(&rts)
    }
}
