//! The access-control state machine: DIFS/SIFS countdown,
//! random backoff, NAV virtual carrier sense, and the allocated-burst
//! window won by an RTS/CTS exchange.

use rand::Rng;

use crate::config::{Config, ONE_SECOND};
use crate::frame::FrameType;

#[derive(Debug, Clone)]
pub struct Csma {
    pub difs_amount: u64,
    pub sifs_amount: u64,
    pub slot_time: u64,
    pub frame_time: u64,
    pub cts_duration: u64,

    pub timer: u64,
    pub backoff: u64,
    pub backoff_window: u64,
    pub nav: u64,
    pub allocated: u64,

    pub cw_min: u64,
    pub cw_max: u64,
    /// Set whenever the interframe-space timer is (re)armed; consumed the
    /// first tick the timer reaches zero to draw a fresh backoff.
    pending_draw: bool,
}

impl Csma {
    pub fn new(config: &Config) -> Self {
        let frame_time = (config.frame_size / config.data_rate * ONE_SECOND as f64) as u64;
        let control_frame_time =
            (crate::config::CONTROL_FRAME_SIZE / config.data_rate * ONE_SECOND as f64) as u64;
        // SIFS + CTS + SIFS + DATA + SIFS + ACK.
        let cts_duration =
            3 * config.sifs_amount + 2 * control_frame_time + frame_time;

        Csma {
            difs_amount: config.difs_amount,
            sifs_amount: config.sifs_amount,
            slot_time: config.slot_time,
            frame_time,
            cts_duration,
            timer: 0,
            backoff: 0,
            backoff_window: config.cw_min,
            nav: 0,
            allocated: 0,
            cw_min: config.cw_min,
            cw_max: config.cw_max,
            pending_draw: false,
        }
    }

    pub fn set_difs(&mut self) {
        self.timer = self.difs_amount;
        self.backoff = 0;
        self.pending_draw = true;
    }

    pub fn set_sifs(&mut self) {
        self.timer = self.sifs_amount;
        self.backoff = 0;
        self.pending_draw = true;
    }

    pub fn set_nav(&mut self, duration: u64) {
        self.nav = self.nav.max(duration);
    }

    pub fn set_allocated(&mut self, duration: u64) {
        self.allocated = duration;
    }

    pub fn reset_backoff_range(&mut self) {
        self.backoff_window = self.cw_min;
    }

    pub fn collision_occured(&mut self) {
        self.backoff_window = (self.backoff_window * 2).min(self.cw_max);
    }

    /// A fresh access attempt (RTS when RTS/CTS is enabled, DATA
    /// otherwise) uses DIFS; every handshake reply uses SIFS.
    pub fn is_difs(&self, with_rts: bool, frame_type: FrameType) -> bool {
        frame_type.is_fresh_access(with_rts)
    }

    /// The per-tick gate called while the transmitter wants to send.
    /// Returns true once access is granted.
    pub fn check_and_decrease(&mut self, is_busy: bool, step: u64, rng: &mut impl Rng) -> bool {
        if self.nav > 0 || self.allocated > 0 {
            self.nav = self.nav.saturating_sub(step);
            self.allocated = self.allocated.saturating_sub(step);
            return false;
        }
        if is_busy {
            // Freeze both timer and backoff; countdown only progresses
            // during idle time.
            return false;
        }
        if self.timer > 0 {
            self.timer = self.timer.saturating_sub(step);
            return false;
        }
        if self.pending_draw {
            let slots = if self.backoff_window > 0 {
                rng.gen_range(0..self.backoff_window)
            } else {
                0
            };
            self.backoff = slots * self.slot_time;
            self.pending_draw = false;
        }
        if self.backoff > 0 {
            self.backoff = self.backoff.saturating_sub(step);
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn csma() -> Csma {
        Csma::new(&Config::default())
    }

    #[test]
    fn backoff_window_doubles_on_collision_and_caps_at_max() {
        let mut csma = csma();
        let min = csma.backoff_window;
        csma.collision_occured();
        assert_eq!(csma.backoff_window, min * 2);
        for _ in 0..20 {
            csma.collision_occured();
        }
        assert_eq!(csma.backoff_window, csma.cw_max);
    }

    #[test]
    fn reset_backoff_range_restores_minimum() {
        let mut csma = csma();
        csma.collision_occured();
        csma.collision_occured();
        csma.reset_backoff_range();
        assert_eq!(csma.backoff_window, csma.cw_min);
    }

    #[test]
    fn nav_and_allocated_block_access_and_drain_independently_of_backoff() {
        let mut csma = csma();
        csma.set_nav(100);
        let mut rng = StdRng::seed_from_u64(0);
        assert!(!csma.check_and_decrease(false, 40, &mut rng));
        assert_eq!(csma.nav, 60);
        assert!(!csma.check_and_decrease(false, 100, &mut rng));
        assert_eq!(csma.nav, 0);
    }

    #[test]
    fn busy_medium_freezes_timer_and_backoff() {
        let mut csma = csma();
        csma.set_difs();
        let mut rng = StdRng::seed_from_u64(1);
        let before = csma.timer;
        assert!(!csma.check_and_decrease(true, 1000, &mut rng));
        assert_eq!(csma.timer, before);
    }

    #[test]
    fn eventually_grants_access_once_timer_and_backoff_elapse() {
        let mut csma = csma();
        csma.set_difs();
        let mut rng = StdRng::seed_from_u64(2);
        let mut granted = false;
        for _ in 0..10_000 {
            if csma.check_and_decrease(false, csma.slot_time, &mut rng) {
                granted = true;
                break;
            }
        }
        assert!(granted);
    }

    #[test]
    fn is_difs_follows_rts_mode() {
        let csma = csma();
        assert!(csma.is_difs(false, FrameType::Data));
        assert!(!csma.is_difs(false, FrameType::Cts));
        assert!(csma.is_difs(true, FrameType::Rts));
        assert!(!csma.is_difs(true, FrameType::Data));
    }
}
