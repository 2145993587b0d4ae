//! A single radio: its position, detect range, and the transmitter that
//! drives its access-control state machine.

use crate::geometry::Point;
use crate::transmitter::Transmitter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StationId(pub usize);

#[derive(Debug)]
pub struct Station {
    pub id: StationId,
    pub location: Point,
    pub detect_range: f64,
    pub transmitter: Transmitter,
    /// Absolute tick at which this station's next DATA frame is due,
    /// drawn from a Poisson arrival process (exponential interarrival
    /// times) rather than a fixed period, so traffic bursts the way real
    /// independent senders do.
    pub next_generation_at: u64,
}

impl Station {
    pub fn new(id: StationId, location: Point, detect_range: f64, transmitter: Transmitter) -> Self {
        Station {
            id,
            location,
            detect_range,
            transmitter: transmitter.with_station_id(id),
            next_generation_at: 0,
        }
    }

    /// True when `other` lies within this station's detect range — the
    /// basis of both physical carrier sense and the hidden-terminal effect.
    pub fn can_detect(&self, other_location: Point) -> bool {
        crate::geometry::distance(self.location, other_location) <= self.detect_range
    }
}

/// Uniform-random placement inside a square arena of side `area_size`,
/// centered on the origin.
pub fn random_location(area_size: f64, rng: &mut impl rand::Rng) -> Point {
    let half = area_size / 2.0;
    Point::new(rng.gen_range(-half..=half), rng.gen_range(-half..=half))
}

/// Star topology: station 0 sits at the center, every other station is
/// placed on a circle of radius `area_size / 2` around it.
pub fn star_location(index: usize, station_count: usize, area_size: f64) -> Point {
    if index == 0 {
        return Point::new(0.0, 0.0);
    }
    let radius = area_size / 2.0;
    let spokes = (station_count - 1).max(1);
    let angle = 2.0 * std::f64::consts::PI * (index - 1) as f64 / spokes as f64;
    Point::new(radius * angle.cos(), radius * angle.sin())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn can_detect_is_a_radius_check() {
        let station = Station::new(
            StationId(0),
            Point::new(0.0, 0.0),
            10.0,
            Transmitter::new(&crate::config::Config::default(), false),
        );
        assert!(station.can_detect(Point::new(5.0, 0.0)));
        assert!(!station.can_detect(Point::new(11.0, 0.0)));
    }

    #[test]
    fn star_topology_centers_station_zero() {
        assert_eq!(star_location(0, 5, 100.0), Point::new(0.0, 0.0));
        let spoke = star_location(1, 5, 100.0);
        assert!((crate::geometry::distance(spoke, Point::new(0.0, 0.0)) - 50.0).abs() < 1e-9);
    }
}
