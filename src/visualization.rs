//! After-tick ASCII rendering, enabled by `Config::log`. `geometry::circle`
//! has no correctness dependency here — it only feeds this view.
//!
//! Draws a fixed-size grid, plotting each station as its id and its
//! detect-range ring as `.` characters, so a human can sanity-check
//! placement and range without a real plotting library.

use crate::geometry::circle;
use crate::sim::World;

const GRID: i64 = 41; // odd, so the origin lands on a cell

pub fn render(world: &World) -> String {
    let half = GRID / 2;
    let mut canvas = vec![vec![' '; GRID as usize]; GRID as usize];

    let scale = world.config.area_size.max(1.0) / GRID as f64;

    for station in &world.stations {
        let cx = (station.location.x / scale) as i64;
        let cy = (station.location.y / scale) as i64;
        let ring_radius = (station.detect_range / scale).round() as i64;

        for (x, y) in circle((cx, cy), ring_radius) {
            if let Some(cell) = cell_at(&mut canvas, x + half, y + half) {
                if *cell == ' ' {
                    *cell = '.';
                }
            }
        }
    }

    for station in &world.stations {
        let cx = (station.location.x / scale) as i64 + half;
        let cy = (station.location.y / scale) as i64 + half;
        if let Some(cell) = cell_at(&mut canvas, cx, cy) {
            *cell = std::char::from_digit((station.id.0 % 10) as u32, 10).unwrap_or('#');
        }
    }

    let mut out = format!("t={} active_frames={}\n", world.timeline.current, world.medium.active_count());
    for row in canvas {
        out.extend(row);
        out.push('\n');
    }
    out
}

fn cell_at(canvas: &mut [Vec<char>], x: i64, y: i64) -> Option<&mut char> {
    if x < 0 || y < 0 || x >= GRID || y >= GRID {
        return None;
    }
    canvas.get_mut(y as usize)?.get_mut(x as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn render_includes_tick_and_station_markers() {
        let world = World::new(Config::default());
        let frame = render(&world);
        assert!(frame.starts_with("t=0"));
        assert!(frame.contains('0'));
    }
}
