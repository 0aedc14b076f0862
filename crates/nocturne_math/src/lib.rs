#![doc = include_str!("../README.md")]

pub use glam::DVec3;

/// Conversion factor from the game's foot-denominated range tables to
/// metres.
pub const FEET_TO_METERS: f64 = 0.3048;

/// Converts a foot-denominated range to metres.
pub fn feet_to_meters(feet: f64) -> f64 {
    feet * FEET_TO_METERS
}

/// The world's coordinate convention.
///
/// `y` is up. The horizontal plane is `x`/`z`, with `+z` as "north" and
/// `+x` as "east". Bearings are measured clockwise from north, so an
/// observer at the origin sees a point at `(5, 0, 0)` on bearing 90°.
/// The movement integrator steps `dx = sin(heading)`, `dz = cos(heading)`
/// under the same convention.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Observation {
    /// Compass bearing in whole degrees, `0..360`.
    pub bearing: u16,
    /// Elevation angle in whole degrees, `-90..=90`.
    pub elevation: i16,
    /// Distance in metres, rounded to two decimals.
    pub range: f64,
}

/// Computes the bearing/elevation/range triple from `observer` to `target`.
pub fn observe(observer: DVec3, target: DVec3) -> Observation {
    let delta = target - observer;

    Observation {
        bearing: bearing_degrees(delta).round() as u16 % 360,
        elevation: elevation_degrees(delta).round() as i16,
        range: round_range(delta.length()),
    }
}

/// Bearing from the origin toward `delta` in degrees, `[0, 360)`.
pub fn bearing_degrees(delta: DVec3) -> f64 {
    if delta.x == 0.0 && delta.z == 0.0 {
        return 0.0;
    }

    let degrees = delta.x.atan2(delta.z).to_degrees();
    (degrees + 360.0) % 360.0
}

/// Elevation angle of `delta` above the horizontal plane in degrees,
/// `[-90, 90]`.
pub fn elevation_degrees(delta: DVec3) -> f64 {
    let horizontal = delta.x.hypot(delta.z);

    if horizontal == 0.0 && delta.y == 0.0 {
        return 0.0;
    }

    delta.y.atan2(horizontal).to_degrees()
}

/// Heading in degrees an entity at `from` should face to walk toward `to`.
pub fn heading_between(from: DVec3, to: DVec3) -> f64 {
    bearing_degrees(to - from)
}

/// One integration step along `heading` degrees: `dx = sin(h)`,
/// `dz = cos(h)`, y unchanged.
pub fn step_along(heading_degrees: f64, distance: f64) -> DVec3 {
    let radians = heading_degrees.to_radians();

    DVec3::new(
        radians.sin() * distance,
        0.0,
        radians.cos() * distance,
    )
}

/// Rounds a distance to the two decimal places carried on the wire.
pub fn round_range(meters: f64) -> f64 {
    (meters * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn bearing_cardinal_points() {
        assert_relative_eq!(bearing_degrees(DVec3::new(0.0, 0.0, 1.0)), 0.0);
        assert_relative_eq!(bearing_degrees(DVec3::new(1.0, 0.0, 0.0)), 90.0);
        assert_relative_eq!(bearing_degrees(DVec3::new(0.0, 0.0, -1.0)), 180.0);
        assert_relative_eq!(bearing_degrees(DVec3::new(-1.0, 0.0, 0.0)), 270.0);
    }

    #[test]
    fn bearing_of_zero_delta_is_north() {
        assert_relative_eq!(bearing_degrees(DVec3::ZERO), 0.0);
    }

    #[test]
    fn elevation_signs() {
        assert_relative_eq!(
            elevation_degrees(DVec3::new(0.0, 1.0, 1.0)),
            45.0,
            epsilon = 1e-9
        );
        assert_relative_eq!(
            elevation_degrees(DVec3::new(0.0, -1.0, 1.0)),
            -45.0,
            epsilon = 1e-9
        );
        assert_relative_eq!(elevation_degrees(DVec3::new(0.0, 1.0, 0.0)), 90.0);
    }

    #[test]
    fn observation_rounds_to_wire_precision() {
        let obs = observe(DVec3::ZERO, DVec3::new(5.0, 0.0, 0.0));

        assert_eq!(obs.bearing, 90);
        assert_eq!(obs.elevation, 0);
        assert_relative_eq!(obs.range, 5.0);

        let obs = observe(DVec3::ZERO, DVec3::new(1.0, 1.0, 1.0));
        assert_relative_eq!(obs.range, 1.73);
    }

    #[test]
    fn step_along_matches_bearing() {
        let step = step_along(90.0, 2.0);

        assert_relative_eq!(step.x, 2.0, epsilon = 1e-9);
        assert_relative_eq!(step.y, 0.0);
        assert_relative_eq!(step.z, 0.0, epsilon = 1e-9);

        // Walking along the heading toward a target closes the distance.
        let from = DVec3::new(1.0, 0.0, 2.0);
        let to = DVec3::new(4.0, 0.0, -1.0);
        let step = step_along(heading_between(from, to), 1.0);
        assert!(from.distance(to) > (from + step).distance(to));
    }

    #[test]
    fn feet_conversion_matches_range_table() {
        assert_relative_eq!(feet_to_meters(5.0), 1.524);
        assert_relative_eq!(feet_to_meters(20.0), 6.096);
        assert_relative_eq!(feet_to_meters(150.0), 45.72);
        assert_relative_eq!(feet_to_meters(250.0), 76.2);
    }
}
