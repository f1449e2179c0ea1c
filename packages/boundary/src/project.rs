//! Map projections for the supported reference systems.
//!
//! Every system converts to and from geographic longitude/latitude in
//! degrees. NAD83 and WGS 84 geographic coordinates are treated as
//! coincident; the datum shift between them is below survey precision.

use std::f64::consts::{FRAC_PI_2, PI};

use escapement_map_survey_models::ReferenceSystem;
use geo::{Coord, MapCoords, MultiPolygon};

/// Reference ellipsoid parameters.
#[derive(Debug, Clone, Copy)]
struct Ellipsoid {
    /// Semi-major axis in meters.
    a: f64,
    /// Flattening.
    f: f64,
}

impl Ellipsoid {
    const WGS84: Self = Self {
        a: 6_378_137.0,
        f: 1.0 / 298.257_223_563,
    };

    const GRS80: Self = Self {
        a: 6_378_137.0,
        f: 1.0 / 298.257_222_101,
    };

    /// First eccentricity squared.
    fn e2(self) -> f64 {
        self.f * (2.0 - self.f)
    }
}

const UTM_SCALE: f64 = 0.9996;
const UTM_FALSE_EASTING: f64 = 500_000.0;
const UTM_FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;

/// EPSG:3005 parameters: standard parallels 50 N and 58.5 N, origin
/// 45 N 126 W, false easting 1 000 000 m.
const BC_ALBERS: AlbersParams = AlbersParams {
    ellipsoid: Ellipsoid::GRS80,
    lat0: 45.0,
    lon0: -126.0,
    lat1: 50.0,
    lat2: 58.5,
    false_easting: 1_000_000.0,
    false_northing: 0.0,
};

/// EPSG:3338 parameters: standard parallels 55 N and 65 N, origin
/// 50 N 154 W, no false easting.
const ALASKA_ALBERS: AlbersParams = AlbersParams {
    ellipsoid: Ellipsoid::GRS80,
    lat0: 50.0,
    lon0: -154.0,
    lat1: 55.0,
    lat2: 65.0,
    false_easting: 0.0,
    false_northing: 0.0,
};

/// Converts a coordinate in `rs` to geographic longitude/latitude degrees.
#[must_use]
pub fn to_geographic(rs: ReferenceSystem, c: Coord<f64>) -> Coord<f64> {
    match rs {
        ReferenceSystem::Wgs84 | ReferenceSystem::Nad83 => c,
        ReferenceSystem::WebMercator => web_mercator_inverse(c),
        ReferenceSystem::Utm { epsg, zone, north } => {
            utm_inverse(utm_ellipsoid(epsg), zone, north, c)
        }
        ReferenceSystem::BcAlbers => BC_ALBERS.inverse(c),
        ReferenceSystem::AlaskaAlbers => ALASKA_ALBERS.inverse(c),
    }
}

/// Converts geographic longitude/latitude degrees to a coordinate in `rs`.
#[must_use]
pub fn from_geographic(rs: ReferenceSystem, c: Coord<f64>) -> Coord<f64> {
    match rs {
        ReferenceSystem::Wgs84 | ReferenceSystem::Nad83 => c,
        ReferenceSystem::WebMercator => web_mercator_forward(c),
        ReferenceSystem::Utm { epsg, zone, north } => {
            utm_forward(utm_ellipsoid(epsg), zone, north, c)
        }
        ReferenceSystem::BcAlbers => BC_ALBERS.forward(c),
        ReferenceSystem::AlaskaAlbers => ALASKA_ALBERS.forward(c),
    }
}

/// Converts a single coordinate between two systems.
#[must_use]
pub fn transform_coord(from: ReferenceSystem, to: ReferenceSystem, c: Coord<f64>) -> Coord<f64> {
    if from == to {
        return c;
    }
    from_geographic(to, to_geographic(from, c))
}

/// Reprojects every vertex of `geometry` from `from` to `to`.
#[must_use]
pub fn reproject(
    geometry: &MultiPolygon<f64>,
    from: ReferenceSystem,
    to: ReferenceSystem,
) -> MultiPolygon<f64> {
    if from == to {
        return geometry.clone();
    }
    geometry.map_coords(|c| transform_coord(from, to, c))
}

const fn utm_ellipsoid(epsg: u32) -> Ellipsoid {
    if epsg >= 26_900 && epsg < 27_000 {
        Ellipsoid::GRS80
    } else {
        Ellipsoid::WGS84
    }
}

fn web_mercator_forward(c: Coord<f64>) -> Coord<f64> {
    let r = Ellipsoid::WGS84.a;
    let lat = c.y.to_radians();
    Coord {
        x: r * c.x.to_radians(),
        y: r * (PI / 4.0 + lat / 2.0).tan().ln(),
    }
}

fn web_mercator_inverse(c: Coord<f64>) -> Coord<f64> {
    let r = Ellipsoid::WGS84.a;
    Coord {
        x: (c.x / r).to_degrees(),
        y: (2.0 * (c.y / r).exp().atan() - FRAC_PI_2).to_degrees(),
    }
}

fn utm_central_meridian(zone: u8) -> f64 {
    f64::from(zone).mul_add(6.0, -183.0).to_radians()
}

/// Meridian arc length from the equator to latitude `phi`.
fn meridian_arc(el: Ellipsoid, phi: f64) -> f64 {
    let e2 = el.e2();
    let e4 = e2 * e2;
    let e6 = e4 * e2;

    el.a * ((1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * phi
        - (3.0 * e2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * phi).sin()
        + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * phi).sin()
        - (35.0 * e6 / 3072.0) * (6.0 * phi).sin())
}

#[allow(clippy::many_single_char_names, clippy::suboptimal_flops)]
fn utm_forward(el: Ellipsoid, zone: u8, north: bool, c: Coord<f64>) -> Coord<f64> {
    let e2 = el.e2();
    let ep2 = e2 / (1.0 - e2);
    let phi = c.y.to_radians();
    let lam = c.x.to_radians();

    let (sin_phi, cos_phi) = phi.sin_cos();
    let tan_phi = sin_phi / cos_phi;

    let n = el.a / (1.0 - e2 * sin_phi * sin_phi).sqrt();
    let t = tan_phi * tan_phi;
    let cc = ep2 * cos_phi * cos_phi;
    let a = cos_phi * (lam - utm_central_meridian(zone));
    let m = meridian_arc(el, phi);

    let x = UTM_SCALE
        * n
        * (a + (1.0 - t + cc) * a.powi(3) / 6.0
            + (5.0 - 18.0 * t + t * t + 72.0 * cc - 58.0 * ep2) * a.powi(5) / 120.0)
        + UTM_FALSE_EASTING;

    let y = UTM_SCALE
        * (m + n
            * tan_phi
            * (a * a / 2.0
                + (5.0 - t + 9.0 * cc + 4.0 * cc * cc) * a.powi(4) / 24.0
                + (61.0 - 58.0 * t + t * t + 600.0 * cc - 330.0 * ep2) * a.powi(6) / 720.0));

    Coord {
        x,
        y: if north { y } else { y + UTM_FALSE_NORTHING_SOUTH },
    }
}

#[allow(clippy::many_single_char_names, clippy::suboptimal_flops)]
fn utm_inverse(el: Ellipsoid, zone: u8, north: bool, c: Coord<f64>) -> Coord<f64> {
    let e2 = el.e2();
    let e4 = e2 * e2;
    let e6 = e4 * e2;
    let ep2 = e2 / (1.0 - e2);

    let x = c.x - UTM_FALSE_EASTING;
    let y = if north {
        c.y
    } else {
        c.y - UTM_FALSE_NORTHING_SOUTH
    };

    let m = y / UTM_SCALE;
    let mu = m / (el.a * (1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0));
    let e1 = (1.0 - (1.0 - e2).sqrt()) / (1.0 + (1.0 - e2).sqrt());

    let phi1 = mu
        + (3.0 * e1 / 2.0 - 27.0 * e1.powi(3) / 32.0) * (2.0 * mu).sin()
        + (21.0 * e1 * e1 / 16.0 - 55.0 * e1.powi(4) / 32.0) * (4.0 * mu).sin()
        + (151.0 * e1.powi(3) / 96.0) * (6.0 * mu).sin()
        + (1097.0 * e1.powi(4) / 512.0) * (8.0 * mu).sin();

    let (sin1, cos1) = phi1.sin_cos();
    let tan1 = sin1 / cos1;
    let n1 = el.a / (1.0 - e2 * sin1 * sin1).sqrt();
    let t1 = tan1 * tan1;
    let c1 = ep2 * cos1 * cos1;
    let r1 = el.a * (1.0 - e2) / (1.0 - e2 * sin1 * sin1).powf(1.5);
    let d = x / (n1 * UTM_SCALE);

    let phi = phi1
        - (n1 * tan1 / r1)
            * (d * d / 2.0
                - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1 * c1 - 9.0 * ep2) * d.powi(4) / 24.0
                + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1 * t1 - 252.0 * ep2 - 3.0 * c1 * c1)
                    * d.powi(6)
                    / 720.0);

    let lam = utm_central_meridian(zone)
        + (d - (1.0 + 2.0 * t1 + c1) * d.powi(3) / 6.0
            + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1 * c1 + 8.0 * ep2 + 24.0 * t1 * t1)
                * d.powi(5)
                / 120.0)
            / cos1;

    Coord {
        x: lam.to_degrees(),
        y: phi.to_degrees(),
    }
}

/// Albers equal-area conic on an ellipsoid.
#[derive(Debug, Clone, Copy)]
struct AlbersParams {
    ellipsoid: Ellipsoid,
    lat0: f64,
    lon0: f64,
    lat1: f64,
    lat2: f64,
    false_easting: f64,
    false_northing: f64,
}

/// Derived cone constants: `n`, `C`, and `rho0`.
#[derive(Debug, Clone, Copy)]
struct AlbersCone {
    n: f64,
    c: f64,
    rho0: f64,
}

impl AlbersParams {
    fn e(self) -> f64 {
        self.ellipsoid.e2().sqrt()
    }

    fn q(self, phi: f64) -> f64 {
        let e2 = self.ellipsoid.e2();
        let e = self.e();
        let s = phi.sin();
        (1.0 - e2)
            * (s / (1.0 - e2 * s * s) - (1.0 / (2.0 * e)) * ((1.0 - e * s) / (1.0 + e * s)).ln())
    }

    fn m(self, phi: f64) -> f64 {
        let e2 = self.ellipsoid.e2();
        let s = phi.sin();
        phi.cos() / (1.0 - e2 * s * s).sqrt()
    }

    fn cone(self) -> AlbersCone {
        let (phi0, phi1, phi2) = (
            self.lat0.to_radians(),
            self.lat1.to_radians(),
            self.lat2.to_radians(),
        );
        let (m1, m2) = (self.m(phi1), self.m(phi2));
        let (q0, q1, q2) = (self.q(phi0), self.q(phi1), self.q(phi2));

        let n = (m1 * m1 - m2 * m2) / (q2 - q1);
        let c = n.mul_add(q1, m1 * m1);
        let rho0 = self.ellipsoid.a * (c - n * q0).sqrt() / n;

        AlbersCone { n, c, rho0 }
    }

    fn forward(self, coord: Coord<f64>) -> Coord<f64> {
        let AlbersCone { n, c, rho0 } = self.cone();
        let rho = self.ellipsoid.a * (c - n * self.q(coord.y.to_radians())).sqrt() / n;
        let theta = n * (coord.x - self.lon0).to_radians();

        Coord {
            x: self.false_easting + rho * theta.sin(),
            y: self.false_northing + rho0 - rho * theta.cos(),
        }
    }

    fn inverse(self, coord: Coord<f64>) -> Coord<f64> {
        const MAX_ITERATIONS: usize = 20;
        const TOLERANCE: f64 = 1e-12;

        let AlbersCone { n, c, rho0 } = self.cone();
        let a = self.ellipsoid.a;
        let e2 = self.ellipsoid.e2();
        let e = self.e();

        let x = coord.x - self.false_easting;
        let y = rho0 - (coord.y - self.false_northing);
        let rho = x.hypot(y);
        let theta = x.atan2(y);
        let q = (c - rho * rho * n * n / (a * a)) / n;

        let mut phi = (q / 2.0).clamp(-1.0, 1.0).asin();
        for _ in 0..MAX_ITERATIONS {
            let s = phi.sin();
            let one_minus = 1.0 - e2 * s * s;
            let delta = one_minus * one_minus / (2.0 * phi.cos())
                * (q / (1.0 - e2) - s / one_minus
                    + (1.0 / (2.0 * e)) * ((1.0 - e * s) / (1.0 + e * s)).ln());
            phi += delta;
            if delta.abs() < TOLERANCE {
                break;
            }
        }

        Coord {
            x: self.lon0 + (theta / n).to_degrees(),
            y: phi.to_degrees(),
        }
    }
}
