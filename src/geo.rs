//! Fixed-point coordinates and segment-scale distance

/// Degrees are stored as `round(deg * 1e6)`.
pub const COORDINATE_PRECISION: f64 = 1e6;

const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Fixed-point WGS84 coordinate. `i32::MIN` in either component means unset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedCoord {
    pub lat: i32,
    pub lon: i32,
}

impl FixedCoord {
    pub const UNSET: FixedCoord = FixedCoord {
        lat: i32::MIN,
        lon: i32::MIN,
    };

    pub fn from_degrees(lat: f64, lon: f64) -> Self {
        Self {
            lat: (lat * COORDINATE_PRECISION).round() as i32,
            lon: (lon * COORDINATE_PRECISION).round() as i32,
        }
    }

    pub fn is_set(&self) -> bool {
        self.lat != i32::MIN && self.lon != i32::MIN
    }

    pub fn lat_deg(&self) -> f64 {
        self.lat as f64 / COORDINATE_PRECISION
    }

    pub fn lon_deg(&self) -> f64 {
        self.lon as f64 / COORDINATE_PRECISION
    }
}

/// Equirectangular distance in metres.
///
/// Road segments are short enough that the flat-earth projection around the
/// mean latitude stays well under the weight quantization error.
pub fn flat_earth_distance(a: FixedCoord, b: FixedCoord) -> f64 {
    let lat1 = a.lat_deg().to_radians();
    let lat2 = b.lat_deg().to_radians();
    let lon1 = a.lon_deg().to_radians();
    let lon2 = b.lon_deg().to_radians();

    let mean_lat = (lat1 + lat2) / 2.0;
    let x = (lon2 - lon1) * mean_lat.cos();
    let y = lat2 - lat1;
    (x * x + y * y).sqrt() * EARTH_RADIUS_M
}
