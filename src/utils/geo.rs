use crate::error::{AppError, AppResult};

/// Unit accepted by the geospatial tour queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceUnit {
    Miles,
    Kilometers,
}

impl DistanceUnit {
    pub fn parse(raw: &str) -> AppResult<Self> {
        match raw {
            "mi" => Ok(DistanceUnit::Miles),
            "km" => Ok(DistanceUnit::Kilometers),
            _ => Err(AppError::BadRequest(
                "Unit must be either 'mi' or 'km'".to_string(),
            )),
        }
    }

    /// Equatorial earth radius expressed in this unit.
    pub fn earth_radius(self) -> f64 {
        match self {
            DistanceUnit::Miles => 3963.2,
            DistanceUnit::Kilometers => 6378.1,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DistanceUnit::Miles => "mi",
            DistanceUnit::Kilometers => "km",
        }
    }
}

/// A WGS84 position in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    /// Parse the `lat,lng` path segment.
    pub fn parse(raw: &str) -> AppResult<Self> {
        let invalid = || {
            AppError::BadRequest(
                "Please provide latitude and longitude in the format lat,lng.".to_string(),
            )
        };

        let (lat, lng) = raw.split_once(',').ok_or_else(invalid)?;
        let lat: f64 = lat.trim().parse().map_err(|_| invalid())?;
        let lng: f64 = lng.trim().parse().map_err(|_| invalid())?;

        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
            return Err(invalid());
        }

        Ok(Self { lat, lng })
    }
}

/// Angle between two points seen from the earth's center, in radians
/// (haversine formula).
pub fn central_angle(a: LatLng, b: LatLng) -> f64 {
    let lat1_rad = a.lat.to_radians();
    let lat2_rad = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lng = (b.lng - a.lng).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lng / 2.0).sin().powi(2);

    2.0 * h.sqrt().min(1.0).asin()
}

/// Great-circle distance between two points in the given unit.
pub fn distance(a: LatLng, b: LatLng, unit: DistanceUnit) -> f64 {
    central_angle(a, b) * unit.earth_radius()
}

/// Whether `point` lies inside the spherical cap of `radius` around `center`.
pub fn is_within_radius(point: LatLng, center: LatLng, radius: f64, unit: DistanceUnit) -> bool {
    central_angle(point, center) <= radius / unit.earth_radius()
}

#[cfg(test)]
mod tests {
    use super::*;

    const JAKARTA: LatLng = LatLng { lat: -6.2088, lng: 106.8456 };
    const BANDUNG: LatLng = LatLng { lat: -6.9175, lng: 107.6191 };

    #[test]
    fn test_distance_jakarta_bandung() {
        let km = distance(JAKARTA, BANDUNG, DistanceUnit::Kilometers);
        // Should be approximately 120-130 km
        assert!(km > 100.0 && km < 150.0);

        let mi = distance(JAKARTA, BANDUNG, DistanceUnit::Miles);
        assert!((km / mi - 6378.1 / 3963.2).abs() < 1e-9);
    }

    #[test]
    fn test_within_radius() {
        let nearby = LatLng { lat: -6.21, lng: 106.85 };
        assert!(is_within_radius(nearby, JAKARTA, 10.0, DistanceUnit::Kilometers));
        assert!(!is_within_radius(BANDUNG, JAKARTA, 10.0, DistanceUnit::Kilometers));
    }

    #[test]
    fn radius_check_agrees_with_distance_in_both_units() {
        for unit in [DistanceUnit::Miles, DistanceUnit::Kilometers] {
            let d = distance(JAKARTA, BANDUNG, unit);
            assert!(is_within_radius(BANDUNG, JAKARTA, d + 0.01, unit));
            assert!(!is_within_radius(BANDUNG, JAKARTA, d - 0.01, unit));
        }
    }

    #[test]
    fn parses_lat_lng_segment() {
        let point = LatLng::parse("34.111745,-118.113491").unwrap();
        assert_eq!(point, LatLng { lat: 34.111745, lng: -118.113491 });

        assert!(LatLng::parse("34.1").is_err());
        assert!(LatLng::parse("north,west").is_err());
        assert!(LatLng::parse("95.0,10.0").is_err());
    }

    #[test]
    fn parses_units() {
        assert_eq!(DistanceUnit::parse("mi").unwrap(), DistanceUnit::Miles);
        assert_eq!(DistanceUnit::parse("km").unwrap(), DistanceUnit::Kilometers);
        assert!(DistanceUnit::parse("ft").is_err());
    }
}
