use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const STATUTE_MILES_PER_DEGREE: f64 = 60.0 * 1.1515;
const KILOMETERS_PER_MILE: f64 = 1.609344;
const NAUTICAL_MILES_PER_MILE: f64 = 0.8684;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DistanceUnit {
    #[default]
    #[serde(rename = "K", alias = "k")]
    Kilometers,
    #[serde(rename = "M", alias = "m")]
    Miles,
    #[serde(rename = "N", alias = "n")]
    NauticalMiles,
}

impl FromStr for DistanceUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "K" => Ok(DistanceUnit::Kilometers),
            "M" => Ok(DistanceUnit::Miles),
            "N" => Ok(DistanceUnit::NauticalMiles),
            other => Err(format!(
                "Unknown distance unit '{}', expected one of K, M or N",
                other
            )),
        }
    }
}

impl fmt::Display for DistanceUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            DistanceUnit::Kilometers => "K",
            DistanceUnit::Miles => "M",
            DistanceUnit::NauticalMiles => "N",
        };
        f.write_str(code)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Great-circle distance by the spherical law of cosines.
pub fn distance(from: Coordinates, to: Coordinates, unit: DistanceUnit) -> f64 {
    if from == to {
        return 0.0;
    }

    let lat1 = from.latitude.to_radians();
    let lat2 = to.latitude.to_radians();
    let theta = (from.longitude - to.longitude).to_radians();

    let cosine = lat1.sin() * lat2.sin() + lat1.cos() * lat2.cos() * theta.cos();
    let degrees = cosine.clamp(-1.0, 1.0).acos().to_degrees();
    let miles = degrees * STATUTE_MILES_PER_DEGREE;

    match unit {
        DistanceUnit::Miles => miles,
        DistanceUnit::Kilometers => miles * KILOMETERS_PER_MILE,
        DistanceUnit::NauticalMiles => miles * NAUTICAL_MILES_PER_MILE,
    }
}
