//! Simulated readings for when no live upstream is available.
//!
//! The locality set is fixed; only the index is random. PM values are derived
//! from the index so that every simulated reading is internally consistent.

use std::ops::Range;

use chrono::Utc;
use rand::Rng;

use crate::models::{station_id, Coordinates, Pollutants, StationReading};
use crate::severity::Category;

/// Range of simulated severity indexes (upper bound exclusive).
pub const SIMULATED_INDEX_RANGE: Range<i32> = 50..350;

const PM25_PER_INDEX: f64 = 0.6;
const PM10_PER_INDEX: f64 = 0.8;

/// Representative Delhi NCR monitoring localities: `(name, latitude, longitude)`.
const LOCALITIES: [(&str, f64, f64); 24] = [
    ("Punjabi Bagh", 28.6683, 77.1330),
    ("Mandir Marg", 28.6364, 77.1987),
    ("RK Puram", 28.5672, 77.1863),
    ("Anand Vihar", 28.6508, 77.3152),
    ("Dwarka Sector 8", 28.5700, 77.0700),
    ("IGI Airport", 28.5600, 77.1000),
    ("Pusa", 28.6389, 77.1617),
    ("Jawaharlal Nehru Stadium", 28.5866, 77.2411),
    ("Sonia Vihar", 28.7188, 77.2655),
    ("Narela", 28.8550, 77.0910),
    ("Bawana", 28.7760, 77.0426),
    ("Okhla Phase 2", 28.5350, 77.2750),
    ("Major Dhyan Chand National Stadium", 28.6120, 77.2360),
    ("Lodhi Road", 28.5910, 77.2270),
    ("Sri Aurobindo Marg", 28.5450, 77.1950),
    ("Vivek Vihar", 28.6650, 77.3150),
    ("Najafgarh", 28.6090, 76.9850),
    ("Wazirpur", 28.6980, 77.1650),
    ("Alipur", 28.8150, 77.1530),
    ("Ashok Vihar", 28.6950, 77.1810),
    ("Jahangirpuri", 28.7330, 77.1690),
    ("Patparganj", 28.6230, 77.2950),
    ("Rohini", 28.7320, 77.1180),
    ("Mundka", 28.6790, 77.0260),
];

// ---

/// Produces a full simulated station set in the canonical reading shape.
#[derive(Debug, Clone)]
pub struct FallbackGenerator {
    // ---
    zone: String,
}

impl FallbackGenerator {
    // ---
    pub fn new(zone: impl Into<String>) -> Self {
        Self { zone: zone.into() }
    }

    /// Generate one reading per locality using the thread-local RNG.
    pub fn generate(&self) -> Vec<StationReading> {
        self.generate_with(&mut rand::thread_rng())
    }

    /// Generate one reading per locality using the given RNG.
    pub fn generate_with<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<StationReading> {
        // ---
        let observed_at = Utc::now();

        LOCALITIES
            .iter()
            .map(|&(name, latitude, longitude)| {
                let aqi = rng.gen_range(SIMULATED_INDEX_RANGE);

                StationReading {
                    station_id: station_id(name),
                    name: name.to_string(),
                    address: format!("{}, {}", name, self.zone),
                    zone: self.zone.clone(),
                    coordinates: Coordinates {
                        latitude,
                        longitude,
                    },
                    pollutants: Pollutants {
                        pm25: (aqi as f64 * PM25_PER_INDEX).floor(),
                        pm10: (aqi as f64 * PM10_PER_INDEX).floor(),
                        no2: 0.0,
                    },
                    aqi,
                    category: Category::from_index(aqi),
                    observed_at,
                }
            })
            .collect()
    }
}
