//! Energy telemetry reports
//!
//! One `EnergyReport` is produced per settlement round by the telemetry
//! backend and consumed by the hub. The serde shape matches the backend's
//! wire payload (`weather` + `houses`).

use serde::{Deserialize, Serialize};

/// Generation and consumption snapshot for one house, in kWh
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HouseReading {
    #[serde(rename = "houseId", alias = "id", alias = "name")]
    pub house_id: String,
    pub generation: f64,
    pub consumption: f64,
}

impl HouseReading {
    /// Net energy for this house; positive means surplus
    pub fn net_energy(&self) -> f64 {
        self.generation - self.consumption
    }
}

/// Immutable snapshot of one settlement round's telemetry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnergyReport {
    pub weather: String,
    pub houses: Vec<HouseReading>,
}

impl EnergyReport {
    /// Net energy across all houses; positive means the grid buys surplus
    pub fn net_energy(&self) -> f64 {
        self.houses.iter().map(HouseReading::net_energy).sum()
    }

    /// Human summary of the resulting public-grid action
    pub fn public_grid_action(&self) -> String {
        let net = self.net_energy();
        if net < 0.0 {
            format!("Purchase of {:.2} kWh from the Public Grid", net.abs())
        } else if net > 0.0 {
            format!("Sale of {:.2} kWh to the Public Grid", net)
        } else {
            "Perfect Energy Balance (No purchase or sale)".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> EnergyReport {
        EnergyReport {
            weather: "sunny".to_string(),
            houses: vec![
                HouseReading {
                    house_id: "H1".to_string(),
                    generation: 5.0,
                    consumption: 0.0,
                },
                HouseReading {
                    house_id: "H3".to_string(),
                    generation: 5.0,
                    consumption: 7.0,
                },
            ],
        }
    }

    #[test]
    fn net_energy_sums_across_houses() {
        assert!((report().net_energy() - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn public_grid_action_variants() {
        let mut r = report();
        assert!(r.public_grid_action().starts_with("Sale of 3.00 kWh"));

        r.houses[0].consumption = 10.0;
        assert!(r.public_grid_action().starts_with("Purchase of 7.00 kWh"));

        r.houses[0].consumption = 3.0;
        assert_eq!(
            r.public_grid_action(),
            "Perfect Energy Balance (No purchase or sale)"
        );
    }

    #[test]
    fn deserializes_backend_payload() {
        let raw = r#"{
            "weather": "cloudy",
            "houses": [
                {"houseId": "H1", "generation": 2.5, "consumption": 1.0},
                {"houseId": "H2", "generation": 0.0, "consumption": 4.0}
            ]
        }"#;
        let report: EnergyReport = serde_json::from_str(raw).unwrap();
        assert_eq!(report.houses.len(), 2);
        assert_eq!(report.houses[1].house_id, "H2");
    }
}
