use std::fmt;
use std::fs;
use std::path::Path;

use anyhow::*;
use serde::Deserialize;

/// Operational state reported for a drone.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum DroneStatus {
    Available,
    InFlight,
    Other(String),
}

impl From<String> for DroneStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "Available" => DroneStatus::Available,
            "In-flight" => DroneStatus::InFlight,
            _ => DroneStatus::Other(s),
        }
    }
}

impl fmt::Display for DroneStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DroneStatus::Available => write!(f, "Available"),
            DroneStatus::InFlight => write!(f, "In-flight"),
            DroneStatus::Other(s) => write!(f, "{}", s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MaintenanceLog {
    pub description: String,
    pub date: String,
    pub technician: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DroneRecord {
    pub status: DroneStatus,
    pub battery_status: String,
    pub flight_hours: f64,
    pub last_known_location: [f64; 2],
    pub current_mission: String,
    #[serde(default)]
    pub maintenance_logs: Vec<MaintenanceLog>,
}

/// Telemetry for the whole fleet. Read once at startup and never mutated.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Dataset {
    pub drones: Vec<DroneRecord>,
}

impl Dataset {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Couldn't open dataset {:?}", path.as_ref()))?;
        Self::from_json(&raw).with_context(|| format!("Couldn't parse dataset {:?}", path.as_ref()))
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn count(&self) -> usize {
        self.drones.len()
    }

    pub fn get(&self, index: usize) -> Option<&DroneRecord> {
        self.drones.get(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = r#"{
        "drones": [
            {
                "id": "ignored",
                "status": "Available",
                "battery_status": "85%",
                "flight_hours": 120,
                "last_known_location": [34.05, -118.25],
                "current_mission": "Survey",
                "maintenance_logs": [
                    {"description": "Rotor swap", "date": "2024-01-03", "technician": "A. Kim"}
                ]
            },
            {
                "status": "In-flight",
                "battery_status": "40%",
                "flight_hours": 12.5,
                "last_known_location": [0, 1],
                "current_mission": "Delivery",
                "maintenance_logs": []
            },
            {
                "status": "Maintenance",
                "battery_status": "0%",
                "flight_hours": 3,
                "last_known_location": [2, 3],
                "current_mission": "None"
            }
        ]
    }"#;

    #[test]
    fn parses_status_variants_and_ignores_unknown_fields() {
        let data = Dataset::from_json(SAMPLE).unwrap();
        assert_eq!(data.count(), 3);
        assert_eq!(data.drones[0].status, DroneStatus::Available);
        assert_eq!(data.drones[1].status, DroneStatus::InFlight);
        assert_eq!(
            data.drones[2].status,
            DroneStatus::Other("Maintenance".to_string())
        );
        assert!(data.drones[2].maintenance_logs.is_empty());
    }

    #[test]
    fn status_displays_raw_text() {
        let data = Dataset::from_json(SAMPLE).unwrap();
        let shown: Vec<String> = data.drones.iter().map(|d| d.status.to_string()).collect();
        assert_eq!(shown, vec!["Available", "In-flight", "Maintenance"]);
    }

    #[test]
    fn keeps_maintenance_log_order() {
        let data = Dataset::from_json(SAMPLE).unwrap();
        assert_eq!(
            data.drones[0].maintenance_logs,
            vec![MaintenanceLog {
                description: "Rotor swap".to_string(),
                date: "2024-01-03".to_string(),
                technician: "A. Kim".to_string(),
            }]
        );
    }

    #[test]
    fn rejects_malformed_location() {
        let raw = r#"{"drones":[{"status":"Available","battery_status":"1%","flight_hours":1,
            "last_known_location":[1],"current_mission":"x"}]}"#;
        assert!(Dataset::from_json(raw).is_err());
    }
}
