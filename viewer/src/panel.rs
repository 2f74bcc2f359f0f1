use crate::dataset::{DroneRecord, MaintenanceLog};

/// Telemetry card for the focused drone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InfoPanel {
    pub id: String,
    pub status: String,
    pub flight_hours: String,
    pub battery_status: String,
    pub location: String,
    pub mission: String,
    pub maintenance_logs: Vec<MaintenanceLog>,
    pub visible: bool,
}

impl InfoPanel {
    /// Fills every field from `record`. Visibility is left untouched; the panel is revealed
    /// separately once the camera has settled.
    pub fn populate(&mut self, index: usize, record: &DroneRecord) {
        self.id = format!("#Drone{}", index + 1);
        self.status = record.status.to_string();
        self.flight_hours = format!("{} hour", record.flight_hours);
        self.battery_status = record.battery_status.clone();
        self.location = format!(
            "{}, {}",
            record.last_known_location[0], record.last_known_location[1]
        );
        self.mission = record.current_mission.clone();
        self.maintenance_logs = record.maintenance_logs.clone();
    }

    pub fn show(&mut self) {
        self.visible = true;
    }

    pub fn hide(&mut self) {
        self.visible = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::DroneStatus;
    use pretty_assertions::assert_eq;

    #[test]
    fn populate_formats_fields() {
        let record = DroneRecord {
            status: DroneStatus::InFlight,
            battery_status: "64%".to_string(),
            flight_hours: 120.0,
            last_known_location: [34.0522, -118.2437],
            current_mission: "Perimeter patrol".to_string(),
            maintenance_logs: vec![MaintenanceLog {
                description: "Firmware update".to_string(),
                date: "2024-02-11".to_string(),
                technician: "J. Ortiz".to_string(),
            }],
        };
        let mut panel = InfoPanel::default();
        panel.populate(2, &record);
        assert_eq!(panel.id, "#Drone3");
        assert_eq!(panel.status, "In-flight");
        assert_eq!(panel.flight_hours, "120 hour");
        assert_eq!(panel.location, "34.0522, -118.2437");
        assert_eq!(panel.mission, "Perimeter patrol");
        assert_eq!(panel.maintenance_logs.len(), 1);
        assert!(!panel.visible);
    }

    #[test]
    fn fractional_hours_keep_decimals() {
        let mut panel = InfoPanel::default();
        let record = DroneRecord {
            status: DroneStatus::Available,
            battery_status: String::new(),
            flight_hours: 12.5,
            last_known_location: [1.0, 2.0],
            current_mission: String::new(),
            maintenance_logs: vec![],
        };
        panel.populate(0, &record);
        assert_eq!(panel.flight_hours, "12.5 hour");
        assert_eq!(panel.location, "1, 2");
    }
}
