use crate::dataset::{DroneRecord, DroneStatus};

/// Offset of the label box from the projected drone position, in logical pixels.
pub const TOOLTIP_OFFSET: [f32; 2] = [-30.0, -25.0];

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TooltipKind {
    Success,
    Info,
    Danger,
}

impl From<&DroneStatus> for TooltipKind {
    fn from(status: &DroneStatus) -> Self {
        match status {
            DroneStatus::Available => TooltipKind::Success,
            DroneStatus::InFlight => TooltipKind::Info,
            DroneStatus::Other(_) => TooltipKind::Danger,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tooltip {
    pub label: String,
    pub kind: TooltipKind,
    pub screen_pos: [f32; 2],
    pub active: bool,
    pub hidden: bool,
}

impl Tooltip {
    pub fn new(index: usize, record: &DroneRecord, projected: [f32; 2]) -> Self {
        Self {
            label: format!("#{} {} - {}", index + 1, record.status, record.battery_status),
            kind: TooltipKind::from(&record.status),
            screen_pos: [
                projected[0] + TOOLTIP_OFFSET[0],
                projected[1] + TOOLTIP_OFFSET[1],
            ],
            active: false,
            hidden: false,
        }
    }
}

/// One label per drone. Positions are computed once when the scene is built.
#[derive(Debug, Clone, Default)]
pub struct TooltipOverlay {
    tooltips: Vec<Tooltip>,
}

impl TooltipOverlay {
    pub fn push(&mut self, tooltip: Tooltip) {
        self.tooltips.push(tooltip);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tooltip> {
        self.tooltips.iter()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.tooltips.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.tooltips.is_empty()
    }

    pub fn set_active(&mut self, index: usize, active: bool) {
        if let Some(t) = self.tooltips.get_mut(index) {
            t.active = active;
        }
    }

    pub fn set_hidden(&mut self, hidden: bool) {
        for t in self.tooltips.iter_mut() {
            t.hidden = hidden;
        }
    }

    #[cfg(test)]
    pub fn active_count(&self) -> usize {
        self.tooltips.iter().filter(|t| t.active).count()
    }

    #[cfg(test)]
    pub fn visible_count(&self) -> usize {
        self.tooltips.iter().filter(|t| !t.hidden).count()
    }
}
