use chrono::{DateTime, Datelike, Utc};
use common::{DcaConfig, DcaInterval};

/// Tracks when the scheduled-purchase policy next fires.
///
/// The marker moves to every bar that opens a new period, whether or not the
/// purchase on that bar is affordable.
#[derive(Debug, Clone)]
pub struct DcaSchedule {
    config: DcaConfig,
    last_marker: Option<DateTime<Utc>>,
}

impl DcaSchedule {
    pub fn new(config: &DcaConfig) -> Self {
        Self {
            config: config.clone(),
            last_marker: None,
        }
    }

    pub fn amount(&self) -> f64 {
        self.config.amount
    }

    pub fn last_marker(&self) -> Option<DateTime<Utc>> {
        self.last_marker
    }

    /// Returns true when `timestamp` opens a new DCA period, advancing the marker.
    pub fn starts_new_period(&mut self, timestamp: DateTime<Utc>) -> bool {
        if !self.config.enabled {
            return false;
        }

        let due = match (self.config.interval, self.last_marker) {
            (_, None) => true,
            (DcaInterval::Daily, Some(_)) => true,
            (DcaInterval::Weekly, Some(last)) => (timestamp - last).num_days() >= 7,
            (DcaInterval::Monthly, Some(last)) => {
                (timestamp.year(), timestamp.month()) != (last.year(), last.month())
            }
        };

        if due {
            self.last_marker = Some(timestamp);
        }
        due
    }
}
