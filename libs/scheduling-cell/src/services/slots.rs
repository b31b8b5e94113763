use std::collections::HashSet;

use chrono::{NaiveTime, Timelike};
use tracing::debug;

use shared_config::SchedulingConfig;

use crate::error::SchedulingError;
use crate::models::{TimeSlot, WorkPeriod};

pub struct SlotGenerator {
    config: SchedulingConfig,
}

impl SlotGenerator {
    pub fn new(config: &SchedulingConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Build the bookable slots of all periods, ascending and unique by time.
    ///
    /// When two periods produce the same time the one listed first wins.
    /// Every period is validated before any slot is produced, so a single
    /// bad period fails the whole call.
    pub fn generate(
        &self,
        periods: &[WorkPeriod],
        booked: &HashSet<NaiveTime>,
    ) -> Result<Vec<TimeSlot>, SchedulingError> {
        for period in periods {
            period.validate()?;
        }

        let mut seen = HashSet::new();
        let mut slots = Vec::new();

        for period in periods {
            if !period.is_active {
                debug!("Skipping inactive work period {}", period.id);
                continue;
            }

            for slot in self.generate_for_period(period, booked)? {
                if seen.insert(slot.time) {
                    slots.push(slot);
                }
            }
        }

        slots.sort_by(|a, b| a.time.cmp(&b.time));

        debug!("Generated {} slots from {} work periods", slots.len(), periods.len());
        Ok(slots)
    }

    /// Slots of a single period. A trailing remainder shorter than the slot
    /// duration is dropped.
    pub fn generate_for_period(
        &self,
        period: &WorkPeriod,
        booked: &HashSet<NaiveTime>,
    ) -> Result<Vec<TimeSlot>, SchedulingError> {
        period.validate()?;

        let duration = i64::from(period.slot_duration_minutes);
        let end = period.end_minutes();
        let mut offset = period.start_minutes();
        let mut slots = Vec::new();

        while offset + duration <= end {
            let time = time_from_minutes(offset)?;

            slots.push(TimeSlot {
                time,
                available: !booked.contains(&time),
                is_peak: self.config.is_peak_hour(time.hour()),
                work_period_id: period.id,
                staff_id: period.staff_id,
            });

            offset += duration;
        }

        Ok(slots)
    }
}

fn time_from_minutes(minutes: i64) -> Result<NaiveTime, SchedulingError> {
    u32::try_from(minutes)
        .ok()
        .and_then(|m| NaiveTime::from_hms_opt(m / 60, m % 60, 0))
        .ok_or_else(|| SchedulingError::Validation(format!("{} minutes is outside a single day", minutes)))
}
