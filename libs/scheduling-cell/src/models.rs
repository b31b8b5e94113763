use chrono::{Datelike, NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_utils::validation::{validate_date, validate_time};

use crate::error::SchedulingError;

/// `HH:MM` on the wire; the database's `HH:MM:SS` is accepted on input.
pub(crate) mod hhmm {
    use chrono::NaiveTime;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    use shared_utils::validation::{parse_stored_time, TIME_FORMAT};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format(TIME_FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_stored_time(&raw).map_err(D::Error::custom)
    }
}

pub fn format_hhmm(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

pub(crate) fn minutes_from_midnight(time: NaiveTime) -> i64 {
    i64::from(time.num_seconds_from_midnight() / 60)
}

/// 0 = Sunday ... 6 = Saturday.
pub fn day_of_week_index(date: NaiveDate) -> i32 {
    date.weekday().num_days_from_sunday() as i32
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkPeriod {
    pub id: Uuid,
    pub staff_id: Uuid,
    pub clinic_id: Uuid,
    pub day_of_week: Option<i32>, // 0 = Sunday, 1 = Monday, etc.
    pub specific_date: Option<NaiveDate>,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
    pub slot_duration_minutes: i32,
    #[serde(default = "default_active")]
    pub is_active: bool,
    pub effective_from: Option<NaiveDate>,
    pub effective_until: Option<NaiveDate>,
}

fn default_active() -> bool {
    true
}

impl WorkPeriod {
    pub fn validate(&self) -> Result<(), SchedulingError> {
        if self.start_time >= self.end_time {
            return Err(SchedulingError::Validation(format!(
                "Work period {} must start before it ends ({})",
                self.id,
                self.time_range()
            )));
        }

        if self.slot_duration_minutes <= 0 {
            return Err(SchedulingError::Validation(format!(
                "Work period {} has non-positive slot duration {}",
                self.id, self.slot_duration_minutes
            )));
        }

        match (self.day_of_week, self.specific_date) {
            (None, None) => Err(SchedulingError::Validation(format!(
                "Work period {} needs a day of week or a specific date",
                self.id
            ))),
            (Some(day), _) if !(0..=6).contains(&day) => Err(SchedulingError::Validation(
                "Day of week must be between 0 (Sunday) and 6 (Saturday)".to_string(),
            )),
            _ => Ok(()),
        }
    }

    /// A specific date takes precedence over the weekly recurrence.
    pub fn applies_on(&self, date: NaiveDate) -> bool {
        if !self.is_active {
            return false;
        }
        if self.effective_from.is_some_and(|from| date < from) {
            return false;
        }
        if self.effective_until.is_some_and(|until| date > until) {
            return false;
        }

        match self.specific_date {
            Some(specific) => specific == date,
            None => self.day_of_week == Some(day_of_week_index(date)),
        }
    }

    pub fn start_minutes(&self) -> i64 {
        minutes_from_midnight(self.start_time)
    }

    pub fn end_minutes(&self) -> i64 {
        minutes_from_midnight(self.end_time)
    }

    pub fn time_range(&self) -> String {
        format!("{}-{}", format_hhmm(self.start_time), format_hhmm(self.end_time))
    }
}

/// A slot consumed by a confirmed appointment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookedInterval {
    #[serde(alias = "appointment_date")]
    pub date: NaiveDate,
    #[serde(alias = "time_slot", with = "hhmm")]
    pub time: NaiveTime,
    #[serde(default)]
    pub staff_id: Option<Uuid>,
    #[serde(default, alias = "id")]
    pub appointment_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSlot {
    #[serde(with = "hhmm")]
    pub time: NaiveTime,
    pub available: bool,
    pub is_peak: bool,
    pub work_period_id: Uuid,
    pub staff_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaffSlots {
    pub staff_id: Uuid,
    pub slots: Vec<TimeSlot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotAssignment {
    pub staff_id: Uuid,
    pub slot: TimeSlot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictType {
    TimeOverlap,
    InsufficientBreak,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictSeverity {
    High,
    Medium,
    Low,
}

impl ConflictSeverity {
    /// Lower ranks sort first on the review screen.
    pub fn rank(&self) -> u8 {
        match self {
            ConflictSeverity::High => 0,
            ConflictSeverity::Medium => 1,
            ConflictSeverity::Low => 2,
        }
    }
}

/// Advisory finding between two work periods of one staff member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    pub staff_id: Uuid,
    pub date: NaiveDate,
    pub conflict_type: ConflictType,
    pub severity: ConflictSeverity,
    pub first: WorkPeriod,
    pub second: WorkPeriod,
    pub gap_minutes: Option<i64>,
    pub description: String,
}

/// Inputs of one availability lookup in a booking session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AvailabilityParams {
    pub clinic_id: Uuid,
    pub date: NaiveDate,
    /// Overrides each work period's own slot length when set.
    pub duration_minutes: Option<i32>,
    pub staff_id: Option<Uuid>,
}

impl AvailabilityParams {
    pub fn new(clinic_id: Uuid, date: NaiveDate) -> Self {
        Self {
            clinic_id,
            date,
            duration_minutes: None,
            staff_id: None,
        }
    }

    pub fn with_duration(mut self, minutes: i32) -> Self {
        self.duration_minutes = Some(minutes);
        self
    }

    pub fn with_staff(mut self, staff_id: Uuid) -> Self {
        self.staff_id = Some(staff_id);
        self
    }

    pub fn validate(&self) -> Result<(), SchedulingError> {
        if self.clinic_id.is_nil() {
            return Err(SchedulingError::Validation("Clinic id is required".to_string()));
        }
        if let Some(duration) = self.duration_minutes {
            if duration <= 0 {
                return Err(SchedulingError::Validation(format!(
                    "Duration must be positive, got {}",
                    duration
                )));
            }
        }
        Ok(())
    }

    /// Two lookups with the same signature would return the same result.
    pub fn signature(&self) -> String {
        format!(
            "{}|{}|{}|{}",
            self.clinic_id,
            self.date,
            self.duration_minutes.map_or_else(|| "default".to_string(), |d| d.to_string()),
            self.staff_id.map_or_else(|| "any".to_string(), |s| s.to_string()),
        )
    }
}

/// Payload handed to the booking collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingRequest {
    pub clinic_id: Uuid,
    pub patient_id: Uuid,
    pub service_type: String,
    pub date: String,
    pub time_slot: String,
    pub staff_id: Option<Uuid>,
    pub notes: Option<String>,
    #[serde(default)]
    pub emergency: bool,
}

impl BookingRequest {
    pub fn validate(&self) -> Result<(NaiveDate, NaiveTime), SchedulingError> {
        if self.clinic_id.is_nil() {
            return Err(SchedulingError::Validation("Clinic id is required".to_string()));
        }
        if self.patient_id.is_nil() {
            return Err(SchedulingError::Validation("Patient id is required".to_string()));
        }
        if self.service_type.trim().is_empty() {
            return Err(SchedulingError::Validation("Service type is required".to_string()));
        }

        let date = validate_date(&self.date).map_err(SchedulingError::Validation)?;
        let time = validate_time(&self.time_slot).map_err(SchedulingError::Validation)?;

        Ok((date, time))
    }
}
