use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, instrument};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::error::SchedulingError;
use crate::models::{day_of_week_index, BookedInterval, BookingRequest, WorkPeriod};

/// Read access to staff work periods.
#[async_trait]
pub trait WorkPeriodStore: Send + Sync {
    /// Candidate periods for `date`, optionally for one staff member.
    ///
    /// Implementations may return a superset (for example weekly rows whose
    /// validity window has ended). Callers decide applicability with
    /// [`WorkPeriod::applies_on`].
    async fn work_periods_for_date(
        &self,
        clinic_id: Uuid,
        date: NaiveDate,
        staff_id: Option<Uuid>,
    ) -> Result<Vec<WorkPeriod>, SchedulingError>;

    /// Every period configured for a clinic.
    async fn clinic_work_periods(&self, clinic_id: Uuid) -> Result<Vec<WorkPeriod>, SchedulingError>;
}

/// Read access to already booked slots.
#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn booked_intervals(
        &self,
        clinic_id: Uuid,
        date: NaiveDate,
        staff_id: Option<Uuid>,
    ) -> Result<Vec<BookedInterval>, SchedulingError>;
}

#[async_trait]
pub trait AppointmentSubmitter: Send + Sync {
    async fn create_appointment(&self, request: &BookingRequest) -> Result<Value, SchedulingError>;
}

pub struct SupabaseScheduleStore {
    supabase: Arc<SupabaseClient>,
    auth_token: String,
}

impl SupabaseScheduleStore {
    pub fn new(config: &AppConfig, auth_token: impl Into<String>) -> Self {
        Self::with_client(Arc::new(SupabaseClient::new(config)), auth_token)
    }

    pub fn with_client(supabase: Arc<SupabaseClient>, auth_token: impl Into<String>) -> Self {
        Self {
            supabase,
            auth_token: auth_token.into(),
        }
    }

    async fn fetch_periods(&self, path: &str) -> Result<Vec<WorkPeriod>, SchedulingError> {
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            path,
            Some(&self.auth_token),
            None,
        ).await?;

        let periods = result.into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<WorkPeriod>, _>>()
            .map_err(|e| SchedulingError::Transient(format!("Failed to parse work periods: {}", e)))?;

        Ok(periods)
    }
}

#[async_trait]
impl WorkPeriodStore for SupabaseScheduleStore {
    #[instrument(skip(self))]
    async fn work_periods_for_date(
        &self,
        clinic_id: Uuid,
        date: NaiveDate,
        staff_id: Option<Uuid>,
    ) -> Result<Vec<WorkPeriod>, SchedulingError> {
        let mut path = format!(
            "/rest/v1/work_periods?clinic_id=eq.{}&is_active=eq.true&or=(day_of_week.eq.{},specific_date.eq.{})&order=start_time.asc",
            clinic_id,
            day_of_week_index(date),
            date
        );

        if let Some(staff) = staff_id {
            path.push_str(&format!("&staff_id=eq.{}", staff));
        }

        let periods = self.fetch_periods(&path).await?;

        debug!("Loaded {} candidate work periods for clinic {} on {}", periods.len(), clinic_id, date);
        Ok(periods)
    }

    #[instrument(skip(self))]
    async fn clinic_work_periods(&self, clinic_id: Uuid) -> Result<Vec<WorkPeriod>, SchedulingError> {
        let path = format!(
            "/rest/v1/work_periods?clinic_id=eq.{}&order=staff_id.asc,start_time.asc",
            clinic_id
        );

        self.fetch_periods(&path).await
    }
}

#[async_trait]
impl BookingStore for SupabaseScheduleStore {
    #[instrument(skip(self))]
    async fn booked_intervals(
        &self,
        clinic_id: Uuid,
        date: NaiveDate,
        staff_id: Option<Uuid>,
    ) -> Result<Vec<BookedInterval>, SchedulingError> {
        let mut path = format!(
            "/rest/v1/appointments?clinic_id=eq.{}&appointment_date=eq.{}&status=in.(confirmed,in_progress)&select=id,appointment_date,time_slot,staff_id",
            clinic_id, date
        );

        if let Some(staff) = staff_id {
            path.push_str(&format!("&staff_id=eq.{}", staff));
        }

        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(&self.auth_token),
            None,
        ).await?;

        let booked = result.into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<BookedInterval>, _>>()
            .map_err(|e| SchedulingError::Transient(format!("Failed to parse appointments: {}", e)))?;

        debug!("Found {} booked slots for clinic {} on {}", booked.len(), clinic_id, date);
        Ok(booked)
    }
}

#[async_trait]
impl AppointmentSubmitter for SupabaseScheduleStore {
    #[instrument(skip(self, request), fields(clinic_id = %request.clinic_id))]
    async fn create_appointment(&self, request: &BookingRequest) -> Result<Value, SchedulingError> {
        let appointment_data = json!({
            "clinic_id": request.clinic_id,
            "patient_id": request.patient_id,
            "staff_id": request.staff_id,
            "service_type": request.service_type,
            "appointment_date": request.date,
            "time_slot": request.time_slot,
            "notes": request.notes,
            "is_emergency": request.emergency,
            "status": "pending",
            "created_at": Utc::now().to_rfc3339(),
        });

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/appointments",
            Some(&self.auth_token),
            Some(appointment_data),
            Some(headers),
        ).await?;

        result.into_iter()
            .next()
            .ok_or_else(|| SchedulingError::Transient("Failed to create appointment".to_string()))
    }
}
