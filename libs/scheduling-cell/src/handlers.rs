use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use chrono::{Duration, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::error::AppError;
use shared_utils::validation::validate_date;

use crate::models::{AvailabilityParams, BookingRequest};
use crate::services::assignment::first_available;
use crate::services::availability::AvailabilityService;
use crate::services::booking::BookingService;
use crate::services::conflict::{sort_by_severity, ConflictDetector, ScanStrategy};
use crate::services::store::{SupabaseScheduleStore, WorkPeriodStore};

// ==============================================================================
// QUERY PARAMETER STRUCTS
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct SlotsQuery {
    pub date: String,
    pub duration_minutes: Option<i32>,
    pub staff_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct ConflictsQuery {
    /// First reviewed date, defaults to today.
    pub from: Option<String>,
    /// Last reviewed date (inclusive), defaults to six days after `from`.
    pub to: Option<String>,
    pub staff_id: Option<Uuid>,
    #[serde(default)]
    pub by_severity: bool,
    #[serde(default)]
    pub strategy: ScanStrategy,
}

impl SlotsQuery {
    fn to_params(&self, clinic_id: Uuid) -> Result<AvailabilityParams, AppError> {
        let date = validate_date(&self.date).map_err(AppError::ValidationError)?;

        let params = AvailabilityParams {
            clinic_id,
            date,
            duration_minutes: self.duration_minutes,
            staff_id: self.staff_id,
        };
        params.validate()?;

        Ok(params)
    }
}

/// Longest range the review screen may ask for in one call.
const MAX_REVIEW_DAYS: i64 = 93;

impl ConflictsQuery {
    fn review_range(&self) -> Result<(NaiveDate, NaiveDate), AppError> {
        let from = match &self.from {
            Some(raw) => validate_date(raw).map_err(AppError::ValidationError)?,
            None => Utc::now().date_naive(),
        };
        let to = match &self.to {
            Some(raw) => validate_date(raw).map_err(AppError::ValidationError)?,
            None => from + Duration::days(6),
        };

        if to < from {
            return Err(AppError::ValidationError(format!(
                "Review range ends ({}) before it starts ({})",
                to, from
            )));
        }
        if (to - from).num_days() >= MAX_REVIEW_DAYS {
            return Err(AppError::ValidationError(format!(
                "Review range may span at most {} days",
                MAX_REVIEW_DAYS
            )));
        }

        Ok((from, to))
    }
}

fn availability_service(state: &AppConfig, token: &str) -> AvailabilityService {
    let store = Arc::new(SupabaseScheduleStore::new(state, token));
    AvailabilityService::new(store.clone(), store, &state.scheduling)
}

// ==============================================================================
// SLOT HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn get_available_slots(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(clinic_id): Path<Uuid>,
    Query(query): Query<SlotsQuery>,
) -> Result<Json<Value>, AppError> {
    let params = query.to_params(clinic_id)?;
    let service = availability_service(&state, auth.token());

    let slots = service.get_available_slots(&params).await?;
    let first = first_available(&slots).cloned();

    Ok(Json(json!({
        "clinic_id": clinic_id,
        "date": params.date,
        "slots": slots,
        "first_available": first,
        "total": slots.len(),
    })))
}

#[axum::debug_handler]
pub async fn auto_assign_slot(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(clinic_id): Path<Uuid>,
    Query(query): Query<SlotsQuery>,
) -> Result<Json<Value>, AppError> {
    let params = query.to_params(clinic_id)?;
    let service = availability_service(&state, auth.token());

    match service.auto_assign(&params).await? {
        Some(assignment) => Ok(Json(json!({ "assignment": assignment }))),
        None => Err(AppError::NotFound(format!(
            "No free slot for clinic {} on {}",
            clinic_id, params.date
        ))),
    }
}

// ==============================================================================
// CONFLICT HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn get_schedule_conflicts(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(clinic_id): Path<Uuid>,
    Query(query): Query<ConflictsQuery>,
) -> Result<Json<Value>, AppError> {
    let (from, to) = query.review_range()?;
    let store = SupabaseScheduleStore::new(&state, auth.token());

    let mut periods = store.clinic_work_periods(clinic_id).await?;
    if let Some(staff_id) = query.staff_id {
        periods.retain(|period| period.staff_id == staff_id);
    }

    let mut conflicts = ConflictDetector::new(&state.scheduling)
        .with_strategy(query.strategy)
        .detect(&periods, from, to);

    if query.by_severity {
        sort_by_severity(&mut conflicts);
    }

    debug!("Found {} conflicts across {} work periods", conflicts.len(), periods.len());

    Ok(Json(json!({
        "clinic_id": clinic_id,
        "from": from,
        "to": to,
        "conflicts": conflicts,
        "total": conflicts.len(),
    })))
}

// ==============================================================================
// BOOKING HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<BookingRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let store = Arc::new(SupabaseScheduleStore::new(&state, auth.token()));
    let service = BookingService::new(store);

    let appointment = service.submit(&request).await?;

    Ok((StatusCode::CREATED, Json(json!({ "appointment": appointment }))))
}
