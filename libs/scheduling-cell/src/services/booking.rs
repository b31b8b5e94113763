use std::sync::Arc;

use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::error::SchedulingError;
use crate::models::BookingRequest;
use crate::services::store::AppointmentSubmitter;

pub struct BookingService {
    submitter: Arc<dyn AppointmentSubmitter>,
}

impl BookingService {
    pub fn new(submitter: Arc<dyn AppointmentSubmitter>) -> Self {
        Self { submitter }
    }

    /// Validates the request locally, then hands it to the submitter.
    /// Nothing is sent when validation fails.
    #[instrument(skip(self, request), fields(clinic_id = %request.clinic_id))]
    pub async fn submit(&self, request: &BookingRequest) -> Result<Value, SchedulingError> {
        let (date, time) = request.validate().map_err(|e| {
            warn!("Rejected booking request: {}", e);
            e
        })?;

        let appointment = self.submitter.create_appointment(request).await?;

        info!("Appointment requested for {} at {}", date, time.format("%H:%M"));
        Ok(appointment)
    }
}
