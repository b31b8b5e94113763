use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveTime;
use tracing::{debug, instrument};
use uuid::Uuid;

use shared_config::SchedulingConfig;

use crate::error::SchedulingError;
use crate::models::{AvailabilityParams, BookedInterval, SlotAssignment, StaffSlots, TimeSlot, WorkPeriod};
use crate::services::assignment::assign_first_available;
use crate::services::fetch_controller::AvailabilitySource;
use crate::services::slots::SlotGenerator;
use crate::services::store::{BookingStore, WorkPeriodStore};

/// Combines the work-period and booking stores into bookable slots.
pub struct AvailabilityService {
    periods: Arc<dyn WorkPeriodStore>,
    bookings: Arc<dyn BookingStore>,
    generator: SlotGenerator,
}

impl AvailabilityService {
    pub fn new(
        periods: Arc<dyn WorkPeriodStore>,
        bookings: Arc<dyn BookingStore>,
        config: &SchedulingConfig,
    ) -> Self {
        Self {
            periods,
            bookings,
            generator: SlotGenerator::new(config),
        }
    }

    /// Merged slots of every eligible staff member for the requested day.
    #[instrument(skip(self))]
    pub async fn get_available_slots(
        &self,
        params: &AvailabilityParams,
    ) -> Result<Vec<TimeSlot>, SchedulingError> {
        let (periods, booked) = self.load(params).await?;

        let booked_times: HashSet<NaiveTime> = booked.iter().map(|b| b.time).collect();
        self.generator.generate(&periods, &booked_times)
    }

    /// Slots per staff member, each checked against that member's own bookings.
    #[instrument(skip(self))]
    pub async fn get_staff_slots(
        &self,
        params: &AvailabilityParams,
    ) -> Result<Vec<StaffSlots>, SchedulingError> {
        let (periods, booked) = self.load(params).await?;

        let mut by_staff: BTreeMap<Uuid, Vec<WorkPeriod>> = BTreeMap::new();
        for period in periods {
            by_staff.entry(period.staff_id).or_default().push(period);
        }

        by_staff
            .into_iter()
            .map(|(staff_id, staff_periods)| {
                // Bookings without a staff member block the time for everyone.
                let booked_times: HashSet<NaiveTime> = booked
                    .iter()
                    .filter(|b| b.staff_id.map_or(true, |id| id == staff_id))
                    .map(|b| b.time)
                    .collect();

                let slots = self.generator.generate(&staff_periods, &booked_times)?;
                Ok(StaffSlots { staff_id, slots })
            })
            .collect()
    }

    /// Pick the earliest free slot across all eligible staff.
    pub async fn auto_assign(
        &self,
        params: &AvailabilityParams,
    ) -> Result<Option<SlotAssignment>, SchedulingError> {
        let candidates = self.get_staff_slots(params).await?;
        Ok(assign_first_available(&candidates))
    }

    async fn load(
        &self,
        params: &AvailabilityParams,
    ) -> Result<(Vec<WorkPeriod>, Vec<BookedInterval>), SchedulingError> {
        params.validate()?;

        let (mut periods, booked) = futures::try_join!(
            self.periods.work_periods_for_date(params.clinic_id, params.date, params.staff_id),
            self.bookings.booked_intervals(params.clinic_id, params.date, params.staff_id)
        )?;

        // Stores hand back candidates; applicability is decided here.
        periods.retain(|period| period.applies_on(params.date));

        if periods.is_empty() {
            return Err(SchedulingError::Unavailable(format!(
                "No staff schedule for clinic {} on {}",
                params.clinic_id, params.date
            )));
        }

        if let Some(duration) = params.duration_minutes {
            for period in periods.iter_mut() {
                period.slot_duration_minutes = duration;
            }
        }

        debug!(
            "Loaded {} work periods and {} bookings for {}",
            periods.len(),
            booked.len(),
            params.signature()
        );

        Ok((periods, booked))
    }
}

#[async_trait]
impl AvailabilitySource for AvailabilityService {
    async fn fetch(&self, params: &AvailabilityParams) -> Result<Vec<TimeSlot>, SchedulingError> {
        self.get_available_slots(params).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::NaiveDate;

    struct FixedPeriods(Vec<WorkPeriod>);

    #[async_trait]
    impl WorkPeriodStore for FixedPeriods {
        async fn work_periods_for_date(
            &self,
            _clinic_id: Uuid,
            _date: NaiveDate,
            _staff_id: Option<Uuid>,
        ) -> Result<Vec<WorkPeriod>, SchedulingError> {
            Ok(self.0.clone())
        }

        async fn clinic_work_periods(&self, _clinic_id: Uuid) -> Result<Vec<WorkPeriod>, SchedulingError> {
            Ok(self.0.clone())
        }
    }

    struct NoBookings;

    #[async_trait]
    impl BookingStore for NoBookings {
        async fn booked_intervals(
            &self,
            _clinic_id: Uuid,
            _date: NaiveDate,
            _staff_id: Option<Uuid>,
        ) -> Result<Vec<BookedInterval>, SchedulingError> {
            Ok(Vec::new())
        }
    }

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 10).unwrap()
    }

    fn weekly(day_of_week: i32, start: u32, end: u32) -> WorkPeriod {
        WorkPeriod {
            id: Uuid::new_v4(),
            staff_id: Uuid::from_u128(5),
            clinic_id: Uuid::from_u128(1),
            day_of_week: Some(day_of_week),
            specific_date: None,
            start_time: NaiveTime::from_hms_opt(start, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(end, 0, 0).unwrap(),
            slot_duration_minutes: 60,
            is_active: true,
            effective_from: None,
            effective_until: None,
        }
    }

    fn service(periods: Vec<WorkPeriod>) -> AvailabilityService {
        AvailabilityService::new(
            Arc::new(FixedPeriods(periods)),
            Arc::new(NoBookings),
            &SchedulingConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_candidates_that_do_not_apply_are_dropped() {
        let mut expired = weekly(1, 13, 15);
        expired.effective_until = NaiveDate::from_ymd_opt(2025, 3, 1);
        let tuesday = weekly(2, 16, 18);
        let current = weekly(1, 9, 11);

        let slots = service(vec![expired, tuesday, current.clone()])
            .get_available_slots(&AvailabilityParams::new(Uuid::from_u128(1), monday()))
            .await
            .unwrap();

        assert_eq!(slots.len(), 2);
        assert!(slots.iter().all(|slot| slot.work_period_id == current.id));
    }

    #[tokio::test]
    async fn test_no_applicable_period_is_unavailable() {
        let result = service(vec![weekly(2, 9, 11)])
            .get_available_slots(&AvailabilityParams::new(Uuid::from_u128(1), monday()))
            .await;

        assert_matches!(result, Err(SchedulingError::Unavailable(_)));
    }
}
