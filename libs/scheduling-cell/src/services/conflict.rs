use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_config::SchedulingConfig;

use crate::models::{Conflict, ConflictSeverity, ConflictType, WorkPeriod};

/// How same-day periods of one staff member are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStrategy {
    /// Every period is checked against all earlier periods still running
    /// when it starts; if none, against the one that ended last.
    #[default]
    Sweep,
    /// Only neighbours in start-time order are compared. Misses an overlap
    /// between two periods separated by a shorter one.
    AdjacentPairs,
}

pub struct ConflictDetector {
    min_break_minutes: i64,
    strategy: ScanStrategy,
}

impl ConflictDetector {
    pub fn new(config: &SchedulingConfig) -> Self {
        Self {
            min_break_minutes: config.min_break_minutes,
            strategy: ScanStrategy::default(),
        }
    }

    pub fn with_strategy(mut self, strategy: ScanStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Flag overlaps and short breaks between work periods on each date of
    /// `from..=to`.
    ///
    /// A period takes part on every date it applies on, so a weekly period
    /// and a date-specific one meet whenever they land on the same day, and
    /// periods whose validity windows never share a date are never compared.
    /// Results come grouped by staff id (ascending), then by date, then in
    /// chronological order. Findings are advisory and nothing here blocks a save.
    pub fn detect(&self, periods: &[WorkPeriod], from: NaiveDate, to: NaiveDate) -> Vec<Conflict> {
        let mut by_staff: BTreeMap<Uuid, Vec<&WorkPeriod>> = BTreeMap::new();
        for period in periods.iter().filter(|p| p.is_active) {
            by_staff.entry(period.staff_id).or_default().push(period);
        }

        let mut conflicts = Vec::new();

        for (staff_id, schedule) in by_staff {
            for date in from.iter_days().take_while(|date| *date <= to) {
                let mut day: Vec<&WorkPeriod> = schedule
                    .iter()
                    .copied()
                    .filter(|period| period.applies_on(date))
                    .collect();
                if day.len() < 2 {
                    continue;
                }

                day.sort_by(|a, b| (a.start_time, a.end_time, a.id).cmp(&(b.start_time, b.end_time, b.id)));

                match self.strategy {
                    ScanStrategy::Sweep => self.sweep_day(date, &day, &mut conflicts),
                    ScanStrategy::AdjacentPairs => self.scan_adjacent(date, &day, &mut conflicts),
                }
            }

            debug!("Checked schedule of staff {} ({} conflicts so far)", staff_id, conflicts.len());
        }

        if !conflicts.is_empty() {
            warn!("Detected {} scheduling conflicts between {} and {}", conflicts.len(), from, to);
        }

        conflicts
    }

    fn sweep_day(&self, date: NaiveDate, day: &[&WorkPeriod], conflicts: &mut Vec<Conflict>) {
        for (idx, current) in day.iter().enumerate() {
            let earlier = &day[..idx];

            let mut overlapped = false;
            for previous in earlier.iter().filter(|p| p.end_time > current.start_time) {
                conflicts.push(overlap_conflict(date, previous, current));
                overlapped = true;
            }

            if overlapped {
                continue;
            }

            if let Some(previous) = earlier.iter().max_by_key(|p| p.end_time) {
                if let Some(conflict) = self.break_conflict(date, previous, current) {
                    conflicts.push(conflict);
                }
            }
        }
    }

    fn scan_adjacent(&self, date: NaiveDate, day: &[&WorkPeriod], conflicts: &mut Vec<Conflict>) {
        for pair in day.windows(2) {
            let (previous, current) = (pair[0], pair[1]);

            if previous.end_time > current.start_time {
                conflicts.push(overlap_conflict(date, previous, current));
            } else if let Some(conflict) = self.break_conflict(date, previous, current) {
                conflicts.push(conflict);
            }
        }
    }

    fn break_conflict(&self, date: NaiveDate, previous: &WorkPeriod, current: &WorkPeriod) -> Option<Conflict> {
        let gap = current.start_minutes() - previous.end_minutes();
        if gap >= self.min_break_minutes {
            return None;
        }

        Some(Conflict {
            staff_id: current.staff_id,
            date,
            conflict_type: ConflictType::InsufficientBreak,
            severity: ConflictSeverity::Medium,
            first: previous.clone(),
            second: current.clone(),
            gap_minutes: Some(gap),
            description: format!(
                "Only {} minutes between {} and {} on {} (minimum {} minutes)",
                gap,
                previous.time_range(),
                current.time_range(),
                date.format("%A %Y-%m-%d"),
                self.min_break_minutes
            ),
        })
    }
}

fn overlap_conflict(date: NaiveDate, previous: &WorkPeriod, current: &WorkPeriod) -> Conflict {
    Conflict {
        staff_id: current.staff_id,
        date,
        conflict_type: ConflictType::TimeOverlap,
        severity: ConflictSeverity::High,
        first: previous.clone(),
        second: current.clone(),
        gap_minutes: None,
        description: format!(
            "Work period {} overlaps {} on {}",
            previous.time_range(),
            current.time_range(),
            date.format("%A %Y-%m-%d")
        ),
    }
}

/// High before medium before low; discovery order is kept within a severity.
pub fn sort_by_severity(conflicts: &mut [Conflict]) {
    conflicts.sort_by_key(|c| c.severity.rank());
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn period(staff_id: Uuid, date: NaiveDate, start: NaiveTime, end: NaiveTime) -> WorkPeriod {
        WorkPeriod {
            id: Uuid::new_v4(),
            staff_id,
            clinic_id: Uuid::nil(),
            day_of_week: None,
            specific_date: Some(date),
            start_time: start,
            end_time: end,
            slot_duration_minutes: 30,
            is_active: true,
            effective_from: None,
            effective_until: None,
        }
    }

    fn detector() -> ConflictDetector {
        ConflictDetector::new(&SchedulingConfig::default())
    }

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 10).unwrap()
    }

    #[test]
    fn test_sweep_finds_non_adjacent_overlap() {
        let staff = Uuid::new_v4();
        let a = period(staff, monday(), t(9, 0), t(13, 0));
        let b = period(staff, monday(), t(9, 30), t(10, 0));
        let c = period(staff, monday(), t(12, 0), t(14, 0));
        let periods = vec![a.clone(), b.clone(), c.clone()];

        let sweep = detector().detect(&periods, monday(), monday());
        let pairs: Vec<_> = sweep.iter().map(|c| (c.first.id, c.second.id)).collect();
        assert_eq!(pairs, vec![(a.id, b.id), (a.id, c.id)]);
        assert!(sweep.iter().all(|c| c.conflict_type == ConflictType::TimeOverlap));

        let adjacent = detector().with_strategy(ScanStrategy::AdjacentPairs).detect(&periods, monday(), monday());
        let pairs: Vec<_> = adjacent.iter().map(|c| (c.first.id, c.second.id)).collect();
        assert_eq!(pairs, vec![(a.id, b.id)]);
    }

    #[test]
    fn test_break_measured_from_latest_end() {
        let staff = Uuid::new_v4();
        let long = period(staff, monday(), t(8, 0), t(12, 0));
        let short = period(staff, monday(), t(8, 30), t(9, 0));
        let next = period(staff, monday(), t(12, 10), t(14, 0));

        let conflicts = detector().detect(&[long.clone(), short, next.clone()], monday(), monday());

        let breaks: Vec<_> = conflicts
            .iter()
            .filter(|c| c.conflict_type == ConflictType::InsufficientBreak)
            .collect();
        assert_eq!(breaks.len(), 1);
        assert_eq!(breaks[0].first.id, long.id);
        assert_eq!(breaks[0].second.id, next.id);
        assert_eq!(breaks[0].gap_minutes, Some(10));
    }

    #[test]
    fn test_inactive_periods_are_ignored() {
        let staff = Uuid::new_v4();
        let mut retired = period(staff, monday(), t(9, 0), t(12, 0));
        retired.is_active = false;
        let current = period(staff, monday(), t(10, 0), t(13, 0));

        assert!(detector().detect(&[retired, current], monday(), monday()).is_empty());
    }

    #[test]
    fn test_sort_by_severity_keeps_discovery_order() {
        let staff = Uuid::new_v4();
        let conflicts_input = vec![
            period(staff, monday(), t(9, 0), t(10, 0)),
            period(staff, monday(), t(10, 10), t(11, 0)),
            period(staff, monday(), t(10, 30), t(12, 0)),
        ];

        let mut conflicts = detector().detect(&conflicts_input, monday(), monday());
        assert_eq!(conflicts[0].severity, ConflictSeverity::Medium);

        sort_by_severity(&mut conflicts);
        assert_eq!(conflicts[0].severity, ConflictSeverity::High);
        assert_eq!(conflicts[1].severity, ConflictSeverity::Medium);
    }

    fn weekly(staff_id: Uuid, day_of_week: i32, start: NaiveTime, end: NaiveTime) -> WorkPeriod {
        WorkPeriod {
            day_of_week: Some(day_of_week),
            specific_date: None,
            ..period(staff_id, monday(), start, end)
        }
    }

    #[test]
    fn test_weekly_and_dated_periods_meet_on_same_date() {
        let staff = Uuid::new_v4();
        let recurring = weekly(staff, 1, t(9, 0), t(13, 0));
        let extra_shift = period(staff, monday(), t(12, 0), t(15, 0));

        let sunday = NaiveDate::from_ymd_opt(2025, 3, 9).unwrap();
        let saturday = NaiveDate::from_ymd_opt(2025, 3, 15).unwrap();
        let conflicts = detector().detect(&[recurring.clone(), extra_shift.clone()], sunday, saturday);

        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].conflict_type, ConflictType::TimeOverlap);
        assert_eq!(conflicts[0].date, monday());
        assert_eq!(conflicts[0].first.id, recurring.id);
        assert_eq!(conflicts[0].second.id, extra_shift.id);
    }

    #[test]
    fn test_disjoint_validity_windows_never_compared() {
        let staff = Uuid::new_v4();
        let mut old = weekly(staff, 1, t(9, 0), t(13, 0));
        old.effective_until = NaiveDate::from_ymd_opt(2025, 3, 31);
        let mut new = weekly(staff, 1, t(9, 0), t(13, 0));
        new.effective_from = NaiveDate::from_ymd_opt(2025, 4, 1);

        let from = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let to = NaiveDate::from_ymd_opt(2025, 4, 30).unwrap();

        assert!(detector().detect(&[old, new], from, to).is_empty());
    }

    #[test]
    fn test_weekly_overlap_reported_once_per_date() {
        let staff = Uuid::new_v4();
        let morning = weekly(staff, 1, t(9, 0), t(12, 0));
        let late_morning = weekly(staff, 1, t(11, 0), t(14, 0));

        let two_weeks_later = monday() + chrono::Duration::days(13);
        let conflicts = detector().detect(&[morning, late_morning], monday(), two_weeks_later);

        let dates: Vec<NaiveDate> = conflicts.iter().map(|c| c.date).collect();
        assert_eq!(dates, vec![monday(), monday() + chrono::Duration::days(7)]);
    }
}
