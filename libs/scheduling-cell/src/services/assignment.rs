use tracing::debug;

use crate::models::{SlotAssignment, StaffSlots, TimeSlot};

/// Earliest available slot, regardless of input order.
pub fn first_available(slots: &[TimeSlot]) -> Option<&TimeSlot> {
    slots
        .iter()
        .filter(|slot| slot.available)
        .min_by_key(|slot| slot.time)
}

/// Pick one slot across several staff members' lists.
///
/// Staff sharing the earliest available time are resolved by staff id,
/// ascending, so the outcome does not depend on the order lists arrive in.
pub fn assign_first_available(candidates: &[StaffSlots]) -> Option<SlotAssignment> {
    let assignment = candidates
        .iter()
        .filter_map(|staff| first_available(&staff.slots).map(|slot| (slot.time, staff.staff_id, slot)))
        .min_by_key(|(time, staff_id, _)| (*time, *staff_id))
        .map(|(_, staff_id, slot)| SlotAssignment {
            staff_id,
            slot: slot.clone(),
        });

    match &assignment {
        Some(found) => debug!("Auto-assigned staff {} at {}", found.staff_id, found.slot.time),
        None => debug!("No available slot among {} staff members", candidates.len()),
    }

    assignment
}
