use std::collections::HashSet;

use super::domain::{Attendance, UserId, UserProfile};

/// Attendees whose status qualifies them as participants, first record per user wins.
pub fn resolve_participants(attendances: &[Attendance]) -> Vec<UserProfile> {
    let mut seen = HashSet::new();
    attendances
        .iter()
        .filter(|attendance| attendance.status.is_participating())
        .filter(|attendance| seen.insert(attendance.user_id.clone()))
        .map(|attendance| attendance.user.clone())
        .collect()
}

pub fn is_participant(participants: &[UserProfile], user_id: &UserId) -> bool {
    participants.iter().any(|profile| &profile.id == user_id)
}
