use std::collections::HashSet;

use serde::Serialize;

use super::domain::{BadgeAward, EventId, NewBadgeAward, SurveyId};
use super::repository::DataServiceError;
use super::tally::FestivalStatistics;
use crate::workflows::badges::{BadgeCatalog, BadgeId};

/// Outcome of closing a survey. Closing twice yields the same award list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClosureReport {
    pub event_id: EventId,
    pub survey_id: SurveyId,
    /// The survey was already inactive before this call.
    pub already_closed: bool,
    /// Every award recorded for the event, ordered by badge id.
    pub awards: Vec<BadgeAward>,
    pub statistics: FestivalStatistics,
}

/// An award the data service refused during closure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedAward {
    pub award: NewBadgeAward,
    pub reason: String,
}

impl FailedAward {
    pub(crate) fn new(award: NewBadgeAward, error: &DataServiceError) -> Self {
        Self {
            award,
            reason: error.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AwardPlan {
    pub to_create: Vec<NewBadgeAward>,
    /// Winners withheld because the badge is reserved, inactive or unknown.
    pub withheld: Vec<BadgeId>,
}

/// Winners that still need an award record for this event.
///
/// Badges that already carry an award for the event are skipped so a retried closure never
/// duplicates them.
pub fn plan_awards(
    event_id: &EventId,
    statistics: &FestivalStatistics,
    catalog: &BadgeCatalog,
    existing: &[BadgeAward],
) -> AwardPlan {
    let awarded: HashSet<&BadgeId> = existing
        .iter()
        .filter(|award| &award.event_id == event_id)
        .map(|award| &award.badge_id)
        .collect();

    let mut plan = AwardPlan::default();
    for (badge_id, winner) in &statistics.badge_stats {
        if awarded.contains(badge_id) {
            continue;
        }
        let assignable = catalog
            .get(badge_id)
            .map(|badge| badge.is_assignable())
            .unwrap_or(false);
        if !assignable {
            plan.withheld.push(badge_id.clone());
            continue;
        }
        plan.to_create.push(NewBadgeAward {
            badge_id: badge_id.clone(),
            event_id: event_id.clone(),
            user_id: winner.user_id.clone(),
            votes_received: winner.votes,
        });
    }
    plan
}

pub(crate) fn event_awards(event_id: &EventId, awards: Vec<BadgeAward>) -> Vec<BadgeAward> {
    let mut awards: Vec<BadgeAward> = awards
        .into_iter()
        .filter(|award| &award.event_id == event_id)
        .collect();
    awards.sort_by(|a, b| a.badge_id.cmp(&b.badge_id));
    awards
}
