use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{Answer, Attendance, SurveyResponse, UserId};
use super::participants::resolve_participants;
use super::questions::{
    badge_id_from_key, ATMOSPHERE_RATING, BEST_MOMENT, ENJOYMENT_LEVEL, IMPROVEMENTS,
    ORGANIZATION_RATING, OVERALL_RATING, RATING_MAX, RATING_MIN, WOULD_ATTEND_AGAIN,
    WOULD_RECOMMEND,
};
use crate::workflows::badges::BadgeId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankingEntry {
    pub option: String,
    pub votes: u32,
    pub percentage: u32,
}

/// Leading nominee for a badge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BadgeTally {
    pub user_id: UserId,
    pub votes: u32,
    pub first_nominated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextAnswers {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_moment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub improvements: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextResponse {
    pub user_id: UserId,
    pub user_name: Option<String>,
    pub user_nickname: Option<String>,
    pub created_at: DateTime<Utc>,
    pub text_answers: TextAnswers,
}

/// Derived view over every response of one survey. Recomputed on demand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FestivalStatistics {
    pub total_participants: usize,
    pub survey_responses: usize,
    pub response_rate: u32,
    pub average_rating: f64,
    pub average_atmosphere: f64,
    pub average_organization: f64,
    /// Counts keyed by rating 1 through 5; every key is present.
    pub rating_distribution: BTreeMap<u8, u32>,
    pub top_enjoyment: Option<String>,
    pub top_recommendation: Option<String>,
    pub enjoyment_ranking: Vec<RankingEntry>,
    pub recommendation_ranking: Vec<RankingEntry>,
    pub attend_again_ranking: Vec<RankingEntry>,
    /// Only badges with at least one nomination appear.
    pub badge_stats: BTreeMap<BadgeId, BadgeTally>,
    pub text_responses: Vec<TextResponse>,
}

impl FestivalStatistics {
    pub fn winner(&self, badge: &BadgeId) -> Option<&BadgeTally> {
        self.badge_stats.get(badge)
    }
}

/// Aggregates survey responses against the festival's attendance list.
///
/// Responses are read oldest first. A user with several rows contributes only the latest one.
pub fn aggregate(responses: &[SurveyResponse], attendances: &[Attendance]) -> FestivalStatistics {
    let participants = resolve_participants(attendances);
    let profiles: HashMap<&UserId, &Attendance> = attendances
        .iter()
        .map(|attendance| (&attendance.user_id, attendance))
        .collect();

    let responses = latest_per_user(responses);

    let mut rating_distribution: BTreeMap<u8, u32> =
        (RATING_MIN..=RATING_MAX).map(|rating| (rating as u8, 0)).collect();
    let mut overall = Vec::new();
    let mut atmosphere = Vec::new();
    let mut organization = Vec::new();
    let mut enjoyment = ChoiceCounter::default();
    let mut recommendation = ChoiceCounter::default();
    let mut attend_again = ChoiceCounter::default();
    let mut nominations: BTreeMap<BadgeId, Vec<NomineeCount>> = BTreeMap::new();
    let mut text_responses = Vec::new();

    for response in &responses {
        let answers = &response.responses;

        if let Some(rating) = valid_rating(answers.get(OVERALL_RATING)) {
            overall.push(rating);
            *rating_distribution.entry(rating as u8).or_default() += 1;
        }
        atmosphere.extend(valid_rating(answers.get(ATMOSPHERE_RATING)));
        organization.extend(valid_rating(answers.get(ORGANIZATION_RATING)));

        enjoyment.record(answers.get(ENJOYMENT_LEVEL));
        recommendation.record(answers.get(WOULD_RECOMMEND));
        attend_again.record(answers.get(WOULD_ATTEND_AGAIN));

        for (key, answer) in answers {
            let Some(badge) = badge_id_from_key(key) else {
                continue;
            };
            let Some(nominee) = answer.as_text().map(str::trim).filter(|v| !v.is_empty()) else {
                continue;
            };
            let counts = nominations.entry(badge).or_default();
            match counts.iter_mut().find(|count| count.user_id.0 == nominee) {
                Some(count) => count.votes += 1,
                None => counts.push(NomineeCount {
                    user_id: UserId(nominee.to_string()),
                    votes: 1,
                    first_nominated_at: response.created_at,
                }),
            }
        }

        let text_answers = TextAnswers {
            best_moment: non_empty_text(answers.get(BEST_MOMENT)),
            improvements: non_empty_text(answers.get(IMPROVEMENTS)),
        };
        if text_answers.best_moment.is_some() || text_answers.improvements.is_some() {
            let profile = profiles.get(&response.user_id).map(|a| &a.user);
            text_responses.push(TextResponse {
                user_id: response.user_id.clone(),
                user_name: profile.map(|p| p.name.clone()),
                user_nickname: profile.and_then(|p| p.nickname.clone()),
                created_at: response.created_at,
                text_answers,
            });
        }
    }

    let badge_stats = nominations
        .into_iter()
        .filter_map(|(badge, counts)| select_winner(&counts).map(|winner| (badge, winner)))
        .collect();

    let enjoyment_ranking = enjoyment.ranking();
    let recommendation_ranking = recommendation.ranking();

    FestivalStatistics {
        total_participants: participants.len(),
        survey_responses: responses.len(),
        response_rate: percentage(responses.len(), participants.len()),
        average_rating: average(&overall),
        average_atmosphere: average(&atmosphere),
        average_organization: average(&organization),
        rating_distribution,
        top_enjoyment: enjoyment_ranking.first().map(|entry| entry.option.clone()),
        top_recommendation: recommendation_ranking.first().map(|entry| entry.option.clone()),
        enjoyment_ranking,
        recommendation_ranking,
        attend_again_ranking: attend_again.ranking(),
        badge_stats,
        text_responses,
    }
}

#[derive(Debug, Clone)]
struct NomineeCount {
    user_id: UserId,
    votes: u32,
    first_nominated_at: DateTime<Utc>,
}

/// Most votes wins; ties go to the earliest first nomination, then the smaller user id.
fn select_winner(counts: &[NomineeCount]) -> Option<BadgeTally> {
    counts
        .iter()
        .min_by(|a, b| {
            b.votes
                .cmp(&a.votes)
                .then_with(|| a.first_nominated_at.cmp(&b.first_nominated_at))
                .then_with(|| a.user_id.cmp(&b.user_id))
        })
        .map(|count| BadgeTally {
            user_id: count.user_id.clone(),
            votes: count.votes,
            first_nominated_at: count.first_nominated_at,
        })
}

fn latest_per_user(responses: &[SurveyResponse]) -> Vec<&SurveyResponse> {
    let mut ordered: Vec<&SurveyResponse> = responses.iter().collect();
    ordered.sort_by(|a, b| match a.created_at.cmp(&b.created_at) {
        Ordering::Equal => a.id.cmp(&b.id),
        other => other,
    });

    let mut last_index: HashMap<&UserId, usize> = HashMap::new();
    for (index, response) in ordered.iter().enumerate() {
        last_index.insert(&response.user_id, index);
    }

    ordered
        .iter()
        .enumerate()
        .filter(|(index, response)| last_index.get(&response.user_id) == Some(index))
        .map(|(_, response)| *response)
        .collect()
}

/// Option counts in first-seen order.
#[derive(Debug, Default)]
struct ChoiceCounter {
    counts: Vec<(String, u32)>,
    answered: usize,
}

impl ChoiceCounter {
    fn record(&mut self, answer: Option<&Answer>) {
        let Some(value) = answer.and_then(Answer::as_text).map(str::trim) else {
            return;
        };
        if value.is_empty() {
            return;
        }
        self.answered += 1;
        match self.counts.iter_mut().find(|(option, _)| option == value) {
            Some((_, votes)) => *votes += 1,
            None => self.counts.push((value.to_string(), 1)),
        }
    }

    /// Descending by votes; `sort_by` is stable so ties keep first-seen order.
    fn ranking(&self) -> Vec<RankingEntry> {
        let mut entries: Vec<RankingEntry> = self
            .counts
            .iter()
            .map(|(option, votes)| RankingEntry {
                option: option.clone(),
                votes: *votes,
                percentage: percentage(*votes as usize, self.answered),
            })
            .collect();
        entries.sort_by(|a, b| b.votes.cmp(&a.votes));
        entries
    }
}

fn valid_rating(answer: Option<&Answer>) -> Option<i64> {
    answer
        .and_then(Answer::as_rating)
        .filter(|rating| (RATING_MIN..=RATING_MAX).contains(rating))
}

fn non_empty_text(answer: Option<&Answer>) -> Option<String> {
    answer
        .and_then(Answer::as_text)
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

fn percentage(part: usize, whole: usize) -> u32 {
    if whole == 0 {
        return 0;
    }
    (part as f64 * 100.0 / whole as f64).round() as u32
}

fn average(values: &[i64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mean = values.iter().sum::<i64>() as f64 / values.len() as f64;
    (mean * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::survey::domain::{
        AnswerMap, AttendanceStatus, EventId, ResponseId, SurveyId, UserProfile,
    };
    use chrono::{Duration, TimeZone};

    fn at(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 8, 1, 12, 0, 0)
            .single()
            .expect("valid timestamp")
            + Duration::minutes(minutes)
    }

    fn attendee(user: &str, status: AttendanceStatus) -> Attendance {
        Attendance {
            event_id: EventId::from("fest-1"),
            user_id: UserId::from(user),
            status,
            user: UserProfile {
                id: UserId::from(user),
                name: format!("Name {user}"),
                nickname: Some(format!("nick-{user}")),
                avatar_url: None,
            },
        }
    }

    fn response(id: &str, user: &str, minute: i64, answers: &[(&str, Answer)]) -> SurveyResponse {
        SurveyResponse {
            id: ResponseId::from(id),
            survey_id: SurveyId::from("survey-1"),
            user_id: UserId::from(user),
            responses: answers
                .iter()
                .map(|(key, answer)| (key.to_string(), answer.clone()))
                .collect::<AnswerMap>(),
            created_at: at(minute),
        }
    }

    fn three_participants() -> Vec<Attendance> {
        vec![
            attendee("u1", AttendanceStatus::HaveTicket),
            attendee("u2", AttendanceStatus::HaveTicket),
            attendee("u3", AttendanceStatus::ThinkingAboutIt),
            attendee("u4", AttendanceStatus::NotGoing),
        ]
    }

    #[test]
    fn averages_and_response_rate() {
        let responses = vec![
            response("r1", "u1", 0, &[(OVERALL_RATING, Answer::Number(5))]),
            response("r2", "u2", 1, &[(OVERALL_RATING, Answer::Number(4))]),
        ];

        let stats = aggregate(&responses, &three_participants());
        assert_eq!(stats.total_participants, 3);
        assert_eq!(stats.survey_responses, 2);
        assert_eq!(stats.response_rate, 67);
        assert_eq!(stats.average_rating, 4.5);
    }

    #[test]
    fn empty_inputs_produce_zeroes() {
        let stats = aggregate(&[], &[]);
        assert_eq!(stats.response_rate, 0);
        assert_eq!(stats.average_rating, 0.0);
        assert_eq!(stats.rating_distribution.values().sum::<u32>(), 0);
        assert_eq!(stats.rating_distribution.len(), 5);
        assert!(stats.badge_stats.is_empty());
        assert!(stats.top_enjoyment.is_none());
    }

    #[test]
    fn distribution_ignores_out_of_range_ratings() {
        let responses = vec![
            response("r1", "u1", 0, &[(OVERALL_RATING, Answer::Number(5))]),
            response("r2", "u2", 1, &[(OVERALL_RATING, Answer::Number(9))]),
            response("r3", "u3", 2, &[(OVERALL_RATING, Answer::from("3"))]),
            response("r4", "u4", 3, &[(OVERALL_RATING, Answer::from("great"))]),
        ];

        let stats = aggregate(&responses, &three_participants());
        assert_eq!(stats.rating_distribution.values().sum::<u32>(), 2);
        assert_eq!(stats.rating_distribution[&5], 1);
        assert_eq!(stats.rating_distribution[&3], 1);
        assert_eq!(stats.average_rating, 4.0);
    }

    #[test]
    fn rankings_sort_by_votes_with_stable_ties() {
        let responses = vec![
            response("r1", "u1", 0, &[(ENJOYMENT_LEVEL, Answer::from("good"))]),
            response("r2", "u2", 1, &[(ENJOYMENT_LEVEL, Answer::from("amazing"))]),
            response("r3", "u3", 2, &[(ENJOYMENT_LEVEL, Answer::from("amazing"))]),
            response("r4", "u4", 3, &[(ENJOYMENT_LEVEL, Answer::from("okay"))]),
        ];

        let stats = aggregate(&responses, &three_participants());
        let options: Vec<_> = stats
            .enjoyment_ranking
            .iter()
            .map(|entry| (entry.option.as_str(), entry.votes, entry.percentage))
            .collect();
        assert_eq!(
            options,
            vec![("amazing", 2, 50), ("good", 1, 25), ("okay", 1, 25)]
        );
        assert_eq!(stats.top_enjoyment.as_deref(), Some("amazing"));
        assert!(stats.recommendation_ranking.is_empty());
    }

    #[test]
    fn badge_winner_has_most_nominations() {
        let responses = vec![
            response("r1", "u1", 0, &[("badge_b1", Answer::from("u2"))]),
            response("r2", "u2", 1, &[("badge_b1", Answer::from("u3"))]),
            response("r3", "u3", 2, &[("badge_b1", Answer::from("u2"))]),
        ];

        let stats = aggregate(&responses, &three_participants());
        let winner = stats.winner(&BadgeId("b1".to_string())).expect("b1 winner");
        assert_eq!(winner.user_id, UserId::from("u2"));
        assert_eq!(winner.votes, 2);
        assert!(stats.winner(&BadgeId("b2".to_string())).is_none());
    }

    #[test]
    fn badge_ties_go_to_earliest_nomination() {
        let responses = vec![
            response("r1", "u1", 5, &[("badge_b1", Answer::from("u3"))]),
            response("r2", "u2", 1, &[("badge_b1", Answer::from("u1"))]),
        ];

        let stats = aggregate(&responses, &three_participants());
        let winner = stats.winner(&BadgeId("b1".to_string())).expect("b1 winner");
        assert_eq!(winner.user_id, UserId::from("u1"));
        assert_eq!(winner.first_nominated_at, at(1));
    }

    #[test]
    fn badge_ties_at_same_instant_fall_back_to_user_id() {
        let responses = vec![
            response("r1", "u1", 0, &[("badge_b1", Answer::from("u3"))]),
            response("r2", "u2", 0, &[("badge_b1", Answer::from("u1"))]),
        ];

        let stats = aggregate(&responses, &three_participants());
        let winner = stats.winner(&BadgeId("b1".to_string())).expect("b1 winner");
        assert_eq!(winner.user_id, UserId::from("u1"));
    }

    #[test]
    fn duplicate_rows_for_a_user_count_once() {
        let responses = vec![
            response("r1", "u1", 0, &[(OVERALL_RATING, Answer::Number(1))]),
            response("r2", "u1", 3, &[(OVERALL_RATING, Answer::Number(5))]),
        ];

        let stats = aggregate(&responses, &three_participants());
        assert_eq!(stats.survey_responses, 1);
        assert_eq!(stats.average_rating, 5.0);
    }

    #[test]
    fn text_responses_include_profile_names() {
        let responses = vec![
            response(
                "r1",
                "u1",
                0,
                &[
                    (BEST_MOMENT, Answer::from("Headliner encore")),
                    (IMPROVEMENTS, Answer::from("  ")),
                ],
            ),
            response("r2", "u2", 1, &[(OVERALL_RATING, Answer::Number(3))]),
            response("r3", "ghost", 2, &[(IMPROVEMENTS, Answer::from("Shade"))]),
        ];

        let stats = aggregate(&responses, &three_participants());
        assert_eq!(stats.text_responses.len(), 2);

        let first = &stats.text_responses[0];
        assert_eq!(first.user_name.as_deref(), Some("Name u1"));
        assert_eq!(first.user_nickname.as_deref(), Some("nick-u1"));
        assert_eq!(
            first.text_answers.best_moment.as_deref(),
            Some("Headliner encore")
        );
        assert!(first.text_answers.improvements.is_none());

        let unknown = &stats.text_responses[1];
        assert!(unknown.user_name.is_none());
    }
}
