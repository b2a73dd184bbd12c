use crate::infra::{parse_datetime, seeded_data_service, DEMO_EVENT, DEMO_ORGANIZER};
use chrono::{DateTime, Duration, Utc};
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use wacho::error::AppError;
use wacho::workflows::badges::BadgeCatalog;
use wacho::workflows::survey::{
    closes_at, Answer, AnswerMap, ClosureReport, EventId, FestivalStatistics, Question,
    SurveyAvailability, SurveyService, UserId, UserProfile,
};

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// How many days ago the demo festival ended. Negative values put it in the future.
    #[arg(long, default_value_t = 2, allow_negative_numbers = true)]
    pub(crate) days_since_end: i64,
    /// Seed for the badge question sampler (random when omitted).
    #[arg(long)]
    pub(crate) seed: Option<u64>,
    /// Optional badge catalog CSV export replacing the built-in catalog.
    #[arg(long)]
    pub(crate) badges_csv: Option<PathBuf>,
    /// Stop after printing statistics, leaving the survey open.
    #[arg(long)]
    pub(crate) skip_closure: bool,
}

#[derive(Args, Debug)]
pub(crate) struct SurveyStatusArgs {
    /// Festival end timestamp (RFC 3339)
    #[arg(long, value_parser = parse_datetime)]
    pub(crate) end: DateTime<Utc>,
    /// Evaluation time (RFC 3339, defaults to now)
    #[arg(long, value_parser = parse_datetime)]
    pub(crate) now: Option<DateTime<Utc>>,
}

pub(crate) fn run_survey_status(args: SurveyStatusArgs) {
    let now = args.now.unwrap_or_else(Utc::now);
    let status = SurveyAvailability::evaluate(args.end, now);
    let closing = closes_at(args.end);

    println!("Survey status: {}", status.label());
    println!("- Festival ended: {}", args.end.to_rfc3339());
    println!("- Survey closes:  {}", closing.to_rfc3339());
    println!("- Accepting responses: {}", yes_no(status.accepts_responses()));
    println!("- Statistics visible:  {}", yes_no(status.statistics_visible()));
    println!("- Attendance editable: {}", yes_no(status.attendance_editable()));
    if status == SurveyAvailability::Open {
        let remaining = closing - now;
        println!(
            "- Time left: {} day(s) {} hour(s)",
            remaining.num_days(),
            remaining.num_hours() % 24
        );
    }
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        days_since_end,
        seed,
        badges_csv,
        skip_closure,
    } = args;

    let catalog = match badges_csv {
        Some(path) => BadgeCatalog::from_path(path)?,
        None => BadgeCatalog::standard(),
    };
    let now = Utc::now();
    let end_date = demo_end_date(now, days_since_end)?;
    let data = Arc::new(seeded_data_service(&catalog, end_date));
    let service = match seed {
        Some(seed) => SurveyService::with_seed(data, seed),
        None => SurveyService::new(data),
    }
    .with_catalog(catalog.clone());
    let event = EventId::from(DEMO_EVENT);

    println!("Festival survey demo");
    let status = service.availability(&event, now).await?;
    println!("- Survey status: {}", status.label());

    let participants = service.participants(&event).await?;
    println!("- {} eligible participants:", participants.len());
    for participant in &participants {
        println!("    - {}", display_name(participant));
    }

    let questions = service.questions(&event).await?;
    let badge_questions: Vec<&Question> = questions
        .iter()
        .filter(|question| question.badge_id().is_some())
        .collect();
    println!(
        "- {} questions ({} badge nominations this session)",
        questions.len(),
        badge_questions.len()
    );
    for question in &badge_questions {
        println!("    - {}", question.prompt);
    }

    if !status.accepts_responses() {
        println!("\nSurvey is not accepting responses ({})", status.label());
        return Ok(());
    }

    println!("\nCollecting responses");
    for (index, voter) in participants.iter().enumerate() {
        let answers = demo_answers(index, voter, &participants, &badge_questions);
        match service.submit(&event, &voter.id, &answers, now).await {
            Ok(stored) => println!(
                "- {} submitted {} answers",
                display_name(voter),
                stored.responses.len()
            ),
            Err(err) => println!("- {} rejected: {}", display_name(voter), err),
        }
    }

    let statistics = service.statistics(&event, now).await?;
    render_statistics(&statistics, &catalog);

    if skip_closure {
        return Ok(());
    }

    println!("\nClosing survey as organizer {DEMO_ORGANIZER}");
    let organizer = UserId::from(DEMO_ORGANIZER);
    match service.close(&event, &organizer).await {
        Ok(report) => render_awards(&report, &catalog),
        Err(err) => {
            println!("  Closure failed: {}", err);
            return Ok(());
        }
    }

    let repeat = service.close(&event, &organizer).await?;
    println!(
        "- Repeat closure: already closed = {}, {} award(s) unchanged",
        repeat.already_closed,
        repeat.awards.len()
    );

    Ok(())
}

fn demo_end_date(now: DateTime<Utc>, days_since_end: i64) -> Result<DateTime<Utc>, AppError> {
    Duration::try_days(days_since_end)
        .and_then(|offset| now.checked_sub_signed(offset))
        .ok_or_else(|| {
            AppError::InvalidArgument(format!(
                "--days-since-end {days_since_end} is out of the supported date range"
            ))
        })
}

fn demo_answers(
    index: usize,
    voter: &UserProfile,
    participants: &[UserProfile],
    badge_questions: &[&Question],
) -> AnswerMap {
    const OVERALL: [i64; 4] = [5, 4, 5, 3];
    const ENJOYMENT: [&str; 4] = ["amazing", "very_good", "good", "amazing"];
    const RECOMMEND: [&str; 4] = ["definitely", "probably", "definitely", "maybe"];
    const ATTEND_AGAIN: [&str; 4] = ["definitely", "probably", "unsure", "definitely"];
    let slot = index % 4;

    let mut answers = AnswerMap::new();
    answers.insert("overall_rating".to_string(), Answer::Number(OVERALL[slot]));
    answers.insert("enjoyment_level".to_string(), Answer::from(ENJOYMENT[slot]));
    answers.insert(
        "best_moment".to_string(),
        Answer::from("The sunset set on the beach stage"),
    );
    answers.insert("atmosphere_rating".to_string(), Answer::Number(5 - (slot as i64 % 2)));
    answers.insert("would_recommend".to_string(), Answer::from(RECOMMEND[slot]));
    answers.insert("organization_rating".to_string(), Answer::Number(3 + (slot as i64 % 3)));
    answers.insert(
        "improvements".to_string(),
        Answer::from("More water stations near the main stage"),
    );
    answers.insert("would_attend_again".to_string(), Answer::from(ATTEND_AGAIN[slot]));

    // Nominate someone other than the voter for the first three offered badges.
    let others: Vec<&UserProfile> = participants.iter().filter(|p| p.id != voter.id).collect();
    for (offset, question) in badge_questions.iter().take(3).enumerate() {
        if others.is_empty() {
            break;
        }
        let nominee = others[offset % others.len()];
        answers.insert(question.key.clone(), Answer::from(nominee.id.0.as_str()));
    }
    answers
}

fn render_statistics(statistics: &FestivalStatistics, catalog: &BadgeCatalog) {
    println!("\nStatistics");
    println!(
        "- {} of {} participants responded ({}%)",
        statistics.survey_responses, statistics.total_participants, statistics.response_rate
    );
    println!(
        "- Average rating {:.1} | atmosphere {:.1} | organization {:.1}",
        statistics.average_rating, statistics.average_atmosphere, statistics.average_organization
    );
    let distribution: Vec<String> = statistics
        .rating_distribution
        .iter()
        .map(|(rating, count)| format!("{rating}: {count}"))
        .collect();
    println!("- Rating distribution: {}", distribution.join(" | "));
    if let Some(top) = &statistics.top_enjoyment {
        println!("- Most common enjoyment level: {}", top);
    }
    if let Some(top) = &statistics.top_recommendation {
        println!("- Most common recommendation: {}", top);
    }
    for (badge_id, tally) in &statistics.badge_stats {
        let name = catalog
            .get(badge_id)
            .map(|badge| badge.name.as_str())
            .unwrap_or(badge_id.0.as_str());
        println!("- {} leader: {} ({} votes)", name, tally.user_id, tally.votes);
    }
}

fn render_awards(report: &ClosureReport, catalog: &BadgeCatalog) {
    if report.awards.is_empty() {
        println!("- Survey closed without nominations; no badges awarded");
        return;
    }
    println!("- Survey closed, {} badge(s) awarded:", report.awards.len());
    for award in &report.awards {
        let name = catalog
            .get(&award.badge_id)
            .map(|badge| badge.name.as_str())
            .unwrap_or(award.badge_id.0.as_str());
        println!(
            "    - {} -> {} ({} votes)",
            name, award.user_id, award.votes_received
        );
    }
}

fn display_name(profile: &UserProfile) -> String {
    match &profile.nickname {
        Some(nickname) => format!("{} ({})", profile.name, nickname),
        None => profile.name.clone(),
    }
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}
