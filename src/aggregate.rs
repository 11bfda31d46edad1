use std::collections::HashMap;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::ReportSettings;
use crate::error::ReportError;
use crate::models::{
    Course, CourseOutline, LessonOutline, Member, MemberCourse, MemberProfile, PairRecord,
    ProgressRecord, TeamInfo, TeamReport, TeamSummary,
};
use crate::source::{Dependency, ProgressSource};

/// Everything the fold needs, captured from the collaborators in one pass.
#[derive(Debug, Clone)]
pub struct ReportInput {
    pub team: TeamInfo,
    pub members: Vec<MemberProfile>,
    pub courses: Vec<CourseOutline>,
    pub pairs: Vec<PairRecord>,
}

pub async fn build_team_report<S>(
    source: &S,
    team_id: Uuid,
    settings: &ReportSettings,
) -> Result<TeamReport, ReportError>
where
    S: ProgressSource + ?Sized,
{
    let input = collect(source, team_id, settings).await?;
    Ok(fold(input))
}

/// Queries the collaborators for the catalog, the roster and every started
/// (member, course) pair. Any failing call aborts the whole collection.
pub async fn collect<S>(
    source: &S,
    team_id: Uuid,
    settings: &ReportSettings,
) -> Result<ReportInput, ReportError>
where
    S: ProgressSource + ?Sized,
{
    let team = call(Dependency::FindTeam, source.find_team(team_id).await)?
        .ok_or(ReportError::TeamNotFound(team_id))?;

    let courses = load_catalog(source).await?;
    let members = load_roster(source, team_id, settings).await?;
    info!(
        team = %team.name,
        members = members.len(),
        courses = courses.len(),
        "collecting team progress"
    );

    let mut pairs = Vec::new();
    for member in &members {
        for outline in &courses {
            if let Some(pair) = evaluate_pair(source, member.id, outline, settings).await? {
                pairs.push(pair);
            }
        }
    }
    debug!(pairs = pairs.len(), "evaluated started pairs");

    Ok(ReportInput {
        team,
        members,
        courses,
        pairs,
    })
}

async fn load_catalog<S>(source: &S) -> Result<Vec<CourseOutline>, ReportError>
where
    S: ProgressSource + ?Sized,
{
    let catalog = call(Dependency::ListCourses, source.list_courses().await)?;
    let mut outlines = Vec::with_capacity(catalog.len());

    for course in catalog {
        let lesson_ids = call(Dependency::LessonsOf, source.lessons_of(course.id).await)?;
        let mut lessons = Vec::with_capacity(lesson_ids.len());
        for lesson_id in lesson_ids {
            let quiz_id = call(Dependency::QuizOf, source.quiz_of(lesson_id).await)?;
            lessons.push(LessonOutline {
                id: lesson_id,
                quiz_id,
            });
        }
        outlines.push(CourseOutline { course, lessons });
    }

    Ok(outlines)
}

async fn load_roster<S>(
    source: &S,
    team_id: Uuid,
    settings: &ReportSettings,
) -> Result<Vec<MemberProfile>, ReportError>
where
    S: ProgressSource + ?Sized,
{
    let roster = call(Dependency::ListMembers, source.list_members(team_id).await)?;
    let mut profiles = Vec::with_capacity(roster.len());

    for entry in roster {
        let avatar = call(Dependency::AvatarUrl, source.avatar_url(entry.id).await)?;
        let last_activity = call(Dependency::LastActivity, source.last_activity(entry.id).await)?;
        profiles.push(MemberProfile {
            id: entry.id,
            name: entry.display_name,
            email: entry.email,
            avatar_url: settings.avatar_or_default(avatar),
            last_activity: settings.last_activity_label(last_activity),
        });
    }

    Ok(profiles)
}

async fn evaluate_pair<S>(
    source: &S,
    member_id: Uuid,
    outline: &CourseOutline,
    settings: &ReportSettings,
) -> Result<Option<PairRecord>, ReportError>
where
    S: ProgressSource + ?Sized,
{
    let course_id = outline.course.id;
    if !call(Dependency::HasStarted, source.has_started(member_id, course_id).await)? {
        return Ok(None);
    }

    let mut lessons_completed = 0;
    let mut quizzes_passed = 0;
    for lesson in &outline.lessons {
        if call(
            Dependency::LessonCompleted,
            source.lesson_completed(member_id, lesson.id).await,
        )? {
            lessons_completed += 1;
        }
        if let Some(quiz_id) = lesson.quiz_id {
            if call(Dependency::QuizPassed, source.quiz_passed(member_id, quiz_id).await)? {
                quizzes_passed += 1;
            }
        }
    }

    let completed = call(
        Dependency::HasCompleted,
        source.has_completed(member_id, course_id).await,
    )?;
    let started_at = call(Dependency::StartDate, source.start_date(member_id, course_id).await)?;

    Ok(Some(PairRecord {
        member_id,
        course_id,
        progress: percent(lessons_completed, outline.lessons.len()),
        completed,
        lessons_completed,
        quizzes_passed,
        start_date: settings.start_date_label(started_at),
    }))
}

fn call<T>(dependency: Dependency, result: anyhow::Result<T>) -> Result<T, ReportError> {
    result.map_err(|err| {
        warn!(%dependency, error = %err, "collaborator call failed");
        ReportError::upstream(dependency, err)
    })
}

/// Reduces the collected pairs into course and member aggregates and the
/// team-wide summary. Courses and members keep their catalog and roster order.
pub fn fold(input: ReportInput) -> TeamReport {
    let ReportInput {
        team,
        members,
        courses,
        pairs,
    } = input;

    let mut courses: Vec<Course> = courses
        .into_iter()
        .map(|outline| Course::from_catalog(outline.course))
        .collect();
    let mut members: Vec<Member> = members.into_iter().map(Member::from_profile).collect();

    let course_index: HashMap<Uuid, usize> = courses
        .iter()
        .enumerate()
        .map(|(index, course)| (course.id, index))
        .collect();
    let member_index: HashMap<Uuid, usize> = members
        .iter()
        .enumerate()
        .map(|(index, member)| (member.id, index))
        .collect();
    let mut member_totals = vec![0.0_f64; members.len()];

    for pair in pairs {
        let (Some(&ci), Some(&mi)) = (
            course_index.get(&pair.course_id),
            member_index.get(&pair.member_id),
        ) else {
            warn!(
                member = %pair.member_id,
                course = %pair.course_id,
                "skipping progress for unknown member or course"
            );
            continue;
        };

        let course = &mut courses[ci];
        let member = &mut members[mi];

        course.enrolled_count += 1;
        member.courses_started += 1;
        if pair.completed {
            course.completed_count += 1;
            member.courses_completed += 1;
        }
        course.total_progress += pair.progress;
        member_totals[mi] += pair.progress;

        member.courses.insert(
            course.id,
            MemberCourse {
                progress: pair.progress,
                completed: pair.completed,
            },
        );
        course.member_progress.insert(
            member.id,
            ProgressRecord {
                progress: pair.progress,
                completed: pair.completed,
                lessons_completed: pair.lessons_completed,
                quizzes_passed: pair.quizzes_passed,
                start_date: pair.start_date,
            },
        );
    }

    for (member, total) in members.iter_mut().zip(member_totals) {
        member.overall_progress = mean(total, member.courses_started);
    }

    for course in courses.iter_mut() {
        course.completion_rate = percent(course.completed_count, course.enrolled_count);
        course.average_progress = mean(course.total_progress, course.enrolled_count);
    }

    let enrolled: Vec<&Course> = courses.iter().filter(|c| c.enrolled_count > 0).collect();
    let average_sum: f64 = enrolled.iter().map(|c| c.average_progress).sum();
    let summary = TeamSummary {
        id: team.id,
        name: team.name,
        member_count: members.len(),
        total_courses: enrolled.len(),
        average_completion: mean(average_sum, enrolled.len()),
    };
    info!(
        total_courses = summary.total_courses,
        average_completion = summary.average_completion,
        "team report finalized"
    );

    TeamReport {
        team: summary,
        courses,
        members,
    }
}

/// `part / whole * 100`, rounded to two decimals; zero when `whole` is zero.
pub fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    round2(part as f64 / whole as f64 * 100.0)
}

fn mean(total: f64, count: usize) -> f64 {
    if count == 0 {
        return 0.0;
    }
    round2(total / count as f64)
}

/// Rounds half away from zero on the decimal value, so 8.825 becomes 8.83
/// even though its binary form sits just below the half.
pub fn round2(value: f64) -> f64 {
    let scaled = value * 100.0;
    let pre_rounded = (scaled * 1e9).round() / 1e9;
    pre_rounded.round() / 100.0
}
