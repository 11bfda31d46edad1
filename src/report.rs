use std::fmt::Write;

use clap::ValueEnum;

use crate::models::{Course, Member, TeamReport};

/// Courses shown in the completion-rate overview.
const TOP_COURSES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Markdown,
}

pub fn render(report: &TeamReport, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => render_json(report),
        OutputFormat::Markdown => Ok(render_markdown(report)),
    }
}

pub fn render_json(report: &TeamReport) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

/// One enrolled member's row in a course's detail listing.
#[derive(Debug, Clone, PartialEq)]
pub struct DetailRow<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub progress: f64,
    pub completed: bool,
    pub lessons_completed: usize,
    pub quizzes_passed: usize,
    pub start_date: &'a str,
}

/// Enrolled members of a course, highest progress first.
pub fn course_details<'a>(course: &'a Course, members: &'a [Member]) -> Vec<DetailRow<'a>> {
    let mut rows: Vec<DetailRow<'a>> = course
        .member_progress
        .iter()
        .filter_map(|(member_id, record)| {
            let member = members.iter().find(|m| m.id == *member_id)?;
            Some(DetailRow {
                name: &member.name,
                email: &member.email,
                progress: record.progress,
                completed: record.completed,
                lessons_completed: record.lessons_completed,
                quizzes_passed: record.quizzes_passed,
                start_date: &record.start_date,
            })
        })
        .collect();

    rows.sort_by(|a, b| {
        b.progress
            .partial_cmp(&a.progress)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.name.cmp(b.name))
    });
    rows
}

pub fn format_percent(value: f64) -> String {
    format!("{value}%")
}

pub fn render_markdown(report: &TeamReport) -> String {
    let mut output = String::new();
    let team = &report.team;

    let _ = writeln!(output, "# Team Course Progress: {}", team.name);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Overview");
    let _ = writeln!(output, "- Total Courses: {}", team.total_courses);
    let _ = writeln!(
        output,
        "- Average Completion: {}",
        format_percent(team.average_completion)
    );
    let _ = writeln!(output, "- Team Members: {}", team.member_count);

    if !report.courses.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Course Completion Rates");
        for course in report.courses.iter().take(TOP_COURSES) {
            let _ = writeln!(
                output,
                "- {}: {}",
                course.title,
                format_percent(course.completion_rate)
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Member Progress");

    if report.members.is_empty() {
        let _ = writeln!(output, "No member data available.");
    } else {
        let _ = writeln!(
            output,
            "| Member | Email | Courses Started | Courses Completed | Overall Progress | Last Activity |"
        );
        let _ = writeln!(output, "|---|---|---|---|---|---|");
        for member in &report.members {
            let _ = writeln!(
                output,
                "| {} | {} | {} | {} | {} | {} |",
                member.name,
                member.email,
                member.courses_started,
                member.courses_completed,
                format_percent(member.overall_progress),
                member.last_activity
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Course Details");

    if report.courses.is_empty() {
        let _ = writeln!(output, "No course data available.");
        return output;
    }

    let _ = writeln!(output, "| Course | Enrolled Members | Completion Rate |");
    let _ = writeln!(output, "|---|---|---|");
    for course in &report.courses {
        let _ = writeln!(
            output,
            "| [{}]({}) | {} / {} | {} |",
            course.title,
            course.permalink,
            course.enrolled_count,
            team.member_count,
            format_percent(course.completion_rate)
        );
    }

    for course in &report.courses {
        let _ = writeln!(output);
        let _ = writeln!(output, "### {}", course.title);
        let _ = writeln!(
            output,
            "Average progress {} across {} enrolled members.",
            format_percent(course.average_progress),
            course.enrolled_count
        );

        let rows = course_details(course, &report.members);
        if rows.is_empty() {
            let _ = writeln!(output, "No team members have started this course.");
            continue;
        }

        let _ = writeln!(
            output,
            "| Member | Progress | Status | Lessons Completed | Quizzes Passed | Start Date |"
        );
        let _ = writeln!(output, "|---|---|---|---|---|---|");
        for row in rows {
            let status = if row.completed {
                "Completed"
            } else {
                "In Progress"
            };
            let _ = writeln!(
                output,
                "| {} ({}) | {} | {} | {} | {} | {} |",
                row.name,
                row.email,
                format_percent(row.progress),
                status,
                row.lessons_completed,
                row.quizzes_passed,
                row.start_date
            );
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        CatalogEntry, MemberCourse, MemberProfile, ProgressRecord, TeamSummary,
    };
    use uuid::Uuid;

    fn member(name: &str) -> Member {
        Member::from_profile(MemberProfile {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            avatar_url: String::new(),
            last_activity: "No activity".to_string(),
        })
    }

    fn course(title: &str) -> Course {
        Course::from_catalog(CatalogEntry {
            id: Uuid::new_v4(),
            title: title.to_string(),
            permalink: format!("https://learn.example.com/{}", title.to_lowercase()),
        })
    }

    fn enroll(course: &mut Course, member: &mut Member, progress: f64, completed: bool) {
        course.enrolled_count += 1;
        course.member_progress.insert(
            member.id,
            ProgressRecord {
                progress,
                completed,
                lessons_completed: 1,
                quizzes_passed: 0,
                start_date: "January 5, 2026".to_string(),
            },
        );
        member.courses_started += 1;
        member
            .courses
            .insert(course.id, MemberCourse { progress, completed });
    }

    fn sample_report() -> TeamReport {
        let mut avery = member("Avery");
        let mut jules = member("Jules");
        let mut onboarding = course("Onboarding");
        enroll(&mut onboarding, &mut avery, 25.0, false);
        enroll(&mut onboarding, &mut jules, 100.0, true);
        onboarding.completion_rate = 50.0;
        onboarding.average_progress = 62.5;

        TeamReport {
            team: TeamSummary {
                id: Uuid::new_v4(),
                name: "Support".to_string(),
                member_count: 2,
                total_courses: 1,
                average_completion: 62.5,
            },
            courses: vec![onboarding, course("Security")],
            members: vec![avery, jules],
        }
    }

    #[test]
    fn details_sort_by_progress_descending() {
        let report = sample_report();

        let rows = course_details(&report.courses[0], &report.members);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].name, "Jules");
        assert!(rows[0].completed);
        assert_eq!(rows[1].name, "Avery");
    }

    #[test]
    fn percent_formatting_drops_trailing_zeroes() {
        assert_eq!(format_percent(50.0), "50%");
        assert_eq!(format_percent(33.33), "33.33%");
        assert_eq!(format_percent(0.0), "0%");
    }

    #[test]
    fn markdown_includes_dashboard_sections() {
        let report = sample_report();

        let markdown = render_markdown(&report);

        assert!(markdown.contains("# Team Course Progress: Support"));
        assert!(markdown.contains("- Average Completion: 62.5%"));
        assert!(markdown.contains("| 2 / 2 | 50% |"));
        assert!(markdown.contains("| Jules (jules@example.com) | 100% | Completed |"));
        assert!(markdown.contains("No team members have started this course."));
    }

    #[test]
    fn markdown_handles_empty_team() {
        let report = TeamReport {
            team: TeamSummary {
                id: Uuid::new_v4(),
                name: "Empty".to_string(),
                member_count: 0,
                total_courses: 0,
                average_completion: 0.0,
            },
            courses: Vec::new(),
            members: Vec::new(),
        };

        let markdown = render_markdown(&report);

        assert!(markdown.contains("No member data available."));
        assert!(markdown.contains("No course data available."));
        assert!(!markdown.contains("## Course Completion Rates"));
    }

    #[test]
    fn json_uses_wire_field_names() {
        let report = sample_report();

        let json = render_json(&report).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["team"]["total_courses"], 1);
        assert_eq!(value["team"]["average_completion"], 62.5);
        let first = &value["courses"][0];
        assert_eq!(first["enrolled_count"], 2);
        let avery_id = report.members[0].id.to_string();
        assert_eq!(first["member_progress"][&avery_id]["progress"], 25.0);
        assert_eq!(
            value["members"][0]["courses"][report.courses[0].id.to_string()]["completed"],
            false
        );
    }
}
