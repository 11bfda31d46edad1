use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamInfo {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    pub id: Uuid,
    pub display_name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub id: Uuid,
    pub title: String,
    pub permalink: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LessonOutline {
    pub id: Uuid,
    pub quiz_id: Option<Uuid>,
}

/// A published course together with its lessons, fetched once per report.
#[derive(Debug, Clone)]
pub struct CourseOutline {
    pub course: CatalogEntry,
    pub lessons: Vec<LessonOutline>,
}

/// A roster entry with its display fields already resolved.
#[derive(Debug, Clone)]
pub struct MemberProfile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub avatar_url: String,
    pub last_activity: String,
}

/// Outcome of evaluating one (member, course) pair the member has started.
#[derive(Debug, Clone, PartialEq)]
pub struct PairRecord {
    pub member_id: Uuid,
    pub course_id: Uuid,
    pub progress: f64,
    pub completed: bool,
    pub lessons_completed: usize,
    pub quizzes_passed: usize,
    pub start_date: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressRecord {
    pub progress: f64,
    pub completed: bool,
    pub lessons_completed: usize,
    pub quizzes_passed: usize,
    pub start_date: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MemberCourse {
    pub progress: f64,
    pub completed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Course {
    pub id: Uuid,
    pub title: String,
    pub permalink: String,
    pub enrolled_count: usize,
    pub completed_count: usize,
    pub total_progress: f64,
    pub completion_rate: f64,
    pub average_progress: f64,
    pub member_progress: BTreeMap<Uuid, ProgressRecord>,
}

impl Course {
    pub fn from_catalog(entry: CatalogEntry) -> Self {
        Self {
            id: entry.id,
            title: entry.title,
            permalink: entry.permalink,
            enrolled_count: 0,
            completed_count: 0,
            total_progress: 0.0,
            completion_rate: 0.0,
            average_progress: 0.0,
            member_progress: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Member {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub avatar_url: String,
    pub courses_started: usize,
    pub courses_completed: usize,
    pub overall_progress: f64,
    pub last_activity: String,
    pub courses: BTreeMap<Uuid, MemberCourse>,
}

impl Member {
    pub fn from_profile(profile: MemberProfile) -> Self {
        Self {
            id: profile.id,
            name: profile.name,
            email: profile.email,
            avatar_url: profile.avatar_url,
            courses_started: 0,
            courses_completed: 0,
            overall_progress: 0.0,
            last_activity: profile.last_activity,
            courses: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamSummary {
    pub id: Uuid,
    pub name: String,
    pub member_count: usize,
    pub total_courses: usize,
    pub average_completion: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TeamReport {
    pub team: TeamSummary,
    pub courses: Vec<Course>,
    pub members: Vec<Member>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TeamRole {
    Owner,
    Manager,
    Member,
}

impl TeamRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            TeamRole::Owner => "owner",
            TeamRole::Manager => "manager",
            TeamRole::Member => "member",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ManagedTeam {
    pub id: Uuid,
    pub name: String,
    pub role: String,
    pub member_count: i64,
}
