use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{CatalogEntry, RosterEntry, TeamInfo};

/// Read-only view of the platform's teams, catalog and learner progress.
#[async_trait]
pub trait ProgressSource: Send + Sync {
    async fn find_team(&self, team_id: Uuid) -> anyhow::Result<Option<TeamInfo>>;
    async fn list_members(&self, team_id: Uuid) -> anyhow::Result<Vec<RosterEntry>>;
    async fn avatar_url(&self, member_id: Uuid) -> anyhow::Result<Option<String>>;
    async fn last_activity(&self, member_id: Uuid) -> anyhow::Result<Option<DateTime<Utc>>>;
    async fn list_courses(&self) -> anyhow::Result<Vec<CatalogEntry>>;
    async fn has_started(&self, member_id: Uuid, course_id: Uuid) -> anyhow::Result<bool>;
    async fn has_completed(&self, member_id: Uuid, course_id: Uuid) -> anyhow::Result<bool>;
    async fn lessons_of(&self, course_id: Uuid) -> anyhow::Result<Vec<Uuid>>;
    async fn lesson_completed(&self, member_id: Uuid, lesson_id: Uuid) -> anyhow::Result<bool>;
    async fn quiz_of(&self, lesson_id: Uuid) -> anyhow::Result<Option<Uuid>>;
    async fn quiz_passed(&self, member_id: Uuid, quiz_id: Uuid) -> anyhow::Result<bool>;
    async fn start_date(
        &self,
        member_id: Uuid,
        course_id: Uuid,
    ) -> anyhow::Result<Option<DateTime<Utc>>>;
}

/// Names the collaborator capability behind a failed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dependency {
    FindTeam,
    ListMembers,
    AvatarUrl,
    LastActivity,
    ListCourses,
    HasStarted,
    HasCompleted,
    LessonsOf,
    LessonCompleted,
    QuizOf,
    QuizPassed,
    StartDate,
}

impl Dependency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dependency::FindTeam => "find_team",
            Dependency::ListMembers => "list_members",
            Dependency::AvatarUrl => "avatar_url",
            Dependency::LastActivity => "last_activity",
            Dependency::ListCourses => "list_courses",
            Dependency::HasStarted => "has_started",
            Dependency::HasCompleted => "has_completed",
            Dependency::LessonsOf => "lessons_of",
            Dependency::LessonCompleted => "lesson_completed",
            Dependency::QuizOf => "quiz_of",
            Dependency::QuizPassed => "quiz_passed",
            Dependency::StartDate => "start_date",
        }
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
