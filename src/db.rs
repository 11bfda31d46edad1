use std::io::Read;
use std::path::Path;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use sqlx::{PgPool, Row};
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{CatalogEntry, ManagedTeam, RosterEntry, TeamInfo, TeamRole};
use crate::source::ProgressSource;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Postgres-backed view of teams, courses and learner progress.
#[derive(Debug, Clone)]
pub struct PgProgressSource {
    pool: PgPool,
}

impl PgProgressSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProgressSource for PgProgressSource {
    async fn find_team(&self, team_id: Uuid) -> anyhow::Result<Option<TeamInfo>> {
        let row = sqlx::query("SELECT id, name FROM team_progress.teams WHERE id = $1")
            .bind(team_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| TeamInfo {
            id: row.get("id"),
            name: row.get("name"),
        }))
    }

    async fn list_members(&self, team_id: Uuid) -> anyhow::Result<Vec<RosterEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT u.id, u.display_name, u.email
            FROM team_progress.team_members tm
            JOIN team_progress.users u ON u.id = tm.user_id
            WHERE tm.team_id = $1 AND tm.status = 'active'
            ORDER BY tm.joined_at, u.display_name
            "#,
        )
        .bind(team_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| RosterEntry {
                id: row.get("id"),
                display_name: row.get("display_name"),
                email: row.get("email"),
            })
            .collect())
    }

    async fn avatar_url(&self, member_id: Uuid) -> anyhow::Result<Option<String>> {
        let avatar: Option<Option<String>> =
            sqlx::query_scalar("SELECT avatar_url FROM team_progress.users WHERE id = $1")
                .bind(member_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(avatar.flatten())
    }

    async fn last_activity(&self, member_id: Uuid) -> anyhow::Result<Option<DateTime<Utc>>> {
        let at: Option<Option<DateTime<Utc>>> =
            sqlx::query_scalar("SELECT last_activity_at FROM team_progress.users WHERE id = $1")
                .bind(member_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(at.flatten())
    }

    async fn list_courses(&self) -> anyhow::Result<Vec<CatalogEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, title, permalink
            FROM team_progress.courses
            WHERE status = 'publish'
            ORDER BY created_at, title
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| CatalogEntry {
                id: row.get("id"),
                title: row.get("title"),
                permalink: row.get("permalink"),
            })
            .collect())
    }

    async fn has_started(&self, member_id: Uuid, course_id: Uuid) -> anyhow::Result<bool> {
        let started: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM team_progress.course_progress
                WHERE user_id = $1 AND course_id = $2
            )
            "#,
        )
        .bind(member_id)
        .bind(course_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(started)
    }

    async fn has_completed(&self, member_id: Uuid, course_id: Uuid) -> anyhow::Result<bool> {
        let completed: Option<bool> = sqlx::query_scalar(
            r#"
            SELECT completed FROM team_progress.course_progress
            WHERE user_id = $1 AND course_id = $2
            "#,
        )
        .bind(member_id)
        .bind(course_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(completed.unwrap_or(false))
    }

    async fn lessons_of(&self, course_id: Uuid) -> anyhow::Result<Vec<Uuid>> {
        let lessons: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT id FROM team_progress.lessons
            WHERE course_id = $1 AND status = 'publish'
            ORDER BY position, id
            "#,
        )
        .bind(course_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(lessons)
    }

    async fn lesson_completed(&self, member_id: Uuid, lesson_id: Uuid) -> anyhow::Result<bool> {
        let done: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM team_progress.lesson_completions
                WHERE user_id = $1 AND lesson_id = $2
            )
            "#,
        )
        .bind(member_id)
        .bind(lesson_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(done)
    }

    async fn quiz_of(&self, lesson_id: Uuid) -> anyhow::Result<Option<Uuid>> {
        let quiz: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM team_progress.quizzes WHERE lesson_id = $1")
                .bind(lesson_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(quiz)
    }

    async fn quiz_passed(&self, member_id: Uuid, quiz_id: Uuid) -> anyhow::Result<bool> {
        let passed: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM team_progress.quiz_passes
                WHERE user_id = $1 AND quiz_id = $2
            )
            "#,
        )
        .bind(member_id)
        .bind(quiz_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(passed)
    }

    async fn start_date(
        &self,
        member_id: Uuid,
        course_id: Uuid,
    ) -> anyhow::Result<Option<DateTime<Utc>>> {
        let at: Option<Option<DateTime<Utc>>> = sqlx::query_scalar(
            r#"
            SELECT started_at FROM team_progress.course_progress
            WHERE user_id = $1 AND course_id = $2
            "#,
        )
        .bind(member_id)
        .bind(course_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(at.flatten())
    }
}

/// Active teams in which the viewer is an owner or manager.
pub async fn managed_teams(pool: &PgPool, viewer_email: &str) -> anyhow::Result<Vec<ManagedTeam>> {
    let rows = sqlx::query(
        r#"
        SELECT t.id, t.name, tm.role,
               (SELECT COUNT(*) FROM team_progress.team_members m
                WHERE m.team_id = t.id AND m.status = 'active') AS member_count
        FROM team_progress.teams t
        JOIN team_progress.team_members tm ON tm.team_id = t.id
        JOIN team_progress.users u ON u.id = tm.user_id
        WHERE u.email = $1
          AND tm.role IN ('owner', 'manager')
          AND tm.status = 'active'
          AND t.status = 'active'
        ORDER BY t.name
        "#,
    )
    .bind(viewer_email)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| ManagedTeam {
            id: row.get("id"),
            name: row.get("name"),
            role: row.get("role"),
            member_count: row.get("member_count"),
        })
        .collect())
}

pub async fn can_manage_team(
    pool: &PgPool,
    viewer_email: &str,
    team_id: Uuid,
) -> anyhow::Result<bool> {
    let teams = managed_teams(pool, viewer_email).await?;
    Ok(teams.iter().any(|team| team.id == team_id))
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let team_id = Uuid::parse_str("6f1c2a9e-4b7d-4e21-9a5f-2d8e7c31b0a4")?;
    sqlx::query(
        r#"
        INSERT INTO team_progress.teams (id, name)
        VALUES ($1, $2)
        ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name
        "#,
    )
    .bind(team_id)
    .bind("Northwind Support")
    .execute(pool)
    .await?;

    let now = Utc::now();
    let users = vec![
        (
            Uuid::parse_str("3d7f5d6f-24f7-4e8e-8b4b-3e7e44b4a7b2")?,
            "Avery Lee",
            "avery.lee@northwind.example",
            TeamRole::Owner,
            Some(now - Duration::days(1)),
        ),
        (
            Uuid::parse_str("0c22f1f1-9184-4fd4-9b21-28c68a6a89dc")?,
            "Jules Moreno",
            "jules.moreno@northwind.example",
            TeamRole::Member,
            Some(now - Duration::days(6)),
        ),
        (
            Uuid::parse_str("d5a0a1a2-2a3c-44c2-8f73-60b7897a9dd2")?,
            "Kiara Patel",
            "kiara.patel@northwind.example",
            TeamRole::Member,
            None,
        ),
    ];

    let mut user_ids = Vec::with_capacity(users.len());
    for (id, name, email, role, last_activity) in &users {
        // an existing account keeps its id; memberships must point at that one
        let user_id: Uuid = sqlx::query(
            r#"
            INSERT INTO team_progress.users (id, display_name, email, last_activity_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (email) DO UPDATE
            SET display_name = EXCLUDED.display_name,
                last_activity_at = EXCLUDED.last_activity_at
            RETURNING id
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(email)
        .bind(last_activity)
        .fetch_one(pool)
        .await?
        .get("id");

        sqlx::query(
            r#"
            INSERT INTO team_progress.team_members (team_id, user_id, role)
            VALUES ($1, $2, $3)
            ON CONFLICT (team_id, user_id) DO UPDATE SET role = EXCLUDED.role
            "#,
        )
        .bind(team_id)
        .bind(user_id)
        .bind(role.as_str())
        .execute(pool)
        .await?;

        user_ids.push(user_id);
    }

    // (course id, title, permalink, [(lesson id, quiz id)])
    let courses = vec![
        (
            Uuid::parse_str("a1e4c7d0-5b2f-4c8a-9e31-7f6d2b0c4e15")?,
            "Customer Onboarding",
            "https://learn.northwind.example/courses/customer-onboarding",
            vec![
                ("b2f5d8e1-6c3a-4d9b-8f42-1a7e3c5d6f20", Some("c3a6e9f2-7d4b-4eac-9053-2b8f4d6e7a31")),
                ("b2f5d8e1-6c3a-4d9b-8f42-1a7e3c5d6f21", None),
                ("b2f5d8e1-6c3a-4d9b-8f42-1a7e3c5d6f22", Some("c3a6e9f2-7d4b-4eac-9053-2b8f4d6e7a32")),
                ("b2f5d8e1-6c3a-4d9b-8f42-1a7e3c5d6f23", None),
            ],
        ),
        (
            Uuid::parse_str("a1e4c7d0-5b2f-4c8a-9e31-7f6d2b0c4e16")?,
            "Escalation Handling",
            "https://learn.northwind.example/courses/escalation-handling",
            vec![
                ("b2f5d8e1-6c3a-4d9b-8f42-1a7e3c5d6f30", Some("c3a6e9f2-7d4b-4eac-9053-2b8f4d6e7a40")),
                ("b2f5d8e1-6c3a-4d9b-8f42-1a7e3c5d6f31", None),
            ],
        ),
        (
            Uuid::parse_str("a1e4c7d0-5b2f-4c8a-9e31-7f6d2b0c4e17")?,
            "Data Privacy Basics",
            "https://learn.northwind.example/courses/data-privacy-basics",
            vec![("b2f5d8e1-6c3a-4d9b-8f42-1a7e3c5d6f40", None)],
        ),
    ];

    for (position_base, (course_id, title, permalink, lessons)) in courses.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO team_progress.courses (id, title, permalink, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE
            SET title = EXCLUDED.title, permalink = EXCLUDED.permalink
            "#,
        )
        .bind(course_id)
        .bind(title)
        .bind(permalink)
        .bind(now - Duration::days(90 - position_base as i64))
        .execute(pool)
        .await?;

        for (position, (lesson_id, quiz_id)) in lessons.iter().enumerate() {
            let lesson_id = Uuid::parse_str(lesson_id)?;
            sqlx::query(
                r#"
                INSERT INTO team_progress.lessons (id, course_id, title, position)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (id) DO NOTHING
                "#,
            )
            .bind(lesson_id)
            .bind(course_id)
            .bind(format!("{title} - Lesson {}", position + 1))
            .bind(position as i32)
            .execute(pool)
            .await?;

            if let Some(quiz_id) = quiz_id {
                sqlx::query(
                    r#"
                    INSERT INTO team_progress.quizzes (id, lesson_id)
                    VALUES ($1, $2)
                    ON CONFLICT (id) DO NOTHING
                    "#,
                )
                .bind(Uuid::parse_str(quiz_id)?)
                .bind(lesson_id)
                .execute(pool)
                .await?;
            }
        }
    }

    let (avery, jules, kiara) = (user_ids[0], user_ids[1], user_ids[2]);
    let (onboarding, escalation) = (courses[0].0, courses[1].0);
    // (user, course, days since start, completed, lessons done, quizzes passed)
    let progress: Vec<(Uuid, Uuid, i64, bool, Vec<&str>, Vec<&str>)> = vec![
        (
            avery,
            onboarding,
            40,
            true,
            vec![
                "b2f5d8e1-6c3a-4d9b-8f42-1a7e3c5d6f20",
                "b2f5d8e1-6c3a-4d9b-8f42-1a7e3c5d6f21",
                "b2f5d8e1-6c3a-4d9b-8f42-1a7e3c5d6f22",
                "b2f5d8e1-6c3a-4d9b-8f42-1a7e3c5d6f23",
            ],
            vec![
                "c3a6e9f2-7d4b-4eac-9053-2b8f4d6e7a31",
                "c3a6e9f2-7d4b-4eac-9053-2b8f4d6e7a32",
            ],
        ),
        (
            avery,
            escalation,
            12,
            false,
            vec!["b2f5d8e1-6c3a-4d9b-8f42-1a7e3c5d6f30"],
            vec!["c3a6e9f2-7d4b-4eac-9053-2b8f4d6e7a40"],
        ),
        (
            jules,
            onboarding,
            20,
            false,
            vec![
                "b2f5d8e1-6c3a-4d9b-8f42-1a7e3c5d6f20",
                "b2f5d8e1-6c3a-4d9b-8f42-1a7e3c5d6f21",
            ],
            vec!["c3a6e9f2-7d4b-4eac-9053-2b8f4d6e7a31"],
        ),
        (kiara, onboarding, 3, false, vec![], vec![]),
    ];

    for (user_id, course_id, days_ago, completed, lessons, quizzes) in progress {
        sqlx::query(
            r#"
            INSERT INTO team_progress.course_progress (user_id, course_id, started_at, completed)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, course_id) DO UPDATE
            SET started_at = EXCLUDED.started_at, completed = EXCLUDED.completed
            "#,
        )
        .bind(user_id)
        .bind(course_id)
        .bind(now - Duration::days(days_ago))
        .bind(completed)
        .execute(pool)
        .await?;

        for lesson_id in lessons {
            sqlx::query(
                r#"
                INSERT INTO team_progress.lesson_completions (user_id, lesson_id)
                VALUES ($1, $2)
                ON CONFLICT (user_id, lesson_id) DO NOTHING
                "#,
            )
            .bind(user_id)
            .bind(Uuid::parse_str(lesson_id)?)
            .execute(pool)
            .await?;
        }

        for quiz_id in quizzes {
            sqlx::query(
                r#"
                INSERT INTO team_progress.quiz_passes (user_id, quiz_id)
                VALUES ($1, $2)
                ON CONFLICT (user_id, quiz_id) DO NOTHING
                "#,
            )
            .bind(user_id)
            .bind(Uuid::parse_str(quiz_id)?)
            .execute(pool)
            .await?;
        }
    }

    info!(%team_id, "seeded sample team");
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RosterRow {
    pub team_name: String,
    pub full_name: String,
    pub email: String,
    pub role: TeamRole,
}

pub fn parse_roster<R: Read>(reader: R) -> anyhow::Result<Vec<RosterRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut rows = Vec::new();

    for (index, result) in reader.deserialize::<RosterRow>().enumerate() {
        // header is line 1
        let row = result.with_context(|| format!("invalid roster row on line {}", index + 2))?;
        if row.email.is_empty() || row.team_name.is_empty() {
            anyhow::bail!("roster row on line {} is missing team or email", index + 2);
        }
        rows.push(row);
    }

    Ok(rows)
}

pub async fn import_roster(pool: &PgPool, csv_path: &Path) -> anyhow::Result<usize> {
    let file = std::fs::File::open(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let rows = parse_roster(file)?;
    let mut inserted = 0usize;

    for row in rows {
        let team_id: Uuid = sqlx::query(
            r#"
            INSERT INTO team_progress.teams (id, name)
            VALUES ($1, $2)
            ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&row.team_name)
        .fetch_one(pool)
        .await?
        .get("id");

        let user_id: Uuid = sqlx::query(
            r#"
            INSERT INTO team_progress.users (id, display_name, email)
            VALUES ($1, $2, $3)
            ON CONFLICT (email) DO UPDATE SET display_name = EXCLUDED.display_name
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&row.full_name)
        .bind(&row.email)
        .fetch_one(pool)
        .await?
        .get("id");

        let result = sqlx::query(
            r#"
            INSERT INTO team_progress.team_members (team_id, user_id, role)
            VALUES ($1, $2, $3)
            ON CONFLICT (team_id, user_id) DO NOTHING
            "#,
        )
        .bind(team_id)
        .bind(user_id)
        .bind(row.role.as_str())
        .execute(pool)
        .await?;

        if result.rows_affected() > 0 {
            inserted += 1;
        } else {
            debug!(email = %row.email, team = %row.team_name, "membership already present");
        }
    }

    Ok(inserted)
}
