use std::fmt::Write;

use anyhow::bail;
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Utc};
use clap::Args;

pub const DEFAULT_DATE_FORMAT: &str = "%B %-d, %Y";
pub const DEFAULT_NO_ACTIVITY_LABEL: &str = "No activity";
pub const DEFAULT_AVATAR_URL: &str = "https://www.gravatar.com/avatar/?d=mp";

/// Display options applied while assembling a report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportSettings {
    pub date_format: String,
    pub no_activity_label: String,
    pub default_avatar_url: String,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            no_activity_label: DEFAULT_NO_ACTIVITY_LABEL.to_string(),
            default_avatar_url: DEFAULT_AVATAR_URL.to_string(),
        }
    }
}

impl ReportSettings {
    /// Formats with the configured pattern. Settings built from CLI input
    /// are validated up front; an invalid pattern here yields an empty label.
    pub fn format_date(&self, at: DateTime<Utc>) -> String {
        let mut label = String::new();
        if write!(label, "{}", at.format(&self.date_format)).is_err() {
            return String::new();
        }
        label
    }

    pub fn last_activity_label(&self, at: Option<DateTime<Utc>>) -> String {
        match at {
            Some(at) => self.format_date(at),
            None => self.no_activity_label.clone(),
        }
    }

    pub fn start_date_label(&self, at: Option<DateTime<Utc>>) -> String {
        at.map(|at| self.format_date(at)).unwrap_or_default()
    }

    pub fn avatar_or_default(&self, avatar_url: Option<String>) -> String {
        avatar_url
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| self.default_avatar_url.clone())
    }
}

#[derive(Debug, Clone, Args)]
pub struct DisplayArgs {
    /// chrono format string for activity and start dates
    #[arg(long, env = "TEAM_PROGRESS_DATE_FORMAT", default_value = DEFAULT_DATE_FORMAT)]
    pub date_format: String,
    /// Label shown for members without recorded activity
    #[arg(long, env = "TEAM_PROGRESS_NO_ACTIVITY_LABEL", default_value = DEFAULT_NO_ACTIVITY_LABEL)]
    pub no_activity_label: String,
    /// Avatar used when a member has none stored
    #[arg(long, env = "TEAM_PROGRESS_DEFAULT_AVATAR_URL", default_value = DEFAULT_AVATAR_URL)]
    pub default_avatar_url: String,
}

pub fn validate_date_format(format: &str) -> anyhow::Result<()> {
    if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        bail!("invalid date format {format:?}");
    }
    Ok(())
}

impl TryFrom<DisplayArgs> for ReportSettings {
    type Error = anyhow::Error;

    fn try_from(args: DisplayArgs) -> anyhow::Result<Self> {
        validate_date_format(&args.date_format)?;
        Ok(Self {
            date_format: args.date_format,
            no_activity_label: args.no_activity_label,
            default_avatar_url: args.default_avatar_url,
        })
    }
}
