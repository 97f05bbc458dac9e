use chrono::{DateTime, NaiveDate, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub struct MaterialRecord {
    pub id: String,
    pub owner_id: Uuid,
    pub title: String,
    pub category: String,
    pub school: String,
    pub course: String,
    pub views: i64,
    pub downloads: i64,
    pub diamonds: i64,
    pub earnings: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TimeRange {
    #[value(name = "7d")]
    Last7Days,
    #[value(name = "30d")]
    Last30Days,
    #[value(name = "90d")]
    Last90Days,
    #[value(name = "all")]
    AllTime,
}

impl TimeRange {
    pub fn cutoff_days(self) -> Option<i64> {
        match self {
            TimeRange::Last7Days => Some(7),
            TimeRange::Last30Days => Some(30),
            TimeRange::Last90Days => Some(90),
            TimeRange::AllTime => None,
        }
    }

    // All-time charts still use a 90-day window.
    pub fn bucket_count(self) -> usize {
        match self {
            TimeRange::Last7Days => 7,
            TimeRange::Last30Days => 30,
            TimeRange::Last90Days | TimeRange::AllTime => 90,
        }
    }

    pub fn slug(self) -> &'static str {
        match self {
            TimeRange::Last7Days => "7d",
            TimeRange::Last30Days => "30d",
            TimeRange::Last90Days => "90d",
            TimeRange::AllTime => "all",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SummaryStats {
    pub materials: usize,
    pub diamonds: i64,
    pub earnings: f64,
    pub views: i64,
    pub downloads: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SeriesBucket {
    pub day: NaiveDate,
    pub label: String,
    pub diamonds: i64,
    pub earnings: f64,
}

#[derive(Debug, Clone)]
pub enum MaterialDelta {
    Inserted(MaterialRecord),
    Updated(MaterialRecord),
    Deleted(String),
}

impl MaterialDelta {
    pub fn record_id(&self) -> &str {
        match self {
            MaterialDelta::Inserted(record) | MaterialDelta::Updated(record) => &record.id,
            MaterialDelta::Deleted(id) => id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: Uuid,
    pub display_name: String,
    pub email: String,
    pub school: String,
    pub course: String,
}
