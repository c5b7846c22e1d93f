use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Urgency::Low => write!(f, "low"),
            Urgency::Normal => write!(f, "normal"),
            Urgency::High => write!(f, "high"),
            Urgency::Urgent => write!(f, "urgent"),
        }
    }
}

impl FromStr for Urgency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Urgency::Low),
            "normal" => Ok(Urgency::Normal),
            "high" => Ok(Urgency::High),
            "urgent" => Ok(Urgency::Urgent),
            other => Err(format!(
                "unknown urgency '{}', expected low, normal, high or urgent",
                other
            )),
        }
    }
}

/// Lifecycle of a video request: `pending -> accepted -> ended`.
///
/// The service reports a live call as `active` and a finished one as
/// `completed`; rejected, expired and cancelled requests are terminal too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    #[default]
    Pending,
    #[serde(alias = "active")]
    Accepted,
    #[serde(
        alias = "completed",
        alias = "cancelled",
        alias = "rejected",
        alias = "expired"
    )]
    Ended,
}

impl RequestStatus {
    fn rank(self) -> u8 {
        match self {
            RequestStatus::Pending => 0,
            RequestStatus::Accepted => 1,
            RequestStatus::Ended => 2,
        }
    }

    /// Client-driven transitions move exactly one step forward.
    pub fn can_transition_to(self, next: RequestStatus) -> bool {
        matches!(
            (self, next),
            (RequestStatus::Pending, RequestStatus::Accepted)
                | (RequestStatus::Accepted, RequestStatus::Ended)
        )
    }

    /// True when `next` is not behind `self`. Server facts may skip ahead
    /// (a rejected request ends while pending) but never move back.
    pub fn is_forward(self, next: RequestStatus) -> bool {
        next.rank() >= self.rank()
    }

    pub fn is_terminal(self) -> bool {
        self == RequestStatus::Ended
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestStatus::Pending => write!(f, "pending"),
            RequestStatus::Accepted => write!(f, "accepted"),
            RequestStatus::Ended => write!(f, "ended"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoRequest {
    #[serde(alias = "_id")]
    pub id: String,

    #[serde(alias = "farmer_id")]
    pub requester_id: String,

    #[serde(alias = "farmer_name", default)]
    pub requester_name: String,

    #[serde(alias = "specialist_id", default)]
    pub responder_id: Option<String>,

    #[serde(alias = "specialist_name", default)]
    pub responder_name: Option<String>,

    pub topic: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub urgency: Urgency,

    #[serde(default)]
    pub status: RequestStatus,

    #[serde(with = "timestamp", default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl VideoRequest {
    pub fn is_pending(&self) -> bool {
        self.status == RequestStatus::Pending
    }

    pub fn is_accepted(&self) -> bool {
        self.status == RequestStatus::Accepted
    }
}

/// A specialist listed by the directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Responder {
    #[serde(alias = "_id")]
    pub id: String,

    pub name: String,

    #[serde(default)]
    pub specialization: Option<String>,

    #[serde(default)]
    pub experience_years: Option<u32>,

    #[serde(default)]
    pub average_rating: Option<f64>,

    #[serde(default)]
    pub is_online: bool,
}

/// A call the service already considers live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveCall {
    #[serde(alias = "_id")]
    pub id: String,

    #[serde(default)]
    pub room_id: Option<String>,

    #[serde(alias = "farmer_id", default)]
    pub requester_id: String,

    #[serde(alias = "farmer_name", default)]
    pub requester_name: String,

    #[serde(alias = "specialist_id", default)]
    pub responder_id: Option<String>,

    #[serde(alias = "specialist_name", default)]
    pub responder_name: Option<String>,

    #[serde(default)]
    pub topic: Option<String>,

    #[serde(with = "timestamp::option", default)]
    pub started_at: Option<DateTime<Utc>>,
}
