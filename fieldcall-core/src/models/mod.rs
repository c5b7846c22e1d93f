mod chat;
mod identity;
mod notification;
mod request;
mod session;

pub use chat::{ChatSession, Delivery, Message};
pub use identity::{Counterpart, Identity, Role};
pub use notification::{Notification, NotificationAction, NotificationKind};
pub use request::{ActiveCall, RequestStatus, Responder, Urgency, VideoRequest};
pub use session::{
    format_call_time, ConnectionState, LocalMedia, NegotiationState, Session, SessionKind,
    SessionState,
};

/// Timestamps from the consultation service are naive UTC
/// (`2024-03-01T10:15:00.123456`); RFC 3339 is accepted as well.
pub(crate) mod timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
            return Some(ts.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
            .ok()
            .map(|naive| naive.and_utc())
    }

    pub fn serialize<S>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&ts.to_rfc3339())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| de::Error::custom(format!("invalid timestamp '{}'", raw)))
    }

    pub mod option {
        use chrono::{DateTime, Utc};
        use serde::{de, Deserialize, Deserializer, Serializer};

        pub fn serialize<S>(ts: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match ts {
                Some(ts) => serializer.serialize_some(&ts.to_rfc3339()),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
        where
            D: Deserializer<'de>,
        {
            match Option::<String>::deserialize(deserializer)? {
                Some(raw) => super::parse(&raw)
                    .map(Some)
                    .ok_or_else(|| de::Error::custom(format!("invalid timestamp '{}'", raw))),
                None => Ok(None),
            }
        }
    }
}
