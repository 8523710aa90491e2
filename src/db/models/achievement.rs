use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An unlockable achievement. `achieved` only ever goes from false to true.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Achievement {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub achieved: bool,
    pub achieved_at: Option<DateTime<Utc>>,
}
