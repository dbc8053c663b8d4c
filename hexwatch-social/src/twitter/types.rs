use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// One tweet as returned by the hosted scraper.
///
/// ```
/// use hexwatch_social::twitter::TweetRecord;
///
/// let tw: TweetRecord = serde_json::from_str(r#"{
///     "username": "alice",
///     "tweet_id": 1790000000000000001,
///     "content": "gm",
///     "timestamp": "2025-03-01T12:00:00Z"
/// }"#).unwrap();
/// assert_eq!(tw.tweet_id, "1790000000000000001");
/// assert!(tw.metadata.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TweetRecord {
    pub username: String,
    #[serde(deserialize_with = "string_or_number")]
    pub tweet_id: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

// Snowflake ids show up as JSON numbers in some scraper builds.
fn string_or_number<'de, D>(de: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Str(String),
        Num(u64),
    }

    Ok(match Id::deserialize(de)? {
        Id::Str(s) => s,
        Id::Num(n) => n.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_metadata_when_present() {
        let tw: TweetRecord = serde_json::from_value(json!({
            "username": "bob",
            "tweet_id": "42",
            "content": "hello",
            "timestamp": "2025-01-02T03:04:05+00:00",
            "metadata": { "likes": 3 }
        }))
        .unwrap();
        assert_eq!(tw.tweet_id, "42");
        assert_eq!(tw.metadata, Some(json!({ "likes": 3 })));
        assert_eq!(tw.timestamp.to_rfc3339(), "2025-01-02T03:04:05+00:00");
    }

    #[test]
    fn rejects_missing_content() {
        let res: Result<TweetRecord, _> = serde_json::from_value(json!({
            "username": "bob",
            "tweet_id": "42",
            "timestamp": "2025-01-02T03:04:05Z"
        }));
        assert!(res.is_err());
    }
}
