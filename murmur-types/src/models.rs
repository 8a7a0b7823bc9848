use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::enums::{ReactionType, Visibility};

// Custom serde module for DateTime to ensure RFC3339 string format
mod datetime_format {
    use chrono::{DateTime, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&date.to_rfc3339())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse::<DateTime<Utc>>().map_err(serde::de::Error::custom)
    }
}

/// Anything the client keeps in an id-keyed collection
pub trait Identified {
    fn id(&self) -> Uuid;
}

/// A post, comment or reply: each carries its own reaction counts and the
/// viewer's current selection.
pub trait Reactable {
    fn react_counts(&self) -> &ReactCounts;
    fn react_counts_mut(&mut self) -> &mut ReactCounts;
    fn my_reaction(&self) -> Option<ReactionType>;
    fn set_my_reaction(&mut self, reaction: Option<ReactionType>);
}

/// Per-type reaction counts. Serialized as `{ "like": 3, "love": 1 }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReactCounts(BTreeMap<ReactionType, u32>);

impl ReactCounts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count for one type; absent types count as zero
    pub fn get(&self, reaction: ReactionType) -> u32 {
        self.0.get(&reaction).copied().unwrap_or(0)
    }

    pub fn set(&mut self, reaction: ReactionType, count: u32) {
        self.0.insert(reaction, count);
    }

    pub fn total(&self) -> u64 {
        self.0.values().map(|&c| u64::from(c)).sum()
    }

    /// The `n` most used reaction types with a non-zero count, highest first
    pub fn top(&self, n: usize) -> Vec<(ReactionType, u32)> {
        let mut entries: Vec<_> = self
            .0
            .iter()
            .filter(|(_, &count)| count > 0)
            .map(|(&reaction, &count)| (reaction, count))
            .collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        entries.truncate(n);
        entries
    }

    pub fn iter(&self) -> impl Iterator<Item = (ReactionType, u32)> + '_ {
        self.0.iter().map(|(&reaction, &count)| (reaction, count))
    }
}

impl<const N: usize> From<[(ReactionType, u32); N]> for ReactCounts {
    fn from(entries: [(ReactionType, u32); N]) -> Self {
        Self(BTreeMap::from(entries))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub author_id: Uuid,
    pub author_username: String,
    #[serde(default)]
    pub author_avatar: Option<String>,
    pub content: String,
    #[serde(default)]
    pub tagged_users: Vec<Uuid>,
    /// Media URLs in display order
    #[serde(default)]
    pub media: Vec<String>,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub react_counts: ReactCounts,
    /// Viewer's reaction (if authenticated)
    #[serde(default)]
    pub my_reaction: Option<ReactionType>,
    #[serde(default)]
    pub comment_count: u32,
    #[serde(default)]
    pub share_count: u32,
    #[serde(default)]
    pub is_saved: bool,
    #[serde(default)]
    pub is_edited: bool,
    #[serde(with = "datetime_format")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub post_id: Uuid,
    pub author_id: Uuid,
    #[serde(default)]
    pub author_username: String,
    pub content: String,
    #[serde(default)]
    pub tagged_users: Vec<Uuid>,
    #[serde(with = "datetime_format")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub react_counts: ReactCounts,
    #[serde(default)]
    pub my_reaction: Option<ReactionType>,
    /// Number of replies under this comment
    #[serde(default)]
    pub reply_count: u32,
    #[serde(default)]
    pub is_edited: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    pub id: Uuid,
    /// Parent comment
    pub comment_id: Uuid,
    pub author_id: Uuid,
    #[serde(default)]
    pub author_username: String,
    pub content: String,
    #[serde(default)]
    pub tagged_users: Vec<Uuid>,
    #[serde(with = "datetime_format")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub react_counts: ReactCounts,
    #[serde(default)]
    pub my_reaction: Option<ReactionType>,
    #[serde(default)]
    pub is_edited: bool,
}

macro_rules! impl_entity {
    ($($ty:ty),*) => {
        $(
            impl Identified for $ty {
                fn id(&self) -> Uuid {
                    self.id
                }
            }

            impl Reactable for $ty {
                fn react_counts(&self) -> &ReactCounts {
                    &self.react_counts
                }

                fn react_counts_mut(&mut self) -> &mut ReactCounts {
                    &mut self.react_counts
                }

                fn my_reaction(&self) -> Option<ReactionType> {
                    self.my_reaction
                }

                fn set_my_reaction(&mut self, reaction: Option<ReactionType>) {
                    self.my_reaction = reaction;
                }
            }
        )*
    };
}

impl_entity!(Post, Comment, Reply);

// Request/Response types for API

/// Body for creating or editing a comment or reply
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentRequest {
    pub content: String,
    #[serde(default)]
    pub tagged_users: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdatePostRequest {
    pub content: String,
    #[serde(default)]
    pub tagged_users: Vec<Uuid>,
    #[serde(default)]
    pub media: Vec<String>,
    #[serde(default)]
    pub visibility: Visibility,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SharePostRequest {
    /// Optional caption on the shared copy
    pub content: Option<String>,
    #[serde(default)]
    pub visibility: Visibility,
}

/// Reaction change sent to the server: the added type maps to 1, the removed
/// type maps to 0, e.g. `{ "love": 1, "like": 0 }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReactRequest(BTreeMap<ReactionType, u8>);

impl ReactRequest {
    pub fn new(added: Option<ReactionType>, removed: Option<ReactionType>) -> Self {
        let mut body = BTreeMap::new();
        if let Some(reaction) = removed {
            body.insert(reaction, 0);
        }
        if let Some(reaction) = added {
            body.insert(reaction, 1);
        }
        Self(body)
    }

    pub fn added(&self) -> Option<ReactionType> {
        self.0.iter().find(|(_, &v)| v == 1).map(|(&r, _)| r)
    }

    pub fn removed(&self) -> Option<ReactionType> {
        self.0.iter().find(|(_, &v)| v == 0).map(|(&r, _)| r)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub details: Option<String>,
}
