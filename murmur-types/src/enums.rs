use serde::{Deserialize, Serialize};

/// The closed set of reactions a viewer can leave on a post, comment or reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactionType {
    Like,
    Love,
    Haha,
    Wow,
    Sad,
    Angry,
}

/// Display metadata for a reaction type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReactionMeta {
    pub emoji: &'static str,
    pub label: &'static str,
}

impl ReactionType {
    pub const ALL: [ReactionType; 6] = [
        ReactionType::Like,
        ReactionType::Love,
        ReactionType::Haha,
        ReactionType::Wow,
        ReactionType::Sad,
        ReactionType::Angry,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReactionType::Like => "like",
            ReactionType::Love => "love",
            ReactionType::Haha => "haha",
            ReactionType::Wow => "wow",
            ReactionType::Sad => "sad",
            ReactionType::Angry => "angry",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "like" => Some(ReactionType::Like),
            "love" => Some(ReactionType::Love),
            "haha" => Some(ReactionType::Haha),
            "wow" => Some(ReactionType::Wow),
            "sad" => Some(ReactionType::Sad),
            "angry" => Some(ReactionType::Angry),
            _ => None,
        }
    }

    pub fn meta(&self) -> ReactionMeta {
        match self {
            ReactionType::Like => ReactionMeta { emoji: "👍", label: "Like" },
            ReactionType::Love => ReactionMeta { emoji: "❤️", label: "Love" },
            ReactionType::Haha => ReactionMeta { emoji: "😆", label: "Haha" },
            ReactionType::Wow => ReactionMeta { emoji: "😮", label: "Wow" },
            ReactionType::Sad => ReactionMeta { emoji: "😢", label: "Sad" },
            ReactionType::Angry => ReactionMeta { emoji: "😡", label: "Angry" },
        }
    }
}

/// Who can see a post
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Friends,
    Private,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Friends => "friends",
            Visibility::Private => "private",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "public" => Some(Visibility::Public),
            "friends" => Some(Visibility::Friends),
            "private" => Some(Visibility::Private),
            _ => None,
        }
    }
}

/// Kind of entity a reaction is applied to, used in the react endpoint path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Post,
    Comment,
    Reply,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Post => "post",
            EntityKind::Comment => "comment",
            EntityKind::Reply => "reply",
        }
    }
}
