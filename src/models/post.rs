use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use lazy_static::lazy_static;
use log::warn;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::error::AppError;
use crate::store::KeyValueStore;

pub const POST_KEY_PREFIX: &str = "post:";
/// List of post ids, newest first.
pub const POSTS_LIST_KEY: &str = "posts:list";

lazy_static! {
    // Tags: letters, digits, underscores, hyphens
    static ref TAG_REGEX: Regex = Regex::new(r"^[a-zA-Z0-9_-]{1,32}$").unwrap();
}

fn validate_tags(tags: &[String]) -> Result<(), ValidationError> {
    if tags.len() > 10 {
        return Err(ValidationError::new("too_many_tags"));
    }
    if tags.iter().any(|tag| !TAG_REGEX.is_match(tag)) {
        return Err(ValidationError::new("invalid_tag"));
    }
    Ok(())
}

/// Input structure for creating a post.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct PostInput {
    /// Must be between 1 and 200 characters.
    #[validate(length(min = 1, max = 200, message = "Title is required"))]
    pub title: String,

    #[validate(length(min = 1, message = "Content is required"))]
    pub content: String,

    /// Optional tags, each alphanumeric with `_` or `-`, at most 10.
    #[serde(default)]
    #[validate(custom = "validate_tags")]
    pub tags: Vec<String>,
}

/// A blog post, stored as a hash at `post:{id}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Post {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    /// Email of the author.
    pub author: String,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

pub fn post_key(id: &Uuid) -> String {
    format!("{}{}", POST_KEY_PREFIX, id)
}

impl Post {
    pub fn new(input: PostInput, author: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: input.title.trim().to_string(),
            content: input.content,
            author: author.to_string(),
            tags: input.tags,
            created_at: Utc::now(),
        }
    }

    fn to_fields(&self) -> Result<Vec<(String, String)>, AppError> {
        Ok(vec![
            ("title".to_string(), self.title.clone()),
            ("content".to_string(), self.content.clone()),
            ("author".to_string(), self.author.clone()),
            ("tags".to_string(), serde_json::to_string(&self.tags)?),
            ("created_at".to_string(), self.created_at.to_rfc3339()),
        ])
    }

    fn from_fields(id: Uuid, mut fields: HashMap<String, String>) -> Result<Self, String> {
        let mut take = |name: &str| {
            fields
                .remove(name)
                .ok_or_else(|| format!("missing field {}", name))
        };
        let title = take("title")?;
        let content = take("content")?;
        let author = take("author")?;
        let created_at = DateTime::parse_from_rfc3339(&take("created_at")?)
            .map_err(|e| format!("bad created_at: {}", e))?
            .with_timezone(&Utc);
        let tags = match fields.remove("tags") {
            Some(raw) => serde_json::from_str(&raw).map_err(|e| format!("bad tags: {}", e))?,
            None => Vec::new(),
        };
        Ok(Self {
            id,
            title,
            content,
            author,
            tags,
            created_at,
        })
    }

    /// Case-insensitive match against the title, the content, or any tag.
    pub fn matches(&self, query: &str) -> bool {
        let query = query.to_lowercase();
        self.title.to_lowercase().contains(&query)
            || self.content.to_lowercase().contains(&query)
            || self.tags.iter().any(|tag| tag.to_lowercase().contains(&query))
    }

    /// Writes the post hash and pushes its id onto the front of `posts:list`.
    pub async fn save(&self, store: &dyn KeyValueStore) -> Result<(), AppError> {
        store.hash_set(&post_key(&self.id), &self.to_fields()?).await?;
        store.list_push(POSTS_LIST_KEY, &self.id.to_string()).await?;
        Ok(())
    }

    /// Loads one post. Missing or unreadable records yield `None`; the latter is logged.
    pub async fn load(store: &dyn KeyValueStore, id: Uuid) -> Result<Option<Self>, AppError> {
        let fields = store.hash_get_all(&post_key(&id)).await?;
        if fields.is_empty() {
            return Ok(None);
        }
        match Self::from_fields(id, fields) {
            Ok(post) => Ok(Some(post)),
            Err(reason) => {
                warn!("Skipping unreadable post {}: {}", id, reason);
                Ok(None)
            }
        }
    }

    async fn load_many(store: &dyn KeyValueStore, ids: Vec<String>) -> Result<Vec<Self>, AppError> {
        let ids: Vec<Uuid> = ids
            .iter()
            .filter_map(|id| match Uuid::parse_str(id) {
                Ok(id) => Some(id),
                Err(_) => {
                    warn!("Ignoring malformed post id: {}", id);
                    None
                }
            })
            .collect();
        let posts = try_join_all(ids.into_iter().map(|id| Self::load(store, id))).await?;
        Ok(posts.into_iter().flatten().collect())
    }

    /// The `count` most recently created posts, newest first.
    pub async fn latest(store: &dyn KeyValueStore, count: usize) -> Result<Vec<Self>, AppError> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let ids = store
            .list_range(POSTS_LIST_KEY, 0, count as isize - 1)
            .await?;
        Self::load_many(store, ids).await
    }

    /// Every post referenced by `posts:list`, newest first.
    pub async fn all_listed(store: &dyn KeyValueStore) -> Result<Vec<Self>, AppError> {
        let ids = store.list_range(POSTS_LIST_KEY, 0, -1).await?;
        Self::load_many(store, ids).await
    }

    /// Every post found by scanning the `post:` key namespace, newest first.
    pub async fn all_by_key(store: &dyn KeyValueStore) -> Result<Vec<Self>, AppError> {
        let ids = store
            .keys_with_prefix(POST_KEY_PREFIX)
            .await?
            .into_iter()
            .filter_map(|key| key.strip_prefix(POST_KEY_PREFIX).map(str::to_string))
            .collect();
        let mut posts = Self::load_many(store, ids).await?;
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(posts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn input(title: &str, content: &str, tags: &[&str]) -> PostInput {
        PostInput {
            title: title.to_string(),
            content: content.to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[test]
    fn test_post_input_validation() {
        assert!(input("Valid", "Body", &["rust", "web-dev"]).validate().is_ok());
        assert!(input("", "Body", &[]).validate().is_err());
        assert!(input("Title", "", &[]).validate().is_err());
        assert!(input(&"a".repeat(201), "Body", &[]).validate().is_err());
        assert!(input("Title", "Body", &["has space"]).validate().is_err());
    }

    #[test]
    fn test_matches_is_case_insensitive() {
        let post = Post::new(
            input("Async Rust", "Futures and executors", &["Tokio"]),
            "a@example.com",
        );
        assert!(post.matches("rust"));
        assert!(post.matches("EXECUTORS"));
        assert!(post.matches("tok"));
        assert!(!post.matches("python"));
    }

    #[tokio::test]
    async fn test_save_and_load_roundtrip() {
        let store = MemoryStore::new();
        let post = Post::new(input("Hello", "World", &["intro"]), "a@example.com");
        post.save(&store).await.unwrap();

        let loaded = Post::load(&store, post.id).await.unwrap().unwrap();
        assert_eq!(loaded.title, "Hello");
        assert_eq!(loaded.tags, vec!["intro"]);
        assert_eq!(loaded.created_at.timestamp_millis(), post.created_at.timestamp_millis());
        assert!(Post::load(&store, Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_latest_returns_newest_first() {
        let store = MemoryStore::new();
        for n in 0..8 {
            Post::new(input(&format!("Post {}", n), "Body", &[]), "a@example.com")
                .save(&store)
                .await
                .unwrap();
        }

        let latest = Post::latest(&store, 6).await.unwrap();
        let titles: Vec<&str> = latest.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["Post 7", "Post 6", "Post 5", "Post 4", "Post 3", "Post 2"]);
        assert_eq!(Post::all_listed(&store).await.unwrap().len(), 8);
        assert_eq!(Post::all_by_key(&store).await.unwrap().len(), 8);
    }

    #[tokio::test]
    async fn test_unreadable_post_is_skipped() {
        let store = MemoryStore::new();
        let id = Uuid::new_v4();
        store
            .hash_set(&post_key(&id), &[("title".to_string(), "Only a title".to_string())])
            .await
            .unwrap();
        store.list_push(POSTS_LIST_KEY, &id.to_string()).await.unwrap();

        assert!(Post::all_listed(&store).await.unwrap().is_empty());
    }
}
