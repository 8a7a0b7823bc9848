// Integration tests: a post store driven against a stateful in-memory server
use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use murmur::api::{ApiError, ApiResult, FeedBackend};
use murmur::store::{PageOutcome, PostStore, ReactionTarget, StoreOptions};
use murmur_types::*;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Server-side state for one post. Pages are sliced from the live list, so
/// deleting an item shifts everything after it forward.
struct InMemoryServer {
    post: Mutex<Post>,
    comments: Mutex<Vec<Comment>>,
    replies: Mutex<HashMap<Uuid, Vec<Reply>>>,
    reactions: Mutex<HashMap<Uuid, Option<ReactionType>>>,
}

fn page_of<T: Clone>(items: &[T], page: u32, size: u32) -> Vec<T> {
    let start = ((page - 1) * size) as usize;
    items.iter().skip(start).take(size as usize).cloned().collect()
}

impl InMemoryServer {
    fn new(comment_count: usize) -> Self {
        let base = Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap();
        let post_id = Uuid::new_v4();
        let comments: Vec<Comment> = (0..comment_count)
            .map(|n| Comment {
                id: Uuid::new_v4(),
                post_id,
                author_id: Uuid::new_v4(),
                author_username: format!("user{}", n),
                content: format!("comment #{}", n),
                tagged_users: Vec::new(),
                created_at: base - Duration::minutes(n as i64),
                react_counts: ReactCounts::new(),
                my_reaction: None,
                reply_count: 0,
                is_edited: false,
            })
            .collect();
        let post = Post {
            id: post_id,
            author_id: Uuid::new_v4(),
            author_username: "host".to_string(),
            author_avatar: None,
            content: "what do you think?".to_string(),
            tagged_users: Vec::new(),
            media: Vec::new(),
            visibility: Visibility::Public,
            react_counts: ReactCounts::from([(ReactionType::Like, 2)]),
            my_reaction: None,
            comment_count: comments.len() as u32,
            share_count: 0,
            is_saved: false,
            is_edited: false,
            created_at: base - Duration::hours(1),
        };
        Self {
            post: Mutex::new(post),
            comments: Mutex::new(comments),
            replies: Mutex::new(HashMap::new()),
            reactions: Mutex::new(HashMap::new()),
        }
    }

    fn comment_ids(&self) -> Vec<Uuid> {
        self.comments.lock().iter().map(|c| c.id).collect()
    }
}

#[async_trait]
impl FeedBackend for InMemoryServer {
    async fn fetch_post(&self, post_id: Uuid) -> ApiResult<Post> {
        let post = self.post.lock().clone();
        if post.id != post_id {
            return Err(ApiError::NotFound(format!("post {}", post_id)));
        }
        Ok(post)
    }

    async fn fetch_comments(&self, _post_id: Uuid, page: u32, page_size: u32) -> ApiResult<Vec<Comment>> {
        Ok(page_of(&self.comments.lock(), page, page_size))
    }

    async fn fetch_replies(&self, comment_id: Uuid, page: u32, page_size: u32) -> ApiResult<Vec<Reply>> {
        let replies = self.replies.lock();
        Ok(page_of(replies.get(&comment_id).map(Vec::as_slice).unwrap_or_default(), page, page_size))
    }

    async fn create_comment(&self, post_id: Uuid, request: &CommentRequest) -> ApiResult<Comment> {
        let comment = Comment {
            id: Uuid::new_v4(),
            post_id,
            author_id: Uuid::new_v4(),
            author_username: "me".to_string(),
            content: request.content.clone(),
            tagged_users: request.tagged_users.clone(),
            created_at: Utc::now(),
            react_counts: ReactCounts::new(),
            my_reaction: None,
            reply_count: 0,
            is_edited: false,
        };
        self.comments.lock().insert(0, comment.clone());
        self.post.lock().comment_count += 1;
        Ok(comment)
    }

    async fn update_comment(&self, comment_id: Uuid, request: &CommentRequest) -> ApiResult<Comment> {
        let mut comments = self.comments.lock();
        let comment = comments
            .iter_mut()
            .find(|c| c.id == comment_id)
            .ok_or_else(|| ApiError::NotFound(format!("comment {}", comment_id)))?;
        comment.content = request.content.clone();
        comment.is_edited = true;
        Ok(comment.clone())
    }

    async fn delete_comment(&self, comment_id: Uuid) -> ApiResult<()> {
        self.comments.lock().retain(|c| c.id != comment_id);
        self.replies.lock().remove(&comment_id);
        let mut post = self.post.lock();
        post.comment_count = post.comment_count.saturating_sub(1);
        Ok(())
    }

    async fn create_reply(&self, comment_id: Uuid, request: &CommentRequest) -> ApiResult<Reply> {
        let reply = Reply {
            id: Uuid::new_v4(),
            comment_id,
            author_id: Uuid::new_v4(),
            author_username: "me".to_string(),
            content: request.content.clone(),
            tagged_users: request.tagged_users.clone(),
            created_at: Utc::now(),
            react_counts: ReactCounts::new(),
            my_reaction: None,
            is_edited: false,
        };
        self.replies.lock().entry(comment_id).or_default().push(reply.clone());
        if let Some(comment) = self.comments.lock().iter_mut().find(|c| c.id == comment_id) {
            comment.reply_count += 1;
        }
        Ok(reply)
    }

    async fn update_reply(&self, reply_id: Uuid, request: &CommentRequest) -> ApiResult<Reply> {
        let mut replies = self.replies.lock();
        let reply = replies
            .values_mut()
            .flat_map(|thread| thread.iter_mut())
            .find(|r| r.id == reply_id)
            .ok_or_else(|| ApiError::NotFound(format!("reply {}", reply_id)))?;
        reply.content = request.content.clone();
        reply.is_edited = true;
        Ok(reply.clone())
    }

    async fn delete_reply(&self, reply_id: Uuid) -> ApiResult<()> {
        for thread in self.replies.lock().values_mut() {
            thread.retain(|r| r.id != reply_id);
        }
        Ok(())
    }

    async fn react(&self, entity_id: Uuid, _kind: EntityKind, request: &ReactRequest) -> ApiResult<()> {
        let mut reactions = self.reactions.lock();
        let current = reactions.get(&entity_id).copied().flatten();
        if current != request.removed() {
            return Err(ApiError::BadRequest("reaction out of sync".to_string()));
        }
        reactions.insert(entity_id, request.added());
        Ok(())
    }

    async fn save_post(&self, _post_id: Uuid) -> ApiResult<()> {
        self.post.lock().is_saved = true;
        Ok(())
    }

    async fn unsave_post(&self, _post_id: Uuid) -> ApiResult<()> {
        self.post.lock().is_saved = false;
        Ok(())
    }

    async fn update_post(&self, _post_id: Uuid, request: &UpdatePostRequest) -> ApiResult<Post> {
        let mut post = self.post.lock();
        post.content = request.content.clone();
        post.visibility = request.visibility;
        post.is_edited = true;
        Ok(post.clone())
    }

    async fn delete_post(&self, post_id: Uuid) -> ApiResult<()> {
        Err(ApiError::Unauthorized(format!("not the author of {}", post_id)))
    }

    async fn share_post(&self, _post_id: Uuid, _request: &SharePostRequest) -> ApiResult<()> {
        self.post.lock().share_count += 1;
        Ok(())
    }
}

fn options() -> StoreOptions {
    StoreOptions {
        comment_page_size: 2,
        reply_page_size: 2,
        ..Default::default()
    }
}

async fn open(server: &Arc<InMemoryServer>) -> PostStore {
    let post_id = server.post.lock().id;
    let post = server.fetch_post(post_id).await.unwrap();
    PostStore::new(post, server.clone(), options())
}

fn local_ids(store: &PostStore) -> Vec<Uuid> {
    store.read(|agg| agg.comments().items().iter().map(|c| c.id).collect())
}

#[tokio::test]
async fn test_paging_through_shifting_pages_after_delete() {
    let server = Arc::new(InMemoryServer::new(5));
    let store = open(&server).await;
    let all = server.comment_ids();

    store.fetch_comments().await.unwrap();
    assert_eq!(local_ids(&store), all[..2].to_vec());

    // Server list shifts left by one; the cursor steps back to refetch page 1
    store.delete_comment(all[0]).await.unwrap();
    assert_eq!(store.read(|agg| agg.comments().cursor()), 1);

    let mut pages = 0;
    while store.read(|agg| agg.comments().has_more()) {
        match store.fetch_comments().await.unwrap() {
            PageOutcome::Merged { .. } => pages += 1,
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    assert_eq!(pages, 2);
    assert_eq!(local_ids(&store), server.comment_ids());
    assert_eq!(store.read(|agg| agg.post().comment_count), 4);

    // One more request past the end finds an empty page
    assert_eq!(store.fetch_comments().await.unwrap(), PageOutcome::Exhausted);
}

#[tokio::test]
async fn test_reaction_round_trip_stays_in_sync_with_server() {
    let server = Arc::new(InMemoryServer::new(1));
    let store = open(&server).await;
    store.fetch_comments().await.unwrap();
    let comment_id = server.comment_ids()[0];
    let target = ReactionTarget::Comment { comment_id };

    store.react_to(target, ReactionType::Wow).await.unwrap();
    store.react_to(target, ReactionType::Sad).await.unwrap();
    store.react_to(target, ReactionType::Sad).await.unwrap();

    store.read(|agg| {
        let comment = agg.comment(comment_id).unwrap();
        assert_eq!(comment.my_reaction, None);
        assert_eq!(comment.react_counts.total(), 0);
    });
    assert_eq!(server.reactions.lock().get(&comment_id), Some(&None));

    store.react_to(ReactionTarget::Post, ReactionType::Like).await.unwrap();
    store.read(|agg| assert_eq!(agg.post().react_counts.get(ReactionType::Like), 3));
}

#[tokio::test]
async fn test_conversation_on_a_comment() {
    let server = Arc::new(InMemoryServer::new(0));
    let store = open(&server).await;
    assert!(!store.read(|agg| agg.comments().has_more()));

    let comment = store.add_comment("first", Vec::new()).await.unwrap();
    let first = store.add_reply(comment.id, "reply one", Vec::new()).await.unwrap();
    store.add_reply(comment.id, "reply two", Vec::new()).await.unwrap();
    store.edit_reply(comment.id, first.id, "reply one, edited", Vec::new()).await.unwrap();

    store.read(|agg| {
        assert_eq!(agg.post().comment_count, 1);
        assert_eq!(agg.comment(comment.id).unwrap().reply_count, 2);
        let thread = agg.replies(comment.id).unwrap();
        assert_eq!(thread.items()[0].content, "reply one, edited");
        assert!(thread.items()[0].is_edited);
        assert!(!thread.has_more());
    });

    store.delete_reply(comment.id, first.id).await.unwrap();
    store.read(|agg| {
        assert_eq!(agg.comment(comment.id).unwrap().reply_count, 1);
        assert_eq!(agg.replies(comment.id).unwrap().len(), 1);
    });
}

#[tokio::test]
async fn test_rejected_delete_leaves_post_usable() {
    let server = Arc::new(InMemoryServer::new(1));
    let store = open(&server).await;

    let err = store.delete_post().await.unwrap_err();
    assert!(err.to_string().contains("Unauthorized"));
    assert!(!store.read(|agg| agg.is_deleted()));

    store.share_post(SharePostRequest::default()).await.unwrap();
    store.save_post().await.unwrap();
    store.read(|agg| {
        assert_eq!(agg.post().share_count, 1);
        assert!(agg.post().is_saved);
    });
}

#[tokio::test]
async fn test_refresh_picks_up_server_side_changes() {
    let server = Arc::new(InMemoryServer::new(2));
    let store = open(&server).await;
    store.fetch_comments().await.unwrap();

    server.post.lock().content = "edited on another device".to_string();
    store.refresh_post().await.unwrap();

    store.read(|agg| {
        assert_eq!(agg.post().content, "edited on another device");
        assert_eq!(agg.comments().len(), 2);
    });
    assert!(store.copy_post_link().ends_with(&format!("/posts/{}", store.post_id())));
}
