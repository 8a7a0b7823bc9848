//! Post store: one viewed post, its comments and their replies.
//!
//! Every mutating operation calls the backend first and commits the local
//! change only after the call succeeds. A failed call leaves the state as it
//! was and hands the error back to the caller. Page requests go through
//! [`RequestLifecycle`] so a superseded page never lands in the state.

mod error;
pub mod ledger;
pub mod lifecycle;
pub mod merge;
mod state;


use std::sync::Arc;

use murmur_types::*;
use parking_lot::Mutex;
use tokio::sync::watch;
use uuid::Uuid;

use crate::api::FeedBackend;
use crate::logging::LogConfig;

pub use error::{StoreError, StoreResult};
pub use ledger::{ReactionDelta, ReactionTransition};
pub use lifecycle::{RequestLifecycle, RequestTicket, StreamKey};
pub use state::{PostAggregate, ReactionTarget, Thread};

/// Per-store settings, usually taken from `ClientSettings::store_options`
#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub comment_page_size: u32,
    pub reply_page_size: u32,
    /// Root of shareable links, without a trailing slash
    pub web_url: String,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            comment_page_size: 10,
            reply_page_size: 5,
            web_url: crate::config::DEFAULT_WEB_URL.to_string(),
        }
    }
}

/// Result of a page fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageOutcome {
    /// A non-empty page was merged
    Merged { received: usize, has_more: bool },
    /// The server has no further pages
    Exhausted,
    /// A newer request on the same stream took over; nothing was applied
    Superseded,
}

pub struct PostStore {
    backend: Arc<dyn FeedBackend>,
    options: StoreOptions,
    state: watch::Sender<PostAggregate>,
    requests: Mutex<RequestLifecycle>,
    /// Reactions resolve in call order, each computed from committed state
    reaction_gate: tokio::sync::Mutex<()>,
    log_config: LogConfig,
}

impl PostStore {
    pub fn new(post: Post, backend: Arc<dyn FeedBackend>, options: StoreOptions) -> Self {
        let (state, _) = watch::channel(PostAggregate::new(post));
        Self {
            backend,
            options,
            state,
            requests: Mutex::new(RequestLifecycle::new()),
            reaction_gate: tokio::sync::Mutex::new(()),
            log_config: LogConfig::disabled(),
        }
    }

    pub fn with_log_config(mut self, log_config: LogConfig) -> Self {
        self.log_config = log_config;
        self
    }

    // Read side

    /// Owned copy of the current state
    pub fn snapshot(&self) -> PostAggregate {
        self.state.borrow().clone()
    }

    /// Read the current state without cloning it
    pub fn read<R>(&self, f: impl FnOnce(&PostAggregate) -> R) -> R {
        f(&self.state.borrow())
    }

    /// Receiver that is notified after every committed change
    pub fn subscribe(&self) -> watch::Receiver<PostAggregate> {
        self.state.subscribe()
    }

    pub fn post_id(&self) -> Uuid {
        self.read(|agg| agg.post.id)
    }

    pub fn is_loading(&self, stream: StreamKey) -> bool {
        self.requests.lock().in_flight(stream)
    }

    fn live_post_id(&self) -> StoreResult<Uuid> {
        self.read(|agg| {
            if agg.deleted {
                Err(StoreError::PostDeleted(agg.post.id))
            } else {
                Ok(agg.post.id)
            }
        })
    }

    fn require_comment(&self, comment_id: Uuid) -> StoreResult<Uuid> {
        let post_id = self.live_post_id()?;
        match self.read(|agg| agg.comment(comment_id).is_some()) {
            true => Ok(post_id),
            false => Err(StoreError::CommentNotFound(comment_id)),
        }
    }

    fn require_reply(&self, comment_id: Uuid, reply_id: Uuid) -> StoreResult<Uuid> {
        let post_id = self.require_comment(comment_id)?;
        match self.read(|agg| agg.reply(comment_id, reply_id).is_some()) {
            true => Ok(post_id),
            false => Err(StoreError::ReplyNotFound { comment_id, reply_id }),
        }
    }

    /// Commit a page result if `ticket` is still the live request of its stream
    fn commit_page(&self, ticket: &RequestTicket, apply: impl FnOnce(&mut PostAggregate)) -> bool {
        let mut requests = self.requests.lock();
        if !requests.finish(ticket) {
            return false;
        }
        self.state.send_modify(apply);
        true
    }

    /// Commit a write confirmed for `post_id`. Dropped if the aggregate now
    /// holds another post or the post was deleted meanwhile.
    fn commit_for(&self, post_id: Uuid, apply: impl FnOnce(&mut PostAggregate) -> bool) -> bool {
        let committed = self.state.send_if_modified(|agg| {
            if agg.post.id != post_id || agg.deleted {
                return false;
            }
            apply(agg)
        });
        if !committed {
            log_mutation!(self.log_config, "write confirmed for {} not applied to current state", post_id);
        }
        committed
    }

    // Source post

    /// Replace the source post, e.g. when the feed re-renders this card with fresh data
    pub fn replace_post(&self, post: Post) {
        let changed_identity = post.id != self.post_id();
        if changed_identity {
            self.requests.lock().cancel_all();
        }
        log_debug!(self.log_config, "replace post {} (new identity: {})", post.id, changed_identity);
        self.state.send_modify(|agg| agg.replace_post(post));
    }

    /// Refetch the post itself and replace it
    pub async fn refresh_post(&self) -> StoreResult<Post> {
        let post_id = self.live_post_id()?;
        let post = self.backend.fetch_post(post_id).await?;
        self.replace_post(post.clone());
        Ok(post)
    }

    // Reactions

    /// Toggle or switch the viewer's reaction on the post, a comment or a reply
    pub async fn react_to(&self, target: ReactionTarget, chosen: ReactionType) -> StoreResult<ReactionTransition> {
        let _gate = self.reaction_gate.lock().await;

        let post_id = self.live_post_id()?;
        let (entity_id, current) = self.read(|agg| agg.reaction_state(target))?;

        let transition = ledger::transition(current, chosen);
        log_reaction!(
            self.log_config,
            "{} {}: {:?} -> {:?}",
            target.kind().as_str(),
            entity_id,
            current,
            transition.next
        );

        if let Err(e) = self
            .backend
            .react(entity_id, target.kind(), &transition.delta.to_request())
            .await
        {
            log::warn!(target: "reactions", "reaction on {} {} failed: {}", target.kind().as_str(), entity_id, e);
            return Err(e.into());
        }

        if !self.commit_for(post_id, |agg| agg.apply_reaction(target, &transition)) {
            log_reaction!(self.log_config, "{} {} gone before reaction committed", target.kind().as_str(), entity_id);
        }
        Ok(transition)
    }

    // Comments

    /// Fetch the next comment page and merge it
    pub async fn fetch_comments(&self) -> StoreResult<PageOutcome> {
        let post_id = self.live_post_id()?;
        let page = self.read(|agg| agg.comments.cursor);
        let ticket = self.requests.lock().begin(StreamKey::Comments);
        log_pagination!(self.log_config, "comments of {}: requesting page {}", post_id, page);

        let fetch = self
            .backend
            .fetch_comments(post_id, page, self.options.comment_page_size);
        let result = match ticket.run(fetch).await {
            Some(result) => result,
            None => {
                log_pagination!(self.log_config, "comments of {}: page {} superseded", post_id, page);
                return Ok(PageOutcome::Superseded);
            }
        };

        let mut outcome = PageOutcome::Superseded;
        let committed = match result {
            Ok(comments) if comments.is_empty() => self.commit_page(&ticket, |agg| {
                agg.mark_comments_exhausted();
                outcome = PageOutcome::Exhausted;
            }),
            Ok(comments) => {
                let received = comments.len();
                self.commit_page(&ticket, |agg| {
                    agg.merge_comment_page(comments);
                    outcome = PageOutcome::Merged { received, has_more: agg.comments.has_more };
                })
            }
            // A later page that no longer exists means we reached the end
            Err(e) if e.is_not_found() && page > 1 => self.commit_page(&ticket, |agg| {
                agg.mark_comments_exhausted();
                outcome = PageOutcome::Exhausted;
            }),
            Err(e) => {
                if !self.requests.lock().finish(&ticket) {
                    return Ok(PageOutcome::Superseded);
                }
                log::warn!(target: "pagination", "comments of {}: page {} failed: {}", post_id, page, e);
                return Err(e.into());
            }
        };

        if !committed {
            log_pagination!(self.log_config, "comments of {}: page {} arrived after being superseded", post_id, page);
        } else {
            log_pagination!(self.log_config, "comments of {}: page {} -> {:?}", post_id, page, outcome);
        }
        Ok(outcome)
    }

    pub async fn add_comment(&self, text: impl Into<String>, tagged_users: Vec<Uuid>) -> StoreResult<Comment> {
        let post_id = self.live_post_id()?;
        let request = CommentRequest {
            content: text.into(),
            tagged_users,
        };
        let comment = self.backend.create_comment(post_id, &request).await?;
        log_mutation!(self.log_config, "added comment {} to {}", comment.id, post_id);
        let stored = comment.clone();
        self.commit_for(post_id, |agg| {
            agg.prepend_comment(stored);
            true
        });
        Ok(comment)
    }

    pub async fn edit_comment(
        &self,
        comment_id: Uuid,
        text: impl Into<String>,
        tagged_users: Vec<Uuid>,
    ) -> StoreResult<Comment> {
        let post_id = self.require_comment(comment_id)?;
        let request = CommentRequest {
            content: text.into(),
            tagged_users,
        };
        let edited = self.backend.update_comment(comment_id, &request).await?;
        self.commit_for(post_id, |agg| agg.update_comment(&edited));
        log_mutation!(self.log_config, "edited comment {}", comment_id);
        Ok(edited)
    }

    pub async fn delete_comment(&self, comment_id: Uuid) -> StoreResult<()> {
        let post_id = self.require_comment(comment_id)?;
        self.backend.delete_comment(comment_id).await?;
        self.requests.lock().cancel(StreamKey::Replies(comment_id));
        self.commit_for(post_id, |agg| agg.remove_comment(comment_id));
        log_mutation!(self.log_config, "deleted comment {}", comment_id);
        Ok(())
    }

    // Replies

    /// Fetch the next reply page of one comment and merge it
    pub async fn fetch_replies(&self, comment_id: Uuid) -> StoreResult<PageOutcome> {
        self.require_comment(comment_id)?;
        let page = self.read(|agg| agg.replies(comment_id).map_or(1, |thread| thread.cursor));
        let stream = StreamKey::Replies(comment_id);
        let ticket = self.requests.lock().begin(stream);
        log_pagination!(self.log_config, "replies of {}: requesting page {}", comment_id, page);

        let fetch = self
            .backend
            .fetch_replies(comment_id, page, self.options.reply_page_size);
        let result = match ticket.run(fetch).await {
            Some(result) => result,
            None => {
                log_pagination!(self.log_config, "replies of {}: page {} superseded", comment_id, page);
                return Ok(PageOutcome::Superseded);
            }
        };

        let mut outcome = PageOutcome::Superseded;
        let committed = match result {
            Ok(replies) if replies.is_empty() => self.commit_page(&ticket, |agg| {
                agg.mark_replies_exhausted(comment_id);
                outcome = PageOutcome::Exhausted;
            }),
            Ok(replies) => {
                let received = replies.len();
                self.commit_page(&ticket, |agg| {
                    agg.merge_reply_page(comment_id, replies);
                    let has_more = agg.replies(comment_id).is_some_and(|thread| thread.has_more);
                    outcome = PageOutcome::Merged { received, has_more };
                })
            }
            Err(e) if e.is_not_found() && page > 1 => self.commit_page(&ticket, |agg| {
                agg.mark_replies_exhausted(comment_id);
                outcome = PageOutcome::Exhausted;
            }),
            Err(e) => {
                if !self.requests.lock().finish(&ticket) {
                    return Ok(PageOutcome::Superseded);
                }
                log::warn!(target: "pagination", "replies of {}: page {} failed: {}", comment_id, page, e);
                return Err(e.into());
            }
        };

        if !committed {
            log_pagination!(self.log_config, "replies of {}: page {} arrived after being superseded", comment_id, page);
        } else {
            log_pagination!(self.log_config, "replies of {}: page {} -> {:?}", comment_id, page, outcome);
        }
        Ok(outcome)
    }

    pub async fn add_reply(
        &self,
        comment_id: Uuid,
        text: impl Into<String>,
        tagged_users: Vec<Uuid>,
    ) -> StoreResult<Reply> {
        let post_id = self.require_comment(comment_id)?;
        let request = CommentRequest {
            content: text.into(),
            tagged_users,
        };
        let reply = self.backend.create_reply(comment_id, &request).await?;
        let stored = reply.clone();
        self.commit_for(post_id, |agg| agg.add_reply(comment_id, stored));
        log_mutation!(self.log_config, "added reply {} to comment {}", reply.id, comment_id);
        Ok(reply)
    }

    pub async fn edit_reply(
        &self,
        comment_id: Uuid,
        reply_id: Uuid,
        text: impl Into<String>,
        tagged_users: Vec<Uuid>,
    ) -> StoreResult<Reply> {
        let post_id = self.require_reply(comment_id, reply_id)?;
        let request = CommentRequest {
            content: text.into(),
            tagged_users,
        };
        let edited = self.backend.update_reply(reply_id, &request).await?;
        self.commit_for(post_id, |agg| agg.update_reply(comment_id, &edited));
        log_mutation!(self.log_config, "edited reply {}", reply_id);
        Ok(edited)
    }

    pub async fn delete_reply(&self, comment_id: Uuid, reply_id: Uuid) -> StoreResult<()> {
        let post_id = self.require_reply(comment_id, reply_id)?;
        self.backend.delete_reply(reply_id).await?;
        self.commit_for(post_id, |agg| agg.remove_reply(comment_id, reply_id));
        log_mutation!(self.log_config, "deleted reply {} under {}", reply_id, comment_id);
        Ok(())
    }

    // Post-level operations

    pub async fn save_post(&self) -> StoreResult<()> {
        let post_id = self.live_post_id()?;
        self.backend.save_post(post_id).await?;
        self.commit_for(post_id, |agg| {
            agg.set_saved(true);
            true
        });
        Ok(())
    }

    pub async fn unsave_post(&self) -> StoreResult<()> {
        let post_id = self.live_post_id()?;
        self.backend.unsave_post(post_id).await?;
        self.commit_for(post_id, |agg| {
            agg.set_saved(false);
            true
        });
        Ok(())
    }

    pub async fn edit_post(&self, request: UpdatePostRequest) -> StoreResult<Post> {
        let post_id = self.live_post_id()?;
        let edited = self.backend.update_post(post_id, &request).await?;
        self.commit_for(post_id, |agg| {
            agg.apply_post_edit(&edited);
            true
        });
        log_mutation!(self.log_config, "edited post {}", post_id);
        Ok(edited)
    }

    pub async fn delete_post(&self) -> StoreResult<()> {
        let post_id = self.live_post_id()?;
        self.backend.delete_post(post_id).await?;
        if self.commit_for(post_id, |agg| {
            agg.mark_deleted();
            true
        }) {
            self.requests.lock().cancel_all();
        }
        log_mutation!(self.log_config, "deleted post {}", post_id);
        Ok(())
    }

    pub async fn share_post(&self, request: SharePostRequest) -> StoreResult<()> {
        let post_id = self.live_post_id()?;
        self.backend.share_post(post_id, &request).await?;
        self.commit_for(post_id, |agg| {
            agg.record_share();
            true
        });
        Ok(())
    }

    /// Shareable link to the post; putting it on a clipboard is up to the caller
    pub fn copy_post_link(&self) -> String {
        format!("{}/posts/{}", self.options.web_url, self.post_id())
    }

    /// Cancel every pending page request. Results arriving afterwards are dropped.
    pub fn teardown(&self) {
        let mut requests = self.requests.lock();
        if requests.pending_count() > 0 {
            log_debug!(self.log_config, "teardown cancels {} pending requests", requests.pending_count());
        }
        requests.cancel_all();
    }
}

impl Drop for PostStore {
    fn drop(&mut self) {
        self.teardown();
    }
}
