use std::collections::HashMap;

use murmur_types::{Comment, EntityKind, Post, Reactable, ReactionType, Reply};
use uuid::Uuid;

use super::error::{StoreError, StoreResult};
use super::ledger::{self, ReactionTransition};
use super::merge;

/// Which reactable entity an operation is aimed at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactionTarget {
    Post,
    Comment { comment_id: Uuid },
    Reply { comment_id: Uuid, reply_id: Uuid },
}

impl ReactionTarget {
    pub fn kind(&self) -> EntityKind {
        match self {
            ReactionTarget::Post => EntityKind::Post,
            ReactionTarget::Comment { .. } => EntityKind::Comment,
            ReactionTarget::Reply { .. } => EntityKind::Reply,
        }
    }
}

/// A paginated, id-unique list: the comments of a post or the replies of one comment
#[derive(Debug, Clone, PartialEq)]
pub struct Thread<T> {
    pub(crate) items: Vec<T>,
    /// Next page to request, starting at 1
    pub(crate) cursor: u32,
    pub(crate) has_more: bool,
    /// Server answered with an empty or missing page
    pub(crate) exhausted: bool,
}

impl<T> Thread<T> {
    pub fn new(total: u32) -> Self {
        Self {
            items: Vec::new(),
            cursor: 1,
            has_more: total > 0,
            exhausted: false,
        }
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn cursor(&self) -> u32 {
        self.cursor
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    fn recompute(&mut self, total: u32) {
        self.has_more = !self.exhausted && (total as usize) > self.items.len();
    }

    fn mark_exhausted(&mut self) {
        self.exhausted = true;
        self.has_more = false;
    }

    fn rewind(&mut self) {
        self.cursor = self.cursor.saturating_sub(1).max(1);
    }
}

/// One viewed post with everything fetched under it
#[derive(Debug, Clone, PartialEq)]
pub struct PostAggregate {
    pub(crate) post: Post,
    pub(crate) comments: Thread<Comment>,
    pub(crate) replies: HashMap<Uuid, Thread<Reply>>,
    pub(crate) deleted: bool,
}

impl PostAggregate {
    pub fn new(post: Post) -> Self {
        let comments = Thread::new(post.comment_count);
        Self {
            post,
            comments,
            replies: HashMap::new(),
            deleted: false,
        }
    }

    pub fn post(&self) -> &Post {
        &self.post
    }

    pub fn comments(&self) -> &Thread<Comment> {
        &self.comments
    }

    /// Reply thread of a comment, if any replies were fetched or added
    pub fn replies(&self, comment_id: Uuid) -> Option<&Thread<Reply>> {
        self.replies.get(&comment_id)
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    pub fn comment(&self, comment_id: Uuid) -> Option<&Comment> {
        self.comments.items.iter().find(|c| c.id == comment_id)
    }

    pub fn reply(&self, comment_id: Uuid, reply_id: Uuid) -> Option<&Reply> {
        self.replies
            .get(&comment_id)?
            .items
            .iter()
            .find(|r| r.id == reply_id)
    }

    fn comment_mut(&mut self, comment_id: Uuid) -> Option<&mut Comment> {
        self.comments.items.iter_mut().find(|c| c.id == comment_id)
    }

    fn reply_mut(&mut self, comment_id: Uuid, reply_id: Uuid) -> Option<&mut Reply> {
        self.replies
            .get_mut(&comment_id)?
            .items
            .iter_mut()
            .find(|r| r.id == reply_id)
    }

    fn reply_total(&self, comment_id: Uuid) -> u32 {
        self.comment(comment_id).map_or(0, |c| c.reply_count)
    }

    /// Resolve a target to the exact nested entity
    pub(crate) fn reactable_mut(&mut self, target: ReactionTarget) -> Option<&mut dyn Reactable> {
        match target {
            ReactionTarget::Post => Some(&mut self.post as &mut dyn Reactable),
            ReactionTarget::Comment { comment_id } => {
                self.comment_mut(comment_id).map(|c| c as &mut dyn Reactable)
            }
            ReactionTarget::Reply { comment_id, reply_id } => self
                .reply_mut(comment_id, reply_id)
                .map(|r| r as &mut dyn Reactable),
        }
    }

    /// Read-only view of the entity a target points at
    pub fn reactable(&self, target: ReactionTarget) -> Option<&dyn Reactable> {
        match target {
            ReactionTarget::Post => Some(&self.post as &dyn Reactable),
            ReactionTarget::Comment { comment_id } => self.comment(comment_id).map(|c| c as &dyn Reactable),
            ReactionTarget::Reply { comment_id, reply_id } => {
                self.reply(comment_id, reply_id).map(|r| r as &dyn Reactable)
            }
        }
    }

    /// Server id and current selection of a target
    pub(crate) fn reaction_state(&self, target: ReactionTarget) -> StoreResult<(Uuid, Option<ReactionType>)> {
        let entity_id = match target {
            ReactionTarget::Post => self.post.id,
            ReactionTarget::Comment { comment_id } => comment_id,
            ReactionTarget::Reply { reply_id, .. } => reply_id,
        };
        match self.reactable(target) {
            Some(entity) => Ok((entity_id, entity.my_reaction())),
            None => Err(match target {
                ReactionTarget::Reply { comment_id, reply_id } => {
                    StoreError::ReplyNotFound { comment_id, reply_id }
                }
                _ => StoreError::CommentNotFound(entity_id),
            }),
        }
    }

    pub(crate) fn apply_reaction(&mut self, target: ReactionTarget, transition: &ReactionTransition) -> bool {
        match self.reactable_mut(target) {
            Some(entity) => {
                ledger::commit(entity, transition);
                true
            }
            None => false,
        }
    }

    /// Swap in a fresh copy of the source post. Fetched threads survive only
    /// if it is the same post.
    pub(crate) fn replace_post(&mut self, post: Post) {
        if post.id != self.post.id {
            *self = PostAggregate::new(post);
            return;
        }
        self.post = post;
        self.comments.recompute(self.post.comment_count);
    }

    pub(crate) fn merge_comment_page(&mut self, page: Vec<Comment>) {
        let existing = std::mem::take(&mut self.comments.items);
        self.comments.items = merge::merge_by_id(existing, page);
        self.comments.cursor += 1;
        self.comments.recompute(self.post.comment_count);

        // Refetched comments may carry new reply counts
        for comment in &self.comments.items {
            if let Some(thread) = self.replies.get_mut(&comment.id) {
                thread.recompute(comment.reply_count);
            }
        }
    }

    pub(crate) fn mark_comments_exhausted(&mut self) {
        self.comments.mark_exhausted();
    }

    pub(crate) fn merge_reply_page(&mut self, comment_id: Uuid, page: Vec<Reply>) {
        let total = self.reply_total(comment_id);
        let thread = self
            .replies
            .entry(comment_id)
            .or_insert_with(|| Thread::new(total));
        let existing = std::mem::take(&mut thread.items);
        thread.items = merge::merge_replies(existing, page);
        thread.cursor += 1;
        thread.recompute(total);
    }

    pub(crate) fn mark_replies_exhausted(&mut self, comment_id: Uuid) {
        let total = self.reply_total(comment_id);
        self.replies
            .entry(comment_id)
            .or_insert_with(|| Thread::new(total))
            .mark_exhausted();
    }

    pub(crate) fn prepend_comment(&mut self, comment: Comment) {
        let before = self.comments.items.len();
        self.comments.items.retain(|c| c.id != comment.id);
        if self.comments.items.len() == before {
            self.post.comment_count += 1;
        }
        self.comments.items.insert(0, comment);
        self.comments.recompute(self.post.comment_count);
    }

    /// Take the edited text from the server copy; identity, reactions and
    /// reply count stay as they are locally.
    pub(crate) fn update_comment(&mut self, edited: &Comment) -> bool {
        match self.comment_mut(edited.id) {
            Some(comment) => {
                comment.content = edited.content.clone();
                comment.tagged_users = edited.tagged_users.clone();
                comment.is_edited = true;
                true
            }
            None => false,
        }
    }

    pub(crate) fn remove_comment(&mut self, comment_id: Uuid) -> bool {
        let before = self.comments.items.len();
        self.comments.items.retain(|c| c.id != comment_id);
        if self.comments.items.len() == before {
            return false;
        }
        self.post.comment_count = self.post.comment_count.saturating_sub(1);
        self.comments.rewind();
        self.comments.recompute(self.post.comment_count);
        self.replies.remove(&comment_id);
        true
    }

    pub(crate) fn add_reply(&mut self, comment_id: Uuid, reply: Reply) -> bool {
        let Some(comment) = self.comment_mut(comment_id) else {
            return false;
        };
        let previous_total = comment.reply_count;
        let thread = self
            .replies
            .entry(comment_id)
            .or_insert_with(|| Thread::new(previous_total));
        let is_new = !thread.items.iter().any(|r| r.id == reply.id);
        let existing = std::mem::take(&mut thread.items);
        thread.items = merge::merge_replies(existing, vec![reply]);

        let total = if is_new { previous_total + 1 } else { previous_total };
        thread.recompute(total);
        if let Some(comment) = self.comment_mut(comment_id) {
            comment.reply_count = total;
        }
        true
    }

    pub(crate) fn update_reply(&mut self, comment_id: Uuid, edited: &Reply) -> bool {
        match self.reply_mut(comment_id, edited.id) {
            Some(reply) => {
                reply.content = edited.content.clone();
                reply.tagged_users = edited.tagged_users.clone();
                reply.is_edited = true;
                true
            }
            None => false,
        }
    }

    pub(crate) fn remove_reply(&mut self, comment_id: Uuid, reply_id: Uuid) -> bool {
        let Some(thread) = self.replies.get_mut(&comment_id) else {
            return false;
        };
        let before = thread.items.len();
        thread.items.retain(|r| r.id != reply_id);
        if thread.items.len() == before {
            return false;
        }
        thread.rewind();

        let total = match self.comment_mut(comment_id) {
            Some(comment) => {
                comment.reply_count = comment.reply_count.saturating_sub(1);
                comment.reply_count
            }
            None => 0,
        };
        if let Some(thread) = self.replies.get_mut(&comment_id) {
            thread.recompute(total);
        }
        true
    }

    pub(crate) fn set_saved(&mut self, saved: bool) {
        self.post.is_saved = saved;
    }

    /// Take the editable fields of the server copy
    pub(crate) fn apply_post_edit(&mut self, edited: &Post) {
        self.post.content = edited.content.clone();
        self.post.tagged_users = edited.tagged_users.clone();
        self.post.media = edited.media.clone();
        self.post.visibility = edited.visibility;
        self.post.is_edited = true;
    }

    pub(crate) fn record_share(&mut self) {
        self.post.share_count += 1;
    }

    pub(crate) fn mark_deleted(&mut self) {
        self.deleted = true;
        self.comments.mark_exhausted();
        self.replies.clear();
    }
}
