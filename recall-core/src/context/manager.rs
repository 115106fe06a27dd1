//! Context Budget Manager
//!
//! Decides which prior turns survive into the next model request. Selection is
//! greedy and newest-first: the current turn is always kept, the first user
//! message (the anchor) is kept whenever the walk reaches it and it fits, and
//! the walk stops at the first other message that would overflow the budget.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::conversation::Message;

use super::config::ContextConfig;
use super::profile::{ModelCatalog, ModelProfile};
use super::tokens::TokenEstimator;

/// Snapshot of how much of a model's window a conversation occupies
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextUsage {
    /// Estimated tokens across all messages
    pub tokens_used: usize,

    /// The model's full context window
    pub max_tokens: usize,

    /// `tokens_used / max_tokens * 100`
    pub percentage: f64,

    /// `percentage` is above the near-limit threshold
    pub is_near_limit: bool,
}

/// Result of fitting a history into a budget
#[derive(Debug, Clone)]
pub struct FitOutcome {
    /// Retained messages in chronological order, trim notice first if present
    pub messages: Vec<Message>,

    /// Number of input messages that were dropped
    pub trimmed_count: usize,

    /// Estimated tokens of the retained input messages (notice excluded)
    pub tokens_used: usize,

    /// Budget the selection ran against; negative when memories alone overflow
    pub available_tokens: i64,
}

impl FitOutcome {
    pub fn was_trimmed(&self) -> bool {
        self.trimmed_count > 0
    }
}

/// Fits message histories into model token budgets
#[derive(Debug, Clone)]
pub struct ContextBudgetManager {
    catalog: ModelCatalog,
    estimator: TokenEstimator,
    memory_token_cost: usize,
    safety_buffer: usize,
    near_limit_percent: f64,
}

impl Default for ContextBudgetManager {
    fn default() -> Self {
        Self::new(&ContextConfig::default())
    }
}

impl ContextBudgetManager {
    pub fn new(config: &ContextConfig) -> Self {
        Self {
            catalog: config.catalog(),
            estimator: TokenEstimator::new(config.chars_per_token),
            memory_token_cost: config.memory_token_cost,
            safety_buffer: config.safety_buffer,
            near_limit_percent: config.near_limit_percent,
        }
    }

    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    pub fn estimator(&self) -> &TokenEstimator {
        &self.estimator
    }

    /// Resolved profile for a model id (default profile when unknown)
    pub fn profile(&self, model_id: &str) -> &ModelProfile {
        self.catalog.resolve(model_id)
    }

    /// Reply token reservation for a model
    pub fn max_reply_tokens(&self, model_id: &str) -> usize {
        self.profile(model_id).max_reply_tokens
    }

    /// Full context window of a model
    pub fn context_window_tokens(&self, model_id: &str) -> usize {
        self.profile(model_id).context_window_tokens
    }

    /// Prompt budget left for conversation messages once the reply reservation,
    /// injected memories and the safety buffer are taken out.
    pub fn available_tokens(&self, model_id: &str, memory_count: usize) -> i64 {
        let profile = self.profile(model_id);
        self.budget_for(profile, memory_count)
    }

    fn budget_for(&self, profile: &ModelProfile, memory_count: usize) -> i64 {
        let memory_tokens = memory_count.saturating_mul(self.memory_token_cost);
        profile.context_window_tokens as i64
            - profile.max_reply_tokens as i64
            - memory_tokens as i64
            - self.safety_buffer as i64
    }

    fn message_tokens(&self, message: &Message, profile: &ModelProfile) -> usize {
        self.estimator
            .message_tokens(&message.content, profile.per_message_overhead_tokens)
    }

    /// Fit `messages` into the budget of `model_id`, leaving room for `memories`.
    ///
    /// Only the number of memories matters; each is charged a flat cost.
    pub fn fit<T>(&self, messages: &[Message], model_id: &str, memories: &[T]) -> Vec<Message> {
        self.fit_with_outcome(messages, model_id, memories).messages
    }

    /// Same selection as [`fit`](Self::fit), with the numbers behind it
    pub fn fit_with_outcome<T>(
        &self,
        messages: &[Message],
        model_id: &str,
        memories: &[T],
    ) -> FitOutcome {
        let profile = self.profile(model_id);
        let available = self.budget_for(profile, memories.len());

        if messages.len() <= 2 {
            let tokens_used = messages
                .iter()
                .map(|m| self.message_tokens(m, profile))
                .sum();
            return FitOutcome {
                messages: messages.to_vec(),
                trimmed_count: 0,
                tokens_used,
                available_tokens: available,
            };
        }

        let last = messages.len() - 1;
        let mut total = self.message_tokens(&messages[last], profile) as i64;
        // Newest first while walking
        let mut kept = vec![last];

        let anchor = messages[..last].iter().position(Message::is_user);

        for index in (0..last).rev() {
            let cost = self.message_tokens(&messages[index], profile) as i64;
            let fits = total + cost <= available;

            if Some(index) == anchor {
                if fits {
                    total += cost;
                    kept.push(index);
                }
                continue;
            }

            if !fits {
                break;
            }

            total += cost;
            kept.push(index);
        }

        let trimmed_count = messages.len() - kept.len();
        let mut fitted = Vec::with_capacity(kept.len() + 1);

        if trimmed_count > 0 {
            tracing::debug!(
                model = model_id,
                trimmed = trimmed_count,
                kept = kept.len(),
                available,
                "Trimmed conversation to fit context window"
            );
            fitted.push(trim_notice(trimmed_count));
        }

        fitted.extend(kept.iter().rev().map(|&i| messages[i].clone()));

        FitOutcome {
            messages: fitted,
            trimmed_count,
            tokens_used: total.max(0) as usize,
            available_tokens: available,
        }
    }

    /// Estimated usage of all `messages` against the model's window, without
    /// trimming anything
    pub fn usage(&self, messages: &[Message], model_id: &str) -> ContextUsage {
        let profile = self.profile(model_id);
        let tokens_used: usize = messages
            .iter()
            .map(|m| self.message_tokens(m, profile))
            .sum();

        let max_tokens = profile.context_window_tokens;
        let percentage = if max_tokens == 0 {
            0.0
        } else {
            tokens_used as f64 / max_tokens as f64 * 100.0
        };

        ContextUsage {
            tokens_used,
            max_tokens,
            percentage,
            is_near_limit: percentage > self.near_limit_percent,
        }
    }
}

/// Synthetic system message telling the model how much history was cut
fn trim_notice(trimmed_count: usize) -> Message {
    Message::system(format!(
        "[Previous {} message(s) trimmed to fit context window. Conversation continues from here.]",
        trimmed_count
    ))
    .with_id(format!("context-trim-{}", Uuid::new_v4()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::MessageRole;

    const MODEL: &str = "llama-3.1-8b-instant";
    const NO_MEMORIES: &[()] = &[];

    fn long(role: MessageRole, chars: usize) -> Message {
        Message::new(role, "x".repeat(chars))
    }

    #[test]
    fn test_single_message_passthrough() {
        let manager = ContextBudgetManager::default();
        let messages = vec![Message::user("hello")];

        let fitted = manager.fit(&messages, MODEL, NO_MEMORIES);
        assert_eq!(fitted, messages);
    }

    #[test]
    fn test_two_huge_messages_passthrough() {
        let manager = ContextBudgetManager::default();
        let messages = vec![
            long(MessageRole::User, 200_000),
            long(MessageRole::Assistant, 200_000),
        ];

        let fitted = manager.fit(&messages, MODEL, NO_MEMORIES);
        assert_eq!(fitted, messages);
    }

    #[test]
    fn test_no_trim_when_everything_fits() {
        let manager = ContextBudgetManager::default();
        let messages = vec![
            Message::user("first"),
            Message::assistant("second"),
            Message::user("third"),
        ];

        let outcome = manager.fit_with_outcome(&messages, MODEL, NO_MEMORIES);
        assert!(!outcome.was_trimmed());
        assert_eq!(outcome.messages, messages);
    }

    #[test]
    fn test_available_budget() {
        let manager = ContextBudgetManager::default();
        assert_eq!(manager.available_tokens(MODEL, 0), 32768 - 8192 - 1000);
        assert_eq!(manager.available_tokens(MODEL, 3), 32768 - 8192 - 300 - 1000);
        assert_eq!(manager.available_tokens("gemma-7b-it", 0), 8192 - 2048 - 1000);
    }

    #[test]
    fn test_anchor_skipped_when_too_big_but_walk_continues() {
        let config = ContextConfig::new()
            .with_safety_buffer(0)
            .with_model("tiny", ModelProfile::new(1_100, 100, 0));
        let manager = ContextBudgetManager::new(&config);

        // Budget is 1000 tokens at 3.5 chars/token.
        let messages = vec![
            Message::system("rules").with_id("sys"),
            long(MessageRole::User, 4_000).with_id("anchor"),
            Message::assistant("short reply").with_id("a1"),
            Message::user("short question").with_id("u2"),
            Message::assistant("another reply").with_id("a2"),
            Message::user("current").with_id("now"),
        ];

        let outcome = manager.fit_with_outcome(&messages, "tiny", NO_MEMORIES);
        let ids: Vec<_> = outcome.messages.iter().map(|m| m.id.as_str()).collect();

        // Anchor does not fit, is skipped, and the older system message still fits.
        assert_eq!(outcome.trimmed_count, 1);
        assert!(ids[0].starts_with("context-trim-"));
        assert_eq!(&ids[1..], &["sys", "a1", "u2", "a2", "now"]);
    }

    #[test]
    fn test_walk_stops_at_first_non_anchor_overflow() {
        let config = ContextConfig::new()
            .with_safety_buffer(0)
            .with_model("tiny", ModelProfile::new(1_100, 100, 0));
        let manager = ContextBudgetManager::new(&config);

        let messages = vec![
            Message::user("anchor").with_id("anchor"),
            Message::assistant("old small").with_id("old"),
            long(MessageRole::Assistant, 4_000).with_id("big"),
            Message::user("recent").with_id("recent"),
            Message::user("current").with_id("now"),
        ];

        let fitted = manager.fit(&messages, "tiny", NO_MEMORIES);
        let ids: Vec<_> = fitted.iter().map(|m| m.id.as_str()).collect();

        assert_eq!(ids.len(), 3);
        assert!(ids[0].starts_with("context-trim-"));
        assert_eq!(&ids[1..], &["recent", "now"]);
        assert!(fitted[0].content.contains("Previous 3 message(s) trimmed"));
    }

    #[test]
    fn test_last_message_kept_even_if_over_budget() {
        let manager = ContextBudgetManager::default();
        let messages = vec![
            Message::user("a"),
            Message::assistant("b"),
            long(MessageRole::User, 500_000).with_id("huge"),
        ];

        let fitted = manager.fit(&messages, MODEL, NO_MEMORIES);
        assert_eq!(fitted.len(), 2);
        assert_eq!(fitted[1].id, "huge");
        assert_eq!(fitted[0].role, MessageRole::System);
    }

    #[test]
    fn test_memories_shrink_budget() {
        let manager = ContextBudgetManager::default();
        let messages: Vec<Message> = (0..30)
            .map(|i| long(if i % 2 == 0 { MessageRole::User } else { MessageRole::Assistant }, 3_500))
            .collect();

        let without = manager.fit_with_outcome(&messages, MODEL, NO_MEMORIES);
        let memories = vec![(); 40];
        let with = manager.fit_with_outcome(&messages, MODEL, &memories);

        assert!(with.trimmed_count > without.trimmed_count);
        assert_eq!(with.available_tokens, without.available_tokens - 4000);
    }

    #[test]
    fn test_usage() {
        let manager = ContextBudgetManager::default();
        let messages = vec![long(MessageRole::User, 35), long(MessageRole::Assistant, 35)];

        let usage = manager.usage(&messages, MODEL);
        assert_eq!(usage.tokens_used, 28);
        assert_eq!(usage.max_tokens, 32768);
        assert!(!usage.is_near_limit);
    }

    #[test]
    fn test_usage_near_limit() {
        let manager = ContextBudgetManager::default();
        let messages = vec![long(MessageRole::User, 23_000)];

        let usage = manager.usage(&messages, "gemma-7b-it");
        assert!(usage.percentage > 75.0);
        assert!(usage.is_near_limit);
    }

    #[test]
    fn test_profile_accessors_fall_back() {
        let manager = ContextBudgetManager::default();
        assert_eq!(manager.max_reply_tokens("nope"), 8192);
        assert_eq!(manager.context_window_tokens("nope"), 32768);
        assert_eq!(manager.context_window_tokens("gemma-7b-it"), 8192);
    }
}
