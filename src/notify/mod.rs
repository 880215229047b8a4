//! Notification creation on domain events.
//!
//! Notifications are fire-and-forget: a failure to record or push one is
//! logged and never propagated to the interaction that triggered it.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::json;
use tracing::{debug, warn};

use crate::db::{self, Database, NewNotification, NotificationKind, User};
use crate::realtime::RealtimeGateway;

/// `@username` mentions: 2-32 word characters, not preceded by a word
/// character or `@` (which filters out email addresses).
static MENTION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|[^\w@])@([A-Za-z0-9_]{2,32})").expect("valid mention regex"));

#[derive(Clone)]
pub struct NotificationService {
    db: Database,
    realtime: RealtimeGateway,
}

impl NotificationService {
    #[must_use]
    pub fn new(db: Database, realtime: RealtimeGateway) -> Self {
        Self { db, realtime }
    }

    /// Record a notification and push it to connected sessions.
    ///
    /// Self-notifications (actor == recipient) are skipped. Errors are
    /// swallowed after logging.
    pub async fn notify(&self, notification: NewNotification) {
        if notification.user_id == notification.actor_id {
            return;
        }

        let id = match db::insert_notification(self.db.pool(), &notification).await {
            Ok(id) => id,
            Err(e) => {
                warn!(error = %e, "Failed to record notification");
                return;
            }
        };

        let payload = json!({
            "id": id,
            "kind": notification.kind.as_str(),
            "actor_id": notification.actor_id,
            "post_id": notification.post_id,
            "body": notification.body,
        })
        .to_string();

        let reached = self.realtime.publish(notification.user_id, payload).await;
        debug!(
            notification_id = id,
            user_id = notification.user_id,
            sessions = reached,
            "Notification delivered"
        );
    }

    /// Notify every user `@mentioned` in a comment body.
    pub async fn notify_mentions(&self, actor: &User, post_id: i64, body: &str) {
        for username in extract_mentions(body) {
            let mentioned = match db::get_user_by_username(self.db.pool(), &username).await {
                Ok(Some(u)) => u,
                Ok(None) => continue,
                Err(e) => {
                    warn!(error = %e, username, "Failed to resolve mention");
                    continue;
                }
            };

            self.notify(NewNotification {
                user_id: mentioned.id,
                kind: NotificationKind::Mention,
                actor_id: actor.id,
                post_id: Some(post_id),
                body: format!("{} mentioned you in a comment", actor.username),
            })
            .await;
        }
    }
}

/// Extract unique mentioned usernames in order of first appearance.
fn extract_mentions(text: &str) -> Vec<String> {
    let mut seen = Vec::new();
    for capture in MENTION_RE.captures_iter(text) {
        let name = capture[1].to_string();
        if !seen.contains(&name) {
            seen.push(name);
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_mentions_basic() {
        assert_eq!(
            extract_mentions("nice work @alice and @bob_42!"),
            vec!["alice".to_string(), "bob_42".to_string()]
        );
    }

    #[test]
    fn test_extract_mentions_skips_emails() {
        assert!(extract_mentions("reach me at dev@example.com").is_empty());
    }

    #[test]
    fn test_extract_mentions_dedupes() {
        assert_eq!(
            extract_mentions("@carol @carol again"),
            vec!["carol".to_string()]
        );
    }

    #[test]
    fn test_extract_mentions_at_start() {
        assert_eq!(extract_mentions("@dave hello"), vec!["dave".to_string()]);
    }

    #[test]
    fn test_extract_mentions_ignores_single_char() {
        assert!(extract_mentions("see @x for details").is_empty());
    }
}
