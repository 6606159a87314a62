//! Expo push notifications for list activity.
//!
//! Delivery is best effort: it runs on a spawned task after the triggering request has
//! committed, and every failure is logged and dropped. A slow or broken push service never
//! affects API responses.

use serde::Serialize;
use serde_json::json;
use sqlx::PgPool;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::{
    config::NotificationsConfig,
    db::handlers::{Collaborators, PushTokens},
    errors::Error,
    types::{ItemId, ListId, UserId},
};

/// One Expo push message.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PushMessage {
    pub to: String,
    pub sound: &'static str,
    pub title: String,
    pub body: String,
    pub data: serde_json::Value,
}

/// What happened, for message text.
#[derive(Debug, Clone)]
pub struct ItemAdded {
    pub actor: UserId,
    pub list_id: ListId,
    pub list_name: String,
    pub item_id: ItemId,
    pub item_name: String,
}

impl ItemAdded {
    fn message_for(&self, token: String) -> PushMessage {
        PushMessage {
            to: token,
            sound: "default",
            title: "New item".to_string(),
            body: format!("\"{}\" was added to \"{}\"", self.item_name, self.list_name),
            data: json!({ "listId": self.list_id, "itemId": self.item_id }),
        }
    }
}

/// `ExponentPushToken[...]` or `ExpoPushToken[...]`.
pub fn is_expo_push_token(token: &str) -> bool {
    ["ExponentPushToken[", "ExpoPushToken["]
        .iter()
        .any(|prefix| token.len() > prefix.len() + 1 && token.starts_with(prefix) && token.ends_with(']'))
}

#[derive(Clone)]
pub struct Notifier {
    client: reqwest::Client,
    config: NotificationsConfig,
}

impl Notifier {
    pub fn new(config: NotificationsConfig) -> Self {
        let client = crate::http_client(config.timeout);
        Self { client, config }
    }

    /// Tell everyone else on the list about a new item. Returns the delivery task, or `None`
    /// when notifications are disabled.
    pub fn item_added(&self, db: PgPool, event: ItemAdded) -> Option<JoinHandle<()>> {
        if !self.config.enabled {
            return None;
        }

        let notifier = self.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = notifier.deliver_item_added(&db, &event).await {
                warn!(list_id = event.list_id, "Failed to send item notification: {}", e);
            }
        }))
    }

    #[instrument(skip(self, db, event), fields(list_id = event.list_id, item_id = event.item_id), err)]
    async fn deliver_item_added(&self, db: &PgPool, event: &ItemAdded) -> Result<usize, Error> {
        let mut conn = db.acquire().await.map_err(|e| Error::Database(e.into()))?;

        let recipients = Collaborators::new(&mut conn).members_except(event.list_id, event.actor).await?;
        if recipients.is_empty() {
            debug!("No one else on the list");
            return Ok(0);
        }

        let tokens = PushTokens::new(&mut conn).for_users(&recipients).await?;
        let messages: Vec<PushMessage> = tokens
            .into_iter()
            .filter_map(|t| {
                if is_expo_push_token(&t.token) {
                    Some(event.message_for(t.token))
                } else {
                    warn!(user_id = t.user_id, "Skipping malformed Expo push token");
                    None
                }
            })
            .collect();

        self.send(&messages).await
    }

    /// POST messages to Expo in chunks. Returns how many messages were accepted; failed chunks
    /// are logged and skipped.
    pub async fn send(&self, messages: &[PushMessage]) -> Result<usize, Error> {
        let mut delivered = 0;

        for chunk in messages.chunks(self.config.chunk_size.max(1)) {
            let result = self
                .client
                .post(self.config.expo_push_url.clone())
                .header(reqwest::header::ACCEPT, "application/json")
                .json(chunk)
                .send()
                .await
                .and_then(|r| r.error_for_status());

            match result {
                Ok(_) => delivered += chunk.len(),
                Err(e) => warn!(size = chunk.len(), "Expo push chunk failed: {}", e),
            }
        }

        if delivered > 0 {
            info!(delivered, "Sent push notifications");
        }
        Ok(delivered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::handlers::{Lists, Repository};
    use crate::db::models::lists::ListCreateDBRequest;
    use crate::test_utils::create_test_user;
    use crate::types::CollaboratorPermission;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(server: &MockServer, chunk_size: usize) -> NotificationsConfig {
        NotificationsConfig {
            enabled: true,
            expo_push_url: format!("{}/push", server.uri()).parse().unwrap(),
            chunk_size,
            timeout: Duration::from_secs(2),
        }
    }

    fn message(n: usize) -> PushMessage {
        PushMessage {
            to: format!("ExponentPushToken[{n}]"),
            sound: "default",
            title: "t".to_string(),
            body: "b".to_string(),
            data: json!({}),
        }
    }

    #[test]
    fn test_is_expo_push_token() {
        assert!(is_expo_push_token("ExponentPushToken[abc123]"));
        assert!(is_expo_push_token("ExpoPushToken[abc123]"));
        assert!(!is_expo_push_token("ExponentPushToken[]"));
        assert!(!is_expo_push_token("ExponentPushToken[abc"));
        assert!(!is_expo_push_token("fcm:abc"));
    }

    #[test]
    fn test_message_text() {
        let event = ItemAdded {
            actor: 1,
            list_id: 2,
            list_name: "Groceries".to_string(),
            item_id: 3,
            item_name: "Milk".to_string(),
        };
        let msg = event.message_for("ExpoPushToken[x]".to_string());
        assert_eq!(msg.body, "\"Milk\" was added to \"Groceries\"");
        assert_eq!(msg.data["listId"], 2);
        assert_eq!(msg.data["itemId"], 3);
    }

    #[tokio::test]
    async fn test_send_chunks_messages() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/push"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
            .expect(3)
            .mount(&server)
            .await;

        let notifier = Notifier::new(config(&server, 2));
        let messages: Vec<_> = (0..5).map(message).collect();

        assert_eq!(notifier.send(&messages).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_failed_chunk_is_swallowed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/push"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let notifier = Notifier::new(config(&server, 100));
        assert_eq!(notifier.send(&[message(1)]).await.unwrap(), 0);
    }

    #[sqlx::test]
    async fn test_item_added_notifies_other_members(pool: PgPool) {
        let owner = create_test_user(&pool, "owner@x.com").await;
        let friend = create_test_user(&pool, "friend@x.com").await;

        let mut conn = pool.acquire().await.unwrap();
        let list = Lists::new(&mut conn)
            .create(&ListCreateDBRequest {
                name: "Groceries".to_string(),
                description: None,
                owner_id: owner.id,
            })
            .await
            .unwrap();
        Collaborators::new(&mut conn)
            .grant(list.id, friend.id, CollaboratorPermission::Write)
            .await
            .unwrap();
        PushTokens::new(&mut conn).save(owner.id, "ExponentPushToken[owner]").await.unwrap();
        PushTokens::new(&mut conn).save(friend.id, "ExponentPushToken[friend]").await.unwrap();
        drop(conn);

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/push"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = Notifier::new(config(&server, 100));
        let handle = notifier
            .item_added(
                pool.clone(),
                ItemAdded {
                    actor: friend.id,
                    list_id: list.id,
                    list_name: list.name.clone(),
                    item_id: 1,
                    item_name: "Milk".to_string(),
                },
            )
            .unwrap();
        handle.await.unwrap();

        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        let sent = body.as_array().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0]["to"], "ExponentPushToken[owner]");
    }

    #[tokio::test]
    async fn test_disabled_notifier_does_nothing() {
        let notifier = Notifier::new(NotificationsConfig {
            enabled: false,
            ..Default::default()
        });
        let pool = PgPool::connect_lazy("postgres://localhost/unused").unwrap();
        let event = ItemAdded {
            actor: 1,
            list_id: 1,
            list_name: "x".to_string(),
            item_id: 1,
            item_name: "y".to_string(),
        };
        assert!(notifier.item_added(pool, event).is_none());
    }
}
