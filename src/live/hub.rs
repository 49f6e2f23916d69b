// src/live/hub.rs

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, broadcast};

use crate::config::REALTIME_CHANNEL_PREFIX;
use crate::live::protocol::{Envelope, PresenceEntry, PresenceEvent};

/// Broadcast buffer per topic. Delivery is at-most-once: a lagging
/// subscriber drops the oldest messages, never blocks the sender.
const TOPIC_CAPACITY: usize = 256;

/// In-process pub/sub fabric: a registry of per-session topics.
///
/// Stands in for the external managed transport. Guarantees per-topic FIFO
/// delivery to all current subscribers and keeps the authoritative presence
/// state per topic; it does not arbitrate writers, ownership of state
/// slices is partitioned by convention (presenter writes content/timer,
/// each participant writes its own presence and reactions).
#[derive(Clone, Default)]
pub struct LiveHub {
    topics: Arc<RwLock<HashMap<String, Topic>>>,
}

#[derive(Clone)]
struct Topic {
    sender: broadcast::Sender<Envelope>,
    presence: Arc<RwLock<HashMap<String, PresenceEntry>>>,
}

impl LiveHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Topic name derived deterministically from the session code.
    pub fn topic_for(session_code: &str) -> String {
        format!("{}{}", REALTIME_CHANNEL_PREFIX, session_code)
    }

    /// Creates the topic for a new live session. Idempotent.
    pub async fn open_topic(&self, session_code: &str) {
        let mut topics = self.topics.write().await;
        topics
            .entry(Self::topic_for(session_code))
            .or_insert_with(|| {
                let (sender, _) = broadcast::channel(TOPIC_CAPACITY);
                Topic {
                    sender,
                    presence: Arc::new(RwLock::new(HashMap::new())),
                }
            });
        tracing::info!("Topic opened for session {}", session_code);
    }

    /// Tears the topic down, disconnecting all subscribers.
    pub async fn close_topic(&self, session_code: &str) {
        let mut topics = self.topics.write().await;
        if topics.remove(&Self::topic_for(session_code)).is_some() {
            tracing::info!("Topic closed for session {}", session_code);
        }
    }

    /// Subscribes to a session topic. Returns `None` when the topic does
    /// not exist, letting callers degrade to a no-op stub.
    pub async fn subscribe(
        &self,
        session_code: &str,
    ) -> Option<(broadcast::Sender<Envelope>, broadcast::Receiver<Envelope>)> {
        let topics = self.topics.read().await;
        let topic = topics.get(&Self::topic_for(session_code))?;
        Some((topic.sender.clone(), topic.sender.subscribe()))
    }

    /// Fire-and-forget publish. A send error only means nobody is
    /// subscribed right now, which is not a failure.
    pub async fn publish(&self, session_code: &str, envelope: Envelope) {
        let topics = self.topics.read().await;
        if let Some(topic) = topics.get(&Self::topic_for(session_code)) {
            let _ = topic.sender.send(envelope);
        }
    }

    /// Registers a participant in the topic's presence state and emits the
    /// `join` delta followed by a full `sync` snapshot. A duplicate display
    /// name overwrites the earlier entrant (accepted tradeoff).
    pub async fn track(&self, session_code: &str, entry: PresenceEntry) {
        let (sender, snapshot) = {
            let topics = self.topics.read().await;
            let Some(topic) = topics.get(&Self::topic_for(session_code)) else {
                return;
            };
            let mut presence = topic.presence.write().await;
            presence.insert(entry.name.clone(), entry.clone());
            (sender_of(topic), presence.values().cloned().collect())
        };

        let _ = sender.send(Envelope::Presence {
            event: PresenceEvent::Join {
                new_presences: vec![entry],
            },
        });
        let _ = sender.send(Envelope::Presence {
            event: PresenceEvent::Sync { state: snapshot },
        });
    }

    /// Removes a participant and emits `leave` plus a fresh `sync`.
    pub async fn untrack(&self, session_code: &str, name: &str) {
        let (sender, left, snapshot) = {
            let topics = self.topics.read().await;
            let Some(topic) = topics.get(&Self::topic_for(session_code)) else {
                return;
            };
            let mut presence = topic.presence.write().await;
            let Some(left) = presence.remove(name) else {
                return;
            };
            (sender_of(topic), left, presence.values().cloned().collect())
        };

        let _ = sender.send(Envelope::Presence {
            event: PresenceEvent::Leave {
                left_presences: vec![left],
            },
        });
        let _ = sender.send(Envelope::Presence {
            event: PresenceEvent::Sync { state: snapshot },
        });
    }

    /// Current transport-reported presence snapshot for a topic.
    pub async fn presence_state(&self, session_code: &str) -> Vec<PresenceEntry> {
        let topics = self.topics.read().await;
        match topics.get(&Self::topic_for(session_code)) {
            Some(topic) => topic.presence.read().await.values().cloned().collect(),
            None => Vec::new(),
        }
    }

    pub async fn topic_exists(&self, session_code: &str) -> bool {
        self.topics
            .read()
            .await
            .contains_key(&Self::topic_for(session_code))
    }
}

fn sender_of(topic: &Topic) -> broadcast::Sender<Envelope> {
    topic.sender.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::live::protocol::Role;

    #[tokio::test]
    async fn subscribe_fails_on_unknown_topic() {
        let hub = LiveHub::new();
        assert!(hub.subscribe("AULAPUDU-00000").await.is_none());
    }

    #[tokio::test]
    async fn publish_reaches_all_subscribers_in_order() {
        let hub = LiveHub::new();
        hub.open_topic("AULAPUDU-12345").await;

        let (_, mut rx_a) = hub.subscribe("AULAPUDU-12345").await.unwrap();
        let (_, mut rx_b) = hub.subscribe("AULAPUDU-12345").await.unwrap();

        for message in ["uno", "dos", "tres"] {
            hub.publish(
                "AULAPUDU-12345",
                Envelope::Broadcast {
                    event: crate::live::protocol::BroadcastEvent::SessionDelete(
                        crate::live::protocol::SessionDelete {
                            message: message.to_string(),
                        },
                    ),
                },
            )
            .await;
        }

        for rx in [&mut rx_a, &mut rx_b] {
            for expected in ["uno", "dos", "tres"] {
                match rx.recv().await.unwrap() {
                    Envelope::Broadcast {
                        event:
                            crate::live::protocol::BroadcastEvent::SessionDelete(payload),
                    } => assert_eq!(payload.message, expected),
                    other => panic!("unexpected envelope: {:?}", other),
                }
            }
        }
    }

    #[tokio::test]
    async fn track_emits_join_then_sync() {
        let hub = LiveHub::new();
        hub.open_topic("AULAPUDU-12345").await;
        let (_, mut rx) = hub.subscribe("AULAPUDU-12345").await.unwrap();

        hub.track(
            "AULAPUDU-12345",
            PresenceEntry {
                name: "Ana".to_string(),
                role: Role::Spectator,
            },
        )
        .await;

        match rx.recv().await.unwrap() {
            Envelope::Presence {
                event: PresenceEvent::Join { new_presences },
            } => assert_eq!(new_presences[0].name, "Ana"),
            other => panic!("expected join, got {:?}", other),
        }
        match rx.recv().await.unwrap() {
            Envelope::Presence {
                event: PresenceEvent::Sync { state },
            } => assert_eq!(state.len(), 1),
            other => panic!("expected sync, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn untrack_unknown_name_is_silent() {
        let hub = LiveHub::new();
        hub.open_topic("AULAPUDU-12345").await;
        let (_, mut rx) = hub.subscribe("AULAPUDU-12345").await.unwrap();

        hub.untrack("AULAPUDU-12345", "nadie").await;
        assert!(rx.try_recv().is_err());
    }
}
