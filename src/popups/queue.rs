use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, MutexGuard},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use uuid::Uuid;

use crate::{db::models::Achievement, rewards::Rank};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum PopupKind {
    RankUp,
    Achievement,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Popup {
    pub id: Uuid,
    pub kind: PopupKind,
    pub title: String,
    pub description: String,
    pub achievement_id: Option<i64>,
    pub rank: Option<Rank>,
    pub created_at: DateTime<Utc>,
}

impl Popup {
    pub fn rank_up(rank: Rank) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: PopupKind::RankUp,
            title: "Rank Up!".into(),
            description: format!("Congratulations! You've reached {}!", rank.name()),
            achievement_id: None,
            rank: Some(rank),
            created_at: Utc::now(),
        }
    }

    pub fn achievement(achievement: &Achievement) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: PopupKind::Achievement,
            title: "Achievement Unlocked!".into(),
            description: achievement.name.clone(),
            achievement_id: Some(achievement.id),
            rank: None,
            created_at: Utc::now(),
        }
    }
}

struct QueueInner {
    pending: Mutex<VecDeque<Popup>>,
    current: watch::Sender<Option<Popup>>,
}

/// FIFO of popups shown one at a time. The head is the popup on screen.
///
/// Cloning yields another handle to the same queue; producers and the single
/// consumer share it.
#[derive(Clone)]
pub struct PopupQueue {
    inner: Arc<QueueInner>,
}

impl Default for PopupQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl PopupQueue {
    pub fn new() -> Self {
        let (current, _) = watch::channel(None);
        Self {
            inner: Arc::new(QueueInner {
                pending: Mutex::new(VecDeque::new()),
                current,
            }),
        }
    }

    fn pending(&self) -> MutexGuard<'_, VecDeque<Popup>> {
        match self.inner.pending.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn publish(&self, queue: &VecDeque<Popup>) {
        let head = queue.front().cloned();
        self.inner.current.send_if_modified(|current| {
            if *current == head {
                false
            } else {
                *current = head;
                true
            }
        });
    }

    pub fn enqueue(&self, popup: Popup) {
        let mut queue = self.pending();
        queue.push_back(popup);
        self.publish(&queue);
    }

    /// Removes the popup on screen; the next one, if any, becomes current.
    pub fn dismiss(&self) -> Option<Popup> {
        let mut queue = self.pending();
        let dismissed = queue.pop_front();
        self.publish(&queue);
        dismissed
    }

    pub fn clear_all(&self) {
        let mut queue = self.pending();
        queue.clear();
        self.publish(&queue);
    }

    pub fn current(&self) -> Option<Popup> {
        self.pending().front().cloned()
    }

    pub fn has_popup(&self) -> bool {
        !self.pending().is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending().len()
    }

    pub fn is_empty(&self) -> bool {
        !self.has_popup()
    }

    /// Watches the popup on screen.
    pub fn subscribe(&self) -> watch::Receiver<Option<Popup>> {
        self.inner.current.subscribe()
    }

    pub fn show_rank_up(&self, rank: Rank) {
        self.enqueue(Popup::rank_up(rank));
    }

    pub fn show_achievement(&self, achievement: &Achievement) {
        self.enqueue(Popup::achievement(achievement));
    }
}
