// Pending format prompts, keyed by a per-prompt uuid
//
// The conversion task awaits a oneshot receiver; the interaction handler
// resolves it. Entries are removed on answer or on timeout, so a stale click
// can never reach a newer request.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::{oneshot, Mutex};
use tracing::debug;
use uuid::Uuid;

use crate::downloader::PipelineError;

const CUSTOM_ID_PREFIX: &str = "fmt:";

type Answer = Result<String, PipelineError>;

struct PendingPrompt {
    owner: u64,
    option_ids: Vec<String>,
    sender: oneshot::Sender<Answer>,
}

/// Handle held by the task that opened a prompt
pub struct PromptTicket {
    pub id: Uuid,
    receiver: oneshot::Receiver<Answer>,
}

impl PromptTicket {
    /// Component custom id carrying this prompt's id
    pub fn custom_id(&self) -> String {
        format!("{}{}", CUSTOM_ID_PREFIX, self.id)
    }
}

#[derive(Default)]
pub struct PromptRegistry {
    pending: Mutex<HashMap<Uuid, PendingPrompt>>,
}

impl PromptRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn open(&self, owner: u64, option_ids: Vec<String>) -> PromptTicket {
        let (sender, receiver) = oneshot::channel();
        let id = Uuid::new_v4();
        self.pending.lock().await.insert(
            id,
            PendingPrompt {
                owner,
                option_ids,
                sender,
            },
        );
        debug!(prompt_id = %id, owner, "prompt opened");
        PromptTicket { id, receiver }
    }

    /// Wait for the owner's answer. The prompt is dropped when `limit` elapses.
    pub async fn wait(&self, ticket: PromptTicket, limit: Duration) -> Answer {
        let PromptTicket { id, mut receiver } = ticket;
        match tokio::time::timeout(limit, &mut receiver).await {
            Ok(Ok(answer)) => answer,
            Ok(Err(_)) => Err(PipelineError::InvalidSelection("the prompt was closed".to_string())),
            Err(_) => {
                // A click that took the entry before this lock was acquired has
                // already been acknowledged, so its answer stands.
                if self.pending.lock().await.remove(&id).is_none() {
                    if let Ok(answer) = receiver.try_recv() {
                        return answer;
                    }
                }
                debug!(prompt_id = %id, "prompt timed out");
                Err(PipelineError::SelectionTimeout {
                    waited_secs: limit.as_secs(),
                })
            }
        }
    }

    /// Deliver a click. The returned error is meant for the clicking user only.
    pub async fn answer(&self, prompt_id: Uuid, user: u64, choice: &str) -> Result<(), PipelineError> {
        let mut pending = self.pending.lock().await;

        let owner = match pending.get(&prompt_id) {
            Some(prompt) => prompt.owner,
            None => {
                return Err(PipelineError::InvalidSelection(
                    "this menu has expired, run the command again".to_string(),
                ))
            }
        };
        if owner != user {
            return Err(PipelineError::InvalidSelection(
                "only the user who ran the command can choose a format".to_string(),
            ));
        }

        let Some(prompt) = pending.remove(&prompt_id) else {
            return Ok(());
        };
        let answer = if prompt.option_ids.iter().any(|id| id == choice) {
            Ok(choice.to_string())
        } else {
            Err(PipelineError::InvalidSelection(format!(
                "format '{}' was not one of the offered options",
                choice
            )))
        };

        prompt.sender.send(answer).map_err(|_| {
            debug!(prompt_id = %prompt_id, "answer arrived after the waiter left");
            PipelineError::InvalidSelection("this menu has expired, run the command again".to_string())
        })
    }

    /// Drop a prompt that could not be shown
    pub async fn cancel(&self, prompt_id: Uuid) {
        self.pending.lock().await.remove(&prompt_id);
    }

    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }
}

/// Extract the prompt id from a component custom id
pub fn parse_custom_id(custom_id: &str) -> Option<Uuid> {
    custom_id
        .strip_prefix(CUSTOM_ID_PREFIX)
        .and_then(|id| Uuid::parse_str(id).ok())
}
