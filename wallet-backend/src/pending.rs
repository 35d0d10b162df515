use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::errors::{WalletError, WalletResult};
use crate::ipc::{BackendMessage, RequestId};

/// Default time a request may stay unanswered.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug)]
struct PendingEntry {
    message_type: &'static str,
    sender: oneshot::Sender<BackendMessage>,
}

/// Outstanding requests keyed by ID.
#[derive(Debug, Clone, Default)]
pub struct PendingRequests {
    entries: Arc<Mutex<HashMap<RequestId, PendingEntry>>>,
}

/// Handle for one outstanding request.
#[derive(Debug)]
pub struct PendingResponse {
    id: RequestId,
    message_type: &'static str,
    receiver: oneshot::Receiver<BackendMessage>,
    requests: PendingRequests,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new request and returns the handle its reply resolves.
    pub fn register(&self, message_type: &'static str) -> PendingResponse {
        let id = RequestId::new();
        let (sender, receiver) = oneshot::channel();
        self.entries.lock().insert(
            id,
            PendingEntry {
                message_type,
                sender,
            },
        );
        PendingResponse {
            id,
            message_type,
            receiver,
            requests: self.clone(),
        }
    }

    /// Resolves the request `id`. Returns false when nothing was waiting on it.
    pub fn resolve(&self, id: &RequestId, message: BackendMessage) -> bool {
        let entry = self.entries.lock().remove(id);
        match entry {
            Some(entry) => {
                if entry.sender.send(message).is_err() {
                    log::debug!("{} request {} dropped before reply", entry.message_type, id);
                    return false;
                }
                true
            }
            None => {
                log::debug!("reply to unknown request {}", id);
                false
            }
        }
    }

    /// Drops the entry; its waiter observes `ChannelClosed`.
    pub fn reject(&self, id: &RequestId) -> bool {
        self.entries.lock().remove(id).is_some()
    }

    /// Rejects everything still outstanding.
    pub fn reject_all(&self) -> usize {
        let mut entries = self.entries.lock();
        let count = entries.len();
        entries.clear();
        count
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn contains(&self, id: &RequestId) -> bool {
        self.entries.lock().contains_key(id)
    }
}

impl PendingResponse {
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Waits for the reply. On timeout the entry is removed so a late reply is ignored.
    pub async fn wait(self, timeout: Duration) -> WalletResult<BackendMessage> {
        let PendingResponse {
            id,
            message_type,
            receiver,
            requests,
        } = self;

        match tokio::time::timeout(timeout, receiver).await {
            Ok(Ok(message)) => Ok(message),
            Ok(Err(_)) => Err(WalletError::ChannelClosed),
            Err(_) => {
                requests.reject(&id);
                log::warn!(
                    "{} request {} timed out after {:?}",
                    message_type,
                    id,
                    timeout
                );
                Err(WalletError::ConnectionTimeout)
            }
        }
    }
}
