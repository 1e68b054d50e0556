//! Connected clients

use hostguard_api::ClientInfo;
use hostguard_util::ClientId;
use std::collections::HashMap;
use tokio::sync::{mpsc, RwLock};

struct Entry {
    info: ClientInfo,
    outgoing: mpsc::UnboundedSender<String>,
    subscribed: bool,
}

/// Outgoing queue and subscription flag per connected client
#[derive(Default)]
pub(crate) struct ClientRegistry {
    clients: RwLock<HashMap<ClientId, Entry>>,
}

impl ClientRegistry {
    pub async fn insert(
        &self,
        client_id: ClientId,
        info: ClientInfo,
        outgoing: mpsc::UnboundedSender<String>,
    ) {
        self.clients.write().await.insert(
            client_id,
            Entry {
                info,
                outgoing,
                subscribed: false,
            },
        );
    }

    /// Forget a client. Dropping its sender ends the writer task.
    pub async fn remove(&self, client_id: &ClientId) {
        self.clients.write().await.remove(client_id);
    }

    pub async fn set_subscribed(&self, client_id: &ClientId, subscribed: bool) {
        if let Some(entry) = self.clients.write().await.get_mut(client_id) {
            entry.subscribed = subscribed;
        }
    }

    pub async fn is_subscribed(&self, client_id: &ClientId) -> bool {
        self.clients
            .read()
            .await
            .get(client_id)
            .is_some_and(|e| e.subscribed)
    }

    /// Queue a line for a client. Returns false if the client is gone.
    pub async fn queue(&self, client_id: &ClientId, line: String) -> bool {
        match self.clients.read().await.get(client_id) {
            Some(entry) => entry.outgoing.send(line).is_ok(),
            None => false,
        }
    }

    pub async fn info(&self, client_id: &ClientId) -> Option<ClientInfo> {
        self.clients.read().await.get(client_id).map(|e| e.info.clone())
    }

    pub async fn len(&self) -> usize {
        self.clients.read().await.len()
    }

    pub async fn subscribed_len(&self) -> usize {
        self.clients
            .read()
            .await
            .values()
            .filter(|e| e.subscribed)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscription_and_removal() {
        let registry = ClientRegistry::default();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = ClientId::new();

        registry.insert(id.clone(), ClientInfo::new().with_uid(1000), tx).await;
        assert!(!registry.is_subscribed(&id).await);

        registry.set_subscribed(&id, true).await;
        assert_eq!(registry.subscribed_len().await, 1);
        assert_eq!(registry.info(&id).await.and_then(|i| i.uid), Some(1000));

        assert!(registry.queue(&id, "hello".into()).await);
        assert_eq!(rx.recv().await.as_deref(), Some("hello"));

        registry.remove(&id).await;
        assert!(!registry.queue(&id, "late".into()).await);
        assert_eq!(rx.recv().await, None);
    }
}
