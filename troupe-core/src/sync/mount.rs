use std::sync::Arc;

use tokio::task::JoinHandle;

use super::TableSync;

/// A [`TableSync`] in use, with at most one open push channel.
///
/// Mounting fetches once and, for realtime bindings with a live backend,
/// subscribes to the bound table. Every notification triggers a full refetch.
/// Unmounting (or dropping) closes the channel.
pub struct MountedTable {
    sync: Arc<TableSync>,
    listener: Option<JoinHandle<()>>,
}

impl MountedTable {
    pub async fn mount(sync: Arc<TableSync>) -> Self {
        sync.fetch().await;

        let listener = if sync.binding().realtime {
            listen(&sync).await
        } else {
            None
        };

        Self { sync, listener }
    }

    pub fn sync(&self) -> &Arc<TableSync> {
        &self.sync
    }

    pub fn is_subscribed(&self) -> bool {
        self.listener
            .as_ref()
            .is_some_and(|listener| !listener.is_finished())
    }

    /// Closes the push channel and waits until it is gone.
    pub async fn unmount(mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
            let _ = listener.await;
            tracing::debug!("Unsubscribed from '{}'", self.sync.binding().table);
        }
    }
}

impl Drop for MountedTable {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
    }
}

/// Opens the push channel and spawns the refetch loop.
///
/// The loop holds only a weak reference, so it ends on its own once the
/// binding is gone. It also ends, closing the channel, when the connectivity
/// flag goes off.
async fn listen(sync: &Arc<TableSync>) -> Option<JoinHandle<()>> {
    let backend = sync.connected_backend()?.clone();
    let table = sync.binding().table.clone();
    let mut connectivity = sync.connectivity().changes();

    let mut feed = match backend.subscribe(&table).await {
        Ok(feed) => feed,
        Err(e) => {
            tracing::warn!("Failed to subscribe to '{}': {}", table, e);
            return None;
        }
    };
    tracing::debug!("Subscribed to '{}'", table);

    let weak = Arc::downgrade(sync);
    Some(tokio::spawn(async move {
        loop {
            tokio::select! {
                event = feed.next() => {
                    let Some(event) = event else {
                        break;
                    };
                    let Some(sync) = weak.upgrade() else {
                        break;
                    };
                    tracing::debug!("{:?} on '{}', refetching", event.kind, event.table);
                    sync.fetch().await;
                }
                changed = connectivity.changed() => {
                    if changed.is_err() || !*connectivity.borrow_and_update() {
                        tracing::debug!("Disconnected, closing channel on '{}'", table);
                        break;
                    }
                }
            }
        }
    }))
}
