//! Change notification for observed datasets.
//!
//! Query results carry the [`Dataset`] they should be re-run on. Writers publish to the
//! [`ChangeNotifier`]; observers hold a [`ChangeSubscription`] filtered to one dataset.

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::trace;

/// Default number of buffered notifications per subscriber.
pub const DEFAULT_CAPACITY: usize = 64;

/// A dataset whose changes can be observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Dataset {
    /// All public key rings, user ids and certifications.
    KeyRings,
    TrustIdentities,
}

impl Dataset {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::KeyRings => "key_rings",
            Self::TrustIdentities => "trust_identities",
        }
    }
}

/// Fan-out of dataset change events.
#[derive(Debug, Clone)]
pub struct ChangeNotifier {
    sender: broadcast::Sender<Dataset>,
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl ChangeNotifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish a change. Returns the number of live subscribers.
    pub fn notify(&self, dataset: Dataset) -> usize {
        let receivers = self.sender.send(dataset).unwrap_or(0);
        trace!(dataset = dataset.as_str(), receivers, "published change");
        receivers
    }

    /// Observe changes to a single dataset.
    pub fn subscribe(&self, dataset: Dataset) -> ChangeSubscription {
        ChangeSubscription {
            dataset,
            receiver: self.sender.subscribe(),
        }
    }
}

/// Receiver side of a [`ChangeNotifier`], filtered to one dataset.
#[derive(Debug)]
pub struct ChangeSubscription {
    dataset: Dataset,
    receiver: broadcast::Receiver<Dataset>,
}

impl ChangeSubscription {
    pub fn dataset(&self) -> Dataset {
        self.dataset
    }

    /// Wait until the dataset changes.
    ///
    /// A lagged receiver may have missed a change, so lagging counts as changed. Returns
    /// `false` once the notifier is gone.
    pub async fn changed(&mut self) -> bool {
        loop {
            match self.receiver.recv().await {
                Ok(dataset) if dataset == self.dataset => return true,
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => return true,
                Err(broadcast::error::RecvError::Closed) => return false,
            }
        }
    }
}
