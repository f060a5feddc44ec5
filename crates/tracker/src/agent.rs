//! The referral sync agent.
//!
//! Capture → persist → sync:
//! - [`ReferralSyncAgent::capture`] folds the page URL's identifiers into the
//!   stored record
//! - [`ReferralSyncAgent::reconcile`] compares the record with the live cart
//!   and writes the attributes only when they diverge
//! - [`ReferralSyncAgent::start`] captures once, reconciles once, then
//!   reconciles again on every [`CartUpdated`] notification
//!
//! Every failure is logged and dropped. There is no retry: the next page load
//! or cart notification is the retry.
//!
//! Overlapping reconciliations are not serialized. Two notifications in quick
//! succession run two independent fetch/update sequences; the worst case is a
//! duplicate write of identical attributes. A reconciliation is never
//! cancelled: once the listener stops, it waits for the ones it started.

use std::sync::Arc;

use chrono::Utc;
use referral_sync_core::{
    Capture, OrderReference, ReferralCode, ReferralRecord, TrackedFields, TrackingKeys,
};
use tokio::sync::Notify;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::cart::CartService;
use crate::config::DEFAULT_STORAGE_KEY;
use crate::events::{CartEvents, CartUpdated};
use crate::storage::RecordStore;

/// Result of [`ReferralSyncAgent::capture`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// The URL carried no tracked parameter; nothing was written.
    Empty,
    /// The merged record was written.
    Stored(ReferralRecord),
    /// The merged record could not be written (logged).
    NotPersisted,
}

/// Result of [`ReferralSyncAgent::reconcile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// No usable record is stored.
    NoRecord,
    /// The cart already carries the stored identifiers.
    InSync,
    /// The cart was updated with these identifiers.
    Updated(TrackedFields),
    /// Fetching or updating the cart failed (logged).
    Failed,
}

/// Captures referral identifiers and mirrors them into cart attributes.
pub struct ReferralSyncAgent<S, C> {
    store: S,
    cart: C,
    keys: TrackingKeys,
    storage_key: String,
}

impl<S: RecordStore, C: CartService> ReferralSyncAgent<S, C> {
    /// Create an agent with the default parameter names, attribute keys and
    /// storage key.
    #[must_use]
    pub fn new(store: S, cart: C) -> Self {
        Self {
            store,
            cart,
            keys: TrackingKeys::default(),
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
        }
    }

    /// Use custom query parameter names and cart attribute keys.
    #[must_use]
    pub fn with_keys(mut self, keys: TrackingKeys) -> Self {
        self.keys = keys;
        self
    }

    /// Store the record under a custom key.
    #[must_use]
    pub fn with_storage_key(mut self, storage_key: impl Into<String>) -> Self {
        self.storage_key = storage_key.into();
        self
    }

    /// The backing store.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// The remote cart.
    #[must_use]
    pub const fn cart(&self) -> &C {
        &self.cart
    }

    /// Fold the identifiers on `page` into the stored record.
    ///
    /// Newly observed identifiers replace stored ones; identifiers missing
    /// from the URL keep their stored value. A URL without any tracked
    /// parameter leaves the store untouched.
    pub fn capture(&self, page: &Url) -> CaptureOutcome {
        let capture = Capture::from_url(page, &self.keys);
        let fields = capture.fields();
        let previous = self.read_record();

        let Some(record) =
            ReferralRecord::merge(previous.as_ref(), capture, page.path(), Utc::now())
        else {
            return CaptureOutcome::Empty;
        };

        let encoded = match record.encode() {
            Ok(encoded) => encoded,
            Err(e) => {
                warn!(error = %e, "Failed to encode referral record");
                return CaptureOutcome::NotPersisted;
            }
        };

        if let Err(e) = self.store.set(&self.storage_key, &encoded) {
            warn!(error = %e, "Failed to persist referral record");
            return CaptureOutcome::NotPersisted;
        }

        info!(
            captured = ?fields.names(),
            code = record.code.as_ref().map(ReferralCode::as_str),
            order_id = record.order_id.as_ref().map(OrderReference::as_str),
            landing_page = %record.landing_page,
            "Captured referral"
        );

        CaptureOutcome::Stored(record)
    }

    /// The stored record, if one exists and is valid.
    ///
    /// Unreadable or malformed content is logged and treated as absent.
    #[must_use]
    pub fn read_record(&self) -> Option<ReferralRecord> {
        let raw = match self.store.get(&self.storage_key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "Failed to read referral record");
                return None;
            }
        };

        match ReferralRecord::decode(&raw) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable referral record");
                None
            }
        }
    }

    /// The stored referral code. Never touches the network.
    #[must_use]
    pub fn current_code(&self) -> Option<ReferralCode> {
        self.read_record().and_then(|record| record.code)
    }

    /// Remove the stored record. Clearing an absent record is a no-op.
    pub fn clear(&self) {
        match self.store.remove(&self.storage_key) {
            Ok(()) => debug!("Referral record cleared"),
            Err(e) => warn!(error = %e, "Failed to clear referral record"),
        }
    }

    /// Bring the cart attributes in line with the stored record.
    ///
    /// Writes once, and only if a stored identifier differs from the live
    /// cart. The update carries the metadata attributes plus every stored
    /// identifier.
    #[instrument(skip(self))]
    pub async fn reconcile(&self) -> ReconcileOutcome {
        let Some(record) = self.read_record() else {
            return ReconcileOutcome::NoRecord;
        };

        let live = match self.cart.attributes().await {
            Ok(live) => live,
            Err(e) => {
                warn!(error = %e, "Failed to fetch cart attributes");
                return ReconcileOutcome::Failed;
            }
        };

        let diverged = record.divergence(&live, &self.keys);
        if diverged.is_empty() {
            debug!("Cart attributes already carry the referral");
            return ReconcileOutcome::InSync;
        }
        debug!(diverged = ?diverged.names(), "Cart attributes out of date");

        let payload = record.cart_attributes(&self.keys);
        if let Err(e) = self.cart.update_attributes(&payload).await {
            warn!(error = %e, "Failed to update cart attributes");
            return ReconcileOutcome::Failed;
        }

        let written = record.fields();
        info!(
            fields = ?written.names(),
            code = record.code.as_ref().map(ReferralCode::as_str),
            order_id = record.order_id.as_ref().map(OrderReference::as_str),
            "Synced referral to cart attributes"
        );
        ReconcileOutcome::Updated(written)
    }
}

impl<S, C> ReferralSyncAgent<S, C>
where
    S: RecordStore + 'static,
    C: CartService,
{
    /// Build an agent from its collaborators and start it on `page`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn initialize(store: S, cart: C, events: &CartEvents, page: &Url) -> SyncHandle<S, C> {
        Self::new(store, cart).start(events, page)
    }

    /// Capture from `page`, schedule one reconciliation, and reconcile again on
    /// every cart notification until the bus closes.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(self, events: &CartEvents, page: &Url) -> SyncHandle<S, C> {
        self.capture(page);

        let agent = Arc::new(self);
        let receiver = events.subscribe();
        let shutdown = Arc::new(Notify::new());
        let startup = tokio::spawn(reconcile_shared(Arc::clone(&agent)));
        let listener = tokio::spawn(listen(
            Arc::clone(&agent),
            receiver,
            Arc::clone(&shutdown),
        ));

        SyncHandle {
            agent,
            startup,
            listener,
            shutdown,
        }
    }
}

/// A started agent and its background tasks.
pub struct SyncHandle<S, C> {
    /// The running agent.
    pub agent: Arc<ReferralSyncAgent<S, C>>,
    /// The reconciliation scheduled at start.
    pub startup: JoinHandle<ReconcileOutcome>,
    /// The notification listener. Finishes once the bus closes or
    /// [`SyncHandle::stop`] is called, and every reconciliation it started
    /// has completed.
    pub listener: JoinHandle<()>,
    shutdown: Arc<Notify>,
}

impl<S, C> SyncHandle<S, C> {
    /// Stop reacting to notifications.
    ///
    /// Reconciliations already in flight run to completion; await
    /// [`SyncHandle::listener`] to wait for them.
    pub fn stop(&self) {
        self.shutdown.notify_one();
    }
}

async fn reconcile_shared<S, C>(agent: Arc<ReferralSyncAgent<S, C>>) -> ReconcileOutcome
where
    S: RecordStore + 'static,
    C: CartService,
{
    agent.reconcile().await
}

async fn listen<S, C>(
    agent: Arc<ReferralSyncAgent<S, C>>,
    mut receiver: broadcast::Receiver<CartUpdated>,
    shutdown: Arc<Notify>,
) where
    S: RecordStore + 'static,
    C: CartService,
{
    let mut reconciles = JoinSet::new();

    loop {
        let received = tokio::select! {
            biased;
            () = shutdown.notified() => {
                debug!("Cart notification listener stopped");
                break;
            }
            received = receiver.recv() => received,
        };

        match received {
            Ok(CartUpdated) => debug!("Cart updated"),
            // Notifications carry no payload, so one reconcile covers them all
            Err(RecvError::Lagged(missed)) => debug!(missed, "Coalesced cart notifications"),
            Err(RecvError::Closed) => {
                debug!("Cart notification bus closed");
                break;
            }
        }

        while reconciles.try_join_next().is_some() {}
        reconciles.spawn(reconcile_shared(Arc::clone(&agent)));
    }

    if !reconciles.is_empty() {
        debug!(pending = reconciles.len(), "Waiting for in-flight reconciliations");
    }
    while reconciles.join_next().await.is_some() {}
}
