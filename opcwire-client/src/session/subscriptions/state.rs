//! The per-session subscription collection and the notification dispatch rules.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use log::{debug, warn};

use opcwire_types::{
    DataChangeNotification, DecodingOptions, EventNotificationList, NotificationMessage,
    ObjectId, StatusChangeNotification,
};

use super::Subscription;

/// All subscriptions of one session. Owned by the session, mutated from the service
/// wrappers and the publish loop.
pub(crate) struct SubscriptionState {
    subscriptions: HashMap<u32, Subscription>,
    /// Ids of subscriptions that used to exist. Operations on them fail with
    /// `BadObjectDeleted` rather than `BadSubscriptionIdInvalid`.
    deleted: HashSet<u32>,
}

impl SubscriptionState {
    pub(crate) fn new() -> Self {
        Self {
            subscriptions: HashMap::new(),
            deleted: HashSet::new(),
        }
    }

    pub(crate) fn subscription_ids(&self) -> Vec<u32> {
        self.subscriptions.keys().copied().collect()
    }

    pub(crate) fn contains(&self, subscription_id: u32) -> bool {
        self.subscriptions.contains_key(&subscription_id)
    }

    pub(crate) fn is_deleted(&self, subscription_id: u32) -> bool {
        self.deleted.contains(&subscription_id)
    }

    pub(crate) fn insert(&mut self, subscription: Subscription) {
        self.deleted.remove(&subscription.subscription_id());
        self.subscriptions
            .insert(subscription.subscription_id(), subscription);
    }

    pub(crate) fn get_mut(&mut self, subscription_id: u32) -> Option<&mut Subscription> {
        self.subscriptions.get_mut(&subscription_id)
    }

    /// Remove a subscription, marking it deleted and notifying its callback.
    pub(crate) fn remove(&mut self, subscription_id: u32) -> Option<Subscription> {
        let mut subscription = self.subscriptions.remove(&subscription_id)?;
        self.deleted.insert(subscription_id);
        subscription.callback.on_subscription_deleted();
        Some(subscription)
    }

    /// Take every subscription out, for the reconnect path which re-creates them under
    /// new server ids.
    pub(crate) fn drain_all(&mut self) -> Vec<Subscription> {
        self.subscriptions.drain().map(|(_, v)| v).collect()
    }

    /// Record that a subscription which is no longer in the collection is gone for good.
    pub(crate) fn mark_deleted(&mut self, subscription_id: u32) {
        self.deleted.insert(subscription_id);
    }

    /// The smallest revised publishing interval across subscriptions. Drives publish
    /// timeout hints and retry pacing.
    pub(crate) fn min_publishing_interval(&self) -> Option<Duration> {
        self.subscriptions
            .values()
            .map(|s| s.publishing_interval())
            .min()
    }

    /// Apply one notification message to the subscription it belongs to, fanning the
    /// notifications out to the item and subscription callbacks.
    pub(crate) fn handle_notification(
        &mut self,
        subscription_id: u32,
        message: NotificationMessage,
        options: &DecodingOptions,
    ) {
        let Some(subscription) = self.subscriptions.get_mut(&subscription_id) else {
            debug!(
                "Dropping notification for unknown subscription {}",
                subscription_id
            );
            return;
        };

        // Replay protection: a publish time at or before the newest one seen means a
        // retransmission, which is dropped whole
        if let Some(last) = subscription.last_publish_time() {
            if !message.publish_time.is_null() && message.publish_time <= last {
                debug!(
                    "Dropping replayed notification for subscription {} at {}",
                    subscription_id, message.publish_time
                );
                return;
            }
        }
        if !message.publish_time.is_null() {
            subscription.set_last_publish_time(message.publish_time);
        }

        let Some(notifications) = message.notification_data else {
            // A keep-alive, nothing to dispatch
            return;
        };

        for notification in notifications {
            match notification.object_id() {
                Some(ObjectId::DataChangeNotification_Encoding_DefaultBinary) => {
                    match notification.decode_inner::<DataChangeNotification>(options) {
                        Ok(data_change) => {
                            Self::dispatch_data_change(subscription, data_change);
                        }
                        Err(e) => warn!("Failed to decode data change notification: {}", e),
                    }
                }
                Some(ObjectId::EventNotificationList_Encoding_DefaultBinary) => {
                    match notification.decode_inner::<EventNotificationList>(options) {
                        Ok(events) => Self::dispatch_events(subscription, events),
                        Err(e) => warn!("Failed to decode event notification: {}", e),
                    }
                }
                Some(ObjectId::StatusChangeNotification_Encoding_DefaultBinary) => {
                    match notification.decode_inner::<StatusChangeNotification>(options) {
                        Ok(status_change) => {
                            subscription.set_status(status_change.status);
                            subscription
                                .callback
                                .on_subscription_status_change(status_change);
                        }
                        Err(e) => warn!("Failed to decode status change notification: {}", e),
                    }
                }
                other => {
                    // An unknown notification type is carried as opaque bytes; it has
                    // no meaning to this client and is skipped
                    debug!("Ignoring notification of unknown type {:?}", other);
                }
            }
        }
    }

    /// Store each value on its item and fire the callbacks. The whole batch is applied
    /// before control returns to the publish loop.
    fn dispatch_data_change(
        subscription: &mut Subscription,
        data_change: DataChangeNotification,
    ) {
        let Some(items) = data_change.monitored_items else {
            return;
        };
        for notification in items {
            let Some(item_id) = subscription.item_id_by_client_handle(notification.client_handle)
            else {
                debug!(
                    "Dropping notification for unknown client handle {}",
                    notification.client_handle
                );
                continue;
            };
            // The borrow dance: update the item, then hand an immutable reference to
            // the callback
            if let Some(item) = subscription.monitored_items.get_mut(&item_id) {
                item.set_last_value(notification.value.clone());
            }
            if let Some(item) = subscription.monitored_items.get(&item_id) {
                subscription.callback.on_data_value(notification.value, item);
            }
        }
    }

    fn dispatch_events(subscription: &mut Subscription, events: EventNotificationList) {
        let Some(events) = events.events else {
            return;
        };
        for event in events {
            let Some(item_id) = subscription.item_id_by_client_handle(event.client_handle) else {
                debug!(
                    "Dropping event for unknown client handle {}",
                    event.client_handle
                );
                continue;
            };
            if let Some(item) = subscription.monitored_items.get_mut(&item_id) {
                item.set_last_event(event.event_fields.clone());
            }
            if let Some(item) = subscription.monitored_items.get(&item_id) {
                subscription.callback.on_event(event.event_fields, item);
            }
        }
    }
}
