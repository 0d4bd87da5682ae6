//! Client side subscription and monitored item state, and the notification callbacks.

pub(crate) mod event_loop;
pub(crate) mod state;

use std::{collections::BTreeSet, time::Duration};

use opcwire_types::{
    DataValue, ExtensionObject, MonitoringMode, ReadValueId, StatusChangeNotification,
    StatusCode, TimestampsToReturn, Variant,
};

/// A set of callbacks for notifications on a subscription. You may implement this on
/// your own struct, or use [`SubscriptionCallbacks`] for a simple collection of
/// closures.
pub trait OnSubscriptionNotification: Send + Sync {
    /// Called when the subscription changes state on the server.
    #[allow(unused)]
    fn on_subscription_status_change(&mut self, notification: StatusChangeNotification) {}

    /// Called when the subscription is deleted, locally or on the server.
    #[allow(unused)]
    fn on_subscription_deleted(&mut self) {}

    /// Called for each changed data value.
    #[allow(unused)]
    fn on_data_value(&mut self, notification: DataValue, item: &MonitoredItem) {}

    /// Called for each received event.
    #[allow(unused)]
    fn on_event(&mut self, event_fields: Option<Vec<Variant>>, item: &MonitoredItem) {}
}

type StatusChangeCallbackFun = dyn FnMut(StatusChangeNotification) + Send + Sync;
type DataChangeCallbackFun = dyn FnMut(DataValue, &MonitoredItem) + Send + Sync;
type EventCallbackFun = dyn FnMut(Option<Vec<Variant>>, &MonitoredItem) + Send + Sync;

/// A convenient wrapper around a set of callback functions that implements
/// [`OnSubscriptionNotification`].
pub struct SubscriptionCallbacks {
    status_change: Box<StatusChangeCallbackFun>,
    data_value: Box<DataChangeCallbackFun>,
    event: Box<EventCallbackFun>,
}

impl SubscriptionCallbacks {
    /// Create a new subscription callback wrapper.
    pub fn new(
        status_change: impl FnMut(StatusChangeNotification) + Send + Sync + 'static,
        data_value: impl FnMut(DataValue, &MonitoredItem) + Send + Sync + 'static,
        event: impl FnMut(Option<Vec<Variant>>, &MonitoredItem) + Send + Sync + 'static,
    ) -> Self {
        Self {
            status_change: Box::new(status_change) as Box<StatusChangeCallbackFun>,
            data_value: Box::new(data_value) as Box<DataChangeCallbackFun>,
            event: Box::new(event) as Box<EventCallbackFun>,
        }
    }
}

impl OnSubscriptionNotification for SubscriptionCallbacks {
    fn on_subscription_status_change(&mut self, notification: StatusChangeNotification) {
        (self.status_change)(notification);
    }

    fn on_data_value(&mut self, notification: DataValue, item: &MonitoredItem) {
        (self.data_value)(notification, item);
    }

    fn on_event(&mut self, event_fields: Option<Vec<Variant>>, item: &MonitoredItem) {
        (self.event)(event_fields, item);
    }
}

/// A wrapper around a data change callback that implements
/// [`OnSubscriptionNotification`].
pub struct DataChangeCallback {
    data_value: Box<DataChangeCallbackFun>,
}

impl DataChangeCallback {
    /// Create a new data change callback wrapper.
    pub fn new(data_value: impl FnMut(DataValue, &MonitoredItem) + Send + Sync + 'static) -> Self {
        Self {
            data_value: Box::new(data_value) as Box<DataChangeCallbackFun>,
        }
    }
}

impl OnSubscriptionNotification for DataChangeCallback {
    fn on_data_value(&mut self, notification: DataValue, item: &MonitoredItem) {
        (self.data_value)(notification, item);
    }
}

/// The creation parameters of a subscription, kept so the subscription can be recreated
/// after a reconnect.
#[derive(Debug, Clone)]
pub struct SubscriptionParameters {
    /// Requested publishing interval in milliseconds.
    pub publishing_interval: f64,
    /// Requested lifetime count.
    pub lifetime_count: u32,
    /// Requested max keep alive count.
    pub max_keep_alive_count: u32,
    /// Max notifications per publish, 0 for no limit.
    pub max_notifications_per_publish: u32,
    /// Subscription priority.
    pub priority: u8,
    /// Whether publishing starts enabled.
    pub publishing_enabled: bool,
}

#[derive(Debug, Clone)]
/// Client-side representation of a monitored item.
pub struct MonitoredItem {
    /// Server assigned id of the item within the subscription.
    id: u32,
    /// Client assigned handle, carried in notifications.
    client_handle: u32,
    /// The attribute being monitored.
    item_to_monitor: ReadValueId,
    /// Monitoring mode.
    monitoring_mode: MonitoringMode,
    /// Requested sampling interval.
    sampling_interval: f64,
    /// Requested queue size.
    queue_size: u32,
    /// Whether the oldest value is discarded on queue overflow.
    discard_oldest: bool,
    /// The active filter.
    filter: ExtensionObject,
    /// Which timestamps the item was created with, for recreation grouping.
    timestamps_to_return: TimestampsToReturn,
    /// Server ids of items triggered by this one.
    triggered_items: BTreeSet<u32>,
    /// The last observed value.
    last_value: DataValue,
    /// The fields of the last observed event.
    last_event: Option<Vec<Variant>>,
    /// Set when creation failed or the item was deleted. A deleted item stays usable as
    /// a record but no operation touches the server.
    deleted: bool,
}

impl MonitoredItem {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        id: u32,
        client_handle: u32,
        item_to_monitor: ReadValueId,
        monitoring_mode: MonitoringMode,
        sampling_interval: f64,
        queue_size: u32,
        discard_oldest: bool,
        filter: ExtensionObject,
        timestamps_to_return: TimestampsToReturn,
        deleted: bool,
    ) -> Self {
        Self {
            id,
            client_handle,
            item_to_monitor,
            monitoring_mode,
            sampling_interval,
            queue_size,
            discard_oldest,
            filter,
            timestamps_to_return,
            triggered_items: BTreeSet::new(),
            last_value: DataValue::null(),
            last_event: None,
            deleted,
        }
    }

    /// Server assigned id of the monitored item.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Client assigned handle for the monitored item.
    pub fn client_handle(&self) -> u32 {
        self.client_handle
    }

    /// Attribute and node id the item monitors.
    pub fn item_to_monitor(&self) -> &ReadValueId {
        &self.item_to_monitor
    }

    /// The monitoring mode of the item.
    pub fn monitoring_mode(&self) -> MonitoringMode {
        self.monitoring_mode
    }

    /// The sampling interval of the item.
    pub fn sampling_interval(&self) -> f64 {
        self.sampling_interval
    }

    /// The queue size on the server.
    pub fn queue_size(&self) -> u32 {
        self.queue_size
    }

    /// Whether the oldest value is discarded on queue overflow.
    pub fn discard_oldest(&self) -> bool {
        self.discard_oldest
    }

    /// Which timestamps the item was created with.
    pub fn timestamps_to_return(&self) -> TimestampsToReturn {
        self.timestamps_to_return
    }

    /// The active filter of the item.
    pub fn filter(&self) -> &ExtensionObject {
        &self.filter
    }

    /// The last value received for this item.
    pub fn last_value(&self) -> &DataValue {
        &self.last_value
    }

    /// The fields of the last event received for this item.
    pub fn last_event(&self) -> Option<&Vec<Variant>> {
        self.last_event.as_ref()
    }

    /// `true` once the item has been deleted or failed to create.
    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    /// Server ids of the items this item triggers.
    pub fn triggered_items(&self) -> &BTreeSet<u32> {
        &self.triggered_items
    }

    pub(crate) fn set_id(&mut self, id: u32) {
        self.id = id;
    }

    pub(crate) fn set_sampling_interval(&mut self, value: f64) {
        self.sampling_interval = value;
    }

    pub(crate) fn set_queue_size(&mut self, value: u32) {
        self.queue_size = value;
    }

    pub(crate) fn set_monitoring_mode(&mut self, monitoring_mode: MonitoringMode) {
        self.monitoring_mode = monitoring_mode;
    }

    pub(crate) fn set_deleted(&mut self) {
        self.deleted = true;
    }

    pub(crate) fn set_last_value(&mut self, value: DataValue) {
        self.last_value = value;
    }

    pub(crate) fn set_last_event(&mut self, event_fields: Option<Vec<Variant>>) {
        self.last_event = event_fields;
    }

    /// Maintain the local triggering links from the diff the server accepted.
    pub(crate) fn set_triggering(&mut self, links_to_add: &[u32], links_to_remove: &[u32]) {
        links_to_remove.iter().for_each(|i| {
            self.triggered_items.remove(i);
        });
        links_to_add.iter().for_each(|i| {
            self.triggered_items.insert(*i);
        });
    }

    pub(crate) fn remap_triggered_items(
        &mut self,
        id_map: &std::collections::HashMap<u32, u32>,
    ) {
        self.triggered_items = self
            .triggered_items
            .iter()
            .filter_map(|old| id_map.get(old).copied())
            .collect();
    }
}

/// Client-side representation of a subscription.
pub struct Subscription {
    /// Subscription id, supplied by the server.
    subscription_id: u32,
    /// The parameters the subscription was created with, for recreation.
    parameters: SubscriptionParameters,
    /// Publishing interval granted by the server.
    publishing_interval: Duration,
    /// Lifetime count granted by the server.
    lifetime_count: u32,
    /// Max keep alive count granted by the server.
    max_keep_alive_count: u32,
    /// Whether publishing is enabled.
    publishing_enabled: bool,
    /// Subscription priority.
    priority: u8,
    /// The last status reported by the server.
    status: StatusCode,
    /// The publish time of the newest notification seen, for replay protection.
    last_publish_time: Option<opcwire_types::DateTime>,
    /// Monitored items by server id.
    monitored_items: std::collections::HashMap<u32, MonitoredItem>,
    /// Client handle to monitored item id.
    client_handles: std::collections::HashMap<u32, u32>,
    /// The notification callback.
    pub(crate) callback: Box<dyn OnSubscriptionNotification>,
}

impl Subscription {
    pub(crate) fn new(
        subscription_id: u32,
        parameters: SubscriptionParameters,
        revised_publishing_interval: Duration,
        revised_lifetime_count: u32,
        revised_max_keep_alive_count: u32,
        callback: Box<dyn OnSubscriptionNotification>,
    ) -> Subscription {
        Subscription {
            subscription_id,
            publishing_enabled: parameters.publishing_enabled,
            priority: parameters.priority,
            parameters,
            publishing_interval: revised_publishing_interval,
            lifetime_count: revised_lifetime_count,
            max_keep_alive_count: revised_max_keep_alive_count,
            status: StatusCode::Good,
            last_publish_time: None,
            monitored_items: std::collections::HashMap::new(),
            client_handles: std::collections::HashMap::new(),
            callback,
        }
    }

    /// The server assigned subscription id.
    pub fn subscription_id(&self) -> u32 {
        self.subscription_id
    }

    /// The publishing interval granted by the server.
    pub fn publishing_interval(&self) -> Duration {
        self.publishing_interval
    }

    /// The lifetime count granted by the server.
    pub fn lifetime_count(&self) -> u32 {
        self.lifetime_count
    }

    /// The keep alive count granted by the server.
    pub fn max_keep_alive_count(&self) -> u32 {
        self.max_keep_alive_count
    }

    /// Whether publishing is enabled.
    pub fn publishing_enabled(&self) -> bool {
        self.publishing_enabled
    }

    /// The subscription priority.
    pub fn priority(&self) -> u8 {
        self.priority
    }

    /// The last status the server reported for the subscription.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// The monitored items of the subscription, by server id.
    pub fn monitored_items(&self) -> &std::collections::HashMap<u32, MonitoredItem> {
        &self.monitored_items
    }

    /// The creation parameters, used when the subscription is recreated.
    pub fn parameters(&self) -> &SubscriptionParameters {
        &self.parameters
    }

    pub(crate) fn set_subscription_id(&mut self, subscription_id: u32) {
        self.subscription_id = subscription_id;
    }

    pub(crate) fn set_revised(
        &mut self,
        publishing_interval: Duration,
        lifetime_count: u32,
        max_keep_alive_count: u32,
    ) {
        self.publishing_interval = publishing_interval;
        self.lifetime_count = lifetime_count;
        self.max_keep_alive_count = max_keep_alive_count;
    }

    pub(crate) fn set_parameters(&mut self, parameters: SubscriptionParameters) {
        self.publishing_enabled = parameters.publishing_enabled;
        self.priority = parameters.priority;
        self.parameters = parameters;
    }

    pub(crate) fn set_publishing_enabled(&mut self, enabled: bool) {
        self.publishing_enabled = enabled;
        self.parameters.publishing_enabled = enabled;
    }

    pub(crate) fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    pub(crate) fn last_publish_time(&self) -> Option<opcwire_types::DateTime> {
        self.last_publish_time
    }

    pub(crate) fn set_last_publish_time(&mut self, time: opcwire_types::DateTime) {
        self.last_publish_time = Some(time);
    }

    /// Insert a monitored item created on the server.
    pub(crate) fn insert_monitored_item(&mut self, item: MonitoredItem) {
        self.client_handles.insert(item.client_handle(), item.id());
        self.monitored_items.insert(item.id(), item);
    }

    pub(crate) fn remove_monitored_item(&mut self, id: u32) {
        if let Some(item) = self.monitored_items.remove(&id) {
            self.client_handles.remove(&item.client_handle());
        }
    }

    pub(crate) fn monitored_item_mut(&mut self, id: u32) -> Option<&mut MonitoredItem> {
        self.monitored_items.get_mut(&id)
    }

    pub(crate) fn item_id_by_client_handle(&self, client_handle: u32) -> Option<u32> {
        self.client_handles.get(&client_handle).copied()
    }

    pub(crate) fn take_monitored_items(&mut self) -> Vec<MonitoredItem> {
        self.client_handles.clear();
        self.monitored_items.drain().map(|(_, v)| v).collect()
    }
}
