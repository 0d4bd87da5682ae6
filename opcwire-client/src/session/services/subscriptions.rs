//! Subscription and monitored item services, with the local-state update rules: only
//! operations the server reports as Good touch the local collections, and per-item
//! results correlate with their requests by index.

use std::collections::HashMap;
use std::time::Duration;

use log::{debug, warn};

use opcwire_core::ResponseMessage;
use opcwire_types::{
    CreateMonitoredItemsRequest, CreateSubscriptionRequest, DeleteMonitoredItemsRequest,
    DeleteSubscriptionsRequest, Error, ModifyMonitoredItemsRequest, ModifySubscriptionRequest,
    MonitoredItemCreateRequest, MonitoredItemCreateResult, MonitoredItemModifyRequest,
    MonitoredItemModifyResult, MonitoringMode, SetMonitoringModeRequest,
    SetPublishingModeRequest, SetTriggeringRequest, StatusCode, TimestampsToReturn,
    TransferResult, TransferSubscriptionsRequest,
};

use crate::session::{
    process_service_result, process_unexpected_response, session_debug, session_warn, Session,
};
use crate::session::subscriptions::{
    MonitoredItem, OnSubscriptionNotification, Subscription, SubscriptionParameters,
};

impl Session {
    /// Create a subscription, delivering its notifications through `callback`. Returns
    /// the server assigned subscription id.
    pub async fn create_subscription(
        &self,
        publishing_interval: Duration,
        lifetime_count: u32,
        max_keep_alive_count: u32,
        max_notifications_per_publish: u32,
        priority: u8,
        publishing_enabled: bool,
        callback: impl OnSubscriptionNotification + 'static,
    ) -> Result<u32, Error> {
        let parameters = SubscriptionParameters {
            publishing_interval: publishing_interval.as_millis() as f64,
            lifetime_count,
            max_keep_alive_count,
            max_notifications_per_publish,
            priority,
            publishing_enabled,
        };
        let subscription = self
            .create_subscription_inner(&parameters, Box::new(callback))
            .await?;
        let subscription_id = subscription.subscription_id();
        {
            let mut state = self.subscription_state.lock();
            state.insert(subscription);
        }
        // Wake the publish loop, which idles while there is nothing to publish
        self.trigger_publish();
        Ok(subscription_id)
    }

    async fn create_subscription_inner(
        &self,
        parameters: &SubscriptionParameters,
        callback: Box<dyn OnSubscriptionNotification>,
    ) -> Result<Subscription, Error> {
        let request = CreateSubscriptionRequest {
            request_header: Default::default(),
            requested_publishing_interval: parameters.publishing_interval,
            requested_lifetime_count: parameters.lifetime_count,
            requested_max_keep_alive_count: parameters.max_keep_alive_count,
            max_notifications_per_publish: parameters.max_notifications_per_publish,
            publishing_enabled: parameters.publishing_enabled,
            priority: parameters.priority,
        };
        match self.send(request).await? {
            ResponseMessage::CreateSubscription(response) => {
                process_service_result(&response.response_header)?;
                session_debug!(
                    self,
                    "Created subscription {} with publishing interval {}ms",
                    response.subscription_id,
                    response.revised_publishing_interval
                );
                Ok(Subscription::new(
                    response.subscription_id,
                    parameters.clone(),
                    Duration::from_millis(response.revised_publishing_interval.max(0.0) as u64),
                    response.revised_lifetime_count,
                    response.revised_max_keep_alive_count,
                    callback,
                ))
            }
            other => Err(process_unexpected_response(other)),
        }
    }

    /// Modify a subscription's parameters. Local state follows the revised values the
    /// server returns.
    pub async fn modify_subscription(
        &self,
        subscription_id: u32,
        publishing_interval: Duration,
        lifetime_count: u32,
        max_keep_alive_count: u32,
        max_notifications_per_publish: u32,
        priority: u8,
    ) -> Result<(), Error> {
        self.check_subscription_exists(subscription_id)?;

        let request = ModifySubscriptionRequest {
            request_header: Default::default(),
            subscription_id,
            requested_publishing_interval: publishing_interval.as_millis() as f64,
            requested_lifetime_count: lifetime_count,
            requested_max_keep_alive_count: max_keep_alive_count,
            max_notifications_per_publish,
            priority,
        };
        match self.send(request).await? {
            ResponseMessage::ModifySubscription(response) => {
                process_service_result(&response.response_header)?;
                let mut state = self.subscription_state.lock();
                if let Some(subscription) = state.get_mut(subscription_id) {
                    let mut parameters = subscription.parameters().clone();
                    parameters.publishing_interval = publishing_interval.as_millis() as f64;
                    parameters.lifetime_count = lifetime_count;
                    parameters.max_keep_alive_count = max_keep_alive_count;
                    parameters.max_notifications_per_publish = max_notifications_per_publish;
                    parameters.priority = priority;
                    subscription.set_parameters(parameters);
                    subscription.set_revised(
                        Duration::from_millis(
                            response.revised_publishing_interval.max(0.0) as u64
                        ),
                        response.revised_lifetime_count,
                        response.revised_max_keep_alive_count,
                    );
                }
                Ok(())
            }
            other => Err(process_unexpected_response(other)),
        }
    }

    /// Enable or disable publishing on subscriptions. Only subscriptions whose result is
    /// Good change locally.
    pub async fn set_publishing_mode(
        &self,
        subscription_ids: &[u32],
        publishing_enabled: bool,
    ) -> Result<Vec<StatusCode>, Error> {
        if subscription_ids.is_empty() {
            return Err(Error::new(
                StatusCode::BadNothingToDo,
                "No subscriptions to change",
            ));
        }

        let request = SetPublishingModeRequest {
            request_header: Default::default(),
            publishing_enabled,
            subscription_ids: Some(subscription_ids.to_vec()),
        };
        match self.send(request).await? {
            ResponseMessage::SetPublishingMode(response) => {
                process_service_result(&response.response_header)?;
                let results = response.results.unwrap_or_default();
                let mut state = self.subscription_state.lock();
                for (id, result) in subscription_ids.iter().zip(results.iter()) {
                    if result.is_good() {
                        if let Some(subscription) = state.get_mut(*id) {
                            subscription.set_publishing_enabled(publishing_enabled);
                        }
                    }
                }
                Ok(results)
            }
            other => Err(process_unexpected_response(other)),
        }
    }

    /// Transfer subscriptions to this session, or away from it. A subscription of this
    /// session that transfers successfully is removed locally and marked deleted.
    pub async fn transfer_subscriptions(
        &self,
        subscription_ids: &[u32],
        send_initial_values: bool,
    ) -> Result<Vec<TransferResult>, Error> {
        if subscription_ids.is_empty() {
            return Err(Error::new(
                StatusCode::BadNothingToDo,
                "No subscriptions to transfer",
            ));
        }

        let request = TransferSubscriptionsRequest {
            request_header: Default::default(),
            subscription_ids: Some(subscription_ids.to_vec()),
            send_initial_values,
        };
        match self.send(request).await? {
            ResponseMessage::TransferSubscriptions(response) => {
                process_service_result(&response.response_header)?;
                let results = response.results.unwrap_or_default();
                let mut state = self.subscription_state.lock();
                for (id, result) in subscription_ids.iter().zip(results.iter()) {
                    if result.status_code.is_good() {
                        state.remove(*id);
                    }
                }
                Ok(results)
            }
            other => Err(process_unexpected_response(other)),
        }
    }

    /// Delete one subscription and everything it owns.
    pub async fn delete_subscription(&self, subscription_id: u32) -> Result<(), Error> {
        let results = self.delete_subscriptions(&[subscription_id]).await?;
        let status = results.first().copied().unwrap_or(StatusCode::Good);
        if status.is_bad() {
            Err(Error::new(status, "Failed to delete the subscription"))
        } else {
            Ok(())
        }
    }

    /// Delete subscriptions. Subscriptions whose result is Good are removed locally and
    /// marked deleted.
    pub async fn delete_subscriptions(
        &self,
        subscription_ids: &[u32],
    ) -> Result<Vec<StatusCode>, Error> {
        if subscription_ids.is_empty() {
            return Err(Error::new(
                StatusCode::BadNothingToDo,
                "No subscriptions to delete",
            ));
        }
        for id in subscription_ids {
            self.check_subscription_exists(*id)?;
        }

        let request = DeleteSubscriptionsRequest {
            request_header: Default::default(),
            subscription_ids: Some(subscription_ids.to_vec()),
        };
        match self.send(request).await? {
            ResponseMessage::DeleteSubscriptions(response) => {
                process_service_result(&response.response_header)?;
                let results = response.results.unwrap_or_default();
                let mut state = self.subscription_state.lock();
                for (id, result) in subscription_ids.iter().zip(results.iter()) {
                    if result.is_good() {
                        state.remove(*id);
                    }
                }
                Ok(results)
            }
            other => Err(process_unexpected_response(other)),
        }
    }

    /// Create monitored items on a subscription. Each item is given a fresh client
    /// handle; the server's results correlate by index. Items whose result is Bad are
    /// returned but never join the local collection.
    pub async fn create_monitored_items(
        &self,
        subscription_id: u32,
        timestamps_to_return: TimestampsToReturn,
        mut items_to_create: Vec<MonitoredItemCreateRequest>,
    ) -> Result<Vec<MonitoredItemCreateResult>, Error> {
        self.check_subscription_exists(subscription_id)?;
        if items_to_create.is_empty() {
            return Err(Error::new(
                StatusCode::BadNothingToDo,
                "No items to create",
            ));
        }

        for item in items_to_create.iter_mut() {
            item.requested_parameters.client_handle = self.next_monitored_item_handle();
        }

        let request = CreateMonitoredItemsRequest {
            request_header: Default::default(),
            subscription_id,
            timestamps_to_return,
            items_to_create: Some(items_to_create.clone()),
        };
        match self.send(request).await? {
            ResponseMessage::CreateMonitoredItems(response) => {
                process_service_result(&response.response_header)?;
                let results = response.results.unwrap_or_default();
                let mut state = self.subscription_state.lock();
                if let Some(subscription) = state.get_mut(subscription_id) {
                    for (req, result) in items_to_create.iter().zip(results.iter()) {
                        let item = MonitoredItem::new(
                            result.monitored_item_id,
                            req.requested_parameters.client_handle,
                            req.item_to_monitor.clone(),
                            req.monitoring_mode,
                            result.revised_sampling_interval,
                            result.revised_queue_size,
                            req.requested_parameters.discard_oldest,
                            req.requested_parameters.filter.clone(),
                            timestamps_to_return,
                            result.status_code.is_bad(),
                        );
                        if !item.is_deleted() {
                            subscription.insert_monitored_item(item);
                        }
                    }
                }
                Ok(results)
            }
            other => Err(process_unexpected_response(other)),
        }
    }

    /// Modify monitored items. Only items whose result is Good are updated locally.
    pub async fn modify_monitored_items(
        &self,
        subscription_id: u32,
        timestamps_to_return: TimestampsToReturn,
        items_to_modify: &[MonitoredItemModifyRequest],
    ) -> Result<Vec<MonitoredItemModifyResult>, Error> {
        self.check_subscription_exists(subscription_id)?;
        if items_to_modify.is_empty() {
            return Err(Error::new(
                StatusCode::BadNothingToDo,
                "No items to modify",
            ));
        }

        let request = ModifyMonitoredItemsRequest {
            request_header: Default::default(),
            subscription_id,
            timestamps_to_return,
            items_to_modify: Some(items_to_modify.to_vec()),
        };
        match self.send(request).await? {
            ResponseMessage::ModifyMonitoredItems(response) => {
                process_service_result(&response.response_header)?;
                let results = response.results.unwrap_or_default();
                let mut state = self.subscription_state.lock();
                if let Some(subscription) = state.get_mut(subscription_id) {
                    for (req, result) in items_to_modify.iter().zip(results.iter()) {
                        if result.status_code.is_good() {
                            if let Some(item) =
                                subscription.monitored_item_mut(req.monitored_item_id)
                            {
                                item.set_sampling_interval(result.revised_sampling_interval);
                                item.set_queue_size(result.revised_queue_size);
                            }
                        }
                    }
                }
                Ok(results)
            }
            other => Err(process_unexpected_response(other)),
        }
    }

    /// Change the monitoring mode of items. Only items whose result is Good change
    /// locally.
    pub async fn set_monitoring_mode(
        &self,
        subscription_id: u32,
        monitoring_mode: MonitoringMode,
        monitored_item_ids: &[u32],
    ) -> Result<Vec<StatusCode>, Error> {
        self.check_subscription_exists(subscription_id)?;
        if monitored_item_ids.is_empty() {
            return Err(Error::new(StatusCode::BadNothingToDo, "No items to change"));
        }

        let request = SetMonitoringModeRequest {
            request_header: Default::default(),
            subscription_id,
            monitoring_mode,
            monitored_item_ids: Some(monitored_item_ids.to_vec()),
        };
        match self.send(request).await? {
            ResponseMessage::SetMonitoringMode(response) => {
                process_service_result(&response.response_header)?;
                let results = response.results.unwrap_or_default();
                let mut state = self.subscription_state.lock();
                if let Some(subscription) = state.get_mut(subscription_id) {
                    for (id, result) in monitored_item_ids.iter().zip(results.iter()) {
                        if result.is_good() {
                            if let Some(item) = subscription.monitored_item_mut(*id) {
                                item.set_monitoring_mode(monitoring_mode);
                            }
                        }
                    }
                }
                Ok(results)
            }
            other => Err(process_unexpected_response(other)),
        }
    }

    /// Add and remove triggering links on a triggering item. The local link set follows
    /// the per-link results: only accepted additions and removals are applied.
    pub async fn set_triggering(
        &self,
        subscription_id: u32,
        triggering_item_id: u32,
        links_to_add: &[u32],
        links_to_remove: &[u32],
    ) -> Result<(), Error> {
        self.check_subscription_exists(subscription_id)?;
        if links_to_add.is_empty() && links_to_remove.is_empty() {
            return Err(Error::new(StatusCode::BadNothingToDo, "No links to change"));
        }

        let request = SetTriggeringRequest {
            request_header: Default::default(),
            subscription_id,
            triggering_item_id,
            links_to_add: if links_to_add.is_empty() {
                None
            } else {
                Some(links_to_add.to_vec())
            },
            links_to_remove: if links_to_remove.is_empty() {
                None
            } else {
                Some(links_to_remove.to_vec())
            },
        };
        match self.send(request).await? {
            ResponseMessage::SetTriggering(response) => {
                process_service_result(&response.response_header)?;
                // Diff the request against the per-link results
                let add_results = response.add_results.unwrap_or_default();
                let accepted_adds: Vec<u32> = links_to_add
                    .iter()
                    .zip(add_results.iter())
                    .filter(|(_, r)| r.is_good())
                    .map(|(id, _)| *id)
                    .collect();
                let remove_results = response.remove_results.unwrap_or_default();
                let accepted_removes: Vec<u32> = links_to_remove
                    .iter()
                    .zip(remove_results.iter())
                    .filter(|(_, r)| r.is_good())
                    .map(|(id, _)| *id)
                    .collect();

                let mut state = self.subscription_state.lock();
                if let Some(subscription) = state.get_mut(subscription_id) {
                    if let Some(item) = subscription.monitored_item_mut(triggering_item_id) {
                        item.set_triggering(&accepted_adds, &accepted_removes);
                    }
                }
                Ok(())
            }
            other => Err(process_unexpected_response(other)),
        }
    }

    /// Delete monitored items. Items whose result is Good leave the local collection.
    pub async fn delete_monitored_items(
        &self,
        subscription_id: u32,
        monitored_item_ids: &[u32],
    ) -> Result<Vec<StatusCode>, Error> {
        self.check_subscription_exists(subscription_id)?;
        if monitored_item_ids.is_empty() {
            return Err(Error::new(StatusCode::BadNothingToDo, "No items to delete"));
        }

        let request = DeleteMonitoredItemsRequest {
            request_header: Default::default(),
            subscription_id,
            monitored_item_ids: Some(monitored_item_ids.to_vec()),
        };
        match self.send(request).await? {
            ResponseMessage::DeleteMonitoredItems(response) => {
                process_service_result(&response.response_header)?;
                let results = response.results.unwrap_or_default();
                let mut state = self.subscription_state.lock();
                if let Some(subscription) = state.get_mut(subscription_id) {
                    for (id, result) in monitored_item_ids.iter().zip(results.iter()) {
                        if result.is_good() {
                            subscription.remove_monitored_item(*id);
                        }
                    }
                }
                Ok(results)
            }
            other => Err(process_unexpected_response(other)),
        }
    }

    /// Ask the server to retransmit a notification message it still holds queued. The
    /// returned message is not dispatched to the subscription callbacks; the caller
    /// decides what to do with it.
    pub async fn republish(
        &self,
        subscription_id: u32,
        retransmit_sequence_number: u32,
    ) -> Result<opcwire_types::NotificationMessage, Error> {
        self.check_subscription_exists(subscription_id)?;

        let request = opcwire_types::RepublishRequest {
            request_header: Default::default(),
            subscription_id,
            retransmit_sequence_number,
        };
        match self.send(request).await? {
            ResponseMessage::Republish(response) => {
                process_service_result(&response.response_header)?;
                Ok(response.notification_message)
            }
            other => Err(process_unexpected_response(other)),
        }
    }

    /// Recreate every known subscription after a reconnect. Server-side remnants are
    /// deleted best-effort first, then subscriptions and their items come back under
    /// fresh server ids with their original parameters and client handles. Items that
    /// fail to recreate are marked deleted. Guarantees at-least-once delivery after the
    /// reconnect, at the cost of possibly losing the last pre-disconnect notifications.
    pub(crate) async fn recreate_subscriptions(&self) -> Result<(), StatusCode> {
        let (old_ids, subscriptions) = {
            let mut state = self.subscription_state.lock();
            (state.subscription_ids(), state.drain_all())
        };
        if subscriptions.is_empty() {
            return Ok(());
        }

        // Discard whatever the server still holds for the old session; failure just
        // means there was nothing to discard
        let request = DeleteSubscriptionsRequest {
            request_header: Default::default(),
            subscription_ids: Some(old_ids),
        };
        if let Err(e) = self.send(request).await {
            debug!("Ignoring failure to delete old subscriptions: {}", e);
        }

        let mut iter = subscriptions.into_iter();
        while let Some(subscription) = iter.next() {
            if let Err(status) = self.recreate_one_subscription(subscription).await {
                // The connection is gone; keep the remaining subscriptions so the
                // next reconnect picks them up again
                let mut state = self.subscription_state.lock();
                for remaining in iter {
                    state.insert(remaining);
                }
                return Err(status);
            }
        }
        self.trigger_publish();
        Ok(())
    }

    /// A send error that means the connection itself failed, as opposed to the server
    /// rejecting the operation.
    fn is_connection_failure(status: StatusCode) -> bool {
        matches!(
            status,
            StatusCode::BadConnectionClosed
                | StatusCode::BadCommunicationError
                | StatusCode::BadServerNotConnected
                | StatusCode::BadTimeout
        )
    }

    async fn recreate_one_subscription(
        &self,
        mut subscription: Subscription,
    ) -> Result<(), StatusCode> {
        let old_id = subscription.subscription_id();
        let request = CreateSubscriptionRequest {
            request_header: Default::default(),
            requested_publishing_interval: subscription.parameters().publishing_interval,
            requested_lifetime_count: subscription.parameters().lifetime_count,
            requested_max_keep_alive_count: subscription.parameters().max_keep_alive_count,
            max_notifications_per_publish: subscription
                .parameters()
                .max_notifications_per_publish,
            publishing_enabled: subscription.parameters().publishing_enabled,
            priority: subscription.parameters().priority,
        };
        let response = match self.send(request).await {
            Ok(ResponseMessage::CreateSubscription(response)) => response,
            Err(e) if Self::is_connection_failure(e.status()) => {
                // Retried wholesale on the next reconnect
                let status = e.status();
                let mut state = self.subscription_state.lock();
                state.insert(subscription);
                return Err(status);
            }
            Ok(_) | Err(_) => {
                session_warn!(
                    self,
                    "Server refused to recreate subscription {}, dropping it",
                    old_id
                );
                subscription.callback.on_subscription_deleted();
                let mut state = self.subscription_state.lock();
                state.mark_deleted(old_id);
                return Ok(());
            }
        };

        subscription.set_subscription_id(response.subscription_id);
        subscription.set_revised(
            Duration::from_millis(response.revised_publishing_interval.max(0.0) as u64),
            response.revised_lifetime_count,
            response.revised_max_keep_alive_count,
        );
        session_debug!(
            self,
            "Recreated subscription {} as {}",
            old_id,
            response.subscription_id
        );

        let items = subscription.take_monitored_items();
        // Old server id to item, so triggering links can be remapped afterwards
        let mut id_map: HashMap<u32, u32> = HashMap::new();
        let mut recreated: Vec<MonitoredItem> = Vec::with_capacity(items.len());

        // The create service fixes the timestamp setting per call, so the items go
        // back grouped the way they were created
        let mut grouped: HashMap<i32, Vec<MonitoredItem>> = HashMap::new();
        for item in items {
            grouped
                .entry(item.timestamps_to_return() as i32)
                .or_default()
                .push(item);
        }
        let mut groups: Vec<Vec<MonitoredItem>> = grouped.into_values().collect();

        while let Some(group) = groups.pop() {
            let timestamps_to_return = group[0].timestamps_to_return();
            let requests: Vec<MonitoredItemCreateRequest> = group
                .iter()
                .map(|item| MonitoredItemCreateRequest {
                    item_to_monitor: item.item_to_monitor().clone(),
                    monitoring_mode: item.monitoring_mode(),
                    requested_parameters: opcwire_types::MonitoringParameters {
                        client_handle: item.client_handle(),
                        sampling_interval: item.sampling_interval(),
                        filter: item.filter().clone(),
                        queue_size: item.queue_size(),
                        discard_oldest: item.discard_oldest(),
                    },
                })
                .collect();

            let request = CreateMonitoredItemsRequest {
                request_header: Default::default(),
                subscription_id: response.subscription_id,
                timestamps_to_return,
                items_to_create: Some(requests),
            };
            let results = match self.send(request).await {
                Ok(ResponseMessage::CreateMonitoredItems(response)) => {
                    response.results.unwrap_or_default()
                }
                Err(e) if Self::is_connection_failure(e.status()) => {
                    // The connection failed; put everything back so the next
                    // reconnect runs the whole recreation again
                    let status = e.status();
                    for item in group
                        .into_iter()
                        .chain(groups.into_iter().flatten())
                        .chain(recreated)
                    {
                        subscription.insert_monitored_item(item);
                    }
                    let mut state = self.subscription_state.lock();
                    state.insert(subscription);
                    return Err(status);
                }
                Ok(_) | Err(_) => {
                    session_warn!(self, "Failed to recreate a group of monitored items");
                    Vec::new()
                }
            };

            for (mut item, result) in group
                .into_iter()
                .zip(results.into_iter().map(Some).chain(std::iter::repeat(None)))
            {
                match result {
                    Some(result) if result.status_code.is_good() => {
                        let old_item_id = item.id();
                        item.set_id(result.monitored_item_id);
                        item.set_sampling_interval(result.revised_sampling_interval);
                        item.set_queue_size(result.revised_queue_size);
                        id_map.insert(old_item_id, result.monitored_item_id);
                        recreated.push(item);
                    }
                    _ => {
                        warn!(
                            "Monitored item with client handle {} was not recreated",
                            item.client_handle()
                        );
                        item.set_deleted();
                    }
                }
            }
        }

        // Re-apply triggering links under the new server ids
        for mut item in recreated {
            item.remap_triggered_items(&id_map);
            let links: Vec<u32> = item.triggered_items().iter().copied().collect();
            if !links.is_empty() {
                let request = SetTriggeringRequest {
                    request_header: Default::default(),
                    subscription_id: response.subscription_id,
                    triggering_item_id: item.id(),
                    links_to_add: Some(links),
                    links_to_remove: None,
                };
                if let Err(e) = self.send(request).await {
                    session_warn!(
                        self,
                        "Failed to re-apply triggering links for item {}: {}",
                        item.id(),
                        e
                    );
                }
            }
            subscription.insert_monitored_item(item);
        }

        let mut state = self.subscription_state.lock();
        state.insert(subscription);
        Ok(())
    }

    /// Operations on subscriptions this session does not hold fail locally: with
    /// `BadObjectDeleted` for one that existed, `BadSubscriptionIdInvalid` otherwise.
    fn check_subscription_exists(&self, subscription_id: u32) -> Result<(), Error> {
        let state = self.subscription_state.lock();
        if state.contains(subscription_id) {
            Ok(())
        } else if state.is_deleted(subscription_id) {
            Err(Error::new(
                StatusCode::BadObjectDeleted,
                "The subscription has been deleted",
            ))
        } else {
            Err(Error::new(
                StatusCode::BadSubscriptionIdInvalid,
                "The subscription does not exist on this session",
            ))
        }
    }
}
