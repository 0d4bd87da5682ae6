// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Subscription and monitored item service types.

use super::{ua_binary_enum, ua_binary_struct, ua_message_info, NotificationMessage, TimestampsToReturn};
use crate::{
    diagnostic_info::DiagnosticInfo, extension_object::ExtensionObject,
    request_header::RequestHeader, response_header::ResponseHeader, status_code::StatusCode,
};

use super::ReadValueId;

ua_binary_enum! {
    /// How a monitored item samples and reports.
    pub enum MonitoringMode {
        /// The item does not sample.
        Disabled = 0,
        /// The item samples but does not report.
        Sampling = 1,
        /// The item samples and reports.
        #[default]
        Reporting = 2,
    }
}

ua_binary_struct! {
    /// The parameters of a monitored item.
    pub struct MonitoringParameters {
        /// Client-assigned id carried back in notifications.
        pub client_handle: u32,
        /// The sampling interval in milliseconds. -1 means the publishing interval.
        pub sampling_interval: f64,
        /// The filter applied to values, null for none.
        pub filter: ExtensionObject,
        /// How many values the server queues between publishes.
        pub queue_size: u32,
        /// Drop the oldest value on queue overflow.
        pub discard_oldest: bool,
    }
}

impl MonitoringParameters {
    /// Parameters with a fresh client handle, sampling at the publishing interval.
    pub fn new(client_handle: u32) -> Self {
        MonitoringParameters {
            client_handle,
            sampling_interval: -1.0,
            filter: ExtensionObject::null(),
            queue_size: 1,
            discard_oldest: true,
        }
    }
}

ua_binary_struct! {
    /// One monitored item to create.
    pub struct MonitoredItemCreateRequest {
        /// The attribute to monitor.
        pub item_to_monitor: ReadValueId,
        /// The initial monitoring mode.
        pub monitoring_mode: MonitoringMode,
        /// The requested parameters.
        pub requested_parameters: MonitoringParameters,
    }
}

ua_binary_struct! {
    /// The result of creating one monitored item.
    pub struct MonitoredItemCreateResult {
        /// The status of the operation.
        pub status_code: StatusCode,
        /// Server-assigned id of the item.
        pub monitored_item_id: u32,
        /// The sampling interval granted by the server.
        pub revised_sampling_interval: f64,
        /// The queue size granted by the server.
        pub revised_queue_size: u32,
        /// The result of applying the filter.
        pub filter_result: ExtensionObject,
    }
}

ua_binary_struct! {
    /// Creates monitored items on a subscription.
    pub struct CreateMonitoredItemsRequest {
        /// Common request header.
        pub request_header: RequestHeader,
        /// The subscription to add the items to.
        pub subscription_id: u32,
        /// Which timestamps notifications carry.
        pub timestamps_to_return: TimestampsToReturn,
        /// The items to create.
        pub items_to_create: Option<Vec<MonitoredItemCreateRequest>>,
    }
}
ua_message_info!(
    CreateMonitoredItemsRequest,
    CreateMonitoredItemsRequest_Encoding_DefaultBinary
);

ua_binary_struct! {
    /// The response to CreateMonitoredItems, results correlate by index.
    pub struct CreateMonitoredItemsResponse {
        /// Common response header.
        pub response_header: ResponseHeader,
        /// One result per item.
        pub results: Option<Vec<MonitoredItemCreateResult>>,
        /// Diagnostics for the results, when requested.
        pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}
ua_message_info!(
    CreateMonitoredItemsResponse,
    CreateMonitoredItemsResponse_Encoding_DefaultBinary
);

ua_binary_struct! {
    /// One monitored item to modify.
    pub struct MonitoredItemModifyRequest {
        /// The server-assigned id of the item.
        pub monitored_item_id: u32,
        /// The new parameters.
        pub requested_parameters: MonitoringParameters,
    }
}

ua_binary_struct! {
    /// The result of modifying one monitored item.
    pub struct MonitoredItemModifyResult {
        /// The status of the operation.
        pub status_code: StatusCode,
        /// The sampling interval granted by the server.
        pub revised_sampling_interval: f64,
        /// The queue size granted by the server.
        pub revised_queue_size: u32,
        /// The result of applying the filter.
        pub filter_result: ExtensionObject,
    }
}

ua_binary_struct! {
    /// Modifies monitored items on a subscription.
    pub struct ModifyMonitoredItemsRequest {
        /// Common request header.
        pub request_header: RequestHeader,
        /// The subscription the items belong to.
        pub subscription_id: u32,
        /// Which timestamps notifications carry.
        pub timestamps_to_return: TimestampsToReturn,
        /// The items to modify.
        pub items_to_modify: Option<Vec<MonitoredItemModifyRequest>>,
    }
}
ua_message_info!(
    ModifyMonitoredItemsRequest,
    ModifyMonitoredItemsRequest_Encoding_DefaultBinary
);

ua_binary_struct! {
    /// The response to ModifyMonitoredItems, results correlate by index.
    pub struct ModifyMonitoredItemsResponse {
        /// Common response header.
        pub response_header: ResponseHeader,
        /// One result per item.
        pub results: Option<Vec<MonitoredItemModifyResult>>,
        /// Diagnostics for the results, when requested.
        pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}
ua_message_info!(
    ModifyMonitoredItemsResponse,
    ModifyMonitoredItemsResponse_Encoding_DefaultBinary
);

ua_binary_struct! {
    /// Changes the monitoring mode of monitored items.
    pub struct SetMonitoringModeRequest {
        /// Common request header.
        pub request_header: RequestHeader,
        /// The subscription the items belong to.
        pub subscription_id: u32,
        /// The mode to set.
        pub monitoring_mode: MonitoringMode,
        /// The server-assigned ids of the items.
        pub monitored_item_ids: Option<Vec<u32>>,
    }
}
ua_message_info!(SetMonitoringModeRequest, SetMonitoringModeRequest_Encoding_DefaultBinary);

ua_binary_struct! {
    /// The response to SetMonitoringMode, results correlate by index.
    pub struct SetMonitoringModeResponse {
        /// Common response header.
        pub response_header: ResponseHeader,
        /// One status per item.
        pub results: Option<Vec<StatusCode>>,
        /// Diagnostics for the results, when requested.
        pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}
ua_message_info!(
    SetMonitoringModeResponse,
    SetMonitoringModeResponse_Encoding_DefaultBinary
);

ua_binary_struct! {
    /// Adds and removes triggering links on a triggering item.
    pub struct SetTriggeringRequest {
        /// Common request header.
        pub request_header: RequestHeader,
        /// The subscription the items belong to.
        pub subscription_id: u32,
        /// The item whose triggering links change.
        pub triggering_item_id: u32,
        /// Items to start reporting when the triggering item triggers.
        pub links_to_add: Option<Vec<u32>>,
        /// Items to stop reporting.
        pub links_to_remove: Option<Vec<u32>>,
    }
}
ua_message_info!(SetTriggeringRequest, SetTriggeringRequest_Encoding_DefaultBinary);

ua_binary_struct! {
    /// The response to SetTriggering, results correlate with the links by index.
    pub struct SetTriggeringResponse {
        /// Common response header.
        pub response_header: ResponseHeader,
        /// One status per added link.
        pub add_results: Option<Vec<StatusCode>>,
        /// Diagnostics for the added links, when requested.
        pub add_diagnostic_infos: Option<Vec<DiagnosticInfo>>,
        /// One status per removed link.
        pub remove_results: Option<Vec<StatusCode>>,
        /// Diagnostics for the removed links, when requested.
        pub remove_diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}
ua_message_info!(SetTriggeringResponse, SetTriggeringResponse_Encoding_DefaultBinary);

ua_binary_struct! {
    /// Deletes monitored items from a subscription.
    pub struct DeleteMonitoredItemsRequest {
        /// Common request header.
        pub request_header: RequestHeader,
        /// The subscription the items belong to.
        pub subscription_id: u32,
        /// The server-assigned ids of the items.
        pub monitored_item_ids: Option<Vec<u32>>,
    }
}
ua_message_info!(
    DeleteMonitoredItemsRequest,
    DeleteMonitoredItemsRequest_Encoding_DefaultBinary
);

ua_binary_struct! {
    /// The response to DeleteMonitoredItems, results correlate by index.
    pub struct DeleteMonitoredItemsResponse {
        /// Common response header.
        pub response_header: ResponseHeader,
        /// One status per item.
        pub results: Option<Vec<StatusCode>>,
        /// Diagnostics for the results, when requested.
        pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}
ua_message_info!(
    DeleteMonitoredItemsResponse,
    DeleteMonitoredItemsResponse_Encoding_DefaultBinary
);

ua_binary_struct! {
    /// Creates a subscription.
    pub struct CreateSubscriptionRequest {
        /// Common request header.
        pub request_header: RequestHeader,
        /// The requested publishing interval in milliseconds.
        pub requested_publishing_interval: f64,
        /// Publish intervals the subscription survives without a publish request.
        pub requested_lifetime_count: u32,
        /// Publish intervals between keep-alive notifications.
        pub requested_max_keep_alive_count: u32,
        /// The most notifications in one publish response, 0 for no limit.
        pub max_notifications_per_publish: u32,
        /// Whether publishing starts enabled.
        pub publishing_enabled: bool,
        /// Relative priority among the session's subscriptions.
        pub priority: u8,
    }
}
ua_message_info!(
    CreateSubscriptionRequest,
    CreateSubscriptionRequest_Encoding_DefaultBinary
);

ua_binary_struct! {
    /// The response to CreateSubscription.
    pub struct CreateSubscriptionResponse {
        /// Common response header.
        pub response_header: ResponseHeader,
        /// Server-assigned id of the subscription.
        pub subscription_id: u32,
        /// The publishing interval granted by the server.
        pub revised_publishing_interval: f64,
        /// The lifetime count granted by the server.
        pub revised_lifetime_count: u32,
        /// The keep-alive count granted by the server.
        pub revised_max_keep_alive_count: u32,
    }
}
ua_message_info!(
    CreateSubscriptionResponse,
    CreateSubscriptionResponse_Encoding_DefaultBinary
);

ua_binary_struct! {
    /// Modifies a subscription.
    pub struct ModifySubscriptionRequest {
        /// Common request header.
        pub request_header: RequestHeader,
        /// The subscription to modify.
        pub subscription_id: u32,
        /// The requested publishing interval in milliseconds.
        pub requested_publishing_interval: f64,
        /// Publish intervals the subscription survives without a publish request.
        pub requested_lifetime_count: u32,
        /// Publish intervals between keep-alive notifications.
        pub requested_max_keep_alive_count: u32,
        /// The most notifications in one publish response, 0 for no limit.
        pub max_notifications_per_publish: u32,
        /// Relative priority among the session's subscriptions.
        pub priority: u8,
    }
}
ua_message_info!(
    ModifySubscriptionRequest,
    ModifySubscriptionRequest_Encoding_DefaultBinary
);

ua_binary_struct! {
    /// The response to ModifySubscription.
    pub struct ModifySubscriptionResponse {
        /// Common response header.
        pub response_header: ResponseHeader,
        /// The publishing interval granted by the server.
        pub revised_publishing_interval: f64,
        /// The lifetime count granted by the server.
        pub revised_lifetime_count: u32,
        /// The keep-alive count granted by the server.
        pub revised_max_keep_alive_count: u32,
    }
}
ua_message_info!(
    ModifySubscriptionResponse,
    ModifySubscriptionResponse_Encoding_DefaultBinary
);

ua_binary_struct! {
    /// Enables or disables publishing on subscriptions.
    pub struct SetPublishingModeRequest {
        /// Common request header.
        pub request_header: RequestHeader,
        /// The mode to set.
        pub publishing_enabled: bool,
        /// The subscriptions to change.
        pub subscription_ids: Option<Vec<u32>>,
    }
}
ua_message_info!(SetPublishingModeRequest, SetPublishingModeRequest_Encoding_DefaultBinary);

ua_binary_struct! {
    /// The response to SetPublishingMode, results correlate by index.
    pub struct SetPublishingModeResponse {
        /// Common response header.
        pub response_header: ResponseHeader,
        /// One status per subscription.
        pub results: Option<Vec<StatusCode>>,
        /// Diagnostics for the results, when requested.
        pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}
ua_message_info!(
    SetPublishingModeResponse,
    SetPublishingModeResponse_Encoding_DefaultBinary
);

ua_binary_struct! {
    /// Deletes subscriptions and everything they own.
    pub struct DeleteSubscriptionsRequest {
        /// Common request header.
        pub request_header: RequestHeader,
        /// The subscriptions to delete.
        pub subscription_ids: Option<Vec<u32>>,
    }
}
ua_message_info!(
    DeleteSubscriptionsRequest,
    DeleteSubscriptionsRequest_Encoding_DefaultBinary
);

ua_binary_struct! {
    /// The response to DeleteSubscriptions, results correlate by index.
    pub struct DeleteSubscriptionsResponse {
        /// Common response header.
        pub response_header: ResponseHeader,
        /// One status per subscription.
        pub results: Option<Vec<StatusCode>>,
        /// Diagnostics for the results, when requested.
        pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}
ua_message_info!(
    DeleteSubscriptionsResponse,
    DeleteSubscriptionsResponse_Encoding_DefaultBinary
);

ua_binary_struct! {
    /// The result of transferring one subscription.
    pub struct TransferResult {
        /// The status of the operation.
        pub status_code: StatusCode,
        /// Sequence numbers of notifications available for republishing.
        pub available_sequence_numbers: Option<Vec<u32>>,
    }
}

ua_binary_struct! {
    /// Transfers subscriptions from another session to this one.
    pub struct TransferSubscriptionsRequest {
        /// Common request header.
        pub request_header: RequestHeader,
        /// The subscriptions to transfer.
        pub subscription_ids: Option<Vec<u32>>,
        /// Resend the latest value of every monitored item after the transfer.
        pub send_initial_values: bool,
    }
}
ua_message_info!(
    TransferSubscriptionsRequest,
    TransferSubscriptionsRequest_Encoding_DefaultBinary
);

ua_binary_struct! {
    /// The response to TransferSubscriptions, results correlate by index.
    pub struct TransferSubscriptionsResponse {
        /// Common response header.
        pub response_header: ResponseHeader,
        /// One result per subscription.
        pub results: Option<Vec<TransferResult>>,
        /// Diagnostics for the results, when requested.
        pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}
ua_message_info!(
    TransferSubscriptionsResponse,
    TransferSubscriptionsResponse_Encoding_DefaultBinary
);

ua_binary_struct! {
    /// Acknowledges a notification message so the server can drop it from its
    /// retransmission queue.
    pub struct SubscriptionAcknowledgement {
        /// The subscription the message belonged to.
        pub subscription_id: u32,
        /// The sequence number being acknowledged.
        pub sequence_number: u32,
    }
}
ua_message_info!(
    SubscriptionAcknowledgement,
    SubscriptionAcknowledgement_Encoding_DefaultBinary
);

ua_binary_struct! {
    /// Asks the server for the next notification message of any subscription.
    pub struct PublishRequest {
        /// Common request header.
        pub request_header: RequestHeader,
        /// Notifications received since the last publish.
        pub subscription_acknowledgements: Option<Vec<SubscriptionAcknowledgement>>,
    }
}
ua_message_info!(PublishRequest, PublishRequest_Encoding_DefaultBinary);

ua_binary_struct! {
    /// The response to Publish, carrying one subscription's next notification message.
    pub struct PublishResponse {
        /// Common response header.
        pub response_header: ResponseHeader,
        /// The subscription the notification message belongs to.
        pub subscription_id: u32,
        /// Sequence numbers available for republishing.
        pub available_sequence_numbers: Option<Vec<u32>>,
        /// More notifications are queued for this subscription.
        pub more_notifications: bool,
        /// The notification message.
        pub notification_message: NotificationMessage,
        /// Results for the acknowledgements in the request.
        pub results: Option<Vec<StatusCode>>,
        /// Diagnostics for the results, when requested.
        pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}
ua_message_info!(PublishResponse, PublishResponse_Encoding_DefaultBinary);

ua_binary_struct! {
    /// Asks the server to retransmit a notification message.
    pub struct RepublishRequest {
        /// Common request header.
        pub request_header: RequestHeader,
        /// The subscription the message belonged to.
        pub subscription_id: u32,
        /// The sequence number to retransmit.
        pub retransmit_sequence_number: u32,
    }
}
ua_message_info!(RepublishRequest, RepublishRequest_Encoding_DefaultBinary);

ua_binary_struct! {
    /// The response to Republish.
    pub struct RepublishResponse {
        /// Common response header.
        pub response_header: ResponseHeader,
        /// The retransmitted notification message.
        pub notification_message: NotificationMessage,
    }
}
ua_message_info!(RepublishResponse, RepublishResponse_Encoding_DefaultBinary);
