// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Notification payloads delivered through Publish responses. The concrete notification
//! shapes travel inside the extension objects of a [`NotificationMessage`].

use super::{ua_binary_struct, ua_message_info};
use crate::{
    data_value::DataValue, date_time::DateTime, diagnostic_info::DiagnosticInfo,
    extension_object::ExtensionObject, status_code::StatusCode, variant::Variant,
};

ua_binary_struct! {
    /// A batch of notifications for one subscription.
    pub struct NotificationMessage {
        /// Sequence number of the message, for acknowledgement and republishing.
        pub sequence_number: u32,
        /// When the message was published.
        pub publish_time: DateTime,
        /// The notifications: data changes, events or a status change.
        pub notification_data: Option<Vec<ExtensionObject>>,
    }
}
ua_message_info!(NotificationMessage, NotificationMessage_Encoding_DefaultBinary);

ua_binary_struct! {
    /// A changed value of one monitored item.
    pub struct MonitoredItemNotification {
        /// The client handle of the monitored item.
        pub client_handle: u32,
        /// The new value.
        pub value: DataValue,
    }
}
ua_message_info!(
    MonitoredItemNotification,
    MonitoredItemNotification_Encoding_DefaultBinary
);

ua_binary_struct! {
    /// Changed values of monitored items.
    pub struct DataChangeNotification {
        /// The changed values.
        pub monitored_items: Option<Vec<MonitoredItemNotification>>,
        /// Diagnostics for the values, when requested.
        pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}
ua_message_info!(DataChangeNotification, DataChangeNotification_Encoding_DefaultBinary);

ua_binary_struct! {
    /// The selected fields of one event.
    pub struct EventFieldList {
        /// The client handle of the monitored item that produced the event.
        pub client_handle: u32,
        /// The field values, in select-clause order.
        pub event_fields: Option<Vec<Variant>>,
    }
}
ua_message_info!(EventFieldList, EventFieldList_Encoding_DefaultBinary);

ua_binary_struct! {
    /// Events produced by monitored items.
    pub struct EventNotificationList {
        /// The events.
        pub events: Option<Vec<EventFieldList>>,
    }
}
ua_message_info!(EventNotificationList, EventNotificationList_Encoding_DefaultBinary);

ua_binary_struct! {
    /// Reports a change in the state of the subscription itself.
    pub struct StatusChangeNotification {
        /// The new status of the subscription.
        pub status: StatusCode,
        /// Diagnostics for the status, when requested.
        pub diagnostic_info: DiagnosticInfo,
    }
}
ua_message_info!(StatusChangeNotification, StatusChangeNotification_Encoding_DefaultBinary);
