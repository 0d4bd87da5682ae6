//! The publish loop. While the session is connected, exactly one Publish request is in
//! flight at a time; the server paces the loop through its revised publishing interval.

use std::{sync::Arc, time::Duration};

use futures::Stream;
use log::debug;

use opcwire_core::ResponseMessage;
use opcwire_types::{PublishRequest, StatusCode, SubscriptionAcknowledgement};

use crate::session::Session;

/// Subscription related activity yielded by the publish loop.
#[derive(Debug, Clone)]
pub enum SubscriptionActivity {
    /// A publish response was received and dispatched.
    Publish,
    /// A publish request failed. The loop backs off for one publishing interval.
    PublishFailed(StatusCode),
}

/// An event loop for driving subscriptions on a session. Each stream item is the outcome
/// of one Publish round trip.
pub(crate) struct SubscriptionEventLoop {
    session: Arc<Session>,
    /// Woken when the subscription set changes, so an idle loop notices the first
    /// subscription being created.
    trigger_publish_recv: tokio::sync::watch::Receiver<tokio::time::Instant>,
    /// The acknowledgement for the notification received in the previous round.
    acknowledgement: Option<SubscriptionAcknowledgement>,
}

impl SubscriptionEventLoop {
    pub(crate) fn new(
        session: Arc<Session>,
        trigger_publish_recv: tokio::sync::watch::Receiver<tokio::time::Instant>,
    ) -> Self {
        Self {
            session,
            trigger_publish_recv,
            acknowledgement: None,
        }
    }

    /// Run the loop as a stream of activity.
    pub(crate) fn run(self) -> impl Stream<Item = SubscriptionActivity> {
        futures::stream::unfold(self, |mut slf| async move {
            loop {
                let min_interval = {
                    let state = slf.session.subscription_state.lock();
                    state.min_publishing_interval()
                };
                let Some(min_interval) = min_interval else {
                    // No subscriptions to service; sleep until one is created
                    match slf.trigger_publish_recv.changed().await {
                        Ok(()) => continue,
                        Err(_) => break None,
                    }
                };

                // The server responds within its publishing interval once it has
                // something queued; pad with the client timeout on top of that
                let timeout = min_interval + slf.session.request_timeout;
                let acknowledgements = slf.acknowledgement.take().map(|a| vec![a]);
                let request = PublishRequest {
                    request_header: slf.session.channel.make_request_header(timeout),
                    subscription_acknowledgements: acknowledgements,
                };

                match slf
                    .session
                    .send_with_timeout(request.into(), timeout)
                    .await
                {
                    Ok(ResponseMessage::Publish(response)) => {
                        let message = response.notification_message;
                        // Keep-alives carry no notifications and are not acknowledged
                        if message.notification_data.as_ref().map_or(false, |n| !n.is_empty()) {
                            slf.acknowledgement = Some(SubscriptionAcknowledgement {
                                subscription_id: response.subscription_id,
                                sequence_number: message.sequence_number,
                            });
                        }

                        let options = {
                            let secure_channel = slf.session.channel.secure_channel.read();
                            secure_channel.decoding_options()
                        };
                        {
                            let mut state = slf.session.subscription_state.lock();
                            state.handle_notification(response.subscription_id, message, &options);
                        }
                        // Immediately issue the next publish
                        break Some((SubscriptionActivity::Publish, slf));
                    }
                    Ok(other) => {
                        let status = crate::session::process_unexpected_response(other).status();
                        Self::backoff(min_interval).await;
                        break Some((SubscriptionActivity::PublishFailed(status), slf));
                    }
                    Err(e) => {
                        debug!("Publish failed: {}", e);
                        Self::backoff(min_interval).await;
                        break Some((SubscriptionActivity::PublishFailed(e.status()), slf));
                    }
                }
            }
        })
    }

    async fn backoff(min_interval: Duration) {
        tokio::time::sleep(min_interval).await;
    }
}
