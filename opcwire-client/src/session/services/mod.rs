//! Per-service wrappers on [`crate::Session`]. Each stamps the standard request header,
//! sends the request through the secure channel, checks the service result and updates
//! any local state.

mod attributes;
mod session;
mod subscriptions;
mod view;
