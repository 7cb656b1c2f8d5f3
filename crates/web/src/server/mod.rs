//! The connection manager.
//!
//! [`HttpServer`] owns the route table, the access policy, every live
//! [`HttpRequest`] and the push-channel table. It never touches a socket: the
//! host feeds it network events and hands it a [`Transport`] per connection.
//!
//! ```text
//! accept ─> on_receive* ─> (route, handler, head) ─> on_sent* ─> on_disconnect
//! ```
//!
//! Every method runs to completion without blocking and is never re-entered;
//! the whole server is meant to be driven from a single thread.

#[cfg(test)]
mod tests;

use std::collections::HashMap;
use std::net::Ipv4Addr;

use button_http::protocol::{HttpError, Method, Progress};
use button_http::transport::Transport;
use tracing::{debug, info, trace, warn};

use crate::channel::{ChannelTable, PushError};
use crate::config::AccessPolicy;
use crate::page::{Page, PageArgs, PageHandler};
use crate::request::{ConnectionId, HttpRequest, RequestContext, SentAction};
use crate::router::filter::{RouteRequest, same_origin};
use crate::router::{RouteTable, Target};
use crate::rule::Value;

#[derive(Debug)]
pub struct HttpServer {
    routes: RouteTable,
    policy: AccessPolicy,
    connections: HashMap<ConnectionId, HttpRequest>,
    channels: ChannelTable,
    next_id: u64,
}

impl HttpServer {
    pub fn new(policy: AccessPolicy) -> Self {
        Self {
            routes: RouteTable::new(),
            policy,
            connections: HashMap::new(),
            channels: ChannelTable::new(),
            next_id: 0,
        }
    }

    /// Registers `page` after the pages added so far.
    pub fn add_page(&mut self, page: &'static Page) -> bool {
        self.routes.add_page(page)
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub fn policy(&self) -> &AccessPolicy {
        &self.policy
    }

    pub fn policy_mut(&mut self) -> &mut AccessPolicy {
        &mut self.policy
    }

    /// Sets the device's own address once the network is up.
    pub fn set_local_ip(&mut self, ip: Option<Ipv4Addr>) {
        self.policy.local_ip = ip;
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn request(&self, id: ConnectionId) -> Option<&HttpRequest> {
        self.connections.get(&id)
    }

    /// Starts a request for a newly accepted connection.
    pub fn accept(&mut self, transport: Box<dyn Transport>) -> ConnectionId {
        self.next_id += 1;
        let id = ConnectionId::new(self.next_id);
        self.connections.insert(id, HttpRequest::new(id, transport));
        info!(connection = %id, active = self.connections.len(), "connection accepted");
        id
    }

    pub fn on_receive(&mut self, id: ConnectionId, data: &[u8]) {
        let Some(request) = self.connections.get_mut(&id) else {
            warn!(connection = %id, "receive on unknown connection");
            return;
        };
        if request.is_responding() {
            trace!(connection = %id, len = data.len(), "response underway, dropping received bytes");
            return;
        }

        let result = request.feed(data).and_then(|progress| dispatch(request, &self.routes, &self.policy, progress));
        if let Err(e) = result {
            request.send_error(e);
        }
    }

    /// The transport finished the previous send.
    pub fn on_sent(&mut self, id: ConnectionId) {
        let Some(request) = self.connections.get_mut(&id) else {
            return;
        };
        if request.on_sent(&self.routes) == SentAction::RegisterChannel {
            self.register_channel(id);
        }
    }

    pub fn on_disconnect(&mut self, id: ConnectionId) {
        let Some(mut request) = self.connections.remove(&id) else {
            return;
        };
        while let Some(slot) = self.channels.slot_of(id) {
            self.channels.unregister(slot);
            debug!(connection = %id, slot, "push channel unregistered");
        }
        request.teardown(&self.routes);
        info!(connection = %id, active = self.connections.len(), "connection closed");
    }

    /// The stack reported an error and dropped the connection.
    pub fn on_reconnect(&mut self, id: ConnectionId, cause: &str) {
        warn!(connection = %id, cause, "connection lost");
        self.on_disconnect(id);
    }

    /// Makes `id` a push channel, evicting every other registered connection.
    pub fn register_channel(&mut self, id: ConnectionId) -> Option<usize> {
        if let Some(slot) = self.channels.slot_of(id) {
            return Some(slot);
        }
        if !self.connections.contains_key(&id) {
            return None;
        }

        for (slot, evicted) in self.channels.evict_others(id) {
            info!(connection = %evicted, slot, "push channel evicted");
            if let Some(request) = self.connections.get_mut(&evicted) {
                request.set_channel(None);
                request.force_close();
            }
        }

        let slot = self.channels.register(id)?;
        if let Some(request) = self.connections.get_mut(&id) {
            request.set_channel(Some(slot));
        }
        info!(connection = %id, slot, "push channel registered");
        Some(slot)
    }

    pub fn unregister_channel(&mut self, slot: usize) -> Option<ConnectionId> {
        let id = self.channels.unregister(slot)?;
        if let Some(request) = self.connections.get_mut(&id) {
            request.set_channel(None);
        }
        debug!(connection = %id, slot, "push channel unregistered");
        Some(id)
    }

    pub fn channel_of(&self, id: ConnectionId) -> Option<usize> {
        self.channels.slot_of(id)
    }

    /// Sends `payload` as one chunk on the channel in `slot`.
    pub fn push(&mut self, slot: usize, payload: &[u8]) -> Result<(), PushError> {
        let id = self.channels.get(slot).ok_or(PushError::EmptySlot { slot })?;
        let Some(request) = self.connections.get_mut(&id) else {
            self.channels.unregister(slot);
            return Err(PushError::Stale { slot });
        };
        request.push_chunk(payload)?;
        trace!(connection = %id, slot, len = payload.len(), "pushed chunk");
        Ok(())
    }

    /// Pushes `payload` to every channel, returning how many accepted it.
    pub fn publish(&mut self, payload: &[u8]) -> usize {
        let slots: Vec<usize> = self.channels.occupied().map(|(slot, _)| slot).collect();
        let mut delivered = 0;
        for slot in slots {
            match self.push(slot, payload) {
                Ok(()) => delivered += 1,
                Err(e) => debug!(slot, cause = %e, "push skipped"),
            }
        }
        delivered
    }
}

fn dispatch(
    request: &mut HttpRequest,
    routes: &RouteTable,
    policy: &AccessPolicy,
    progress: Progress,
) -> Result<(), HttpError> {
    if let Some(page) = request.page() {
        return run_request_handler(request, routes, page);
    }
    if !request.parser().headers_done() {
        return Ok(());
    }

    let parser = request.parser();
    if let Some(referer) = parser.referer()
        && !same_origin(referer, policy.local_ip)
    {
        debug!(connection = %request.id(), referer, "foreign referer");
        return Err(HttpError::NotFound);
    }
    let method = parser.method().ok_or(HttpError::InternalError)?;
    if method == Method::Options {
        request.send_options();
        return Ok(());
    }

    let target = Target::parse(parser.path().unwrap_or_default());
    let route = routes
        .find(&target, &RouteRequest::new(method, parser.token(), policy))
        .ok_or(HttpError::NotFound)?;
    let page = route.page();
    if !progress.is_complete() && !page.is_multipart() {
        trace!(connection = %request.id(), "waiting for request body");
        return Ok(());
    }

    let (path, query) = route.into_values();
    serve(request, routes, page, method, path, query)
}

fn serve(
    request: &mut HttpRequest,
    routes: &RouteTable,
    page: &'static Page,
    method: Method,
    path: Vec<Value<'_>>,
    query: Vec<Option<Value<'_>>>,
) -> Result<(), HttpError> {
    debug!(connection = %request.id(), %method, path = page.path(), "dispatching page");
    request.set_page(page);
    match page.handler() {
        Some(PageHandler::Value(handler)) => {
            let content = if method == Method::Post { request.parser().content() } else { None };
            let body = handler(&PageArgs::new(path, query, content))?;
            request.set_send(body);
        }
        Some(PageHandler::Request(_)) => {
            request.prepare_send(page.send_capacity())?;
            return run_request_handler(request, routes, page);
        }
        None => {}
    }
    request.send_head(page)
}

fn run_request_handler(request: &mut HttpRequest, routes: &RouteTable, page: &'static Page) -> Result<(), HttpError> {
    let Some(PageHandler::Request(handler)) = page.handler() else {
        return Ok(());
    };
    let progress = handler.handle(&mut RequestContext::new(request, routes))?;
    if !progress.is_complete() || request.is_responding() {
        return Ok(());
    }
    request.send_head(page)
}
