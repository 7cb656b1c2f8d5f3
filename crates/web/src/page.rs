//! Static page descriptors.
//!
//! Every endpoint is a `static` [`Page`] built with `const` builders and
//! registered once at startup:
//!
//! ```
//! use button_web::page::{Page, PageArgs};
//! use button_web::rule::Rule;
//! use button_http::buffer::Buffer;
//! use button_http::protocol::HttpError;
//!
//! static LED_RULES: [Rule; 1] = [Rule::uint("led", 0, 3).required()];
//!
//! fn led(args: &PageArgs<'_>) -> Result<Option<Buffer>, HttpError> {
//!     let led = args.path(0).and_then(|v| v.as_uint()).ok_or(HttpError::BadRequest)?;
//!     Ok(Some(Buffer::from_slice(format!("{{\"led\":{led}}}").as_bytes())))
//! }
//!
//! static LED: Page = Page::get("led")
//!     .with_value_handler(led)
//!     .with_path_rules(&LED_RULES)
//!     .with_content_type("application/json")
//!     .rest();
//! ```
//!
//! A page answers either from static [`Page::content`], from a value
//! handler producing the body, or from a [`RequestHandler`] that drives the
//! whole exchange (streamed uploads, paginated chunk streams).

use std::fmt;

use button_http::buffer::Buffer;
use button_http::protocol::{HttpError, Method, Progress};

use crate::request::RequestContext;
use crate::rule::{Rule, Value};

/// Most path rules a page may declare.
pub const MAX_PATH_RULES: usize = 5;

/// Most query rules a page may declare.
pub const MAX_QUERY_RULES: usize = 10;

/// Produces the response body from validated arguments.
///
/// `Ok(None)` answers with an empty body (or the page's static content).
pub type ValueHandler = fn(&PageArgs<'_>) -> Result<Option<Buffer>, HttpError>;

/// A handler with full control over its request.
///
/// `handle` runs when the page is dispatched. Multipart pages are dispatched
/// as soon as their headers are in, and `handle` is called again after every
/// receive until it returns [`Progress::Complete`]; the response head goes
/// out once it does.
///
/// The remaining callbacks only fire for chunked pages: `on_head_sent` for
/// the first sent event after the head, `on_ready` for every later one.
/// While inside them the request is ready for [`RequestContext::send_chunked`].
pub trait RequestHandler: Sync {
    fn handle(&self, ctx: &mut RequestContext<'_>) -> Result<Progress, HttpError>;

    fn on_head_sent(&self, ctx: &mut RequestContext<'_>) {
        self.on_ready(ctx);
    }

    fn on_ready(&self, ctx: &mut RequestContext<'_>) {
        let _ = ctx;
    }

    /// The request is being torn down; owner data is dropped afterwards.
    fn on_close(&self, ctx: &mut RequestContext<'_>) {
        let _ = ctx;
    }
}

#[derive(Copy, Clone)]
pub enum PageHandler {
    Value(ValueHandler),
    Request(&'static dyn RequestHandler),
}

impl fmt::Debug for PageHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageHandler::Value(_) => f.write_str("Value"),
            PageHandler::Request(_) => f.write_str("Request"),
        }
    }
}

/// Arguments of a value handler, in rule order.
#[derive(Debug)]
pub struct PageArgs<'a> {
    path: Vec<Value<'a>>,
    query: Vec<Option<Value<'a>>>,
    content: Option<&'a Buffer>,
}

impl<'a> PageArgs<'a> {
    pub fn new(path: Vec<Value<'a>>, query: Vec<Option<Value<'a>>>, content: Option<&'a Buffer>) -> Self {
        Self { path, query, content }
    }

    /// The value matched by the `index`-th path rule.
    pub fn path(&self, index: usize) -> Option<Value<'a>> {
        self.path.get(index).copied()
    }

    /// The value of the `index`-th query rule, `None` when absent.
    pub fn query(&self, index: usize) -> Option<Value<'a>> {
        self.query.get(index).copied().flatten()
    }

    pub fn path_values(&self) -> &[Value<'a>] {
        &self.path
    }

    /// The request body of a POST.
    pub fn content(&self) -> Option<&'a Buffer> {
        self.content
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
struct PageFlags(u8);

impl PageFlags {
    const DYNAMIC: u8 = 1;
    const CHUNKED: u8 = 1 << 1;
    const EVENT: u8 = 1 << 2;
    const MULTIPART: u8 = 1 << 3;
    const REST: u8 = 1 << 4;
    const PANEL: u8 = 1 << 5;

    const fn with(self, flag: u8) -> Self {
        Self(self.0 | flag)
    }

    const fn contains(self, flag: u8) -> bool {
        self.0 & flag != 0
    }
}

#[derive(Debug)]
pub struct Page {
    path: &'static str,
    method: Method,
    handler: Option<PageHandler>,
    alias: Option<&'static Page>,
    path_rules: &'static [Rule],
    query_rules: &'static [Rule],
    content: Option<&'static [u8]>,
    content_type: &'static str,
    send_capacity: usize,
    flags: PageFlags,
}

impl Page {
    /// A page at `/path`; `path` is given without the leading slash.
    pub const fn new(method: Method, path: &'static str) -> Self {
        Self {
            path,
            method,
            handler: None,
            alias: None,
            path_rules: &[],
            query_rules: &[],
            content: None,
            content_type: "text/html",
            send_capacity: 0,
            flags: PageFlags(0),
        }
    }

    pub const fn get(path: &'static str) -> Self {
        Self::new(Method::Get, path)
    }

    pub const fn post(path: &'static str) -> Self {
        Self::new(Method::Post, path)
    }

    pub const fn with_value_handler(mut self, handler: ValueHandler) -> Self {
        self.handler = Some(PageHandler::Value(handler));
        self.flags = self.flags.with(PageFlags::DYNAMIC);
        self
    }

    pub const fn with_request_handler(mut self, handler: &'static dyn RequestHandler) -> Self {
        self.handler = Some(PageHandler::Request(handler));
        self.flags = self.flags.with(PageFlags::DYNAMIC);
        self
    }

    /// Requests matching this page are served by `target` instead.
    pub const fn with_alias(mut self, target: &'static Page) -> Self {
        self.alias = Some(target);
        self
    }

    pub const fn with_path_rules(mut self, rules: &'static [Rule]) -> Self {
        self.path_rules = rules;
        self
    }

    pub const fn with_query_rules(mut self, rules: &'static [Rule]) -> Self {
        self.query_rules = rules;
        self
    }

    pub const fn with_content(mut self, content: &'static [u8]) -> Self {
        self.content = Some(content);
        self
    }

    pub const fn with_content_type(mut self, content_type: &'static str) -> Self {
        self.content_type = content_type;
        self
    }

    /// Outbound buffer allocated before a request handler runs.
    pub const fn with_send_capacity(mut self, capacity: usize) -> Self {
        self.send_capacity = capacity;
        self
    }

    pub const fn chunked(mut self) -> Self {
        self.flags = self.flags.with(PageFlags::CHUNKED);
        self
    }

    /// A chunked page whose connection becomes a push channel.
    pub const fn event(mut self) -> Self {
        self.flags = self.flags.with(PageFlags::CHUNKED).with(PageFlags::EVENT);
        self
    }

    pub const fn multipart(mut self) -> Self {
        self.flags = self.flags.with(PageFlags::MULTIPART);
        self
    }

    /// Gated by the REST switch and, when configured, the REST token.
    pub const fn rest(mut self) -> Self {
        self.flags = self.flags.with(PageFlags::REST);
        self
    }

    /// Gated by the panel switch.
    pub const fn panel(mut self) -> Self {
        self.flags = self.flags.with(PageFlags::PANEL);
        self
    }

    #[inline]
    pub fn path(&self) -> &'static str {
        self.path
    }

    #[inline]
    pub fn method(&self) -> Method {
        self.method
    }

    #[inline]
    pub fn handler(&self) -> Option<PageHandler> {
        self.handler
    }

    #[inline]
    pub fn alias(&self) -> Option<&'static Page> {
        self.alias
    }

    #[inline]
    pub fn path_rules(&self) -> &'static [Rule] {
        self.path_rules
    }

    #[inline]
    pub fn query_rules(&self) -> &'static [Rule] {
        self.query_rules
    }

    #[inline]
    pub fn content(&self) -> Option<&'static [u8]> {
        self.content
    }

    #[inline]
    pub fn content_type(&self) -> &'static str {
        self.content_type
    }

    #[inline]
    pub fn send_capacity(&self) -> usize {
        self.send_capacity
    }

    /// The body is produced per request by a handler.
    pub fn is_dynamic(&self) -> bool {
        self.flags.contains(PageFlags::DYNAMIC)
    }

    pub fn is_chunked(&self) -> bool {
        self.flags.contains(PageFlags::CHUNKED)
    }

    pub fn is_event(&self) -> bool {
        self.flags.contains(PageFlags::EVENT)
    }

    pub fn is_multipart(&self) -> bool {
        self.flags.contains(PageFlags::MULTIPART)
    }

    pub fn is_rest(&self) -> bool {
        self.flags.contains(PageFlags::REST)
    }

    pub fn is_panel(&self) -> bool {
        self.flags.contains(PageFlags::PANEL)
    }

    /// Whether at least one query rule must be present.
    pub fn requires_query(&self) -> bool {
        self.query_rules.iter().any(Rule::is_required)
    }
}
