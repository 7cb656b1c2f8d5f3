//! Per-connection request state and the accessors handlers work with.
//!
//! An [`HttpRequest`] lives exactly as long as its connection: it owns the
//! parser, the outbound buffer and the transport handle, and carries every
//! bit of progress that has to survive from one network event to the next.
//!
//! # Outbound flow
//!
//! ```text
//! head ──sent──> body slices ──sent──> ... ──> close              (fixed length)
//! head [+ first chunk] ──sent──> ready ──send_chunked──> ... ──> empty chunk, close
//! ```
//!
//! A send is only queued on the transport; its completion comes back as a
//! sent event, which is where the next slice or chunk is produced. Any
//! transport failure is fatal: the request waits for its disconnect and
//! nothing else goes out.

use std::any::Any;
use std::fmt;

use button_http::buffer::Buffer;
use button_http::codec::body::{LengthEncoder, MAX_CHUNK_OVERHEAD, frame_chunk};
use button_http::codec::header::{HeadBuffer, encode_ok_head, encode_options_head};
use button_http::codec::{RequestParser, error_page};
use button_http::protocol::{HttpError, PayloadSize, Progress, SendError};
use button_http::transport::Transport;
use tracing::{debug, error, trace, warn};

use crate::page::{Page, PageHandler};
use crate::router::RouteTable;

/// Identity of an accepted connection, never reused by a server.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What the server has to do after a sent event.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum SentAction {
    Idle,
    RegisterChannel,
}

#[allow(clippy::struct_excessive_bools, reason = "independent connection flags")]
#[derive(Debug, Default, Copy, Clone)]
struct Flags {
    /// The previous chunk is flushed and the next one may be sent.
    ready: bool,
    /// Disconnect on the next sent event.
    close: bool,
    /// Head or error page queued; nothing more is received.
    responded: bool,
    /// The first sent event after the head is still to come.
    head_pending: bool,
    /// A disconnect was requested; the request is as good as gone.
    wait_discon: bool,
}

pub struct HttpRequest {
    id: ConnectionId,
    transport: Box<dyn Transport>,
    parser: RequestParser,
    page: Option<&'static Page>,
    send: Option<Buffer>,
    encoder: LengthEncoder,
    channel: Option<usize>,
    flags: Flags,
    data: Option<Box<dyn Any>>,
}

impl fmt::Debug for HttpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpRequest")
            .field("id", &self.id)
            .field("parser", &self.parser.state())
            .field("page", &self.page.map(Page::path))
            .field("encoder", &self.encoder)
            .field("channel", &self.channel)
            .field("flags", &self.flags)
            .finish_non_exhaustive()
    }
}

impl HttpRequest {
    pub(crate) fn new(id: ConnectionId, transport: Box<dyn Transport>) -> Self {
        Self {
            id,
            transport,
            parser: RequestParser::new(),
            page: None,
            send: None,
            encoder: LengthEncoder::default(),
            channel: None,
            flags: Flags::default(),
            data: None,
        }
    }

    #[inline]
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    #[inline]
    pub fn parser(&self) -> &RequestParser {
        &self.parser
    }

    /// The page being served, once dispatched.
    #[inline]
    pub fn page(&self) -> Option<&'static Page> {
        self.page
    }

    #[inline]
    pub fn channel(&self) -> Option<usize> {
        self.channel
    }

    #[inline]
    pub fn is_ready(&self) -> bool {
        self.flags.ready
    }

    /// A response is underway or the connection is going away.
    pub fn is_responding(&self) -> bool {
        self.flags.responded || self.flags.close || self.flags.wait_discon
    }

    pub(crate) fn set_page(&mut self, page: &'static Page) {
        self.page = Some(page);
    }

    pub(crate) fn set_channel(&mut self, channel: Option<usize>) {
        self.channel = channel;
    }

    pub(crate) fn set_send(&mut self, send: Option<Buffer>) {
        self.send = send;
    }

    /// Feeds one receive event to the parser, stopping at the first error.
    pub(crate) fn feed(&mut self, data: &[u8]) -> Result<Progress, HttpError> {
        let mut progress = Progress::NeedMore;
        for &byte in data {
            progress = self.parser.feed(byte, data.len())?;
        }
        Ok(progress)
    }

    /// Allocates the outbound buffer a request handler writes into.
    pub(crate) fn prepare_send(&mut self, capacity: usize) -> Result<(), HttpError> {
        if self.send.is_some() || capacity == 0 {
            return Ok(());
        }
        let send = Buffer::try_new(capacity).map_err(|e| {
            error!(connection = %self.id, cause = %e, capacity, "unable to allocate send buffer");
            HttpError::InternalError
        })?;
        self.send = Some(send);
        Ok(())
    }

    /// Sends the `200 OK` head of `page`, framing the body as the first chunk on chunked pages.
    pub(crate) fn send_head(&mut self, page: &'static Page) -> Result<(), HttpError> {
        let chunked = page.is_chunked();
        if chunked {
            if self.send.is_none()
                && let Some(content) = page.content()
            {
                let mut send = chunk_buffer(content.len()).map_err(|e| {
                    error!(connection = %self.id, cause = %e, "unable to allocate first chunk");
                    HttpError::InternalError
                })?;
                send.append(content);
                self.send = Some(send);
            }
            if let Some(send) = self.send.as_mut().filter(|send| !send.is_empty()) {
                send.grow(send.size() + MAX_CHUNK_OVERHEAD).map_err(|e| {
                    error!(connection = %self.id, cause = %e, "unable to grow send buffer");
                    HttpError::InternalError
                })?;
                if !frame_chunk(send) {
                    return Err(HttpError::InternalError);
                }
            }
        }

        let content_length = match &self.send {
            Some(send) => send.size(),
            None => page.content().map_or(0, <[u8]>::len),
        };
        let payload = if chunked { PayloadSize::Chunked } else { PayloadSize::Length(content_length) };
        let mut head = HeadBuffer::inline();
        if !encode_ok_head(&mut head, page.content_type(), payload) {
            error!(connection = %self.id, path = page.path(), "response head does not fit");
            return Err(HttpError::InternalError);
        }

        self.encoder = LengthEncoder::new(content_length);
        self.flags.responded = true;
        if let Err(e) = self.transport.send(head.data()) {
            warn!(connection = %self.id, cause = %e, "unable to send response head");
            self.abort();
            return Ok(());
        }
        debug!(connection = %self.id, path = page.path(), content_length, chunked, "response head sent");
        self.flags.head_pending = true;
        if content_length == 0 && !chunked {
            self.flags.close = true;
        }
        Ok(())
    }

    /// Answers with the canned page for `error` and closes afterwards.
    pub(crate) fn send_error(&mut self, error: HttpError) {
        debug!(connection = %self.id, status = %error.status_code(), "sending error page");
        self.flags.responded = true;
        match self.transport.send(error_page(error)) {
            Ok(()) => self.flags.close = true,
            Err(e) => {
                warn!(connection = %self.id, cause = %e, "unable to send error page");
                self.abort();
            }
        }
    }

    /// Answers a CORS preflight.
    pub(crate) fn send_options(&mut self) {
        let mut head = HeadBuffer::inline();
        self.flags.responded = true;
        if !encode_options_head(&mut head) {
            error!(connection = %self.id, "options head does not fit");
            self.abort();
            return;
        }
        match self.transport.send(head.data()) {
            Ok(()) => self.flags.close = true,
            Err(e) => {
                warn!(connection = %self.id, cause = %e, "unable to send options answer");
                self.abort();
            }
        }
    }

    /// Frames the outbound buffer as one chunk and sends it.
    ///
    /// Needs an outbound buffer and the ready state; an empty buffer becomes
    /// the terminal chunk and the connection is closed after it.
    pub fn send_chunked(&mut self) -> Result<(), SendError> {
        let Some(send) = self.send.as_mut() else {
            return Err(SendError::NoBuffer);
        };
        if !self.flags.ready {
            return Err(SendError::Busy);
        }

        let size = send.size();
        if let Err(e) = send.grow(size + MAX_CHUNK_OVERHEAD) {
            warn!(connection = %self.id, cause = %e, size, "unable to grow chunk");
            return Err(SendError::out_of_memory(size + MAX_CHUNK_OVERHEAD, e));
        }
        if !frame_chunk(send) {
            return Err(SendError::refused(size));
        }

        self.flags.ready = false;
        if size == 0 {
            self.flags.close = true;
        }
        if let Err(e) = self.transport.send(send.data()) {
            warn!(connection = %self.id, cause = %e, "unable to send chunk");
            self.abort();
            return Err(e);
        }
        trace!(connection = %self.id, size, "chunk sent");
        Ok(())
    }

    /// Replaces the outbound buffer with `payload` and sends it as one chunk.
    pub(crate) fn push_chunk(&mut self, payload: &[u8]) -> Result<(), SendError> {
        if !self.flags.ready {
            return Err(SendError::Busy);
        }
        let mut send = chunk_buffer(payload.len()).inspect_err(|e| {
            warn!(connection = %self.id, cause = %e, "unable to allocate pushed chunk");
        })?;
        send.append(payload);
        self.send = Some(send);
        self.send_chunked()
    }

    /// Asks the transport to disconnect, once.
    pub fn force_close(&mut self) {
        if self.flags.wait_discon {
            return;
        }
        debug!(connection = %self.id, "closing connection");
        self.flags.wait_discon = true;
        self.transport.disconnect();
    }

    fn abort(&mut self) {
        self.flags.close = false;
        self.force_close();
    }

    /// Continues the response after the transport finished a send.
    pub(crate) fn on_sent(&mut self, routes: &RouteTable) -> SentAction {
        if self.flags.close {
            self.abort();
            return SentAction::Idle;
        }
        let Some(page) = self.page else {
            return SentAction::Idle;
        };
        if self.flags.wait_discon || !self.flags.responded {
            return SentAction::Idle;
        }

        if page.is_chunked() && self.encoder.is_eof() {
            if let Some(send) = self.send.as_mut() {
                send.clear();
            }
            self.flags.ready = true;
            if page.is_event() {
                return if self.channel.is_some() { SentAction::Idle } else { SentAction::RegisterChannel };
            }
            let first = std::mem::take(&mut self.flags.head_pending);
            match page.handler() {
                Some(PageHandler::Request(handler)) => {
                    let mut ctx = RequestContext::new(self, routes);
                    if first { handler.on_head_sent(&mut ctx) } else { handler.on_ready(&mut ctx) }
                }
                _ => self.finish_chunks(),
            }
            return SentAction::Idle;
        }

        let body = match &self.send {
            Some(send) => send.data(),
            None => page.content().unwrap_or_default(),
        };
        let slice = self.encoder.next_slice(body);
        if slice.is_empty() {
            warn!(connection = %self.id, sent = self.encoder.sent(), "nothing left to send");
            self.abort();
            return SentAction::Idle;
        }
        if let Err(e) = self.transport.send(slice) {
            warn!(connection = %self.id, cause = %e, "unable to send body");
            self.abort();
            return SentAction::Idle;
        }
        self.encoder.advance(slice.len());
        trace!(connection = %self.id, sent = self.encoder.sent(), total = self.encoder.content_length(), "body slice sent");
        if self.encoder.is_eof() && !page.is_chunked() {
            self.flags.close = true;
        }
        SentAction::Idle
    }

    // ends the chunk stream of a page without a request handler
    fn finish_chunks(&mut self) {
        match self.send.as_mut() {
            Some(send) => {
                send.clear();
            }
            None => match chunk_buffer(0) {
                Ok(send) => self.send = Some(send),
                Err(e) => {
                    warn!(connection = %self.id, cause = %e, "unable to allocate terminal chunk");
                    self.abort();
                    return;
                }
            },
        }
        if let Err(e) = self.send_chunked() {
            debug!(connection = %self.id, cause = %e, "unable to finish chunk stream");
        }
    }

    /// Runs the page's close callback; the request must not be used afterwards.
    pub(crate) fn teardown(&mut self, routes: &RouteTable) {
        self.flags.wait_discon = true;
        self.flags.ready = false;
        if let Some(PageHandler::Request(handler)) = self.page.and_then(Page::handler) {
            handler.on_close(&mut RequestContext::new(self, routes));
        }
        self.data = None;
    }
}

/// An empty outbound buffer with room for a `payload_len` byte chunk and its framing.
pub(crate) fn chunk_buffer(payload_len: usize) -> Result<Buffer, SendError> {
    let capacity = payload_len.saturating_add(MAX_CHUNK_OVERHEAD);
    Buffer::try_new(capacity).map_err(|e| SendError::out_of_memory(capacity, e))
}

/// A request as seen by its page handler.
pub struct RequestContext<'a> {
    request: &'a mut HttpRequest,
    routes: &'a RouteTable,
}

impl fmt::Debug for RequestContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext").field("request", &self.request).finish_non_exhaustive()
    }
}

impl<'a> RequestContext<'a> {
    pub fn new(request: &'a mut HttpRequest, routes: &'a RouteTable) -> Self {
        Self { request, routes }
    }

    #[inline]
    pub fn id(&self) -> ConnectionId {
        self.request.id
    }

    #[inline]
    pub fn parser(&self) -> &RequestParser {
        &self.request.parser
    }

    /// The request body received so far.
    pub fn content(&self) -> Option<&Buffer> {
        self.request.parser.content()
    }

    /// Mutable body access for handlers that drain what they consumed.
    pub fn content_mut(&mut self) -> Option<&mut Buffer> {
        self.request.parser.content_mut()
    }

    pub fn page(&self) -> Option<&'static Page> {
        self.request.page
    }

    pub fn routes(&self) -> &'a RouteTable {
        self.routes
    }

    /// Owner data of type `T`, if that is what the slot holds.
    pub fn data<T: Any>(&mut self) -> Option<&mut T> {
        self.request.data.as_mut()?.downcast_mut()
    }

    pub fn set_data<T: Any>(&mut self, data: T) {
        self.request.data = Some(Box::new(data));
    }

    pub fn take_data(&mut self) -> Option<Box<dyn Any>> {
        self.request.data.take()
    }

    /// The outbound buffer; available before the head is sent and whenever the request is ready.
    pub fn send_buffer(&mut self) -> Option<&mut Buffer> {
        let flags = self.request.flags;
        if flags.responded && !flags.ready {
            return None;
        }
        self.request.send.as_mut()
    }

    pub fn set_send_buffer(&mut self, buffer: Buffer) {
        self.request.send = Some(buffer);
    }

    #[inline]
    pub fn is_ready(&self) -> bool {
        self.request.flags.ready
    }

    pub fn send_chunked(&mut self) -> Result<(), SendError> {
        self.request.send_chunked()
    }

    /// Drops the connection without finishing the response.
    pub fn close(&mut self) {
        self.request.force_close();
    }
}
