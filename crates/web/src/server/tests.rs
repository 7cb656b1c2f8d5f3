use std::cell::RefCell;
use std::rc::Rc;

use button_http::buffer::Buffer;
use button_http::codec::BODY_CHUNK_LIMIT;
use button_http::protocol::SendError;
use http::StatusCode;
use indoc::indoc;
use mockall::mock;

use super::*;
use crate::help::RouteListing;
use crate::page::RequestHandler;
use crate::rule::Rule;

#[derive(Debug, Default)]
struct Wire {
    sent: Vec<Vec<u8>>,
    acked: usize,
    disconnects: usize,
}

impl Wire {
    fn bytes(&self) -> Vec<u8> {
        self.sent.concat()
    }
}

/// Records every send; sent events are delivered by [`flush`].
#[derive(Debug, Clone, Default)]
struct Recorder(Rc<RefCell<Wire>>);

impl Transport for Recorder {
    fn send(&mut self, data: &[u8]) -> Result<(), SendError> {
        self.0.borrow_mut().sent.push(data.to_vec());
        Ok(())
    }

    fn disconnect(&mut self) {
        self.0.borrow_mut().disconnects += 1;
    }
}

mock! {
    Stack {}

    impl Transport for Stack {
        fn send(&mut self, data: &[u8]) -> Result<(), SendError>;
        fn disconnect(&mut self);
    }
}

fn crlf(text: &str) -> Vec<u8> {
    text.replace('\n', "\r\n").into_bytes()
}

fn connect(server: &mut HttpServer) -> (ConnectionId, Recorder) {
    let recorder = Recorder::default();
    let id = server.accept(Box::new(recorder.clone()));
    (id, recorder)
}

/// Acknowledges queued sends one by one, like a stack reporting completions,
/// until nothing is in flight or a disconnect was requested.
fn flush(server: &mut HttpServer, id: ConnectionId, recorder: &Recorder) {
    loop {
        {
            let wire = recorder.0.borrow();
            if wire.disconnects > 0 || wire.acked >= wire.sent.len() {
                return;
            }
        }
        recorder.0.borrow_mut().acked += 1;
        server.on_sent(id);
    }
}

struct Response {
    status: u16,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl Response {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter().find(|(n, _)| n.eq_ignore_ascii_case(name)).map(|(_, v)| v.as_str())
    }
}

fn parse_response(bytes: &[u8]) -> Response {
    let mut headers = [httparse::EMPTY_HEADER; 16];
    let mut response = httparse::Response::new(&mut headers);
    let httparse::Status::Complete(head_len) = response.parse(bytes).unwrap() else {
        panic!("incomplete response head");
    };
    Response {
        status: response.code.unwrap(),
        headers: response
            .headers
            .iter()
            .map(|h| (h.name.to_owned(), String::from_utf8(h.value.to_vec()).unwrap()))
            .collect(),
        body: bytes[head_len..].to_vec(),
    }
}

fn exchange(server: &mut HttpServer, request: &[u8]) -> (Response, Recorder) {
    let (id, recorder) = connect(server);
    server.on_receive(id, request);
    flush(server, id, &recorder);
    let bytes = recorder.0.borrow().bytes();
    (parse_response(&bytes), recorder)
}

static STATUS: Page = Page::get("status").with_content(b"ok").with_content_type("text/plain");

fn echo(args: &PageArgs<'_>) -> Result<Option<Buffer>, HttpError> {
    let content = args.content().ok_or(HttpError::BadRequest)?;
    let mut body = Buffer::new(content.size() + 8);
    body.puts(&format!("{}:", content.size()));
    body.append(content.data());
    Ok(Some(body))
}

static SAVE: Page = Page::post("save").with_value_handler(echo);

static LED_RULES: [Rule; 1] = [Rule::uint("led", 0, 3).required()];

fn led(args: &PageArgs<'_>) -> Result<Option<Buffer>, HttpError> {
    let led = args.path(0).and_then(|v| v.as_uint()).ok_or(HttpError::InternalError)?;
    if led == 3 {
        return Err(HttpError::BadRequest);
    }
    Ok(Some(Buffer::from_slice(format!("{{\"led\":{led}}}").as_bytes())))
}

static LED: Page =
    Page::get("led").with_value_handler(led).with_path_rules(&LED_RULES).with_content_type("application/json").rest();

fn hello(_args: &PageArgs<'_>) -> Result<Option<Buffer>, HttpError> {
    Ok(Some(Buffer::from_slice(b"hello")))
}

static CHUNKS: Page = Page::get("chunks").with_value_handler(hello).chunked();

static HELP: Page = Page::get("help").with_request_handler(&RouteListing).chunked().with_content_type("text/plain");

static EVENTS: Page = Page::get("events").event().with_content_type("text/event-stream");

fn server_with(pages: &[&'static Page]) -> HttpServer {
    let mut server = HttpServer::new(AccessPolicy::default());
    for &page in pages {
        assert!(server.add_page(page));
    }
    server
}

#[test]
fn static_page_is_sent_and_closed() {
    let mut server = server_with(&[&STATUS]);
    let (id, recorder) = connect(&mut server);

    server.on_receive(id, b"GET /status HTTP/1.1\r\nHost: 10.0.0.6\r\n\r\n");
    flush(&mut server, id, &recorder);

    let wire = recorder.0.borrow();
    assert_eq!(wire.sent.len(), 2);
    assert_eq!(wire.disconnects, 1);

    let response = parse_response(&wire.bytes());
    assert_eq!(response.status, StatusCode::OK.as_u16());
    assert_eq!(response.header("Content-Type"), Some(mime::TEXT_PLAIN.as_ref()));
    assert_eq!(response.header("Content-Length"), Some("2"));
    assert_eq!(response.header("Connection"), Some("close"));
    assert_eq!(response.header("Access-Control-Allow-Origin"), Some("*"));
    assert_eq!(response.body, b"ok");
    drop(wire);

    server.on_disconnect(id);
    assert_eq!(server.connection_count(), 0);
}

#[test]
fn request_split_across_receives() {
    let mut server = server_with(&[&STATUS]);
    let (id, recorder) = connect(&mut server);

    for piece in [&b"GET /sta"[..], b"tus HTTP/1.1\r", b"\n\r", b"\n"] {
        server.on_receive(id, piece);
    }
    flush(&mut server, id, &recorder);

    let response = parse_response(&recorder.0.borrow().bytes());
    assert_eq!(response.status, 200);
    assert_eq!(response.body, b"ok");
}

#[test]
fn options_answered_without_lookup() {
    let mut server = server_with(&[&STATUS]);
    let (response, recorder) = exchange(&mut server, b"OPTIONS /status HTTP/1.1\r\n\r\n");

    assert_eq!(response.status, 200);
    assert_eq!(response.header("Content-Length"), Some("0"));
    assert_eq!(response.header("Connection"), Some("close"));
    assert_eq!(response.header("Access-Control-Allow-Methods"), Some("GET, POST, OPTIONS"));
    assert!(response.body.is_empty());
    assert_eq!(server.routes().lookup_count(), 0);
    assert_eq!(recorder.0.borrow().disconnects, 1);
}

#[test]
fn error_pages() {
    let cases: [(&[u8], StatusCode); 4] = [
        (b"PUT /status HTTP/1.1\r\n\r\n", StatusCode::METHOD_NOT_ALLOWED),
        (b"GET /missing HTTP/1.1\r\n\r\n", StatusCode::NOT_FOUND),
        (b"GET /status HTTP/1.0\r\n\r\n", StatusCode::HTTP_VERSION_NOT_SUPPORTED),
        (b"GET /status\r\n\r\n", StatusCode::BAD_REQUEST),
    ];
    for (request, status) in cases {
        let mut server = server_with(&[&STATUS]);
        let (response, recorder) = exchange(&mut server, request);
        assert_eq!(response.status, status.as_u16(), "{}", String::from_utf8_lossy(request));
        assert_eq!(response.header("Connection"), Some("close"));
        assert_eq!(recorder.0.borrow().disconnects, 1);
    }
}

#[test]
fn foreign_referer_is_not_found() {
    let mut server = server_with(&[&STATUS]);
    server.set_local_ip(Some(Ipv4Addr::new(10, 0, 0, 6)));

    let request = crlf(indoc! {"
        GET /status HTTP/1.1
        Referer: http://10.0.0.5/index.html

    "});
    let (response, _) = exchange(&mut server, &request);
    assert_eq!(response.status, 404);
    assert_eq!(server.routes().lookup_count(), 0);

    let request = crlf(indoc! {"
        GET /status HTTP/1.1
        Referer: http://10.0.0.6/index.html

    "});
    let (response, _) = exchange(&mut server, &request);
    assert_eq!(response.status, 200);
}

#[test]
fn referer_without_local_address_is_not_found() {
    let mut server = server_with(&[&STATUS]);
    let request = crlf(indoc! {"
        GET /status HTTP/1.1
        Referer: http://10.0.0.6/

    "});
    let (response, _) = exchange(&mut server, &request);
    assert_eq!(response.status, 404);
}

#[test]
fn post_body_reaches_value_handler() {
    let mut server = server_with(&[&SAVE]);
    let (id, recorder) = connect(&mut server);

    let head = crlf(indoc! {"
        POST /save HTTP/1.1
        Content-Type: text/plain
        Content-Length: 11

    "});
    server.on_receive(id, &[&head[..], b"hello"].concat());
    assert!(recorder.0.borrow().sent.is_empty());
    assert!(server.request(id).unwrap().page().is_none());

    server.on_receive(id, b" world");
    flush(&mut server, id, &recorder);

    let response = parse_response(&recorder.0.borrow().bytes());
    assert_eq!(response.status, 200);
    assert_eq!(response.header("Content-Length"), Some("14"));
    assert_eq!(response.body, b"11:hello world");
}

#[test]
fn path_rules_and_handler_errors() {
    let mut server = server_with(&[&LED]);

    let (response, _) = exchange(&mut server, b"GET /led/2 HTTP/1.1\r\n\r\n");
    assert_eq!(response.status, 200);
    assert_eq!(response.header("Content-Type"), Some(mime::APPLICATION_JSON.as_ref()));
    assert_eq!(response.body, br#"{"led":2}"#);

    let (response, _) = exchange(&mut server, b"GET /led/3 HTTP/1.1\r\n\r\n");
    assert_eq!(response.status, 400);

    for target in ["/led/4", "/led", "/led/1/2", "/led/x"] {
        let request = format!("GET {target} HTTP/1.1\r\n\r\n");
        let (response, _) = exchange(&mut server, request.as_bytes());
        assert_eq!(response.status, 404, "{target}");
    }
}

#[test]
fn rest_token_and_switches() {
    let mut server = server_with(&[&LED]);
    server.policy_mut().token = Some("s3cret".to_owned());

    let (response, _) = exchange(&mut server, b"GET /led/1 HTTP/1.1\r\n\r\n");
    assert_eq!(response.status, 404);

    let request = crlf(indoc! {"
        GET /led/1 HTTP/1.1
        token: s3cret

    "});
    let (response, _) = exchange(&mut server, &request);
    assert_eq!(response.status, 200);

    server.policy_mut().rest_enabled = false;
    let (response, _) = exchange(&mut server, &request);
    assert_eq!(response.status, 404);
}

#[test]
fn chunked_value_page_ends_with_terminal_chunk() {
    let mut server = server_with(&[&CHUNKS]);
    let (response, recorder) = exchange(&mut server, b"GET /chunks HTTP/1.1\r\n\r\n");

    assert_eq!(response.status, 200);
    assert_eq!(response.header("Transfer-Encoding"), Some("chunked"));
    assert_eq!(response.header("Content-Length"), None);
    assert_eq!(response.body, b"5\r\nhello\r\n0\r\n\r\n");

    let wire = recorder.0.borrow();
    assert_eq!(wire.sent.len(), 3);
    assert_eq!(wire.disconnects, 1);
}

#[test]
fn route_listing_streams_one_chunk_per_page() {
    let mut server = server_with(&[&STATUS, &HELP]);
    let (response, recorder) = exchange(&mut server, b"GET /help HTTP/1.1\r\n\r\n");

    assert_eq!(response.status, 200);
    assert_eq!(response.header("Transfer-Encoding"), Some("chunked"));
    assert_eq!(response.body, b"D\r\nGET /status\r\n\r\nB\r\nGET /help\r\n\r\n0\r\n\r\n");
    assert_eq!(recorder.0.borrow().disconnects, 1);
}

#[test]
fn bytes_after_the_response_are_ignored() {
    let mut server = server_with(&[&STATUS]);
    let (id, recorder) = connect(&mut server);

    server.on_receive(id, b"GET /status HTTP/1.1\r\n\r\n");
    assert_eq!(recorder.0.borrow().sent.len(), 1);
    server.on_receive(id, b"GET /missing HTTP/1.1\r\n\r\n");
    assert_eq!(recorder.0.borrow().sent.len(), 1);

    flush(&mut server, id, &recorder);
    assert_eq!(parse_response(&recorder.0.borrow().bytes()).body, b"ok");
}

#[test]
fn failed_send_disconnects() {
    let mut stack = MockStack::new();
    stack.expect_send().times(1).returning(|data| Err(SendError::refused(data.len())));
    stack.expect_disconnect().times(1).return_const(());

    let mut server = server_with(&[&STATUS]);
    let id = server.accept(Box::new(stack));
    server.on_receive(id, b"GET /status HTTP/1.1\r\n\r\n");

    let request = server.request(id).unwrap();
    assert!(request.is_responding());

    // nothing else goes out once the connection is dying
    server.on_sent(id);
    server.on_receive(id, b"GET /status HTTP/1.1\r\n\r\n");
    server.on_disconnect(id);
    assert!(server.request(id).is_none());
}

#[test]
fn connection_ids_are_unique() {
    let mut server = server_with(&[]);
    let (first, _) = connect(&mut server);
    let (second, _) = connect(&mut server);
    assert_ne!(first, second);
    assert_eq!(server.connection_count(), 2);

    server.on_reconnect(first, "connection reset");
    assert_eq!(server.connection_count(), 1);
    assert!(server.request(second).is_some());
}

fn open_events(server: &mut HttpServer) -> (ConnectionId, Recorder) {
    let (id, recorder) = connect(server);
    server.on_receive(id, b"GET /events HTTP/1.1\r\n\r\n");
    flush(server, id, &recorder);
    (id, recorder)
}

#[test]
fn event_page_becomes_push_channel() {
    let mut server = server_with(&[&EVENTS]);
    let (id, recorder) = open_events(&mut server);

    assert_eq!(server.channel_of(id), Some(0));
    assert_eq!(server.request(id).unwrap().channel(), Some(0));
    assert!(server.request(id).unwrap().is_ready());

    let response = parse_response(&recorder.0.borrow().bytes());
    assert_eq!(response.header("Content-Type"), Some(mime::TEXT_EVENT_STREAM.as_ref()));
    assert!(response.body.is_empty());

    server.push(0, br#"{"button":1}"#).unwrap();
    assert!(matches!(server.push(0, b"again"), Err(PushError::Send { source: SendError::Busy })));
    flush(&mut server, id, &recorder);

    assert_eq!(server.publish(b"x"), 1);
    flush(&mut server, id, &recorder);

    let bytes = recorder.0.borrow().bytes();
    assert!(bytes.ends_with(b"C\r\n{\"button\":1}\r\n1\r\nx\r\n"));
    assert_eq!(recorder.0.borrow().disconnects, 0);
}

#[test]
fn new_channel_evicts_the_others() {
    let mut server = server_with(&[&EVENTS]);
    let (first, first_wire) = open_events(&mut server);
    let (second, second_wire) = open_events(&mut server);

    assert_eq!(first_wire.0.borrow().disconnects, 1);
    assert_eq!(server.channel_of(first), None);
    assert_eq!(server.request(first).unwrap().channel(), None);
    assert_eq!(server.channel_of(second), Some(0));
    assert_eq!(second_wire.0.borrow().disconnects, 0);

    server.on_disconnect(first);
    assert_eq!(server.publish(b"x"), 1);
}

#[test]
fn push_to_empty_slot() {
    let mut server = server_with(&[&EVENTS]);
    assert!(matches!(server.push(2, b"x"), Err(PushError::EmptySlot { slot: 2 })));
    assert_eq!(server.publish(b"x"), 0);

    let (id, _) = open_events(&mut server);
    server.on_disconnect(id);
    assert!(matches!(server.push(0, b"x"), Err(PushError::EmptySlot { slot: 0 })));
    assert_eq!(server.unregister_channel(0), None);
}

#[test]
fn unregistered_channel_keeps_connection() {
    let mut server = server_with(&[&EVENTS]);
    let (id, recorder) = open_events(&mut server);

    assert_eq!(server.unregister_channel(0), Some(id));
    assert_eq!(server.request(id).unwrap().channel(), None);
    assert_eq!(recorder.0.borrow().disconnects, 0);
    assert_eq!(server.register_channel(id), Some(0));
}

/// Drains the body as it arrives and answers with the byte count.
struct Upload;

#[derive(Default)]
struct Drained(usize);

impl RequestHandler for Upload {
    fn handle(&self, ctx: &mut RequestContext<'_>) -> Result<Progress, HttpError> {
        let taken = ctx.content_mut().map_or(0, Buffer::clear);
        let expected = ctx.parser().content_length();
        if ctx.data::<Drained>().is_none() {
            ctx.set_data(Drained::default());
        }
        let drained = ctx.data::<Drained>().ok_or(HttpError::InternalError)?;
        drained.0 += taken;
        let total = drained.0;
        if total < expected {
            return Ok(Progress::NeedMore);
        }

        let send = ctx.send_buffer().ok_or(HttpError::InternalError)?;
        send.puts(&format!("{total} bytes"));
        Ok(Progress::Complete)
    }
}

static UPLOAD: Page = Page::post("load").with_request_handler(&Upload).multipart().with_send_capacity(32);

#[test]
fn multipart_page_drains_while_receiving() {
    let mut server = server_with(&[&UPLOAD]);
    let (id, recorder) = connect(&mut server);

    let head = crlf(indoc! {"
        POST /load HTTP/1.1
        Content-Type: multipart/form-data; boundary=xyz
        Content-Length: 10

    "});
    server.on_receive(id, &[&head[..], b"abcd"].concat());
    assert_eq!(server.request(id).unwrap().page().map(Page::path), Some("load"));
    assert!(recorder.0.borrow().sent.is_empty());
    assert_eq!(server.request(id).unwrap().parser().content().map(Buffer::size), Some(0));

    server.on_receive(id, b"efg");
    assert!(recorder.0.borrow().sent.is_empty());
    server.on_receive(id, b"hij");
    flush(&mut server, id, &recorder);

    let response = parse_response(&recorder.0.borrow().bytes());
    assert_eq!(response.status, 200);
    assert_eq!(response.body, b"10 bytes");
    assert_eq!(recorder.0.borrow().disconnects, 1);
}

#[test]
fn drained_upload_keeps_body_buffer_small() {
    const LEN: usize = 200_000;
    let mut server = server_with(&[&UPLOAD]);
    let (id, recorder) = connect(&mut server);

    let head = format!("POST /load HTTP/1.1\r\nContent-Type: multipart/form-data; boundary=xyz\r\nContent-Length: {LEN}\r\n\r\n");
    server.on_receive(id, head.as_bytes());

    let event = [b'u'; 1400];
    let mut fed = 0;
    let mut largest = 0;
    while fed < LEN {
        let part = &event[..(LEN - fed).min(event.len())];
        server.on_receive(id, part);
        fed += part.len();
        if let Some(content) = server.request(id).and_then(|request| request.parser().content()) {
            largest = largest.max(content.capacity());
        }
    }
    flush(&mut server, id, &recorder);

    assert_eq!(largest, BODY_CHUNK_LIMIT + 1);
    let response = parse_response(&recorder.0.borrow().bytes());
    assert_eq!(response.status, 200);
    assert_eq!(response.body, format!("{LEN} bytes").as_bytes());
}
