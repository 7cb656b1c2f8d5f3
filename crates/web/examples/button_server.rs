//! The button's configuration server running on a hosted machine.
//!
//! ```bash
//! cargo run --example button_server -- button.json
//! curl http://127.0.0.1:8080/help
//! curl -N http://127.0.0.1:8080/events
//! ```
//!
//! `button.json` is optional, e.g.
//!
//! ```json
//! { "listen": "127.0.0.1:8080", "access": { "token": "s3cret", "local_ip": "127.0.0.1" } }
//! ```

use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use button_http::buffer::Buffer;
use button_http::protocol::{HttpError, Progress};
use button_web::config::ServerConfig;
use button_web::{HttpServer, Page, PageArgs, RequestContext, RequestHandler, RouteListing, Rule, Value, runtime};
use serde_json::json;
use tracing::{Level, error, info};

const INDEX_HTML: &[u8] = b"<html><body><h1>WiFi button</h1><a href=\"/help\">routes</a></body></html>";
const LED_STATES: &[&str] = &["off", "on", "blink"];

static PRESSES: AtomicU32 = AtomicU32::new(0);

static INDEX: Page = Page::get("").with_content(INDEX_HTML).panel();
static INDEX_HTML_PAGE: Page = Page::get("index.html").with_alias(&INDEX);

static STATUS: Page = Page::get("status").with_value_handler(status).with_content_type("application/json").rest();

static LED_RULES: [Rule; 2] = [Rule::uint("led", 0, 3).required(), Rule::enumeration("state", LED_STATES).required()];
static LED_QUERY: [Rule; 1] = [Rule::uint("level", 0, 100)];
static LED: Page = Page::get("led")
    .with_value_handler(set_led)
    .with_path_rules(&LED_RULES)
    .with_query_rules(&LED_QUERY)
    .with_content_type("application/json")
    .rest();

static WIFI_RULES: [Rule; 2] = [Rule::chars("ssid").with_len(1, 32).required(), Rule::chars("password").with_len(8, 64)];
static WIFI: Page = Page::post("wifi").with_value_handler(save_wifi).with_query_rules(&WIFI_RULES).panel();

static HELP: Page = Page::get("help").with_request_handler(&RouteListing).chunked().with_content_type("text/plain");
static EVENTS: Page = Page::get("events").event().with_content_type("text/event-stream");
static LOAD: Page = Page::post("load")
    .with_request_handler(&Upload)
    .multipart()
    .with_send_capacity(64)
    .with_content_type("text/plain")
    .panel();

static PAGES: [&Page; 8] = [&INDEX, &INDEX_HTML_PAGE, &STATUS, &LED, &WIFI, &HELP, &EVENTS, &LOAD];

fn json_body(value: &serde_json::Value) -> Buffer {
    Buffer::from_slice(value.to_string().as_bytes())
}

fn status(_args: &PageArgs<'_>) -> Result<Option<Buffer>, HttpError> {
    let body = json!({ "presses": PRESSES.load(Ordering::Relaxed), "leds": 4 });
    Ok(Some(json_body(&body)))
}

fn set_led(args: &PageArgs<'_>) -> Result<Option<Buffer>, HttpError> {
    let (Some(Value::Uint(led)), Some(Value::Index(state))) = (args.path(0), args.path(1)) else {
        return Err(HttpError::InternalError);
    };
    let level = args.query(0).and_then(|v| v.as_uint()).unwrap_or(100);
    info!(led, state = LED_STATES[state], level, "led changed");
    Ok(Some(json_body(&json!({ "led": led, "state": LED_STATES[state], "level": level }))))
}

fn save_wifi(args: &PageArgs<'_>) -> Result<Option<Buffer>, HttpError> {
    let ssid = args.query(0).and_then(|v| v.as_str().map(str::to_owned)).ok_or(HttpError::BadRequest)?;
    let secured = args.query(1).is_some();
    info!(%ssid, secured, "wifi settings saved");
    Ok(Some(Buffer::from_slice(b"saved")))
}

/// Accepts a firmware image, discarding it as it arrives.
struct Upload;

#[derive(Default)]
struct Received(usize);

impl RequestHandler for Upload {
    fn handle(&self, ctx: &mut RequestContext<'_>) -> Result<Progress, HttpError> {
        let multipart = ctx.parser().content_type().is_some_and(|ct| ct.starts_with("multipart/form-data"));
        if !multipart {
            return Err(HttpError::BadRequest);
        }

        let drained = ctx.content_mut().map_or(0, Buffer::clear);
        let expected = ctx.parser().content_length();
        if ctx.data::<Received>().is_none() {
            ctx.set_data(Received::default());
        }
        let received = ctx.data::<Received>().ok_or(HttpError::InternalError)?;
        received.0 += drained;
        let total = received.0;
        if total < expected {
            return Ok(Progress::NeedMore);
        }

        info!(connection = %ctx.id(), total, "image received");
        let send = ctx.send_buffer().ok_or(HttpError::InternalError)?;
        send.puts(&format!("received {total} bytes"));
        Ok(Progress::Complete)
    }

    fn on_close(&self, ctx: &mut RequestContext<'_>) {
        let id = ctx.id();
        if let Some(received) = ctx.data::<Received>() {
            info!(connection = %id, received = received.0, "upload closed");
        }
    }
}

fn main() {
    if let Err(e) = runtime::init_tracing(Level::INFO) {
        eprintln!("unable to initialize tracing: {e}");
    }

    let path = std::env::args().nth(1).map_or_else(|| PathBuf::from("button.json"), PathBuf::from);
    let config = match ServerConfig::load(&path) {
        Ok(config) => config,
        Err(e) => {
            error!(cause = %e, path = %path.display(), "invalid configuration");
            return;
        }
    };

    let mut server = HttpServer::new(config.access.clone());
    for page in PAGES {
        server.add_page(page);
    }
    let server = Rc::new(RefCell::new(server));

    let rt = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            error!(cause = %e, "unable to build runtime");
            return;
        }
    };
    let local = tokio::task::LocalSet::new();
    local.spawn_local(publish_presses(Rc::clone(&server)));
    if let Err(e) = rt.block_on(local.run_until(runtime::serve(server, &config))) {
        error!(cause = %e, "server stopped");
    }
}

// simulates button presses, pushed to every open event stream
async fn publish_presses(server: Rc<RefCell<HttpServer>>) {
    let mut interval = tokio::time::interval(Duration::from_secs(5));
    loop {
        interval.tick().await;
        let presses = PRESSES.fetch_add(1, Ordering::Relaxed) + 1;
        let event = json!({ "button": 1, "presses": presses }).to_string();
        let delivered = server.borrow_mut().publish(event.as_bytes());
        if delivered > 0 {
            info!(delivered, presses, "press published");
        }
    }
}
