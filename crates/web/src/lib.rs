//! Page routing, request lifecycle and push channels for the WiFi button
//!
//! `button-web` sits on top of the byte-level engine in `button-http` and turns
//! network events into page responses. It is callback driven: the host owns
//! the sockets, reports *accept*, *receive*, *sent* and *disconnect* events to
//! an [`HttpServer`], and carries out the sends and disconnects the server
//! asks for through a [`Transport`](button_http::transport::Transport).
//!
//! # Features
//!
//! - Static pages with typed path and query rules, validated before any
//!   handler runs
//! - Value handlers producing a whole body, request handlers driving streamed
//!   uploads and paginated chunk streams
//! - Panel / REST access switches, REST token and same-origin `Referer` check
//! - Up to three push channels fed by an external publisher
//! - A ready-made route listing page
//! - A tokio [`runtime`] for running the server on a hosted machine
//!
//! # Example
//!
//! ```no_run
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! use button_web::config::ServerConfig;
//! use button_web::{HttpServer, Page, runtime};
//!
//! static STATUS: Page = Page::get("status").with_content(b"ok").with_content_type("text/plain");
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> std::io::Result<()> {
//!     let config = ServerConfig::default();
//!     let mut server = HttpServer::new(config.access.clone());
//!     server.add_page(&STATUS);
//!
//!     let server = Rc::new(RefCell::new(server));
//!     tokio::task::LocalSet::new().run_until(runtime::serve(server, &config)).await
//! }
//! ```
//!
//! # Architecture
//!
//! - [`rule`]: path / query argument rules and the values they produce
//! - [`page`]: page descriptors and handler traits
//! - [`router`]: target splitting, access filters and the route table
//! - [`request`]: per-connection state and the handler context
//! - [`channel`]: the push-channel slot table
//! - [`server`]: the connection manager tying it all together
//! - [`help`]: the route listing page
//! - [`config`] / [`runtime`]: hosted configuration and the tokio driver

pub mod channel;
pub mod config;
pub mod help;
pub mod page;
pub mod request;
pub mod router;
pub mod rule;
pub mod runtime;
pub mod server;

pub use channel::PushError;
pub use help::RouteListing;
pub use page::{Page, PageArgs, PageHandler, RequestHandler};
pub use request::{ConnectionId, RequestContext};
pub use router::RouteTable;
pub use rule::{Rule, Value};
pub use server::HttpServer;
