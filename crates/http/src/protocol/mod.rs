//! Protocol level types shared by the parser, the encoders and the connection layer.
//!
//! - [`Method`]: the three request methods the engine understands
//! - [`Progress`]: the non-error outcomes of feeding bytes or running a handler
//! - [`PayloadSize`]: how a response body is framed on the wire
//! - [`HttpError`]: the five error outcomes, each answered with a canned page
//! - [`SendError`]: transport side failures
//!
//! Parser and handler results are `Result<Progress, HttpError>`, so the whole
//! result set of a single step is `NeedMore`, `Complete` or one of the five
//! error statuses.

mod message;
pub use message::PayloadSize;
pub use message::Progress;

mod method;
pub use method::Method;

mod error;
pub use error::HttpError;
pub use error::SendError;
