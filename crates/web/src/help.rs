//! A chunked page listing every registered route.
//!
//! One chunk per page, each a line such as
//!
//! ```text
//! GET /api/<ALPHA 1..8>/<UINT 0..99>[/<BOOL false|true>]?level=<UINT 0..10>[&mode=<ENUM off|on>]
//! ```
//!
//! Optional rules are bracketed and `EQUAL` path rules show their literal.
//! The stream ends with an empty chunk after the last page.

use std::fmt::{self, Write};

use button_http::protocol::{HttpError, Progress};
use tracing::{debug, warn};

use crate::page::{Page, RequestHandler};
use crate::request::{RequestContext, chunk_buffer};
use crate::rule::{Rule, RuleKind};

#[derive(Debug)]
pub struct RouteListing;

struct Cursor(usize);

impl RouteListing {
    /// Writes the one-line description of `page`.
    pub fn describe(page: &Page, dst: &mut impl Write) -> fmt::Result {
        write!(dst, "{} /{}", page.method(), page.path())?;
        for rule in page.path_rules() {
            optional(rule, dst, |dst| {
                dst.write_char('/')?;
                match rule.kind() {
                    RuleKind::Equal(literal) => dst.write_str(literal),
                    _ => describe_rule(rule, dst),
                }
            })?;
        }
        for (index, rule) in page.query_rules().iter().enumerate() {
            optional(rule, dst, |dst| {
                dst.write_char(if index == 0 { '?' } else { '&' })?;
                if !rule.name().is_empty() {
                    write!(dst, "{}=", rule.name())?;
                }
                describe_rule(rule, dst)
            })?;
        }
        Ok(())
    }
}

fn optional<W: Write>(rule: &Rule, dst: &mut W, body: impl FnOnce(&mut W) -> fmt::Result) -> fmt::Result {
    if rule.is_required() {
        return body(dst);
    }
    dst.write_char('[')?;
    body(dst)?;
    dst.write_char(']')
}

fn describe_rule(rule: &Rule, dst: &mut impl Write) -> fmt::Result {
    let mut range = String::new();
    rule.write_range(&mut range)?;
    dst.write_char('<')?;
    dst.write_str(rule.type_tag())?;
    if !range.is_empty() {
        write!(dst, " {range}")?;
    }
    dst.write_char('>')
}

impl RequestHandler for RouteListing {
    fn handle(&self, ctx: &mut RequestContext<'_>) -> Result<Progress, HttpError> {
        ctx.set_data(Cursor(0));
        Ok(Progress::Complete)
    }

    fn on_ready(&self, ctx: &mut RequestContext<'_>) {
        let index = match ctx.data::<Cursor>() {
            Some(cursor) => {
                cursor.0 += 1;
                cursor.0 - 1
            }
            None => return,
        };

        let mut line = String::new();
        if let Some(page) = ctx.routes().pages().get(index) {
            // writing into a String cannot fail
            let _ = Self::describe(page, &mut line);
            line.push_str("\r\n");
        }
        let mut chunk = match chunk_buffer(line.len()) {
            Ok(chunk) => chunk,
            Err(e) => {
                warn!(connection = %ctx.id(), cause = %e, "unable to allocate route listing chunk");
                ctx.close();
                return;
            }
        };
        chunk.puts(&line);
        ctx.set_send_buffer(chunk);
        if let Err(e) = ctx.send_chunked() {
            debug!(connection = %ctx.id(), cause = %e, "route listing interrupted");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::Rule;

    static PATH: [Rule; 3] =
        [Rule::alpha("kind").with_len(1, 8).required(), Rule::equal("", "on").required(), Rule::boolean("flag")];
    static QUERY: [Rule; 2] = [Rule::uint("level", 0, 10).required(), Rule::enumeration("mode", &["off", "on"])];

    fn describe(page: &Page) -> String {
        let mut out = String::new();
        RouteListing::describe(page, &mut out).unwrap();
        out
    }

    #[test]
    fn plain_page() {
        assert_eq!(describe(&Page::get("status")), "GET /status");
        assert_eq!(describe(&Page::post("")), "POST /");
    }

    #[test]
    fn rules_are_described() {
        let page = Page::get("api").with_path_rules(&PATH).with_query_rules(&QUERY);
        assert_eq!(
            describe(&page),
            "GET /api/<ALPHA 1..8>/on[/<BOOL false|true>]?level=<UINT 0..10>[&mode=<ENUM off|on>]"
        );
    }

    #[test]
    fn rule_without_range() {
        static MAC: [Rule; 1] = [Rule::mac("mac").required()];
        assert_eq!(describe(&Page::get("device").with_path_rules(&MAC)), "GET /device/<MAC>");
    }

    #[test]
    fn unbounded_length_has_no_range() {
        static SSID: [Rule; 1] = [Rule::chars("ssid").required()];
        assert_eq!(describe(&Page::post("wifi").with_query_rules(&SSID)), "POST /wifi?ssid=<CHRS>");
    }
}
