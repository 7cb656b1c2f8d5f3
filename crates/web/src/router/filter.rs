//! Per-page request filters.
//!
//! A page is only a candidate when every filter accepts the request. The
//! filters see the request through [`RouteRequest`], the few facts matching
//! depends on besides the target itself.

use std::net::Ipv4Addr;

use button_http::protocol::Method;

use crate::config::AccessPolicy;
use crate::page::Page;

const SCHEME: &str = "http://";

/// What the filters know about the request being routed.
#[derive(Debug, Copy, Clone)]
pub struct RouteRequest<'a> {
    method: Method,
    token: Option<&'a str>,
    policy: &'a AccessPolicy,
}

impl<'a> RouteRequest<'a> {
    pub fn new(method: Method, token: Option<&'a str>, policy: &'a AccessPolicy) -> Self {
        Self { method, token, policy }
    }

    #[inline]
    pub fn method(&self) -> Method {
        self.method
    }
}

pub trait Filter {
    fn check(&self, page: &Page, req: &RouteRequest<'_>) -> bool;
}

#[derive(Debug)]
pub struct MethodFilter;

impl Filter for MethodFilter {
    #[inline]
    fn check(&self, page: &Page, req: &RouteRequest<'_>) -> bool {
        page.method() == req.method
    }
}

/// Panel pages disappear while the panel is switched off.
#[derive(Debug)]
pub struct PanelFilter;

impl Filter for PanelFilter {
    fn check(&self, page: &Page, req: &RouteRequest<'_>) -> bool {
        !page.is_panel() || req.policy.panel_enabled
    }
}

/// REST pages need the REST switch and, if one is configured, the exact token.
#[derive(Debug)]
pub struct RestFilter;

impl Filter for RestFilter {
    fn check(&self, page: &Page, req: &RouteRequest<'_>) -> bool {
        if !page.is_rest() {
            return true;
        }
        if !req.policy.rest_enabled {
            return false;
        }
        match req.policy.rest_token() {
            Some(expected) => req.token == Some(expected),
            None => true,
        }
    }
}

/// The gates checked on the page a request resolves to, after aliases.
pub static GATES: [&(dyn Filter + Sync); 2] = [&PanelFilter, &RestFilter];

/// Whether `referer` points at the device itself.
///
/// The address must start within the authority, right after the scheme; an
/// unknown own address never matches.
pub fn same_origin(referer: &str, local_ip: Option<Ipv4Addr>) -> bool {
    let Some(ip) = local_ip else {
        return false;
    };
    let ip = ip.to_string();
    let Some(position) = referer.find(&ip) else {
        return false;
    };
    let followed_by_digit = referer[position + ip.len()..].starts_with(|c: char| c.is_ascii_digit());
    position <= SCHEME.len() && !followed_by_digit
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOCAL: Option<Ipv4Addr> = Some(Ipv4Addr::new(10, 0, 0, 6));

    #[test]
    fn referer_must_name_the_device() {
        assert!(same_origin("http://10.0.0.6/page", LOCAL));
        assert!(same_origin("http://10.0.0.6:80/", LOCAL));
        assert!(same_origin("10.0.0.6", LOCAL));
        assert!(!same_origin("http://10.0.0.5/page", LOCAL));
        assert!(!same_origin("http://10.0.0.60/page", LOCAL));
        assert!(!same_origin("http://evil.example/10.0.0.6", LOCAL));
        assert!(!same_origin("http://10.0.0.6/", None));
    }

    #[test]
    fn rest_gate_and_token() {
        static REST: Page = Page::get("api").rest();
        static OPEN: Page = Page::get("api");

        let open_policy = AccessPolicy::default();
        assert!(RestFilter.check(&REST, &RouteRequest::new(Method::Get, None, &open_policy)));

        let disabled = AccessPolicy { rest_enabled: false, ..AccessPolicy::default() };
        assert!(!RestFilter.check(&REST, &RouteRequest::new(Method::Get, None, &disabled)));
        assert!(RestFilter.check(&OPEN, &RouteRequest::new(Method::Get, None, &disabled)));

        let guarded = AccessPolicy { token: Some("s3cret".into()), ..AccessPolicy::default() };
        assert!(RestFilter.check(&REST, &RouteRequest::new(Method::Get, Some("s3cret"), &guarded)));
        assert!(!RestFilter.check(&REST, &RouteRequest::new(Method::Get, Some("s3cre"), &guarded)));
        assert!(!RestFilter.check(&REST, &RouteRequest::new(Method::Get, None, &guarded)));
    }

    #[test]
    fn panel_gate() {
        static PANEL: Page = Page::get("").panel();
        let off = AccessPolicy { panel_enabled: false, ..AccessPolicy::default() };
        assert!(!PanelFilter.check(&PANEL, &RouteRequest::new(Method::Get, None, &off)));
        assert!(PanelFilter.check(&PANEL, &RouteRequest::new(Method::Get, None, &AccessPolicy::default())));
    }

    #[test]
    fn method_must_match() {
        static SAVE: Page = Page::post("save");
        let policy = AccessPolicy::default();
        assert!(MethodFilter.check(&SAVE, &RouteRequest::new(Method::Post, None, &policy)));
        assert!(!MethodFilter.check(&SAVE, &RouteRequest::new(Method::Get, None, &policy)));
    }
}
