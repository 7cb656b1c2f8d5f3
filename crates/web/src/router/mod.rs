//! Route table and request target matching.
//!
//! The table is an ordered list of `static` pages, filled once at startup
//! and read-only afterwards. A request target is split before anything is
//! decoded:
//!
//! ```text
//! /device/5CCF7F0A0B0C/on?level=3&mode=blink
//!  ^^^^^^ ^^^^^^^^^^^^^^^^ ^^^^^^^^^^^^^^^^^^
//!  index  args             query
//! ```
//!
//! Each piece (index, every args segment, every query name and value) is then
//! percent-decoded on its own, so an encoded `/`, `?`, `&` or `=` never
//! changes the structure of the target.
//!
//! # Matching
//!
//! Pages are scanned in registration order and the first page accepting the
//! request wins:
//!
//! 1. path literal equals the index, method equals
//! 2. aliases are followed to their final page
//! 3. the panel / REST gates of that page accept the request
//! 4. args are present exactly when the page declares path rules, and each
//!    segment validates against the rule at its position; the segment count
//!    must equal the rule count
//! 5. a query is only accepted by pages with query rules; pages with required
//!    query rules need one. Unknown query names are ignored, invalid values
//!    and missing required names reject the page

pub mod filter;

use std::cell::Cell;

use button_http::codec::header::percent_decode;
use tracing::{trace, warn};

use crate::page::{MAX_PATH_RULES, MAX_QUERY_RULES, Page};
use crate::rule::Value;
use filter::{Filter, GATES, MethodFilter, RouteRequest};

const MAX_ALIAS_DEPTH: usize = 8;

/// A request target split into its routing components.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Target {
    index: String,
    args: Option<Vec<String>>,
    query: Option<Vec<(String, String)>>,
}

impl Target {
    pub fn parse(raw: &str) -> Self {
        let (path, query) = match raw.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (raw, None),
        };
        let path = path.trim_start_matches('/');
        let (index, args) = match path.split_once('/') {
            Some((index, args)) => (index, Some(args)),
            None => (path, None),
        };

        let args = args.map(|args| {
            if args.is_empty() { Vec::new() } else { args.split('/').map(percent_decode).collect() }
        });
        let query = query.filter(|query| !query.is_empty()).map(|query| {
            query
                .split('&')
                .filter(|pair| !pair.is_empty())
                .map(|pair| {
                    let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
                    (percent_decode(name), percent_decode(value))
                })
                .collect()
        });

        Self { index: percent_decode(index), args, query }
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    /// The decoded segments after the index; `None` when the path has no second segment.
    pub fn args(&self) -> Option<&[String]> {
        self.args.as_deref()
    }

    pub fn query(&self) -> Option<&[(String, String)]> {
        self.query.as_deref()
    }
}

/// A matched page with its validated arguments.
#[derive(Debug)]
pub struct Route<'t> {
    page: &'static Page,
    path: Vec<Value<'t>>,
    query: Vec<Option<Value<'t>>>,
}

impl<'t> Route<'t> {
    #[inline]
    pub fn page(&self) -> &'static Page {
        self.page
    }

    pub fn into_values(self) -> (Vec<Value<'t>>, Vec<Option<Value<'t>>>) {
        (self.path, self.query)
    }
}

#[derive(Debug, Default)]
pub struct RouteTable {
    pages: Vec<&'static Page>,
    lookups: Cell<usize>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `page`; pages declaring more rules than a request can carry are refused.
    pub fn add_page(&mut self, page: &'static Page) -> bool {
        if page.path_rules().len() > MAX_PATH_RULES || page.query_rules().len() > MAX_QUERY_RULES {
            warn!(path = page.path(), "page declares too many rules, not registered");
            return false;
        }
        self.pages.push(page);
        true
    }

    pub fn pages(&self) -> &[&'static Page] {
        &self.pages
    }

    /// Number of table scans so far.
    pub fn lookup_count(&self) -> usize {
        self.lookups.get()
    }

    /// Finds the first page accepting the request.
    pub fn find<'t>(&self, target: &'t Target, req: &RouteRequest<'_>) -> Option<Route<'t>> {
        self.lookups.set(self.lookups.get() + 1);

        for &candidate in &self.pages {
            if candidate.path() != target.index || !MethodFilter.check(candidate, req) {
                continue;
            }
            let Some(page) = resolve_alias(candidate) else {
                warn!(path = candidate.path(), "alias chain too deep");
                continue;
            };
            if !GATES.iter().all(|gate| gate.check(page, req)) {
                continue;
            }
            let Some(path) = match_path(page, target) else {
                continue;
            };
            let Some(query) = match_query(page, target) else {
                continue;
            };

            trace!(path = page.path(), "page matched");
            return Some(Route { page, path, query });
        }
        None
    }
}

fn resolve_alias(mut page: &'static Page) -> Option<&'static Page> {
    for _ in 0..MAX_ALIAS_DEPTH {
        match page.alias() {
            Some(target) => page = target,
            None => return Some(page),
        }
    }
    None
}

fn match_path<'t>(page: &Page, target: &'t Target) -> Option<Vec<Value<'t>>> {
    let rules = page.path_rules();
    match target.args() {
        None if rules.is_empty() => Some(Vec::new()),
        Some(segments) if !rules.is_empty() && segments.len() == rules.len() => {
            rules.iter().zip(segments).map(|(rule, segment)| rule.validate(segment)).collect()
        }
        _ => None,
    }
}

fn match_query<'t>(page: &Page, target: &'t Target) -> Option<Vec<Option<Value<'t>>>> {
    let rules = page.query_rules();
    let Some(pairs) = target.query() else {
        return (!page.requires_query()).then(|| vec![None; rules.len()]);
    };
    if rules.is_empty() {
        return None;
    }

    let mut values = vec![None; rules.len()];
    for (name, value) in pairs {
        let Some(position) = rules.iter().position(|rule| rule.name() == name.as_str()) else {
            continue;
        };
        values[position] = Some(rules[position].validate(value)?);
    }

    let missing = rules.iter().zip(&values).any(|(rule, value)| rule.is_required() && value.is_none());
    (!missing).then_some(values)
}
