//! Dashboard route table and access guard.
//!
//! Routes are slash-separated paths like `/wifi/settings`. Top-level
//! sections own child routes and redirect to a default child when opened
//! directly. A route may declare a required access level; the guard
//! compares it against the cached level on every navigation.

use crate::access::AccessLevel;
use std::fmt;

/// Path every rejected navigation is sent to.
pub const ROOT_PATH: &str = "/";

/// A parsed route path.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutePath {
    /// Normalized path string, always starting with '/'
    raw: String,
    /// Non-empty segments split by '/'
    segments: Vec<String>,
}

impl RoutePath {
    /// Parse a path, dropping any query or fragment and empty segments.
    pub fn new(path: &str) -> Self {
        let path = path
            .split(['?', '#'])
            .next()
            .unwrap_or_default();
        let segments: Vec<String> = path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
        Self {
            raw: format!("/{}", segments.join("/")),
            segments,
        }
    }

    /// Get the normalized path string.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Get the path segments.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Check if this path starts with a given prefix.
    pub fn starts_with(&self, prefix: &RoutePath) -> bool {
        if prefix.segments.len() > self.segments.len() {
            return false;
        }
        self.segments
            .iter()
            .zip(prefix.segments.iter())
            .all(|(a, b)| a == b)
    }

    fn join(&self, child: &RoutePath) -> RoutePath {
        RoutePath::new(&format!("{}/{}", self.raw, child.raw))
    }
}

impl fmt::Display for RoutePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl From<&str> for RoutePath {
    fn from(s: &str) -> Self {
        RoutePath::new(s)
    }
}

/// Metadata attached to a route record.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteMeta {
    /// Display title.
    pub title: Option<String>,
    /// Access level this route is restricted to.
    pub required_access_level: Option<u16>,
}

/// A route declaration. Child paths are relative to the parent.
#[derive(Debug, Clone)]
pub struct RouteRecord {
    path: RoutePath,
    name: Option<String>,
    meta: RouteMeta,
    redirect: Option<String>,
    children: Vec<RouteRecord>,
}

impl RouteRecord {
    /// Declare a route with a display title.
    pub fn new(path: &str, title: &str) -> Self {
        Self {
            path: RoutePath::new(path),
            name: None,
            meta: RouteMeta {
                title: Some(title.to_string()),
                required_access_level: None,
            },
            redirect: None,
            children: Vec::new(),
        }
    }

    /// Declare a section that only redirects to one of its children.
    pub fn section(path: &str, redirect: &str) -> Self {
        Self {
            path: RoutePath::new(path),
            name: None,
            meta: RouteMeta {
                title: None,
                required_access_level: None,
            },
            redirect: Some(redirect.to_string()),
            children: Vec::new(),
        }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn requires(mut self, level: u16) -> Self {
        self.meta.required_access_level = Some(level);
        self
    }

    pub fn child(mut self, child: RouteRecord) -> Self {
        self.children.push(child);
        self
    }

    pub fn path(&self) -> &RoutePath {
        &self.path
    }

    pub fn meta(&self) -> &RouteMeta {
        &self.meta
    }
}

/// One matched record, with its absolute path.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchedRecord {
    pub path: String,
    pub name: Option<String>,
    pub meta: RouteMeta,
}

/// A fully resolved navigation target.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRoute {
    /// Final path after redirects.
    pub path: String,
    /// Matched records, outermost first.
    pub matched: Vec<MatchedRecord>,
}

impl ResolvedRoute {
    /// First non-zero required level along the matched chain.
    pub fn required_access_level(&self) -> Option<u16> {
        self.matched
            .iter()
            .find_map(|record| record.meta.required_access_level.filter(|level| *level != 0))
    }

    /// Title of the innermost record that has one.
    pub fn title(&self) -> Option<&str> {
        self.matched
            .iter()
            .rev()
            .find_map(|record| record.meta.title.as_deref())
    }
}

/// Outcome of the access guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    Redirect(String),
}

/// Decide whether the stored access level may open `route`.
///
/// Ungated routes always pass. Gated routes need a stored, non-blank level
/// equal to the requirement.
pub fn guard(route: &ResolvedRoute, stored: Option<&AccessLevel>) -> GuardDecision {
    let Some(required) = route.required_access_level() else {
        return GuardDecision::Allow;
    };
    match stored {
        Some(level) if !level.as_str().is_empty() && level.satisfies(required) => {
            GuardDecision::Allow
        }
        _ => GuardDecision::Redirect(ROOT_PATH.to_string()),
    }
}

/// Result of a guarded navigation.
#[derive(Debug, Clone, PartialEq)]
pub enum Navigation {
    /// The requested route was opened.
    Allowed(ResolvedRoute),
    /// The guard sent the viewer elsewhere.
    Redirected {
        requested: String,
        to: ResolvedRoute,
    },
}

impl Navigation {
    /// The route actually shown.
    pub fn route(&self) -> &ResolvedRoute {
        match self {
            Navigation::Allowed(route) => route,
            Navigation::Redirected { to, .. } => to,
        }
    }

    pub fn is_redirect(&self) -> bool {
        matches!(self, Navigation::Redirected { .. })
    }
}

/// Errors that can occur when resolving a route.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RouteError {
    #[error("No route matches {0}")]
    NotFound(String),
    #[error("Redirect loop at {0}")]
    RedirectLoop(String),
}

/// Redirects followed before giving up.
const MAX_REDIRECTS: usize = 8;

/// The dashboard's route table.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<RouteRecord>,
}

impl RouteTable {
    pub fn new(routes: Vec<RouteRecord>) -> Self {
        Self { routes }
    }

    /// Route surface of the coop door controller dashboard.
    pub fn coop_controller() -> Self {
        Self::new(vec![
            RouteRecord::new("/", "Door"),
            RouteRecord::new("/devices", "Accessories"),
            RouteRecord::section("/settings", "/settings/auto")
                .child(RouteRecord::new("auto", "Settings / Automation").named("Settings_Auto"))
                .child(
                    RouteRecord::new("motor", "Settings / Drive")
                        .named("Settings_Motor")
                        .requires(1),
                ),
            RouteRecord::section("/wifi", "/wifi/status")
                .child(RouteRecord::new("status", "WiFi / Status").named("WiFi_Status"))
                .child(RouteRecord::new("scan", "WiFi / Scan").named("WiFi_Scan"))
                .child(RouteRecord::new("settings", "WiFi / Settings").named("WiFi_Settings")),
            RouteRecord::section("/mqtt", "/mqtt/status")
                .child(RouteRecord::new("status", "MQTT / Status").named("MQTT_Status"))
                .child(RouteRecord::new("settings", "MQTT / Settings").named("MQTT_Settings")),
            RouteRecord::section("/date_time", "/date_time/status")
                .child(
                    RouteRecord::new("status", "Date and time / Status").named("DateTime_Status"),
                )
                .child(
                    RouteRecord::new("settings", "Date and time / Settings")
                        .named("DateTime_Settings")
                        .requires(1),
                ),
            RouteRecord::section("/system", "/system/status")
                .child(
                    RouteRecord::new("status", "System / Status")
                        .named("System_Status")
                        .requires(1),
                )
                .child(
                    RouteRecord::new("log", "System / Log")
                        .named("System_Log")
                        .requires(1),
                )
                .child(
                    RouteRecord::new("update", "System / Update")
                        .named("System_Update")
                        .requires(1),
                ),
        ])
    }

    /// All navigable (leaf or redirect-free) paths, in declaration order.
    pub fn paths(&self) -> Vec<String> {
        let mut out = Vec::new();
        for record in &self.routes {
            collect_paths(record, &RoutePath::new("/"), &mut out);
        }
        out
    }

    /// Resolve a path to its matched chain, following redirects.
    pub fn resolve(&self, path: &str) -> Result<ResolvedRoute, RouteError> {
        let mut target = RoutePath::new(path);
        for _ in 0..MAX_REDIRECTS {
            let (chain, redirect) = self
                .match_path(&target)
                .ok_or_else(|| RouteError::NotFound(target.to_string()))?;
            match redirect {
                Some(next) => target = RoutePath::new(&next),
                None => {
                    return Ok(ResolvedRoute {
                        path: target.to_string(),
                        matched: chain,
                    })
                }
            }
        }
        Err(RouteError::RedirectLoop(target.to_string()))
    }

    /// Resolve `path` and run the access guard against `stored`.
    pub fn navigate(
        &self,
        path: &str,
        stored: Option<&AccessLevel>,
    ) -> Result<Navigation, RouteError> {
        let route = self.resolve(path)?;
        match guard(&route, stored) {
            GuardDecision::Allow => Ok(Navigation::Allowed(route)),
            GuardDecision::Redirect(to) => Ok(Navigation::Redirected {
                requested: route.path,
                to: self.resolve(&to)?,
            }),
        }
    }

    fn match_path(&self, target: &RoutePath) -> Option<(Vec<MatchedRecord>, Option<String>)> {
        self.routes
            .iter()
            .find_map(|record| match_record(record, &RoutePath::new("/"), target))
    }
}

fn match_record(
    record: &RouteRecord,
    parent: &RoutePath,
    target: &RoutePath,
) -> Option<(Vec<MatchedRecord>, Option<String>)> {
    let full = parent.join(&record.path);
    if !target.starts_with(&full) {
        return None;
    }
    let here = MatchedRecord {
        path: full.to_string(),
        name: record.name.clone(),
        meta: record.meta.clone(),
    };

    if target.segments().len() == full.segments().len() {
        return Some((vec![here], record.redirect.clone()));
    }

    record.children.iter().find_map(|child| {
        match_record(child, &full, target).map(|(mut chain, redirect)| {
            chain.insert(0, here.clone());
            (chain, redirect)
        })
    })
}

fn collect_paths(record: &RouteRecord, parent: &RoutePath, out: &mut Vec<String>) {
    let full = parent.join(&record.path);
    if record.redirect.is_none() {
        out.push(full.to_string());
    }
    for child in &record.children {
        collect_paths(child, &full, out);
    }
}
