//! URL pattern matching for compiled routes.
//!
//! # Responsibilities
//! - Match host (exact, case-insensitive, port ignored)
//! - Match pathname segments: literal, `:name`, `:name+`
//! - Return captured parameters
//!
//! # Design Decisions
//! - No regex: patterns are split into segments once at route compile time
//! - A catch-all binds one or more segments joined with `/`
//! - Trailing slashes are ignored

use std::collections::BTreeMap;

use crate::routing::regexp::RoutePattern;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
    CatchAll(String),
}

/// Matchable form of a [`RoutePattern`].
#[derive(Debug, Clone)]
pub struct UrlPattern {
    host: Option<String>,
    segments: Vec<Segment>,
}

/// Parameters captured by a successful match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatternMatch {
    pub params: BTreeMap<String, String>,
}

impl UrlPattern {
    pub fn new(pattern: &RoutePattern) -> Self {
        let segments = pattern
            .pathname
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| match s.strip_prefix(':') {
                Some(name) => match name.strip_suffix('+') {
                    Some(name) => Segment::CatchAll(name.to_string()),
                    None => Segment::Param(name.to_string()),
                },
                None => Segment::Literal(s.to_string()),
            })
            .collect();
        Self {
            host: pattern.host.as_ref().map(|h| h.to_lowercase()),
            segments,
        }
    }

    pub fn exec(&self, host: Option<&str>, pathname: &str) -> Option<PatternMatch> {
        if let Some(expected) = &self.host {
            let actual = host?.split(':').next().unwrap_or_default().to_lowercase();
            if &actual != expected {
                return None;
            }
        }

        let parts: Vec<&str> = pathname.split('/').filter(|s| !s.is_empty()).collect();
        let mut params = BTreeMap::new();
        let mut idx = 0;
        for (pos, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Literal(lit) => {
                    if parts.get(idx) != Some(&lit.as_str()) {
                        return None;
                    }
                    idx += 1;
                }
                Segment::Param(name) => {
                    let value = parts.get(idx)?;
                    params.insert(name.clone(), (*value).to_string());
                    idx += 1;
                }
                Segment::CatchAll(name) => {
                    let after = self.segments.len() - pos - 1;
                    let take = parts.len().checked_sub(idx + after)?;
                    if take == 0 {
                        return None;
                    }
                    params.insert(name.clone(), parts[idx..idx + take].join("/"));
                    idx += take;
                }
            }
        }
        (idx == parts.len()).then_some(PatternMatch { params })
    }
}
