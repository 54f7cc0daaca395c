//! Route path patterns.
//!
//! A deliberately small matcher: literal segments, `:name` parameters and a
//! trailing `*` / `*name` wildcard. Anything richer belongs in handlers.

use percent_encoding::percent_decode_str;
use rustc_hash::{FxHashMap, FxHashSet};

/// Captured path parameters.
pub type Params = FxHashMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
    Wildcard(Option<String>),
}

/// A validated route path such as `/users/:id/files/*rest`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePattern {
    raw: String,
    segments: Vec<Segment>,
}

impl RoutePattern {
    /// Parse and validate a path pattern. The error is a human readable reason.
    pub fn parse(raw: &str) -> Result<Self, String> {
        if raw.is_empty() {
            return Err("path must not be empty".into());
        }
        if !raw.starts_with('/') {
            return Err("path must start with `/`".into());
        }
        if let Some(c) = raw.chars().find(|c| c.is_whitespace() || matches!(c, '?' | '#')) {
            return Err(format!("path must not contain {c:?}"));
        }

        let body = &raw[1..];
        let body = body.strip_suffix('/').unwrap_or(body);
        if body.is_empty() {
            return Ok(Self {
                raw: raw.to_string(),
                segments: Vec::new(),
            });
        }

        let parts: Vec<&str> = body.split('/').collect();
        let mut segments = Vec::with_capacity(parts.len());
        let mut names = FxHashSet::default();

        for (i, part) in parts.iter().enumerate() {
            let segment = if part.is_empty() {
                return Err("path contains an empty segment".into());
            } else if let Some(name) = part.strip_prefix(':') {
                check_name(name)?;
                Segment::Param(name.to_string())
            } else if let Some(name) = part.strip_prefix('*') {
                if i + 1 != parts.len() {
                    return Err("wildcard must be the last segment".into());
                }
                if name.is_empty() {
                    Segment::Wildcard(None)
                } else {
                    check_name(name)?;
                    Segment::Wildcard(Some(name.to_string()))
                }
            } else if part.contains([':', '*']) {
                return Err(format!("segment `{part}` mixes literal text and a placeholder"));
            } else {
                Segment::Literal((*part).to_string())
            };

            if let Segment::Param(name) | Segment::Wildcard(Some(name)) = &segment
                && !names.insert(name.clone())
            {
                return Err(format!("duplicate parameter `{name}`"));
            }
            segments.push(segment);
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Match a request path (no query string), returning captured params.
    pub fn matches(&self, path: &str) -> Option<Params> {
        let trimmed = path.trim_start_matches('/');
        let trimmed = trimmed.strip_suffix('/').unwrap_or(trimmed);
        let parts: Vec<&str> = if trimmed.is_empty() {
            Vec::new()
        } else {
            trimmed.split('/').collect()
        };

        let mut params = Params::default();
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Literal(lit) => {
                    if parts.get(i).is_none_or(|p| decode(p) != *lit) {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    let part = parts.get(i).filter(|p| !p.is_empty())?;
                    params.insert(name.clone(), decode(part));
                }
                Segment::Wildcard(name) => {
                    if let Some(name) = name {
                        let rest = parts.get(i..).unwrap_or_default().join("/");
                        params.insert(name.clone(), decode(&rest));
                    }
                    return Some(params);
                }
            }
        }

        (parts.len() == self.segments.len()).then_some(params)
    }
}

fn check_name(name: &str) -> Result<(), String> {
    let mut chars = name.chars();
    let valid = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(format!("invalid parameter name `{name}`"))
    }
}

fn decode(part: &str) -> String {
    percent_decode_str(part).decode_utf8_lossy().into_owned()
}
