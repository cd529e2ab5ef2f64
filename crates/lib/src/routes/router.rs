//! Path matching over a [`RouteTable`].
//!
//! Concrete page paths win; otherwise route patterns (`/blog/:slug`) are
//! tried in table order. Trailing slashes are ignored.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::Serialize;

use super::{PageEntry, RouteTable};

/// Result of resolving a path.
///
/// `matched` is empty when nothing matched; otherwise it holds the page entry.
#[derive(Debug, Clone, Serialize)]
pub struct Route {
  pub path: String,
  pub params: BTreeMap<String, String>,
  pub matched: Vec<PageEntry>,
}

impl Route {
  pub fn is_match(&self) -> bool {
    !self.matched.is_empty()
  }
}

#[derive(Debug)]
pub struct Router {
  table: Arc<RouteTable>,
  by_path: HashMap<String, usize>,
  patterns: Vec<(Vec<String>, usize)>,
}

impl Router {
  pub fn from_table(table: Arc<RouteTable>) -> Self {
    let mut by_path = HashMap::new();
    let mut patterns: Vec<(Vec<String>, usize)> = Vec::new();

    for (index, page) in table.pages.iter().enumerate() {
      by_path.entry(normalize(&page.path)).or_insert(index);

      let segments = split(page.pattern());
      if !patterns.iter().any(|(existing, _)| *existing == segments) {
        patterns.push((segments, index));
      }
    }

    Self {
      table,
      by_path,
      patterns,
    }
  }

  pub fn table(&self) -> &Arc<RouteTable> {
    &self.table
  }

  pub fn resolve(&self, path: &str) -> Route {
    let normalized = normalize(path);
    let requested = split(&normalized);

    let found = match self.by_path.get(&normalized) {
      Some(&index) => Some(index),
      None => self
        .patterns
        .iter()
        .find(|(pattern, _)| match_pattern(pattern, &requested).is_some())
        .map(|(_, index)| *index),
    };

    match found {
      Some(index) => {
        let page = self.table.pages[index].clone();
        let params = match_pattern(&split(page.pattern()), &requested).unwrap_or_default();
        Route {
          path: normalized,
          params,
          matched: vec![page],
        }
      }
      None => Route {
        path: normalized,
        params: BTreeMap::new(),
        matched: Vec::new(),
      },
    }
  }
}

fn normalize(path: &str) -> String {
  let trimmed = path.trim_end_matches('/');
  if trimmed.is_empty() {
    "/".to_string()
  } else if trimmed.starts_with('/') {
    trimmed.to_string()
  } else {
    format!("/{}", trimmed)
  }
}

fn split(path: &str) -> Vec<String> {
  path
    .split('/')
    .filter(|s| !s.is_empty())
    .map(str::to_string)
    .collect()
}

fn match_pattern(pattern: &[String], path: &[String]) -> Option<BTreeMap<String, String>> {
  if pattern.len() != path.len() {
    return None;
  }
  let mut params = BTreeMap::new();
  for (expected, actual) in pattern.iter().zip(path) {
    match expected.strip_prefix(':') {
      Some(name) => {
        params.insert(name.to_string(), actual.clone());
      }
      None if expected == actual => {}
      None => return None,
    }
  }
  Some(params)
}
