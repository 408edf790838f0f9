//! Query and filter types over the excerpt index.

use std::cmp::Ordering;
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate};
use regex::Regex;

use crate::error::{BugError, Result};
use crate::excerpt::BugExcerpt;
use crate::index::ExcerptMap;
use crate::model::Status;

/// `key:value`, `key:"quoted value"`, `"quoted word"` or `word`.
static TERM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:([a-z][a-z-]*):)?(?:"([^"]*)"|(\S+))"#).expect("valid query term regex")
});

/// Sort key. The set is closed: any other key cannot be expressed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OrderBy {
    /// Lexicographic on the full id.
    Id,
    Creation,
    #[default]
    Edit,
}

impl OrderBy {
    fn compare(self, a: &BugExcerpt, b: &BugExcerpt) -> Ordering {
        match self {
            Self::Id => a.id.cmp(&b.id),
            Self::Creation => a.created_at.cmp(&b.created_at),
            Self::Edit => a.edited_at.cmp(&b.edited_at),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OrderDirection {
    Ascending,
    #[default]
    Descending,
}

/// Predicates over excerpt fields. Every set field must match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filters {
    pub status: Option<Status>,
    /// Case-insensitive substring of the author name or email.
    pub author: Option<String>,
    /// Case-insensitive substrings that must all appear in the title.
    pub title: Vec<String>,
    /// Labels that must all be present.
    pub labels: Vec<String>,
    pub created_after: Option<i64>,
    pub created_before: Option<i64>,
    pub edited_after: Option<i64>,
    pub edited_before: Option<i64>,
}

impl Filters {
    #[must_use]
    pub fn matches(&self, excerpt: &BugExcerpt) -> bool {
        if let Some(status) = self.status {
            if excerpt.status != status {
                return false;
            }
        }

        if let Some(ref author) = self.author {
            if !excerpt.author.matches(author) {
                return false;
            }
        }

        // Title search
        if !self.title.is_empty() {
            let title = excerpt.title.to_lowercase();
            if !self
                .title
                .iter()
                .all(|needle| title.contains(&needle.to_lowercase()))
            {
                return false;
            }
        }

        // Label filtering (AND)
        if !self
            .labels
            .iter()
            .all(|l| excerpt.labels.iter().any(|have| have == l))
        {
            return false;
        }

        // Timestamp filtering, bounds inclusive
        if self.created_after.is_some_and(|t| excerpt.created_at < t)
            || self.created_before.is_some_and(|t| excerpt.created_at > t)
            || self.edited_after.is_some_and(|t| excerpt.edited_at < t)
            || self.edited_before.is_some_and(|t| excerpt.edited_at > t)
        {
            return false;
        }

        true
    }
}

/// Filters plus ordering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    pub filters: Filters,
    pub order_by: OrderBy,
    pub direction: OrderDirection,
}

impl Query {
    #[must_use]
    pub fn new(order_by: OrderBy, direction: OrderDirection) -> Self {
        Self {
            filters: Filters::default(),
            order_by,
            direction,
        }
    }

    /// Parse the textual query language.
    ///
    /// Terms are separated by whitespace: `status:open`, `author:ada`,
    /// `title:crash`, `label:ui` (repeatable), `created-after:2024-01-01`,
    /// `created-before:`, `edited-after:`, `edited-before:` (RFC 3339 or
    /// `YYYY-MM-DD`), `sort:id|creation|edit` with an optional `-asc` or
    /// `-desc` suffix. Values may be double-quoted. Bare words match the title.
    ///
    /// # Errors
    ///
    /// Returns `QueryParse` on an unknown key or a malformed value.
    pub fn parse(input: &str) -> Result<Self> {
        let mut query = Self::default();
        let err = |reason: String| BugError::QueryParse {
            input: input.to_string(),
            reason,
        };

        for caps in TERM_RE.captures_iter(input) {
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .map_or("", |m| m.as_str());
            let Some(key) = caps.get(1).map(|m| m.as_str()) else {
                query.filters.title.push(value.to_string());
                continue;
            };
            if value.is_empty() {
                return Err(err(format!("empty value for '{key}'")));
            }

            let filters = &mut query.filters;
            match key {
                "status" => {
                    filters.status = Some(value.parse().map_err(|_| {
                        err(format!("unknown status '{value}' (expected open or closed)"))
                    })?);
                }
                "author" => filters.author = Some(value.to_string()),
                "title" => filters.title.push(value.to_string()),
                "label" => filters.labels.push(value.to_string()),
                "created-after" => filters.created_after = Some(parse_time(value).map_err(err)?),
                "created-before" => filters.created_before = Some(parse_time(value).map_err(err)?),
                "edited-after" => filters.edited_after = Some(parse_time(value).map_err(err)?),
                "edited-before" => filters.edited_before = Some(parse_time(value).map_err(err)?),
                "sort" => {
                    let (order_by, direction) = parse_sort(value).map_err(err)?;
                    query.order_by = order_by;
                    query.direction = direction;
                }
                other => return Err(err(format!("unknown key '{other}'"))),
            }
        }

        Ok(query)
    }

    /// Ids of matching excerpts, ordered.
    ///
    /// Excerpts are filtered in id order and the sort is stable, so ties keep
    /// id order in both directions.
    #[must_use]
    pub fn run(&self, excerpts: &ExcerptMap) -> Vec<String> {
        let mut results: Vec<&BugExcerpt> = excerpts
            .values()
            .filter(|excerpt| self.filters.matches(excerpt))
            .collect();

        let order_by = self.order_by;
        match self.direction {
            OrderDirection::Ascending => results.sort_by(|a, b| order_by.compare(a, b)),
            OrderDirection::Descending => results.sort_by(|a, b| order_by.compare(b, a)),
        }

        results.into_iter().map(|e| e.id.clone()).collect()
    }
}

fn parse_sort(value: &str) -> std::result::Result<(OrderBy, OrderDirection), String> {
    let (key, direction) = match value.rsplit_once('-') {
        Some((key, "asc")) => (key, Some(OrderDirection::Ascending)),
        Some((key, "desc")) => (key, Some(OrderDirection::Descending)),
        _ => (value, None),
    };
    let order_by = match key {
        "id" => OrderBy::Id,
        "creation" | "created" => OrderBy::Creation,
        "edit" | "edited" => OrderBy::Edit,
        other => {
            return Err(format!(
                "unknown sort key '{other}' (expected id, creation or edit)"
            ));
        }
    };
    // Ids read naturally ascending, timestamps newest first.
    let direction = direction.unwrap_or(match order_by {
        OrderBy::Id => OrderDirection::Ascending,
        OrderBy::Creation | OrderBy::Edit => OrderDirection::Descending,
    });
    Ok((order_by, direction))
}

fn parse_time(value: &str) -> std::result::Result<i64, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.timestamp());
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp())
        .ok_or_else(|| format!("invalid date '{value}' (expected YYYY-MM-DD or RFC 3339)"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Person;

    fn excerpt(id: &str, created_at: i64, edited_at: i64) -> BugExcerpt {
        BugExcerpt {
            id: id.to_string(),
            title: format!("bug {id}"),
            author: Person::new("Ada", "ada@example.com"),
            created_at,
            edited_at,
            status: Status::Open,
            labels: vec![],
            comment_count: 1,
        }
    }

    fn index(items: Vec<BugExcerpt>) -> ExcerptMap {
        items.into_iter().map(|e| (e.id.clone(), e)).collect()
    }

    #[test]
    fn test_order_by_creation() {
        // Ids deliberately not in time order.
        let excerpts = index(vec![
            excerpt("c", 10, 10),
            excerpt("a", 30, 30),
            excerpt("b", 20, 20),
        ]);

        let asc = Query::new(OrderBy::Creation, OrderDirection::Ascending).run(&excerpts);
        assert_eq!(asc, vec!["c", "b", "a"]);

        let desc = Query::new(OrderBy::Creation, OrderDirection::Descending).run(&excerpts);
        assert_eq!(desc, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_ties_keep_filter_order() {
        let excerpts = index(vec![
            excerpt("b", 10, 10),
            excerpt("a", 10, 10),
            excerpt("c", 5, 5),
        ]);

        let asc = Query::new(OrderBy::Creation, OrderDirection::Ascending).run(&excerpts);
        assert_eq!(asc, vec!["c", "a", "b"]);

        let desc = Query::new(OrderBy::Creation, OrderDirection::Descending).run(&excerpts);
        assert_eq!(desc, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_order_by_id_and_edit() {
        let excerpts = index(vec![
            excerpt("b", 1, 50),
            excerpt("a", 2, 40),
            excerpt("c", 3, 60),
        ]);
        assert_eq!(
            Query::new(OrderBy::Id, OrderDirection::Ascending).run(&excerpts),
            vec!["a", "b", "c"]
        );
        assert_eq!(Query::default().run(&excerpts), vec!["c", "b", "a"]);
    }

    #[test]
    fn test_filters() {
        let mut closed = excerpt("x", 100, 200);
        closed.status = Status::Closed;
        closed.title = "Crash when saving".to_string();
        closed.labels = vec!["crash".to_string(), "io".to_string()];
        let excerpts = index(vec![closed, excerpt("y", 100, 100)]);

        let run = |q: &str| Query::parse(q).unwrap().run(&excerpts);
        assert_eq!(run("status:closed"), vec!["x"]);
        assert_eq!(run("status:open"), vec!["y"]);
        assert_eq!(run("crash"), vec!["x"]);
        assert_eq!(run("title:\"when saving\""), vec!["x"]);
        assert_eq!(run("label:crash label:io"), vec!["x"]);
        assert!(run("label:crash label:ui").is_empty());
        assert_eq!(run("author:ADA").len(), 2);
        assert!(run("author:bob").is_empty());
        assert_eq!(run("edited-after:1970-01-01T00:02:30Z"), vec!["x"]);
        assert_eq!(run("edited-before:1970-01-01T00:02:30Z"), vec!["y"]);
    }

    #[test]
    fn test_parse_sort_and_dates() {
        let q = Query::parse("sort:creation-asc").unwrap();
        assert_eq!(q.order_by, OrderBy::Creation);
        assert_eq!(q.direction, OrderDirection::Ascending);

        let q = Query::parse("sort:id").unwrap();
        assert_eq!(q.order_by, OrderBy::Id);
        assert_eq!(q.direction, OrderDirection::Ascending);

        let q = Query::parse("created-after:2024-03-01").unwrap();
        assert_eq!(q.filters.created_after, Some(1_709_251_200));

        let q = Query::parse("").unwrap();
        assert_eq!(q, Query::default());
    }

    #[test]
    fn test_parse_errors() {
        for input in ["sort:priority", "colour:red", "status:wontfix", "created-after:yesterday"] {
            assert!(
                matches!(Query::parse(input), Err(BugError::QueryParse { .. })),
                "{input} should not parse"
            );
        }
    }
}
