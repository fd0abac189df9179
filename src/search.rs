use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::Path;

use lazy_static::lazy_static;
use log::{debug, info};
use regex::Regex;
use serde::Serialize;
use serde_json::Value;

const SOURCEGRAPH_API: &str = "https://sourcegraph.com/.api/graphql";

const GRAPHQL_QUERY: &str = r#"
query SearchRepos($query: String!, $patternType: SearchPatternType!) {
  search(query: $query, patternType: $patternType) {
    results {
      resultCount
      results {
        __typename
        ... on FileMatch {
          repository {
            name
          }
        }
      }
    }
  }
}
"#;

/// Host prefixes stripped from matched repository names.
const HOST_PREFIXES: [&str; 2] = ["github.com/", "gitlab.com/"];

lazy_static! {
    static ref PATTERN_TYPE: Regex =
        Regex::new(r"patternType:(literal|regexp|structural)").unwrap();
}

// =============================================================================
// Errors
// =============================================================================

/// Reasons a search can fail. All of them are fatal to a discovery run.
#[derive(Debug)]
pub enum SearchError {
    /// The request never produced a usable response.
    Transport(reqwest::Error),
    /// The API answered with a non-success status.
    Status(reqwest::StatusCode, String),
    /// The API answered 200 but reported GraphQL errors.
    Api(Vec<String>),
    /// The response body is missing an expected key.
    Shape(String),
}

impl fmt::Display for SearchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchError::Transport(e) => {
                write!(f, "Sourcegraph request failed: {}", e)
            },
            SearchError::Status(code, body) => {
                write!(f, "Sourcegraph API error: {}\n{}", code, body)
            },
            SearchError::Api(messages) => {
                write!(f, "GraphQL API error:")?;
                for message in messages {
                    write!(f, "\n  - {}", message)?;
                }
                return Ok(());
            },
            SearchError::Shape(what) => {
                write!(f, "Unexpected API response format: {}", what)
            },
        }
    }
}

// =============================================================================
// Search client
// =============================================================================

#[derive(Serialize)]
struct Payload<'a> {
    query: &'a str,
    variables: Variables<'a>,
}

#[derive(Serialize)]
struct Variables<'a> {
    query: &'a str,
    #[serde(rename = "patternType")]
    pattern_type: &'a str,
}

pub struct SearchClient {
    endpoint: String,
    document: String,
    client: reqwest::blocking::Client,
}

impl SearchClient {
    /// Create a client against the public Sourcegraph endpoint.
    pub fn new() -> Self {
        return Self {
            endpoint: SOURCEGRAPH_API.to_string(),
            document: GRAPHQL_QUERY.to_string(),
            client: reqwest::blocking::Client::new(),
        };
    }

    /// Run one search and return the set of matching `org/name` pairs.
    pub fn search(&self, raw_query: &str, limit: usize) -> Result<BTreeSet<String>, SearchError> {
        let (cleaned, pattern_type) = extract_pattern_type(raw_query);
        let cleaned = with_count(&cleaned, limit);
        debug!("Pattern type: {}", pattern_type);
        debug!("Clean query: {}", cleaned);

        let payload = Payload {
            query: &self.document,
            variables: Variables {
                query: &cleaned,
                pattern_type: &pattern_type,
            },
        };

        let response = self.client
            .post(self.endpoint.as_str())
            .json(&payload)
            .send()
            .map_err(SearchError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(SearchError::Status(status, body));
        }

        let body: Value = response.json().map_err(SearchError::Transport)?;
        return collect_repos(&body);
    }
}

/// Split the patternType directive out of a raw search query. Every
/// occurrence is removed from the text; the first one found selects the
/// mode, defaulting to literal matching.
fn extract_pattern_type(query: &str) -> (String, String) {
    let pattern_type = PATTERN_TYPE.captures(query)
        .map(|c| c[1].to_string())
        .unwrap_or_else(|| "literal".to_string());
    let cleaned = PATTERN_TYPE.replace_all(query, "").trim().to_string();
    return (cleaned, pattern_type);
}

/// Append an explicit result ceiling unless the query already carries one.
fn with_count(query: &str, limit: usize) -> String {
    if query.contains("count:") {
        return query.to_string();
    }
    return format!("{} count:{}", query, limit);
}

/// Strip a known host prefix from a matched repository name.
fn strip_host(name: &str) -> &str {
    for prefix in HOST_PREFIXES {
        if let Some(rest) = name.strip_prefix(prefix) {
            return rest;
        }
    }
    return name;
}

/// Pull the deduplicated repository set out of a search response body.
fn collect_repos(body: &Value) -> Result<BTreeSet<String>, SearchError> {
    if let Some(errors) = body.get("errors").and_then(|e| e.as_array()) {
        let messages = errors.iter()
            .map(|e| {
                e.get("message")
                 .and_then(|m| m.as_str())
                 .unwrap_or("Unknown error")
                 .to_string()
            })
            .collect();
        return Err(SearchError::Api(messages));
    }

    let results = &body["data"]["search"]["results"];
    if !results.is_object() {
        return Err(SearchError::Shape("missing data.search.results".to_string()));
    }

    let count = results["resultCount"].as_i64().unwrap_or(0);
    info!("API returned {} total matching results", count);

    let matches = results["results"].as_array()
        .ok_or_else(|| SearchError::Shape("missing results array".to_string()))?;
    info!("Processing {} results", matches.len());

    let mut repos = BTreeSet::new();
    for item in matches {
        if item["__typename"].as_str() != Some("FileMatch") {
            continue;
        }
        if let Some(name) = item["repository"]["name"].as_str() {
            repos.insert(strip_host(name).to_string());
        }
    }
    return Ok(repos);
}

/// Discover repositories with one search and write them to OUTPUT, one
/// `org/name` per line, lexicographically sorted.
pub fn discover(query: &str, limit: usize, output: &Path) -> Result<(), String> {
    println!("[+] Running Sourcegraph discovery");
    println!("[+] Query: {}", query);

    let client = SearchClient::new();
    let repos = client.search(query, limit).map_err(|e| e.to_string())?;

    // An empty result set is not an error
    if repos.is_empty() {
        println!("[!] No repositories found");
        return Ok(());
    }

    let mut text = String::new();
    for repo in &repos {
        text.push_str(repo);
        text.push('\n');
    }
    fs::write(output, text)
        .map_err(|e| format!("Unable to write {:?}: {}", output, e))?;

    println!("[✓] Discovered {} repositories", repos.len());
    println!("[✓] Written to {}", output.display());
    return Ok(());
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn pattern_type_is_extracted_and_stripped() {
        let (cleaned, pt) = extract_pattern_type("foo patternType:regexp lang:go");
        assert_eq!(pt, "regexp");
        assert!(!cleaned.contains("patternType"));
        assert!(cleaned.starts_with("foo"));
        assert!(cleaned.ends_with("lang:go"));
    }

    #[test]
    fn structural_directive_is_recognized() {
        let (_, pt) = extract_pattern_type("patternType:structural f(:[x])");
        assert_eq!(pt, "structural");
    }

    #[test]
    fn pattern_type_defaults_to_literal() {
        let (cleaned, pt) = extract_pattern_type("foo bar");
        assert_eq!(pt, "literal");
        assert_eq!(cleaned, "foo bar");
    }

    #[test]
    fn count_is_appended_exactly_once() {
        assert_eq!(with_count("foo", 500), "foo count:500");
        assert_eq!(with_count("foo count:10", 500), "foo count:10");
        assert_eq!(with_count("foo count:all", 500), "foo count:all");
    }

    #[test]
    fn host_prefix_stripping_is_idempotent() {
        assert_eq!(strip_host("github.com/octo/hello"), "octo/hello");
        assert_eq!(strip_host(strip_host("github.com/octo/hello")), "octo/hello");
        assert_eq!(strip_host("gitlab.com/org/two"), "org/two");
        assert_eq!(strip_host("octo/hello"), "octo/hello");
    }

    #[test]
    fn file_matches_are_deduplicated() {
        let body = json!({
            "data": { "search": { "results": {
                "resultCount": 3,
                "results": [
                    { "__typename": "FileMatch",
                      "repository": { "name": "github.com/octo/hello" } },
                    { "__typename": "FileMatch",
                      "repository": { "name": "octo/hello" } },
                    { "__typename": "CommitMatch" },
                ],
            }}},
        });
        let repos = collect_repos(&body).unwrap();
        assert_eq!(repos.len(), 1);
        assert!(repos.contains("octo/hello"));
    }

    #[test]
    fn api_errors_are_collected() {
        let body = json!({ "errors": [{ "message": "bad query" }, {}] });
        match collect_repos(&body) {
            Err(SearchError::Api(messages)) => {
                assert_eq!(messages, vec!["bad query".to_string(),
                                          "Unknown error".to_string()]);
            },
            other => panic!("Expected an API error, got {:?}", other),
        }
    }

    #[test]
    fn unexpected_shape_is_tagged() {
        let body = json!({ "data": {} });
        assert!(matches!(collect_repos(&body), Err(SearchError::Shape(_))));
    }
}
