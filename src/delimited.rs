// src/delimited.rs
//! Best-effort parser for exported trend tables (CSV or semicolon separated).
//!
//! Column roles are guessed from header names; rows without a title are skipped
//! and at most [`MAX_EXPORT_RECORDS`] records are emitted.

use once_cell::sync::OnceCell;
use regex::Regex;

use crate::normalize::normalize;
use crate::types::{RelatedLink, TopicRecord};

pub const MAX_EXPORT_RECORDS: usize = 30;

/// Column indices inferred from the header row. `None` means the role is absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ColumnRoles {
    pub title: Option<usize>,
    pub url: Option<usize>,
    pub description: Option<usize>,
}

/// Semicolon only if strictly more frequent than comma in the header line.
pub fn detect_delimiter(header: &str) -> char {
    let commas = header.matches(',').count();
    let semis = header.matches(';').count();
    if semis > commas {
        ';'
    } else {
        ','
    }
}

/// Split one line on `delim`, honouring double-quoted fields.
/// `""` inside quotes is a literal quote; an unterminated quote runs to end of line.
pub fn split_line(line: &str, delim: char) -> Vec<String> {
    let mut out = Vec::new();
    let mut cur = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '"' {
            if in_quotes && chars.peek() == Some(&'"') {
                cur.push('"');
                chars.next();
            } else {
                in_quotes = !in_quotes;
            }
        } else if ch == delim && !in_quotes {
            out.push(std::mem::take(&mut cur));
        } else {
            cur.push(ch);
        }
    }
    out.push(cur);
    out
}

fn title_re() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"(?i)title|query|term|entity").expect("title regex"))
}

// Korean export headers: 검색(어) / 키워드 / 제목
fn title_fallback_re() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"검색|키워드|제목").expect("title fallback regex"))
}

fn url_re() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"(?i)url|link").expect("url regex"))
}

fn description_re() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"(?i)description|snippet|summary").expect("description regex"))
}

fn first_match(header: &[String], re: &Regex) -> Option<usize> {
    header.iter().position(|h| re.is_match(h))
}

/// Infer column roles from already lower-cased header cells. First match wins.
pub fn infer_roles(header: &[String]) -> ColumnRoles {
    ColumnRoles {
        title: first_match(header, title_re()).or_else(|| first_match(header, title_fallback_re())),
        url: first_match(header, url_re()),
        description: first_match(header, description_re()),
    }
}

fn cell(cols: &[String], idx: Option<usize>) -> String {
    idx.and_then(|i| cols.get(i))
        .map(|s| normalize(s))
        .unwrap_or_default()
}

/// Parse exported text into ranked records.
pub fn parse(text: &str) -> Vec<TopicRecord> {
    let cleaned = text.replace('\r', "");
    let lines: Vec<&str> = cleaned.split('\n').filter(|l| !l.is_empty()).collect();
    if lines.len() < 2 {
        return Vec::new();
    }

    let delim = detect_delimiter(lines[0]);
    let header: Vec<String> = split_line(lines[0], delim)
        .into_iter()
        .map(|h| h.trim().to_lowercase())
        .collect();
    let roles = infer_roles(&header);
    tracing::debug!(target: "harvest", ?roles, %delim, "export header roles");

    let mut out = Vec::new();
    for line in &lines[1..] {
        let cols = split_line(line, delim);
        let term = cell(&cols, roles.title);
        if term.is_empty() {
            continue;
        }
        let url = cell(&cols, roles.url);
        let description = cell(&cols, roles.description);
        let links = RelatedLink::new(&term, &url).into_iter().collect();

        let rank = u32::try_from(out.len() + 1).unwrap_or(u32::MAX);
        if let Some(rec) = TopicRecord::build(rank, &term, &description, links) {
            out.push(rec);
        }
        if out.len() >= MAX_EXPORT_RECORDS {
            break;
        }
    }
    out
}
