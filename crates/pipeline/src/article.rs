//! The finished article and the Markdown handling around it.
//!
//! The writer returns Markdown. [`Article::from_markdown`] turns it into plain
//! structured text (title, lead, sections, sources); rendering to any other
//! markup is the transport layer's concern.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// One `## ` section of an article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleSection {
    /// `None` for body text that appears before the first heading.
    pub heading: Option<String>,
    pub body: String,
}

/// A finished news article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    pub lead: Option<String>,
    pub sections: Vec<ArticleSection>,
    pub sources: Vec<String>,
}

impl Article {
    /// Parses a writer draft.
    ///
    /// Returns `None` when the draft has no body: neither a lead nor any
    /// section text. A missing `# ` title falls back to `fallback_title`.
    pub fn from_markdown(draft: &str, fallback_title: &str) -> Option<Self> {
        let text = if draft.trim().contains('\n') {
            draft.to_string()
        } else {
            normalize_markdown(draft)
        };

        let mut title: Option<String> = None;
        let mut preamble: Vec<&str> = Vec::new();
        let mut sections: Vec<(Option<String>, Vec<&str>)> = Vec::new();
        let mut sources = Vec::new();

        for line in text.lines() {
            let trimmed = line.trim();
            if let Some(found) = parse_sources_line(trimmed) {
                sources = found;
                continue;
            }
            if trimmed == "---" {
                continue;
            }
            if let Some(h1) = trimmed.strip_prefix("# ") {
                if title.is_none() {
                    title = Some(h1.trim().to_string());
                    continue;
                }
                // A second H1 is demoted to a section heading.
                sections.push((Some(h1.trim().to_string()), Vec::new()));
                continue;
            }
            if let Some(h2) = trimmed.strip_prefix("## ") {
                sections.push((Some(h2.trim().to_string()), Vec::new()));
                continue;
            }
            match sections.last_mut() {
                Some((_, body)) => body.push(line.trim_end()),
                None => preamble.push(line.trim_end()),
            }
        }

        let (lead, preamble_body) = split_lead(&preamble);
        let mut out_sections = Vec::new();
        if !preamble_body.is_empty() {
            out_sections.push(ArticleSection {
                heading: None,
                body: preamble_body,
            });
        }
        for (heading, body) in sections {
            let body = body.join("\n").trim().to_string();
            if heading.is_none() && body.is_empty() {
                continue;
            }
            out_sections.push(ArticleSection { heading, body });
        }

        let has_body = lead.is_some() || out_sections.iter().any(|s| !s.body.is_empty());
        if !has_body {
            return None;
        }

        Some(Self {
            title: title
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| fallback_title.trim().to_string()),
            lead,
            sections: out_sections,
            sources,
        })
    }

    /// Renders the article back to Markdown.
    pub fn to_markdown(&self) -> String {
        let mut out = format!("# {}\n\n", self.title);
        if let Some(lead) = &self.lead {
            out.push_str(&format!("**{lead}**\n\n"));
        }
        for section in &self.sections {
            if let Some(heading) = &section.heading {
                out.push_str(&format!("## {heading}\n\n"));
            }
            if !section.body.is_empty() {
                out.push_str(section.body.trim());
                out.push_str("\n\n");
            }
        }
        if !self.sources.is_empty() {
            out.push_str("---\n\n");
            out.push_str(&format!("**Sources**: {}\n", self.sources.join(", ")));
        }
        out
    }
}

/// Splits a bold first paragraph off the preamble as the lead.
fn split_lead(preamble: &[&str]) -> (Option<String>, String) {
    let text = preamble.join("\n");
    let text = text.trim();
    let (first, rest) = match text.find("\n\n") {
        Some(idx) => (&text[..idx], text[idx..].trim()),
        None => (text, ""),
    };
    let first = first.trim();
    if first.len() > 4 && first.starts_with("**") && first.ends_with("**") {
        let lead = first[2..first.len() - 2].trim().to_string();
        (Some(lead), rest.to_string())
    } else {
        (None, text.to_string())
    }
}

fn parse_sources_line(line: &str) -> Option<Vec<String>> {
    static SOURCES_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?i)^\**\s*(?:main\s+)?(?:sources|fuentes(?:\s+principales)?)\s*\**\s*:\s*\**\s*(.*)$")
            .expect("sources regex")
    });
    let caps = SOURCES_RE.captures(line)?;
    let list = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
    Some(
        list.split([',', ';'])
            .map(|s| s.trim().trim_matches('*').trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
    )
}

// ---------------------------------------------------------------------------
// Normalisation of drafts that lost their line breaks
// ---------------------------------------------------------------------------

static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("whitespace regex"));
static HEADING_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"([^\n])(#+ )").expect("heading regex"));
static QUOTE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"([^\n])(> )").expect("quote regex"));
static BOLD_ITEM_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"([^\n])(- \*\*)").expect("bold item regex"));
static ITEM_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"([^\n])(- [A-Z])").expect("item regex"));
static RULE_BEFORE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"([^\n])(---)").expect("rule regex"));
static RULE_AFTER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(---)([^\n])").expect("rule regex"));
static BLANK_RUN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").expect("blank run regex"));

/// Re-separates a Markdown article whose whitespace was collapsed.
///
/// Headings, block quotes, bullet items and `---` rules get a blank line
/// before them; bold markers glued to words are split into their own
/// paragraph.
pub fn normalize_markdown(raw: &str) -> String {
    if raw.trim().is_empty() {
        return String::new();
    }
    let text = WHITESPACE_RE.replace_all(raw.trim(), " ");
    let text = HEADING_RE.replace_all(&text, "$1\n\n$2");
    let text = QUOTE_RE.replace_all(&text, "$1\n\n$2");
    let text = BOLD_ITEM_RE.replace_all(&text, "$1\n\n$2");
    let text = ITEM_RE.replace_all(&text, "$1\n\n$2");
    let text = fix_bold_spacing(&text);
    let text = RULE_BEFORE_RE.replace_all(&text, "$1\n\n$2");
    let text = RULE_AFTER_RE.replace_all(&text, "$1\n\n$2");
    let text = BLANK_RUN_RE.replace_all(&text, "\n\n");
    text.lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Inserts paragraph breaks where `**` is glued to a word.
///
/// Punctuation stays attached (`**Bold**:` is left alone).
fn fix_bold_spacing(text: &str) -> String {
    let parts: Vec<&str> = text.split("**").collect();
    if parts.len() < 2 {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len() + 8);
    for (i, part) in parts.iter().enumerate() {
        out.push_str(part);
        if i + 1 == parts.len() {
            break;
        }
        let opening = i % 2 == 0;
        let sep = if opening {
            match part.chars().last() {
                Some(c) if c.is_alphanumeric() => "\n\n**",
                _ => "**",
            }
        } else {
            match parts[i + 1].chars().next() {
                Some(c) if c.is_alphanumeric() => "**\n\n",
                _ => "**",
            }
        };
        out.push_str(sep);
    }
    out
}
