//! Role contexts and prompt construction for the three reasoning stages.

use pipeline::{excerpt, AgentRole, RoleContext, SearchDocument, TemporalReference};

/// Characters of rejection feedback folded into a refined research topic.
pub const REFINEMENT_EXCERPT_CHARS: usize = 200;

/// Characters of each document body shown to the analyst and the writer.
const DOCUMENT_BODY_CHARS: usize = 1_200;

const MAX_QUERY_CHARS: usize = 200;

/// Role that turns a topic into one search query.
pub fn researcher_role() -> RoleContext {
    RoleContext::new(
        AgentRole::Researcher,
        "You are a news researcher. Given a topic, choose the single web search query \
         most likely to surface current reporting from official bodies, international \
         wire agencies and local outlets. Reply with the query only.",
    )
}

/// Role that judges the evidence and ends with a verdict line.
pub fn analyst_role() -> RoleContext {
    RoleContext::new(
        AgentRole::Analyst,
        "You are a verification analyst. Check the documents for balance, sourcing and \
         internal consistency of any figures. Summarise the key facts with their numbers, \
         then end with a line 'VERDICT: APPROVED' or 'VERDICT: REJECTED' followed by the \
         reason.",
    )
}

/// Role that writes the Markdown article.
pub fn writer_role() -> RoleContext {
    RoleContext::new(
        AgentRole::Writer,
        "You are a news writer. Write a neutral article in inverted-pyramid style using \
         Markdown: a '# ' title, a bold one-paragraph lead, '## ' sections, and a final \
         '**Sources**:' line listing the outlets you relied on. Use only the facts in the \
         documents provided.",
    )
}

/// The topic for the next research pass after a rejection.
pub fn refined_topic(topic: &str, feedback: &str) -> String {
    format!(
        "{topic} (REFINEMENT: {})",
        excerpt(feedback.trim(), REFINEMENT_EXCERPT_CHARS)
    )
}

/// Asks the researcher for a query about `topic` as of `reference`.
pub fn research_prompt(topic: &str, reference: TemporalReference) -> String {
    format!(
        "Today is {reference}.\n\
         Topic: {topic}\n\n\
         Return one search query for recent coverage of this topic."
    )
}

/// Extracts a search query from the researcher's reply.
///
/// Takes the first non-empty line, strips a `Query:` label, list markers and
/// quotes, and falls back to `topic` when nothing is left.
pub fn parse_search_query(response: &str, topic: &str) -> String {
    let line = response
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or_default();
    let line = line.trim_start_matches(['-', '*', '#', '>', ' ']);
    let line = ["query:", "search query:", "consulta:"]
        .iter()
        .find_map(|label| {
            line.get(..label.len())
                .filter(|head| head.eq_ignore_ascii_case(label))
                .map(|_| &line[label.len()..])
        })
        .unwrap_or(line);
    let query = line.trim().trim_matches(['"', '\'', '`', '*']).trim();
    if query.is_empty() {
        topic.trim().to_string()
    } else {
        excerpt(query, MAX_QUERY_CHARS)
    }
}

fn render_documents(documents: &[&SearchDocument]) -> String {
    let mut out = String::new();
    for (i, doc) in documents.iter().enumerate() {
        let published = doc
            .published()
            .map(|ts| ts.date().to_string())
            .unwrap_or_else(|| "undated".to_string());
        out.push_str(&format!(
            "[{n}] {title}\nSource: {source} ({tier}) | Published: {published} | {url}\n{body}\n\n",
            n = i + 1,
            title = doc.title(),
            source = doc.provenance(),
            tier = doc.tier(),
            url = doc.url(),
            body = excerpt(doc.body().trim(), DOCUMENT_BODY_CHARS),
        ));
    }
    out
}

/// Asks the analyst to judge the current documents.
pub fn analyst_prompt(topic: &str, reference: TemporalReference, documents: &[&SearchDocument]) -> String {
    format!(
        "Today is {reference}.\n\
         Topic: {topic}\n\n\
         Documents:\n\n{}\
         Assess whether these documents support a neutral, well-sourced article.",
        render_documents(documents)
    )
}

/// Writer prompt: the approved analysis followed by the documents it judged.
pub fn writer_prompt(
    topic: &str,
    reference: TemporalReference,
    analysis: &str,
    documents: &[&SearchDocument],
) -> String {
    format!(
        "Today is {reference}.\n\
         Topic: {topic}\n\n\
         Approved analysis:\n{analysis}\n\n\
         Verified documents:\n\n{}\
         Write the article. Use only facts supported by the approved analysis and the documents.",
        render_documents(documents)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refined_topic_caps_feedback() {
        let feedback = "x".repeat(500);
        let refined = refined_topic("World Cup", &feedback);
        assert_eq!(refined, format!("World Cup (REFINEMENT: {})", "x".repeat(200)));
    }

    #[test]
    fn test_parse_search_query_strips_labels_and_quotes() {
        assert_eq!(parse_search_query("Query: \"peru playoff 2026\"\n", "t"), "peru playoff 2026");
        assert_eq!(parse_search_query("\n\n- peru playoff", "t"), "peru playoff");
        assert_eq!(parse_search_query("CONSULTA: perú repechaje", "t"), "perú repechaje");
    }

    #[test]
    fn test_parse_search_query_falls_back_to_topic() {
        assert_eq!(parse_search_query("   \n  ", "World Cup 2026"), "World Cup 2026");
        assert_eq!(parse_search_query("\"\"", "World Cup 2026"), "World Cup 2026");
    }

    #[test]
    fn test_prompts_carry_reference_date() {
        let reference = TemporalReference::parse("2026-01-04").unwrap();
        let prompt = research_prompt("World Cup", reference);
        assert!(prompt.contains("2026-01-04"));
        assert!(prompt.contains("World Cup"));
    }

    #[test]
    fn test_writer_prompt_carries_approved_analysis() {
        let reference = TemporalReference::parse("2026-01-04").unwrap();
        let prompt = writer_prompt("World Cup", reference, "FIFA confirmed 48 teams.\nVERDICT: APPROVED", &[]);
        assert!(prompt.contains("Approved analysis:\nFIFA confirmed 48 teams."));
        assert!(prompt.find("Approved analysis").unwrap() < prompt.find("Verified documents").unwrap());
    }
}
