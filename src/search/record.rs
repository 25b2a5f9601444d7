use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::db::models::{Post, ProposalType};

/// A governance post as it is written to the search index.
///
/// Field names follow the index's camelCase convention. Only
/// `parsed_content` is ever shortened to fit the record size ceiling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRecord {
    /// Primary key: `{network}_{proposalType}_{index}`.
    #[serde(rename = "objectID")]
    pub object_id: String,
    pub network: String,
    pub proposal_type: ProposalType,
    pub index: String,
    pub title: String,
    /// Post body with all Markdown and HTML markup removed.
    pub parsed_content: String,
    pub tags: Vec<String>,
    pub proposer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    /// Unix seconds.
    pub created_at_timestamp: i64,
    /// Unix seconds.
    pub updated_at_timestamp: i64,
}

/// Build the index identifier of a post.
pub fn object_id(network: &str, proposal_type: ProposalType, index: &str) -> String {
    format!("{network}_{proposal_type}_{index}")
}

/// Longest document id the index accepts, in bytes.
const MAX_OBJECT_ID_BYTES: usize = 511;

/// Whether the index accepts `id` as a document id: ASCII alphanumerics,
/// `-` and `_` only.
pub fn is_valid_object_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_OBJECT_ID_BYTES
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// Build a SearchRecord from a stored post.
pub fn build_search_record(post: &Post) -> SearchRecord {
    SearchRecord {
        object_id: object_id(&post.network, post.proposal_type, &post.index),
        network: post.network.clone(),
        proposal_type: post.proposal_type,
        index: post.index.clone(),
        title: post.title.clone(),
        parsed_content: strip_markup(&post.content),
        tags: post.tags.clone(),
        proposer: post.proposer.clone(),
        origin: post.origin.clone(),
        topic: post.topic.clone(),
        created_at_timestamp: post.created_at.timestamp(),
        updated_at_timestamp: post.updated_at.timestamp(),
    }
}

/// Reduce a Markdown or HTML body to plain searchable text.
///
/// The Markdown is parsed first, so code spans, code blocks and autolinks
/// keep their text. Embedded HTML is cleaned separately: tags are dropped,
/// script and style bodies included.
pub fn strip_markup(raw: &str) -> String {
    let mut text = String::new();
    collect_text(raw, &mut text, true);
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn collect_text(markdown: &str, out: &mut String, allow_html: bool) {
    use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};

    let options = Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS;

    let mut html_block: Option<String> = None;
    // Inside an inline <script> or <style> element.
    let mut in_raw_inline = false;

    for event in Parser::new_ext(markdown, options) {
        match event {
            Event::Text(t) | Event::Code(t) => {
                if !in_raw_inline {
                    out.push_str(&t);
                }
            }
            Event::Start(Tag::HtmlBlock) => html_block = Some(String::new()),
            Event::Html(h) => match html_block.as_mut() {
                Some(block) => block.push_str(&h),
                None if allow_html => push_html(&h, out),
                None => {}
            },
            Event::End(TagEnd::HtmlBlock) => {
                if let Some(block) = html_block.take() {
                    if allow_html {
                        push_html(&block, out);
                    }
                }
                out.push(' ');
            }
            Event::InlineHtml(h) => {
                let tag = h.trim_start().to_ascii_lowercase();
                if tag.starts_with("<script") || tag.starts_with("<style") {
                    in_raw_inline = true;
                } else if tag.starts_with("</script") || tag.starts_with("</style") {
                    in_raw_inline = false;
                }
            }
            Event::End(
                TagEnd::Emphasis
                | TagEnd::Strong
                | TagEnd::Strikethrough
                | TagEnd::Link
                | TagEnd::Image,
            ) => {}
            Event::SoftBreak | Event::HardBreak | Event::End(_) => out.push(' '),
            _ => {}
        }
    }
}

/// Append the text of an HTML fragment.
///
/// Block tags are spaced apart before cleaning so adjacent paragraphs do not
/// run together. The cleaned text is entity-escaped, and parsing it once more
/// decodes the entities.
fn push_html(fragment: &str, out: &mut String) {
    let cleaned = ammonia::Builder::empty()
        .clean_content_tags(HashSet::from(["script", "style"]))
        .clean(&fragment.replace('<', " <"))
        .to_string();

    collect_text(&cleaned, out, false);
    out.push(' ');
}
