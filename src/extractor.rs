//! Record extraction from a parsed export
//!
//! Every element whose local name equals the configured article tag yields one
//! entry, in document order. Known fields are read from the element's direct
//! children:
//!
//! - RSS core, no namespace: `title`, `link`, `guid`, `description`, `pubDate`
//! - Dublin Core: `creator`
//! - RSS content module: `encoded` (the body)
//! - WordPress export namespace: `post_id`, `post_date`, `status`, ... plus any
//!   other leaf element, kept as an extra field
//!
//! Extra fields whose key matches a fixed field, or an earlier extra, are
//! dropped so the front matter never repeats a key.
//!
//! A field that is missing keeps its default. An integer field holding
//! something else fails that one article with [`RecordError::Metadata`].

use tracing::debug;

use crate::error::{RecordError, RecordFailure};
use crate::record::{ArticleRecord, FIXED_FIELDS};
use crate::xml_tree::{XmlDocument, XmlElement};

/// Dublin Core elements namespace
pub const DC_NAMESPACE: &str = "http://purl.org/dc/elements/1.1/";
/// RSS 1.0 content module namespace
pub const CONTENT_NAMESPACE: &str = "http://purl.org/rss/1.0/modules/content/";
/// Substring shared by every WordPress export namespace version
pub const PLATFORM_NAMESPACE_MARKER: &str = "wordpress.org/export/";

/// Extract one entry per matching element, in document order
pub fn extract_records(
    doc: &XmlDocument,
    article_tag: &str,
) -> Vec<Result<ArticleRecord, RecordFailure>> {
    doc.find_all(article_tag)
        .enumerate()
        .map(|(index, element)| {
            let record = extract_record(element).map_err(|(partial, error)| RecordFailure {
                index,
                label: partial.label(index),
                error,
            })?;
            debug!(
                index,
                title = %record.title,
                post_id = record.post_id,
                body_len = record.body.len(),
                "extracted article"
            );
            Ok(record)
        })
        .collect()
}

/// Build a record from one article element
///
/// On failure the partially filled record comes back with the error so the
/// caller can still label the article.
pub fn extract_record(
    element: &XmlElement,
) -> Result<ArticleRecord, (ArticleRecord, RecordError)> {
    let mut record = ArticleRecord::new();
    let mut integer_fields: Vec<(&'static str, String)> = Vec::new();

    for child in element.child_elements() {
        let value = child.text().trim().to_string();

        match child.namespace.as_deref() {
            None => match child.name.as_str() {
                "title" => record.title = value,
                "link" => record.link = value,
                "guid" => record.guid = value,
                "description" => record.description = value,
                "pubDate" => record.pub_date = value,
                _ => {}
            },
            Some(DC_NAMESPACE) if child.name == "creator" => record.creator = value,
            Some(CONTENT_NAMESPACE) if child.name == "encoded" => record.body = value,
            Some(_) if child.namespace_contains(PLATFORM_NAMESPACE_MARKER) => {
                match child.name.as_str() {
                    "post_id" => integer_fields.push(("post_id", value)),
                    "post_parent" => integer_fields.push(("post_parent", value)),
                    "menu_order" => integer_fields.push(("menu_order", value)),
                    "is_sticky" => integer_fields.push(("is_sticky", value)),
                    "post_date" => record.post_date = value,
                    "post_date_gmt" => record.post_date_gmt = value,
                    "post_modified" => record.post_modified = value,
                    "post_modified_gmt" => record.post_modified_gmt = value,
                    "comment_status" => record.comment_status = value,
                    "ping_status" => record.ping_status = value,
                    "post_name" => record.post_name = value,
                    "status" => record.status = value,
                    "post_type" => record.post_type = value,
                    "post_password" => record.post_password = value,
                    _ if child.is_leaf() => {
                        let key = extra_key(child);
                        if FIXED_FIELDS.contains(&key.as_str())
                            || record.extra.iter().any(|(k, _)| *k == key)
                        {
                            debug!(key = %key, "dropping platform field that repeats a front matter key");
                        } else {
                            record.extra.push((key, value));
                        }
                    }
                    _ => {}
                }
            }
            Some(_) => {}
        }
    }

    for (field, raw) in integer_fields {
        let parsed = match parse_integer(&raw) {
            Some(n) => n,
            None => {
                return Err((record, RecordError::Metadata { field, value: raw }));
            }
        };
        match field {
            "post_id" => record.post_id = parsed,
            "post_parent" => record.post_parent = parsed,
            "menu_order" => record.menu_order = parsed,
            _ => record.is_sticky = parsed,
        }
    }

    Ok(record)
}

/// Blank means `0`; anything else must be a base-10 integer
fn parse_integer(raw: &str) -> Option<i64> {
    if raw.is_empty() {
        Some(0)
    } else {
        raw.parse().ok()
    }
}

/// `excerpt:encoded` lives in its own namespace and would otherwise be called `encoded`
fn extra_key(element: &XmlElement) -> String {
    if element.namespace_contains("/excerpt/") {
        "excerpt".to_string()
    } else {
        element.name.clone()
    }
}
