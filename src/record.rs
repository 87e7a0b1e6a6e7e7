//! Article records extracted from an export
//!
//! An [`ArticleRecord`] holds every metadata field the front matter renders,
//! always populated: absent text fields are empty strings and absent integer
//! fields are `0`.

/// Keys of the fixed front matter fields, in output order
///
/// Extra platform fields never reuse one of these keys.
pub const FIXED_FIELDS: [&str; 20] = [
    "title",
    "post_id",
    "link",
    "guid",
    "description",
    "pubDate",
    "post_date",
    "post_date_gmt",
    "post_modified",
    "post_modified_gmt",
    "comment_status",
    "ping_status",
    "post_name",
    "status",
    "post_parent",
    "menu_order",
    "post_type",
    "post_password",
    "is_sticky",
    "creator",
];

/// One article's metadata plus its raw body markup
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ArticleRecord {
    pub title: String,
    /// Platform identifier (`wp:post_id`)
    pub post_id: i64,
    /// Canonical link
    pub link: String,
    /// Globally-unique id
    pub guid: String,
    pub description: String,
    /// Publish timestamp, RFC 822 form
    pub pub_date: String,
    /// Publish timestamp, local `YYYY-MM-DD HH:MM:SS`
    pub post_date: String,
    pub post_date_gmt: String,
    pub post_modified: String,
    pub post_modified_gmt: String,
    pub comment_status: String,
    pub ping_status: String,
    /// URL slug
    pub post_name: String,
    pub status: String,
    pub post_parent: i64,
    pub menu_order: i64,
    /// Content-type label (`post`, `page`, `attachment`, ...)
    pub post_type: String,
    pub post_password: String,
    /// `0` or `1`
    pub is_sticky: i64,
    /// Author (`dc:creator`)
    pub creator: String,
    /// Other leaf fields from the platform namespace, in document order
    pub extra: Vec<(String, String)>,
    /// Raw HTML body (`content:encoded`)
    pub body: String,
}

/// A front matter value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue<'a> {
    Text(&'a str),
    Integer(i64),
}

impl ArticleRecord {
    /// Create an empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Fixed fields in front matter order, followed by the extra fields
    pub fn fields(&self) -> Vec<(&str, FieldValue<'_>)> {
        // Same order as FIXED_FIELDS
        let values = [
            FieldValue::Text(&self.title),
            FieldValue::Integer(self.post_id),
            FieldValue::Text(&self.link),
            FieldValue::Text(&self.guid),
            FieldValue::Text(&self.description),
            FieldValue::Text(&self.pub_date),
            FieldValue::Text(&self.post_date),
            FieldValue::Text(&self.post_date_gmt),
            FieldValue::Text(&self.post_modified),
            FieldValue::Text(&self.post_modified_gmt),
            FieldValue::Text(&self.comment_status),
            FieldValue::Text(&self.ping_status),
            FieldValue::Text(&self.post_name),
            FieldValue::Text(&self.status),
            FieldValue::Integer(self.post_parent),
            FieldValue::Integer(self.menu_order),
            FieldValue::Text(&self.post_type),
            FieldValue::Text(&self.post_password),
            FieldValue::Integer(self.is_sticky),
            FieldValue::Text(&self.creator),
        ];
        let mut fields: Vec<(&str, FieldValue<'_>)> = FIXED_FIELDS.into_iter().zip(values).collect();
        fields.extend(
            self.extra
                .iter()
                .map(|(key, value)| (key.as_str(), FieldValue::Text(value.as_str()))),
        );
        fields
    }

    /// Human-readable label for diagnostics
    ///
    /// Title first, then identifier, then the article's position.
    pub fn label(&self, index: usize) -> String {
        if !self.title.trim().is_empty() {
            self.title.clone()
        } else if self.post_id != 0 {
            format!("post_id {}", self.post_id)
        } else {
            format!("#{}", index + 1)
        }
    }
}
