//! YAML front matter rendering
//!
//! Every file starts with a `---` delimited block carrying the article's
//! metadata. The field list and its order are fixed (see
//! [`ArticleRecord::fields`]); fields are written even when they hold their
//! default value so consumers can rely on the keys being present.
//!
//! Text values are double-quoted YAML strings; integer values are bare.
//!
//! ```text
//! ---
//! title: "Hello \"World\""
//! post_id: 42
//! link: "https://example.com/hello"
//! ...
//! ---
//! ```

use crate::record::{ArticleRecord, FieldValue};

/// Front matter delimiter line
pub const DELIMITER: &str = "---";

/// Render the front matter block, including both delimiter lines
///
/// The returned string ends with a newline.
pub fn render_front_matter(record: &ArticleRecord) -> String {
    let mut output = String::with_capacity(512);

    output.push_str(DELIMITER);
    output.push('\n');

    for (key, value) in record.fields() {
        output.push_str(key);
        output.push_str(": ");
        match value {
            FieldValue::Text(text) => write_yaml_string(&mut output, text),
            FieldValue::Integer(number) => output.push_str(&number.to_string()),
        }
        output.push('\n');
    }

    output.push_str(DELIMITER);
    output.push('\n');
    output
}

/// Write a double-quoted YAML string
///
/// Escapes backslashes, double quotes, and the newline, carriage return and
/// tab characters.
pub fn write_yaml_string(output: &mut String, value: &str) {
    output.push('"');
    for ch in value.chars() {
        match ch {
            '"' => output.push_str("\\\""),
            '\\' => output.push_str("\\\\"),
            '\n' => output.push_str("\\n"),
            '\r' => output.push_str("\\r"),
            '\t' => output.push_str("\\t"),
            _ => output.push(ch),
        }
    }
    output.push('"');
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yaml_string(value: &str) -> String {
        let mut output = String::new();
        write_yaml_string(&mut output, value);
        output
    }

    #[test]
    fn test_yaml_string_escaping() {
        assert_eq!(yaml_string("plain"), "\"plain\"");
        assert_eq!(yaml_string(r#"say "hi""#), r#""say \"hi\"""#);
        assert_eq!(yaml_string(r"C:\path"), r#""C:\\path""#);
        assert_eq!(yaml_string("a\nb\r\tc"), r#""a\nb\r\tc""#);
    }

    #[test]
    fn test_yaml_string_keeps_yaml_indicators_inside_quotes() {
        assert_eq!(yaml_string("key: value # note"), "\"key: value # note\"");
        assert_eq!(yaml_string("- item"), "\"- item\"");
    }

    #[test]
    fn test_default_record_renders_every_field() {
        let output = render_front_matter(&ArticleRecord::new());
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 22);
        assert_eq!(lines[0], "---");
        assert_eq!(lines[1], "title: \"\"");
        assert_eq!(lines[2], "post_id: 0");
        assert_eq!(lines[21], "---");
        assert!(output.ends_with("---\n"));
    }

    #[test]
    fn test_integers_unquoted_strings_quoted() {
        let record = ArticleRecord {
            title: "T".to_string(),
            post_id: 42,
            menu_order: -1,
            is_sticky: 1,
            status: "publish".to_string(),
            ..Default::default()
        };
        let output = render_front_matter(&record);
        assert!(output.contains("post_id: 42\n"));
        assert!(output.contains("menu_order: -1\n"));
        assert!(output.contains("is_sticky: 1\n"));
        assert!(output.contains("status: \"publish\"\n"));
    }

    #[test]
    fn test_extra_fields_rendered_last() {
        let record = ArticleRecord {
            creator: "alice".to_string(),
            extra: vec![("excerpt".to_string(), "Short".to_string())],
            ..Default::default()
        };
        let output = render_front_matter(&record);
        assert!(output.ends_with("creator: \"alice\"\nexcerpt: \"Short\"\n---\n"));
    }
}
