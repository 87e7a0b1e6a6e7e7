//! Resource limits for untrusted export input
//!
//! Exports come from arbitrary sites and are not trusted to be sane:
//!
//! 1. **Input Size**: the whole export file is size-checked before decoding
//! 2. **Nesting Depth**: body markup deeper than the limit is rejected per
//!    article, keeping the recursive converter off the end of the stack
//! 3. **Document Depth**: export elements deeper than the limit abort the
//!    run before the owned XML tree grows past what can be dropped safely
//! 4. **Entity Safety**: `quick-xml` never resolves external entities and
//!    html5ever has no notion of them, so XXE is not reachable

use crate::error::{ConversionError, RecordError};

/// Maximum allowed nesting depth for body elements
pub const MAX_NESTING_DEPTH: usize = 512;

/// Maximum allowed nesting depth for export XML elements
pub const MAX_XML_DEPTH: usize = 1024;

/// Maximum export file size accepted (256 MiB)
pub const MAX_INPUT_BYTES: usize = 256 * 1024 * 1024;

/// Validator for input size and markup depth
#[derive(Debug, Clone, Copy)]
pub struct SecurityValidator {
    max_depth: usize,
    max_xml_depth: usize,
    max_input_bytes: usize,
}

impl SecurityValidator {
    /// Create a validator with default limits
    pub fn new() -> Self {
        Self {
            max_depth: MAX_NESTING_DEPTH,
            max_xml_depth: MAX_XML_DEPTH,
            max_input_bytes: MAX_INPUT_BYTES,
        }
    }

    /// Create a validator with a custom maximum depth
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            max_depth,
            ..Self::new()
        }
    }

    /// Replace the input size limit
    pub fn max_input_bytes(mut self, max_input_bytes: usize) -> Self {
        self.max_input_bytes = max_input_bytes;
        self
    }

    /// Replace the export XML depth limit
    pub fn max_xml_depth(mut self, max_xml_depth: usize) -> Self {
        self.max_xml_depth = max_xml_depth;
        self
    }

    /// Validate nesting depth of body markup
    ///
    /// ```
    /// use article_export_markdown::security::SecurityValidator;
    ///
    /// let validator = SecurityValidator::with_max_depth(100);
    /// assert!(validator.validate_depth(50).is_ok());
    /// assert!(validator.validate_depth(150).is_err());
    /// ```
    pub fn validate_depth(&self, depth: usize) -> Result<(), RecordError> {
        if depth > self.max_depth {
            Err(RecordError::Markup(format!(
                "HTML nesting depth {} exceeds maximum allowed depth {}",
                depth, self.max_depth
            )))
        } else {
            Ok(())
        }
    }

    /// Validate nesting depth of the export document itself
    ///
    /// The returned error carries no position; the XML reader knows where it
    /// stopped and attaches it.
    pub fn validate_xml_depth(&self, depth: usize) -> Result<(), ConversionError> {
        if depth > self.max_xml_depth {
            Err(ConversionError::StructuralParse {
                message: format!(
                    "XML nesting depth {} exceeds maximum allowed depth {}",
                    depth, self.max_xml_depth
                ),
                position: None,
            })
        } else {
            Ok(())
        }
    }

    /// Validate the size of the raw export
    pub fn validate_input_size(&self, len: usize) -> Result<(), ConversionError> {
        if len == 0 {
            return Err(ConversionError::InvalidInput(
                "XML input is empty".to_string(),
            ));
        }
        if len > self.max_input_bytes {
            return Err(ConversionError::InvalidInput(format!(
                "XML input is {} bytes, limit is {}",
                len, self.max_input_bytes
            )));
        }
        Ok(())
    }
}

impl Default for SecurityValidator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_at_limit_allowed() {
        let validator = SecurityValidator::with_max_depth(10);
        assert!(validator.validate_depth(10).is_ok());
        assert!(matches!(
            validator.validate_depth(11),
            Err(RecordError::Markup(_))
        ));
    }

    #[test]
    fn test_default_depth() {
        let validator = SecurityValidator::new();
        assert!(validator.validate_depth(MAX_NESTING_DEPTH).is_ok());
        assert!(validator.validate_depth(MAX_NESTING_DEPTH + 1).is_err());
    }

    #[test]
    fn test_xml_depth_limit() {
        let validator = SecurityValidator::new().max_xml_depth(4);
        assert!(validator.validate_xml_depth(4).is_ok());
        assert!(matches!(
            validator.validate_xml_depth(5),
            Err(ConversionError::StructuralParse { position: None, .. })
        ));
        assert!(SecurityValidator::new().validate_xml_depth(MAX_XML_DEPTH).is_ok());
    }

    #[test]
    fn test_empty_input_rejected() {
        let validator = SecurityValidator::new();
        assert!(matches!(
            validator.validate_input_size(0),
            Err(ConversionError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_input_size_limit() {
        let validator = SecurityValidator::new().max_input_bytes(16);
        assert!(validator.validate_input_size(16).is_ok());
        assert!(validator.validate_input_size(17).is_err());
    }
}
