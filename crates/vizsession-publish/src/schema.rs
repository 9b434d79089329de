//! Path layout of published content.
//!
//! ```text
//! {prefix}/Static/{snapshot}/renderconfig.json
//! {prefix}/Static/{snapshot}/metadata.json
//! {prefix}/Static/{snapshot}/{buffer}.vbo
//! {prefix}/Workbooks/{workbook}/...
//! ```

use crate::error::PublishError;

const STATIC_DIR: &str = "Static";
const WORKBOOKS_DIR: &str = "Workbooks";

/// A path prefix under which content is published.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentSchema {
    prefix: String,
}

impl ContentSchema {
    /// A schema rooted at `prefix`. Leading and trailing slashes are
    /// ignored.
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.trim_matches('/').to_owned(),
        }
    }

    /// The schema's prefix, without a trailing slash.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The sub-schema holding one snapshot's static content.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::InvalidName`] if `snapshot` is not a single
    /// path segment.
    pub fn for_snapshot(&self, snapshot: &str) -> Result<Self, PublishError> {
        self.nested(STATIC_DIR, snapshot)
    }

    /// The sub-schema holding one named workbook's content.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::InvalidName`] if `workbook` is not a single
    /// path segment.
    pub fn for_workbook(&self, workbook: &str) -> Result<Self, PublishError> {
        self.nested(WORKBOOKS_DIR, workbook)
    }

    /// Full object path of `sub_path` under this schema.
    pub fn path_for(&self, sub_path: &str) -> String {
        let sub_path = sub_path.trim_start_matches('/');
        if self.prefix.is_empty() {
            sub_path.to_owned()
        } else {
            format!("{}/{sub_path}", self.prefix)
        }
    }

    fn nested(&self, dir: &str, name: &str) -> Result<Self, PublishError> {
        validate_segment(name)?;
        Ok(Self {
            prefix: self.path_for(&format!("{dir}/{name}")),
        })
    }
}

fn validate_segment(name: &str) -> Result<(), PublishError> {
    let valid = !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
        && !name.chars().any(char::is_control);
    if valid {
        Ok(())
    } else {
        Err(PublishError::InvalidName(name.to_owned()))
    }
}
