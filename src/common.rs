// Copyright 2026 The Scorec Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::fmt;
use std::{error, result};

/// The closed set of ways a model can fail to compile.
///
/// Every failure is raised before or during translation of the offending
/// (sub-)model and aborts that compilation; there is no partial output.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// A recognized attribute holds a value outside the supported subset.
    UnsupportedAttribute,
    /// A structural element is of a variant not handled in this position.
    UnsupportedElement,
    /// A required attribute value is absent.
    MissingAttribute,
    /// A required child element is absent.
    MissingElement,
    /// A structurally present but semantically inconsistent configuration.
    InvalidElement,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use ErrorCode::*;
        let name = match self {
            UnsupportedAttribute => "unsupported_attribute",
            UnsupportedElement => "unsupported_element",
            MissingAttribute => "missing_attribute",
            MissingElement => "missing_element",
            InvalidElement => "invalid_element",
        };

        write!(f, "{name}")
    }
}

/// A compilation failure, carrying the identity of the offending model
/// object (a path-like string such as `"TreeModel/Node@0_2"`) and, where
/// useful, the attribute or element that triggered it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Error {
    pub code: ErrorCode,
    pub object: String,
    pub details: Option<String>,
}

impl Error {
    pub fn new(code: ErrorCode, object: String, details: Option<String>) -> Self {
        Error {
            code,
            object,
            details,
        }
    }

    pub fn get_details(&self) -> Option<String> {
        self.details.clone()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.details {
            Some(ref details) => write!(f, "{}{{{}: {}}}", self.code, self.object, details),
            None => write!(f, "{}{{{}}}", self.code, self.object),
        }
    }
}

impl error::Error for Error {}

pub type Result<T> = result::Result<T, Error>;

#[macro_export]
macro_rules! unsupported_attr {
    ($object:expr, $attr:expr) => {{
        use $crate::common::{Error, ErrorCode};
        Err(Error::new(
            ErrorCode::UnsupportedAttribute,
            $object.to_string(),
            Some(format!("{:?}", $attr)),
        ))
    }};
}

#[macro_export]
macro_rules! unsupported_elem {
    ($object:expr) => {{
        use $crate::common::{Error, ErrorCode};
        Err(Error::new(
            ErrorCode::UnsupportedElement,
            $object.to_string(),
            None,
        ))
    }};
    ($object:expr, $details:expr) => {{
        use $crate::common::{Error, ErrorCode};
        Err(Error::new(
            ErrorCode::UnsupportedElement,
            $object.to_string(),
            Some($details.to_string()),
        ))
    }};
}

#[macro_export]
macro_rules! missing_attr {
    ($object:expr, $attr:expr) => {{
        use $crate::common::{Error, ErrorCode};
        Err(Error::new(
            ErrorCode::MissingAttribute,
            $object.to_string(),
            Some($attr.to_string()),
        ))
    }};
}

#[macro_export]
macro_rules! missing_elem {
    ($object:expr, $elem:expr) => {{
        use $crate::common::{Error, ErrorCode};
        Err(Error::new(
            ErrorCode::MissingElement,
            $object.to_string(),
            Some($elem.to_string()),
        ))
    }};
}

#[macro_export]
macro_rules! invalid_elem {
    ($object:expr) => {{
        use $crate::common::{Error, ErrorCode};
        Err(Error::new(
            ErrorCode::InvalidElement,
            $object.to_string(),
            None,
        ))
    }};
    ($object:expr, $details:expr) => {{
        use $crate::common::{Error, ErrorCode};
        Err(Error::new(
            ErrorCode::InvalidElement,
            $object.to_string(),
            Some($details.to_string()),
        ))
    }};
}

/// Turn a field (or other) name into a deterministic identifier fragment:
/// lowercase alphanumerics, everything else collapsed to underscores.
pub fn sanitize(name: &str) -> String {
    let mut result = String::with_capacity(name.len());
    let mut last_underscore = false;

    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            result.push(c.to_ascii_lowercase());
            last_underscore = false;
        } else if !last_underscore {
            result.push('_');
            last_underscore = true;
        }
    }

    if result.starts_with(|c: char| c.is_ascii_digit()) {
        result.insert(0, '_');
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::new(
            ErrorCode::UnsupportedAttribute,
            "TreeModel".to_string(),
            Some("WeightedConfidence".to_string()),
        );
        assert_eq!(
            format!("{err}"),
            "unsupported_attribute{TreeModel: WeightedConfidence}"
        );

        let err = Error::new(ErrorCode::MissingElement, "Output".to_string(), None);
        assert_eq!(format!("{err}"), "missing_element{Output}");
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("Sepal.Length"), "sepal_length");
        assert_eq!(sanitize("petal width"), "petal_width");
        assert_eq!(sanitize("x1"), "x1");
        assert_eq!(sanitize("2theta"), "_2theta");
        assert_eq!(sanitize("a--b"), "a_b");
    }
}
