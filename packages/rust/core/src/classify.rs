//! Decides whether a model reply looks like test code.

use std::fmt;

/// Shown instead of the reply when it does not look like test code.
pub const FALLBACK_MESSAGE: &str = "The model returned an explanation, but no unit test code was generated. Please refine the input or check the document.";

/// True iff `text` contains `"function"` or `"describe("`.
///
/// Deliberately naive: prose mentioning "function" passes, and real test
/// code without either marker does not.
pub fn looks_like_test_code(text: &str) -> bool {
    text.contains("function") || text.contains("describe(")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// The reply, unchanged.
    TestCode(String),
    NoTestCode,
}

impl Classification {
    pub fn is_test_code(&self) -> bool {
        matches!(self, Self::TestCode(_))
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TestCode(text) => f.write_str(text),
            Self::NoTestCode => f.write_str(FALLBACK_MESSAGE),
        }
    }
}

pub fn classify(text: String) -> Classification {
    if looks_like_test_code(&text) {
        Classification::TestCode(text)
    } else {
        Classification::NoTestCode
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solidity_function_passes_through() {
        let c = classify("function test() {}".into());
        assert_eq!(c, Classification::TestCode("function test() {}".into()));
        assert_eq!(c.to_string(), "function test() {}");
    }

    #[test]
    fn mocha_describe_passes_through() {
        let c = classify("describe('Token', () => {})".into());
        assert!(c.is_test_code());
    }

    #[test]
    fn prose_falls_back() {
        let c = classify("This contract implements a token.".into());
        assert_eq!(c, Classification::NoTestCode);
        assert_eq!(c.to_string(), FALLBACK_MESSAGE);
    }

    #[test]
    fn describe_needs_paren() {
        assert!(!looks_like_test_code("describe the token"));
        assert!(looks_like_test_code("the function is unsafe"));
    }
}
