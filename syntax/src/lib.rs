//! Plain-text loaders for [`blockspace`] spaces.
//!
//! Three line-oriented formats are understood, each with `#` comments:
//! * compatibility rules ([`rules`]), e.g. `RCN A:0 A:1,B:0`;
//! * building-block libraries ([`blocks`]), e.g. `fragment linker ports(A:0, A:1) sym(0 1)`;
//! * keyword settings ([`settings`]), e.g. `FS-GrowthProbScheme=TANH`.
//!
//! Every line is parsed on its own, so one bad line does not hide the errors of the next.
//! [`report`] renders the collected [`SyntaxError`]s with ariadne.

pub mod blocks;
mod lexeme;
pub mod report;
pub mod rules;
pub mod settings;

use chumsky::prelude::*;
use thiserror::Error;

pub type Span = SimpleSpan;
pub type Spanned<T> = (T, Span);

pub(crate) type ParserExtra<'src> = extra::Err<Rich<'src, char, Span>>;

/// A parse failure, with its span in the whole source.
#[derive(Clone, PartialEq, Eq, derive_more::Debug)]
#[debug("{span:?}: {message}")]
pub struct SyntaxError {
    pub span: Span,
    pub message: String,
    /// What was being parsed when the error occurred, innermost first.
    pub contexts: Vec<(String, Span)>,
}

impl SyntaxError {
    pub(crate) fn new(span: Span, message: impl Into<String>) -> Self {
        SyntaxError {
            span,
            message: message.into(),
            contexts: Vec::new(),
        }
    }

    fn from_rich(error: &Rich<'_, char, Span>, offset: usize) -> Self {
        SyntaxError {
            span: shifted(*error.span(), offset),
            message: error.to_string(),
            contexts: error
                .contexts()
                .map(|(label, span)| (label.to_string(), shifted(*span, offset)))
                .collect(),
        }
    }
}

fn shifted(span: Span, offset: usize) -> Span {
    let range = span.into_range();
    (range.start + offset..range.end + offset).into()
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    #[error("the source has {0} syntax errors")]
    Syntax(usize),
    #[error("the compatibility rules are inconsistent")]
    Rules,
    #[error("the building-block library is invalid")]
    Library,
}

pub type LoadResult<T> = error_stack::Result<T, LoadError>;

/// Parses every non-blank, non-comment line of `src` with `line`.
///
/// Parsed items carry the span of their line; errors are collected across all lines.
pub(crate) fn parse_lines<'src, T>(
    src: &'src str,
    line: impl Parser<'src, &'src str, T, ParserExtra<'src>>,
) -> (Vec<Spanned<T>>, Vec<SyntaxError>) {
    let mut items = Vec::new();
    let mut errors = Vec::new();
    let mut offset = 0;
    for raw in src.split_inclusive('\n') {
        let text = raw.trim_end_matches(['\n', '\r']);
        let content = text.trim_start();
        if !content.is_empty() && !content.starts_with('#') {
            match line.parse(text).into_result() {
                Ok(item) => items.push((item, (offset..offset + text.len()).into())),
                Err(errs) => {
                    errors.extend(errs.iter().map(|e| SyntaxError::from_rich(e, offset)));
                }
            }
        }
        offset += raw.len();
    }
    (items, errors)
}

/// Turns collected syntax errors into a report listing each of them.
pub(crate) fn syntax_report(errors: &[SyntaxError]) -> error_stack::Report<LoadError> {
    let mut report = error_stack::Report::new(LoadError::Syntax(errors.len()));
    for e in errors {
        let range = e.span.into_range();
        report = report.attach_printable(format!("{}..{}: {}", range.start, range.end, e.message));
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_log::test]
    fn lines_keep_their_offsets() {
        let src = "# header\n  \nab\r\nx\n";
        let word = any::<&str, ParserExtra>()
            .filter(|c: &char| c.is_ascii_alphabetic())
            .repeated()
            .at_least(1)
            .to_slice();
        let (items, errors) = parse_lines(src, word);
        assert!(errors.is_empty());
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].0, "ab");
        assert_eq!(items[0].1.into_range(), 12..14);
        assert_eq!(items[1].1.into_range(), 16..17);
    }

    #[test_log::test]
    fn errors_point_into_the_whole_source() {
        let src = "ok\nok1\n";
        let word = any::<&str, ParserExtra>()
            .filter(|c: &char| c.is_ascii_alphabetic())
            .repeated()
            .at_least(1)
            .to_slice();
        let (items, errors) = parse_lines(src, word);
        assert_eq!(items.len(), 1);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].span.into_range(), 5..6);
    }
}
