//! Small parsers shared by the line formats.

use crate::ParserExtra;
use chumsky::prelude::*;

/// At least one space or tab.
pub(crate) fn gap<'src>() -> impl Parser<'src, &'src str, (), ParserExtra<'src>> + Clone {
    text::inline_whitespace().at_least(1)
}

/// A run of characters that are not whitespace and not one of `,()*#=`.
pub(crate) fn word<'src>() -> impl Parser<'src, &'src str, &'src str, ParserExtra<'src>> + Clone {
    any::<&'src str, ParserExtra<'src>>()
        .filter(|c: &char| !c.is_whitespace() && !matches!(c, ',' | '(' | ')' | '*' | '#' | '='))
        .repeated()
        .at_least(1)
        .to_slice()
        .labelled("word")
}

/// Comma separated words, spaces allowed around the commas.
pub(crate) fn word_list<'src>()
-> impl Parser<'src, &'src str, Vec<String>, ParserExtra<'src>> + Clone {
    word()
        .map(ToString::to_string)
        .separated_by(just(',').padded_by(text::inline_whitespace()))
        .at_least(1)
        .collect::<Vec<_>>()
}

pub(crate) fn unsigned<'src>() -> impl Parser<'src, &'src str, u64, ParserExtra<'src>> + Clone {
    text::int(10)
        .try_map(|digits: &str, span| {
            digits
                .parse::<u64>()
                .map_err(|e| Rich::custom(span, format!("{digits}: {e}")))
        })
        .labelled("integer")
}

pub(crate) fn number<'src>() -> impl Parser<'src, &'src str, f64, ParserExtra<'src>> + Clone {
    just('-')
        .or_not()
        .then(text::int(10))
        .then(just('.').then(text::digits(10)).or_not())
        .to_slice()
        .try_map(|s: &str, span| {
            s.parse::<f64>()
                .map_err(|e| Rich::custom(span, format!("{s}: {e}")))
        })
        .labelled("number")
}

/// Optional trailing `# comment`, then the end of the line.
pub(crate) fn line_end<'src>() -> impl Parser<'src, &'src str, (), ParserExtra<'src>> + Clone {
    text::inline_whitespace()
        .then(just('#').then(any().repeated()).or_not())
        .then(end())
        .ignored()
}
