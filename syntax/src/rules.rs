//! Compatibility rule files.
//!
//! ```text
//! # source class, then the classes it may bond to
//! RCN A:0 A:1,B:0
//! RBO A 1
//! CAP A:1 cap:0
//! DEL B:1
//! RCC A:0 A:0
//! SYM A:0 0.75
//! ```

use crate::lexeme::{gap, line_end, number, unsigned, word, word_list};
use crate::{LoadError, LoadResult, ParserExtra, Spanned, SyntaxError, parse_lines, syntax_report};
use blockspace::CompatibilityRegistry;
use chumsky::prelude::*;
use error_stack::ResultExt;

#[derive(Clone, Debug, PartialEq)]
pub enum Rule {
    /// `RCN source target,…`
    Compatibility { source: String, targets: Vec<String> },
    /// `RBO class order`, the order given as a number or `SINGLE`, `DOUBLE`, `TRIPLE`.
    BondOrder { class: String, order: u8 },
    /// `CAP class capping-class`
    Capping { class: String, capping: String },
    /// `DEL class`
    ForbiddenEnd { class: String },
    /// `RCC source target,…`
    RingClosure { source: String, targets: Vec<String> },
    /// `SYM class probability`
    Symmetry { class: String, probability: f64 },
}

fn class<'src>() -> impl Parser<'src, &'src str, String, ParserExtra<'src>> + Clone {
    word().map(ToString::to_string).labelled("port class")
}

fn bond_order<'src>() -> impl Parser<'src, &'src str, u8, ParserExtra<'src>> + Clone {
    let named = choice((
        just("SINGLE").to(1u8),
        just("DOUBLE").to(2u8),
        just("TRIPLE").to(3u8),
    ));
    let numeric = unsigned().try_map(|n, span| {
        u8::try_from(n)
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| Rich::custom(span, format!("bond order {n} is out of range")))
    });
    named.or(numeric).labelled("bond order")
}

/// One rule line.
pub fn rule<'src>() -> impl Parser<'src, &'src str, Rule, ParserExtra<'src>> {
    let compatibility = just("RCN")
        .ignore_then(gap())
        .ignore_then(class())
        .then_ignore(gap())
        .then(word_list())
        .map(|(source, targets)| Rule::Compatibility { source, targets })
        .labelled("RCN rule");

    let bond = just("RBO")
        .ignore_then(gap())
        .ignore_then(class())
        .then_ignore(gap())
        .then(bond_order())
        .map(|(class, order)| Rule::BondOrder { class, order })
        .labelled("RBO rule");

    let capping = just("CAP")
        .ignore_then(gap())
        .ignore_then(class())
        .then_ignore(gap())
        .then(class())
        .map(|(class, capping)| Rule::Capping { class, capping })
        .labelled("CAP rule");

    let forbidden = just("DEL")
        .ignore_then(gap())
        .ignore_then(class())
        .map(|class| Rule::ForbiddenEnd { class })
        .labelled("DEL rule");

    let ring_closure = just("RCC")
        .ignore_then(gap())
        .ignore_then(class())
        .then_ignore(gap())
        .then(word_list())
        .map(|(source, targets)| Rule::RingClosure { source, targets })
        .labelled("RCC rule");

    let symmetry = just("SYM")
        .ignore_then(gap())
        .ignore_then(class())
        .then_ignore(gap())
        .then(number())
        .map(|(class, probability)| Rule::Symmetry { class, probability })
        .labelled("SYM rule");

    text::inline_whitespace()
        .ignore_then(choice((
            compatibility,
            bond,
            capping,
            forbidden,
            ring_closure,
            symmetry,
        )))
        .then_ignore(line_end())
}

pub fn parse_rules(src: &str) -> (Vec<Spanned<Rule>>, Vec<SyntaxError>) {
    parse_lines(src, rule())
}

/// Feeds parsed rules, in order, to a registry builder.
pub fn registry_from_rules<'a>(
    rules: impl IntoIterator<Item = &'a Rule>,
) -> LoadResult<CompatibilityRegistry> {
    let mut builder = CompatibilityRegistry::builder();
    for rule in rules {
        match rule {
            Rule::Compatibility { source, targets } => {
                builder.compatibility(source.as_str(), targets.iter().map(String::as_str));
            }
            Rule::BondOrder { class, order } => {
                builder.bond_order(class.as_str(), *order);
            }
            Rule::Capping { class, capping } => {
                builder.capping(class.as_str(), capping.as_str());
            }
            Rule::ForbiddenEnd { class } => {
                builder.forbidden_end(class.as_str());
            }
            Rule::RingClosure { source, targets } => {
                builder.ring_closure_compatibility(source.as_str(), targets.iter().map(String::as_str));
            }
            Rule::Symmetry { class, probability } => {
                builder.symmetry_constraint(class.as_str(), *probability);
            }
        }
    }
    builder.build().change_context(LoadError::Rules)
}

/// Parses `src` and builds the registry it describes.
pub fn load_rules(src: &str) -> LoadResult<CompatibilityRegistry> {
    let (rules, errors) = parse_rules(src);
    if !errors.is_empty() {
        return Err(syntax_report(&errors));
    }
    registry_from_rules(rules.iter().map(|(rule, _)| rule))
}
