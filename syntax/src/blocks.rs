//! Building-block library files.
//!
//! One block per line: the pool, a label, the ports in order (a trailing `*` marks a port that
//! may bond more than once), any number of symmetric port groups, and `empty` for blocks that
//! stand for nothing but their ports.
//!
//! ```text
//! scaffold core ports(A:0, A:0, A:0) sym(0 1 2)
//! fragment linker ports(A:0, A:1*)
//! capping H ports(cap:0)
//! fragment placeholder ports(A:0) empty
//! ```

use crate::lexeme::{gap, line_end, unsigned, word};
use crate::{LoadError, LoadResult, ParserExtra, Spanned, SyntaxError, parse_lines, syntax_report};
use blockspace::{BlockLibrary, BuildingBlock, IdGenerator, Pool};
use chumsky::prelude::*;
use error_stack::ResultExt;
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PortSpec {
    pub class: String,
    pub multiplicity: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockDecl {
    pub pool: Pool,
    pub label: String,
    pub ports: Vec<PortSpec>,
    pub symmetric: Vec<Vec<usize>>,
    pub empty: bool,
}

impl BlockDecl {
    pub fn to_block(&self) -> BuildingBlock {
        let mut block = if self.empty {
            BuildingBlock::empty()
        } else {
            BuildingBlock::fragment(self.label.as_str())
        };
        for port in &self.ports {
            block = if port.multiplicity {
                block.with_multiplicity_port(port.class.as_str())
            } else {
                block.with_port(port.class.as_str())
            };
        }
        for group in &self.symmetric {
            block = block.with_symmetric_ports(group.iter().copied());
        }
        block
    }
}

fn pool<'src>() -> impl Parser<'src, &'src str, Pool, ParserExtra<'src>> + Clone {
    choice((
        just("scaffold").to(Pool::Scaffold),
        just("fragment").to(Pool::Fragment),
        just("capping").to(Pool::Capping),
    ))
    .labelled("pool")
}

fn ports<'src>() -> impl Parser<'src, &'src str, Vec<PortSpec>, ParserExtra<'src>> + Clone {
    let port = word()
        .then(just('*').or_not())
        .map(|(class, star): (&str, _)| PortSpec {
            class: class.to_string(),
            multiplicity: star.is_some(),
        })
        .labelled("port");
    port.separated_by(just(',').padded_by(text::inline_whitespace()))
        .collect::<Vec<_>>()
        .padded_by(text::inline_whitespace())
        .delimited_by(just("ports("), just(')'))
        .labelled("port list")
}

fn symmetric_group<'src>() -> impl Parser<'src, &'src str, Vec<usize>, ParserExtra<'src>> + Clone
{
    unsigned()
        .map(|i| i as usize)
        .separated_by(gap())
        .at_least(2)
        .collect::<Vec<_>>()
        .padded_by(text::inline_whitespace())
        .delimited_by(just("sym("), just(')'))
        .labelled("symmetric group")
}

/// One block line.
pub fn block<'src>() -> impl Parser<'src, &'src str, BlockDecl, ParserExtra<'src>> {
    text::inline_whitespace()
        .ignore_then(pool())
        .then_ignore(gap())
        .then(word().map(ToString::to_string).labelled("label"))
        .then_ignore(gap())
        .then(ports())
        .then(gap().ignore_then(symmetric_group()).repeated().collect::<Vec<_>>())
        .then(gap().ignore_then(just("empty")).or_not())
        .then_ignore(line_end())
        .map(|((((pool, label), ports), symmetric), empty)| BlockDecl {
            pool,
            label,
            ports,
            symmetric,
            empty: empty.is_some(),
        })
}

pub fn parse_blocks(src: &str) -> (Vec<Spanned<BlockDecl>>, Vec<SyntaxError>) {
    parse_lines(src, block())
}

/// Sorts the declarations into their pools, keeping their relative order, and builds the library.
pub fn library_from_blocks<'a>(
    ids: Arc<IdGenerator>,
    decls: impl IntoIterator<Item = &'a BlockDecl>,
) -> LoadResult<BlockLibrary> {
    let (mut scaffolds, mut fragments, mut cappings) = (Vec::new(), Vec::new(), Vec::new());
    for decl in decls {
        let target = match decl.pool {
            Pool::Scaffold => &mut scaffolds,
            Pool::Fragment => &mut fragments,
            Pool::Capping => &mut cappings,
        };
        target.push(decl.to_block());
    }
    BlockLibrary::new(ids, scaffolds, fragments, cappings).change_context(LoadError::Library)
}

pub fn load_blocks(src: &str, ids: Arc<IdGenerator>) -> LoadResult<BlockLibrary> {
    let (decls, errors) = parse_blocks(src);
    if !errors.is_empty() {
        return Err(syntax_report(&errors));
    }
    library_from_blocks(ids, decls.iter().map(|(decl, _)| decl))
}
