//! Parser implementation using chumsky

use chumsky::input::{Stream, ValueInput};
use chumsky::prelude::*;

use crate::field::FieldKind;
use crate::parser::ast::*;
use crate::parser::lexer::Token;

type Extra<'a> = extra::Err<Rich<'a, Token>>;

/// Parse scene source code into an AST
pub fn parse(input: &str) -> Result<Document, Vec<crate::ParseError>> {
    let len = input.len();

    // Create a logos lexer and convert to token stream
    let token_iter = crate::parser::lexer::lex(input).map(|(tok, span)| (tok, span.into()));

    // Turn the token iterator into a stream that chumsky can use
    let token_stream = Stream::from_iter(token_iter)
        // Split (Token, SimpleSpan) into token and span parts
        .map((len..len).into(), |(t, s): (_, _)| (t, s));

    document_parser()
        .parse(token_stream)
        .into_result()
        .map_err(|errs| errs.into_iter().map(|e| e.into()).collect())
}

/// Parse a standalone atom value: `1 0 0`, `[ 1, 2 ]`, `"text"` or `NULL`
pub fn parse_value(input: &str) -> Result<Value, Vec<crate::ParseError>> {
    let len = input.len();
    let token_iter = crate::parser::lexer::lex(input).map(|(tok, span)| (tok, span.into()));
    let token_stream = Stream::from_iter(token_iter).map((len..len).into(), |(t, s): (_, _)| (t, s));

    choice((
        just(Token::Null).to(Value::Null),
        atom()
            .repeated()
            .collect::<Vec<_>>()
            .delimited_by(just(Token::BracketOpen), just(Token::BracketClose))
            .map(Value::List),
        atom().repeated().at_least(1).collect::<Vec<_>>().map(Value::Atoms),
    ))
    .then_ignore(end())
    .parse(token_stream)
    .into_result()
    .map_err(|errs| errs.into_iter().map(|e| e.into()).collect())
}

/// Helper to extract span range from chumsky's MapExtra
fn span_range(e: &impl chumsky::span::Span<Offset = usize>) -> std::ops::Range<usize> {
    e.start()..e.end()
}

fn identifier<'a, I>() -> impl Parser<'a, I, Spanned<Identifier>, Extra<'a>> + Clone
where
    I: ValueInput<'a, Token = Token, Span = SimpleSpan>,
{
    select! {
        Token::Ident(s) => Identifier::new(s),
    }
    .map_with(|id, e| Spanned::new(id, span_range(&e.span())))
}

fn atom<'a, I>() -> impl Parser<'a, I, Atom, Extra<'a>> + Clone
where
    I: ValueInput<'a, Token = Token, Span = SimpleSpan>,
{
    select! {
        Token::Number(n) => Atom::Number(n),
        Token::String(s) => Atom::String(s),
        Token::Bool(b) => Atom::Bool(b),
    }
}

/// Field values, given the parser for nested nodes
fn value_parser<'a, I, N>(node: N) -> impl Parser<'a, I, Spanned<Value>, Extra<'a>> + Clone
where
    I: ValueInput<'a, Token = Token, Span = SimpleSpan>,
    N: Parser<'a, I, Spanned<NodeStatement>, Extra<'a>> + Clone + 'a,
{
    choice((
        just(Token::Null).to(Value::Null),
        atom().repeated().at_least(1).collect::<Vec<_>>().map(Value::Atoms),
        // `[]` is taken as an empty atom list; the builder accepts it for node fields
        atom()
            .repeated()
            .collect::<Vec<_>>()
            .delimited_by(just(Token::BracketOpen), just(Token::BracketClose))
            .map(Value::List),
        node.clone()
            .repeated()
            .at_least(1)
            .collect::<Vec<_>>()
            .delimited_by(just(Token::BracketOpen), just(Token::BracketClose))
            .map(Value::NodeList),
        node.map(|n| Value::Node(Box::new(n))),
    ))
    .map_with(|v, e| Spanned::new(v, span_range(&e.span())))
}

fn document_parser<'a, I>() -> impl Parser<'a, I, Document, Extra<'a>> + Clone
where
    I: ValueInput<'a, Token = Token, Span = SimpleSpan>,
{
    // Node statements: DEF name Type { body } | Type { body } | USE name
    let node = recursive(|node| {
        let value = value_parser(node.clone());

        let body_element = choice((
            identifier()
                .then_ignore(just(Token::Is))
                .then(identifier())
                .map(|(name, interface)| BodyElement::Is { name, interface }),
            identifier()
                .then(value)
                .map(|(name, value)| BodyElement::Field { name, value }),
        ))
        .map_with(|el, e| Spanned::new(el, span_range(&e.span())));

        let use_node = just(Token::Use)
            .ignore_then(identifier())
            .map(NodeStatement::Use);

        let node_decl = just(Token::Def)
            .ignore_then(identifier())
            .or_not()
            .then(identifier())
            .then(
                body_element
                    .repeated()
                    .collect::<Vec<_>>()
                    .delimited_by(just(Token::BraceOpen), just(Token::BraceClose)),
            )
            .map(|((def_name, type_name), body)| {
                NodeStatement::Node(NodeDecl {
                    def_name,
                    type_name,
                    body,
                })
            });

        choice((use_node, node_decl))
            .map_with(|n, e| Spanned::new(n, span_range(&e.span())))
            .boxed()
    });

    let field_kind = identifier().try_map(|id, span| {
        FieldKind::from_name(id.node.as_str())
            .map(|kind| Spanned::new(kind, id.span.clone()))
            .ok_or_else(|| Rich::custom(span, format!("unknown field type '{}'", id.node)))
    });

    // eventIn SFFloat set_x | field SFFloat x 1
    let interface_decl = select! {
        Token::Access(access) => access,
    }
    .then(field_kind)
    .then(identifier())
    .then(value_parser(node.clone()).or_not())
    .try_map(|(((access, kind), id), default), span| {
        match (access.has_value(), default.is_some()) {
            (true, false) => Err(Rich::custom(
                span,
                format!("{} '{}' needs a default value", access, id.node),
            )),
            (false, true) => Err(Rich::custom(
                span,
                format!("{} '{}' cannot have a value", access, id.node),
            )),
            _ => Ok(InterfaceDecl {
                access,
                kind,
                id,
                default,
            }),
        }
    })
    .map_with(|decl, e| Spanned::new(decl, span_range(&e.span())));

    // ROUTE a.out TO b.in
    let route_decl = just(Token::Route)
        .ignore_then(identifier())
        .then_ignore(just(Token::Dot))
        .then(identifier())
        .then_ignore(just(Token::To))
        .then(identifier())
        .then_ignore(just(Token::Dot))
        .then(identifier())
        .map(|(((from_node, from_event), to_node), to_event)| RouteDecl {
            from_node,
            from_event,
            to_node,
            to_event,
        });

    let statement = recursive(|stmt| {
        let proto_decl = just(Token::Proto)
            .ignore_then(identifier())
            .then(
                interface_decl
                    .clone()
                    .repeated()
                    .collect::<Vec<_>>()
                    .delimited_by(just(Token::BracketOpen), just(Token::BracketClose)),
            )
            .then(
                stmt.repeated()
                    .collect::<Vec<_>>()
                    .delimited_by(just(Token::BraceOpen), just(Token::BraceClose)),
            )
            .map(|((name, interfaces), body)| {
                Statement::Proto(ProtoDecl {
                    name,
                    interfaces,
                    body,
                })
            });

        choice((
            proto_decl,
            route_decl.clone().map(Statement::Route),
            node.clone().map(|n| Statement::Node(n.node)),
        ))
        .map_with(|s, e| Spanned::new(s, span_range(&e.span())))
        .boxed()
    });

    // Document is a list of statements
    statement
        .repeated()
        .collect()
        .then_ignore(end())
        .map(|statements| Document { statements })
}
