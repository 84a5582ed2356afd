use chumsky::prelude::*;
use sc_core::{EdgeStyle, Flowchart, GraphDirection, NodeShape, Style};
use tracing::debug;

use crate::flowchart_builder::FlowchartBuilder;

type ParserExtra<'a> = extra::Err<Rich<'a, char>>;

// ---------------------------------------------------------------------------
// Statement AST
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
struct NodeRef {
    id: String,
    label: Option<String>,
    shape: NodeShape,
    class: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Link {
    style: EdgeStyle,
    label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Statement {
    Node(NodeRef),
    Chain {
        head: NodeRef,
        links: Vec<(Link, NodeRef)>,
        color: Option<String>,
    },
}

// ---------------------------------------------------------------------------
// Chumsky statement grammar (one `;`-free statement at a time)
// ---------------------------------------------------------------------------

fn inline_ws<'a>() -> impl Parser<'a, &'a str, (), ParserExtra<'a>> + Clone {
    any()
        .filter(|c: &char| *c == ' ' || *c == '\t')
        .repeated()
        .ignored()
}

/// Word characters joined by single `-` or `.`, so `a-b` is one id while
/// `a-->b` stops before the arrow.
fn identifier<'a>() -> impl Parser<'a, &'a str, &'a str, ParserExtra<'a>> + Clone {
    let word = any()
        .filter(|c: &char| c.is_alphanumeric() || *c == '_')
        .repeated()
        .at_least(1);
    let joiner = any().filter(|c: &char| matches!(*c, '-' | '.'));
    word.clone()
        .then(joiner.then(word).repeated())
        .to_slice()
}

fn shaped_label<'a>(
    open: &'static str,
    close: &'static str,
) -> impl Parser<'a, &'a str, &'a str, ParserExtra<'a>> + Clone {
    let quoted = inline_ws()
        .ignore_then(
            just('"')
                .ignore_then(any().filter(|c: &char| *c != '"').repeated().to_slice())
                .then_ignore(just('"')),
        )
        .then_ignore(inline_ws())
        .then_ignore(just(close));
    let plain = any()
        .and_is(just(close).not())
        .repeated()
        .to_slice()
        .then_ignore(just(close));
    just(open).ignore_then(quoted.or(plain))
}

fn class_suffix<'a>() -> impl Parser<'a, &'a str, &'a str, ParserExtra<'a>> + Clone {
    just(":::").ignore_then(
        any()
            .filter(|c: &char| c.is_alphanumeric() || matches!(*c, '_' | '-' | '#'))
            .repeated()
            .at_least(1)
            .to_slice(),
    )
}

fn node<'a>() -> impl Parser<'a, &'a str, NodeRef, ParserExtra<'a>> + Clone {
    // Most delimited pairs first: `(text)` is a prefix pattern of `([text])`.
    let shape = choice((
        shaped_label("([", "])").map(|label| (label, NodeShape::Stadium)),
        shaped_label("[[", "]]").map(|label| (label, NodeShape::Subroutine)),
        shaped_label("[(", ")]").map(|label| (label, NodeShape::Cylinder)),
        shaped_label("((", "))").map(|label| (label, NodeShape::Circle)),
        shaped_label("{{", "}}").map(|label| (label, NodeShape::Hexagon)),
        shaped_label("[/", "/]").map(|label| (label, NodeShape::Parallelogram)),
        shaped_label("[/", "\\]").map(|label| (label, NodeShape::Trapezoid)),
        shaped_label(">", "]").map(|label| (label, NodeShape::Asymmetric)),
        shaped_label("[", "]").map(|label| (label, NodeShape::Rectangle)),
        shaped_label("(", ")").map(|label| (label, NodeShape::RoundedRect)),
        shaped_label("{", "}").map(|label| (label, NodeShape::Rhombus)),
    ));

    identifier()
        .then(shape.or_not())
        .then(class_suffix().or_not())
        .map(
            |((id, shaped), class): ((&str, Option<(&str, NodeShape)>), Option<&str>)| {
                let (label, shape) = match shaped {
                    Some((label, shape)) => (Some(label.to_string()), shape),
                    None => (None, NodeShape::Rectangle),
                };
                NodeRef {
                    id: id.to_string(),
                    label,
                    shape,
                    class: class.map(str::to_string),
                }
            },
        )
}

/// Label text of an inline-labeled link, up to the closing arrow.
fn inline_text<'a>(stop: &'static str) -> impl Parser<'a, &'a str, &'a str, ParserExtra<'a>> + Clone {
    any()
        .and_is(just(stop).not())
        .repeated()
        .at_least(1)
        .to_slice()
}

fn link<'a>() -> impl Parser<'a, &'a str, Link, ParserExtra<'a>> + Clone {
    let solid_arrow = just("--").then(just('-').repeated()).then(just('>')).ignored();
    let thick_arrow = just("==").then(just('=').repeated()).then(just('>')).ignored();
    let dotted_arrow = just("-.")
        .then(just('.').repeated())
        .then(just("->"))
        .ignored();
    let dotted_close = just('.')
        .repeated()
        .at_least(1)
        .then(just("->"))
        .ignored();

    let solid_labeled = just("--")
        .ignore_then(inline_ws())
        .ignore_then(inline_text("--"))
        .then_ignore(solid_arrow.clone());
    let dotted_labeled = just("-.")
        .ignore_then(inline_ws())
        .ignore_then(inline_text(".-").then_ignore(dotted_close));
    let thick_labeled = just("==")
        .ignore_then(inline_ws())
        .ignore_then(inline_text("=="))
        .then_ignore(thick_arrow.clone());

    choice((
        solid_arrow.to(Link {
            style: EdgeStyle::Solid,
            label: None,
        }),
        thick_arrow.to(Link {
            style: EdgeStyle::Thick,
            label: None,
        }),
        dotted_arrow.to(Link {
            style: EdgeStyle::Dotted,
            label: None,
        }),
        solid_labeled.map(|text: &str| Link {
            style: EdgeStyle::Solid,
            label: Some(text.to_string()),
        }),
        dotted_labeled.map(|text: &str| Link {
            style: EdgeStyle::Dotted,
            label: Some(text.to_string()),
        }),
        thick_labeled.map(|text: &str| Link {
            style: EdgeStyle::Thick,
            label: Some(text.to_string()),
        }),
    ))
}

fn statement_parser<'a>() -> impl Parser<'a, &'a str, Statement, ParserExtra<'a>> {
    let pipe_label = just('|')
        .ignore_then(any().filter(|c: &char| *c != '|').repeated().to_slice())
        .then_ignore(just('|'));

    let segment = inline_ws()
        .ignore_then(link())
        .then_ignore(inline_ws())
        .then(pipe_label.or_not())
        .then_ignore(inline_ws())
        .then(node())
        .map(|((mut link, pipe), target): ((Link, Option<&str>), NodeRef)| {
            if let Some(text) = pipe {
                link.label = Some(text.to_string());
            }
            (link, target)
        });

    let chain = node()
        .then(segment.repeated().at_least(1).collect::<Vec<_>>())
        .then(inline_ws().ignore_then(class_suffix()).or_not())
        .then_ignore(inline_ws())
        .then_ignore(end())
        .map(
            |((head, mut links), tail_color): ((NodeRef, Vec<(Link, NodeRef)>), Option<&str>)| {
                // A `:::name` on the last node of an edge statement colors the edge.
                let color = match tail_color {
                    Some(color) => Some(color.to_string()),
                    None => links.last_mut().and_then(|(_, last)| last.class.take()),
                };
                Statement::Chain { head, links, color }
            },
        );

    let standalone = node()
        .then_ignore(inline_ws())
        .then_ignore(end())
        .map(Statement::Node);

    choice((chain, standalone))
}

// ---------------------------------------------------------------------------
// Lowering: Statement -> builder calls
// ---------------------------------------------------------------------------

fn intern_ref(builder: &mut FlowchartBuilder, node: &NodeRef) -> Option<usize> {
    let index = builder.intern_node(&node.id, node.label.as_deref(), node.shape)?;
    if let Some(class) = &node.class {
        builder.add_class_to_node(&node.id, class);
    }
    Some(index)
}

fn lower_statement(statement: &Statement, builder: &mut FlowchartBuilder) {
    match statement {
        Statement::Node(node) => {
            let _ = intern_ref(builder, node);
        }
        Statement::Chain { head, links, color } => {
            let Some(mut previous) = intern_ref(builder, head) else {
                return;
            };
            let last = links.len().saturating_sub(1);
            for (position, (link, target)) in links.iter().enumerate() {
                let Some(current) = intern_ref(builder, target) else {
                    return;
                };
                let edge_color = if position == last {
                    color.as_deref()
                } else {
                    None
                };
                builder.push_edge(
                    previous,
                    current,
                    link.style,
                    link.label.as_deref(),
                    edge_color,
                );
                previous = current;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Directives (style / linkStyle / classDef / class / subgraph)
// ---------------------------------------------------------------------------

/// Split `keyword rest` into the first whitespace token and the remainder.
fn split_head(rest: &str) -> Option<(&str, &str)> {
    let rest = rest.trim();
    let split_at = rest.find(char::is_whitespace)?;
    let (head, tail) = rest.split_at(split_at);
    let tail = tail.trim();
    (!head.is_empty() && !tail.is_empty()).then_some((head, tail))
}

fn strip_keyword<'s>(statement: &'s str, keyword: &str) -> Option<&'s str> {
    let rest = statement.strip_prefix(keyword)?;
    if rest.is_empty() {
        return Some(rest);
    }
    rest.starts_with(char::is_whitespace).then_some(rest)
}

/// Returns true when `statement` is a directive, whether or not it was usable.
fn apply_directive(statement: &str, line_number: usize, builder: &mut FlowchartBuilder) -> bool {
    if let Some(rest) = strip_keyword(statement, "style") {
        match split_head(rest) {
            Some((node_id, declarations)) => {
                builder.set_node_style(node_id, &Style::parse_declarations(declarations));
            }
            None => builder.add_warning(format!(
                "Line {line_number}: style directive needs a node id and properties"
            )),
        }
        return true;
    }

    if let Some(rest) = strip_keyword(statement, "linkStyle") {
        let Some((targets, declarations)) = split_head(rest) else {
            builder.add_warning(format!(
                "Line {line_number}: linkStyle directive needs edge indexes and properties"
            ));
            return true;
        };
        let style = Style::parse_declarations(declarations);
        for target in targets.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            if target == "default" {
                builder.set_default_link_style(&style);
            } else if let Ok(edge_index) = target.parse::<usize>() {
                builder.set_link_style(edge_index, &style);
            } else {
                builder.add_warning(format!(
                    "Line {line_number}: invalid linkStyle edge index: {target}"
                ));
            }
        }
        return true;
    }

    if let Some(rest) = strip_keyword(statement, "classDef") {
        match split_head(rest) {
            Some((names, declarations)) => {
                let style = Style::parse_declarations(declarations);
                for name in names.split(',').map(str::trim).filter(|n| !n.is_empty()) {
                    builder.define_class(name, &style);
                }
            }
            None => builder.add_warning(format!(
                "Line {line_number}: classDef directive needs a class name and properties"
            )),
        }
        return true;
    }

    if let Some(rest) = strip_keyword(statement, "class") {
        let Some((node_ids, class_name)) = split_head(rest) else {
            builder.add_warning(format!(
                "Line {line_number}: class directive needs node ids and a class name"
            ));
            return true;
        };
        for node_id in node_ids.split(',').map(str::trim).filter(|id| !id.is_empty()) {
            if !builder.add_class_to_node(node_id, class_name) {
                builder.add_warning(format!(
                    "Line {line_number}: class directive references unknown node: {node_id}"
                ));
            }
        }
        return true;
    }

    false
}

// ---------------------------------------------------------------------------
// Document loop
// ---------------------------------------------------------------------------

pub(crate) fn parse_flowchart(input: &str) -> (Flowchart, Vec<String>) {
    let mut builder = FlowchartBuilder::new(GraphDirection::TopDown);
    let parser = statement_parser();
    let mut seen_header = false;
    let mut open_subgraphs = 0_usize;

    for (index, line) in input.lines().enumerate() {
        let line_number = index + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() || is_comment(trimmed) {
            continue;
        }
        let uncommented = strip_inline_comment(trimmed);
        if uncommented.is_empty() {
            continue;
        }

        let mut statements = split_statements(uncommented);
        if !seen_header {
            seen_header = true;
            let header = statements.next().unwrap_or_default();
            builder = FlowchartBuilder::new(parse_graph_direction(header).unwrap_or_default());
        }

        for statement in statements {
            let statement = statement.trim();
            if statement.is_empty() {
                continue;
            }

            if strip_keyword(statement, "subgraph").is_some() {
                open_subgraphs = open_subgraphs.saturating_add(1);
                continue;
            }
            if statement == "end" {
                if open_subgraphs == 0 {
                    builder.add_warning(format!(
                        "Line {line_number}: encountered 'end' without matching 'subgraph'"
                    ));
                } else {
                    open_subgraphs -= 1;
                }
                continue;
            }
            if strip_keyword(statement, "direction").is_some() {
                continue;
            }
            if apply_directive(statement, line_number, &mut builder) {
                continue;
            }

            let (ast, errors) = parser.parse(statement).into_output_errors();
            match ast {
                Some(ast) if errors.is_empty() => lower_statement(&ast, &mut builder),
                _ => builder.add_warning(format!(
                    "Line {line_number}: unsupported flowchart syntax: {statement}"
                )),
            }
        }
    }

    if open_subgraphs > 0 {
        builder.add_warning(format!(
            "Flowchart ended with {open_subgraphs} unclosed subgraph block(s)"
        ));
    }

    debug!(
        nodes = builder.node_count(),
        edges = builder.edge_count(),
        "flowchart parsed"
    );
    builder.finish()
}

/// Split on `;` outside quotes and delimiter pairs.
fn split_statements(line: &str) -> impl Iterator<Item = &str> {
    let mut statements = Vec::new();
    let mut current_start = 0;
    let mut in_quote = false;
    let mut depth = 0_usize;

    for (i, c) in line.char_indices() {
        if in_quote {
            if c == '"' {
                in_quote = false;
            }
            continue;
        }
        match c {
            '"' => in_quote = true,
            '[' | '(' | '{' => depth = depth.saturating_add(1),
            ']' | ')' | '}' => depth = depth.saturating_sub(1),
            ';' if depth == 0 => {
                statements.push(&line[current_start..i]);
                current_start = i + 1;
            }
            _ => {}
        }
    }
    statements.push(&line[current_start..]);
    statements.into_iter()
}

/// Cut a trailing `%%` comment that starts outside quotes and delimiters.
fn strip_inline_comment(line: &str) -> &str {
    let mut in_quote = false;
    let mut depth = 0_usize;

    for (idx, ch) in line.char_indices() {
        if in_quote {
            if ch == '"' {
                in_quote = false;
            }
            continue;
        }
        match ch {
            '"' => in_quote = true,
            '[' | '(' | '{' => depth = depth.saturating_add(1),
            ']' | ')' | '}' => depth = depth.saturating_sub(1),
            '%' if depth == 0 && line[idx..].starts_with("%%") => {
                return line[..idx].trim_end();
            }
            _ => {}
        }
    }
    line
}

fn parse_graph_direction(header: &str) -> Option<GraphDirection> {
    header
        .split_whitespace()
        .skip(1)
        .find_map(GraphDirection::from_token)
}

pub(crate) fn is_comment(line: &str) -> bool {
    line.starts_with("%%")
}
