//! Recursive-descent parser for tag-search queries.
//!
//! ```text
//! expr  := "and(" expr ("," expr)* ")" | "or(" expr ("," expr)* ")"
//!        | "not(" expr ")" | "hint(" expr ("," expr)* ")" | match
//! match := part (":" part)?
//! part  := "[exact]" exact | "[graphite]" raw | "b[graphite]\"" b64 "\""
//!        | "b\"" b64 "\"" | "b!" b64 "!" | "b/" b64 "/"
//!        | "/" regex "/" | glob-or-literal
//! ```
//!
//! Spaces may precede and follow any expression. Operators nest at most
//! [`MAX_QUERY_DEPTH`] deep. Every failure is reported as a byte offset
//! into the query.

use base64::Engine as _;
use nom::branch::alt;
use nom::bytes::complete::{tag, take_while};
use nom::character::complete::char;
use nom::combinator::opt;
use nom::error::{ErrorKind, ParseError};
use nom::sequence::preceded;
use nom::IResult;

use super::ast::SearchNode;
use super::pattern::{has_glob_chars, scan_regex, Pattern, Side};
use crate::error::{SearchErrorKind, SearchParseError};
use crate::tag::{is_taggable_b64_char, TAG_B64};

/// Parser error carrying the remaining input, from which the offset is
/// recovered once parsing stops.
#[derive(Debug)]
struct QueryError<'a> {
    input: &'a str,
    kind: SearchErrorKind,
}

impl<'a> ParseError<&'a str> for QueryError<'a> {
    fn from_error_kind(input: &'a str, _kind: ErrorKind) -> Self {
        let kind = if input.is_empty() {
            SearchErrorKind::UnexpectedEnd
        } else {
            SearchErrorKind::InvalidPattern
        };
        Self { input, kind }
    }

    fn append(_input: &'a str, _kind: ErrorKind, other: Self) -> Self {
        other
    }
}

/// Deepest allowed nesting of `and`, `or`, `not` and `hint`.
pub const MAX_QUERY_DEPTH: usize = 256;

type PResult<'a, T> = IResult<&'a str, T, QueryError<'a>>;

fn fail<T>(input: &str, kind: SearchErrorKind) -> PResult<'_, T> {
    Err(nom::Err::Failure(QueryError { input, kind }))
}

fn fail_at_end<T>(input: &str, kind: SearchErrorKind) -> PResult<'_, T> {
    if input.is_empty() {
        fail(input, SearchErrorKind::UnexpectedEnd)
    } else {
        fail(input, kind)
    }
}

fn chars_while(input: &str, cond: impl Fn(char) -> bool) -> PResult<'_, &str> {
    take_while(cond)(input)
}

fn spaces(input: &str) -> PResult<'_, &str> {
    chars_while(input, |c| c == ' ')
}

/// Parse a whole query. The root must be an operator, not a bare match.
pub(crate) fn parse_query(query: &str) -> Result<SearchNode, SearchParseError> {
    let offset = |rest: &str| query.len() - rest.len();
    match node(query, false, 0) {
        Ok(("", root)) => Ok(root),
        Ok((rest, _)) => Err(SearchParseError::new(
            offset(rest),
            SearchErrorKind::TrailingInput,
        )),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            Err(SearchParseError::new(offset(e.input), e.kind))
        }
        Err(nom::Err::Incomplete(_)) => Err(SearchParseError::new(
            query.len(),
            SearchErrorKind::UnexpectedEnd,
        )),
    }
}

/// `depth` counts the operators enclosing `input`.
fn node(input: &str, allow_match: bool, depth: usize) -> PResult<'_, SearchNode> {
    let (input, _) = spaces(input)?;
    let opened: PResult<'_, &str> =
        alt((tag("and("), tag("or("), tag("not("), tag("hint(")))(input);
    if opened.is_ok() && depth >= MAX_QUERY_DEPTH {
        return fail(input, SearchErrorKind::TooDeep);
    }
    let (rest, parsed) = match opened {
        Ok((rest, "not(")) => {
            let (rest, child) = node(rest, true, depth + 1)?;
            let rest = close(rest)?;
            (rest, SearchNode::Not(Box::new(child)))
        }
        Ok((rest, "and(")) => {
            let (rest, args) = arg_list(rest, depth + 1)?;
            (rest, SearchNode::And(args))
        }
        Ok((rest, "or(")) => {
            let (rest, args) = arg_list(rest, depth + 1)?;
            (rest, SearchNode::Or(args))
        }
        Ok((rest, _)) => {
            // the wrapped expression keeps the caller's rules for bare matches
            let (rest, expr) = node(rest, allow_match, depth + 1)?;
            let (rest, options) = match rest.strip_prefix(',') {
                Some(rest) => arg_list(rest, depth + 1)?,
                None => (close(rest)?, Vec::new()),
            };
            let expr = Box::new(expr);
            (rest, SearchNode::Hint { expr, options })
        }
        Err(nom::Err::Error(_)) if allow_match => match_node(input)?,
        Err(nom::Err::Error(_)) => return fail_at_end(input, SearchErrorKind::ExpectedOperator),
        Err(e) => return Err(e),
    };
    let (rest, _) = spaces(rest)?;
    Ok((rest, parsed))
}

fn arg_list(mut input: &str, depth: usize) -> PResult<'_, Vec<SearchNode>> {
    let mut args = Vec::new();
    loop {
        let (rest, arg) = node(input, true, depth)?;
        args.push(arg);
        match rest.as_bytes().first() {
            Some(b',') => input = &rest[1..],
            Some(b')') => return Ok((&rest[1..], args)),
            _ => return fail_at_end(rest, SearchErrorKind::ExpectedClose),
        }
    }
}

fn close(input: &str) -> Result<&str, nom::Err<QueryError<'_>>> {
    match input.strip_prefix(')') {
        Some(rest) => Ok(rest),
        None => fail_at_end(input, SearchErrorKind::ExpectedClose).map(|(rest, ())| rest),
    }
}

fn match_node(input: &str) -> PResult<'_, SearchNode> {
    let (rest, category) = part(input, Side::Category)?;
    let (rest, value) = opt(preceded(char(':'), |i| part(i, Side::Value)))(rest)?;
    Ok((rest, SearchNode::Match { category, value }))
}

fn part(input: &str, side: Side) -> PResult<'_, Pattern> {
    if let Some(rest) = input.strip_prefix("[exact]") {
        return exact_part(rest, side);
    }
    if let Some(rest) = input.strip_prefix("[graphite]") {
        let (rest, text) = chars_while(rest, |c| is_part_char(c, side))?;
        return graphite_part(input, rest, text.as_bytes().to_vec());
    }
    if input.starts_with("b[graphite]\"") {
        let (rest, decoded) = encoded_body(input, "b[graphite]\"".len(), b'"', side)?;
        return graphite_part(input, rest, decoded);
    }
    match input.as_bytes() {
        [b'b', b'"', ..] => {
            let (rest, decoded) = encoded_body(input, 2, b'"', side)?;
            if has_glob_chars(&decoded) {
                let pattern = Pattern::glob(decoded).or_else(|e| regex_failure(input, e))?;
                Ok((rest, pattern))
            } else {
                Ok((rest, Pattern::Literal(decoded)))
            }
        }
        [b'b', b'!', ..] => {
            let (rest, decoded) = encoded_body(input, 2, b'!', side)?;
            Ok((rest, Pattern::Literal(decoded)))
        }
        [b'b', b'/', ..] => {
            let (rest, decoded) = encoded_body(input, 2, b'/', side)?;
            let source = match String::from_utf8(decoded) {
                Ok(source) => source,
                Err(_) => {
                    return fail(
                        input,
                        SearchErrorKind::InvalidRegex("expression is not utf-8".to_owned()),
                    )
                }
            };
            let pattern = Pattern::regex(source).or_else(|e| regex_failure(input, e))?;
            Ok((rest, pattern))
        }
        [b'/', ..] => match scan_regex(input.as_bytes(), side) {
            Some(end) => {
                let pattern =
                    Pattern::regex(&input[1..end]).or_else(|e| regex_failure(&input[1..], e))?;
                Ok((&input[end + 1..], pattern))
            }
            None => plain_part(input, side),
        },
        _ => plain_part(input, side),
    }
}

fn regex_failure<T>(at: &str, e: regex::Error) -> Result<T, nom::Err<QueryError<'_>>> {
    fail(at, SearchErrorKind::InvalidRegex(e.to_string())).map(|(_, t)| t)
}

fn is_part_char(c: char, side: Side) -> bool {
    c.is_ascii() && (side.allows(c as u8) || c == '*' || c == '?')
}

/// A bare part: a literal, or a glob when it holds `*` or `?`.
fn plain_part(input: &str, side: Side) -> PResult<'_, Pattern> {
    let (rest, text) = chars_while(input, |c| is_part_char(c, side))?;
    if text.is_empty() && side == Side::Category {
        return fail_at_end(input, SearchErrorKind::InvalidPattern);
    }
    if has_glob_chars(text.as_bytes()) {
        let pattern = Pattern::glob(text).or_else(|e| regex_failure(input, e))?;
        return Ok((rest, pattern));
    }
    Ok((rest, Pattern::Literal(text.as_bytes().to_vec())))
}

fn graphite_part<'a>(at: &'a str, rest: &'a str, source: Vec<u8>) -> PResult<'a, Pattern> {
    if source.is_empty() {
        return fail_at_end(at, SearchErrorKind::InvalidPattern);
    }
    let pattern = Pattern::graphite(source).or_else(|e| regex_failure(at, e))?;
    Ok((rest, pattern))
}

/// The part after `[exact]`: `"quoted"`, `b"base64"` or bare.
fn exact_part(input: &str, side: Side) -> PResult<'_, Pattern> {
    let (rest, bytes) = if let Some(quoted) = input.strip_prefix('"') {
        let (rest, text) = chars_while(quoted, |c| c != '"')?;
        match rest.strip_prefix('"') {
            Some(rest) => (rest, text.as_bytes().to_vec()),
            None => return fail(rest, SearchErrorKind::UnexpectedEnd),
        }
    } else if input.starts_with("b\"") {
        encoded_body(input, 2, b'"', side)?
    } else {
        let (rest, text) = chars_while(input, |c| is_part_char(c, side))?;
        (rest, text.as_bytes().to_vec())
    };
    if bytes.is_empty() && side == Side::Category {
        return fail_at_end(input, SearchErrorKind::InvalidPattern);
    }
    Ok((rest, Pattern::Literal(bytes)))
}

/// Decode `<open>base64<delim>`, where `open` is the byte length of the
/// opener (`b"`, `b[graphite]"`, ...). A `/` delimiter is also a base64
/// character, so there the run must end in `/` followed by a terminator.
fn encoded_body(input: &str, open: usize, delim: u8, side: Side) -> PResult<'_, Vec<u8>> {
    let body_start = &input[open..];
    let (after, run) =
        chars_while(body_start, |c| c.is_ascii() && is_taggable_b64_char(c as u8))?;
    let (body, rest) = if delim == b'/' {
        match run.strip_suffix('/') {
            Some(body) if side.is_terminator(after.as_bytes().first().copied()) => (body, after),
            _ => return fail_at_end(after, SearchErrorKind::InvalidPattern),
        }
    } else {
        match after.as_bytes().first() {
            Some(b) if *b == delim => (run, &after[1..]),
            _ => return fail_at_end(after, SearchErrorKind::InvalidPattern),
        }
    };
    if body.is_empty() {
        if side == Side::Category {
            return fail(input, SearchErrorKind::InvalidPattern);
        }
        return Ok((rest, Vec::new()));
    }
    match TAG_B64.decode(body) {
        Ok(decoded) if decoded.is_empty() && side == Side::Category => {
            fail(input, SearchErrorKind::InvalidPattern)
        }
        Ok(decoded) => Ok((rest, decoded)),
        Err(_) => fail(body_start, SearchErrorKind::InvalidBase64),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn only_match(query: &str) -> (Pattern, Option<Pattern>) {
        match parse_query(query).unwrap() {
            SearchNode::And(mut args) => match args.remove(0) {
                SearchNode::Match { category, value } => (category, value),
                other => panic!("expected match, got {other:?}"),
            },
            other => panic!("expected and(), got {other:?}"),
        }
    }

    fn offset_of(query: &str) -> usize {
        parse_query(query).unwrap_err().offset
    }

    #[test]
    fn test_simple_literals() {
        let (cat, val) = only_match("and(foo:bar)");
        assert_eq!(cat, Pattern::Literal(b"foo".to_vec()));
        assert_eq!(val, Some(Pattern::Literal(b"bar".to_vec())));
    }

    #[test]
    fn test_colons_in_value() {
        let (_, val) = only_match("and(foo:bar:baz)");
        assert_eq!(val.unwrap().as_literal(), Some(&b"bar:baz"[..]));
    }

    #[test]
    fn test_half_slash_is_literal() {
        let (cat, val) = only_match("and(/endpoint`latency:/bar)");
        assert_eq!(cat.as_literal(), Some(&b"/endpoint`latency"[..]));
        assert_eq!(val.unwrap().as_literal(), Some(&b"/bar"[..]));
    }

    #[test]
    fn test_regex_parts() {
        let (cat, val) = only_match("and(/foo/:bar)");
        assert_eq!(cat.kind(), "re");
        assert_eq!(val.unwrap().as_literal(), Some(&b"bar"[..]));

        let (cat, val) = only_match("and(foo:/bar/)");
        assert_eq!(cat.as_literal(), Some(&b"foo"[..]));
        assert_eq!(val.unwrap().kind(), "re");
    }

    #[test]
    fn test_encoded_category() {
        let (cat, val) = only_match("and(b\"c29tZTpzdHVmZltoZXJlXQ==\":value)");
        assert_eq!(cat.as_literal(), Some(&b"some:stuff[here]"[..]));
        assert_eq!(val.unwrap().as_literal(), Some(&b"value"[..]));
    }

    #[test]
    fn test_spaces_and_encoded_regex() {
        let root = parse_query(" and( foo:bar, not( b/c29tZS4q/:value))").unwrap();
        let SearchNode::And(args) = root else {
            panic!("expected and()");
        };
        assert_eq!(args.len(), 2);
        let SearchNode::Not(inner) = &args[1] else {
            panic!("expected not()");
        };
        match inner.as_ref() {
            SearchNode::Match { category, value } => {
                assert_eq!(*category, Pattern::regex("some.*").unwrap());
                assert_eq!(value.as_ref().unwrap().as_literal(), Some(&b"value"[..]));
            }
            other => panic!("expected match, got {other:?}"),
        }
    }

    #[test]
    fn test_globs() {
        assert_eq!(only_match("and(*:bar)").0.kind(), "glob");
        assert_eq!(only_match("and(f*:bar)").0.kind(), "glob");
        assert_eq!(only_match("and(foo:b*r)").1.unwrap().kind(), "glob");
        // decoded "?f*"
        assert_eq!(only_match("and(b\"P2Yq\":*)").0.kind(), "glob");
    }

    #[test]
    fn test_exact_forms() {
        let (cat, _) = only_match("and([exact]\"some:stuff[here]\":/value)");
        assert_eq!(cat.as_literal(), Some(&b"some:stuff[here]"[..]));
        let (_, val) = only_match("and(*:b!Kipmb28qKg==!)");
        assert_eq!(val.unwrap().as_literal(), Some(&b"**foo**"[..]));
        let (cat, _) = only_match("and([exact]a*b:c)");
        assert_eq!(cat.as_literal(), Some(&b"a*b"[..]));
    }

    #[test]
    fn test_missing_value_and_empty_value() {
        let (_, val) = only_match("and(empty)");
        assert!(val.is_none());
        let (_, val) = only_match("and(empty:)");
        assert_eq!(val.unwrap().as_literal(), Some(&b""[..]));
        let (_, val) = only_match("and(b\"ZmFydHM=\":b\"\",foo:bar)");
        assert_eq!(val.unwrap().as_literal(), Some(&b""[..]));
    }

    #[test]
    fn test_root_must_be_operator() {
        let err = parse_query("foo:bar").unwrap_err();
        assert_eq!(err.offset, 0);
        assert_eq!(err.kind, SearchErrorKind::ExpectedOperator);
    }

    #[test]
    fn test_error_offsets() {
        assert_eq!(offset_of("and(foo:bar"), 11);
        assert_eq!(offset_of("and(foo:bar]"), 11);
        assert_eq!(offset_of("and(:bar)"), 4);
        assert_eq!(offset_of("and(a:b)x"), 8);
        assert_eq!(offset_of("not(a,b)"), 5);
        assert!(matches!(
            parse_query("and(/a{2,1}/:b)").unwrap_err().kind,
            SearchErrorKind::InvalidRegex(_)
        ));
        assert_eq!(
            parse_query("and(b\"!!\":x)").unwrap_err().kind,
            SearchErrorKind::InvalidPattern
        );
    }

    #[test]
    fn test_graphite_parts() {
        let (cat, val) = only_match("and(__name:[graphite]f1.**.f6)");
        assert_eq!(cat.as_literal(), Some(&b"__name"[..]));
        assert_eq!(val.unwrap(), Pattern::graphite("f1.**.f6").unwrap());

        let (_, val) = only_match("and(__name:b[graphite]\"ZjEue2YyLGZvb30uZnszLDQsNX0uKi4qLmY2\")");
        assert_eq!(
            val.unwrap(),
            Pattern::graphite("f1.{f2,foo}.f{3,4,5}.*.*.f6").unwrap()
        );

        assert_eq!(offset_of("and(__name:[graphite])"), 11);
        // "e3g=" is "{x": an unclosed alternation
        assert!(matches!(
            parse_query("and(__name:b[graphite]\"e3g=\")").unwrap_err().kind,
            SearchErrorKind::InvalidRegex(_)
        ));
    }

    #[test]
    fn test_hint_forms() {
        let root = parse_query("hint(and(a:b),index:none)").unwrap();
        let SearchNode::Hint { expr, options } = root else {
            panic!("expected hint()");
        };
        assert!(matches!(*expr, SearchNode::And(_)));
        assert_eq!(options.len(), 1);

        let root = parse_query("and(hint(*:*))").unwrap();
        assert!(matches!(&root.args()[0], SearchNode::Hint { options, .. } if options.is_empty()));

        // a bare match is still not a valid root, hinted or not
        assert_eq!(
            parse_query("hint(a:b)").unwrap_err().kind,
            SearchErrorKind::ExpectedOperator
        );
        assert_eq!(offset_of("and(hint(a:b,x:y)"), 17);
    }

    #[test]
    fn test_nesting_limit() {
        let nested = |depth: usize| format!("{}a:b{}", "not(".repeat(depth), ")".repeat(depth));
        assert!(parse_query(&nested(MAX_QUERY_DEPTH)).is_ok());

        let err = parse_query(&nested(MAX_QUERY_DEPTH + 1)).unwrap_err();
        assert_eq!(err.kind, SearchErrorKind::TooDeep);
        assert_eq!(err.offset, MAX_QUERY_DEPTH * 4);

        let err = parse_query(&nested(100_000)).unwrap_err();
        assert_eq!(err.kind, SearchErrorKind::TooDeep);

        let wide = format!("and({}a:b{})", "and(".repeat(300), ")".repeat(300));
        assert_eq!(parse_query(&wide).unwrap_err().error_code(), "too_deep");
    }
}
