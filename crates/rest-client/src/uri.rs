//! Endpoint resolution
//!
//! Turns an endpoint string, or an RFC 6570 URI template plus positional values, into an absolute
//! [`Url`]. Userinfo and query embedded in the URL are split off into credentials and query
//! parameters so the stored endpoint carries neither.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use url::Url;

use crate::auth::Credentials;
use crate::error::RestError;

/// A single query parameter; the value may be absent (`?flag`)
pub type QueryPair = (String, Option<String>);

const UNRESERVED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

const UNRESERVED_AND_RESERVED: &AsciiSet = &UNRESERVED
    .remove(b':')
    .remove(b'/')
    .remove(b'?')
    .remove(b'#')
    .remove(b'[')
    .remove(b']')
    .remove(b'@')
    .remove(b'!')
    .remove(b'$')
    .remove(b'&')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')')
    .remove(b'*')
    .remove(b'+')
    .remove(b',')
    .remove(b';')
    .remove(b'=');

/// Fully resolved endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedEndpoint {
    /// Absolute URL without userinfo or query
    pub endpoint: Url,
    /// Credentials taken from the URL userinfo
    pub credentials: Option<Credentials>,
    /// Query parameters taken from the URL, in order
    pub query: Vec<QueryPair>,
}

/// Parse an absolute URL
pub fn resolve(url: &str) -> Result<ResolvedEndpoint, RestError> {
    let mut parsed = Url::parse(url).map_err(|e| RestError::MalformedEndpoint {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    if parsed.cannot_be_a_base() {
        return Err(RestError::MalformedEndpoint {
            url: url.to_string(),
            reason: "URL cannot be used as a request endpoint".to_string(),
        });
    }

    let credentials = user_info(&parsed);

    let query = match parsed.query() {
        Some(raw) => parse_query_string(raw)?,
        None => Vec::new(),
    };

    // Cannot fail once cannot_be_a_base() has been ruled out
    let _ = parsed.set_username("");
    let _ = parsed.set_password(None);
    parsed.set_query(None);

    Ok(ResolvedEndpoint {
        endpoint: parsed,
        credentials,
        query,
    })
}

/// Expand a URI template with positional values, then [`resolve`] the result
///
/// Values are bound to the template's distinct variables in order of first appearance.
pub fn resolve_template(template: &str, values: &[&str]) -> Result<ResolvedEndpoint, RestError> {
    let parts = parse_template(template)?;
    let variables = variables(&parts);

    if variables.len() != values.len() {
        return Err(RestError::TemplateArityMismatch {
            expected: variables.len(),
            actual: values.len(),
        });
    }

    let bindings: Vec<(&str, &str)> = variables.into_iter().zip(values.iter().copied()).collect();

    let mut expanded = String::with_capacity(template.len());
    for part in &parts {
        match part {
            Part::Literal(text) => expanded.push_str(text),
            Part::Expression(op, specs) => expand_expression(&mut expanded, *op, specs, &bindings),
        }
    }

    tracing::trace!(template, expanded = %expanded, "Expanded URI template");
    resolve(&expanded)
}

/// Split a raw query string into parameters
///
/// Segments are separated by `&`. A segment with one `=` is a key/value pair, a segment without
/// `=` is a key with an absent value. Segments with several `=` or starting with `=` are
/// rejected. Empty segments are skipped.
pub fn parse_query_string(raw: &str) -> Result<Vec<QueryPair>, RestError> {
    let mut pairs = Vec::new();

    for segment in raw.split('&') {
        if segment.is_empty() {
            continue;
        }
        if segment.starts_with('=') {
            return Err(RestError::MalformedQueryString(format!(
                "query string part `{segment}` should not start with an ="
            )));
        }

        match segment.split_once('=') {
            None => pairs.push((decode_query_component(segment), None)),
            Some((_, value)) if value.contains('=') => {
                return Err(RestError::MalformedQueryString(format!(
                    "query string part `{segment}` should not have more than one ="
                )));
            }
            Some((key, value)) => pairs.push((
                decode_query_component(key),
                Some(decode_query_component(value)),
            )),
        }
    }

    Ok(pairs)
}

fn decode_query_component(raw: &str) -> String {
    percent_decode_str(&raw.replace('+', " "))
        .decode_utf8_lossy()
        .into_owned()
}

fn user_info(url: &Url) -> Option<Credentials> {
    let username = url.username();
    let password = url.password();

    if username.is_empty() && password.is_none() {
        return None;
    }

    // Decode each half separately so an encoded `:` stays inside its half
    let decode = |raw: &str| percent_decode_str(raw).decode_utf8_lossy().into_owned();
    Some(Credentials::basic(
        decode(username),
        password.map(decode).unwrap_or_default(),
    ))
}

#[derive(Debug, PartialEq)]
enum Part {
    Literal(String),
    Expression(Operator, Vec<VarSpec>),
}

#[derive(Debug, PartialEq)]
struct VarSpec {
    name: String,
    prefix: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Operator {
    Simple,
    Reserved,
    Fragment,
    Label,
    Path,
    PathParam,
    Query,
    QueryContinuation,
}

impl Operator {
    fn first(self) -> &'static str {
        match self {
            Operator::Simple | Operator::Reserved => "",
            Operator::Fragment => "#",
            Operator::Label => ".",
            Operator::Path => "/",
            Operator::PathParam => ";",
            Operator::Query => "?",
            Operator::QueryContinuation => "&",
        }
    }

    fn separator(self) -> &'static str {
        match self {
            Operator::Simple | Operator::Reserved | Operator::Fragment => ",",
            Operator::Label => ".",
            Operator::Path => "/",
            Operator::PathParam => ";",
            Operator::Query | Operator::QueryContinuation => "&",
        }
    }

    fn named(self) -> bool {
        matches!(
            self,
            Operator::PathParam | Operator::Query | Operator::QueryContinuation
        )
    }

    fn if_empty(self) -> &'static str {
        match self {
            Operator::Query | Operator::QueryContinuation => "=",
            _ => "",
        }
    }

    fn allowed(self) -> &'static AsciiSet {
        match self {
            Operator::Reserved | Operator::Fragment => UNRESERVED_AND_RESERVED,
            _ => UNRESERVED,
        }
    }
}

fn parse_template(template: &str) -> Result<Vec<Part>, RestError> {
    let mut parts = Vec::new();
    let mut rest = template;

    while !rest.is_empty() {
        match rest.find(|c: char| c == '{' || c == '}') {
            None => {
                parts.push(Part::Literal(rest.to_string()));
                break;
            }
            Some(idx) if rest[idx..].starts_with('}') => {
                return Err(RestError::TemplateExpansion(format!(
                    "unmatched `}}` at offset {}",
                    template.len() - rest.len() + idx
                )));
            }
            Some(idx) => {
                if idx > 0 {
                    parts.push(Part::Literal(rest[..idx].to_string()));
                }
                let body = &rest[idx + 1..];
                let end = body.find('}').ok_or_else(|| {
                    RestError::TemplateExpansion("unclosed expression".to_string())
                })?;
                parts.push(parse_expression(&body[..end])?);
                rest = &body[end + 1..];
            }
        }
    }

    Ok(parts)
}

fn parse_expression(expr: &str) -> Result<Part, RestError> {
    if expr.contains('{') {
        return Err(RestError::TemplateExpansion(format!(
            "nested `{{` in expression `{expr}`"
        )));
    }

    let (op, list) = match expr.chars().next() {
        Some('+') => (Operator::Reserved, &expr[1..]),
        Some('#') => (Operator::Fragment, &expr[1..]),
        Some('.') => (Operator::Label, &expr[1..]),
        Some('/') => (Operator::Path, &expr[1..]),
        Some(';') => (Operator::PathParam, &expr[1..]),
        Some('?') => (Operator::Query, &expr[1..]),
        Some('&') => (Operator::QueryContinuation, &expr[1..]),
        Some(c @ ('=' | ',' | '!' | '@' | '|')) => {
            return Err(RestError::TemplateExpansion(format!(
                "reserved operator `{c}` in expression `{expr}`"
            )));
        }
        Some(_) => (Operator::Simple, expr),
        None => {
            return Err(RestError::TemplateExpansion("empty expression".to_string()));
        }
    };

    let specs = list
        .split(',')
        .map(parse_varspec)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Part::Expression(op, specs))
}

fn parse_varspec(spec: &str) -> Result<VarSpec, RestError> {
    let (name, prefix) = if let Some(name) = spec.strip_suffix('*') {
        (name, None)
    } else if let Some((name, len)) = spec.split_once(':') {
        let len: usize = len
            .parse()
            .ok()
            .filter(|len| (1..10_000).contains(len))
            .ok_or_else(|| {
                RestError::TemplateExpansion(format!("invalid prefix modifier in `{spec}`"))
            })?;
        (name, Some(len))
    } else {
        (spec, None)
    };

    let valid = !name.is_empty()
        && !name.starts_with('.')
        && !name.ends_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '%'));

    if !valid {
        return Err(RestError::TemplateExpansion(format!(
            "invalid variable name `{name}`"
        )));
    }

    Ok(VarSpec {
        name: name.to_string(),
        prefix,
    })
}

fn variables(parts: &[Part]) -> Vec<&str> {
    let mut names: Vec<&str> = Vec::new();
    for part in parts {
        if let Part::Expression(_, specs) = part {
            for spec in specs {
                if !names.contains(&spec.name.as_str()) {
                    names.push(&spec.name);
                }
            }
        }
    }
    names
}

fn expand_expression(out: &mut String, op: Operator, specs: &[VarSpec], bindings: &[(&str, &str)]) {
    for (idx, spec) in specs.iter().enumerate() {
        out.push_str(if idx == 0 { op.first() } else { op.separator() });

        let value = bindings
            .iter()
            .find(|(name, _)| *name == spec.name)
            .map(|(_, value)| *value)
            .unwrap_or_default();
        let value: String = match spec.prefix {
            Some(len) => value.chars().take(len).collect(),
            None => value.to_string(),
        };

        if op.named() {
            out.push_str(&spec.name);
            if value.is_empty() {
                out.push_str(op.if_empty());
                continue;
            }
            out.push('=');
        }

        out.extend(utf8_percent_encode(&value, op.allowed()));
    }
}
