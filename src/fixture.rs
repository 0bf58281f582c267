//! Conformance fixtures: a directive header followed by a PHP script.
//!
//! ```text
//! @kphp_should_fail access
//! /Cannot access private property/
//! <?php
//! ...
//! ```

use nom::IResult;
use nom::branch::alt;
use nom::bytes::complete::{tag, take_while1};
use nom::character::complete::{space0, space1};
use nom::combinator::{eof, value};
use nom::multi::many0;
use nom::sequence::preceded;
use regex::Regex;

use crate::runtime::Interpreter;
use crate::value::{RuntimeError, RuntimeErrorCode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    Ok,
    ShouldFail,
    ShouldWarn,
}

impl std::fmt::Display for Directive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Directive::Ok => "@ok",
            Directive::ShouldFail => "@kphp_should_fail",
            Directive::ShouldWarn => "@kphp_should_warn",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone)]
pub struct Fixture {
    pub directive: Directive,
    pub categories: Vec<String>,
    pub patterns: Vec<Regex>,
    /// Text from `<?php` onward.
    pub script: String,
    /// Lines consumed by the header; added back to error lines.
    pub header_lines: usize,
    pub path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Fail(String),
}

#[derive(Debug)]
pub struct FixtureReport {
    pub output: String,
    pub warnings: Vec<String>,
    pub error: Option<RuntimeError>,
    pub verdict: Verdict,
}

impl FixtureReport {
    pub fn passed(&self) -> bool {
        self.verdict == Verdict::Pass
    }
}

fn directive_keyword(input: &str) -> IResult<&str, Directive> {
    preceded(
        tag("@"),
        alt((
            value(Directive::ShouldFail, tag("kphp_should_fail")),
            value(Directive::ShouldWarn, tag("kphp_should_warn")),
            value(Directive::Ok, tag("ok")),
        )),
    )(input)
}

fn category(input: &str) -> IResult<&str, &str> {
    preceded(
        space1,
        take_while1(|c: char| c.is_ascii_alphanumeric() || c == '_' || c == '-'),
    )(input)
}

/// `@ok access` / `@kphp_should_fail` with zero or more categories.
fn directive_line(input: &str) -> IResult<&str, (Directive, Vec<&str>)> {
    let (input, directive) = directive_keyword(input)?;
    let (input, categories) = many0(category)(input)?;
    let (input, _) = space0(input)?;
    let (input, _) = eof(input)?;
    Ok((input, (directive, categories)))
}

fn format_error(message: String, line: usize) -> RuntimeError {
    RuntimeError::with_code(message, RuntimeErrorCode::FixtureFormat).at_line(line)
}

fn parse_pattern(line: &str, line_no: usize) -> Result<Regex, RuntimeError> {
    let body = line
        .strip_prefix('/')
        .and_then(|rest| rest.strip_suffix('/'))
        .filter(|body| !body.is_empty())
        .ok_or_else(|| format_error(format!("expected /pattern/, found `{}`", line), line_no))?;
    Regex::new(body).map_err(|err| format_error(format!("invalid pattern /{}/: {}", body, err), line_no))
}

/// Split a fixture into its header and script. A file that starts
/// directly with `<?php` is an `@ok` fixture without categories.
pub fn parse_fixture(source: &str) -> Result<Fixture, RuntimeError> {
    let mut directive = None;
    let mut categories = Vec::new();
    let mut patterns = Vec::new();
    let mut offset = 0;
    let mut header_lines = 0;

    for line in source.split_inclusive('\n') {
        if line.trim_start().starts_with("<?php") {
            break;
        }
        header_lines += 1;
        offset += line.len();
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        if directive.is_none() {
            let (_, (found, cats)) = directive_line(text).map_err(|_| {
                format_error(format!("unknown fixture directive `{}`", text), header_lines)
            })?;
            directive = Some(found);
            categories = cats.into_iter().map(str::to_string).collect();
        } else {
            patterns.push(parse_pattern(text, header_lines)?);
        }
    }

    if offset == source.len() && !source.contains("<?php") {
        return Err(format_error("fixture has no `<?php` section".to_string(), header_lines));
    }
    let directive = directive.unwrap_or(Directive::Ok);
    crate::trace::trace_log!(
        "fixture",
        "{} [{}] with {} patterns",
        directive,
        categories.join(" "),
        patterns.len()
    );
    Ok(Fixture {
        directive,
        categories,
        patterns,
        script: source[offset..].to_string(),
        header_lines,
        path: None,
    })
}

/// Run the fixture's script in a fresh interpreter and judge the outcome.
pub fn check(fixture: &Fixture) -> FixtureReport {
    let mut interpreter = Interpreter::new();
    if let Some(path) = &fixture.path {
        interpreter.set_program_path(path);
    }
    let result = interpreter.run(&fixture.script);
    let output = interpreter.output().into_owned();
    let warnings = interpreter.warnings().to_vec();
    let error = result.err().map(|mut err| {
        if let Some(line) = err.line.as_mut() {
            *line += fixture.header_lines;
        }
        err
    });

    let verdict = match (fixture.directive, &error) {
        (Directive::Ok, None) => Verdict::Pass,
        (Directive::Ok, Some(err)) => Verdict::Fail(format!("unexpected error: {}", err.message)),
        (Directive::ShouldFail, None) => Verdict::Fail("script ran without error".to_string()),
        (Directive::ShouldFail, Some(err)) => match fixture
            .patterns
            .iter()
            .find(|re| !re.is_match(&err.message))
        {
            Some(re) => Verdict::Fail(format!("error `{}` does not match /{}/", err.message, re)),
            None => Verdict::Pass,
        },
        (Directive::ShouldWarn, Some(err)) => {
            Verdict::Fail(format!("unexpected error: {}", err.message))
        }
        (Directive::ShouldWarn, None) if warnings.is_empty() => {
            Verdict::Fail("script produced no warnings".to_string())
        }
        (Directive::ShouldWarn, None) => match fixture
            .patterns
            .iter()
            .find(|re| !warnings.iter().any(|w| re.is_match(w)))
        {
            Some(re) => Verdict::Fail(format!("no warning matches /{}/", re)),
            None => Verdict::Pass,
        },
    };
    crate::trace::trace_log!("fixture", "{} -> {:?}", fixture.directive, verdict);

    FixtureReport {
        output,
        warnings,
        error,
        verdict,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_directive_with_category() {
        let fixture = parse_fixture("@ok access\n<?php\necho 1;\n").unwrap();
        assert_eq!(fixture.directive, Directive::Ok);
        assert_eq!(fixture.categories, vec!["access"]);
        assert_eq!(fixture.script, "<?php\necho 1;\n");
        assert_eq!(fixture.header_lines, 1);
        let report = check(&fixture);
        assert!(report.passed());
        assert_eq!(report.output, "1");
    }

    #[test]
    fn bare_script_is_ok() {
        let fixture = parse_fixture("<?php echo 2;").unwrap();
        assert_eq!(fixture.directive, Directive::Ok);
        assert!(fixture.categories.is_empty());
    }

    #[test]
    fn should_fail_matches_every_pattern() {
        let src = "@kphp_should_fail access\n/private property/\n/Base::\\$x/\n<?php\nclass Base { private $x; }\necho (new Base)->x;\n";
        let fixture = parse_fixture(src).unwrap();
        assert_eq!(fixture.patterns.len(), 2);
        let report = check(&fixture);
        assert!(report.passed(), "{:?}", report.verdict);
        assert_eq!(report.error.as_ref().and_then(|e| e.line), Some(6));
    }

    #[test]
    fn should_fail_rejects_a_clean_run() {
        let fixture = parse_fixture("@kphp_should_fail\n<?php echo 1;").unwrap();
        assert_eq!(
            check(&fixture).verdict,
            Verdict::Fail("script ran without error".to_string())
        );
    }

    #[test]
    fn should_fail_rejects_a_different_message() {
        let src = "@kphp_should_fail\n/protected/\n<?php class A { private function f() {} } (new A)->f();";
        let report = check(&parse_fixture(src).unwrap());
        assert!(!report.passed());
    }

    #[test]
    fn should_warn_needs_a_matching_warning() {
        let src = "@kphp_should_warn\n/Undefined variable/\n<?php echo $nope;";
        assert!(check(&parse_fixture(src).unwrap()).passed());
        let quiet = "@kphp_should_warn\n<?php echo 1;";
        assert!(!check(&parse_fixture(quiet).unwrap()).passed());
    }

    #[test]
    fn malformed_headers() {
        let err = parse_fixture("@maybe\n<?php").unwrap_err();
        assert_eq!(err.code, Some(RuntimeErrorCode::FixtureFormat));
        let err = parse_fixture("@ok\nnot a pattern\n<?php").unwrap_err();
        assert_eq!(err.line, Some(2));
        assert!(parse_fixture("@ok\n/(/\n<?php").is_err());
        assert!(parse_fixture("@ok access\n").is_err());
    }
}
