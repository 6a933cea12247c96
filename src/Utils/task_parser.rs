//! parse task documents with structure like
//! ```text
//! optimizer
//!   iterations: 20
//!   seed: 3
//! gradient
//!   h_max: 1e-4
//! data
//!   training: branch1.csv
//! ```
//! i.e. titles followed by `key: value1, value2` pairs, into
//! HashMap<String, HashMap<String, Option<Vec<Value>>>>. Keys listed in a template but absent from
//! the document come out as `None`. Lines starting with `//`, `#`, `%` or `;` are comments.
use crate::model::errors::{FitError, FitResult};
use crate::numerical::finite_diff::DifferenceScheme;
use crate::numerical::gradient_ascent::GradientAscentConfig;
use crate::numerical::minimize_scalar::ScalarSearchMethod;
use log::warn;
use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_while1},
    character::complete::{alpha1, alphanumeric1, multispace0, space0},
    combinator::{map, recognize},
    multi::{many0, many1, separated_list0},
    sequence::{delimited, pair, separated_pair, terminated},
};
use std::collections::HashMap;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

pub type SectionMap = HashMap<String, Option<Vec<Value>>>;
pub type DocumentMap = HashMap<String, SectionMap>;

/// scalar value of a task document
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Float(f64),
    Integer(i64),
    Boolean(bool),
}

impl Value {
    pub fn as_string(&self) -> Option<&String> {
        if let Value::String(s) = self {
            Some(s)
        } else {
            None
        }
    }

    /// integers are widened, so `iterations: 10` and `h_max: 10` both read as numbers
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        if let Value::Integer(i) = self {
            Some(*i)
        } else {
            None
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        if let Value::Boolean(b) = self {
            Some(*b)
        } else {
            None
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::String(s) => write!(f, "{}", s),
            Value::Float(val) => write!(f, "{}", val),
            Value::Integer(val) => write!(f, "{}", val),
            Value::Boolean(val) => write!(f, "{}", val),
        }
    }
}

/// identifier: letter or underscore, then letters, digits, underscores
fn parse_identifier(input: &str) -> IResult<&str, String> {
    let parser = recognize(pair(
        alt((alpha1, tag("_"))),
        many0(alt((alphanumeric1, tag("_")))),
    ));
    map(parser, String::from).parse(input)
}

pub(crate) fn parse_title(input: &str) -> IResult<&str, String> {
    let (input, title) = parse_identifier(input)?;
    Ok((input.trim(), title))
}

pub(crate) fn parse_key(input: &str) -> IResult<&str, String> {
    parse_identifier(input)
}

/// one value up to the next comma, blank, newline or semicolon
pub(crate) fn parse_value(input: &str) -> IResult<&str, Value> {
    let token = take_while1(|c: char| !matches!(c, ',' | ' ' | '\t' | '\n' | '\r' | ';'));
    map(token, |s: &str| {
        if let Ok(val) = s.parse::<i64>() {
            Value::Integer(val)
        } else if let Ok(val) = s.parse::<f64>() {
            Value::Float(val)
        } else if let Ok(val) = s.parse::<bool>() {
            Value::Boolean(val)
        } else {
            Value::String(s.to_string())
        }
    })
    .parse(input)
}

pub(crate) fn parse_value_list(input: &str) -> IResult<&str, Vec<Value>> {
    let (input, _) = space0(input)?;
    let separator = delimited(space0, tag(","), space0);
    separated_list0(separator, parse_value).parse(input)
}

pub(crate) fn parse_key_value_pair(input: &str) -> IResult<&str, (String, Vec<Value>)> {
    let colon = delimited(space0, tag(":"), space0);
    let (input, result) = separated_pair(parse_key, colon, parse_value_list).parse(input)?;
    Ok((input.trim_start(), result))
}

fn parse_section(input: &str) -> IResult<&str, (String, HashMap<String, Vec<Value>>)> {
    let (input, _) = space0(input)?;
    let (input, title) = parse_title(input)?;
    let (input, _) = multispace0(input)?;
    let (input, pairs) = many1(terminated(parse_key_value_pair, space0)).parse(input)?;
    Ok((input, (title, pairs.into_iter().collect())))
}

pub(crate) fn filter_comments(input: &str) -> String {
    input
        .lines()
        .filter(|line| {
            let trimmed = line.trim();
            !trimmed.starts_with("//")
                && !trimmed.starts_with('#')
                && !trimmed.starts_with('%')
                && !trimmed.starts_with(';')
                && !trimmed.is_empty()
        })
        .collect::<Vec<&str>>()
        .join("\n")
}

pub fn parse_document(input: &str) -> IResult<&str, DocumentMap> {
    let (input, sections) =
        many1(delimited(multispace0, parse_section, multispace0)).parse(input)?;
    let mut result = HashMap::new();
    for (title, section) in sections {
        let entry: &mut SectionMap = result.entry(title).or_default();
        for (key, values) in section {
            entry.insert(key, Some(values));
        }
    }
    Ok((input, result))
}

/// parse a whole document (comments removed); every title/key of `template` is guaranteed to exist
pub fn parse_document_as(
    input: &str,
    template: Option<&DocumentMap>,
) -> Result<DocumentMap, String> {
    let filtered = filter_comments(input);
    let (remaining, mut parsed) =
        parse_document(&filtered).map_err(|e| format!("Parsing error: {:?}", e))?;
    if !remaining.trim().is_empty() {
        return Err(format!(
            "Failed to parse entire document. Remaining: '{}'",
            remaining
        ));
    }
    if let Some(template) = template {
        for (title, keys) in template {
            let section = parsed.entry(title.clone()).or_default();
            for key in keys.keys() {
                section.entry(key.clone()).or_insert(None);
            }
        }
    }
    Ok(parsed)
}

//////////////////////////////////////////////////////////////////////////////////////////////
///                 TASK FILE -> SOLVER SETTINGS
//////////////////////////////////////////////////////////////////////////////////////////////

const TASK_TEMPLATE: [(&str, &[&str]); 4] = [
    ("optimizer", &["iterations", "seed", "ncores", "loglevel", "log_to_file"]),
    ("gradient", &["h_max", "h_min_percent", "scheme", "timeout_ms"]),
    (
        "line_search",
        &[
            "alpha_lower",
            "alpha_upper",
            "alpha_guess",
            "x_tolerance",
            "max_evaluations",
            "method",
        ],
    ),
    ("data", &["training", "bounds", "time_weights", "init", "output"]),
];

pub fn task_template() -> DocumentMap {
    TASK_TEMPLATE
        .iter()
        .map(|(title, keys)| {
            (
                title.to_string(),
                keys.iter().map(|k| (k.to_string(), None)).collect(),
            )
        })
        .collect()
}

/// input/output files of one branch fit
#[derive(Debug, Clone, PartialEq)]
pub struct DataPaths {
    pub training: PathBuf,
    pub bounds: PathBuf,
    pub time_weights: PathBuf,
    pub init: Option<PathBuf>,
    pub output: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FitTask {
    pub config: GradientAscentConfig,
    pub data: DataPaths,
}

fn single<'d>(doc: &'d DocumentMap, title: &str, key: &str) -> FitResult<Option<&'d Value>> {
    let values = match doc.get(title).and_then(|s| s.get(key)) {
        Some(Some(values)) => values,
        _ => return Ok(None),
    };
    match values.as_slice() {
        [value] => Ok(Some(value)),
        _ => Err(FitError::Config(format!(
            "{}.{} expects exactly one value, got {}",
            title,
            key,
            values.len()
        ))),
    }
}

fn float_or(doc: &DocumentMap, title: &str, key: &str, default: f64) -> FitResult<f64> {
    match single(doc, title, key)? {
        None => Ok(default),
        Some(v) => v.as_float().ok_or_else(|| {
            FitError::Config(format!("{}.{} must be a number, got {}", title, key, v))
        }),
    }
}

fn count_or(doc: &DocumentMap, title: &str, key: &str, default: usize) -> FitResult<usize> {
    match single(doc, title, key)? {
        None => Ok(default),
        Some(v) => v
            .as_integer()
            .and_then(|i| usize::try_from(i).ok())
            .ok_or_else(|| {
                FitError::Config(format!(
                    "{}.{} must be a non-negative integer, got {}",
                    title, key, v
                ))
            }),
    }
}

fn text(doc: &DocumentMap, title: &str, key: &str) -> FitResult<Option<String>> {
    Ok(single(doc, title, key)?.map(|v| v.to_string()))
}

fn path_in(base: &Path, value: Option<String>) -> Option<PathBuf> {
    value.map(|p| {
        let p = PathBuf::from(p);
        if p.is_relative() { base.join(p) } else { p }
    })
}

impl FitTask {
    /// settings from a task document; relative data paths are resolved against `base_dir`
    pub fn from_document(doc: &DocumentMap, base_dir: &Path) -> FitResult<Self> {
        for (title, section) in doc {
            match TASK_TEMPLATE.iter().find(|(t, _)| *t == title.as_str()) {
                None => warn!("unknown section '{}' ignored", title),
                Some((_, keys)) => {
                    for key in section.keys().filter(|k| !keys.contains(&k.as_str())) {
                        warn!("unknown key '{}.{}' ignored", title, key);
                    }
                }
            }
        }

        let mut config = GradientAscentConfig::default();
        config.iterations = count_or(doc, "optimizer", "iterations", config.iterations)?;
        let seed = count_or(doc, "optimizer", "seed", config.gradient.seed as usize)?;
        config.gradient.seed = seed as u64;
        config.gradient.ncores = count_or(doc, "optimizer", "ncores", config.gradient.ncores)?;
        if let Some(level) = text(doc, "optimizer", "loglevel")? {
            config.loglevel = Some(level);
        }
        if let Some(v) = single(doc, "optimizer", "log_to_file")? {
            config.log_to_file = v.as_boolean().ok_or_else(|| {
                FitError::Config(format!("optimizer.log_to_file must be true or false, got {}", v))
            })?;
        }

        config.gradient.h_max = float_or(doc, "gradient", "h_max", config.gradient.h_max)?;
        config.gradient.h_min_percent =
            float_or(doc, "gradient", "h_min_percent", config.gradient.h_min_percent)?;
        if let Some(scheme) = text(doc, "gradient", "scheme")? {
            config.gradient.scheme = DifferenceScheme::from_str(&scheme)
                .map_err(|_| FitError::Config(format!("unknown difference scheme '{}'", scheme)))?;
        }
        if single(doc, "gradient", "timeout_ms")?.is_some() {
            let ms = count_or(doc, "gradient", "timeout_ms", 0)?;
            config.gradient.timeout = Some(Duration::from_millis(ms as u64));
        }

        let ls = &mut config.line_search;
        ls.alpha_lower = float_or(doc, "line_search", "alpha_lower", ls.alpha_lower)?;
        ls.alpha_upper = float_or(doc, "line_search", "alpha_upper", ls.alpha_upper)?;
        ls.alpha_guess = float_or(doc, "line_search", "alpha_guess", ls.alpha_guess)?;
        if single(doc, "line_search", "x_tolerance")?.is_some() {
            ls.x_tolerance = Some(float_or(doc, "line_search", "x_tolerance", 0.0)?);
        }
        ls.max_evaluations = count_or(doc, "line_search", "max_evaluations", ls.max_evaluations)?;
        if let Some(method) = text(doc, "line_search", "method")? {
            ls.method = ScalarSearchMethod::from_str(&method)
                .map_err(|_| FitError::Config(format!("unknown line search method '{}'", method)))?;
        }
        config.validate().map_err(|e| FitError::Config(e.to_string()))?;

        let required = |key: &str| -> FitResult<PathBuf> {
            path_in(base_dir, text(doc, "data", key)?)
                .ok_or_else(|| FitError::Config(format!("data.{} is required", key)))
        };
        let data = DataPaths {
            training: required("training")?,
            bounds: required("bounds")?,
            time_weights: required("time_weights")?,
            init: path_in(base_dir, text(doc, "data", "init")?),
            output: path_in(base_dir, text(doc, "data", "output")?),
        };
        Ok(FitTask { config, data })
    }

    pub fn parse(input: &str, base_dir: &Path) -> FitResult<Self> {
        let template = task_template();
        let doc = parse_document_as(input, Some(&template)).map_err(FitError::Config)?;
        Self::from_document(&doc, base_dir)
    }

    /// read a task file; data paths are relative to the file's directory
    pub fn from_file<P: AsRef<Path>>(path: P) -> FitResult<Self> {
        let path = path.as_ref();
        let input = std::fs::read_to_string(path)?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        Self::parse(&input, base_dir)
    }
}
