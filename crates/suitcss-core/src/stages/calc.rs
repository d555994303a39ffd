/*
 * stages/calc.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Static calc() reduction.
 */

//! The `calc` stage.
//!
//! Folds `calc()` expressions whose result is known at build time: sums
//! of quantities sharing a unit, and products or quotients with unitless
//! numbers. Anything else (mixed units, `var()`, keywords) is left alone.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use super::parse_settings;
use crate::config::stage_ids::CALC;
use crate::css;
use crate::diagnostic::Diagnostic;
use crate::error::PipelineError;
use crate::stage::{Stage, StageContext};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct CalcSettings {
    /// Decimal places kept in folded values
    precision: u32,
    warn_when_cannot_resolve: bool,
}

impl Default for CalcSettings {
    fn default() -> Self {
        Self {
            precision: 5,
            warn_when_cannot_resolve: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CalcStage {
    settings: CalcSettings,
}

impl CalcStage {
    pub fn from_settings(settings: &Value) -> Result<Self, PipelineError> {
        Ok(Self {
            settings: parse_settings(CALC, settings)?,
        })
    }

    /// Fold every reducible `calc()` in `value`. Returns the new value and
    /// the expressions that could not be reduced.
    fn reduce_value<'v>(&self, value: &'v str) -> (String, Vec<&'v str>) {
        let bytes = value.as_bytes();
        let mut out = String::with_capacity(value.len());
        let mut unresolved = Vec::new();
        let mut cursor = 0;
        let mut search = 0;

        while let Some(found) = value[search..].find("calc(") {
            let start = search + found;
            let end = css::skip_parens(bytes, start + 4, bytes.len());
            search = end;
            let preceded_by_ident = value[..start]
                .chars()
                .next_back()
                .is_some_and(|c| c.is_alphanumeric() || c == '-' || c == '_');
            if preceded_by_ident || bytes[end - 1] != b')' {
                continue;
            }

            match evaluate(&value[start + 5..end - 1]) {
                Some(quantity) => {
                    out.push_str(&value[cursor..start]);
                    out.push_str(&quantity.format(self.settings.precision));
                    cursor = end;
                }
                None => unresolved.push(&value[start..end]),
            }
        }
        out.push_str(&value[cursor..]);
        (out, unresolved)
    }
}

#[async_trait]
impl Stage for CalcStage {
    fn name(&self) -> &str {
        CALC
    }

    async fn run(&self, css: String, ctx: &mut StageContext) -> Result<String, PipelineError> {
        let stripped = css::strip_comments(&css);
        let mut edits = Vec::new();

        for rule in css::rules(&stripped) {
            for decl in css::declarations(&stripped, rule.body) {
                if !decl.value.contains("calc(") {
                    continue;
                }
                let (reduced, unresolved) = self.reduce_value(&decl.value);
                if self.settings.warn_when_cannot_resolve {
                    let (line, column) = css::line_col(&css, decl.range.start);
                    for expression in unresolved {
                        ctx.add_diagnostic(
                            Diagnostic::warning(format!("could not reduce expression: {}", expression))
                                .with_rule(CALC)
                                .with_source(ctx.filename.clone())
                                .at(line, column),
                        );
                    }
                }
                if reduced != decl.value {
                    edits.push((decl.value_range, reduced));
                }
            }
        }

        Ok(css::apply_edits(&css, edits))
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Quantity {
    value: f64,
    unit: String,
}

impl Quantity {
    fn format(&self, precision: u32) -> String {
        let factor = 10f64.powi(precision.min(15) as i32);
        let mut value = (self.value * factor).round() / factor;
        if value == 0.0 {
            value = 0.0;
        }
        format!("{}{}", value, self.unit)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(Quantity),
    Op(char),
    Open,
    Close,
}

fn evaluate(expression: &str) -> Option<Quantity> {
    let tokens = tokenize(expression)?;
    let mut parser = Parser { tokens, pos: 0 };
    let result = parser.expression()?;
    (parser.pos == parser.tokens.len()).then_some(result)
}

fn tokenize(expression: &str) -> Option<Vec<Token>> {
    let chars: Vec<char> = expression.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let starts_operand = matches!(tokens.last(), None | Some(Token::Op(_)) | Some(Token::Open));
        let next_is_digit = chars
            .get(i + 1)
            .is_some_and(|n| n.is_ascii_digit() || *n == '.');

        match c {
            _ if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Token::Open);
                i += 1;
            }
            ')' => {
                tokens.push(Token::Close);
                i += 1;
            }
            'c' if chars[i..].starts_with(&['c', 'a', 'l', 'c', '(']) => {
                tokens.push(Token::Open);
                i += 5;
            }
            '-' | '+' if starts_operand && next_is_digit => {
                let (quantity, next) = number(&chars, i)?;
                tokens.push(Token::Number(quantity));
                i = next;
            }
            '+' | '-' | '*' | '/' => {
                tokens.push(Token::Op(c));
                i += 1;
            }
            _ if c.is_ascii_digit() || c == '.' => {
                let (quantity, next) = number(&chars, i)?;
                tokens.push(Token::Number(quantity));
                i = next;
            }
            _ => return None,
        }
    }
    Some(tokens)
}

fn number(chars: &[char], start: usize) -> Option<(Quantity, usize)> {
    let mut i = start;
    if matches!(chars.get(i), Some('-') | Some('+')) {
        i += 1;
    }
    while chars.get(i).is_some_and(|c| c.is_ascii_digit() || *c == '.') {
        i += 1;
    }
    let digits_end = i;
    while chars
        .get(i)
        .is_some_and(|c| c.is_ascii_alphabetic() || *c == '%')
    {
        i += 1;
    }

    let value: f64 = chars[start..digits_end].iter().collect::<String>().parse().ok()?;
    let unit: String = chars[digits_end..i].iter().collect();
    Some((Quantity { value, unit }, i))
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn expression(&mut self) -> Option<Quantity> {
        let mut left = self.term()?;
        while let Some(Token::Op(op @ ('+' | '-'))) = self.tokens.get(self.pos).cloned() {
            self.pos += 1;
            let right = self.term()?;
            if left.unit != right.unit {
                return None;
            }
            left.value = if op == '+' {
                left.value + right.value
            } else {
                left.value - right.value
            };
        }
        Some(left)
    }

    fn term(&mut self) -> Option<Quantity> {
        let mut left = self.factor()?;
        while let Some(Token::Op(op @ ('*' | '/'))) = self.tokens.get(self.pos).cloned() {
            self.pos += 1;
            let right = self.factor()?;
            left = if op == '*' {
                match (left.unit.is_empty(), right.unit.is_empty()) {
                    (true, _) => Quantity {
                        value: left.value * right.value,
                        unit: right.unit,
                    },
                    (false, true) => Quantity {
                        value: left.value * right.value,
                        unit: left.unit,
                    },
                    (false, false) => return None,
                }
            } else {
                if !right.unit.is_empty() || right.value == 0.0 {
                    return None;
                }
                Quantity {
                    value: left.value / right.value,
                    unit: left.unit,
                }
            };
        }
        Some(left)
    }

    fn factor(&mut self) -> Option<Quantity> {
        match self.tokens.get(self.pos).cloned()? {
            Token::Number(quantity) => {
                self.pos += 1;
                Some(quantity)
            }
            Token::Open => {
                self.pos += 1;
                let inner = self.expression()?;
                if self.tokens.get(self.pos) != Some(&Token::Close) {
                    return None;
                }
                self.pos += 1;
                Some(inner)
            }
            _ => None,
        }
    }
}
