//! Whitelisted arithmetic evaluator.
//!
//! Grammar, loosest binding first:
//!
//! ```text
//! expr  := term (('+' | '-') term)*
//! term  := unary (('*' | '/' | '%') unary)*
//! unary := ('+' | '-') unary | power
//! power := atom (('**' | '^') unary)?
//! atom  := number | name | name '(' expr (',' expr)* ')' | '(' expr ')'
//! ```
//!
//! Only the functions and constants listed in [`FUNCTIONS`] and [`CONSTANTS`]
//! are recognised. Nothing else can be named, so evaluation has no side effects.
use std::{f64::consts, num::NonZeroUsize};

use lru::LruCache;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use pastel_protocol::FailureKind;
use regex::Regex;
use tracing::trace;

use crate::{command::MathSource, task::TaskResult};

/// Default number of memoised expressions.
const DEFAULT_CAPACITY: usize = 128;

/// Maximum parenthesis/unary nesting depth.
const MAX_DEPTH: usize = 200;

/// Fractional digits kept when formatting non-integral results.
const MAX_FRACTION_DIGITS: usize = 10;

/// Trailing operator run left over from a partial selection.
static TRAILING_OPERATORS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[-+*/%^&|]+\s*$").unwrap_or_else(|_| unreachable!("static pattern"))
});

/// Recognised function names.
pub const FUNCTIONS: &[&str] = &[
    "abs", "sqrt", "cbrt", "exp", "ln", "log", "log2", "log10", "sin", "cos", "tan", "asin",
    "acos", "atan", "sinh", "cosh", "tanh", "floor", "ceil", "round", "trunc", "min", "max",
    "pow", "hypot", "atan2",
];

/// Recognised constants.
pub const CONSTANTS: &[(&str, f64)] = &[("pi", consts::PI), ("e", consts::E), ("tau", consts::TAU)];

/// Sandboxed math provider with a bounded result cache.
pub struct MathProvider {
    /// Results keyed by cleaned expression.
    cache: Mutex<LruCache<String, TaskResult>>,
}

impl Default for MathProvider {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl MathProvider {
    /// Create a provider with the default cache size.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a provider caching up to `capacity` results.
    pub fn with_capacity(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: Mutex::new(LruCache::new(cap)),
        }
    }

    /// Evaluate the selection or the query, depending on `source`.
    pub fn execute(&self, text: &str, query: Option<&str>, source: MathSource) -> TaskResult {
        match source {
            MathSource::Selection => self.evaluate(text),
            MathSource::Query => self.evaluate(query.unwrap_or_default()),
        }
    }

    /// Evaluate one expression.
    pub fn evaluate(&self, input: &str) -> TaskResult {
        let expr = clean_expression(input);
        if expr.is_empty() {
            return TaskResult::failure(FailureKind::EmptyInput, "Nothing to evaluate");
        }
        if let Some(hit) = self.cache.lock().get(&expr).cloned() {
            trace!(expr = %expr, "math_cache_hit");
            return hit;
        }
        let result = match eval_expr(&expr) {
            Ok(v) => TaskResult::single(format_number(v)),
            Err(msg) => TaskResult::failure(FailureKind::InvalidExpression, msg),
        };
        self.cache.lock().put(expr, result.clone());
        result
    }
}

/// Strip a trailing operator run and surrounding whitespace.
pub fn clean_expression(input: &str) -> String {
    TRAILING_OPERATORS.replace(input.trim(), "").trim().to_string()
}

/// Render a finite value: integers without a decimal point, otherwise at
/// most ten fractional digits with trailing zeros removed.
pub fn format_number(v: f64) -> String {
    let s = if v.fract() == 0.0 {
        format!("{v:.0}")
    } else {
        let s = format!("{:.*}", MAX_FRACTION_DIGITS, v);
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    };
    if s == "-0" { "0".to_string() } else { s }
}

/// Parse and evaluate `src`.
pub fn eval_expr(src: &str) -> Result<f64, String> {
    let tokens = tokenize(src)?;
    let mut p = Parser {
        tokens: &tokens,
        pos: 0,
        depth: 0,
    };
    let v = p.expr()?;
    if let Some(t) = p.peek() {
        return Err(format!("Unexpected {}", t.describe()));
    }
    check(v)
}

/// Reject non-finite intermediate values.
fn check(v: f64) -> Result<f64, String> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err("Result is not a finite number".to_string())
    }
}

/// Lexical token.
#[derive(Debug, Clone, PartialEq)]
enum Tok {
    /// Numeric literal.
    Num(f64),
    /// Function or constant name.
    Ident(String),
    /// Operator or punctuation; `**` is folded into `^`.
    Op(char),
}

impl Tok {
    /// Short description for error messages.
    fn describe(&self) -> String {
        match self {
            Self::Num(n) => format!("number {n}"),
            Self::Ident(s) => format!("name '{s}'"),
            Self::Op(c) => format!("'{c}'"),
        }
    }
}

/// Split `src` into tokens.
fn tokenize(src: &str) -> Result<Vec<Tok>, String> {
    let chars: Vec<char> = src.chars().collect();
    let mut out = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
        } else if c.is_ascii_digit() || c == '.' {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                i += 1;
            }
            if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
                let mut j = i + 1;
                if j < chars.len() && (chars[j] == '+' || chars[j] == '-') {
                    j += 1;
                }
                if j < chars.len() && chars[j].is_ascii_digit() {
                    while j < chars.len() && chars[j].is_ascii_digit() {
                        j += 1;
                    }
                    i = j;
                }
            }
            let lit: String = chars[start..i].iter().collect();
            let n = lit
                .parse::<f64>()
                .map_err(|_| format!("Invalid number '{lit}'"))?;
            out.push(Tok::Num(n));
        } else if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            out.push(Tok::Ident(chars[start..i].iter().collect()));
        } else if c == '*' && chars.get(i + 1) == Some(&'*') {
            out.push(Tok::Op('^'));
            i += 2;
        } else if "+-*/%^(),".contains(c) {
            out.push(Tok::Op(c));
            i += 1;
        } else {
            return Err(format!("Unexpected character '{c}'"));
        }
    }
    Ok(out)
}

/// Recursive-descent evaluator over a token slice.
struct Parser<'a> {
    /// Input tokens.
    tokens: &'a [Tok],
    /// Cursor.
    pos: usize,
    /// Current nesting depth.
    depth: usize,
}

impl Parser<'_> {
    /// Token at the cursor.
    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos)
    }

    /// Consume `op` if it is next.
    fn eat(&mut self, op: char) -> bool {
        if self.peek() == Some(&Tok::Op(op)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Consume `op` or fail.
    fn expect(&mut self, op: char) -> Result<(), String> {
        if self.eat(op) {
            Ok(())
        } else {
            match self.peek() {
                Some(t) => Err(format!("Expected '{op}', found {}", t.describe())),
                None => Err(format!("Expected '{op}' at end of expression")),
            }
        }
    }

    /// Enter one nesting level.
    fn descend(&mut self) -> Result<(), String> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            Err("Expression is nested too deeply".to_string())
        } else {
            Ok(())
        }
    }

    /// `expr := term (('+' | '-') term)*`
    fn expr(&mut self) -> Result<f64, String> {
        let mut v = self.term()?;
        loop {
            if self.eat('+') {
                v += self.term()?;
            } else if self.eat('-') {
                v -= self.term()?;
            } else {
                return Ok(v);
            }
        }
    }

    /// `term := unary (('*' | '/' | '%') unary)*`
    fn term(&mut self) -> Result<f64, String> {
        let mut v = self.unary()?;
        loop {
            if self.eat('*') {
                v *= self.unary()?;
            } else if self.eat('/') {
                let d = self.unary()?;
                if d == 0.0 {
                    return Err("Division by zero".to_string());
                }
                v /= d;
            } else if self.eat('%') {
                let d = self.unary()?;
                if d == 0.0 {
                    return Err("Modulo by zero".to_string());
                }
                // Floored modulo: the result takes the sign of the divisor.
                v -= d * (v / d).floor();
            } else {
                return Ok(v);
            }
        }
    }

    /// `unary := ('+' | '-') unary | power`
    fn unary(&mut self) -> Result<f64, String> {
        self.descend()?;
        let v = if self.eat('-') {
            -self.unary()?
        } else if self.eat('+') {
            self.unary()?
        } else {
            self.power()?
        };
        self.depth -= 1;
        Ok(v)
    }

    /// `power := atom (('**' | '^') unary)?`, right associative.
    fn power(&mut self) -> Result<f64, String> {
        let base = self.atom()?;
        if self.eat('^') {
            let exp = self.unary()?;
            return check(base.powf(exp));
        }
        Ok(base)
    }

    /// Numbers, names, calls and parenthesised expressions.
    fn atom(&mut self) -> Result<f64, String> {
        match self.tokens.get(self.pos).cloned() {
            Some(Tok::Num(n)) => {
                self.pos += 1;
                Ok(n)
            }
            Some(Tok::Op('(')) => {
                self.pos += 1;
                self.descend()?;
                let v = self.expr()?;
                self.expect(')')?;
                self.depth -= 1;
                Ok(v)
            }
            Some(Tok::Ident(name)) => {
                self.pos += 1;
                if self.eat('(') {
                    let args = self.args()?;
                    call(&name, &args)
                } else if let Some((_, v)) = CONSTANTS.iter().find(|(n, _)| *n == name) {
                    Ok(*v)
                } else if FUNCTIONS.contains(&name.as_str()) {
                    Err(format!("Function '{name}' needs arguments"))
                } else {
                    Err(format!("Unknown name '{name}'"))
                }
            }
            Some(t) => Err(format!("Unexpected {}", t.describe())),
            None => Err("Unexpected end of expression".to_string()),
        }
    }

    /// Comma-separated call arguments; the opening parenthesis is consumed.
    fn args(&mut self) -> Result<Vec<f64>, String> {
        self.descend()?;
        let mut args = Vec::new();
        if !self.eat(')') {
            loop {
                args.push(self.expr()?);
                if self.eat(')') {
                    break;
                }
                self.expect(',')?;
            }
        }
        self.depth -= 1;
        Ok(args)
    }
}

/// Apply a whitelisted function.
fn call(name: &str, args: &[f64]) -> Result<f64, String> {
    let arity = |n: usize| -> Result<(), String> {
        if args.len() == n {
            Ok(())
        } else {
            Err(format!("{name}() takes {n} argument(s), got {}", args.len()))
        }
    };
    let unary = |f: fn(f64) -> f64| -> Result<f64, String> {
        arity(1)?;
        check(f(args[0]))
    };
    match name {
        "abs" => unary(f64::abs),
        "sqrt" => unary(f64::sqrt),
        "cbrt" => unary(f64::cbrt),
        "exp" => unary(f64::exp),
        "ln" => unary(f64::ln),
        "log2" => unary(f64::log2),
        "log10" => unary(f64::log10),
        "sin" => unary(f64::sin),
        "cos" => unary(f64::cos),
        "tan" => unary(f64::tan),
        "asin" => unary(f64::asin),
        "acos" => unary(f64::acos),
        "atan" => unary(f64::atan),
        "sinh" => unary(f64::sinh),
        "cosh" => unary(f64::cosh),
        "tanh" => unary(f64::tanh),
        "floor" => unary(f64::floor),
        "ceil" => unary(f64::ceil),
        "trunc" => unary(f64::trunc),
        "log" => match args {
            [x] => check(x.ln()),
            [x, base] => check(x.ln() / base.ln()),
            _ => Err(format!("log() takes 1 or 2 arguments, got {}", args.len())),
        },
        "round" => match args {
            [x] => check(x.round_ties_even()),
            [x, digits] => {
                let scale = 10f64.powi(*digits as i32);
                check((x * scale).round_ties_even() / scale)
            }
            _ => Err(format!("round() takes 1 or 2 arguments, got {}", args.len())),
        },
        "min" | "max" => {
            if args.is_empty() {
                return Err(format!("{name}() needs at least one argument"));
            }
            let pick: fn(f64, f64) -> f64 = if name == "min" { f64::min } else { f64::max };
            Ok(args[1..].iter().fold(args[0], |a, b| pick(a, *b)))
        }
        "pow" => {
            arity(2)?;
            check(args[0].powf(args[1]))
        }
        "hypot" => {
            arity(2)?;
            check(args[0].hypot(args[1]))
        }
        "atan2" => {
            arity(2)?;
            check(args[0].atan2(args[1]))
        }
        _ => Err(format!("Unknown function '{name}'")),
    }
}
