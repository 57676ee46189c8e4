//! Restricted arithmetic over physical-unit constants.
//!
//! Bin edges and other numeric configuration values may be written as
//! expressions such as `linspace(-5, 5, 11)*mm` or `[0, 0.5, 1]*MeV`. The
//! grammar is deliberately small:
//!
//! ```text
//! expr   := term (('+' | '-') term)*
//! term   := unary (('*' | '/') unary)*
//! unary  := ('-' | '+') unary | power
//! power  := atom ('**' unary)?
//! atom   := number | ident | ident '(' args ')' | '(' expr ')' | '[' args ']'
//! ```
//!
//! Identifiers resolve through [`UnitTable`] and nothing else. The array
//! constructors are `linspace`, `arange` and `logspace`, optionally written
//! with an `np.` prefix. `compton_edge` and `gamma_from_edge` convert
//! between a photon energy and its Compton edge, element-wise. Arithmetic
//! broadcasts scalars over arrays; two arrays must have the same length.
//! Nesting is bounded by [`MAX_DEPTH`].

use edep_types::UnitTable;
use edep_types::kinematics::{compton_edge, gamma_from_edge};

/// Upper bound on the length of any array an expression may build.
pub const MAX_ELEMENTS: usize = 1_000_000;

/// Upper bound on nested parentheses, brackets, calls and unary operators.
pub const MAX_DEPTH: usize = 256;

/// Errors from tokenizing, parsing or evaluating an expression.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExprError {
    /// A character that starts no token.
    #[error("unexpected character {found:?} at offset {offset}")]
    UnexpectedChar {
        /// Byte offset into the source.
        offset: usize,
        /// The offending character.
        found: char,
    },

    /// A token that does not fit the grammar here.
    #[error("unexpected {found} at offset {offset}")]
    UnexpectedToken {
        /// Byte offset into the source.
        offset: usize,
        /// Description of the token.
        found: String,
    },

    /// The expression stopped early.
    #[error("unexpected end of expression")]
    UnexpectedEnd,

    /// A numeric literal that does not parse.
    #[error("invalid number {0:?}")]
    InvalidNumber(String),

    /// An identifier that is not a known unit or constant.
    #[error("unknown identifier {0:?}")]
    UnknownIdentifier(String),

    /// A call to anything other than the supported array constructors.
    #[error("unknown function {0:?}")]
    UnknownFunction(String),

    /// Wrong number of arguments to a function.
    #[error("{function} takes {expected} argument(s), got {actual}")]
    Arity {
        /// Function name.
        function: &'static str,
        /// Accepted argument counts.
        expected: &'static str,
        /// Supplied argument count.
        actual: usize,
    },

    /// A function argument that must be a scalar was an array.
    #[error("{function} expects scalar arguments")]
    NotScalar {
        /// Function name.
        function: &'static str,
    },

    /// A count argument that is negative, fractional or not finite.
    #[error("{function} count must be a non-negative integer, got {value}")]
    InvalidCount {
        /// Function name.
        function: &'static str,
        /// The offending value.
        value: f64,
    },

    /// `arange` with a zero step.
    #[error("arange step must be non-zero")]
    ZeroStep,

    /// An array would exceed [`MAX_ELEMENTS`].
    #[error("array of {0} elements exceeds the limit")]
    TooLarge(usize),

    /// The expression nests deeper than [`MAX_DEPTH`].
    #[error("expression nests deeper than {0} levels")]
    TooDeep(usize),

    /// Element-wise arithmetic on arrays of different lengths.
    #[error("cannot combine arrays of length {left} and {right}")]
    ShapeMismatch {
        /// Left operand length.
        left: usize,
        /// Right operand length.
        right: usize,
    },

    /// An array was required but the expression produced a scalar.
    #[error("expected an array, got the scalar {0}")]
    ExpectedArray(f64),

    /// A scalar was required but the expression produced an array.
    #[error("expected a scalar, got an array of {0} elements")]
    ExpectedScalar(usize),
}

/// The result of evaluating an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// A single number.
    Scalar(f64),
    /// A one-dimensional array.
    Array(Vec<f64>),
}

impl Value {
    /// The value as a scalar.
    ///
    /// # Errors
    ///
    /// Returns [`ExprError::ExpectedScalar`] for an array.
    pub fn into_scalar(self) -> Result<f64, ExprError> {
        match self {
            Self::Scalar(x) => Ok(x),
            Self::Array(values) => Err(ExprError::ExpectedScalar(values.len())),
        }
    }

    /// The value as an array.
    ///
    /// # Errors
    ///
    /// Returns [`ExprError::ExpectedArray`] for a scalar.
    pub fn into_array(self) -> Result<Vec<f64>, ExprError> {
        match self {
            Self::Array(values) => Ok(values),
            Self::Scalar(x) => Err(ExprError::ExpectedArray(x)),
        }
    }
}

/// Evaluate an expression.
pub fn evaluate(source: &str) -> Result<Value, ExprError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
        units: UnitTable::new(),
    };
    let value = parser.expr()?;
    match parser.peek() {
        None => Ok(value),
        Some((offset, token)) => Err(ExprError::UnexpectedToken {
            offset: *offset,
            found: token.describe(),
        }),
    }
}

/// Evaluate an expression that must produce a scalar.
pub fn evaluate_scalar(source: &str) -> Result<f64, ExprError> {
    evaluate(source)?.into_scalar()
}

/// Evaluate an expression that must produce an array.
pub fn evaluate_array(source: &str) -> Result<Vec<f64>, ExprError> {
    evaluate(source)?.into_array()
}

// ---------------------------------------------------------------------------
// Tokenizer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    StarStar,
    Slash,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Self::Number(x) => format!("number {x}"),
            Self::Ident(name) => format!("identifier {name:?}"),
            Self::Plus => "'+'".to_owned(),
            Self::Minus => "'-'".to_owned(),
            Self::Star => "'*'".to_owned(),
            Self::StarStar => "'**'".to_owned(),
            Self::Slash => "'/'".to_owned(),
            Self::LParen => "'('".to_owned(),
            Self::RParen => "')'".to_owned(),
            Self::LBracket => "'['".to_owned(),
            Self::RBracket => "']'".to_owned(),
            Self::Comma => "','".to_owned(),
        }
    }
}

fn tokenize(source: &str) -> Result<Vec<(usize, Token)>, ExprError> {
    let mut tokens = Vec::new();
    let mut chars = source.char_indices().peekable();

    while let Some(&(offset, c)) = chars.peek() {
        let token = match c {
            c if c.is_whitespace() => {
                chars.next();
                continue;
            }
            '0'..='9' | '.' => {
                let mut text = String::new();
                let mut prev = '\0';
                while let Some(&(_, d)) = chars.peek() {
                    let exponent_sign = (d == '+' || d == '-') && (prev == 'e' || prev == 'E');
                    if d.is_ascii_digit() || d == '.' || d == 'e' || d == 'E' || exponent_sign {
                        text.push(d);
                        prev = d;
                        chars.next();
                    } else {
                        break;
                    }
                }
                let Ok(value) = text.parse::<f64>() else {
                    return Err(ExprError::InvalidNumber(text));
                };
                Token::Number(value)
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut name = String::new();
                while let Some(&(_, d)) = chars.peek() {
                    if d.is_ascii_alphanumeric() || d == '_' || d == '.' {
                        name.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                Token::Ident(name)
            }
            '*' => {
                chars.next();
                if chars.peek().is_some_and(|&(_, d)| d == '*') {
                    chars.next();
                    Token::StarStar
                } else {
                    Token::Star
                }
            }
            _ => {
                chars.next();
                match c {
                    '+' => Token::Plus,
                    '-' => Token::Minus,
                    '/' => Token::Slash,
                    '(' => Token::LParen,
                    ')' => Token::RParen,
                    '[' => Token::LBracket,
                    ']' => Token::RBracket,
                    ',' => Token::Comma,
                    found => return Err(ExprError::UnexpectedChar { offset, found }),
                }
            }
        };
        tokens.push((offset, token));
    }
    Ok(tokens)
}

// ---------------------------------------------------------------------------
// Parser / evaluator
// ---------------------------------------------------------------------------

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
    depth: usize,
    units: UnitTable,
}

impl Parser {
    fn peek(&self) -> Option<&(usize, Token)> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<(usize, Token)> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos = self.pos.saturating_add(1);
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek().is_some_and(|(_, t)| t == expected) {
            self.pos = self.pos.saturating_add(1);
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token) -> Result<(), ExprError> {
        match self.advance() {
            Some((_, ref t)) if t == expected => Ok(()),
            Some((offset, t)) => Err(ExprError::UnexpectedToken {
                offset,
                found: t.describe(),
            }),
            None => Err(ExprError::UnexpectedEnd),
        }
    }

    fn expr(&mut self) -> Result<Value, ExprError> {
        let mut value = self.term()?;
        loop {
            if self.eat(&Token::Plus) {
                value = combine(value, self.term()?, |a, b| a + b)?;
            } else if self.eat(&Token::Minus) {
                value = combine(value, self.term()?, |a, b| a - b)?;
            } else {
                return Ok(value);
            }
        }
    }

    fn term(&mut self) -> Result<Value, ExprError> {
        let mut value = self.unary()?;
        loop {
            if self.eat(&Token::Star) {
                value = combine(value, self.unary()?, |a, b| a * b)?;
            } else if self.eat(&Token::Slash) {
                value = combine(value, self.unary()?, |a, b| a / b)?;
            } else {
                return Ok(value);
            }
        }
    }

    /// Every recursive path of the grammar passes through here, so this is
    /// where nesting is counted.
    fn unary(&mut self) -> Result<Value, ExprError> {
        if self.depth >= MAX_DEPTH {
            return Err(ExprError::TooDeep(MAX_DEPTH));
        }
        self.depth = self.depth.saturating_add(1);
        let value = self.signed();
        self.depth = self.depth.saturating_sub(1);
        value
    }

    fn signed(&mut self) -> Result<Value, ExprError> {
        if self.eat(&Token::Minus) {
            return Ok(map(self.unary()?, |x| -x));
        }
        if self.eat(&Token::Plus) {
            return self.unary();
        }
        self.power()
    }

    fn power(&mut self) -> Result<Value, ExprError> {
        let base = self.atom()?;
        if self.eat(&Token::StarStar) {
            let exponent = self.unary()?;
            return combine(base, exponent, f64::powf);
        }
        Ok(base)
    }

    fn atom(&mut self) -> Result<Value, ExprError> {
        let Some((offset, token)) = self.advance() else {
            return Err(ExprError::UnexpectedEnd);
        };
        match token {
            Token::Number(x) => Ok(Value::Scalar(x)),
            Token::LParen => {
                let value = self.expr()?;
                self.expect(&Token::RParen)?;
                Ok(value)
            }
            Token::LBracket => {
                let items = self.args(&Token::RBracket)?;
                let values = items
                    .into_iter()
                    .map(Value::into_scalar)
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::Array(values))
            }
            Token::Ident(name) => {
                if self.eat(&Token::LParen) {
                    let args = self.args(&Token::RParen)?;
                    call(&name, args)
                } else {
                    self.units
                        .lookup(&name)
                        .map(Value::Scalar)
                        .ok_or(ExprError::UnknownIdentifier(name))
                }
            }
            other => Err(ExprError::UnexpectedToken {
                offset,
                found: other.describe(),
            }),
        }
    }

    /// Comma-separated expressions up to and including `close`.
    fn args(&mut self, close: &Token) -> Result<Vec<Value>, ExprError> {
        let mut items = Vec::new();
        if self.eat(close) {
            return Ok(items);
        }
        loop {
            items.push(self.expr()?);
            if self.eat(close) {
                return Ok(items);
            }
            self.expect(&Token::Comma)?;
            // Trailing comma.
            if self.eat(close) {
                return Ok(items);
            }
        }
    }
}

fn map(value: Value, f: impl Fn(f64) -> f64) -> Value {
    match value {
        Value::Scalar(x) => Value::Scalar(f(x)),
        Value::Array(values) => Value::Array(values.into_iter().map(f).collect()),
    }
}

fn combine(left: Value, right: Value, f: impl Fn(f64, f64) -> f64) -> Result<Value, ExprError> {
    Ok(match (left, right) {
        (Value::Scalar(a), Value::Scalar(b)) => Value::Scalar(f(a, b)),
        (Value::Array(a), Value::Scalar(b)) => Value::Array(a.into_iter().map(|x| f(x, b)).collect()),
        (Value::Scalar(a), Value::Array(b)) => Value::Array(b.into_iter().map(|x| f(a, x)).collect()),
        (Value::Array(a), Value::Array(b)) => {
            if a.len() != b.len() {
                return Err(ExprError::ShapeMismatch {
                    left: a.len(),
                    right: b.len(),
                });
            }
            Value::Array(a.into_iter().zip(b).map(|(x, y)| f(x, y)).collect())
        }
    })
}

// ---------------------------------------------------------------------------
// Array constructors
// ---------------------------------------------------------------------------

fn call(name: &str, args: Vec<Value>) -> Result<Value, ExprError> {
    let function = name.strip_prefix("np.").unwrap_or(name);
    match function {
        "linspace" => {
            let [start, stop, num] = scalars::<3>("linspace", args)?;
            let num = count("linspace", num)?;
            Ok(Value::Array(linspace(start, stop, num)))
        }
        "logspace" => {
            let [start, stop, num] = scalars::<3>("logspace", args)?;
            let num = count("logspace", num)?;
            let values = linspace(start, stop, num)
                .into_iter()
                .map(|e| 10f64.powf(e))
                .collect();
            Ok(Value::Array(values))
        }
        "arange" => {
            let (start, stop, step) = match args.len() {
                1 => {
                    let [stop] = scalars::<1>("arange", args)?;
                    (0.0, stop, 1.0)
                }
                2 => {
                    let [start, stop] = scalars::<2>("arange", args)?;
                    (start, stop, 1.0)
                }
                _ => {
                    let [start, stop, step] = scalars::<3>("arange", args)?;
                    (start, stop, step)
                }
            };
            arange(start, stop, step).map(Value::Array)
        }
        "compton_edge" => Ok(map(single("compton_edge", args)?, compton_edge)),
        "gamma_from_edge" => Ok(map(single("gamma_from_edge", args)?, gamma_from_edge)),
        _ => Err(ExprError::UnknownFunction(name.to_owned())),
    }
}

/// The only argument of a one-argument function, scalar or array.
fn single(function: &'static str, args: Vec<Value>) -> Result<Value, ExprError> {
    let actual = args.len();
    let mut args = args.into_iter();
    match (args.next(), args.next()) {
        (Some(value), None) => Ok(value),
        _ => Err(ExprError::Arity {
            function,
            expected: "1",
            actual,
        }),
    }
}

fn scalars<const N: usize>(function: &'static str, args: Vec<Value>) -> Result<[f64; N], ExprError> {
    let actual = args.len();
    let values = args
        .into_iter()
        .map(|v| match v {
            Value::Scalar(x) => Ok(x),
            Value::Array(_) => Err(ExprError::NotScalar { function }),
        })
        .collect::<Result<Vec<_>, _>>()?;
    let Ok(values) = <[f64; N]>::try_from(values) else {
        return Err(ExprError::Arity {
            function,
            expected: match N {
                1 => "1",
                2 => "2",
                _ => "3",
            },
            actual,
        });
    };
    Ok(values)
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]
fn count(function: &'static str, value: f64) -> Result<usize, ExprError> {
    if !value.is_finite() || value < 0.0 || value.fract() != 0.0 {
        return Err(ExprError::InvalidCount { function, value });
    }
    if value > MAX_ELEMENTS as f64 {
        return Err(ExprError::TooLarge(value as usize));
    }
    Ok(value as usize)
}

#[allow(clippy::cast_precision_loss)]
fn linspace(start: f64, stop: f64, num: usize) -> Vec<f64> {
    match num {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let intervals = num.saturating_sub(1) as f64;
            let step = (stop - start) / intervals;
            let mut values: Vec<f64> = (0..num).map(|i| (i as f64).mul_add(step, start)).collect();
            if let Some(last) = values.last_mut() {
                *last = stop;
            }
            values
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn arange(start: f64, stop: f64, step: f64) -> Result<Vec<f64>, ExprError> {
    if step == 0.0 {
        return Err(ExprError::ZeroStep);
    }
    let span = ((stop - start) / step).ceil().max(0.0);
    let num = count("arange", span)?;
    Ok((0..num).map(|i| (i as f64).mul_add(step, start)).collect())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use approx::assert_relative_eq;
    use edep_types::units::{DEGREE, KEV, MEV};

    use super::*;

    fn array(source: &str) -> Vec<f64> {
        evaluate_array(source).unwrap()
    }

    #[test]
    fn precedence_and_power() {
        assert_relative_eq!(evaluate_scalar("1 + 2 * 3").unwrap(), 7.0);
        assert_relative_eq!(evaluate_scalar("(1 + 2) * 3").unwrap(), 9.0);
        assert_relative_eq!(evaluate_scalar("-2**2").unwrap(), -4.0);
        assert_relative_eq!(evaluate_scalar("2**-1").unwrap(), 0.5);
        assert_relative_eq!(evaluate_scalar("2**3**2").unwrap(), 512.0);
        assert_relative_eq!(evaluate_scalar("1e-3 * 2.5E2").unwrap(), 0.25);
    }

    #[test]
    fn units_resolve_through_table() {
        assert_relative_eq!(evaluate_scalar("10*keV").unwrap(), 10.0 * KEV);
        assert_relative_eq!(evaluate_scalar("90*deg").unwrap(), 90.0 * DEGREE);
        assert_relative_eq!(evaluate_scalar("2.5*cm").unwrap(), 25.0);
    }

    #[test]
    fn linspace_includes_both_ends() {
        let edges = array("linspace(-5, 5, 11)*mm");
        assert_eq!(edges.len(), 11);
        assert_relative_eq!(edges[0], -5.0);
        assert_relative_eq!(edges[5], 0.0, epsilon = 1e-12);
        assert_relative_eq!(edges[10], 5.0);
    }

    #[test]
    fn numpy_prefix_is_accepted() {
        assert_eq!(array("np.linspace(0, 1, 3)"), array("linspace(0, 1, 3)"));
    }

    #[test]
    fn arange_excludes_stop() {
        assert_eq!(array("arange(0, 1, 0.25)"), vec![0.0, 0.25, 0.5, 0.75]);
        assert_eq!(array("arange(3)"), vec![0.0, 1.0, 2.0]);
        assert!(array("arange(5, 0)").is_empty());
        assert_eq!(evaluate("arange(0, 1, 0)"), Err(ExprError::ZeroStep));
    }

    #[test]
    fn logspace_is_powers_of_ten() {
        let values = array("logspace(-1, 1, 3)*MeV");
        assert_relative_eq!(values[0], 0.1 * MEV, epsilon = 1e-12);
        assert_relative_eq!(values[1], 1.0 * MEV);
        assert_relative_eq!(values[2], 10.0 * MEV);
    }

    #[test]
    fn list_literals_broadcast() {
        assert_eq!(array("[0, 1, 2]*cm"), vec![0.0, 10.0, 20.0]);
        assert_eq!(array("[1, 2] + [10, 20]"), vec![11.0, 22.0]);
        assert_eq!(array("[1, 2,]"), vec![1.0, 2.0]);
        assert_eq!(
            evaluate("[1, 2] + [1, 2, 3]"),
            Err(ExprError::ShapeMismatch { left: 2, right: 3 })
        );
    }

    #[test]
    fn rejects_unknown_names() {
        assert_eq!(
            evaluate("3*furlong"),
            Err(ExprError::UnknownIdentifier("furlong".to_owned()))
        );
        assert_eq!(
            evaluate("os.system(1)"),
            Err(ExprError::UnknownFunction("os.system".to_owned()))
        );
    }

    #[test]
    fn rejects_malformed_input() {
        assert_eq!(evaluate("1 +"), Err(ExprError::UnexpectedEnd));
        assert!(matches!(evaluate("1 2"), Err(ExprError::UnexpectedToken { offset: 2, .. })));
        assert!(matches!(evaluate("1 % 2"), Err(ExprError::UnexpectedChar { found: '%', .. })));
        assert!(matches!(
            evaluate("linspace(0, 1, 2.5)"),
            Err(ExprError::InvalidCount { .. })
        ));
        assert!(matches!(evaluate("linspace(0, 1)"), Err(ExprError::Arity { actual: 2, .. })));
        assert!(matches!(
            evaluate("linspace(0, 1, 1e9)"),
            Err(ExprError::TooLarge(_))
        ));
    }

    #[test]
    fn compton_helpers_map_elementwise() {
        assert_relative_eq!(
            evaluate_scalar("compton_edge(661.657*keV)").unwrap(),
            0.477_334,
            max_relative = 1e-4
        );
        let gammas = array("gamma_from_edge(compton_edge([0.5, 1.0]*MeV))");
        assert_relative_eq!(gammas[0], 0.5, max_relative = 1e-12);
        assert_relative_eq!(gammas[1], 1.0, max_relative = 1e-12);
        assert!(matches!(
            evaluate("compton_edge(1, 2)"),
            Err(ExprError::Arity { function: "compton_edge", actual: 2, .. })
        ));
    }

    #[test]
    fn nesting_is_bounded() {
        let parens = format!("{}1{}", "(".repeat(200_000), ")".repeat(200_000));
        assert_eq!(evaluate(&parens), Err(ExprError::TooDeep(MAX_DEPTH)));

        let negations = format!("{}1", "-".repeat(200_000));
        assert_eq!(evaluate(&negations), Err(ExprError::TooDeep(MAX_DEPTH)));

        let brackets = format!("{}1{}", "[".repeat(10_000), "]".repeat(10_000));
        assert_eq!(evaluate(&brackets), Err(ExprError::TooDeep(MAX_DEPTH)));

        let shallow = format!("{}1{}", "(".repeat(100), ")".repeat(100));
        assert_relative_eq!(evaluate_scalar(&shallow).unwrap(), 1.0);
        assert_relative_eq!(evaluate_scalar("--1").unwrap(), 1.0);
    }

    #[test]
    fn shape_requirements() {
        assert_eq!(evaluate_array("3"), Err(ExprError::ExpectedArray(3.0)));
        assert_eq!(evaluate_scalar("[1, 2]"), Err(ExprError::ExpectedScalar(2)));
    }
}
