//! The basic tool set: safe arithmetic and small text utilities.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use super::Tool;

const MAX_TEXT_INPUT: usize = 2000;

fn require_input(input: &str) -> Result<&str, String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err("Error: input is empty".to_string());
    }
    if input.len() > MAX_TEXT_INPUT {
        return Err(format!(
            "Error: input is {} chars, limit is {MAX_TEXT_INPUT}",
            input.len()
        ));
    }
    Ok(trimmed)
}

/// Safe evaluator for one binary operation or a unary function call.
///
/// Grammar: `<number> <op> <number>` with ops `+ - * / // % **` (unicode
/// `×`, `÷`, `−` accepted), or `sqrt(x)` / `abs(x)`. Anything else is
/// rejected; there is no expression nesting and no names.
pub struct CalculatorTool;

static BINARY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(-?\d+(?:\.\d+)?)\s*(\*\*|//|[+\-*/%×÷−])\s*(-?\d+(?:\.\d+)?)$").unwrap()
});
static UNARY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(sqrt|abs)\s*\(\s*(-?\d+(?:\.\d+)?)\s*\)$").unwrap());

fn format_number(x: f64) -> String {
    if x.is_infinite() || x.is_nan() {
        x.to_string()
    } else if x.fract() == 0.0 && x.abs() < 1e15 {
        format!("{}", x as i64)
    } else {
        format!("{x}")
    }
}

fn evaluate(expr: &str) -> Result<f64, String> {
    if let Some(cap) = UNARY_RE.captures(expr) {
        let x: f64 = cap[2].parse().map_err(|_| "Error: not a number".to_string())?;
        return match &cap[1] {
            "sqrt" if x < 0.0 => Err("Error: sqrt of a negative number".to_string()),
            "sqrt" => Ok(x.sqrt()),
            _ => Ok(x.abs()),
        };
    }
    let Some(cap) = BINARY_RE.captures(expr) else {
        return Err(
            "Error: expected '<number> <op> <number>' with ops + - * / // % ** or sqrt(x), abs(x)"
                .to_string(),
        );
    };
    let a: f64 = cap[1].parse().map_err(|_| "Error: not a number".to_string())?;
    let b: f64 = cap[3].parse().map_err(|_| "Error: not a number".to_string())?;
    match &cap[2] {
        "+" => Ok(a + b),
        "-" | "−" => Ok(a - b),
        "*" | "×" => Ok(a * b),
        "/" | "÷" => {
            if b == 0.0 {
                Err("Error: division by zero".to_string())
            } else {
                Ok(a / b)
            }
        }
        "//" => {
            if b == 0.0 {
                Err("Error: division by zero".to_string())
            } else {
                Ok((a / b).floor())
            }
        }
        "%" => {
            if b == 0.0 {
                Err("Error: modulo by zero".to_string())
            } else {
                Ok(a.rem_euclid(b))
            }
        }
        "**" => Ok(a.powf(b)),
        _ => Err("Error: unsupported operator".to_string()),
    }
}

#[async_trait]
impl Tool for CalculatorTool {
    fn name(&self) -> &str {
        "Calculator"
    }

    fn description(&self) -> &str {
        "Evaluate one arithmetic operation, e.g. '15 * 23', '2 ** 10', 'sqrt(16)'"
    }

    async fn invoke(&self, input: &str) -> String {
        let expr = match require_input(input) {
            Ok(e) => e,
            Err(e) => return e,
        };
        match evaluate(expr) {
            Ok(x) => format_number(x),
            Err(e) => e,
        }
    }
}

pub struct StringLengthTool;

#[async_trait]
impl Tool for StringLengthTool {
    fn name(&self) -> &str {
        "StringLength"
    }

    fn description(&self) -> &str {
        "Count the characters in the input text"
    }

    async fn invoke(&self, input: &str) -> String {
        match require_input(input) {
            Ok(s) => s.chars().count().to_string(),
            Err(e) => e,
        }
    }
}

pub struct WordCountTool;

#[async_trait]
impl Tool for WordCountTool {
    fn name(&self) -> &str {
        "WordCount"
    }

    fn description(&self) -> &str {
        "Count whitespace-separated words in the input text"
    }

    async fn invoke(&self, input: &str) -> String {
        match require_input(input) {
            Ok(s) => s.split_whitespace().count().to_string(),
            Err(e) => e,
        }
    }
}

pub struct ReverseStringTool;

#[async_trait]
impl Tool for ReverseStringTool {
    fn name(&self) -> &str {
        "ReverseString"
    }

    fn description(&self) -> &str {
        "Reverse the input text"
    }

    async fn invoke(&self, input: &str) -> String {
        match require_input(input) {
            Ok(s) => s.chars().rev().collect(),
            Err(e) => e,
        }
    }
}

pub struct ToUppercaseTool;

#[async_trait]
impl Tool for ToUppercaseTool {
    fn name(&self) -> &str {
        "ToUppercase"
    }

    fn description(&self) -> &str {
        "Uppercase the input text"
    }

    async fn invoke(&self, input: &str) -> String {
        match require_input(input) {
            Ok(s) => s.to_uppercase(),
            Err(e) => e,
        }
    }
}

pub struct ExtractNumbersTool;

static NUMBER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"-?\d+(?:\.\d+)?").unwrap());

#[async_trait]
impl Tool for ExtractNumbersTool {
    fn name(&self) -> &str {
        "ExtractNumbers"
    }

    fn description(&self) -> &str {
        "List every number found in the input text"
    }

    async fn invoke(&self, input: &str) -> String {
        let s = match require_input(input) {
            Ok(s) => s,
            Err(e) => return e,
        };
        let numbers: Vec<&str> = NUMBER_RE.find_iter(s).map(|m| m.as_str()).collect();
        if numbers.is_empty() {
            "no numbers found".to_string()
        } else {
            numbers.join(", ")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn calculator_handles_all_operators() {
        let c = CalculatorTool;
        assert_eq!(c.invoke("15 * 23").await, "345");
        assert_eq!(c.invoke("7 + 3.5").await, "10.5");
        assert_eq!(c.invoke("10 - 4").await, "6");
        assert_eq!(c.invoke("9 / 2").await, "4.5");
        assert_eq!(c.invoke("9 // 2").await, "4");
        assert_eq!(c.invoke("9 % 4").await, "1");
        assert_eq!(c.invoke("2 ** 10").await, "1024");
        assert_eq!(c.invoke("sqrt(16)").await, "4");
        assert_eq!(c.invoke("abs(-3.5)").await, "3.5");
    }

    #[tokio::test]
    async fn calculator_accepts_unicode_operators() {
        let c = CalculatorTool;
        assert_eq!(c.invoke("6 × 7").await, "42");
        assert_eq!(c.invoke("84 ÷ 2").await, "42");
    }

    #[tokio::test]
    async fn calculator_rejects_expressions_outside_the_grammar() {
        let c = CalculatorTool;
        assert!(c.invoke("1 + 2 + 3").await.starts_with("Error:"));
        assert!(c.invoke("__import__('os')").await.starts_with("Error:"));
        assert!(c.invoke("x * 2").await.starts_with("Error:"));
        assert!(c.invoke("").await.starts_with("Error:"));
    }

    #[tokio::test]
    async fn calculator_guards_division_and_sqrt() {
        let c = CalculatorTool;
        assert!(c.invoke("1 / 0").await.contains("division by zero"));
        assert!(c.invoke("5 % 0").await.contains("modulo by zero"));
        assert!(c.invoke("sqrt(-1)").await.contains("negative"));
    }

    #[tokio::test]
    async fn text_tools_do_what_they_say() {
        assert_eq!(StringLengthTool.invoke("hello").await, "5");
        assert_eq!(WordCountTool.invoke("one two  three").await, "3");
        assert_eq!(ReverseStringTool.invoke("abc").await, "cba");
        assert_eq!(ToUppercaseTool.invoke("abc").await, "ABC");
        assert_eq!(
            ExtractNumbersTool.invoke("buy 3 apples for 4.50 at -2C").await,
            "3, 4.50, -2"
        );
        assert_eq!(ExtractNumbersTool.invoke("no digits").await, "no numbers found");
    }

    #[tokio::test]
    async fn empty_and_oversize_inputs_error() {
        assert!(WordCountTool.invoke("  ").await.starts_with("Error:"));
        let big = "x".repeat(MAX_TEXT_INPUT + 1);
        assert!(StringLengthTool.invoke(&big).await.starts_with("Error:"));
    }
}
