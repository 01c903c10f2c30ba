//! Pre-execution validation of sandbox-bound Python source.
//!
//! Blocking problems (syntax, denied imports, size) abort before any sandbox
//! contact and come back as a `Validation Error: ...` string. Style findings
//! (uncalled definitions, computation with no print) are warnings prepended
//! to the eventual execution output.

use once_cell::sync::Lazy;
use regex::Regex;

/// Hard cap on submitted source length.
pub const MAX_CODE_LEN: usize = 5000;

/// Modules that never reach the sandbox.
const DENYLIST: &[&str] = &["os", "subprocess", "sys", "socket", "shutil", "pathlib"];
/// Modules explicitly cleared for execution.
const ALLOWLIST: &[&str] = &[
    "math",
    "json",
    "random",
    "datetime",
    "itertools",
    "functools",
    "re",
    "string",
    "hashlib",
];

static IMPORT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*(?:import|from)\s+([A-Za-z_][\w.]*)").unwrap());
static DEF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*(?:def|class)\s+([A-Za-z_]\w*)").unwrap());

/// Validation verdict: warnings to prepend, or the blocking error string.
pub fn validate_code(code: &str) -> Result<Vec<String>, String> {
    if code.trim().is_empty() {
        return Err("Validation Error: code is empty".to_string());
    }
    if code.len() > MAX_CODE_LEN {
        return Err(format!(
            "Validation Error: code is {} chars, limit is {MAX_CODE_LEN}",
            code.len()
        ));
    }

    check_syntax(code)?;
    check_imports(code)?;

    Ok(collect_warnings(code))
}

/// Line-level structural scan: unbalanced brackets and unterminated strings.
/// Not a full grammar; catches what the sandbox would reject immediately.
fn check_syntax(code: &str) -> Result<(), String> {
    let mut depth_stack: Vec<(char, usize)> = Vec::new();
    for (lineno, line) in code.lines().enumerate() {
        let lineno = lineno + 1;
        let mut chars = line.chars().peekable();
        let mut in_string: Option<char> = None;
        while let Some(c) = chars.next() {
            match in_string {
                Some(q) => {
                    if c == '\\' {
                        chars.next();
                    } else if c == q {
                        in_string = None;
                    }
                }
                None => match c {
                    '#' => break,
                    '"' | '\'' => in_string = Some(c),
                    '(' | '[' | '{' => depth_stack.push((c, lineno)),
                    ')' | ']' | '}' => {
                        let expected = match c {
                            ')' => '(',
                            ']' => '[',
                            _ => '{',
                        };
                        match depth_stack.pop() {
                            Some((open, _)) if open == expected => {}
                            _ => {
                                return Err(format!(
                                    "Validation Error: Syntax error — line {lineno}: unmatched '{c}'"
                                ))
                            }
                        }
                    }
                    _ => {}
                },
            }
        }
        if in_string.is_some() && !line.trim_start().starts_with("\"\"\"") {
            return Err(format!(
                "Validation Error: Syntax error — line {lineno}: unterminated string"
            ));
        }
    }
    if let Some((open, lineno)) = depth_stack.first() {
        return Err(format!(
            "Validation Error: Syntax error — line {lineno}: unclosed '{open}'"
        ));
    }
    Ok(())
}

fn check_imports(code: &str) -> Result<(), String> {
    for cap in IMPORT_RE.captures_iter(code) {
        let module = &cap[1];
        let root = module.split('.').next().unwrap_or(module);
        if DENYLIST.contains(&root) {
            return Err(format!(
                "Validation Error: import of '{root}' is blocked in the sandbox"
            ));
        }
        if !ALLOWLIST.contains(&root) {
            return Err(format!(
                "Validation Error: import of '{root}' is not in the allowed module list ({})",
                ALLOWLIST.join(", ")
            ));
        }
    }
    Ok(())
}

/// Non-blocking findings: defined-but-never-called functions/classes, and
/// computations that produce no printed output.
fn collect_warnings(code: &str) -> Vec<String> {
    let mut warnings = Vec::new();

    for cap in DEF_RE.captures_iter(code) {
        let name = cap[1].to_string();
        let def_count = code.matches(&format!("def {name}")).count()
            + code.matches(&format!("class {name}")).count();
        let use_count = code.matches(&format!("{name}(")).count();
        if use_count <= def_count {
            warnings.push(format!("Warning: '{name}' is defined but never called"));
        }
    }

    let has_computation = code
        .lines()
        .map(str::trim)
        .any(|l| !l.is_empty() && !l.starts_with('#') && l.contains('='));
    if has_computation && !code.contains("print(") {
        warnings.push("Warning: code computes values but prints nothing".to_string());
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn denied_import_is_blocked_before_sandbox() {
        let err = validate_code("import os\nprint(os.listdir('/'))").unwrap_err();
        assert!(err.starts_with("Validation Error:"));
        assert!(err.contains("os"));

        let err = validate_code("from subprocess import run").unwrap_err();
        assert!(err.contains("subprocess"));
    }

    #[test]
    fn dotted_deny_module_is_blocked_by_root() {
        let err = validate_code("from pathlib.abc import open_path").unwrap_err();
        assert!(err.contains("pathlib"));
    }

    #[test]
    fn allowlisted_imports_pass() {
        let code = "import math\nimport json\nprint(math.sqrt(json.loads('4')))";
        assert!(validate_code(code).is_ok());
    }

    #[test]
    fn unknown_module_is_rejected_with_allowlist_hint() {
        let err = validate_code("import requests\nprint(1)").unwrap_err();
        assert!(err.contains("requests"));
        assert!(err.contains("math"));
    }

    #[test]
    fn empty_and_oversize_code_are_rejected() {
        assert!(validate_code("  \n ").unwrap_err().contains("empty"));
        let big = "x = 1\n".repeat(1000);
        assert!(validate_code(&big).unwrap_err().contains("limit"));
    }

    #[test]
    fn unbalanced_brackets_report_line_numbers() {
        let err = validate_code("a = [1, 2\nprint(a)").unwrap_err();
        assert!(err.contains("Syntax error"));
        assert!(err.contains("line 1"));

        let err = validate_code("print(1))").unwrap_err();
        assert!(err.contains("unmatched ')'"));
    }

    #[test]
    fn unterminated_string_is_a_syntax_error() {
        let err = validate_code("s = 'unclosed\nprint(s)").unwrap_err();
        assert!(err.contains("unterminated string"));
        assert!(err.contains("line 1"));
    }

    #[test]
    fn strings_and_comments_do_not_confuse_the_bracket_scan() {
        let code = "s = '(('\n# comment with ]]]\nprint(s)";
        assert!(validate_code(code).is_ok());
    }

    #[test]
    fn uncalled_function_warns_without_blocking() {
        let warnings = validate_code("def helper():\n    return 1\nprint('hi')").unwrap();
        assert!(warnings.iter().any(|w| w.contains("helper")));
    }

    #[test]
    fn called_function_produces_no_warning() {
        let warnings = validate_code("def f():\n    return 2\nprint(f())").unwrap();
        assert!(warnings.is_empty());
    }

    #[test]
    fn silent_computation_warns() {
        let warnings = validate_code("x = 40 + 2").unwrap();
        assert!(warnings.iter().any(|w| w.contains("prints nothing")));
    }
}
