//! Math markup flattening.
//!
//! `normalize` turns LaTeX-style markup (as produced by the editable math
//! field) into a plain-text form that can be compared character by character.
//! The passes run in a fixed order: structural expansion, symbol
//! substitution, escape stripping, whitespace collapse.

use lazy_static::lazy_static;
use regex::{Captures, Regex};

/// Marker inserted by [`scaffold`] in place of the hidden part of an answer.
pub const BLANK_MARKER: &str = "___";

lazy_static! {
    static ref COMMAND_RE: Regex = Regex::new(r"\\([A-Za-z]+)").unwrap();
    static ref NUMBER_RE: Regex = Regex::new(r"-?\d+(?:\.\d+)?").unwrap();
    static ref DIGIT_RUN_RE: Regex = Regex::new(r"\d+(?:\.\d+)?").unwrap();
}

const SYMBOLS: &[(&str, &str)] = &[
    // Greek, lower case
    ("alpha", "α"),
    ("beta", "β"),
    ("gamma", "γ"),
    ("delta", "δ"),
    ("epsilon", "ε"),
    ("varepsilon", "ε"),
    ("zeta", "ζ"),
    ("eta", "η"),
    ("theta", "θ"),
    ("vartheta", "ϑ"),
    ("iota", "ι"),
    ("kappa", "κ"),
    ("lambda", "λ"),
    ("mu", "μ"),
    ("nu", "ν"),
    ("xi", "ξ"),
    ("pi", "π"),
    ("rho", "ρ"),
    ("sigma", "σ"),
    ("tau", "τ"),
    ("upsilon", "υ"),
    ("phi", "φ"),
    ("varphi", "φ"),
    ("chi", "χ"),
    ("psi", "ψ"),
    ("omega", "ω"),
    // Greek, upper case
    ("Gamma", "Γ"),
    ("Delta", "Δ"),
    ("Theta", "Θ"),
    ("Lambda", "Λ"),
    ("Xi", "Ξ"),
    ("Pi", "Π"),
    ("Sigma", "Σ"),
    ("Phi", "Φ"),
    ("Psi", "Ψ"),
    ("Omega", "Ω"),
    // Operators and relations
    ("cdot", "·"),
    ("times", "×"),
    ("div", "÷"),
    ("pm", "±"),
    ("mp", "∓"),
    ("leq", "≤"),
    ("le", "≤"),
    ("geq", "≥"),
    ("ge", "≥"),
    ("neq", "≠"),
    ("ne", "≠"),
    ("approx", "≈"),
    ("infty", "∞"),
    ("degree", "°"),
    ("circ", "°"),
    ("to", "→"),
    ("rightarrow", "→"),
    ("Rightarrow", "⇒"),
    ("angle", "∠"),
    ("perp", "⊥"),
    ("parallel", "∥"),
    ("triangle", "△"),
    ("in", "∈"),
    ("cup", "∪"),
    ("cap", "∩"),
    ("emptyset", "∅"),
    ("sum", "∑"),
    ("prod", "∏"),
    ("int", "∫"),
    ("partial", "∂"),
    ("ldots", "…"),
    ("cdots", "⋯"),
];

/// Commands whose single group argument is kept as plain text.
const TEXT_COMMANDS: &[&str] = &[
    "text",
    "textrm",
    "mathrm",
    "mathbf",
    "mathit",
    "operatorname",
];

/// Commands that carry no content of their own.
const SIZING_COMMANDS: &[&str] = &["left", "right", "displaystyle", "big", "Big"];

/// Flattens math markup into a comparable plain-text form. Never fails.
pub fn normalize(markup: &str) -> String {
    let expanded = expand_structures(markup);
    let substituted = substitute_symbols(&expanded);
    let stripped = strip_escapes(&substituted);
    collapse_whitespace(&stripped)
}

/// Builds a partially blanked version of a correct answer.
///
/// Exactly one [`BLANK_MARKER`] is introduced: over the last standalone
/// numeric literal, else over the last number on the right of `=`, else over
/// the whole right-hand side (appending ` = ___` when there is none).
pub fn scaffold(correct_answer_markup: &str) -> String {
    let normalized = normalize(correct_answer_markup);

    if let Some((start, end)) = last_standalone_number(&normalized) {
        return splice_blank(&normalized, start, end);
    }

    if let Some(eq) = normalized.find('=') {
        let (lhs, rhs) = normalized.split_at(eq + 1);
        if let Some(number) = DIGIT_RUN_RE.find_iter(rhs).last() {
            let offset = lhs.len();
            return splice_blank(&normalized, offset + number.start(), offset + number.end());
        }
        return format!("{} {}", lhs.trim_end(), BLANK_MARKER);
    }

    if normalized.is_empty() {
        return format!("= {}", BLANK_MARKER);
    }
    format!("{} = {}", normalized, BLANK_MARKER)
}

fn splice_blank(text: &str, start: usize, end: usize) -> String {
    format!("{}{}{}", &text[..start], BLANK_MARKER, &text[end..])
}

/// Byte range of the last number that is not glued to a letter or digit.
fn last_standalone_number(text: &str) -> Option<(usize, usize)> {
    NUMBER_RE
        .find_iter(text)
        .filter_map(|m| {
            let mut start = m.start();
            if text[start..].starts_with('-') && !is_unary_minus(&text[..start]) {
                start += 1;
            }
            let before = text[..start].chars().next_back();
            let after = text[m.end()..].chars().next();
            let glued = |c: Option<char>| c.is_some_and(|c| c.is_alphanumeric() || c == '.');
            if glued(before) || glued(after) {
                None
            } else {
                Some((start, m.end()))
            }
        })
        .last()
}

/// A minus is unary when nothing operand-like precedes it.
fn is_unary_minus(prefix: &str) -> bool {
    match prefix.trim_end().chars().next_back() {
        None => true,
        Some(c) => !(c.is_alphanumeric() || matches!(c, ')' | ']' | '}' | '.')),
    }
}

// ---------------------------------------------------------------------------
// Pass 1: structural markup
// ---------------------------------------------------------------------------

fn expand_structures(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '\\' => {
                let (name, next) = read_command_name(&chars, i + 1);
                if name.is_empty() {
                    // Non-letter escape such as `\,` or `\_`: keep the pair for pass 3.
                    out.push('\\');
                    if let Some(&escaped) = chars.get(i + 1) {
                        out.push(escaped);
                    }
                    i += 2;
                    continue;
                }
                i = next;
                match name.as_str() {
                    "frac" | "dfrac" | "tfrac" => {
                        let (numerator, next) = read_group(&chars, i, false);
                        let (denominator, next) = read_group(&chars, next, false);
                        i = next;
                        out.push_str(&format!(
                            "({})/({})",
                            expand_structures(&numerator),
                            expand_structures(&denominator)
                        ));
                    }
                    "sqrt" => {
                        let (index, next) = read_root_index(&chars, i);
                        let (radicand, next) = read_group(&chars, next, false);
                        i = next;
                        if let Some(index) = index {
                            let index = normalize(&index);
                            match to_script(&index, SUPERSCRIPTS) {
                                Some(sup) => out.push_str(&sup),
                                None => out.push_str(&format!("({})", index)),
                            }
                        }
                        out.push_str(&format!("√({})", expand_structures(&radicand)));
                    }
                    cmd if TEXT_COMMANDS.contains(&cmd) => {
                        let (body, next) = read_group(&chars, i, false);
                        i = next;
                        out.push_str(&expand_structures(&body));
                    }
                    cmd if SIZING_COMMANDS.contains(&cmd) => {
                        // `\left.` / `\right.` are invisible delimiters.
                        if chars.get(i) == Some(&'.') {
                            i += 1;
                        }
                    }
                    _ => {
                        out.push('\\');
                        out.push_str(&name);
                    }
                }
            }
            marker @ ('^' | '_') => {
                let (body, next) = read_group(&chars, i + 1, true);
                i = next;
                let body = normalize(&body);
                let table = if marker == '^' { SUPERSCRIPTS } else { SUBSCRIPTS };
                match to_script(&body, table) {
                    Some(script) => out.push_str(&script),
                    None if body.is_empty() => {}
                    None => out.push_str(&format!("{}({})", marker, body)),
                }
            }
            c => {
                out.push(c);
                i += 1;
            }
        }
    }

    out
}

fn read_command_name(chars: &[char], start: usize) -> (String, usize) {
    let mut end = start;
    while end < chars.len() && chars[end].is_ascii_alphabetic() {
        end += 1;
    }
    (chars[start..end].iter().collect(), end)
}

/// Reads one argument: a braced group, a command token or a single character.
/// Script arguments additionally accept a parenthesized group.
fn read_group(chars: &[char], start: usize, allow_parens: bool) -> (String, usize) {
    let mut i = start;
    while i < chars.len() && chars[i].is_whitespace() {
        i += 1;
    }
    match chars.get(i) {
        None => (String::new(), i),
        Some('{') => read_balanced(chars, i, '{', '}'),
        Some('(') if allow_parens => read_balanced(chars, i, '(', ')'),
        Some('\\') => {
            let (name, next) = read_command_name(chars, i + 1);
            if name.is_empty() {
                let end = (i + 2).min(chars.len());
                (chars[i..end].iter().collect(), end)
            } else {
                (format!("\\{}", name), next)
            }
        }
        Some(&c) => (c.to_string(), i + 1),
    }
}

fn read_root_index(chars: &[char], start: usize) -> (Option<String>, usize) {
    let mut i = start;
    while i < chars.len() && chars[i].is_whitespace() {
        i += 1;
    }
    if chars.get(i) == Some(&'[') {
        let (index, next) = read_balanced(chars, i, '[', ']');
        (Some(index), next)
    } else {
        (None, start)
    }
}

/// Returns the text between `open` at `start` and its matching `close`.
/// An unterminated group swallows the rest of the input.
fn read_balanced(chars: &[char], start: usize, open: char, close: char) -> (String, usize) {
    let mut depth = 0usize;
    let mut i = start;
    while i < chars.len() {
        let c = chars[i];
        if c == open {
            depth += 1;
        } else if c == close {
            depth -= 1;
            if depth == 0 {
                return (chars[start + 1..i].iter().collect(), i + 1);
            }
        }
        i += 1;
    }
    (chars[start + 1..].iter().collect(), chars.len())
}

const SUPERSCRIPTS: &[(char, char)] = &[
    ('0', '⁰'),
    ('1', '¹'),
    ('2', '²'),
    ('3', '³'),
    ('4', '⁴'),
    ('5', '⁵'),
    ('6', '⁶'),
    ('7', '⁷'),
    ('8', '⁸'),
    ('9', '⁹'),
    ('+', '⁺'),
    ('-', '⁻'),
    ('−', '⁻'),
    ('=', '⁼'),
    ('(', '⁽'),
    (')', '⁾'),
    ('n', 'ⁿ'),
    ('i', 'ⁱ'),
    ('°', '°'),
];

const SUBSCRIPTS: &[(char, char)] = &[
    ('0', '₀'),
    ('1', '₁'),
    ('2', '₂'),
    ('3', '₃'),
    ('4', '₄'),
    ('5', '₅'),
    ('6', '₆'),
    ('7', '₇'),
    ('8', '₈'),
    ('9', '₉'),
    ('+', '₊'),
    ('-', '₋'),
    ('=', '₌'),
    ('(', '₍'),
    (')', '₎'),
    ('a', 'ₐ'),
    ('e', 'ₑ'),
    ('o', 'ₒ'),
    ('x', 'ₓ'),
    ('i', 'ᵢ'),
    ('j', 'ⱼ'),
    ('k', 'ₖ'),
    ('m', 'ₘ'),
    ('n', 'ₙ'),
];

/// Maps every character to its script glyph, or `None` if any has no glyph.
fn to_script(body: &str, table: &[(char, char)]) -> Option<String> {
    let compact: Vec<char> = body.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return None;
    }
    compact
        .into_iter()
        .map(|c| {
            table
                .iter()
                .find(|(plain, _)| *plain == c)
                .map(|(_, glyph)| *glyph)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Passes 2-4
// ---------------------------------------------------------------------------

fn substitute_symbols(input: &str) -> String {
    COMMAND_RE
        .replace_all(input, |caps: &Captures| {
            SYMBOLS
                .iter()
                .find(|(name, _)| *name == &caps[1])
                .map(|(_, glyph)| glyph.to_string())
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

fn strip_escapes(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.peek().copied() {
                Some(next) if next.is_ascii_alphabetic() => {}
                Some(',' | ';' | ':' | '!' | ' ' | '\\') => {
                    chars.next();
                    out.push(' ');
                }
                Some('{' | '}') => {
                    chars.next();
                }
                Some(next) => {
                    chars.next();
                    out.push(next);
                }
                None => {}
            },
            '{' | '}' => {}
            _ => out.push(c),
        }
    }

    out
}

fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_fractions_roots_and_scripts() {
        assert_eq!(normalize(r"\frac{1}{2}"), "(1)/(2)");
        assert_eq!(normalize(r"\dfrac{x+1}{3}"), "(x+1)/(3)");
        assert_eq!(normalize(r"\sqrt{x+1}"), "√(x+1)");
        assert_eq!(normalize(r"\sqrt[3]{8}"), "³√(8)");
        assert_eq!(normalize("x^{2} + 3x"), "x² + 3x");
        assert_eq!(normalize("x^2"), "x²");
        assert_eq!(normalize("a_{1} + a_2"), "a₁ + a₂");
    }

    #[test]
    fn nested_structures_are_flattened_recursively() {
        assert_eq!(normalize(r"\frac{x^2}{\sqrt{y}}"), "(x²)/(√(y))");
        assert_eq!(normalize(r"\frac{\frac{1}{2}}{4}"), "((1)/(2))/(4)");
    }

    #[test]
    fn parenthesized_and_braced_exponents_agree() {
        assert_eq!(normalize("x^(n+1)"), normalize("x^{n + 1}"));
        assert_eq!(normalize("x^{n+1}"), "xⁿ⁺¹");
    }

    #[test]
    fn unmappable_exponent_keeps_parentheses() {
        assert_eq!(normalize("e^{kt}"), "e^(kt)");
    }

    #[test]
    fn greek_letters_and_operators_become_glyphs() {
        assert_eq!(normalize(r"\alpha + \beta"), "α + β");
        assert_eq!(normalize(r"3 \cdot 4 \times 2"), "3 · 4 × 2");
        assert_eq!(normalize(r"x \leq 5"), "x ≤ 5");
        assert_eq!(normalize(r"2\pi r"), "2π r");
    }

    #[test]
    fn unknown_commands_degrade_to_text() {
        assert_eq!(normalize(r"\unknown{3}"), "unknown3");
        assert_eq!(normalize(r"5\,\text{cm}"), "5 cm");
        assert_eq!(normalize(r"\left( x \right)"), "( x )");
        assert_eq!(normalize(r"\{1, 2\}"), "1, 2");
    }

    #[test]
    fn whitespace_is_collapsed_last() {
        assert_eq!(normalize("  2x   +\t1 \n"), "2x + 1");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn unterminated_groups_do_not_panic() {
        assert_eq!(normalize(r"\frac{1}{"), "(1)/()");
        assert_eq!(normalize(r"\sqrt"), "√()");
        assert_eq!(normalize("x^"), "x");
        assert_eq!(normalize("\\"), "");
    }

    #[test]
    fn normalize_is_deterministic() {
        let markup = r"\frac{3}{4} \cdot x^{2} - \sqrt{\alpha}";
        assert_eq!(normalize(markup), normalize(markup));
    }

    #[test]
    fn scaffold_blanks_trailing_literal() {
        assert_eq!(scaffold("g(5) = 2(5) - 8"), "g(5) = 2(5) - ___");
    }

    #[test]
    fn scaffold_keeps_unary_minus_with_literal() {
        assert_eq!(scaffold("x = -8"), "x = ___");
        assert_eq!(scaffold("2(5)-8"), "2(5)-___");
    }

    #[test]
    fn scaffold_falls_back_to_right_hand_side_digits() {
        assert_eq!(scaffold("y = 2x"), "y = ___x");
    }

    #[test]
    fn scaffold_blanks_or_appends_right_hand_side() {
        assert_eq!(scaffold("y = mx"), "y = ___");
        assert_eq!(scaffold("a + b"), "a + b = ___");
    }

    #[test]
    fn scaffold_introduces_exactly_one_blank() {
        for markup in ["3x + 4 = 10", r"\frac{1}{2}", "x = y", "k", "3.5 + 1.25"] {
            assert_eq!(scaffold(markup).matches(BLANK_MARKER).count(), 1, "{markup}");
        }
    }
}
