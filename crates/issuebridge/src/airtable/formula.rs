//! Builders for Airtable formulas.
//!
//! Formulas reference fields by display name in braces and take string
//! literals in single quotes.

/// Quote a string literal, escaping backslashes and single quotes.
pub fn quote(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{escaped}'")
}

/// Reference a field by name.
pub fn field_ref(name: &str) -> String {
    format!("{{{}}}", name.replace('}', "\\}"))
}

/// Formula matching records whose `field_name` equals any of `values`.
///
/// A single value produces a plain comparison; no values produce a formula
/// that matches nothing.
pub fn any_equals<S: AsRef<str>>(field_name: &str, values: &[S]) -> String {
    let field = field_ref(field_name);
    let clauses: Vec<String> = values
        .iter()
        .map(|v| format!("{}={}", field, quote(v.as_ref())))
        .collect();

    match clauses.len() {
        0 => "FALSE()".to_string(),
        1 => clauses.concat(),
        _ => format!("OR({})", clauses.join(",")),
    }
}
