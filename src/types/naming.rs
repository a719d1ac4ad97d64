//! Identifier-safe names for types, used to name check temporaries.

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Turns a printed type into an identifier fragment:
/// `*os.File` is `ptrFile`, `[]byte` is `slcByte`, `map[string]int` is
/// `mapOfStringToInt`.
pub fn type_to_var(t: &str) -> String {
    let t = t.trim();
    if let Some(rest) = t.strip_prefix("map[") {
        return map_to_var(rest);
    }
    if let Some(rest) = t.strip_prefix("[]") {
        return format!("slc{}", capitalize(&type_to_var(rest)));
    }
    if t.starts_with('[') {
        return match t.find(']') {
            Some(close) => format!("arr{}", capitalize(&type_to_var(&t[close + 1..]))),
            None => fallback(t),
        };
    }
    if let Some(rest) = t.strip_prefix('*') {
        return format!("ptr{}", capitalize(&type_to_var(rest)));
    }
    if t.starts_with("func(") {
        return "func".into();
    }
    if t.starts_with("struct{") {
        return "struct".into();
    }
    if t.starts_with("interface{") {
        return "iface".into();
    }
    // Qualified names keep only the type name.
    match t.find('.') {
        Some(dot) => type_to_var(&t[dot + 1..]),
        None => fallback(t),
    }
}

/// `K]V` of a map type, split at the bracket-balanced `]`.
fn map_to_var(rest: &str) -> String {
    let mut depth = 0usize;
    for (i, c) in rest.char_indices() {
        match c {
            '[' => depth += 1,
            ']' if depth == 0 => {
                let key = capitalize(&type_to_var(&rest[..i]));
                let value = capitalize(&type_to_var(&rest[i + 1..]));
                return format!("mapOf{}To{}", key, value);
            }
            ']' => depth -= 1,
            _ => {}
        }
    }
    fallback(rest)
}

fn fallback(t: &str) -> String {
    let cleaned: String = t
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_')
        .collect();
    if cleaned.is_empty() {
        "value".into()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_type_names() {
        let cases = [
            ("foo", "foo"),
            ("pkg.foo", "foo"),
            ("*foo", "ptrFoo"),
            ("**foo", "ptrPtrFoo"),
            ("[]foo", "slcFoo"),
            ("[123]foo", "arrFoo"),
            ("[][][123]**foo", "slcSlcArrPtrPtrFoo"),
            ("map[int]bool", "mapOfIntToBool"),
            ("map[map[int]bool][123]*foo", "mapOfMapOfIntToBoolToArrPtrFoo"),
            ("*os.File", "ptrFile"),
        ];
        for (input, expected) in cases {
            assert_eq!(type_to_var(input), expected, "input {}", input);
        }
    }

    #[test]
    fn literal_types_fall_back() {
        assert_eq!(type_to_var("func(int) error"), "func");
        assert_eq!(type_to_var("[]struct{a int}"), "slcStruct");
        assert_eq!(type_to_var("interface{}"), "iface");
    }
}
