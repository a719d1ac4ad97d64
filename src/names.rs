//! Reserved identifiers shared by the rewriter, the collector and the engine.
//!
//! User code can never spell a name with the reserved prefix: the lexical
//! rewriter rejects it, so every name below is unforgeable.

pub const RESERVED_PREFIX: &str = "_go2";

/// Function the rewriter wraps every checked expression in.
pub const CHECK_FUNC: &str = "_go2check";

/// Condition of the `if` a handle block is rewritten to.
pub const HANDLE_BOOL: &str = "_go2handle";

/// Stand-in for the handler's bound error identifier.
pub const HANDLE_ERR: &str = "_go2handleErr";

pub const CHECK_KEYWORD: &str = "check";
pub const HANDLE_KEYWORD: &str = "handle";

pub fn is_reserved(name: &str) -> bool {
    name.starts_with(RESERVED_PREFIX)
}

/// Name of the `n`th temporary of sanitized type name `type_name` in a block.
pub fn temp_name(type_name: &str, n: usize) -> String {
    format!("{}{}{}", RESERVED_PREFIX, type_name, n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temporaries_are_reserved() {
        assert_eq!(temp_name("error", 0), "_go2error0");
        assert!(is_reserved(&temp_name("ptrFile", 3)));
        assert!(is_reserved(CHECK_FUNC) && is_reserved(HANDLE_BOOL) && is_reserved(HANDLE_ERR));
        assert!(!is_reserved("go2"));
    }
}
