peg::parser! {
    grammar tokens() for str {
        rule ident_start() = ['a'..='z' | 'A'..='Z' | '_']
        rule ident_continue() = ['a'..='z' | 'A'..='Z' | '0'..='9' | '_']

        pub rule identifier() = ident_start() ident_continue()* ![_]

        pub rule placeholder() -> &'input str
            = ":" name:$(ident_start() ident_continue()*) ![_] { name }
    }
}

/// A bare SQL identifier: letters, digits, underscore, no leading digit.
/// Everything that ends up double-quoted in emitted SQL must pass this first.
pub fn is_identifier(name: &str) -> bool {
    tokens::identifier(name).is_ok()
}

/// Parse a `:name` parameter token, returning the bare name.
pub fn placeholder_name(token: &str) -> Option<&str> {
    tokens::placeholder(token).ok()
}

/// Anything starting with `:` is placeholder-intent, even when malformed.
/// A malformed token is a config error, not a literal value.
pub fn is_placeholder_like(token: &str) -> bool {
    token.starts_with(':')
}
