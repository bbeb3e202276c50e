/// Turn straight quotes into curly ones.
///
/// A quote opens when it starts the text or follows whitespace, an opening
/// bracket, a dash or another opening quote. A single quote after a letter or
/// digit is an apostrophe.
pub fn fancify_quotes(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev: Option<char> = None;
    for ch in text.chars() {
        let fancy = match ch {
            '"' if opens(prev) => '“',
            '"' => '”',
            '\'' if prev.is_some_and(|p| p.is_alphanumeric()) => '’',
            '\'' if opens(prev) => '‘',
            '\'' => '’',
            c => c,
        };
        out.push(fancy);
        prev = Some(fancy);
    }
    out
}

fn opens(prev: Option<char>) -> bool {
    match prev {
        None => true,
        Some(p) => p.is_whitespace() || matches!(p, '(' | '[' | '{' | '>' | '-' | '―' | '—' | '“' | '‘' | '「'),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn double_quotes_pair_up() {
        assert_eq!(fancify_quotes(r#""Hello," she said. "Bye.""#), "“Hello,” she said. “Bye.”");
    }

    #[test]
    fn apostrophes_and_single_quotes() {
        assert_eq!(fancify_quotes("don't 'quote' me"), "don’t ‘quote’ me");
    }

    #[test]
    fn nested_quotes() {
        assert_eq!(fancify_quotes(r#""'Run,' he said""#), "“‘Run,’ he said”");
    }

    #[test]
    fn curly_input_is_unchanged() {
        assert_eq!(fancify_quotes("“ok”"), "“ok”");
    }
}
