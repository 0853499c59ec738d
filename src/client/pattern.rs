use regex::Regex;

/// Compile a glob (`*` = any run, `?` = one character) into an anchored regex.
/// Every other character matches literally, and wildcards match newlines
/// too.
pub fn glob_to_regex(pattern: &str) -> Result<Regex, regex::Error> {
    let mut source = String::with_capacity(pattern.len() + 12);
    source.push_str("(?s)^");
    let mut literal = String::new();

    for ch in pattern.chars() {
        match ch {
            '*' | '?' => {
                source.push_str(&regex::escape(&literal));
                literal.clear();
                source.push_str(if ch == '*' { ".*" } else { "." });
            }
            other => literal.push(other),
        }
    }
    source.push_str(&regex::escape(&literal));
    source.push('$');

    Regex::new(&source)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn star_matches_any_suffix() {
        let re = glob_to_regex("api-blogs-*").expect("compile");
        assert!(re.is_match("api-blogs-read"));
        assert!(re.is_match("api-blogs-read-hello"));
        assert!(!re.is_match("api-footer-read"));
    }

    #[test]
    fn question_mark_matches_one_character() {
        let re = glob_to_regex("job-?").expect("compile");
        assert!(re.is_match("job-1"));
        assert!(!re.is_match("job-12"));
    }

    #[test]
    fn wildcards_match_newlines() {
        let re = glob_to_regex("note-*").expect("compile");
        assert!(re.is_match("note-line one\nline two"));
        let re = glob_to_regex("a?b").expect("compile");
        assert!(re.is_match("a\nb"));
    }

    #[test]
    fn regex_metacharacters_are_literal() {
        let re = glob_to_regex("a.b+(c)").expect("compile");
        assert!(re.is_match("a.b+(c)"));
        assert!(!re.is_match("axb+(c)"));
    }
}
