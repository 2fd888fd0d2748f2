//! ABOUTME: Pulls the first balanced `{...}` block out of a free-form oracle response
//! ABOUTME: Oracles routinely wrap JSON in prose or markdown fences; this tolerates both

/// Scans for the first `{` and returns the substring up to its matching `}`,
/// tracking string literals and escapes so braces inside quoted text don't
/// throw off the balance count. Returns `None` if no balanced block exists.
#[must_use]
pub fn extract_json_block(text: &str) -> Option<String> {
    let bytes = text.as_bytes();
    let start = text.find('{')?;
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &byte) in bytes[start..].iter().enumerate() {
        let ch = byte as char;
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    let end = start + offset + 1;
                    return Some(text[start..end].to_string());
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_json_surrounded_by_prose() {
        let text = "Sure, here's the plan:\n```json\n{\"a\": 1}\n```\nLet me know if that works.";
        assert_eq!(extract_json_block(text), Some("{\"a\": 1}".to_string()));
    }

    #[test]
    fn braces_inside_strings_do_not_unbalance_the_count() {
        let text = "{\"msg\": \"use { and }\"}";
        assert_eq!(extract_json_block(text), Some(text.to_string()));
    }

    #[test]
    fn no_braces_returns_none() {
        assert_eq!(extract_json_block("no json here"), None);
    }

    #[test]
    fn unbalanced_braces_returns_none() {
        assert_eq!(extract_json_block("{\"a\": 1"), None);
    }

    #[test]
    fn takes_the_first_balanced_block_when_several_are_present() {
        let text = "{\"a\": 1} and also {\"b\": 2}";
        assert_eq!(extract_json_block(text), Some("{\"a\": 1}".to_string()));
    }
}
