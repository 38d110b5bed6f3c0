//! `.properties` 文本解析
//!
//! 支持的语法：
//! - `key=value`、`key: value`、`key value`
//! - `#` 或 `!` 开头的注释行
//! - 行尾 `\` 续行，续行的前导空白被忽略
//! - `\t` `\n` `\r` `\f` `\uXXXX` 转义，其余 `\x` 视为 `x`

use std::collections::HashMap;

/// 把物理行拼接成逻辑行
fn logical_lines(content: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current: Option<String> = None;

    for line in content.lines() {
        let trimmed = line.trim_start();
        let line = match current.take() {
            Some(mut pending) => {
                pending.push_str(trimmed);
                pending
            }
            None => {
                if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!') {
                    continue;
                }
                trimmed.to_string()
            }
        };

        // 结尾连续的反斜杠为奇数个时才是续行
        let trailing = line.chars().rev().take_while(|c| *c == '\\').count();
        if trailing % 2 == 1 {
            let mut line = line;
            line.pop();
            current = Some(line);
        } else {
            lines.push(line);
        }
    }
    if let Some(pending) = current {
        lines.push(pending);
    }
    lines
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\u{0c}'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(decoded) => out.push(decoded),
                    None => {
                        out.push_str("\\u");
                        out.push_str(&hex);
                    }
                }
            }
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

/// 切分逻辑行，返回未转义的 key 与 value
fn split_entry(line: &str) -> (&str, &str) {
    let mut escaped = false;
    let mut key_end = line.len();
    for (i, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '=' | ':' | ' ' | '\t' | '\u{0c}' => {
                key_end = i;
                break;
            }
            _ => {}
        }
    }

    let key = &line[..key_end];
    let rest = line[key_end..].trim_start_matches([' ', '\t', '\u{0c}']);
    let rest = rest
        .strip_prefix('=')
        .or_else(|| rest.strip_prefix(':'))
        .unwrap_or(rest);
    (key, rest.trim_start_matches([' ', '\t', '\u{0c}']))
}

/// 解析 `.properties` 文本，重复的 key 以后出现的为准
pub fn parse_properties(content: &str) -> HashMap<String, String> {
    logical_lines(content)
        .iter()
        .map(|line| {
            let (key, value) = split_entry(line);
            (unescape(key), unescape(value))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_separators_and_comments() {
        let props = parse_properties(
            "# comment\n\
             ! another comment\n\
             \n\
             a=1\n\
             b: 2\n\
             c 3\n\
             d = spaced value \n\
             empty=\n",
        );
        assert_eq!(props.len(), 5);
        assert_eq!(props["a"], "1");
        assert_eq!(props["b"], "2");
        assert_eq!(props["c"], "3");
        assert_eq!(props["d"], "spaced value ");
        assert_eq!(props["empty"], "");
    }

    #[test]
    fn test_continuation() {
        let props = parse_properties("list=1,\\\n    2,\\\n    3\nnext=x\n");
        assert_eq!(props["list"], "1,2,3");
        assert_eq!(props["next"], "x");
    }

    #[test]
    fn test_escapes() {
        let props = parse_properties("key\\=with\\:seps=a\\tb\nunicode=\\u0041\npath=c:\\\\dir\n");
        assert_eq!(props["key=with:seps"], "a\tb");
        assert_eq!(props["unicode"], "A");
        assert_eq!(props["path"], "c:\\dir");
    }

    #[test]
    fn test_last_duplicate_wins() {
        let props = parse_properties("a=1\na=2\n");
        assert_eq!(props["a"], "2");
    }
}
