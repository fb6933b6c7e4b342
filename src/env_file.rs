//! `.env` loading. Variables already present in the process environment win.

use std::fs;
use std::path::Path;

/// Load `path` into the process environment, returning how many variables
/// were set.
pub fn load(path: &Path) -> Result<usize, String> {
    let contents = fs::read_to_string(path).map_err(|e| format!("failed to read {}: {}", path.display(), e))?;

    let mut set = 0;
    for (index, line) in contents.lines().enumerate() {
        let Some((key, value)) = parse_line(line).map_err(|e| format!("{}:{}: {}", path.display(), index + 1, e))?
        else {
            continue;
        };
        if std::env::var_os(&key).is_some() {
            continue;
        }
        // Mutating the environment is only sound while single-threaded; this
        // runs before logging or any connection is set up.
        unsafe {
            std::env::set_var(&key, value);
        }
        set += 1;
    }
    Ok(set)
}

/// `KEY=value`, optionally prefixed with `export`. Blank lines and `#`
/// comments yield `None`.
pub fn parse_line(line: &str) -> Result<Option<(String, String)>, String> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let line = line.strip_prefix("export ").map(str::trim_start).unwrap_or(line);

    let (key, raw) = line.split_once('=').ok_or_else(|| "missing '=' in assignment".to_string())?;
    let key = key.trim();
    if key.is_empty() {
        return Err("empty variable name".to_string());
    }
    if key.contains(char::is_whitespace) {
        return Err(format!("variable name contains whitespace: {}", key));
    }
    Ok(Some((key.to_string(), unquote(raw.trim())?)))
}

fn unquote(raw: &str) -> Result<String, String> {
    let Some(quote) = raw.chars().next().filter(|c| *c == '"' || *c == '\'') else {
        // bare value; an unquoted `#` starts a comment
        let value = raw.split('#').next().unwrap_or_default();
        return Ok(value.trim_end().to_string());
    };

    let mut value = String::new();
    let mut chars = raw[1..].chars();
    while let Some(ch) = chars.next() {
        if ch == quote {
            let rest = chars.as_str().trim_start();
            if !(rest.is_empty() || rest.starts_with('#')) {
                return Err(format!("unexpected text after closing quote: {}", rest));
            }
            return Ok(value);
        }
        if ch == '\\' && quote == '"' {
            match chars.next() {
                Some('n') => value.push('\n'),
                Some('t') => value.push('\t'),
                Some(other) => value.push(other),
                None => break,
            }
        } else {
            value.push(ch);
        }
    }
    Err("unterminated quoted value".to_string())
}
