//! Command policy (§4.5): decide whether a shell-looking command string is
//! allowed to run, and tokenize it without ever handing it to a real shell.

const WHITELIST: &[&str] = &[
    "ls", "cat", "head", "tail", "wc", "grep", "find", "pwd", "whoami", "date", "python3", "pytest", "git",
];

const GIT_READONLY_SUBCOMMANDS: &[&str] = &["log", "status", "diff", "show", "ls-files"];

const FORBIDDEN_SUBSTRINGS: &[&str] = &["&&", "||", "$(", "${", "&", "|", ";", ">", "<", "`"];

/// Split `command` into tokens honoring shell-style quoting (so `grep "a b"`
/// yields one `a b` token) without ever invoking an actual shell.
pub fn tokenize(command: &str) -> Result<Vec<String>, String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_single = false;
    let mut in_double = false;
    let mut has_token = false;
    let mut chars = command.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\'' if !in_double => {
                in_single = !in_single;
                has_token = true;
            }
            '"' if !in_single => {
                in_double = !in_double;
                has_token = true;
            }
            c if c.is_whitespace() && !in_single && !in_double => {
                if has_token {
                    tokens.push(std::mem::take(&mut current));
                    has_token = false;
                }
            }
            _ => {
                current.push(c);
                has_token = true;
            }
        }
    }
    if in_single || in_double {
        return Err("unterminated quote in command".to_owned());
    }
    if has_token {
        tokens.push(current);
    }
    Ok(tokens)
}

/// Check `command` against the whitelist and metacharacter blocklist
/// (§4.5). Returns the tokenized command on success.
pub fn authorize(command: &str) -> Result<Vec<String>, String> {
    for forbidden in FORBIDDEN_SUBSTRINGS {
        if command.contains(forbidden) {
            return Err(format!("command contains disallowed shell operator '{forbidden}'"));
        }
    }

    let tokens = tokenize(command)?;
    let Some(program) = tokens.first() else {
        return Err("empty command".to_owned());
    };

    if !WHITELIST.contains(&program.as_str()) {
        return Err(format!("'{program}' is not in the allowed command whitelist"));
    }

    if program == "git" {
        let subcommand = tokens.get(1).map(String::as_str).unwrap_or("");
        if !GIT_READONLY_SUBCOMMANDS.contains(&subcommand) {
            return Err(format!("git subcommand '{subcommand}' is not read-only and is not allowed"));
        }
    }

    Ok(tokens)
}
