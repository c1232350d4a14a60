//! SQL loader-file parser: splits a `.sql` file into named statements, stripping comments
//! outside of string literals while preserving literal content exactly.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub name: Option<String>,
    pub body: String,
}

/// Strips `/*... */` and `--...` comments from `line`, honoring
/// single-quoted string literals with `\`-escaped quotes. Comments
/// spanning multiple physical lines are tracked by the caller via
/// `in_block_comment`.
fn strip_comments_from_line(line: &str, in_block_comment: &mut bool) -> String {
    let chars: Vec<char> = line.chars().collect();
    let mut out = String::with_capacity(line.len());
    let mut in_string = false;
    let mut i = 0;

    while i < chars.len() {
        if *in_block_comment {
            if chars[i] == '*' && chars.get(i + 1) == Some(&'/') {
                *in_block_comment = false;
                i += 2;
            } else {
                i += 1;
            }
            continue;
        }

        if in_string {
            out.push(chars[i]);
            if chars[i] == '\\' && i + 1 < chars.len() {
                out.push(chars[i + 1]);
                i += 2;
                continue;
            }
            if chars[i] == '\'' {
                in_string = false;
            }
            i += 1;
            continue;
        }

        if chars[i] == '\'' {
            in_string = true;
            out.push(chars[i]);
            i += 1;
            continue;
        }

        if chars[i] == '/' && chars.get(i + 1) == Some(&'*') {
            *in_block_comment = true;
            i += 2;
            continue;
        }

        if chars[i] == '-' && chars.get(i + 1) == Some(&'-') {
            break; // rest of the line is a line comment
        }

        out.push(chars[i]);
        i += 1;
    }

    out
}

/// Parses a `.sql` loader file into its blank-line-delimited statements.
pub fn parse_statements(source: &str) -> Vec<Statement> {
    let mut statements = Vec::new();
    let mut current_name: Option<String> = None;
    let mut current_lines: Vec<String> = Vec::new();
    let mut in_block_comment = false;

    let flush = |current_name: &mut Option<String>, current_lines: &mut Vec<String>, out: &mut Vec<Statement>| {
        // Drop wholly-blank trailing lines produced by stripped comments,
        // but preserve inner whitespace and blank lines within the body.
        while current_lines.last().is_some_and(|l| l.is_empty()) {
            current_lines.pop();
        }
        if !current_lines.is_empty() {
            let body = current_lines
            .iter()
            .map(|l| l.trim_end())
            .collect::<Vec<_>>()
            .join("\n");
            out.push(Statement {
                    name: current_name.take(),
                    body,
            });
        }
        current_name.take();
        current_lines.clear();
    };

    for raw_line in source.lines() {
        let raw_trimmed = raw_line.trim();

        if raw_trimmed.is_empty() {
            flush(&mut current_name, &mut current_lines, &mut statements);
            continue;
        }

        // `-- name` must be recognized before stripping comments, since
        // stripping a line comment would otherwise erase it first.
        if current_lines.is_empty() && !in_block_comment {
            if let Some(name) = raw_trimmed.strip_prefix("-- name") {
                current_name = Some(name.trim_start_matches(':').trim().to_string());
                continue;
            }
        }

        let stripped = strip_comments_from_line(raw_line, &mut in_block_comment);
        current_lines.push(stripped);
    }
    flush(&mut current_name, &mut current_lines, &mut statements);

    statements
}
