use crate::Interpreter;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

/// Check if the input has unbalanced brackets or an open string or block
/// comment, suggesting more input is needed. Comment text is skipped.
fn is_incomplete(input: &str) -> bool {
    let mut depth_brace = 0i32;
    let mut depth_paren = 0i32;
    let mut depth_bracket = 0i32;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut in_block_comment = false;
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if in_block_comment {
            if ch == '*' && chars.next_if_eq(&'/').is_some() {
                in_block_comment = false;
            }
            continue;
        }
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == q {
                quote = None;
            }
            continue;
        }
        match ch {
            '\'' | '"' => quote = Some(ch),
            '#' => skip_to_line_end(&mut chars),
            '/' if chars.next_if_eq(&'/').is_some() => skip_to_line_end(&mut chars),
            '/' if chars.next_if_eq(&'*').is_some() => in_block_comment = true,
            '{' => depth_brace += 1,
            '}' => depth_brace -= 1,
            '(' => depth_paren += 1,
            ')' => depth_paren -= 1,
            '[' => depth_bracket += 1,
            ']' => depth_bracket -= 1,
            _ => {}
        }
    }

    quote.is_some() || in_block_comment || depth_brace > 0 || depth_paren > 0 || depth_bracket > 0
}

fn skip_to_line_end(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) {
    for ch in chars.by_ref() {
        if ch == '\n' {
            break;
        }
    }
}

/// Result of processing a single REPL line.
enum LineResult {
    /// Need more input (open block or string).
    Continue,
    /// Line was processed (output may have been produced).
    Done,
}

/// Run one line (or the accumulated block) as PHP code. Classes, functions
/// and globals persist across lines.
fn process_line(
    interpreter: &mut Interpreter,
    accumulated: &mut String,
    line: &str,
) -> (LineResult, Option<String>) {
    if accumulated.is_empty() {
        *accumulated = line.to_string();
    } else {
        accumulated.push('\n');
        accumulated.push_str(line);
    }

    if is_incomplete(accumulated) {
        return (LineResult::Continue, None);
    }

    if accumulated.trim().is_empty() {
        accumulated.clear();
        return (LineResult::Done, None);
    }

    let display = match interpreter.run_code(accumulated) {
        Ok(output) if output.is_empty() => None,
        Ok(mut output) => {
            if !output.ends_with('\n') {
                output.push('\n');
            }
            Some(output)
        }
        Err(err) => Some(format!("PHP Fatal error:  Uncaught Error: {}\n", err.message)),
    };

    accumulated.clear();
    (LineResult::Done, display)
}

pub fn run_repl() {
    let mut rl = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(err) => {
            eprintln!("Failed to initialize line editor: {}", err);
            std::process::exit(1);
        }
    };

    let history_path = dirs_path();
    if let Some(ref path) = history_path {
        let _ = rl.load_history(path);
    }

    let mut interpreter = Interpreter::new();
    interpreter.set_program_path("php shell code");
    interpreter.set_echo_warnings(true);
    let mut accumulated = String::new();

    loop {
        let prompt = if accumulated.is_empty() { "php > " } else { "php { " };

        match rl.readline(prompt) {
            Ok(line) => {
                let _ = rl.add_history_entry(&line);
                let (result, display) = process_line(&mut interpreter, &mut accumulated, &line);
                if let Some(text) = display {
                    print!("{}", text);
                }
                if matches!(result, LineResult::Continue) {
                    continue;
                }
            }
            Err(ReadlineError::Interrupted) => {
                accumulated.clear();
                continue;
            }
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                eprintln!("Error: {}", err);
                break;
            }
        }
    }

    if let Some(ref path) = history_path {
        let _ = rl.save_history(path);
    }
}

fn dirs_path() -> Option<std::path::PathBuf> {
    let home = std::env::var("HOME").ok()?;
    let dir = std::path::PathBuf::from(home).join(".phpvis");
    let _ = std::fs::create_dir_all(&dir);
    Some(dir.join("history"))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Feed lines into the REPL core and collect all display output.
    fn repl_session(lines: &[&str]) -> Vec<String> {
        let mut interpreter = Interpreter::new();
        interpreter.set_program_path("<repl-test>");
        let mut accumulated = String::new();
        let mut outputs = Vec::new();

        for line in lines {
            let (_result, display) = process_line(&mut interpreter, &mut accumulated, line);
            if let Some(text) = display {
                outputs.push(text);
            }
        }
        outputs
    }

    #[test]
    fn echo_prints_once() {
        let out = repl_session(&["echo 'hello';", "$x = 1;"]);
        assert_eq!(out, vec!["hello\n"]);
    }

    #[test]
    fn variables_persist_across_lines() {
        let out = repl_session(&["$x = 42;", "echo $x + 1;"]);
        assert_eq!(out, vec!["43\n"]);
    }

    #[test]
    fn class_body_spans_lines() {
        let out = repl_session(&[
            "class A {",
            "  private $v = 7;",
            "  function v() { return $this->v; }",
            "}",
            "echo (new A)->v();",
        ]);
        assert_eq!(out, vec!["7\n"]);
    }

    #[test]
    fn errors_do_not_end_the_session() {
        let out = repl_session(&[
            "class A { private $v; }",
            "echo (new A)->v;",
            "echo 'still here';",
        ]);
        assert_eq!(
            out,
            vec![
                "PHP Fatal error:  Uncaught Error: Cannot access private property A::$v\n",
                "still here\n"
            ]
        );
    }

    #[test]
    fn whitespace_only_line_ignored() {
        let out = repl_session(&["   ", "  \t  "]);
        assert!(out.is_empty());
    }

    #[test]
    fn open_string_waits_for_more_input() {
        assert!(is_incomplete("echo 'abc"));
        assert!(!is_incomplete("echo '{';"));
    }

    #[test]
    fn quotes_in_comments_are_ignored() {
        assert!(!is_incomplete("echo 1; // don't"));
        assert!(!is_incomplete("echo 1; # it's"));
        assert!(!is_incomplete("echo 1; /* { ' */"));
        assert!(is_incomplete("echo 1; /* still open"));
        assert!(is_incomplete("function f() { // }\n"));
    }

    #[test]
    fn escaped_backslash_closes_the_string() {
        assert!(!is_incomplete(r"echo 'a\\';"));
        assert!(!is_incomplete(r#"echo "a\\";"#));
        assert!(is_incomplete(r"echo 'a\';"));
    }

    #[test]
    fn comment_line_does_not_stall_the_session() {
        let out = repl_session(&["echo 1; // don't", "echo 2;"]);
        assert_eq!(out, vec!["1\n", "2\n"]);
    }
}
