use std::env;
use std::fs;
use std::io::{self, IsTerminal, Read, Write};

use phpvis::{Interpreter, RuntimeError, Verdict};

/// Exit status PHP uses for an uncaught fatal error.
const FATAL_EXIT: i32 = 255;

fn print_error(prefix: &str, err: &RuntimeError) {
    eprintln!("{}{}", prefix, err.message);
    let mut meta = Vec::new();
    if let Some(code) = err.code {
        meta.push(format!("code={}", code));
        if code.is_parse() {
            meta.push("kind=parse".to_string());
        }
    }
    match (err.line, err.column) {
        (Some(line), Some(column)) => meta.push(format!("line={}, column={}", line, column)),
        (Some(line), None) => meta.push(format!("line={}", line)),
        _ => {}
    }
    if !meta.is_empty() {
        eprintln!("PHP metadata: {}", meta.join(", "));
    }
    if let Some(hint) = &err.hint {
        eprintln!("PHP hint: {}", hint);
    }
}

/// Script output is a byte string; write it without UTF-8 repair.
fn write_output(bytes: &[u8]) {
    let mut stdout = io::stdout().lock();
    if let Err(err) = stdout.write_all(bytes).and_then(|()| stdout.flush()) {
        eprintln!("Failed to write output: {}", err);
    }
}

fn read_file(path: &str) -> String {
    fs::read_to_string(path).unwrap_or_else(|err| {
        eprintln!("Could not open input file: {} ({})", path, err);
        std::process::exit(1);
    })
}

fn run_fixture(path: &str) -> ! {
    let source = read_file(path);
    let mut fixture = match phpvis::parse_fixture(&source) {
        Ok(fixture) => fixture,
        Err(err) => {
            print_error("Fixture error: ", &err);
            std::process::exit(1);
        }
    };
    fixture.path = Some(path.to_string());
    let report = phpvis::check(&fixture);
    print!("{}", report.output);
    for warning in &report.warnings {
        eprintln!("PHP {}", warning);
    }
    if let Some(err) = &report.error {
        print_error("PHP Fatal error:  Uncaught Error: ", err);
    }
    match &report.verdict {
        Verdict::Pass => {
            eprintln!("PASS {} ({})", path, fixture.directive);
            std::process::exit(0);
        }
        Verdict::Fail(reason) => {
            eprintln!("FAIL {} ({}): {}", path, fixture.directive, reason);
            std::process::exit(1);
        }
    }
}

fn main() {
    let args: Vec<String> = env::args().collect();

    let mut dump_ast = false;
    let mut repl_flag = false;
    let mut inline_code: Option<String> = None;
    let mut fixture_path: Option<String> = None;
    let mut filtered_args: Vec<String> = Vec::new();
    let mut iter = args[1..].iter();
    while let Some(arg) = iter.next() {
        if arg == "--dump-ast" {
            dump_ast = true;
        } else if arg == "--repl" {
            repl_flag = true;
        } else if arg == "-r" {
            match iter.next() {
                Some(code) => inline_code = Some(code.clone()),
                None => {
                    eprintln!("Usage: {} -r <code>", args[0]);
                    std::process::exit(1);
                }
            }
        } else if arg == "--fixture" {
            match iter.next() {
                Some(path) => fixture_path = Some(path.clone()),
                None => {
                    eprintln!("Usage: {} --fixture <file.php>", args[0]);
                    std::process::exit(1);
                }
            }
        } else {
            filtered_args.push(arg.clone());
        }
    }

    if let Some(path) = fixture_path {
        run_fixture(&path);
    }

    if repl_flag
        || (inline_code.is_none() && filtered_args.is_empty() && io::stdin().is_terminal())
    {
        phpvis::repl::run_repl();
        return;
    }

    let mut interpreter = Interpreter::new();
    interpreter.set_echo_warnings(true);

    let result = if let Some(code) = inline_code {
        if dump_ast {
            eprintln!("--dump-ast needs a file or stdin, not -r");
            std::process::exit(1);
        }
        interpreter.set_program_path("Command line code");
        interpreter.run_code(&code)
    } else {
        let (input, program_name) = match filtered_args.first() {
            Some(path) => (read_file(path), path.clone()),
            None => {
                let mut buf = String::new();
                io::stdin().read_to_string(&mut buf).unwrap_or_else(|err| {
                    eprintln!("Failed to read stdin: {}", err);
                    std::process::exit(1);
                });
                (buf, "Standard input code".to_string())
            }
        };

        if dump_ast {
            match phpvis::dump_ast(&input) {
                Ok(ast) => println!("{}", ast),
                Err(err) => {
                    print_error("PHP Parse error:  ", &err);
                    std::process::exit(FATAL_EXIT);
                }
            }
            return;
        }

        interpreter.set_program_path(&program_name);
        interpreter.run(&input)
    };

    // Output produced before a failure still reaches stdout.
    write_output(interpreter.output_bytes());
    if let Err(err) = result {
        let prefix = if err.code.is_some_and(|c| c.is_parse()) {
            "PHP Parse error:  "
        } else {
            "PHP Fatal error:  Uncaught Error: "
        };
        print_error(prefix, &err);
        std::process::exit(FATAL_EXIT);
    }
}
