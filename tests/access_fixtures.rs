use std::fs;

use phpvis::{Directive, Interpreter, Verdict};

fn run_fixture(path: &str) -> phpvis::FixtureReport {
    let source = fs::read_to_string(path).expect("read fixture");
    let mut fixture = phpvis::parse_fixture(&source).expect("parse fixture header");
    fixture.path = Some(path.to_string());
    phpvis::check(&fixture)
}

#[test]
fn private_members_inside_declaring_class() {
    let path = "tests/phpt/access/16_private.php";
    let source = fs::read_to_string(path).expect("read fixture");
    let fixture = phpvis::parse_fixture(&source).expect("parse fixture header");
    assert_eq!(fixture.directive, Directive::Ok);
    assert_eq!(fixture.categories, vec!["access"]);

    let report = phpvis::check(&fixture);
    assert_eq!(report.verdict, Verdict::Pass);
    let expected = "array(1) {\n  [0]=>\n  int(1)\n}\nBase::fun1\n";
    assert_eq!(report.output, expected);
}

#[test]
fn private_fixture_runs_as_plain_script() {
    let source = fs::read_to_string("tests/phpt/access/16_private.php").expect("read fixture");
    let script = &source[source.find("<?php").expect("open tag")..];
    let mut interp = Interpreter::new();
    interp.set_program_path("tests/phpt/access/16_private.php");
    let output = interp.run(script).expect("run fixture script");
    assert_eq!(output, "array(1) {\n  [0]=>\n  int(1)\n}\nBase::fun1\n");
    assert!(interp.warnings().is_empty());
}

#[test]
fn every_access_fixture_meets_its_directive() {
    let mut paths: Vec<_> = fs::read_dir("tests/phpt/access")
        .expect("list fixtures")
        .map(|entry| entry.expect("dir entry").path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "php"))
        .collect();
    paths.sort();
    assert!(paths.len() >= 10);

    let failures: Vec<String> = paths
        .iter()
        .filter_map(|path| {
            let path = path.to_string_lossy();
            match run_fixture(&path).verdict {
                Verdict::Pass => None,
                Verdict::Fail(reason) => Some(format!("{}: {}", path, reason)),
            }
        })
        .collect();
    assert!(failures.is_empty(), "{}", failures.join("\n"));
}

#[test]
fn private_constructor_factory_output() {
    let report = run_fixture("tests/phpt/access/21_private_constructor_factory.php");
    assert_eq!(report.output, "bool(true)\n1\n");
}

#[test]
fn protected_members_reachable_from_subclass() {
    let report = run_fixture("tests/phpt/access/22_protected_members.php");
    assert_eq!(report.output, "3\n");
}

#[test]
fn other_instance_of_same_class() {
    let report = run_fixture("tests/phpt/access/24_same_class_other_instance.php");
    assert_eq!(report.output, "bool(false)\nbool(true)\n");
}

#[test]
fn shadowed_private_slots_stay_separate() {
    let report = run_fixture("tests/phpt/access/25_shadowed_private_slots.php");
    assert_eq!(report.output, "ab\n");
}

#[test]
fn undefined_property_warns_and_continues() {
    let report = run_fixture("tests/phpt/access/26_undefined_property.php");
    assert_eq!(report.output, "1\n");
    assert_eq!(report.warnings, vec!["Warning: Undefined property: Base::$missing"]);
}

#[test]
fn failing_fixture_keeps_output_before_the_error() {
    let report = run_fixture("tests/phpt/access/27_private_constant.php");
    assert_eq!(report.verdict, Verdict::Pass);
    assert_eq!(report.output, "hidden\n");
    let err = report.error.expect("access error");
    assert!(err.is_access_violation());
    assert_eq!(err.line, Some(11));
}
