use phpvis::{Interpreter, RuntimeErrorCode};

fn run(src: &str) -> String {
    Interpreter::new().run(src).expect("script runs")
}

fn fail(src: &str) -> phpvis::RuntimeError {
    Interpreter::new().run(src).expect_err("script fails")
}

#[test]
fn private_property_read_from_global_scope() {
    let err = fail("<?php class Base { private $field = []; } $b = new Base; echo count($b->field);");
    assert_eq!(err.message, "Cannot access private property Base::$field");
    assert_eq!(err.code, Some(RuntimeErrorCode::AccessViolation));
}

#[test]
fn private_method_from_subclass_names_the_scope() {
    let err = fail(
        "<?php
class Base { private function fun1() {} }
class Derived extends Base { function go() { $this->fun1(); } }
(new Derived)->go();",
    );
    assert_eq!(err.message, "Call to private method Base::fun1() from scope Derived");
    assert_eq!(err.line, Some(3));
}

#[test]
fn protected_reachable_from_parent_and_child_only() {
    let out = run("<?php
class A { function peek(B $b) { return $b->secret; } }
class B extends A { protected $secret = 'p'; }
echo (new A)->peek(new B);");
    assert_eq!(out, "p");
    let err = fail("<?php class B { protected function f() {} } (new B)->f();");
    assert_eq!(err.message, "Call to protected method B::f() from global scope");
}

#[test]
fn parent_and_child_private_slots_in_var_dump() {
    let out = run("<?php
class A { private $x = 'a'; }
class B extends A { private $x = 'b'; public $y = 1; }
var_dump(new B);");
    assert!(out.starts_with("object(B)#1 (3) {\n"), "{}", out);
    assert!(out.contains("  [\"x\":\"A\":private]=>\n  string(1) \"a\"\n"));
    assert!(out.contains("  [\"x\":\"B\":private]=>\n  string(1) \"b\"\n"));
    assert!(out.contains("  [\"y\"]=>\n  int(1)\n"));
}

#[test]
fn private_method_chosen_by_calling_scope() {
    let out = run("<?php
class A { private function who() { return 'A'; } function call() { return $this->who(); } }
class B extends A { public function who() { return 'B'; } }
echo (new B)->call(), (new B)->who();");
    assert_eq!(out, "AB");
}

#[test]
fn private_static_property_and_constant() {
    let out = run("<?php
class Counter {
  private static $n = 0;
  private const STEP = 2;
  static function bump() { self::$n += self::STEP; return self::$n; }
}
Counter::bump();
echo Counter::bump();");
    assert_eq!(out, "4");
    let err = fail("<?php class C { private static $n = 0; } echo C::$n;");
    assert_eq!(err.message, "Cannot access private property C::$n");
}

#[test]
fn private_constructor_and_factory() {
    let err = fail("<?php class S { private function __construct() {} } new S;");
    assert_eq!(err.message, "Call to private S::__construct() from global scope");
    let out = run("<?php
class S { private function __construct() { echo 'made'; } static function make() { return new static; } }
S::make();");
    assert_eq!(out, "made");
}

#[test]
fn output_before_a_violation_is_kept() {
    let mut interp = Interpreter::new();
    let err = interp
        .run("<?php class A { private $v = 1; } echo 'before'; echo (new A)->v;")
        .expect_err("access violation");
    assert!(err.is_access_violation());
    assert_eq!(interp.output(), "before");
}

#[test]
fn dynamic_property_on_instance() {
    let out = run("<?php class A {} $a = new A; $a->extra = 5; echo $a->extra; var_dump(isset($a->none));");
    assert_eq!(out, "5bool(false)\n");
}
