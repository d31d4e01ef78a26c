//! End-to-end scenarios: source text through the compiler and VM, asserted
//! against the program's captured output or its first diagnostic.

use bloxer::{compile, Vm};

/// Compile and run, returning everything the program printed.
fn run(source: &str) -> String {
	let chunk = compile(source).expect("program should compile");
	let mut output = Vec::new();
	Vm::with_output(chunk, &mut output).run().expect("program should run");
	String::from_utf8(output).unwrap()
}

fn compile_error(source: &str) -> String { compile(source).unwrap_err().to_string() }

fn runtime_error(source: &str) -> String {
	let chunk = compile(source).expect("program should compile");
	Vm::with_output(chunk, Vec::new()).run().unwrap_err().to_string()
}

#[test]
fn arithmetic_precedence() {
	assert_eq!(run("print 1 + 2 * 3;"), "7\n");
}

#[test]
fn string_concatenation_through_globals() {
	assert_eq!(run(r#"var a = "hi"; var b = " there"; print a + b;"#), "hi there\n");
}

#[test]
fn for_loop_sums_its_counter() {
	assert_eq!(run("var n = 0; for (var i = 0; i < 5; i = i + 1) { n = n + i; } print n;"), "10\n");
}

#[test]
fn if_else_takes_the_right_branch() {
	assert_eq!(run(r#"var x = 10; if (x > 5) print "big"; else print "small";"#), "big\n");
}

#[test]
fn while_loop_prints_each_iteration() {
	assert_eq!(run("var i = 3; while (i > 0) { print i; i = i - 1; }"), "3\n2\n1\n");
}

#[test]
fn equality_and_truthiness() {
	assert_eq!(run(r#"print "a" == "a"; print 1 == true; print !nil;"#), "true\nfalse\ntrue\n");
}

#[test]
fn local_in_its_own_initializer_is_a_compile_error() {
	assert_eq!(
		compile_error("{ var a = a; }"),
		"[line 1] compilation error: cannot read local variable in its own initializer"
	);
}

#[test]
fn assigning_to_an_expression_is_a_compile_error() {
	assert_eq!(compile_error("a + b = 1;"), "[line 1] compilation error: invalid assignment target");
}

#[test]
fn reading_an_undefined_global_is_a_runtime_error() {
	assert_eq!(runtime_error("print x;"), "runtime error: undefined variable");
}

#[test]
fn negating_a_string_is_a_runtime_error() {
	assert_eq!(runtime_error(r#"-"hi";"#), "runtime error: operand must be a number");
}

#[test]
fn adding_mixed_operands_is_a_runtime_error() {
	assert_eq!(runtime_error(r#"1 + "x";"#), "runtime error: operands must be two numbers or two strings");
}

#[test]
fn assignment_is_an_expression() {
	assert_eq!(run("var x = 0; print (x = 3); print x;"), "3\n3\n");
}

#[test]
fn short_circuits_keep_the_deciding_operand() {
	assert_eq!(run("var hits = 0; nil and (hits = hits + 1); print hits;"), "0\n");
	assert_eq!(run("var hits = 0; 1 or (hits = hits + 1); print hits;"), "0\n");
	assert_eq!(run("print nil or 2;"), "2\n");
	assert_eq!(run("print false and 2;"), "false\n");
}

#[test]
fn block_scopes_shadow_and_restore() {
	let source = r#"
var a = "outer";
{
	var a = "inner";
	print a;
}
print a;
"#;
	assert_eq!(run(source), "inner\nouter\n");
}

#[test]
fn nested_control_flow() {
	let source = r#"
var total = 0;
for (var i = 1; i < 4; i = i + 1) {
	var j = 0;
	while (j < i) {
		if (j == 1 or i == j) total = total + 10;
		else total = total + 1;
		j = j + 1;
	}
}
print total;
"#;
	// i=1: j=0 -> +1. i=2: j=0 -> +1, j=1 -> +10. i=3: j=0,2 -> +2, j=1 -> +10.
	assert_eq!(run(source), "24\n");
}

#[test]
fn multi_line_strings_keep_line_numbers_for_errors() {
	// The string literal spans two lines, so the error after it is on line 2.
	assert_eq!(compile_error("\"one\ntwo\" +;"), "[line 2] compilation error: missing expression");
	assert_eq!(runtime_error("var a = \"one\ntwo\";\nprint a + 1;"), "runtime error: operands must be two numbers or two strings");
}
