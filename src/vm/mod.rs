//! The bytecode interpreter.
//!
//! The VM owns a finished chunk and walks it one instruction at a time with
//! an operand stack and a name -> value table for globals. Locals never touch
//! that table: their slot operands index directly into the operand stack,
//! which lines up with the compiler's locals because code generation keeps
//! every statement stack-neutral.
//!
//! Execution is strictly sequential on the caller's thread. The VM is not
//! thread-safe and takes no locks; nothing else can observe its stack.

use std::{
	collections::HashMap,
	io::{self, Write},
};

use crate::{
	chunk::{Chunk, Operation},
	error::vm::{RuntimeError, RuntimeErrorKind},
	value::Value,
};

/// A virtual machine ready to run one chunk to completion.
pub struct Vm<W> {
	chunk:   Chunk,
	/// Byte index of the instruction about to execute.
	ip:      usize,
	stack:   Vec<Value>,
	globals: HashMap<String, Value>,
	output:  W,
	trace:   Option<Box<dyn Write>>,
}

impl Vm<io::Stdout> {
	/// A VM that prints program output to stdout.
	pub fn new(chunk: Chunk) -> Self { Self::with_output(chunk, io::stdout()) }
}

impl<W: Write> Vm<W> {
	/// A VM that prints program output to the given sink.
	pub fn with_output(chunk: Chunk, output: W) -> Self {
		Self { chunk, ip: 0, stack: Vec::new(), globals: HashMap::new(), output, trace: None }
	}

	/// Also write one disassembly line to `sink` before each instruction
	/// executes.
	pub fn trace_to(mut self, sink: Box<dyn Write>) -> Self {
		self.trace = Some(sink);
		self
	}

	/// Run to the terminal return or the first runtime error. The sinks are
	/// flushed either way.
	pub fn run(mut self) -> Result<(), RuntimeError> {
		let result = self.execute();
		let _ = self.output.flush();
		if let Some(trace) = &mut self.trace {
			let _ = trace.flush();
		}
		result
	}

	fn execute(&mut self) -> Result<(), RuntimeError> {
		loop {
			if let Some(trace) = &mut self.trace {
				let _ = writeln!(trace, "{}", self.chunk.disassemble(self.ip));
			}
			let operation = Operation::from_byte(self.chunk.byte(self.ip));
			match operation {
				Operation::Return => return Ok(()),
				// Jumps land relative to the byte after their 3-byte
				// instruction, so they replace the width advance below.
				Operation::Jump => {
					self.ip += 3 + self.jump_offset();
					continue;
				}
				Operation::JumpIfFalse => {
					if self.peek(0).is_falsey() {
						self.ip += 3 + self.jump_offset();
						continue;
					}
				}
				Operation::Loop => {
					self.ip = self.ip + 3 - self.jump_offset();
					continue;
				}
				Operation::Constant => {
					let value = self.read_constant().clone();
					self.stack.push(value);
				}
				Operation::Nil => self.stack.push(Value::Nil),
				Operation::True => self.stack.push(Value::Boolean(true)),
				Operation::False => self.stack.push(Value::Boolean(false)),
				Operation::Pop => {
					self.pop();
				}
				Operation::DefineGlobal => {
					let name = self.read_name().to_string();
					let value = self.pop();
					self.globals.insert(name, value);
				}
				Operation::GetGlobal => {
					let value = match self.globals.get(self.read_name()) {
						Some(value) => value.clone(),
						None => return Err(RuntimeErrorKind::UndefinedVariable.into()),
					};
					self.stack.push(value);
				}
				// Assigning never creates a binding; only DEFINE_GLOBAL does.
				Operation::SetGlobal => {
					let name = self.read_name().to_string();
					if !self.globals.contains_key(&name) {
						return Err(RuntimeErrorKind::UndefinedVariable.into());
					}
					let value = self.peek(0).clone();
					self.globals.insert(name, value);
				}
				Operation::GetLocal => {
					let value = self.stack[self.slot()].clone();
					self.stack.push(value);
				}
				// Assignment is an expression, so the value stays on top.
				Operation::SetLocal => {
					let value = self.peek(0).clone();
					let slot = self.slot();
					self.stack[slot] = value;
				}
				Operation::Equal => {
					let b = self.pop();
					let a = self.pop();
					self.stack.push(Value::Boolean(a == b));
				}
				Operation::Greater => self.comparison(|a, b| a > b)?,
				Operation::Less => self.comparison(|a, b| a < b)?,
				Operation::Add => {
					let b = self.pop();
					let a = self.pop();
					match (a, b) {
						(Value::Number(a), Value::Number(b)) => self.stack.push(Value::Number(a + b)),
						(Value::String(a), Value::String(b)) => self.stack.push(Value::String(a + &b)),
						_ => return Err(RuntimeErrorKind::NumberOrStringOperands.into()),
					}
				}
				Operation::Subtract => self.arithmetic(|a, b| a - b)?,
				Operation::Multiply => self.arithmetic(|a, b| a * b)?,
				Operation::Divide => self.arithmetic(|a, b| a / b)?,
				Operation::Not => {
					let falsey = self.pop().is_falsey();
					self.stack.push(Value::Boolean(falsey));
				}
				Operation::Negate => match self.pop() {
					Value::Number(n) => self.stack.push(Value::Number(-n)),
					_ => return Err(RuntimeErrorKind::NumberOperand.into()),
				},
				Operation::Print => {
					let value = self.pop();
					let _ = writeln!(self.output, "{value}");
				}
			}
			self.ip += operation.width();
		}
	}

	// A stack underflow or an out-of-range slot means the chunk is
	// malformed; that aborts the process instead of becoming a user error.
	fn pop(&mut self) -> Value { self.stack.pop().expect("vm: operand stack underflow") }

	fn peek(&self, distance: usize) -> &Value { &self.stack[self.stack.len() - 1 - distance] }

	/// The one-byte slot operand of the current instruction.
	fn slot(&self) -> usize { self.chunk.byte(self.ip + 1) as usize }

	/// The two-byte jump operand of the current instruction.
	fn jump_offset(&self) -> usize { self.chunk.read_u16(self.ip + 1) as usize }

	fn read_constant(&self) -> &Value { self.chunk.constant(self.chunk.byte(self.ip + 1)) }

	/// The name constant of the current globals instruction.
	fn read_name(&self) -> &str {
		match self.read_constant() {
			Value::String(name) => name,
			value => panic!("vm: name constant holds {value:?} instead of a string"),
		}
	}

	fn arithmetic(&mut self, operation: fn(f64, f64) -> f64) -> Result<(), RuntimeError> {
		match (self.pop(), self.pop()) {
			(Value::Number(b), Value::Number(a)) => {
				self.stack.push(Value::Number(operation(a, b)));
				Ok(())
			}
			_ => Err(RuntimeErrorKind::NumberOperands.into()),
		}
	}

	fn comparison(&mut self, operation: fn(f64, f64) -> bool) -> Result<(), RuntimeError> {
		match (self.pop(), self.pop()) {
			(Value::Number(b), Value::Number(a)) => {
				self.stack.push(Value::Boolean(operation(a, b)));
				Ok(())
			}
			_ => Err(RuntimeErrorKind::NumberOperands.into()),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::compiler::compile;

	fn run(source: &str) -> String {
		let chunk = compile(source).unwrap();
		let mut output = Vec::new();
		Vm::with_output(chunk, &mut output).run().unwrap();
		String::from_utf8(output).unwrap()
	}

	fn run_error(source: &str) -> String {
		let chunk = compile(source).unwrap();
		Vm::with_output(chunk, Vec::new()).run().unwrap_err().to_string()
	}

	#[test]
	fn arithmetic_follows_precedence() {
		assert_eq!(run("print 1 + 2 * 3;"), "7\n");
		assert_eq!(run("print (1 + 2) * 3;"), "9\n");
		assert_eq!(run("print 10 - 2 - 3;"), "5\n");
		assert_eq!(run("print 8 / 2 / 2;"), "2\n");
		assert_eq!(run("print -3 + 1;"), "-2\n");
	}

	#[test]
	fn division_by_zero_follows_ieee() {
		assert_eq!(run("print 1 / 0;"), "inf\n");
		assert_eq!(run("print -1 / 0;"), "-inf\n");
		assert_eq!(run("print (0 / 0) == (0 / 0);"), "false\n");
	}

	#[test]
	fn string_concatenation() {
		assert_eq!(run(r#"print "hi" + " there";"#), "hi there\n");
		assert_eq!(run(r#"print "" + "x";"#), "x\n");
	}

	#[test]
	fn comparisons_and_equality() {
		assert_eq!(run("print 1 < 2;"), "true\n");
		assert_eq!(run("print 2 <= 2;"), "true\n");
		assert_eq!(run("print 1 > 2;"), "false\n");
		assert_eq!(run("print 2 >= 3;"), "false\n");
		assert_eq!(run("print 1 == 1;"), "true\n");
		assert_eq!(run("print 1 != 1;"), "false\n");
		assert_eq!(run(r#"print "a" == "a";"#), "true\n");
		assert_eq!(run("print 1 == true;"), "false\n");
		assert_eq!(run("print nil == nil;"), "true\n");
		assert_eq!(run("print nil == false;"), "false\n");
	}

	#[test]
	fn truthiness_in_not() {
		assert_eq!(run("print !nil;"), "true\n");
		assert_eq!(run("print !false;"), "true\n");
		assert_eq!(run("print !true;"), "false\n");
		assert_eq!(run("print !0;"), "false\n");
		assert_eq!(run(r#"print !"";"#), "false\n");
		assert_eq!(run("print !!nil;"), "false\n");
	}

	#[test]
	fn globals_define_get_and_set() {
		assert_eq!(run("var a = 1; print a;"), "1\n");
		assert_eq!(run("var a = 1; a = 2; print a;"), "2\n");
		assert_eq!(run("var a; print a;"), "nil\n");
		// Redefining with var overwrites.
		assert_eq!(run("var a = 1; var a = 2; print a;"), "2\n");
		// Globals persist across statements.
		assert_eq!(run("var a = 1; var b = a + 1; print a + b;"), "3\n");
	}

	#[test]
	fn assignment_is_an_expression() {
		assert_eq!(run("var x = 0; print x = 3; print x;"), "3\n3\n");
		assert_eq!(run("var x = 0; var y = 0; x = y = 5; print x + y;"), "10\n");
	}

	#[test]
	fn locals_shadow_and_expire() {
		assert_eq!(run(r#"var a = "global"; { var a = "local"; print a; } print a;"#), "local\nglobal\n");
		assert_eq!(run("{ var a = 1; { var b = a + 1; print b; } print a; }"), "2\n1\n");
	}

	#[test]
	fn local_assignment_keeps_the_value_on_the_stack() {
		assert_eq!(run("{ var a = 1; print a = 7; print a; }"), "7\n7\n");
	}

	#[test]
	fn if_branches() {
		assert_eq!(run(r#"var x = 10; if (x > 5) print "big"; else print "small";"#), "big\n");
		assert_eq!(run(r#"var x = 1; if (x > 5) print "big"; else print "small";"#), "small\n");
		assert_eq!(run("if (false) print 1;"), "");
		assert_eq!(run("if (1) print 1;"), "1\n");
	}

	#[test]
	fn while_loop_counts_down() {
		assert_eq!(run("var i = 3; while (i > 0) { print i; i = i - 1; }"), "3\n2\n1\n");
		assert_eq!(run("while (false) print 1;"), "");
	}

	#[test]
	fn for_loop_accumulates() {
		assert_eq!(run("var n = 0; for (var i = 0; i < 5; i = i + 1) { n = n + i; } print n;"), "10\n");
		assert_eq!(run("for (var i = 0; i < 3; i = i + 1) print i;"), "0\n1\n2\n");
		assert_eq!(run("var i = 0; for (; i < 2; i = i + 1) print i;"), "0\n1\n");
		assert_eq!(run("var i = 3; for (; i > 0;) { print i; i = i - 1; }"), "3\n2\n1\n");
	}

	#[test]
	fn and_short_circuits() {
		assert_eq!(run("print nil and 2;"), "nil\n");
		assert_eq!(run("print false and 2;"), "false\n");
		assert_eq!(run("print 1 and 2;"), "2\n");
		// The right side must not run when the left is falsey.
		assert_eq!(run("var a = 0; false and (a = 1); print a;"), "0\n");
		assert_eq!(run("var a = 0; true and (a = 1); print a;"), "1\n");
	}

	#[test]
	fn or_short_circuits() {
		assert_eq!(run("print 1 or 2;"), "1\n");
		assert_eq!(run(r#"print nil or "x";"#), "x\n");
		assert_eq!(run("print false or nil;"), "nil\n");
		// The right side must not run when the left is truthy.
		assert_eq!(run("var a = 0; true or (a = 1); print a;"), "0\n");
		assert_eq!(run("var a = 0; nil or (a = 1); print a;"), "1\n");
	}

	#[test]
	fn undefined_variables_fail() {
		assert_eq!(run_error("print x;"), "runtime error: undefined variable");
		assert_eq!(run_error("x = 1;"), "runtime error: undefined variable");
		assert_eq!(run_error("var a = a;"), "runtime error: undefined variable");
	}

	#[test]
	fn negate_requires_a_number() {
		assert_eq!(run_error(r#"-"hi";"#), "runtime error: operand must be a number");
		assert_eq!(run_error("-nil;"), "runtime error: operand must be a number");
	}

	#[test]
	fn arithmetic_requires_numbers() {
		assert_eq!(run_error(r#"1 - "x";"#), "runtime error: operands must be numbers");
		assert_eq!(run_error("true * 2;"), "runtime error: operands must be numbers");
		assert_eq!(run_error("nil / nil;"), "runtime error: operands must be numbers");
		assert_eq!(run_error("1 < nil;"), "runtime error: operands must be numbers");
		assert_eq!(run_error(r#""a" > "b";"#), "runtime error: operands must be numbers");
	}

	#[test]
	fn add_requires_matching_operand_kinds() {
		assert_eq!(run_error(r#"1 + "x";"#), "runtime error: operands must be two numbers or two strings");
		assert_eq!(run_error(r#""x" + 1;"#), "runtime error: operands must be two numbers or two strings");
		assert_eq!(run_error("1 + nil;"), "runtime error: operands must be two numbers or two strings");
	}

	#[test]
	fn trace_sink_receives_disassembly() {
		let chunk = compile("print 1;").unwrap();
		let vm = Vm::with_output(chunk, Vec::new());
		// The sink is write-only from out here; this exercises the plumbing.
		assert!(vm.trace_to(Box::new(Vec::new())).run().is_ok());
	}
}
