//! The single-pass compiler.
//!
//! There is no syntax tree. A Pratt parser pulls tokens from the scanner and
//! emits bytecode into a [`Chunk`] while it parses: the prefix and infix
//! actions in the rule table are also the code generators. That single-pass
//! discipline is what makes the rest work without a second walk:
//!
//! - jump targets are unknown while a branch is being compiled, so jumps are
//!   emitted with placeholder operands and patched once the target offset is
//!   known (back-patching);
//! - a local variable's slot is simply its position in the compile-time
//!   locals stack, because every expression leaves exactly one value behind
//!   and every statement leaves none, so at runtime the operand stack lines
//!   up with the locals the compiler was tracking.
//!
//! Compilation aborts at the first scan or compile error; there is no
//! synchronizing recovery step.

mod precedence;

use anyhow::Context;

use crate::{
	chunk::{Chunk, Operation},
	compiler::precedence::{rule, ParseFn, Precedence},
	error::{
		compiler::{CompileError, CompileErrorKind},
		Error,
	},
	scanner::{Scanner, Token, TokenKind},
	value::Value,
};

/// Local slots are one byte, like constant indices.
const MAX_LOCALS: usize = 256;

/// Compile a source unit into a bytecode chunk, stopping at the first scan
/// or compile error.
pub fn compile(source: &str) -> Result<Chunk, Error> { Compiler::new(source).run() }

/// A local variable known at compile time. Its slot number is its position
/// in the compiler's locals stack.
struct Local<'a> {
	/// The identifier token that declared the local.
	name:  Token<'a>,
	/// Scope depth the local was declared at; None until its initializer has
	/// finished, which is how reads of `var x = x;` are caught.
	depth: Option<usize>,
}

/// Parser state plus the chunk under construction.
struct Compiler<'a> {
	scanner:     Scanner<'a>,
	previous:    Token<'a>,
	current:     Token<'a>,
	chunk:       Chunk,
	locals:      Vec<Local<'a>>,
	scope_depth: usize,
}

impl<'a> Compiler<'a> {
	fn new(source: &'a str) -> Self {
		// Both token slots hold a placeholder until the first advance.
		let placeholder = Token::new(TokenKind::Eof, "", 1);
		Self {
			scanner: Scanner::new(source),
			previous: placeholder,
			current: placeholder,
			chunk: Chunk::new(),
			locals: Vec::new(),
			scope_depth: 0,
		}
	}

	fn run(mut self) -> Result<Chunk, Error> {
		self.advance()?;
		while !self.check(TokenKind::Eof) {
			self.declaration()?;
		}
		self.consume(TokenKind::Eof, CompileErrorKind::MissingExprEnd)?;
		self.emit(Operation::Return);
		Ok(self.chunk)
	}

	// ---- token plumbing ----

	fn advance(&mut self) -> Result<(), Error> {
		self.previous = self.current;
		self.current = self.scanner.next_token()?;
		Ok(())
	}

	fn check(&self, kind: TokenKind) -> bool { self.current.kind == kind }

	/// Consume the current token if it matches.
	fn matches(&mut self, kind: TokenKind) -> Result<bool, Error> {
		if !self.check(kind) {
			return Ok(false);
		}
		self.advance()?;
		Ok(true)
	}

	/// Require the current token to match, or fail with the given kind.
	fn consume(&mut self, kind: TokenKind, error: CompileErrorKind) -> Result<(), Error> {
		if self.check(kind) {
			return self.advance();
		}
		Err(CompileError::at(error, &self.current).into())
	}

	// ---- emission ----

	fn emit(&mut self, operation: Operation) { self.chunk.write(operation as u8, self.previous.line); }

	fn emit_with(&mut self, operation: Operation, operand: u8) {
		self.emit(operation);
		self.chunk.write(operand, self.previous.line);
	}

	fn make_constant(&mut self, value: Value) -> Result<u8, Error> {
		match self.chunk.add_constant(value) {
			Some(index) => Ok(index),
			None => Err(CompileError::at(CompileErrorKind::TooManyConstants, &self.previous).into()),
		}
	}

	fn emit_constant(&mut self, value: Value) -> Result<(), Error> {
		let index = self.make_constant(value)?;
		self.emit_with(Operation::Constant, index);
		Ok(())
	}

	/// Store an identifier's name as a string constant for the globals
	/// opcodes and return its index.
	fn identifier_constant(&mut self, name: Token<'a>) -> Result<u8, Error> {
		self.make_constant(Value::String(name.lexeme.to_string()))
	}

	/// Emit a jump with a placeholder operand and return the operand's index
	/// for later patching.
	fn emit_jump(&mut self, operation: Operation) -> usize {
		self.emit(operation);
		self.chunk.write(0xff, self.previous.line);
		self.chunk.write(0xff, self.previous.line);
		self.chunk.len() - 2
	}

	/// Point the placeholder at `index` to the current end of the code.
	fn patch_jump(&mut self, index: usize) -> Result<(), Error> {
		// The jump lands relative to the byte after the 3-byte instruction.
		let offset = self.chunk.len() - index - 2;
		if offset > u16::MAX as usize {
			return Err(CompileError::at(CompileErrorKind::JumpTooLarge, &self.previous).into());
		}
		let [high, low] = (offset as u16).to_be_bytes();
		self.chunk.patch(index, high);
		self.chunk.patch(index + 1, low);
		Ok(())
	}

	/// Emit a backward jump to a previously recorded code offset.
	fn emit_loop(&mut self, start: usize) -> Result<(), Error> {
		self.emit(Operation::Loop);
		let offset = self.chunk.len() - start + 2;
		if offset > u16::MAX as usize {
			return Err(CompileError::at(CompileErrorKind::LoopTooLarge, &self.previous).into());
		}
		let [high, low] = (offset as u16).to_be_bytes();
		self.chunk.write(high, self.previous.line);
		self.chunk.write(low, self.previous.line);
		Ok(())
	}

	// ---- declarations and statements ----

	fn declaration(&mut self) -> Result<(), Error> {
		if self.matches(TokenKind::Var)? { self.var_declaration() } else { self.statement() }
	}

	fn var_declaration(&mut self) -> Result<(), Error> {
		let global = self.parse_variable()?;
		if self.matches(TokenKind::Equal)? {
			self.expression()?;
		} else {
			self.emit(Operation::Nil);
		}
		self.consume(TokenKind::Semicolon, CompileErrorKind::MissingVarSemicolon)?;
		self.define_variable(global);
		Ok(())
	}

	/// Consume the variable name. At top level this returns the index of its
	/// name constant; inside a scope the name becomes a local instead and
	/// None comes back.
	fn parse_variable(&mut self) -> Result<Option<u8>, Error> {
		self.consume(TokenKind::Identifier, CompileErrorKind::MissingVarName)?;
		if self.scope_depth > 0 {
			self.declare_variable()?;
			return Ok(None);
		}
		Ok(Some(self.identifier_constant(self.previous)?))
	}

	/// Reserve a slot for a new local, still marked uninitialized.
	fn declare_variable(&mut self) -> Result<(), Error> {
		let name = self.previous;
		for local in self.locals.iter().rev() {
			if local.depth.is_some_and(|depth| depth < self.scope_depth) {
				break;
			}
			if local.name.lexeme == name.lexeme {
				return Err(CompileError::at(CompileErrorKind::VariableRedeclaration, &name).into());
			}
		}
		if self.locals.len() >= MAX_LOCALS {
			return Err(CompileError::at(CompileErrorKind::TooManyLocals, &name).into());
		}
		self.locals.push(Local { name, depth: None });
		Ok(())
	}

	/// A global gets a DEFINE_GLOBAL; a local's value is already sitting in
	/// its slot, so defining it just marks the local initialized.
	fn define_variable(&mut self, global: Option<u8>) {
		match global {
			Some(index) => self.emit_with(Operation::DefineGlobal, index),
			None => {
				let depth = self.scope_depth;
				if let Some(local) = self.locals.last_mut() {
					local.depth = Some(depth);
				}
			}
		}
	}

	fn statement(&mut self) -> Result<(), Error> {
		if self.matches(TokenKind::Print)? {
			self.print_statement()
		} else if self.matches(TokenKind::If)? {
			self.if_statement()
		} else if self.matches(TokenKind::While)? {
			self.while_statement()
		} else if self.matches(TokenKind::For)? {
			self.for_statement()
		} else if self.matches(TokenKind::LeftBrace)? {
			self.begin_scope();
			self.block()?;
			self.end_scope();
			Ok(())
		} else {
			self.expression_statement()
		}
	}

	fn print_statement(&mut self) -> Result<(), Error> {
		self.expression()?;
		self.consume(TokenKind::Semicolon, CompileErrorKind::MissingValueSemicolon)?;
		self.emit(Operation::Print);
		Ok(())
	}

	fn expression_statement(&mut self) -> Result<(), Error> {
		self.expression()?;
		self.consume(TokenKind::Semicolon, CompileErrorKind::MissingExprSemicolon)?;
		self.emit(Operation::Pop);
		Ok(())
	}

	fn block(&mut self) -> Result<(), Error> {
		while !self.check(TokenKind::RightBrace) && !self.check(TokenKind::Eof) {
			self.declaration()?;
		}
		self.consume(TokenKind::RightBrace, CompileErrorKind::MissingBlockRightBrace)
	}

	/// Each branch starts by popping the condition value, so the POP count
	/// balances on whichever path runs.
	fn if_statement(&mut self) -> Result<(), Error> {
		self.consume(TokenKind::LeftParen, CompileErrorKind::MissingIfLeftParen)?;
		self.expression()?;
		self.consume(TokenKind::RightParen, CompileErrorKind::MissingCondRightParen)?;

		let then_jump = self.emit_jump(Operation::JumpIfFalse);
		self.emit(Operation::Pop);
		self.statement()?;
		let else_jump = self.emit_jump(Operation::Jump);

		self.patch_jump(then_jump)?;
		self.emit(Operation::Pop);
		if self.matches(TokenKind::Else)? {
			self.statement()?;
		}
		self.patch_jump(else_jump)
	}

	fn while_statement(&mut self) -> Result<(), Error> {
		let loop_start = self.chunk.len();
		self.consume(TokenKind::LeftParen, CompileErrorKind::MissingWhileLeftParen)?;
		self.expression()?;
		self.consume(TokenKind::RightParen, CompileErrorKind::MissingCondRightParen)?;

		let exit_jump = self.emit_jump(Operation::JumpIfFalse);
		self.emit(Operation::Pop);
		self.statement()?;
		self.emit_loop(loop_start)?;

		self.patch_jump(exit_jump)?;
		self.emit(Operation::Pop);
		Ok(())
	}

	/// `for` is desugared in place. The increment clause appears before the
	/// body in the source but runs after it, so the clauses jump around each
	/// other: condition -> body -> increment -> condition.
	fn for_statement(&mut self) -> Result<(), Error> {
		self.begin_scope();
		self.consume(TokenKind::LeftParen, CompileErrorKind::MissingForLeftParen)?;
		if self.matches(TokenKind::Semicolon)? {
			// No initializer.
		} else if self.matches(TokenKind::Var)? {
			self.var_declaration()?;
		} else {
			self.expression_statement()?;
		}

		let mut loop_start = self.chunk.len();
		let mut exit_jump = None;
		if !self.matches(TokenKind::Semicolon)? {
			self.expression()?;
			self.consume(TokenKind::Semicolon, CompileErrorKind::MissingLoopCondSemicolon)?;
			exit_jump = Some(self.emit_jump(Operation::JumpIfFalse));
			self.emit(Operation::Pop);
		}

		if !self.matches(TokenKind::RightParen)? {
			let body_jump = self.emit_jump(Operation::Jump);
			let increment_start = self.chunk.len();
			self.expression()?;
			self.emit(Operation::Pop);
			self.consume(TokenKind::RightParen, CompileErrorKind::MissingForRightParen)?;

			self.emit_loop(loop_start)?;
			loop_start = increment_start;
			self.patch_jump(body_jump)?;
		}

		self.statement()?;
		self.emit_loop(loop_start)?;

		if let Some(exit_jump) = exit_jump {
			self.patch_jump(exit_jump)?;
			self.emit(Operation::Pop);
		}
		self.end_scope();
		Ok(())
	}

	// ---- scopes and name resolution ----

	fn begin_scope(&mut self) { self.scope_depth += 1; }

	/// Drop exactly the slots that belonged to the closed scope.
	fn end_scope(&mut self) {
		self.scope_depth -= 1;
		while self.locals.last().is_some_and(|local| local.depth.is_some_and(|d| d > self.scope_depth)) {
			self.emit(Operation::Pop);
			self.locals.pop();
		}
	}

	/// Find a local by lexeme, newest first. None means the name is a global.
	fn resolve_local(&self, name: &Token<'a>) -> Result<Option<u8>, Error> {
		for (slot, local) in self.locals.iter().enumerate().rev() {
			if local.name.lexeme == name.lexeme {
				if local.depth.is_none() {
					return Err(CompileError::at(CompileErrorKind::LocalInOwnInitializer, name).into());
				}
				return Ok(Some(slot as u8));
			}
		}
		Ok(None)
	}

	// ---- expressions ----

	fn expression(&mut self) -> Result<(), Error> { self.parse_precedence(Precedence::Assignment) }

	/// The precedence climb. Only contexts at assignment precedence or below
	/// may treat a following `=` as assignment; an `=` still pending after
	/// the climb means the target wasn't assignable.
	fn parse_precedence(&mut self, min: Precedence) -> Result<(), Error> {
		self.advance()?;
		let can_assign = min <= Precedence::Assignment;
		self.apply(rule(self.previous.kind).prefix, can_assign)?;

		while min <= rule(self.current.kind).precedence {
			self.advance()?;
			self.apply(rule(self.previous.kind).infix, can_assign)?;
		}

		if can_assign && self.check(TokenKind::Equal) {
			return Err(CompileError::at(CompileErrorKind::InvalidAssignTarget, &self.current).into());
		}
		Ok(())
	}

	/// Resolve a parse action tag to its routine.
	fn apply(&mut self, function: ParseFn, can_assign: bool) -> Result<(), Error> {
		match function {
			ParseFn::Number => self.number(),
			ParseFn::String => self.string(),
			ParseFn::Literal => {
				self.literal();
				Ok(())
			}
			ParseFn::Grouping => self.grouping(),
			ParseFn::Unary => self.unary(),
			ParseFn::Binary => self.binary(),
			ParseFn::Variable => self.variable(can_assign),
			ParseFn::And => self.and(),
			ParseFn::Or => self.or(),
			ParseFn::None => Err(CompileError::at(CompileErrorKind::MissingExpr, &self.previous).into()),
		}
	}

	fn number(&mut self) -> Result<(), Error> {
		let number = self.previous.lexeme.parse().context("Failed to parse number literal")?;
		self.emit_constant(Value::Number(number))
	}

	/// The lexeme still carries the surrounding quotes; strip them.
	fn string(&mut self) -> Result<(), Error> {
		let lexeme = self.previous.lexeme;
		self.emit_constant(Value::String(lexeme[1..lexeme.len() - 1].to_string()))
	}

	fn literal(&mut self) {
		match self.previous.kind {
			TokenKind::Nil => self.emit(Operation::Nil),
			TokenKind::False => self.emit(Operation::False),
			TokenKind::True => self.emit(Operation::True),
			kind => unreachable!("no literal for token kind {kind:?}"),
		}
	}

	fn grouping(&mut self) -> Result<(), Error> {
		self.expression()?;
		self.consume(TokenKind::RightParen, CompileErrorKind::MissingExprRightParen)
	}

	fn unary(&mut self) -> Result<(), Error> {
		let operator = self.previous.kind;
		self.parse_precedence(Precedence::Unary)?;
		match operator {
			TokenKind::Minus => self.emit(Operation::Negate),
			TokenKind::Bang => self.emit(Operation::Not),
			kind => unreachable!("no unary operation for token kind {kind:?}"),
		}
		Ok(())
	}

	/// The right-hand side parses one level above the operator's own
	/// precedence, which keeps chains left-associative.
	fn binary(&mut self) -> Result<(), Error> {
		let operator = self.previous.kind;
		self.parse_precedence(rule(operator).precedence.next())?;
		match operator {
			TokenKind::Plus => self.emit(Operation::Add),
			TokenKind::Minus => self.emit(Operation::Subtract),
			TokenKind::Star => self.emit(Operation::Multiply),
			TokenKind::Slash => self.emit(Operation::Divide),
			TokenKind::EqualEqual => self.emit(Operation::Equal),
			TokenKind::Greater => self.emit(Operation::Greater),
			TokenKind::Less => self.emit(Operation::Less),
			TokenKind::BangEqual => {
				self.emit(Operation::Equal);
				self.emit(Operation::Not);
			}
			TokenKind::GreaterEqual => {
				self.emit(Operation::Less);
				self.emit(Operation::Not);
			}
			TokenKind::LessEqual => {
				self.emit(Operation::Greater);
				self.emit(Operation::Not);
			}
			kind => unreachable!("no binary operation for token kind {kind:?}"),
		}
		Ok(())
	}

	fn variable(&mut self, can_assign: bool) -> Result<(), Error> {
		self.named_variable(self.previous, can_assign)
	}

	fn named_variable(&mut self, name: Token<'a>, can_assign: bool) -> Result<(), Error> {
		let (get, set, operand) = match self.resolve_local(&name)? {
			Some(slot) => (Operation::GetLocal, Operation::SetLocal, slot),
			None => (Operation::GetGlobal, Operation::SetGlobal, self.identifier_constant(name)?),
		};
		if can_assign && self.matches(TokenKind::Equal)? {
			self.expression()?;
			self.emit_with(set, operand);
		} else {
			self.emit_with(get, operand);
		}
		Ok(())
	}

	/// `and` keeps its left value when that value is falsey, skipping the
	/// right operand entirely.
	fn and(&mut self) -> Result<(), Error> {
		let end_jump = self.emit_jump(Operation::JumpIfFalse);
		self.emit(Operation::Pop);
		self.parse_precedence(Precedence::And)?;
		self.patch_jump(end_jump)
	}

	/// `or` keeps its left value when that value is truthy.
	fn or(&mut self) -> Result<(), Error> {
		let else_jump = self.emit_jump(Operation::JumpIfFalse);
		let end_jump = self.emit_jump(Operation::Jump);

		self.patch_jump(else_jump)?;
		self.emit(Operation::Pop);
		self.parse_precedence(Precedence::Or)?;
		self.patch_jump(end_jump)
	}
}
