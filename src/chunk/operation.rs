use std::fmt;

/// One bytecode operation. The discriminant is the opcode byte, so the
/// numbering here is the single contract between the emitter and the
/// dispatch loop; `byte_round_trip` below pins it down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub(crate) enum Operation {
	Return = 0,
	Constant,
	Nil,
	True,
	False,
	Pop,
	DefineGlobal,
	GetGlobal,
	SetGlobal,
	GetLocal,
	SetLocal,
	Equal,
	Greater,
	Less,
	Add,
	Subtract,
	Multiply,
	Divide,
	Not,
	Negate,
	Print,
	Jump,
	JumpIfFalse,
	Loop,
}

impl Operation {
	/// Decode an opcode byte. A byte outside the opcode alphabet means the
	/// chunk is malformed, which is a bug in the emitter, not a user error.
	pub fn from_byte(byte: u8) -> Self {
		match byte {
			0 => Operation::Return,
			1 => Operation::Constant,
			2 => Operation::Nil,
			3 => Operation::True,
			4 => Operation::False,
			5 => Operation::Pop,
			6 => Operation::DefineGlobal,
			7 => Operation::GetGlobal,
			8 => Operation::SetGlobal,
			9 => Operation::GetLocal,
			10 => Operation::SetLocal,
			11 => Operation::Equal,
			12 => Operation::Greater,
			13 => Operation::Less,
			14 => Operation::Add,
			15 => Operation::Subtract,
			16 => Operation::Multiply,
			17 => Operation::Divide,
			18 => Operation::Not,
			19 => Operation::Negate,
			20 => Operation::Print,
			21 => Operation::Jump,
			22 => Operation::JumpIfFalse,
			23 => Operation::Loop,
			_ => panic!("chunk: unknown opcode byte {byte}"),
		}
	}

	/// Total instruction size in bytes: the opcode plus its operands. Both
	/// the dispatch loop and the disassembler step by this, so it must agree
	/// with what the compiler emits.
	pub fn width(self) -> usize {
		match self {
			Operation::Jump | Operation::JumpIfFalse | Operation::Loop => 3,
			Operation::Constant
			| Operation::DefineGlobal
			| Operation::GetGlobal
			| Operation::SetGlobal
			| Operation::GetLocal
			| Operation::SetLocal => 2,
			_ => 1,
		}
	}

	fn mnemonic(self) -> &'static str {
		match self {
			Operation::Return => "RETURN",
			Operation::Constant => "CONSTANT",
			Operation::Nil => "NIL",
			Operation::True => "TRUE",
			Operation::False => "FALSE",
			Operation::Pop => "POP",
			Operation::DefineGlobal => "DEFINE_GLOBAL",
			Operation::GetGlobal => "GET_GLOBAL",
			Operation::SetGlobal => "SET_GLOBAL",
			Operation::GetLocal => "GET_LOCAL",
			Operation::SetLocal => "SET_LOCAL",
			Operation::Equal => "EQUAL",
			Operation::Greater => "GREATER",
			Operation::Less => "LESS",
			Operation::Add => "ADD",
			Operation::Subtract => "SUBTRACT",
			Operation::Multiply => "MULTIPLY",
			Operation::Divide => "DIVIDE",
			Operation::Not => "NOT",
			Operation::Negate => "NEGATE",
			Operation::Print => "PRINT",
			Operation::Jump => "JUMP",
			Operation::JumpIfFalse => "JUMP_IF_FALSE",
			Operation::Loop => "LOOP",
		}
	}
}

impl fmt::Display for Operation {
	// f.pad so disassembly's 16-wide mnemonic column works.
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.pad(self.mnemonic()) }
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn byte_round_trip() {
		for byte in 0..=23u8 {
			assert_eq!(Operation::from_byte(byte) as u8, byte);
		}
	}

	#[test]
	#[should_panic(expected = "unknown opcode")]
	fn unknown_byte_panics() { Operation::from_byte(24); }

	#[test]
	fn widths() {
		assert_eq!(Operation::Return.width(), 1);
		assert_eq!(Operation::Add.width(), 1);
		assert_eq!(Operation::Constant.width(), 2);
		assert_eq!(Operation::DefineGlobal.width(), 2);
		assert_eq!(Operation::GetLocal.width(), 2);
		assert_eq!(Operation::Jump.width(), 3);
		assert_eq!(Operation::JumpIfFalse.width(), 3);
		assert_eq!(Operation::Loop.width(), 3);
	}

	#[test]
	fn display_pads_to_requested_width() {
		assert_eq!(format!("{}", Operation::Negate), "NEGATE");
		assert_eq!(format!("{:<16}", Operation::Negate), "NEGATE          ");
	}
}
