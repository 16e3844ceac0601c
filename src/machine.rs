use std::fmt;

/// Number of defined opcodes. Every byte at or above this value is a no-op.
pub const MAX_INSTRUCTION: u8 = 19;

/// Raw opcode values, for building programs by hand.
pub mod opcode {
    pub const INCREMENT_MEMORY_POINTER: u8 = 0;
    pub const DECREMENT_MEMORY_POINTER: u8 = 1;
    pub const INCREMENT_OFFSPRING_POINTER: u8 = 2;
    pub const DECREMENT_OFFSPRING_POINTER: u8 = 3;
    pub const INCREMENT_MEMORY_VALUE: u8 = 4;
    pub const DECREMENT_MEMORY_VALUE: u8 = 5;
    pub const READ_INPUT: u8 = 6;
    pub const WRITE_OUTPUT: u8 = 7;
    pub const COPY_OFFSPRING_TO_MEMORY: u8 = 8;
    pub const COPY_MEMORY_TO_OFFSPRING: u8 = 9;
    pub const JUMP_FORWARD_4: u8 = 10;
    pub const JUMP_BACKWARD_4: u8 = 11;
    pub const JUMP_FORWARD_16: u8 = 12;
    pub const JUMP_BACKWARD_16: u8 = 13;
    pub const JUMP_FORWARD_64: u8 = 14;
    pub const JUMP_BACKWARD_64: u8 = 15;
    pub const JUMP_FORWARD_256: u8 = 16;
    pub const JUMP_BACKWARD_256: u8 = 17;
    pub const HALT: u8 = 18;
}

/// A decoded instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Instruction {
    IncrementMemoryPointer,
    DecrementMemoryPointer,
    IncrementOffspringPointer,
    DecrementOffspringPointer,
    IncrementMemoryValue,
    DecrementMemoryValue,
    ReadInput,
    WriteOutput,
    CopyOffspringToMemory,
    CopyMemoryToOffspring,
    /// Relative jump, wrapping modulo the program length.
    Jump(isize),
    Halt,
}

/// Opcode -> instruction. Indexed by the raw byte.
const INSTRUCTIONS: [Instruction; MAX_INSTRUCTION as usize] = [
    Instruction::IncrementMemoryPointer,
    Instruction::DecrementMemoryPointer,
    Instruction::IncrementOffspringPointer,
    Instruction::DecrementOffspringPointer,
    Instruction::IncrementMemoryValue,
    Instruction::DecrementMemoryValue,
    Instruction::ReadInput,
    Instruction::WriteOutput,
    Instruction::CopyOffspringToMemory,
    Instruction::CopyMemoryToOffspring,
    Instruction::Jump(4),
    Instruction::Jump(-4),
    Instruction::Jump(16),
    Instruction::Jump(-16),
    Instruction::Jump(64),
    Instruction::Jump(-64),
    Instruction::Jump(256),
    Instruction::Jump(-256),
    Instruction::Halt,
];

impl Instruction {
    /// Decode a program byte. Returns `None` for bytes that are no-ops.
    #[inline]
    pub fn decode(byte: u8) -> Option<Instruction> {
        INSTRUCTIONS.get(byte as usize).copied()
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::IncrementMemoryPointer => write!(f, "mp+"),
            Instruction::DecrementMemoryPointer => write!(f, "mp-"),
            Instruction::IncrementOffspringPointer => write!(f, "op+"),
            Instruction::DecrementOffspringPointer => write!(f, "op-"),
            Instruction::IncrementMemoryValue => write!(f, "inc"),
            Instruction::DecrementMemoryValue => write!(f, "dec"),
            Instruction::ReadInput => write!(f, "read"),
            Instruction::WriteOutput => write!(f, "write"),
            Instruction::CopyOffspringToMemory => write!(f, "load"),
            Instruction::CopyMemoryToOffspring => write!(f, "store"),
            Instruction::Jump(delta) => write!(f, "jmp {delta:+}"),
            Instruction::Halt => write!(f, "halt"),
        }
    }
}

/// How the offspring buffer is initialized before each execution.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OffspringInit {
    /// All zero bytes.
    Zeroed,
    /// A copy of the program about to run.
    #[default]
    Program,
}

/// Statistics returned by one execution.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExecutionResult {
    pub cycles: usize,
    pub input_consumed: usize,
    pub output_produced: usize,
}

/// The bounded-cycle interpreter.
///
/// Runs a program over four buffers:
/// - memory: the working tape, addressed by the memory pointer
/// - offspring: the successor being authored, addressed by the offspring pointer
/// - input: read-only, consumed front to back
/// - output: write-only, filled front to back up to its capacity
///
/// Both pointers start at 0 and wrap modulo their buffer length. Memory
/// values wrap modulo 256. There is no conditional branching; jumps are
/// relative and wrap modulo the program length.
#[derive(Clone, Copy, Debug)]
pub struct Machine {
    /// Maximum number of instructions per execution.
    pub cycle_limit: usize,
    /// Wrap the program counter to 0 instead of halting past the last byte.
    pub wrap_program_counter: bool,
}

impl Machine {
    pub fn new(cycle_limit: usize) -> Self {
        Self {
            cycle_limit,
            wrap_program_counter: false,
        }
    }

    /// Execute `program` from its first byte.
    ///
    /// Stops on `Halt`, on reaching the cycle limit, or (without program
    /// counter wrapping) on running past the last byte. Never fails: bytes
    /// that are not instructions, exhausted input and full output are all
    /// no-ops.
    pub fn execute(
        &self,
        program: &[u8],
        offspring: &mut [u8],
        memory: &mut [u8],
        input: &[u8],
        output: &mut [u8],
    ) -> ExecutionResult {
        let len = program.len();
        let memory_len = memory.len();
        let offspring_len = offspring.len();
        let mut result = ExecutionResult::default();
        if len == 0 || memory_len == 0 {
            return result;
        }

        let mut pc: usize = 0;
        let mut mp: usize = 0;
        let mut op: usize = 0;

        while result.cycles < self.cycle_limit {
            result.cycles += 1;
            match Instruction::decode(program[pc]) {
                Some(Instruction::IncrementMemoryPointer) => mp = forward(mp, memory_len),
                Some(Instruction::DecrementMemoryPointer) => mp = backward(mp, memory_len),
                Some(Instruction::IncrementOffspringPointer) if offspring_len > 0 => {
                    op = forward(op, offspring_len)
                }
                Some(Instruction::DecrementOffspringPointer) if offspring_len > 0 => {
                    op = backward(op, offspring_len)
                }
                Some(Instruction::IncrementMemoryValue) => {
                    memory[mp] = memory[mp].wrapping_add(1);
                }
                Some(Instruction::DecrementMemoryValue) => {
                    memory[mp] = memory[mp].wrapping_sub(1);
                }
                Some(Instruction::ReadInput) => {
                    if let Some(&byte) = input.get(result.input_consumed) {
                        memory[mp] = byte;
                        result.input_consumed += 1;
                    }
                }
                Some(Instruction::WriteOutput) => {
                    if let Some(slot) = output.get_mut(result.output_produced) {
                        *slot = memory[mp];
                        result.output_produced += 1;
                    }
                }
                Some(Instruction::CopyOffspringToMemory) if offspring_len > 0 => {
                    memory[mp] = offspring[op];
                }
                Some(Instruction::CopyMemoryToOffspring) if offspring_len > 0 => {
                    offspring[op] = memory[mp];
                }
                Some(Instruction::Jump(delta)) => {
                    pc = jump(pc, delta, len);
                    continue;
                }
                Some(Instruction::Halt) => break,
                // Offspring instructions with no offspring buffer, and garbage bytes.
                _ => {}
            }

            pc += 1;
            if pc == len {
                if !self.wrap_program_counter {
                    break;
                }
                pc = 0;
            }
        }

        result
    }

    /// Prepare `scratch` for `program` and execute it against `input`.
    ///
    /// After the call the produced output sits in `scratch.output` and the
    /// authored successor in `scratch.offspring`.
    pub fn run(
        &self,
        program: &[u8],
        input: &[u8],
        scratch: &mut Scratch,
        init: OffspringInit,
    ) -> ExecutionResult {
        scratch.prepare(program, init);
        self.execute(
            program,
            &mut scratch.offspring,
            &mut scratch.memory,
            input,
            &mut scratch.output,
        )
    }
}

#[inline]
fn forward(pos: usize, len: usize) -> usize {
    if pos + 1 == len { 0 } else { pos + 1 }
}

#[inline]
fn backward(pos: usize, len: usize) -> usize {
    if pos == 0 { len - 1 } else { pos - 1 }
}

#[inline]
fn jump(pc: usize, delta: isize, len: usize) -> usize {
    (pc as isize + delta).rem_euclid(len as isize) as usize
}

/// Per-worker execution buffers. Never shared between concurrent executions.
#[derive(Clone, Debug)]
pub struct Scratch {
    pub memory: Vec<u8>,
    pub output: Vec<u8>,
    pub offspring: Vec<u8>,
}

impl Scratch {
    pub fn new(memory_size: usize, output_capacity: usize, program_size: usize) -> Self {
        Self {
            memory: vec![0; memory_size],
            output: vec![0; output_capacity],
            offspring: vec![0; program_size],
        }
    }

    /// Zero memory and output, then seed the offspring buffer.
    pub fn prepare(&mut self, program: &[u8], init: OffspringInit) {
        self.memory.fill(0);
        self.output.fill(0);
        match init {
            OffspringInit::Zeroed => self.offspring.fill(0),
            OffspringInit::Program => {
                let n = program.len().min(self.offspring.len());
                self.offspring[..n].copy_from_slice(&program[..n]);
                self.offspring[n..].fill(0);
            }
        }
    }
}

/// Pretty-print a disassembly of `program`, one instruction per line.
pub fn disassemble(program: &[u8]) -> String {
    let mut out = String::new();
    for (i, &byte) in program.iter().enumerate() {
        match Instruction::decode(byte) {
            Some(instr) => out.push_str(&format!("{i:04x}: {instr}\n")),
            None => out.push_str(&format!("{i:04x}: nop 0x{byte:02x}\n")),
        }
    }
    out
}
