//! Action definitions.
//!
//! Actions follow the SWF action record layout: codes below `0x80` are a
//! single byte, codes from `0x80` up carry a 16-bit little-endian payload
//! length followed by the payload. Every length computed here must match
//! what [`Instruction::write`] produces, since branch offsets are planned
//! from these lengths before anything is written.

use crate::config::CompileOptions;
use crate::error::Result;

/// Size of a `Jump`/`If` record, and of the placeholders that become one.
pub const BRANCH_LEN: usize = 5;

/// An ordered run of actions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionSequence {
    /// The instructions
    pub instructions: Vec<Instruction>,
}

impl ActionSequence {
    /// Creates an empty sequence.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an instruction and returns its index.
    pub fn emit(&mut self, instruction: Instruction) -> usize {
        let index = self.instructions.len();
        self.instructions.push(instruction);
        index
    }

    /// Appends a single-byte action.
    pub fn op(&mut self, opcode: OpCode) -> usize {
        self.emit(Instruction::simple(opcode))
    }

    /// Appends a one-value push.
    pub fn push(&mut self, value: PushValue) -> usize {
        self.emit(Instruction::push(value))
    }

    /// Last instruction, if any.
    pub fn last(&self) -> Option<&Instruction> {
        self.instructions.last()
    }

    /// Removes and returns the last instruction.
    pub fn pop(&mut self) -> Option<Instruction> {
        self.instructions.pop()
    }

    /// Moves every instruction of `other` to the end of this sequence.
    pub fn append(&mut self, mut other: ActionSequence) {
        self.instructions.append(&mut other.instructions);
    }

    /// Number of instructions.
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// True when no instruction has been emitted.
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Iterates over the instructions.
    pub fn iter(&self) -> std::slice::Iter<'_, Instruction> {
        self.instructions.iter()
    }

    /// Total encoded size in bytes.
    pub fn encoded_len(&self, options: &CompileOptions) -> Result<usize> {
        self.instructions
            .iter()
            .map(|instruction| instruction.encoded_len(options))
            .sum()
    }

    /// True when the last instruction is a break/continue placeholder.
    pub fn ends_with_placeholder(&self) -> bool {
        self.last().is_some_and(Instruction::is_placeholder)
    }
}

impl<'a> IntoIterator for &'a ActionSequence {
    type Item = &'a Instruction;
    type IntoIter = std::slice::Iter<'a, Instruction>;

    fn into_iter(self) -> Self::IntoIter {
        self.instructions.iter()
    }
}

/// A single action.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    /// The operation code
    pub opcode: OpCode,
    /// Optional operand
    pub operand: Option<Operand>,
}

impl Instruction {
    /// Creates a new instruction with no operand.
    pub fn simple(opcode: OpCode) -> Self {
        Self {
            opcode,
            operand: None,
        }
    }

    /// Creates a new instruction with an operand.
    pub fn with_operand(opcode: OpCode, operand: Operand) -> Self {
        Self {
            opcode,
            operand: Some(operand),
        }
    }

    /// `Push` of one value.
    pub fn push(value: PushValue) -> Self {
        Self::with_operand(OpCode::Push, Operand::Push(value))
    }

    /// Unconditional relative jump.
    pub fn jump(offset: i16) -> Self {
        Self::with_operand(OpCode::Jump, Operand::Offset(offset))
    }

    /// Jump taken when the popped value is true.
    pub fn branch_if(offset: i16) -> Self {
        Self::with_operand(OpCode::If, Operand::Offset(offset))
    }

    /// True for the break/continue pseudo-instructions.
    pub fn is_placeholder(&self) -> bool {
        self.opcode.is_placeholder()
    }

    /// Size in bytes once encoded, including nested bodies.
    pub fn encoded_len(&self, options: &CompileOptions) -> Result<usize> {
        if self.opcode.is_placeholder() {
            return Ok(BRANCH_LEN);
        }
        if !self.opcode.is_long() {
            return Ok(1);
        }
        Ok(3 + self.record_len(options)? + self.body_len(options)?)
    }

    /// Value of the record's 16-bit length field.
    pub(crate) fn record_len(&self, options: &CompileOptions) -> Result<usize> {
        let Some(operand) = &self.operand else {
            return Ok(0);
        };
        Ok(match operand {
            Operand::Push(value) => 1 + value.data_len(options)?,
            Operand::Offset(_) | Operand::Frame(_) => 2,
            Operand::Register(_) | Operand::UrlFlags(_) | Operand::Play(_) => 1,
            Operand::Label(label) => options.c_string_len(label)?,
            Operand::Url { url, target } => {
                options.c_string_len(url)? + options.c_string_len(target)?
            }
            Operand::Pool(strings) => {
                let mut len = 2;
                for s in strings {
                    len += options.c_string_len(s)?;
                }
                len
            }
            Operand::Function { name, params, .. } => {
                let mut len = options.c_string_len(name)? + 2;
                for param in params {
                    len += options.c_string_len(param)?;
                }
                len + 2
            }
            Operand::Block(_) => 2,
        })
    }

    /// Size of the body that follows the record (functions, `with`).
    pub(crate) fn body_len(&self, options: &CompileOptions) -> Result<usize> {
        match &self.operand {
            Some(Operand::Function { body, .. }) | Some(Operand::Block(body)) => {
                body.encoded_len(options)
            }
            _ => Ok(0),
        }
    }
}

/// Instruction operands.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Value for `Push`
    Push(PushValue),
    /// Relative branch offset, measured from the end of the branch
    Offset(i16),
    /// Register number for `StoreRegister`
    Register(u8),
    /// Zero-based frame for `GotoFrame`
    Frame(u16),
    /// Frame label or target path
    Label(String),
    /// Static `GetUrl` strings
    Url {
        /// URL
        url: String,
        /// Window or target
        target: String,
    },
    /// `GetUrl2` flag byte
    UrlFlags(u8),
    /// `GotoFrame2` play flag
    Play(bool),
    /// `ConstantPool` entries
    Pool(Vec<String>),
    /// `DefineFunction` header and body
    Function {
        /// Function name, empty for function expressions
        name: String,
        /// Parameter names
        params: Vec<String>,
        /// Body actions
        body: ActionSequence,
    },
    /// `With` body
    Block(ActionSequence),
}

/// A value carried by `Push`.
#[derive(Debug, Clone, PartialEq)]
pub enum PushValue {
    /// Inline string
    Str(String),
    /// `null`
    Null,
    /// `undefined`
    Undefined,
    /// Register contents
    Register(u8),
    /// Boolean
    Bool(bool),
    /// IEEE double
    Double(f64),
    /// 32-bit integer
    Integer(i32),
    /// Constant pool entry below 256
    Constant8(u8),
    /// Constant pool entry
    Constant16(u16),
}

impl PushValue {
    /// Type tag written before the value.
    pub fn type_code(&self) -> u8 {
        match self {
            PushValue::Str(_) => 0,
            PushValue::Null => 2,
            PushValue::Undefined => 3,
            PushValue::Register(_) => 4,
            PushValue::Bool(_) => 5,
            PushValue::Double(_) => 6,
            PushValue::Integer(_) => 7,
            PushValue::Constant8(_) => 8,
            PushValue::Constant16(_) => 9,
        }
    }

    /// Bytes after the type tag.
    pub fn data_len(&self, options: &CompileOptions) -> Result<usize> {
        Ok(match self {
            PushValue::Str(s) => options.c_string_len(s)?,
            PushValue::Null | PushValue::Undefined => 0,
            PushValue::Register(_) | PushValue::Bool(_) | PushValue::Constant8(_) => 1,
            PushValue::Constant16(_) => 2,
            PushValue::Integer(_) => 4,
            PushValue::Double(_) => 8,
        })
    }
}

/// Action codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpCode {
    // Timeline control
    /// Advance one frame
    NextFrame = 0x04,
    /// Go back one frame
    PrevFrame = 0x05,
    /// Start playing
    Play = 0x06,
    /// Stop playing
    Stop = 0x07,
    /// Toggle display quality
    ToggleQuality = 0x08,
    /// Silence all sounds
    StopSounds = 0x09,

    // Legacy numeric operations
    /// Numeric add
    Add = 0x0A,
    /// Subtract
    Subtract = 0x0B,
    /// Multiply
    Multiply = 0x0C,
    /// Divide
    Divide = 0x0D,
    /// Numeric equality
    Equals = 0x0E,
    /// Numeric less-than
    Less = 0x0F,
    /// Logical and of two numbers
    And = 0x10,
    /// Logical or of two numbers
    Or = 0x11,
    /// Logical not
    Not = 0x12,

    // Strings and variables
    /// String equality
    StringEquals = 0x13,
    /// String length
    StringLength = 0x14,
    /// Substring
    StringExtract = 0x15,
    /// Discard the top value
    Pop = 0x17,
    /// Truncate to integer
    ToInteger = 0x18,
    /// Read a variable by name
    GetVariable = 0x1C,
    /// Write a variable by name
    SetVariable = 0x1D,
    /// Change the target clip to a popped path
    SetTarget2 = 0x20,
    /// Concatenate strings
    StringAdd = 0x21,
    /// Read a clip property by index
    GetProperty = 0x22,
    /// Write a clip property by index
    SetProperty = 0x23,
    /// Duplicate a clip
    CloneSprite = 0x24,
    /// Remove a duplicated clip
    RemoveSprite = 0x25,
    /// Debug output
    Trace = 0x26,
    /// Begin dragging a clip
    StartDrag = 0x27,
    /// Stop dragging
    EndDrag = 0x28,
    /// String less-than
    StringLess = 0x29,
    /// Random integer below the popped bound
    RandomNumber = 0x30,
    /// Multibyte string length
    MbStringLength = 0x31,
    /// Character to code
    CharToAscii = 0x32,
    /// Code to character
    AsciiToChar = 0x33,
    /// Milliseconds since start
    GetTime = 0x34,
    /// Multibyte substring
    MbStringExtract = 0x35,
    /// Multibyte character to code
    MbCharToAscii = 0x36,
    /// Multibyte code to character
    MbAsciiToChar = 0x37,

    // Objects and functions
    /// Delete a member
    Delete = 0x3A,
    /// Delete a variable
    Delete2 = 0x3B,
    /// Define a local with a value
    DefineLocal = 0x3C,
    /// Call a function by name
    CallFunction = 0x3D,
    /// Return from a function
    Return = 0x3E,
    /// Remainder
    Modulo = 0x3F,
    /// Construct an object
    NewObject = 0x40,
    /// Define a local without a value
    DefineLocal2 = 0x41,
    /// Build an array
    InitArray = 0x42,
    /// Build an object
    InitObject = 0x43,
    /// Type name of a value
    TypeOf = 0x44,
    /// Path of a clip
    TargetPath = 0x45,
    /// Enumerate members of a named object
    Enumerate = 0x46,
    /// Typed add
    Add2 = 0x47,
    /// Typed less-than
    Less2 = 0x48,
    /// Typed equality
    Equals2 = 0x49,
    /// Convert to number
    ToNumber = 0x4A,
    /// Convert to string
    ToString = 0x4B,
    /// Duplicate the top value
    PushDuplicate = 0x4C,
    /// Swap the top two values
    StackSwap = 0x4D,
    /// Read a member
    GetMember = 0x4E,
    /// Write a member
    SetMember = 0x4F,
    /// Add one
    Increment = 0x50,
    /// Subtract one
    Decrement = 0x51,
    /// Call a method
    CallMethod = 0x52,
    /// Construct through a method
    NewMethod = 0x53,
    /// `instanceof` (version 6)
    InstanceOf = 0x54,
    /// Enumerate members of an object value (version 6)
    Enumerate2 = 0x55,

    // Bitwise operations
    /// Bitwise and
    BitAnd = 0x60,
    /// Bitwise or
    BitOr = 0x61,
    /// Bitwise xor
    BitXor = 0x62,
    /// Left shift
    BitLShift = 0x63,
    /// Signed right shift
    BitRShift = 0x64,
    /// Unsigned right shift
    BitURShift = 0x65,
    /// Strict equality (version 6)
    StrictEquals = 0x66,
    /// Typed greater-than (version 6)
    Greater = 0x67,
    /// String greater-than (version 6)
    StringGreater = 0x68,

    // Records with a payload
    /// Go to a fixed frame
    GotoFrame = 0x81,
    /// Load a fixed URL
    GetUrl = 0x83,
    /// Copy the top value into a register
    StoreRegister = 0x87,
    /// Define the constant pool
    ConstantPool = 0x88,
    /// Change the target clip to a fixed path
    SetTarget = 0x8B,
    /// Go to a fixed frame label
    GoToLabel = 0x8C,
    /// Scope block
    With = 0x94,
    /// Push a value
    Push = 0x96,
    /// Unconditional branch
    Jump = 0x99,
    /// Load a URL from the stack
    GetUrl2 = 0x9A,
    /// Define a function
    DefineFunction = 0x9B,
    /// Branch if true
    If = 0x9D,
    /// Run the actions of a frame
    Call = 0x9E,
    /// Go to a frame from the stack
    GotoFrame2 = 0x9F,

    // Placeholders, resolved before encoding
    /// Pending jump to the innermost loop or switch exit
    Break = 0xF0,
    /// Pending jump to the innermost loop's next iteration
    Continue = 0xF1,
}

impl OpCode {
    /// Raw action code.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Records with a length field.
    pub fn is_long(self) -> bool {
        self.code() >= 0x80 && !self.is_placeholder()
    }

    /// Break/continue pseudo-instructions.
    pub fn is_placeholder(self) -> bool {
        matches!(self, OpCode::Break | OpCode::Continue)
    }

    /// First VM version that understands the action.
    pub fn min_version(self) -> u8 {
        match self {
            OpCode::InstanceOf
            | OpCode::Enumerate2
            | OpCode::StrictEquals
            | OpCode::Greater
            | OpCode::StringGreater => 6,
            _ => 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StringEncoding;

    fn options() -> CompileOptions {
        CompileOptions::default()
    }

    #[test]
    fn test_simple_actions_are_one_byte() {
        assert_eq!(Instruction::simple(OpCode::Pop).encoded_len(&options()).unwrap(), 1);
        assert_eq!(Instruction::simple(OpCode::Add2).encoded_len(&options()).unwrap(), 1);
    }

    #[test]
    fn test_branch_lengths() {
        assert_eq!(Instruction::jump(0).encoded_len(&options()).unwrap(), BRANCH_LEN);
        assert_eq!(Instruction::branch_if(-3).encoded_len(&options()).unwrap(), BRANCH_LEN);
        assert_eq!(
            Instruction::simple(OpCode::Break).encoded_len(&options()).unwrap(),
            BRANCH_LEN
        );
    }

    #[test]
    fn test_push_lengths_depend_on_value() {
        let len = |value| Instruction::push(value).encoded_len(&options()).unwrap();
        assert_eq!(len(PushValue::Integer(5)), 8);
        assert_eq!(len(PushValue::Double(0.5)), 12);
        assert_eq!(len(PushValue::Null), 4);
        assert_eq!(len(PushValue::Constant8(3)), 5);
        assert_eq!(len(PushValue::Str("abc".into())), 8);
    }

    #[test]
    fn test_push_string_length_depends_on_encoding() {
        let push = Instruction::push(PushValue::Str("\u{e9}t\u{e9}".into()));
        let latin1 = CompileOptions::default().with_encoding(StringEncoding::Latin1);
        assert_eq!(push.encoded_len(&options()).unwrap(), 3 + 1 + 6);
        assert_eq!(push.encoded_len(&latin1).unwrap(), 3 + 1 + 4);
    }

    #[test]
    fn test_function_length_includes_body() {
        let mut body = ActionSequence::new();
        body.op(OpCode::Stop);
        body.op(OpCode::Return);
        let define = Instruction::with_operand(
            OpCode::DefineFunction,
            Operand::Function {
                name: "f".into(),
                params: vec!["a".into()],
                body,
            },
        );
        // header 3 + "f\0" 2 + count 2 + "a\0" 2 + size 2 + body 2
        assert_eq!(define.encoded_len(&options()).unwrap(), 13);
    }

    #[test]
    fn test_sequence_helpers() {
        let mut seq = ActionSequence::new();
        seq.push(PushValue::Integer(1));
        seq.op(OpCode::Trace);
        assert_eq!(seq.len(), 2);
        assert_eq!(seq.encoded_len(&options()).unwrap(), 9);
        assert_eq!(seq.pop().map(|i| i.opcode), Some(OpCode::Trace));
        assert!(!seq.ends_with_placeholder());
        seq.op(OpCode::Continue);
        assert!(seq.ends_with_placeholder());
    }

    #[test]
    fn test_version_six_opcodes() {
        assert_eq!(OpCode::StrictEquals.min_version(), 6);
        assert_eq!(OpCode::Equals2.min_version(), 5);
        assert!(OpCode::Push.is_long());
        assert!(!OpCode::Break.is_long());
    }
}
