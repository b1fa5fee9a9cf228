//! Byte encoding of actions.
//!
//! Produces exactly [`Instruction::encoded_len`] bytes per instruction.

use crate::compiler::bytecode::{ActionSequence, Instruction, Operand, PushValue};
use crate::config::CompileOptions;
use crate::error::{CompileError, Result};

impl ActionSequence {
    /// Writes every instruction to `out`.
    pub fn write(&self, options: &CompileOptions, out: &mut Vec<u8>) -> Result<()> {
        for instruction in &self.instructions {
            instruction.write(options, out)?;
        }
        Ok(())
    }

    /// Encodes the sequence into a fresh buffer.
    pub fn to_bytes(&self, options: &CompileOptions) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.encoded_len(options)?);
        self.write(options, &mut out)?;
        Ok(out)
    }
}

impl Instruction {
    /// Writes the instruction, followed by its nested body if it has one.
    pub fn write(&self, options: &CompileOptions, out: &mut Vec<u8>) -> Result<()> {
        if self.is_placeholder() {
            return Err(CompileError::UnresolvedPlaceholder);
        }
        out.push(self.opcode.code());
        if !self.opcode.is_long() {
            return Ok(());
        }

        let len = self.record_len(options)?;
        let len16 = u16::try_from(len).map_err(|_| CompileError::RecordTooLong {
            opcode: self.opcode.code(),
            len,
        })?;
        out.extend_from_slice(&len16.to_le_bytes());

        let Some(operand) = &self.operand else {
            return Ok(());
        };
        match operand {
            Operand::Push(value) => write_push_value(value, options, out)?,
            Operand::Offset(offset) => out.extend_from_slice(&offset.to_le_bytes()),
            Operand::Register(register) => out.push(*register),
            Operand::Frame(frame) => out.extend_from_slice(&frame.to_le_bytes()),
            Operand::Label(label) => write_c_string(label, options, out)?,
            Operand::Url { url, target } => {
                write_c_string(url, options, out)?;
                write_c_string(target, options, out)?;
            }
            Operand::UrlFlags(flags) => out.push(*flags),
            Operand::Play(play) => out.push(u8::from(*play)),
            Operand::Pool(strings) => {
                write_count(strings.len(), self, out)?;
                for s in strings {
                    write_c_string(s, options, out)?;
                }
            }
            Operand::Function { name, params, body } => {
                write_c_string(name, options, out)?;
                write_count(params.len(), self, out)?;
                for param in params {
                    write_c_string(param, options, out)?;
                }
                write_count(body.encoded_len(options)?, self, out)?;
                body.write(options, out)?;
            }
            Operand::Block(body) => {
                write_count(body.encoded_len(options)?, self, out)?;
                body.write(options, out)?;
            }
        }
        Ok(())
    }
}

fn write_push_value(value: &PushValue, options: &CompileOptions, out: &mut Vec<u8>) -> Result<()> {
    out.push(value.type_code());
    match value {
        PushValue::Str(s) => write_c_string(s, options, out)?,
        PushValue::Null | PushValue::Undefined => {}
        PushValue::Register(register) => out.push(*register),
        PushValue::Bool(b) => out.push(u8::from(*b)),
        PushValue::Double(d) => {
            // High word first, each word little-endian.
            let bits = d.to_bits();
            out.extend_from_slice(&((bits >> 32) as u32).to_le_bytes());
            out.extend_from_slice(&(bits as u32).to_le_bytes());
        }
        PushValue::Integer(n) => out.extend_from_slice(&n.to_le_bytes()),
        PushValue::Constant8(index) => out.push(*index),
        PushValue::Constant16(index) => out.extend_from_slice(&index.to_le_bytes()),
    }
    Ok(())
}

fn write_c_string(text: &str, options: &CompileOptions, out: &mut Vec<u8>) -> Result<()> {
    out.extend_from_slice(&options.encoding.encode(text)?);
    out.push(0);
    Ok(())
}

fn write_count(count: usize, instruction: &Instruction, out: &mut Vec<u8>) -> Result<()> {
    let count = u16::try_from(count).map_err(|_| CompileError::RecordTooLong {
        opcode: instruction.opcode.code(),
        len: count,
    })?;
    out.extend_from_slice(&count.to_le_bytes());
    Ok(())
}
