
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod action;
mod encode;
mod reader;
mod records;
mod render;
mod resolve;

mod tables {
    include!(concat!(env!("OUT_DIR"), "/avm1_tables.rs"));
}

pub use action::{
    Action, ActionKind, ActionStream, Branch, BranchTarget, CatchTarget, Function2Def,
    Function2Flags, FunctionDef, PushValue, RegisterParam, TryBlock, decode_actions, read_action,
};
pub use encode::{encode_actions, write_action};
pub use reader::Reader;
pub use records::render_records;
pub use render::{INDENT, RenderContext, render, render_stream};
pub use resolve::resolve;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisasmMode {
    Bytecode,
    Records,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StringFormat {
    NulTerminated,
    LengthPrefixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisasmOptions {
    pub mode: DisasmMode,
    pub strings: StringFormat,
}

impl Default for DisasmOptions {
    fn default() -> Self {
        Self {
            mode: DisasmMode::Bytecode,
            strings: StringFormat::NulTerminated,
        }
    }
}

#[derive(Debug, Error)]
pub enum DeavmError {
    #[error("unexpected end of input at byte {pos}")]
    Eof { pos: u32 },

    #[error("unknown push value type {tag} at byte {pos}")]
    UnknownValueType { pos: u32, tag: u8 },

    #[error("byte window {offset}+{length} is outside the {available} byte input")]
    InvalidWindow {
        offset: usize,
        length: usize,
        available: usize,
    },

    #[error("action 0x{code:02x} requires a payload but encodes to none")]
    EmptyPayload { code: u8 },

    #[error("action 0x{code:02x} at byte {pos} holds a string that was not valid UTF-8")]
    LossyString { code: u8, pos: u32 },

    #[error("action 0x{code:02x} encodes {len} bytes, more than a 16-bit size allows")]
    PayloadTooLarge { code: u8, len: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub(crate) fn action_info(code: u8) -> Option<&'static tables::ActionInfo> {
    match tables::ACTION_INDEX[code as usize] {
        0xff => None,
        idx => tables::ACTION_INFO.get(idx as usize).filter(|info| info.code == code),
    }
}

pub fn action_name(code: u8) -> Option<&'static str> {
    action_info(code).map(|i| i.name)
}

pub fn byte_window(bytes: &[u8], offset: usize, length: Option<usize>) -> Result<&[u8], DeavmError> {
    let available = bytes.len();
    let length = length.unwrap_or_else(|| available.saturating_sub(offset));
    let end = offset.checked_add(length).filter(|&e| e <= available);
    match end {
        Some(end) => Ok(&bytes[offset..end]),
        None => Err(DeavmError::InvalidWindow {
            offset,
            length,
            available,
        }),
    }
}

pub fn disassemble_with_options(bytes: &[u8], options: DisasmOptions) -> Result<String, DeavmError> {
    let stream = decode_actions(bytes, options.strings)?;
    Ok(match options.mode {
        DisasmMode::Bytecode => render_stream(&stream),
        DisasmMode::Records => render_records(&stream),
    })
}

pub fn disassemble(bytes: &[u8]) -> Result<String, DeavmError> {
    disassemble_with_options(bytes, DisasmOptions::default())
}
