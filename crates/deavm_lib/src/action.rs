use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::reader::Reader;
use crate::tables::ActionFmt;
use crate::{DeavmError, StringFormat, action_info, resolve};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub code: u8,
    pub length: u16,
    pub pos: u32,
    /// Nested action bytes trailing the declared payload (function, `with`
    /// and `try` bodies).
    pub body_len: u32,
    pub label: Option<String>,
    pub kind: ActionKind,
    // payload bytes past the fields of `kind`, written back verbatim
    pub trailing: Vec<u8>,
    // a payload string was not valid UTF-8; `kind` holds a lossy copy
    pub lossy_strings: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ActionKind {
    Plain,
    GotoFrame {
        frame: u16,
    },
    GetUrl {
        url: String,
        target: String,
    },
    StoreRegister {
        register: u8,
    },
    ConstantPool {
        constants: Vec<String>,
    },
    WaitForFrame {
        frame: u16,
        skip_count: u8,
    },
    SetTarget {
        name: String,
    },
    GotoLabel {
        label: String,
    },
    WaitForFrame2 {
        skip_count: u8,
    },
    DefineFunction2(Box<Function2Def>),
    Try(Box<TryBlock>),
    With {
        body: ActionStream,
    },
    Push {
        values: Vec<PushValue>,
    },
    Branch(Branch),
    GetUrl2 {
        send_vars_method: u8,
        load_target: bool,
        load_variables: bool,
    },
    DefineFunction(Box<FunctionDef>),
    GotoFrame2 {
        play: bool,
        scene_bias: Option<u16>,
    },
    Unknown {
        data: Vec<u8>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BranchTarget {
    Resolved(usize),
    EndOfBlock,
    Unresolved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub offset: i16,
    pub target: BranchTarget,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PushValue {
    String(String),
    Float(f32),
    Null,
    Undefined,
    Register(u8),
    Boolean(bool),
    Double(f64),
    Integer(i32),
    Constant8(u8),
    Constant16(u16),
}

impl PushValue {
    pub fn type_tag(&self) -> u8 {
        match self {
            PushValue::String(_) => 0,
            PushValue::Float(_) => 1,
            PushValue::Null => 2,
            PushValue::Undefined => 3,
            PushValue::Register(_) => 4,
            PushValue::Boolean(_) => 5,
            PushValue::Double(_) => 6,
            PushValue::Integer(_) => 7,
            PushValue::Constant8(_) => 8,
            PushValue::Constant16(_) => 9,
        }
    }

    pub fn constant_index(&self) -> Option<usize> {
        match self {
            PushValue::Constant8(i) => Some(*i as usize),
            PushValue::Constant16(i) => Some(*i as usize),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<String>,
    pub body: ActionStream,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterParam {
    pub register: u8,
    pub name: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Function2Flags {
    pub preload_parent: bool,
    pub preload_root: bool,
    pub suppress_super: bool,
    pub preload_super: bool,
    pub suppress_arguments: bool,
    pub preload_arguments: bool,
    pub suppress_this: bool,
    pub preload_this: bool,
    pub preload_global: bool,
}

impl Function2Flags {
    pub fn preloaded(&self) -> Vec<&'static str> {
        [
            (self.preload_parent, "parent"),
            (self.preload_root, "root"),
            (self.preload_super, "super"),
            (self.preload_arguments, "arguments"),
            (self.preload_this, "this"),
            (self.preload_global, "global"),
        ]
        .into_iter()
        .filter_map(|(set, name)| set.then_some(name))
        .collect()
    }

    pub fn suppressed(&self) -> Vec<&'static str> {
        [
            (self.suppress_super, "super"),
            (self.suppress_arguments, "arguments"),
            (self.suppress_this, "this"),
        ]
        .into_iter()
        .filter_map(|(set, name)| set.then_some(name))
        .collect()
    }

    pub fn active(&self) -> Vec<&'static str> {
        [
            (self.preload_parent, "preloadParent"),
            (self.preload_root, "preloadRoot"),
            (self.preload_super, "preloadSuper"),
            (self.preload_arguments, "preloadArguments"),
            (self.preload_this, "preloadThis"),
            (self.preload_global, "preloadGlobal"),
            (self.suppress_super, "suppressSuper"),
            (self.suppress_arguments, "suppressArguments"),
            (self.suppress_this, "suppressThis"),
        ]
        .into_iter()
        .filter_map(|(set, name)| set.then_some(name))
        .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Function2Def {
    pub name: String,
    pub register_count: u8,
    pub flags: Function2Flags,
    pub params: Vec<RegisterParam>,
    pub body: ActionStream,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CatchTarget {
    Name(String),
    Register(u8),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TryBlock {
    pub catch_block: bool,
    pub finally_block: bool,
    pub catch_target: CatchTarget,
    pub try_body: ActionStream,
    pub catch_body: ActionStream,
    pub finally_body: ActionStream,
}

impl Action {
    pub fn header_len(&self) -> u32 {
        if self.code >= 0x80 { 3 } else { 1 }
    }

    pub fn size(&self) -> u32 {
        self.header_len() + self.length as u32 + self.body_len
    }

    pub fn end(&self) -> u32 {
        self.pos + self.size()
    }

    pub fn name(&self) -> &'static str {
        action_info(self.code).map(|i| i.name).unwrap_or("unknown")
    }

    pub fn record_name(&self) -> &'static str {
        action_info(self.code).map(|i| i.record_name).unwrap_or("????")
    }

    pub fn branch(&self) -> Option<&Branch> {
        match &self.kind {
            ActionKind::Branch(b) => Some(b),
            _ => None,
        }
    }

    pub fn branch_mut(&mut self) -> Option<&mut Branch> {
        match &mut self.kind {
            ActionKind::Branch(b) => Some(b),
            _ => None,
        }
    }

    pub fn nested_streams(&self) -> Vec<&ActionStream> {
        match &self.kind {
            ActionKind::DefineFunction(f) => vec![&f.body],
            ActionKind::DefineFunction2(f) => vec![&f.body],
            ActionKind::With { body } => vec![body],
            ActionKind::Try(t) => vec![&t.try_body, &t.catch_body, &t.finally_body],
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionStream {
    pub actions: Vec<Action>,
    pub label_count: u32,
}

impl ActionStream {
    pub fn new(actions: Vec<Action>) -> Self {
        let mut stream = Self {
            actions,
            label_count: 0,
        };
        stream.resolve();
        stream
    }

    pub fn resolve(&mut self) -> u32 {
        self.label_count = resolve(&mut self.actions);
        self.label_count
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Action> {
        self.actions.iter()
    }

    pub fn byte_len(&self) -> u32 {
        self.actions.iter().map(Action::size).sum()
    }

    pub fn has_end_of_block(&self) -> bool {
        self.actions
            .iter()
            .any(|a| matches!(a.branch(), Some(b) if b.target == BranchTarget::EndOfBlock))
    }

    pub fn has_unresolved_branches(&self) -> bool {
        self.actions.iter().any(|a| {
            matches!(a.branch(), Some(b) if b.target == BranchTarget::Unresolved)
                || a.nested_streams().iter().any(|s| s.has_unresolved_branches())
        })
    }
}

impl<'a> IntoIterator for &'a ActionStream {
    type Item = &'a Action;
    type IntoIter = std::slice::Iter<'a, Action>;

    fn into_iter(self) -> Self::IntoIter {
        self.actions.iter()
    }
}

fn read_push_value(r: &mut Reader<'_>) -> Result<PushValue, DeavmError> {
    let pos = r.position();
    let tag = r.get_u8()?;
    Ok(match tag {
        0 => PushValue::String(r.get_string()?),
        1 => PushValue::Float(r.get_f32()?),
        2 => PushValue::Null,
        3 => PushValue::Undefined,
        4 => PushValue::Register(r.get_u8()?),
        5 => PushValue::Boolean(r.get_u8()? != 0),
        6 => PushValue::Double(r.get_swf_f64()?),
        7 => PushValue::Integer(r.get_i32()?),
        8 => PushValue::Constant8(r.get_u8()?),
        9 => PushValue::Constant16(r.get_u16()?),
        _ => return Err(DeavmError::UnknownValueType { pos, tag }),
    })
}

fn read_body(r: &mut Reader<'_>, size: u16) -> Result<ActionStream, DeavmError> {
    let mut sub = r.sub_reader(size as usize)?;
    let mut actions = Vec::new();
    while !sub.is_empty() {
        actions.push(read_action(&mut sub)?);
    }
    let stream = ActionStream::new(actions);
    trace!(actions = stream.len(), labels = stream.label_count, "decoded nested body");
    Ok(stream)
}

fn read_kind(fmt: ActionFmt, p: &mut Reader<'_>, r: &mut Reader<'_>) -> Result<ActionKind, DeavmError> {
    let kind = match fmt {
        ActionFmt::NONE => ActionKind::Plain,
        ActionFmt::FRAME => ActionKind::GotoFrame { frame: p.get_u16()? },
        ActionFmt::URL => ActionKind::GetUrl {
            url: p.get_string()?,
            target: p.get_string()?,
        },
        ActionFmt::REGISTER => ActionKind::StoreRegister { register: p.get_u8()? },
        ActionFmt::CONSTANT_POOL => {
            let count = p.get_u16()?;
            let mut constants = Vec::with_capacity(count as usize);
            for _ in 0..count {
                constants.push(p.get_string()?);
            }
            ActionKind::ConstantPool { constants }
        }
        ActionFmt::WAIT_FOR_FRAME => ActionKind::WaitForFrame {
            frame: p.get_u16()?,
            skip_count: p.get_u8()?,
        },
        ActionFmt::TARGET => ActionKind::SetTarget { name: p.get_string()? },
        ActionFmt::GOTO_LABEL => ActionKind::GotoLabel { label: p.get_string()? },
        ActionFmt::WAIT_FOR_FRAME2 => ActionKind::WaitForFrame2 { skip_count: p.get_u8()? },
        ActionFmt::FUNCTION2 => {
            let name = p.get_string()?;
            let num_params = p.get_u16()?;
            let register_count = p.get_u8()?;
            let flags = Function2Flags {
                preload_parent: p.get_flag()?,
                preload_root: p.get_flag()?,
                suppress_super: p.get_flag()?,
                preload_super: p.get_flag()?,
                suppress_arguments: p.get_flag()?,
                preload_arguments: p.get_flag()?,
                suppress_this: p.get_flag()?,
                preload_this: p.get_flag()?,
                preload_global: {
                    p.get_ub(7)?;
                    p.get_flag()?
                },
            };
            let mut params = Vec::with_capacity(num_params as usize);
            for _ in 0..num_params {
                params.push(RegisterParam {
                    register: p.get_u8()?,
                    name: p.get_string()?,
                });
            }
            let code_size = p.get_u16()?;
            let body = read_body(r, code_size)?;
            ActionKind::DefineFunction2(Box::new(Function2Def {
                name,
                register_count,
                flags,
                params,
                body,
            }))
        }
        ActionFmt::TRY => {
            p.get_ub(5)?;
            let catch_in_register = p.get_flag()?;
            let finally_block = p.get_flag()?;
            let catch_block = p.get_flag()?;
            let try_size = p.get_u16()?;
            let catch_size = p.get_u16()?;
            let finally_size = p.get_u16()?;
            let catch_target = if catch_in_register {
                CatchTarget::Register(p.get_u8()?)
            } else {
                CatchTarget::Name(p.get_string()?)
            };
            let try_body = read_body(r, try_size)?;
            let catch_body = read_body(r, catch_size)?;
            let finally_body = read_body(r, finally_size)?;
            ActionKind::Try(Box::new(TryBlock {
                catch_block,
                finally_block,
                catch_target,
                try_body,
                catch_body,
                finally_body,
            }))
        }
        ActionFmt::WITH => {
            let code_size = p.get_u16()?;
            ActionKind::With {
                body: read_body(r, code_size)?,
            }
        }
        ActionFmt::PUSH => {
            let mut values = Vec::new();
            while !p.is_empty() {
                values.push(read_push_value(p)?);
            }
            ActionKind::Push { values }
        }
        ActionFmt::BRANCH => ActionKind::Branch(Branch {
            offset: p.get_i16()?,
            target: BranchTarget::Unresolved,
        }),
        ActionFmt::URL2 => {
            let send_vars_method = p.get_ub(2)? as u8;
            p.get_ub(4)?;
            ActionKind::GetUrl2 {
                send_vars_method,
                load_target: p.get_flag()?,
                load_variables: p.get_flag()?,
            }
        }
        ActionFmt::FUNCTION => {
            let name = p.get_string()?;
            let count = p.get_u16()?;
            let mut params = Vec::with_capacity(count as usize);
            for _ in 0..count {
                params.push(p.get_string()?);
            }
            let code_size = p.get_u16()?;
            let body = read_body(r, code_size)?;
            ActionKind::DefineFunction(Box::new(FunctionDef { name, params, body }))
        }
        ActionFmt::GOTO_FRAME2 => {
            p.get_ub(6)?;
            let scene_bias_flag = p.get_flag()?;
            let play = p.get_flag()?;
            let scene_bias = if scene_bias_flag { Some(p.get_u16()?) } else { None };
            ActionKind::GotoFrame2 { play, scene_bias }
        }
    };
    Ok(kind)
}

// For function, `with` and `try` records the reader also moves past the
// nested bodies that follow the record.
pub fn read_action(r: &mut Reader<'_>) -> Result<Action, DeavmError> {
    let pos = r.position();
    let code = r.get_u8()?;
    let length = if code >= 0x80 { r.get_u16()? } else { 0 };
    let mut payload = r.sub_reader(length as usize)?;
    let body_start = r.position();

    let kind = match action_info(code) {
        Some(info) => read_kind(info.fmt, &mut payload, r)?,
        None => ActionKind::Unknown {
            data: payload.get_rest().to_vec(),
        },
    };
    let trailing = payload.get_rest().to_vec();
    if !trailing.is_empty() {
        trace!(pos, code, unread = trailing.len(), "keeping unread payload bytes");
    }

    Ok(Action {
        code,
        length,
        pos,
        body_len: r.position() - body_start,
        label: None,
        kind,
        trailing,
        lossy_strings: payload.saw_invalid_utf8(),
    })
}

// Stops at the end of the buffer or after an `end` action, which is not kept.
pub fn decode_actions(bytes: &[u8], strings: StringFormat) -> Result<ActionStream, DeavmError> {
    let mut r = Reader::new(bytes, strings);
    let mut actions = Vec::new();
    while let Some(code) = r.peek_u8() {
        if code == 0 {
            r.get_u8()?;
            break;
        }
        actions.push(read_action(&mut r)?);
    }
    let stream = ActionStream::new(actions);
    debug!(
        actions = stream.len(),
        labels = stream.label_count,
        bytes = r.position(),
        "decoded action stream"
    );
    Ok(stream)
}
