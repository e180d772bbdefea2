use byteorder::{LittleEndian, WriteBytesExt};

use crate::action::{Action, ActionKind, ActionStream, CatchTarget, PushValue};
use crate::{DeavmError, StringFormat};

fn size_u16(code: u8, len: usize) -> Result<u16, DeavmError> {
    u16::try_from(len).map_err(|_| DeavmError::PayloadTooLarge { code, len })
}

fn write_string(out: &mut Vec<u8>, s: &str, strings: StringFormat) -> Result<(), DeavmError> {
    match strings {
        StringFormat::NulTerminated => {
            out.extend_from_slice(s.as_bytes());
            out.write_u8(0)?;
        }
        StringFormat::LengthPrefixed => {
            let len = u16::try_from(s.len()).map_err(|_| DeavmError::PayloadTooLarge {
                code: 0,
                len: s.len(),
            })?;
            out.write_u16::<LittleEndian>(len)?;
            out.extend_from_slice(s.as_bytes());
        }
    }
    Ok(())
}

fn write_push_value(out: &mut Vec<u8>, v: &PushValue, strings: StringFormat) -> Result<(), DeavmError> {
    out.write_u8(v.type_tag())?;
    match v {
        PushValue::String(s) => write_string(out, s, strings)?,
        PushValue::Float(f) => out.write_f32::<LittleEndian>(*f)?,
        PushValue::Null | PushValue::Undefined => {}
        PushValue::Register(r) => out.write_u8(*r)?,
        PushValue::Boolean(b) => out.write_u8(*b as u8)?,
        PushValue::Double(d) => {
            let bits = d.to_bits();
            out.write_u32::<LittleEndian>((bits >> 32) as u32)?;
            out.write_u32::<LittleEndian>(bits as u32)?;
        }
        PushValue::Integer(i) => out.write_i32::<LittleEndian>(*i)?,
        PushValue::Constant8(c) => out.write_u8(*c)?,
        PushValue::Constant16(c) => out.write_u16::<LittleEndian>(*c)?,
    }
    Ok(())
}

fn encode_body(stream: &ActionStream, strings: StringFormat) -> Result<Vec<u8>, DeavmError> {
    let mut out = Vec::new();
    for a in stream {
        write_action(&mut out, a, strings)?;
    }
    Ok(out)
}

// Payload lengths and body sizes are recomputed from `kind`; the stored
// `length` is ignored. Nested bodies follow the record.
pub fn write_action(out: &mut Vec<u8>, action: &Action, strings: StringFormat) -> Result<(), DeavmError> {
    let code = action.code;
    if action.lossy_strings {
        return Err(DeavmError::LossyString { code, pos: action.pos });
    }
    let mut p = Vec::new();
    let mut bodies = Vec::new();

    match &action.kind {
        ActionKind::Plain => {}
        ActionKind::Unknown { data } => p.extend_from_slice(data),
        ActionKind::GotoFrame { frame } => p.write_u16::<LittleEndian>(*frame)?,
        ActionKind::GetUrl { url, target } => {
            write_string(&mut p, url, strings)?;
            write_string(&mut p, target, strings)?;
        }
        ActionKind::StoreRegister { register } => p.write_u8(*register)?,
        ActionKind::ConstantPool { constants } => {
            p.write_u16::<LittleEndian>(size_u16(code, constants.len())?)?;
            for c in constants {
                write_string(&mut p, c, strings)?;
            }
        }
        ActionKind::WaitForFrame { frame, skip_count } => {
            p.write_u16::<LittleEndian>(*frame)?;
            p.write_u8(*skip_count)?;
        }
        ActionKind::SetTarget { name } => write_string(&mut p, name, strings)?,
        ActionKind::GotoLabel { label } => write_string(&mut p, label, strings)?,
        ActionKind::WaitForFrame2 { skip_count } => p.write_u8(*skip_count)?,
        ActionKind::GetUrl2 {
            send_vars_method,
            load_target,
            load_variables,
        } => p.write_u8((send_vars_method & 0b11) << 6 | (*load_target as u8) << 1 | *load_variables as u8)?,
        ActionKind::GotoFrame2 { play, scene_bias } => {
            p.write_u8((scene_bias.is_some() as u8) << 1 | *play as u8)?;
            if let Some(bias) = scene_bias {
                p.write_u16::<LittleEndian>(*bias)?;
            }
        }
        ActionKind::Branch(b) => p.write_i16::<LittleEndian>(b.offset)?,
        ActionKind::Push { values } => {
            for v in values {
                write_push_value(&mut p, v, strings)?;
            }
        }
        ActionKind::DefineFunction(f) => {
            write_string(&mut p, &f.name, strings)?;
            p.write_u16::<LittleEndian>(size_u16(code, f.params.len())?)?;
            for param in &f.params {
                write_string(&mut p, param, strings)?;
            }
            bodies = encode_body(&f.body, strings)?;
            p.write_u16::<LittleEndian>(size_u16(code, bodies.len())?)?;
        }
        ActionKind::DefineFunction2(f) => {
            write_string(&mut p, &f.name, strings)?;
            p.write_u16::<LittleEndian>(size_u16(code, f.params.len())?)?;
            p.write_u8(f.register_count)?;
            let fl = &f.flags;
            p.write_u8(
                (fl.preload_parent as u8) << 7
                    | (fl.preload_root as u8) << 6
                    | (fl.suppress_super as u8) << 5
                    | (fl.preload_super as u8) << 4
                    | (fl.suppress_arguments as u8) << 3
                    | (fl.preload_arguments as u8) << 2
                    | (fl.suppress_this as u8) << 1
                    | fl.preload_this as u8,
            )?;
            p.write_u8(fl.preload_global as u8)?;
            for param in &f.params {
                p.write_u8(param.register)?;
                write_string(&mut p, &param.name, strings)?;
            }
            bodies = encode_body(&f.body, strings)?;
            p.write_u16::<LittleEndian>(size_u16(code, bodies.len())?)?;
        }
        ActionKind::With { body } => {
            bodies = encode_body(body, strings)?;
            p.write_u16::<LittleEndian>(size_u16(code, bodies.len())?)?;
        }
        ActionKind::Try(t) => {
            let in_register = matches!(t.catch_target, CatchTarget::Register(_));
            p.write_u8((in_register as u8) << 2 | (t.finally_block as u8) << 1 | t.catch_block as u8)?;
            let try_body = encode_body(&t.try_body, strings)?;
            let catch_body = encode_body(&t.catch_body, strings)?;
            let finally_body = encode_body(&t.finally_body, strings)?;
            for body in [&try_body, &catch_body, &finally_body] {
                p.write_u16::<LittleEndian>(size_u16(code, body.len())?)?;
            }
            match &t.catch_target {
                CatchTarget::Register(r) => p.write_u8(*r)?,
                CatchTarget::Name(n) => write_string(&mut p, n, strings)?,
            }
            bodies = [try_body, catch_body, finally_body].concat();
        }
    }

    out.write_u8(code)?;
    if code < 0x80 {
        return Ok(());
    }
    if p.is_empty() && !matches!(action.kind, ActionKind::Plain | ActionKind::Unknown { .. }) {
        return Err(DeavmError::EmptyPayload { code });
    }
    p.extend_from_slice(&action.trailing);
    out.write_u16::<LittleEndian>(size_u16(code, p.len())?)?;
    out.extend_from_slice(&p);
    out.extend_from_slice(&bodies);
    Ok(())
}

pub fn encode_actions(stream: &ActionStream, strings: StringFormat) -> Result<Vec<u8>, DeavmError> {
    let mut out = encode_body(stream, strings)?;
    out.write_u8(0)?;
    Ok(out)
}
