use crate::action::{Action, ActionKind, ActionStream, BranchTarget, CatchTarget, PushValue};
use crate::render::INDENT;

fn push_value_record(v: &PushValue) -> String {
    match v {
        PushValue::String(s) => format!("{s} (string)"),
        PushValue::Float(f) => format!("{f} (float)"),
        PushValue::Null => "null".to_string(),
        PushValue::Undefined => "undefined".to_string(),
        PushValue::Register(r) => format!("{r} (register)"),
        PushValue::Boolean(b) => format!("{b} (boolean)"),
        PushValue::Double(d) => format!("{d} (double)"),
        PushValue::Integer(i) => format!("{i} (integer)"),
        PushValue::Constant8(c) => format!("{c} (constant8)"),
        PushValue::Constant16(c) => format!("{c} (constant16)"),
    }
}

fn anonymous(name: &str) -> &str {
    if name.is_empty() { "<anonymous>" } else { name }
}

fn write_body(out: &mut String, stream: &ActionStream, indent: usize) {
    for (i, a) in stream.iter().enumerate() {
        out.push('\n');
        write_record(out, i, a, indent);
    }
}

fn write_record(out: &mut String, idx: usize, a: &Action, indent: usize) {
    out.push_str(&format!("{:indent$}[{idx}] ", ""));
    if let ActionKind::Unknown { .. } = a.kind {
        out.push_str(&format!("[????] Code: 0x{:02x}, Length: {}", a.code, a.length));
        return;
    }
    out.push_str(&format!("[Action{}]", a.record_name()));
    let nested = indent + 2 * INDENT;
    match &a.kind {
        ActionKind::Plain | ActionKind::Unknown { .. } => {}
        ActionKind::GotoFrame { frame } => out.push_str(&format!(" Frame: {frame}")),
        ActionKind::GetUrl { url, target } => out.push_str(&format!(" URL: {url}, Target: {target}")),
        ActionKind::StoreRegister { register } => out.push_str(&format!(" RegisterNumber: {register}")),
        ActionKind::WaitForFrame { frame, skip_count } => out.push_str(&format!(" Frame: {frame}, SkipCount: {skip_count}")),
        ActionKind::SetTarget { name } => out.push_str(&format!(" TargetName: {name}")),
        ActionKind::GotoLabel { label } => out.push_str(&format!(" Label: {label}")),
        ActionKind::WaitForFrame2 { skip_count } => out.push_str(&format!(" SkipCount: {skip_count}")),
        ActionKind::GetUrl2 {
            send_vars_method,
            load_target,
            load_variables,
        } => {
            out.push_str(&format!(
                " SendVarsMethod: {send_vars_method}, LoadTargetFlag: {load_target}, LoadVariablesFlag: {load_variables}"
            ));
        }
        ActionKind::GotoFrame2 { play, scene_bias } => {
            out.push_str(&format!(" PlayFlag: {play}, SceneBiasFlag: {}", scene_bias.is_some()));
            if let Some(bias) = scene_bias {
                out.push_str(&format!(", {bias}"));
            }
        }
        ActionKind::Branch(b) => {
            let target = match b.target {
                BranchTarget::Resolved(j) => j.to_string(),
                BranchTarget::EndOfBlock => "EOB".to_string(),
                BranchTarget::Unresolved => "???".to_string(),
            };
            out.push_str(&format!(" BranchOffset: {} [{target}]", b.offset));
        }
        ActionKind::Push { values } => {
            let values: Vec<String> = values.iter().map(push_value_record).collect();
            out.push_str(&format!(" {}", values.join(", ")));
        }
        ActionKind::ConstantPool { constants } => {
            out.push_str(&format!(" Values: {}", constants.len()));
            for (i, c) in constants.iter().enumerate() {
                out.push_str(&format!("\n{:nested$}{i}: {c}", ""));
            }
        }
        ActionKind::DefineFunction(f) => {
            out.push_str(&format!(" {}({})", anonymous(&f.name), f.params.join(", ")));
            write_body(out, &f.body, nested);
        }
        ActionKind::DefineFunction2(f) => {
            let params: Vec<String> = f.params.iter().map(|p| format!("${}:{}", p.register, p.name)).collect();
            let mut flags = f.flags.active();
            if flags.is_empty() {
                flags.push("none");
            }
            out.push_str(&format!(
                " {}({}), Flags: {}",
                anonymous(&f.name),
                params.join(", "),
                flags.join(",")
            ));
            write_body(out, &f.body, nested);
        }
        ActionKind::With { body } => write_body(out, body, nested),
        ActionKind::Try(t) => {
            match &t.catch_target {
                CatchTarget::Register(r) => out.push_str(&format!(" Register: {r}")),
                CatchTarget::Name(n) => out.push_str(&format!(" Name: {n}")),
            }
            for (title, body) in [("Try:", &t.try_body), ("Catch:", &t.catch_body), ("Finally:", &t.finally_body)] {
                if !body.is_empty() {
                    out.push_str(&format!("\n{:width$}{title}", "", width = indent + INDENT));
                    write_body(out, body, nested);
                }
            }
        }
    }
}

pub fn render_records(stream: &ActionStream) -> String {
    let mut out = String::new();
    for (i, a) in stream.iter().enumerate() {
        write_record(&mut out, i, a, 0);
        out.push('\n');
    }
    out
}
