use tracing::warn;

use crate::action::{Action, ActionKind, ActionStream, BranchTarget, CatchTarget, PushValue};

pub const INDENT: usize = 2;

const ILLEGAL_BRANCH: &str = "ILLEGAL_BRANCH";

// Nested bodies get a context with a copy of the enclosing pool, so a pool
// defined inside them never leaks out.
#[derive(Debug, Clone)]
pub struct RenderContext {
    constant_pool: Vec<String>,
    label_count: u32,
    end_label: Option<String>,
}

impl RenderContext {
    pub fn new(stream: &ActionStream, constant_pool: Vec<String>, label_count: u32) -> Self {
        let end_label = stream
            .has_end_of_block()
            .then(|| format!("L{}", label_count + 1));
        Self {
            constant_pool,
            label_count,
            end_label,
        }
    }

    pub fn root(stream: &ActionStream) -> Self {
        Self::new(stream, Vec::new(), stream.label_count)
    }

    pub fn derive(&self, body: &ActionStream) -> Self {
        Self::new(body, self.constant_pool.clone(), body.label_count)
    }

    pub fn constant_pool(&self) -> &[String] {
        &self.constant_pool
    }

    pub fn replace_constant_pool(&mut self, constants: Vec<String>) {
        self.constant_pool = constants;
    }

    pub fn constant(&self, idx: usize) -> Option<&str> {
        self.constant_pool.get(idx).map(String::as_str)
    }

    pub fn label_count(&self) -> u32 {
        self.label_count
    }

    pub fn end_label(&self) -> Option<&str> {
        self.end_label.as_deref()
    }
}

fn line(out: &mut String, indent: usize, text: &str) {
    for _ in 0..indent {
        out.push(' ');
    }
    out.push_str(text);
    out.push('\n');
}

fn float_text(s: String, finite: bool) -> String {
    if finite && !s.contains('.') {
        s + ".0"
    } else {
        s
    }
}

fn push_value_text(v: &PushValue, ctx: &RenderContext) -> String {
    match v {
        PushValue::String(s) => format!("\"{s}\""),
        PushValue::Float(f) => float_text(f.to_string(), f.is_finite()),
        PushValue::Double(d) => float_text(d.to_string(), d.is_finite()),
        PushValue::Null => "null".to_string(),
        PushValue::Undefined => "undefined".to_string(),
        PushValue::Register(r) => format!("${r}"),
        PushValue::Boolean(b) => b.to_string(),
        PushValue::Integer(i) => i.to_string(),
        PushValue::Constant8(_) | PushValue::Constant16(_) => {
            let idx = v.constant_index().unwrap_or_default();
            match ctx.constant(idx) {
                Some(s) => format!("\"{s}\""),
                None => {
                    warn!(idx, pool = ctx.constant_pool().len(), "constant pool index out of range");
                    format!("<constant {idx} out of range>")
                }
            }
        }
    }
}

fn branch_text(stream: &ActionStream, target: BranchTarget, ctx: &RenderContext) -> String {
    let label = match target {
        BranchTarget::Resolved(j) => stream.actions.get(j).and_then(|a| a.label.as_deref()),
        BranchTarget::EndOfBlock => ctx.end_label(),
        BranchTarget::Unresolved => None,
    };
    label.unwrap_or(ILLEGAL_BRANCH).to_string()
}

fn send_vars_method_name(m: u8) -> &'static str {
    match m {
        0 => "None",
        1 => "GET",
        2 => "POST",
        _ => "unknown",
    }
}

fn write_block(out: &mut String, header: &str, body: &ActionStream, ctx: &RenderContext, indent: usize) {
    line(out, indent, &format!("{header} {{"));
    let mut inner = ctx.derive(body);
    write_stream(out, body, &mut inner, indent + INDENT);
    line(out, indent, "}");
}

fn write_action(out: &mut String, stream: &ActionStream, a: &Action, ctx: &mut RenderContext, indent: usize) {
    let name = a.name();
    match &a.kind {
        ActionKind::Plain => line(out, indent, name),
        ActionKind::Unknown { .. } => line(out, indent, &format!("unknown (0x{:02x})", a.code)),
        ActionKind::GotoFrame { frame } => line(out, indent, &format!("{name} {frame}")),
        ActionKind::GetUrl { url, target } => line(out, indent, &format!("{name} \"{url}\", \"{target}\"")),
        ActionKind::StoreRegister { register } => line(out, indent, &format!("store ${register}")),
        ActionKind::WaitForFrame { frame, skip_count } => {
            let mut s = format!("{name} {frame}");
            if *skip_count > 0 {
                s.push_str(&format!(", {skip_count}"));
            }
            line(out, indent, &s);
        }
        ActionKind::SetTarget { name: target } => line(out, indent, &format!("{name} \"{target}\"")),
        ActionKind::GotoLabel { label } => line(out, indent, &format!("{name} \"{label}\"")),
        ActionKind::WaitForFrame2 { skip_count } => line(out, indent, &format!("{name} ({skip_count})")),
        ActionKind::GetUrl2 {
            send_vars_method,
            load_target,
            load_variables,
        } => line(
            out,
            indent,
            &format!(
                "{name} (method: {}, target: {}, variables: {})",
                send_vars_method_name(*send_vars_method),
                if *load_target { "sprite" } else { "window" },
                if *load_variables { "yes" } else { "no" },
            ),
        ),
        ActionKind::GotoFrame2 { play, scene_bias } => {
            let mut s = format!("{name} ({}", if *play { "gotoAndPlay" } else { "gotoAndStop" });
            if let Some(bias) = scene_bias {
                s.push_str(&format!(", sceneBias: {bias}"));
            }
            s.push(')');
            line(out, indent, &s);
        }
        ActionKind::Branch(b) => line(out, indent, &format!("{name} {}", branch_text(stream, b.target, ctx))),
        ActionKind::Push { values } => {
            for v in values {
                line(out, indent, &format!("push {}", push_value_text(v, ctx)));
            }
        }
        ActionKind::ConstantPool { constants } => {
            line(out, indent, name);
            for (i, c) in constants.iter().enumerate() {
                line(out, indent + INDENT, &format!("{i}: {c}"));
            }
            ctx.replace_constant_pool(constants.clone());
        }
        ActionKind::DefineFunction(f) => {
            let header = format!("{name} {}({})", f.name, f.params.join(", "));
            write_block(out, &header, &f.body, ctx, indent);
        }
        ActionKind::DefineFunction2(f) => {
            let params: Vec<String> = f.params.iter().map(|p| format!("${}:{}", p.register, p.name)).collect();
            line(out, indent, &format!("{name} {}({}) {{", f.name, params.join(", ")));
            let preload = f.flags.preloaded();
            if !preload.is_empty() {
                line(out, indent + 2 * INDENT, &format!("// preload: {}", preload.join(", ")));
            }
            let suppress = f.flags.suppressed();
            if !suppress.is_empty() {
                line(out, indent + 2 * INDENT, &format!("// suppress: {}", suppress.join(", ")));
            }
            let mut inner = ctx.derive(&f.body);
            write_stream(out, &f.body, &mut inner, indent + INDENT);
            line(out, indent, "}");
        }
        ActionKind::With { body } => write_block(out, name, body, ctx, indent),
        ActionKind::Try(t) => {
            if !t.try_body.is_empty() {
                write_block(out, "try", &t.try_body, ctx, indent);
            }
            if !t.catch_body.is_empty() {
                let header = match &t.catch_target {
                    CatchTarget::Register(r) => format!("catch(${r})"),
                    CatchTarget::Name(n) => format!("catch({n})"),
                };
                write_block(out, &header, &t.catch_body, ctx, indent);
            }
            if !t.finally_body.is_empty() {
                write_block(out, "finally", &t.finally_body, ctx, indent);
            }
        }
    }
}

fn write_stream(out: &mut String, stream: &ActionStream, ctx: &mut RenderContext, indent: usize) {
    for a in stream {
        if let Some(label) = &a.label {
            line(out, indent, &format!("{label}:"));
        }
        write_action(out, stream, a, ctx, indent + INDENT);
    }
    if let Some(end) = ctx.end_label() {
        line(out, indent, &format!("{end}:"));
    }
}

pub fn render(stream: &ActionStream, ctx: &mut RenderContext, indent: usize) -> String {
    let mut out = String::new();
    write_stream(&mut out, stream, ctx, indent);
    out
}

pub fn render_stream(stream: &ActionStream) -> String {
    let mut ctx = RenderContext::root(stream);
    render(stream, &mut ctx, 0)
}
