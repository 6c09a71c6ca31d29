//! Textual emission of the lowered IR.
//!
//! The printer is the module's emission interface: output is fully
//! deterministic (functions in declaration order, blocks and values in
//! allocation order), so tests and downstream tooling can diff it.

use super::{Block, Constant, Function, Instr, Module, Terminator};
use crate::ids::{BlockId, ValueId};
use std::fmt::Write;

pub fn print_module(module: &Module) -> String {
    let mut out = String::new();
    for global in &module.globals {
        let items = global
            .items
            .iter()
            .map(print_constant)
            .collect::<Vec<_>>()
            .join(", ");
        let _ = writeln!(
            out,
            "global @{} = {} [{}]",
            global.name,
            global.elem.name(),
            items
        );
    }
    if !module.globals.is_empty() {
        out.push('\n');
    }

    for (index, function) in module.functions.iter().enumerate() {
        if index > 0 {
            out.push('\n');
        }
        print_function(&mut out, function);
    }
    out
}

fn print_constant(constant: &Constant) -> String {
    match constant {
        Constant::Int(value) => value.to_string(),
        Constant::Real(value) => format!("{:?}", value),
        Constant::Bool(value) => value.to_string(),
        Constant::Str(value) => format!("{:?}", value),
    }
}

fn print_function(out: &mut String, function: &Function) {
    let params = function
        .params
        .iter()
        .map(|(name, ty)| format!("{} %{}", ty.name(), name))
        .collect::<Vec<_>>()
        .join(", ");
    let _ = writeln!(
        out,
        "define {} @{}({}) {{",
        function.ret.name(),
        function.name,
        params
    );
    for (block_id, block) in function.blocks.iter_enumerated() {
        print_block(out, function, block_id, block);
    }
    let _ = writeln!(out, "}}");
}

fn print_block(out: &mut String, function: &Function, id: BlockId, block: &Block) {
    let _ = writeln!(out, "bb{}:", id.index());
    for &value in &block.instrs {
        print_instr(out, function, value);
    }
    match &block.term {
        Some(Terminator::Br(target)) => {
            let _ = writeln!(out, "  br bb{}", target.index());
        }
        Some(Terminator::CondBr {
            cond,
            then_block,
            else_block,
        }) => {
            let _ = writeln!(
                out,
                "  condbr {}, bb{}, bb{}",
                value_name(*cond),
                then_block.index(),
                else_block.index()
            );
        }
        Some(Terminator::Ret(Some(value))) => {
            let _ = writeln!(out, "  ret {}", value_name(*value));
        }
        Some(Terminator::Ret(None)) => {
            let _ = writeln!(out, "  ret");
        }
        None => {
            let _ = writeln!(out, "  unreachable");
        }
    }
}

fn value_name(value: ValueId) -> String {
    format!("%{}", value.index())
}

fn list(values: &[ValueId]) -> String {
    values
        .iter()
        .map(|&v| value_name(v))
        .collect::<Vec<_>>()
        .join(", ")
}

fn print_instr(out: &mut String, function: &Function, value: ValueId) {
    let name = value_name(value);
    match &function.values[value] {
        Instr::ConstInt(constant) => {
            let _ = writeln!(out, "  {} = const i32 {}", name, constant);
        }
        Instr::ConstReal { value: constant, double } => {
            let ty = if *double { "f64" } else { "f32" };
            let _ = writeln!(out, "  {} = const {} {:?}", name, ty, constant);
        }
        Instr::ConstBool(constant) => {
            let _ = writeln!(out, "  {} = const i1 {}", name, constant);
        }
        Instr::ConstStr(constant) => {
            let _ = writeln!(out, "  {} = const ptr {:?}", name, constant);
        }
        Instr::Param { index } => {
            let param = function
                .params
                .get(*index)
                .map(|(n, _)| n.as_str())
                .unwrap_or("?");
            let _ = writeln!(out, "  {} = param {} ; %{}", name, index, param);
        }
        Instr::Alloca { name: var, ty } => {
            let _ = writeln!(out, "  {} = alloca {} ; {}", name, ty.name(), var);
        }
        Instr::AllocaArray { elem, count } => {
            let _ = writeln!(
                out,
                "  {} = alloca {} x {}",
                name,
                elem.name(),
                value_name(*count)
            );
        }
        Instr::Load { ptr, ty } => {
            let _ = writeln!(out, "  {} = load {}, {}", name, ty.name(), value_name(*ptr));
        }
        Instr::Store { ptr, value } => {
            let _ = writeln!(out, "  store {}, {}", value_name(*value), value_name(*ptr));
        }
        Instr::Binary { op, ty, lhs, rhs } => {
            let _ = writeln!(
                out,
                "  {} = {} {} {}, {}",
                name,
                op.name(),
                ty.name(),
                value_name(*lhs),
                value_name(*rhs)
            );
        }
        Instr::Unary { op, ty, operand } => {
            let op_name = match op {
                super::UnOp::Neg => "neg",
                super::UnOp::Not => "not",
            };
            let _ = writeln!(
                out,
                "  {} = {} {} {}",
                name,
                op_name,
                ty.name(),
                value_name(*operand)
            );
        }
        Instr::Convert { kind, to, operand } => {
            let _ = writeln!(
                out,
                "  {} = convert.{} {} {}",
                name,
                kind.as_str().to_ascii_lowercase(),
                to.name(),
                value_name(*operand)
            );
        }
        Instr::ElementPtr { base, offset, ty } => {
            let _ = writeln!(
                out,
                "  {} = elementptr {} {}, {}",
                name,
                ty.name(),
                value_name(*base),
                value_name(*offset)
            );
        }
        Instr::GlobalAddr { name: global } => {
            let _ = writeln!(out, "  {} = globaladdr @{}", name, global);
        }
        Instr::MakeComplex { re, im } => {
            let _ = writeln!(
                out,
                "  {} = complex {}, {}",
                name,
                value_name(*re),
                value_name(*im)
            );
        }
        Instr::ComplexPart { value, imag } => {
            let part = if *imag { "im" } else { "re" };
            let _ = writeln!(out, "  {} = complex.{} {}", name, part, value_name(*value));
        }
        Instr::Call { callee, args, ty } => {
            let _ = writeln!(
                out,
                "  {} = call {} @{}({})",
                name,
                ty.name(),
                callee,
                list(args)
            );
        }
        Instr::RuntimeCall { callee, args, ty } => {
            let _ = writeln!(
                out,
                "  {} = call.rt {} @{}({})",
                name,
                ty.name(),
                callee,
                list(args)
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::lower_translation_unit;
    use super::*;
    use crate::context::AstContext;
    use crate::parse::Parser;
    use crate::source::SourceForm;

    fn emit(text: &str) -> String {
        let mut ctx = AstContext::new();
        let source = ctx.source_map.add_inline(text, SourceForm::Free);
        let mut parser = Parser::new(&mut ctx, source, false);
        parser.parse_program_units();
        assert!(!ctx.diagnostics.has_errors(), "{}", ctx.diagnostics);
        print_module(&lower_translation_unit(&ctx))
    }

    #[test]
    fn test_print_simple_program() {
        let text = emit("PROGRAM P\nX = 1.5\nEND\n");
        assert!(text.contains("define void @P()"));
        assert!(text.contains("alloca f32 ; X"));
        assert!(text.contains("store"));
        assert!(text.contains("ret"));
    }

    #[test]
    fn test_print_is_deterministic() {
        let source = "PROGRAM P\nDO 10 I = 1, 3\nX = X + 1.0\n10 CONTINUE\nEND\n";
        assert_eq!(emit(source), emit(source));
    }

    #[test]
    fn test_print_runtime_calls() {
        let text = emit("PROGRAM P\nCHARACTER(LEN=4) :: C\nC = 'HI'\nEND\n");
        assert!(text.contains("call.rt void @assignment_char1"));
    }
}
