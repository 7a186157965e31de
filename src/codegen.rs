//! Code generation from the syntax tree
//!
//! This module prints a (possibly mutated) tree back to Rust source. The raw
//! text is re-parsed with `syn` and formatted with `prettyplease`, so a mutant
//! that would not even parse is rejected here instead of in the test run.

use crate::error::SerializeError;
use crate::tree::{BinOp, BoolOp, Literal, Node, SyntaxTree, UnaryOp};

/// Serializer collaborator: syntax tree in, source text out
pub trait Serializer: Send + Sync {
    fn serialize(&self, tree: &SyntaxTree) -> Result<String, SerializeError>;
}

/// Prints trees as formatted Rust source
#[derive(Debug, Default, Clone)]
pub struct RustSerializer;

impl Serializer for RustSerializer {
    fn serialize(&self, tree: &SyntaxTree) -> Result<String, SerializeError> {
        let raw = print_item(tree.root())?;
        let file = syn::parse_file(&raw).map_err(|e| SerializeError::Invalid {
            error: e.to_string(),
        })?;
        Ok(generate_source(&file))
    }
}

/// Generate source code from AST
pub fn generate_source(ast: &syn::File) -> String {
    prettyplease::unparse(ast)
}

/// One-line rendering of a single node for reports
///
/// Not re-parsed or formatted; multi-line nodes keep their first line only.
pub fn snippet(node: &Node) -> String {
    match print_stmt(node) {
        Ok(text) => match text.split_once('\n') {
            Some((first, _)) => format!("{} ...", first.trim_end()),
            None => text,
        },
        Err(e) => format!("<{}>", e),
    }
}

fn unsupported(construct: impl Into<String>) -> SerializeError {
    SerializeError::Unsupported {
        construct: construct.into(),
    }
}

fn print_item(node: &Node) -> Result<String, SerializeError> {
    match node {
        Node::Module { items } => {
            let items = items.iter().map(print_item).collect::<Result<Vec<_>, _>>()?;
            Ok(items.join("\n"))
        }
        Node::Function {
            signature, body, ..
        } => Ok(format!("{} {}", signature, print_body(body)?)),
        Node::Impl { header, items } => {
            let items = items.iter().map(print_item).collect::<Result<Vec<_>, _>>()?;
            Ok(format!("{} {{\n{}\n}}", header, items.join("\n")))
        }
        Node::Opaque(text) => Ok(text.clone()),
        other => print_stmt(other),
    }
}

fn print_body(body: &[Node]) -> Result<String, SerializeError> {
    let stmts = body.iter().map(print_stmt).collect::<Result<Vec<_>, _>>()?;
    if stmts.is_empty() {
        Ok("{}".to_string())
    } else {
        Ok(format!("{{\n{}\n}}", stmts.join("\n")))
    }
}

fn print_stmt(node: &Node) -> Result<String, SerializeError> {
    match node {
        Node::Let { pattern, value } => match value {
            Some(value) => Ok(format!("let {} = {};", pattern, print_expr(value, 0)?)),
            None => Ok(format!("let {};", pattern)),
        },
        Node::Expr { value, semi } => {
            let text = print_expr(value, 0)?;
            Ok(if *semi { format!("{};", text) } else { text })
        }
        Node::Return {
            value: Some(value),
            implicit: true,
        } => print_expr(value, 0),
        Node::Opaque(text) => Ok(text.clone()),
        Node::Module { .. } | Node::Function { .. } | Node::Impl { .. } => print_item(node),
        other => print_expr(other, 0),
    }
}

/// Binding strength; operands weaker than their slot get parenthesized
fn precedence(node: &Node) -> u8 {
    match node {
        Node::Assign { .. } | Node::AugAssign { .. } => 1,
        Node::BoolExpr { op: BoolOp::Or, .. } => 3,
        Node::BoolExpr { op: BoolOp::And, .. } => 4,
        Node::Compare { .. } => 5,
        Node::BinaryExpr { op, .. } => match op {
            BinOp::BitOr => 6,
            BinOp::BitXor => 7,
            BinOp::BitAnd => 8,
            BinOp::Shl | BinOp::Shr => 9,
            BinOp::Add | BinOp::Sub => 10,
            BinOp::Mul | BinOp::Div | BinOp::FloorDiv | BinOp::Rem => 11,
        },
        Node::UnaryExpr { .. } => 13,
        Node::Call { .. } | Node::MethodCall { .. } => 14,
        Node::Literal(_) | Node::Name(_) | Node::Opaque(_) => 15,
        // Block-like and statement nodes are always wrapped as operands
        Node::Return { .. }
        | Node::If { .. }
        | Node::While { .. }
        | Node::For { .. }
        | Node::Block { .. }
        | Node::Module { .. }
        | Node::Function { .. }
        | Node::Impl { .. }
        | Node::Let { .. }
        | Node::Expr { .. } => 0,
    }
}

fn print_expr(node: &Node, min_prec: u8) -> Result<String, SerializeError> {
    let text = print_expr_inner(node)?;
    if precedence(node) < min_prec {
        Ok(format!("({})", text))
    } else {
        Ok(text)
    }
}

fn print_expr_inner(node: &Node) -> Result<String, SerializeError> {
    let prec = precedence(node);
    match node {
        Node::Assign { target, value } => Ok(format!(
            "{} = {}",
            print_expr(target, prec + 1)?,
            print_expr(value, prec)?
        )),
        Node::AugAssign { target, op, value } => {
            if *op == BinOp::FloorDiv {
                return Err(unsupported("floor division"));
            }
            Ok(format!(
                "{} {}= {}",
                print_expr(target, prec + 1)?,
                op.symbol(),
                print_expr(value, prec)?
            ))
        }
        Node::BinaryExpr { op, left, right } => {
            if *op == BinOp::FloorDiv {
                return Err(unsupported("floor division"));
            }
            Ok(format!(
                "{} {} {}",
                print_expr(left, prec)?,
                op.symbol(),
                print_expr(right, prec + 1)?
            ))
        }
        Node::Compare { op, left, right } => Ok(format!(
            "{} {} {}",
            print_expr(left, prec + 1)?,
            op.symbol(),
            print_expr(right, prec + 1)?
        )),
        Node::BoolExpr { op, left, right } => Ok(format!(
            "{} {} {}",
            print_expr(left, prec)?,
            op.symbol(),
            print_expr(right, prec + 1)?
        )),
        Node::UnaryExpr { op, operand } => {
            if *op == UnaryOp::Plus {
                return Err(unsupported("unary plus"));
            }
            Ok(format!("{}{}", op.symbol(), print_expr(operand, prec)?))
        }
        Node::Call { func, args } => Ok(format!(
            "{}({})",
            print_expr(func, prec)?,
            print_args(args)?
        )),
        Node::MethodCall {
            receiver,
            method,
            args,
        } => Ok(format!(
            "{}.{}({})",
            print_expr(receiver, prec)?,
            method,
            print_args(args)?
        )),
        Node::Return { value, .. } => match value {
            Some(value) => Ok(format!("return {}", print_expr(value, 0)?)),
            None => Ok("return".to_string()),
        },
        Node::If { .. } => print_if(node),
        Node::While { test, body } => {
            Ok(format!("while {} {}", print_expr(test, 0)?, print_body(body)?))
        }
        Node::For {
            pattern,
            iter,
            body,
        } => Ok(format!(
            "for {} in {} {}",
            pattern,
            print_expr(iter, 0)?,
            print_body(body)?
        )),
        Node::Block { body } => print_body(body),
        Node::Literal(literal) => print_literal(literal),
        Node::Name(name) => Ok(name.clone()),
        Node::Opaque(text) => Ok(text.clone()),
        Node::Module { .. }
        | Node::Function { .. }
        | Node::Impl { .. }
        | Node::Let { .. }
        | Node::Expr { .. } => Err(unsupported(format!(
            "{} in expression position",
            node.kind()
        ))),
    }
}

fn print_if(node: &Node) -> Result<String, SerializeError> {
    let Node::If { test, body, orelse } = node else {
        return print_expr(node, 0);
    };
    let mut text = format!("if {} {}", print_expr(test, 0)?, print_body(body)?);
    match orelse.as_slice() {
        [] => {}
        [chained @ Node::If { .. }] => {
            text.push_str(" else ");
            text.push_str(&print_if(chained)?);
        }
        stmts => {
            text.push_str(" else ");
            text.push_str(&print_body(stmts)?);
        }
    }
    Ok(text)
}

fn print_args(args: &[Node]) -> Result<String, SerializeError> {
    let args = args
        .iter()
        .map(|arg| print_expr(arg, 0))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(args.join(", "))
}

fn print_literal(literal: &Literal) -> Result<String, SerializeError> {
    match literal {
        Literal::Int(value) => Ok(value.to_string()),
        Literal::Float(value) if value.is_finite() => {
            let text = format!("{:?}", value);
            // must not read back as an integer
            if text.contains('.') || text.contains('e') {
                Ok(text)
            } else {
                Ok(format!("{}.0", text))
            }
        }
        Literal::Float(value) => Err(unsupported(format!("float literal {}", value))),
        Literal::Str(value) => Ok(format!("{:?}", value)),
        Literal::Bool(value) => Ok(value.to_string()),
        Literal::None => Ok("None".to_string()),
    }
}
