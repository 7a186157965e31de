//! Lowering Rust source into the engine's syntax tree
//!
//! `syn` does the parsing. Constructs the operators care about become typed
//! nodes; everything else is kept as `Opaque` token text. Expressions that
//! would need parentheses to be spliced back as an operand are stored already
//! parenthesized, so a print/parse round trip reproduces the same tree.

use quote::ToTokens;
use syn::{BinOp as SynBinOp, Expr, Lit, Stmt, UnOp};

use crate::error::{MutationError, Result};
use crate::tree::{BinOp, BoolOp, CmpOp, Literal, Node, SyntaxTree, UnaryOp};

/// Parser collaborator: source text in, syntax tree out
pub trait Parser {
    fn parse(&self, source: &str) -> Result<SyntaxTree>;
}

/// `syn`-backed parser for Rust source files
#[derive(Debug, Default, Clone)]
pub struct RustParser;

impl Parser for RustParser {
    fn parse(&self, source: &str) -> Result<SyntaxTree> {
        let file = syn::parse_file(source).map_err(|e| {
            let start: proc_macro2::LineColumn = e.span().start();
            MutationError::ParseError {
                file: Default::default(),
                error: format!("{} (line {}, column {})", e, start.line, start.column + 1),
            }
        })?;
        Ok(lower_file(&file))
    }
}

/// Lower a parsed file
pub fn lower_file(file: &syn::File) -> SyntaxTree {
    let mut items = Vec::new();
    if !file.attrs.is_empty() {
        let inner: Vec<String> = file.attrs.iter().map(tokens).collect();
        items.push(Node::Opaque(inner.join(" ")));
    }
    items.extend(file.items.iter().map(lower_item));
    SyntaxTree::new(Node::Module { items })
}

fn tokens<T: ToTokens>(t: &T) -> String {
    t.to_token_stream().to_string()
}

fn lower_item(item: &syn::Item) -> Node {
    match item {
        syn::Item::Fn(func) => {
            let mut signature = func.attrs.iter().map(tokens).collect::<Vec<_>>();
            signature.push(tokens(&func.vis));
            signature.push(tokens(&func.sig));
            lower_function(
                func.sig.ident.to_string(),
                signature,
                &func.attrs,
                &func.block,
            )
        }
        syn::Item::Impl(imp) => {
            let mut header = imp.attrs.iter().map(tokens).collect::<Vec<_>>();
            if imp.defaultness.is_some() {
                header.push("default".to_string());
            }
            if imp.unsafety.is_some() {
                header.push("unsafe".to_string());
            }
            header.push("impl".to_string());
            header.push(tokens(&imp.generics));
            if let Some((bang, path, _)) = &imp.trait_ {
                if bang.is_some() {
                    header.push("!".to_string());
                }
                header.push(tokens(path));
                header.push("for".to_string());
            }
            header.push(tokens(&imp.self_ty));
            if let Some(clause) = &imp.generics.where_clause {
                header.push(tokens(clause));
            }
            let items = imp
                .items
                .iter()
                .map(|item| match item {
                    syn::ImplItem::Fn(func) => {
                        let mut signature = func.attrs.iter().map(tokens).collect::<Vec<_>>();
                        signature.push(tokens(&func.vis));
                        if func.defaultness.is_some() {
                            signature.push("default".to_string());
                        }
                        signature.push(tokens(&func.sig));
                        lower_function(
                            func.sig.ident.to_string(),
                            signature,
                            &func.attrs,
                            &func.block,
                        )
                    }
                    other => Node::Opaque(tokens(other)),
                })
                .collect();
            Node::Impl {
                header: join_nonempty(header),
                items,
            }
        }
        other => Node::Opaque(tokens(other)),
    }
}

fn join_nonempty(parts: Vec<String>) -> String {
    parts
        .into_iter()
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn lower_function(
    name: String,
    signature: Vec<String>,
    attrs: &[syn::Attribute],
    block: &syn::Block,
) -> Node {
    let markers = attrs.iter().map(|a| path_string(a.path())).collect();
    let mut body = lower_stmts(&block.stmts);

    // The tail expression is the function's return value
    if let Some(Node::Expr { value, semi: false }) = body.last() {
        if !matches!(
            &**value,
            Node::If { .. } | Node::While { .. } | Node::For { .. } | Node::Return { .. }
        ) {
            if let Some(Node::Expr { value, .. }) = body.pop() {
                body.push(Node::Return {
                    value: Some(value),
                    implicit: true,
                });
            }
        }
    }

    Node::Function {
        name,
        signature: join_nonempty(signature),
        markers,
        body,
    }
}

fn path_string(path: &syn::Path) -> String {
    path.segments
        .iter()
        .map(|s| s.ident.to_string())
        .collect::<Vec<_>>()
        .join("::")
}

fn lower_stmts(stmts: &[Stmt]) -> Vec<Node> {
    stmts.iter().map(lower_stmt).collect()
}

fn lower_stmt(stmt: &Stmt) -> Node {
    match stmt {
        Stmt::Local(local) if local.attrs.is_empty() => match &local.init {
            Some(init) if init.diverge.is_none() => Node::Let {
                pattern: tokens(&local.pat),
                value: Some(Box::new(lower_expr(&init.expr))),
            },
            None => Node::Let {
                pattern: tokens(&local.pat),
                value: None,
            },
            Some(_) => Node::Opaque(tokens(stmt)),
        },
        Stmt::Expr(expr, semi) => Node::Expr {
            value: Box::new(lower_expr(expr)),
            semi: semi.is_some(),
        },
        _ => Node::Opaque(tokens(stmt)),
    }
}

fn lower_block(block: &syn::Block) -> Vec<Node> {
    lower_stmts(&block.stmts)
}

/// Lower an expression
pub fn lower_expr(expr: &Expr) -> Node {
    match expr {
        Expr::Paren(paren) if paren.attrs.is_empty() => lower_expr(&paren.expr),
        Expr::Binary(bin) if bin.attrs.is_empty() => lower_binary(bin),
        Expr::Unary(unary) if unary.attrs.is_empty() => match unary.op {
            UnOp::Neg(_) => Node::unary(UnaryOp::Neg, lower_expr(&unary.expr)),
            UnOp::Not(_) => Node::unary(UnaryOp::Not, lower_expr(&unary.expr)),
            _ => opaque_expr(expr),
        },
        Expr::Assign(assign) if assign.attrs.is_empty() => Node::Assign {
            target: Box::new(lower_expr(&assign.left)),
            value: Box::new(lower_expr(&assign.right)),
        },
        Expr::Return(ret) if ret.attrs.is_empty() => Node::Return {
            value: ret.expr.as_ref().map(|e| Box::new(lower_expr(e))),
            implicit: false,
        },
        Expr::If(expr_if) if expr_if.attrs.is_empty() => lower_if(expr_if),
        Expr::While(expr_while) if expr_while.attrs.is_empty() && expr_while.label.is_none() => {
            Node::While {
                test: Box::new(lower_guard(&expr_while.cond)),
                body: lower_block(&expr_while.body),
            }
        }
        Expr::ForLoop(for_loop) if for_loop.attrs.is_empty() && for_loop.label.is_none() => {
            Node::For {
                pattern: tokens(&for_loop.pat),
                iter: Box::new(lower_expr(&for_loop.expr)),
                body: lower_block(&for_loop.body),
            }
        }
        Expr::Block(block) if block.attrs.is_empty() && block.label.is_none() => Node::Block {
            body: lower_block(&block.block),
        },
        Expr::Call(call) if call.attrs.is_empty() => Node::Call {
            func: Box::new(lower_expr(&call.func)),
            args: call.args.iter().map(lower_expr).collect(),
        },
        Expr::MethodCall(call) if call.attrs.is_empty() => {
            let mut method = call.method.to_string();
            if let Some(turbofish) = &call.turbofish {
                method.push_str(&tokens(turbofish));
            }
            Node::MethodCall {
                receiver: Box::new(lower_expr(&call.receiver)),
                method,
                args: call.args.iter().map(lower_expr).collect(),
            }
        }
        Expr::Lit(lit) if lit.attrs.is_empty() => lower_lit(&lit.lit).unwrap_or_else(|| opaque_expr(expr)),
        Expr::Path(path) if path.attrs.is_empty() && path.qself.is_none() => {
            let text = tokens(&path.path);
            if text == "None" {
                Node::Literal(Literal::None)
            } else {
                Node::Name(text)
            }
        }
        _ => opaque_expr(expr),
    }
}

fn lower_binary(bin: &syn::ExprBinary) -> Node {
    let left = lower_expr(&bin.left);
    let right = lower_expr(&bin.right);
    let arith = |op| Node::binary(op, left.clone(), right.clone());
    let cmp = |op| Node::compare(op, left.clone(), right.clone());
    let boolean = |op| Node::BoolExpr {
        op,
        left: Box::new(left.clone()),
        right: Box::new(right.clone()),
    };
    let aug = |op| Node::AugAssign {
        target: Box::new(left.clone()),
        op,
        value: Box::new(right.clone()),
    };

    match bin.op {
        SynBinOp::Add(_) => arith(BinOp::Add),
        SynBinOp::Sub(_) => arith(BinOp::Sub),
        SynBinOp::Mul(_) => arith(BinOp::Mul),
        SynBinOp::Div(_) => arith(BinOp::Div),
        SynBinOp::Rem(_) => arith(BinOp::Rem),
        SynBinOp::BitAnd(_) => arith(BinOp::BitAnd),
        SynBinOp::BitOr(_) => arith(BinOp::BitOr),
        SynBinOp::BitXor(_) => arith(BinOp::BitXor),
        SynBinOp::Shl(_) => arith(BinOp::Shl),
        SynBinOp::Shr(_) => arith(BinOp::Shr),
        SynBinOp::Eq(_) => cmp(CmpOp::Eq),
        SynBinOp::Ne(_) => cmp(CmpOp::Ne),
        SynBinOp::Lt(_) => cmp(CmpOp::Lt),
        SynBinOp::Le(_) => cmp(CmpOp::Le),
        SynBinOp::Gt(_) => cmp(CmpOp::Gt),
        SynBinOp::Ge(_) => cmp(CmpOp::Ge),
        SynBinOp::And(_) => boolean(BoolOp::And),
        SynBinOp::Or(_) => boolean(BoolOp::Or),
        SynBinOp::AddAssign(_) => aug(BinOp::Add),
        SynBinOp::SubAssign(_) => aug(BinOp::Sub),
        SynBinOp::MulAssign(_) => aug(BinOp::Mul),
        SynBinOp::DivAssign(_) => aug(BinOp::Div),
        SynBinOp::RemAssign(_) => aug(BinOp::Rem),
        SynBinOp::BitAndAssign(_) => aug(BinOp::BitAnd),
        SynBinOp::BitOrAssign(_) => aug(BinOp::BitOr),
        SynBinOp::BitXorAssign(_) => aug(BinOp::BitXor),
        SynBinOp::ShlAssign(_) => aug(BinOp::Shl),
        SynBinOp::ShrAssign(_) => aug(BinOp::Shr),
        _ => opaque_expr(&Expr::Binary(bin.clone())),
    }
}

/// `if let`/`while let` guards and let chains stay verbatim and unparenthesized
fn lower_guard(cond: &Expr) -> Node {
    if binds_pattern(cond) {
        Node::Opaque(tokens(cond))
    } else {
        lower_expr(cond)
    }
}

fn binds_pattern(expr: &Expr) -> bool {
    match expr {
        Expr::Let(_) => true,
        Expr::Binary(bin) => {
            matches!(bin.op, SynBinOp::And(_)) && (binds_pattern(&bin.left) || binds_pattern(&bin.right))
        }
        _ => false,
    }
}

fn lower_if(expr_if: &syn::ExprIf) -> Node {
    let orelse = match &expr_if.else_branch {
        None => Vec::new(),
        Some((_, else_expr)) => match else_expr.as_ref() {
            Expr::If(nested) if nested.attrs.is_empty() => vec![lower_if(nested)],
            Expr::Block(block) => lower_block(&block.block),
            other => vec![Node::Expr {
                value: Box::new(lower_expr(other)),
                semi: false,
            }],
        },
    };
    Node::If {
        test: Box::new(lower_guard(&expr_if.cond)),
        body: lower_block(&expr_if.then_branch),
        orelse,
    }
}

fn lower_lit(lit: &Lit) -> Option<Node> {
    let literal = match lit {
        Lit::Int(int) if int.suffix().is_empty() => Literal::Int(int.base10_parse().ok()?),
        Lit::Float(float) if float.suffix().is_empty() => {
            Literal::Float(float.base10_parse().ok()?)
        }
        Lit::Str(s) if s.suffix().is_empty() => Literal::Str(s.value()),
        Lit::Bool(b) => Literal::Bool(b.value),
        _ => return None,
    };
    Some(Node::Literal(literal))
}

/// Verbatim expression, parenthesized unless it binds tighter than any operator.
/// Struct literals are always wrapped so they stay legal in `if`/`while` guards.
fn opaque_expr(expr: &Expr) -> Node {
    let text = tokens(expr);
    let atomic = matches!(
        expr,
        Expr::Array(_)
            | Expr::Block(_)
            | Expr::Call(_)
            | Expr::Field(_)
            | Expr::Index(_)
            | Expr::Let(_)
            | Expr::Lit(_)
            | Expr::Loop(_)
            | Expr::Macro(_)
            | Expr::Match(_)
            | Expr::MethodCall(_)
            | Expr::Paren(_)
            | Expr::Path(_)
            | Expr::Repeat(_)
            | Expr::Try(_)
            | Expr::Tuple(_)
            | Expr::Unsafe(_)
            | Expr::Const(_)
            | Expr::Async(_)
            | Expr::Await(_)
    );
    if atomic {
        Node::Opaque(text)
    } else {
        Node::Opaque(format!("({text})"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{NodeKind, NodePath};
    use pretty_assertions::assert_eq;

    fn parse(source: &str) -> SyntaxTree {
        RustParser.parse(source).unwrap()
    }

    #[test]
    fn test_lower_tail_expression_as_return() {
        let tree = parse("fn add(a: i32, b: i32) -> i32 { a + b }");
        let ret = tree.get(&NodePath::from_indices(vec![0, 0])).unwrap();
        assert_eq!(
            ret,
            &Node::Return {
                value: Some(Box::new(Node::binary(
                    BinOp::Add,
                    Node::name("a"),
                    Node::name("b")
                ))),
                implicit: true,
            }
        );
    }

    #[test]
    fn test_let_guards_stay_verbatim() {
        let tree = parse(
            "fn f(o: Option<u8>, y: u8) { if let Some(x) = o { g(x); } while y > 1 && let Some(z) = o { g(z); } if y > 2 { g(y); } }",
        );
        let guards: Vec<&Node> = tree
            .walk()
            .into_iter()
            .filter_map(|s| match s.node {
                Node::If { test, .. } | Node::While { test, .. } => Some(&**test),
                _ => None,
            })
            .collect();
        assert_eq!(guards.len(), 3);
        assert!(guards[0].is_pattern_guard());
        assert!(matches!(guards[0], Node::Opaque(text) if !text.starts_with('(')));
        assert!(guards[1].is_pattern_guard());
        assert_eq!(guards[2].kind(), NodeKind::Compare);
    }

    #[test]
    fn test_lower_comparison_and_boolean() {
        let tree = parse("fn f(x: i32, y: i32) -> bool { x <= y && !(x == 0) }");
        let kinds: Vec<NodeKind> = tree.walk().iter().map(|s| s.node.kind()).collect();
        assert!(kinds.contains(&NodeKind::BoolExpr));
        assert!(kinds.contains(&NodeKind::Compare));
        assert!(kinds.contains(&NodeKind::UnaryExpr));
    }

    #[test]
    fn test_lower_compound_assignment() {
        let tree = parse("fn f() { let mut x = 0; x += 2; x = x - 1; }");
        let body = tree.get(&NodePath::from_indices(vec![0])).unwrap();
        let kinds: Vec<NodeKind> = body
            .children()
            .iter()
            .map(|stmt| match stmt {
                Node::Expr { value, .. } => value.kind(),
                other => other.kind(),
            })
            .collect();
        assert_eq!(kinds, vec![NodeKind::Let, NodeKind::AugAssign, NodeKind::Assign]);
    }

    #[test]
    fn test_lower_else_if_chain() {
        let tree = parse("fn f(x: i32) -> i32 { if x > 0 { 1 } else if x < 0 { 2 } else { 3 } }");
        let stmt = tree.get(&NodePath::from_indices(vec![0, 0, 0])).unwrap();
        match stmt {
            Node::If { orelse, .. } => {
                assert_eq!(orelse.len(), 1);
                assert_eq!(orelse[0].kind(), NodeKind::If);
            }
            other => panic!("expected if, got {:?}", other),
        }
    }

    #[test]
    fn test_markers_collected() {
        let tree = parse("#[mutants::skip]\nfn f() -> bool { true }");
        match tree.get(&NodePath::from_indices(vec![0])).unwrap() {
            Node::Function { markers, name, .. } => {
                assert_eq!(name, "f");
                assert_eq!(markers, &vec!["mutants::skip".to_string()]);
            }
            other => panic!("expected function, got {:?}", other),
        }
    }

    #[test]
    fn test_unsupported_items_are_opaque() {
        let tree = parse("struct S { a: u8 }\nuse std::fmt;");
        let kinds: Vec<NodeKind> = tree.root().children().iter().map(|n| n.kind()).collect();
        assert_eq!(kinds, vec![NodeKind::Opaque, NodeKind::Opaque]);
    }

    #[test]
    fn test_non_atomic_opaque_is_parenthesized() {
        let tree = parse("fn f(x: u8) -> u32 { x as u32 + 1 }");
        let left = tree.get(&NodePath::from_indices(vec![0, 0, 0, 0])).unwrap();
        assert_eq!(left, &Node::Opaque("(x as u32)".to_string()));
    }

    #[test]
    fn test_none_and_literals() {
        let tree = parse("fn f() { g(None, 1, 2.5, \"s\", false, 3u8); }");
        let call = tree.get(&NodePath::from_indices(vec![0, 0, 0])).unwrap();
        match call {
            Node::Call { args, .. } => {
                assert_eq!(args[0], Node::Literal(Literal::None));
                assert_eq!(args[1], Node::int(1));
                assert_eq!(args[2], Node::Literal(Literal::Float(2.5)));
                assert_eq!(args[3], Node::string("s"));
                assert_eq!(args[4], Node::boolean(false));
                assert_eq!(args[5].kind(), NodeKind::Opaque);
            }
            other => panic!("expected call, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_error() {
        let result = RustParser.parse("fn broken( {");
        assert!(matches!(result, Err(MutationError::ParseError { .. })));
    }
}
