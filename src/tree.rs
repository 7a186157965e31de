//! Syntax tree model
//!
//! The engine never works on a parser's native AST. Parsers lower source into
//! this closed set of node kinds, the operators rewrite it, and serializers
//! print it back. Unsupported constructs are kept verbatim as `Opaque` nodes.

use std::fmt;

/// Field-less tag for every [`Node`] variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeKind {
    Module,
    Function,
    Impl,
    Let,
    Expr,
    Block,
    Assign,
    AugAssign,
    Return,
    If,
    While,
    For,
    BinaryExpr,
    Compare,
    BoolExpr,
    UnaryExpr,
    Call,
    MethodCall,
    Literal,
    Name,
    Opaque,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Module => "Module",
            NodeKind::Function => "Function",
            NodeKind::Impl => "Impl",
            NodeKind::Let => "Let",
            NodeKind::Expr => "Expr",
            NodeKind::Block => "Block",
            NodeKind::Assign => "Assign",
            NodeKind::AugAssign => "AugAssign",
            NodeKind::Return => "Return",
            NodeKind::If => "If",
            NodeKind::While => "While",
            NodeKind::For => "For",
            NodeKind::BinaryExpr => "BinaryExpr",
            NodeKind::Compare => "Compare",
            NodeKind::BoolExpr => "BoolExpr",
            NodeKind::UnaryExpr => "UnaryExpr",
            NodeKind::Call => "Call",
            NodeKind::MethodCall => "MethodCall",
            NodeKind::Literal => "Literal",
            NodeKind::Name => "Name",
            NodeKind::Opaque => "Opaque",
        }
    }

    /// Kinds that stand in expression position
    pub fn is_expression(&self) -> bool {
        matches!(
            self,
            NodeKind::Block
                | NodeKind::Assign
                | NodeKind::AugAssign
                | NodeKind::Return
                | NodeKind::If
                | NodeKind::While
                | NodeKind::For
                | NodeKind::BinaryExpr
                | NodeKind::Compare
                | NodeKind::BoolExpr
                | NodeKind::UnaryExpr
                | NodeKind::Call
                | NodeKind::MethodCall
                | NodeKind::Literal
                | NodeKind::Name
                | NodeKind::Opaque
        )
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Arithmetic and bitwise operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    /// Floor division. Rust has no such operator; kept for other frontends.
    FloorDiv,
    Rem,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

impl BinOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::FloorDiv => "//",
            BinOp::Rem => "%",
            BinOp::BitAnd => "&",
            BinOp::BitOr => "|",
            BinOp::BitXor => "^",
            BinOp::Shl => "<<",
            BinOp::Shr => ">>",
        }
    }
}

/// Relational and equality operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoolOp {
    And,
    Or,
}

impl BoolOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BoolOp::And => "&&",
            BoolOp::Or => "||",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Neg,
    /// Unary plus. Not expressible in Rust; the Rust serializer rejects it.
    Plus,
    Not,
}

impl UnaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Plus => "+",
            UnaryOp::Not => "!",
        }
    }
}

/// Literal payloads
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(u128),
    Float(f64),
    Str(String),
    Bool(bool),
    /// The "absent value" sentinel (`None` in Rust)
    None,
}

/// A node of the syntax tree
///
/// Child order is fixed per variant (see [`Node::children`]) and is what a
/// [`NodePath`] indexes into.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Module {
        items: Vec<Node>,
    },
    Function {
        name: String,
        /// Attributes, visibility and signature, verbatim
        signature: String,
        /// Attribute paths, e.g. `mutants::skip`
        markers: Vec<String>,
        body: Vec<Node>,
    },
    Impl {
        header: String,
        items: Vec<Node>,
    },
    Let {
        /// Pattern and optional type annotation, verbatim
        pattern: String,
        value: Option<Box<Node>>,
    },
    /// Expression statement
    Expr {
        value: Box<Node>,
        semi: bool,
    },
    Block {
        body: Vec<Node>,
    },
    Assign {
        target: Box<Node>,
        value: Box<Node>,
    },
    AugAssign {
        target: Box<Node>,
        op: BinOp,
        value: Box<Node>,
    },
    Return {
        value: Option<Box<Node>>,
        /// Tail expression of a function body rather than a `return`
        implicit: bool,
    },
    If {
        test: Box<Node>,
        body: Vec<Node>,
        /// A single bare `If` here is an `else if` chain
        orelse: Vec<Node>,
    },
    While {
        test: Box<Node>,
        body: Vec<Node>,
    },
    For {
        pattern: String,
        iter: Box<Node>,
        body: Vec<Node>,
    },
    BinaryExpr {
        op: BinOp,
        left: Box<Node>,
        right: Box<Node>,
    },
    Compare {
        op: CmpOp,
        left: Box<Node>,
        right: Box<Node>,
    },
    BoolExpr {
        op: BoolOp,
        left: Box<Node>,
        right: Box<Node>,
    },
    UnaryExpr {
        op: UnaryOp,
        operand: Box<Node>,
    },
    Call {
        func: Box<Node>,
        args: Vec<Node>,
    },
    MethodCall {
        receiver: Box<Node>,
        /// Method name including any turbofish
        method: String,
        args: Vec<Node>,
    },
    Literal(Literal),
    Name(String),
    /// Code the engine carries through untouched
    Opaque(String),
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Module { .. } => NodeKind::Module,
            Node::Function { .. } => NodeKind::Function,
            Node::Impl { .. } => NodeKind::Impl,
            Node::Let { .. } => NodeKind::Let,
            Node::Expr { .. } => NodeKind::Expr,
            Node::Block { .. } => NodeKind::Block,
            Node::Assign { .. } => NodeKind::Assign,
            Node::AugAssign { .. } => NodeKind::AugAssign,
            Node::Return { .. } => NodeKind::Return,
            Node::If { .. } => NodeKind::If,
            Node::While { .. } => NodeKind::While,
            Node::For { .. } => NodeKind::For,
            Node::BinaryExpr { .. } => NodeKind::BinaryExpr,
            Node::Compare { .. } => NodeKind::Compare,
            Node::BoolExpr { .. } => NodeKind::BoolExpr,
            Node::UnaryExpr { .. } => NodeKind::UnaryExpr,
            Node::Call { .. } => NodeKind::Call,
            Node::MethodCall { .. } => NodeKind::MethodCall,
            Node::Literal(_) => NodeKind::Literal,
            Node::Name(_) => NodeKind::Name,
            Node::Opaque(_) => NodeKind::Opaque,
        }
    }

    pub fn name(ident: impl Into<String>) -> Node {
        Node::Name(ident.into())
    }

    pub fn int(value: u128) -> Node {
        Node::Literal(Literal::Int(value))
    }

    pub fn boolean(value: bool) -> Node {
        Node::Literal(Literal::Bool(value))
    }

    pub fn string(value: impl Into<String>) -> Node {
        Node::Literal(Literal::Str(value.into()))
    }

    pub fn binary(op: BinOp, left: Node, right: Node) -> Node {
        Node::BinaryExpr {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn compare(op: CmpOp, left: Node, right: Node) -> Node {
        Node::Compare {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn unary(op: UnaryOp, operand: Node) -> Node {
        Node::UnaryExpr {
            op,
            operand: Box::new(operand),
        }
    }

    /// Logical negation, collapsing an existing `!`
    pub fn negated(self) -> Node {
        match self {
            Node::UnaryExpr {
                op: UnaryOp::Not,
                operand,
            } => *operand,
            other => Node::unary(UnaryOp::Not, other),
        }
    }

    /// Verbatim guard that binds a pattern (`if let`, `while let`, let chains)
    ///
    /// Such a guard cannot be negated or dropped: the body uses its bindings.
    pub fn is_pattern_guard(&self) -> bool {
        matches!(self, Node::Opaque(text) if text.split_whitespace().any(|t| t == "let"))
    }

    /// Children in path order
    pub fn children(&self) -> Vec<&Node> {
        match self {
            Node::Module { items } | Node::Impl { items, .. } => items.iter().collect(),
            Node::Function { body, .. } | Node::Block { body } => body.iter().collect(),
            Node::Let { value, .. } | Node::Return { value, .. } => {
                value.iter().map(|v| &**v).collect()
            }
            Node::Expr { value, .. } => vec![&**value],
            Node::Assign { target, value } | Node::AugAssign { target, value, .. } => {
                vec![&**target, &**value]
            }
            Node::If { test, body, orelse } => std::iter::once(&**test)
                .chain(body.iter())
                .chain(orelse.iter())
                .collect(),
            Node::While { test, body } => std::iter::once(&**test).chain(body.iter()).collect(),
            Node::For { iter, body, .. } => std::iter::once(&**iter).chain(body.iter()).collect(),
            Node::BinaryExpr { left, right, .. }
            | Node::Compare { left, right, .. }
            | Node::BoolExpr { left, right, .. } => vec![&**left, &**right],
            Node::UnaryExpr { operand, .. } => vec![&**operand],
            Node::Call { func, args } => std::iter::once(&**func).chain(args.iter()).collect(),
            Node::MethodCall { receiver, args, .. } => {
                std::iter::once(&**receiver).chain(args.iter()).collect()
            }
            Node::Literal(_) | Node::Name(_) | Node::Opaque(_) => Vec::new(),
        }
    }

    /// Mutable children in path order
    pub fn children_mut(&mut self) -> Vec<&mut Node> {
        match self {
            Node::Module { items } | Node::Impl { items, .. } => items.iter_mut().collect(),
            Node::Function { body, .. } | Node::Block { body } => body.iter_mut().collect(),
            Node::Let { value, .. } | Node::Return { value, .. } => {
                value.iter_mut().map(|v| &mut **v).collect()
            }
            Node::Expr { value, .. } => vec![&mut **value],
            Node::Assign { target, value } | Node::AugAssign { target, value, .. } => {
                vec![&mut **target, &mut **value]
            }
            Node::If { test, body, orelse } => std::iter::once(&mut **test)
                .chain(body.iter_mut())
                .chain(orelse.iter_mut())
                .collect(),
            Node::While { test, body } => {
                std::iter::once(&mut **test).chain(body.iter_mut()).collect()
            }
            Node::For { iter, body, .. } => {
                std::iter::once(&mut **iter).chain(body.iter_mut()).collect()
            }
            Node::BinaryExpr { left, right, .. }
            | Node::Compare { left, right, .. }
            | Node::BoolExpr { left, right, .. } => vec![&mut **left, &mut **right],
            Node::UnaryExpr { operand, .. } => vec![&mut **operand],
            Node::Call { func, args } => {
                std::iter::once(&mut **func).chain(args.iter_mut()).collect()
            }
            Node::MethodCall { receiver, args, .. } => {
                std::iter::once(&mut **receiver).chain(args.iter_mut()).collect()
            }
            Node::Literal(_) | Node::Name(_) | Node::Opaque(_) => Vec::new(),
        }
    }

    pub fn child(&self, index: usize) -> Option<&Node> {
        self.children().into_iter().nth(index)
    }

    pub fn child_mut(&mut self, index: usize) -> Option<&mut Node> {
        self.children_mut().into_iter().nth(index)
    }

    /// Number of nodes in this subtree, including `self`
    pub fn size(&self) -> usize {
        1 + self.children().iter().map(|c| c.size()).sum::<usize>()
    }
}

/// Location of a node as child indices from the root
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodePath(Vec<usize>);

impl NodePath {
    pub fn root() -> Self {
        NodePath(Vec::new())
    }

    pub fn from_indices(indices: Vec<usize>) -> Self {
        NodePath(indices)
    }

    pub fn child(&self, index: usize) -> Self {
        let mut indices = self.0.clone();
        indices.push(index);
        NodePath(indices)
    }

    pub fn indices(&self) -> &[usize] {
        &self.0
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

    pub fn is_prefix_of(&self, other: &NodePath) -> bool {
        other.0.starts_with(&self.0)
    }

    /// True when one path lies inside the subtree addressed by the other
    pub fn overlaps(&self, other: &NodePath) -> bool {
        self.is_prefix_of(other) || other.is_prefix_of(self)
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("/");
        }
        let parts: Vec<String> = self.0.iter().map(|i| i.to_string()).collect();
        write!(f, "/{}", parts.join("/"))
    }
}

/// A visited node together with its location and enclosing function
#[derive(Debug, Clone)]
pub struct Site<'a> {
    pub path: NodePath,
    pub node: &'a Node,
    /// Innermost `Function` node containing this site
    pub function: Option<&'a Node>,
}

impl<'a> Site<'a> {
    pub fn function_name(&self) -> Option<&'a str> {
        match self.function {
            Some(Node::Function { name, .. }) => Some(name.as_str()),
            _ => None,
        }
    }

    pub fn function_markers(&self) -> &'a [String] {
        match self.function {
            Some(Node::Function { markers, .. }) => markers.as_slice(),
            _ => &[],
        }
    }
}

/// An owned tree rooted at a program unit
///
/// `Clone` is a deep copy: no node is shared between two trees.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntaxTree {
    root: Node,
}

impl SyntaxTree {
    pub fn new(root: Node) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn into_root(self) -> Node {
        self.root
    }

    pub fn get(&self, path: &NodePath) -> Option<&Node> {
        path.indices()
            .iter()
            .try_fold(&self.root, |node, &index| node.child(index))
    }

    pub fn get_mut(&mut self, path: &NodePath) -> Option<&mut Node> {
        let mut node = &mut self.root;
        for &index in path.indices() {
            node = node.child_mut(index)?;
        }
        Some(node)
    }

    /// Splice `replacement` in at `path`, returning the node it displaced
    pub fn replace(&mut self, path: &NodePath, replacement: Node) -> Option<Node> {
        let slot = self.get_mut(path)?;
        Some(std::mem::replace(slot, replacement))
    }

    /// All nodes in pre-order
    pub fn walk(&self) -> Vec<Site<'_>> {
        let mut sites = Vec::with_capacity(self.root.size());
        let mut stack = vec![(NodePath::root(), &self.root, None)];

        while let Some((path, node, function)) = stack.pop() {
            let inner = match node {
                Node::Function { .. } => Some(node),
                _ => function,
            };
            let children = node.children();
            for (index, child) in children.into_iter().enumerate().rev() {
                stack.push((path.child(index), child, inner));
            }
            sites.push(Site {
                path,
                node,
                function,
            });
        }

        sites
    }

    pub fn node_count(&self) -> usize {
        self.root.size()
    }
}
