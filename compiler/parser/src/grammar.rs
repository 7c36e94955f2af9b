//! The grammar driver.
//!
//! A push parser: the token supplier feeds one terminal at a time into
//! [`Grammar::parse`] and may ask [`Grammar::shifts`] whether a terminal
//! would be acceptable right now. The automaton is an LR-style pushdown
//! spelled out by hand as a stack of frames; its only outputs are calls
//! into the [`CstBuilder`] and diagnostics.
//!
//! Expressions are parsed by precedence climbing over the pre-bucketed
//! operator classes. Statement frames reduce on their terminators
//! (`NL`, `DEDENT`, end of input) and emit one CST node each.

use cst::{Cst, CstBuilder, NodeKind};
use diagnostics::{Diagnostic, Reporter};
use span::{SourceFile, Span};
use token::{binary_precedence, is_right_associative, TokenKind, APP_PRECEDENCE, LOW_PRECEDENCE};
use utility::{quoted, SmallVec};

pub(crate) struct Grammar<'a> {
    file: &'a SourceFile,
    reporter: &'a Reporter,
    builder: CstBuilder,
    stack: Vec<Frame>,
}

/// How a frame handled the current terminal.
enum Step {
    Consumed,
    Redispatch,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Flavor {
    /// The full expression language.
    Full,
    /// The pattern/type sublanguage: operators, names, literals, holes
    /// and parentheses only.
    Pattern,
}

struct ExprState {
    base: usize,
    min_prec: u8,
    flavor: Flavor,
    have_operand: bool,
    ops: SmallVec<Op, 4>,
    /// Open indentation continuations: `INDENT`s absorbed mid-expression
    /// whose matching `DEDENT`s are still pending.
    conts: u32,
}

impl ExprState {
    /// The binding strength an operand must respect at this point.
    fn operand_min(&self) -> u8 {
        if self.have_operand {
            APP_PRECEDENCE
        } else if let Some(op) = self.ops.last() {
            op.prec
        } else {
            self.min_prec
        }
    }
}

#[derive(Clone, Copy)]
struct Op {
    prec: u8,
    right: bool,
    kind: OpKind,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum OpKind {
    App,
    Binary,
    Unary,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum PortDir {
    Import,
    Export,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum IdEq {
    None,
    /// A clause name was seen, no `=` yet.
    Open,
    /// `name =` was seen, the source name is pending.
    WantSource,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum DefKind {
    Def,
    Target,
    Publish,
}

impl DefKind {
    fn node(self) -> NodeKind {
        match self {
            Self::Def => NodeKind::Def,
            Self::Target => NodeKind::Target,
            Self::Publish => NodeKind::Publish,
        }
    }
}

struct EltState {
    base: usize,
    colon: bool,
}

enum Frame {
    Top {
        /// Builder entries holding pending `global`/`export` flag nodes.
        flags: u32,
    },
    Expr(ExprState),
    Paren {
        base: usize,
        open: Span,
        closer: TokenKind,
    },
    Interp {
        base: usize,
        string: bool,
        open: Span,
    },
    Package {
        base: usize,
        kw: Span,
        named: bool,
    },
    Port {
        base: usize,
        kw: Span,
        dir: Option<PortDir>,
        /// The source package name was seen.
        named: bool,
        allow_kind: bool,
        allow_arity: bool,
        ideq: IdEq,
        ideq_base: usize,
    },
    Topic {
        base: usize,
        kw: Span,
        /// 0 name, 1 colon/type, 2 complete
        stage: u8,
    },
    DataDecl {
        base: usize,
        kw: Span,
        /// 0 head, 2 constructors
        stage: u8,
        block: bool,
    },
    TupleDecl {
        base: usize,
        kw: Span,
        /// 0 head, 2 elements
        stage: u8,
        block: bool,
        elt: Option<EltState>,
    },
    DefDecl {
        base: usize,
        kw: Span,
        kind: DefKind,
        /// 0 lhs, 1 want `=` (or `\` for targets), 2 subkey, 3 body,
        /// 4 terminator
        stage: u8,
        backslash: Option<Span>,
    },
    Block {
        base: usize,
        indent: Span,
        expr_seen: bool,
    },
    MatchHead {
        base: usize,
        kw: Span,
        in_cases: bool,
    },
    Case {
        base: usize,
        /// 0 pattern, 1 after pattern, 2 guard, 3 want `=`, 4 body,
        /// 5 done
        stage: u8,
    },
    IfHead {
        base: usize,
        kw: Span,
        /// 0 condition, 1 want `then`, 2 then-branch, 3 want `else`,
        /// 4 else-branch, 5 done
        stage: u8,
    },
    LambdaHead {
        base: usize,
        kw: Span,
        /// 0 binder, 1 body
        stage: u8,
    },
    RequireStmt {
        base: usize,
        kw: Span,
        /// 0 pattern, 1 want `=`, 2 rhs, 3 after rhs, 4 else-branch,
        /// 5 done
        stage: u8,
    },
    PrimHead {
        base: usize,
        kw: Span,
    },
    SubscribeHead {
        base: usize,
        kw: Span,
    },
    Recover {
        base: usize,
        start: Span,
        end: Span,
    },
}

impl Frame {
    /// The builder position this frame's subtrees start at.
    fn base(&self) -> Option<usize> {
        match self {
            Self::Top { .. } => None,
            Self::Expr(state) => Some(state.base),
            Self::Paren { base, .. }
            | Self::Interp { base, .. }
            | Self::Package { base, .. }
            | Self::Port { base, .. }
            | Self::Topic { base, .. }
            | Self::DataDecl { base, .. }
            | Self::TupleDecl { base, .. }
            | Self::DefDecl { base, .. }
            | Self::Block { base, .. }
            | Self::MatchHead { base, .. }
            | Self::Case { base, .. }
            | Self::IfHead { base, .. }
            | Self::LambdaHead { base, .. }
            | Self::RequireStmt { base, .. }
            | Self::PrimHead { base, .. }
            | Self::SubscribeHead { base, .. }
            | Self::Recover { base, .. } => Some(*base),
        }
    }
}

/// Pull a typed reference to the top frame; the caller guarantees the
/// variant.
macro_rules! top {
    ($self:ident, Expr($state:ident)) => {
        let Some(Frame::Expr($state)) = $self.stack.last_mut() else {
            unreachable!()
        };
    };
    ($self:ident, $variant:ident { $($field:ident),* $(,)? }) => {
        let Some(Frame::$variant { $($field,)* .. }) = $self.stack.last_mut() else {
            unreachable!()
        };
    };
}

impl<'a> Grammar<'a> {
    pub(crate) fn new(file: &'a SourceFile, reporter: &'a Reporter) -> Self {
        Self {
            file,
            reporter,
            builder: CstBuilder::new(file.content().len() as u32),
            stack: vec![Frame::Top { flags: 0 }],
        }
    }

    /// Would the automaton shift the given terminal in its current state?
    ///
    /// Queried by the token supplier for `STR_CLOSE`/`REG_CLOSE` (the `}`
    /// disambiguation) and by the offside processor for `NL`. This is the
    /// only coupling between lexing and parser state.
    pub(crate) fn shifts(&self, kind: TokenKind) -> bool {
        match kind {
            TokenKind::StrClose | TokenKind::RegClose => {
                for frame in self.stack.iter().rev() {
                    match frame {
                        // a reducible expression gets folded away by the
                        // closing piece
                        Frame::Expr(state) if state.have_operand => {}
                        Frame::Interp { string, .. } => {
                            return *string == (kind == TokenKind::StrClose);
                        }
                        _ => return false,
                    }
                }
                false
            }
            TokenKind::Nl => self.shifts_nl(),
            _ => true,
        }
    }

    fn shifts_nl(&self) -> bool {
        // `passed` tracks whether the walk went through a construct that
        // would reduce on the line break
        let mut passed = false;

        for frame in self.stack.iter().rev() {
            match frame {
                Frame::Expr(state) => {
                    if !state.have_operand || state.conts > 0 {
                        return false;
                    }
                    passed = true;
                }
                // a line break never terminates anything inside brackets
                // or interpolations
                Frame::Paren { .. } | Frame::Interp { .. } => return false,
                Frame::Top { .. } | Frame::Block { .. } | Frame::Recover { .. } => return true,
                Frame::Package { named, .. } => return *named,
                Frame::Port { named, dir, .. } => return *named && dir.is_some(),
                Frame::Topic { stage, .. } => return *stage == 2 || (*stage == 1 && passed),
                Frame::DataDecl { stage, block, .. } => {
                    return *stage == 2 && (*block || passed);
                }
                Frame::TupleDecl { stage, block, .. } => {
                    return *stage == 2 && (*block || passed);
                }
                Frame::DefDecl { stage, .. } => {
                    return *stage == 4 || (*stage == 3 && passed);
                }
                Frame::MatchHead { in_cases, .. } => return *in_cases,
                Frame::Case { stage, .. } => {
                    return *stage == 5 || (*stage == 4 && passed);
                }
                Frame::RequireStmt { stage, .. } => {
                    return matches!(*stage, 3 | 5) || (passed && matches!(*stage, 2 | 4));
                }
                // these close on any terminal once their last component
                // is complete: look through them
                Frame::IfHead { stage, .. } if *stage == 5 || (*stage == 4 && passed) => {}
                Frame::LambdaHead { stage, .. } if *stage == 1 && passed => {}
                Frame::IfHead { .. }
                | Frame::LambdaHead { .. }
                | Frame::PrimHead { .. }
                | Frame::SubscribeHead { .. } => return false,
            }
        }
        true
    }

    /// Consume one terminal.
    pub(crate) fn parse(&mut self, kind: TokenKind, span: Span) {
        loop {
            match self.step(kind, span) {
                Step::Consumed => break,
                Step::Redispatch => {}
            }
        }
    }

    pub(crate) fn finish(self) -> Cst {
        self.builder.freeze()
    }

    fn step(&mut self, kind: TokenKind, span: Span) -> Step {
        match self.stack.last().expect("frame stack underflow") {
            Frame::Top { .. } => self.step_top(kind, span),
            Frame::Expr(_) => self.step_expr(kind, span),
            Frame::Paren { .. } => self.step_paren(kind, span),
            Frame::Interp { .. } => self.step_interp(kind, span),
            Frame::Package { .. } => self.step_package(kind, span),
            Frame::Port { .. } => self.step_port(kind, span),
            Frame::Topic { .. } => self.step_topic(kind, span),
            Frame::DataDecl { .. } => self.step_data(kind, span),
            Frame::TupleDecl { .. } => self.step_tuple(kind, span),
            Frame::DefDecl { .. } => self.step_def(kind, span),
            Frame::Block { .. } => self.step_block(kind, span),
            Frame::MatchHead { .. } => self.step_match(kind, span),
            Frame::Case { .. } => self.step_case(kind, span),
            Frame::IfHead { .. } => self.step_if(kind, span),
            Frame::LambdaHead { .. } => self.step_lambda(kind, span),
            Frame::RequireStmt { .. } => self.step_require(kind, span),
            Frame::PrimHead { .. } => self.step_prim(kind, span),
            Frame::SubscribeHead { .. } => self.step_subscribe(kind, span),
            Frame::Recover { .. } => self.step_recover(kind, span),
        }
    }

    // ------------------------------------------------------------------
    // shared helpers

    fn source(&self, span: Span) -> &str {
        std::str::from_utf8(&self.file.bytes()[Into::<std::ops::Range<usize>>::into(span)])
            .unwrap_or("")
    }

    fn error(&self, span: Span, message: String) {
        Diagnostic::error()
            .message(message)
            .unlabeled_span(span)
            .report(self.reporter);
    }

    fn unexpected(&mut self, kind: TokenKind, span: Span, expected: &str) {
        self.error(span, format!("found {kind} but expected {expected}"));
    }

    /// Emit a leaf token together with its wrapper node.
    fn leaf(&mut self, token: TokenKind, node: NodeKind, span: Span) {
        self.builder.add_token(token, span);
        self.builder.add_node(node, 0, Some(span), None);
    }

    fn entries(&self) -> usize {
        self.builder.entries()
    }

    /// Notify the frame below a popped child that the child's subtree is
    /// complete. Completion can cascade (a lambda closes on its body).
    fn complete_child(&mut self) {
        loop {
            match self.stack.last_mut() {
                Some(Frame::Expr(state)) => {
                    state.have_operand = true;
                    return;
                }
                Some(Frame::Topic { stage, .. }) => {
                    if *stage == 1 {
                        *stage = 2;
                    }
                    return;
                }
                Some(Frame::DefDecl { stage, backslash, .. }) => {
                    match *stage {
                        0 => *stage = 1,
                        2 => {
                            // wrap the subkey arguments
                            let bs = *backslash;
                            self.builder.add_node(NodeKind::Lambda, 1, bs, None);
                            top!(self, DefDecl { stage });
                            *stage = 1;
                        }
                        3 => *stage = 4,
                        _ => {}
                    }
                    return;
                }
                Some(Frame::Block { expr_seen, .. }) => {
                    *expr_seen = true;
                    return;
                }
                Some(Frame::Case { stage, .. }) => {
                    match *stage {
                        0 => *stage = 1,
                        2 => {
                            self.builder.add_node(NodeKind::Guard, 1, None, None);
                            top!(self, Case { stage });
                            *stage = 3;
                        }
                        4 => *stage = 5,
                        _ => {}
                    }
                    return;
                }
                Some(Frame::IfHead { stage, .. }) => {
                    match *stage {
                        0 => *stage = 1,
                        2 => *stage = 3,
                        4 => *stage = 5,
                        _ => {}
                    }
                    return;
                }
                Some(Frame::LambdaHead { kw, stage, .. }) => {
                    if *stage == 0 {
                        *stage = 1;
                        // the body follows immediately
                        self.push_expr(LOW_PRECEDENCE, Flavor::Full);
                        return;
                    }
                    let kw = *kw;
                    self.stack.pop();
                    self.builder.add_node(NodeKind::Lambda, 2, Some(kw), None);
                    // cascade: the lambda itself is an operand
                }
                Some(Frame::RequireStmt { stage, .. }) => {
                    match *stage {
                        0 => *stage = 1,
                        2 => *stage = 3,
                        4 => *stage = 5,
                        _ => {}
                    }
                    return;
                }
                _ => return,
            }
        }
    }

    fn push_expr(&mut self, min_prec: u8, flavor: Flavor) {
        self.stack.push(Frame::Expr(ExprState {
            base: self.builder.entries(),
            min_prec,
            flavor,
            have_operand: false,
            ops: SmallVec::new(),
            conts: 0,
        }));
    }

    /// Reduce the expression on top of the stack completely, leaving one
    /// builder entry, then pop its frame and notify the parent.
    fn finish_expr(&mut self, span: Span) {
        {
            let Some(Frame::Expr(state)) = self.stack.last_mut() else {
                unreachable!()
            };
            if !state.have_operand {
                let message = if state.ops.is_empty() {
                    "expected an expression"
                } else {
                    "expected an operand after the operator"
                };
                self.error(span, message.into());
                self.builder
                    .add_node(NodeKind::Error, 0, Some(span.start()), None);
                top!(self, Expr(state));
                state.have_operand = true;
            }
        }

        loop {
            let Some(Frame::Expr(state)) = self.stack.last_mut() else {
                unreachable!()
            };
            let Some(op) = state.ops.pop() else { break };
            self.reduce(op);
        }

        self.stack.pop();
        self.complete_child();
    }

    fn reduce(&mut self, op: Op) {
        match op.kind {
            OpKind::App => self.builder.add_node(NodeKind::App, 2, None, None),
            OpKind::Binary => self.builder.add_node(NodeKind::Binary, 3, None, None),
            OpKind::Unary => self.builder.add_node(NodeKind::Unary, 2, None, None),
        }
    }

    /// Prepare for a new operand: in application position, reduce tighter
    /// pending operators and queue the implicit application.
    fn begin_operand(&mut self) {
        {
            let Some(Frame::Expr(state)) = self.stack.last() else {
                unreachable!()
            };
            if !state.have_operand {
                return;
            }
        }

        loop {
            let Some(Frame::Expr(state)) = self.stack.last_mut() else {
                unreachable!()
            };
            match state.ops.last() {
                Some(&op) if op.prec >= APP_PRECEDENCE => {
                    state.ops.pop();
                    self.reduce(op);
                }
                _ => break,
            }
        }

        top!(self, Expr(state));
        state.ops.push(Op { prec: APP_PRECEDENCE, right: false, kind: OpKind::App });
        state.have_operand = false;
    }

    fn end_operand(&mut self) {
        top!(self, Expr(state));
        state.have_operand = true;
    }

    /// Check that a loose construct (`match`, `if`, `\`, `prim`,
    /// `subscribe`) is allowed at the current binding strength.
    fn check_low_operand(&mut self, kind: TokenKind, span: Span) {
        let min = {
            let Some(Frame::Expr(state)) = self.stack.last() else {
                unreachable!()
            };
            state.operand_min()
        };
        if min > LOW_PRECEDENCE {
            self.error(
                span,
                format!("lower precedence construct {kind} must use parentheses here"),
            );
        }
    }

    /// Begin error recovery for the current statement: discard its partial
    /// subtrees and swallow terminals until the next `NL`/`DEDENT`/end of
    /// input, leaving a single error node behind.
    fn recover(&mut self, span: Span) {
        let mut base = self.builder.entries();

        while let Some(frame) = self.stack.last() {
            match frame {
                Frame::Top { .. }
                | Frame::Block { .. }
                | Frame::MatchHead { in_cases: true, .. }
                | Frame::DataDecl { stage: 2, block: true, .. }
                | Frame::TupleDecl { stage: 2, block: true, .. }
                | Frame::Recover { .. } => break,
                _ => {
                    if let Some(frame_base) = frame.base() {
                        base = base.min(frame_base);
                    }
                    self.stack.pop();
                }
            }
        }

        if let Some(Frame::Recover { end, .. }) = self.stack.last_mut() {
            *end = end.merge(&span);
            return;
        }

        self.stack.push(Frame::Recover { base, start: span, end: span });
    }

    fn close_recover(&mut self) {
        let Some(Frame::Recover { base, start, end }) = self.stack.pop() else {
            unreachable!()
        };

        let over = self.builder.entries().saturating_sub(base);
        self.builder.del_nodes(over);
        self.builder
            .add_node(NodeKind::Error, 0, Some(start), Some(end));
    }

    // ------------------------------------------------------------------
    // top level

    fn step_top(&mut self, kind: TokenKind, span: Span) -> Step {
        use TokenKind::*;

        match kind {
            Nl => Step::Consumed,
            // stray dedents only come out of error recovery
            Dedent => Step::Consumed,
            Global => {
                self.leaf(Global, NodeKind::FlagGlobal, span);
                top!(self, Top { flags });
                *flags += 1;
                Step::Consumed
            }
            Export => {
                self.leaf(Export, NodeKind::FlagExport, span);
                top!(self, Top { flags });
                *flags += 1;
                Step::Consumed
            }
            Package => {
                self.drop_flags(span, "a package declaration takes no flags");
                self.stack.push(Frame::Package {
                    base: self.entries(),
                    kw: span,
                    named: false,
                });
                Step::Consumed
            }
            From => {
                self.drop_flags(span, "an import or export takes no flags");
                self.push_port(span);
                Step::Consumed
            }
            Topic => {
                let base = self.statement_base();
                self.stack.push(Frame::Topic { base, kw: span, stage: 0 });
                Step::Consumed
            }
            Data => {
                let base = self.statement_base();
                self.stack
                    .push(Frame::DataDecl { base, kw: span, stage: 0, block: false });
                self.push_expr(LOW_PRECEDENCE, Flavor::Pattern);
                Step::Consumed
            }
            Tuple => {
                let base = self.statement_base();
                self.stack.push(Frame::TupleDecl {
                    base,
                    kw: span,
                    stage: 0,
                    block: false,
                    elt: None,
                });
                self.push_expr(LOW_PRECEDENCE, Flavor::Pattern);
                Step::Consumed
            }
            Def | Target | Publish => {
                let base = self.statement_base();
                self.push_def(kind, span, base);
                Step::Consumed
            }
            EndOfInput => {
                let children = self.entries() as u32;
                self.builder.add_node(
                    NodeKind::Top,
                    children,
                    Some(self.file.span().start()),
                    Some(span),
                );
                Step::Consumed
            }
            _ => {
                self.unexpected(kind, span, "a declaration");
                self.recover(span);
                Step::Consumed
            }
        }
    }

    /// The builder position a new statement starts at: pending flag nodes
    /// belong to it.
    fn statement_base(&mut self) -> usize {
        let Some(Frame::Top { flags }) = self.stack.last_mut() else {
            // statements inside blocks carry no flags
            return self.builder.entries();
        };
        let pending = *flags as usize;
        *flags = 0;
        self.builder.entries() - pending
    }

    fn drop_flags(&mut self, span: Span, message: &str) {
        let Some(Frame::Top { flags }) = self.stack.last_mut() else {
            return;
        };
        if *flags != 0 {
            let pending = *flags as usize;
            *flags = 0;
            self.builder.del_nodes(pending);
            self.error(span, message.into());
        }
    }

    fn push_def(&mut self, kind: TokenKind, span: Span, base: usize) {
        let def = match kind {
            TokenKind::Def => DefKind::Def,
            TokenKind::Target => DefKind::Target,
            _ => DefKind::Publish,
        };
        self.stack.push(Frame::DefDecl {
            base,
            kw: span,
            kind: def,
            stage: 0,
            backslash: None,
        });
        self.push_expr(LOW_PRECEDENCE, Flavor::Pattern);
    }

    fn push_port(&mut self, span: Span) {
        let base = self.builder.entries();
        self.stack.push(Frame::Port {
            base,
            kw: span,
            dir: None,
            named: false,
            allow_kind: true,
            allow_arity: true,
            ideq: IdEq::None,
            ideq_base: base,
        });
    }

    // ------------------------------------------------------------------
    // expressions

    fn step_expr(&mut self, kind: TokenKind, span: Span) -> Step {
        use TokenKind::*;

        let (flavor, have_operand, min_prec) = {
            let Some(Frame::Expr(state)) = self.stack.last() else {
                unreachable!()
            };
            (state.flavor, state.have_operand, state.min_prec)
        };

        let operand_start = kind.starts_term()
            && match kind {
                Here | StrOpen | RegOpen | Match | If | Backslash | Prim | Subscribe => {
                    flavor == Flavor::Full
                }
                _ => true,
            };

        // in contexts tighter than application the operand belongs to the
        // frame below (match scrutinees, lambda binders)
        if operand_start && have_operand && min_prec > APP_PRECEDENCE {
            self.finish_expr(span);
            return Step::Redispatch;
        }

        match kind {
            Id => {
                self.begin_operand();
                self.leaf(Id, NodeKind::Id, span);
                self.end_operand();
                Step::Consumed
            }
            Hole => {
                self.begin_operand();
                self.leaf(Hole, NodeKind::Hole, span);
                self.end_operand();
                Step::Consumed
            }
            Integer | Double | StrRaw | StrSingle | RegSingle => {
                self.begin_operand();
                self.leaf(kind, NodeKind::Literal, span);
                self.end_operand();
                Step::Consumed
            }
            Here if flavor == Flavor::Full => {
                self.begin_operand();
                self.leaf(Here, NodeKind::Literal, span);
                self.end_operand();
                Step::Consumed
            }
            StrOpen | RegOpen if flavor == Flavor::Full => {
                self.begin_operand();
                let base = self.entries();
                self.builder.add_token(kind, span);
                self.builder.add_node(NodeKind::Literal, 0, Some(span), None);
                self.stack.push(Frame::Interp {
                    base,
                    string: kind == StrOpen,
                    open: span,
                });
                self.push_expr(LOW_PRECEDENCE, Flavor::Full);
                Step::Consumed
            }
            ParenOpen | BracketOpen | BraceOpen => {
                self.begin_operand();
                self.builder.add_token(kind, span);
                let closer = match kind {
                    ParenOpen => ParenClose,
                    BracketOpen => BracketClose,
                    _ => BraceClose,
                };
                self.stack.push(Frame::Paren {
                    base: self.entries(),
                    open: span,
                    closer,
                });
                self.push_expr(LOW_PRECEDENCE, flavor);
                Step::Consumed
            }
            Match if flavor == Flavor::Full => {
                self.check_low_operand(kind, span);
                self.begin_operand();
                self.stack.push(Frame::MatchHead {
                    base: self.entries(),
                    kw: span,
                    in_cases: false,
                });
                self.push_expr(APP_PRECEDENCE + 1, Flavor::Full);
                Step::Consumed
            }
            If if flavor == Flavor::Full => {
                self.check_low_operand(kind, span);
                self.begin_operand();
                self.stack.push(Frame::IfHead {
                    base: self.entries(),
                    kw: span,
                    stage: 0,
                });
                self.push_expr(LOW_PRECEDENCE, Flavor::Full);
                Step::Consumed
            }
            Backslash if flavor == Flavor::Full => {
                self.check_low_operand(kind, span);
                self.begin_operand();
                self.stack.push(Frame::LambdaHead {
                    base: self.entries(),
                    kw: span,
                    stage: 0,
                });
                self.push_expr(APP_PRECEDENCE + 1, Flavor::Pattern);
                Step::Consumed
            }
            Prim if flavor == Flavor::Full => {
                self.check_low_operand(kind, span);
                self.begin_operand();
                self.stack.push(Frame::PrimHead { base: self.entries(), kw: span });
                Step::Consumed
            }
            Subscribe if flavor == Flavor::Full => {
                self.check_low_operand(kind, span);
                self.begin_operand();
                self.stack
                    .push(Frame::SubscribeHead { base: self.entries(), kw: span });
                Step::Consumed
            }
            Indent if min_prec <= APP_PRECEDENCE => {
                top!(self, Expr(state));
                state.conts += 1;
                Step::Consumed
            }
            Dedent | Nl if self.expr_conts() > 0 => {
                top!(self, Expr(state));
                if kind == Dedent {
                    state.conts -= 1;
                }
                Step::Consumed
            }
            _ if binary_precedence(kind).is_some() => self.step_expr_operator(kind, span),
            // anything else ends this expression; the parent decides
            _ => {
                self.finish_expr(span);
                Step::Redispatch
            }
        }
    }

    fn step_expr_operator(&mut self, kind: TokenKind, span: Span) -> Step {
        let prec = binary_precedence(kind).unwrap();
        let right = is_right_associative(kind, self.source(span));

        let (have_operand, min_prec) = {
            let Some(Frame::Expr(state)) = self.stack.last() else {
                unreachable!()
            };
            (state.have_operand, state.min_prec)
        };

        if have_operand {
            if prec < min_prec {
                self.finish_expr(span);
                return Step::Redispatch;
            }

            loop {
                let Some(Frame::Expr(state)) = self.stack.last_mut() else {
                    unreachable!()
                };
                match state.ops.last() {
                    Some(&op) if op.prec > prec || (op.prec == prec && !right) => {
                        state.ops.pop();
                        self.reduce(op);
                    }
                    _ => break,
                }
            }

            self.leaf(kind, NodeKind::Op, span);
            top!(self, Expr(state));
            state.ops.push(Op { prec, right, kind: OpKind::Binary });
            state.have_operand = false;
        } else {
            // prefix position: a unary operator binds one level tighter
            // than its binary form
            let min = {
                let Some(Frame::Expr(state)) = self.stack.last() else {
                    unreachable!()
                };
                state.operand_min()
            };
            if prec < min {
                self.error(
                    span,
                    format!(
                        "lower precedence unary operator ‘{}’ must use parentheses here",
                        self.source(span),
                    ),
                );
            }
            self.leaf(kind, NodeKind::Op, span);
            top!(self, Expr(state));
            state.ops.push(Op {
                prec: prec.saturating_add(1),
                right: false,
                kind: OpKind::Unary,
            });
        }
        Step::Consumed
    }

    fn expr_conts(&self) -> u32 {
        match self.stack.last() {
            Some(Frame::Expr(state)) => state.conts,
            _ => 0,
        }
    }

    fn step_paren(&mut self, kind: TokenKind, span: Span) -> Step {
        let (base, open, closer) = {
            let Some(Frame::Paren { base, open, closer }) = self.stack.last() else {
                unreachable!()
            };
            (*base, *open, *closer)
        };

        if kind == closer {
            self.builder.add_token(kind, span);
            self.stack.pop();
            let children = (self.entries() - base) as u32;
            self.builder
                .add_node(NodeKind::Paren, children, Some(open), Some(span));
            self.complete_child();
            return Step::Consumed;
        }

        match kind {
            TokenKind::Nl => Step::Consumed,
            TokenKind::Dedent | TokenKind::EndOfInput => {
                self.error(
                    open,
                    format!("unbalanced {}", quoted_kind(closer_opener(closer))),
                );
                self.stack.pop();
                let children = (self.entries() - base) as u32;
                self.builder
                    .add_node(NodeKind::Paren, children, Some(open), None);
                self.complete_child();
                Step::Redispatch
            }
            _ => {
                self.unexpected(kind, span, "a closing bracket");
                self.recover(span);
                Step::Consumed
            }
        }
    }

    fn step_interp(&mut self, kind: TokenKind, span: Span) -> Step {
        use TokenKind::*;

        let (base, string, open) = {
            let Some(Frame::Interp { base, string, open }) = self.stack.last() else {
                unreachable!()
            };
            (*base, *string, *open)
        };

        match kind {
            StrMid | RegMid => {
                self.builder.add_token(kind, span);
                self.builder.add_node(NodeKind::Literal, 0, Some(span), None);
                self.push_expr(LOW_PRECEDENCE, Flavor::Full);
                Step::Consumed
            }
            StrClose | RegClose => {
                self.builder.add_token(kind, span);
                self.builder.add_node(NodeKind::Literal, 0, Some(span), None);
                self.stack.pop();
                let children = (self.entries() - base) as u32;
                self.builder
                    .add_node(NodeKind::Interpolate, children, Some(open), Some(span));
                self.complete_child();
                Step::Consumed
            }
            _ => {
                let what = if string { "string" } else { "regular expression" };
                self.error(span, format!("unterminated interpolated {what}"));
                self.stack.pop();
                let children = (self.entries() - base) as u32;
                self.builder
                    .add_node(NodeKind::Interpolate, children, Some(open), None);
                self.complete_child();
                Step::Redispatch
            }
        }
    }

    // ------------------------------------------------------------------
    // declarations

    fn step_package(&mut self, kind: TokenKind, span: Span) -> Step {
        let (kw, named) = {
            let Some(Frame::Package { kw, named, .. }) = self.stack.last() else {
                unreachable!()
            };
            (*kw, *named)
        };

        match kind {
            TokenKind::Id if !named => {
                self.leaf(TokenKind::Id, NodeKind::Id, span);
                top!(self, Package { named });
                *named = true;
                Step::Consumed
            }
            TokenKind::Nl | TokenKind::Dedent | TokenKind::EndOfInput if named => {
                self.stack.pop();
                self.builder.add_node(NodeKind::Package, 1, Some(kw), None);
                redispatch_unless_nl(kind)
            }
            _ => {
                self.unexpected(kind, span, "a package name");
                self.recover(span);
                Step::Consumed
            }
        }
    }

    fn step_port(&mut self, kind: TokenKind, span: Span) -> Step {
        use TokenKind::*;

        let (base, kw, dir, named, allow_kind, allow_arity, ideq) = {
            let Some(Frame::Port {
                base, kw, dir, named, allow_kind, allow_arity, ideq, ..
            }) = self.stack.last()
            else {
                unreachable!()
            };
            (*base, *kw, *dir, *named, *allow_kind, *allow_arity, *ideq)
        };

        if !named {
            return match kind {
                Id => {
                    self.leaf(Id, NodeKind::Id, span);
                    top!(self, Port { named });
                    *named = true;
                    Step::Consumed
                }
                _ => {
                    self.unexpected(kind, span, "a package name");
                    self.recover(span);
                    Step::Consumed
                }
            };
        }

        if dir.is_none() {
            return match kind {
                Import | Export => {
                    self.builder.add_token(kind, span);
                    top!(self, Port { dir });
                    *dir = Some(if kind == Import { PortDir::Import } else { PortDir::Export });
                    Step::Consumed
                }
                _ => {
                    self.unexpected(kind, span, "keyword ‘import’ or ‘export’");
                    self.recover(span);
                    Step::Consumed
                }
            };
        }

        match kind {
            Def | Type | Topic if allow_kind => {
                self.leaf(kind, NodeKind::Kind, span);
                top!(self, Port { allow_kind });
                *allow_kind = false;
                Step::Consumed
            }
            Unary | Binary if allow_arity => {
                self.leaf(kind, NodeKind::Arity, span);
                top!(self, Port { allow_kind, allow_arity });
                *allow_kind = false;
                *allow_arity = false;
                Step::Consumed
            }
            Hole => {
                // wildcard: contributes no clause node
                self.close_ideq();
                self.builder.add_token(Hole, span);
                self.freeze_port_head();
                Step::Consumed
            }
            Id => {
                self.port_clause_name(NodeKind::Id, Id, span);
                Step::Consumed
            }
            Equals if ideq == IdEq::Open => {
                self.builder.add_token(Equals, span);
                top!(self, Port { ideq });
                *ideq = IdEq::WantSource;
                Step::Consumed
            }
            _ if kind.is_operator() => {
                self.port_clause_name(NodeKind::Op, kind, span);
                Step::Consumed
            }
            Nl | Dedent | EndOfInput => {
                self.close_ideq();
                self.stack.pop();
                let children = (self.entries() - base) as u32;
                let node = match dir {
                    Some(PortDir::Export) => NodeKind::Export,
                    _ => NodeKind::Import,
                };
                self.builder.add_node(node, children, Some(kw), None);
                redispatch_unless_nl(kind)
            }
            _ => {
                self.unexpected(kind, span, "an imported name");
                self.recover(span);
                Step::Consumed
            }
        }
    }

    /// Add a clause member (`name` or `name = source`) to the current
    /// port statement.
    fn port_clause_name(&mut self, node: NodeKind, token: TokenKind, span: Span) {
        let ideq = {
            let Some(Frame::Port { ideq, .. }) = self.stack.last() else {
                unreachable!()
            };
            *ideq
        };

        match ideq {
            IdEq::WantSource => {
                self.leaf(token, node, span);
                self.close_ideq();
            }
            IdEq::Open | IdEq::None => {
                // a fresh clause; close the previous single-name one first
                self.close_ideq();
                let start = self.entries();
                self.leaf(token, node, span);
                top!(self, Port { ideq, ideq_base });
                *ideq = IdEq::Open;
                *ideq_base = start;
            }
        }
        self.freeze_port_head();
    }

    fn close_ideq(&mut self) {
        let (ideq, ideq_base) = {
            let Some(Frame::Port { ideq, ideq_base, .. }) = self.stack.last() else {
                unreachable!()
            };
            (*ideq, *ideq_base)
        };

        if ideq == IdEq::None {
            return;
        }
        let children = (self.entries() - ideq_base) as u32;
        if children > 0 {
            self.builder.add_node(NodeKind::IdEq, children, None, None);
        }
        top!(self, Port { ideq });
        *ideq = IdEq::None;
    }

    fn freeze_port_head(&mut self) {
        top!(self, Port { allow_kind, allow_arity });
        *allow_kind = false;
        *allow_arity = false;
    }

    fn step_topic(&mut self, kind: TokenKind, span: Span) -> Step {
        let (base, kw, stage) = {
            let Some(Frame::Topic { base, kw, stage }) = self.stack.last() else {
                unreachable!()
            };
            (*base, *kw, *stage)
        };

        match (stage, kind) {
            (0, TokenKind::Id) => {
                self.leaf(TokenKind::Id, NodeKind::Id, span);
                top!(self, Topic { stage });
                *stage = 1;
                Step::Consumed
            }
            (1, TokenKind::Colon) => {
                self.builder.add_token(TokenKind::Colon, span);
                self.push_expr(LOW_PRECEDENCE, Flavor::Pattern);
                Step::Consumed
            }
            (1 | 2, TokenKind::Nl | TokenKind::Dedent | TokenKind::EndOfInput) => {
                if stage == 1 {
                    self.error(span, "this topic lacks a type signature".into());
                    self.builder
                        .add_node(NodeKind::Error, 0, Some(span.start()), None);
                }
                self.stack.pop();
                let children = (self.entries() - base) as u32;
                self.builder.add_node(NodeKind::Topic, children, Some(kw), None);
                redispatch_unless_nl(kind)
            }
            (0, _) => {
                self.unexpected(kind, span, "a topic name");
                self.recover(span);
                Step::Consumed
            }
            _ => {
                self.unexpected(kind, span, "‘:’ and a type");
                self.recover(span);
                Step::Consumed
            }
        }
    }

    fn step_data(&mut self, kind: TokenKind, span: Span) -> Step {
        use TokenKind::*;

        let (base, kw, stage, block) = {
            let Some(Frame::DataDecl { base, kw, stage, block }) = self.stack.last() else {
                unreachable!()
            };
            (*base, *kw, *stage, *block)
        };

        match (stage, kind) {
            (0, Equals) => {
                self.builder.add_token(Equals, span);
                top!(self, DataDecl { stage });
                *stage = 2;
                Step::Consumed
            }
            (2, Indent) if !block => {
                top!(self, DataDecl { block });
                *block = true;
                Step::Consumed
            }
            (2, Nl) if block => Step::Consumed,
            (2, Nl) => {
                self.close_statement(NodeKind::Data, base, kw);
                Step::Consumed
            }
            (2, OpOr) if !block => {
                self.builder.add_token(OpOr, span);
                self.push_expr(OR_STOP, Flavor::Pattern);
                Step::Consumed
            }
            (2, Dedent) if block => {
                self.close_statement(NodeKind::Data, base, kw);
                Step::Consumed
            }
            (2, Dedent | EndOfInput) => {
                self.close_statement(NodeKind::Data, base, kw);
                Step::Redispatch
            }
            (2, _) if kind.starts_term() || kind.is_operator() => {
                let min = if block { LOW_PRECEDENCE } else { OR_STOP };
                self.push_expr(min, Flavor::Pattern);
                Step::Redispatch
            }
            _ => {
                self.unexpected(kind, span, "‘=’ and constructors");
                self.recover(span);
                Step::Consumed
            }
        }
    }

    fn close_statement(&mut self, node: NodeKind, base: usize, kw: Span) {
        self.stack.pop();
        let children = (self.entries() - base) as u32;
        self.builder.add_node(node, children, Some(kw), None);
    }

    fn step_tuple(&mut self, kind: TokenKind, span: Span) -> Step {
        use TokenKind::*;

        let (base, kw, stage, block, in_elt, has_colon) = {
            let Some(Frame::TupleDecl { base, kw, stage, block, elt }) = self.stack.last() else {
                unreachable!()
            };
            (
                *base,
                *kw,
                *stage,
                *block,
                elt.is_some(),
                elt.as_ref().map_or(false, |elt| elt.colon),
            )
        };

        match (stage, kind) {
            (0, Equals) => {
                self.builder.add_token(Equals, span);
                top!(self, TupleDecl { stage });
                *stage = 2;
                Step::Consumed
            }
            (2, Indent) if !block && !in_elt => {
                top!(self, TupleDecl { block });
                *block = true;
                Step::Consumed
            }
            (2, Nl) if block => {
                self.close_tuple_elt();
                Step::Consumed
            }
            (2, Nl) => {
                self.close_tuple_elt();
                self.close_statement(NodeKind::Tuple, base, kw);
                Step::Consumed
            }
            (2, OpOr) if in_elt && !block => {
                self.close_tuple_elt();
                self.builder.add_token(OpOr, span);
                Step::Consumed
            }
            (2, Colon) if in_elt && !has_colon => {
                self.builder.add_token(Colon, span);
                self.builder.add_node(NodeKind::Op, 0, Some(span), None);
                top!(self, TupleDecl { elt });
                elt.as_mut().unwrap().colon = true;
                let min = if block { LOW_PRECEDENCE } else { OR_STOP };
                self.push_expr(min, Flavor::Pattern);
                Step::Consumed
            }
            (2, Global | Export) => {
                if !in_elt {
                    self.open_tuple_elt();
                }
                let node = if kind == Global {
                    NodeKind::FlagGlobal
                } else {
                    NodeKind::FlagExport
                };
                self.leaf(kind, node, span);
                Step::Consumed
            }
            (2, Dedent) if block => {
                self.close_tuple_elt();
                self.close_statement(NodeKind::Tuple, base, kw);
                Step::Consumed
            }
            (2, Dedent | EndOfInput) => {
                self.close_tuple_elt();
                self.close_statement(NodeKind::Tuple, base, kw);
                Step::Redispatch
            }
            (2, _) if kind.starts_term() || kind.is_operator() => {
                if !in_elt {
                    self.open_tuple_elt();
                }
                self.push_expr(OR_STOP, Flavor::Pattern);
                Step::Redispatch
            }
            _ => {
                self.unexpected(kind, span, "‘=’ and tuple fields");
                self.recover(span);
                Step::Consumed
            }
        }
    }

    fn open_tuple_elt(&mut self) {
        let base = self.builder.entries();
        top!(self, TupleDecl { elt });
        *elt = Some(EltState { base, colon: false });
    }

    fn close_tuple_elt(&mut self) {
        let Some(Frame::TupleDecl { elt, .. }) = self.stack.last_mut() else {
            return;
        };
        let Some(state) = elt.take() else { return };

        if state.colon {
            // [flags…] [tag] [op ‘:’] [type] — fold the tail into a
            // BINARY node mirroring an ascription, as the type sublanguage
            // expects tags
            self.builder.add_node(NodeKind::Binary, 3, None, None);
        }
        let children = (self.builder.entries() - state.base) as u32;
        if children > 0 {
            self.builder.add_node(NodeKind::TupleElt, children, None, None);
        }
    }

    fn step_def(&mut self, kind: TokenKind, span: Span) -> Step {
        use TokenKind::*;

        let (base, kw, def, stage) = {
            let Some(Frame::DefDecl { base, kw, kind, stage, .. }) = self.stack.last() else {
                unreachable!()
            };
            (*base, *kw, *kind, *stage)
        };

        match (stage, kind) {
            (1, Backslash) if def == DefKind::Target => {
                self.builder.add_token(Backslash, span);
                top!(self, DefDecl { stage, backslash });
                *stage = 2;
                *backslash = Some(span);
                self.push_expr(LOW_PRECEDENCE, Flavor::Pattern);
                Step::Consumed
            }
            (1, Equals) => {
                self.builder.add_token(Equals, span);
                top!(self, DefDecl { stage });
                *stage = 3;
                Step::Consumed
            }
            (3, Indent) => {
                self.push_block(span);
                Step::Consumed
            }
            (3, Nl | Dedent | EndOfInput) | (4, Nl | Dedent | EndOfInput) => {
                if stage == 3 {
                    self.error(span, "this definition lacks a body".into());
                    self.builder
                        .add_node(NodeKind::Error, 0, Some(span.start()), None);
                }
                self.close_statement(def.node(), base, kw);
                redispatch_unless_nl(kind)
            }
            (3, _) => {
                self.push_expr(LOW_PRECEDENCE, Flavor::Full);
                Step::Redispatch
            }
            _ => {
                self.unexpected(kind, span, "‘=’ and a definition body");
                self.recover(span);
                Step::Consumed
            }
        }
    }

    // ------------------------------------------------------------------
    // blocks, matches, conditionals

    fn push_block(&mut self, indent: Span) {
        self.stack.push(Frame::Block {
            base: self.builder.entries(),
            indent,
            expr_seen: false,
        });
    }

    fn step_block(&mut self, kind: TokenKind, span: Span) -> Step {
        use TokenKind::*;

        let (base, indent, expr_seen) = {
            let Some(Frame::Block { base, indent, expr_seen }) = self.stack.last() else {
                unreachable!()
            };
            (*base, *indent, *expr_seen)
        };

        match kind {
            Nl => Step::Consumed,
            From => {
                self.push_port(span);
                Step::Consumed
            }
            Def | Target => {
                let base = self.builder.entries();
                self.push_def(kind, span, base);
                Step::Consumed
            }
            Require => {
                self.stack.push(Frame::RequireStmt {
                    base: self.builder.entries(),
                    kw: span,
                    stage: 0,
                });
                self.push_expr(LOW_PRECEDENCE, Flavor::Pattern);
                Step::Consumed
            }
            Dedent | EndOfInput => {
                self.stack.pop();
                let mut children = (self.entries() - base) as u32;
                if children == 0 {
                    self.error(indent, "this block is empty".into());
                    self.builder.add_node(NodeKind::Error, 0, Some(indent), None);
                    children = 1;
                }
                self.builder
                    .add_node(NodeKind::Block, children, Some(indent), None);
                self.complete_child();
                redispatch_unless_nl(if kind == Dedent { TokenKind::Nl } else { kind })
            }
            _ if !expr_seen && (kind.starts_term() || kind.is_operator()) => {
                self.push_expr(LOW_PRECEDENCE, Flavor::Full);
                Step::Redispatch
            }
            _ => {
                self.unexpected(kind, span, "a definition or the block result");
                self.recover(span);
                Step::Consumed
            }
        }
    }

    fn step_match(&mut self, kind: TokenKind, span: Span) -> Step {
        use TokenKind::*;

        let (base, kw, in_cases) = {
            let Some(Frame::MatchHead { base, kw, in_cases }) = self.stack.last() else {
                unreachable!()
            };
            (*base, *kw, *in_cases)
        };

        if !in_cases {
            return match kind {
                Indent => {
                    top!(self, MatchHead { in_cases });
                    *in_cases = true;
                    Step::Consumed
                }
                _ if kind.starts_term() => {
                    self.push_expr(APP_PRECEDENCE + 1, Flavor::Full);
                    Step::Redispatch
                }
                _ => {
                    self.unexpected(kind, span, "a scrutinee or an indented list of cases");
                    self.recover(span);
                    Step::Consumed
                }
            };
        }

        match kind {
            Nl => Step::Consumed,
            Dedent | EndOfInput => {
                self.stack.pop();
                let children = (self.entries() - base) as u32;
                self.builder.add_node(NodeKind::Match, children, Some(kw), None);
                self.complete_child();
                redispatch_unless_nl(if kind == Dedent { TokenKind::Nl } else { kind })
            }
            _ if kind.starts_term() || kind.is_operator() => {
                self.stack.push(Frame::Case { base: self.builder.entries(), stage: 0 });
                self.push_expr(LOW_PRECEDENCE, Flavor::Pattern);
                Step::Redispatch
            }
            _ => {
                self.unexpected(kind, span, "a match case");
                self.recover(span);
                Step::Consumed
            }
        }
    }

    fn step_case(&mut self, kind: TokenKind, span: Span) -> Step {
        use TokenKind::*;

        let (base, stage) = {
            let Some(Frame::Case { base, stage }) = self.stack.last() else {
                unreachable!()
            };
            (*base, *stage)
        };

        match (stage, kind) {
            (1, If) => {
                self.builder.add_token(If, span);
                top!(self, Case { stage });
                *stage = 2;
                self.push_expr(LOW_PRECEDENCE, Flavor::Full);
                Step::Consumed
            }
            (1 | 3, Equals) => {
                self.builder.add_token(Equals, span);
                top!(self, Case { stage });
                *stage = 4;
                Step::Consumed
            }
            (4, Indent) => {
                self.push_block(span);
                Step::Consumed
            }
            (4, _) => {
                self.push_expr(LOW_PRECEDENCE, Flavor::Full);
                Step::Redispatch
            }
            (5, Nl) => {
                self.close_case(base);
                Step::Consumed
            }
            (5, Dedent | EndOfInput) => {
                self.close_case(base);
                Step::Redispatch
            }
            _ => {
                self.unexpected(kind, span, "‘=’ and a case body");
                self.recover(span);
                Step::Consumed
            }
        }
    }

    fn close_case(&mut self, base: usize) {
        self.stack.pop();
        let children = (self.builder.entries() - base) as u32;
        self.builder.add_node(NodeKind::Case, children, None, None);
    }

    fn step_if(&mut self, kind: TokenKind, span: Span) -> Step {
        use TokenKind::*;

        let (kw, stage) = {
            let Some(Frame::IfHead { kw, stage, .. }) = self.stack.last() else {
                unreachable!()
            };
            (*kw, *stage)
        };

        match (stage, kind) {
            (1, Then) => {
                self.builder.add_token(Then, span);
                top!(self, IfHead { stage });
                *stage = 2;
                Step::Consumed
            }
            (2, Indent) | (4, Indent) => {
                self.push_block(span);
                Step::Consumed
            }
            (2, _) | (4, _) => {
                self.push_expr(LOW_PRECEDENCE, Flavor::Full);
                Step::Redispatch
            }
            (3, Else) => {
                self.builder.add_token(Else, span);
                top!(self, IfHead { stage });
                *stage = 4;
                Step::Consumed
            }
            (5, _) => {
                self.stack.pop();
                self.builder.add_node(NodeKind::If, 3, Some(kw), None);
                self.complete_child();
                Step::Redispatch
            }
            (1, _) => {
                self.unexpected(kind, span, "keyword ‘then’");
                self.recover(span);
                Step::Consumed
            }
            _ => {
                self.unexpected(kind, span, "keyword ‘else’");
                self.recover(span);
                Step::Consumed
            }
        }
    }

    fn step_lambda(&mut self, kind: TokenKind, span: Span) -> Step {
        // both stages park an expression on top; anything arriving here
        // terminates an incomplete lambda
        self.unexpected(kind, span, "a lambda binder and body");
        self.recover(span);
        Step::Consumed
    }

    fn step_require(&mut self, kind: TokenKind, span: Span) -> Step {
        use TokenKind::*;

        let (base, kw, stage) = {
            let Some(Frame::RequireStmt { base, kw, stage }) = self.stack.last() else {
                unreachable!()
            };
            (*base, *kw, *stage)
        };

        match (stage, kind) {
            (1, Equals) => {
                self.builder.add_token(Equals, span);
                top!(self, RequireStmt { stage });
                *stage = 2;
                Step::Consumed
            }
            (2, Indent) | (4, Indent) => {
                self.push_block(span);
                Step::Consumed
            }
            (2, _) | (4, _) => {
                self.push_expr(LOW_PRECEDENCE, Flavor::Full);
                Step::Redispatch
            }
            (3, Nl) => Step::Consumed,
            (3, Else) => {
                self.builder.add_token(Else, span);
                top!(self, RequireStmt { stage });
                *stage = 4;
                Step::Consumed
            }
            (3, _) | (5, _) => {
                // the statement ends; everything after it continues the
                // enclosing block
                self.stack.pop();
                let children = (self.entries() - base) as u32;
                self.builder.add_node(NodeKind::Require, children, Some(kw), None);
                redispatch_unless_nl(kind)
            }
            _ => {
                self.unexpected(kind, span, "‘=’ and a required value");
                self.recover(span);
                Step::Consumed
            }
        }
    }

    fn step_prim(&mut self, kind: TokenKind, span: Span) -> Step {
        let kw = {
            let Some(Frame::PrimHead { kw, .. }) = self.stack.last() else {
                unreachable!()
            };
            *kw
        };

        match kind {
            TokenKind::StrSingle | TokenKind::StrRaw => {
                self.leaf(kind, NodeKind::Literal, span);
                self.stack.pop();
                self.builder.add_node(NodeKind::Prim, 1, Some(kw), None);
                self.complete_child();
                Step::Consumed
            }
            _ => {
                self.error(span, format!("{} expects a plain string literal", quoted!("prim")));
                self.stack.pop();
                self.builder.add_node(NodeKind::Prim, 0, Some(kw), None);
                self.complete_child();
                Step::Redispatch
            }
        }
    }

    fn step_subscribe(&mut self, kind: TokenKind, span: Span) -> Step {
        let kw = {
            let Some(Frame::SubscribeHead { kw, .. }) = self.stack.last() else {
                unreachable!()
            };
            *kw
        };

        match kind {
            TokenKind::Id => {
                self.leaf(TokenKind::Id, NodeKind::Id, span);
                self.stack.pop();
                self.builder.add_node(NodeKind::Subscribe, 1, Some(kw), None);
                self.complete_child();
                Step::Consumed
            }
            _ => {
                self.error(span, format!("{} expects a topic name", quoted!("subscribe")));
                self.stack.pop();
                self.builder.add_node(NodeKind::Subscribe, 0, Some(kw), None);
                self.complete_child();
                Step::Redispatch
            }
        }
    }

    fn step_recover(&mut self, kind: TokenKind, span: Span) -> Step {
        match kind {
            TokenKind::Nl => {
                self.close_recover();
                Step::Consumed
            }
            TokenKind::Dedent | TokenKind::EndOfInput => {
                self.close_recover();
                Step::Redispatch
            }
            _ => {
                top!(self, Recover { end });
                *end = end.merge(&span);
                Step::Consumed
            }
        }
    }
}

/// Inline constructor and tuple element expressions stop below the `|`
/// separator.
const OR_STOP: u8 = 6;

fn redispatch_unless_nl(kind: TokenKind) -> Step {
    if kind == TokenKind::Nl {
        Step::Consumed
    } else {
        Step::Redispatch
    }
}

fn closer_opener(closer: TokenKind) -> TokenKind {
    match closer {
        TokenKind::ParenClose => TokenKind::ParenOpen,
        TokenKind::BracketClose => TokenKind::BracketOpen,
        _ => TokenKind::BraceOpen,
    }
}

fn quoted_kind(kind: TokenKind) -> String {
    format!("‘{}’", kind.example())
}
