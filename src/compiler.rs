//! Single-pass compiler: a Pratt (precedence-climbing) parser that emits
//! bytecode directly as it recognizes each construct. No intermediate
//! tree is built — the parser *is* the compiler.

use std::rc::Rc;

use crate::chunk::{Chunk, Op};
use crate::error::CompileError;
use crate::reporter::{Phase, Report, Reporter};
use crate::scanner::Scanner;
use crate::token::{Token, TokenType};
use crate::value::{Function, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Precedence {
    None,
    Assignment,
    Or,
    And,
    Equality,
    Comparison,
    Term,
    Factor,
    Unary,
    Call,
    Primary,
}

impl Precedence {
    fn next(self) -> Self {
        match self {
            Self::None => Self::Assignment,
            Self::Assignment => Self::Or,
            Self::Or => Self::And,
            Self::And => Self::Equality,
            Self::Equality => Self::Comparison,
            Self::Comparison => Self::Term,
            Self::Term => Self::Factor,
            Self::Factor => Self::Unary,
            Self::Unary => Self::Call,
            Self::Call | Self::Primary => Self::Primary,
        }
    }
}

type ParseFn<'a> = fn(&mut Compiler<'a>, bool);

fn rule<'a>(typ: TokenType) -> (Option<ParseFn<'a>>, Option<ParseFn<'a>>, Precedence) {
    use TokenType::*;
    match typ {
        LeftParen => (Some(Compiler::grouping), Some(Compiler::call), Precedence::Call),
        Minus => (Some(Compiler::unary), Some(Compiler::binary), Precedence::Term),
        Plus => (None, Some(Compiler::binary), Precedence::Term),
        Slash | Star => (None, Some(Compiler::binary), Precedence::Factor),
        Bang => (Some(Compiler::unary), None, Precedence::None),
        BangEqual | EqualEqual => (None, Some(Compiler::binary), Precedence::Equality),
        Greater | GreaterEqual | Less | LessEqual => {
            (None, Some(Compiler::binary), Precedence::Comparison)
        }
        String => (Some(Compiler::string), None, Precedence::None),
        Number => (Some(Compiler::number), None, Precedence::None),
        And => (None, Some(Compiler::and_), Precedence::And),
        Or => (None, Some(Compiler::or_), Precedence::Or),
        False | Nil | True => (Some(Compiler::literal), None, Precedence::None),
        Identifier => (Some(Compiler::variable), None, Precedence::None),
        _ => (None, None, Precedence::None),
    }
}

struct Local {
    name: String,
    depth: i32,
    captured: bool,
}

struct UpvalueRef {
    index: u32,
    is_local: bool,
}

#[derive(PartialEq, Eq, Clone, Copy)]
enum FunctionKind {
    Script,
    Function,
}

struct FunctionScope {
    name: Option<String>,
    kind: FunctionKind,
    arity: u8,
    chunk: Chunk,
    locals: Vec<Local>,
    upvalues: Vec<UpvalueRef>,
    scope_depth: i32,
}

impl FunctionScope {
    fn new(name: Option<String>, kind: FunctionKind) -> Self {
        let mut chunk = Chunk::new();
        chunk.name = name.clone().unwrap_or_else(|| "script".to_string());
        Self {
            name,
            kind,
            arity: 0,
            chunk,
            locals: Vec::new(),
            upvalues: Vec::new(),
            scope_depth: 0,
        }
    }
}

pub struct Compiler<'a> {
    scanner: Scanner<'a>,
    reporter: &'a mut dyn Reporter,
    previous: Token,
    current: Token,
    had_error: bool,
    panic_mode: bool,
    functions: Vec<FunctionScope>,
}

impl<'a> Compiler<'a> {
    fn new(source: &'a str, reporter: &'a mut dyn Reporter) -> Self {
        let dummy = Token::new(TokenType::Error, String::new(), 0, 0);
        let mut compiler = Self {
            scanner: Scanner::new(source),
            reporter,
            previous: dummy.clone(),
            current: dummy,
            had_error: false,
            panic_mode: false,
            functions: vec![FunctionScope::new(None, FunctionKind::Script)],
        };
        compiler.advance();
        compiler
    }

    // --- token stream plumbing ---

    fn advance(&mut self) {
        std::mem::swap(&mut self.previous, &mut self.current);
        loop {
            self.current = self.scanner.next_token();
            if self.current.typ != TokenType::Error {
                break;
            }
            let msg = self.current.lexeme.clone();
            self.error_at_current(&msg);
        }
    }

    fn check(&self, typ: TokenType) -> bool {
        self.current.typ == typ
    }

    fn match_token(&mut self, typ: TokenType) -> bool {
        if !self.check(typ) {
            return false;
        }
        self.advance();
        true
    }

    fn consume(&mut self, typ: TokenType, msg: &str) {
        if self.current.typ == typ {
            self.advance();
            return;
        }
        self.error_at_current(msg);
    }

    fn error_at_current(&mut self, msg: &str) {
        let token = self.current.clone();
        self.error_at(token, msg);
    }

    fn error_at_previous(&mut self, msg: &str) {
        let token = self.previous.clone();
        self.error_at(token, msg);
    }

    fn error_at(&mut self, token: Token, msg: &str) {
        if self.panic_mode {
            return;
        }
        self.panic_mode = true;
        self.had_error = true;
        self.reporter
            .error(Report::new(Phase::Compiling, msg.to_string(), Some(token)));
    }

    fn synchronize(&mut self) {
        self.panic_mode = false;
        while self.current.typ != TokenType::EndOfFile {
            if self.previous.typ == TokenType::Semicolon {
                return;
            }
            match self.current.typ {
                TokenType::Class
                | TokenType::Fun
                | TokenType::Var
                | TokenType::For
                | TokenType::If
                | TokenType::While
                | TokenType::Print
                | TokenType::Return => return,
                _ => {}
            }
            self.advance();
        }
    }

    // --- emission helpers ---

    fn current_chunk(&mut self) -> &mut Chunk {
        &mut self.functions.last_mut().unwrap().chunk
    }

    fn emit(&mut self, op: Op, operands: Vec<u32>) -> usize {
        let line = self.previous.line;
        self.current_chunk().write(op, operands, line)
    }

    fn emit_jump(&mut self, op: Op) -> usize {
        let line = self.previous.line;
        self.current_chunk().emit_jump(op, line)
    }

    fn patch_jump(&mut self, index: usize) {
        self.current_chunk().patch_jump(index);
    }

    fn emit_loop(&mut self, loop_start: usize) {
        let line = self.previous.line;
        self.current_chunk().emit_loop(loop_start, line);
    }

    fn emit_constant(&mut self, value: Value) {
        let idx = self.current_chunk().add_constant(value) as u32;
        self.emit(Op::LoadConst, vec![idx]);
    }

    fn emit_return(&mut self) {
        self.emit(Op::Nil, vec![]);
        self.emit(Op::Return, vec![]);
    }

    fn identifier_constant(&mut self, name: &str) -> u32 {
        self.current_chunk().add_constant(Value::String(Rc::from(name))) as u32
    }

    // --- scopes, locals, upvalues ---

    fn begin_scope(&mut self) {
        self.functions.last_mut().unwrap().scope_depth += 1;
    }

    fn end_scope(&mut self) {
        // Collect which locals leave scope (and whether each was captured)
        // before emitting anything, so the teardown loop below doesn't need
        // to hold a borrow of `self.functions` across `self.emit(...)` calls.
        let removed_captured: Vec<bool> = {
            let scope = self.functions.last_mut().unwrap();
            scope.scope_depth -= 1;
            let floor = scope.scope_depth;
            let mut removed = Vec::new();
            while let Some(local) = scope.locals.last() {
                if local.depth <= floor {
                    break;
                }
                removed.push(scope.locals.pop().unwrap().captured);
            }
            removed
        };

        let mut pending_pops: u32 = 0;
        for captured in removed_captured {
            if captured {
                if pending_pops > 0 {
                    let n = pending_pops;
                    pending_pops = 0;
                    self.flush_pops(n);
                }
                self.emit(Op::CloseValue, vec![]);
            } else {
                pending_pops += 1;
            }
        }
        self.flush_pops(pending_pops);
    }

    fn flush_pops(&mut self, n: u32) {
        if n == 1 {
            self.emit(Op::Pop, vec![]);
        } else if n > 1 {
            self.emit(Op::PopN, vec![n]);
        }
    }

    fn declare_variable(&mut self) {
        let scope_depth = self.functions.last().unwrap().scope_depth;
        if scope_depth == 0 {
            return;
        }
        let name = self.previous.lexeme.clone();
        let duplicate = {
            let scope = self.functions.last().unwrap();
            let mut dup = false;
            for local in scope.locals.iter().rev() {
                if local.depth != -1 && local.depth < scope_depth {
                    break;
                }
                if local.name == name {
                    dup = true;
                    break;
                }
            }
            dup
        };
        if duplicate {
            self.error_at_previous("already a variable with this name in this scope");
            return;
        }
        self.add_local(name);
    }

    fn add_local(&mut self, name: String) {
        let scope = self.functions.last_mut().unwrap();
        if scope.locals.len() >= 256 {
            self.error_at_previous("too many local variables in function");
            return;
        }
        scope.locals.push(Local {
            name,
            depth: -1,
            captured: false,
        });
    }

    fn parse_variable(&mut self, msg: &str) -> u32 {
        self.consume(TokenType::Identifier, msg);
        self.declare_variable();
        if self.functions.last().unwrap().scope_depth > 0 {
            return 0;
        }
        let name = self.previous.lexeme.clone();
        self.identifier_constant(&name)
    }

    fn mark_initialized(&mut self) {
        let scope = self.functions.last_mut().unwrap();
        if scope.scope_depth == 0 {
            return;
        }
        let depth = scope.scope_depth;
        if let Some(local) = scope.locals.last_mut() {
            local.depth = depth;
        }
    }

    fn define_variable(&mut self, global: u32) {
        if self.functions.last().unwrap().scope_depth > 0 {
            self.mark_initialized();
            return;
        }
        self.emit(Op::DefineGlobal, vec![global]);
    }

    fn resolve_local(&mut self, scope_idx: usize, name: &str) -> Option<u32> {
        let found = {
            let scope = &self.functions[scope_idx];
            scope
                .locals
                .iter()
                .enumerate()
                .rev()
                .find(|(_, local)| local.name == name)
                .map(|(i, local)| (i as u32, local.depth == -1))
        };
        let (idx, uninitialized) = found?;
        if uninitialized {
            self.error_at_previous("can't read local variable in its own initializer");
        }
        Some(idx)
    }

    fn resolve_upvalue(&mut self, scope_idx: usize, name: &str) -> Option<u32> {
        if scope_idx == 0 {
            return None;
        }
        let enclosing = scope_idx - 1;
        if let Some(local_idx) = self.resolve_local(enclosing, name) {
            self.functions[enclosing].locals[local_idx as usize].captured = true;
            return Some(self.add_upvalue(scope_idx, local_idx, true));
        }
        if let Some(up_idx) = self.resolve_upvalue(enclosing, name) {
            return Some(self.add_upvalue(scope_idx, up_idx, false));
        }
        None
    }

    fn add_upvalue(&mut self, scope_idx: usize, index: u32, is_local: bool) -> u32 {
        let scope = &mut self.functions[scope_idx];
        for (i, uv) in scope.upvalues.iter().enumerate() {
            if uv.index == index && uv.is_local == is_local {
                return i as u32;
            }
        }
        scope.upvalues.push(UpvalueRef { index, is_local });
        (scope.upvalues.len() - 1) as u32
    }

    fn named_variable(&mut self, name: Token, can_assign: bool) {
        let scope_idx = self.functions.len() - 1;
        let (get_op, set_op, arg) = if let Some(idx) = self.resolve_local(scope_idx, &name.lexeme)
        {
            (Op::GetLocal, Op::SetLocal, idx)
        } else if let Some(idx) = self.resolve_upvalue(scope_idx, &name.lexeme) {
            (Op::GetUpvalue, Op::SetUpvalue, idx)
        } else {
            let idx = self.identifier_constant(&name.lexeme);
            (Op::GetGlobal, Op::SetGlobal, idx)
        };

        if can_assign && self.match_token(TokenType::Equal) {
            self.expression();
            self.emit(set_op, vec![arg]);
        } else {
            self.emit(get_op, vec![arg]);
        }
    }

    // --- Pratt parsing ---

    fn parse_precedence(&mut self, precedence: Precedence) {
        self.advance();
        let prefix_rule = rule(self.previous.typ).0;
        let prefix_rule = match prefix_rule {
            Some(r) => r,
            None => {
                self.error_at_previous("expect expression");
                return;
            }
        };
        let can_assign = precedence <= Precedence::Assignment;
        prefix_rule(self, can_assign);

        while precedence <= rule(self.current.typ).2 {
            self.advance();
            let infix_rule = rule(self.previous.typ).1.unwrap();
            infix_rule(self, can_assign);
        }

        if can_assign && self.match_token(TokenType::Equal) {
            self.error_at_previous("invalid assignment target");
        }
    }

    fn expression(&mut self) {
        self.parse_precedence(Precedence::Assignment);
    }

    fn grouping(&mut self, _can_assign: bool) {
        self.expression();
        self.consume(TokenType::RightParen, "expect ')' after expression");
    }

    fn number(&mut self, _can_assign: bool) {
        let n: f32 = self.previous.lexeme.parse().unwrap_or(f32::NAN);
        self.emit_constant(Value::Number(n));
    }

    fn string(&mut self, _can_assign: bool) {
        let lexeme = &self.previous.lexeme;
        let content = &lexeme[1..lexeme.len() - 1];
        self.emit_constant(Value::String(Rc::from(content)));
    }

    fn literal(&mut self, _can_assign: bool) {
        match self.previous.typ {
            TokenType::False => self.emit(Op::False, vec![]),
            TokenType::Nil => self.emit(Op::Nil, vec![]),
            TokenType::True => self.emit(Op::True, vec![]),
            _ => unreachable!(),
        };
    }

    fn variable(&mut self, can_assign: bool) {
        let name = self.previous.clone();
        self.named_variable(name, can_assign);
    }

    fn unary(&mut self, _can_assign: bool) {
        let op_type = self.previous.typ;
        self.parse_precedence(Precedence::Unary);
        match op_type {
            TokenType::Minus => self.emit(Op::Negate, vec![]),
            TokenType::Bang => self.emit(Op::Not, vec![]),
            _ => unreachable!(),
        };
    }

    fn binary(&mut self, _can_assign: bool) {
        let op_type = self.previous.typ;
        let precedence = rule(op_type).2;
        self.parse_precedence(precedence.next());
        match op_type {
            TokenType::Plus => self.emit(Op::Add, vec![]),
            TokenType::Minus => self.emit(Op::Sub, vec![]),
            TokenType::Star => self.emit(Op::Mul, vec![]),
            TokenType::Slash => self.emit(Op::Div, vec![]),
            TokenType::EqualEqual => self.emit(Op::Equal, vec![]),
            TokenType::BangEqual => {
                self.emit(Op::Equal, vec![]);
                self.emit(Op::Not, vec![])
            }
            TokenType::Greater => self.emit(Op::Greater, vec![]),
            TokenType::GreaterEqual => {
                self.emit(Op::Less, vec![]);
                self.emit(Op::Not, vec![])
            }
            TokenType::Less => self.emit(Op::Less, vec![]),
            TokenType::LessEqual => {
                self.emit(Op::Greater, vec![]);
                self.emit(Op::Not, vec![])
            }
            _ => unreachable!(),
        };
    }

    fn and_(&mut self, _can_assign: bool) {
        let end_jump = self.emit_jump(Op::BranchFalse);
        self.emit(Op::Pop, vec![]);
        self.parse_precedence(Precedence::And);
        self.patch_jump(end_jump);
    }

    fn or_(&mut self, _can_assign: bool) {
        let else_jump = self.emit_jump(Op::BranchFalse);
        let end_jump = self.emit_jump(Op::Branch);
        self.patch_jump(else_jump);
        self.emit(Op::Pop, vec![]);
        self.parse_precedence(Precedence::Or);
        self.patch_jump(end_jump);
    }

    fn argument_list(&mut self) -> u32 {
        let mut count = 0u32;
        if !self.check(TokenType::RightParen) {
            loop {
                self.expression();
                if count == 255 {
                    self.error_at_previous("can't have more than 255 arguments");
                }
                count += 1;
                if !self.match_token(TokenType::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenType::RightParen, "expect ')' after arguments");
        count
    }

    fn call(&mut self, _can_assign: bool) {
        let argc = self.argument_list();
        self.emit(Op::Call, vec![argc]);
    }

    // --- statements & declarations ---

    fn block(&mut self) {
        while !self.check(TokenType::RightBrace) && !self.check(TokenType::EndOfFile) {
            self.declaration();
        }
        self.consume(TokenType::RightBrace, "expect '}' after block");
    }

    fn end_function(&mut self) -> (Rc<Function>, Vec<UpvalueRef>) {
        self.emit_return();
        let scope = self.functions.pop().unwrap();
        let function = Function {
            name: scope.name,
            arity: scope.arity,
            chunk: scope.chunk,
            upvalue_count: scope.upvalues.len(),
        };
        (Rc::new(function), scope.upvalues)
    }

    fn function(&mut self, kind: FunctionKind) {
        let name = self.previous.lexeme.clone();
        self.functions.push(FunctionScope::new(Some(name), kind));
        self.begin_scope();

        self.consume(TokenType::LeftParen, "expect '(' after function name");
        if !self.check(TokenType::RightParen) {
            loop {
                let arity = {
                    let scope = self.functions.last_mut().unwrap();
                    scope.arity += 1;
                    scope.arity
                };
                if arity > 255 {
                    self.error_at_current("can't have more than 255 parameters");
                }
                let param = self.parse_variable("expect parameter name");
                self.define_variable(param);
                if !self.match_token(TokenType::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenType::RightParen, "expect ')' after parameters");
        self.consume(TokenType::LeftBrace, "expect '{' before function body");
        self.block();

        let (function, upvalues) = self.end_function();
        let const_idx = self.current_chunk().add_constant(Value::Function(function)) as u32;
        self.emit(Op::LoadConst, vec![const_idx]);
        let mut operands = vec![upvalues.len() as u32];
        for uv in &upvalues {
            operands.push(uv.is_local as u32);
            operands.push(uv.index);
        }
        self.emit(Op::MakeClosure, operands);
    }

    fn fun_declaration(&mut self) {
        let global = self.parse_variable("expect function name");
        self.mark_initialized();
        self.function(FunctionKind::Function);
        self.define_variable(global);
    }

    fn var_declaration(&mut self) {
        let global = self.parse_variable("expect variable name");
        if self.match_token(TokenType::Equal) {
            self.expression();
        } else {
            self.emit(Op::Nil, vec![]);
        }
        self.consume(TokenType::Semicolon, "expect ';' after variable declaration");
        self.define_variable(global);
    }

    fn print_statement(&mut self) {
        self.expression();
        self.consume(TokenType::Semicolon, "expect ';' after value");
        self.emit(Op::Print, vec![]);
    }

    fn expression_statement(&mut self) {
        self.expression();
        self.consume(TokenType::Semicolon, "expect ';' after expression");
        self.emit(Op::Pop, vec![]);
    }

    fn return_statement(&mut self) {
        if self.functions.last().unwrap().kind == FunctionKind::Script {
            self.error_at_previous("can't return from top-level code");
        }
        if self.match_token(TokenType::Semicolon) {
            self.emit_return();
        } else {
            self.expression();
            self.consume(TokenType::Semicolon, "expect ';' after return value");
            self.emit(Op::Return, vec![]);
        }
    }

    fn if_statement(&mut self) {
        self.consume(TokenType::LeftParen, "expect '(' after 'if'");
        self.expression();
        self.consume(TokenType::RightParen, "expect ')' after condition");

        let then_jump = self.emit_jump(Op::BranchFalse);
        self.emit(Op::Pop, vec![]);
        self.statement();

        let else_jump = self.emit_jump(Op::Branch);
        self.patch_jump(then_jump);
        self.emit(Op::Pop, vec![]);

        if self.match_token(TokenType::Else) {
            self.statement();
        }
        self.patch_jump(else_jump);
    }

    fn while_statement(&mut self) {
        let loop_start = self.current_chunk().len();
        self.consume(TokenType::LeftParen, "expect '(' after 'while'");
        self.expression();
        self.consume(TokenType::RightParen, "expect ')' after condition");

        let exit_jump = self.emit_jump(Op::BranchFalse);
        self.emit(Op::Pop, vec![]);
        self.statement();
        self.emit_loop(loop_start);

        self.patch_jump(exit_jump);
        self.emit(Op::Pop, vec![]);
    }

    /// `for (init; cond; inc) body` desugars entirely within one enclosing
    /// scope, so the loop variable declared in `init` stays visible to
    /// `body` — unlike a version that scopes it one level too tight.
    fn for_statement(&mut self) {
        self.begin_scope();
        self.consume(TokenType::LeftParen, "expect '(' after 'for'");

        if self.match_token(TokenType::Semicolon) {
            // no initializer
        } else if self.match_token(TokenType::Var) {
            self.var_declaration();
        } else {
            self.expression_statement();
        }

        let mut loop_start = self.current_chunk().len();
        let mut exit_jump: Option<usize> = None;
        if !self.match_token(TokenType::Semicolon) {
            self.expression();
            self.consume(TokenType::Semicolon, "expect ';' after loop condition");
            exit_jump = Some(self.emit_jump(Op::BranchFalse));
            self.emit(Op::Pop, vec![]);
        }

        if !self.check(TokenType::RightParen) {
            let body_jump = self.emit_jump(Op::Branch);
            let increment_start = self.current_chunk().len();
            self.expression();
            self.emit(Op::Pop, vec![]);
            self.consume(TokenType::RightParen, "expect ')' after for clauses");

            self.emit_loop(loop_start);
            loop_start = increment_start;
            self.patch_jump(body_jump);
        } else {
            self.consume(TokenType::RightParen, "expect ')' after for clauses");
        }

        self.statement();
        self.emit_loop(loop_start);

        if let Some(exit_jump) = exit_jump {
            self.patch_jump(exit_jump);
            self.emit(Op::Pop, vec![]);
        }
        self.end_scope();
    }

    fn statement(&mut self) {
        if self.match_token(TokenType::Print) {
            self.print_statement();
        } else if self.match_token(TokenType::If) {
            self.if_statement();
        } else if self.match_token(TokenType::While) {
            self.while_statement();
        } else if self.match_token(TokenType::For) {
            self.for_statement();
        } else if self.match_token(TokenType::Return) {
            self.return_statement();
        } else if self.match_token(TokenType::LeftBrace) {
            self.begin_scope();
            self.block();
            self.end_scope();
        } else {
            self.expression_statement();
        }
    }

    fn declaration(&mut self) {
        if self.match_token(TokenType::Var) {
            self.var_declaration();
        } else if self.match_token(TokenType::Fun) {
            self.fun_declaration();
        } else {
            self.statement();
        }
        if self.panic_mode {
            self.synchronize();
        }
    }
}

pub fn compile(source: &str, reporter: &mut dyn Reporter) -> Result<Rc<Function>, CompileError> {
    let mut compiler = Compiler::new(source, reporter);
    while !compiler.check(TokenType::EndOfFile) {
        compiler.declaration();
    }
    compiler.consume(TokenType::EndOfFile, "expect end of expression");
    let (function, _upvalues) = compiler.end_function();
    if compiler.had_error {
        Err(CompileError)
    } else {
        Ok(function)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::CollectingReporter;

    fn compile_ok(src: &str) -> Rc<Function> {
        let mut reporter = CollectingReporter::default();
        compile(src, &mut reporter).expect("expected successful compilation")
    }

    #[test]
    fn compiles_arithmetic() {
        let f = compile_ok("print 1 + 2 * 3;");
        assert!(f.chunk.len() > 0);
    }

    #[test]
    fn rejects_return_at_top_level() {
        let mut reporter = CollectingReporter::default();
        let result = compile("return 1;", &mut reporter);
        assert!(result.is_err());
        assert!(!reporter.errors.is_empty());
    }

    #[test]
    fn rejects_duplicate_local() {
        let mut reporter = CollectingReporter::default();
        let result = compile("{ var a = 1; var a = 2; }", &mut reporter);
        assert!(result.is_err());
    }

    #[test]
    fn rejects_self_referencing_initializer() {
        let mut reporter = CollectingReporter::default();
        let result = compile("{ var a = a; }", &mut reporter);
        assert!(result.is_err());
    }

    #[test]
    fn function_declaration_emits_closure() {
        let f = compile_ok("fun add(a, b) { return a + b; } print add(1, 2);");
        assert!(f.chunk.constants.len() >= 4); // nil/true/false + fn name + fn + ...
    }
}
