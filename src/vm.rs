//! Stack-based virtual machine. One dispatch loop over a flat stack of
//! call frames (not recursive Rust calls), matching the call-frame/
//! return-slot shape laid out for this VM rather than a frame-per-Rust-
//! stack-call design.

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use crate::chunk::Op;
use crate::error::{Backtrace, BacktraceFrame, RuntimeError};
use crate::hashmap::StingMap;
use crate::natives;
use crate::value::{Closure, Function, UpValue, Value};

pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// One active call: which closure is running, where in its chunk, and
/// where its locals begin on the value stack. `bp - 1` is always the
/// slot holding the closure/native that was called (the source
/// convention keeps the callee below its arguments).
pub struct CallFrame {
    pub closure: Rc<Closure>,
    pub pc: usize,
    pub bp: usize,
}

/// Alias matching the shape natives are handed: the frame that issued
/// the call, in case a native ever needs the caller's context.
pub type Frame = CallFrame;

/// Stack-based virtual machine, generic over where `print` sends its
/// output. Production code gets `Vm::new()`, which writes to stdout;
/// tests build one over a `Vec<u8>` so they can assert on exactly what
/// a program printed.
pub struct Vm<W: Write = io::Stdout> {
    frames: Vec<CallFrame>,
    stack: Vec<Value>,
    globals: StingMap<Value>,
    /// Kept sorted ascending by stack index, so `.last()` is always the
    /// deepest (highest-index) open upvalue — the "head" of the list.
    open_upvalues: Vec<Rc<RefCell<UpValue>>>,
    return_slot: Value,
    out: W,
    #[cfg(feature = "debug-execution")]
    trace_stack: bool,
}

impl Vm<io::Stdout> {
    pub fn new() -> Self {
        Self::with_writer(io::stdout())
    }
}

impl<W: Write> Vm<W> {
    pub fn with_writer(out: W) -> Self {
        let mut globals = StingMap::new();
        for native in natives::all() {
            globals.insert(native.name.to_string(), Value::Native(native));
        }
        Self {
            frames: Vec::new(),
            stack: Vec::new(),
            globals,
            open_upvalues: Vec::new(),
            return_slot: Value::Nil,
            out,
            #[cfg(feature = "debug-execution")]
            trace_stack: false,
        }
    }

    /// Prints the value stack before every dispatched instruction. Only
    /// has an effect when built with the `debug-execution` feature.
    #[cfg(feature = "debug-execution")]
    pub fn set_trace_stack(&mut self, enabled: bool) {
        self.trace_stack = enabled;
    }

    pub fn interpret(&mut self, script: Rc<Function>) -> RuntimeResult<()> {
        let closure = Rc::new(Closure::new(script, Vec::new()));
        self.stack.push(Value::Closure(closure.clone()));
        self.frames.push(CallFrame {
            closure,
            pc: 0,
            bp: 1,
        });
        self.run()
    }

    fn backtrace(&self) -> Backtrace {
        let frames = self
            .frames
            .iter()
            .rev()
            .map(|frame| {
                let line = frame
                    .closure
                    .function
                    .chunk
                    .lines
                    .get(frame.pc.saturating_sub(1))
                    .copied()
                    .unwrap_or(0);
                let name = frame
                    .closure
                    .function
                    .name
                    .clone()
                    .unwrap_or_else(|| "script".to_string());
                BacktraceFrame { name, line }
            })
            .collect();
        Backtrace(frames)
    }

    fn runtime_error(&self, msg: impl Into<String>) -> RuntimeError {
        RuntimeError::new(msg, self.backtrace())
    }

    /// Like `runtime_error`, but for sites that already hold the offending
    /// value (a type mismatch, a call on something non-callable).
    fn runtime_error_value(&self, msg: impl Into<String>, value: Value) -> RuntimeError {
        RuntimeError::with_value(msg, value, self.backtrace())
    }

    fn pop_stack(&mut self) -> RuntimeResult<Value> {
        match self.stack.pop() {
            Some(v) => Ok(v),
            None => Err(self.runtime_error("stack underflow")),
        }
    }

    fn peek_stack(&self) -> RuntimeResult<&Value> {
        match self.stack.last() {
            Some(v) => Ok(v),
            None => Err(self.runtime_error("stack underflow")),
        }
    }

    fn read_string_constant(&self, idx: usize) -> Rc<str> {
        match &self.frames.last().unwrap().closure.function.chunk.constants[idx] {
            Value::String(s) => s.clone(),
            _ => unreachable!("compiler bug: constant {idx} is not a string"),
        }
    }

    /// Finds or creates the open upvalue for stack slot `idx`, preserving
    /// the ascending-by-index sort order (P3).
    fn capture_upvalue(&mut self, idx: usize) -> Rc<RefCell<UpValue>> {
        let existing = self
            .open_upvalues
            .binary_search_by_key(&idx, |uv| uv.borrow().stack_index().expect("open upvalue"));
        match existing {
            Ok(pos) => self.open_upvalues[pos].clone(),
            Err(pos) => {
                let cell = Rc::new(RefCell::new(UpValue::Open(idx)));
                self.open_upvalues.insert(pos, cell.clone());
                cell
            }
        }
    }

    /// Closes every open upvalue at or above `floor`, copying its current
    /// stack value into the cell so closures keep observing it after the
    /// backing slot is gone.
    fn close_upvalues_from(&mut self, floor: usize) {
        while let Some(top) = self.open_upvalues.last() {
            let idx = top.borrow().stack_index().expect("open upvalue");
            if idx < floor {
                break;
            }
            let cell = self.open_upvalues.pop().unwrap();
            let value = self.stack[idx].clone();
            *cell.borrow_mut() = UpValue::Closed(value);
        }
    }

    fn binary_numeric(&mut self, op: Op) -> RuntimeResult<()> {
        let b = self.pop_stack()?;
        let a = self.pop_stack()?;
        let result = match (&a, &b, op) {
            (Value::Number(x), Value::Number(y), Op::Add) => Value::Number(x + y),
            (Value::Number(x), Value::Number(y), Op::Sub) => Value::Number(x - y),
            (Value::Number(x), Value::Number(y), Op::Mul) => Value::Number(x * y),
            (Value::Number(x), Value::Number(y), Op::Div) => Value::Number(x / y),
            (Value::String(x), Value::String(y), Op::Add) => {
                Value::String(Rc::from(format!("{x}{y}")))
            }
            (Value::Number(x), Value::Number(y), Op::Greater) => Value::Bool(x > y),
            (Value::Number(x), Value::Number(y), Op::Less) => Value::Bool(x < y),
            _ => {
                let msg = format!(
                    "operands of type '{}' and '{}' are not valid for this operation",
                    a.type_name(),
                    b.type_name()
                );
                return Err(self.runtime_error_value(msg, a));
            }
        };
        self.stack.push(result);
        Ok(())
    }

    fn call_value(&mut self, argc: usize) -> RuntimeResult<()> {
        let callee_idx = match self.stack.len().checked_sub(argc + 1) {
            Some(idx) => idx,
            None => return Err(self.runtime_error("stack underflow")),
        };
        let callee = self.stack[callee_idx].clone();
        match callee {
            Value::Closure(closure) => {
                if closure.function.arity as usize != argc {
                    return Err(self.runtime_error(format!(
                        "expected {} arguments but got {argc}",
                        closure.function.arity
                    )));
                }
                let bp = callee_idx + 1;
                self.frames.push(CallFrame {
                    closure,
                    pc: 0,
                    bp,
                });
                Ok(())
            }
            Value::Native(native) => {
                if native.arity as usize != argc {
                    return Err(self.runtime_error(format!(
                        "expected {} arguments but got {argc}",
                        native.arity
                    )));
                }
                let args = self.stack[callee_idx + 1..].to_vec();
                let frame = self
                    .frames
                    .last()
                    .expect("call_value is only reached from run(), which always has a frame");
                let result = (native.func)(frame, &args)?;
                self.stack.truncate(callee_idx);
                self.stack.push(result);
                Ok(())
            }
            other => Err(self.runtime_error_value(format!("'{other}' is not callable"), other)),
        }
    }

    fn run(&mut self) -> RuntimeResult<()> {
        loop {
            if self.frames.is_empty() {
                return Ok(());
            }
            let frame_idx = self.frames.len() - 1;
            let (op, operands) = {
                let frame = &self.frames[frame_idx];
                let instr = &frame.closure.function.chunk.bytecode[frame.pc];
                (instr.op, instr.operands.clone())
            };
            self.frames[frame_idx].pc += 1;
            log::trace!("dispatch {op} {operands:?}");
            #[cfg(feature = "debug-execution")]
            if self.trace_stack {
                eprint!("          ");
                for v in &self.stack {
                    eprint!("[ {v} ]");
                }
                eprintln!();
            }

            match op {
                Op::LoadConst => {
                    let idx = operands[0] as usize;
                    let value = self.frames.last().unwrap().closure.function.chunk.constants
                        [idx]
                        .clone();
                    self.stack.push(value);
                }
                Op::Nil => self.stack.push(Value::Nil),
                Op::True => self.stack.push(Value::Bool(true)),
                Op::False => self.stack.push(Value::Bool(false)),
                Op::Pop => {
                    self.pop_stack()?;
                }
                Op::PopN => {
                    let n = operands[0] as usize;
                    let new_len = self.stack.len() - n;
                    self.stack.truncate(new_len);
                }
                Op::Negate => {
                    let v = self.pop_stack()?;
                    match v {
                        Value::Number(n) => self.stack.push(Value::Number(-n)),
                        other => {
                            let msg =
                                format!("operand of '-' must be a number, got {}", other.type_name());
                            return Err(self.runtime_error_value(msg, other));
                        }
                    }
                }
                Op::Not => {
                    let v = self.pop_stack()?;
                    match v {
                        Value::Bool(b) => self.stack.push(Value::Bool(!b)),
                        other => {
                            let msg =
                                format!("operand of '!' must be a bool, got {}", other.type_name());
                            return Err(self.runtime_error_value(msg, other));
                        }
                    }
                }
                Op::Add | Op::Sub | Op::Mul | Op::Div | Op::Greater | Op::Less => {
                    self.binary_numeric(op)?
                }
                Op::Equal => {
                    let b = self.pop_stack()?;
                    let a = self.pop_stack()?;
                    self.stack.push(Value::Bool(a.values_equal(&b)));
                }
                Op::Print => {
                    let v = self.pop_stack()?;
                    writeln!(self.out, "{v}").expect("write to output failed");
                }
                Op::DefineGlobal => {
                    let name = self.read_string_constant(operands[0] as usize);
                    let value = self.pop_stack()?;
                    if self.globals.contains_key(&name) {
                        return Err(
                            self.runtime_error(format!("global '{name}' is already defined"))
                        );
                    }
                    self.globals.insert(name.to_string(), value);
                }
                Op::GetGlobal => {
                    let name = self.read_string_constant(operands[0] as usize);
                    match self.globals.get(&name) {
                        Some(v) => {
                            let v = v.clone();
                            self.stack.push(v);
                        }
                        None => {
                            return Err(
                                self.runtime_error(format!("undefined variable '{name}'"))
                            )
                        }
                    }
                }
                Op::SetGlobal => {
                    let name = self.read_string_constant(operands[0] as usize);
                    if !self.globals.contains_key(&name) {
                        return Err(self.runtime_error(format!("undefined variable '{name}'")));
                    }
                    let value = self.peek_stack()?.clone();
                    self.globals.insert(name.to_string(), value);
                }
                Op::GetLocal => {
                    let slot = operands[0] as usize;
                    let bp = self.frames[frame_idx].bp;
                    let v = self.stack[bp + slot].clone();
                    self.stack.push(v);
                }
                Op::SetLocal => {
                    let slot = operands[0] as usize;
                    let bp = self.frames[frame_idx].bp;
                    let v = self.peek_stack()?.clone();
                    self.stack[bp + slot] = v;
                }
                Op::GetUpvalue => {
                    let idx = operands[0] as usize;
                    let cell = self.frames[frame_idx].closure.upvalues[idx].clone();
                    let value = match &*cell.borrow() {
                        UpValue::Open(stack_idx) => self.stack[*stack_idx].clone(),
                        UpValue::Closed(v) => v.clone(),
                    };
                    self.stack.push(value);
                }
                Op::SetUpvalue => {
                    let idx = operands[0] as usize;
                    let value = self.peek_stack()?.clone();
                    let cell = self.frames[frame_idx].closure.upvalues[idx].clone();
                    let stack_idx = cell.borrow().stack_index();
                    match stack_idx {
                        Some(si) => self.stack[si] = value,
                        None => *cell.borrow_mut() = UpValue::Closed(value),
                    }
                }
                Op::BranchFalse => {
                    let falsy = self.peek_stack()?.is_falsy();
                    if falsy {
                        self.frames[frame_idx].pc += operands[0] as usize;
                    }
                }
                Op::Branch => {
                    self.frames[frame_idx].pc += operands[0] as usize;
                }
                Op::Loop => {
                    self.frames[frame_idx].pc -= operands[0] as usize;
                }
                Op::Call => {
                    let argc = operands[0] as usize;
                    self.call_value(argc)?;
                }
                Op::MakeClosure => {
                    let k = operands[0] as usize;
                    let function_val = self.pop_stack()?;
                    let function = match function_val {
                        Value::Function(f) => f,
                        _ => unreachable!("compiler bug: MAKE_CLOSURE without function on stack"),
                    };
                    let bp = self.frames[frame_idx].bp;
                    let mut upvalues = Vec::with_capacity(k);
                    for i in 0..k {
                        let is_local = operands[1 + i * 2] != 0;
                        let index = operands[2 + i * 2] as usize;
                        let cell = if is_local {
                            self.capture_upvalue(bp + index)
                        } else {
                            self.frames[frame_idx].closure.upvalues[index].clone()
                        };
                        upvalues.push(cell);
                    }
                    self.stack.push(Value::Closure(Rc::new(Closure::new(function, upvalues))));
                }
                Op::CloseValue => {
                    let idx = self.stack.len() - 1;
                    self.close_upvalues_from(idx);
                    self.stack.pop();
                }
                Op::SaveValue => {
                    self.return_slot = self.pop_stack()?;
                }
                Op::LoadValue => {
                    self.stack.push(self.return_slot.clone());
                }
                Op::Return => {
                    let result = self.pop_stack()?;
                    let frame = self.frames.pop().unwrap();
                    self.close_upvalues_from(frame.bp);
                    let target = frame.bp - 1;
                    self.stack.truncate(target);
                    if !self.frames.is_empty() {
                        self.stack.push(result);
                    }
                }
            }
        }
    }
}

impl Default for Vm<io::Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile;
    use crate::reporter::CollectingReporter;

    /// Compiles and runs `src`, capturing everything it prints, and asserts
    /// it matches `expected` exactly (including trailing newlines).
    fn run_str(src: &str, expected: &str) {
        let mut reporter = CollectingReporter::default();
        let function = compile(src, &mut reporter).expect("compile error");
        let mut buf = Vec::new();
        let mut vm = Vm::with_writer(&mut buf);
        vm.interpret(function).expect("runtime error");
        let output = String::from_utf8(buf).expect("output was not utf-8");
        assert_eq!(output, expected);
    }

    /// Like `run_str`, but for programs expected to fail at runtime; checks
    /// whatever was printed before the failure.
    fn run_err(src: &str, expected_output: &str) {
        let mut reporter = CollectingReporter::default();
        let function = compile(src, &mut reporter).expect("compile error");
        let mut buf = Vec::new();
        let mut vm = Vm::with_writer(&mut buf);
        let result = vm.interpret(function);
        assert!(result.is_err());
        let output = String::from_utf8(buf).expect("output was not utf-8");
        assert_eq!(output, expected_output);
    }

    #[test]
    fn arithmetic_precedence() {
        run_str("print 1 + 2 * 3;", "7\n");
    }

    #[test]
    fn grouping_overrides_precedence() {
        run_str("print (1 + 2) * 3;", "9\n");
    }

    #[test]
    fn local_reassignment_is_visible() {
        run_str("var a = 2; a = a + 3; print a;", "5\n");
    }

    #[test]
    fn string_concatenation() {
        run_str("print \"ab\" + \"cd\";", "abcd\n");
    }

    #[test]
    fn function_call_and_return() {
        run_str(
            "fun add(a, b) { return a + b; } print add(40, 2);",
            "42\n",
        );
    }

    #[test]
    fn closures_share_mutable_upvalue() {
        run_str(
            "fun make() { var c = 0; fun inc() { c = c + 1; return c; } return inc; }\
             var f = make(); print f(); print f(); print f();",
            "1\n2\n3\n",
        );
    }

    #[test]
    fn while_loop_runs() {
        run_str(
            "var i = 0; while (i < 3) { print i; i = i + 1; }",
            "0\n1\n2\n",
        );
    }

    #[test]
    fn boolean_negation_and_equality() {
        run_str("print !true == false;", "true\n");
    }

    #[test]
    fn arity_mismatch_is_runtime_error() {
        run_err("fun f(x) {} f(1, 2);", "");
    }

    #[test]
    fn for_loop_variable_visible_to_body() {
        run_str("for (var i = 0; i < 3; i = i + 1) { print i; }", "0\n1\n2\n");
    }

    #[test]
    fn redefining_a_global_is_a_runtime_error() {
        run_err("var a = 1; var a = 2;", "");
    }

    #[test]
    fn not_on_non_bool_is_a_runtime_error() {
        run_err("print !1;", "");
    }

    #[test]
    fn calling_a_non_callable_is_a_runtime_error() {
        run_err("var a = 1; a();", "");
    }

    #[test]
    fn type_mismatch_runtime_error_carries_the_offending_value() {
        let mut reporter = CollectingReporter::default();
        let function = compile("print 1 + true;", &mut reporter).unwrap();
        let mut buf = Vec::new();
        let mut vm = Vm::with_writer(&mut buf);
        let err = vm.interpret(function).expect_err("expected a runtime error");
        assert!(matches!(err.value, Some(Value::Number(n)) if n == 1.0));
    }

    #[test]
    fn non_callable_runtime_error_carries_the_offending_value() {
        let mut reporter = CollectingReporter::default();
        let function = compile("var a = 1; a();", &mut reporter).unwrap();
        let mut buf = Vec::new();
        let mut vm = Vm::with_writer(&mut buf);
        let err = vm.interpret(function).expect_err("expected a runtime error");
        assert!(matches!(err.value, Some(Value::Number(n)) if n == 1.0));
    }
}
