//! Reference evaluator for lowered programs.
//!
//! Runs the [`ClassModel`]s of a [`LoweredProgram`] the way the host would:
//! same instructions, same step counter, same guarded imports. The few host
//! classes generated code touches (`Object`, `String`, the boxes and
//! `System.out`) are emulated; printed lines are captured.
//!
//! ## Modules
//!
//! - [`value`]: stack values, heap objects and their printed form

pub mod value;

pub use value::{Object, Value};

use std::cmp::Ordering;

use kestrel_core::{HostFault, HostFaultKind, HostFrame, StackKind};
use rustc_hash::FxHashMap;
use thiserror::Error;
use tracing::trace;

use crate::backend::LoweredProgram;
use crate::backend::names::OBJECT_CLASS;
use crate::classfile::descriptor::MethodShape;
use crate::classfile::{ClassModel, CodeModel, MethodModel};
use crate::ir::{ArithOp, Instruction, InvokeKind, Label, MemberRef, Narrow};

const STRING_CLASS: &str = "java/lang/String";
const DEFAULT_MAX_DEPTH: usize = 256;

/// Why evaluation stopped.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InterpError {
    /// Generated code raised a host fault nobody caught.
    #[error("uncaught host fault: {0:?}")]
    Fault(HostFault),

    #[error("no class '{0}'")]
    MissingClass(String),

    #[error("no method '{0}'")]
    MissingMethod(String),

    #[error("no field '{0}'")]
    MissingField(String),

    /// The code broke a rule the host verifier enforces.
    #[error("unverifiable code in '{method}': {message}")]
    Unverifiable { method: String, message: String },
}

impl InterpError {
    /// The fault the host would raise for the same failure.
    pub fn into_fault(self) -> HostFault {
        let (class, message) = match self {
            InterpError::Fault(fault) => return fault,
            InterpError::MissingClass(name) => ("java/lang/NoClassDefFoundError", name),
            InterpError::MissingMethod(name) => ("java/lang/NoSuchMethodError", name),
            InterpError::MissingField(name) => ("java/lang/NoSuchFieldError", name),
            InterpError::Unverifiable { method, message } => {
                ("java/lang/VerifyError", format!("{method}: {message}"))
            }
        };
        HostFault::new(HostFaultKind::Other {
            class: class.to_string(),
            message,
        })
    }
}

type Result<T> = std::result::Result<T, InterpError>;

fn fault(kind: HostFaultKind) -> InterpError {
    InterpError::Fault(HostFault::new(kind))
}

fn host_exception(class: &str, message: &str) -> InterpError {
    fault(HostFaultKind::Other {
        class: class.to_string(),
        message: message.to_string(),
    })
}

/// Evaluator state: statics, heap and captured output.
pub struct Interpreter<'p> {
    program: &'p LoweredProgram,
    classes: FxHashMap<&'p str, &'p ClassModel>,
    statics: FxHashMap<(String, String), Value>,
    heap: Vec<Object>,
    output: String,
    depth: usize,
    max_depth: usize,
}

impl<'p> Interpreter<'p> {
    pub fn new(program: &'p LoweredProgram) -> Self {
        Self {
            program,
            classes: program
                .classes
                .iter()
                .map(|class| (class.name.as_str(), class))
                .collect(),
            statics: FxHashMap::default(),
            heap: Vec::new(),
            output: String::new(),
            depth: 0,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Call depth past which the host stack counts as exhausted.
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Instantiate the entry class and call its `run()`.
    pub fn run(&mut self) -> Result<()> {
        let entry = self.program.entry_class.as_str();
        let receiver = self.new_object(entry)?;
        self.invoke(
            InvokeKind::Virtual,
            &MemberRef::new(entry, "run", "()V"),
            vec![receiver],
        )?;
        Ok(())
    }

    /// Call a static method directly.
    pub fn invoke_static(&mut self, member: &MemberRef, args: Vec<Value>) -> Result<Option<Value>> {
        self.invoke(InvokeKind::Static, member, args)
    }

    /// Steps charged so far.
    pub fn steps(&self) -> i64 {
        let counter = &self.program.counter;
        self.get_static(&counter.owner, &counter.name)
            .and_then(|value| value.as_long())
            .unwrap_or(0)
    }

    pub fn get_static(&self, class: &str, name: &str) -> Option<Value> {
        self.statics
            .get(&(class.to_string(), name.to_string()))
            .copied()
    }

    /// Everything printed so far, one line per `println`.
    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn object(&self, value: Value) -> Option<&Object> {
        match value {
            Value::Ref(Some(index)) => self.heap.get(index),
            _ => None,
        }
    }

    // ========================================================================
    // Calls
    // ========================================================================

    fn invoke(
        &mut self,
        kind: InvokeKind,
        member: &MemberRef,
        args: Vec<Value>,
    ) -> Result<Option<Value>> {
        let target = match kind {
            InvokeKind::Static | InvokeKind::Special => member.owner.clone(),
            InvokeKind::Virtual | InvokeKind::Interface => {
                let receiver = self.receiver(args.first().copied())?;
                self.heap[receiver].class().to_string()
            }
        };
        match self.find_method(&target, &member.name, &member.descriptor) {
            Some((class, method)) => self.execute(class, method, args),
            None => self.host_call(member, args),
        }
    }

    /// Look a method up in a class and its superclasses.
    fn find_method(
        &self,
        class: &str,
        name: &str,
        descriptor: &str,
    ) -> Option<(&'p ClassModel, &'p MethodModel)> {
        let mut current = self.classes.get(class).copied();
        while let Some(model) = current {
            if let Some(method) = model.method(name, descriptor) {
                if method.code.is_some() {
                    return Some((model, method));
                }
            }
            current = self.classes.get(model.super_name.as_str()).copied();
        }
        None
    }

    fn receiver(&self, value: Option<Value>) -> Result<usize> {
        match value {
            Some(Value::Ref(Some(index))) => Ok(index),
            _ => Err(host_exception("java/lang/NullPointerException", "null receiver")),
        }
    }

    fn execute(
        &mut self,
        class: &'p ClassModel,
        method: &'p MethodModel,
        args: Vec<Value>,
    ) -> Result<Option<Value>> {
        let Some(code) = &method.code else {
            return Err(InterpError::MissingMethod(format!("{}.{}", class.name, method.name)));
        };
        if self.depth >= self.max_depth {
            return Err(fault(HostFaultKind::StackOverflow));
        }
        self.depth += 1;
        let mut frame = Frame::new(code, args);
        let result = self.run_frame(method, code, &mut frame);
        self.depth -= 1;
        result.map_err(|e| with_frame(e, class, method, frame.line))
    }

    /// Emulation of the host classes generated code calls into.
    fn host_call(&mut self, member: &MemberRef, args: Vec<Value>) -> Result<Option<Value>> {
        let missing = || InterpError::MissingMethod(member.to_string());
        match (member.owner.as_str(), member.name.as_str()) {
            (OBJECT_CLASS, "<init>") => Ok(None),
            (STRING_CLASS, "concat") => {
                let joined = format!("{}{}", self.text(args[0])?, self.text(args[1])?);
                Ok(Some(self.alloc(Object::Str(joined))))
            }
            (STRING_CLASS, "equals") => {
                let this = self.text(args[0])?;
                let equal =
                    matches!(self.object(args[1]), Some(Object::Str(other)) if *other == this);
                Ok(Some(Value::Int(i32::from(equal))))
            }
            (STRING_CLASS, "length") => {
                let length = self.text(args[0])?.encode_utf16().count();
                Ok(Some(Value::Int(length as i32)))
            }
            ("java/io/PrintStream", "println") => {
                let line = self.display(args.get(1).copied().unwrap_or(Value::NULL));
                trace!(%line, "println");
                self.output.push_str(&line);
                self.output.push('\n');
                Ok(None)
            }
            (class, "valueOf") if class.starts_with("java/lang/") => {
                let value = args.first().copied().ok_or_else(missing)?;
                Ok(Some(self.alloc(Object::Boxed {
                    class: class.to_string(),
                    value,
                })))
            }
            _ => Err(missing()),
        }
    }

    // ========================================================================
    // Heap
    // ========================================================================

    fn alloc(&mut self, object: Object) -> Value {
        self.heap.push(object);
        Value::Ref(Some(self.heap.len() - 1))
    }

    fn new_object(&mut self, class: &str) -> Result<Value> {
        if class == OBJECT_CLASS {
            return Ok(self.alloc(Object::Instance {
                class: class.to_string(),
                fields: Vec::new(),
            }));
        }
        let Some(mut model) = self.classes.get(class).copied() else {
            return Err(InterpError::MissingClass(class.to_string()));
        };
        let mut fields = Vec::new();
        loop {
            for field in model.fields.iter().filter(|f| !f.is_static()) {
                fields.push((field.name.clone(), Value::default_for(&field.descriptor)));
            }
            match self.classes.get(model.super_name.as_str()) {
                Some(parent) => model = *parent,
                None => break,
            }
        }
        Ok(self.alloc(Object::Instance {
            class: class.to_string(),
            fields,
        }))
    }

    fn text(&self, value: Value) -> Result<String> {
        match self.object(value) {
            Some(Object::Str(text)) => Ok(text.clone()),
            Some(other) => Err(fault(HostFaultKind::ClassCast {
                from: other.class().to_string(),
                to: STRING_CLASS.to_string(),
            })),
            None => Err(host_exception("java/lang/NullPointerException", "null string")),
        }
    }

    /// `String.valueOf(Object)`.
    fn display(&self, value: Value) -> String {
        match (value, self.object(value)) {
            (_, Some(Object::Str(text))) => text.clone(),
            (_, Some(Object::Boxed { class, value })) => value::boxed_text(class, *value),
            (Value::Ref(Some(index)), Some(object)) => {
                format!("{}@{index:x}", object.class().replace('/', "."))
            }
            _ => "null".to_string(),
        }
    }

    /// Whether an object of runtime class `class` may be cast to `target`.
    fn is_assignable(&self, class: &str, target: &str) -> bool {
        if target == OBJECT_CLASS || class == target {
            return true;
        }
        let Some(model) = self.classes.get(class) else {
            return false;
        };
        self.is_assignable(&model.super_name, target)
            || model
                .interfaces
                .iter()
                .any(|interface| self.is_assignable(interface, target))
    }

    // ========================================================================
    // Fields
    // ========================================================================

    fn static_value(&mut self, member: &MemberRef) -> Result<Value> {
        if member.owner == "java/lang/System" && member.name == "out" {
            return Ok(self.print_stream());
        }
        let key = (member.owner.clone(), member.name.clone());
        if let Some(value) = self.statics.get(&key) {
            return Ok(*value);
        }
        let declared = self
            .classes
            .get(member.owner.as_str())
            .and_then(|class| class.field(&member.name))
            .is_some_and(|field| field.is_static());
        if !declared {
            return Err(InterpError::MissingField(member.to_string()));
        }
        Ok(Value::default_for(&member.descriptor))
    }

    fn print_stream(&mut self) -> Value {
        match self.heap.iter().position(|o| *o == Object::PrintStream) {
            Some(index) => Value::Ref(Some(index)),
            None => self.alloc(Object::PrintStream),
        }
    }

    // ========================================================================
    // Instructions
    // ========================================================================

    fn run_frame(
        &mut self,
        method: &MethodModel,
        code: &CodeModel,
        frame: &mut Frame,
    ) -> Result<Option<Value>> {
        let unverifiable = |message: &str| InterpError::Unverifiable {
            method: method.label.clone(),
            message: message.to_string(),
        };
        let labels: FxHashMap<Label, usize> = code
            .instructions
            .iter()
            .enumerate()
            .filter_map(|(i, instruction)| match instruction {
                Instruction::Label(label) => Some((*label, i)),
                _ => None,
            })
            .collect();
        let jump = |label: &Label| {
            labels
                .get(label)
                .copied()
                .ok_or_else(|| unverifiable("jump to unplaced label"))
        };

        let mut pc = 0;
        while let Some(instruction) = code.instructions.get(pc) {
            pc += 1;
            match instruction {
                Instruction::Label(_) => {}
                Instruction::LineNumber(line) => frame.line = Some(*line),
                Instruction::PushInt(v) => frame.push(Value::Int(*v)),
                Instruction::PushLong(v) => frame.push(Value::Long(*v)),
                Instruction::PushFloat(v) => frame.push(Value::Float(*v)),
                Instruction::PushDouble(v) => frame.push(Value::Double(*v)),
                Instruction::PushString(text) => {
                    let value = self.alloc(Object::Str(text.clone()));
                    frame.push(value);
                }
                Instruction::PushNull => frame.push(Value::NULL),
                Instruction::Load(_, slot) => {
                    let value = frame.locals.get(usize::from(*slot)).copied();
                    frame.push(value.ok_or_else(|| unverifiable("load past max_locals"))?);
                }
                Instruction::Store(_, slot) => {
                    let value = frame.pop().ok_or_else(|| unverifiable("stack underflow"))?;
                    let Some(local) = frame.locals.get_mut(usize::from(*slot)) else {
                        return Err(unverifiable("store past max_locals"));
                    };
                    *local = value;
                }
                Instruction::Pop => {
                    frame.pop().ok_or_else(|| unverifiable("stack underflow"))?;
                }
                Instruction::Pop2 => {
                    let top = frame.pop().ok_or_else(|| unverifiable("stack underflow"))?;
                    if !top.is_wide() {
                        frame.pop().ok_or_else(|| unverifiable("stack underflow"))?;
                    }
                }
                Instruction::Dup => {
                    let top = frame.peek().ok_or_else(|| unverifiable("stack underflow"))?;
                    frame.push(top);
                }
                Instruction::Swap => {
                    let len = frame.stack.len();
                    if len < 2 {
                        return Err(unverifiable("stack underflow"));
                    }
                    frame.stack.swap(len - 1, len - 2);
                }
                Instruction::DupX2 => {
                    let v1 = frame.pop().ok_or_else(|| unverifiable("stack underflow"))?;
                    let v2 = frame.pop().ok_or_else(|| unverifiable("stack underflow"))?;
                    if v2.is_wide() {
                        frame.stack.extend([v1, v2, v1]);
                    } else {
                        let v3 = frame.pop().ok_or_else(|| unverifiable("stack underflow"))?;
                        frame.stack.extend([v1, v3, v2, v1]);
                    }
                }
                Instruction::Arith(op, _) => {
                    let result = if *op == ArithOp::Neg {
                        let v = frame.pop().ok_or_else(|| unverifiable("stack underflow"))?;
                        negate(v)
                    } else {
                        let b = frame.pop().ok_or_else(|| unverifiable("stack underflow"))?;
                        let a = frame.pop().ok_or_else(|| unverifiable("stack underflow"))?;
                        arith(*op, a, b)?
                    };
                    frame.push(result.ok_or_else(|| unverifiable("operand kinds"))?);
                }
                Instruction::Narrow(narrow) => {
                    let v = frame.pop_int().ok_or_else(|| unverifiable("narrow of non-int"))?;
                    frame.push(Value::Int(match narrow {
                        Narrow::Byte => i32::from(v as i8),
                        Narrow::Short => i32::from(v as i16),
                        Narrow::Char => i32::from(v as u16),
                        Narrow::UnsignedByte => v & 0xff,
                    }));
                }
                Instruction::Convert { to, .. } => {
                    let v = frame.pop().ok_or_else(|| unverifiable("stack underflow"))?;
                    let converted =
                        convert(v, *to).ok_or_else(|| unverifiable("convert of reference"))?;
                    frame.push(converted);
                }
                Instruction::LongCompare => {
                    let b = frame.pop().and_then(|v| v.as_long());
                    let a = frame.pop().and_then(|v| v.as_long());
                    let (Some(a), Some(b)) = (a, b) else {
                        return Err(unverifiable("lcmp of non-longs"));
                    };
                    frame.push(Value::Int(ordering_int(a.cmp(&b))));
                }
                Instruction::FloatCompare { nan_greater, .. } => {
                    let b = frame.pop().and_then(as_f64);
                    let a = frame.pop().and_then(as_f64);
                    let (Some(a), Some(b)) = (a, b) else {
                        return Err(unverifiable("float compare of non-floats"));
                    };
                    let result = match a.partial_cmp(&b) {
                        Some(ordering) => ordering_int(ordering),
                        None if *nan_greater => 1,
                        None => -1,
                    };
                    frame.push(Value::Int(result));
                }
                Instruction::Jump(label) => pc = jump(label)?,
                Instruction::JumpIfZero(condition, label) => {
                    let v = frame.pop_int().ok_or_else(|| unverifiable("branch on non-int"))?;
                    if condition.holds(v.cmp(&0)) {
                        pc = jump(label)?;
                    }
                }
                Instruction::JumpIfCompare(condition, label) => {
                    let b = frame.pop_int();
                    let a = frame.pop_int();
                    let (Some(a), Some(b)) = (a, b) else {
                        return Err(unverifiable("branch on non-ints"));
                    };
                    if condition.holds(a.cmp(&b)) {
                        pc = jump(label)?;
                    }
                }
                Instruction::Return(kind) => {
                    return match kind {
                        None => Ok(None),
                        Some(_) => frame
                            .pop()
                            .map(Some)
                            .ok_or_else(|| unverifiable("return with empty stack")),
                    };
                }
                Instruction::New(class) => {
                    let value = self.new_object(class)?;
                    frame.push(value);
                }
                Instruction::CheckCast(target) => {
                    let value = frame.peek().ok_or_else(|| unverifiable("stack underflow"))?;
                    if let Some(object) = self.object(value) {
                        let class = object.class().to_string();
                        if !self.is_assignable(&class, target) {
                            return Err(fault(HostFaultKind::ClassCast {
                                from: class,
                                to: target.clone(),
                            }));
                        }
                    }
                }
                Instruction::GetField(member) => {
                    let target = frame.pop();
                    let index = self.receiver(target)?;
                    let value = self.heap[index]
                        .field(&member.name)
                        .ok_or_else(|| InterpError::MissingField(member.to_string()))?;
                    frame.push(value);
                }
                Instruction::PutField(member) => {
                    let value = frame.pop().ok_or_else(|| unverifiable("stack underflow"))?;
                    let target = frame.pop();
                    let index = self.receiver(target)?;
                    if !self.heap[index].set_field(&member.name, value) {
                        return Err(InterpError::MissingField(member.to_string()));
                    }
                }
                Instruction::GetStatic(member) => {
                    let value = self.static_value(member)?;
                    frame.push(value);
                }
                Instruction::PutStatic(member) => {
                    let value = frame.pop().ok_or_else(|| unverifiable("stack underflow"))?;
                    self.statics
                        .insert((member.owner.clone(), member.name.clone()), value);
                }
                Instruction::Invoke(kind, member) => {
                    let shape = MethodShape::parse(&member.descriptor);
                    let count = shape.params.len() + usize::from(*kind != InvokeKind::Static);
                    if frame.stack.len() < count {
                        return Err(unverifiable("stack underflow"));
                    }
                    let args = frame.stack.split_off(frame.stack.len() - count);
                    if let Some(result) = self.invoke(*kind, member, args)? {
                        frame.push(result);
                    }
                }
            }
        }
        Err(unverifiable("fell off the end of the code"))
    }
}

fn with_frame(
    error: InterpError,
    class: &ClassModel,
    method: &MethodModel,
    line: Option<u32>,
) -> InterpError {
    match error {
        InterpError::Fault(mut fault) => {
            fault.frames.push(HostFrame::new(&class.name, &method.name, line));
            InterpError::Fault(fault)
        }
        other => other,
    }
}

/// Locals and operand stack of one activation.
struct Frame {
    locals: Vec<Value>,
    stack: Vec<Value>,
    line: Option<u32>,
}

impl Frame {
    fn new(code: &CodeModel, args: Vec<Value>) -> Self {
        let mut locals = vec![Value::Int(0); usize::from(code.max_locals)];
        let mut slot = 0;
        for arg in args {
            if let Some(local) = locals.get_mut(slot) {
                *local = arg;
            }
            slot += usize::from(arg.kind().width());
        }
        Self {
            locals,
            stack: Vec::new(),
            line: None,
        }
    }

    fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    fn pop(&mut self) -> Option<Value> {
        self.stack.pop()
    }

    fn pop_int(&mut self) -> Option<i32> {
        self.stack.pop().and_then(|v| v.as_int())
    }

    fn peek(&self) -> Option<Value> {
        self.stack.last().copied()
    }
}

fn ordering_int(ordering: Ordering) -> i32 {
    match ordering {
        Ordering::Less => -1,
        Ordering::Equal => 0,
        Ordering::Greater => 1,
    }
}

fn as_f64(value: Value) -> Option<f64> {
    match value {
        Value::Float(v) => Some(f64::from(v)),
        Value::Double(v) => Some(v),
        _ => None,
    }
}

fn negate(value: Value) -> Option<Value> {
    match value {
        Value::Int(v) => Some(Value::Int(v.wrapping_neg())),
        Value::Long(v) => Some(Value::Long(v.wrapping_neg())),
        Value::Float(v) => Some(Value::Float(-v)),
        Value::Double(v) => Some(Value::Double(-v)),
        Value::Ref(_) => None,
    }
}

/// Binary arithmetic with host semantics: integers wrap, integer division
/// by zero throws.
fn arith(op: ArithOp, a: Value, b: Value) -> Result<Option<Value>> {
    let divide_by_zero = || host_exception("java/lang/ArithmeticException", "/ by zero");
    Ok(match (a, b) {
        (Value::Int(a), Value::Int(b)) => Some(Value::Int(match op {
            ArithOp::Add => a.wrapping_add(b),
            ArithOp::Sub => a.wrapping_sub(b),
            ArithOp::Mul => a.wrapping_mul(b),
            ArithOp::Div if b == 0 => return Err(divide_by_zero()),
            ArithOp::Div => a.wrapping_div(b),
            ArithOp::Rem if b == 0 => return Err(divide_by_zero()),
            ArithOp::Rem => a.wrapping_rem(b),
            ArithOp::And => a & b,
            ArithOp::Or => a | b,
            ArithOp::Xor => a ^ b,
            ArithOp::Neg => a.wrapping_neg(),
        })),
        (Value::Long(a), Value::Long(b)) => Some(Value::Long(match op {
            ArithOp::Add => a.wrapping_add(b),
            ArithOp::Sub => a.wrapping_sub(b),
            ArithOp::Mul => a.wrapping_mul(b),
            ArithOp::Div if b == 0 => return Err(divide_by_zero()),
            ArithOp::Div => a.wrapping_div(b),
            ArithOp::Rem if b == 0 => return Err(divide_by_zero()),
            ArithOp::Rem => a.wrapping_rem(b),
            ArithOp::And => a & b,
            ArithOp::Or => a | b,
            ArithOp::Xor => a ^ b,
            ArithOp::Neg => a.wrapping_neg(),
        })),
        (Value::Float(a), Value::Float(b)) => float_arith(op, f64::from(a), f64::from(b))
            .map(|v| Value::Float(v as f32)),
        (Value::Double(a), Value::Double(b)) => float_arith(op, a, b).map(Value::Double),
        _ => None,
    })
}

fn float_arith(op: ArithOp, a: f64, b: f64) -> Option<f64> {
    match op {
        ArithOp::Add => Some(a + b),
        ArithOp::Sub => Some(a - b),
        ArithOp::Mul => Some(a * b),
        ArithOp::Div => Some(a / b),
        ArithOp::Rem => Some(a % b),
        ArithOp::Neg => Some(-a),
        ArithOp::And | ArithOp::Or | ArithOp::Xor => None,
    }
}

/// Host conversion semantics: float to integer saturates, NaN gives zero.
fn convert(value: Value, to: StackKind) -> Option<Value> {
    let converted = match (value, to) {
        (Value::Int(v), StackKind::Int) => Value::Int(v),
        (Value::Int(v), StackKind::Long) => Value::Long(i64::from(v)),
        (Value::Int(v), StackKind::Float) => Value::Float(v as f32),
        (Value::Int(v), StackKind::Double) => Value::Double(f64::from(v)),
        (Value::Long(v), StackKind::Int) => Value::Int(v as i32),
        (Value::Long(v), StackKind::Long) => Value::Long(v),
        (Value::Long(v), StackKind::Float) => Value::Float(v as f32),
        (Value::Long(v), StackKind::Double) => Value::Double(v as f64),
        (Value::Float(v), StackKind::Int) => Value::Int(v as i32),
        (Value::Float(v), StackKind::Long) => Value::Long(v as i64),
        (Value::Float(v), StackKind::Float) => Value::Float(v),
        (Value::Float(v), StackKind::Double) => Value::Double(f64::from(v)),
        (Value::Double(v), StackKind::Int) => Value::Int(v as i32),
        (Value::Double(v), StackKind::Long) => Value::Long(v as i64),
        (Value::Double(v), StackKind::Float) => Value::Float(v as f32),
        (Value::Double(v), StackKind::Double) => Value::Double(v),
        _ => return None,
    };
    Some(converted)
}
