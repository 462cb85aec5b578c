//! Native function table. The language surface keeps only `clock`,
//! following the arity-checked `Native` calling convention used
//! elsewhere for closures.

use std::rc::Rc;
use std::time::Instant;

use once_cell::sync::Lazy;

use crate::value::{Native, Value};
use crate::vm::{Frame, RuntimeResult};

static START: Lazy<Instant> = Lazy::new(Instant::now);

fn clock(_frame: &Frame, _args: &[Value]) -> RuntimeResult<Value> {
    let millis = START.elapsed().as_secs_f32() * 1000.0;
    Ok(Value::Number(millis))
}

pub fn all() -> Vec<Rc<Native>> {
    vec![Rc::new(Native {
        name: "clock",
        arity: 0,
        func: clock,
    })]
}
