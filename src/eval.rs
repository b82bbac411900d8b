use std::collections::HashMap;

use crate::ast::{BinOp, Expr, Node};
use crate::error::{Error, Result};
use crate::value::{Number, Value};
use crate::Options;

/// Depth-first tree walker over a parsed template. The bound data is only
/// ever borrowed; loop iterations push owned frames onto a scope stack so
/// inner bindings shadow outer ones and vanish when the loop ends.
pub struct Evaluator<'a> {
    root: &'a Value,
    scopes: Vec<HashMap<String, Value>>,
    iterations: usize,
    max_iterations: usize,
}

impl<'a> Evaluator<'a> {
    pub fn new(root: &'a Value, options: &Options) -> Self {
        Self {
            root,
            scopes: Vec::new(),
            iterations: 0,
            max_iterations: options.max_iterations,
        }
    }

    /// Innermost frame wins; the root mapping is the final fallback.
    fn lookup(&self, name: &str) -> Option<&Value> {
        for scope in self.scopes.iter().rev() {
            if let Some(value) = scope.get(name) {
                return Some(value);
            }
        }
        if let Value::Mapping(map) = self.root {
            return map.get(name);
        }
        None
    }

    pub fn render(&mut self, nodes: &[Node]) -> Result<String> {
        let mut output = String::new();
        self.render_into(nodes, &mut output)?;
        Ok(output)
    }

    fn render_into(&mut self, nodes: &[Node], output: &mut String) -> Result<()> {
        for node in nodes {
            match node {
                Node::Text(s) => output.push_str(s),
                Node::Var(expr) => {
                    let value = self.eval_expr(expr)?;
                    match value {
                        Value::String(s) => output.push_str(&s),
                        Value::Number(n) => output.push_str(&n.to_string()),
                        Value::Bool(b) => output.push_str(if b { "true" } else { "false" }),
                        Value::Null => {}
                        other => {
                            return Err(Error::render(format!(
                                "cannot render a {} value",
                                other.type_name()
                            )))
                        }
                    }
                }
                Node::For {
                    target,
                    iterable,
                    body,
                } => {
                    let items: Vec<Value> = match self.eval_expr(iterable)? {
                        Value::Sequence(items) => items,
                        Value::Mapping(map) => map.into_values().collect(),
                        other => {
                            return Err(Error::render(format!(
                                "for loop iterable must be a sequence or mapping, got {}",
                                other.type_name()
                            )))
                        }
                    };
                    let len = items.len();
                    for (i, item) in items.into_iter().enumerate() {
                        self.iterations += 1;
                        if self.iterations > self.max_iterations {
                            return Err(Error::render(format!(
                                "loop iteration budget of {} exceeded",
                                self.max_iterations
                            )));
                        }

                        let mut frame = HashMap::new();
                        frame.insert(target.clone(), item);
                        frame.insert("loop".to_string(), loop_helper(i, len));
                        self.scopes.push(frame);
                        let result = self.render_into(body, output);
                        self.scopes.pop();
                        result?;
                    }
                }
                Node::If { cases, else_body } => {
                    let mut matched = false;
                    for (condition, body) in cases {
                        if self.eval_expr(condition)?.is_truthy() {
                            self.render_into(body, output)?;
                            matched = true;
                            break;
                        }
                    }
                    if !matched {
                        if let Some(body) = else_body {
                            self.render_into(body, output)?;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn eval_expr(&self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::StringLit(s) => Ok(Value::String(s.clone())),
            Expr::BoolLit(b) => Ok(Value::Bool(*b)),
            Expr::IntLit(i) => Ok(Value::Number(Number::Int(*i))),
            Expr::FloatLit(x) => Ok(Value::Number(Number::Float(*x))),
            Expr::Var(name) => self
                .lookup(name)
                .cloned()
                .ok_or_else(|| Error::render(format!("undefined variable `{}`", name))),
            Expr::Attribute(obj, attr) => {
                let value = self.eval_expr(obj)?;
                match value {
                    Value::Mapping(map) => map.get(attr.as_str()).cloned().ok_or_else(|| {
                        Error::render(format!("no attribute `{}` on mapping", attr))
                    }),
                    other => Err(Error::render(format!(
                        "cannot access attribute `{}` of a {} value",
                        attr,
                        other.type_name()
                    ))),
                }
            }
            Expr::Index(obj, idx) => {
                let value = self.eval_expr(obj)?;
                let index = self.eval_expr(idx)?;
                match (value, index) {
                    (Value::Mapping(map), Value::String(key)) => {
                        map.get(&key).cloned().ok_or_else(|| {
                            Error::render(format!("no key `{}` in mapping", key))
                        })
                    }
                    (Value::Sequence(items), Value::Number(Number::Int(i))) => {
                        let len = items.len();
                        usize::try_from(i)
                            .ok()
                            .and_then(|i| items.into_iter().nth(i))
                            .ok_or_else(|| {
                                Error::render(format!(
                                    "index {} out of bounds for sequence of length {}",
                                    i, len
                                ))
                            })
                    }
                    (value, index) => Err(Error::render(format!(
                        "cannot index a {} value with a {} value",
                        value.type_name(),
                        index.type_name()
                    ))),
                }
            }
            Expr::Not(inner) => Ok(Value::Bool(!self.eval_expr(inner)?.is_truthy())),
            Expr::BinOp(lhs, op, rhs) => {
                let l = self.eval_expr(lhs)?;
                let r = self.eval_expr(rhs)?;
                match op {
                    BinOp::Eq => Ok(Value::Bool(l == r)),
                    BinOp::NotEq => Ok(Value::Bool(l != r)),
                    BinOp::And => Ok(Value::Bool(l.is_truthy() && r.is_truthy())),
                    BinOp::Or => Ok(Value::Bool(l.is_truthy() || r.is_truthy())),
                    BinOp::Add => match (l, r) {
                        (Value::String(a), Value::String(b)) => Ok(Value::String(a + &b)),
                        (Value::Number(a), Value::Number(b)) => {
                            Ok(Value::Number(add_numbers(a, b)))
                        }
                        (l, r) => Err(Error::render(format!(
                            "cannot add {} and {}",
                            l.type_name(),
                            r.type_name()
                        ))),
                    },
                }
            }
        }
    }
}

/// The `loop` helper bound inside every `for` frame.
fn loop_helper(i: usize, len: usize) -> Value {
    let mut map = indexmap::IndexMap::new();
    map.insert("index".to_string(), Value::Number(Number::Int(i as i64 + 1)));
    map.insert("index0".to_string(), Value::Number(Number::Int(i as i64)));
    map.insert("first".to_string(), Value::Bool(i == 0));
    map.insert("last".to_string(), Value::Bool(i + 1 == len));
    map.insert("length".to_string(), Value::Number(Number::Int(len as i64)));
    Value::Mapping(map)
}

fn add_numbers(a: Number, b: Number) -> Number {
    match (a, b) {
        (Number::Int(a), Number::Int(b)) => match a.checked_add(b) {
            Some(sum) => Number::Int(sum),
            None => Number::Float(a as f64 + b as f64),
        },
        (Number::Int(a), Number::Float(b)) => Number::Float(a as f64 + b),
        (Number::Float(a), Number::Int(b)) => Number::Float(a + b as f64),
        (Number::Float(a), Number::Float(b)) => Number::Float(a + b),
    }
}
