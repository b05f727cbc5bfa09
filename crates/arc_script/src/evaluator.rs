use crate::ast::{BinaryOp, Expr, InterpolationSegment, UnaryOp};
use crate::error::Flow;
use crate::value::{Value, ValueExt, VariableResolver};
use std::convert::Infallible;
use std::fmt::Write;

/// Functions and methods a script can call beyond the interpreter built-ins.
pub trait Host {
    /// Signal a host raises to abandon the program early.
    type Interrupt;

    /// # Errors
    ///
    /// Returns [`Flow::Error`] for unknown functions or bad arguments and
    /// [`Flow::Interrupt`] to stop the program.
    fn call(&mut self, name: &str, args: &[Value]) -> Result<Value, Flow<Self::Interrupt>>;

    /// # Errors
    ///
    /// Same contract as [`Host::call`].
    fn call_method(
        &mut self,
        target: &Value,
        method: &str,
        args: &[Value],
    ) -> Result<Value, Flow<Self::Interrupt>>;
}

/// Host for pure expressions: every call is an error.
pub struct NoHost;

impl Host for NoHost {
    type Interrupt = Infallible;

    fn call(&mut self, name: &str, _args: &[Value]) -> Result<Value, Flow<Infallible>> {
        Err(Flow::Error(format!("Unknown function: {name}")))
    }

    fn call_method(
        &mut self,
        target: &Value,
        method: &str,
        _args: &[Value],
    ) -> Result<Value, Flow<Infallible>> {
        Err(Flow::Error(format!(
            "Unknown method '{method}' on {}",
            target.type_name()
        )))
    }
}

pub struct Evaluator<'a, H: Host + ?Sized> {
    host: &'a mut H,
    vars: &'a dyn VariableResolver,
}

impl<'a, H: Host + ?Sized> Evaluator<'a, H> {
    pub fn new(host: &'a mut H, vars: &'a dyn VariableResolver) -> Self {
        Self { host, vars }
    }

    /// # Errors
    ///
    /// Returns an error on type mismatches, division by zero, undefined
    /// variables or failed calls, or the host's interrupt.
    pub fn eval(&mut self, expr: &Expr) -> Result<Value, Flow<H::Interrupt>> {
        match expr {
            Expr::Const(v) => Ok(v.clone()),

            Expr::Load(name) => Ok(self.vars.resolve(name)?),

            Expr::Binary {
                op: BinaryOp::And,
                lhs,
                rhs,
            } => Ok(Value::Boolean(
                self.eval(lhs)?.to_bool()? && self.eval(rhs)?.to_bool()?,
            )),

            Expr::Binary {
                op: BinaryOp::Or,
                lhs,
                rhs,
            } => Ok(Value::Boolean(
                self.eval(lhs)?.to_bool()? || self.eval(rhs)?.to_bool()?,
            )),

            Expr::Binary { op, lhs, rhs } => {
                let left = self.eval(lhs)?;
                let right = self.eval(rhs)?;
                Ok(binary(*op, &left, &right)?)
            }

            Expr::Unary { op, operand } => {
                let value = self.eval(operand)?;
                let result = match op {
                    UnaryOp::Neg => Value::Number(-value.to_number()?),
                    UnaryOp::Not => Value::Boolean(!value.to_bool()?),
                };
                Ok(result)
            }

            Expr::Call { name, args } => {
                let args = self.eval_all(args)?;
                match name.as_str() {
                    "str" => match args.as_slice() {
                        [value] => Ok(Value::String(value.to_string())),
                        _ => Err(Flow::Error("str() takes exactly one argument".into())),
                    },
                    "fail" => {
                        let message = args
                            .iter()
                            .map(ToString::to_string)
                            .collect::<Vec<_>>()
                            .join(" ");
                        Err(Flow::Error(if message.is_empty() {
                            "fail() called".to_string()
                        } else {
                            message
                        }))
                    }
                    _ => self.host.call(name, &args),
                }
            }

            Expr::MethodCall {
                target,
                method,
                args,
            } => {
                let target = self.eval(target)?;
                let args = self.eval_all(args)?;
                self.host.call_method(&target, method, &args)
            }

            Expr::InterpolatedString(segments) => {
                let mut result = String::new();
                for segment in segments {
                    match segment {
                        InterpolationSegment::Literal(s) => result.push_str(s),
                        InterpolationSegment::Expression(expr) => {
                            let val = self.eval(expr)?;
                            let _ = write!(&mut result, "{val}");
                        }
                    }
                }
                Ok(Value::String(result))
            }
        }
    }

    fn eval_all(&mut self, exprs: &[Expr]) -> Result<Vec<Value>, Flow<H::Interrupt>> {
        exprs.iter().map(|expr| self.eval(expr)).collect()
    }
}

fn binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, String> {
    let value = match op {
        BinaryOp::Add => match left {
            Value::String(_) => Value::String(format!("{left}{right}")),
            Value::Number(n) => Value::Number(n + right.to_number()?),
            other => return Err(format!("Cannot use + with {} on left side", other.type_name())),
        },
        BinaryOp::Sub => Value::Number(left.to_number()? - right.to_number()?),
        BinaryOp::Mul => Value::Number(left.to_number()? * right.to_number()?),
        BinaryOp::Div | BinaryOp::Mod => {
            let rhs = right.to_number()?;
            if rhs.abs() < f64::EPSILON {
                return Err("Division by zero".into());
            }
            let lhs = left.to_number()?;
            Value::Number(if op == BinaryOp::Div { lhs / rhs } else { lhs % rhs })
        }
        BinaryOp::Eq | BinaryOp::Ne => {
            if std::mem::discriminant(left) != std::mem::discriminant(right) {
                return Err(format!("Type mismatch in '{}'", op.symbol()));
            }
            Value::Boolean((left == right) == (op == BinaryOp::Eq))
        }
        BinaryOp::Gt => Value::Boolean(left.to_number()? > right.to_number()?),
        BinaryOp::Ge => Value::Boolean(left.to_number()? >= right.to_number()?),
        BinaryOp::Lt => Value::Boolean(left.to_number()? < right.to_number()?),
        BinaryOp::Le => Value::Boolean(left.to_number()? <= right.to_number()?),
        BinaryOp::And | BinaryOp::Or => {
            let (l, r) = (left.to_bool()?, right.to_bool()?);
            Value::Boolean(if op == BinaryOp::And { l && r } else { l || r })
        }
    };
    Ok(value)
}

/// Evaluates an expression that makes no host calls.
///
/// # Errors
///
/// Returns an error if the expression cannot be evaluated (e.g., type mismatch, division by zero).
pub fn eval_expr(expr: &Expr, resolver: &dyn VariableResolver) -> Result<Value, String> {
    Evaluator::new(&mut NoHost, resolver)
        .eval(expr)
        .map_err(|flow| match flow {
            Flow::Error(message) => message,
            Flow::Interrupt(never) => match never {},
        })
}
