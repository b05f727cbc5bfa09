use crate::ast::{Expr, Program, Stmt};
use crate::error::{Exit, RuntimeError};
use crate::evaluator::{Evaluator, Host};
use crate::value::{Value, ValueExt, VariableResolver};
use std::collections::HashMap;

/// Global variables of a running program.
#[derive(Debug, Default, Clone)]
pub struct Scope {
    vars: HashMap<String, Value>,
}

impl Scope {
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.vars.insert(name.into(), value);
    }
}

impl VariableResolver for Scope {
    fn resolve(&self, name: &str) -> Result<Value, String> {
        self.vars
            .get(name)
            .cloned()
            .ok_or_else(|| format!("Undefined variable: {name}"))
    }
}

pub struct Interpreter<'h, H: Host + ?Sized> {
    host: &'h mut H,
    scope: Scope,
}

impl<'h, H: Host + ?Sized> Interpreter<'h, H> {
    pub fn new(host: &'h mut H) -> Self {
        Self {
            host,
            scope: Scope::default(),
        }
    }

    #[must_use]
    pub const fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Executes every statement in order.
    ///
    /// # Errors
    ///
    /// Stops at the first runtime error or host interrupt.
    pub fn run(&mut self, program: &Program) -> Result<(), Exit<H::Interrupt>> {
        self.exec_block(&program.statements)
    }

    fn exec_block(&mut self, statements: &[Stmt]) -> Result<(), Exit<H::Interrupt>> {
        for stmt in statements {
            self.exec(stmt)?;
        }
        Ok(())
    }

    fn exec(&mut self, stmt: &Stmt) -> Result<(), Exit<H::Interrupt>> {
        match stmt {
            Stmt::Assign { name, value, line } => {
                let value = self.eval(value, *line)?;
                self.scope.set(name.clone(), value);
            }
            Stmt::Expr { expr, line } => {
                self.eval(expr, *line)?;
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
                line,
            } => {
                if self.condition(condition, *line)? {
                    self.exec_block(then_branch)?;
                } else {
                    self.exec_block(else_branch)?;
                }
            }
            Stmt::While {
                condition,
                body,
                line,
            } => {
                while self.condition(condition, *line)? {
                    self.exec_block(body)?;
                }
            }
        }
        Ok(())
    }

    fn eval(&mut self, expr: &Expr, line: usize) -> Result<Value, Exit<H::Interrupt>> {
        Evaluator::new(&mut *self.host, &self.scope)
            .eval(expr)
            .map_err(|flow| flow.at_line(line))
    }

    fn condition(&mut self, expr: &Expr, line: usize) -> Result<bool, Exit<H::Interrupt>> {
        self.eval(expr, line)?
            .to_bool()
            .map_err(|message| Exit::Failed(RuntimeError { message, line }))
    }
}

/// Runs `program` against `host` with a fresh scope.
///
/// # Errors
///
/// See [`Interpreter::run`].
pub fn run<H: Host + ?Sized>(program: &Program, host: &mut H) -> Result<(), Exit<H::Interrupt>> {
    Interpreter::new(host).run(program)
}
