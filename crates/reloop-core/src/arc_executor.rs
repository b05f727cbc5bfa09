use crate::constants::RunnerConstants;
use crate::context::{Interrupted, RunContext};
use crate::delta::Element;
use crate::script::{RunOutcome, ScriptExecutor};
use crate::widgets::{WidgetKind, WidgetValue};
use arc_script::{Exit, Expr, Flow, Host, Program, Stmt, Value};
use log::{debug, warn};
use std::fs;
use std::path::Path;
use std::time::Duration;

const FUNCTIONS: &[&str] = &[
    "text",
    "markdown",
    "empty",
    "checkbox",
    "button",
    "radio",
    "slider",
    "text_input",
    "text_area",
    "argc",
    "arg",
    "sleep",
    "str",
    "fail",
];

const PLACEHOLDER_METHODS: &[&str] = &["text", "markdown", "empty"];

/// Runs `.arc` scripts, exposing output and widget functions to them.
#[derive(Debug, Default, Clone, Copy)]
pub struct ArcScriptExecutor;

impl ArcScriptExecutor {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Reads, parses and checks a script without running it.
    pub fn compile(script_path: &Path) -> Result<Program, String> {
        let source = fs::read_to_string(script_path)
            .map_err(|e| format!("Cannot read {}: {e}", script_path.display()))?;
        let program = arc_script::parse_program(&source).map_err(|e| e.to_string())?;
        check_calls(&program.statements)?;
        Ok(program)
    }
}

impl ScriptExecutor for ArcScriptExecutor {
    fn execute(
        &mut self,
        script_path: &Path,
        argv: &[String],
        ctx: &mut RunContext<'_>,
    ) -> RunOutcome {
        let program = match Self::compile(script_path) {
            Ok(program) => program,
            Err(details) => return RunOutcome::CompileError(details),
        };
        debug!(
            "Running {} ({} statements)",
            script_path.display(),
            program.statements.len()
        );

        let mut host = ScriptHost { ctx, argv };
        match arc_script::run(&program, &mut host) {
            Ok(()) => RunOutcome::Success,
            Err(Exit::Interrupted(Interrupted)) => RunOutcome::Interrupted,
            Err(Exit::Failed(error)) => RunOutcome::RuntimeError(error.to_string()),
        }
    }
}

/// Rejects calls to functions or placeholder methods that do not exist, so
/// that a typo fails before the script produces any output.
fn check_calls(statements: &[Stmt]) -> Result<(), String> {
    for stmt in statements {
        let line = stmt.line();
        let result = match stmt {
            Stmt::Assign { value: expr, .. } | Stmt::Expr { expr, .. } => check_expr(expr),
            Stmt::If {
                condition,
                then_branch,
                else_branch,
                ..
            } => check_expr(condition)
                .and_then(|()| check_calls(then_branch))
                .and_then(|()| check_calls(else_branch)),
            Stmt::While {
                condition, body, ..
            } => check_expr(condition).and_then(|()| check_calls(body)),
        };
        result.map_err(|message| {
            if message.starts_with("line ") {
                message
            } else {
                format!("line {line}: {message}")
            }
        })?;
    }
    Ok(())
}

fn check_expr(expr: &Expr) -> Result<(), String> {
    match expr {
        Expr::Const(_) | Expr::Load(_) => Ok(()),
        Expr::Binary { lhs, rhs, .. } => check_expr(lhs).and_then(|()| check_expr(rhs)),
        Expr::Unary { operand, .. } => check_expr(operand),
        Expr::Call { name, args } => {
            if !FUNCTIONS.contains(&name.as_str()) {
                return Err(format!("Unknown function: {name}"));
            }
            args.iter().try_for_each(check_expr)
        }
        Expr::MethodCall {
            target,
            method,
            args,
        } => {
            if !PLACEHOLDER_METHODS.contains(&method.as_str()) {
                return Err(format!("Unknown method: {method}"));
            }
            check_expr(target)?;
            args.iter().try_for_each(check_expr)
        }
        Expr::InterpolatedString(segments) => segments.iter().try_for_each(|segment| match segment {
            arc_script::InterpolationSegment::Literal(_) => Ok(()),
            arc_script::InterpolationSegment::Expression(expr) => check_expr(expr),
        }),
    }
}

type HostResult = Result<Value, Flow<Interrupted>>;

struct ScriptHost<'c, 'a> {
    ctx: &'c mut RunContext<'a>,
    argv: &'c [String],
}

impl ScriptHost<'_, '_> {
    fn emit(&mut self, element: Element) -> Result<usize, Flow<Interrupted>> {
        self.ctx.emit(element).map_err(Flow::Interrupt)
    }

    /// Looks up the stored value of a widget, falling back to `default`
    /// when it is missing or of another type.
    fn widget_value<T>(
        &self,
        id: &str,
        default: T,
        extract: impl Fn(&WidgetValue) -> Option<T>,
    ) -> T {
        match self.ctx.widget_value(id) {
            None => default,
            Some(stored) => extract(stored).unwrap_or_else(|| {
                warn!(
                    "Ignoring stored {} value {stored} for widget {id}, using its default",
                    stored.type_name()
                );
                default
            }),
        }
    }

    fn widget(
        &mut self,
        kind: WidgetKind,
        label: &str,
        value: WidgetValue,
    ) -> Result<(), Flow<Interrupted>> {
        self.emit(Element::Widget {
            id: kind.widget_id(label),
            kind,
            label: label.to_string(),
            value,
        })
        .map(|_| ())
    }

    fn checkbox(&mut self, args: &[Value]) -> HostResult {
        arity("checkbox", args, 1, 2)?;
        let label = string_arg("checkbox", args, 0)?;
        let default = args.get(1).map_or(Ok(false), |v| {
            v.as_bool()
                .ok_or_else(|| "checkbox() default must be a boolean".to_string())
        })?;
        let id = WidgetKind::Checkbox.widget_id(label);
        let checked = self.widget_value(&id, default, |v| match v {
            WidgetValue::Bool(b) => Some(*b),
            _ => None,
        });
        self.widget(WidgetKind::Checkbox, label, WidgetValue::Bool(checked))?;
        Ok(Value::Boolean(checked))
    }

    fn button(&mut self, args: &[Value]) -> HostResult {
        arity("button", args, 1, 1)?;
        let label = string_arg("button", args, 0)?;
        let id = WidgetKind::Button.widget_id(label);
        let clicked = self.widget_value(&id, false, |v| match v {
            WidgetValue::Trigger(b) => Some(*b),
            _ => None,
        });
        self.widget(WidgetKind::Button, label, WidgetValue::Trigger(clicked))?;
        Ok(Value::Boolean(clicked))
    }

    fn radio(&mut self, args: &[Value]) -> HostResult {
        if args.len() < 2 {
            return Err(Flow::Error("radio() needs a label and at least one option".into()));
        }
        let label = string_arg("radio", args, 0)?;
        let options = i64::try_from(args.len() - 1).unwrap_or(i64::MAX);
        let id = WidgetKind::Radio.widget_id(label);
        let selected = self.widget_value(&id, 0, |v| match v {
            WidgetValue::Int(i) if (0..options).contains(i) => Some(*i),
            _ => None,
        });
        self.widget(WidgetKind::Radio, label, WidgetValue::Int(selected))?;
        Ok(int_value(selected))
    }

    fn slider(&mut self, args: &[Value]) -> HostResult {
        arity("slider", args, 1, 4)?;
        let label = string_arg("slider", args, 0)?;
        let min = int_arg("slider", args, 1)?.unwrap_or(RunnerConstants::DEFAULT_SLIDER_MIN);
        let max = int_arg("slider", args, 2)?.unwrap_or(RunnerConstants::DEFAULT_SLIDER_MAX);
        if min > max {
            return Err(Flow::Error(format!("slider() range {min}..{max} is empty")));
        }
        let default = int_arg("slider", args, 3)?.unwrap_or(min).clamp(min, max);
        let id = WidgetKind::Slider.widget_id(label);
        let value = self.widget_value(&id, default, |v| match v {
            WidgetValue::Int(i) if (min..=max).contains(i) => Some(*i),
            _ => None,
        });
        self.widget(WidgetKind::Slider, label, WidgetValue::Int(value))?;
        Ok(int_value(value))
    }

    fn text_widget(&mut self, kind: WidgetKind, args: &[Value]) -> HostResult {
        let name = kind.as_str();
        arity(name, args, 1, 2)?;
        let label = string_arg(name, args, 0)?;
        let default = args.get(1).map(ToString::to_string).unwrap_or_default();
        let id = kind.widget_id(label);
        let text = self.widget_value(&id, default, |v| match v {
            WidgetValue::String(s) => Some(s.clone()),
            _ => None,
        });
        self.widget(kind, label, WidgetValue::String(text.clone()))?;
        Ok(Value::String(text))
    }
}

impl Host for ScriptHost<'_, '_> {
    type Interrupt = Interrupted;

    fn call(&mut self, name: &str, args: &[Value]) -> HostResult {
        match name {
            "text" | "markdown" => {
                arity(name, args, 1, 1)?;
                let body = args[0].to_string();
                self.emit(body_element(name, body))?;
                Ok(Value::Undefined)
            }
            "empty" => {
                arity(name, args, 0, 0)?;
                let index = self.emit(Element::Empty)?;
                Ok(Value::Handle(index as u64))
            }
            "checkbox" => self.checkbox(args),
            "button" => self.button(args),
            "radio" => self.radio(args),
            "slider" => self.slider(args),
            "text_input" => self.text_widget(WidgetKind::TextInput, args),
            "text_area" => self.text_widget(WidgetKind::TextArea, args),
            "argc" => {
                arity(name, args, 0, 0)?;
                Ok(int_value(i64::try_from(self.argv.len()).unwrap_or(i64::MAX)))
            }
            "arg" => {
                arity(name, args, 1, 1)?;
                let index = int_arg(name, args, 0)?.unwrap_or_default();
                usize::try_from(index)
                    .ok()
                    .and_then(|i| self.argv.get(i))
                    .map(|a| Value::String(a.clone()))
                    .ok_or_else(|| {
                        Flow::Error(format!(
                            "arg({index}) out of range, {} arguments given",
                            self.argv.len()
                        ))
                    })
            }
            "sleep" => {
                arity(name, args, 1, 1)?;
                let ms = int_arg(name, args, 0)?.unwrap_or_default();
                let ms = u64::try_from(ms).unwrap_or(0).min(RunnerConstants::SLEEP_MAX_MS);
                self.ctx
                    .sleep(Duration::from_millis(ms))
                    .map_err(Flow::Interrupt)?;
                Ok(Value::Undefined)
            }
            _ => Err(Flow::Error(format!("Unknown function: {name}"))),
        }
    }

    fn call_method(&mut self, target: &Value, method: &str, args: &[Value]) -> HostResult {
        let Some(handle) = target.as_handle() else {
            return Err(Flow::Error(format!(
                "Cannot call {method}() on {}",
                target.type_name()
            )));
        };
        let index = usize::try_from(handle)
            .map_err(|_| Flow::Error(format!("Invalid placeholder {handle}")))?;
        let element = match method {
            "text" | "markdown" => {
                arity(method, args, 1, 1)?;
                body_element(method, args[0].to_string())
            }
            "empty" => {
                arity(method, args, 0, 0)?;
                Element::Empty
            }
            _ => return Err(Flow::Error(format!("Unknown method: {method}"))),
        };
        self.ctx.replace(index, element).map_err(Flow::Interrupt)?;
        Ok(Value::Undefined)
    }
}

fn body_element(name: &str, body: String) -> Element {
    if name == "markdown" {
        Element::Markdown { body }
    } else {
        Element::Text { body }
    }
}

fn arity(name: &str, args: &[Value], min: usize, max: usize) -> Result<(), String> {
    if (min..=max).contains(&args.len()) {
        Ok(())
    } else if min == max {
        Err(format!("{name}() takes {min} argument(s), got {}", args.len()))
    } else {
        Err(format!(
            "{name}() takes {min} to {max} arguments, got {}",
            args.len()
        ))
    }
}

fn string_arg<'v>(name: &str, args: &'v [Value], index: usize) -> Result<&'v str, String> {
    args.get(index)
        .and_then(Value::as_str)
        .ok_or_else(|| format!("{name}() argument {} must be a string", index + 1))
}

#[allow(clippy::cast_possible_truncation)]
fn int_arg(name: &str, args: &[Value], index: usize) -> Result<Option<i64>, String> {
    let Some(value) = args.get(index) else {
        return Ok(None);
    };
    match value.as_number() {
        Some(n) if n.fract() == 0.0 => Ok(Some(n as i64)),
        _ => Err(format!(
            "{name}() argument {} must be a whole number",
            index + 1
        )),
    }
}

#[allow(clippy::cast_precision_loss)]
fn int_value(n: i64) -> Value {
    Value::Number(n as f64)
}
