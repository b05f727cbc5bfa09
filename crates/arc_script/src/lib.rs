mod ast;
mod error;
mod evaluator;
mod interpreter;
mod lexer;
mod parser;
mod token;
mod value;

pub use ast::{BinaryOp, Expr, InterpolationSegment, Program, Stmt, UnaryOp};
pub use error::{Exit, Flow, RuntimeError, SyntaxError};
pub use evaluator::{Evaluator, Host, NoHost, eval_expr};
pub use interpreter::{Interpreter, Scope, run};
pub use lexer::Lexer;
pub use parser::{MAX_NESTING, parse_expr, parse_program};
pub use token::{Spanned, Token};
pub use value::{Value, ValueExt, VariableResolver};

#[cfg(test)]
mod tests {
    use super::*;

    fn scope(vars: &[(&str, Value)]) -> Scope {
        let mut scope = Scope::default();
        for (name, value) in vars {
            scope.set(*name, value.clone());
        }
        scope
    }

    fn eval(source: &str, resolver: &Scope) -> Result<Value, String> {
        eval_expr(&parse_expr(source).unwrap(), resolver)
    }

    fn s(text: &str) -> Value {
        Value::String(text.to_string())
    }

    #[test]
    fn test_arithmetic_and_precedence() {
        let empty = Scope::default();
        for (source, expected) in [
            ("2 + 3", 5.0),
            ("10 - 4", 6.0),
            ("3 * 4", 12.0),
            ("15 / 3", 5.0),
            ("10 % 3", 1.0),
            ("(2 + 3) * 4", 20.0),
            ("2 + 3 * 4", 14.0),
            ("-2 + 5", 3.0),
            ("5 + true", 6.0),
            ("5 + false", 5.0),
        ] {
            assert_eq!(eval(source, &empty), Ok(Value::Number(expected)), "{source}");
        }
    }

    #[test]
    fn test_comparison_and_logic() {
        let vars = scope(&[("a", Value::Number(10.0)), ("b", Value::Number(5.0))]);
        for (source, expected) in [
            ("5 > 3", true),
            ("5 <= 4", false),
            ("5 == 5", true),
            ("\"abc\" != \"def\"", true),
            ("true && false", false),
            ("true OR false", true),
            ("NOT false", true),
            ("!true", false),
            ("(@a + @b) * 2 > 20", true),
        ] {
            assert_eq!(eval(source, &vars), Ok(Value::Boolean(expected)), "{source}");
        }
    }

    #[test]
    fn test_short_circuit_skips_right_side() {
        let empty = Scope::default();
        assert_eq!(eval("false && @missing", &empty), Ok(Value::Boolean(false)));
        assert_eq!(eval("true || @missing", &empty), Ok(Value::Boolean(true)));
        assert!(eval("true && @missing", &empty).is_err());
    }

    #[test]
    fn test_string_concatenation_rules() {
        let vars = scope(&[("name", s("Alice")), ("count", Value::Number(5.0))]);
        for (source, expected) in [
            ("\"hello\" + \" world\"", "hello world"),
            ("\"value: \" + 42", "value: 42"),
            ("\"value: \" + 3.14", "value: 3.14"),
            ("\"flag: \" + false", "flag: false"),
            ("\"Hello \" + @name", "Hello Alice"),
            ("\"items: \" + @count + \"!\"", "items: 5!"),
            ("\"123\" + 1", "1231"),
        ] {
            assert_eq!(eval(source, &vars), Ok(s(expected)), "{source}");
        }
    }

    #[test]
    fn test_strict_typing_errors() {
        let empty = Scope::default();
        for source in [
            "10 / 0",
            "@undefined",
            "\"1\" == 1",
            "1 != \"1\"",
            "!\"true\"",
            "\"true\" && true",
            "\"a\" > \"b\"",
            "5 + \"hello\"",
            "true + 5",
            "\"hello\" + @undefined",
        ] {
            assert!(eval(source, &empty).is_err(), "{source}");
        }
    }

    #[test]
    fn test_parse_rejections() {
        for source in [
            "", "2 +", "(2 + 3", "2 + 3)", "yes", "and", "'hello'", "\"Hello {@x",
            "\"Hello {}\"",
        ] {
            assert!(parse_expr(source).is_err(), "{source}");
        }
    }

    #[test]
    fn test_interpolation() {
        let vars = scope(&[
            ("x", Value::Number(5.0)),
            ("y", Value::Number(3.0)),
            ("flag", Value::Boolean(true)),
            ("ratio", Value::Number(2.5)),
        ]);
        for (source, expected) in [
            ("\"Sum: {@x + @y}\"", "Sum: 8"),
            ("\"Result: {(@x + @y) * 2}\"", "Result: 16"),
            ("\"{ @x }-{ @y }\"", "5-3"),
            ("\"Flag: {@flag}\"", "Flag: true"),
            ("\"Ratio is {@ratio}\"", "Ratio is 2.5"),
            ("\"Use {{}} for braces\"", "Use {} for braces"),
            ("\"{{@x}}\"", "{@x}"),
            ("\"Plain string\"", "Plain string"),
        ] {
            assert_eq!(eval(source, &vars), Ok(s(expected)), "{source}");
        }
        assert!(eval("\"Hello {@undefined}\"", &vars).is_err());
    }

    #[test]
    fn test_builtins() {
        let empty = Scope::default();
        assert_eq!(eval("str(1 + 1) + str(true)", &empty), Ok(s("2true")));
        assert_eq!(eval("fail(\"boom\", 3)", &empty), Err("boom 3".to_string()));
        assert!(eval("text(\"x\")", &empty).unwrap_err().contains("Unknown function"));
    }

    /// Records calls and interrupts after a fixed number of `emit` calls.
    #[derive(Default)]
    struct RecordingHost {
        calls: Vec<String>,
        budget: Option<usize>,
    }

    impl Host for RecordingHost {
        type Interrupt = &'static str;

        fn call(&mut self, name: &str, args: &[Value]) -> Result<Value, Flow<&'static str>> {
            match name {
                "emit" => {
                    let rendered: Vec<String> = args.iter().map(ToString::to_string).collect();
                    self.calls.push(rendered.join(","));
                    if let Some(budget) = self.budget.as_mut() {
                        *budget = budget.saturating_sub(1);
                        if *budget == 0 {
                            return Err(Flow::Interrupt("stopped"));
                        }
                    }
                    Ok(Value::Undefined)
                }
                "slot" => Ok(Value::Handle(7)),
                _ => Err(Flow::Error(format!("Unknown function: {name}"))),
            }
        }

        fn call_method(
            &mut self,
            target: &Value,
            method: &str,
            args: &[Value],
        ) -> Result<Value, Flow<&'static str>> {
            let id = target
                .as_handle()
                .ok_or_else(|| "not a handle".to_string())?;
            self.calls.push(format!("{id}.{method}({})", args.len()));
            Ok(Value::Undefined)
        }
    }

    fn run_source(source: &str, host: &mut RecordingHost) -> Result<(), Exit<&'static str>> {
        run(&parse_program(source).unwrap(), host)
    }

    #[test]
    fn test_program_runs_statements_in_order() {
        let mut host = RecordingHost::default();
        let source = "\
@total = 0
@i = 1
while @i <= 3 {
    @total = @total + @i
    @i = @i + 1
}
if @total == 6 { emit(\"six\") } else { emit(\"other\") }
@h = slot(); @h.text(\"a\", \"b\")
";
        run_source(source, &mut host).unwrap();
        assert_eq!(host.calls, vec!["six", "7.text(2)"]);
    }

    #[test]
    fn test_runtime_error_carries_line() {
        let mut host = RecordingHost::default();
        let result = run_source("emit(1)\n\nfail(\"bad\")\nemit(2)", &mut host);
        assert_eq!(
            result,
            Err(Exit::Failed(RuntimeError {
                message: "bad".into(),
                line: 3,
            }))
        );
        assert_eq!(host.calls, vec!["1"]);

        let result = run_source("if 1 { emit(1) }", &mut host);
        assert!(matches!(result, Err(Exit::Failed(RuntimeError { line: 1, .. }))));
    }

    #[test]
    fn test_host_interrupt_unwinds_loop() {
        let mut host = RecordingHost {
            budget: Some(3),
            ..RecordingHost::default()
        };
        let result = run_source("@n = 0\nwhile true {\n  emit(@n)\n  @n = @n + 1\n}", &mut host);
        assert_eq!(result, Err(Exit::Interrupted("stopped")));
        assert_eq!(host.calls, vec!["0", "1", "2"]);
    }

    #[test]
    fn test_interpreter_keeps_scope() {
        let mut host = RecordingHost::default();
        let program = parse_program("@greeting = \"hi {1 + 1}\"").unwrap();
        let mut interpreter = Interpreter::new(&mut host);
        interpreter.run(&program).unwrap();
        assert_eq!(interpreter.scope().get("greeting"), Some(&s("hi 2")));
    }

    #[test]
    fn test_method_on_non_handle_fails() {
        let mut host = RecordingHost::default();
        let result = run_source("@x = 1\n@x.text(\"a\")", &mut host);
        assert!(matches!(result, Err(Exit::Failed(RuntimeError { line: 2, .. }))));
    }
}
