use reloop_core::{RerunData, WidgetStates, WidgetValue};

/// A line typed in interactive mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Rerun, replacing the script arguments when any are given.
    Rerun(Vec<String>),
    Set(String, WidgetValue),
    Click(String),
    Stop,
    Quit,
    Help,
}

pub const HELP: &str = "\
Commands:
  rerun [ARGS]...        rerun the script, optionally with new arguments
  set <WIDGET-ID> <JSON> stage a widget value for the next rerun
  click <WIDGET-ID>      stage a button click for the next rerun
  stop                   stop the current run
  quit                   shut down and exit";

/// Parses one input line. Blank lines yield `Ok(None)`.
pub fn parse_command(line: &str) -> Result<Option<Command>, String> {
    let line = line.trim();
    let Some((name, rest)) = split_word(line) else {
        return Ok(None);
    };

    let command = match name {
        "rerun" | "r" => Command::Rerun(rest.split_whitespace().map(str::to_string).collect()),
        "set" => {
            let (id, json) = split_word(rest).ok_or("usage: set <WIDGET-ID> <JSON>")?;
            if json.is_empty() {
                return Err("usage: set <WIDGET-ID> <JSON>".into());
            }
            Command::Set(id.to_string(), parse_widget_value(json)?)
        }
        "click" => {
            let (id, _) = split_word(rest).ok_or("usage: click <WIDGET-ID>")?;
            Command::Click(id.to_string())
        }
        "stop" => Command::Stop,
        "quit" | "exit" | "q" => Command::Quit,
        "help" | "?" => Command::Help,
        other => return Err(format!("Unknown command '{other}', type 'help'")),
    };
    Ok(Some(command))
}

/// Accepts the tagged wire form (`{"int": 2}`) or a bare JSON boolean,
/// integer or string.
pub fn parse_widget_value(json: &str) -> Result<WidgetValue, String> {
    if let Ok(value) = serde_json::from_str::<WidgetValue>(json) {
        return Ok(value);
    }
    match serde_json::from_str::<serde_json::Value>(json) {
        Ok(serde_json::Value::Bool(b)) => Ok(WidgetValue::Bool(b)),
        Ok(serde_json::Value::String(s)) => Ok(WidgetValue::String(s)),
        Ok(serde_json::Value::Number(n)) => n
            .as_i64()
            .map(WidgetValue::Int)
            .ok_or_else(|| format!("{n} is not a whole number")),
        Ok(other) => Err(format!("Unsupported widget value: {other}")),
        Err(e) => Err(format!("Invalid JSON: {e}")),
    }
}

fn split_word(input: &str) -> Option<(&str, &str)> {
    let input = input.trim_start();
    if input.is_empty() {
        return None;
    }
    Some(
        input
            .split_once(char::is_whitespace)
            .map_or((input, ""), |(word, rest)| (word, rest.trim())),
    )
}

/// Widget changes typed since the last rerun.
#[derive(Debug, Default)]
pub struct StagedWidgets {
    states: WidgetStates,
}

impl StagedWidgets {
    pub fn stage(&mut self, id: String, value: WidgetValue) {
        self.states.push(id, value);
    }

    /// Builds the rerun request and clears what was staged.
    pub fn take_rerun(&mut self, args: Vec<String>) -> RerunData {
        let mut data = RerunData::new();
        if !args.is_empty() {
            data = data.with_argv(args);
        }
        let states = std::mem::take(&mut self.states);
        if !states.is_empty() {
            data = data.with_widget_states(states);
        }
        data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse_command("   "), Ok(None));
        assert_eq!(parse_command("rerun"), Ok(Some(Command::Rerun(vec![]))));
        assert_eq!(
            parse_command("rerun a  b"),
            Ok(Some(Command::Rerun(vec!["a".into(), "b".into()])))
        );
        assert_eq!(
            parse_command("click button-go"),
            Ok(Some(Command::Click("button-go".into())))
        );
        assert_eq!(parse_command("stop"), Ok(Some(Command::Stop)));
        assert_eq!(parse_command("q"), Ok(Some(Command::Quit)));
        assert!(parse_command("jump").unwrap_err().contains("Unknown command"));
        assert!(parse_command("click").is_err());
        assert!(parse_command("set checkbox-c").is_err());
    }

    #[test]
    fn test_set_accepts_bare_and_tagged_values() {
        assert_eq!(
            parse_command("set checkbox-c true"),
            Ok(Some(Command::Set("checkbox-c".into(), WidgetValue::Bool(true))))
        );
        assert_eq!(
            parse_command("set text_input-name \"two words\""),
            Ok(Some(Command::Set(
                "text_input-name".into(),
                WidgetValue::String("two words".into())
            )))
        );
        assert_eq!(parse_widget_value("3"), Ok(WidgetValue::Int(3)));
        assert_eq!(
            parse_widget_value("{\"trigger\": true}"),
            Ok(WidgetValue::Trigger(true))
        );
        assert!(parse_widget_value("1.5").is_err());
        assert!(parse_widget_value("[1]").is_err());
        assert!(parse_widget_value("{oops").is_err());
    }

    #[test]
    fn test_staged_widgets_are_sent_once() {
        let mut staged = StagedWidgets::default();
        staged.stage("checkbox-c".into(), WidgetValue::Bool(true));

        let first = staged.take_rerun(vec!["x".into()]);
        assert_eq!(first.argv, Some(vec!["x".to_string()]));
        assert_eq!(first.widget_states.map(|s| s.len()), Some(1));

        let second = staged.take_rerun(Vec::new());
        assert_eq!(second, RerunData::new());
    }
}
