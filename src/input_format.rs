// src/input_format.rs
use serde_json::{Map, Value};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum InputFormat {
    /// One JSON object per line
    #[default]
    #[value(name = "jsonl")]
    Jsonl,
    /// Plain text; each line becomes `{"message": <line>}`
    #[value(name = "line")]
    Line,
}

impl InputFormat {
    pub fn name(&self) -> &'static str {
        match self {
            InputFormat::Jsonl => "jsonl",
            InputFormat::Line => "line",
        }
    }

    pub fn parser(&self) -> Box<dyn LineParser> {
        match self {
            InputFormat::Jsonl => Box::new(JsonlParser::new()),
            InputFormat::Line => Box::new(MessageParser::new()),
        }
    }
}

pub trait LineParser: Send + Sync {
    fn parse_line(&self, line: &str) -> Result<Value, String>;
}

#[derive(Default)]
pub struct JsonlParser;

impl JsonlParser {
    pub fn new() -> Self {
        Self
    }
}

impl LineParser for JsonlParser {
    fn parse_line(&self, line: &str) -> Result<Value, String> {
        match serde_json::from_str(line.trim()) {
            Ok(Value::Object(obj)) => Ok(Value::Object(obj)),
            Ok(_) => Err("Expected a JSON object".to_string()),
            Err(e) => Err(format!("Failed to parse JSONL: {}", e)),
        }
    }
}

#[derive(Default)]
pub struct MessageParser;

impl MessageParser {
    pub fn new() -> Self {
        Self
    }
}

impl LineParser for MessageParser {
    fn parse_line(&self, line: &str) -> Result<Value, String> {
        let mut map = Map::new();
        map.insert("message".to_string(), Value::String(line.to_string()));
        Ok(Value::Object(map))
    }
}
