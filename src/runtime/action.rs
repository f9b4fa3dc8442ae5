//! Action vocabulary
//!
//! Every script statement starts with an action keyword. The interpreter
//! hands the statement text to [`ActionRegistry::parse`], which resolves the
//! keyword and lets the bound parser turn the remaining tokens into an
//! [`ActionNode`]. Executing the node is the interpreter's job.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::codec::{self, Location};
use super::error::{ParseError, ParseResult, RegistryError, RegistryResult};
use super::registry::Registry;

/// Version of the built-in keyword set
pub const VOCABULARY_VERSION: u32 = 1;

/// Conceptual grouping of actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionCategory {
    /// Logging, waiting, variables, flow control
    System,
    /// State changes without arguments
    State,
    /// State changes with arguments
    ParameterizedState,
    /// Add/remove on actor collections
    Collection,
    /// Host events, commands, permissions, placeholders
    Host,
}

/// Which actor key `select` matches on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectBy {
    /// Logical id
    Id,
    /// Unique id
    UniqueId,
}

/// Add or remove on a collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionOp {
    /// Insert an element
    Add,
    /// Remove an element
    Remove,
}

/// Comparison used by `check`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    /// `==` / `is`
    Eq,
    /// `!=` / `not`
    Ne,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `<`
    Lt,
    /// `<=`
    Le,
}

impl CompareOp {
    fn parse(token: &str) -> Option<Self> {
        Some(match token.to_ascii_lowercase().as_str() {
            "==" | "=" | "is" => Self::Eq,
            "!=" | "not" => Self::Ne,
            ">" => Self::Gt,
            ">=" => Self::Ge,
            "<" => Self::Lt,
            "<=" => Self::Le,
            _ => return None,
        })
    }
}

/// Identity `command` runs as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandSender {
    /// The triggering player
    Player,
    /// The player with operator rights
    Operator,
    /// The server console
    Console,
}

/// Executable form of one script statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ActionNode {
    /// Write a message to the log
    Log { message: String },
    /// Suspend for a number of ticks
    Wait { ticks: u64 },
    /// Evaluate embedded code
    Js { source: String },
    /// Assign a script variable
    Set { variable: String, value: String },
    /// Read a script variable
    Get { variable: String },
    /// Run another script by name
    Run { script: String },
    /// Compare two values
    Check { left: String, op: CompareOp, right: String },
    /// Suspend until resumed externally
    Pause,
    /// Stop the script
    Terminate,

    /// Respawn the selected actors for their viewers
    Respawn,
    /// Tear down the selected actors
    Destroy,
    /// Remove the selected actors from the live set
    Remove,
    /// Destroy and remove the selected actors
    Delete,
    /// Cancel any in-progress movement
    StopMoving,
    /// Toggle the sleeping pose
    Sleeping,

    /// Select the actors later actions apply to
    Select { value: String, by: SelectBy },
    /// Spawn a new actor
    Create { id: String, kind: String, location: Location },
    /// Face a point
    Look { target: Location, smooth: bool },
    /// Walk to a point
    Move { target: Location },
    /// Teleport to a point
    Teleport { target: Location },
    /// Set or remove a persistent tag
    Tag { key: String, value: Option<String> },
    /// Set an entity metadata value
    Meta { key: String, value: serde_json::Value },
    /// Play an animation
    Animation { name: String },

    /// Change the viewer set
    Viewer { op: CollectionOp, player: String },
    /// Change the passenger list
    Passenger { op: CollectionOp, unique_id: String },
    /// Attach or detach a controller
    Controller { op: CollectionOp, name: String },

    /// Read (or write, with `value`) a field of the triggering event
    Event { field: String, value: Option<String> },
    /// Run `body` whenever the named event fires
    Listen { event: String, body: String },
    /// Dispatch a command line
    Command { line: String, sender: CommandSender },
    /// Let the triggering event proceed
    Continue,
    /// Test a permission node on the triggering player
    Permission { node: String },
    /// Resolve placeholder text for the triggering player
    Placeholder { text: String },
}

impl ActionNode {
    /// Category this action belongs to
    pub fn category(&self) -> ActionCategory {
        use ActionNode::*;
        match self {
            Log { .. } | Wait { .. } | Js { .. } | Set { .. } | Get { .. } | Run { .. }
            | Check { .. } | Pause | Terminate => ActionCategory::System,
            Respawn | Destroy | Remove | Delete | StopMoving | Sleeping => ActionCategory::State,
            Select { .. } | Create { .. } | Look { .. } | Move { .. } | Teleport { .. }
            | Tag { .. } | Meta { .. } | Animation { .. } => ActionCategory::ParameterizedState,
            Viewer { .. } | Passenger { .. } | Controller { .. } => ActionCategory::Collection,
            Event { .. } | Listen { .. } | Command { .. } | Continue | Permission { .. }
            | Placeholder { .. } => ActionCategory::Host,
        }
    }
}

/// One lexical token of a statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Bare word
    Word(String),
    /// Double-quoted string, unescaped
    Quoted(String),
    /// Raw contents of a `{ ... }` block
    Block(String),
}

impl Token {
    /// Text content regardless of token kind
    pub fn text(&self) -> &str {
        match self {
            Token::Word(s) | Token::Quoted(s) | Token::Block(s) => s,
        }
    }
}

/// Split a statement into tokens
pub fn tokenize(source: &str) -> ParseResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = source.char_indices().peekable();

    while let Some(&(start, ch)) = chars.peek() {
        if ch.is_whitespace() {
            chars.next();
            continue;
        }
        match ch {
            '"' => {
                chars.next();
                let mut text = String::new();
                let mut closed = false;
                while let Some((_, c)) = chars.next() {
                    match c {
                        '\\' => match chars.next() {
                            Some((_, 'n')) => text.push('\n'),
                            Some((_, escaped)) => text.push(escaped),
                            None => break,
                        },
                        '"' => {
                            closed = true;
                            break;
                        }
                        other => text.push(other),
                    }
                }
                if !closed {
                    return Err(ParseError::UnterminatedString);
                }
                tokens.push(Token::Quoted(text));
            }
            '{' => {
                chars.next();
                let mut depth = 1usize;
                let mut end = None;
                let mut in_string = false;
                while let Some((idx, c)) = chars.next() {
                    match c {
                        '\\' if in_string => {
                            chars.next();
                        }
                        '"' => in_string = !in_string,
                        '{' if !in_string => depth += 1,
                        '}' if !in_string => {
                            depth -= 1;
                            if depth == 0 {
                                end = Some(idx);
                                break;
                            }
                        }
                        _ => {}
                    }
                }
                let end = end.ok_or(ParseError::UnterminatedBlock)?;
                tokens.push(Token::Block(source[start + 1..end].trim().to_string()));
            }
            _ => {
                let mut end = source.len();
                while let Some(&(idx, c)) = chars.peek() {
                    if c.is_whitespace() || c == '"' || c == '{' {
                        end = idx;
                        break;
                    }
                    chars.next();
                }
                tokens.push(Token::Word(source[start..end].to_string()));
            }
        }
    }

    Ok(tokens)
}

/// Cursor over a statement's tokens, positioned after the keyword
pub struct TokenStream {
    keyword: String,
    tokens: Vec<Token>,
    index: usize,
}

impl TokenStream {
    /// Wrap the argument tokens of `keyword`
    pub fn new(keyword: impl Into<String>, tokens: Vec<Token>) -> Self {
        Self {
            keyword: keyword.into(),
            tokens,
            index: 0,
        }
    }

    /// Keyword being parsed
    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    /// Next token without consuming it
    pub fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.index)
    }

    /// Whether all tokens were consumed
    pub fn is_empty(&self) -> bool {
        self.index >= self.tokens.len()
    }

    /// Consume the next token of any kind
    pub fn next_token(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.index).cloned();
        if token.is_some() {
            self.index += 1;
        }
        token
    }

    /// Consume the next token's text or fail with `expected`
    pub fn expect(&mut self, expected: &'static str) -> ParseResult<String> {
        self.next_token()
            .map(|t| t.text().to_string())
            .ok_or_else(|| self.missing(expected))
    }

    /// Consume a bare word if it equals `literal` (case-insensitive)
    pub fn accept(&mut self, literal: &str) -> bool {
        match self.peek() {
            Some(Token::Word(word)) if word.eq_ignore_ascii_case(literal) => {
                self.index += 1;
                true
            }
            _ => false,
        }
    }

    /// Consume a bare word that must equal `literal`
    pub fn expect_literal(&mut self, literal: &'static str) -> ParseResult<()> {
        if self.accept(literal) {
            Ok(())
        } else {
            match self.peek() {
                Some(token) => Err(self.invalid(token.text(), format!("expected '{literal}'"))),
                None => Err(self.missing(literal)),
            }
        }
    }

    /// Consume a `{ ... }` block
    pub fn expect_block(&mut self, expected: &'static str) -> ParseResult<String> {
        match self.next_token() {
            Some(Token::Block(body)) => Ok(body),
            Some(other) => Err(self.invalid(other.text(), "expected a { ... } block".into())),
            None => Err(self.missing(expected)),
        }
    }

    /// Join every remaining token's text with single spaces
    pub fn rest(&mut self, expected: &'static str) -> ParseResult<String> {
        if self.is_empty() {
            return Err(self.missing(expected));
        }
        let text = self.tokens[self.index..]
            .iter()
            .map(Token::text)
            .collect::<Vec<_>>()
            .join(" ");
        self.index = self.tokens.len();
        Ok(text)
    }

    /// Consume a `world,x,y,z[,yaw,pitch]` location
    pub fn location(&mut self) -> ParseResult<Location> {
        let text = self.expect("a location (world,x,y,z)")?;
        codec::to_location(&text).map_err(|err| self.invalid(&text, err.to_string()))
    }

    /// Consume `add` or `remove`
    pub fn collection_op(&mut self) -> ParseResult<CollectionOp> {
        let op = self.expect("'add' or 'remove'")?;
        match op.to_ascii_lowercase().as_str() {
            "add" => Ok(CollectionOp::Add),
            "remove" => Ok(CollectionOp::Remove),
            _ => Err(self.invalid(&op, "expected 'add' or 'remove'".into())),
        }
    }

    /// Fail if tokens remain
    pub fn finish(&self) -> ParseResult<()> {
        match self.peek() {
            None => Ok(()),
            Some(token) => Err(ParseError::Trailing {
                keyword: self.keyword.clone(),
                found: token.text().to_string(),
            }),
        }
    }

    /// Missing-argument error for this keyword
    pub fn missing(&self, expected: &'static str) -> ParseError {
        ParseError::MissingArgument {
            keyword: self.keyword.clone(),
            expected,
        }
    }

    /// Invalid-argument error for this keyword
    pub fn invalid(&self, found: &str, reason: String) -> ParseError {
        ParseError::InvalidArgument {
            keyword: self.keyword.clone(),
            found: found.to_string(),
            reason,
        }
    }
}

type ParseFn = dyn Fn(&mut TokenStream) -> ParseResult<ActionNode> + Send + Sync;

/// A registered action parser
#[derive(Clone)]
pub struct ActionParser {
    parse: Arc<ParseFn>,
}

impl ActionParser {
    /// Wrap a parser function
    pub fn new<F>(parse: F) -> Self
    where
        F: Fn(&mut TokenStream) -> ParseResult<ActionNode> + Send + Sync + 'static,
    {
        Self {
            parse: Arc::new(parse),
        }
    }

    /// Parser for a keyword that takes no arguments
    pub fn constant(node: ActionNode) -> Self {
        Self::new(move |_| Ok(node.clone()))
    }

    /// Run the parser over the argument tokens
    pub fn parse(&self, tokens: &mut TokenStream) -> ParseResult<ActionNode> {
        (self.parse)(tokens)
    }
}

/// Action keyword → parser
pub type ActionRegistry = Registry<ActionParser>;

impl Registry<ActionParser> {
    /// Empty action table
    pub fn actions() -> Self {
        Registry::new("action")
    }

    /// Resolve `keyword`, reporting a lookup miss as an error
    pub fn resolve_action(&self, keyword: &str) -> RegistryResult<Arc<ActionParser>> {
        self.resolve(keyword)
            .ok_or_else(|| RegistryError::UnknownAction(keyword.to_string()))
    }

    /// Parse one statement into an action node
    pub fn parse(&self, statement: &str) -> ParseResult<ActionNode> {
        let mut tokens = tokenize(statement)?.into_iter();
        let keyword = match tokens.next() {
            Some(Token::Word(word)) => word,
            Some(other) => {
                return Err(RegistryError::UnknownAction(other.text().to_string()).into());
            }
            None => return Err(ParseError::Empty),
        };
        let parser = self.resolve_action(&keyword)?;
        let mut stream = TokenStream::new(keyword, tokens.collect());
        let node = parser.parse(&mut stream)?;
        stream.finish()?;
        Ok(node)
    }
}

/// Register the built-in action vocabulary
pub fn register_builtin_actions(registry: &ActionRegistry) {
    // system
    registry.register("log", ActionParser::new(parse_log));
    registry.register("wait", ActionParser::new(parse_wait));
    registry.register("js", ActionParser::new(parse_js));
    registry.register("set", ActionParser::new(parse_set));
    registry.register("get", ActionParser::new(parse_get));
    registry.register("run", ActionParser::new(parse_run));
    registry.register("check", ActionParser::new(parse_check));
    registry.register("pause", ActionParser::constant(ActionNode::Pause));
    registry.register("terminate", ActionParser::constant(ActionNode::Terminate));

    // zero-argument state
    registry.register("respawn", ActionParser::constant(ActionNode::Respawn));
    registry.register("destroy", ActionParser::constant(ActionNode::Destroy));
    registry.register("remove", ActionParser::constant(ActionNode::Remove));
    registry.register("delete", ActionParser::constant(ActionNode::Delete));
    registry.register("still", ActionParser::constant(ActionNode::StopMoving));
    registry.register("sleeping", ActionParser::constant(ActionNode::Sleeping));

    // parameterised state
    registry.register("use", ActionParser::new(parse_select));
    registry.register("select", ActionParser::new(parse_select));
    registry.register("create", ActionParser::new(parse_create));
    registry.register("look", ActionParser::new(parse_look));
    registry.register(
        "move",
        ActionParser::new(|t| {
            Ok(ActionNode::Move {
                target: t.location()?,
            })
        }),
    );
    registry.register(
        "teleport",
        ActionParser::new(|t| {
            Ok(ActionNode::Teleport {
                target: t.location()?,
            })
        }),
    );
    registry.register("tag", ActionParser::new(parse_tag));
    registry.register("meta", ActionParser::new(parse_meta));
    registry.register(
        "animation",
        ActionParser::new(|t| {
            Ok(ActionNode::Animation {
                name: t.expect("an animation name")?,
            })
        }),
    );

    // collections
    registry.register(
        "viewer",
        ActionParser::new(|t| {
            Ok(ActionNode::Viewer {
                op: t.collection_op()?,
                player: t.expect("a player name")?,
            })
        }),
    );
    registry.register(
        "passenger",
        ActionParser::new(|t| {
            Ok(ActionNode::Passenger {
                op: t.collection_op()?,
                unique_id: t.expect("an actor unique id")?,
            })
        }),
    );
    registry.register(
        "controller",
        ActionParser::new(|t| {
            Ok(ActionNode::Controller {
                op: t.collection_op()?,
                name: t.expect("a controller name")?,
            })
        }),
    );

    // host
    registry.register("event", ActionParser::new(parse_event));
    registry.register("listen", ActionParser::new(parse_listen));
    registry.register("command", ActionParser::new(parse_command));
    registry.register("continue", ActionParser::constant(ActionNode::Continue));
    registry.register(
        "permission",
        ActionParser::new(|t| {
            Ok(ActionNode::Permission {
                node: t.expect("a permission node")?,
            })
        }),
    );
    registry.register(
        "placeholder",
        ActionParser::new(|t| {
            Ok(ActionNode::Placeholder {
                text: t.rest("placeholder text")?,
            })
        }),
    );
}

fn parse_log(tokens: &mut TokenStream) -> ParseResult<ActionNode> {
    Ok(ActionNode::Log {
        message: tokens.rest("a message")?,
    })
}

fn parse_wait(tokens: &mut TokenStream) -> ParseResult<ActionNode> {
    let raw = tokens.expect("a duration")?;
    let lower = raw.to_ascii_lowercase();
    // Plain numbers are ticks; `s` suffix means seconds at 20 ticks each.
    let (digits, scale) = match lower.strip_suffix('s') {
        Some(seconds) => (seconds, 20),
        None => (lower.strip_suffix('t').unwrap_or(lower.as_str()), 1),
    };
    let ticks = digits
        .parse::<u64>()
        .ok()
        .and_then(|n| n.checked_mul(scale))
        .ok_or_else(|| tokens.invalid(&raw, "expected ticks or seconds (e.g. 20, 5s)".into()))?;
    Ok(ActionNode::Wait { ticks })
}

fn parse_js(tokens: &mut TokenStream) -> ParseResult<ActionNode> {
    let source = match tokens.peek() {
        Some(Token::Block(_)) => tokens.expect_block("a code block")?,
        _ => tokens.expect("code")?,
    };
    Ok(ActionNode::Js { source })
}

fn parse_set(tokens: &mut TokenStream) -> ParseResult<ActionNode> {
    let variable = tokens.expect("a variable name")?;
    tokens.expect_literal("to")?;
    let value = tokens.rest("a value")?;
    Ok(ActionNode::Set { variable, value })
}

fn parse_get(tokens: &mut TokenStream) -> ParseResult<ActionNode> {
    Ok(ActionNode::Get {
        variable: tokens.expect("a variable name")?,
    })
}

fn parse_run(tokens: &mut TokenStream) -> ParseResult<ActionNode> {
    Ok(ActionNode::Run {
        script: tokens.expect("a script name")?,
    })
}

fn parse_check(tokens: &mut TokenStream) -> ParseResult<ActionNode> {
    let left = tokens.expect("a value")?;
    let raw_op = tokens.expect("a comparison operator")?;
    let op = CompareOp::parse(&raw_op)
        .ok_or_else(|| tokens.invalid(&raw_op, "expected ==, !=, >, >=, <, <=, is or not".into()))?;
    let right = tokens.expect("a value")?;
    Ok(ActionNode::Check { left, op, right })
}

fn parse_select(tokens: &mut TokenStream) -> ParseResult<ActionNode> {
    let value = tokens.expect("an actor id")?;
    let by = if tokens.accept("by") {
        let key = tokens.expect("'id' or 'uniqueId'")?;
        match key.to_ascii_lowercase().as_str() {
            "id" => SelectBy::Id,
            "uniqueid" | "uuid" => SelectBy::UniqueId,
            _ => return Err(tokens.invalid(&key, "expected 'id' or 'uniqueId'".into())),
        }
    } else {
        SelectBy::Id
    };
    Ok(ActionNode::Select { value, by })
}

fn parse_create(tokens: &mut TokenStream) -> ParseResult<ActionNode> {
    let id = tokens.expect("an actor id")?;
    let kind = tokens.expect("an entity type")?;
    let location = tokens.location()?;
    Ok(ActionNode::Create { id, kind, location })
}

fn parse_look(tokens: &mut TokenStream) -> ParseResult<ActionNode> {
    let smooth = tokens.accept("smooth");
    Ok(ActionNode::Look {
        target: tokens.location()?,
        smooth,
    })
}

fn parse_tag(tokens: &mut TokenStream) -> ParseResult<ActionNode> {
    let op = tokens.expect("'set' or 'remove'")?;
    match op.to_ascii_lowercase().as_str() {
        "set" => {
            let key = tokens.expect("a tag key")?;
            tokens.accept("to");
            let value = tokens.expect("a tag value")?;
            Ok(ActionNode::Tag {
                key,
                value: Some(value),
            })
        }
        "remove" => Ok(ActionNode::Tag {
            key: tokens.expect("a tag key")?,
            value: None,
        }),
        _ => Err(tokens.invalid(&op, "expected 'set' or 'remove'".into())),
    }
}

fn parse_meta(tokens: &mut TokenStream) -> ParseResult<ActionNode> {
    let key = tokens.expect("a metadata key")?;
    tokens.accept("to");
    let value = match tokens.next_token() {
        Some(Token::Word(word)) => {
            serde_json::from_str(&word).unwrap_or(serde_json::Value::String(word))
        }
        Some(other) => serde_json::Value::String(other.text().to_string()),
        None => return Err(tokens.missing("a metadata value")),
    };
    Ok(ActionNode::Meta { key, value })
}

fn parse_event(tokens: &mut TokenStream) -> ParseResult<ActionNode> {
    let field = tokens.expect("an event field")?;
    let value = if tokens.accept("to") {
        Some(tokens.rest("a value")?)
    } else {
        None
    };
    Ok(ActionNode::Event { field, value })
}

fn parse_listen(tokens: &mut TokenStream) -> ParseResult<ActionNode> {
    let event = tokens.expect("an event name")?;
    let body = tokens.expect_block("a { ... } body")?;
    Ok(ActionNode::Listen { event, body })
}

fn parse_command(tokens: &mut TokenStream) -> ParseResult<ActionNode> {
    let line = tokens.expect("a command line")?;
    let sender = if tokens.accept("as") {
        let who = tokens.expect("'player', 'op' or 'console'")?;
        match who.to_ascii_lowercase().as_str() {
            "player" => CommandSender::Player,
            "op" | "operator" => CommandSender::Operator,
            "console" | "server" => CommandSender::Console,
            _ => return Err(tokens.invalid(&who, "expected 'player', 'op' or 'console'".into())),
        }
    } else {
        CommandSender::Player
    };
    Ok(ActionNode::Command { line, sender })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn registry() -> ActionRegistry {
        let registry = ActionRegistry::actions();
        register_builtin_actions(&registry);
        registry
    }

    #[test]
    fn tokenizer_handles_quotes_and_blocks() {
        let tokens = tokenize(r#"listen chat { log "a \"b\" {c}" }"#).unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Word("listen".into()),
                Token::Word("chat".into()),
                Token::Block(r#"log "a \"b\" {c}""#.into()),
            ]
        );
        assert_eq!(tokenize(r#"log "open"#), Err(ParseError::UnterminatedString));
        assert_eq!(tokenize("js { x"), Err(ParseError::UnterminatedBlock));
    }

    #[test]
    fn every_category_is_populated() {
        let registry = registry();
        let samples = [
            "log hi",
            "wait 5s",
            "pause",
            "still",
            "delete",
            "move world,1,2,3",
            "tag set role guard",
            "viewer add alex",
            "controller remove Gravity",
            "continue",
            "permission admin.use",
        ];
        let categories: HashSet<_> = samples
            .iter()
            .map(|s| registry.parse(s).unwrap().category())
            .collect();
        assert_eq!(categories.len(), 5);
    }

    #[test]
    fn keywords_are_case_insensitive() {
        let registry = registry();
        assert_eq!(registry.parse("TERMINATE").unwrap(), ActionNode::Terminate);
        assert_eq!(registry.parse("Still").unwrap(), ActionNode::StopMoving);
    }

    #[test]
    fn unknown_keyword_names_the_keyword() {
        let err = registry().parse("fly world,0,0,0").unwrap_err();
        assert_eq!(
            err,
            ParseError::Unknown(RegistryError::UnknownAction("fly".into()))
        );
        assert_eq!(registry().parse("   "), Err(ParseError::Empty));
    }

    #[test]
    fn parameterised_actions_parse_arguments() {
        let registry = registry();
        assert_eq!(
            registry.parse("create guard villager world,1.5,64,3").unwrap(),
            ActionNode::Create {
                id: "guard".into(),
                kind: "villager".into(),
                location: Location::new("world", 1.5, 64.0, 3.0),
            }
        );
        assert_eq!(
            registry.parse("select abc by uniqueId").unwrap(),
            ActionNode::Select {
                value: "abc".into(),
                by: SelectBy::UniqueId
            }
        );
        assert_eq!(
            registry.parse("wait 3s").unwrap(),
            ActionNode::Wait { ticks: 60 }
        );
        assert_eq!(
            registry.parse("meta glowing to true").unwrap(),
            ActionNode::Meta {
                key: "glowing".into(),
                value: serde_json::Value::Bool(true)
            }
        );
        assert_eq!(
            registry.parse(r#"command "say hi" as console"#).unwrap(),
            ActionNode::Command {
                line: "say hi".into(),
                sender: CommandSender::Console
            }
        );
    }

    #[test]
    fn malformed_arguments_are_rejected() {
        let registry = registry();
        assert!(matches!(
            registry.parse("move world,abc"),
            Err(ParseError::InvalidArgument { .. })
        ));
        assert!(matches!(
            registry.parse("viewer toggle alex"),
            Err(ParseError::InvalidArgument { .. })
        ));
        assert!(matches!(
            registry.parse("set x"),
            Err(ParseError::MissingArgument { .. })
        ));
        assert!(matches!(
            registry.parse("pause now"),
            Err(ParseError::Trailing { .. })
        ));
    }

    #[test]
    fn late_registered_action_is_resolvable() {
        let registry = registry();
        registry.register(
            "shout",
            ActionParser::new(|t| {
                Ok(ActionNode::Log {
                    message: t.rest("a message")?.to_uppercase(),
                })
            }),
        );
        assert_eq!(
            registry.parse("SHOUT hello").unwrap(),
            ActionNode::Log {
                message: "HELLO".into()
            }
        );
    }
}
