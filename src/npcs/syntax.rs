//! Pest front end for schedule scripts.
//!
//! Turns raw script text into a list of `Command`s. Meaning (times, maps,
//! directives) is applied later by the interpreter.

use std::str::FromStr;

use pest::error::LineColLocation;
use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser as PestParser;

#[derive(PestParser)]
#[grammar = "src/npcs/schedule.pest"]
struct ScriptParser;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyntaxError {
    #[error("{message} at column {column}")]
    Pest { message: String, column: usize },
    #[error("number '{0}' out of range")]
    Number(String),
    #[error("unexpected grammar shape: {0}")]
    Shape(&'static str),
}

impl From<pest::error::Error<Rule>> for SyntaxError {
    fn from(err: pest::error::Error<Rule>) -> Self {
        let column = match err.line_col {
            LineColLocation::Pos((_, col)) | LineColLocation::Span((_, col), _) => col,
        };
        SyntaxError::Pest {
            message: err.variant.message().into_owned(),
            column,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Coords {
    pub x: i32,
    pub y: i32,
    pub facing: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location<'s> {
    Bed,
    Map { name: &'s str, coords: Option<Coords> },
}

/// `[a]<time> <location> [<behavior>] ["<message>"]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopCommand<'s> {
    /// Source text, for error reports.
    pub text: &'s str,
    pub arrival_tagged: bool,
    pub time: u16,
    pub location: Location<'s>,
    pub behavior: Option<&'s str>,
    pub message: Option<&'s str>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command<'s> {
    Goto(&'s str),
    NotFriendship(Vec<(&'s str, u32)>),
    Mail(&'s str),
    Stop(StopCommand<'s>),
}

impl Command<'_> {
    pub fn is_directive(&self) -> bool {
        !matches!(self, Command::Stop(_))
    }
}

pub fn parse_script(source: &str) -> Result<Vec<Command<'_>>, SyntaxError> {
    let script = ScriptParser::parse(Rule::script, source)?
        .next()
        .ok_or(SyntaxError::Shape("expected script"))?;
    script
        .into_inner()
        .filter(|pair| pair.as_rule() == Rule::command)
        .map(command)
        .collect()
}

/// Parse a `<Location>_Replacement` value: `(map, coords)`.
pub fn parse_replacement(source: &str) -> Result<(&str, Coords), SyntaxError> {
    let replacement = ScriptParser::parse(Rule::replacement, source)?
        .next()
        .ok_or(SyntaxError::Shape("expected replacement"))?;
    let mut inner = replacement.into_inner();
    let map = inner.next().ok_or(SyntaxError::Shape("expected map name"))?.as_str();
    let coords = coords(inner.next().ok_or(SyntaxError::Shape("expected coordinates"))?)?;
    Ok((map, coords))
}

fn number<T: FromStr>(text: &str) -> Result<T, SyntaxError> {
    text.parse().map_err(|_| SyntaxError::Number(text.to_string()))
}

fn first_str<'s>(pair: Pair<'s, Rule>, what: &'static str) -> Result<&'s str, SyntaxError> {
    pair.into_inner()
        .next()
        .map(|p| p.as_str())
        .ok_or(SyntaxError::Shape(what))
}

fn command(pair: Pair<'_, Rule>) -> Result<Command<'_>, SyntaxError> {
    let text = pair.as_str().trim();
    let inner = pair.into_inner().next().ok_or(SyntaxError::Shape("empty command"))?;
    match inner.as_rule() {
        Rule::goto => first_str(inner, "GOTO needs a key").map(Command::Goto),
        Rule::mail => first_str(inner, "MAIL needs an id").map(Command::Mail),
        Rule::not_friendship => inner
            .into_inner()
            .map(friendship_pair)
            .collect::<Result<Vec<_>, _>>()
            .map(Command::NotFriendship),
        Rule::stop => stop(text, inner).map(Command::Stop),
        _ => Err(SyntaxError::Shape("unknown command")),
    }
}

fn friendship_pair(pair: Pair<'_, Rule>) -> Result<(&str, u32), SyntaxError> {
    let mut inner = pair.into_inner();
    let npc = inner.next().ok_or(SyntaxError::Shape("expected npc"))?.as_str();
    let points = inner.next().ok_or(SyntaxError::Shape("expected friendship level"))?;
    Ok((npc, number(points.as_str())?))
}

fn stop<'s>(text: &'s str, pair: Pair<'s, Rule>) -> Result<StopCommand<'s>, SyntaxError> {
    let mut cmd = StopCommand {
        text,
        arrival_tagged: false,
        time: 0,
        location: Location::Bed,
        behavior: None,
        message: None,
    };
    for part in pair.into_inner() {
        match part.as_rule() {
            Rule::time => {
                for piece in part.into_inner() {
                    match piece.as_rule() {
                        Rule::arrival_mark => cmd.arrival_tagged = true,
                        Rule::digits => cmd.time = number(piece.as_str())?,
                        _ => {}
                    }
                }
            }
            Rule::bed => cmd.location = Location::Bed,
            Rule::map_ref => {
                let mut inner = part.into_inner();
                let name = inner.next().ok_or(SyntaxError::Shape("expected map name"))?.as_str();
                let coords = inner.next().map(coords).transpose()?;
                cmd.location = Location::Map { name, coords };
            }
            Rule::behavior => cmd.behavior = Some(part.as_str()),
            Rule::message => cmd.message = Some(part.into_inner().next().map_or("", |p| p.as_str())),
            _ => {}
        }
    }
    Ok(cmd)
}

fn coords(pair: Pair<'_, Rule>) -> Result<Coords, SyntaxError> {
    let values = pair
        .into_inner()
        .map(|p| number::<i32>(p.as_str()))
        .collect::<Result<Vec<_>, _>>()?;
    match values.as_slice() {
        [x, y] => Ok(Coords { x: *x, y: *y, facing: None }),
        [x, y, facing] => Ok(Coords {
            x: *x,
            y: *y,
            facing: Some(*facing),
        }),
        _ => Err(SyntaxError::Shape("expected two or three coordinates")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stop_at<'a, 's>(commands: &'a [Command<'s>], index: usize) -> &'a StopCommand<'s> {
        match &commands[index] {
            Command::Stop(stop) => stop,
            other => panic!("expected a stop, got {:?}", other),
        }
    }

    #[test]
    fn test_quoted_message_keeps_spaces_and_slashes_split_commands() {
        let commands = parse_script(r#"1000 Town 10 10 0 "Hello there, farmer"/2200 bed"#).unwrap();
        assert_eq!(commands.len(), 2);
        let stop = stop_at(&commands, 0);
        assert_eq!(stop.time, 1000);
        assert_eq!(
            stop.location,
            Location::Map {
                name: "Town",
                coords: Some(Coords { x: 10, y: 10, facing: Some(0) })
            }
        );
        assert_eq!(stop.message, Some("Hello there, farmer"));
        assert_eq!(stop.behavior, None);
        assert_eq!(stop_at(&commands, 1).location, Location::Bed);
    }

    #[test]
    fn test_arrival_mark_and_behavior() {
        let commands = parse_script("a1800 Beach 8 8 2 fish").unwrap();
        let stop = stop_at(&commands, 0);
        assert!(stop.arrival_tagged);
        assert_eq!(stop.time, 1800);
        assert_eq!(stop.behavior, Some("fish"));
    }

    #[test]
    fn test_directives() {
        let commands = parse_script("NOT friendship old_tom 300 lily 500/GOTO spring/MAIL ccDone").unwrap();
        assert_eq!(
            commands,
            vec![
                Command::NotFriendship(vec![("old_tom", 300), ("lily", 500)]),
                Command::Goto("spring"),
                Command::Mail("ccDone"),
            ]
        );
        assert!(commands.iter().all(Command::is_directive));
    }

    #[test]
    fn test_missing_coordinates_still_parse() {
        // The interpreter decides whether a bare map name is allowed.
        let commands = parse_script("900 Town").unwrap();
        assert_eq!(stop_at(&commands, 0).location, Location::Map { name: "Town", coords: None });
    }

    #[test]
    fn test_empty_commands_are_skipped() {
        assert_eq!(parse_script("/900 Town 1 1//1000 Town 2 2/").unwrap().len(), 2);
        assert!(parse_script("").unwrap().is_empty());
    }

    #[test]
    fn test_syntax_errors() {
        for bad in [
            r#"1000 Town 1 1 "oops"#,
            "9x0 Town 1 1",
            "NOT friendship old_tom",
            "NOT romance old_tom 300",
            "900 Town 1 1 read extra",
            "GOTO",
        ] {
            assert!(
                matches!(parse_script(bad), Err(SyntaxError::Pest { .. })),
                "{} should not parse",
                bad
            );
        }
        assert!(matches!(parse_script("99999 Town 1 1"), Err(SyntaxError::Number(_))));
    }

    #[test]
    fn test_replacement_value() {
        assert_eq!(
            parse_replacement("Town 30 6 2").unwrap(),
            ("Town", Coords { x: 30, y: 6, facing: Some(2) })
        );
        assert!(parse_replacement("Town 30").is_err());
    }
}
