// Copyright (C) 2025  Tom Waddington
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published
// by the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Script parser for hidcast payload files
//!
//! One instruction per line, call syntax:
//! - `layout('us')`
//! - `press("GUI r")`
//! - `type("text\n")`
//! - `delay(100)`
//! - `//` comments, whole-line or trailing

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::tag,
    character::complete::{char, not_line_ending, space0},
    combinator::{map, value},
    error::{Error, ErrorKind},
};

use crate::error::ParseError;
use crate::types::{Instruction, Script};

/// A single- or double-quoted string literal. Recognized escapes are
/// `\n`, `\r`, `\t`, `\\`, `\"`, `\'`; anything else after a backslash
/// passes through verbatim.
fn parse_quoted(input: &str) -> IResult<&str, String> {
    let mut chars = input.char_indices();
    let quote = match chars.next() {
        Some((_, c @ ('"' | '\''))) => c,
        _ => return Err(nom::Err::Error(Error::new(input, ErrorKind::Char))),
    };

    let mut text = String::new();
    let mut escaped = false;

    for (i, c) in chars {
        if escaped {
            match c {
                'n' => text.push('\n'),
                'r' => text.push('\r'),
                't' => text.push('\t'),
                '\\' | '"' | '\'' => text.push(c),
                other => {
                    text.push('\\');
                    text.push(other);
                }
            }
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == quote {
            return Ok((&input[i + c.len_utf8()..], text));
        } else {
            text.push(c);
        }
    }

    // Unterminated literal
    Err(nom::Err::Error(Error::new(input, ErrorKind::Char)))
}

fn open_paren(input: &str) -> IResult<&str, ()> {
    let (input, _) = space0(input)?;
    let (input, _) = char('(')(input)?;
    let (input, _) = space0(input)?;
    Ok((input, ()))
}

fn close_paren(input: &str) -> IResult<&str, ()> {
    let (input, _) = space0(input)?;
    let (input, _) = char(')')(input)?;
    Ok((input, ()))
}

fn parse_layout(input: &str) -> IResult<&str, Instruction> {
    let (input, _) = tag("layout")(input)?;
    let (input, _) = open_paren(input)?;
    let (input, code) = parse_quoted(input)?;
    let (input, _) = close_paren(input)?;
    Ok((input, Instruction::SetLayout(code)))
}

fn parse_press(input: &str) -> IResult<&str, Instruction> {
    let (input, _) = tag("press")(input)?;
    let (input, _) = open_paren(input)?;
    let (input, combo) = parse_quoted(input)?;
    let (input, _) = close_paren(input)?;
    Ok((input, Instruction::Press(combo)))
}

fn parse_type(input: &str) -> IResult<&str, Instruction> {
    let (input, _) = tag("type")(input)?;
    let (input, _) = open_paren(input)?;
    let (input, text) = parse_quoted(input)?;
    let (input, _) = close_paren(input)?;
    Ok((input, Instruction::Type(text)))
}

fn parse_delay(input: &str) -> IResult<&str, Instruction> {
    let (input, _) = tag("delay")(input)?;
    let (input, _) = open_paren(input)?;
    // Signed so that a negative delay parses and fails at playback
    let (input, ms) = nom::character::complete::i64(input)?;
    let (input, _) = close_paren(input)?;
    Ok((input, Instruction::Delay(ms)))
}

fn parse_instruction(input: &str) -> IResult<&str, Instruction> {
    alt((parse_layout, parse_press, parse_type, parse_delay)).parse(input)
}

fn parse_comment(input: &str) -> IResult<&str, ()> {
    let (input, _) = tag("//")(input)?;
    let (input, _) = not_line_ending(input)?;
    Ok((input, ()))
}

fn parse_line(input: &str) -> IResult<&str, Option<Instruction>> {
    alt((map(parse_instruction, Some), value(None, parse_comment))).parse(input)
}

pub fn parse_script(input: &str) -> Result<Script, ParseError> {
    let mut instructions = Vec::new();

    for (line_num, line) in input.lines().enumerate() {
        let trimmed = line.trim();

        if trimmed.is_empty() {
            continue;
        }

        match parse_line(trimmed) {
            Ok((remaining, instruction)) => {
                let rest = remaining.trim_start();
                if !rest.is_empty() && !rest.starts_with("//") {
                    return Err(ParseError {
                        line: line_num + 1,
                        message: format!("unexpected text after instruction: '{rest}'"),
                    });
                }
                if let Some(instruction) = instruction {
                    instructions.push(instruction);
                }
            }
            Err(e) => {
                return Err(ParseError {
                    line: line_num + 1,
                    message: format!("not a valid instruction: {e}"),
                });
            }
        }
    }

    Ok(Script { instructions })
}
