// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Parser for `acpi_call` result text.
//!
//! The module renders integers as `0x1f`, strings as `"text"`, buffers as
//! `{0x01, 0x02}` and packages as `[elem, elem]`. Failures are reported as
//! `Error: AE_<STATUS>`.

use generation_id_guest::resolver::EvaluateError;
use generation_id_guest::AcpiObject;

const ERROR_PREFIX: &str = "Error: ";
const NOT_FOUND: &str = "AE_NOT_FOUND";

/// Parses the text returned by `acpi_call` into an object.
pub fn parse_reply(reply: &str) -> Result<AcpiObject, EvaluateError> {
    let reply = reply.trim();
    if let Some(status) = reply.strip_prefix(ERROR_PREFIX) {
        let status = status.trim();
        return Err(if status == NOT_FOUND {
            EvaluateError::MissingMethod
        } else {
            EvaluateError::Firmware(status.to_owned())
        });
    }

    let mut parser = Parser { rest: reply };
    match parser.object() {
        Some(object) if parser.rest.trim().is_empty() => Ok(object),
        _ => Err(EvaluateError::InvalidResult(reply.to_owned())),
    }
}

struct Parser<'a> {
    rest: &'a str,
}

impl Parser<'_> {
    fn object(&mut self) -> Option<AcpiObject> {
        self.skip_whitespace();
        match self.rest.chars().next()? {
            '[' => {
                self.rest = &self.rest[1..];
                self.list(']', Self::object).map(AcpiObject::Package)
            }
            '{' => {
                self.rest = &self.rest[1..];
                self.list('}', |p| p.integer().and_then(|v| u8::try_from(v).ok()))
                    .map(AcpiObject::Buffer)
            }
            '"' => {
                let (s, rest) = self.rest[1..].split_once('"')?;
                self.rest = rest;
                Some(AcpiObject::String(s.to_owned()))
            }
            _ => self.integer().map(AcpiObject::Integer),
        }
    }

    /// Parses comma-separated items up to and including `close`.
    fn list<T>(&mut self, close: char, mut item: impl FnMut(&mut Self) -> Option<T>) -> Option<Vec<T>> {
        let mut items = Vec::new();
        if self.eat(close) {
            return Some(items);
        }
        loop {
            items.push(item(self)?);
            if self.eat(close) {
                return Some(items);
            }
            if !self.eat(',') {
                return None;
            }
        }
    }

    fn integer(&mut self) -> Option<u64> {
        self.skip_whitespace();
        let digits = self.rest.strip_prefix("0x")?;
        let len = digits
            .find(|c: char| !c.is_ascii_hexdigit())
            .unwrap_or(digits.len());
        let value = u64::from_str_radix(&digits[..len], 16).ok()?;
        self.rest = &digits[len..];
        Some(value)
    }

    fn eat(&mut self, c: char) -> bool {
        self.skip_whitespace();
        if let Some(rest) = self.rest.strip_prefix(c) {
            self.rest = rest;
            true
        } else {
            false
        }
    }

    fn skip_whitespace(&mut self) {
        self.rest = self.rest.trim_start();
    }
}
