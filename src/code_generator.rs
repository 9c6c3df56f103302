use std::ops::Range;

use crate::error::{PromoError, Result};

/// Prefixes the original scan walked, in declared order.
pub const DEFAULT_PREFIXES: [&str; 6] = ["AS23", "CS23", "AS24", "CS24", "AS25", "CS25"];
pub const DEFAULT_RANGE: Range<u32> = 0..100;
pub const DEFAULT_WIDTH: usize = 2;

const MAX_WIDTH: usize = 10;

/// The bounded set of candidate codes: every prefix crossed with a half-open
/// numeric range, zero padded to `width`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeSpace {
    prefixes: Vec<String>,
    numbers: Range<u32>,
    width: usize,
}

/// A place in the prefix-major ordering. `prefix_idx == prefixes.len()`
/// means past the end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Position {
    prefix_idx: usize,
    number: u32,
}

impl Default for CodeSpace {
    fn default() -> Self {
        CodeSpace {
            prefixes: DEFAULT_PREFIXES.iter().map(|p| p.to_string()).collect(),
            numbers: DEFAULT_RANGE,
            width: DEFAULT_WIDTH,
        }
    }
}

impl CodeSpace {
    pub fn new(prefixes: Vec<String>, numbers: Range<u32>, width: usize) -> Result<Self> {
        if prefixes.is_empty() {
            return Err(PromoError::invalid_argument("at least one prefix is required"));
        }
        for prefix in &prefixes {
            let starts_alpha = prefix.chars().next().map_or(false, |c| c.is_ascii_alphabetic());
            if !starts_alpha || !prefix.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(PromoError::invalid_argument(format!(
                    "prefix '{}' must start with a letter and contain only letters and digits",
                    prefix
                )));
            }
        }
        if numbers.start >= numbers.end {
            return Err(PromoError::invalid_argument(format!(
                "numeric range {}..{} is empty",
                numbers.start, numbers.end
            )));
        }
        if width > MAX_WIDTH {
            return Err(PromoError::invalid_argument(format!(
                "width {} exceeds the maximum of {}",
                width, MAX_WIDTH
            )));
        }
        Ok(CodeSpace { prefixes, numbers, width })
    }

    pub fn total(&self) -> usize {
        self.prefixes.len() * self.range_len()
    }

    pub fn format_code(&self, prefix: &str, number: u32) -> String {
        format!("{}{:0width$}", prefix, number, width = self.width)
    }

    /// Checks that `code` has the `<declared prefix><digits>` shape, without
    /// requiring it to fall inside the numeric range.
    pub fn validate_code(&self, code: &str) -> Result<()> {
        self.locate(code).map(|_| ())
    }

    /// Every code in declared order.
    pub fn codes(&self) -> CodeGenerator {
        self.generator_at(self.first_position(), None)
    }

    /// Codes at or after `start_from` in declared order, stopping after
    /// `max_codes` when given.
    pub fn generate(&self, start_from: Option<&str>, max_codes: Option<usize>) -> Result<CodeGenerator> {
        let start = match start_from {
            Some(code) => self.locate(code)?,
            None => self.first_position(),
        };
        Ok(self.generator_at(start, max_codes))
    }

    fn range_len(&self) -> usize {
        (self.numbers.end - self.numbers.start) as usize
    }

    fn first_position(&self) -> Position {
        Position {
            prefix_idx: 0,
            number: self.numbers.start,
        }
    }

    fn generator_at(&self, start: Position, max_codes: Option<usize>) -> CodeGenerator {
        let start = self.normalize(start);
        let available = self.remaining_from(start);
        CodeGenerator {
            space: self.clone(),
            position: start,
            remaining: max_codes.map_or(available, |max| max.min(available)),
        }
    }

    /// Splits a code into its prefix and number. The longest matching prefix
    /// wins so overlapping prefixes such as `AS` and `AS23` stay unambiguous.
    fn locate(&self, code: &str) -> Result<Position> {
        let code = code.trim();
        let mut best: Option<(usize, &str)> = None;
        for (idx, prefix) in self.prefixes.iter().enumerate() {
            if let Some(rest) = code.strip_prefix(prefix.as_str()) {
                let is_longer = best.map_or(true, |(b, _)| prefix.len() > self.prefixes[b].len());
                if !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()) && is_longer {
                    best = Some((idx, rest));
                }
            }
        }

        let (prefix_idx, digits) = best.ok_or_else(|| {
            PromoError::invalid_argument(format!(
                "start code '{}' is not a declared prefix ({}) followed by digits",
                code,
                self.prefixes.join(", ")
            ))
        })?;

        // Anything that does not fit a u32 sorts after the end of the range.
        let number = digits.parse::<u64>().unwrap_or(u64::MAX);
        let number = u32::try_from(number).unwrap_or(u32::MAX);
        Ok(Position { prefix_idx, number })
    }

    fn normalize(&self, pos: Position) -> Position {
        if pos.prefix_idx >= self.prefixes.len() {
            return Position {
                prefix_idx: self.prefixes.len(),
                number: self.numbers.start,
            };
        }
        if pos.number < self.numbers.start {
            return Position {
                prefix_idx: pos.prefix_idx,
                number: self.numbers.start,
            };
        }
        if pos.number >= self.numbers.end {
            // Nothing left under this prefix, fall through to the next one.
            return self.normalize(Position {
                prefix_idx: pos.prefix_idx + 1,
                number: self.numbers.start,
            });
        }
        pos
    }

    fn remaining_from(&self, pos: Position) -> usize {
        if pos.prefix_idx >= self.prefixes.len() {
            return 0;
        }
        let later_prefixes = self.prefixes.len() - pos.prefix_idx - 1;
        later_prefixes * self.range_len() + (self.numbers.end - pos.number) as usize
    }
}

/// Lazy, finite walk over a `CodeSpace`. Cloning it yields an independent
/// walk from the same point.
#[derive(Debug, Clone)]
pub struct CodeGenerator {
    space: CodeSpace,
    position: Position,
    remaining: usize,
}

impl Iterator for CodeGenerator {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if self.remaining == 0 || self.position.prefix_idx >= self.space.prefixes.len() {
            return None;
        }

        let code = self
            .space
            .format_code(&self.space.prefixes[self.position.prefix_idx], self.position.number);
        self.remaining -= 1;
        self.position = self.space.normalize(Position {
            prefix_idx: self.position.prefix_idx,
            number: self.position.number + 1,
        });
        Some(code)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for CodeGenerator {}
