//! ISO-6709 style location string parsing.

use regex::Regex;

/// Parses geographic point locations in ISO-6709 style, e.g.
/// `"+35.658632+139.745411/"`.
///
/// Only the first coordinate pair is honored; trailing altitude or range
/// data is ignored. Malformed input yields `None`, never an error.
pub struct LocationParser {
    pattern: Regex,
}

impl LocationParser {
    /// Create a parser.
    pub fn new() -> Self {
        // The pattern is a fixed literal, so compilation cannot fail.
        let pattern =
            Regex::new(r"([+-][0-9.]+)([+-][0-9.]+)").expect("hard-coded pattern compiles");
        Self { pattern }
    }

    /// Parse `location` into `(latitude, longitude)` degrees.
    pub fn parse(&self, location: &str) -> Option<(f32, f32)> {
        let captures = self.pattern.captures(location)?;
        let latitude: f32 = captures.get(1)?.as_str().parse().ok()?;
        let longitude: f32 = captures.get(2)?.as_str().parse().ok()?;
        Some((latitude, longitude))
    }
}

impl Default for LocationParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_standard_location() {
        let parser = LocationParser::new();
        assert_eq!(
            parser.parse("+35.658632+139.745411/"),
            Some((35.658632, 139.745411))
        );
    }

    #[test]
    fn test_parse_integer_degrees() {
        let parser = LocationParser::new();
        assert_eq!(parser.parse("-90+000+2800/"), Some((-90.0, 0.0)));
    }

    #[test]
    fn test_only_first_pair_is_honored() {
        let parser = LocationParser::new();
        assert_eq!(
            parser.parse("+35.331+134.224/+35.336+134.228/"),
            Some((35.331, 134.224))
        );
    }

    #[test]
    fn test_malformed_yields_none() {
        let parser = LocationParser::new();
        assert_eq!(parser.parse(""), None);
        assert_eq!(parser.parse("+35.658632"), None);
        assert_eq!(parser.parse("35.658632 139.745411"), None);
        assert_eq!(parser.parse("somewhere in Tokyo"), None);
    }

    #[test]
    fn test_unparsable_numbers_yield_none() {
        let parser = LocationParser::new();
        // Matches the grammar but is not a number.
        assert_eq!(parser.parse("+..+.."), None);
    }
}
