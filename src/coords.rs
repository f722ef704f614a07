//! KML coordinate-string parsing.
//!
//! Grounded on the coordinate splitting in `meridian-io`'s KML reader
//! (comma-separated lon,lat[,alt] tokens, whitespace-separated tuples), but
//! tightened: the distilled spec requires whitespace tolerance around each
//! comma-separated token, rejection of non-finite values, and both ASCII
//! space and newline as tuple separators.

use crate::error::{KmlStreamError, Result};
use crate::geometry::{Line, Point};

/// Parses a single `lon,lat[,alt]` coordinate tuple.
///
/// Surrounding whitespace is trimmed before splitting on comma; each token is
/// trimmed again before being parsed as `f64`. Fails unless the split yields
/// exactly 2 or 3 tokens and every token parses to a finite number.
pub fn parse_point(s: &str) -> Result<Point> {
    let trimmed = s.trim();
    let tokens: Vec<&str> = trimmed.split(',').collect();
    if tokens.len() != 2 && tokens.len() != 3 {
        return Err(KmlStreamError::InvalidPoint(s.to_string()));
    }

    let parse_finite = |tok: &str| -> Option<f64> {
        let v: f64 = tok.trim().parse().ok()?;
        v.is_finite().then_some(v)
    };

    let x = parse_finite(tokens[0]).ok_or_else(|| KmlStreamError::InvalidPoint(s.to_string()))?;
    let y = parse_finite(tokens[1]).ok_or_else(|| KmlStreamError::InvalidPoint(s.to_string()))?;
    let z = match tokens.get(2) {
        Some(tok) => Some(parse_finite(tok).ok_or_else(|| KmlStreamError::InvalidPoint(s.to_string()))?),
        None => None,
    };

    Ok(Point::new(x, y, z))
}

/// Parses a whitespace-separated sequence of coordinate tuples into a `Line`.
///
/// Splits on ASCII space and newline, discarding empty tokens produced by
/// runs of separators. Short-circuits on the first malformed tuple. Empty
/// input yields a `Line` with zero points; whether that is acceptable is
/// left to the caller (it is, for every exit handler that calls this).
pub fn parse_line(s: &str) -> Result<Line> {
    let mut points = Vec::new();
    for token in s.split(|c: char| c == ' ' || c == '\n') {
        if token.is_empty() {
            continue;
        }
        match parse_point(token) {
            Ok(p) => points.push(p),
            Err(e) => return Err(KmlStreamError::InvalidLine(Box::new(e))),
        }
    }
    Ok(Line::new(points))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_2d_point() {
        let p = parse_point("1.0,2.0").unwrap();
        assert_eq!(p.x, 1.0);
        assert_eq!(p.y, 2.0);
        assert!(p.z.is_none());
    }

    #[test]
    fn parses_3d_point() {
        let p = parse_point("1,2,3").unwrap();
        assert_eq!(p.z, Some(3.0));
    }

    #[test]
    fn tolerates_surrounding_and_token_whitespace() {
        let p = parse_point("  1.5 , 2.5  ").unwrap();
        assert_eq!(p.x, 1.5);
        assert_eq!(p.y, 2.5);
    }

    #[test]
    fn rejects_wrong_token_count() {
        assert!(parse_point("1").is_err());
        assert!(parse_point("1,2,3,4").is_err());
    }

    #[test]
    fn rejects_non_numeric_token() {
        assert!(parse_point("1,nope").is_err());
    }

    #[test]
    fn rejects_non_finite_token() {
        assert!(parse_point("1,inf").is_err());
        assert!(parse_point("1,NaN").is_err());
    }

    #[test]
    fn parses_space_and_newline_separated_line() {
        let l = parse_line("0,0 10,0\n10,10 0,10 0,0").unwrap();
        assert_eq!(l.points.len(), 5);
        assert_eq!(l.points[2].x, 10.0);
        assert_eq!(l.points[2].y, 10.0);
    }

    #[test]
    fn collapses_repeated_separators() {
        let l = parse_line("0,0   10,0\n\n10,10").unwrap();
        assert_eq!(l.points.len(), 3);
    }

    #[test]
    fn empty_input_yields_empty_line() {
        let l = parse_line("").unwrap();
        assert!(l.points.is_empty());
        let l = parse_line("   \n  ").unwrap();
        assert!(l.points.is_empty());
    }

    #[test]
    fn short_circuits_on_first_bad_point() {
        let err = parse_line("1,2 bad 3,4").unwrap_err();
        assert!(matches!(err, KmlStreamError::InvalidLine(_)));
    }
}
