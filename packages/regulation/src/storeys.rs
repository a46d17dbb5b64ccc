//! Storey range shorthand.
//!
//! Type-based tables key allocations by storey bands written in several
//! ways: `3`, `1-5`, `1–5`, `1 to 5`, `storeys 1-5`, `6+`, `6 and above`.

use std::sync::LazyLock;

use plot_gfa_zoning_models::MAX_STOREYS;
use regex::Regex;

static RANGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?ix)
        ^\s*
        (?:(?:storeys?|levels?|floors?|tiers?)\s*)?
        (\d+)\s*
        (?:
            (?:-|–|—|to)\s*(\d+)
            |
            (\+|and\s+above|&\s*above|onwards|above)
        )?
        \s*$",
    )
    .unwrap_or_else(|_| unreachable!())
});

/// A parsed storey band. Storeys are one-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreyRange {
    /// First storey of the band.
    pub first: u32,
    /// Last storey, or `None` for an open-ended band.
    pub last: Option<u32>,
}

impl StoreyRange {
    /// Whether the band continues indefinitely upwards.
    #[must_use]
    pub const fn is_open_ended(&self) -> bool {
        self.last.is_none()
    }

    /// Explicit storeys of a closed band; just `first` for an open one.
    pub fn storeys(&self) -> impl Iterator<Item = u32> {
        self.first..=self.last.unwrap_or(self.first)
    }
}

/// Parses storey shorthand.
///
/// # Errors
///
/// Returns a description of the problem when the text is not a
/// recognised form, names storey 0, runs downwards (`5-1`), or names a
/// storey above [`MAX_STOREYS`].
pub fn parse_storey_range(raw: &str) -> Result<StoreyRange, String> {
    let caps = RANGE_RE
        .captures(raw)
        .ok_or_else(|| format!("unrecognised storey range '{raw}'"))?;

    let number = |i: usize| -> Result<Option<u32>, String> {
        caps.get(i)
            .map(|m| {
                m.as_str()
                    .parse::<u32>()
                    .map_err(|e| format!("storey '{}' in '{raw}': {e}", m.as_str()))
            })
            .transpose()
    };

    let first = number(1)?.ok_or_else(|| format!("no storey in '{raw}'"))?;
    if first == 0 {
        return Err(format!("storey 0 in '{raw}' (storeys are numbered from 1)"));
    }

    let last = if caps.get(3).is_some() {
        None
    } else {
        Some(number(2)?.unwrap_or(first))
    };

    if let Some(last) = last
        && last < first
    {
        return Err(format!("inverted storey range '{raw}'"));
    }
    if first.max(last.unwrap_or(first)) > MAX_STOREYS {
        return Err(format!("storey range '{raw}' goes above storey {MAX_STOREYS}"));
    }

    Ok(StoreyRange { first, last })
}

/// Formats a single storey back to shorthand.
#[must_use]
pub fn format_storey(storey: u32, open_ended: bool) -> String {
    if open_ended {
        format!("{storey}+")
    } else {
        storey.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn closed(first: u32, last: u32) -> StoreyRange {
        StoreyRange {
            first,
            last: Some(last),
        }
    }

    #[test]
    fn parses_every_shorthand() {
        assert_eq!(parse_storey_range("3").unwrap(), closed(3, 3));
        assert_eq!(parse_storey_range("1-5").unwrap(), closed(1, 5));
        assert_eq!(parse_storey_range("1–5").unwrap(), closed(1, 5));
        assert_eq!(parse_storey_range("1 to 5").unwrap(), closed(1, 5));
        assert_eq!(parse_storey_range("Storeys 1 - 5").unwrap(), closed(1, 5));
        assert!(parse_storey_range("6+").unwrap().is_open_ended());
        assert!(parse_storey_range("6 and above").unwrap().is_open_ended());
        assert_eq!(parse_storey_range(" 6 AND ABOVE ").unwrap().first, 6);
    }

    #[test]
    fn expands_closed_ranges() {
        let storeys: Vec<u32> = parse_storey_range("2-4").unwrap().storeys().collect();
        assert_eq!(storeys, vec![2, 3, 4]);
        let open: Vec<u32> = parse_storey_range("7+").unwrap().storeys().collect();
        assert_eq!(open, vec![7]);
    }

    #[test]
    fn rejects_bad_ranges() {
        assert!(parse_storey_range("5-1").unwrap_err().contains("inverted"));
        assert!(parse_storey_range("0").unwrap_err().contains("storey 0"));
        assert!(parse_storey_range("ground").is_err());
        assert!(parse_storey_range("").is_err());
        assert!(
            parse_storey_range("1-4000000000")
                .unwrap_err()
                .contains("above storey")
        );
        assert!(parse_storey_range("250+").is_err());
        assert_eq!(
            parse_storey_range(&format!("1-{MAX_STOREYS}")).unwrap(),
            closed(1, MAX_STOREYS)
        );
    }

    #[test]
    fn formats_open_ended() {
        assert_eq!(format_storey(6, true), "6+");
        assert_eq!(format_storey(2, false), "2");
    }
}
