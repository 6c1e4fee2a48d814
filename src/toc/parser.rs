//! Parse a line of the table of contents.
//!
//! Each line has the form `<name> <parts> <maxsize> [<count> ...]`.

use std::str::FromStr;

use super::*;

type Result<T> = std::result::Result<T, TocError>;

pub(super) fn parse_line(line: &str) -> Result<TocEntry> {
    let mut fields = line.split_ascii_whitespace();

    let name = fields.next().ok_or(TocError::MissingField("package name"))?;
    if name.len() > MAX_NAME_LEN {
        return Err(TocError::NameTooLong);
    }

    let part_count = number(fields.next().ok_or(TocError::MissingField("number of parts"))?)?;
    let max_size = number(fields.next().ok_or(TocError::MissingField("maximum size"))?)?;

    let volume_counts = VolumeCounts::from(fields.map(number).collect::<Result<Vec<u32>>>()?);

    if !volume_counts.covers(part_count) {
        return Err(TocError::Uncovered(part_count));
    }

    Ok(TocEntry {
        name: name.to_owned(),
        part_count,
        max_size,
        volume_counts,
    })
}

fn number<T: FromStr>(field: &str) -> Result<T> {
    field
        .parse()
        .map_err(|_| TocError::InvalidNumber(field.to_owned()))
}

#[test]
fn parse_valid_lines() {
    macro_rules! check {
        ($line:expr, [ $name:expr, $parts:expr, $size:expr, $counts:expr ]) => {
            assert_eq!(
                TocEntry::try_from($line).unwrap(),
                TocEntry::new($name, $parts, $size, $counts.to_vec())
            )
        };
    }

    check!("SUNWcsr 1 5120", ["SUNWcsr", 1, 5120, [0u32; 0]]);
    check!("SUNWcsu 4 90112 3 1", ["SUNWcsu", 4, 90112, [3, 1]]);
    check!("  SUNWman\t2   400 0 2 ", ["SUNWman", 2, 400, [0, 2]]);

    // Extra counts are accepted.
    check!("SUNWx 2 1 1 1 7", ["SUNWx", 2, 1, [1, 1, 7]]);
}

#[test]
fn reject_invalid_lines() {
    assert_eq!(
        TocEntry::try_from(""),
        Err(TocError::MissingField("package name"))
    );

    assert_eq!(
        TocEntry::try_from("SUNWcsr"),
        Err(TocError::MissingField("number of parts"))
    );

    assert_eq!(
        TocEntry::try_from("SUNWcsr 1"),
        Err(TocError::MissingField("maximum size"))
    );

    assert_eq!(
        TocEntry::try_from("SUNWcsr x 10"),
        Err(TocError::InvalidNumber("x".into()))
    );

    assert_eq!(
        TocEntry::try_from("SUNWcsr -1 10"),
        Err(TocError::InvalidNumber("-1".into()))
    );

    assert_eq!(
        TocEntry::try_from("SUNWcsr 1 10 1 a"),
        Err(TocError::InvalidNumber("a".into()))
    );

    assert_eq!(
        TocEntry::try_from("SUNWcsr 5 10 2 2"),
        Err(TocError::Uncovered(5))
    );

    let long_name = format!("{} 1 1", "p".repeat(MAX_NAME_LEN + 1));
    assert_eq!(
        TocEntry::try_from(long_name.as_str()),
        Err(TocError::NameTooLong)
    );
}
