//! CSV roster import. The parser is hand-rolled (header-mapped columns,
//! double-quoted fields) because the upload format is three columns and the
//! surrounding stack has no spreadsheet dependency; rows missing any of
//! roll/name/email are skipped, never fatal.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterRow {
    pub roll: String,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Default)]
pub struct RosterParse {
    pub rows: Vec<RosterRow>,
    pub skipped: usize,
}

pub fn parse_roster_csv(text: &str) -> Result<RosterParse, String> {
    let mut lines = text.lines().filter(|l| !l.trim().is_empty());

    let header = lines.next().ok_or_else(|| "CSV is empty".to_string())?;
    let columns: Vec<String> = split_csv_line(header)
        .iter()
        .map(|c| c.trim().to_lowercase())
        .collect();

    let col = |name: &str| columns.iter().position(|c| c == name);
    let (roll_idx, name_idx, email_idx) = match (col("roll"), col("name"), col("email")) {
        (Some(r), Some(n), Some(e)) => (r, n, e),
        _ => return Err("CSV must have roll, name and email columns".to_string()),
    };

    let mut parse = RosterParse::default();
    for line in lines {
        let fields = split_csv_line(line);
        let get = |i: usize| fields.get(i).map(|s| s.trim().to_string()).unwrap_or_default();
        let row = RosterRow {
            roll: get(roll_idx),
            name: get(name_idx),
            email: get(email_idx).to_lowercase(),
        };
        if row.roll.is_empty() || row.name.is_empty() || row.email.is_empty() {
            parse.skipped += 1;
        } else {
            parse.rows.push(row);
        }
    }
    Ok(parse)
}

/// Splits one CSV line, honoring double quotes ("" escapes a quote).
fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                chars.next();
                current.push('"');
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                fields.push(std::mem::take(&mut current));
            }
            _ => current.push(ch),
        }
    }
    fields.push(current);
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_simple_roster() {
        let csv = "roll,name,email\n21CS001,Asha Rao,asha@example.edu\n21CS002,Vikram Iyer,vikram@example.edu\n";
        let parse = parse_roster_csv(csv).unwrap();
        assert_eq!(parse.rows.len(), 2);
        assert_eq!(parse.skipped, 0);
        assert_eq!(
            parse.rows[0],
            RosterRow {
                roll: "21CS001".to_string(),
                name: "Asha Rao".to_string(),
                email: "asha@example.edu".to_string(),
            }
        );
    }

    #[test]
    fn test_header_order_is_flexible() {
        let csv = "Email,Roll,Name\na@x.edu,R1,A\n";
        let parse = parse_roster_csv(csv).unwrap();
        assert_eq!(parse.rows[0].roll, "R1");
        assert_eq!(parse.rows[0].email, "a@x.edu");
    }

    #[test]
    fn test_incomplete_rows_are_skipped_not_fatal() {
        let csv = "roll,name,email\nR1,A,a@x.edu\nR2,,b@x.edu\n,C,c@x.edu\n";
        let parse = parse_roster_csv(csv).unwrap();
        assert_eq!(parse.rows.len(), 1);
        assert_eq!(parse.skipped, 2);
    }

    #[test]
    fn test_quoted_fields_with_commas() {
        let csv = "roll,name,email\nR1,\"Rao, Asha\",a@x.edu\n";
        let parse = parse_roster_csv(csv).unwrap();
        assert_eq!(parse.rows[0].name, "Rao, Asha");
    }

    #[test]
    fn test_escaped_quote_inside_field() {
        assert_eq!(split_csv_line(r#"a,"say ""hi""",b"#), vec!["a", "say \"hi\"", "b"]);
    }

    #[test]
    fn test_missing_columns_is_an_error() {
        assert!(parse_roster_csv("roll,name\nR1,A\n").is_err());
        assert!(parse_roster_csv("").is_err());
    }

    #[test]
    fn test_email_is_lowercased() {
        let csv = "roll,name,email\nR1,A,Upper@X.EDU\n";
        let parse = parse_roster_csv(csv).unwrap();
        assert_eq!(parse.rows[0].email, "upper@x.edu");
    }
}
