//! Result formatting for the CLI.

use crate::engine::SearchResponse;
use crate::index::reader::Snapshot;
use crate::index::types::Value;
use crate::schema::QName;
use std::io::{self, Write};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

/// Print one result row per document id, with type and name when the
/// snapshot carries them.
pub fn print_results(
    snapshot: &Snapshot,
    response: &SearchResponse,
    color: bool,
) -> io::Result<()> {
    let choice = if color {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    };
    let mut stdout = StandardStream::stdout(choice);

    for &db_id in &response.db_ids {
        stdout.set_color(ColorSpec::new().set_fg(Some(Color::Green)).set_bold(true))?;
        write!(stdout, "{db_id:>8}")?;
        stdout.reset()?;

        if let Some(doc) = snapshot.doc(db_id) {
            write!(stdout, "  {}", doc.type_name)?;
            if let Some(name) = display_name(doc.properties.iter()) {
                stdout.set_color(ColorSpec::new().set_fg(Some(Color::Cyan)))?;
                write!(stdout, "  {name}")?;
                stdout.reset()?;
            }
        }
        writeln!(stdout)?;
    }

    writeln!(stdout, "{} of {} result(s)", response.db_ids.len(), response.total)?;
    Ok(())
}

fn display_name<'a>(
    properties: impl Iterator<Item = (&'a QName, &'a Value)>,
) -> Option<&'a str> {
    for (qname, value) in properties {
        if qname.local() == "name" {
            if let Value::Text(text) = value {
                return Some(text);
            }
        }
    }
    None
}
