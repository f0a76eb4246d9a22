use std::io::{self, BufRead, Write};

/// Answer to a single whitelist question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Answer {
    Yes,
    No,
    Quit,
}

fn parse_answer(input: &str) -> Answer {
    match input.trim().to_lowercase().as_str() {
        "y" | "yes" => Answer::Yes,
        "q" | "quit" => Answer::Quit,
        _ => Answer::No,
    }
}

/// Ask, for each license in `candidates`, whether it should be whitelisted.
///
/// Returns the accepted licenses in the order they were asked. `q` stops the
/// questioning and end of input counts as "no" for everything left.
pub fn ask_whitelist_additions<R, W>(mut input: R, mut output: W, candidates: &[String]) -> io::Result<Vec<String>>
where
    R: BufRead,
    W: Write,
{
    let mut accepted = Vec::new();

    for (i, license) in candidates.iter().enumerate() {
        write!(
            output,
            "[{}/{}] Add \"{}\" to the whitelist? [y/N/q]: ",
            i + 1,
            candidates.len(),
            license
        )?;
        output.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            writeln!(output)?;
            break;
        }

        match parse_answer(&line) {
            Answer::Yes => accepted.push(license.clone()),
            Answer::No => {}
            Answer::Quit => break,
        }
    }

    Ok(accepted)
}
