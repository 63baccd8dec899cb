//! Interactive terminal browser over the search engine.
//!
//! Plain lines are typed into the search box (debounced); `:region <name>`,
//! `:page <n>`, `:limit <n>` apply at once; `:quit` or end of input exits after
//! pending work settles. Results are printed only while their generation is
//! current, so a slow stale query never overwrites a newer page.

use crate::countries::{CountryResponse, CountrySearch};
use crate::sync::{Effect, RequestGeneration, SearchState, SyncHandle, Synchronizer, spawn};
use crate::upstream::FetchError;
use anyhow::Context;
use std::fmt::Write as _;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::debug;

const HELP: &str = "\
type to search names, regions and capitals
  :region <name>   filter by region (\"all\" clears)
  :page <n>        jump to page
  :limit <n>       results per page
  :quit            exit
";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Text(String),
    Region(String),
    Page(i64),
    Limit(i64),
    Help,
    Quit,
}

pub fn parse_line(line: &str) -> Result<Input, String> {
    let Some(command) = line.strip_prefix(':') else {
        return Ok(Input::Text(line.to_owned()));
    };
    let (name, arg) = command
        .split_once(char::is_whitespace)
        .map_or((command.trim(), ""), |(n, a)| (n, a.trim()));

    let number = |arg: &str| {
        arg.parse::<i64>()
            .map_err(|_| format!("expected a number, got '{arg}'"))
    };
    match name {
        "region" => Ok(Input::Region(arg.to_owned())),
        "page" => number(arg).map(Input::Page),
        "limit" => number(arg).map(Input::Limit),
        "help" | "h" | "?" => Ok(Input::Help),
        "quit" | "q" | "exit" => Ok(Input::Quit),
        other => Err(format!("unknown command ':{other}' (try :help)")),
    }
}

pub fn render(response: &CountryResponse) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "page {} of {} ({} matching)",
        response.page, response.total_pages, response.total
    );
    if response.countries.is_empty() {
        out.push_str("  no countries on this page\n");
    }
    let offset = (response.page.saturating_sub(1) as usize) * response.limit as usize;
    for (i, country) in response.countries.iter().enumerate() {
        let _ = write!(
            out,
            "{:>4}. {} [{}] {}",
            offset + i + 1,
            country.name.common,
            country.code(),
            country.region
        );
        if let Some(capital) = country.primary_capital() {
            let _ = write!(out, ", capital {capital}");
        }
        out.push('\n');
    }
    out
}

fn forward(handle: &SyncHandle, input: Input) {
    match input {
        Input::Text(text) => handle.type_text(text),
        Input::Region(region) => handle.set_region(region),
        Input::Page(page) => handle.set_page(page),
        Input::Limit(limit) => handle.set_page_size(limit),
        Input::Help | Input::Quit => {}
    }
}

type QueryResult = (u64, Result<CountryResponse, FetchError>);

pub async fn run<R, W>(
    search: CountrySearch,
    initial: SearchState,
    debounce: Duration,
    input: R,
    mut output: W,
) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let generations = RequestGeneration::new();
    let mut sync = Synchronizer::new(initial, generations.clone());
    let first = sync.start();
    let (handle, mut effects, _task) = spawn(sync, debounce);
    let (results_tx, mut results) = mpsc::unbounded_channel::<QueryResult>();

    let run_query = |generation: u64, state: SearchState| {
        let search = search.clone();
        let results_tx = results_tx.clone();
        tokio::spawn(async move {
            let result = search.query(&state.to_filter()).await;
            let _ = results_tx.send((generation, result));
        });
    };

    output.write_all(HELP.as_bytes()).await?;
    if let Effect::Query { generation, state } = first {
        run_query(generation, state);
    }

    let mut lines = input.lines();
    let mut handle = Some(handle);
    let mut effects_closed = false;
    let mut outstanding = 1usize;

    loop {
        tokio::select! {
            line = lines.next_line(), if handle.is_some() => {
                match line.context("Failed to read input")? {
                    Some(line) => match parse_line(&line) {
                        // Dropping the handle flushes pending text and stops the synchronizer.
                        Ok(Input::Quit) => handle = None,
                        Ok(Input::Help) => output.write_all(HELP.as_bytes()).await?,
                        Ok(input) => {
                            if let Some(handle) = &handle {
                                forward(handle, input);
                            }
                        }
                        Err(message) => output.write_all(format!("{message}\n").as_bytes()).await?,
                    },
                    None => handle = None,
                }
            }
            effect = effects.recv(), if !effects_closed => match effect {
                Some(Effect::Navigate(href)) => {
                    output.write_all(format!("-> {href}\n").as_bytes()).await?
                }
                Some(Effect::ScrollToTop) => output.write_all(b"----\n").await?,
                Some(Effect::Query { generation, state }) => {
                    outstanding += 1;
                    run_query(generation, state);
                }
                None => effects_closed = true,
            },
            Some((generation, result)) = results.recv(), if outstanding > 0 => {
                outstanding -= 1;
                if !generations.is_current(generation) {
                    debug!(generation, latest = generations.latest(), "discarding stale results");
                } else {
                    let text = match result {
                        Ok(page) => render(&page),
                        Err(e) => format!("country data is unavailable: {e}\n"),
                    };
                    output.write_all(text.as_bytes()).await?;
                }
            }
        }
        output.flush().await?;

        if effects_closed && outstanding == 0 {
            break;
        }
    }
    Ok(())
}
