use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use crate::app::{Result, Trawler, TrawlError};
use crate::auth::{AuthState, Credentials};
use crate::feed::FeedSort;
use crate::sink::JsonFileSink;

pub async fn login(
    trawler: &Trawler,
    username: Option<String>,
    password: Option<String>,
) -> Result<()> {
    let flow = trawler.login().await?;
    let credentials = match (username, password) {
        (Some(username), Some(password)) => Some(Credentials { username, password }),
        _ => None,
    };

    match flow.login(credentials.as_ref()).await {
        Ok(cookies) => match flow.state() {
            AuthState::Authenticated => {
                println!("Authenticated ({} cookies)", cookies.len());
            }
            _ => {
                println!("Not authenticated (no credentials supplied)");
            }
        },
        Err(TrawlError::TwoFactorRequired) => {
            let code = prompt("Two-factor challenge detected. Authenticator code: ")?;
            let cookies = flow.enter_auth_code(code.trim()).await?;
            println!("Authenticated ({} cookies)", cookies.len());
        }
        Err(error) => return Err(error),
    }
    Ok(())
}

pub async fn status(trawler: &Trawler) -> Result<()> {
    let flow = trawler.login().await?;
    flow.login(None).await?;
    match flow.state() {
        AuthState::Authenticated => println!("Session is authenticated"),
        _ => println!("Session is anonymous"),
    }
    Ok(())
}

pub async fn scrape(
    trawler: &Trawler,
    feed: &str,
    sort: Option<FeedSort>,
    output: Option<PathBuf>,
    save: bool,
) -> Result<()> {
    let mut session = trawler.feed(feed, sort).await?;

    let sink = match output {
        Some(path) => Some(JsonFileSink::new(path)),
        None if save => Some(JsonFileSink::for_feed(feed)),
        None => None,
    };
    if let Some(sink) = sink {
        eprintln!("Writing records to {}", sink.path().display());
        session = session.with_sink(Box::new(sink));
    }

    let mut count = 0usize;
    let outcome = session
        .run(|post| {
            if let Some(post) = post {
                count += 1;
                match serde_json::to_string(&post) {
                    Ok(line) => println!("{line}"),
                    Err(error) => eprintln!("Failed to serialize post {}: {error}", post.id),
                }
            }
        })
        .await?;

    eprintln!("Traversal finished: {count} posts ({outcome:?})");
    Ok(())
}

fn prompt(message: &str) -> Result<String> {
    print!("{message}");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line)
}
