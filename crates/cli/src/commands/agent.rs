//! `ferriclaw agent` - one-shot or interactive chat.

use std::io::{BufRead, Write};
use tokio_util::sync::CancellationToken;

use ferriclaw_config::AppConfig;
use ferriclaw_core::agent::AgentHandle;

use crate::app;

pub async fn run(message: Option<String>, session: String) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    let app = app::build(config)?;

    match message {
        Some(message) => {
            let response = app
                .agent
                .process_direct(CancellationToken::new(), &message, &session)
                .await?;
            println!("\n{response}");
        }
        None => {
            println!("Interactive mode (type 'exit' to quit)\n");
            interactive(&app, &session).await?;
        }
    }
    Ok(())
}

async fn interactive(app: &app::App, session: &str) -> Result<(), Box<dyn std::error::Error>> {
    let stdin = std::io::stdin();
    loop {
        print!("you: ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            println!("\nGoodbye!");
            return Ok(());
        }

        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input == "exit" || input == "quit" {
            println!("Goodbye!");
            return Ok(());
        }

        match app
            .agent
            .process_direct(CancellationToken::new(), input, session)
            .await
        {
            Ok(response) => println!("\n{response}\n"),
            Err(e) => eprintln!("Error: {e}"),
        }
    }
}
