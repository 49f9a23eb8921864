//! `evrag ask`: answer one question from the terminal.

use anyhow::Result;

use evrag_core::models::QueryResponse;
use evrag_core::pipeline::QueryRequest;

use crate::app::App;
use crate::config::Config;

pub async fn run_ask(
    config: &Config,
    question: &str,
    top_k: Option<usize>,
    json: bool,
) -> Result<()> {
    let app = App::open(config).await?;
    let pipeline = app.pipeline()?;

    let mut request = QueryRequest::question(question);
    request.top_k = top_k;
    let result = pipeline.run(&request).await;
    app.close().await;
    let response = result?;

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        print_response(&response);
    }
    Ok(())
}

fn print_response(response: &QueryResponse) {
    println!("{}", response.answer.trim());

    if response.events.is_empty() {
        return;
    }
    println!();
    println!("Suggested events:");
    for (i, resolved) in response.events.iter().enumerate() {
        let event = &resolved.event;
        println!(
            "{}. [{:.2}] {} (id {})",
            i + 1,
            resolved.similarity,
            event.name,
            event.id
        );
        let when = event
            .start
            .map(|s| s.format("%Y-%m-%d %H:%M UTC").to_string())
            .unwrap_or_else(|| "TBD".to_string());
        println!("    when:  {}", when);
        if let Some(area) = &event.area {
            println!("    where: {}", area);
        }
        if let Some(url) = &event.website {
            println!("    link:  {}", url);
        }
    }
}
