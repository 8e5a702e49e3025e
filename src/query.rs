//! `lexrag query`: answer a question from the command line.

use anyhow::Result;
use lexrag_core::models::QueryResultItem;
use lexrag_core::retrieve::{answer, retrieve};

use crate::app::App;

/// Run a query and print the answer (or only the context) with its sources.
pub async fn run_query(
    app: &App,
    question: &str,
    top_k: Option<usize>,
    context_only: bool,
) -> Result<()> {
    let params = app.retrieve_params(top_k);

    if context_only {
        let result = retrieve(app.embedder.as_ref(), app.store.as_ref(), question, &params).await?;
        println!("{}", result.context);
        print_sources(&result.sources);
        return Ok(());
    }

    let result = answer(
        app.embedder.as_ref(),
        app.store.as_ref(),
        app.generator.as_ref(),
        question,
        &params,
    )
    .await?;
    println!("{}", result.answer);
    print_sources(&result.sources);
    Ok(())
}

fn print_sources(sources: &[QueryResultItem]) {
    if sources.is_empty() {
        println!("\nNo matching documents.");
        return;
    }
    println!("\nSources:");
    for item in sources {
        println!("{}", format_source(item));
    }
}

/// One source line: rank, title, location and distance.
pub fn format_source(item: &QueryResultItem) -> String {
    format!(
        "{}. [{:.4}] {} ({}, chunk {})",
        item.rank + 1,
        item.distance,
        item.title,
        item.source_file,
        item.page_number
    )
}
