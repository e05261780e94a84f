//! Todo list example - a list bound to a broadcast channel, with delegated clicks

use livebind::{forward_broadcast, ComponentOptions, Emission, Rendered, Session, Subject};
use tokio::sync::broadcast;

const PAGE: &str = r#"<html><body>
<todo-app id="app"></todo-app>
</body></html>"#;

const TEMPLATE: &str = r#"<template id="todo-app">
<h1>Todos</h1>
<ul class="items"></ul>
</template>"#;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let session = Session::parse(PAGE)?;
    let mut events = session.subscribe_events();
    let todos: Subject<String> = Subject::new();

    let source = todos.clone();
    session.define(
        TEMPLATE,
        ComponentOptions::new()
            .style("li { list-style: square; }")
            .setup(move |scope| {
                let list = scope.query(".items")?;
                list.bind(&source, |item: &String, _, _| {
                    Ok(Rendered::Markup(format!("<li><span>{item}</span></li>")))
                })?;
                list.delegate("click", "li", |event| {
                    println!("Clicked todo {:?}", event.key);
                })?;
                Ok(())
            }),
    )?;

    // Producer on its own task; the subject stays on this thread
    let (tx, rx) = broadcast::channel(16);
    let producer = tokio::spawn(async move {
        for batch in [
            vec!["write docs"],
            vec!["write docs", "ship it"],
            vec!["ship it"],
        ] {
            let items = batch.into_iter().map(String::from).collect();
            let _ = tx.send(Emission::Sequence(items));
            tokio::task::yield_now().await;
        }
    });

    let forwarded = forward_broadcast(rx, &todos).await?;
    producer.await?;
    println!("Forwarded {forwarded} emissions");

    let doc = session.document();
    let app = doc.get_element_by_id("app").ok_or("missing #app")?;
    let root = doc.shadow_root(app).ok_or("todo-app was not upgraded")?;
    println!("{}", doc.inner_html(root)?);

    if let Some(first) = doc.query_selector(root, "li span")? {
        doc.dispatch(first, "click")?;
    }

    while let Ok(event) = events.try_recv() {
        println!("Event: {event:?}");
    }

    Ok(())
}
