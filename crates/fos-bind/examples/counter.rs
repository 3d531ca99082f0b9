//! Example: a counter bound through markup attributes
//!
//! Run with `RUST_LOG=fos_bind=debug` to see lifecycle transitions.

use fos_bind::{ActionEvent, Application, Behavior, Context, Controller, Value, ValueType};
use fos_dom::{Document, Event};

#[derive(Default)]
struct Counter;

impl Controller for Counter {
    fn value_changed(
        &mut self,
        cx: &mut Context<'_>,
        key: &str,
        value: &Value,
        _old: Option<&Value>,
    ) -> anyhow::Result<()> {
        if key == "count" {
            let output = cx.target("output")?;
            let text = value.as_f64().unwrap_or_default().to_string();
            cx.document_mut().set_text_content(output, &text)?;
        }
        Ok(())
    }

    fn invoke(&mut self, cx: &mut Context<'_>, method: &str, event: &mut ActionEvent<'_>) -> anyhow::Result<()> {
        let step = event.param("step").and_then(|s| s.as_f64()).unwrap_or(1.0);
        let count = cx.value("count")?.as_f64().unwrap_or_default();
        match method {
            "increment" => cx.set_value("count", count + step)?,
            "reset" => cx.set_value("count", 0.0)?,
            _ => {}
        }
        Ok(())
    }
}

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let mut doc = Document::default();
    let body = doc.body();
    doc.append_markup(body, r#"
        <div id="counter" data-controller="counter" data-counter-count-value="5">
            <span data-counter-target="output"></span>
            <button id="inc" data-action="counter#increment" data-counter-step-param="2">+2</button>
            <button id="reset" data-action="counter#reset">Reset</button>
        </div>
    "#)?;

    let mut app = Application::new();
    app.register(
        "counter",
        &Behavior::new(|| Counter)
            .target("output")
            .value("count", ValueType::Number)
            .methods(["increment", "reset"]),
    )?;
    app.start(&mut doc, body)?;

    let counter = doc.get_element_by_id("counter").ok_or_else(|| anyhow::anyhow!("no counter"))?;
    let inc = doc.get_element_by_id("inc").ok_or_else(|| anyhow::anyhow!("no button"))?;
    let reset = doc.get_element_by_id("reset").ok_or_else(|| anyhow::anyhow!("no button"))?;
    let output = app.targets(&doc, counter, "counter", "output");

    for target in [inc, inc, reset, inc] {
        app.dispatch_event(&mut doc, target, &mut Event::new("click"));
        app.flush(&mut doc);
        println!(
            "count = {} (markup: {:?})",
            output.iter().map(|&o| doc.text_content(o)).collect::<String>(),
            doc.get_attribute(counter, "data-counter-count-value"),
        );
    }

    for diagnostic in app.take_diagnostics() {
        println!("diagnostic: {diagnostic:?}");
    }
    app.stop(&mut doc);
    Ok(())
}
